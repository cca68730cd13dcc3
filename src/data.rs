use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{self, Comment, Envelope, Post, UploadRequest};

pub trait MediaService: Send + Sync {
    fn upload(&self, request: &UploadRequest) -> Envelope;
}

pub trait PostService: Send + Sync {
    fn list_posts(&self) -> Envelope<Vec<Post>>;
}

pub trait CommentService: Send + Sync {
    fn list_comments(&self, media_id: &str) -> Envelope<Vec<Comment>>;
    fn reply(&self, comment_id: &str, message: &str) -> Envelope;
}

pub struct ApiMediaService {
    client: Arc<api::Client>,
}

impl ApiMediaService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl MediaService for ApiMediaService {
    fn upload(&self, request: &UploadRequest) -> Envelope {
        self.client.upload(request)
    }
}

pub struct ApiPostService {
    client: Arc<api::Client>,
}

impl ApiPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for ApiPostService {
    fn list_posts(&self) -> Envelope<Vec<Post>> {
        self.client.posts()
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn list_comments(&self, media_id: &str) -> Envelope<Vec<Comment>> {
        self.client.comments(media_id)
    }

    fn reply(&self, comment_id: &str, message: &str) -> Envelope {
        self.client.reply(comment_id, message)
    }
}

/// In-process stand-in for the backend, used by `--demo`.
pub struct DemoBackend {
    posts: Mutex<Vec<Post>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
}

impl Default for DemoBackend {
    fn default() -> Self {
        let posts = vec![
            Post {
                id: "demo-1".into(),
                media_type: "reel".into(),
                caption: Some("Sunset over the harbour\n#travel #golden".into()),
            },
            Post {
                id: "demo-2".into(),
                media_type: "image".into(),
                caption: None,
            },
            Post {
                id: "demo-3".into(),
                media_type: "video".into(),
                caption: Some("Behind the scenes of our first shoot".into()),
            },
        ];
        let mut comments = HashMap::new();
        comments.insert(
            "demo-1".to_string(),
            vec![
                Comment {
                    id: "demo-c1".into(),
                    username: "marta.k".into(),
                    text: "Where was this filmed?".into(),
                },
                Comment {
                    id: "demo-c2".into(),
                    username: "deniz".into(),
                    text: "The colours are unreal 🔥".into(),
                },
            ],
        );
        comments.insert(
            "demo-3".to_string(),
            vec![Comment {
                id: "demo-c3".into(),
                username: "studio_lights".into(),
                text: "Which camera did you use?".into(),
            }],
        );
        Self {
            posts: Mutex::new(posts),
            comments: Mutex::new(comments),
        }
    }
}

impl DemoBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaService for DemoBackend {
    fn upload(&self, request: &UploadRequest) -> Envelope {
        if request.media_url.trim().is_empty() {
            return Envelope::error("Missing information: media type and URL are required.");
        }
        let mut posts = self.posts.lock();
        let id = format!("demo-{}", posts.len() + 1);
        let caption = (!request.caption.is_empty()).then(|| request.caption.clone());
        posts.insert(
            0,
            Post {
                id: id.clone(),
                media_type: request.media_type.as_str().to_string(),
                caption,
            },
        );
        Envelope::success(format!(
            "{} published. Media ID: {id}",
            request.media_type.as_str()
        ))
    }
}

impl PostService for DemoBackend {
    fn list_posts(&self) -> Envelope<Vec<Post>> {
        Envelope::success("ok").with_data(self.posts.lock().clone())
    }
}

impl CommentService for DemoBackend {
    fn list_comments(&self, media_id: &str) -> Envelope<Vec<Comment>> {
        let comments = self
            .comments
            .lock()
            .get(media_id)
            .cloned()
            .unwrap_or_default();
        Envelope::success("ok").with_data(comments)
    }

    fn reply(&self, comment_id: &str, message: &str) -> Envelope {
        if message.trim().is_empty() {
            return Envelope::error("Reply text is empty.");
        }
        let comments = self.comments.lock();
        let author = comments
            .values()
            .flatten()
            .find(|comment| comment.id == comment_id)
            .map(|comment| comment.username.clone());
        match author {
            Some(username) => Envelope::success(format!("Reply sent to @{username}.")),
            None => Envelope::error(format!("Comment {comment_id} not found.")),
        }
    }
}
