use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::{Comment, Envelope, Post};
use crate::status::{Outcome, Severity};

pub const PLACEHOLDER_LABEL: &str = "-- choose a post --";
pub const FETCHING_POSTS_MESSAGE: &str = "Fetching recent posts…";
pub const FETCHING_COMMENTS_MESSAGE: &str = "Fetching comments…";
pub const SENDING_REPLY_MESSAGE: &str = "Sending reply…";

const POSTS_FETCHED: &str = "Posts fetched. Select one to load its comments.";
const NO_POSTS: &str = "No posts found.";
const COMMENTS_FETCHED: &str = "Comments fetched.";
const NO_COMMENTS: &str = "No comments found.";
const REPLY_SENT: &str = "Reply sent.";
const REPLY_FAILED: &str = "reply failed.";
const CAPTION_PREVIEW_CHARS: usize = 40;

static LINE_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("valid line break regex"));

/// `"{media_type}: {caption}"`, caption flattened onto one line and cut to 40
/// characters.
pub fn post_label(post: &Post) -> String {
    let caption = match post.caption.as_deref() {
        Some(caption) if !caption.is_empty() => {
            let flat = LINE_BREAKS.replace_all(caption, " ");
            let preview: String = flat.chars().take(CAPTION_PREVIEW_CHARS).collect();
            format!("{preview}...")
        }
        _ => "no caption".to_string(),
    };
    format!("{}: {}", post.media_type, caption)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOption {
    /// `None` for the placeholder entry.
    pub value: Option<String>,
    pub label: String,
}

impl PostOption {
    fn placeholder() -> Self {
        Self {
            value: None,
            label: PLACEHOLDER_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    /// The placeholder was chosen; comments are gone and nothing is fetched.
    Cleared,
    Fetch { request_id: u64, media_id: String },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyBlocked {
    #[error("That comment is no longer shown.")]
    UnknownComment,
    #[error("A reply to this comment is already being sent.")]
    InFlight,
    #[error("Reply text is required.")]
    EmptyMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRequest {
    pub comment_id: String,
    /// Comment load that rendered the originating form.
    pub generation: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyForm {
    pub input: String,
    pub submitting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBlock {
    pub comment: Comment,
    pub reply: ReplyForm,
    /// Request id of the comment load that rendered this block.
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct PendingComments {
    request_id: u64,
    media_id: String,
}

/// Post selector plus the comment container with one reply form per comment.
#[derive(Debug, Clone)]
pub struct PostsAndComments {
    options: Vec<PostOption>,
    cursor: usize,
    selected: Option<String>,
    fetching_posts: bool,
    blocks: Vec<CommentBlock>,
    comment_cursor: usize,
    pending_comments: Option<PendingComments>,
    next_request_id: u64,
}

impl Default for PostsAndComments {
    fn default() -> Self {
        Self {
            options: vec![PostOption::placeholder()],
            cursor: 0,
            selected: None,
            fetching_posts: false,
            blocks: Vec::new(),
            comment_cursor: 0,
            pending_comments: None,
            next_request_id: 1,
        }
    }
}

impl PostsAndComments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> &[PostOption] {
        &self.options
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_fetching_posts(&self) -> bool {
        self.fetching_posts
    }

    pub fn is_fetching_comments(&self) -> bool {
        self.pending_comments.is_some()
    }

    pub fn blocks(&self) -> &[CommentBlock] {
        &self.blocks
    }

    pub fn comment_cursor(&self) -> usize {
        self.comment_cursor
    }

    pub fn focused_comment_id(&self) -> Option<&str> {
        self.blocks
            .get(self.comment_cursor)
            .map(|block| block.comment.id.as_str())
    }

    pub fn any_reply_in_flight(&self) -> bool {
        self.blocks.iter().any(|block| block.reply.submitting)
    }

    /// Returns `false` when a fetch is already outstanding.
    pub fn begin_fetch_posts(&mut self) -> bool {
        if self.fetching_posts {
            return false;
        }
        self.fetching_posts = true;
        true
    }

    pub fn finish_fetch_posts(&mut self, result: &Envelope<Vec<Post>>) -> Outcome {
        self.fetching_posts = false;
        if let Some(posts) = result.non_empty() {
            self.options = std::iter::once(PostOption::placeholder())
                .chain(posts.iter().map(|post| PostOption {
                    value: Some(post.id.clone()),
                    label: post_label(post),
                }))
                .collect();
            self.cursor = 0;
            self.selected = None;
            tracing::debug!(count = posts.len(), "post options replaced");
            return Outcome::new(POSTS_FETCHED, Severity::Success);
        }
        let severity = if result.is_success() {
            Severity::Info
        } else {
            Severity::Error
        };
        Outcome::new(result.message_or(NO_POSTS), severity)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.options.len() as isize;
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor as isize + delta).clamp(0, len - 1) as usize;
    }

    /// Makes the option under the cursor the selection.
    pub fn commit_selection(&mut self) -> SelectionChange {
        let value = self
            .options
            .get(self.cursor)
            .and_then(|option| option.value.clone());
        if value == self.selected && (value.is_some() || self.blocks.is_empty()) {
            return SelectionChange::Unchanged;
        }
        self.select(value)
    }

    pub fn select(&mut self, value: Option<String>) -> SelectionChange {
        self.selected = value.clone();
        self.clear_comments();
        match value {
            None => {
                self.pending_comments = None;
                SelectionChange::Cleared
            }
            Some(media_id) => {
                let request_id = self.next_request_id;
                self.next_request_id = self.next_request_id.wrapping_add(1);
                self.pending_comments = Some(PendingComments {
                    request_id,
                    media_id: media_id.clone(),
                });
                SelectionChange::Fetch {
                    request_id,
                    media_id,
                }
            }
        }
    }

    fn clear_comments(&mut self) {
        self.blocks.clear();
        self.comment_cursor = 0;
    }

    /// `None` when the response belongs to a selection that has since
    /// changed.
    pub fn finish_comments(
        &mut self,
        request_id: u64,
        media_id: &str,
        result: Envelope<Vec<Comment>>,
    ) -> Option<Outcome> {
        match &self.pending_comments {
            Some(pending) if pending.request_id == request_id && pending.media_id == media_id => {}
            _ => {
                tracing::debug!(request_id, media_id, "ignoring stale comments response");
                return None;
            }
        }
        self.pending_comments = None;
        self.clear_comments();

        if result.non_empty().is_some() {
            let comments = result.data.unwrap_or_default();
            self.blocks = comments
                .into_iter()
                .map(|comment| CommentBlock {
                    comment,
                    reply: ReplyForm::default(),
                    generation: request_id,
                })
                .collect();
            return Some(Outcome::new(COMMENTS_FETCHED, Severity::Success));
        }
        let severity = if result.is_success() {
            Severity::Info
        } else {
            Severity::Error
        };
        Some(Outcome::new(result.message_or(NO_COMMENTS), severity))
    }

    pub fn move_comment_cursor(&mut self, delta: isize) {
        let len = self.blocks.len() as isize;
        if len == 0 {
            return;
        }
        self.comment_cursor = (self.comment_cursor as isize + delta).clamp(0, len - 1) as usize;
    }

    fn block_mut(&mut self, comment_id: &str) -> Option<&mut CommentBlock> {
        self.blocks
            .iter_mut()
            .find(|block| block.comment.id == comment_id)
    }

    pub fn reply_input_mut(&mut self, comment_id: &str) -> Option<&mut String> {
        self.block_mut(comment_id).map(|block| &mut block.reply.input)
    }

    /// Single entry point for every reply form in the container, keyed by the
    /// comment the form belongs to.
    pub fn begin_reply(&mut self, comment_id: &str) -> Result<ReplyRequest, ReplyBlocked> {
        let block = self
            .block_mut(comment_id)
            .ok_or(ReplyBlocked::UnknownComment)?;
        if block.reply.submitting {
            return Err(ReplyBlocked::InFlight);
        }
        if block.reply.input.trim().is_empty() {
            return Err(ReplyBlocked::EmptyMessage);
        }
        block.reply.submitting = true;
        Ok(ReplyRequest {
            comment_id: comment_id.to_string(),
            generation: block.generation,
            message: block.reply.input.clone(),
        })
    }

    /// Re-enables the originating form and clears its input on success. The
    /// outcome is reported even when the form is gone; a form re-rendered by
    /// a later comment load is left alone.
    pub fn finish_reply(
        &mut self,
        comment_id: &str,
        generation: u64,
        result: &Envelope,
    ) -> Outcome {
        let success = result.is_success();
        let origin = self
            .block_mut(comment_id)
            .filter(|block| block.generation == generation);
        if let Some(block) = origin {
            block.reply.submitting = false;
            if success {
                block.reply.input.clear();
            }
        }
        if success {
            Outcome::new(result.message_or(REPLY_SENT), Severity::Success)
        } else {
            Outcome::new(
                format!("Error: {}", result.message_or(REPLY_FAILED)),
                Severity::Error,
            )
        }
    }
}
