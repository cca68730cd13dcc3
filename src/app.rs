use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api;
use crate::config;
use crate::data::{self, CommentService, MediaService, PostService};
use crate::logging;
use crate::tabs::Tab;
use crate::ui;

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub demo: bool,
}

struct Services {
    media: Arc<dyn MediaService + Send + Sync>,
    posts: Arc<dyn PostService + Send + Sync>,
    comments: Arc<dyn CommentService + Send + Sync>,
    label: String,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Some(base_url) = opts.base_url.as_ref() {
        cfg.server.base_url = base_url.clone();
    }

    // A broken log location must not keep the app from starting.
    let log_note = match logging::init(&cfg.log) {
        Ok(Some(path)) => format!("Logging to {}.", friendly_path(&path)),
        Ok(None) => String::new(),
        Err(err) => format!("Logging disabled: {err:#}."),
    };

    let services = build_services(&cfg, opts.demo)?;
    let config_path = opts.config_file.clone().or_else(config::default_path);
    info!(
        backend = %services.label,
        config = %config_path.as_deref().map(friendly_path).unwrap_or_default(),
        "starting"
    );

    let status = format!(
        "Backend: {}. F1 upload, F2 comments, Esc quit. {log_note}",
        services.label
    );

    let options = ui::Options {
        status_message: status.trim_end().to_string(),
        initial_tab: cfg.ui.initial_tab.unwrap_or(Tab::Upload),
        backend_label: services.label,
        media_service: services.media,
        post_service: services.posts,
        comment_service: services.comments,
    };

    let mut model = ui::Model::new(options);
    let result = model.run();
    if let Err(err) = &result {
        warn!(error = %err, "terminal session ended with an error");
    }
    result
}

fn build_services(cfg: &config::Config, demo: bool) -> Result<Services> {
    if demo {
        let backend = Arc::new(data::DemoBackend::new());
        return Ok(Services {
            media: backend.clone(),
            posts: backend.clone(),
            comments: backend,
            label: "demo (offline sample data)".to_string(),
        });
    }

    let client = api::Client::new(api::ClientConfig {
        base_url: cfg.server.base_url.clone(),
        user_agent: cfg.server.user_agent.clone(),
        timeout: cfg.server.timeout,
        http_client: None,
    })
    .context("create backend client")?;
    let label = client.base_url().to_string();
    let client = Arc::new(client);

    Ok(Services {
        media: Arc::new(data::ApiMediaService::new(client.clone())),
        posts: Arc::new(data::ApiPostService::new(client.clone())),
        comments: Arc::new(data::ApiCommentService::new(client)),
        label,
    })
}

fn friendly_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            let mut display = String::from("~");
            if !stripped.as_os_str().is_empty() {
                display.push_str(&format!("/{}", stripped.display()));
            }
            return display;
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_outside_home_is_unchanged() {
        let path = Path::new("/definitely/not/home/reels-agent.log");
        assert_eq!(friendly_path(path), "/definitely/not/home/reels-agent.log");
    }

    #[test]
    fn demo_services_skip_the_network() {
        let services = build_services(&config::Config::default(), true).unwrap();
        assert!(services.label.starts_with("demo"));
        assert!(services.posts.list_posts().is_success());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut cfg = config::Config::default();
        cfg.server.base_url = "not a url".into();
        let err = build_services(&cfg, false).err().expect("error");
        assert!(format!("{err:#}").contains("create backend client"));
    }
}
