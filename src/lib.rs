#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod comments;
pub mod config;
pub mod data;
pub mod logging;
pub mod status;
pub mod tabs;
pub mod ui;
pub mod upload;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
