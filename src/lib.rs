//! Dropbox 到 S3 的单向镜像同步

pub mod config;
pub mod core;
pub mod error;
pub mod handler;
pub mod logging;
pub mod storage;

pub use config::SyncSettings;
pub use core::{SyncConfig, SyncEngine, SyncOutcome, SyncReport};
pub use error::SyncError;
pub use handler::{handle, lambda_handler, HandlerResponse};
