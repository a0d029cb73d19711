//! Environment loading and application metadata

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application metadata stamped into reports and run history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    /// Application name
    pub app_name: String,
    /// Crate version at build time
    pub version: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            app_name: "niftyswing".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var("SWING_ENV").unwrap_or_else(|_| "development".to_string()),
        }
    }
}

/// Load a `.env` file into the process environment
///
/// With an explicit path, only that file is read. Otherwise the usual
/// `dotenvy` lookup walks up from the current directory. Returns the path
/// that was loaded, or `None` when no file was found. Variables already set in
/// the environment are never overwritten.
pub fn load_dotenv(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => dotenvy::from_path(p).ok().map(|()| p.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}
