//! Shared utilities for niftyswing
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup, `.env` loading, and application metadata.

pub mod config;
pub mod logging;

pub use config::{AppInfo, load_dotenv};
pub use logging::init_tracing;
