//! Cortex Common Library
//!
//! Shared code for the Cortex services including:
//! - Database models and repository patterns
//! - Chat completion providers and assistant replies
//! - Learning video search
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod ai;
pub mod assistant;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod videos;

// Re-export commonly used types
pub use ai::{AiService, ChatProvider};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use videos::{VideoDescriptor, VideoSearch, YouTubeClient};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
