//! Configuration management for Cortex services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Secret used when none is configured outside production
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// AI provider configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// Video search configuration
    #[serde(default)]
    pub youtube: YouTubeConfig,

    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment: development, test, production
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres connection string
    pub url: String,

    /// Read replica connection string (optional)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply bundled SQL migrations at start-up
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Refresh token lifetime in days
    #[serde(default = "default_refresh_days")]
    pub refresh_token_days: i64,
}

/// Which chat backend to use when several are configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    Groq,
    Gemini,
    Ollama,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AiConfig {
    /// Explicit provider override; auto-detected when unset
    pub provider: Option<AiProviderKind>,

    /// Groq API key
    pub groq_api_key: Option<String>,

    /// Groq model
    pub groq_model: Option<String>,

    /// Groq API base URL
    pub groq_base_url: Option<String>,

    /// Gemini API key
    pub gemini_api_key: Option<String>,

    /// Gemini model
    pub gemini_model: Option<String>,

    /// Gemini API base URL
    pub gemini_base_url: Option<String>,

    /// Ollama base URL; Ollama is only used when this is set
    pub ollama_base_url: Option<String>,

    /// Ollama model
    pub ollama_model: Option<String>,

    /// Ollama request timeout in milliseconds
    pub ollama_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YouTubeConfig {
    /// YouTube Data API key
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,

    /// Videos requested per search
    #[serde(default = "default_youtube_max_results")]
    pub max_results: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Directory uploaded files are stored in (flat)
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_environment() -> String { "development".to_string() }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 5 }
fn default_idle_timeout() -> u64 { 30 }
fn default_jwt_expiration() -> u64 { 900 }
fn default_refresh_days() -> i64 { 7 }
fn default_youtube_base_url() -> String { "https://www.googleapis.com/youtube/v3".to_string() }
fn default_youtube_max_results() -> u32 { 6 }
fn default_upload_dir() -> PathBuf { PathBuf::from("uploads") }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            refresh_token_days: default_refresh_days(),
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_youtube_base_url(),
            max_results: default_youtube_max_results(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("server.environment", env.clone())?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__AI__GROQ_API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that must not reach a running server
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "database.url is not set (APP__DATABASE__URL)".to_string(),
            ));
        }
        if self.is_production() && self.auth.jwt_secret.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Message(
                "auth.jwt_secret must be set in production (APP__AUTH__JWT_SECRET)".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether this process runs in production mode
    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }

    /// The JWT signing secret, falling back to the development secret
    pub fn jwt_secret(&self) -> &str {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEV_JWT_SECRET)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/cortex".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: false,
            },
            auth: AuthConfig::default(),
            ai: AiConfig::default(),
            youtube: YouTubeConfig::default(),
            upload: UploadConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
