//! Error types for Cortex services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - The `{success:false, message, code}` error envelope
//! - Classification of Postgres errors by SQLSTATE

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// SQLSTATE for a relation that does not exist (schema not migrated)
const PG_UNDEFINED_TABLE: &str = "42P01";

/// When false, 5xx messages are replaced with a generic message
static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(true);

/// Toggle whether server error messages reach clients.
///
/// Called once at start-up; production deployments hide them.
pub fn set_expose_internal_errors(expose: bool) {
    EXPOSE_INTERNAL_ERRORS.store(expose, Ordering::Relaxed);
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    PayloadTooLarge,
    UnsupportedMediaType,

    // Authentication errors
    Unauthorized,
    ExpiredToken,

    // Resource errors
    NotFound,

    // Conflict errors
    Conflict,

    // External service errors
    UpstreamError,
    AiNotConfigured,

    // Internal errors
    InternalError,
    DatabaseError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("File too large: the limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Unsupported file type: {mime}. Use PDF, TXT, Markdown, or DOCX.")]
    UnsupportedMediaType { mime: String },

    // Authentication errors
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Token expired")]
    ExpiredToken,

    // Resource errors
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    // Conflict errors
    #[error("{message}")]
    Conflict { message: String },

    // External service errors
    #[error("No AI provider configured. Set a Groq, Gemini, or Ollama backend in the configuration.")]
    AiNotConfigured,

    #[error("{provider} error: {message}")]
    Upstream { provider: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(DbErr),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a 400 with a message and no field
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Shorthand for a 401 with a message
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::UnsupportedMediaType { .. } => ErrorCode::UnsupportedMediaType,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::AiNotConfigured => ErrorCode::AiNotConfigured,
            AppError::Upstream { .. } | AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Internal { .. } | AppError::Other(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 415 Unsupported Media Type
            AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Upstream { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::AiNotConfigured | AppError::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to show to the caller
    fn public_message(&self) -> String {
        let hide = self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
            && !EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed);
        if hide {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Classify store errors the way the HTTP boundary reports them:
/// unique violation → 409, foreign-key violation → 404,
/// missing relation → 503, anything else → 500.
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                return AppError::Conflict {
                    message: "Resource already exists (unique constraint).".to_string(),
                }
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                return AppError::NotFound {
                    resource: "Referenced resource",
                }
            }
            _ => {}
        }

        if sqlstate(&err).as_deref() == Some(PG_UNDEFINED_TABLE) {
            return AppError::ServiceUnavailable {
                message: "Database schema incomplete. Run the migrations before starting the server."
                    .to_string(),
            };
        }

        AppError::Database(err)
    }
}

/// Extract the Postgres SQLSTATE from a SeaORM error, if any
fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Query(runtime) | DbErr::Exec(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            success: false,
            message: self.public_message(),
            code: Some(code),
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Report the first violation, the way clients display it
        let first = errors.field_errors().into_iter().next().and_then(|(field, errs)| {
            errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            })
        });

        match first {
            Some((field, message)) => AppError::Validation {
                message,
                field: Some(field),
            },
            None => AppError::validation("Validation failed"),
        }
    }
}
