//! Health and client configuration endpoints (no auth)

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    /// True when any chat backend is configured
    pub groq_configured: bool,
}

/// Liveness plus a database round-trip
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.repo.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
    };

    Json(HealthResponse {
        ok: true,
        timestamp: Utc::now(),
        database,
    })
}

pub async fn app_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        groq_configured: state.ai.is_configured(),
    })
}
