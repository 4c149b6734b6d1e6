//! Registration, login and token refresh

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::extract::ValidJson;
use crate::response::ApiResponse;
use cortex_common::{
    auth::{generate_refresh_token, hash_password, hash_refresh_token, verify_password},
    db::models::{Language, User},
    errors::{AppError, Result},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Valid email required"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub display_name: Option<String>,

    pub preferred_language: Option<Language>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Valid email required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
}

/// Issue an access token and store a fresh refresh token
async fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse> {
    let access_token = state.jwt.generate_access_token(user.id, &user.email)?;
    let refresh_token = generate_refresh_token();

    state
        .repo
        .store_refresh_token(user.id, hash_refresh_token(&refresh_token), refresh_expiry(state))
        .await?;

    Ok(AuthResponse {
        user,
        access_token,
        refresh_token,
        expires_in: state.jwt.expires_in(),
    })
}

fn refresh_expiry(state: &AppState) -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(state.config.auth.refresh_token_days)
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let email = request.email.trim().to_string();

    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict {
            message: "User already exists with this email".to_string(),
        });
    }

    let password_hash = hash_password(&request.password)?;
    let display_name = request
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let user = state
        .repo
        .create_user(
            email,
            password_hash,
            display_name,
            request.preferred_language.unwrap_or(Language::En),
        )
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let tokens = issue_tokens(&state, user).await?;
    Ok(ApiResponse::created(tokens, "Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    let user = state
        .repo
        .find_user_by_email(request.email.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let user = state.repo.touch_last_login(user).await?;
    let tokens = issue_tokens(&state, user).await?;
    Ok(ApiResponse::with_message(tokens, "Login successful"))
}

pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RefreshRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    let invalid = || AppError::unauthorized("Invalid or expired refresh token");

    let presented = state
        .repo
        .find_valid_refresh_token(&hash_refresh_token(&request.refresh_token))
        .await?
        .ok_or_else(invalid)?;

    let user = state
        .repo
        .find_active_user(presented.user_id)
        .await?
        .ok_or_else(invalid)?;

    let access_token = state.jwt.generate_access_token(user.id, &user.email)?;
    let refresh_token = generate_refresh_token();

    state
        .repo
        .rotate_refresh_token(presented, hash_refresh_token(&refresh_token), refresh_expiry(&state))
        .await?;

    Ok(ApiResponse::with_message(
        AuthResponse {
            user,
            access_token,
            refresh_token,
            expires_in: state.jwt.expires_in(),
        },
        "Token refreshed",
    ))
}
