//! Bearer-token authentication

use axum::{extract::FromRequestParts, http::request::Parts};
use cortex_common::{auth::extract_bearer, db::models::User, errors::AppError};
use uuid::Uuid;

use crate::app::AppState;

/// The authenticated, active caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        let claims = state.jwt.validate_access_token(token)?;
        let user_id = claims.user_id()?;

        let user = state
            .repo
            .find_active_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User not found or inactive"))?;

        Ok(AuthUser { user })
    }
}
