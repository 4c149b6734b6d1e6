//! Caller profile

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::extract::ValidJson;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use cortex_common::{
    db::{
        models::{Language, User},
        UserPatch,
    },
    errors::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,

    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,

    pub preferred_language: Option<Language>,
}

#[derive(Serialize)]
pub struct UserBody {
    pub user: User,
}

pub async fn me(auth: AuthUser) -> Json<ApiResponse<UserBody>> {
    ApiResponse::ok(UserBody { user: auth.user })
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(request): ValidJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserBody>>> {
    let patch = UserPatch {
        display_name: request.display_name.map(|n| n.trim().to_string()),
        avatar_url: request.avatar_url,
        preferred_language: request.preferred_language,
    };

    if patch.is_empty() {
        return Ok(ApiResponse::ok(UserBody { user: auth.user }));
    }

    let user = state.repo.update_user(auth.id(), patch).await?;
    Ok(ApiResponse::with_message(UserBody { user }, "Profile updated"))
}
