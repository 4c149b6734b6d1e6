//! Learning videos

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::extract::ValidQuery;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use cortex_common::{
    errors::{AppError, Result},
    videos::VideoDescriptor,
};

#[derive(Debug, Deserialize, Validate)]
pub struct TopicQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct CoursesBody {
    pub courses: Vec<VideoDescriptor>,
}

#[derive(Serialize)]
pub struct VideosBody {
    pub videos: Vec<VideoDescriptor>,
}

/// Computer-science courses across the fixed course queries
pub async fn courses(State(state): State<AppState>, _auth: AuthUser) -> Json<ApiResponse<CoursesBody>> {
    let courses = state.videos.cse_courses().await;
    ApiResponse::ok(CoursesBody { courses })
}

/// Videos for a caller-supplied topic
pub async fn search_videos(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidQuery(query): ValidQuery<TopicQuery>,
) -> Result<Json<ApiResponse<VideosBody>>> {
    let topic = query.q.trim();
    if topic.is_empty() {
        return Err(AppError::Validation {
            message: "Query required".to_string(),
            field: Some("q".to_string()),
        });
    }

    let videos = state.videos.learning_videos(topic).await;
    Ok(ApiResponse::ok(VideosBody { videos }))
}
