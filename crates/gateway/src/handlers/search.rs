//! Document search

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::extract::ValidQuery;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use cortex_common::{
    db::{SearchHit, SearchMode},
    errors::Result,
};

pub const DEFAULT_SEARCH_LIMIT: u64 = 20;
pub const MAX_SEARCH_LIMIT: u64 = 50;

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,

    #[serde(default)]
    pub mode: SearchMode,

    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    /// Mode as requested; every mode runs the keyword match
    pub mode: SearchMode,
}

pub async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<SearchQuery>,
) -> Result<Json<ApiResponse<SearchResults>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let results = state
        .repo
        .search_documents(auth.id(), &query.q, query.mode, limit)
        .await?;

    Ok(ApiResponse::ok(SearchResults {
        results,
        mode: query.mode,
    }))
}
