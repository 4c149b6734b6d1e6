//! Learning video lookup (YouTube Data API v3)
//!
//! All lookups are best-effort: an unconfigured key or a failing request
//! yields an empty list, never an error to the caller.

use crate::config::YouTubeConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fixed queries behind the learning courses page
pub const CSE_COURSE_QUERIES: &[&str] = &[
    "CSE full course computer science engineering",
    "computer science engineering tutorial for beginners",
    "data structures and algorithms course",
    "programming fundamentals full course",
];

/// Words of the topic kept in a derived query
const QUERY_TERMS: usize = 4;

/// A related learning video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub url: String,
}

/// Turn a summary or topic into an educational search query
pub fn build_search_query(topic: &str) -> String {
    let head: String = topic.chars().take(200).collect();
    let words: Vec<&str> = head.split_whitespace().take(QUERY_TERMS).collect();
    if words.is_empty() {
        "learning tutorial".to_string()
    } else {
        format!("{} learn tutorial", words.join(" "))
    }
}

/// Video search backend
#[async_trait]
pub trait VideoSearch: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Run one raw search query
    async fn search(&self, query: &str) -> Result<Vec<VideoDescriptor>>;

    /// Videos related to a document summary or user topic
    async fn learning_videos(&self, topic: &str) -> Vec<VideoDescriptor> {
        if !self.is_configured() {
            return Vec::new();
        }
        match self.search(&build_search_query(topic)).await {
            Ok(videos) => videos,
            Err(e) => {
                tracing::warn!(error = %e, "Video search failed");
                Vec::new()
            }
        }
    }

    /// Computer-science courses across the fixed queries, deduplicated
    async fn cse_courses(&self) -> Vec<VideoDescriptor> {
        if !self.is_configured() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut courses = Vec::new();
        for query in CSE_COURSE_QUERIES {
            match self.search(query).await {
                Ok(videos) => courses.extend(
                    videos
                        .into_iter()
                        .filter(|v| seen.insert(v.video_id.clone())),
                ),
                Err(e) => tracing::warn!(query, error = %e, "Course query failed, skipping"),
            }
        }
        courses
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<ItemId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    kind: Option<String>,
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_title: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

impl SearchItem {
    fn into_descriptor(self) -> Option<VideoDescriptor> {
        let id = self.id?;
        if id.kind.as_deref() != Some("youtube#video") {
            return None;
        }
        let video_id = id.video_id.filter(|v| !v.is_empty())?;

        let snippet = self.snippet;
        let thumbnail_url = snippet
            .as_ref()
            .and_then(|s| s.thumbnails.as_ref())
            .and_then(|t| {
                t.medium
                    .as_ref()
                    .and_then(|m| m.url.clone())
                    .or_else(|| t.default.as_ref().and_then(|d| d.url.clone()))
            })
            .unwrap_or_default();
        let (title, channel_title) = match snippet {
            Some(s) => (
                s.title.unwrap_or_else(|| "Video".to_string()),
                s.channel_title.unwrap_or_default(),
            ),
            None => ("Video".to_string(), String::new()),
        };

        Some(VideoDescriptor {
            url: format!("https://www.youtube.com/watch?v={}", video_id),
            video_id,
            title,
            channel_title,
            thumbnail_url,
        })
    }
}

/// YouTube Data API client
pub struct YouTubeClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    max_results: u32,
}

impl YouTubeClient {
    pub fn new(config: &YouTubeConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("cortex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build YouTube HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str) -> Result<Vec<VideoDescriptor>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::Configuration {
            message: "YouTube API key is not set".to_string(),
        })?;
        let max_results = self.max_results.to_string();

        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
                ("safeSearch", "moderate"),
                ("relevanceLanguage", "en"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                provider: "YouTube".to_string(),
                message: format!("API returned {}: {}", status, body),
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .filter_map(SearchItem::into_descriptor)
            .collect())
    }
}
