//! Application state and route table

use axum::{
    extract::DefaultBodyLimit,
    http::Request,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    auth, conversations, documents, health, learning, memories, search, tags, users,
};
use crate::middleware::metrics::track_metrics;
use cortex_common::{
    ai::AiService,
    assistant::ReplyGenerator,
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    errors::Result,
    videos::{VideoSearch, YouTubeClient},
};
use cortex_ingestion::DocumentProcessor;

/// Headroom for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub ai: AiService,
    pub videos: Arc<dyn VideoSearch>,
    pub processor: DocumentProcessor,
    pub replies: ReplyGenerator,
}

impl AppState {
    /// Wire services from configuration over an open pool
    pub fn new(config: Arc<AppConfig>, db: DbPool) -> Result<Self> {
        let repo = Repository::new(db);
        let ai = AiService::from_config(&config.ai)?;
        let videos: Arc<dyn VideoSearch> = Arc::new(YouTubeClient::new(&config.youtube)?);

        let processor = DocumentProcessor::new(
            Arc::new(repo.clone()),
            ai.clone(),
            videos.clone(),
            config.upload.dir.clone(),
        );
        let replies = ReplyGenerator::new(Arc::new(repo.clone()), ai.clone());
        let jwt = Arc::new(JwtManager::new(
            config.jwt_secret(),
            config.auth.jwt_expiration_secs,
        ));

        match ai.active_provider() {
            Some(provider) => tracing::info!(provider = provider.name(), "AI provider selected"),
            None => tracing::warn!("No AI provider configured; summaries and replies degrade"),
        }

        Ok(Self {
            config,
            repo,
            jwt,
            ai,
            videos,
            processor,
            replies,
        })
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.upload.max_bytes + MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        // Public
        .route("/config", get(health::app_config))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        // Profile
        .route("/users/me", get(users::me).patch(users::update_me))
        // Documents
        .route(
            "/documents",
            post(documents::create_document).get(documents::list_documents),
        )
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(upload_limit),
        )
        .route("/documents/{id}", get(documents::get_document))
        .route("/documents/{id}/status", patch(documents::update_status))
        .route("/documents/{id}/archive", post(documents::archive_document))
        .route("/documents/{id}/tags", post(documents::attach_tag))
        .route("/documents/{id}/tags/{tag_id}", delete(documents::detach_tag))
        // Tags and the knowledge graph
        .route("/tags", post(tags::create_tag).get(tags::list_tags))
        .route("/tags/graph", get(tags::tag_graph))
        .route("/tags/relationships", post(tags::create_relationship))
        .route("/tags/{id}", get(tags::get_tag).patch(tags::update_tag))
        // Conversations
        .route(
            "/conversations",
            post(conversations::create_conversation).get(conversations::list_conversations),
        )
        .route("/conversations/{id}", get(conversations::get_conversation))
        .route("/conversations/{id}/messages", post(conversations::add_message))
        .route("/conversations/{id}/title", patch(conversations::rename_conversation))
        .route("/conversations/{id}/archive", post(conversations::archive_conversation))
        // Memories
        .route(
            "/memories",
            post(memories::create_memory).get(memories::list_memories),
        )
        .route("/memories/{id}", get(memories::get_memory))
        .route("/memories/{id}/deactivate", post(memories::deactivate_memory))
        // Search and learning
        .route("/search", get(search::search))
        .route("/learning/courses", get(learning::courses))
        .route("/learning/search", get(learning::search_videos))
        .route_layer(axum::middleware::from_fn(track_metrics));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(cors)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, StatusCode};
    use axum::response::Response;
    use chrono::Utc;
    use cortex_common::db::models::{Conversation, ConversationMessage, Language, MessageRole, User};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use uuid::Uuid;
    use serde_json::Value;
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    fn app(db: MockDatabase) -> Router {
        let pool = DbPool::from_connection(db.into_connection());
        let state = AppState::new(Arc::new(AppConfig::default()), pool).unwrap();
        create_router(state)
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            display_name: None,
            avatar_url: None,
            preferred_language: Language::En,
            is_active: true,
            last_login_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn bearer(state: &AppState, user: &User) -> String {
        let token = state.jwt.generate_access_token(user.id, &user.email).unwrap();
        format!("Bearer {}", token)
    }

    /// SQL the router sent, once every handle on the pool is dropped
    fn sql_log(pool: DbPool) -> Vec<String> {
        let Ok(primary) = Arc::try_unwrap(pool.primary) else {
            panic!("connection is still shared");
        };
        primary
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().to_vec())
            .map(|stmt| stmt.sql)
            .collect()
    }

    fn empty_db() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_config_reports_ai_availability() {
        let response = assert_ok!(app(empty_db()).oneshot(get_request("/api/config")).await);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({"groq_configured": false}));
    }

    #[tokio::test]
    async fn test_health_reports_database_state() {
        let connected = empty_db().append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }]);
        let body = json(app(connected).oneshot(get_request("/health")).await.unwrap()).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["database"], "connected");

        let body = json(app(empty_db()).oneshot(get_request("/health")).await.unwrap()).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["database"], "disconnected");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        for uri in ["/api/documents", "/api/users/me", "/api/search?q=x", "/api/learning/courses"] {
            let response = app(empty_db()).oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);

            let body = json(response).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["code"], "UNAUTHORIZED");
            assert_eq!(body["message"], "Authentication required");
        }
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let request = Request::builder()
            .uri("/api/tags")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();

        let response = app(empty_db()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_register_validates_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"not-an-email","password":"longenough"}"#))
            .unwrap();

        let response = app(empty_db()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "Valid email required");
    }

    #[tokio::test]
    async fn test_request_id_is_returned() {
        let response = app(empty_db()).oneshot(get_request("/api/config")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));

        let request = Request::builder()
            .uri("/api/config")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app(empty_db()).oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_user_message_without_provider_stores_one_row() {
        let user = user();
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: user.id,
            title: None,
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        };
        let stored = ConversationMessage {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            role: MessageRole::User,
            content: "What is a B-tree?".into(),
            metadata: None,
            created_at: now.into(),
        };

        let db = empty_db()
            .append_query_results([vec![user.clone()]])
            .append_query_results([vec![conversation.clone()]])
            .append_query_results([vec![stored.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let pool = DbPool::from_connection(db.into_connection());
        let state = AppState::new(Arc::new(AppConfig::default()), pool.clone()).unwrap();
        let auth = bearer(&state, &user);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/conversations/{}/messages", conversation.id))
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"role":"user","content":"What is a B-tree?"}"#))
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json(response).await;
        assert_eq!(body["message"], "Message added; no assistant reply was generated");
        assert_eq!(body["data"]["message"]["role"], "user");
        assert_eq!(body["data"]["message"]["content"], "What is a B-tree?");
        assert!(body["data"].get("assistantMessage").is_none(), "{}", body);

        let log = sql_log(pool);
        let inserts = log
            .iter()
            .filter(|sql| sql.starts_with(r#"INSERT INTO "conversation_messages""#))
            .count();
        assert_eq!(inserts, 1);
    }

    #[tokio::test]
    async fn test_failed_upload_row_removes_stored_file() {
        let user = user();
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.upload.dir = dir.path().to_path_buf();

        // The user lookup succeeds; the document insert finds no result
        let db = empty_db().append_query_results([vec![user.clone()]]);
        let pool = DbPool::from_connection(db.into_connection());
        let state = AppState::new(Arc::new(config), pool.clone()).unwrap();
        let auth = bearer(&state, &user);

        let boundary = "cortexboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello world\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/documents/upload")
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert!(response.status().is_server_error(), "{}", response.status());

        let log = sql_log(pool);
        assert!(log.iter().any(|sql| sql.starts_with(r#"INSERT INTO "documents""#)));

        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(left.is_empty(), "{:?}", left);
    }
}
