//! HTTP surface for the embedding front-end and the CMS webhook.
//!
//! # Endpoints
//!
//! | Method | Path | Token action | Description |
//! |--------|------|--------------|-------------|
//! | `POST` | `/search` | `search` | Autocomplete over the content mirror |
//! | `POST` | `/chat` | `chat` | Conversational Q&A (sanitized answer + sources) |
//! | `POST` | `/events` | `events` | CMS lifecycle webhook (best-effort sync) |
//! | `POST` | `/backfill` | `backfill` | One page of bulk backfill |
//! | `GET`  | `/health` | — | Health check (returns version) |
//!
//! # Request tokens
//!
//! Every POST carries a per-action anti-forgery token: the hex HMAC-SHA256
//! of the action name under `[server].secret`. `cbr token <action>` prints
//! the value a front-end should embed. Verification is constant-time.
//!
//! # Error contract
//!
//! Failures answer with `{ "message": "..." }` and an appropriate status.
//! Configuration errors surface a fixed message with no internal detail.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::gemini::{FileSearchProvider, GeminiClient, ProviderError};
use crate::models::{Answer, BackfillReport, ChatMessage, Source, SyncEvent};
use crate::sanitize::sanitize_answer;
use crate::search;
use crate::settings::SettingsStore;
use crate::sync::{ItemLocks, SyncEngine};
use crate::{db, migrate};

type HmacSha256 = Hmac<Sha256>;

/// Per-action anti-forgery token: hex HMAC-SHA256 of the action name.
pub fn action_token(secret: &str, action: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(action.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time token check.
pub fn verify_token(secret: &str, action: &str, token: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(action.as_bytes());
    match hex::decode(token) {
        Ok(bytes) => mac.verify_slice(&bytes).is_ok(),
        Err(_) => false,
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    settings: SettingsStore,
    /// One lock map for the process so per-item serialization holds
    /// across requests.
    locks: ItemLocks,
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    let settings = SettingsStore::new(pool.clone());
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        settings,
        locks: ItemLocks::default(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", post(handle_search))
        .route("/chat", post(handle_chat))
        .route("/events", post(handle_event))
        .route("/backfill", post(handle_backfill))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("corpus-bridge listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error body: `{ "message": "..." }`.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn forbidden() -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        message: "invalid token".to_string(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

/// Map provider failures onto the HTTP contract. Configuration errors
/// keep their fixed message; everything else carries the provider detail
/// (these endpoints are only reachable with a valid token).
fn provider_error(err: ProviderError) -> AppError {
    match err {
        ProviderError::Configuration => bad_request(err.to_string()),
        ProviderError::Validation(msg) => bad_request(msg),
        ProviderError::Transport(_)
        | ProviderError::Upstream { .. }
        | ProviderError::InvalidResponse(_) => AppError {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        },
    }
}

fn check_token(state: &AppState, action: &str, token: &str) -> Result<(), AppError> {
    if verify_token(&state.config.server.secret, action, token) {
        Ok(())
    } else {
        Err(forbidden())
    }
}

async fn sync_engine(state: &AppState) -> Result<SyncEngine, AppError> {
    let provider: Arc<dyn FileSearchProvider> = Arc::new(
        GeminiClient::from_settings(&state.config, &state.settings)
            .await
            .map_err(|e| internal(e.to_string()))?,
    );
    Ok(SyncEngine::with_locks(
        state.pool.clone(),
        state.settings.clone(),
        provider,
        state.config.sync.page_size,
        state.locks.clone(),
    ))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    token: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<Source>>, AppError> {
    check_token(&state, "search", &req.token)?;

    let results = search::autocomplete(&state.pool, &state.settings, &req.query)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(results))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    messages: Vec<RawMessage>,
    token: String,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Answer>, AppError> {
    check_token(&state, "chat", &req.token)?;

    if req.messages.is_empty() {
        return Err(bad_request("No messages provided"));
    }

    let messages: Vec<ChatMessage> = req
        .messages
        .iter()
        .map(|m| ChatMessage::coerced(&m.role, &m.content))
        .collect();

    let client = GeminiClient::from_settings(&state.config, &state.settings)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let mut answer = client.generate(&messages).await.map_err(provider_error)?;
    answer.answer = sanitize_answer(&answer.answer);

    Ok(Json(answer))
}

// ============ POST /events ============

#[derive(Deserialize)]
struct EventRequest {
    token: String,
    #[serde(flatten)]
    event: SyncEvent,
}

#[derive(Serialize)]
struct EventResponse {
    status: String,
}

/// Best-effort webhook: the CMS operation behind the event must never be
/// blocked, so sync failures are swallowed after a valid payload is
/// accepted.
async fn handle_event(
    State(state): State<AppState>,
    Json(req): Json<EventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    check_token(&state, "events", &req.token)?;

    let engine = sync_engine(&state).await?;
    engine.handle_event(req.event).await;

    Ok(Json(EventResponse {
        status: "accepted".to_string(),
    }))
}

// ============ POST /backfill ============

#[derive(Deserialize)]
struct BackfillRequest {
    #[serde(default = "default_page")]
    page: i64,
    token: String,
}

fn default_page() -> i64 {
    1
}

async fn handle_backfill(
    State(state): State<AppState>,
    Json(req): Json<BackfillRequest>,
) -> Result<Json<BackfillReport>, AppError> {
    check_token(&state, "backfill", &req.token)?;

    let engine = sync_engine(&state).await?;
    let report = engine
        .run_backfill(req.page)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(report))
}
