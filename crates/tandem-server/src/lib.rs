//! Tandem Web Server
//!
//! Axum-based REST API for the Tandem insight engine.
//!
//! Security features:
//! - API key authentication (secure by default, use --no-auth for local dev)
//! - Caller identity from the `x-user-id` header set by the upstream gateway
//! - Restrictive CORS policy
//! - Audit logging for all dataset access
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tandem_core::ai::{AIBackend, AIClient, AiInsightGenerator};
use tandem_core::db::Database;
use tandem_core::{InsightOrchestrator, InsightSettings, ModelRouter, PromptLibrary};

mod handlers;

/// Header carrying the authenticated caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Maximum audit log page size
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether an API key is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

impl ServerConfig {
    /// Read `TANDEM_API_KEYS` and `TANDEM_ALLOWED_ORIGINS` (comma-separated)
    pub fn from_env() -> Self {
        Self {
            api_keys: split_list(std::env::var("TANDEM_API_KEYS").ok().as_deref()),
            allowed_origins: split_list(std::env::var("TANDEM_ALLOWED_ORIGINS").ok().as_deref()),
            ..Self::default()
        }
    }
}

fn split_list(input: Option<&str>) -> Vec<String> {
    input
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub orchestrator: InsightOrchestrator,
    pub config: ServerConfig,
}

impl AppState {
    /// State whose orchestrator reads datasets from `db`
    pub fn new(db: Database, orchestrator: InsightOrchestrator, config: ServerConfig) -> Self {
        Self {
            db,
            orchestrator,
            config,
        }
    }
}

/// Build the orchestrator from environment configuration
///
/// AI generation is attached only when `AIClient::from_env()` finds a backend;
/// whether it is used per request still depends on `TANDEM_AI_ENABLED` and
/// each dataset's AI settings.
pub fn orchestrator_from_env(db: &Database) -> InsightOrchestrator {
    let settings = InsightSettings::from_env();
    let mut orchestrator = InsightOrchestrator::new(Arc::new(db.clone()), settings);

    match AIClient::from_env() {
        Some(client) => {
            let router = ModelRouter::new().unwrap_or_else(|e| {
                warn!(error = %e, "Invalid model config, using defaults");
                ModelRouter::default()
            });
            info!(
                "AI backend configured: {} (model: {}, enabled: {})",
                client.host(),
                client.model(),
                settings.ai_enabled
            );
            orchestrator = orchestrator.with_ai(
                AiInsightGenerator::new(client)
                    .with_router(router)
                    .with_prompts(PromptLibrary::new()),
            );
        }
        None => {
            info!("ℹ️  AI backend not configured (set OPENAI_COMPATIBLE_HOST to enable AI insights)");
        }
    }

    orchestrator
}

/// Authentication middleware - validates API keys
///
/// API keys are compared in constant time.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid API key");
    AppError::unauthorized("Authentication required").into_response()
}

/// Validate an API key using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Caller's user id from the `x-user-id` header
pub fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("Missing user identity"))
}

/// Run a blocking database call off the async runtime
pub(crate) async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> tandem_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    Ok(tokio::task::spawn_blocking(move || f(&db)).await??)
}

/// Record an audit entry after the response is already computed
///
/// A failed write is logged and does not fail the request.
pub(crate) async fn audit_or_warn<T, F>(state: &AppState, action: &'static str, f: F)
where
    F: FnOnce(&Database) -> tandem_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    match tokio::task::spawn_blocking(move || f(&db)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(action, error = %e, "Failed to write audit entry"),
        Err(e) => warn!(action, error = %e, "Audit task failed"),
    }
}

/// Create the application router with state built from the environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let orchestrator = orchestrator_from_env(&db);
    create_router_with_state(Arc::new(AppState::new(db, orchestrator, config)))
}

/// Create the application router around existing state
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/me", get(handlers::get_me))
        .route("/datasets", get(handlers::list_datasets))
        .route("/datasets/:id", get(handlers::get_dataset))
        .route("/datasets/:id/insights", get(handlers::get_insights))
        .route(
            "/datasets/:id/insights/cache",
            delete(handlers::invalidate_insights),
        )
        .route("/datasets/:id/summary", get(handlers::get_summary))
        .route("/audit", get(handlers::list_audit_log))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Health stays reachable without credentials
    let public_routes = Router::new().route("/health", get(handlers::health));

    let cors = if state.config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::HeaderName::from_static(USER_ID_HEADER),
            ])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::HeaderName::from_static(USER_ID_HEADER),
            ])
    };

    Router::new()
        .nest("/api", api_routes.merge(public_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!("⚠️  No API keys configured (TANDEM_API_KEYS); every API request will be rejected");
    }

    let orchestrator = orchestrator_from_env(&db);
    check_ai_connection(&orchestrator).await;

    let app = create_router_with_state(Arc::new(AppState::new(db, orchestrator, config)));
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(orchestrator: &InsightOrchestrator) {
    let Some(ai) = orchestrator.ai() else {
        return;
    };
    let client = ai.client();
    if client.health_check().await {
        info!("✅ AI backend connected: {} ({})", client.host(), client.model());
    } else {
        warn!(
            "⚠️  AI backend configured but not responding: {} (insights will use the rule engine)",
            client.host()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn unavailable(msg: &str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            internal: Some(err.into()),
        }
    }

    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<tandem_core::Error> for AppError {
    fn from(err: tandem_core::Error) -> Self {
        use tandem_core::Error;

        match err {
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::InvalidData(msg) => Self::bad_request(&msg),
            Error::AiUnavailable(msg) => Self::unavailable(&msg),
            other => Self::internal(other),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(err)
    }
}

#[cfg(test)]
mod tests;
