//! HTTP server: Axum router, shared state, trigger token guard.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use callhook_core::config::GatewayConfig;
use callhook_scheduler::{NotificationDispatcher, ReaperEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header a trigger caller presents when `gateway.auth_token` is set.
pub const TOKEN_HEADER: &str = "X-Callhook-Token";

/// Shared state for the gateway.
pub struct AppState {
    pub dispatcher: Arc<NotificationDispatcher>,
    pub reapers: Arc<ReaperEngine>,
    /// None = every route is open.
    pub auth_token: Option<String>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        reapers: Arc<ReaperEngine>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            dispatcher,
            reapers,
            auth_token,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Token guard for trigger routes.
async fn require_token(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let Some(expected) = &state.auth_token else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented == expected {
        return next.run(req).await;
    }

    tracing::warn!("🔒 Rejected {} {}: bad or missing trigger token", req.method(), req.uri().path());
    (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({"ok": false, "error": "Unauthorized: invalid or missing trigger token"})),
    )
        .into_response()
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    build_router_from_arc(Arc::new(state))
}

pub fn build_router_from_arc(shared: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/events/notifications", post(super::routes::notification_created))
        .route("/tasks/sweep/{name}", post(super::routes::run_sweep))
        .route("/api/v1/status", get(super::routes::status))
        .route_layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            require_token,
        ));

    // Public: liveness probe only
    let public = Router::new().route("/health", get(super::routes::health_check));

    protected
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    if state.auth_token.is_none() {
        tracing::warn!("⚠️ gateway.auth_token is not set; trigger routes are open");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Callhook gateway listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
