use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use std::sync::Arc;
use anyhow::{anyhow, Result};
use log::{debug, info};
use tokio::net::TcpListener;

use crate::buddy::Buddy;
use crate::state::BuddyReader;

// API state that will be shared across handlers
pub struct ApiState {
    pub buddy: BuddyReader,
}

// Current on-call buddy, never waits on a running watch cycle
async fn buddy_handler(
    State(state): State<Arc<ApiState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Buddy> {
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    debug!("Served http request: {} {} {}", method, uri, user_agent);
    Json(state.buddy.snapshot())
}

// Health check endpoint
async fn health_check() -> &'static str {
    "oncall-buddy-finder is running"
}

pub fn router(buddy: BuddyReader) -> Router {
    let state = Arc::new(ApiState { buddy });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health_check))
        .route("/buddy", get(buddy_handler))
        .layer(cors)
        .with_state(state)
}

/// Serves the status endpoints on an already bound listener.
pub async fn serve(listener: TcpListener, buddy: BuddyReader) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Status endpoint available at http://{}/buddy", addr);

    axum::serve(listener, router(buddy)).await
        .map_err(|e| anyhow!("Status server failed: {}", e))
}
