//! JSON HTTP API over the prayer-time engine.

mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

pub use handlers::ApiError;
pub use state::{AppState, ComputeCache};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/times", get(handlers::prayer_times))
        .route("/api/next", get(handlers::next_prayer))
        .route("/api/hijri", get(handlers::hijri_date))
        .route("/api/holidays", get(handlers::upcoming_holidays))
        .route("/api/methods", get(handlers::methods))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn start(host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(Arc::new(AppState::new()));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "miqat server listening");
    eprintln!("  miqat server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_router_builds_with_shared_state() {
        let state = Arc::new(AppState::new());
        let _router = build_router(state.clone());
        assert!(Arc::strong_count(&state) >= 2);
        assert!(state.cache.lock().unwrap().is_empty());
    }
}
