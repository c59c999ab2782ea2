//! HTTP API.
//!
//! ## Endpoints
//!
//! - `POST /api/ask` - Ask the agent a question
//! - `GET /health` - Readiness and configured model
//!
//! Any other path is served from the static frontend directory when it exists.

mod routes;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::agent::Agent;
use crate::config::Config;

pub use routes::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>, frontend_dir: &Path) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/ask", post(routes::ask))
        .with_state(state);

    if frontend_dir.is_dir() {
        tracing::info!("Serving frontend from {}", frontend_dir.display());
        app = app.fallback_service(ServeDir::new(frontend_dir));
    } else {
        tracing::warn!("Frontend directory not found at {}", frontend_dir.display());
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Initializing agent in workspace {}",
        config.workspace_dir.display()
    );

    let agent = match Agent::from_config(&config) {
        Ok(agent) => Some(Arc::new(agent)),
        Err(e) => {
            tracing::error!("Failed to initialize agent: {}", e);
            None
        }
    };

    let state = Arc::new(AppState {
        agent,
        model: config.model_name.clone(),
    });
    let app = router(state, &config.frontend_dir);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
