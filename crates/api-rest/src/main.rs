//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server (with OpenAPI/Swagger
//! UI). The workspace's main `tt-run` binary also runs the orphan reconciliation loop.

use api_rest::settings::{build_store, cors_layer, init_logging, Settings};
use api_rest::{router, AppState};
use std::sync::Arc;
use tt_core::ValidationRules;

/// Main entry point for the TherapistTrack REST API server
///
/// # Environment Variables
/// - `TT_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `TT_DATA_DIR`: File store root; unset keeps data in memory
/// - `LOGGING_METHOD`: `CONSOLE`, `FILE` or anything else for JSON
///
/// # Errors
/// Returns an error if:
/// - the settings or logging configuration cannot be resolved,
/// - the store cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    init_logging(&settings.logging, "api_rest=info")?;

    tracing::info!("-- Starting TherapistTrack REST API on {}", settings.rest_addr);

    let store = build_store(&settings.core)?;
    let state = AppState::new(
        store,
        Arc::new(settings.core.clone()),
        Arc::new(ValidationRules::default()),
    );
    let app = router(state, cors_layer(settings.allowed_origins.as_deref())?);

    let listener = tokio::net::TcpListener::bind(&settings.rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
