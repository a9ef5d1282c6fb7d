use api_rest::settings::{build_store, cors_layer, init_logging, Settings};
use api_rest::{router, AppState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tt_core::{CompensationPolicy, UserService, ValidationRules};

/// Floor for the reconciliation interval so a zero grace period does not spin.
const MIN_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Main entry point for the TherapistTrack backend
///
/// Starts the REST server and, when provisioning leaves partial users for reconciliation, a
/// background loop that repairs them once per grace period.
///
/// # Environment Variables
/// - `TT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `TT_DATA_DIR`: file store root; unset keeps data in memory
/// - `TT_COMPENSATION_POLICY`, `TT_TEMPLATE_NAME_SCOPE`, `TT_DOCTOR_REFERENCE_CHECK`,
///   `TT_ORPHAN_GRACE_SECONDS`: engine behaviour
/// - `ALLOWED_ORIGINS`, `LOGGING_METHOD`, `LOGGING_FILE_PATH`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    init_logging(&settings.logging, "info")?;

    tracing::info!("++ Starting TherapistTrack REST on {}", settings.rest_addr);

    let cfg = Arc::new(settings.core.clone());
    let store = build_store(&cfg)?;
    let state = AppState::new(
        store,
        cfg.clone(),
        Arc::new(ValidationRules::default()),
    );

    if cfg.compensation_policy() == CompensationPolicy::LeaveForReconciliation {
        let interval = cfg
            .orphan_grace_period()
            .to_std()
            .unwrap_or(MIN_RECONCILE_INTERVAL)
            .max(MIN_RECONCILE_INTERVAL);
        tokio::spawn(reconcile_loop(state.users.clone(), interval));
    }

    let app = router(state, cors_layer(settings.allowed_origins.as_deref())?);
    let listener = tokio::net::TcpListener::bind(&settings.rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Repairs orphaned users every `every`. Failures are logged and retried on the next tick.
async fn reconcile_loop(users: UserService, every: Duration) {
    tracing::info!(interval_secs = every.as_secs(), "orphan reconciliation enabled");
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let users = users.clone();
        match tokio::task::spawn_blocking(move || users.reconcile_orphans(Utc::now())).await {
            Ok(Ok(report)) if report.backfilled.is_empty() && report.removed.is_empty() => {}
            Ok(Ok(report)) => tracing::info!(
                backfilled = report.backfilled.len(),
                removed = report.removed.len(),
                "orphan reconciliation pass"
            ),
            Ok(Err(e)) => tracing::error!(error = ?e, "orphan reconciliation failed"),
            Err(e) => tracing::error!(error = %e, "orphan reconciliation task failed"),
        }
    }
}
