//! Process settings resolved once at startup.
//!
//! Both runners (`tt-run` and the standalone `tt-api-rest`) build their state through here so the
//! environment is read in exactly one place.

use anyhow::Context;
use axum::http::HeaderValue;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tt_core::{CoreConfig, DocumentStore, FileStore, MemoryStore};

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_FILE: &str = "therapisttrack.log";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingMethod {
    /// Human-readable lines on stdout.
    Console,
    /// Human-readable lines appended to a file.
    File(PathBuf),
    /// JSON lines on stdout.
    Json,
}

/// `CONSOLE` and `FILE` select those outputs; anything else, including unset, means JSON.
pub fn logging_method_from_env_values(method: Option<String>, file: Option<String>) -> LoggingMethod {
    match method.as_deref().map(str::trim) {
        Some(m) if m.eq_ignore_ascii_case("CONSOLE") => LoggingMethod::Console,
        Some(m) if m.eq_ignore_ascii_case("FILE") => LoggingMethod::File(
            file.filter(|f| !f.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        ),
        _ => LoggingMethod::Json,
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` is honoured; `default_directive` is added on top of it.
///
/// # Errors
///
/// Fails if the directive does not parse, the log file cannot be opened or a subscriber is
/// already installed.
pub fn init_logging(method: &LoggingMethod, default_directive: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(default_directive.parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    match method {
        LoggingMethod::Console => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LoggingMethod::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .try_init()?
        }
        LoggingMethod::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }

    Ok(())
}

/// Everything the REST runners read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rest_addr: String,
    /// `None` means any origin.
    pub allowed_origins: Option<Vec<String>>,
    pub logging: LoggingMethod,
    pub core: CoreConfig,
}

impl Settings {
    /// Reads settings from the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str| std::env::var(name).ok();

        let core = CoreConfig::from_env_values(&var)?;

        Ok(Self {
            rest_addr: var("TT_REST_ADDR").unwrap_or_else(|| DEFAULT_REST_ADDR.into()),
            allowed_origins: allowed_origins_from_env_value(var("ALLOWED_ORIGINS")),
            logging: logging_method_from_env_values(var("LOGGING_METHOD"), var("LOGGING_FILE_PATH")),
            core,
        })
    }
}

/// Splits a comma separated origin list. Unset or blank means any origin.
pub fn allowed_origins_from_env_value(value: Option<String>) -> Option<Vec<String>> {
    let origins: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_owned)
        .collect();
    (!origins.is_empty()).then_some(origins)
}

/// CORS layer for the configured origins.
pub fn cors_layer(allowed_origins: Option<&[String]>) -> anyhow::Result<CorsLayer> {
    let Some(origins) = allowed_origins else {
        return Ok(CorsLayer::permissive());
    };
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid origin {o}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// File store under `data_dir` when configured, otherwise an in-memory store.
pub fn build_store(cfg: &CoreConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match cfg.data_dir() {
        Some(dir) => {
            let store = FileStore::open(dir)
                .with_context(|| format!("failed to open data directory {}", dir.display()))?;
            tracing::info!(data_dir = %dir.display(), "using file store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("TT_DATA_DIR not set; data is kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
