//! Honeypot engagement service: binary entrypoint.
//! Boots the axum router with the session store, reporting worker and sweeper.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Events carry these targets rather than module paths.
const DEFAULT_LOG_FILTER: &str =
    "warn,turn=info,session=info,advisory=info,report=info,sweep=info,honeypot_engine=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Json,
}

fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || std::env::var("SHUTTLE_ENV").is_ok_and(|env| {
            matches!(
                env.to_ascii_lowercase().as_str(),
                "local" | "development" | "dev"
            )
        })
}

/// `HONEYPOT_LOG=json` works everywhere; `compact` (or `1`) only in a dev
/// environment. Anything else leaves logging to the platform.
fn log_format() -> Option<LogFormat> {
    let mode = std::env::var("HONEYPOT_LOG").ok()?;
    match mode.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "compact" | "1" if is_dev_env() => Some(LogFormat::Compact),
        _ => None,
    }
}

fn init_logging() {
    let Some(format) = log_format() else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
    };
    // a subscriber installed by the runtime wins
    if installed.is_ok() {
        tracing::info!(target: "session", ?format, "logging enabled");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // .env is optional; production sets real env vars
    let _ = dotenvy::dotenv();

    init_logging();

    let router = honeypot_engine::app_from_env()
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("booting honeypot engine")))?;

    Ok(router.into())
}
