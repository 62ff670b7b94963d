// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod analyze;
pub mod api;
pub mod compliance;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod persona;
pub mod session;

use std::sync::Arc;

use shuttle_axum::axum::Router;
use tracing::{info, warn};

pub use crate::analyze::ai_adapter;
pub use crate::api::{router, AppState};
pub use crate::config::{AiConfig, EngineConfig};
pub use crate::engine::{Engine, InboundTurn, TurnOutcome, TurnStatus};
pub use crate::error::EngineError;

use crate::notify::{HttpReportSink, ReportDispatcher, ReportSink, RetryPolicy};
use crate::session::{sweeper, SessionStore};

/// Inbound key for `/chat` and `/admin/*`; unset accepts any non-empty key.
pub const ENV_INBOUND_API_KEY: &str = "HONEYPOT_API_KEY";

/// Wire store, advisors, reporting, sweeper and router. Must run inside a
/// Tokio runtime (spawns the report worker and the sweeper).
pub fn app(config: EngineConfig, ai: &AiConfig) -> anyhow::Result<Router> {
    let store = Arc::new(SessionStore::new(config.completion.clone()));
    let advisors = ai_adapter::build_advisors(ai);
    info!(
        scam = advisors.scam.provider_name(),
        reply = advisors.reply.provider_name(),
        "advisors ready"
    );

    let sink: Option<Arc<dyn ReportSink>> = config.reporting.callback_url.as_ref().map(|url| {
        Arc::new(
            HttpReportSink::new(url.clone(), config.reporting.api_key.clone())
                .with_timeout(config.reporting.request_timeout_secs),
        ) as Arc<dyn ReportSink>
    });
    if sink.is_none() {
        warn!("no report callback configured; completed sessions will not be reported");
    }
    let (dispatcher, _worker) = ReportDispatcher::start(
        sink,
        RetryPolicy::from_config(&config.reporting),
        config.scoring.report_threshold,
    );
    store.register_observer(dispatcher);
    let _sweeper = sweeper::spawn_sweeper(store.clone(), config.retention.clone());

    let engine = Arc::new(Engine::new(config, store, advisors));
    let mut state = AppState::new(engine).with_api_key(std::env::var(ENV_INBOUND_API_KEY).ok());
    match metrics::Metrics::init() {
        Ok(m) => state = state.with_metrics(m),
        Err(e) => warn!(error = %e, "prometheus recorder unavailable; /metrics disabled"),
    }
    Ok(api::router(state))
}

/// Load both configs from their default locations (or env overrides) and build the app.
pub fn app_from_env() -> anyhow::Result<Router> {
    let config = EngineConfig::load()?;
    let ai = AiConfig::load()?;
    app(config, &ai)
}
