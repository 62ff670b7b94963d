use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::RetentionConfig;
use crate::session::store::SessionStore;

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub completed: Vec<String>,
    pub evicted: usize,
    pub archived: usize,
}

/// Auto-complete, evict stale sessions, then archive completed ones above the cap.
pub fn run_once(store: &SessionStore, retention: &RetentionConfig) -> SweepReport {
    let completed = store.sweep_completions();
    let evicted = store.evict_stale(retention.session_timeout());
    let archived = store.archive_excess_completed(retention.max_completed_sessions);
    SweepReport {
        completed,
        evicted,
        archived,
    }
}

/// Periodic background sweep. Returns `None` when the interval is 0 (disabled).
pub fn spawn_sweeper(store: Arc<SessionStore>, retention: RetentionConfig) -> Option<JoinHandle<()>> {
    if retention.sweep_interval_secs == 0 {
        tracing::info!(target: "sweep", "background sweeper disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(retention.sweep_interval_secs));
        // first tick fires immediately; skip it so boot is quiet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = run_once(&store, &retention);
            if !report.completed.is_empty() || report.evicted > 0 || report.archived > 0 {
                tracing::info!(
                    target: "sweep",
                    completed = report.completed.len(),
                    evicted = report.evicted,
                    archived = report.archived,
                    "sweep pass"
                );
            }
        }
    }))
}
