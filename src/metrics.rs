use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use shuttle_axum::axum::{routing::get, Router};

// The recorder is process-global; install it at most once.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (idempotent) and describe the counters.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// `/metrics` in Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    use metrics::describe_counter;
    describe_counter!("sessions_created_total", "Sessions created");
    describe_counter!("sessions_completed_total", "Completion transitions by trigger");
    describe_counter!("sessions_evicted_total", "Stale sessions evicted");
    describe_counter!("sessions_archived_total", "Completed sessions archived above the cap");
    describe_counter!("turns_total", "Inbound adversary turns processed");
    describe_counter!("advisory_fallback_total", "Advisory calls replaced by local fallback");
    describe_counter!("compliance_violations_total", "Refused inbound messages and replaced replies, by side");
    describe_counter!("reports_sent_total", "Reports acknowledged by the sink");
    describe_counter!("reports_failed_total", "Reports abandoned after retries");
    describe_counter!("reports_skipped_total", "Completed sessions not reported, by reason");
}
