//! Reporting dispatcher: completion observer -> queue -> worker -> sink.
//!
//! Completion only enqueues; a background worker drains the queue and runs each
//! delivery in its own task with bounded exponential backoff. Permanent failure
//! is logged for manual follow-up and never touches session state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::report::ReportBundle;
use super::sink::ReportSink;
use crate::config::ReportingConfig;
use crate::error::EngineError;
use crate::model::Session;
use crate::session::{CompletionEvent, CompletionObserver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(4_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &ReportingConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
        }
    }

    /// Wait after the given failed attempt (1-based): base, 2*base, 4*base... capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Why a completed session was not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LowConfidence,
    NoIntelligence,
    NoSink,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::LowConfidence => "low_confidence",
            SkipReason::NoIntelligence => "no_intelligence",
            SkipReason::NoSink => "no_sink",
        }
    }
}

/// Confidence must exceed the report threshold and the bundle must be non-empty.
pub fn eligibility(snapshot: &Session, report_threshold: f32) -> Result<(), SkipReason> {
    if snapshot.scam_confidence <= report_threshold {
        return Err(SkipReason::LowConfidence);
    }
    if snapshot.intelligence.is_empty() {
        return Err(SkipReason::NoIntelligence);
    }
    Ok(())
}

/// One delivery with retries. Returns the number of attempts used on success.
pub async fn deliver_with_retry(
    sink: &dyn ReportSink,
    report: &ReportBundle,
    policy: RetryPolicy,
) -> Result<u32, EngineError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match sink.deliver(report).await {
            Ok(()) => return Ok(attempt),
            Err(e) => {
                if attempt < policy.max_attempts {
                    let wait = policy.delay_after(attempt);
                    warn!(
                        target: "report",
                        session_id = %report.session_id,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %format!("{e:#}"),
                        "report delivery failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(EngineError::ReportingFailure {
                    session_id: report.session_id.clone(),
                    attempts: attempt,
                    message: format!("{e:#}"),
                });
            }
        }
    }
}

/// Completion observer that turns eligible completions into queued reports.
pub struct ReportDispatcher {
    tx: Option<mpsc::UnboundedSender<ReportBundle>>,
    report_threshold: f32,
}

impl ReportDispatcher {
    /// Start the worker. With no sink, every completion is logged as skipped.
    pub fn start(
        sink: Option<Arc<dyn ReportSink>>,
        policy: RetryPolicy,
        report_threshold: f32,
    ) -> (Arc<Self>, Option<JoinHandle<()>>) {
        match sink {
            Some(sink) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let handle = spawn_worker(rx, sink, policy);
                (
                    Arc::new(Self {
                        tx: Some(tx),
                        report_threshold,
                    }),
                    Some(handle),
                )
            }
            None => (
                Arc::new(Self {
                    tx: None,
                    report_threshold,
                }),
                None,
            ),
        }
    }

    fn skip(&self, session_id: &str, reason: SkipReason) {
        info!(target: "report", session_id = %session_id, reason = reason.as_str(), "report skipped");
        metrics::counter!("reports_skipped_total", "reason" => reason.as_str()).increment(1);
    }
}

impl CompletionObserver for ReportDispatcher {
    fn on_complete(&self, event: &CompletionEvent) {
        let snapshot = &event.snapshot;
        if let Err(reason) = eligibility(snapshot, self.report_threshold) {
            self.skip(&snapshot.id, reason);
            return;
        }
        let Some(tx) = &self.tx else {
            self.skip(&snapshot.id, SkipReason::NoSink);
            return;
        };
        let report = ReportBundle::from_session(snapshot, self.report_threshold);
        debug!(target: "report", session_id = %snapshot.id, "report queued");
        if tx.send(report).is_err() {
            error!(target: "report", session_id = %snapshot.id, "report worker gone; report dropped");
            metrics::counter!("reports_failed_total").increment(1);
        }
    }
}

/// Drain the queue; each job runs in its own task so one slow sink call does
/// not delay the others.
pub fn spawn_worker(
    mut rx: mpsc::UnboundedReceiver<ReportBundle>,
    sink: Arc<dyn ReportSink>,
    policy: RetryPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            let sink = sink.clone();
            tokio::spawn(async move {
                match deliver_with_retry(sink.as_ref(), &report, policy).await {
                    Ok(attempts) => {
                        info!(target: "report", session_id = %report.session_id, attempts, sink = sink.name(), "report delivered");
                        metrics::counter!("reports_sent_total").increment(1);
                    }
                    Err(e) => {
                        error!(target: "report", session_id = %report.session_id, code = e.code(), error = %e, "report delivery gave up");
                        metrics::counter!("reports_failed_total").increment(1);
                    }
                }
            });
        }
        debug!(target: "report", "report queue closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        fail_first: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl ReportSink for Flaky {
        async fn deliver(&self, _r: &ReportBundle) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(anyhow!("nope"))
            } else {
                Ok(())
            }
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn report() -> ReportBundle {
        ReportBundle {
            session_id: "s".into(),
            scam_detected: true,
            total_messages_exchanged: 2,
            extracted_intelligence: Default::default(),
            agent_notes: String::new(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_after(1), Duration::from_secs(1));
        assert_eq!(p.delay_after(2), Duration::from_secs(2));
        assert_eq!(p.delay_after(3), Duration::from_secs(4));
        assert_eq!(p.delay_after(9), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let sink = Flaky {
            fail_first: 2,
            calls: AtomicU32::new(0),
        };
        let attempts = deliver_with_retry(&sink, &report(), RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let sink = Flaky {
            fail_first: 10,
            calls: AtomicU32::new(0),
        };
        let err = deliver_with_retry(&sink, &report(), RetryPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, EngineError::ReportingFailure { attempts: 3, .. }));
    }

    #[test]
    fn eligibility_gate() {
        let mut s = Session::new("s", None, chrono::Utc::now());
        s.scam_confidence = 0.5;
        s.intelligence.phone_numbers.insert("9876543210".into());
        assert_eq!(eligibility(&s, 0.5), Err(SkipReason::LowConfidence));
        s.scam_confidence = 0.51;
        assert_eq!(eligibility(&s, 0.5), Ok(()));
        s.intelligence = Default::default();
        assert_eq!(eligibility(&s, 0.5), Err(SkipReason::NoIntelligence));
    }
}
