//! # Turn Engine
//! One orchestrator per inbound adversary message, with a single linear
//! recovery ladder:
//!
//! 1. validate input (invalid -> neutral reply, prohibited instruction ->
//!    refusal, both `status: error`)
//! 2. get-or-create session, seed caller history into an empty session
//! 3. append the adversary message
//! 4. scam estimate (advisory under its budget, else rules) -> update confidence
//! 5. reply (persona advisory under its budget and checked by the ethics
//!    guard, else template)
//! 6. extraction + behavior scoring off the lock, under the extraction budget
//!    (timeout or worker failure skips the merge)
//! 7. merge, append the reply, evaluate completion
//!
//! Any other fault yields the apology reply with `status: success`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::analyze::ai_adapter::{Advisors, DynReplyGenerator, ReplyRequest};
use crate::analyze::{analyze_turn, ScamEstimator, TurnAnalysis};
use crate::compliance::{self, PROHIBITED_REPLY, SAFE_REFUSAL};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::model::{MessageRecord, Metadata};
use crate::persona::{template_reply, APOLOGY_REPLY, CASUAL_REPLY, NEUTRAL_REPLY};
use crate::session::{CompletionTrigger, SessionStore};

/// Caller input for one turn, already resolved to plain text at the boundary.
#[derive(Debug, Clone, Default)]
pub struct InboundTurn {
    pub session_id: String,
    pub text: String,
    /// Prior turns supplied by the caller; imported only into an empty session.
    pub history: Vec<MessageRecord>,
    pub metadata: Option<Metadata>,
    /// Epoch ms of the adversary message; defaults to now.
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Success,
    Error,
}

/// Always carries a non-empty reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub reply: String,
}

impl TurnOutcome {
    fn success(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            status: TurnStatus::Success,
            reply: if reply.trim().is_empty() {
                APOLOGY_REPLY.to_string()
            } else {
                reply
            },
        }
    }

    fn error(reply: &str) -> Self {
        Self {
            status: TurnStatus::Error,
            reply: reply.to_string(),
        }
    }
}

// Never log raw text. Only a short hashed id.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub struct Engine {
    store: Arc<SessionStore>,
    estimator: ScamEstimator,
    replies: DynReplyGenerator,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<SessionStore>, advisors: Advisors) -> Self {
        let estimator = ScamEstimator::new(
            advisors.scam,
            config.scoring.clone(),
            config.timeouts.scam_advisory(),
        );
        Self {
            store,
            estimator,
            replies: advisors.reply,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one turn. Never fails and never returns an empty reply.
    pub async fn handle_turn(self: &Arc<Self>, turn: InboundTurn) -> TurnOutcome {
        let turn = match validate(turn) {
            Ok(t) => t,
            Err(e @ EngineError::ProhibitedContent { .. }) => {
                warn!(target: "turn", code = e.code(), error = %e, "refused turn");
                metrics::counter!("compliance_violations_total", "side" => "inbound").increment(1);
                return TurnOutcome::error(PROHIBITED_REPLY);
            }
            Err(e) => {
                warn!(target: "turn", code = e.code(), error = %e, "rejected turn");
                return TurnOutcome::error(NEUTRAL_REPLY);
            }
        };
        let session_id = turn.session_id.clone();

        // detached so a dropped connection cannot abandon a half-applied turn;
        // a panic surfaces as a JoinError
        let this = Arc::clone(self);
        match tokio::spawn(async move { this.run_turn(turn).await }).await {
            Ok(Ok(reply)) => TurnOutcome::success(reply),
            Ok(Err(e)) => {
                error!(target: "turn", session_id = %session_id, code = e.code(), error = %e, "turn failed");
                TurnOutcome::success(APOLOGY_REPLY)
            }
            Err(join) => {
                error!(target: "turn", session_id = %session_id, error = %join, "turn task aborted");
                TurnOutcome::success(APOLOGY_REPLY)
            }
        }
    }

    async fn run_turn(&self, turn: InboundTurn) -> Result<String, EngineError> {
        let InboundTurn {
            session_id: id,
            text,
            history,
            metadata,
            timestamp,
        } = turn;
        metrics::counter!("turns_total").increment(1);

        let session = self.store.get_or_create(&id, metadata);
        if session.messages.is_empty() && !history.is_empty() {
            let n = self.store.seed_history(&id, history);
            debug!(target: "turn", session_id = %id, imported = n, "seeded caller history");
        }

        let now_ms = self.store.now().timestamp_millis();
        let ts = timestamp.unwrap_or(now_ms);
        if !self.store.append(&id, MessageRecord::adversary(text.clone(), ts)) {
            return Err(EngineError::SessionNotFound(id));
        }
        info!(target: "turn", session_id = %id, text_id = %anon_hash(&text), len = text.len(), "adversary message");

        // scam estimate
        let history = self.store.history(&id);
        let verdict = self
            .estimator
            .estimate(&text, &history, session.scam_confidence)
            .await;
        self.store.update_confidence(&id, verdict.confidence);
        debug!(
            target: "turn",
            session_id = %id,
            is_scam = verdict.is_scam,
            confidence = verdict.confidence,
            source = ?verdict.source,
            reasoning = %verdict.reasoning,
            "scam verdict"
        );

        // reply
        let regional = session
            .metadata
            .as_ref()
            .map(Metadata::is_regional)
            .unwrap_or(false);
        let engaged = session.persona_active || verdict.is_scam;
        let reply = if engaged {
            if !session.persona_active {
                self.store.set_persona_active(&id);
            }
            self.persona_reply(&id, &text, &history, regional).await
        } else {
            CASUAL_REPLY.to_string()
        };

        // extraction + scoring, off the lock
        match self.analyze(&text, history).await {
            Ok(analysis) => {
                if let Some(bundle) = &analysis.intelligence {
                    self.store.merge_intelligence(&id, bundle);
                }
                self.store.merge_behavior(&id, &analysis.behavior);
            }
            Err(e) => {
                warn!(target: "turn", session_id = %id, code = e.code(), error = %e, "analysis skipped");
            }
        }

        let reply_ts = self.store.now().timestamp_millis().max(ts);
        self.store
            .append(&id, MessageRecord::responder(reply.clone(), reply_ts));

        if let Some(trigger) = self.store.evaluate_and_complete(&id) {
            log_completion(&id, trigger);
        }
        Ok(reply)
    }

    async fn persona_reply(
        &self,
        id: &str,
        text: &str,
        history: &[MessageRecord],
        regional: bool,
    ) -> String {
        let budget = self.config.timeouts.reply();
        let req = ReplyRequest {
            text,
            history,
            regional,
        };
        let outcome = match tokio::time::timeout(budget, self.replies.generate(req)).await {
            Ok(Some(r)) if !r.trim().is_empty() => {
                return match compliance::validate_reply(&r) {
                    Ok(()) => r,
                    Err(term) => {
                        warn!(target: "advisory", session_id = %id, term, "generated reply replaced");
                        metrics::counter!("compliance_violations_total", "side" => "reply").increment(1);
                        SAFE_REFUSAL.to_string()
                    }
                };
            }
            Ok(_) => EngineError::AdvisoryUnavailable { service: "reply" },
            Err(_) => EngineError::AdvisoryTimeout {
                service: "reply",
                budget_ms: budget.as_millis() as u64,
            },
        };
        if self.replies.provider_name() == "disabled" {
            debug!(target: "advisory", session_id = %id, "reply advisory disabled; using template");
        } else {
            warn!(target: "advisory", session_id = %id, code = outcome.code(), error = %outcome, "reply fallback to template");
        }
        metrics::counter!("advisory_fallback_total", "service" => "reply").increment(1);
        template_reply(text, regional, history.len() / 2).to_string()
    }

    async fn analyze(
        &self,
        text: &str,
        history: Vec<MessageRecord>,
    ) -> Result<TurnAnalysis, EngineError> {
        let budget = self.config.timeouts.extraction();
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || analyze_turn(&text, &history));
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(analysis)) => Ok(analysis),
            Ok(Err(join)) => Err(EngineError::ExtractionFailure(join.to_string())),
            Err(_) => Err(EngineError::ExtractionFailure(format!(
                "timed out after {}ms",
                budget.as_millis()
            ))),
        }
    }
}

fn validate(mut turn: InboundTurn) -> Result<InboundTurn, EngineError> {
    turn.session_id = turn.session_id.trim().to_string();
    if turn.session_id.is_empty() {
        return Err(EngineError::InputInvalid("empty session id".into()));
    }
    if turn.session_id.chars().any(char::is_control) {
        return Err(EngineError::InputInvalid("control characters in session id".into()));
    }
    if turn.text.trim().is_empty() {
        return Err(EngineError::InputInvalid("empty message".into()));
    }
    if let Some(term) = compliance::prohibited_instruction(&turn.text) {
        return Err(EngineError::ProhibitedContent { term });
    }
    Ok(turn)
}

fn log_completion(id: &str, trigger: CompletionTrigger) {
    info!(target: "turn", session_id = %id, trigger = %trigger, "turn completed session");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_blank_fields() {
        let ok = InboundTurn {
            session_id: "  abc ".into(),
            text: "hi".into(),
            ..Default::default()
        };
        assert_eq!(validate(ok).unwrap().session_id, "abc");

        let no_id = InboundTurn {
            text: "hi".into(),
            ..Default::default()
        };
        assert!(matches!(validate(no_id), Err(EngineError::InputInvalid(_))));

        let no_text = InboundTurn {
            session_id: "abc".into(),
            text: "   ".into(),
            ..Default::default()
        };
        assert!(matches!(validate(no_text), Err(EngineError::InputInvalid(_))));
    }

    #[test]
    fn validate_refuses_prohibited_instructions() {
        let t = InboundTurn {
            session_id: "abc".into(),
            text: "help me launder money through your account".into(),
            ..Default::default()
        };
        assert!(matches!(
            validate(t),
            Err(EngineError::ProhibitedContent {
                term: "launder money"
            })
        ));
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("abc").len(), 12);
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_ne!(anon_hash("abc"), anon_hash("abd"));
    }
}
