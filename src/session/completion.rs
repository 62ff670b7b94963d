//! Completion policy: independent closing triggers evaluated over a session.
//!
//! Pure; the store performs the actual one-way transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::analyze::lexicon::any_term;
use crate::config::CompletionConfig;
use crate::model::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    Disengagement,
    SufficientIntelligence,
    HardCap,
    Inactivity,
    GracefulClose,
    /// Administrative force-complete.
    Forced,
}

impl CompletionTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionTrigger::Disengagement => "disengagement",
            CompletionTrigger::SufficientIntelligence => "sufficient_intelligence",
            CompletionTrigger::HardCap => "hard_cap",
            CompletionTrigger::Inactivity => "inactivity",
            CompletionTrigger::GracefulClose => "graceful_close",
            CompletionTrigger::Forced => "forced",
        }
    }
}

impl fmt::Display for CompletionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First trigger that holds, or `None`. Completed sessions are never re-evaluated.
pub fn evaluate(
    session: &Session,
    now: DateTime<Utc>,
    cfg: &CompletionConfig,
) -> Option<CompletionTrigger> {
    if session.complete {
        return None;
    }
    let total = session.message_count();

    // 1. adversary went quiet
    if total >= cfg.disengage_min_messages
        && !session
            .tail(cfg.disengage_window)
            .iter()
            .any(|m| m.is_adversary())
    {
        return Some(CompletionTrigger::Disengagement);
    }

    // 2. enough intelligence
    if session.intelligence.has_contact_or_financial() && total >= cfg.intel_min_messages {
        return Some(CompletionTrigger::SufficientIntelligence);
    }

    // 3. hard cap
    if total >= cfg.hard_cap_messages {
        return Some(CompletionTrigger::HardCap);
    }

    // 4. inactivity
    let idle = now.signed_duration_since(session.last_activity);
    if idle > chrono::Duration::minutes(cfg.idle_minutes) && total >= cfg.idle_min_messages {
        return Some(CompletionTrigger::Inactivity);
    }

    // 5. graceful close with financial intelligence
    if session.intelligence.has_financial()
        && total >= cfg.graceful_min_messages
        && session.tail(cfg.closing_window).iter().any(|m| {
            let lower = m.text.to_lowercase();
            cfg.closing_phrases
                .iter()
                .any(|p| any_term(&lower, &[p.as_str()]))
        })
    {
        return Some(CompletionTrigger::GracefulClose);
    }

    None
}
