// src/analyze/mod.rs
//! Analysis pipeline entry: pure extraction + behavior scoring for one turn,
//! and the scam estimator with its advisory adapter.

pub mod ai_adapter;
pub mod behavior;
pub mod extractor;
pub mod lexicon;
pub mod scam;

use crate::model::{BehavioralProfile, IntelligenceBundle, MessageRecord};

pub use crate::analyze::scam::{ScamEstimator, ScamVerdict, VerdictSource};

/// Lock-free per-turn analysis result, merged into the session afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnAnalysis {
    /// `None` when the extractor found nothing.
    pub intelligence: Option<IntelligenceBundle>,
    pub behavior: BehavioralProfile,
}

/// Run the extractor and the behavior scorer over one adversary message.
pub fn analyze_turn(text: &str, history: &[MessageRecord]) -> TurnAnalysis {
    TurnAnalysis {
        intelligence: extractor::extract(text),
        behavior: behavior::score(text, history),
    }
}
