//! Scam confidence estimator: weighted keyword rules, with an external
//! advisory taking precedence when it answers well-formed and in time.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyze::ai_adapter::{AdvisoryVerdict, DynScamAdvisor};
use crate::analyze::lexicon::{self as lx, caps_ratio, contains_term};
use crate::config::ScoringConfig;
use crate::error::EngineError;
use crate::model::MessageRecord;

static LONG_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{10,}\b").expect("digit run regex"));

/// (category, terms, weight per match)
const CATEGORIES: [(&str, &[&str], u32); 5] = [
    ("urgency", lx::SCAM_URGENCY, 1),
    ("financial", lx::SCAM_FINANCIAL, 3),
    ("authority", lx::SCAM_AUTHORITY, 1),
    ("threats", lx::SCAM_THREATS, 2),
    ("verification", lx::SCAM_VERIFICATION, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    Rules,
    Advisory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScamVerdict {
    pub is_scam: bool,
    /// Always within [0,1].
    pub confidence: f32,
    pub reasoning: String,
    pub source: VerdictSource,
}

/// Deterministic rule-based estimate.
///
/// `history` is the conversation so far; the escalation bonus looks at the
/// last three adversary turns in it.
pub fn rule_based(
    text: &str,
    history: &[MessageRecord],
    prior: f32,
    scoring: &ScoringConfig,
) -> ScamVerdict {
    if text.trim().is_empty() {
        return ScamVerdict {
            is_scam: false,
            confidence: 0.0,
            reasoning: "empty message".to_string(),
            source: VerdictSource::Rules,
        };
    }

    let lower = text.to_lowercase();
    let mut score: u32 = 0;
    let mut matched: Vec<String> = Vec::new();

    for (name, terms, weight) in CATEGORIES {
        for t in terms.iter().filter(|t| contains_term(&lower, t)) {
            score += weight;
            matched.push(format!("{name}:{t}"));
        }
    }

    if text.matches('!').count() >= 2 {
        score += 1;
        matched.push("urgency:multiple_exclamations".into());
    }
    if caps_ratio(text) > 0.3 {
        score += 1;
        matched.push("urgency:excessive_caps".into());
    }
    if LONG_DIGITS_RE.is_match(text) {
        score += 2;
        matched.push("financial:numeric_data".into());
    }

    let adversary: Vec<String> = history
        .iter()
        .filter(|m| m.is_adversary())
        .map(|m| m.text.to_lowercase())
        .collect();
    if adversary.len() > 2 {
        let recent = &adversary[adversary.len() - 3..];
        let escalation: u32 = recent
            .iter()
            .map(|t| {
                lx::SCAM_THREATS
                    .iter()
                    .filter(|k| contains_term(t, k))
                    .count() as u32
            })
            .sum();
        if escalation > 0 {
            score += escalation;
            matched.push("pattern:threat_escalation".into());
        }
    }

    let mut confidence = (score as f32 / 10.0).min(1.0);
    if prior > scoring.prior_blend_floor {
        confidence = (confidence + prior * scoring.prior_blend_weight).min(1.0);
    }
    let confidence = confidence.clamp(0.0, 1.0);

    let mut reasoning = format!("rules: score={score}, patterns={}", matched.len());
    if !matched.is_empty() {
        let head: Vec<&str> = matched.iter().take(3).map(String::as_str).collect();
        reasoning.push_str(&format!(", matched=[{}]", head.join(", ")));
    }

    ScamVerdict {
        is_scam: confidence >= scoring.scam_threshold,
        confidence,
        reasoning,
        source: VerdictSource::Rules,
    }
}

/// Parse `SCAM: YES|NO` / `CONFIDENCE: x` / `REASONING: ...` output.
/// Both the SCAM and CONFIDENCE lines are required, and confidence must be in [0,1].
pub fn parse_advisory(raw: &str) -> Option<AdvisoryVerdict> {
    let mut is_scam: Option<bool> = None;
    let mut confidence: Option<f32> = None;
    let mut reasoning = String::from("advisory");

    for line in raw.lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);
        let upper = line.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("SCAM:") {
            let rest = rest.trim();
            is_scam = if rest.starts_with("YES") {
                Some(true)
            } else if rest.starts_with("NO") {
                Some(false)
            } else {
                None
            };
        } else if let Some(rest) = upper.strip_prefix("CONFIDENCE:") {
            confidence = rest
                .trim()
                .trim_end_matches(['*', '.'])
                .parse::<f32>()
                .ok()
                .filter(|c| c.is_finite() && (0.0..=1.0).contains(c));
        } else if upper.starts_with("REASONING:") {
            reasoning = line["REASONING:".len()..].trim().to_string();
        }
    }

    Some(AdvisoryVerdict {
        is_scam: is_scam?,
        confidence: confidence?,
        reasoning,
    })
}

/// Rule-based estimator with optional advisory precedence under a wait budget.
#[derive(Clone)]
pub struct ScamEstimator {
    advisor: DynScamAdvisor,
    scoring: ScoringConfig,
    budget: Duration,
}

impl ScamEstimator {
    pub fn new(advisor: DynScamAdvisor, scoring: ScoringConfig, budget: Duration) -> Self {
        Self {
            advisor,
            scoring,
            budget,
        }
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Never fails: advisory absence, malformed output and timeout all fall
    /// back to the rule-based verdict.
    pub async fn estimate(&self, text: &str, history: &[MessageRecord], prior: f32) -> ScamVerdict {
        let rules = rule_based(text, history, prior, &self.scoring);
        match self.consult(text, history).await {
            Ok(v) => ScamVerdict {
                is_scam: v.is_scam,
                confidence: v.confidence.clamp(0.0, 1.0),
                reasoning: v.reasoning,
                source: VerdictSource::Advisory,
            },
            Err(e) => {
                if self.advisor.provider_name() == "disabled" {
                    tracing::debug!(target: "advisory", "scam advisory disabled; using rules");
                } else {
                    tracing::warn!(target: "advisory", code = e.code(), error = %e, "scam advisory fallback to rules");
                }
                metrics::counter!("advisory_fallback_total", "service" => "scam").increment(1);
                rules
            }
        }
    }

    async fn consult(
        &self,
        text: &str,
        history: &[MessageRecord],
    ) -> Result<AdvisoryVerdict, EngineError> {
        match tokio::time::timeout(self.budget, self.advisor.classify(text, history)).await {
            Ok(Some(v)) => Ok(v),
            Ok(None) => Err(EngineError::AdvisoryUnavailable { service: "scam" }),
            Err(_) => Err(EngineError::AdvisoryTimeout {
                service: "scam",
                budget_ms: self.budget.as_millis() as u64,
            }),
        }
    }
}
