//! Error taxonomy for the turn pipeline.
//!
//! None of these ever reach an HTTP caller as a failure: each variant has a
//! local recovery (neutral reply, rule-based fallback, skipped merge, no-op,
//! logged delivery failure).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Empty or malformed session id / message.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// External advisory service not configured, over budget, or returned nothing usable.
    #[error("advisory unavailable: {service}")]
    AdvisoryUnavailable { service: &'static str },

    /// External advisory service exceeded its wait budget.
    #[error("advisory timeout: {service} after {budget_ms}ms")]
    AdvisoryTimeout {
        service: &'static str,
        budget_ms: u64,
    },

    /// Extraction/scoring did not finish (timeout or worker failure).
    #[error("extraction failed: {0}")]
    ExtractionFailure(String),

    /// Inbound message asks for a prohibited activity.
    #[error("prohibited content: {term}")]
    ProhibitedContent { term: &'static str },

    /// Mutator called for an id the store does not hold.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Report delivery gave up after all attempts.
    #[error("report delivery failed for {session_id} after {attempts} attempts: {message}")]
    ReportingFailure {
        session_id: String,
        attempts: u32,
        message: String,
    },
}

impl EngineError {
    /// Short machine-readable code for logs and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InputInvalid(_) => "input_invalid",
            EngineError::AdvisoryUnavailable { .. } => "advisory_unavailable",
            EngineError::AdvisoryTimeout { .. } => "advisory_timeout",
            EngineError::ExtractionFailure(_) => "extraction_failure",
            EngineError::ProhibitedContent { .. } => "prohibited_content",
            EngineError::SessionNotFound(_) => "session_not_found",
            EngineError::ReportingFailure { .. } => "reporting_failure",
        }
    }
}
