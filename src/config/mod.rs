pub mod ai;
pub mod engine;

pub use ai::AiConfig;
pub use engine::{
    CompletionConfig, EngineConfig, ReportingConfig, RetentionConfig, ScoringConfig,
    TimeoutConfig,
};
