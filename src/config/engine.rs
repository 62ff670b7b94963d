// src/config/engine.rs
//! Engine tuning parameters loaded from TOML (`config/honeypot.toml`).
//!
//! Every heuristic threshold lives here as a named field. The defaults are
//! carried-over tuning values, not validated optima.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/honeypot.toml";
pub const ENV_ENGINE_CONFIG_PATH: &str = "HONEYPOT_CONFIG_PATH";
pub const ENV_REPORT_CALLBACK_URL: &str = "REPORT_CALLBACK_URL";
pub const ENV_REPORT_API_KEY: &str = "REPORT_API_KEY";
pub const ENV_API_KEY: &str = "API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub completion: CompletionConfig,
    pub retention: RetentionConfig,
    pub timeouts: TimeoutConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Blended confidence at or above this classifies a message as fraudulent.
    pub scam_threshold: f32,
    /// Session confidence must exceed this before a report is dispatched.
    /// Deliberately distinct from `scam_threshold`.
    pub report_threshold: f32,
    /// Prior confidence above this is blended into the new value.
    pub prior_blend_floor: f32,
    pub prior_blend_weight: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scam_threshold: 0.4,
            report_threshold: 0.5,
            prior_blend_floor: 0.3,
            prior_blend_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub disengage_min_messages: usize,
    pub disengage_window: usize,
    pub intel_min_messages: usize,
    pub hard_cap_messages: usize,
    pub idle_minutes: i64,
    pub idle_min_messages: usize,
    pub graceful_min_messages: usize,
    pub closing_window: usize,
    pub closing_phrases: Vec<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            disengage_min_messages: 5,
            disengage_window: 3,
            intel_min_messages: 6,
            hard_cap_messages: 20,
            idle_minutes: 30,
            idle_min_messages: 3,
            graceful_min_messages: 4,
            closing_window: 2,
            closing_phrases: [
                "bye",
                "goodbye",
                "thank you",
                "thanks",
                "done",
                "complete",
                "finished",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Sessions idle longer than this are evicted regardless of completion.
    pub session_timeout_minutes: i64,
    /// Completed sessions kept in memory; older ones are archived.
    pub max_completed_sessions: usize,
    /// Background sweep period; 0 disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 60,
            max_completed_sessions: 100,
            sweep_interval_secs: 60,
        }
    }
}

impl RetentionConfig {
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_timeout_minutes.max(0))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub scam_advisory_ms: u64,
    pub reply_ms: u64,
    pub extraction_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            scam_advisory_ms: 3_000,
            reply_ms: 8_000,
            extraction_ms: 250,
        }
    }
}

impl TimeoutConfig {
    pub fn scam_advisory(&self) -> Duration {
        Duration::from_millis(self.scam_advisory_ms)
    }
    pub fn reply(&self) -> Duration {
        Duration::from_millis(self.reply_ms)
    }
    pub fn extraction(&self) -> Duration {
        Duration::from_millis(self.extraction_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub callback_url: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            callback_url: None,
            api_key: None,
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 4_000,
            request_timeout_secs: 10,
        }
    }
}

impl EngineConfig {
    /// Load from `$HONEYPOT_CONFIG_PATH` or `config/honeypot.toml`.
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_ENGINE_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "engine config not found, using defaults");
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Env wins over file for the reporting endpoint and key.
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(ENV_REPORT_CALLBACK_URL) {
            self.reporting.callback_url = Some(url);
        }
        if let Some(key) = non_empty_env(ENV_REPORT_API_KEY).or_else(|| non_empty_env(ENV_API_KEY))
        {
            self.reporting.api_key = Some(key);
        }
    }

    fn sanitize(&mut self) {
        let s = &mut self.scoring;
        for v in [
            &mut s.scam_threshold,
            &mut s.report_threshold,
            &mut s.prior_blend_floor,
            &mut s.prior_blend_weight,
        ] {
            if !v.is_finite() {
                *v = 0.0;
            }
            *v = v.clamp(0.0, 1.0);
        }
        if self.reporting.max_attempts == 0 {
            self.reporting.max_attempts = 1;
        }
        if self.completion.disengage_window == 0 {
            self.completion.disengage_window = 1;
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_distinct_thresholds() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scoring.scam_threshold, 0.4);
        assert_eq!(cfg.scoring.report_threshold, 0.5);
        assert_eq!(cfg.completion.hard_cap_messages, 20);
        assert_eq!(cfg.completion.idle_minutes, 30);
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let cfg = EngineConfig::from_toml_str(
            r#"
[completion]
hard_cap_messages = 12

[scoring]
report_threshold = 7.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.completion.hard_cap_messages, 12);
        assert_eq!(cfg.completion.intel_min_messages, 6);
        // clamped into [0,1]
        assert_eq!(cfg.scoring.report_threshold, 1.0);
        assert_eq!(cfg.timeouts.reply_ms, 8_000);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(EngineConfig::from_toml_str("[completion\nhard_cap = ").is_err());
    }
}
