// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_daily_limit() -> u32 {
    500
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive)
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible endpoint root; overridable for self-hosted gateways.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Advisory calls allowed per UTC day, shared by scam and reply advisors.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            daily_limit: default_daily_limit(),
        }
    }
}

impl AiConfig {
    /// `$AI_CONFIG_PATH` or `config/ai.json`; a missing file disables advisories.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_AI_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_AI_CONFIG_PATH.into());
        if !Path::new(&path).exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        cfg.provider = cfg.provider.to_lowercase();

        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        // An enabled provider without a key is treated as disabled rather than failing boot.
        if cfg.enabled && cfg.api_key.trim().is_empty() {
            tracing::warn!(target: "advisory", provider = %cfg.provider, "advisory enabled without api key; disabling");
            cfg.enabled = false;
        }

        Ok(cfg)
    }
}
