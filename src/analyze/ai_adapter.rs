//! Advisory adapter: scam classification + reply generation behind provider traits,
//! with a daily call budget.
//!
//! Every call returns `Option`: `None` means "advisory unavailable" and callers
//! fall back to deterministic rules/templates. Timeouts are applied by callers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::analyze::scam::parse_advisory;
use crate::config::AiConfig;
use crate::model::{MessageRecord, Sender};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Classification returned by a scam advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    pub is_scam: bool,
    pub confidence: f32,
    pub reasoning: String,
}

/// Input for reply generation.
#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub text: &'a str,
    pub history: &'a [MessageRecord],
    /// Use the regional (Hinglish) register.
    pub regional: bool,
}

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ScamAdvisor: Send + Sync {
    fn classify<'a>(
        &'a self,
        text: &'a str,
        history: &'a [MessageRecord],
    ) -> BoxFut<'a, Option<AdvisoryVerdict>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub trait ReplyGenerator: Send + Sync {
    fn generate<'a>(&'a self, req: ReplyRequest<'a>) -> BoxFut<'a, Option<String>>;
    fn provider_name(&self) -> &'static str;
}

pub type DynScamAdvisor = Arc<dyn ScamAdvisor>;
pub type DynReplyGenerator = Arc<dyn ReplyGenerator>;

/// The pair of advisories the engine consults.
#[derive(Clone)]
pub struct Advisors {
    pub scam: DynScamAdvisor,
    pub reply: DynReplyGenerator,
}

impl Advisors {
    pub fn disabled() -> Self {
        Self {
            scam: Arc::new(DisabledClient),
            reply: Arc::new(DisabledClient),
        }
    }
}

/// Factory: build advisories according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns deterministic mock advisories.
/// * Else if `config.enabled==false`, returns disabled advisories.
/// * Else builds the OpenAI-compatible provider wrapped with the daily budget.
pub fn build_advisors(config: &AiConfig) -> Advisors {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = Arc::new(Budgeted::new(MockProvider::default(), config.daily_limit));
        return Advisors {
            scam: mock.clone(),
            reply: mock,
        };
    }

    if !config.enabled {
        return Advisors::disabled();
    }

    match config.provider.as_str() {
        "openai" => match OpenAiProvider::new(config) {
            Ok(provider) => {
                let client = Arc::new(Budgeted::new(provider, config.daily_limit));
                Advisors {
                    scam: client.clone(),
                    reply: client,
                }
            }
            Err(e) => {
                tracing::warn!(target: "advisory", error = %e, "http client build failed; advisories disabled");
                Advisors::disabled()
            }
        },
        other => {
            tracing::warn!(target: "advisory", provider = %other, "unknown advisory provider; advisories disabled");
            Advisors::disabled()
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: one prompt in, raw text out. Both advisories are built
/// on top of it so the budget wrapper is shared.
pub trait Provider: Send + Sync + 'static {
    fn complete<'a>(&'a self, system: &'a str, user: String) -> BoxFut<'a, Option<String>>;
    fn name(&self) -> &'static str;
}

const SCAM_SYSTEM_PROMPT: &str = "You review chat messages for fraud. Consider urgency tactics, \
authority impersonation (bank, government, police), requests for money, account details, OTP or PIN, \
threats (arrest, legal action, suspension), verification requests and other social engineering. \
Respond with exactly three lines:\nSCAM: YES or NO\nCONFIDENCE: a number between 0.0 and 1.0\nREASONING: one short sentence";

const PERSONA_SYSTEM_PROMPT: &str = "You are a polite, trusting, not very tech-savvy retiree chatting \
with a stranger. Stay in character. When asked to click links, install apps, verify details or act \
urgently, slow down and instead ask for the other person's bank account number, UPI ID or phone number. \
Never reveal real personal data. Reply in under 50 words. Output only the reply.";

const REGIONAL_HINT: &str = "Mix simple English with common Hindi words (beta, arrey, na, ji).";
const PLAIN_HINT: &str = "Use simple English.";

/// OpenAI-compatible chat completions provider.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("honeypot-engine/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
        })
    }
}

impl Provider for OpenAiProvider {
    fn complete<'a>(&'a self, system: &'a str, user: String) -> BoxFut<'a, Option<String>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: &user,
                    },
                ],
                temperature: 0.3,
                max_tokens: 120,
            };

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .ok()?;

            if !resp.status().is_success() {
                tracing::warn!(target: "advisory", status = %resp.status(), "provider returned non-success");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            body.choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .filter(|s| !s.trim().is_empty())
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `None` always; used when advisories are disabled.
pub struct DisabledClient;

impl ScamAdvisor for DisabledClient {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
        _history: &'a [MessageRecord],
    ) -> BoxFut<'a, Option<AdvisoryVerdict>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

impl ReplyGenerator for DisabledClient {
    fn generate<'a>(&'a self, _req: ReplyRequest<'a>) -> BoxFut<'a, Option<String>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic provider for tests/local runs. Answers scam prompts with a
/// fixed verdict and persona prompts with a fixed reply, optionally after a delay.
#[derive(Clone)]
pub struct MockProvider {
    pub verdict: String,
    pub reply: String,
    pub delay: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            verdict: "SCAM: YES\nCONFIDENCE: 0.9\nREASONING: mock verdict".to_string(),
            reply: "Oh dear, I am not sure. Can you share your account details so I can check?"
                .to_string(),
            delay: Duration::ZERO,
        }
    }
}

impl Provider for MockProvider {
    fn complete<'a>(&'a self, system: &'a str, _user: String) -> BoxFut<'a, Option<String>> {
        let out = if system == SCAM_SYSTEM_PROMPT {
            self.verdict.clone()
        } else {
            self.reply.clone()
        };
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Some(out)
        })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Budget wrapper (daily limit)
// ------------------------------------------------------------

/// Counter state is guarded by a mutex; it resets at UTC day rollover.
pub struct Budgeted<P: Provider> {
    inner: P,
    daily_limit_max: u32,
    counter: Mutex<DailyCounter>,
}

#[derive(Debug, Clone)]
struct DailyCounter {
    date: NaiveDate,
    count: u32,
}

impl DailyCounter {
    fn today() -> Self {
        Self {
            date: Utc::now().date_naive(),
            count: 0,
        }
    }
}

impl<P: Provider> Budgeted<P> {
    pub fn new(inner: P, daily_limit_max: u32) -> Self {
        Self {
            inner,
            daily_limit_max,
            counter: Mutex::new(DailyCounter::today()),
        }
    }

    /// Calls made today.
    pub fn used_today(&self) -> u32 {
        let g = self.counter.lock();
        if g.date == Utc::now().date_naive() {
            g.count
        } else {
            0
        }
    }

    /// Reserve one call; false when today's budget is spent.
    fn try_reserve(&self) -> bool {
        let mut g = self.counter.lock();
        let today = Utc::now().date_naive();
        if g.date != today {
            *g = DailyCounter::today();
        }
        if g.count >= self.daily_limit_max {
            return false;
        }
        g.count = g.count.saturating_add(1);
        true
    }

    async fn call(&self, system: &str, user: String) -> Option<String> {
        if !self.try_reserve() {
            tracing::warn!(target: "advisory", provider = self.inner.name(), limit = self.daily_limit_max, "daily advisory budget exhausted");
            return None;
        }
        self.inner.complete(system, user).await
    }
}

impl<P: Provider> ScamAdvisor for Budgeted<P> {
    fn classify<'a>(
        &'a self,
        text: &'a str,
        history: &'a [MessageRecord],
    ) -> BoxFut<'a, Option<AdvisoryVerdict>> {
        Box::pin(async move {
            let prompt = format!(
                "{}Current message: \"{}\"",
                render_history(earlier_turns(history, text), 5),
                text
            );
            let raw = self.call(SCAM_SYSTEM_PROMPT, prompt).await?;
            let parsed = parse_advisory(&raw);
            if parsed.is_none() {
                tracing::warn!(target: "advisory", provider = self.inner.name(), "malformed scam advisory output");
            }
            parsed
        })
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

impl<P: Provider> ReplyGenerator for Budgeted<P> {
    fn generate<'a>(&'a self, req: ReplyRequest<'a>) -> BoxFut<'a, Option<String>> {
        Box::pin(async move {
            let raw = self.call(PERSONA_SYSTEM_PROMPT, reply_prompt(&req)).await?;
            let cleaned = sanitize_reply(&raw);
            (!cleaned.is_empty()).then_some(cleaned)
        })
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

fn reply_prompt(req: &ReplyRequest<'_>) -> String {
    let style = if req.regional { REGIONAL_HINT } else { PLAIN_HINT };
    format!(
        "{style}\n{}Stranger: {}\nYou:",
        render_history(earlier_turns(req.history, req.text), 6),
        req.text
    )
}

/// History without its last record when that record is the message being
/// answered; the prompt quotes it separately.
fn earlier_turns<'a>(history: &'a [MessageRecord], current: &str) -> &'a [MessageRecord] {
    match history.split_last() {
        Some((last, rest)) if last.is_adversary() && last.text == current => rest,
        _ => history,
    }
}

fn render_history(history: &[MessageRecord], last: usize) -> String {
    if history.is_empty() {
        return String::new();
    }
    let start = history.len().saturating_sub(last);
    let mut out = String::from("Previous conversation:\n");
    for m in &history[start..] {
        let who = match m.sender {
            Sender::Adversary => "Stranger",
            Sender::Responder => "You",
        };
        out.push_str(who);
        out.push_str(": ");
        out.push_str(&m.text);
        out.push('\n');
    }
    out.push('\n');
    out
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

const REPLY_MAX_CHARS: usize = 200;

/// Single line, collapsed whitespace, speaker prefix removed, at most 200 chars.
pub fn sanitize_reply(input: &str) -> String {
    let mut out = String::with_capacity(REPLY_MAX_CHARS);
    let mut prev_space = false;
    let mut n = 0usize;
    for ch in input.trim().chars() {
        let c = if ch.is_whitespace() { ' ' } else { ch };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
                n += 1;
            }
            prev_space = true;
        } else {
            out.push(c);
            n += 1;
            prev_space = false;
        }
        if n >= REPLY_MAX_CHARS {
            break;
        }
    }
    let trimmed = out.trim();
    trimmed
        .strip_prefix("You:")
        .unwrap_or(trimmed)
        .trim()
        .trim_matches('"')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_blocks_after_limit() {
        let b = Budgeted::new(MockProvider::default(), 2);
        assert!(b.classify("pay now", &[]).await.is_some());
        assert!(b.classify("pay now", &[]).await.is_some());
        assert!(b.classify("pay now", &[]).await.is_none());
        assert_eq!(b.used_today(), 2);
    }

    #[tokio::test]
    async fn mock_answers_by_prompt_kind() {
        let b = Budgeted::new(MockProvider::default(), 10);
        let v = b.classify("hello", &[]).await.unwrap();
        assert!(v.is_scam);
        assert!((v.confidence - 0.9).abs() < 1e-6);
        let r = b
            .generate(ReplyRequest {
                text: "click this link",
                history: &[],
                regional: false,
            })
            .await
            .unwrap();
        assert!(r.contains("account details"));
    }

    #[tokio::test]
    async fn disabled_returns_none() {
        let a = Advisors::disabled();
        assert!(a.scam.classify("x", &[]).await.is_none());
        assert_eq!(a.reply.provider_name(), "disabled");
    }

    #[test]
    fn reply_prompt_quotes_current_message_once() {
        let history = vec![
            MessageRecord::adversary("your account is blocked", 1),
            MessageRecord::responder("oh no, why?", 2),
            MessageRecord::adversary("send the otp now", 3),
        ];
        let prompt = reply_prompt(&ReplyRequest {
            text: "send the otp now",
            history: &history,
            regional: false,
        });
        assert_eq!(prompt.matches("send the otp now").count(), 1);
        assert!(prompt.contains("Stranger: your account is blocked"));
        assert!(prompt.ends_with("Stranger: send the otp now\nYou:"));
    }

    #[test]
    fn sanitize_collapses_and_strips_prefix() {
        assert_eq!(sanitize_reply("  You:  \"hello\n\nthere\"  "), "hello there");
        assert_eq!(sanitize_reply(&"a".repeat(500)).chars().count(), 200);
    }
}
