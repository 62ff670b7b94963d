//! Conversation data model: messages, extracted intelligence, behavioral profile, sessions.
//!
//! Merge rules live next to the types so every caller (store, tests, reporting)
//! sees the same semantics:
//! - `IntelligenceBundle::merge` is a per-category set union plus overwrite-by-key
//!   for the confidence map.
//! - `BehavioralProfile::merge` takes the max of both scores, unions tag sets and
//!   sums the manipulation counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lower/upper bound for aggression and sophistication scores.
pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 10;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[serde(alias = "scammer")]
    Adversary,
    #[serde(alias = "user", alias = "agent")]
    Responder,
}

/// One turn of the conversation. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: Sender,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl MessageRecord {
    pub fn new(sender: Sender, text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp,
        }
    }

    pub fn adversary(text: impl Into<String>, timestamp: i64) -> Self {
        Self::new(Sender::Adversary, text, timestamp)
    }

    pub fn responder(text: impl Into<String>, timestamp: i64) -> Self {
        Self::new(Sender::Responder, text, timestamp)
    }

    pub fn is_adversary(&self) -> bool {
        self.sender == Sender::Adversary
    }
}

/// Optional channel/locale hints supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl Metadata {
    /// True for locales where the regional persona variant is used (e.g. `en-IN`).
    pub fn is_regional(&self) -> bool {
        self.locale
            .as_deref()
            .map(|l| {
                l.split(['-', '_'])
                    .any(|part| part.eq_ignore_ascii_case("in"))
            })
            .unwrap_or(false)
    }
}

/// Intelligence categories, also used as keys of the confidence map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FinancialAccounts,
    RoutingCodes,
    PaymentHandles,
    PhoneNumbers,
    SuspiciousLinks,
    SuspiciousKeywords,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::FinancialAccounts => "financial_accounts",
            Category::RoutingCodes => "routing_codes",
            Category::PaymentHandles => "payment_handles",
            Category::PhoneNumbers => "phone_numbers",
            Category::SuspiciousLinks => "suspicious_links",
            Category::SuspiciousKeywords => "suspicious_keywords",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted financial/contact artifacts for a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceBundle {
    pub financial_accounts: BTreeSet<String>,
    pub routing_codes: BTreeSet<String>,
    pub payment_handles: BTreeSet<String>,
    pub phone_numbers: BTreeSet<String>,
    pub suspicious_links: BTreeSet<String>,
    pub suspicious_keywords: BTreeSet<String>,
    /// Per-category confidence in [0,1].
    pub confidence: BTreeMap<Category, f32>,
}

impl IntelligenceBundle {
    /// True when no category holds a value (keywords included).
    pub fn is_empty(&self) -> bool {
        self.financial_accounts.is_empty()
            && self.routing_codes.is_empty()
            && self.payment_handles.is_empty()
            && self.phone_numbers.is_empty()
            && self.suspicious_links.is_empty()
            && self.suspicious_keywords.is_empty()
    }

    /// Any account, payment handle or phone number present.
    pub fn has_contact_or_financial(&self) -> bool {
        !self.financial_accounts.is_empty()
            || !self.payment_handles.is_empty()
            || !self.phone_numbers.is_empty()
    }

    /// Any account or payment handle present.
    pub fn has_financial(&self) -> bool {
        !self.financial_accounts.is_empty() || !self.payment_handles.is_empty()
    }

    pub fn set(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::FinancialAccounts => &self.financial_accounts,
            Category::RoutingCodes => &self.routing_codes,
            Category::PaymentHandles => &self.payment_handles,
            Category::PhoneNumbers => &self.phone_numbers,
            Category::SuspiciousLinks => &self.suspicious_links,
            Category::SuspiciousKeywords => &self.suspicious_keywords,
        }
    }

    fn set_mut(&mut self, category: Category) -> &mut BTreeSet<String> {
        match category {
            Category::FinancialAccounts => &mut self.financial_accounts,
            Category::RoutingCodes => &mut self.routing_codes,
            Category::PaymentHandles => &mut self.payment_handles,
            Category::PhoneNumbers => &mut self.phone_numbers,
            Category::SuspiciousLinks => &mut self.suspicious_links,
            Category::SuspiciousKeywords => &mut self.suspicious_keywords,
        }
    }

    /// Set union per category; confidence entries from `other` overwrite ours.
    pub fn merge(&mut self, other: &IntelligenceBundle) {
        for category in ALL_CATEGORIES {
            let src = other.set(category);
            if !src.is_empty() {
                self.set_mut(category).extend(src.iter().cloned());
            }
        }
        for (k, v) in &other.confidence {
            self.confidence.insert(*k, v.clamp(0.0, 1.0));
        }
    }

    /// Per-category item counts (all six categories, zeroes included).
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        ALL_CATEGORIES
            .iter()
            .map(|c| (*c, self.set(*c).len()))
            .collect()
    }
}

pub const ALL_CATEGORIES: [Category; 6] = [
    Category::FinancialAccounts,
    Category::RoutingCodes,
    Category::PaymentHandles,
    Category::PhoneNumbers,
    Category::SuspiciousLinks,
    Category::SuspiciousKeywords,
];

/// Urgency tactic tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UrgencyTactic {
    TimePressure,
    DeadlineThreat,
    ConsequenceThreat,
    AccountThreat,
}

/// Social-engineering technique tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocialEngineering {
    AuthorityImpersonation,
    UrgencyCreation,
    FearTactics,
    TrustBuilding,
    InformationGathering,
}

/// Persistence-pattern tags derived from conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistencePattern {
    HighMessageFrequency,
    RepeatedInformationRequests,
    EscalatingThreats,
}

macro_rules! kebab_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let v = serde_json::to_value(self).map_err(|_| fmt::Error)?;
                f.write_str(v.as_str().unwrap_or_default())
            }
        })*
    };
}
kebab_display!(UrgencyTactic, SocialEngineering, PersistencePattern);

/// Aggregated adversary conduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehavioralProfile {
    pub aggression: u8,
    pub sophistication: u8,
    pub urgency_tactics: BTreeSet<UrgencyTactic>,
    pub social_engineering: BTreeSet<SocialEngineering>,
    pub persistence: BTreeSet<PersistencePattern>,
    pub manipulation_attempts: u32,
}

impl Default for BehavioralProfile {
    fn default() -> Self {
        Self {
            aggression: SCORE_MIN,
            sophistication: SCORE_MIN,
            urgency_tactics: BTreeSet::new(),
            social_engineering: BTreeSet::new(),
            persistence: BTreeSet::new(),
            manipulation_attempts: 0,
        }
    }
}

impl BehavioralProfile {
    /// Max of scores, union of tags, sum of counters.
    pub fn merge(&mut self, other: &BehavioralProfile) {
        self.aggression = clamp_score(self.aggression.max(other.aggression) as i32);
        self.sophistication = clamp_score(self.sophistication.max(other.sophistication) as i32);
        self.urgency_tactics.extend(other.urgency_tactics.iter().copied());
        self.social_engineering
            .extend(other.social_engineering.iter().copied());
        self.persistence.extend(other.persistence.iter().copied());
        self.manipulation_attempts = self
            .manipulation_attempts
            .saturating_add(other.manipulation_attempts);
    }
}

/// Clamp a raw score into `[SCORE_MIN, SCORE_MAX]`.
pub fn clamp_score(raw: i32) -> u8 {
    raw.clamp(SCORE_MIN as i32, SCORE_MAX as i32) as u8
}

/// Coarse conversation phase. `Conclusion` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Introduction,
    Engagement,
    Extraction,
    Conclusion,
}

/// Full per-conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<MessageRecord>,
    pub scam_confidence: f32,
    pub persona_active: bool,
    pub complete: bool,
    pub phase: ConversationPhase,
    pub intelligence: IntelligenceBundle,
    pub behavior: BehavioralProfile,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub metadata: Option<Metadata>,
}

impl Session {
    pub fn new(id: impl Into<String>, metadata: Option<Metadata>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            scam_confidence: 0.0,
            persona_active: false,
            complete: false,
            phase: ConversationPhase::Introduction,
            intelligence: IntelligenceBundle::default(),
            behavior: BehavioralProfile::default(),
            created_at: now,
            last_activity: now,
            metadata,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn adversary_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_adversary()).count()
    }

    /// Nothing beyond creation has happened yet.
    pub fn is_pristine(&self) -> bool {
        self.messages.is_empty() && !self.persona_active && !self.complete
    }

    /// Last `n` messages (fewer if the session is shorter).
    pub fn tail(&self, n: usize) -> &[MessageRecord] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(accounts: &[&str], phones: &[&str]) -> IntelligenceBundle {
        IntelligenceBundle {
            financial_accounts: accounts.iter().map(|s| s.to_string()).collect(),
            phone_numbers: phones.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn bundle_merge_is_union_and_idempotent() {
        let a = bundle(&["123456789"], &["9876543210"]);
        let b = bundle(&["123456789", "555555555"], &[]);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab.financial_accounts, ba.financial_accounts);
        assert_eq!(ab.phone_numbers, ba.phone_numbers);
        assert_eq!(ab.financial_accounts.len(), 2);

        let mut twice = ab.clone();
        twice.merge(&b);
        assert_eq!(twice, ab);
    }

    #[test]
    fn bundle_confidence_overwrites_by_key() {
        let mut a = IntelligenceBundle::default();
        a.confidence.insert(Category::PhoneNumbers, 0.7);
        a.confidence.insert(Category::RoutingCodes, 0.95);
        let mut b = IntelligenceBundle::default();
        b.confidence.insert(Category::PhoneNumbers, 0.8);
        a.merge(&b);
        assert_eq!(a.confidence[&Category::PhoneNumbers], 0.8);
        assert_eq!(a.confidence[&Category::RoutingCodes], 0.95);
    }

    #[test]
    fn profile_merge_takes_max_and_sums_counter() {
        let mut a = BehavioralProfile {
            aggression: 7,
            sophistication: 2,
            manipulation_attempts: 3,
            ..Default::default()
        };
        a.urgency_tactics.insert(UrgencyTactic::TimePressure);
        let mut b = BehavioralProfile {
            aggression: 4,
            sophistication: 9,
            manipulation_attempts: 2,
            ..Default::default()
        };
        b.urgency_tactics.insert(UrgencyTactic::AccountThreat);
        a.merge(&b);
        assert_eq!(a.aggression, 7);
        assert_eq!(a.sophistication, 9);
        assert_eq!(a.manipulation_attempts, 5);
        assert_eq!(a.urgency_tactics.len(), 2);
    }

    #[test]
    fn tags_display_kebab_case() {
        assert_eq!(UrgencyTactic::TimePressure.to_string(), "time-pressure");
        assert_eq!(
            PersistencePattern::RepeatedInformationRequests.to_string(),
            "repeated-information-requests"
        );
    }

    #[test]
    fn sender_accepts_legacy_aliases() {
        let s: Sender = serde_json::from_str("\"scammer\"").unwrap();
        assert_eq!(s, Sender::Adversary);
        let s: Sender = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(s, Sender::Responder);
    }

    #[test]
    fn regional_locale_is_region_part_in() {
        let m = |l: &str| Metadata {
            locale: Some(l.to_string()),
            ..Default::default()
        };
        assert!(m("en-IN").is_regional());
        assert!(m("IN").is_regional());
        assert!(m("hi_in").is_regional());
        assert!(!m("en-GB").is_regional());
        assert!(!m("tr-TR").is_regional());
        assert!(!Metadata::default().is_regional());
    }
}
