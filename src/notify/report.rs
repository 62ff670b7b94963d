//! Report bundle delivered to the reporting sink, plus the narrative notes.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::model::{Category, Session};

/// Wire shape expected by the reporting sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBundle {
    pub session_id: String,
    pub scam_detected: bool,
    pub total_messages_exchanged: usize,
    pub extracted_intelligence: ExtractedIntelligence,
    pub agent_notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIntelligence {
    pub bank_accounts: Vec<String>,
    pub upi_ids: Vec<String>,
    pub phishing_links: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub suspicious_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    /// Low <= 3, Medium 4..=7, High >= 8.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=3 => Tier::Low,
            4..=7 => Tier::Medium,
            _ => Tier::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Low => "Low",
            Tier::Medium => "Medium",
            Tier::High => "High",
        }
    }
}

impl ReportBundle {
    pub fn from_session(session: &Session, report_threshold: f32) -> Self {
        let intel = &session.intelligence;
        let list = |c: Category| intel.set(c).iter().cloned().collect::<Vec<_>>();
        Self {
            session_id: session.id.clone(),
            scam_detected: session.scam_confidence > report_threshold,
            total_messages_exchanged: session.message_count(),
            extracted_intelligence: ExtractedIntelligence {
                bank_accounts: list(Category::FinancialAccounts),
                upi_ids: list(Category::PaymentHandles),
                phishing_links: list(Category::SuspiciousLinks),
                phone_numbers: list(Category::PhoneNumbers),
                suspicious_keywords: list(Category::SuspiciousKeywords),
            },
            agent_notes: agent_notes(session),
        }
    }
}

/// Narrative summary: behavior tiers, conversation metrics, category counts,
/// observed tactics and recommendations.
pub fn agent_notes(session: &Session) -> String {
    let b = &session.behavior;
    let intel = &session.intelligence;
    let counts = intel.counts();
    let aggression = Tier::from_score(b.aggression);
    let sophistication = Tier::from_score(b.sophistication);
    let threat = Tier::from_score(b.aggression.max(b.sophistication));
    let adversary = session.adversary_count();
    let duration = session
        .last_activity
        .signed_duration_since(session.created_at)
        .num_seconds()
        .max(0);

    let mut out = String::new();
    let _ = writeln!(out, "BEHAVIORAL ANALYSIS:");
    let _ = writeln!(out, "Aggression: {}/10 ({})", b.aggression, aggression.as_str());
    let _ = writeln!(
        out,
        "Sophistication: {}/10 ({})",
        b.sophistication,
        sophistication.as_str()
    );
    let _ = writeln!(out, "Threat Assessment: {}", threat.as_str());

    let _ = writeln!(out, "\nCONVERSATION METRICS:");
    let _ = writeln!(out, "Total Messages: {}", session.message_count());
    let _ = writeln!(out, "Adversary Messages: {adversary}");
    let _ = writeln!(
        out,
        "Responder Messages: {}",
        session.message_count() - adversary
    );
    let _ = writeln!(out, "Duration: {duration} seconds");

    let _ = writeln!(out, "\nINTELLIGENCE EXTRACTED:");
    let labels = [
        (Category::FinancialAccounts, "financial accounts"),
        (Category::RoutingCodes, "routing codes"),
        (Category::PaymentHandles, "payment handles"),
        (Category::PhoneNumbers, "phone numbers"),
        (Category::SuspiciousLinks, "suspicious links"),
        (Category::SuspiciousKeywords, "suspicious keywords"),
    ];
    for (cat, label) in labels {
        let _ = writeln!(out, "{label}: {}", counts[&cat]);
    }

    let join3 = |items: Vec<String>| items.into_iter().take(3).collect::<Vec<_>>().join(", ");
    if !b.urgency_tactics.is_empty()
        || !b.social_engineering.is_empty()
        || !b.persistence.is_empty()
        || b.manipulation_attempts > 0
    {
        let _ = writeln!(out, "\nBEHAVIORAL PATTERNS:");
        if !b.urgency_tactics.is_empty() {
            let tags = b.urgency_tactics.iter().map(|t| t.to_string()).collect();
            let _ = writeln!(out, "Urgency Tactics: {}", join3(tags));
        }
        if !b.social_engineering.is_empty() {
            let tags = b.social_engineering.iter().map(|t| t.to_string()).collect();
            let _ = writeln!(out, "Social Engineering: {}", join3(tags));
        }
        if !b.persistence.is_empty() {
            let tags = b.persistence.iter().map(|t| t.to_string()).collect();
            let _ = writeln!(out, "Persistence: {}", join3(tags));
        }
        if b.manipulation_attempts > 0 {
            let _ = writeln!(out, "Manipulation Attempts: {}", b.manipulation_attempts);
        }
    }

    let recs = recommendations(session);
    if !recs.is_empty() {
        let _ = writeln!(out, "\nRECOMMENDATIONS:");
        for r in recs {
            let _ = writeln!(out, "- {r}");
        }
    }

    out.trim_end().to_string()
}

pub fn recommendations(session: &Session) -> Vec<&'static str> {
    let intel = &session.intelligence;
    let mut out = Vec::new();
    if !intel.phone_numbers.is_empty() {
        out.push("Block identified phone numbers across platforms");
    }
    if !intel.financial_accounts.is_empty() || !intel.routing_codes.is_empty() {
        out.push("Report bank accounts to financial institutions");
    }
    if !intel.payment_handles.is_empty() {
        out.push("Report payment handles to the payment providers");
    }
    if !intel.suspicious_links.is_empty() {
        out.push("Submit URLs to threat intelligence feeds");
    }
    if Tier::from_score(session.behavior.aggression) == Tier::High {
        out.push("High-priority case for law enforcement referral");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageRecord;
    use chrono::Utc;

    fn session() -> Session {
        let mut s = Session::new("abc", None, Utc::now());
        s.messages.push(MessageRecord::adversary("pay", 1));
        s.messages.push(MessageRecord::responder("ok", 2));
        s.scam_confidence = 0.8;
        s.intelligence.phone_numbers.insert("9876543210".into());
        s.intelligence.suspicious_links.insert("http://bit.ly/x".into());
        s.behavior.aggression = 8;
        s.behavior.sophistication = 2;
        s
    }

    #[test]
    fn tiers_follow_bands() {
        assert_eq!(Tier::from_score(1), Tier::Low);
        assert_eq!(Tier::from_score(3), Tier::Low);
        assert_eq!(Tier::from_score(4), Tier::Medium);
        assert_eq!(Tier::from_score(7), Tier::Medium);
        assert_eq!(Tier::from_score(8), Tier::High);
    }

    #[test]
    fn bundle_uses_wire_names() {
        let b = ReportBundle::from_session(&session(), 0.5);
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["sessionId"], "abc");
        assert_eq!(v["scamDetected"], true);
        assert_eq!(v["totalMessagesExchanged"], 2);
        assert_eq!(v["extractedIntelligence"]["phoneNumbers"][0], "9876543210");
        assert!(v["extractedIntelligence"]["upiIds"].as_array().unwrap().is_empty());
        assert!(v["agentNotes"].as_str().unwrap().contains("Threat Assessment: High"));
    }

    #[test]
    fn recommendations_follow_categories() {
        let r = recommendations(&session());
        assert!(r.iter().any(|l| l.contains("phone numbers")));
        assert!(r.iter().any(|l| l.contains("threat intelligence")));
        assert!(r.iter().any(|l| l.contains("law enforcement")));
        assert!(!r.iter().any(|l| l.contains("bank accounts")));
    }
}
