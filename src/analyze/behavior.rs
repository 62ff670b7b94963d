//! Behavior scorer: (message, history) -> BehavioralProfile.
//!
//! `history` is the conversation as the store holds it, which normally already
//! includes the message being scored.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::analyze::lexicon::{self as lx, any_term, caps_ratio, count_terms};
use crate::model::{
    clamp_score, BehavioralProfile, MessageRecord, PersistencePattern, SocialEngineering,
    UrgencyTactic,
};

static REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z0-9]{6,}\b").expect("reference token regex"));

const CAPS_RATIO_LIMIT: f32 = 0.3;

pub fn score(text: &str, history: &[MessageRecord]) -> BehavioralProfile {
    let lower = text.to_lowercase();
    BehavioralProfile {
        aggression: aggression(text, &lower, history),
        sophistication: sophistication(text, &lower, history),
        urgency_tactics: urgency_tactics(&lower),
        social_engineering: social_engineering(&lower),
        persistence: persistence(history),
        manipulation_attempts: count_terms(&lower, lx::MANIPULATION) as u32,
    }
}

fn aggression(text: &str, lower: &str, history: &[MessageRecord]) -> u8 {
    let mut s = 1i32;
    s += count_terms(lower, lx::AGGRESSIVE) as i32;
    s += 2 * count_terms(lower, lx::THREATS) as i32;
    s += count_terms(lower, lx::DEMANDS) as i32;
    if caps_ratio(text) > CAPS_RATIO_LIMIT {
        s += 2;
    }
    if text.matches('!').count() >= 2 {
        s += 1;
    }
    if history.len() > 5 && adversary_turns(history).count() > 3 {
        s += 1;
    }
    clamp_score(s)
}

fn sophistication(text: &str, lower: &str, history: &[MessageRecord]) -> u8 {
    let mut s = 1i32;
    s += 2 * count_terms(lower, lx::TECHNICAL) as i32;
    s += count_terms(lower, lx::PROFESSIONAL) as i32;
    s += 2 * count_terms(lower, lx::NAMED_AUTHORITY) as i32;
    if text.split_whitespace().count() > 10 {
        s += 1;
    }
    if REFERENCE_RE.is_match(text) {
        s += 1;
    }
    if history.len() > 3 {
        s += 1;
    }
    clamp_score(s)
}

pub fn urgency_tactics(lower: &str) -> BTreeSet<UrgencyTactic> {
    [
        (UrgencyTactic::TimePressure, lx::TIME_PRESSURE),
        (UrgencyTactic::DeadlineThreat, lx::DEADLINE_THREAT),
        (UrgencyTactic::ConsequenceThreat, lx::CONSEQUENCE_THREAT),
        (UrgencyTactic::AccountThreat, lx::ACCOUNT_THREAT),
    ]
    .into_iter()
    .filter(|(_, terms)| any_term(lower, terms))
    .map(|(tag, _)| tag)
    .collect()
}

pub fn social_engineering(lower: &str) -> BTreeSet<SocialEngineering> {
    [
        (SocialEngineering::AuthorityImpersonation, lx::SE_AUTHORITY),
        (SocialEngineering::UrgencyCreation, lx::SE_URGENCY),
        (SocialEngineering::FearTactics, lx::SE_FEAR),
        (SocialEngineering::TrustBuilding, lx::SE_TRUST),
        (SocialEngineering::InformationGathering, lx::SE_INFO),
    ]
    .into_iter()
    .filter(|(_, terms)| any_term(lower, terms))
    .map(|(tag, _)| tag)
    .collect()
}

pub fn persistence(history: &[MessageRecord]) -> BTreeSet<PersistencePattern> {
    let mut out = BTreeSet::new();
    if history.len() < 3 {
        return out;
    }

    let adversary: Vec<String> = adversary_turns(history)
        .map(|m| m.text.to_lowercase())
        .collect();

    if adversary.len() > 5 {
        out.insert(PersistencePattern::HighMessageFrequency);
    }

    let repeated = adversary
        .windows(2)
        .any(|w| any_term(&w[0], lx::INFO_REQUEST) && any_term(&w[1], lx::INFO_REQUEST));
    if repeated {
        out.insert(PersistencePattern::RepeatedInformationRequests);
    }

    let recent = &adversary[adversary.len().saturating_sub(3)..];
    if recent.iter().any(|t| any_term(t, lx::ESCALATION)) {
        out.insert(PersistencePattern::EscalatingThreats);
    }
    out
}

fn adversary_turns(history: &[MessageRecord]) -> impl Iterator<Item = &MessageRecord> {
    history.iter().filter(|m| m.is_adversary())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adv(t: &str) -> MessageRecord {
        MessageRecord::adversary(t, 0)
    }
    fn resp(t: &str) -> MessageRecord {
        MessageRecord::responder(t, 0)
    }

    #[test]
    fn calm_message_scores_minimum() {
        let p = score("hello, how are you doing", &[]);
        assert_eq!(p.aggression, 1);
        assert_eq!(p.sophistication, 1);
        assert!(p.urgency_tactics.is_empty());
        assert_eq!(p.manipulation_attempts, 0);
    }

    #[test]
    fn threats_and_caps_push_aggression_to_cap() {
        let p = score(
            "PAY NOW OR FACE ARREST AND JAIL, LEGAL ACTION, PENALTY!!",
            &[],
        );
        assert_eq!(p.aggression, 10);
        assert!(p.urgency_tactics.contains(&UrgencyTactic::TimePressure));
        assert!(p.urgency_tactics.contains(&UrgencyTactic::ConsequenceThreat));
    }

    #[test]
    fn named_authority_raises_sophistication() {
        let p = score(
            "This is the Reserve Bank of India, kyc verification per compliance policy",
            &[],
        );
        assert!(p.sophistication >= 8);
        assert!(p
            .social_engineering
            .contains(&SocialEngineering::AuthorityImpersonation));
    }

    #[test]
    fn persistence_needs_three_turns() {
        let h = vec![adv("police will come"), resp("oh no")];
        assert!(persistence(&h).is_empty());
    }

    #[test]
    fn persistence_tags_from_history() {
        let h = vec![
            adv("please send the code"),
            resp("which code?"),
            adv("verify your account and send it"),
            resp("ok"),
            adv("or the court will act"),
        ];
        let p = persistence(&h);
        assert!(p.contains(&PersistencePattern::RepeatedInformationRequests));
        assert!(p.contains(&PersistencePattern::EscalatingThreats));
        assert!(!p.contains(&PersistencePattern::HighMessageFrequency));
    }

    #[test]
    fn manipulation_counts_every_phrase() {
        let p = score("Trust me, don't worry, I understand you are scared", &[]);
        assert_eq!(p.manipulation_attempts, 4);
    }
}
