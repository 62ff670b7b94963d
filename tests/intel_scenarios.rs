// tests/intel_scenarios.rs
//
// Scenario checks for the pure analysis pipeline: extractor, behavior scorer
// and the rule-based scam estimate.

use honeypot_engine::analyze::{analyze_turn, behavior, extractor, scam};
use honeypot_engine::config::ScoringConfig;
use honeypot_engine::model::{MessageRecord, PersistencePattern, SocialEngineering};

const MIXED: &str = "Send to account 1234567890123456, UPI scam@paytm, call 9876543210 now!!";

#[test]
fn mixed_message_yields_one_of_each_identifier() {
    let bundle = extractor::extract(MIXED).expect("identifiers present");

    assert_eq!(
        bundle.financial_accounts.iter().collect::<Vec<_>>(),
        vec!["1234567890123456"]
    );
    assert_eq!(
        bundle.payment_handles.iter().collect::<Vec<_>>(),
        vec!["scam@paytm"]
    );
    assert_eq!(
        bundle.phone_numbers.iter().collect::<Vec<_>>(),
        vec!["9876543210"]
    );
    assert!(bundle.routing_codes.is_empty());
    assert!(bundle.suspicious_links.is_empty());
}

#[test]
fn mixed_message_bumps_aggression() {
    let analysis = analyze_turn(MIXED, &[]);
    assert!(
        analysis.behavior.aggression > 1,
        "exclamations should raise aggression, got {}",
        analysis.behavior.aggression
    );
}

#[test]
fn ten_digit_mobile_shape_is_a_phone_not_an_account() {
    let text = "my number is 9123456789 ok";
    assert!(extractor::accounts(text).is_empty());
    assert!(extractor::phone_numbers(text).contains("9123456789"));

    // a 10-digit run that does not start with 6-9 stays an account
    let other = "account 1234567890 please";
    assert!(extractor::accounts(other).contains("1234567890"));
    assert!(extractor::phone_numbers(other).is_empty());
}

#[test]
fn financial_keywords_with_threat_exceed_scam_threshold() {
    let cfg = ScoringConfig::default();
    let text = "Make the payment by transfer to the bank account using UPI or face arrest";
    let v = scam::rule_based(text, &[], 0.0, &cfg);
    assert!(v.confidence > cfg.scam_threshold, "confidence {}", v.confidence);
    assert!(v.is_scam);
}

#[test]
fn small_talk_stays_below_threshold() {
    let cfg = ScoringConfig::default();
    let v = scam::rule_based("hey, how was your weekend?", &[], 0.0, &cfg);
    assert!(!v.is_scam);
    assert!(v.confidence < cfg.scam_threshold);
}

#[test]
fn persistence_needs_history_and_detects_repeats() {
    let history: Vec<MessageRecord> = vec![
        MessageRecord::adversary("please verify your account", 1),
        MessageRecord::responder("why?", 2),
        MessageRecord::adversary("provide the OTP now", 3),
        MessageRecord::adversary("send your pin too", 4),
    ];
    let p = behavior::persistence(&history);
    assert!(p.contains(&PersistencePattern::RepeatedInformationRequests), "{p:?}");

    assert!(behavior::persistence(&history[..2]).is_empty());
}

#[test]
fn authority_wording_is_tagged() {
    let tags = behavior::social_engineering("this is the police department, act now");
    assert!(tags.contains(&SocialEngineering::AuthorityImpersonation), "{tags:?}");
}
