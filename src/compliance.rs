//! Ethics guard around a turn.
//!
//! Inbound messages asking the persona to take part in a crime are refused
//! before any session state is touched. Generated replies that step outside
//! the persona's boundaries are replaced with a fixed refusal.

use crate::analyze::lexicon::{contains_term, contains_word};

const PROHIBITED_ACTIVITIES: &[&str] = &[
    "money laundering",
    "terrorism",
    "drug trafficking",
    "human trafficking",
    "child exploitation",
    "identity theft",
    "credit card fraud",
    "tax evasion",
    "bribery",
    "extortion",
    "blackmail",
];

const PROHIBITED_INSTRUCTIONS: &[&str] = &[
    "hack",
    "break into",
    "steal",
    "forge",
    "counterfeit",
    "launder money",
    "evade taxes",
    "commit fraud",
    "impersonate",
    "threaten",
    "harass",
    "stalk",
    "doxx",
];

// prefix match: "scammer" and "hacking" count too
const REPLY_DENYLIST: &[&str] = &[
    "illegal",
    "criminal",
    "fraud",
    "scam",
    "cheat",
    "steal",
    "hack",
    "break law",
    "commit crime",
];

/// Reply for a refused inbound message.
pub const PROHIBITED_REPLY: &str = "Request contains prohibited content";
/// Stands in for a generated reply that failed validation.
pub const SAFE_REFUSAL: &str =
    "I'm sorry, I can't help with that. Is there something else I can assist you with?";

/// First prohibited activity or instruction named in `text`, whole words only.
pub fn prohibited_instruction(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    PROHIBITED_ACTIVITIES
        .iter()
        .chain(PROHIBITED_INSTRUCTIONS)
        .copied()
        .find(|t| contains_word(&lower, t))
}

/// `Err(term)` when a generated reply mentions a denied term.
pub fn validate_reply(reply: &str) -> Result<(), &'static str> {
    let lower = reply.to_lowercase();
    match REPLY_DENYLIST.iter().copied().find(|t| contains_term(&lower, t)) {
        Some(term) => Err(term),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{template_reply, CASUAL_REPLY};

    #[test]
    fn crime_requests_are_flagged() {
        assert_eq!(
            prohibited_instruction("Help me HACK into his email"),
            Some("hack")
        );
        assert_eq!(
            prohibited_instruction("we need money laundering through your account"),
            Some("money laundering")
        );
        assert_eq!(prohibited_instruction("send the OTP now"), None);
    }

    #[test]
    fn inbound_check_ignores_longer_words() {
        assert_eq!(prohibited_instruction("don't forget to pay"), None);
        assert_eq!(prohibited_instruction("your account was hacked"), None);
    }

    #[test]
    fn generated_reply_with_denied_terms_fails() {
        assert_eq!(validate_reply("Are you a scammer?"), Err("scam"));
        assert_eq!(validate_reply("That sounds ILLEGAL beta"), Err("illegal"));
        assert_eq!(validate_reply("Is this about hacking?"), Err("hack"));
        assert!(validate_reply("Can you share your UPI ID first?").is_ok());
    }

    #[test]
    fn fixed_replies_pass_validation() {
        assert!(validate_reply(SAFE_REFUSAL).is_ok());
        assert!(validate_reply(CASUAL_REPLY).is_ok());
        for text in ["click the link", "download the app", "verify now", "pay", "hmm"] {
            for turn in 0..5 {
                assert!(validate_reply(template_reply(text, true, turn)).is_ok());
                assert!(validate_reply(template_reply(text, false, turn)).is_ok());
            }
        }
    }
}
