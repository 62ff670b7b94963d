//! Pattern extractor: raw adversary text -> typed intelligence candidates.
//!
//! Pure and lock-free. Returns `None` when no category produced a candidate,
//! so callers can skip the merge step entirely.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::analyze::lexicon::{matching_terms, KEYWORD_SETS};
use crate::model::{Category, IntelligenceBundle};

static ACCOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{9,18}\b").expect("valid account regex"));
static ROUTING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[A-Z]{4}0[A-Z0-9]{6}\b").expect("valid routing regex"));
static HANDLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9.\-_]{2,256}@[a-zA-Z]{2,64}").expect("valid handle regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[6-9]\d{9}\b").expect("valid phone regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:https?://|\bwww\.)\S+").expect("valid link regex"));

/// Short payment-provider suffixes always accepted as handle domains.
const HANDLE_DOMAINS: &[&str] = &[
    "paytm", "okicici", "apl", "ybl", "ibl", "axl", "fbl", "pnb", "sbi", "upi",
];
/// Unlisted domains up to this length are still taken as payment handles.
const HANDLE_DOMAIN_MAX_LEN: usize = 10;

const ROUTING_CONFIDENCE: f32 = 0.95;
const LINK_CONFIDENCE: f32 = 0.8;

/// Extract every category from one message.
pub fn extract(text: &str) -> Option<IntelligenceBundle> {
    if text.trim().is_empty() {
        return None;
    }

    let mut bundle = IntelligenceBundle {
        financial_accounts: accounts(text),
        routing_codes: routing_codes(text),
        payment_handles: payment_handles(text),
        phone_numbers: phone_numbers(text),
        suspicious_links: links(text),
        suspicious_keywords: keywords(&text.to_lowercase()),
        ..Default::default()
    };

    if bundle.is_empty() {
        return None;
    }
    bundle.confidence = confidence_for(&bundle);
    Some(bundle)
}

/// 9-18 digit runs, minus 10-digit runs that read as mobile numbers.
pub fn accounts(text: &str) -> BTreeSet<String> {
    ACCOUNT_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|d| !looks_like_mobile(d))
        .map(str::to_string)
        .collect()
}

fn looks_like_mobile(digits: &str) -> bool {
    digits.len() == 10 && matches!(digits.as_bytes()[0], b'6'..=b'9')
}

pub fn routing_codes(text: &str) -> BTreeSet<String> {
    ROUTING_RE
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_uppercase())
        .collect()
}

pub fn payment_handles(text: &str) -> BTreeSet<String> {
    HANDLE_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|h| {
            let domain = h.rsplit('@').next().unwrap_or_default().to_ascii_lowercase();
            HANDLE_DOMAINS.contains(&domain.as_str()) || domain.len() <= HANDLE_DOMAIN_MAX_LEN
        })
        .map(str::to_string)
        .collect()
}

pub fn phone_numbers(text: &str) -> BTreeSet<String> {
    PHONE_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Every URL-shaped token, garbled ones included; only trailing sentence
/// punctuation is stripped.
pub fn links(text: &str) -> BTreeSet<String> {
    LINK_RE
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\''])
        })
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// All matches across the urgency, financial, verification and authority sets.
pub fn keywords(lower: &str) -> BTreeSet<String> {
    KEYWORD_SETS
        .iter()
        .flat_map(|set| matching_terms(lower, set))
        .map(str::to_string)
        .collect()
}

fn confidence_for(b: &IntelligenceBundle) -> std::collections::BTreeMap<Category, f32> {
    let mut out = std::collections::BTreeMap::new();
    let scaled = |n: usize, base: f32, step: f32, cap: f32| (base + n as f32 * step).min(cap);

    if !b.financial_accounts.is_empty() {
        out.insert(
            Category::FinancialAccounts,
            scaled(b.financial_accounts.len(), 0.6, 0.1, 0.9),
        );
    }
    if !b.routing_codes.is_empty() {
        out.insert(Category::RoutingCodes, ROUTING_CONFIDENCE);
    }
    if !b.payment_handles.is_empty() {
        out.insert(
            Category::PaymentHandles,
            scaled(b.payment_handles.len(), 0.7, 0.1, 0.9),
        );
    }
    if !b.phone_numbers.is_empty() {
        out.insert(
            Category::PhoneNumbers,
            scaled(b.phone_numbers.len(), 0.6, 0.1, 0.85),
        );
    }
    if !b.suspicious_links.is_empty() {
        out.insert(Category::SuspiciousLinks, LINK_CONFIDENCE);
    }
    if !b.suspicious_keywords.is_empty() {
        out.insert(
            Category::SuspiciousKeywords,
            scaled(b.suspicious_keywords.len(), 0.4, 0.05, 0.7),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_code_is_uppercased_and_fixed_confidence() {
        let b = extract("use ifsc sbin0001234 for the transfer").unwrap();
        assert!(b.routing_codes.contains("SBIN0001234"));
        assert_eq!(b.confidence[&Category::RoutingCodes], 0.95);
    }

    #[test]
    fn long_email_domains_are_not_handles() {
        let h = payment_handles("mail me at someone@averyverylongdomain.com or pay me@ybl");
        assert!(h.contains("me@ybl"));
        assert!(!h.iter().any(|x| x.contains("averyverylongdomain")));
    }

    #[test]
    fn malformed_links_are_kept_and_trailing_punct_trimmed() {
        let l = links("go to http://secure-bank..verify/?x=1, or www.bit.ly/abc.");
        assert!(l.contains("http://secure-bank..verify/?x=1"));
        assert!(l.contains("www.bit.ly/abc"));
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn nothing_found_is_none() {
        assert!(extract("hello there, how was lunch").is_none());
        assert!(extract("   ").is_none());
    }

    #[test]
    fn keyword_confidence_grows_and_caps() {
        let b = extract("urgent: verify your bank account otp pin now, police court arrest today")
            .unwrap();
        let c = b.confidence[&Category::SuspiciousKeywords];
        assert!(c > 0.4 && c <= 0.7);
    }

    #[test]
    fn account_confidence_caps_below_one() {
        let b = extract("accounts 111111111 222222222 333333333 444444444 555555555").unwrap();
        assert_eq!(b.financial_accounts.len(), 5);
        assert!((b.confidence[&Category::FinancialAccounts] - 0.9).abs() < 1e-6);
    }
}
