//! Keyword vocabularies shared by the extractor and the scorers, plus
//! boundary-aware term matching.
//!
//! All lists are lowercase. Callers lowercase the input once and match with
//! [`contains_term`]. A hit must start at a word boundary but may run on into
//! a longer word, so `arrest` fires inside `arrested` while `now` does not fire
//! inside `know`.

// ---- suspicious keyword sets (extractor) ----

pub const URGENCY: &[&str] = &[
    "immediate",
    "urgent",
    "quickly",
    "fast",
    "hurry",
    "asap",
    "now",
    "today",
    "expire",
    "expires",
    "deadline",
    "limited time",
    "act now",
    "don't wait",
    "emergency",
    "critical",
    "important",
    "final notice",
    "last chance",
];

pub const FINANCIAL: &[&str] = &[
    "bank account",
    "account number",
    "routing number",
    "ifsc",
    "upi",
    "paytm",
    "gpay",
    "phonepe",
    "transfer money",
    "send money",
    "payment",
    "deposit",
    "withdraw",
    "atm",
    "pin",
    "otp",
    "cvv",
    "card number",
    "debit card",
    "credit card",
    "net banking",
    "mobile banking",
];

pub const VERIFICATION: &[&str] = &[
    "verify",
    "confirm",
    "validate",
    "authenticate",
    "check",
    "update",
    "suspended",
    "blocked",
    "frozen",
    "locked",
    "compromised",
    "security",
    "fraud",
    "unauthorized",
    "suspicious activity",
];

pub const AUTHORITY: &[&str] = &[
    "bank",
    "government",
    "police",
    "officer",
    "official",
    "department",
    "ministry",
    "rbi",
    "reserve bank",
    "income tax",
    "customs",
    "cbi",
    "cyber crime",
    "investigation",
    "legal action",
    "court",
    "arrest",
];

pub const KEYWORD_SETS: [&[&str]; 4] = [URGENCY, FINANCIAL, VERIFICATION, AUTHORITY];

// ---- scam estimator categories ----

pub const SCAM_URGENCY: &[&str] = &[
    "immediate",
    "urgent",
    "asap",
    "quickly",
    "hurry",
    "fast",
    "expire",
    "deadline",
    "limited time",
    "act now",
];

pub const SCAM_FINANCIAL: &[&str] = &[
    "bank account",
    "send money",
    "transfer",
    "payment",
    "deposit",
    "otp",
    "pin",
    "cvv",
    "card number",
    "ifsc",
    "upi",
];

pub const SCAM_AUTHORITY: &[&str] = &[
    "government",
    "police",
    "bank",
    "officer",
    "official",
    "rbi",
    "income tax",
    "customs",
    "investigation",
];

pub const SCAM_THREATS: &[&str] = &[
    "arrest",
    "legal action",
    "court",
    "penalty",
    "fine",
    "suspended",
    "blocked",
    "frozen",
    "trouble",
];

pub const SCAM_VERIFICATION: &[&str] = &[
    "verify",
    "confirm",
    "validate",
    "authenticate",
    "update",
    "security",
    "fraud",
    "suspicious activity",
];

// ---- behavior scorer ----

pub const AGGRESSIVE: &[&str] = &[
    "must",
    "have to",
    "need to",
    "required",
    "mandatory",
    "immediately",
    "now",
    "urgent",
    "critical",
    "important",
    "serious",
    "warning",
    "penalty",
    "fine",
    "arrest",
    "legal action",
    "court",
    "police",
];

pub const THREATS: &[&str] = &[
    "arrest",
    "jail",
    "prison",
    "legal action",
    "court case",
    "penalty",
    "fine",
    "punishment",
    "consequences",
    "trouble",
    "problem",
];

pub const DEMANDS: &[&str] = &[
    "send immediately",
    "transfer now",
    "provide details",
    "give me",
    "tell me",
    "share your",
    "confirm your",
];

pub const TECHNICAL: &[&str] = &[
    "verification",
    "authentication",
    "security protocol",
    "encryption",
    "digital signature",
    "otp",
    "two-factor",
    "biometric",
    "kyc",
];

pub const PROFESSIONAL: &[&str] = &[
    "procedure",
    "protocol",
    "compliance",
    "regulation",
    "policy",
    "guidelines",
    "standard",
    "process",
    "documentation",
];

pub const NAMED_AUTHORITY: &[&str] = &[
    "reserve bank of india",
    "rbi",
    "income tax department",
    "cbdt",
    "enforcement directorate",
    "cyber crime cell",
    "investigation",
];

pub const TIME_PRESSURE: &[&str] = &["immediately", "now", "urgent", "asap", "quickly"];
pub const DEADLINE_THREAT: &[&str] = &["expire", "deadline", "limited time", "last chance"];
pub const CONSEQUENCE_THREAT: &[&str] = &["penalty", "fine", "arrest", "legal action"];
pub const ACCOUNT_THREAT: &[&str] = &["suspended", "blocked", "closed", "frozen"];

pub const SE_AUTHORITY: &[&str] = &[
    "i am calling from",
    "this is",
    "speaking from",
    "bank representative",
    "government official",
    "police officer",
    "tax department",
];
pub const SE_URGENCY: &[&str] = &[
    "immediate action required",
    "account will be closed",
    "legal action",
    "arrest warrant",
    "penalty",
    "fine",
    "suspension",
];
pub const SE_FEAR: &[&str] = &[
    "fraud detected",
    "suspicious activity",
    "unauthorized access",
    "security breach",
    "account compromised",
    "illegal activity",
];
pub const SE_TRUST: &[&str] = &[
    "for your security",
    "to protect you",
    "verification process",
    "security update",
    "safety measure",
    "precautionary",
];
pub const SE_INFO: &[&str] = &[
    "confirm your",
    "verify your",
    "provide your",
    "share your",
    "tell me your",
    "what is your",
    "send me your",
];

/// Keywords marking an information request (persistence detection).
pub const INFO_REQUEST: &[&str] = &["send", "provide", "confirm", "verify"];
/// Keywords marking escalation in recent adversary turns.
pub const ESCALATION: &[&str] = &["arrest", "legal", "police", "court", "penalty"];

pub const MANIPULATION: &[&str] = &[
    "for your safety",
    "to protect you",
    "help you",
    "save you",
    "trust me",
    "believe me",
    "i understand",
    "don't worry",
    "fear",
    "scared",
    "worried",
    "concerned",
    "urgent",
];

/// True if `term` occurs in `haystack` starting at a word boundary.
/// Inflected forms (`payments`, `verified`) match. Both arguments are
/// expected lowercase.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(term).any(|(start, _)| {
        haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Like [`contains_term`], but the hit must also end on a word boundary, so
/// `forge` does not fire inside `forget`.
pub fn contains_word(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(term).any(|(start, hit)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + hit.len()..].chars().next();
        before.map_or(true, |c| !c.is_alphanumeric()) && after.map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Number of distinct terms from `terms` present in `haystack`.
pub fn count_terms(haystack: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| contains_term(haystack, t)).count()
}

pub fn any_term(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| contains_term(haystack, t))
}

/// Terms from `terms` present in `haystack`, in list order.
pub fn matching_terms<'a>(haystack: &str, terms: &[&'a str]) -> Vec<&'a str> {
    terms
        .iter()
        .copied()
        .filter(|t| contains_term(haystack, t))
        .collect()
}

/// Fraction of uppercase characters over all characters.
pub fn caps_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let upper = text.chars().filter(|c| c.is_uppercase()).count();
    upper as f32 / total as f32
}
