//! Static persona replies used when the reply advisory is unavailable.
//!
//! Selection is deterministic: the first matching keyword group wins and the
//! variant within a group rotates with the turn number.

use crate::analyze::lexicon::any_term;

struct Template {
    triggers: &'static [&'static str],
    plain: &'static str,
    regional: &'static [&'static str],
}

const TEMPLATES: &[Template] = &[
    Template {
        triggers: &["link", "click", "url", "website"],
        plain: "I'm not good with links. Can you just give me your account details instead?",
        regional: &[
            "Beta, links are confusing for me. Can you please send your bank account number or UPI ID directly? My nephew will transfer the money.",
            "Arrey, I don't know how to click links properly. Can you just give me your account details? It's easier for me.",
            "I'm not good with these computer things. Just tell me your UPI ID, na? I'll ask my son to send money.",
        ],
    },
    Template {
        triggers: &["download", "install", "app", "application"],
        plain: "I don't know how to download apps. Can you give me your phone number instead?",
        regional: &[
            "Beta, I don't know how to download apps. Can you just give me your phone number? I'll call you and we can do it over phone.",
            "Downloading is too complicated for me. What is your UPI ID? I can send money through PhonePe.",
            "Arrey, my phone is old. Just tell me your bank account number, I'll go to bank and transfer.",
        ],
    },
    Template {
        triggers: &["verify", "confirm", "validate", "check"],
        plain: "Sure, I'll verify. But can you tell me your details first so I know you're genuine?",
        regional: &[
            "Of course beta, I want to help. But first, can you tell me your details so I know you're genuine? What's your UPI ID?",
            "Yes yes, I'll verify. But you also tell me your bank account number, na? So I know you're really from bank.",
            "Sure beta, but banks also have accounts, right? What's your official UPI ID for receiving payments?",
        ],
    },
    Template {
        triggers: &["urgent", "immediate", "immediately", "quickly", "asap", "hurry"],
        plain: "I understand it's urgent, but I need to be careful. What's your contact information?",
        regional: &[
            "Arrey, don't worry beta. These things take time. First tell me your phone number, I'll call you back.",
            "Okay okay, I understand it's urgent. But I'm old, I need to be careful. What's your UPI ID so I can verify you're real?",
            "Beta, I want to help quickly, but my son told me to always ask for bank details first. What's your account number?",
        ],
    },
    Template {
        triggers: &["money", "payment", "transfer", "send", "pay"],
        plain: "I can help with money, but I need your account details first. What's your UPI ID?",
        regional: &["Arrey beta, I want to help with money. But first tell me your UPI ID, na? So I can send properly."],
    },
    Template {
        triggers: &["account", "bank", "card", "otp", "pin"],
        plain: "I'm not good with banking. Can you help me understand and share your account details?",
        regional: &["Beta, I'm confused about bank things. Can you explain and also tell me your account number?"],
    },
    Template {
        triggers: &["arrest", "police", "legal", "suspended", "blocked"],
        plain: "That sounds serious! I want to help. Can you give me your contact details first?",
        regional: &["Arrey, that sounds serious beta! I want to help. First tell me your phone number so I can call you back."],
    },
    Template {
        triggers: &["government", "official", "department", "ministry"],
        plain: "You're from the government? Can you give me your official contact details for verification?",
        regional: &["Oh, you're from government? That's good beta. What's your official UPI ID? I want to verify you're real."],
    },
];

const GENERIC_PLAIN: &[&str] = &[
    "I want to help you. Can you tell me more and share your contact details?",
    "I'm trying to understand. Can you explain and give me your phone number?",
    "I'm a bit confused. Can you help me understand and share your account details?",
    "You seem knowledgeable. Can you guide me and tell me your contact information?",
    "I want to help, but I need your details first to make sure everything is correct.",
];

const GENERIC_REGIONAL: &[&str] = &[
    "Beta, I want to help you. Can you tell me more and also share your contact details?",
    "I'm trying to understand. Can you explain again and give me your phone number?",
    "Arrey, I'm a bit confused. Help me understand and tell me your UPI ID, na?",
    "Beta, you seem to know a lot. Can you guide me and share your account details?",
    "I want to help, but I need your information first to make sure everything is proper.",
];

/// Reply for invalid input.
pub const NEUTRAL_REPLY: &str = "Sorry, I didn't catch that. Could you say it again?";
/// Reply when a turn fails internally.
pub const APOLOGY_REPLY: &str = "Sorry, something went wrong on my side. Could you repeat that?";
/// Reply for conversations not (yet) judged fraudulent.
pub const CASUAL_REPLY: &str =
    "I'm not sure I understand. Could you please clarify what you need help with?";

/// Template reply keyed on the adversary's wording. Never empty.
pub fn template_reply(text: &str, regional: bool, turn: usize) -> &'static str {
    let lower = text.to_lowercase();
    for t in TEMPLATES {
        if any_term(&lower, t.triggers) {
            return if regional {
                t.regional[turn % t.regional.len()]
            } else {
                t.plain
            };
        }
    }
    let pool = if regional {
        GENERIC_REGIONAL
    } else {
        GENERIC_PLAIN
    };
    pool[turn % pool.len()]
}
