//! Keyword rules used when the model has no confident answer.
//!
//! Rules are checked in priority order, billing and security signals first,
//! and a label is taken the first time one of its keywords occurs anywhere in
//! subject, sender or body. A label may own more than one rule.

use crate::model::labels::{LabelVocabulary, MAX_LABELS_PER_MESSAGE};

pub type KeywordRule = (&'static str, &'static [&'static str]);

pub const KEYWORD_RULES: [KeywordRule; 17] = [
    (
        "Rechnung(en)",
        &[
            "rechnung",
            "invoice",
            "faktura",
            "zahlungsfrist",
            "beleg",
            "faktur",
            "rechnungsnummer",
            "rechnung von",
            "invoice from",
        ],
    ),
    (
        "Banking",
        &[
            "sparkasse",
            "volksbank",
            "commerzbank",
            "dkb",
            "n26",
            "revolut",
            "konto",
            "überweisung",
            "visa",
            "mastercard",
        ],
    ),
    (
        "Account",
        &[
            "passwort",
            "password",
            "2fa",
            "two-factor",
            "bestätigungscode",
            "verification code",
            "sicherheitswarnung",
            "kontoaktivität",
        ],
    ),
    (
        "Newsletter",
        &[
            "unsubscribe",
            "abmelden",
            "newsletter",
            "newsletter@",
            "list-unsubscribe",
            "preferences",
            "manage subscription",
        ],
    ),
    (
        "Social Media",
        &[
            "linkedin",
            "instagram",
            "facebook",
            "youtube",
            "tiktok",
            "twitter",
            "x.com",
            "twitch",
        ],
    ),
    (
        "Support",
        &["hilfe", "support", "problem", "fehler", "bug", "ticket", "störung"],
    ),
    (
        "Shopping",
        &[
            "bestellung",
            "auftrag",
            "lieferung",
            "track",
            "sendungsverfolgung",
            "versandbestätigung",
            "bestellnummer",
            "kunde",
            "kundennummer",
        ],
    ),
    (
        "Angebote",
        &["angebot", "sale", "rabatt", "deal", "gutschein", "% rabatt"],
    ),
    (
        "Streaming",
        &["netflix", "prime video", "disney+", "spotify", "paramount+"],
    ),
    (
        "Gaming",
        &[
            "game",
            "gaming",
            "videospiel",
            "videospiels",
            "spiel ",
            "konsole",
            "steam",
            "epic games",
            "xbox",
            "playstation",
            "ps5",
            "ps4",
            "nintendo",
            "switch",
        ],
    ),
    (
        "Klamotten",
        &["mode", "fashion", "klamotten", "retoure", "größe"],
    ),
    (
        "Shopping",
        &[
            "bestellung",
            "order",
            "eingegangen",
            "versandbestätigung",
            "sendungsverfolgung",
            "lieferung",
            "tracking",
            "bestellnummer",
            "shop",
            "kauf",
            "checkout",
        ],
    ),
    (
        "Technik",
        &[
            "technik",
            "hardware",
            "software",
            "release notes",
            "firmware",
            "update",
        ],
    ),
    (
        "Sport",
        &["verein", "fitness", "workout", "trainer", "spielplan", "liga"],
    ),
    (
        "Arbeit",
        &[
            "meeting",
            "projekt",
            "onboarding",
            "offboarding",
            "hr@",
            "zulieferer",
            "rechnungstellung",
            "angebot",
        ],
    ),
    (
        "Events",
        &["termin", "einladung", "webinar", "konferenz", "kalender", "ics "],
    ),
    ("FYI", &["zur info", "fyi", "info:", "update:", "status-"]),
];

/// Deterministic keyword classifier restricted to a vocabulary.
#[derive(Debug, Clone)]
pub struct KeywordHeuristics {
    rules: Vec<KeywordRule>,
}

impl KeywordHeuristics {
    /// Keeps only the rules whose label is a specific label of `vocabulary`.
    pub fn new(vocabulary: &LabelVocabulary) -> Self {
        Self::with_rules(vocabulary, &KEYWORD_RULES)
    }

    pub fn with_rules(vocabulary: &LabelVocabulary, rules: &[KeywordRule]) -> Self {
        let rules = rules
            .iter()
            .filter(|(label, _)| vocabulary.is_specific(label))
            .copied()
            .collect();
        Self { rules }
    }

    /// Up to three labels in rule priority order. Empty means no opinion,
    /// which is not the same as the catch-all.
    pub fn classify(&self, subject: &str, sender: &str, body: &str) -> Vec<String> {
        let text = format!("{subject}\n{sender}\n{body}").to_lowercase();

        let mut labels: Vec<String> = Vec::new();
        for (label, keywords) in &self.rules {
            if labels.len() >= MAX_LABELS_PER_MESSAGE {
                break;
            }
            if labels.iter().any(|l| l == label) {
                continue;
            }
            if keywords.iter().any(|k| text.contains(k)) {
                labels.push(label.to_string());
            }
        }

        labels
    }
}
