pub mod classifier;
pub mod extract;
pub(crate) mod ollama;
pub(crate) mod openai;
pub mod retry;
pub mod transport;

pub use classifier::{AiClassifier, AiProvider, ClassifyAi};
pub use transport::ChatTransport;

use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{model::LabelVocabulary, util::truncate_chars};

/// Characters of the message body sent to the model.
pub const PROMPT_BODY_CHARS: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// (From, Subject, Body, Labels)
const FEW_SHOTS: [(&str, &str, &str, &[&str]); 4] = [
    (
        "rechnung@firma.de",
        "Ihre Rechnung 2025-09",
        "Betrag 129,00 EUR, Zahlungsziel 14 Tage.",
        &["Rechnung(en)"],
    ),
    (
        "shop@beispiel.de",
        "Versandbestätigung Bestellung 12345",
        "Ihr Paket ist unterwegs, Tracking enthalten.",
        &["Shopping"],
    ),
    (
        "noreply@account.com",
        "Neues Konto eingerichtet",
        "Bitte bestätigen Sie Ihre E-Mail.",
        &["Account"],
    ),
    (
        "news@anbieter.de",
        "Angebote der Woche",
        "-20% auf alles, jetzt zugreifen.",
        &["Angebote", "Newsletter"],
    ),
];

fn format_mail(sender: &str, subject: &str, body: &str) -> String {
    format!("From: {sender}\nSubject: {subject}\nBody: {body}")
}

fn labels_answer(labels: &[String]) -> String {
    json!({ "labels": labels }).to_string()
}

/// Instructions, worked examples and output schema for one vocabulary.
///
/// Everything except the final user turn is identical between calls.
#[derive(Debug, Clone)]
pub struct LabelPrompt {
    system: String,
    shots: Vec<ChatMessage>,
    schema: Value,
}

impl LabelPrompt {
    pub fn new(vocabulary: &LabelVocabulary) -> Self {
        let allowed = vocabulary.ai_labels();
        let catch_all = vocabulary.catch_all();
        let system = formatdoc!(
            "
            Du bist ein präziser E-Mail-Klassifizierer. Wähle 1-3 Labels aus: {labels}.
            Wenn nichts passt, nutze '{catch_all}'.
            Antworte ausschließlich mit JSON im Format {{\"labels\":[\"...\"]}}.
            Bevorzuge spezifische Labels vor '{catch_all}'.",
            labels = allowed.join(", ")
        );

        // Examples only teach labels the vocabulary still has.
        let shots = FEW_SHOTS
            .iter()
            .filter_map(|(sender, subject, body, labels)| {
                let labels = labels
                    .iter()
                    .filter(|l| vocabulary.is_specific(l))
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>();
                (!labels.is_empty()).then(|| {
                    [
                        ChatMessage::user(format_mail(sender, subject, body)),
                        ChatMessage::assistant(labels_answer(&labels)),
                    ]
                })
            })
            .flatten()
            .collect();

        let schema = json!({
            "type": "object",
            "properties": {
                "labels": {
                    "type": "array",
                    "items": { "type": "string", "enum": allowed },
                    "minItems": 1,
                    "maxItems": 3
                }
            },
            "required": ["labels"],
            "additionalProperties": false
        });

        Self {
            system,
            shots,
            schema,
        }
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn conversation(&self, sender: &str, subject: &str, body: &str) -> Vec<ChatMessage> {
        let body = truncate_chars(body, PROMPT_BODY_CHARS);
        let mut messages = Vec::with_capacity(self.shots.len() + 2);
        messages.push(ChatMessage::system(self.system.clone()));
        messages.extend(self.shots.iter().cloned());
        messages.push(ChatMessage::user(format_mail(sender, subject, body)));
        messages
    }
}

/// A request ready to be posted by a [`ChatTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub url: String,
    pub bearer: Option<String>,
    pub body: Value,
}
