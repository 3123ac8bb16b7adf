use chrono::{DateTime, Utc};

/// Read-only snapshot of a mailbox message, as far as classification needs it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    /// Plain text, already length capped by the mailbox.
    pub body: String,
    /// Mailbox-side identifiers of the labels currently applied.
    pub label_ids: Vec<String>,
    pub received_at: Option<DateTime<Utc>>,
}
