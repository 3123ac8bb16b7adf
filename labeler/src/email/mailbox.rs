use crate::model::MailMessage;

use super::registry::LabelRegistry;

/// What the orchestrator needs from a mailbox.
pub trait Mailbox {
    /// Ids of messages matching `query`, at most `limit`, newest first.
    async fn list_candidate_ids(&self, query: &str, limit: u32) -> anyhow::Result<Vec<String>>;

    async fn fetch_message(&self, id: &str) -> anyhow::Result<MailMessage>;

    /// User labels known to the mailbox. Never mutates.
    async fn list_labels(&self) -> anyhow::Result<LabelRegistry>;

    /// Registry covering `names`, creating the labels that do not exist yet.
    async fn ensure_labels(&self, names: &[String]) -> anyhow::Result<LabelRegistry>;

    async fn add_labels(&self, message_ids: &[String], label_ids: &[String]) -> anyhow::Result<()>;

    async fn remove_labels(&self, message_ids: &[String], label_ids: &[String])
        -> anyhow::Result<()>;
}
