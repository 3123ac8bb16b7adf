//! Gmail API quota units per method.
//!
//! Gmail charges each call against a per-user quota of 250 units per second.
//! See <https://developers.google.com/gmail/api/reference/quota>.

pub const GMAIL_QUOTA_PER_SECOND: usize = 250;

#[derive(Debug, Clone, Copy)]
pub struct GmailApiQuota {
    pub messages_list: usize,
    pub messages_get: usize,
    pub messages_batch_modify: usize,
    pub labels_list: usize,
    pub labels_create: usize,
    pub labels_patch: usize,
}

pub const GMAIL_API_QUOTA: GmailApiQuota = GmailApiQuota {
    messages_list: 5,
    messages_get: 5,
    messages_batch_modify: 50,
    labels_list: 1,
    labels_create: 5,
    labels_patch: 5,
};
