extern crate google_gmail1 as gmail1;

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use gmail1::api::{Label, ListLabelsResponse, ListMessagesResponse, Message};
use leaky_bucket::RateLimiter;
use lib_email_clients::gmail::{
    api_quota::{GMAIL_API_QUOTA, GMAIL_QUOTA_PER_SECOND},
    label_colors::GmailLabelColorMap,
};
use serde_json::{json, Value};

use crate::{model::MailMessage, HttpClient};

use super::{mailbox::Mailbox, registry::LabelRegistry, simplified_message};

/// Gmail API error response structure
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GmailApiError {
    pub error: GmailApiErrorDetail,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GmailApiErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

macro_rules! gmail_url {
    ($($params:expr),*) => {
        {
            const GMAIL_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
            let list_params = vec![$($params),*];
            let path = list_params.join("/");
            format!("{}/{}", GMAIL_ENDPOINT, path)
        }
    };
}

/// `messages.list` page size limit we ask for.
pub const MAX_MESSAGES_PER_PAGE: u32 = 100;
/// `messages.batchModify` accepts at most this many ids per call.
pub const MAX_IDS_PER_BATCH_MODIFY: usize = 1000;

#[derive(Clone)]
pub struct GmailClient {
    http_client: HttpClient,
    access_token: String,
    rate_limiter: Arc<RateLimiter>,
    /// Present when created labels get palette colors.
    colors: Option<Arc<GmailLabelColorMap>>,
}

impl GmailClient {
    pub fn new(http_client: HttpClient, access_token: String, set_label_colors: bool) -> Self {
        let rate_limiter = Arc::new(
            RateLimiter::builder()
                .initial(GMAIL_QUOTA_PER_SECOND)
                .interval(Duration::from_secs(1))
                .refill(GMAIL_QUOTA_PER_SECOND)
                .build(),
        );

        GmailClient {
            http_client,
            access_token,
            rate_limiter,
            colors: set_label_colors.then(|| Arc::new(GmailLabelColorMap::new())),
        }
    }

    pub async fn get_message_list(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> anyhow::Result<ListMessagesResponse> {
        self.rate_limiter
            .acquire(GMAIL_API_QUOTA.messages_list)
            .await;

        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("maxResults".to_string(), max_results.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken".to_string(), token));
        }

        let resp = self
            .http_client
            .get(gmail_url!("messages"))
            .query(&params)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        Ok(error_for_status(resp, "listing messages")
            .await?
            .json::<ListMessagesResponse>()
            .await?)
    }

    pub async fn get_message_by_id(&self, message_id: &str) -> anyhow::Result<Message> {
        self.rate_limiter
            .acquire(GMAIL_API_QUOTA.messages_get)
            .await;
        let resp = self
            .http_client
            .get(gmail_url!("messages", message_id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "RAW")])
            .send()
            .await?;

        error_for_status(resp, "getting message")
            .await?
            .json::<Message>()
            .await
            .context("Error getting message")
    }

    pub async fn get_labels(&self) -> anyhow::Result<Vec<Label>> {
        self.rate_limiter.acquire(GMAIL_API_QUOTA.labels_list).await;
        let resp = self
            .http_client
            .get(gmail_url!("labels"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let data = error_for_status(resp, "listing labels")
            .await?
            .json::<ListLabelsResponse>()
            .await?;

        Ok(data.labels.unwrap_or_default())
    }

    pub async fn create_label(&self, name: &str) -> anyhow::Result<Label> {
        self.rate_limiter
            .acquire(GMAIL_API_QUOTA.labels_create)
            .await;

        let label = Label {
            type_: Some("user".to_string()),
            color: self.colors.as_ref().map(|c| c.get(name)),
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let resp = self
            .http_client
            .post(gmail_url!("labels"))
            .bearer_auth(&self.access_token)
            .json(&label)
            .send()
            .await?;
        let data = resp.json::<Value>().await?;
        if let Some(error) = data.get("error") {
            return Err(anyhow!("Error creating label {}: {:?}", name, error));
        }

        Ok(serde_json::from_value(data)?)
    }

    /// Best effort, a rejected color leaves the label as it is.
    pub async fn set_label_color(&self, label_id: &str, name: &str) {
        let Some(colors) = &self.colors else {
            return;
        };
        self.rate_limiter
            .acquire(GMAIL_API_QUOTA.labels_patch)
            .await;

        let result = self
            .http_client
            .patch(gmail_url!("labels", label_id))
            .bearer_auth(&self.access_token)
            .json(&json!({ "color": colors.get(name) }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!("Could not set color of label {}: {} {}", name, status, body);
            }
            Err(e) => tracing::warn!("Could not set color of label {}: {}", name, e),
        }
    }

    pub async fn batch_modify(
        &self,
        message_ids: &[String],
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> anyhow::Result<()> {
        for chunk in message_ids.chunks(MAX_IDS_PER_BATCH_MODIFY) {
            self.rate_limiter
                .acquire(GMAIL_API_QUOTA.messages_batch_modify)
                .await;

            let resp = self
                .http_client
                .post(gmail_url!("messages", "batchModify"))
                .bearer_auth(&self.access_token)
                .json(&batch_modify_body(chunk, add_label_ids, remove_label_ids))
                .send()
                .await?;
            error_for_status(resp, "batchModify").await?;
        }

        Ok(())
    }
}

async fn error_for_status(resp: reqwest::Response, action: &str) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<GmailApiError>(&text) {
        Ok(error) => Err(anyhow!(
            "Gmail error {} {}: {} (code: {})",
            action,
            error.error.status.unwrap_or_default(),
            error.error.message,
            error.error.code
        )),
        Err(_) => Err(anyhow!("Gmail error {}: {} {}", action, status, text)),
    }
}

fn batch_modify_body(ids: &[String], add_label_ids: &[String], remove_label_ids: &[String]) -> Value {
    let mut body = json!({ "ids": ids });
    if !add_label_ids.is_empty() {
        body["addLabelIds"] = json!(add_label_ids);
    }
    if !remove_label_ids.is_empty() {
        body["removeLabelIds"] = json!(remove_label_ids);
    }
    body
}

fn page_size(collected: usize, limit: u32) -> u32 {
    (limit.saturating_sub(collected as u32)).min(MAX_MESSAGES_PER_PAGE)
}

fn user_label_registry(labels: Vec<Label>) -> LabelRegistry {
    LabelRegistry::from_pairs(
        labels
            .into_iter()
            .filter(|l| l.type_.as_deref() == Some("user"))
            .filter_map(|l| Some((l.name?, l.id?))),
    )
}

impl Mailbox for GmailClient {
    async fn list_candidate_ids(&self, query: &str, limit: u32) -> anyhow::Result<Vec<String>> {
        let mut collected: Vec<String> = Vec::new();
        let mut page_token = None;

        loop {
            let max_results = page_size(collected.len(), limit);
            if max_results == 0 {
                break;
            }

            let page = self.get_message_list(query, max_results, page_token).await?;
            let messages = page.messages.unwrap_or_default();
            let got = messages.len();
            collected.extend(messages.into_iter().filter_map(|m| m.id));

            page_token = page.next_page_token;
            if page_token.is_none() || got == 0 {
                break;
            }
        }

        collected.truncate(limit as usize);
        Ok(collected)
    }

    async fn fetch_message(&self, id: &str) -> anyhow::Result<MailMessage> {
        let message = self.get_message_by_id(id).await?;
        simplified_message::from_gmail_message(&message)
    }

    async fn list_labels(&self) -> anyhow::Result<LabelRegistry> {
        Ok(user_label_registry(self.get_labels().await?))
    }

    async fn ensure_labels(&self, names: &[String]) -> anyhow::Result<LabelRegistry> {
        let mut registry = self.list_labels().await?;

        for name in names {
            match registry.id(name).map(str::to_string) {
                Some(id) => self.set_label_color(&id, name).await,
                None => {
                    let label = self
                        .create_label(name)
                        .await
                        .with_context(|| format!("Could not create label {name}"))?;
                    let id = label
                        .id
                        .with_context(|| format!("Created label {name} has no id"))?;
                    tracing::info!("Created label {} ({})", name, id);
                    registry.insert(name.clone(), id);
                }
            }
        }

        Ok(registry)
    }

    async fn add_labels(&self, message_ids: &[String], label_ids: &[String]) -> anyhow::Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        self.batch_modify(message_ids, label_ids, &[]).await
    }

    async fn remove_labels(
        &self,
        message_ids: &[String],
        label_ids: &[String],
    ) -> anyhow::Result<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        self.batch_modify(message_ids, &[], label_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmail_url() {
        let url = gmail_url!("messages");
        assert_eq!(url, "https://gmail.googleapis.com/gmail/v1/users/me/messages");
        let url = gmail_url!("messages", "batchModify");
        assert_eq!(
            url,
            "https://gmail.googleapis.com/gmail/v1/users/me/messages/batchModify"
        );
    }

    #[test]
    fn test_batch_modify_body() {
        let ids = vec!["m1".to_string(), "m2".to_string()];
        let body = batch_modify_body(&ids, &["Label_1".to_string()], &[]);
        assert_eq!(body, json!({"ids": ["m1", "m2"], "addLabelIds": ["Label_1"]}));

        let body = batch_modify_body(&ids, &[], &["Label_2".to_string()]);
        assert_eq!(body, json!({"ids": ["m1", "m2"], "removeLabelIds": ["Label_2"]}));
    }

    #[test]
    fn test_page_size() {
        assert_eq!(page_size(0, 20), 20);
        assert_eq!(page_size(0, 250), 100);
        assert_eq!(page_size(200, 250), 50);
        assert_eq!(page_size(20, 20), 0);
        assert_eq!(page_size(30, 20), 0);
    }

    #[test]
    fn test_user_label_registry_ignores_system_labels() {
        let labels = serde_json::from_value::<Vec<Label>>(json!([
            {"id": "INBOX", "name": "INBOX", "type": "system"},
            {"id": "Label_1", "name": "Shopping", "type": "user"},
            {"id": "Label_2", "type": "user"}
        ]))
        .unwrap();

        let registry = user_label_registry(labels);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id("Shopping"), Some("Label_1"));
    }

    #[test]
    fn test_gmail_error_parses() {
        let error = serde_json::from_str::<GmailApiError>(
            r#"{"error": {"code": 409, "message": "Label name exists or conflicts", "status": "ABORTED"}}"#,
        )
        .unwrap();
        assert_eq!(error.error.code, 409);
        assert_eq!(error.error.status.as_deref(), Some("ABORTED"));
    }
}
