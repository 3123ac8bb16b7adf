use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    HttpClient,
};

use super::ChatRequest;

/// Posts a JSON request to an AI provider and returns the JSON answer.
///
/// Non-success statuses come back as the matching [`AppError`] class so the
/// retry policy can tell a schema rejection from a dead server.
pub trait ChatTransport {
    async fn post_json(&self, request: &ChatRequest) -> AppResult<Value>;
}

impl ChatTransport for HttpClient {
    async fn post_json(&self, request: &ChatRequest) -> AppResult<Value> {
        let mut builder = self.post(&request.url).json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::from_status(status, body));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| AppError::MalformedResponse(e.to_string()))
    }
}
