//! Native Ollama chat API.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

use super::{retry::ResponseShape, ChatMessage, ChatRequest};

pub const NATIVE_CHAT_PATH: &str = "api/chat";
pub const COMPATIBLE_CHAT_PATH: &str = "v1/chat/completions";

/// Older Ollama releases reject a schema in `format` with 400 and only know
/// `"json"`.
pub fn chat_request(
    url: String,
    model: &str,
    temperature: f32,
    messages: &[ChatMessage],
    schema: &Value,
    shape: ResponseShape,
) -> ChatRequest {
    let format = match shape {
        ResponseShape::Schema => schema.clone(),
        ResponseShape::JsonObject => json!("json"),
    };

    ChatRequest {
        url,
        bearer: None,
        body: json!({
            "model": model,
            "messages": messages,
            "format": format,
            "options": { "temperature": temperature },
            "stream": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    error: Option<String>,
}

pub fn response_content(resp: &Value) -> AppResult<String> {
    let parsed = serde_json::from_value::<OllamaChatResponse>(resp.clone())?;
    if let Some(error) = parsed.error {
        return Err(AppError::Upstream(500, error));
    }
    Ok(parsed.message.map(|m| m.content).unwrap_or_default())
}
