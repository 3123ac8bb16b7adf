//! OpenAI chat completions wire format, also spoken by Ollama under `/v1`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

use super::{retry::ResponseShape, ChatMessage, ChatRequest};

pub const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

pub fn chat_request(
    url: String,
    bearer: Option<String>,
    model: &str,
    temperature: f32,
    messages: &[ChatMessage],
    schema: &Value,
    shape: ResponseShape,
) -> ChatRequest {
    let response_format = match shape {
        ResponseShape::Schema => json!({
            "type": "json_schema",
            "json_schema": {
                "name": "email_labels_schema",
                "strict": true,
                "schema": schema
            }
        }),
        ResponseShape::JsonObject => json!({ "type": "json_object" }),
    };

    ChatRequest {
        url,
        bearer,
        body: json!({
            "model": model,
            "temperature": temperature,
            "messages": messages,
            "response_format": response_format
        }),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error { error: ChatApiError },
}

/// Text of the first choice.
pub fn response_content(resp: &Value) -> AppResult<String> {
    let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
        .context(format!("Could not parse chat response: {}", resp))
        .map_err(|e| AppError::MalformedResponse(e.to_string()))?;

    let parsed = match parsed {
        ChatApiResponseOrError::Error { error } => {
            return Err(AppError::Upstream(500, error.message));
        }
        ChatApiResponseOrError::Response(parsed) => parsed,
    };

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::MalformedResponse("No choices in response".to_string()))?;

    Ok(choice.message.content.unwrap_or_default())
}
