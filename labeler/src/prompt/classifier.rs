use std::sync::Arc;

use serde_json::Value;

use crate::{error::AppResult, model::LabelVocabulary};

use super::{
    extract::{extract_labels_object, labels_from_object},
    ollama, openai,
    retry::{EndpointKind, RequestState, RetryPolicy, RetryStep},
    ChatMessage, ChatRequest, ChatTransport, LabelPrompt,
};

/// Anything that turns a message into labels with a language model.
///
/// Implementations never fail: when the model cannot be reached or answers
/// nonsense the result is the catch-all label.
pub trait ClassifyAi {
    async fn classify_ai(&self, sender: &str, subject: &str, body: &str) -> Vec<String>;
}

/// Backend chosen once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi {
        base_url: String,
        model: String,
        api_key: Option<String>,
    },
    Ollama {
        base_url: String,
        model: String,
    },
}

impl AiProvider {
    pub fn name(&self) -> &'static str {
        match self {
            AiProvider::OpenAi { .. } => "openai",
            AiProvider::Ollama { .. } => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            AiProvider::OpenAi { model, .. } | AiProvider::Ollama { model, .. } => model,
        }
    }

    fn is_configured(&self) -> bool {
        match self {
            AiProvider::OpenAi { api_key, .. } => api_key.as_ref().is_some_and(|k| !k.is_empty()),
            AiProvider::Ollama { .. } => true,
        }
    }

    fn has_compatible_endpoint(&self) -> bool {
        matches!(self, AiProvider::Ollama { .. })
    }

    fn build_request(
        &self,
        state: &RequestState,
        messages: &[ChatMessage],
        schema: &Value,
        temperature: f32,
    ) -> ChatRequest {
        match (self, state.endpoint) {
            (
                AiProvider::OpenAi {
                    base_url,
                    model,
                    api_key,
                },
                _,
            ) => openai::chat_request(
                endpoint_url(base_url, openai::CHAT_COMPLETIONS_PATH),
                api_key.clone(),
                model,
                temperature,
                messages,
                schema,
                state.shape,
            ),
            (AiProvider::Ollama { base_url, model }, EndpointKind::Primary) => {
                ollama::chat_request(
                    endpoint_url(base_url, ollama::NATIVE_CHAT_PATH),
                    model,
                    temperature,
                    messages,
                    schema,
                    state.shape,
                )
            }
            (AiProvider::Ollama { base_url, model }, EndpointKind::Compatible) => {
                openai::chat_request(
                    endpoint_url(base_url, ollama::COMPATIBLE_CHAT_PATH),
                    None,
                    model,
                    temperature,
                    messages,
                    schema,
                    state.shape,
                )
            }
        }
    }

    fn response_content(&self, endpoint: EndpointKind, resp: &Value) -> AppResult<String> {
        match (self, endpoint) {
            (AiProvider::Ollama { .. }, EndpointKind::Primary) => ollama::response_content(resp),
            _ => openai::response_content(resp),
        }
    }
}

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

pub struct AiClassifier<T> {
    transport: T,
    provider: AiProvider,
    prompt: LabelPrompt,
    vocabulary: Arc<LabelVocabulary>,
    policy: RetryPolicy,
    temperature: f32,
}

impl<T: ChatTransport> AiClassifier<T> {
    pub fn new(
        transport: T,
        provider: AiProvider,
        vocabulary: Arc<LabelVocabulary>,
        policy: RetryPolicy,
        temperature: f32,
    ) -> Self {
        if !provider.is_configured() {
            tracing::warn!(
                "No API key for provider {}, every message will be labeled {}",
                provider.name(),
                vocabulary.catch_all()
            );
        }
        Self {
            transport,
            prompt: LabelPrompt::new(&vocabulary),
            provider,
            vocabulary,
            policy,
            temperature,
        }
    }

    /// Raw model answer, after the retry policy ran its course.
    async fn complete(&self, sender: &str, subject: &str, body: &str) -> AppResult<String> {
        let messages = self.prompt.conversation(sender, subject, body);
        let mut state = RequestState::new(self.provider.has_compatible_endpoint());
        let mut attempt = 0;

        loop {
            let request =
                self.provider
                    .build_request(&state, &messages, self.prompt.schema(), self.temperature);
            let result = match self.transport.post_json(&request).await {
                Ok(resp) => self.provider.response_content(state.endpoint, &resp),
                Err(e) => Err(e),
            };
            let error = match result {
                Ok(content) => return Ok(content),
                Err(e) => e,
            };

            match self.policy.next_step(attempt, &error, &mut state) {
                RetryStep::Reshaped => {
                    tracing::debug!(
                        "{} rejected request ({}), retrying with {:?} at {:?}",
                        self.provider.name(),
                        error,
                        state.shape,
                        state.endpoint
                    );
                }
                RetryStep::Backoff(delay) => {
                    tracing::warn!(
                        "{} classification attempt {} failed ({}), retry in {}s",
                        self.provider.name(),
                        attempt + 1,
                        error,
                        delay.as_secs_f32()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryStep::GiveUp => return Err(error),
            }
        }
    }
}

impl<T: ChatTransport> ClassifyAi for AiClassifier<T> {
    async fn classify_ai(&self, sender: &str, subject: &str, body: &str) -> Vec<String> {
        if !self.provider.is_configured() {
            return self.vocabulary.catch_all_only();
        }

        let content = match self.complete(sender, subject, body).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("{} classification failed: {}", self.provider.name(), e);
                return self.vocabulary.catch_all_only();
            }
        };

        let mut labels: Vec<String> = Vec::new();
        for label in extract_labels_object(&content)
            .map(|object| labels_from_object(&object))
            .unwrap_or_default()
        {
            if self.vocabulary.is_allowed(&label) && !labels.contains(&label) {
                labels.push(label);
            }
        }

        if labels.is_empty() {
            tracing::debug!(
                "No usable labels in {} answer: {:.120}",
                self.provider.name(),
                content
            );
            return self.vocabulary.catch_all_only();
        }

        labels
    }
}
