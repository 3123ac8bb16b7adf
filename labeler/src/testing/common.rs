use std::{collections::VecDeque, sync::Mutex};

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::{
    email::{LabelRegistry, Mailbox},
    error::{AppError, AppResult},
    model::MailMessage,
    prompt::{transport::ChatTransport, ChatRequest, ClassifyAi},
};

/// Answers requests from a fixed script and remembers what was sent.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<AppResult<Value>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new<const N: usize>(responses: [AppResult<Value>; N]) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatTransport for ScriptedTransport {
    async fn post_json(&self, request: &ChatRequest) -> AppResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Transport("script exhausted".to_string())))
    }
}

/// Chat completions envelope around `content`.
pub fn openai_answer(content: &str) -> Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

/// Model stand-in that always gives the same answer.
pub struct FixedAi {
    answer: Vec<String>,
}

impl FixedAi {
    pub fn new(answer: &[&str]) -> Self {
        Self {
            answer: answer.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl ClassifyAi for FixedAi {
    async fn classify_ai(&self, _sender: &str, _subject: &str, _body: &str) -> Vec<String> {
        self.answer.clone()
    }
}

#[derive(Default)]
struct MailboxState {
    messages: IndexMap<String, MailMessage>,
    // name -> id
    labels: IndexMap<String, String>,
    created: Vec<String>,
    queries: Vec<String>,
    modifications: usize,
    removals: usize,
    failing_fetches: Vec<String>,
    fail_modify: bool,
    // never created by ensure_labels
    refused_labels: Vec<String>,
}

impl MailboxState {
    fn label_name(&self, id: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, label_id)| label_id.as_str() == id)
            .map(|(name, _)| name.as_str())
    }

    fn carries(&self, message: &MailMessage, name: &str) -> bool {
        message
            .label_ids
            .iter()
            .any(|id| self.label_name(id) == Some(name))
    }

    /// Understands `label:` and `is:unread`, ignores everything else.
    fn matches(&self, message: &MailMessage, query: &str) -> bool {
        query.split_whitespace().all(|term| {
            if let Some(label) = term.strip_prefix("label:") {
                self.carries(message, &label.replace('-', " "))
            } else if term == "is:unread" {
                message.label_ids.iter().any(|id| id == "UNREAD")
            } else {
                true
            }
        })
    }
}

/// In-memory mailbox with Gmail-like label ids.
#[derive(Default)]
pub struct FakeMailbox {
    state: Mutex<MailboxState>,
}

impl FakeMailbox {
    pub fn with_messages<const N: usize>(messages: [MailMessage; N]) -> Self {
        let mailbox = Self::default();
        mailbox.state.lock().unwrap().messages = messages
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        mailbox
    }

    /// User label names on `id`, in the order they were applied.
    pub fn label_names_of(&self, id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let Some(message) = state.messages.get(id) else {
            return Vec::new();
        };
        message
            .label_ids
            .iter()
            .filter_map(|label_id| state.label_name(label_id))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn mark_read(&self, id: &str) {
        if let Some(message) = self.state.lock().unwrap().messages.get_mut(id) {
            message.label_ids.retain(|l| l != "UNREAD");
        }
    }

    pub fn fail_fetch(&self, id: &str) {
        self.state.lock().unwrap().failing_fetches.push(id.to_string());
    }

    pub fn refuse_label(&self, name: &str) {
        self.state.lock().unwrap().refused_labels.push(name.to_string());
    }

    pub fn fail_modify(&self) {
        self.state.lock().unwrap().fail_modify = true;
    }

    /// Successful add and remove calls.
    pub fn modifications(&self) -> usize {
        self.state.lock().unwrap().modifications
    }

    pub fn removals(&self) -> usize {
        self.state.lock().unwrap().removals
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn created_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }
}

impl Mailbox for FakeMailbox {
    async fn list_candidate_ids(&self, query: &str, limit: u32) -> anyhow::Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        Ok(state
            .messages
            .values()
            .filter(|m| state.matches(m, query))
            .take(limit as usize)
            .map(|m| m.id.clone())
            .collect())
    }

    async fn fetch_message(&self, id: &str) -> anyhow::Result<MailMessage> {
        let state = self.state.lock().unwrap();
        if state.failing_fetches.iter().any(|f| f == id) {
            bail!("fetch of {id} failed");
        }
        state
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no message {id}"))
    }

    async fn list_labels(&self) -> anyhow::Result<LabelRegistry> {
        let state = self.state.lock().unwrap();
        Ok(LabelRegistry::from_pairs(state.labels.clone()))
    }

    async fn ensure_labels(&self, names: &[String]) -> anyhow::Result<LabelRegistry> {
        let mut state = self.state.lock().unwrap();
        for name in names {
            if !state.labels.contains_key(name) && !state.refused_labels.contains(name) {
                let id = format!("Label_{}", state.labels.len() + 1);
                state.labels.insert(name.clone(), id);
                state.created.push(name.clone());
            }
        }
        Ok(LabelRegistry::from_pairs(state.labels.clone()))
    }

    async fn add_labels(&self, message_ids: &[String], label_ids: &[String]) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_modify {
            bail!("modify rejected");
        }
        for id in message_ids {
            if let Some(message) = state.messages.get_mut(id) {
                for label_id in label_ids {
                    if !message.label_ids.contains(label_id) {
                        message.label_ids.push(label_id.clone());
                    }
                }
            }
        }
        state.modifications += 1;
        Ok(())
    }

    async fn remove_labels(
        &self,
        message_ids: &[String],
        label_ids: &[String],
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_modify {
            bail!("modify rejected");
        }
        for id in message_ids {
            if let Some(message) = state.messages.get_mut(id) {
                message.label_ids.retain(|l| !label_ids.contains(l));
            }
        }
        state.modifications += 1;
        state.removals += 1;
        Ok(())
    }
}
