use std::{path::Path, str::FromStr, time::Duration};

use anyhow::{ensure, Context};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment};
use serde::Deserialize;
use strum::{Display, EnumString};
use url::Url;

use crate::{
    model::{
        labels::{DEFAULT_CATCH_ALL, DEFAULT_LABELS, DEFAULT_SENTINEL},
        LabelVocabulary,
    },
    prompt::{retry::RetryPolicy, AiProvider},
    state::orchestrator::RunOptions,
};

/// Local models are slow, keep one pass short.
pub const OLLAMA_MAX_RESULTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

/// Everything configurable, read once at startup.
///
/// Sources in increasing precedence: built-in defaults, an optional TOML
/// file, environment variables (`.env` included). Keys are the lower-cased
/// environment names, so `MAX_RESULTS=50` and `max_results = 50` are the
/// same setting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: String,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    #[serde(alias = "gmail_q")]
    pub new_mail_query: String,
    /// Defaults to the catch-all label within the last 7 days.
    pub recheck_query: Option<String>,
    pub max_results: u32,
    pub dry_run: bool,
    pub set_label_colors: bool,
    pub labels_allowed: Vec<String>,
    pub catch_all_label: String,
    pub error_label: String,
    pub gmail_access_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi.to_string(),
            model: "gpt-4o-mini".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "qwen2.5:7b-instruct".to_string(),
            temperature: 0.2,
            request_timeout_secs: 90,
            max_attempts: 2,
            retry_base_delay_ms: 1000,
            new_mail_query: "in:inbox is:unread newer_than:2d".to_string(),
            recheck_query: None,
            max_results: 20,
            dry_run: false,
            set_label_colors: false,
            labels_allowed: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            catch_all_label: DEFAULT_CATCH_ALL.to_string(),
            error_label: DEFAULT_SENTINEL.to_string(),
            gmail_access_token: None,
        }
    }
}

impl AppConfig {
    /// `path` replaces the default `labeler.toml` lookup and must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("labeler").required(false),
        };

        Self::from_builder(
            Config::builder()
                .add_source(file)
                .add_source(Self::environment()),
        )
    }

    fn environment() -> Environment {
        Environment::default()
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("labels_allowed")
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config: AppConfig = builder
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.provider_kind()?;
        Url::parse(&self.openai_base_url)
            .with_context(|| format!("OPENAI_BASE_URL is invalid: {}", self.openai_base_url))?;
        Url::parse(&self.ollama_base_url)
            .with_context(|| format!("OLLAMA_BASE_URL is invalid: {}", self.ollama_base_url))?;
        ensure!(self.max_results > 0, "MAX_RESULTS must be at least 1");
        ensure!(
            (0.0..=2.0).contains(&self.temperature),
            "TEMPERATURE must be between 0 and 2"
        );
        ensure!(
            self.request_timeout_secs > 0,
            "REQUEST_TIMEOUT_SECS must be at least 1"
        );
        self.vocabulary()?;
        Ok(())
    }

    /// Command line flags win over every other source.
    pub fn apply_overrides(&mut self, dry_run: bool, query: Option<String>, max_results: Option<u32>) {
        if dry_run {
            self.dry_run = true;
        }
        if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
            self.new_mail_query = query;
        }
        if let Some(max_results) = max_results.filter(|m| *m > 0) {
            self.max_results = max_results;
        }
    }

    pub fn provider_kind(&self) -> anyhow::Result<ProviderKind> {
        ProviderKind::from_str(self.provider.trim())
            .with_context(|| format!("Unknown PROVIDER {:?}, use openai or ollama", self.provider))
    }

    pub fn provider(&self) -> anyhow::Result<AiProvider> {
        Ok(match self.provider_kind()? {
            ProviderKind::OpenAi => AiProvider::OpenAi {
                base_url: self.openai_base_url.clone(),
                model: self.model.clone(),
                api_key: self
                    .openai_api_key
                    .as_ref()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty()),
            },
            ProviderKind::Ollama => AiProvider::Ollama {
                base_url: self.ollama_base_url.clone(),
                model: self.ollama_model.clone(),
            },
        })
    }

    pub fn vocabulary(&self) -> anyhow::Result<LabelVocabulary> {
        LabelVocabulary::new(&self.labels_allowed, &self.catch_all_label, &self.error_label)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn effective_max_results(&self) -> u32 {
        match self.provider_kind() {
            Ok(ProviderKind::Ollama) => self.max_results.min(OLLAMA_MAX_RESULTS),
            _ => self.max_results,
        }
    }

    pub fn recheck_query(&self) -> String {
        self.recheck_query
            .clone()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "in:inbox {} newer_than:7d",
                    label_filter(self.catch_all_label.trim())
                )
            })
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            new_mail_query: self.new_mail_query.clone(),
            recheck_query: self.recheck_query(),
            max_results: self.effective_max_results(),
            dry_run: self.dry_run,
        }
    }
}

/// Gmail search syntax spells spaces in label names as dashes.
fn label_filter(label: &str) -> String {
    format!("label:{}", label.replace(' ', "-"))
}
