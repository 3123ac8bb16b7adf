use std::sync::Arc;

use crate::{model::LabelVocabulary, prompt::ClassifyAi};

use super::heuristics::KeywordHeuristics;

/// Single entry point for classifying a message.
///
/// The model answer wins unless it is the catch-all. Only then the keyword
/// rules are consulted, and when any of them fires their labels replace the
/// model answer entirely.
pub struct Classifier<A> {
    ai: A,
    heuristics: KeywordHeuristics,
    vocabulary: Arc<LabelVocabulary>,
}

impl<A: ClassifyAi> Classifier<A> {
    pub fn new(ai: A, vocabulary: Arc<LabelVocabulary>) -> Self {
        Self {
            ai,
            heuristics: KeywordHeuristics::new(&vocabulary),
            vocabulary,
        }
    }

    pub fn vocabulary(&self) -> &Arc<LabelVocabulary> {
        &self.vocabulary
    }

    /// 1-3 vocabulary labels; the catch-all only ever appears alone.
    pub async fn classify(&self, sender: &str, subject: &str, body: &str) -> Vec<String> {
        let from_ai = self
            .vocabulary
            .normalize(&self.ai.classify_ai(sender, subject, body).await);
        if !self.vocabulary.is_catch_all_only(&from_ai) {
            return from_ai;
        }

        let from_rules = self.heuristics.classify(subject, sender, body);
        if from_rules.is_empty() {
            return from_ai;
        }

        tracing::debug!("Keyword rules override catch-all: {:?}", from_rules);
        self.vocabulary.normalize(&from_rules)
    }
}
