use indexmap::IndexMap;

use crate::model::LabelVocabulary;

/// Label mutations for one pass.
///
/// Message ids keep their insertion order per label so dry-run output and
/// tests are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    additions: IndexMap<String, Vec<String>>,
    remove_catch_all: Vec<String>,
}

impl LabelPlan {
    pub fn additions(&self) -> &IndexMap<String, Vec<String>> {
        &self.additions
    }

    pub fn catch_all_removals(&self) -> &[String] {
        &self.remove_catch_all
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.remove_catch_all.is_empty()
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.additions.keys().map(String::as_str)
    }

    pub fn contains_message(&self, id: &str) -> bool {
        self.additions.values().flatten().any(|m| m == id)
            || self.remove_catch_all.iter().any(|m| m == id)
    }

    fn push(&mut self, label: &str, id: &str) {
        let ids = self.additions.entry(label.to_string()).or_default();
        if !ids.iter().any(|m| m == id) {
            ids.push(id.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Already carries a specific label.
    Skipped,
    /// Final labels queued for the message.
    Planned(Vec<String>),
    /// Classified as catch-all and already carrying it.
    Unchanged,
}

pub struct PlanBuilder<'a> {
    vocabulary: &'a LabelVocabulary,
    plan: LabelPlan,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(vocabulary: &'a LabelVocabulary) -> Self {
        Self {
            vocabulary,
            plan: LabelPlan::default(),
        }
    }

    /// `current` holds label names, not mailbox ids.
    pub fn should_skip(&self, current: &[String]) -> bool {
        current.iter().any(|name| self.vocabulary.is_specific(name))
    }

    pub fn add(&mut self, id: &str, current: &[String], result: &[String]) -> PlanOutcome {
        if self.should_skip(current) {
            return PlanOutcome::Skipped;
        }

        let catch_all = self.vocabulary.catch_all();
        let raw_has_catch_all = result.iter().any(|l| l == catch_all);
        let carries_catch_all = current.iter().any(|l| l == catch_all);
        let labels = self.vocabulary.normalize(result);

        if self.vocabulary.is_catch_all_only(&labels) {
            if carries_catch_all {
                return PlanOutcome::Unchanged;
            }
            self.plan.push(catch_all, id);
            return PlanOutcome::Planned(labels);
        }

        for label in &labels {
            self.plan.push(label, id);
        }
        if (raw_has_catch_all || carries_catch_all)
            && !self.plan.remove_catch_all.iter().any(|m| m == id)
        {
            self.plan.remove_catch_all.push(id.to_string());
        }
        PlanOutcome::Planned(labels)
    }

    /// Keep a message that could not be processed visible in the mailbox.
    pub fn record_failure(&mut self, id: &str) {
        let sentinel = self.vocabulary.sentinel().to_string();
        self.plan.push(&sentinel, id);
    }

    pub fn finish(self) -> LabelPlan {
        self.plan
    }
}
