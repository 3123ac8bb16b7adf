use std::collections::HashSet;

use anyhow::ensure;

/// Upper bound of labels assigned to a single message.
pub const MAX_LABELS_PER_MESSAGE: usize = 3;

pub const DEFAULT_CATCH_ALL: &str = "Sonstiges";
pub const DEFAULT_SENTINEL: &str = "ai/error";

pub const DEFAULT_LABELS: [&str; 18] = [
    "Rechnung(en)",
    "Support",
    "Privat",
    "Newsletter",
    "Events",
    "FYI",
    "Banking",
    "Versicherung",
    "Angebote",
    "Streaming",
    "Gaming",
    "Klamotten",
    "Technik",
    "Sport",
    "Arbeit",
    "Shopping",
    "Account",
    "Social Media",
];

/// The ordered set of label names the classifier may emit.
///
/// `specific` never contains the catch-all or the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    specific: Vec<String>,
    catch_all: String,
    sentinel: String,
}

impl LabelVocabulary {
    pub fn new<I, S>(allowed: I, catch_all: &str, sentinel: &str) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let catch_all = catch_all.trim().to_string();
        let sentinel = sentinel.trim().to_string();
        ensure!(!catch_all.is_empty(), "catch-all label must not be empty");
        ensure!(!sentinel.is_empty(), "error label must not be empty");
        ensure!(
            catch_all != sentinel,
            "catch-all and error label must differ ({catch_all})"
        );

        let mut seen = HashSet::new();
        let specific = allowed
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty() && *s != catch_all && *s != sentinel)
            .filter(|s| seen.insert(s.clone()))
            .collect::<Vec<_>>();
        ensure!(
            !specific.is_empty(),
            "label vocabulary needs at least one label besides {catch_all}"
        );

        Ok(Self {
            specific,
            catch_all,
            sentinel,
        })
    }

    pub fn specific(&self) -> &[String] {
        &self.specific
    }

    pub fn catch_all(&self) -> &str {
        &self.catch_all
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn is_specific(&self, name: &str) -> bool {
        self.specific.iter().any(|l| l == name)
    }

    pub fn is_catch_all(&self, name: &str) -> bool {
        self.catch_all == name
    }

    /// Labels the model is allowed to answer with.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.is_specific(name) || self.is_catch_all(name)
    }

    pub fn ai_labels(&self) -> Vec<String> {
        let mut labels = self.specific.clone();
        labels.push(self.catch_all.clone());
        labels
    }

    /// Every label the mailbox must know about, including the sentinel.
    pub fn managed_labels(&self) -> Vec<String> {
        let mut labels = self.ai_labels();
        labels.push(self.sentinel.clone());
        labels
    }

    pub fn catch_all_only(&self) -> Vec<String> {
        vec![self.catch_all.clone()]
    }

    pub fn is_catch_all_only(&self, labels: &[String]) -> bool {
        labels.len() == 1 && self.is_catch_all(&labels[0])
    }

    /// Turn an arbitrary label list into a valid classification result:
    /// unknown names are dropped, duplicates removed in first-seen order,
    /// the catch-all only survives on its own, and at most three labels
    /// remain. An empty outcome becomes the catch-all.
    pub fn normalize<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        let allowed = labels
            .iter()
            .map(|l| l.as_ref().trim())
            .filter(|l| self.is_allowed(l))
            .filter(|l| seen.insert(*l))
            .collect::<Vec<_>>();

        let specific = allowed
            .iter()
            .filter(|l| !self.is_catch_all(l))
            .take(MAX_LABELS_PER_MESSAGE)
            .map(|l| l.to_string())
            .collect::<Vec<_>>();

        if specific.is_empty() {
            self.catch_all_only()
        } else {
            specific
        }
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self {
            specific: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            catch_all: DEFAULT_CATCH_ALL.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}
