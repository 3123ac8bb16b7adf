use std::collections::HashMap;

/// Label name to mailbox id mapping, kept in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRegistry {
    ids: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl LabelRegistry {
    pub fn from_pairs<I, N, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        let mut registry = Self::default();
        for (name, id) in pairs {
            registry.insert(name, id);
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        let (name, id) = (name.into(), id.into());
        self.names.insert(id.clone(), name.clone());
        self.ids.insert(name, id);
    }

    pub fn extend(&mut self, other: LabelRegistry) {
        for (name, id) in other.ids {
            self.insert(name, id);
        }
    }

    pub fn id(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Names of the given label ids. System labels and ids created outside
    /// this registry are left out.
    pub fn names_for(&self, label_ids: &[String]) -> Vec<String> {
        label_ids
            .iter()
            .filter_map(|id| self.name(id))
            .map(str::to_string)
            .collect()
    }

    pub fn missing<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for name in names {
            if !self.ids.contains_key(name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        missing
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
