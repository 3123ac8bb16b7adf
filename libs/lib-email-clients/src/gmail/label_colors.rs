use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
};

use google_gmail1::api::LabelColor;
use once_cell::sync::Lazy;

const WHITE: &str = "#ffffff";
const BLACK: &str = "#000000";

// (Name, Bg, Text). Gmail rejects any background outside its fixed palette,
// so only palette entries live here.
pub const GMAIL_LABEL_COLORS: [(&str, &str, &str); 48] = [
    ("gray-100", "#f3f3f3", BLACK),
    ("gray-200", "#efefef", BLACK),
    ("gray-500", "#cccccc", BLACK),
    ("gray-600", "#999999", WHITE),
    ("gray-700", "#666666", WHITE),
    ("gray-900", "#434343", WHITE),
    ("red-100", "#f6c5be", BLACK),
    ("red-300", "#efa093", BLACK),
    ("red-400", "#e66550", WHITE),
    ("red-500", "#fb4c2f", WHITE),
    ("red-600", "#cc3a21", WHITE),
    ("red-800", "#ac2b16", WHITE),
    ("straw-100", "#ffe6c7", BLACK),
    ("straw-200", "#ffd6a2", BLACK),
    ("straw-300", "#ffbc6b", BLACK),
    ("straw-400", "#ffad47", BLACK),
    ("straw-600", "#eaa041", WHITE),
    ("straw-700", "#cf8933", WHITE),
    ("yellow-100", "#fef1d1", BLACK),
    ("yellow-200", "#fce8b3", BLACK),
    ("yellow-300", "#fcda83", BLACK),
    ("yellow-400", "#fad165", BLACK),
    ("yellow-500", "#f2c960", BLACK),
    ("yellow-600", "#d5ae49", WHITE),
    ("green-100", "#b9e4d0", BLACK),
    ("green-200", "#c6f3de", BLACK),
    ("green-300", "#89d3b2", BLACK),
    ("green-400", "#16a766", WHITE),
    ("green-500", "#43d692", BLACK),
    ("green-600", "#44b984", WHITE),
    ("green-700", "#149e60", WHITE),
    ("green-800", "#0b804b", WHITE),
    ("mint-200", "#a0eac9", BLACK),
    ("mint-300", "#68dfa9", BLACK),
    ("mint-400", "#3dc789", WHITE),
    ("mint-500", "#2a9c68", WHITE),
    ("blue-100", "#c9daf8", BLACK),
    ("blue-200", "#a4c2f4", BLACK),
    ("blue-300", "#6d9eeb", BLACK),
    ("blue-500", "#4a86e8", WHITE),
    ("blue-600", "#3c78d8", WHITE),
    ("blue-700", "#285bac", WHITE),
    ("purple-100", "#e4d7f5", BLACK),
    ("purple-200", "#d0bcf1", BLACK),
    ("purple-300", "#b694e8", BLACK),
    ("purple-400", "#a479e2", BLACK),
    ("purple-500", "#8e63ce", WHITE),
    ("pink-300", "#f691b3", BLACK),
];

/// Default vocabulary labels keep a fixed color so the mailbox looks the
/// same across installs; any other label gets a hashed palette entry.
const RESERVED: [(&str, &str); 20] = [
    ("rechnung(en)", "straw-400"),
    ("support", "red-500"),
    ("privat", "purple-400"),
    ("newsletter", "blue-500"),
    ("events", "yellow-400"),
    ("fyi", "gray-500"),
    ("banking", "green-400"),
    ("versicherung", "green-100"),
    ("angebote", "straw-600"),
    ("streaming", "blue-200"),
    ("gaming", "pink-300"),
    ("klamotten", "red-100"),
    ("technik", "purple-300"),
    ("sport", "green-500"),
    ("arbeit", "yellow-600"),
    ("shopping", "green-700"),
    ("account", "mint-300"),
    ("social media", "red-300"),
    ("sonstiges", "gray-200"),
    ("ai/error", "purple-500"),
];

pub struct GmailLabelColorMap {
    reserved: HashMap<String, LabelColor>,
    unreserved: Vec<LabelColor>,
}

impl GmailLabelColorMap {
    pub fn new() -> Self {
        let reserved = RESERVED
            .iter()
            .filter_map(|(label, key)| get_color(key).map(|c| (label.to_string(), c)))
            .collect::<HashMap<_, _>>();

        let taken = RESERVED.iter().map(|(_, key)| *key).collect::<Vec<_>>();
        let unreserved = GMAIL_LABEL_COLORS
            .iter()
            .filter(|c| !taken.contains(&c.0))
            .map(|c| to_label_color(c.1, c.2))
            .collect();

        Self {
            reserved,
            unreserved,
        }
    }

    fn hash_string_to_index(&self, s: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        let hash = hasher.finish();
        (hash as usize) % self.unreserved.len()
    }

    pub fn get(&self, label_name: &str) -> LabelColor {
        let key = label_name.to_lowercase();
        if let Some(color) = self.reserved.get(&key) {
            return color.clone();
        }

        let index = self.hash_string_to_index(&key);
        self.unreserved[index].clone()
    }
}

impl Default for GmailLabelColorMap {
    fn default() -> Self {
        Self::new()
    }
}

fn to_label_color(bg: &str, text: &str) -> LabelColor {
    LabelColor {
        background_color: Some(bg.to_string()),
        text_color: Some(text.to_string()),
    }
}

fn get_color(key: &str) -> Option<LabelColor> {
    static MAP: Lazy<HashMap<&'static str, LabelColor>> = Lazy::new(|| {
        GMAIL_LABEL_COLORS
            .iter()
            .map(|c| (c.0, to_label_color(c.1, c.2)))
            .collect()
    });

    MAP.get(key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_string_to_index() {
        let colors = GmailLabelColorMap::new();

        let index = colors.hash_string_to_index("test");
        assert!(index < colors.unreserved.len());
    }

    #[test]
    fn test_every_reserved_key_is_in_palette() {
        for (label, key) in RESERVED {
            assert!(get_color(key).is_some(), "{label} maps to unknown color {key}");
        }
        assert_eq!(GmailLabelColorMap::new().reserved.len(), RESERVED.len());
    }

    #[test]
    fn test_get_reserved_color_ignores_case() {
        let colors = GmailLabelColorMap::new();

        let color = colors.get("Rechnung(en)");
        assert_eq!(color.background_color, Some("#ffad47".to_string()));
        assert_eq!(color.text_color, Some(BLACK.to_string()));
    }

    #[test]
    fn test_get_unreserved_color() {
        let colors = GmailLabelColorMap {
            reserved: HashMap::new(),
            unreserved: vec![
                to_label_color("#16a766", WHITE),
                to_label_color("#4a86e8", WHITE),
                to_label_color("#8e63ce", WHITE),
                to_label_color("#fb4c2f", WHITE),
            ],
        };

        let color1 = colors.get("Reisen");
        let color2 = colors.get("reisen");
        assert_eq!(color1.background_color, color2.background_color);
        assert!(colors
            .unreserved
            .iter()
            .any(|c| c.background_color == color1.background_color));
    }
}
