//! Classification table for style keys

use std::collections::BTreeSet;

/// Style keys treated as color-bearing when no table is configured.
pub const DEFAULT_COLOR_KEYS: &[&str] = &[
    "color",
    "fill",
    "stroke",
    "strokeColor",
    "fillColor",
    "backgroundColor",
    "borderColor",
    "textColor",
    "labelColor",
];

/// How a style key participates in change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKeyClass {
    Color,
    Generic,
}

/// Decides which style keys are color-bearing. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleClassifier {
    color_keys: BTreeSet<String>,
}

impl StyleClassifier {
    pub fn new<I, S>(color_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StyleClassifier {
            color_keys: color_keys
                .into_iter()
                .map(|k| k.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Add one more color-bearing key.
    pub fn with_key(mut self, key: &str) -> Self {
        self.color_keys.insert(key.to_ascii_lowercase());
        self
    }

    pub fn classify(&self, key: &str) -> StyleKeyClass {
        if self.is_color_key(key) {
            StyleKeyClass::Color
        } else {
            StyleKeyClass::Generic
        }
    }

    pub fn is_color_key(&self, key: &str) -> bool {
        self.color_keys.contains(&key.to_ascii_lowercase())
    }

    /// Configured keys, lowercased.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.color_keys.iter().map(String::as_str)
    }
}

impl Default for StyleClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR_KEYS)
    }
}
