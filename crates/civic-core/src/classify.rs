//! Keyword-based priority classification for new submissions.
//!
//! The classifier lowercases `"<category label> <description>"` and checks it
//! for substring matches. Categories in [`PriorityRules::high_categories`] are
//! always `high`; otherwise the first keyword tier that matches wins, and
//! anything unmatched is `low`.

use crate::model::issue::{Category, Priority};

/// Keywords that force `high` priority.
pub const HIGH_KEYWORDS: &[&str] = &[
    "danger",
    "accident",
    "exposed",
    "wire",
    "fire",
    "collapse",
    "flood",
    "emergency",
    "unsafe",
    "critical",
    "life",
    "death",
    "electr",
    "voltage",
];

/// Keywords that raise an otherwise unmatched issue to `medium`.
pub const MEDIUM_KEYWORDS: &[&str] = &[
    "broken", "overflow", "stray", "dark", "stench", "health", "hazard",
];

/// Categories that are always `high` regardless of text.
pub const HIGH_CATEGORIES: &[Category] = &[Category::Electricity, Category::PublicSafety];

/// Tunable keyword sets for the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRules {
    pub high_categories: Vec<Category>,
    pub high_keywords: Vec<String>,
    pub medium_keywords: Vec<String>,
}

impl Default for PriorityRules {
    fn default() -> Self {
        Self {
            high_categories: HIGH_CATEGORIES.to_vec(),
            high_keywords: HIGH_KEYWORDS.iter().map(ToString::to_string).collect(),
            medium_keywords: MEDIUM_KEYWORDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl PriorityRules {
    /// Default rules extended with extra keywords (lowercased, blanks dropped).
    #[must_use]
    pub fn with_extra_keywords(extra_high: &[String], extra_medium: &[String]) -> Self {
        let mut rules = Self::default();
        extend_keywords(&mut rules.high_keywords, extra_high);
        extend_keywords(&mut rules.medium_keywords, extra_medium);
        rules
    }

    /// Classify a submission under these rules.
    #[must_use]
    pub fn classify(&self, category: Category, description: &str) -> Priority {
        let text = format!("{} {}", category.label(), description).to_lowercase();

        if self.high_categories.contains(&category)
            || self.high_keywords.iter().any(|k| text.contains(k.as_str()))
        {
            return Priority::High;
        }
        if self.medium_keywords.iter().any(|k| text.contains(k.as_str())) {
            return Priority::Medium;
        }
        Priority::Low
    }
}

fn extend_keywords(target: &mut Vec<String>, extra: &[String]) {
    for keyword in extra {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !target.contains(&keyword) {
            target.push(keyword);
        }
    }
}

/// Classify with the default keyword sets.
#[must_use]
pub fn classify(category: Category, description: &str) -> Priority {
    PriorityRules::default().classify(category, description)
}
