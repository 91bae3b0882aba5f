//! Registry list filtering and ordering.

use std::str::FromStr;

use crate::error::CivicError;
use crate::model::issue::{Category, Issue, Priority, Status};

/// Sort order for issue listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Newest,
    Oldest,
    /// Most upvoted first, newest first among ties.
    Upvotes,
    /// High before medium before low, newest first among ties.
    Priority,
}

impl FromStr for SortOrder {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "upvotes" => Ok(Self::Upvotes),
            "priority" => Ok(Self::Priority),
            _ => Err(CivicError::InvalidEnumValue {
                expected: "sort order",
                got: s.to_string(),
            }),
        }
    }
}

/// Conjunction of optional criteria. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    /// Case-insensitive substring of the title, description or id.
    pub search: Option<String>,
    pub status: Option<Status>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub reporter: Option<String>,
    pub sort: SortOrder,
}

impl IssueFilter {
    #[must_use]
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            let hit = issue.title.to_lowercase().contains(&needle)
                || issue.description.to_lowercase().contains(&needle)
                || issue.id.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        self.status.is_none_or(|s| issue.status == s)
            && self.category.is_none_or(|c| issue.category == c)
            && self.priority.is_none_or(|p| issue.priority == p)
            && self.reporter.as_deref().is_none_or(|r| issue.reported_by == r)
    }

    /// Filter and sort a snapshot.
    #[must_use]
    pub fn apply(&self, issues: Vec<Issue>) -> Vec<Issue> {
        let mut selected: Vec<Issue> = issues.into_iter().filter(|i| self.matches(i)).collect();
        match self.sort {
            SortOrder::Newest => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::Oldest => selected.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Upvotes => selected.sort_by(|a, b| {
                b.upvotes
                    .cmp(&a.upvotes)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
            SortOrder::Priority => selected.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
        selected
    }
}
