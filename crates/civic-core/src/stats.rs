//! Dashboard aggregates over a registry snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::issue::{Category, Issue, Priority, Status};
use crate::sla::{is_nearing_deadline, is_overdue};

/// Total and resolved counts for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryProgress {
    pub category: Category,
    pub total: usize,
    pub resolved: usize,
}

/// Headline numbers for the administrator dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub overdue: usize,
    pub nearing_deadline: usize,
    pub escalated: usize,
    pub upvotes: u64,
    /// Mean hours from creation to the latest `resolved` entry, over
    /// resolved issues only.
    pub avg_resolution_hours: Option<f64>,
    pub by_category: Vec<CategoryProgress>,
}

impl DashboardStats {
    /// Aggregate `issues` as of `now`.
    #[must_use]
    pub fn compute(issues: &[Issue], now: DateTime<Utc>, nearing_window: Duration) -> Self {
        let mut by_status: BTreeMap<Status, usize> =
            Status::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut by_priority: BTreeMap<Priority, usize> = BTreeMap::new();
        let mut resolution_secs = Vec::new();

        for issue in issues {
            *by_status.entry(issue.status).or_default() += 1;
            *by_priority.entry(issue.priority).or_default() += 1;
            if issue.status == Status::Resolved {
                if let Some(resolved_at) = issue.last_entered(Status::Resolved) {
                    resolution_secs.push((resolved_at - issue.created_at).num_seconds());
                }
            }
        }

        let by_category = Category::ALL
            .into_iter()
            .map(|category| {
                let in_category = issues.iter().filter(|i| i.category == category);
                CategoryProgress {
                    category,
                    total: in_category.clone().count(),
                    resolved: in_category.filter(|i| i.status == Status::Resolved).count(),
                }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let avg_resolution_hours = (!resolution_secs.is_empty()).then(|| {
            let total: i64 = resolution_secs.iter().sum();
            total as f64 / resolution_secs.len() as f64 / 3600.0
        });

        Self {
            total: issues.len(),
            escalated: by_status.get(&Status::Escalated).copied().unwrap_or_default(),
            by_status,
            by_priority,
            overdue: issues.iter().filter(|i| is_overdue(i, now)).count(),
            nearing_deadline: issues
                .iter()
                .filter(|i| is_nearing_deadline(i, now, nearing_window))
                .count(),
            upvotes: issues.iter().map(|i| i.upvotes).sum(),
            avg_resolution_hours,
            by_category,
        }
    }
}
