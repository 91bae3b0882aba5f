//! The issue registry boundary: persistence plus live subscriptions.
//!
//! The lifecycle engine reads and writes exclusively through
//! [`IssueRegistry`]. Every mutation is expressed as one [`IssuePatch`],
//! which a registry must commit atomically: scalar fields are overwritten
//! (last writer wins), history and notes are appended, and the revision
//! counter is bumped. A patch carrying `expected_version` is rejected with
//! [`CivicError::VersionConflict`] when the stored revision differs, and one
//! carrying `expected_status` with [`CivicError::InvalidTransition`] when the
//! stored status has moved on.

pub mod memory;
pub mod sqlite;
pub mod subscribe;

use chrono::{DateTime, Utc};

use crate::error::CivicError;
use crate::model::issue::{AdminNote, EscalationDetails, HistoryEntry, Issue, Status};

pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;
pub use subscribe::{
    ErrorCallback, IssueCallback, SnapshotCallback, Stamped, Subscription, SubscriptionHub,
};

/// A partial update committed atomically by a registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePatch {
    pub status: Option<Status>,
    pub assigned_department: Option<String>,
    pub assigned_officer_id: Option<String>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub escalation_details: Option<EscalationDetails>,
    pub append_history: Vec<HistoryEntry>,
    pub append_notes: Vec<AdminNote>,
    pub upvotes_added: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub expected_version: Option<u64>,
    /// Status the caller validated the change against.
    pub expected_status: Option<Status>,
}

impl IssuePatch {
    /// Reject patches that would break issue invariants if committed.
    ///
    /// A status change must append exactly one history entry recording that
    /// same status; history is never appended without a status change.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::CorruptRecord`] describing the problem.
    pub fn validate(&self, id: &str) -> Result<(), CivicError> {
        let corrupt = |reason: &str| CivicError::CorruptRecord {
            id: id.to_string(),
            reason: reason.to_string(),
        };
        match (self.status, self.append_history.as_slice()) {
            (None, []) => Ok(()),
            (Some(status), [entry]) if entry.status == status => Ok(()),
            (Some(_), _) => Err(corrupt(
                "a status change must append exactly one matching history entry",
            )),
            (None, _) => Err(corrupt("history entries require a status change")),
        }
    }

    /// Fail if the stored issue no longer matches the patch preconditions.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::VersionConflict`] for a stale `expected_version`
    /// and [`CivicError::InvalidTransition`] when the status differs from
    /// `expected_status`.
    pub fn check_preconditions(&self, issue: &Issue) -> Result<(), CivicError> {
        if let Some(expected) = self.expected_version {
            if expected != issue.version {
                return Err(CivicError::VersionConflict {
                    id: issue.id.clone(),
                    expected,
                    actual: issue.version,
                });
            }
        }
        match self.expected_status {
            Some(expected) if expected != issue.status => Err(CivicError::InvalidTransition {
                from: issue.status,
                to: self.status.unwrap_or(issue.status),
                reason: "status changed concurrently",
            }),
            _ => Ok(()),
        }
    }

    /// Apply the patch in memory. `updatedAt` never moves backwards.
    pub fn apply(&self, issue: &mut Issue) {
        if let Some(status) = self.status {
            issue.status = status;
        }
        if let Some(department) = &self.assigned_department {
            issue.assigned_department = Some(department.clone());
        }
        if let Some(officer) = &self.assigned_officer_id {
            issue.assigned_officer_id = Some(officer.clone());
        }
        if let Some(deadline) = self.sla_deadline {
            issue.sla_deadline = Some(deadline);
        }
        if let Some(notes) = &self.resolution_notes {
            issue.resolution_notes = Some(notes.clone());
        }
        if let Some(details) = &self.escalation_details {
            issue.escalation_details = Some(details.clone());
        }
        issue.history.extend(self.append_history.iter().cloned());
        issue.notes.extend(self.append_notes.iter().cloned());
        issue.upvotes = issue.upvotes.saturating_add(self.upvotes_added);
        if let Some(at) = self.updated_at {
            issue.updated_at = issue.updated_at.max(at);
        }
        issue.version += 1;
    }
}

/// Persistence and subscription contract consumed by the lifecycle engine.
///
/// Subscriptions deliver a full snapshot once on registration and again
/// after every committed change, until the returned [`Subscription`] is
/// cancelled or dropped.
pub trait IssueRegistry: Send + Sync {
    /// Store a new issue and return its id.
    ///
    /// # Errors
    ///
    /// Fails if the id already exists or the backing store is unavailable.
    fn create(&self, issue: &Issue) -> Result<String, CivicError>;

    /// Atomically apply `patch` to the issue `id` and return the result.
    ///
    /// # Errors
    ///
    /// [`CivicError::NotFound`] for unknown ids, [`CivicError::VersionConflict`]
    /// for stale `expected_version`, or a storage failure.
    fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicError>;

    /// Fetch one issue.
    ///
    /// # Errors
    ///
    /// Fails only when the backing store is unavailable.
    fn get(&self, id: &str) -> Result<Option<Issue>, CivicError>;

    /// Every stored issue in creation order.
    ///
    /// # Errors
    ///
    /// Fails only when the backing store is unavailable.
    fn list(&self) -> Result<Vec<Issue>, CivicError>;

    /// The hub used to fan out snapshots.
    fn hub(&self) -> &SubscriptionHub;

    /// Every issue, stamped by the hub while the store is locked.
    fn snapshot(&self) -> Stamped;

    /// Watch every issue.
    fn subscribe_all(
        &self,
        on_snapshot: SnapshotCallback,
        on_error: Option<ErrorCallback>,
    ) -> Subscription {
        let subscription = self.hub().register_all(on_snapshot, on_error);
        self.hub().deliver_initial(&subscription, &self.snapshot());
        subscription
    }

    /// Watch the issues filed by one reporter.
    fn subscribe_by_reporter(
        &self,
        reporter_id: &str,
        on_snapshot: SnapshotCallback,
        on_error: Option<ErrorCallback>,
    ) -> Subscription {
        let subscription = self
            .hub()
            .register_reporter(reporter_id, on_snapshot, on_error);
        self.hub().deliver_initial(&subscription, &self.snapshot());
        subscription
    }

    /// Watch a single issue; `None` is delivered while it does not exist.
    fn subscribe_one(&self, id: &str, on_change: IssueCallback) -> Subscription {
        let subscription = self.hub().register_one(id, on_change);
        self.hub().deliver_initial(&subscription, &self.snapshot());
        subscription
    }
}

impl<R: IssueRegistry + ?Sized> IssueRegistry for std::sync::Arc<R> {
    fn create(&self, issue: &Issue) -> Result<String, CivicError> {
        (**self).create(issue)
    }

    fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicError> {
        (**self).update(id, patch)
    }

    fn get(&self, id: &str) -> Result<Option<Issue>, CivicError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<Issue>, CivicError> {
        (**self).list()
    }

    fn hub(&self) -> &SubscriptionHub {
        (**self).hub()
    }

    fn snapshot(&self) -> Stamped {
        (**self).snapshot()
    }
}
