//! In-process registry backed by a vector behind one mutex.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::CivicError;
use crate::model::issue::Issue;

use super::{IssuePatch, IssueRegistry, Stamped, SubscriptionHub};

/// Registry holding every issue in memory, in creation order.
///
/// Each patch is validated, version-checked and applied while the lock is
/// held, so a patch is either fully visible or not at all.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    issues: Mutex<Vec<Issue>>,
    hub: SubscriptionHub,
    unavailable: AtomicBool,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `issues`.
    ///
    /// # Errors
    ///
    /// Fails if any issue violates the stored-record invariants.
    pub fn with_issues(issues: Vec<Issue>) -> Result<Self, CivicError> {
        for issue in &issues {
            issue.check_invariants()?;
        }
        Ok(Self {
            issues: Mutex::new(issues),
            ..Self::default()
        })
    }

    /// Simulate an unreachable backend. While set, every call fails with
    /// [`CivicError::UpstreamUnavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    fn guard(&self) -> Result<MutexGuard<'_, Vec<Issue>>, CivicError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(CivicError::UpstreamUnavailable(
                "memory registry is offline".to_string(),
            ));
        }
        Ok(self.issues.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, stamped: Option<Stamped>) {
        if let Some(stamped) = stamped {
            self.hub.publish(&stamped);
        }
    }
}

impl IssueRegistry for MemoryRegistry {
    fn create(&self, issue: &Issue) -> Result<String, CivicError> {
        issue.check_invariants()?;
        let mut issues = self.guard()?;
        if issues.iter().any(|existing| existing.id == issue.id) {
            return Err(CivicError::validation(
                "id",
                format!("issue '{}' already exists", issue.id),
            ));
        }
        issues.push(issue.clone());
        let stamped = self.hub.capture(|| Ok(issues.clone()));
        drop(issues);

        self.publish(stamped);
        Ok(issue.id.clone())
    }

    fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicError> {
        patch.validate(id)?;
        let mut issues = self.guard()?;
        let issue = issues
            .iter_mut()
            .find(|issue| issue.id == id)
            .ok_or_else(|| CivicError::NotFound(id.to_string()))?;
        patch.check_preconditions(issue)?;
        patch.apply(issue);
        let updated = issue.clone();
        let stamped = self.hub.capture(|| Ok(issues.clone()));
        drop(issues);

        self.publish(stamped);
        Ok(updated)
    }

    fn get(&self, id: &str) -> Result<Option<Issue>, CivicError> {
        Ok(self.guard()?.iter().find(|issue| issue.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<Issue>, CivicError> {
        Ok(self.guard()?.clone())
    }

    fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    fn snapshot(&self) -> Stamped {
        match self.guard() {
            Ok(issues) => self.hub.stamp(Ok(issues.clone())),
            Err(err) => self.hub.stamp(Err(err)),
        }
    }
}
