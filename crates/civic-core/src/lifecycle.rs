//! The issue lifecycle engine.
//!
//! Every mutation goes through [`LifecycleEngine`], which checks the caller's
//! role, validates the request against the current issue and the transition
//! policy, then commits exactly one [`IssuePatch`] to the registry.
//!
//! ```text
//! reported ──> acknowledged ──> verified ──> in-progress ──> resolved
//!    │              │              │              │
//!    ├──> rejected  └──────────────┴──────────────┴──> escalated
//!    └──────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::BlobStore;
use crate::classify::PriorityRules;
use crate::clock::{Clock, SystemClock};
use crate::duplicates::{self, DEFAULT_RADIUS_KM};
use crate::error::CivicError;
use crate::model::ids::{new_issue_id, new_note_id};
use crate::model::issue::{
    AdminNote, Category, EscalationDetails, GeoPoint, HistoryEntry, Issue, Status,
};
use crate::registry::{IssuePatch, IssueRegistry};
use crate::session::Session;
use crate::sla::{SlaSpec, compute_sla_deadline};

/// History comment recorded when a citizen files an issue.
pub const REPORTED_COMMENT: &str = "Issue reported by citizen";

/// Which status changes the engine accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Only the edges of the lifecycle graph.
    #[default]
    Strict,
    /// Any status to any status, including no-ops.
    Permissive,
}

impl TransitionPolicy {
    /// Check a single status change.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::InvalidTransition`] when the policy forbids it.
    pub fn check(self, from: Status, to: Status) -> Result<(), CivicError> {
        match self {
            Self::Permissive => Ok(()),
            Self::Strict => strict_check(from, to),
        }
    }

    /// Status a patch must still find when it commits.
    ///
    /// Strict checks only hold if nobody moved the issue in between.
    #[must_use]
    pub const fn precondition(self, current: Status) -> Option<Status> {
        match self {
            Self::Strict => Some(current),
            Self::Permissive => None,
        }
    }
}

/// Targets reachable from `from` under the strict policy.
#[must_use]
pub const fn allowed_targets(from: Status) -> &'static [Status] {
    match from {
        Status::Reported => &[Status::Acknowledged, Status::Rejected, Status::Escalated],
        Status::Acknowledged => &[Status::Verified, Status::Escalated],
        Status::Verified => &[Status::InProgress, Status::Escalated],
        Status::InProgress => &[Status::Resolved, Status::Escalated],
        Status::Resolved | Status::Rejected | Status::Escalated => &[],
    }
}

fn strict_check(from: Status, to: Status) -> Result<(), CivicError> {
    let reason = if from == to {
        "issue is already in that status"
    } else if from.is_terminal() {
        "resolved and rejected issues are closed"
    } else if from == Status::Escalated {
        "escalated issues are handled outside the department workflow"
    } else if allowed_targets(from).contains(&to) {
        return Ok(());
    } else {
        "not an edge of the lifecycle graph"
    };
    Err(CivicError::InvalidTransition { from, to, reason })
}

/// An attachment supplied with a new report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub name: String,
}

/// A citizen submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub location: GeoPoint,
    pub attachment: Option<Attachment>,
}

/// Assignment fields applied together with a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub department: Option<String>,
    pub officer_id: Option<String>,
    pub sla: Option<SlaSpec>,
    pub resolution_notes: Option<String>,
}

impl Assignment {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// An administrator's request to move an issue to `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub status: Status,
    pub comment: Option<String>,
    pub assignment: Assignment,
    pub expected_version: Option<u64>,
}

impl TransitionRequest {
    #[must_use]
    pub fn to(status: Status) -> Self {
        Self {
            status,
            comment: None,
            assignment: Assignment::default(),
            expected_version: None,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignment = assignment;
        self
    }

    #[must_use]
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Referral to an outside authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationRequest {
    pub escalated_to: String,
    pub reason: String,
    pub reference_id: Option<String>,
    pub expected_version: Option<u64>,
}

/// Result for one id of a bulk transition.
#[derive(Debug)]
pub struct BulkOutcome {
    pub id: String,
    pub result: Result<Issue, CivicError>,
}

/// Drives issue creation and every later mutation.
pub struct LifecycleEngine<R> {
    registry: R,
    blobs: Option<Box<dyn BlobStore>>,
    clock: Box<dyn Clock>,
    policy: TransitionPolicy,
    rules: PriorityRules,
    duplicate_radius_km: f64,
}

impl<R: std::fmt::Debug> std::fmt::Debug for LifecycleEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("registry", &self.registry)
            .field("has_blob_store", &self.blobs.is_some())
            .field("policy", &self.policy)
            .field("duplicate_radius_km", &self.duplicate_radius_km)
            .finish_non_exhaustive()
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String, CivicError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CivicError::validation(field, "must not be blank"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(field: &'static str, value: Option<&str>) -> Result<Option<String>, CivicError> {
    value.map(|v| required_text(field, v)).transpose()
}

impl<R: IssueRegistry> LifecycleEngine<R> {
    /// An engine with the system clock, strict policy, default priority
    /// rules and no blob store.
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            blobs: None,
            clock: Box::new(SystemClock),
            policy: TransitionPolicy::default(),
            rules: PriorityRules::default(),
            duplicate_radius_km: DEFAULT_RADIUS_KM,
        }
    }

    #[must_use]
    pub fn with_blob_store(mut self, blobs: impl BlobStore + 'static) -> Self {
        self.blobs = Some(Box::new(blobs));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_priority_rules(mut self, rules: PriorityRules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_duplicate_radius_km(mut self, radius_km: f64) -> Self {
        self.duplicate_radius_km = radius_km;
        self
    }

    pub const fn registry(&self) -> &R {
        &self.registry
    }

    pub const fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn load(&self, id: &str) -> Result<Issue, CivicError> {
        self.registry
            .get(id)?
            .ok_or_else(|| CivicError::NotFound(id.to_string()))
    }

    /// Existing issues that look like duplicates of a submission at `point`.
    ///
    /// # Errors
    ///
    /// Fails when the registry cannot be listed.
    pub fn find_duplicates(
        &self,
        point: GeoPoint,
        category: Category,
    ) -> Result<Vec<Issue>, CivicError> {
        let existing = self.registry.list()?;
        Ok(
            duplicates::find_duplicates(point, category, self.duplicate_radius_km, &existing)
                .into_iter()
                .cloned()
                .collect(),
        )
    }

    /// File a new issue on behalf of `session`.
    ///
    /// The attachment, if any, is uploaded before the registry write; an
    /// upload failure aborts creation.
    ///
    /// # Errors
    ///
    /// [`CivicError::Validation`] for bad input, [`CivicError::AttachmentUpload`]
    /// or a registry failure.
    pub fn create(&self, session: &Session, submission: NewIssue) -> Result<Issue, CivicError> {
        let title = required_text("title", &submission.title)?;
        let description = required_text("description", &submission.description)?;
        let category = submission
            .category
            .ok_or_else(|| CivicError::validation("category", "is required"))?;
        submission.location.validate()?;
        let reporter = required_text("reporter", session.actor_id())?;

        let priority = self.rules.classify(category, &description);
        tracing::debug!(category = %category, priority = %priority, "classified submission");

        let image_url = match (&submission.attachment, &self.blobs) {
            (None, _) => None,
            (Some(attachment), Some(blobs)) => Some(blobs.upload(&attachment.bytes, &attachment.name)?),
            (Some(attachment), None) => {
                return Err(CivicError::AttachmentUpload {
                    name: attachment.name.clone(),
                    reason: "no blob store is configured".to_string(),
                });
            }
        };

        let now = self.now();
        let name = session.actor.name.trim();
        let issue = Issue {
            id: new_issue_id(),
            title,
            description,
            category,
            location: submission.location,
            image_url,
            status: Status::Reported,
            priority,
            reported_by: reporter.clone(),
            reporter_name: (!name.is_empty()).then(|| name.to_string()),
            assigned_department: None,
            assigned_officer_id: None,
            sla_deadline: None,
            resolution_notes: None,
            created_at: now,
            updated_at: now,
            upvotes: 0,
            history: vec![HistoryEntry {
                status: Status::Reported,
                updated_by: reporter,
                timestamp: now,
                comment: Some(REPORTED_COMMENT.to_string()),
            }],
            notes: Vec::new(),
            escalation_details: None,
            version: 0,
        };

        self.registry.create(&issue)?;
        tracing::info!(
            issue_id = %issue.id,
            category = %issue.category,
            priority = %issue.priority,
            "issue reported"
        );
        Ok(issue)
    }

    /// Move an issue to a new status, applying any assignment atomically.
    ///
    /// # Errors
    ///
    /// [`CivicError::PermissionDenied`] for non-admins,
    /// [`CivicError::NotFound`], [`CivicError::InvalidTransition`],
    /// [`CivicError::Validation`] or a registry failure.
    pub fn transition(
        &self,
        session: &Session,
        id: &str,
        request: TransitionRequest,
    ) -> Result<Issue, CivicError> {
        session.require_admin("change issue status")?;
        let current = self.load(id)?;
        self.policy.check(current.status, request.status)?;

        let assignment = &request.assignment;
        let department = optional_text("department", assignment.department.as_deref())?;
        let officer = optional_text("officer", assignment.officer_id.as_deref())?;
        let resolution_notes =
            optional_text("resolution notes", assignment.resolution_notes.as_deref())?;

        let now = self.now();
        let comment = match request.comment.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => default_transition_comment(request.status, assignment.sla),
        };

        let patch = IssuePatch {
            status: Some(request.status),
            assigned_department: department,
            assigned_officer_id: officer,
            sla_deadline: assignment
                .sla
                .map(|spec| compute_sla_deadline(now, spec))
                .transpose()?,
            resolution_notes,
            append_history: vec![HistoryEntry {
                status: request.status,
                updated_by: session.actor_id().to_string(),
                timestamp: now,
                comment: Some(comment),
            }],
            updated_at: Some(now),
            expected_version: request.expected_version,
            expected_status: self.policy.precondition(current.status),
            ..IssuePatch::default()
        };

        let updated = self.registry.update(id, &patch)?;
        tracing::info!(
            issue_id = %id,
            from = %current.status,
            to = %updated.status,
            actor = %session.actor_id(),
            assigned = !assignment.is_empty(),
            "issue transitioned"
        );
        Ok(updated)
    }

    /// Refer an issue to an outside authority.
    ///
    /// # Errors
    ///
    /// As [`Self::transition`]; `escalated_to` and `reason` must be non-blank.
    pub fn escalate(
        &self,
        session: &Session,
        id: &str,
        request: EscalationRequest,
    ) -> Result<Issue, CivicError> {
        session.require_admin("escalate issues")?;
        let escalated_to = required_text("escalated to", &request.escalated_to)?;
        let reason = required_text("reason", &request.reason)?;
        let reference_id = optional_text("reference id", request.reference_id.as_deref())?;

        let current = self.load(id)?;
        self.policy.check(current.status, Status::Escalated)?;

        let now = self.now();
        let patch = IssuePatch {
            status: Some(Status::Escalated),
            escalation_details: Some(EscalationDetails {
                escalated_to: escalated_to.clone(),
                escalated_at: now,
                reason: reason.clone(),
                reference_id,
            }),
            append_history: vec![HistoryEntry {
                status: Status::Escalated,
                updated_by: session.actor_id().to_string(),
                timestamp: now,
                comment: Some(format!("Escalated to {escalated_to}: {reason}")),
            }],
            updated_at: Some(now),
            expected_version: request.expected_version,
            expected_status: self.policy.precondition(current.status),
            ..IssuePatch::default()
        };

        let updated = self.registry.update(id, &patch)?;
        tracing::info!(issue_id = %id, escalated_to = %escalated_to, "issue escalated");
        Ok(updated)
    }

    /// Append an administrative note. Status and history are untouched.
    ///
    /// # Errors
    ///
    /// [`CivicError::PermissionDenied`], [`CivicError::Validation`] for a
    /// blank note, [`CivicError::NotFound`] or a registry failure.
    pub fn add_note(&self, session: &Session, id: &str, content: &str) -> Result<Issue, CivicError> {
        session.require_admin("add notes")?;
        let content = required_text("note", content)?;
        let now = self.now();
        let author = match session.actor.name.trim() {
            "" => session.actor_id().to_string(),
            name => name.to_string(),
        };

        let note = AdminNote {
            id: new_note_id(),
            author,
            content,
            timestamp: now,
        };
        let note_id = note.id.clone();
        let patch = IssuePatch {
            append_notes: vec![note],
            updated_at: Some(now),
            ..IssuePatch::default()
        };

        let updated = self.registry.update(id, &patch)?;
        tracing::info!(issue_id = %id, note_id = %note_id, "note added");
        Ok(updated)
    }

    /// Add one upvote. Any role may upvote.
    ///
    /// # Errors
    ///
    /// [`CivicError::NotFound`] or a registry failure.
    pub fn upvote(&self, session: &Session, id: &str) -> Result<Issue, CivicError> {
        let patch = IssuePatch {
            upvotes_added: 1,
            updated_at: Some(self.now()),
            ..IssuePatch::default()
        };
        let updated = self.registry.update(id, &patch)?;
        tracing::info!(
            issue_id = %id,
            actor = %session.actor_id(),
            upvotes = updated.upvotes,
            "issue upvoted"
        );
        Ok(updated)
    }

    /// Apply the same transition to each id independently.
    ///
    /// # Errors
    ///
    /// Only [`CivicError::PermissionDenied`] fails the whole batch; every
    /// other failure is reported per id.
    pub fn bulk_transition(
        &self,
        session: &Session,
        ids: &[String],
        status: Status,
        comment: Option<&str>,
    ) -> Result<Vec<BulkOutcome>, CivicError> {
        session.require_admin("change issue status")?;
        let outcomes: Vec<BulkOutcome> = ids
            .iter()
            .map(|id| {
                let mut request = TransitionRequest::to(status);
                request.comment = comment.map(ToString::to_string);
                BulkOutcome {
                    id: id.clone(),
                    result: self.transition(session, id, request),
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        tracing::info!(
            status = %status,
            requested = ids.len(),
            failed,
            "bulk transition finished"
        );
        Ok(outcomes)
    }
}

fn default_transition_comment(status: Status, sla: Option<SlaSpec>) -> String {
    match sla {
        Some(spec) => format!("Transitioned to {} with {spec} SLA", status.label()),
        None => format!("Transitioned to {}", status.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::MemoryRegistry;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 8, 30, 0).unwrap()
    }

    fn engine() -> (LifecycleEngine<Arc<MemoryRegistry>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = LifecycleEngine::new(Arc::new(MemoryRegistry::new()))
            .with_clock(Arc::clone(&clock));
        (engine, clock)
    }

    fn citizen() -> Session {
        Session::citizen("u1", "Priya Sharma")
    }

    fn admin() -> Session {
        Session::admin("u4", "Admin User")
    }

    fn pothole() -> NewIssue {
        NewIssue {
            title: "Large pothole on MG Road".into(),
            description: "Deep pothole causing accidents".into(),
            category: Some(Category::Roads),
            location: GeoPoint::new(12.9716, 77.5946),
            attachment: None,
        }
    }

    #[test]
    fn create_sets_initial_state() {
        let (engine, _) = engine();
        let issue = engine.create(&citizen(), pothole()).unwrap();

        assert!(issue.id.starts_with("iss-"));
        assert_eq!(issue.status, Status::Reported);
        assert_eq!(issue.priority, crate::model::issue::Priority::High);
        assert_eq!(issue.reported_by, "u1");
        assert_eq!(issue.reporter_name.as_deref(), Some("Priya Sharma"));
        assert_eq!(issue.upvotes, 0);
        assert_eq!(issue.version, 0);
        assert_eq!(issue.created_at, start());
        assert_eq!(issue.history.len(), 1);
        assert_eq!(issue.history[0].comment.as_deref(), Some(REPORTED_COMMENT));
        assert_eq!(engine.registry().get(&issue.id).unwrap(), Some(issue));
    }

    #[test]
    fn create_rejects_bad_input() {
        let (engine, _) = engine();
        let mut blank = pothole();
        blank.title = "   ".into();
        assert!(matches!(
            engine.create(&citizen(), blank),
            Err(CivicError::Validation { field: "title", .. })
        ));

        let mut no_category = pothole();
        no_category.category = None;
        assert!(matches!(
            engine.create(&citizen(), no_category),
            Err(CivicError::Validation { field: "category", .. })
        ));

        let mut off_map = pothole();
        off_map.location = GeoPoint::new(91.0, 0.0);
        assert!(engine.create(&citizen(), off_map).is_err());
        assert!(engine.registry().list().unwrap().is_empty());
    }

    #[test]
    fn full_workflow_appends_one_entry_per_transition() {
        let (engine, clock) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;

        for status in [
            Status::Acknowledged,
            Status::Verified,
            Status::InProgress,
            Status::Resolved,
        ] {
            clock.advance(Duration::hours(1));
            let issue = engine
                .transition(&admin(), &id, TransitionRequest::to(status))
                .unwrap();
            assert_eq!(issue.status, status);
            assert_eq!(issue.history.last().unwrap().status, status);
            assert_eq!(issue.history.last().unwrap().updated_by, "u4");
            assert_eq!(issue.updated_at, clock.now());
        }

        let issue = engine.registry().get(&id).unwrap().unwrap();
        assert_eq!(issue.history.len(), 5);
        assert_eq!(issue.version, 4);
    }

    #[test]
    fn strict_policy_rejects_skips_noops_and_reopening() {
        let (engine, _) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;

        let err = engine
            .transition(&admin(), &id, TransitionRequest::to(Status::Resolved))
            .unwrap_err();
        assert!(matches!(err, CivicError::InvalidTransition { .. }));

        let err = engine
            .transition(&admin(), &id, TransitionRequest::to(Status::Reported))
            .unwrap_err();
        assert!(matches!(err, CivicError::InvalidTransition { .. }));

        engine
            .transition(&admin(), &id, TransitionRequest::to(Status::Rejected))
            .unwrap();
        let err = engine
            .transition(&admin(), &id, TransitionRequest::to(Status::Acknowledged))
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
        assert_eq!(engine.registry().get(&id).unwrap().unwrap().history.len(), 2);
    }

    #[test]
    fn permissive_policy_allows_any_change() {
        let (engine, _) = engine();
        let engine = engine.with_policy(TransitionPolicy::Permissive);
        let id = engine.create(&citizen(), pothole()).unwrap().id;

        engine
            .transition(&admin(), &id, TransitionRequest::to(Status::Resolved))
            .unwrap();
        let issue = engine
            .transition(&admin(), &id, TransitionRequest::to(Status::Reported))
            .unwrap();
        assert_eq!(issue.status, Status::Reported);
        assert_eq!(issue.history.len(), 3);
    }

    #[test]
    fn citizens_cannot_mutate() {
        let (engine, _) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;

        assert!(matches!(
            engine.transition(&citizen(), &id, TransitionRequest::to(Status::Acknowledged)),
            Err(CivicError::PermissionDenied { .. })
        ));
        assert!(matches!(
            engine.add_note(&citizen(), &id, "hello"),
            Err(CivicError::PermissionDenied { .. })
        ));
        let escalation = EscalationRequest {
            escalated_to: "Commissioner".into(),
            reason: "Delay".into(),
            reference_id: None,
            expected_version: None,
        };
        assert!(matches!(
            engine.escalate(&citizen(), &id, escalation),
            Err(CivicError::PermissionDenied { .. })
        ));
        assert_eq!(engine.registry().get(&id).unwrap().unwrap().version, 0);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.transition(&admin(), "iss-none", TransitionRequest::to(Status::Acknowledged)),
            Err(CivicError::NotFound(_))
        ));
        assert!(matches!(
            engine.upvote(&citizen(), "iss-none"),
            Err(CivicError::NotFound(_))
        ));
    }

    #[test]
    fn assignment_and_relative_sla_commit_with_status() {
        let (engine, clock) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;
        clock.advance(Duration::hours(2));

        let request = TransitionRequest::to(Status::Acknowledged).with_assignment(Assignment {
            department: Some("Public Works Dept.".into()),
            officer_id: Some("o1".into()),
            sla: Some(SlaSpec::Relative { days: 3 }),
            resolution_notes: None,
        });
        let issue = engine.transition(&admin(), &id, request).unwrap();

        assert_eq!(issue.assigned_department.as_deref(), Some("Public Works Dept."));
        assert_eq!(issue.assigned_officer_id.as_deref(), Some("o1"));
        assert_eq!(issue.sla_deadline, Some(clock.now() + Duration::days(3)));
        assert_eq!(
            issue.history.last().unwrap().comment.as_deref(),
            Some("Transitioned to Acknowledged with 3 Days SLA")
        );
    }

    #[test]
    fn blank_department_is_rejected() {
        let (engine, _) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;
        let request = TransitionRequest::to(Status::Acknowledged).with_assignment(Assignment {
            department: Some("  ".into()),
            ..Assignment::default()
        });
        assert!(matches!(
            engine.transition(&admin(), &id, request),
            Err(CivicError::Validation { field: "department", .. })
        ));
    }

    #[test]
    fn escalate_records_details() {
        let (engine, clock) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;
        clock.advance(Duration::days(1));

        let issue = engine
            .escalate(
                &admin(),
                &id,
                EscalationRequest {
                    escalated_to: "Municipal Commissioner".into(),
                    reason: "No response in 7 days".into(),
                    reference_id: Some("PG-2026-118".into()),
                    expected_version: None,
                },
            )
            .unwrap();

        assert_eq!(issue.status, Status::Escalated);
        let details = issue.escalation_details.unwrap();
        assert_eq!(details.escalated_at, clock.now());
        assert_eq!(details.reference_id.as_deref(), Some("PG-2026-118"));
        assert_eq!(
            issue.history.last().unwrap().comment.as_deref(),
            Some("Escalated to Municipal Commissioner: No response in 7 days")
        );
    }

    #[test]
    fn notes_and_upvotes_leave_status_alone() {
        let (engine, clock) = engine();
        let created = engine.create(&citizen(), pothole()).unwrap();
        clock.advance(Duration::minutes(5));

        let noted = engine.add_note(&admin(), &created.id, "Crew scheduled").unwrap();
        assert_eq!(noted.status, created.status);
        assert_eq!(noted.history, created.history);
        assert_eq!(noted.notes.len(), 1);
        assert_eq!(noted.notes[0].author, "Admin User");
        assert_eq!(noted.notes[0].id.len(), 9);
        assert!(noted.updated_at > created.updated_at);

        let upvoted = engine.upvote(&citizen(), &created.id).unwrap();
        assert_eq!(upvoted.upvotes, 1);
        assert_eq!(upvoted.history, created.history);

        assert!(matches!(
            engine.add_note(&admin(), &created.id, " "),
            Err(CivicError::Validation { .. })
        ));
    }

    #[test]
    fn stale_expected_version_conflicts() {
        let (engine, _) = engine();
        let id = engine.create(&citizen(), pothole()).unwrap().id;
        engine.upvote(&citizen(), &id).unwrap();

        let err = engine
            .transition(
                &admin(),
                &id,
                TransitionRequest::to(Status::Acknowledged).expecting_version(0),
            )
            .unwrap_err();
        assert!(matches!(err, CivicError::VersionConflict { .. }));
        assert_eq!(
            engine.registry().get(&id).unwrap().unwrap().status,
            Status::Reported
        );
    }

    #[test]
    fn bulk_transition_reports_each_id() {
        let (engine, _) = engine();
        let a = engine.create(&citizen(), pothole()).unwrap().id;
        let b = engine.create(&citizen(), pothole()).unwrap().id;
        engine
            .transition(&admin(), &b, TransitionRequest::to(Status::Rejected))
            .unwrap();

        let ids = vec![a.clone(), b.clone(), "iss-missing".to_string()];
        let outcomes = engine
            .bulk_transition(&admin(), &ids, Status::Acknowledged, Some("Bulk triage"))
            .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(CivicError::InvalidTransition { .. })));
        assert!(matches!(outcomes[2].result, Err(CivicError::NotFound(_))));

        assert!(engine
            .bulk_transition(&citizen(), &ids, Status::Acknowledged, None)
            .is_err());
    }

    #[test]
    fn duplicates_are_found_through_the_registry() {
        let (engine, _) = engine();
        engine.create(&citizen(), pothole()).unwrap();
        let found = engine
            .find_duplicates(GeoPoint::new(12.9717, 77.5947), Category::Roads)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(engine
            .find_duplicates(GeoPoint::new(12.9717, 77.5947), Category::Water)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn allowed_targets_match_policy() {
        for from in Status::ALL {
            for to in Status::ALL {
                let allowed = TransitionPolicy::Strict.check(from, to).is_ok();
                assert_eq!(allowed, allowed_targets(from).contains(&to), "{from} -> {to}");
            }
        }
    }
}
