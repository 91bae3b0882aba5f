//! Failure paths: attachment uploads, offline registries and stale writes.

use std::sync::{Arc, Mutex};

use civic_core::blob::{BlobStore, FsBlobStore};
use civic_core::error::{CivicError, ErrorCode};
use civic_core::lifecycle::{
    Assignment, Attachment, EscalationRequest, LifecycleEngine, NewIssue, TransitionPolicy,
    TransitionRequest,
};
use civic_core::model::issue::{Category, GeoPoint, Issue, Status};
use civic_core::registry::{IssuePatch, IssueRegistry, MemoryRegistry, Stamped, SubscriptionHub};
use civic_core::sla::SlaSpec;
use civic_core::session::Session;

struct RejectingBlobStore;

impl BlobStore for RejectingBlobStore {
    fn upload(&self, _bytes: &[u8], name: &str) -> Result<String, CivicError> {
        Err(CivicError::AttachmentUpload {
            name: name.to_string(),
            reason: "quota exceeded".to_string(),
        })
    }
}

fn report_with_photo() -> NewIssue {
    NewIssue {
        title: "Exposed wires on pole".into(),
        description: "Live wires hanging low near the bus stop".into(),
        category: Some(Category::Electricity),
        location: GeoPoint::new(12.9352, 77.6245),
        attachment: Some(Attachment {
            bytes: b"\xff\xd8\xff\xe0 fake jpeg".to_vec(),
            name: "pole.jpg".into(),
        }),
    }
}

fn citizen() -> Session {
    Session::citizen("u1", "Priya Sharma")
}

fn admin() -> Session {
    Session::admin("u4", "Admin User")
}

type Interleave = Box<dyn FnOnce(&Arc<MemoryRegistry>) + Send>;

/// Runs one foreign write right after the engine reads its snapshot.
struct InterleavingRegistry {
    inner: Arc<MemoryRegistry>,
    after_get: Mutex<Option<Interleave>>,
}

impl InterleavingRegistry {
    fn new(inner: Arc<MemoryRegistry>, after_get: Interleave) -> Self {
        Self {
            inner,
            after_get: Mutex::new(Some(after_get)),
        }
    }
}

impl IssueRegistry for InterleavingRegistry {
    fn create(&self, issue: &Issue) -> Result<String, CivicError> {
        self.inner.create(issue)
    }

    fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicError> {
        self.inner.update(id, patch)
    }

    fn get(&self, id: &str) -> Result<Option<Issue>, CivicError> {
        let snapshot = self.inner.get(id)?;
        let pending = self.after_get.lock().unwrap().take();
        if let Some(write) = pending {
            write(&self.inner);
        }
        Ok(snapshot)
    }

    fn list(&self) -> Result<Vec<Issue>, CivicError> {
        self.inner.list()
    }

    fn hub(&self) -> &SubscriptionHub {
        self.inner.hub()
    }

    fn snapshot(&self) -> Stamped {
        self.inner.snapshot()
    }
}

fn reported_issue(registry: &Arc<MemoryRegistry>) -> String {
    LifecycleEngine::new(Arc::clone(registry))
        .create(&citizen(), report_without_photo())
        .unwrap()
        .id
}

fn report_without_photo() -> NewIssue {
    NewIssue {
        attachment: None,
        ..report_with_photo()
    }
}

fn reject_concurrently(id: String) -> Interleave {
    Box::new(move |registry| {
        LifecycleEngine::new(Arc::clone(registry))
            .transition(
                &Session::admin("u5", "Other Admin"),
                &id,
                TransitionRequest::to(Status::Rejected),
            )
            .unwrap();
    })
}

#[test]
fn failed_upload_creates_no_issue() {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = LifecycleEngine::new(Arc::clone(&registry)).with_blob_store(RejectingBlobStore);

    let err = engine.create(&citizen(), report_with_photo()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::AttachmentUploadFailed);
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn attachment_without_blob_store_is_rejected() {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = LifecycleEngine::new(Arc::clone(&registry));
    assert!(matches!(
        engine.create(&citizen(), report_with_photo()),
        Err(CivicError::AttachmentUpload { .. })
    ));
    assert!(registry.list().unwrap().is_empty());
}

#[test]
fn successful_upload_sets_image_url() {
    let dir = tempfile::tempdir().unwrap();
    let engine = LifecycleEngine::new(MemoryRegistry::new())
        .with_blob_store(FsBlobStore::new(dir.path().join("blobs")));
    let issue = engine.create(&citizen(), report_with_photo()).unwrap();
    let url = issue.image_url.expect("image url");
    assert!(url.starts_with("file://"));
    assert!(url.ends_with(".jpg"));
}

#[test]
fn offline_registry_surfaces_upstream_error() {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = LifecycleEngine::new(Arc::clone(&registry));
    let mut report = report_with_photo();
    report.attachment = None;
    let id = engine.create(&citizen(), report).unwrap().id;

    registry.set_unavailable(true);
    let err = engine
        .transition(
            &Session::admin("u4", "Admin"),
            &id,
            TransitionRequest::to(Status::Acknowledged),
        )
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::UpstreamUnavailable);

    registry.set_unavailable(false);
    let issue = registry.get(&id).unwrap().unwrap();
    assert_eq!(issue.status, Status::Reported);
    assert_eq!(issue.history.len(), 1);
}

#[test]
fn stale_version_leaves_issue_untouched() {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = LifecycleEngine::new(Arc::clone(&registry));
    let mut report = report_with_photo();
    report.attachment = None;
    let issue = engine.create(&citizen(), report).unwrap();
    let admin = Session::admin("u4", "Admin");

    engine
        .transition(&admin, &issue.id, TransitionRequest::to(Status::Acknowledged))
        .unwrap();
    let err = engine
        .transition(
            &admin,
            &issue.id,
            TransitionRequest::to(Status::Verified).expecting_version(issue.version),
        )
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::VersionConflict);
    assert_eq!(
        registry.get(&issue.id).unwrap().unwrap().status,
        Status::Acknowledged
    );
}

#[test]
fn strict_transition_rechecks_status_at_commit() {
    let registry = Arc::new(MemoryRegistry::new());
    let id = reported_issue(&registry);
    let racing = InterleavingRegistry::new(Arc::clone(&registry), reject_concurrently(id.clone()));
    let engine = LifecycleEngine::new(racing);

    let err = engine
        .transition(&admin(), &id, TransitionRequest::to(Status::Acknowledged))
        .unwrap_err();
    assert!(matches!(
        err,
        CivicError::InvalidTransition {
            from: Status::Rejected,
            to: Status::Acknowledged,
            ..
        }
    ));

    let stored = registry.get(&id).unwrap().unwrap();
    let statuses: Vec<Status> = stored.history.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![Status::Reported, Status::Rejected]);
}

#[test]
fn strict_escalation_rechecks_status_at_commit() {
    let registry = Arc::new(MemoryRegistry::new());
    let id = reported_issue(&registry);
    let racing = InterleavingRegistry::new(Arc::clone(&registry), reject_concurrently(id.clone()));
    let engine = LifecycleEngine::new(racing);

    let err = engine
        .escalate(
            &admin(),
            &id,
            EscalationRequest {
                escalated_to: "State Electricity Board".into(),
                reason: "High-tension line".into(),
                reference_id: None,
                expected_version: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidStateTransition);
    assert!(registry.get(&id).unwrap().unwrap().escalation_details.is_none());
}

#[test]
fn permissive_policy_keeps_last_writer_wins() {
    let registry = Arc::new(MemoryRegistry::new());
    let id = reported_issue(&registry);
    let racing = InterleavingRegistry::new(Arc::clone(&registry), reject_concurrently(id.clone()));
    let engine = LifecycleEngine::new(racing).with_policy(TransitionPolicy::Permissive);

    let issue = engine
        .transition(&admin(), &id, TransitionRequest::to(Status::Acknowledged))
        .unwrap();
    assert_eq!(issue.status, Status::Acknowledged);
    assert_eq!(issue.history.len(), 3);
}

#[test]
fn out_of_range_sla_is_a_validation_error() {
    let registry = Arc::new(MemoryRegistry::new());
    let id = reported_issue(&registry);
    let engine = LifecycleEngine::new(Arc::clone(&registry));

    let sla: SlaSpec = "4000000000 Days".parse().unwrap();
    let err = engine
        .transition(
            &admin(),
            &id,
            TransitionRequest::to(Status::Acknowledged).with_assignment(Assignment {
                sla: Some(sla),
                ..Assignment::default()
            }),
        )
        .unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ValidationFailed);
    assert_eq!(registry.get(&id).unwrap().unwrap().status, Status::Reported);
}
