//! In-process fan-out of registry snapshots to subscribers.
//!
//! Callbacks are always invoked without the hub lock held, so a callback may
//! cancel its own subscription or read from the registry.
//!
//! Registries stamp each snapshot with a sequence number while their write
//! lock is held. A subscriber only ever sees increasing sequence numbers:
//! snapshots older than the one it already received are dropped, and
//! deliveries to one subscriber never overlap.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::CivicError;
use crate::model::issue::Issue;

/// Receives a full replacement snapshot of the watched issues.
pub type SnapshotCallback = Box<dyn Fn(Vec<Issue>) + Send + Sync>;
/// Receives the watched issue, or `None` while it does not exist.
pub type IssueCallback = Box<dyn Fn(Option<Issue>) + Send + Sync>;
/// Receives registry failures for list-style subscriptions.
pub type ErrorCallback = Box<dyn Fn(&CivicError) + Send + Sync>;

enum Scope {
    All,
    Reporter(String),
    One(String),
}

enum Sink {
    Many {
        on_snapshot: SnapshotCallback,
        on_error: Option<ErrorCallback>,
    },
    One(IssueCallback),
}

type Snapshot = Result<Vec<Issue>, CivicError>;

/// A registry snapshot tagged with the commit sequence it was taken at.
#[derive(Debug)]
pub struct Stamped {
    sequence: u64,
    snapshot: Arc<Snapshot>,
}

impl Stamped {
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Default)]
struct Mailbox {
    last: u64,
    pending: Option<(u64, Arc<Snapshot>)>,
    delivering: bool,
}

struct Subscriber {
    scope: Scope,
    sink: Sink,
    active: Arc<AtomicBool>,
    mailbox: Mutex<Mailbox>,
}

impl Subscriber {
    /// Queue a snapshot and drain the queue unless another thread already is.
    fn offer(&self, sequence: u64, snapshot: &Arc<Snapshot>) {
        let mut mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        let newest = mailbox.pending.as_ref().map_or(mailbox.last, |(seq, _)| *seq);
        if sequence <= newest {
            return;
        }
        mailbox.pending = Some((sequence, Arc::clone(snapshot)));
        if mailbox.delivering {
            return;
        }
        mailbox.delivering = true;
        while let Some((seq, next)) = mailbox.pending.take() {
            mailbox.last = seq;
            drop(mailbox);
            self.deliver(&next);
            mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        }
        mailbox.delivering = false;
    }

    fn deliver(&self, snapshot: &Snapshot) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        match (&self.sink, snapshot) {
            (Sink::Many { on_snapshot, .. }, Ok(issues)) => {
                let selected = match &self.scope {
                    Scope::Reporter(reporter) => issues
                        .iter()
                        .filter(|issue| &issue.reported_by == reporter)
                        .cloned()
                        .collect(),
                    Scope::All | Scope::One(_) => issues.clone(),
                };
                on_snapshot(selected);
            }
            (Sink::Many { on_error, .. }, Err(err)) => match on_error {
                Some(on_error) => on_error(err),
                None => tracing::warn!(error = %err, "subscription snapshot failed"),
            },
            (Sink::One(on_change), Ok(issues)) => {
                if let Scope::One(id) = &self.scope {
                    on_change(issues.iter().find(|issue| &issue.id == id).cloned());
                }
            }
            (Sink::One(_), Err(err)) => {
                tracing::warn!(error = %err, "single-issue subscription snapshot failed");
            }
        }
    }
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: BTreeMap<u64, Arc<Subscriber>>,
}

/// Registry of live subscribers.
#[derive(Default)]
pub struct SubscriptionHub {
    state: Arc<Mutex<HubState>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("subscribers", &self.len())
            .finish()
    }
}

fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SubscriptionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&self, scope: Scope, sink: Sink) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let subscriber = Arc::new(Subscriber {
            scope,
            sink,
            active: Arc::clone(&active),
            mailbox: Mutex::new(Mailbox::default()),
        });
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.insert(id, subscriber);
        drop(state);

        Subscription {
            id,
            active,
            hub: Arc::downgrade(&self.state),
        }
    }

    pub fn register_all(
        &self,
        on_snapshot: SnapshotCallback,
        on_error: Option<ErrorCallback>,
    ) -> Subscription {
        self.register(Scope::All, Sink::Many { on_snapshot, on_error })
    }

    pub fn register_reporter(
        &self,
        reporter_id: &str,
        on_snapshot: SnapshotCallback,
        on_error: Option<ErrorCallback>,
    ) -> Subscription {
        self.register(
            Scope::Reporter(reporter_id.to_string()),
            Sink::Many { on_snapshot, on_error },
        )
    }

    pub fn register_one(&self, id: &str, on_change: IssueCallback) -> Subscription {
        self.register(Scope::One(id.to_string()), Sink::One(on_change))
    }

    /// Tag `snapshot` with the next sequence number.
    ///
    /// Call while holding the registry lock the snapshot was read under, so
    /// sequence order matches commit order.
    pub fn stamp(&self, snapshot: Snapshot) -> Stamped {
        Stamped {
            sequence: self.sequence.fetch_add(1, Ordering::AcqRel) + 1,
            snapshot: Arc::new(snapshot),
        }
    }

    /// Stamp a post-commit snapshot, or return `None` without evaluating
    /// `snapshot` when nobody is subscribed.
    pub fn capture(&self, snapshot: impl FnOnce() -> Snapshot) -> Option<Stamped> {
        if self.is_empty() {
            return None;
        }
        Some(self.stamp(snapshot()))
    }

    /// Deliver the first snapshot to a freshly registered subscription.
    pub fn deliver_initial(&self, subscription: &Subscription, stamped: &Stamped) {
        let subscriber = lock(&self.state).subscribers.get(&subscription.id).cloned();
        if let Some(subscriber) = subscriber {
            subscriber.offer(stamped.sequence, &stamped.snapshot);
        }
    }

    /// Deliver a snapshot to every subscriber that has not seen a newer one.
    pub fn publish(&self, stamped: &Stamped) {
        let subscribers: Vec<Arc<Subscriber>> =
            lock(&self.state).subscribers.values().cloned().collect();
        tracing::trace!(
            subscribers = subscribers.len(),
            sequence = stamped.sequence,
            "publishing snapshot"
        );
        for subscriber in subscribers {
            subscriber.offer(stamped.sequence, &stamped.snapshot);
        }
    }
}

/// Handle for a live subscription. Dropping it cancels delivery.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    hub: Weak<Mutex<HubState>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery. No callback runs after this returns, except one
    /// already executing on another thread.
    pub fn cancel(self) {
        drop(self);
    }

    fn detach(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(state) = self.hub.upgrade() {
            lock(&state).subscribers.remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
