//! civic-core library.
//!
//! The core of a municipal issue-reporting system: the issue model, the
//! priority classifier, the duplicate detector, SLA checks and the lifecycle
//! engine that drives every mutation through an [`registry::IssueRegistry`].
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::CivicError`]; setup
//!   edges (config loading, opening databases) return `anyhow::Result`.
//! - **Logging**: `tracing` macros; committed mutations log at `info`.
//! - **Time**: every timestamp is a `chrono::DateTime<Utc>` taken from an
//!   injectable [`clock::Clock`].

pub mod blob;
pub mod classify;
pub mod clock;
pub mod config;
pub mod db;
pub mod duplicates;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod model;
pub mod record;
pub mod registry;
pub mod session;
pub mod sla;
pub mod stats;

pub use error::{CivicError, ErrorCode};
pub use lifecycle::{LifecycleEngine, TransitionPolicy};
pub use model::issue::{Category, GeoPoint, Issue, Priority, Status};
pub use session::{Role, Session};
