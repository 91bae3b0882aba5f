pub mod completions;
pub mod dup;
pub mod escalate;
pub mod init;
pub mod list;
pub mod note;
pub mod report;
pub mod show;
pub mod sla;
pub mod stats;
pub mod transition;
pub mod upvote;

use anyhow::{Context as _, Result};
use civic_core::blob::FsBlobStore;
use civic_core::config::{PROJECT_DIR, ProjectConfig, load_project_config};
use civic_core::error::CivicError;
use civic_core::registry::SqliteRegistry;
use civic_core::LifecycleEngine;
use std::path::{Path, PathBuf};

/// Registry database file inside the project directory.
pub const REGISTRY_DB: &str = "issues.sqlite3";
/// Attachment directory inside the project directory.
pub const BLOB_DIR: &str = "blobs";

/// An opened project: its root, config and a configured engine.
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub engine: LifecycleEngine<SqliteRegistry>,
}

impl Project {
    /// Find the nearest initialized project at or above `start` and open it.
    ///
    /// # Errors
    ///
    /// [`CivicError::NotInitialized`] when no `.civic/` directory exists,
    /// or an error opening the config or registry.
    pub fn open(start: &Path) -> Result<Self> {
        let root = find_project_root(start)?;
        let config = load_project_config(&root).map_err(|e| {
            anyhow::Error::new(CivicError::Config(format!("{e:#}")))
        })?;
        let civic_dir = root.join(PROJECT_DIR);
        let registry = SqliteRegistry::open(&civic_dir.join(REGISTRY_DB))
            .with_context(|| format!("open registry in {}", civic_dir.display()))?;

        let engine = LifecycleEngine::new(registry)
            .with_blob_store(FsBlobStore::new(civic_dir.join(BLOB_DIR)))
            .with_policy(config.transition_policy())
            .with_priority_rules(config.priority_rules())
            .with_duplicate_radius_km(config.duplicates.radius_km);
        tracing::debug!(root = %root.display(), policy = ?engine.policy(), "opened project");

        Ok(Self {
            root,
            config,
            engine,
        })
    }
}

/// Walk up from `start` to the first directory containing `.civic/`.
///
/// # Errors
///
/// [`CivicError::NotInitialized`] when no ancestor has one.
pub fn find_project_root(start: &Path) -> Result<PathBuf, CivicError> {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DIR).is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            CivicError::NotInitialized(format!(
                "no {PROJECT_DIR}/ directory in {} or its parents",
                start.display()
            ))
        })
}

/// Parse an optional enum-like flag through its `FromStr`.
///
/// # Errors
///
/// The parse error of `T`.
pub fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, CivicError>
where
    T: std::str::FromStr<Err = CivicError>,
{
    raw.map(str::parse).transpose()
}
