use crate::cmd::{BLOB_DIR, REGISTRY_DB};
use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use civic_core::config::{PROJECT_DIR, default_project_config_toml};
use civic_core::registry::SqliteRegistry;
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml even if `.civic/` already exists.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "issues.sqlite3\nissues.sqlite3-wal\nissues.sqlite3-shm\nblobs/\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    project_dir: String,
    config: String,
    registry: String,
    reinitialized: bool,
}

/// Execute `civic init`. Creates:
///
/// ```text
/// .civic/
///   config.toml       (defaults for duplicates, SLA, lifecycle, priority)
///   issues.sqlite3    (registry, migrated to the latest schema)
///   blobs/            (attachments)
///   .gitignore
/// ```
///
/// An existing registry is never touched beyond migration.
///
/// # Errors
///
/// Fails if `.civic/` exists without `--force`, or on any filesystem error.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let civic_dir = project_root.join(PROJECT_DIR);
    let existed = civic_dir.exists();
    if existed && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `civic init --force` to reinitialize.");
    }

    let blob_dir = civic_dir.join(BLOB_DIR);
    std::fs::create_dir_all(&blob_dir)
        .with_context(|| format!("Failed to create {}", blob_dir.display()))?;

    let config_path = civic_dir.join("config.toml");
    std::fs::write(&config_path, default_project_config_toml()?)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = civic_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;

    let registry_path = civic_dir.join(REGISTRY_DB);
    SqliteRegistry::open(&registry_path)?;
    tracing::info!(path = %civic_dir.display(), reinitialized = existed, "initialized project");

    let result = InitOutput {
        project_dir: civic_dir.display().to_string(),
        config: config_path.display().to_string(),
        registry: registry_path.display().to_string(),
        reinitialized: existed,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Initialized {}", r.project_dir)?;
        writeln!(w)?;
        writeln!(w, "  Config:   {}", r.config)?;
        writeln!(w, "  Registry: {}", r.registry)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  export CIVIC_ACTOR=u1            # who you are")?;
        writeln!(w, "  export CIVIC_ROLE=admin          # citizen (default) or admin")?;
        writeln!(
            w,
            "  civic report --title \"Pothole\" --description \"Deep pothole\" \\\n      --category roads --lat 12.97 --lng 77.59"
        )
    })
}
