//! `civic note`: append an administrative note.

use crate::cmd::Project;
use crate::cmd::show::{IssueView, render_issue};
use crate::output::OutputMode;
use anyhow::Result;
use civic_core::session::Session;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct NoteArgs {
    /// Issue id.
    pub id: String,

    /// Note text.
    pub content: String,
}

/// Execute `civic note`.
///
/// # Errors
///
/// Permission, validation or registry failures from the engine.
pub fn run_note(args: &NoteArgs, session: &Session, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let issue = project.engine.add_note(session, &args.id, &args.content)?;
    render_issue(output, &IssueView::new(issue, &project))
}
