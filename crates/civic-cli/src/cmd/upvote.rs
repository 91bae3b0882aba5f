//! `civic upvote`: add one vote to an issue.

use crate::cmd::Project;
use crate::output::{OutputMode, render};
use anyhow::Result;
use civic_core::session::Session;
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct UpvoteArgs {
    /// Issue id.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct UpvoteOutput {
    id: String,
    upvotes: u64,
}

/// Execute `civic upvote`.
///
/// # Errors
///
/// [`civic_core::CivicError::NotFound`] or a registry failure.
pub fn run_upvote(
    args: &UpvoteArgs,
    session: &Session,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let project = Project::open(project_root)?;
    let issue = project.engine.upvote(session, &args.id)?;
    let result = UpvoteOutput {
        id: issue.id,
        upvotes: issue.upvotes,
    };
    render(output, &result, |r, w| writeln!(w, "▲ {} now has {} upvote(s)", r.id, r.upvotes))
}
