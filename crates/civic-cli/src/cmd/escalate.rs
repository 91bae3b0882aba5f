//! `civic escalate`: refer an issue to an outside authority.

use crate::cmd::Project;
use crate::cmd::show::{IssueView, render_issue};
use crate::output::OutputMode;
use anyhow::Result;
use civic_core::lifecycle::EscalationRequest;
use civic_core::session::Session;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug)]
pub struct EscalateArgs {
    /// Issue id.
    pub id: String,

    /// Authority the issue is referred to, e.g. "State PWD".
    #[arg(long = "to", value_name = "AUTHORITY")]
    pub escalated_to: String,

    /// Why the issue is being escalated.
    #[arg(short, long)]
    pub reason: String,

    /// Reference number issued by the receiving authority.
    #[arg(long = "reference", value_name = "REFERENCE_ID")]
    pub reference_id: Option<String>,

    /// Fail unless the issue is still at this version.
    #[arg(long, value_name = "VERSION")]
    pub expect_version: Option<u64>,
}

/// Execute `civic escalate`.
///
/// # Errors
///
/// Permission, validation, transition or registry failures from the engine.
pub fn run_escalate(
    args: &EscalateArgs,
    session: &Session,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let project = Project::open(project_root)?;
    let issue = project.engine.escalate(
        session,
        &args.id,
        EscalationRequest {
            escalated_to: args.escalated_to.clone(),
            reason: args.reason.clone(),
            reference_id: args.reference_id.clone(),
            expected_version: args.expect_version,
        },
    )?;
    render_issue(output, &IssueView::new(issue, &project))
}
