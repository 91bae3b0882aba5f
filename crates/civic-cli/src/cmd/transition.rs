//! `civic transition`: move one or more issues to a new status.

use crate::cmd::Project;
use crate::cmd::show::{IssueView, render_issue};
use crate::output::{OutputMode, render_mode};
use anyhow::Result;
use civic_core::error::CivicError;
use civic_core::lifecycle::{Assignment, TransitionRequest};
use civic_core::session::Session;
use civic_core::sla::SlaSpec;
use civic_core::Status;
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct TransitionArgs {
    /// One or more issue ids. More than one applies the change to each
    /// independently.
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,

    /// Target status, e.g. `acknowledged` or `in-progress`.
    #[arg(long = "to", value_name = "STATUS")]
    pub status: String,

    /// History comment. Defaults to "Transitioned to <Status>".
    #[arg(short, long)]
    pub comment: Option<String>,

    /// Department taking ownership.
    #[arg(long)]
    pub department: Option<String>,

    /// Officer assigned to the issue.
    #[arg(long = "officer", value_name = "OFFICER_ID")]
    pub officer_id: Option<String>,

    /// SLA: "3 Days", a YYYY-MM-DD date or an RFC 3339 timestamp.
    #[arg(long)]
    pub sla: Option<String>,

    /// Notes recorded on resolution.
    #[arg(long)]
    pub resolution_notes: Option<String>,

    /// Fail unless the issue is still at this version.
    #[arg(long, value_name = "VERSION")]
    pub expect_version: Option<u64>,
}

impl TransitionArgs {
    fn assignment(&self) -> Result<Assignment, CivicError> {
        Ok(Assignment {
            department: self.department.clone(),
            officer_id: self.officer_id.clone(),
            sla: self.sla.as_deref().map(str::parse::<SlaSpec>).transpose()?,
            resolution_notes: self.resolution_notes.clone(),
        })
    }

    fn is_bulk(&self) -> bool {
        self.ids.len() > 1
    }

    fn check_bulk(&self, assignment: &Assignment) -> Result<(), CivicError> {
        if !self.is_bulk() {
            return Ok(());
        }
        if assignment != &Assignment::default() {
            return Err(CivicError::validation(
                "ids",
                "assignment flags apply to a single issue only",
            ));
        }
        if self.expect_version.is_some() {
            return Err(CivicError::validation(
                "ids",
                "--expect-version applies to a single issue only",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct BulkRow {
    id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

/// Execute `civic transition`.
///
/// # Errors
///
/// For a single id, any engine failure. For several ids, a permission
/// failure, or a summary error when at least one id failed.
pub fn run_transition(
    args: &TransitionArgs,
    session: &Session,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let status: Status = args.status.parse()?;
    let assignment = args.assignment()?;
    args.check_bulk(&assignment)?;
    let project = Project::open(project_root)?;

    if !args.is_bulk() {
        let mut request = TransitionRequest::to(status).with_assignment(assignment);
        request.comment.clone_from(&args.comment);
        request.expected_version = args.expect_version;
        let issue = project.engine.transition(session, &args.ids[0], request)?;
        return render_issue(output, &IssueView::new(issue, &project));
    }

    let outcomes =
        project
            .engine
            .bulk_transition(session, &args.ids, status, args.comment.as_deref())?;
    let rows: Vec<BulkRow> = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(issue) => BulkRow {
                id: outcome.id,
                ok: true,
                status: Some(issue.status),
                error: None,
                error_code: None,
            },
            Err(err) => BulkRow {
                id: outcome.id,
                ok: false,
                status: None,
                error: Some(err.to_string()),
                error_code: Some(err.error_code().code()),
            },
        })
        .collect();

    render_mode(
        output,
        &rows,
        |rows, w| {
            for row in rows {
                match (&row.status, &row.error) {
                    (Some(status), _) => writeln!(w, "{}\tok\t{status}", row.id)?,
                    (None, error) => {
                        writeln!(w, "{}\terror\t{}", row.id, error.as_deref().unwrap_or_default())?;
                    }
                }
            }
            Ok(())
        },
        |rows, w| {
            for row in rows {
                match (&row.status, &row.error) {
                    (Some(status), _) => writeln!(w, "✓ {} → {}", row.id, status.label())?,
                    (None, error) => {
                        writeln!(w, "✗ {}: {}", row.id, error.as_deref().unwrap_or_default())?;
                    }
                }
            }
            Ok(())
        },
    )?;

    let failed = rows.iter().filter(|row| !row.ok).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} transitions failed", rows.len());
    }
    Ok(())
}
