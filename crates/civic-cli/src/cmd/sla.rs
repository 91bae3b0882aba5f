//! `civic sla`: deadline report for assigned issues.

use crate::cmd::Project;
use crate::cmd::show::{local_time, sla_label};
use crate::output::{OutputMode, render_mode, truncate};
use anyhow::Result;
use chrono::{DateTime, Utc};
use civic_core::registry::IssueRegistry;
use civic_core::sla::{SlaState, sla_state};
use civic_core::Status;
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct SlaArgs {
    /// Show only overdue and nearly-due issues.
    #[arg(long)]
    pub attention: bool,

    /// Include resolved issues.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct SlaRow {
    id: String,
    title: String,
    status: Status,
    department: Option<String>,
    deadline: DateTime<Utc>,
    state: SlaState,
    /// Negative once the deadline has passed.
    hours_remaining: i64,
}

const fn wanted(state: SlaState, args: &SlaArgs) -> bool {
    match state {
        SlaState::NoDeadline => false,
        SlaState::Overdue | SlaState::Nearing => true,
        SlaState::OnTrack => !args.attention,
        SlaState::Met => args.all && !args.attention,
    }
}

/// Execute `civic sla`. Rows are ordered by deadline, earliest first.
///
/// # Errors
///
/// Fails on a registry failure.
pub fn run_sla(args: &SlaArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let now = project.engine.now();
    let window = project.config.nearing_window();

    let mut rows: Vec<SlaRow> = project
        .engine
        .registry()
        .list()?
        .into_iter()
        .filter_map(|issue| {
            let state = sla_state(&issue, now, window);
            let deadline = issue.sla_deadline?;
            wanted(state, args).then(|| SlaRow {
                hours_remaining: (deadline - now).num_hours(),
                id: issue.id,
                title: issue.title,
                status: issue.status,
                department: issue.assigned_department,
                deadline,
                state,
            })
        })
        .collect();
    rows.sort_by_key(|row| row.deadline);

    render_mode(
        output,
        &rows,
        |rows, w| {
            for row in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    row.id,
                    row.deadline.to_rfc3339(),
                    sla_label(row.state),
                    row.hours_remaining,
                    row.title
                )?;
            }
            Ok(())
        },
        |rows, w| {
            if rows.is_empty() {
                return writeln!(w, "No issues with SLA deadlines need attention.");
            }
            for row in rows {
                writeln!(
                    w,
                    "{:<13} {:<16} {:<10} {:>5}h  {:<20} {}",
                    row.id,
                    local_time(row.deadline),
                    sla_label(row.state),
                    row.hours_remaining,
                    truncate(row.department.as_deref().unwrap_or("-"), 20),
                    truncate(&row.title, 32)
                )?;
            }
            Ok(())
        },
    )
}
