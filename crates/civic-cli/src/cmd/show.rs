//! `civic show`: full details of one issue, plus the shared issue views
//! other commands render with.

use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode, truncate};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use civic_core::error::CivicError;
use civic_core::registry::IssueRegistry;
use civic_core::sla::{SlaState, sla_state};
use civic_core::Issue;
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Issue id, e.g. `iss-k3v9x2mq`.
    pub id: String,
}

/// An issue with its SLA state at render time.
#[derive(Debug, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub sla_state: SlaState,
}

impl IssueView {
    pub fn new(issue: Issue, project: &Project) -> Self {
        let sla_state = sla_state(&issue, project.engine.now(), project.config.nearing_window());
        Self { issue, sla_state }
    }
}

pub fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Column headers matching [`write_issue_row`].
pub const ROW_HEADERS: &str = "id\tstatus\tpriority\tcategory\tupvotes\ttitle";

/// One tab-separated row for text mode.
pub fn write_issue_row(w: &mut dyn Write, issue: &Issue) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}",
        issue.id,
        issue.status,
        issue.priority,
        issue.category.slug(),
        issue.upvotes,
        issue.title
    )
}

/// One aligned line for pretty listings.
pub fn write_issue_line(w: &mut dyn Write, issue: &Issue, sla: SlaState) -> io::Result<()> {
    let flag = match sla {
        SlaState::Overdue => " [OVERDUE]",
        SlaState::Nearing => " [due soon]",
        _ => "",
    };
    writeln!(
        w,
        "{:<13} {:<12} {:<6} {:<22} ▲{:<4} {}{flag}",
        issue.id,
        issue.status.label(),
        issue.priority,
        issue.category.label(),
        issue.upvotes,
        truncate(&issue.title, 40)
    )
}

/// Full multi-section rendering of one issue.
pub fn write_issue_detail(w: &mut dyn Write, view: &IssueView) -> io::Result<()> {
    let issue = &view.issue;
    pretty_section(w, &format!("{}  {}", issue.id, issue.title))?;
    pretty_kv(w, "Status", issue.status.label())?;
    pretty_kv(w, "Priority", issue.priority.to_string())?;
    pretty_kv(w, "Category", issue.category.label())?;
    pretty_kv(
        w,
        "Location",
        format!("{:.5}, {:.5}", issue.location.latitude, issue.location.longitude),
    )?;
    let reporter = issue
        .reporter_name
        .as_deref()
        .map_or_else(|| issue.reported_by.clone(), |name| format!("{name} ({})", issue.reported_by));
    pretty_kv(w, "Reported by", reporter)?;
    pretty_kv(w, "Reported", local_time(issue.created_at))?;
    pretty_kv(w, "Updated", local_time(issue.updated_at))?;
    pretty_kv(w, "Upvotes", issue.upvotes.to_string())?;
    if let Some(ref url) = issue.image_url {
        pretty_kv(w, "Image", url)?;
    }
    if let Some(ref dept) = issue.assigned_department {
        pretty_kv(w, "Department", dept)?;
    }
    if let Some(ref officer) = issue.assigned_officer_id {
        pretty_kv(w, "Officer", officer)?;
    }
    if let Some(deadline) = issue.sla_deadline {
        pretty_kv(
            w,
            "SLA deadline",
            format!("{} ({})", local_time(deadline), sla_label(view.sla_state)),
        )?;
    }
    if let Some(ref notes) = issue.resolution_notes {
        pretty_kv(w, "Resolution", notes)?;
    }
    writeln!(w)?;
    writeln!(w, "{}", issue.description)?;

    if let Some(ref esc) = issue.escalation_details {
        writeln!(w)?;
        pretty_section(w, "Escalation")?;
        pretty_kv(w, "To", &esc.escalated_to)?;
        pretty_kv(w, "At", local_time(esc.escalated_at))?;
        pretty_kv(w, "Reason", &esc.reason)?;
        if let Some(ref reference) = esc.reference_id {
            pretty_kv(w, "Reference", reference)?;
        }
    }

    writeln!(w)?;
    pretty_section(w, "History")?;
    for entry in &issue.history {
        writeln!(
            w,
            "{}  {:<12} by {}{}",
            local_time(entry.timestamp),
            entry.status.label(),
            entry.updated_by,
            entry
                .comment
                .as_deref()
                .map(|c| format!(" · {c}"))
                .unwrap_or_default()
        )?;
    }

    if !issue.notes.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Notes")?;
        for note in &issue.notes {
            writeln!(w, "{}  {}: {}", local_time(note.timestamp), note.author, note.content)?;
        }
    }
    Ok(())
}

/// Key/value text rendering of one issue.
pub fn write_issue_text(w: &mut dyn Write, view: &IssueView) -> io::Result<()> {
    let issue = &view.issue;
    writeln!(w, "id\t{}", issue.id)?;
    writeln!(w, "title\t{}", issue.title)?;
    writeln!(w, "status\t{}", issue.status)?;
    writeln!(w, "priority\t{}", issue.priority)?;
    writeln!(w, "category\t{}", issue.category.slug())?;
    writeln!(w, "location\t{},{}", issue.location.latitude, issue.location.longitude)?;
    writeln!(w, "reported_by\t{}", issue.reported_by)?;
    writeln!(w, "upvotes\t{}", issue.upvotes)?;
    writeln!(w, "version\t{}", issue.version)?;
    writeln!(w, "sla\t{}", sla_label(view.sla_state))?;
    for entry in &issue.history {
        writeln!(
            w,
            "history\t{}\t{}\t{}",
            entry.timestamp.to_rfc3339(),
            entry.status,
            entry.updated_by
        )?;
    }
    for note in &issue.notes {
        writeln!(w, "note\t{}\t{}\t{}", note.id, note.author, note.content)?;
    }
    Ok(())
}

pub const fn sla_label(state: SlaState) -> &'static str {
    match state {
        SlaState::NoDeadline => "no deadline",
        SlaState::OnTrack => "on track",
        SlaState::Nearing => "due soon",
        SlaState::Overdue => "overdue",
        SlaState::Met => "met",
    }
}

/// Render one issue in the requested mode.
///
/// # Errors
///
/// Fails if writing to stdout fails.
pub fn render_issue(output: OutputMode, view: &IssueView) -> Result<()> {
    render_mode(output, view, |v, w| write_issue_text(w, v), |v, w| write_issue_detail(w, v))
}

/// Execute `civic show <id>`.
///
/// # Errors
///
/// [`CivicError::NotFound`] for an unknown id, or a registry failure.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let issue = project
        .engine
        .registry()
        .get(&args.id)?
        .ok_or_else(|| CivicError::NotFound(args.id.clone()))?;
    render_issue(output, &IssueView::new(issue, &project))
}
