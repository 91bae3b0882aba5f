//! `civic list`: filtered, sorted issue listing.

use crate::cmd::show::{ROW_HEADERS, write_issue_line, write_issue_row};
use crate::cmd::{Project, parse_opt};
use crate::output::{OutputMode, render_mode};
use anyhow::Result;
use civic_core::filter::{IssueFilter, SortOrder};
use civic_core::registry::IssueRegistry;
use civic_core::sla::sla_state;
use clap::Args;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive text matched against title, description and id.
    #[arg(long)]
    pub search: Option<String>,

    /// Filter by status: reported, acknowledged, verified, in-progress,
    /// resolved, rejected, escalated.
    #[arg(short, long)]
    pub status: Option<String>,

    /// Filter by category slug or label, e.g. `roads` or "Street Lights".
    #[arg(short, long)]
    pub category: Option<String>,

    /// Filter by priority: high, medium, low.
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Only issues reported by this actor id.
    #[arg(long, conflicts_with = "mine")]
    pub reporter: Option<String>,

    /// Only issues reported by the current actor.
    #[arg(long)]
    pub mine: bool,

    /// Sort order: newest, oldest, upvotes, priority.
    #[arg(long, default_value = "newest")]
    pub sort: String,

    /// Maximum issues to show.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

impl ListArgs {
    fn to_filter(&self, current_actor: Option<String>) -> Result<IssueFilter> {
        let reporter = if self.mine {
            Some(current_actor.ok_or_else(|| {
                civic_core::CivicError::validation("actor", "--mine needs an actor identity")
            })?)
        } else {
            self.reporter.clone()
        };
        Ok(IssueFilter {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            status: parse_opt(self.status.as_deref())?,
            category: parse_opt(self.category.as_deref())?,
            priority: parse_opt(self.priority.as_deref())?,
            reporter,
            sort: self.sort.parse::<SortOrder>()?,
        })
    }
}

/// Execute `civic list`.
///
/// # Errors
///
/// Fails on an unparseable filter value or a registry failure.
pub fn run_list(
    args: &ListArgs,
    current_actor: Option<String>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let filter = args.to_filter(current_actor)?;
    let project = Project::open(project_root)?;
    let mut issues = filter.apply(project.engine.registry().list()?);
    issues.truncate(args.limit);

    let now = project.engine.now();
    let window = project.config.nearing_window();
    render_mode(
        output,
        &issues,
        |issues, w| {
            if !issues.is_empty() {
                writeln!(w, "{ROW_HEADERS}")?;
            }
            for issue in issues {
                write_issue_row(w, issue)?;
            }
            Ok(())
        },
        |issues, w| {
            if issues.is_empty() {
                return writeln!(w, "No issues found.");
            }
            for issue in issues {
                write_issue_line(w, issue, sla_state(issue, now, window))?;
            }
            writeln!(w)?;
            writeln!(w, "{} issue(s)", issues.len())
        },
    )
}
