//! `civic stats`: dashboard aggregates.

use crate::cmd::Project;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use civic_core::registry::IssueRegistry;
use civic_core::stats::DashboardStats;
use clap::Args;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatsArgs {}

fn write_text(stats: &DashboardStats, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "total\t{}", stats.total)?;
    for (status, count) in &stats.by_status {
        writeln!(w, "status.{status}\t{count}")?;
    }
    for (priority, count) in &stats.by_priority {
        writeln!(w, "priority.{priority}\t{count}")?;
    }
    writeln!(w, "overdue\t{}", stats.overdue)?;
    writeln!(w, "nearing_deadline\t{}", stats.nearing_deadline)?;
    writeln!(w, "escalated\t{}", stats.escalated)?;
    writeln!(w, "upvotes\t{}", stats.upvotes)?;
    if let Some(hours) = stats.avg_resolution_hours {
        writeln!(w, "avg_resolution_hours\t{hours:.1}")?;
    }
    for progress in &stats.by_category {
        writeln!(
            w,
            "category.{}\t{}\t{}",
            progress.category.slug(),
            progress.resolved,
            progress.total
        )?;
    }
    Ok(())
}

fn write_pretty(stats: &DashboardStats, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Issues")?;
    pretty_kv(w, "Total", stats.total.to_string())?;
    pretty_kv(w, "Overdue", stats.overdue.to_string())?;
    pretty_kv(w, "Due soon", stats.nearing_deadline.to_string())?;
    pretty_kv(w, "Escalated", stats.escalated.to_string())?;
    pretty_kv(w, "Upvotes", stats.upvotes.to_string())?;
    pretty_kv(
        w,
        "Avg resolve",
        stats
            .avg_resolution_hours
            .map_or_else(|| "-".to_string(), |h| format!("{h:.1} h")),
    )?;

    writeln!(w)?;
    pretty_section(w, "By status")?;
    for (status, count) in &stats.by_status {
        pretty_kv(w, status.label(), count.to_string())?;
    }

    writeln!(w)?;
    pretty_section(w, "By category (resolved / total)")?;
    for progress in stats.by_category.iter().filter(|p| p.total > 0) {
        writeln!(
            w,
            "{:<24} {:>4} / {:<4}",
            progress.category.label(),
            progress.resolved,
            progress.total
        )?;
    }
    Ok(())
}

/// Execute `civic stats`.
///
/// # Errors
///
/// Fails on a registry failure.
pub fn run_stats(_args: &StatsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root)?;
    let issues = project.engine.registry().list()?;
    let stats = DashboardStats::compute(&issues, project.engine.now(), project.config.nearing_window());
    render_mode(output, &stats, |s, w| write_text(s, w), |s, w| write_pretty(s, w))
}
