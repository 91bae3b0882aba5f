//! `civic dup`: look for existing reports near a point before filing.

use crate::cmd::Project;
use crate::output::{OutputMode, render_mode, truncate};
use anyhow::Result;
use civic_core::duplicates::haversine_km;
use civic_core::{Category, GeoPoint, Status};
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DupArgs {
    /// Category slug or label.
    #[arg(short, long)]
    pub category: String,

    /// Latitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
}

#[derive(Debug, Serialize)]
struct DuplicateCandidate {
    id: String,
    title: String,
    status: Status,
    upvotes: u64,
    distance_km: f64,
}

#[derive(Debug, Serialize)]
struct DupOutput {
    category: Category,
    radius_km: f64,
    candidates: Vec<DuplicateCandidate>,
}

/// Execute `civic dup`.
///
/// # Errors
///
/// Fails on bad input or a registry failure.
pub fn run_dup(args: &DupArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let category: Category = args.category.parse()?;
    let point = GeoPoint::new(args.lat, args.lng);
    point.validate()?;

    let project = Project::open(project_root)?;
    let candidates = project
        .engine
        .find_duplicates(point, category)?
        .into_iter()
        .map(|issue| DuplicateCandidate {
            distance_km: haversine_km(point, issue.location),
            id: issue.id,
            title: issue.title,
            status: issue.status,
            upvotes: issue.upvotes,
        })
        .collect();

    let result = DupOutput {
        category,
        radius_km: project.config.duplicates.radius_km,
        candidates,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            for c in &r.candidates {
                writeln!(w, "{}\t{:.3}\t{}\t{}\t{}", c.id, c.distance_km, c.status, c.upvotes, c.title)?;
            }
            Ok(())
        },
        |r, w| {
            if r.candidates.is_empty() {
                return writeln!(
                    w,
                    "No {} issues within {} km.",
                    r.category.label(),
                    r.radius_km
                );
            }
            writeln!(
                w,
                "{} {} issue(s) within {} km:",
                r.candidates.len(),
                r.category.label(),
                r.radius_km
            )?;
            for c in &r.candidates {
                writeln!(
                    w,
                    "  {:<13} {:>6.0} m  {:<12} ▲{:<4} {}",
                    c.id,
                    c.distance_km * 1000.0,
                    c.status.label(),
                    c.upvotes,
                    truncate(&c.title, 40)
                )?;
            }
            Ok(())
        },
    )
}
