//! `civic report`: file a new issue, warning about likely duplicates.

use crate::cmd::Project;
use crate::cmd::show::{IssueView, write_issue_detail, write_issue_row};
use crate::output::{OutputMode, render_mode};
use anyhow::{Context as _, Result};
use civic_core::lifecycle::{Attachment, NewIssue};
use civic_core::session::Session;
use civic_core::{Category, GeoPoint};
use clap::Args;
use serde::Serialize;
use std::io::Write as _;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Short summary of the problem.
    #[arg(short, long)]
    pub title: String,

    /// What is wrong and where. Keywords here drive the priority.
    #[arg(short, long)]
    pub description: String,

    /// Category slug or label, e.g. `water` or "Water Supply".
    #[arg(short, long)]
    pub category: String,

    /// Latitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Photo to attach.
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ReportOutput {
    issue: IssueView,
    /// Ids of existing issues of the same category nearby.
    possible_duplicates: Vec<String>,
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    Ok(Attachment { bytes, name })
}

/// Execute `civic report`.
///
/// Duplicates never block the report; they are listed so the reporter can
/// upvote an existing issue instead.
///
/// # Errors
///
/// Validation, upload or registry failures from the engine.
pub fn run_report(
    args: &ReportArgs,
    session: &Session,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let category: Category = args.category.parse()?;
    let location = GeoPoint::new(args.lat, args.lng);
    location.validate()?;
    let attachment = args.image.as_deref().map(read_attachment).transpose()?;

    let project = Project::open(project_root)?;
    let possible_duplicates: Vec<String> = project
        .engine
        .find_duplicates(location, category)?
        .into_iter()
        .map(|issue| issue.id)
        .collect();
    if !possible_duplicates.is_empty() {
        tracing::warn!(
            count = possible_duplicates.len(),
            "similar issues already reported nearby"
        );
    }

    let issue = project.engine.create(
        session,
        NewIssue {
            title: args.title.clone(),
            description: args.description.clone(),
            category: Some(category),
            location,
            attachment,
        },
    )?;

    let result = ReportOutput {
        issue: IssueView::new(issue, &project),
        possible_duplicates,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            write_issue_row(w, &r.issue.issue)?;
            for id in &r.possible_duplicates {
                writeln!(w, "possible_duplicate\t{id}")?;
            }
            Ok(())
        },
        |r, w| {
            writeln!(w, "✓ Reported {} ({} priority)", r.issue.issue.id, r.issue.issue.priority)?;
            if !r.possible_duplicates.is_empty() {
                writeln!(w)?;
                writeln!(
                    w,
                    "! {} similar issue(s) already reported nearby; consider upvoting instead:",
                    r.possible_duplicates.len()
                )?;
                for id in &r.possible_duplicates {
                    writeln!(w, "    civic upvote {id}")?;
                }
            }
            writeln!(w)?;
            write_issue_detail(w, &r.issue)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ReportArgs,
    }

    #[test]
    fn negative_coordinates_parse() {
        let w = Wrapper::parse_from([
            "test", "-t", "Flooded road", "-d", "Knee deep water", "-c", "roads", "--lat",
            "-33.8688", "--lng", "-151.2093",
        ]);
        assert!((w.args.lat + 33.8688).abs() < 1e-9);
        assert!((w.args.lng + 151.2093).abs() < 1e-9);
        assert!(w.args.image.is_none());
    }

    #[test]
    fn attachment_takes_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pothole.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let attachment = read_attachment(&path).unwrap();
        assert_eq!(attachment.name, "pothole.jpg");
        assert_eq!(attachment.bytes, b"jpeg");
        assert!(read_attachment(&dir.path().join("missing.jpg")).is_err());
    }
}
