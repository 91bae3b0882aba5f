//! SLA deadlines: parsing assignment specs and checking deadline state.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::{fmt, str::FromStr};

use crate::error::CivicError;
use crate::model::issue::{Issue, Status};

/// Hours in the dashboard's default "nearing deadline" window.
pub const DEFAULT_NEARING_WINDOW_HOURS: u32 = 24;

/// The default "nearing deadline" window as a duration.
#[must_use]
pub fn default_nearing_window() -> Duration {
    Duration::hours(i64::from(DEFAULT_NEARING_WINDOW_HOURS))
}

/// How an SLA deadline is expressed when assigning an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaSpec {
    /// N days from the moment of assignment ("3 Days").
    Relative { days: u32 },
    /// A fixed point in time (`YYYY-MM-DD` means midnight UTC).
    Absolute(DateTime<Utc>),
}

impl FromStr for SlaSpec {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason: &str| CivicError::validation("sla", format!("'{s}': {reason}"));

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let first = tokens.first().copied().unwrap_or_default();
        if !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b'+') {
            if let Ok(days) = first.parse::<i64>() {
                if tokens.len() > 2 {
                    return Err(invalid("expected 'N Days'"));
                }
                if let Some(unit) = tokens.get(1) {
                    if !matches!(unit.to_ascii_lowercase().as_str(), "day" | "days") {
                        return Err(invalid("relative specs are counted in days"));
                    }
                }
                let days = u32::try_from(days).map_err(|_| invalid("day count must be non-negative"))?;
                return Ok(Self::Relative { days });
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| invalid("bad date"))?;
            return Ok(Self::Absolute(midnight.and_utc()));
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::Absolute(at.with_timezone(&Utc)));
        }

        Err(invalid("expected 'N Days', YYYY-MM-DD or an RFC 3339 timestamp"))
    }
}

impl fmt::Display for SlaSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative { days: 1 } => f.write_str("1 Day"),
            Self::Relative { days } => write!(f, "{days} Days"),
            Self::Absolute(at) => write!(f, "{}", at.format("%Y-%m-%d")),
        }
    }
}

/// Resolve a spec into a concrete deadline.
///
/// Relative specs add whole days to `base`; absolute specs ignore it.
///
/// # Errors
///
/// [`CivicError::Validation`] when the deadline falls outside the
/// representable date range.
pub fn compute_sla_deadline(
    base: DateTime<Utc>,
    spec: SlaSpec,
) -> Result<DateTime<Utc>, CivicError> {
    match spec {
        SlaSpec::Relative { days } => base
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| CivicError::validation("sla", format!("'{spec}' is too far in the future"))),
        SlaSpec::Absolute(at) => Ok(at),
    }
}

/// The deadline has passed and the issue is not resolved.
#[must_use]
pub fn is_overdue(issue: &Issue, now: DateTime<Utc>) -> bool {
    match issue.sla_deadline {
        Some(deadline) => issue.status != Status::Resolved && deadline < now,
        None => false,
    }
}

/// The deadline is still ahead but falls within `window`.
#[must_use]
pub fn is_nearing_deadline(issue: &Issue, now: DateTime<Utc>, window: Duration) -> bool {
    if is_overdue(issue, now) || issue.status == Status::Resolved {
        return false;
    }
    issue.sla_deadline.is_some_and(|deadline| {
        let remaining = deadline - now;
        remaining > Duration::zero() && remaining < window
    })
}

/// Deadline state of one issue at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlaState {
    NoDeadline,
    OnTrack,
    Nearing,
    Overdue,
    Met,
}

/// Classify an issue's deadline state for reporting.
#[must_use]
pub fn sla_state(issue: &Issue, now: DateTime<Utc>, window: Duration) -> SlaState {
    if issue.sla_deadline.is_none() {
        SlaState::NoDeadline
    } else if issue.status == Status::Resolved {
        SlaState::Met
    } else if is_overdue(issue, now) {
        SlaState::Overdue
    } else if is_nearing_deadline(issue, now, window) {
        SlaState::Nearing
    } else {
        SlaState::OnTrack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::{Category, GeoPoint, HistoryEntry, Priority};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, 10, 0, 0).unwrap()
    }

    fn issue(status: Status, deadline: Option<DateTime<Utc>>) -> Issue {
        let created = now() - Duration::days(3);
        Issue {
            id: "iss-sla".into(),
            title: "No water".into(),
            description: "Block C dry".into(),
            category: Category::Water,
            location: GeoPoint::new(12.965, 77.61),
            image_url: None,
            status,
            priority: Priority::High,
            reported_by: "u3".into(),
            reporter_name: None,
            assigned_department: Some("Water Board".into()),
            assigned_officer_id: Some("o3".into()),
            sla_deadline: deadline,
            resolution_notes: None,
            created_at: created,
            updated_at: created,
            upvotes: 0,
            history: vec![HistoryEntry {
                status: Status::Reported,
                updated_by: "u3".into(),
                timestamp: created,
                comment: None,
            }],
            notes: vec![],
            escalation_details: None,
            version: 0,
        }
    }

    #[test]
    fn parses_relative_specs() {
        assert_eq!("3 Days".parse::<SlaSpec>().unwrap(), SlaSpec::Relative { days: 3 });
        assert_eq!("1 day".parse::<SlaSpec>().unwrap(), SlaSpec::Relative { days: 1 });
        assert_eq!(" 6 ".parse::<SlaSpec>().unwrap(), SlaSpec::Relative { days: 6 });
    }

    #[test]
    fn parses_absolute_specs() {
        let spec: SlaSpec = "2026-03-01".parse().unwrap();
        assert_eq!(
            spec,
            SlaSpec::Absolute(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
        let spec: SlaSpec = "2026-03-01T12:30:00+05:30".parse().unwrap();
        assert_eq!(
            spec,
            SlaSpec::Absolute(Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_bad_specs() {
        assert!("soon".parse::<SlaSpec>().is_err());
        assert!("-2 Days".parse::<SlaSpec>().is_err());
        assert!("3 weeks".parse::<SlaSpec>().is_err());
        assert!("".parse::<SlaSpec>().is_err());
        assert!("3 Days please".parse::<SlaSpec>().is_err());
        assert!("3 Days 4".parse::<SlaSpec>().is_err());
    }

    #[test]
    fn spec_display_matches_dashboard_wording() {
        assert_eq!(SlaSpec::Relative { days: 3 }.to_string(), "3 Days");
        assert_eq!(SlaSpec::Relative { days: 1 }.to_string(), "1 Day");
    }

    #[test]
    fn relative_deadline_adds_days() {
        let deadline = compute_sla_deadline(now(), SlaSpec::Relative { days: 3 }).unwrap();
        assert_eq!(deadline, now() + Duration::days(3));
    }

    #[test]
    fn huge_relative_spec_is_a_validation_error() {
        let spec: SlaSpec = "4000000000 Days".parse().unwrap();
        let err = compute_sla_deadline(now(), spec).unwrap_err();
        assert!(matches!(err, CivicError::Validation { .. }), "got {err:?}");
    }

    #[test]
    fn absolute_deadline_ignores_base() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(compute_sla_deadline(now(), SlaSpec::Absolute(at)).unwrap(), at);
    }

    #[test]
    fn overdue_in_progress_issue() {
        let past = now() - Duration::hours(24);
        assert!(is_overdue(&issue(Status::InProgress, Some(past)), now()));
    }

    #[test]
    fn resolved_is_never_overdue() {
        let past = now() - Duration::hours(48);
        assert!(!is_overdue(&issue(Status::Resolved, Some(past)), now()));
        assert!(!is_overdue(&issue(Status::InProgress, None), now()));
    }

    #[test]
    fn nearing_deadline_window() {
        let window = default_nearing_window();
        let soon = issue(Status::Verified, Some(now() + Duration::hours(23)));
        let later = issue(Status::Verified, Some(now() + Duration::hours(25)));
        let past = issue(Status::Verified, Some(now() - Duration::hours(1)));
        let exact = issue(Status::Verified, Some(now()));
        assert!(is_nearing_deadline(&soon, now(), window));
        assert!(!is_nearing_deadline(&later, now(), window));
        assert!(!is_nearing_deadline(&past, now(), window));
        assert!(!is_nearing_deadline(&exact, now(), window));
    }

    #[test]
    fn resolved_is_never_nearing() {
        let soon = issue(Status::Resolved, Some(now() + Duration::hours(2)));
        assert!(!is_nearing_deadline(&soon, now(), default_nearing_window()));
    }

    #[test]
    fn sla_state_classification() {
        let w = default_nearing_window();
        assert_eq!(sla_state(&issue(Status::Reported, None), now(), w), SlaState::NoDeadline);
        assert_eq!(
            sla_state(&issue(Status::InProgress, Some(now() - Duration::hours(1))), now(), w),
            SlaState::Overdue
        );
        assert_eq!(
            sla_state(&issue(Status::InProgress, Some(now() + Duration::hours(4))), now(), w),
            SlaState::Nearing
        );
        assert_eq!(
            sla_state(&issue(Status::InProgress, Some(now() + Duration::days(4))), now(), w),
            SlaState::OnTrack
        );
        assert_eq!(
            sla_state(&issue(Status::Resolved, Some(now() - Duration::days(4))), now(), w),
            SlaState::Met
        );
    }
}
