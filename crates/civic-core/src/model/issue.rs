use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::CivicError;

/// The fixed set of issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Roads & Infrastructure")]
    Roads,
    #[serde(rename = "Garbage & Sanitation")]
    Garbage,
    #[serde(rename = "Water Supply")]
    Water,
    #[serde(rename = "Electricity")]
    Electricity,
    #[serde(rename = "Street Lights")]
    StreetLights,
    #[serde(rename = "Public Safety")]
    PublicSafety,
    #[serde(rename = "Traffic Issues")]
    Traffic,
    #[serde(rename = "Others")]
    Others,
}

impl Category {
    pub const ALL: [Self; 8] = [
        Self::Roads,
        Self::Garbage,
        Self::Water,
        Self::Electricity,
        Self::StreetLights,
        Self::PublicSafety,
        Self::Traffic,
        Self::Others,
    ];

    /// Display label, also the persisted value.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Roads => "Roads & Infrastructure",
            Self::Garbage => "Garbage & Sanitation",
            Self::Water => "Water Supply",
            Self::Electricity => "Electricity",
            Self::StreetLights => "Street Lights",
            Self::PublicSafety => "Public Safety",
            Self::Traffic => "Traffic Issues",
            Self::Others => "Others",
        }
    }

    /// Short slug accepted on the command line.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Roads => "roads",
            Self::Garbage => "garbage",
            Self::Water => "water",
            Self::Electricity => "electricity",
            Self::StreetLights => "street-lights",
            Self::PublicSafety => "public-safety",
            Self::Traffic => "traffic",
            Self::Others => "others",
        }
    }
}

/// The seven lifecycle statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Reported,
    Acknowledged,
    Verified,
    InProgress,
    Resolved,
    Rejected,
    Escalated,
}

impl Status {
    pub const ALL: [Self; 7] = [
        Self::Reported,
        Self::Acknowledged,
        Self::Verified,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
        Self::Escalated,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::Acknowledged => "acknowledged",
            Self::Verified => "verified",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
        }
    }

    /// Title-case label used in history comments and pretty output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reported => "Reported",
            Self::Acknowledged => "Acknowledged",
            Self::Verified => "Verified",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Rejected => "Rejected",
            Self::Escalated => "Escalated",
        }
    }

    /// Resolved and rejected end the normal workflow.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

/// Triage tier assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject non-finite or out-of-range coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::Validation`] naming the offending axis.
    pub fn validate(&self) -> Result<(), CivicError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(CivicError::validation(
                "latitude",
                format!("{} is outside [-90, 90]", self.latitude),
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(CivicError::validation(
                "longitude",
                format!("{} is outside [-180, 180]", self.longitude),
            ));
        }
        Ok(())
    }
}

/// One status transition in an issue's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: Status,
    pub updated_by: String,
    pub timestamp: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Free-form administrative commentary, independent of status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNote {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Referral of an issue to an authority outside departmental handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDetails {
    pub escalated_to: String,
    pub escalated_at: DateTime<Utc>,
    pub reason: String,
    pub reference_id: Option<String>,
}

/// A reported municipal problem and its full lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: GeoPoint,
    pub image_url: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub reported_by: String,
    pub reporter_name: Option<String>,
    pub assigned_department: Option<String>,
    pub assigned_officer_id: Option<String>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub upvotes: u64,
    pub history: Vec<HistoryEntry>,
    pub notes: Vec<AdminNote>,
    pub escalation_details: Option<EscalationDetails>,
    pub version: u64,
}

impl Issue {
    /// Check the structural invariants every stored issue must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::CorruptRecord`] describing the first violation.
    pub fn check_invariants(&self) -> Result<(), CivicError> {
        let corrupt = |reason: &str| CivicError::CorruptRecord {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        match self.history.first() {
            None => return Err(corrupt("history is empty")),
            Some(first) if first.status != Status::Reported => {
                return Err(corrupt("first history entry is not 'reported'"));
            }
            Some(_) => {}
        }
        if self.updated_at < self.created_at {
            return Err(corrupt("updatedAt precedes createdAt"));
        }
        Ok(())
    }

    /// Timestamp of the most recent transition into `status`, if any.
    #[must_use]
    pub fn last_entered(&self, status: Status) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.status == status)
            .map(|entry| entry.timestamp)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for Category {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|category| {
                normalized == category.label().to_ascii_lowercase() || normalized == category.slug()
            })
            .ok_or_else(|| CivicError::InvalidEnumValue {
                expected: "category",
                got: s.to_string(),
            })
    }
}

impl FromStr for Status {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s).replace(['_', ' '], "-");
        match normalized.as_str() {
            "reported" => Ok(Self::Reported),
            "acknowledged" => Ok(Self::Acknowledged),
            "verified" => Ok(Self::Verified),
            "in-progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            "escalated" => Ok(Self::Escalated),
            _ => Err(CivicError::InvalidEnumValue {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(CivicError::InvalidEnumValue {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}
