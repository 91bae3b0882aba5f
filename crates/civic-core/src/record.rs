//! Persisted record shape for issues.
//!
//! Records use the camelCase field names of the document store
//! (`reportedBy`, `slaDeadline`, ...). Timestamps are always written as
//! RFC 3339 strings. On read, a timestamp may also arrive as a server token
//! `{"seconds": .., "nanoseconds": ..}`; both forms are normalized into a
//! single `DateTime<Utc>` here so the engine never sees either.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CivicError;
use crate::model::issue::{
    AdminNote, Category, EscalationDetails, GeoPoint, HistoryEntry, Issue, Priority, Status,
};

/// A timestamp as it may appear in a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordTimestamp {
    /// An ISO 8601 / RFC 3339 string.
    Iso(String),
    /// A server-generated token.
    Server { seconds: i64, nanoseconds: u32 },
}

impl RecordTimestamp {
    /// Normalize into a UTC instant.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::CorruptRecord`] for unparseable values.
    pub fn to_datetime(&self, id: &str, field: &str) -> Result<DateTime<Utc>, CivicError> {
        let parsed = match self {
            Self::Iso(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            Self::Server {
                seconds,
                nanoseconds,
            } => DateTime::from_timestamp(*seconds, *nanoseconds),
        };
        parsed.ok_or_else(|| CivicError::CorruptRecord {
            id: id.to_string(),
            reason: format!("unreadable timestamp in {field}: {self:?}"),
        })
    }
}

impl From<DateTime<Utc>> for RecordTimestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Iso(format_timestamp(at))
    }
}

/// Canonical text form for persisted timestamps (lossless).
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub status: Status,
    pub updated_by: String,
    pub timestamp: RecordTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: RecordTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
    pub escalated_to: String,
    pub escalated_at: RecordTimestamp,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

/// The stored document for one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub reported_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_officer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_deadline: Option<RecordTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    pub created_at: RecordTimestamp,
    pub updated_at: RecordTimestamp,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_details: Option<EscalationRecord>,
    #[serde(default)]
    pub version: u64,
}

impl From<&Issue> for IssueRecord {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            category: issue.category,
            latitude: issue.location.latitude,
            longitude: issue.location.longitude,
            image_url: issue.image_url.clone(),
            status: issue.status,
            priority: issue.priority,
            reported_by: issue.reported_by.clone(),
            reporter_name: issue.reporter_name.clone(),
            assigned_department: issue.assigned_department.clone(),
            assigned_officer_id: issue.assigned_officer_id.clone(),
            sla_deadline: issue.sla_deadline.map(RecordTimestamp::from),
            resolution_notes: issue.resolution_notes.clone(),
            created_at: issue.created_at.into(),
            updated_at: issue.updated_at.into(),
            upvotes: issue.upvotes,
            history: issue
                .history
                .iter()
                .map(|entry| HistoryRecord {
                    status: entry.status,
                    updated_by: entry.updated_by.clone(),
                    timestamp: entry.timestamp.into(),
                    comment: entry.comment.clone(),
                })
                .collect(),
            notes: issue
                .notes
                .iter()
                .map(|note| NoteRecord {
                    id: note.id.clone(),
                    author: note.author.clone(),
                    content: note.content.clone(),
                    timestamp: note.timestamp.into(),
                })
                .collect(),
            escalation_details: issue.escalation_details.as_ref().map(|e| EscalationRecord {
                escalated_to: e.escalated_to.clone(),
                escalated_at: e.escalated_at.into(),
                reason: e.reason.clone(),
                reference_id: e.reference_id.clone(),
            }),
            version: issue.version,
        }
    }
}

impl TryFrom<IssueRecord> for Issue {
    type Error = CivicError;

    fn try_from(record: IssueRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let ts = |value: &RecordTimestamp, field: &str| value.to_datetime(&id, field);

        let history = record
            .history
            .iter()
            .map(|entry| {
                Ok(HistoryEntry {
                    status: entry.status,
                    updated_by: entry.updated_by.clone(),
                    timestamp: ts(&entry.timestamp, "history.timestamp")?,
                    comment: entry.comment.clone(),
                })
            })
            .collect::<Result<Vec<_>, CivicError>>()?;

        let notes = record
            .notes
            .iter()
            .map(|note| {
                Ok(AdminNote {
                    id: note.id.clone(),
                    author: note.author.clone(),
                    content: note.content.clone(),
                    timestamp: ts(&note.timestamp, "notes.timestamp")?,
                })
            })
            .collect::<Result<Vec<_>, CivicError>>()?;

        let escalation_details = match &record.escalation_details {
            Some(e) => Some(EscalationDetails {
                escalated_to: e.escalated_to.clone(),
                escalated_at: ts(&e.escalated_at, "escalationDetails.escalatedAt")?,
                reason: e.reason.clone(),
                reference_id: e.reference_id.clone(),
            }),
            None => None,
        };

        let sla_deadline = match &record.sla_deadline {
            Some(value) => Some(ts(value, "slaDeadline")?),
            None => None,
        };
        let created_at = ts(&record.created_at, "createdAt")?;
        let updated_at = ts(&record.updated_at, "updatedAt")?;

        let issue = Self {
            id,
            title: record.title,
            description: record.description,
            category: record.category,
            location: GeoPoint::new(record.latitude, record.longitude),
            image_url: record.image_url,
            status: record.status,
            priority: record.priority,
            reported_by: record.reported_by,
            reporter_name: record.reporter_name,
            assigned_department: record.assigned_department,
            assigned_officer_id: record.assigned_officer_id,
            sla_deadline,
            resolution_notes: record.resolution_notes,
            created_at,
            updated_at,
            upvotes: record.upvotes,
            history,
            notes,
            escalation_details,
            version: record.version,
        };
        issue.check_invariants()?;
        Ok(issue)
    }
}

/// Serialize an issue to its JSON record.
///
/// # Errors
///
/// Returns [`CivicError::CorruptRecord`] if serialization fails.
pub fn to_json(issue: &Issue) -> Result<String, CivicError> {
    serde_json::to_string(&IssueRecord::from(issue)).map_err(|e| CivicError::CorruptRecord {
        id: issue.id.clone(),
        reason: e.to_string(),
    })
}

/// Parse a JSON record into a validated issue.
///
/// # Errors
///
/// Returns [`CivicError::CorruptRecord`] for malformed JSON or records that
/// violate the history/timestamp invariants.
pub fn from_json(json: &str) -> Result<Issue, CivicError> {
    let record: IssueRecord = serde_json::from_str(json).map_err(|e| CivicError::CorruptRecord {
        id: "<unknown>".to_string(),
        reason: e.to_string(),
    })?;
    Issue::try_from(record)
}
