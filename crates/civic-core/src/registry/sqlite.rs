//! Durable registry stored in SQLite.
//!
//! Scalar fields live in `issues`; history and notes are only ever inserted
//! into their child tables, so the stored audit trail is append-only. Every
//! create and every patch runs in one transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use crate::db;
use crate::error::CivicError;
use crate::model::issue::{AdminNote, HistoryEntry, Issue};
use crate::record::{
    EscalationRecord, HistoryRecord, IssueRecord, NoteRecord, RecordTimestamp, format_timestamp,
};

use super::{IssuePatch, IssueRegistry, Stamped, SubscriptionHub};

const ISSUE_COLUMNS: &str = "issue_id, title, description, category, latitude, longitude, \
     image_url, status, priority, reported_by, reporter_name, assigned_department, \
     assigned_officer_id, sla_deadline, resolution_notes, escalated_to, escalated_at, \
     escalation_reason, escalation_reference_id, created_at, updated_at, upvotes, version";

/// Registry persisted to a SQLite database file.
#[derive(Debug)]
pub struct SqliteRegistry {
    conn: Mutex<Connection>,
    hub: SubscriptionHub,
}

impl SqliteRegistry {
    /// Open (or create) the registry at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(db::open_registry_db(path)?))
    }

    /// A registry backed by a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            hub: SubscriptionHub::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, stamped: Option<Stamped>) {
        if let Some(stamped) = stamped {
            self.hub.publish(&stamped);
        }
    }
}

impl IssueRegistry for SqliteRegistry {
    fn create(&self, issue: &Issue) -> Result<String, CivicError> {
        issue.check_invariants()?;
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if exists(&tx, &issue.id)? {
            return Err(CivicError::validation(
                "id",
                format!("issue '{}' already exists", issue.id),
            ));
        }
        insert_issue(&tx, issue)?;
        for entry in &issue.history {
            insert_history(&tx, &issue.id, entry)?;
        }
        for note in &issue.notes {
            insert_note(&tx, &issue.id, note)?;
        }
        tx.commit()?;
        let stamped = self.hub.capture(|| list_issues(&conn));
        drop(conn);

        self.publish(stamped);
        Ok(issue.id.clone())
    }

    fn update(&self, id: &str, patch: &IssuePatch) -> Result<Issue, CivicError> {
        patch.validate(id)?;
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut issue = load_issue(&tx, id)?.ok_or_else(|| CivicError::NotFound(id.to_string()))?;
        patch.check_preconditions(&issue)?;
        patch.apply(&mut issue);

        update_scalars(&tx, &issue)?;
        for entry in &patch.append_history {
            insert_history(&tx, id, entry)?;
        }
        for note in &patch.append_notes {
            insert_note(&tx, id, note)?;
        }
        tx.commit()?;
        let stamped = self.hub.capture(|| list_issues(&conn));
        drop(conn);

        self.publish(stamped);
        Ok(issue)
    }

    fn get(&self, id: &str) -> Result<Option<Issue>, CivicError> {
        load_issue(&self.lock(), id)
    }

    fn list(&self) -> Result<Vec<Issue>, CivicError> {
        list_issues(&self.lock())
    }

    fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    fn snapshot(&self) -> Stamped {
        let conn = self.lock();
        let stamped = self.hub.stamp(list_issues(&conn));
        drop(conn);
        stamped
    }
}

fn list_issues(conn: &Connection) -> Result<Vec<Issue>, CivicError> {
    let ids = {
        let mut stmt = conn.prepare("SELECT issue_id FROM issues ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let mut issues = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(issue) = load_issue(conn, &id)? {
            issues.push(issue);
        }
    }
    Ok(issues)
}

fn to_i64(value: u64, id: &str, field: &str) -> Result<i64, CivicError> {
    i64::try_from(value).map_err(|_| CivicError::CorruptRecord {
        id: id.to_string(),
        reason: format!("{field} {value} does not fit in the database"),
    })
}

fn exists(tx: &Transaction<'_>, id: &str) -> Result<bool, CivicError> {
    Ok(tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM issues WHERE issue_id = ?1)",
        [id],
        |row| row.get(0),
    )?)
}

fn insert_issue(tx: &Transaction<'_>, issue: &Issue) -> Result<(), CivicError> {
    let escalation = issue.escalation_details.as_ref();
    tx.execute(
        &format!(
            "INSERT INTO issues ({ISSUE_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, \
              ?18, ?19, ?20, ?21, ?22, ?23)"
        ),
        params![
            issue.id,
            issue.title,
            issue.description,
            issue.category.label(),
            issue.location.latitude,
            issue.location.longitude,
            issue.image_url,
            issue.status.to_string(),
            issue.priority.to_string(),
            issue.reported_by,
            issue.reporter_name,
            issue.assigned_department,
            issue.assigned_officer_id,
            issue.sla_deadline.map(format_timestamp),
            issue.resolution_notes,
            escalation.map(|e| e.escalated_to.as_str()),
            escalation.map(|e| format_timestamp(e.escalated_at)),
            escalation.map(|e| e.reason.as_str()),
            escalation.and_then(|e| e.reference_id.as_deref()),
            format_timestamp(issue.created_at),
            format_timestamp(issue.updated_at),
            to_i64(issue.upvotes, &issue.id, "upvotes")?,
            to_i64(issue.version, &issue.id, "version")?,
        ],
    )?;
    Ok(())
}

fn update_scalars(tx: &Transaction<'_>, issue: &Issue) -> Result<(), CivicError> {
    let escalation = issue.escalation_details.as_ref();
    tx.execute(
        "UPDATE issues SET
            status = ?2,
            assigned_department = ?3,
            assigned_officer_id = ?4,
            sla_deadline = ?5,
            resolution_notes = ?6,
            escalated_to = ?7,
            escalated_at = ?8,
            escalation_reason = ?9,
            escalation_reference_id = ?10,
            updated_at = ?11,
            upvotes = ?12,
            version = ?13
         WHERE issue_id = ?1",
        params![
            issue.id,
            issue.status.to_string(),
            issue.assigned_department,
            issue.assigned_officer_id,
            issue.sla_deadline.map(format_timestamp),
            issue.resolution_notes,
            escalation.map(|e| e.escalated_to.as_str()),
            escalation.map(|e| format_timestamp(e.escalated_at)),
            escalation.map(|e| e.reason.as_str()),
            escalation.and_then(|e| e.reference_id.as_deref()),
            format_timestamp(issue.updated_at),
            to_i64(issue.upvotes, &issue.id, "upvotes")?,
            to_i64(issue.version, &issue.id, "version")?,
        ],
    )?;
    Ok(())
}

fn insert_history(tx: &Transaction<'_>, id: &str, entry: &HistoryEntry) -> Result<(), CivicError> {
    tx.execute(
        "INSERT INTO issue_history (issue_id, status, updated_by, timestamp, comment)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            entry.status.to_string(),
            entry.updated_by,
            format_timestamp(entry.timestamp),
            entry.comment,
        ],
    )?;
    Ok(())
}

fn insert_note(tx: &Transaction<'_>, id: &str, note: &AdminNote) -> Result<(), CivicError> {
    tx.execute(
        "INSERT INTO issue_notes (note_id, issue_id, author, content, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            note.id,
            id,
            note.author,
            note.content,
            format_timestamp(note.timestamp),
        ],
    )?;
    Ok(())
}

/// Raw `issues` row before enum parsing and invariant checks.
struct IssueRow {
    id: String,
    title: String,
    description: String,
    category: String,
    latitude: f64,
    longitude: f64,
    image_url: Option<String>,
    status: String,
    priority: String,
    reported_by: String,
    reporter_name: Option<String>,
    assigned_department: Option<String>,
    assigned_officer_id: Option<String>,
    sla_deadline: Option<String>,
    resolution_notes: Option<String>,
    escalated_to: Option<String>,
    escalated_at: Option<String>,
    escalation_reason: Option<String>,
    escalation_reference_id: Option<String>,
    created_at: String,
    updated_at: String,
    upvotes: i64,
    version: i64,
}

impl IssueRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            image_url: row.get(6)?,
            status: row.get(7)?,
            priority: row.get(8)?,
            reported_by: row.get(9)?,
            reporter_name: row.get(10)?,
            assigned_department: row.get(11)?,
            assigned_officer_id: row.get(12)?,
            sla_deadline: row.get(13)?,
            resolution_notes: row.get(14)?,
            escalated_to: row.get(15)?,
            escalated_at: row.get(16)?,
            escalation_reason: row.get(17)?,
            escalation_reference_id: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
            upvotes: row.get(21)?,
            version: row.get(22)?,
        })
    }

    fn into_record(
        self,
        history: Vec<HistoryRecord>,
        notes: Vec<NoteRecord>,
    ) -> Result<IssueRecord, CivicError> {
        let id = self.id;
        let corrupt = |reason: String| CivicError::CorruptRecord {
            id: id.clone(),
            reason,
        };
        let count = |value: i64, field: &str| {
            u64::try_from(value).map_err(|_| corrupt(format!("negative {field}: {value}")))
        };

        let escalation_details = match (self.escalated_to, self.escalated_at) {
            (Some(escalated_to), Some(escalated_at)) => Some(EscalationRecord {
                escalated_to,
                escalated_at: RecordTimestamp::Iso(escalated_at),
                reason: self.escalation_reason.unwrap_or_default(),
                reference_id: self.escalation_reference_id,
            }),
            (None, None) => None,
            _ => return Err(corrupt("incomplete escalation details".to_string())),
        };

        Ok(IssueRecord {
            category: self
                .category
                .parse()
                .map_err(|e: CivicError| corrupt(e.to_string()))?,
            status: self
                .status
                .parse()
                .map_err(|e: CivicError| corrupt(e.to_string()))?,
            priority: self
                .priority
                .parse()
                .map_err(|e: CivicError| corrupt(e.to_string()))?,
            upvotes: count(self.upvotes, "upvotes")?,
            version: count(self.version, "version")?,
            title: self.title,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            image_url: self.image_url,
            reported_by: self.reported_by,
            reporter_name: self.reporter_name,
            assigned_department: self.assigned_department,
            assigned_officer_id: self.assigned_officer_id,
            sla_deadline: self.sla_deadline.map(RecordTimestamp::Iso),
            resolution_notes: self.resolution_notes,
            created_at: RecordTimestamp::Iso(self.created_at),
            updated_at: RecordTimestamp::Iso(self.updated_at),
            history,
            notes,
            escalation_details,
            id,
        })
    }
}

fn load_issue(conn: &Connection, id: &str) -> Result<Option<Issue>, CivicError> {
    let row = conn
        .query_row(
            &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1"),
            [id],
            IssueRow::from_row,
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT status, updated_by, timestamp, comment
         FROM issue_history WHERE issue_id = ?1 ORDER BY history_seq",
    )?;
    let raw_history = stmt
        .query_map([id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let history = raw_history
        .into_iter()
        .map(|(status, updated_by, timestamp, comment)| {
            Ok(HistoryRecord {
                status: status.parse().map_err(|e: CivicError| CivicError::CorruptRecord {
                    id: id.to_string(),
                    reason: e.to_string(),
                })?,
                updated_by,
                timestamp: RecordTimestamp::Iso(timestamp),
                comment,
            })
        })
        .collect::<Result<Vec<_>, CivicError>>()?;

    let mut stmt = conn.prepare(
        "SELECT note_id, author, content, timestamp
         FROM issue_notes WHERE issue_id = ?1 ORDER BY note_seq",
    )?;
    let notes = stmt
        .query_map([id], |r| {
            Ok(NoteRecord {
                id: r.get(0)?,
                author: r.get(1)?,
                content: r.get(2)?,
                timestamp: RecordTimestamp::Iso(r.get(3)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let record = row.into_record(history, notes)?;
    Issue::try_from(record).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::{Category, EscalationDetails, GeoPoint, Priority, Status};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 21, 9, 15, 0).unwrap() + Duration::hours(h)
    }

    fn issue(id: &str) -> Issue {
        Issue {
            id: id.into(),
            title: "Streetlights not working".into(),
            description: "Entire stretch dark, unsafe for pedestrians".into(),
            category: Category::StreetLights,
            location: GeoPoint::new(12.9352, 77.6245),
            image_url: Some("file:///tmp/blob.jpg".into()),
            status: Status::Reported,
            priority: Priority::High,
            reported_by: "u1".into(),
            reporter_name: Some("Priya Sharma".into()),
            assigned_department: None,
            assigned_officer_id: None,
            sla_deadline: None,
            resolution_notes: None,
            created_at: at(0),
            updated_at: at(0),
            upvotes: 3,
            history: vec![HistoryEntry {
                status: Status::Reported,
                updated_by: "u1".into(),
                timestamp: at(0),
                comment: Some("Issue reported by citizen".into()),
            }],
            notes: vec![],
            escalation_details: None,
            version: 0,
        }
    }

    #[test]
    fn create_then_get_roundtrips_exactly() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        let original = issue("iss-lights01");
        registry.create(&original).unwrap();
        assert_eq!(registry.get("iss-lights01").unwrap(), Some(original));
        assert!(registry.get("iss-missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        registry.create(&issue("iss-a")).unwrap();
        let err = registry.create(&issue("iss-a")).unwrap_err();
        assert!(matches!(err, CivicError::Validation { field: "id", .. }));
    }

    #[test]
    fn patch_appends_history_notes_and_escalation() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        registry.create(&issue("iss-a")).unwrap();

        let patch = IssuePatch {
            status: Some(Status::Escalated),
            escalation_details: Some(EscalationDetails {
                escalated_to: "Municipal Commissioner".into(),
                escalated_at: at(5),
                reason: "Safety hazard".into(),
                reference_id: Some("REF-12".into()),
            }),
            append_history: vec![HistoryEntry {
                status: Status::Escalated,
                updated_by: "u4".into(),
                timestamp: at(5),
                comment: Some("Escalated to Municipal Commissioner: Safety hazard".into()),
            }],
            append_notes: vec![AdminNote {
                id: "n1".into(),
                author: "Admin".into(),
                content: "Called BESCOM".into(),
                timestamp: at(5),
            }],
            updated_at: Some(at(5)),
            ..IssuePatch::default()
        };
        let updated = registry.update("iss-a", &patch).unwrap();
        let stored = registry.get("iss-a").unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(stored.status, Status::Escalated);
        assert_eq!(stored.history.len(), 2);
        assert_eq!(stored.notes[0].content, "Called BESCOM");
        assert_eq!(stored.version, 1);
        assert_eq!(
            stored.escalation_details.unwrap().reference_id.as_deref(),
            Some("REF-12")
        );
    }

    #[test]
    fn version_conflict_rolls_back() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        registry.create(&issue("iss-a")).unwrap();
        let patch = IssuePatch {
            upvotes_added: 1,
            updated_at: Some(at(1)),
            expected_version: Some(7),
            ..IssuePatch::default()
        };
        let err = registry.update("iss-a", &patch).unwrap_err();
        assert!(matches!(err, CivicError::VersionConflict { expected: 7, actual: 0, .. }));
        assert_eq!(registry.get("iss-a").unwrap().unwrap().upvotes, 3);
    }

    #[test]
    fn list_preserves_creation_order() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        for id in ["iss-c", "iss-a", "iss-b"] {
            registry.create(&issue(id)).unwrap();
        }
        let ids: Vec<String> = registry.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["iss-c", "iss-a", "iss-b"]);
    }

    #[test]
    fn unknown_id_update_is_not_found() {
        let registry = SqliteRegistry::open_in_memory().unwrap();
        let err = registry
            .update("iss-x", &IssuePatch::default())
            .unwrap_err();
        assert!(matches!(err, CivicError::NotFound(_)));
    }
}
