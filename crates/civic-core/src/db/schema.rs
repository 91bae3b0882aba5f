//! SQLite schema for the issue registry.
//!
//! - `issues` holds the current scalar fields of each issue
//! - `issue_history` and `issue_notes` are append-only child tables whose
//!   autoincrement keys preserve insertion order
//! - `registry_meta` records the applied schema version

/// Migration v1: issues, append-only children and metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS issues (
    issue_id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL CHECK (length(trim(description)) > 0),
    category TEXT NOT NULL,
    latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
    longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
    image_url TEXT,
    status TEXT NOT NULL CHECK (status IN (
        'reported', 'acknowledged', 'verified', 'in-progress',
        'resolved', 'rejected', 'escalated'
    )),
    priority TEXT NOT NULL CHECK (priority IN ('high', 'medium', 'low')),
    reported_by TEXT NOT NULL,
    reporter_name TEXT,
    assigned_department TEXT,
    assigned_officer_id TEXT,
    sla_deadline TEXT,
    resolution_notes TEXT,
    escalated_to TEXT,
    escalated_at TEXT,
    escalation_reason TEXT,
    escalation_reference_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
    version INTEGER NOT NULL DEFAULT 0 CHECK (version >= 0)
);

CREATE TABLE IF NOT EXISTS issue_history (
    history_seq INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id TEXT NOT NULL REFERENCES issues(issue_id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    comment TEXT
);

CREATE TABLE IF NOT EXISTS issue_notes (
    note_seq INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id TEXT NOT NULL,
    issue_id TEXT NOT NULL REFERENCES issues(issue_id) ON DELETE CASCADE,
    author TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    UNIQUE (issue_id, note_id)
);

CREATE TABLE IF NOT EXISTS registry_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO registry_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes for dashboard and reporter queries.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_issues_reporter
    ON issues(reported_by);

CREATE INDEX IF NOT EXISTS idx_issues_status_priority
    ON issues(status, priority);

CREATE INDEX IF NOT EXISTS idx_issues_category
    ON issues(category);

CREATE INDEX IF NOT EXISTS idx_issue_history_issue
    ON issue_history(issue_id, history_seq);

CREATE INDEX IF NOT EXISTS idx_issue_notes_issue
    ON issue_notes(issue_id, note_seq);
";

/// Indexes expected after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_issues_reporter",
    "idx_issues_status_priority",
    "idx_issues_category",
    "idx_issue_history_issue",
    "idx_issue_notes_issue",
];
