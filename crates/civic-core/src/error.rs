use std::fmt;

use crate::model::issue::Status;

/// Machine-readable error codes for operators and API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    IssueNotFound,
    InvalidStateTransition,
    ValidationFailed,
    PermissionDenied,
    InvalidEnumValue,
    VersionConflict,
    CorruptRecord,
    UpstreamUnavailable,
    AttachmentUploadFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::IssueNotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::ValidationFailed => "E2003",
            Self::PermissionDenied => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::VersionConflict => "E3001",
            Self::CorruptRecord => "E3002",
            Self::UpstreamUnavailable => "E5001",
            Self::AttachmentUploadFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::IssueNotFound => "Issue not found",
            Self::InvalidStateTransition => "Invalid status transition",
            Self::ValidationFailed => "Validation failed",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidEnumValue => "Invalid category/status/priority value",
            Self::VersionConflict => "Issue was modified concurrently",
            Self::CorruptRecord => "Corrupt issue record",
            Self::UpstreamUnavailable => "Issue registry unavailable",
            Self::AttachmentUploadFailed => "Attachment upload failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `civic init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .civic/config.toml and retry."),
            Self::IssueNotFound => Some("Check the issue id with `civic list`."),
            Self::InvalidStateTransition => Some(
                "Follow reported -> acknowledged -> verified -> in-progress -> resolved; \
                 reject from reported; escalate from any open status.",
            ),
            Self::ValidationFailed => {
                Some("Provide a non-empty title, description, category and valid coordinates.")
            }
            Self::PermissionDenied => Some("Run the command as an admin (--role admin)."),
            Self::InvalidEnumValue => Some("Use one of the documented category/status values."),
            Self::VersionConflict => Some("Reload the issue and retry against its new version."),
            Self::CorruptRecord => Some("Inspect the stored record; history must start with `reported`."),
            Self::UpstreamUnavailable => Some("Retry once the registry is reachable."),
            Self::AttachmentUploadFailed => {
                Some("Check the attachment path and blob directory permissions.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors produced by the civic core.
///
/// Every operation either commits fully or returns one of these; nothing is
/// swallowed and nothing is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum CivicError {
    #[error("project not initialized: {0}")]
    NotInitialized(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("issue '{0}' not found")]
    NotFound(String),

    #[error("cannot transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: Status,
        to: Status,
        reason: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("actor '{actor}' is not allowed to {action}")]
    PermissionDenied { actor: String, action: &'static str },

    #[error("invalid {expected}: '{got}'")]
    InvalidEnumValue { expected: &'static str, got: String },

    #[error("issue '{id}' is at version {actual}, expected {expected}")]
    VersionConflict { id: String, expected: u64, actual: u64 },

    #[error("corrupt record '{id}': {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("registry unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("registry storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("attachment upload failed for '{name}': {reason}")]
    AttachmentUpload { name: String, reason: String },
}

impl CivicError {
    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// The machine-readable code for this error.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::Config(_) => ErrorCode::ConfigParseError,
            Self::NotFound(_) => ErrorCode::IssueNotFound,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::InvalidEnumValue { .. } => ErrorCode::InvalidEnumValue,
            Self::VersionConflict { .. } => ErrorCode::VersionConflict,
            Self::CorruptRecord { .. } => ErrorCode::CorruptRecord,
            Self::UpstreamUnavailable(_) | Self::Storage(_) => ErrorCode::UpstreamUnavailable,
            Self::AttachmentUpload { .. } => ErrorCode::AttachmentUploadFailed,
        }
    }

    /// Remediation text for the caller, falling back to the code summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or_else(|| code.message()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{CivicError, ErrorCode};
    use crate::model::issue::Status;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::IssueNotFound,
            ErrorCode::InvalidStateTransition,
            ErrorCode::ValidationFailed,
            ErrorCode::PermissionDenied,
            ErrorCode::InvalidEnumValue,
            ErrorCode::VersionConflict,
            ErrorCode::CorruptRecord,
            ErrorCode::UpstreamUnavailable,
            ErrorCode::AttachmentUploadFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidStateTransition.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn errors_map_to_codes() {
        let err = CivicError::NotFound("iss-missing".into());
        assert_eq!(err.error_code(), ErrorCode::IssueNotFound);
        assert_eq!(err.to_string(), "issue 'iss-missing' not found");

        let err = CivicError::InvalidTransition {
            from: Status::Resolved,
            to: Status::Reported,
            reason: "resolved is terminal",
        };
        assert_eq!(err.error_code(), ErrorCode::InvalidStateTransition);
        assert!(err.to_string().contains("resolved to reported"));
        assert!(err.suggestion().contains("acknowledged"));
    }
}
