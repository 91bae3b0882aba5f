//! Explicit actor session passed into every lifecycle operation.
//!
//! The engine trusts the identity and role it is handed; issuing and
//! verifying identities belongs to the caller.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::CivicError;

/// What an actor may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Citizen,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Citizen => "citizen",
            Self::Admin => "admin",
        })
    }
}

impl FromStr for Role {
    type Err = CivicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "admin" => Ok(Self::Admin),
            _ => Err(CivicError::InvalidEnumValue {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}

/// An authenticated actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// The caller context for one or more engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub actor: Actor,
}

impl Session {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            actor: Actor {
                id: id.into(),
                name: name.into(),
                role,
            },
        }
    }

    pub fn citizen(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Citizen)
    }

    pub fn admin(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Admin)
    }

    #[must_use]
    pub fn actor_id(&self) -> &str {
        &self.actor.id
    }

    /// Fail unless the actor is an administrator.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::PermissionDenied`] for citizens.
    pub fn require_admin(&self, action: &'static str) -> Result<(), CivicError> {
        match self.actor.role {
            Role::Admin => Ok(()),
            Role::Citizen => Err(CivicError::PermissionDenied {
                actor: self.actor.id.clone(),
                action,
            }),
        }
    }
}
