//! Actor identity and role resolution for CLI commands.
//!
//! Identity: `--actor` > `CIVIC_ACTOR` > user config `actor` > `USER` (TTY only).
//! Role: `--role` > `CIVIC_ROLE` > user config `role` > citizen.
//! Display name: `--name` > `CIVIC_NAME` > user config `name` > empty.
//!
//! Read-only commands work without an identity; mutating commands require one.

use civic_core::config::UserConfig;
use civic_core::error::CivicError;
use civic_core::session::{Role, Session};
use std::env;

/// Identity-related global flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActorFlags<'a> {
    pub actor: Option<&'a str>,
    pub role: Option<&'a str>,
    pub name: Option<&'a str>,
}

/// Environment reader, swappable in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn resolve_actor_with(
    flags: ActorFlags<'_>,
    user: &UserConfig,
    env: &dyn EnvReader,
) -> Option<String> {
    non_empty(flags.actor)
        .or_else(|| env.get("CIVIC_ACTOR"))
        .or_else(|| non_empty(user.actor.as_deref()))
        .or_else(|| env.is_tty().then(|| env.get("USER")).flatten())
}

fn resolve_role_with(
    flags: ActorFlags<'_>,
    user: &UserConfig,
    env: &dyn EnvReader,
) -> Result<Role, CivicError> {
    non_empty(flags.role)
        .or_else(|| env.get("CIVIC_ROLE"))
        .or_else(|| non_empty(user.role.as_deref()))
        .map_or(Ok(Role::Citizen), |raw| raw.parse())
}

fn resolve_name_with(flags: ActorFlags<'_>, user: &UserConfig, env: &dyn EnvReader) -> String {
    non_empty(flags.name)
        .or_else(|| env.get("CIVIC_NAME"))
        .or_else(|| non_empty(user.name.as_deref()))
        .unwrap_or_default()
}

fn require_session_with(
    flags: ActorFlags<'_>,
    user: &UserConfig,
    env: &dyn EnvReader,
) -> Result<Session, CivicError> {
    let id = resolve_actor_with(flags, user, env).ok_or_else(|| {
        CivicError::validation(
            "actor",
            "an identity is required for this command; set --actor or CIVIC_ACTOR",
        )
    })?;
    let role = resolve_role_with(flags, user, env)?;
    let name = resolve_name_with(flags, user, env);
    Ok(Session::new(id, name, role))
}

/// Resolve the acting session for a mutating command.
///
/// # Errors
///
/// Fails when no identity can be found or the role is not recognized.
pub fn require_session(flags: ActorFlags<'_>, user: &UserConfig) -> Result<Session, CivicError> {
    require_session_with(flags, user, &RealEnv)
}

/// The resolved actor id, if any. Used by read-only filters such as `--mine`.
pub fn resolve_actor(flags: ActorFlags<'_>, user: &UserConfig) -> Option<String> {
    resolve_actor_with(flags, user, &RealEnv)
}
