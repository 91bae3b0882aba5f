//! Domain types for reported issues.

pub mod ids;
pub mod issue;
