//! # bodega-oracle — Tag Oracle Client
//!
//! The Tag Oracle is an external, read-only source of tag → build
//! associations, keyed `repo → branch → tag → {build_id}`. The
//! retention scanner polls it once per sweep to decide which old
//! builds are still referenced. Bodega never writes to it.
//!
//! Outage policy: a stuck or unreachable oracle must not stall a
//! sweep (the client carries a bounded per-request timeout) and must
//! not cause data loss (the default [`UnreachablePolicy`] is `Keep`).

pub mod client;
pub mod tags;

pub use client::{OracleConfig, TagOracle};
pub use tags::{TagData, TagRecord};

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a tag fetch. All of them leave the sweep running under
/// the configured [`UnreachablePolicy`].
#[derive(Error, Debug)]
pub enum OracleError {
    /// The request exceeded the configured timeout.
    #[error("oracle request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Transport failure or non-success HTTP status.
    #[error("oracle unavailable: {reason}")]
    Unavailable { reason: String },

    /// The oracle answered, but not with the expected structure.
    #[error("oracle response malformed: {reason}")]
    Malformed { reason: String },
}

/// What the retention scanner does with a GC-eligible build when the
/// oracle is unreachable or its snapshot has no entry for the build's
/// repo/branch.
///
/// `Keep` (the default) treats the build as if it were tagged:
/// deleting on a transient outage is irreversible data loss, so the
/// fail-safe stance must be opted out of explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnreachablePolicy {
    #[default]
    Keep,
    Delete,
}

impl FromStr for UnreachablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "delete" => Ok(Self::Delete),
            other => Err(format!("invalid policy {other:?}; expected \"keep\" or \"delete\"")),
        }
    }
}

/// Source of tag snapshots, abstracted so the scanner can be driven by
/// the HTTP client in production and a fixture in tests.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Fetch the complete current tag snapshot.
    async fn fetch_tags(&self) -> Result<TagData, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_default_is_keep() {
        assert_eq!(UnreachablePolicy::default(), UnreachablePolicy::Keep);
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("keep".parse::<UnreachablePolicy>().unwrap(), UnreachablePolicy::Keep);
        assert_eq!("Delete".parse::<UnreachablePolicy>().unwrap(), UnreachablePolicy::Delete);
        assert!("drop".parse::<UnreachablePolicy>().is_err());
    }
}
