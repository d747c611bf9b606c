//! # bodega-store — On-Disk Build Artifact Store
//!
//! Manages the build artifact hierarchy rooted at
//! `<builds_root>/<repo>/<branch>/<build>/...`. Responsibilities:
//!
//! - **Path safety** — every caller-supplied segment and trailing path
//!   must resolve, after lexical normalization *and* symlink
//!   resolution, to a descendant of the builds root. Violations are
//!   rejected before any filesystem access.
//! - **Atomic uploads** — request bodies stream into a uniquely named
//!   staging file colocated with the destination, promoted by a single
//!   `rename` on completion. A file is never visible at its final path
//!   until fully written.
//! - **Reads and listing** — file reads stream from disk; directory
//!   listings return immediate children only, in sorted order.
//! - **Idempotent deletion** — removing an absent build is success;
//!   other failures surface for the caller to log.
//!
//! The store takes no locks. Concurrent writers to the same destination
//! race benignly: the last completed rename wins, and every observable
//! file is one writer's complete payload.

pub mod error;
pub mod key;
mod paths;
pub mod store;

pub use error::StoreError;
pub use key::BuildKey;
pub use store::{ArtifactStore, DirEntry, EntryKind, ReadOutcome};
