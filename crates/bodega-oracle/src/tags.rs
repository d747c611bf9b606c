//! Wire model of the oracle's tag snapshot.
//!
//! The oracle serves a single JSON document shaped
//! `{"repos": {<repo>: {"branches": {<branch>: {"tags": {<tag>:
//! {"build_id": ...}}}}}}}`. Every level is optional-by-default so a
//! sparse or empty snapshot deserializes cleanly, and unknown fields
//! are ignored: the oracle owns this format, Bodega only reads the
//! parts it needs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A complete tag snapshot as fetched from the oracle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagData {
    #[serde(default)]
    pub repos: HashMap<String, RepoTags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoTags {
    #[serde(default)]
    pub branches: HashMap<String, BranchTags>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchTags {
    #[serde(default)]
    pub tags: HashMap<String, TagRecord>,
}

/// One tag. `build_id` may be absent for tags that do not currently
/// point at a build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(default)]
    pub build_id: Option<String>,
}

impl TagData {
    /// The tag set for a repo/branch, or `None` when the snapshot has
    /// no entry at all for that pair (which the scanner treats per its
    /// fail-safe policy).
    pub fn tags_for(&self, repo: &str, branch: &str) -> Option<&HashMap<String, TagRecord>> {
        Some(&self.repos.get(repo)?.branches.get(branch)?.tags)
    }

    /// Whether any tag under `repo`/`branch` references `build`.
    pub fn references_build(&self, repo: &str, branch: &str, build: &str) -> bool {
        self.tags_for(repo, branch)
            .map(|tags| {
                tags.values()
                    .any(|tag| tag.build_id.as_deref() == Some(build))
            })
            .unwrap_or(false)
    }
}
