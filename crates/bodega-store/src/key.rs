//! Build identity.

use std::fmt;

use crate::error::StoreError;

/// Identifies one build directory: `<repo>/<branch>/<build>`.
///
/// Segments are opaque, path-safe strings validated at construction.
/// A `BuildKey` can therefore be joined under the builds root without
/// further checking — it cannot name `.`, `..`, or cross a directory
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildKey {
    repo: String,
    branch: String,
    build: String,
}

impl BuildKey {
    /// Validate the three segments and construct a key.
    pub fn new(
        repo: impl Into<String>,
        branch: impl Into<String>,
        build: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let repo = repo.into();
        let branch = branch.into();
        let build = build.into();
        for (name, value) in [("repo", &repo), ("branch", &branch), ("build", &build)] {
            validate_segment(name, value)?;
        }
        Ok(Self { repo, branch, build })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    /// The key's segments in root-to-leaf order.
    pub fn segments(&self) -> [&str; 3] {
        [&self.repo, &self.branch, &self.build]
    }
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.repo, self.branch, self.build)
    }
}

/// Check that a caller-supplied segment is a single, safe path
/// component: non-empty, not `.` or `..`, and free of separators and
/// NUL bytes.
pub fn validate_segment(name: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::PathSafety(format!("{name} must not be empty")));
    }
    if value == "." || value == ".." {
        return Err(StoreError::PathSafety(format!(
            "{name} must not be a relative directory reference"
        )));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(StoreError::PathSafety(format!(
            "{name} contains a path separator or NUL"
        )));
    }
    Ok(())
}
