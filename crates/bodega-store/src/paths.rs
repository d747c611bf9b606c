//! Path-safety enforcement.
//!
//! Two layers of defense, both applied before any filesystem mutation:
//!
//! 1. [`sanitize`] — lexical normalization of a caller-supplied
//!    relative path. Rejects absolute paths and any `..` sequence that
//!    would pop past the root.
//! 2. [`check_symlink_escape`] — canonicalizes the deepest existing
//!    ancestor of the resolved target and requires it to remain under
//!    the canonicalized root. This catches escapes through symlinks
//!    that lexical normalization cannot see.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::StoreError;

/// Lexically normalize `rel` into a root-relative path.
///
/// `.` components are dropped, `..` pops the previous component, and
/// popping past the top or supplying an absolute path is a
/// [`StoreError::PathSafety`].
pub fn sanitize(rel: &str) -> Result<PathBuf, StoreError> {
    if rel.contains('\0') {
        return Err(StoreError::PathSafety("path contains a NUL byte".into()));
    }

    let mut out = PathBuf::new();
    let mut depth: usize = 0;
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(StoreError::PathSafety(format!(
                        "path {rel:?} escapes the build root"
                    )));
                }
                out.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::PathSafety(format!(
                    "path {rel:?} must be relative"
                )));
            }
        }
    }
    Ok(out)
}

/// Verify that `target` (which need not exist yet) cannot escape
/// `canonical_root` through a symlink.
///
/// Walks up from `target` to its deepest existing ancestor,
/// canonicalizes that ancestor, and checks the root prefix on the
/// result. `canonical_root` must already be canonicalized.
pub async fn check_symlink_escape(
    canonical_root: &Path,
    target: &Path,
) -> Result<(), StoreError> {
    let mut probe = target.to_path_buf();
    let resolved = loop {
        match tokio::fs::canonicalize(&probe).await {
            Ok(resolved) => break resolved,
            Err(err) if err.kind() == io::ErrorKind::NotFound => match probe.parent() {
                Some(parent) if parent.starts_with(canonical_root) => {
                    probe = parent.to_path_buf();
                }
                _ => break canonical_root.to_path_buf(),
            },
            Err(err) => return Err(StoreError::io(&probe, err)),
        }
    };

    if resolved.starts_with(canonical_root) {
        Ok(())
    } else {
        Err(StoreError::PathSafety(format!(
            "path {} resolves outside the builds root",
            target.display()
        )))
    }
}
