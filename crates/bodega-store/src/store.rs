//! The artifact store proper.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::StoreError;
use crate::key::{self, BuildKey};
use crate::paths;

/// Kind tag for a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Result of a read: a regular file ready to stream, or a directory
/// the caller should list instead.
#[derive(Debug)]
pub enum ReadOutcome {
    File {
        file: fs::File,
        len: u64,
        path: PathBuf,
    },
    Directory {
        path: PathBuf,
    },
}

/// Filesystem-backed artifact store rooted at a single builds
/// directory. Cheap to clone behind an `Arc`; holds no state besides
/// the canonicalized root path.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if necessary) the builds root. The root is
    /// canonicalized once here so later symlink-escape checks compare
    /// against its real path.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        let root = root
            .canonicalize()
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a build directory. Safe to join directly: the
    /// key's segments were validated at construction.
    pub fn build_dir(&self, key: &BuildKey) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in key.segments() {
            dir.push(segment);
        }
        dir
    }

    /// Resolve `rel` under the build directory, enforcing both lexical
    /// and symlink path safety. The result need not exist.
    async fn resolve(&self, key: &BuildKey, rel: &str) -> Result<PathBuf, StoreError> {
        let sanitized = paths::sanitize(rel)?;
        let mut target = self.build_dir(key);
        target.push(&sanitized);
        paths::check_symlink_escape(&self.root, &target).await?;
        Ok(target)
    }

    /// Stream `body` into the file at `rel` under the build directory.
    ///
    /// The bytes go to a uniquely named staging file next to the
    /// destination (same volume, so the final `rename` is atomic).
    /// On any stream or I/O failure the staging file is removed and
    /// the rename never happens. Returns the number of bytes written.
    pub async fn write<S>(&self, key: &BuildKey, rel: &str, body: S) -> Result<u64, StoreError>
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Unpin,
    {
        if rel.is_empty() || rel.ends_with('/') {
            return Err(StoreError::PathSafety(
                "cannot write to a directory target".into(),
            ));
        }

        let dest = self.resolve(key, rel).await?;
        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::PathSafety(format!("invalid file name in {rel:?}")))?
            .to_owned();
        let parent = dest
            .parent()
            .ok_or_else(|| StoreError::PathSafety(format!("no parent directory for {rel:?}")))?
            .to_path_buf();

        fs::create_dir_all(&parent)
            .await
            .map_err(|e| StoreError::io(&parent, e))?;

        let staging = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| write_error(&dest, e))?;

        match copy_stream(body, &mut file).await {
            Ok(written) => {
                drop(file);
                if let Err(err) = fs::rename(&staging, &dest).await {
                    let _ = fs::remove_file(&staging).await;
                    return Err(write_error(&dest, err));
                }
                tracing::debug!(build = %key, path = rel, bytes = written, "stored file");
                Ok(written)
            }
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&staging).await;
                Err(write_error(&dest, err))
            }
        }
    }

    /// Open the file at `rel` for reading, or report that it is a
    /// directory. `rel` may be empty to address the build root.
    pub async fn read(&self, key: &BuildKey, rel: &str) -> Result<ReadOutcome, StoreError> {
        let path = self.resolve(key, rel).await?;

        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(display_target(key, rel)));
            }
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        if meta.is_dir() {
            return Ok(ReadOutcome::Directory { path });
        }

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(display_target(key, rel)));
            }
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        Ok(ReadOutcome::File {
            file,
            len: meta.len(),
            path,
        })
    }

    /// List the immediate children of a directory addressed by zero or
    /// more validated segments under the builds root (zero segments
    /// lists the root itself: the known repos).
    pub async fn list(&self, segments: &[&str]) -> Result<Vec<DirEntry>, StoreError> {
        let mut dir = self.root.clone();
        for segment in segments {
            key::validate_segment("path segment", segment)?;
            dir.push(segment);
        }
        paths::check_symlink_escape(&self.root, &dir).await?;

        match self.list_dir(&dir).await {
            Err(StoreError::NotFound(_)) => Err(StoreError::NotFound(segments.join("/"))),
            other => other,
        }
    }

    /// List the immediate children of an absolute directory path
    /// previously produced by this store, tagged file-or-directory and
    /// sorted by name. Never recurses.
    pub async fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntry>, StoreError> {
        let mut reader = match fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(dir.display().to_string()));
            }
            Err(err) => return Err(StoreError::io(dir, err)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            let kind = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => EntryKind::Directory,
                Ok(_) => EntryKind::File,
                Err(e) => return Err(StoreError::io(&entry.path(), e)),
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Recursively delete a build directory. Already-absent is
    /// success; deletion is expected to be best-effort at call sites.
    pub async fn delete(&self, key: &BuildKey) -> Result<(), StoreError> {
        let dir = self.build_dir(key);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(build = %key, "deleted build");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Deletion {
                path: dir.display().to_string(),
                source: err,
            }),
        }
    }

    /// Modification time of a build directory.
    pub async fn modified(&self, key: &BuildKey) -> Result<SystemTime, StoreError> {
        let dir = self.build_dir(key);
        let meta = match fs::metadata(&dir).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(err) => return Err(StoreError::io(&dir, err)),
        };
        meta.modified().map_err(|e| StoreError::io(&dir, e))
    }
}

async fn copy_stream<S>(mut body: S, file: &mut fs::File) -> io::Result<u64>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = body.try_next().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn write_error(dest: &Path, source: io::Error) -> StoreError {
    StoreError::Write {
        path: dest.display().to_string(),
        source,
    }
}

fn display_target(key: &BuildKey, rel: &str) -> String {
    if rel.is_empty() {
        key.to_string()
    } else {
        format!("{key}/{rel}")
    }
}
