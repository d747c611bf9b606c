//! # bodega-sweep — Retention Scanner
//!
//! Reclaims disk space from unreferenced builds without ever deleting
//! anything newer than the grace period (which protects just-published
//! builds from racing tag propagation).
//!
//! One owned background task runs forever on a fixed interval. Each
//! sweep fetches the tag snapshot once, then walks
//! `repo → branch → build` with three nested directory listings and
//! decides per build:
//!
//! 1. `age < grace_period` → keep unconditionally.
//! 2. Tag snapshot has a record referencing this build → keep.
//! 3. Snapshot unavailable, or no entry for this repo/branch → the
//!    configured [`UnreachablePolicy`] decides (default: keep).
//! 4. Otherwise → delete through the store.
//!
//! Per-build failures are logged and skipped; a sweep always completes
//! its full enumeration, and the task only ends on shutdown. Sweeps
//! run inline in the scheduler loop and therefore never overlap.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use bodega_oracle::{TagData, TagSource, UnreachablePolicy};
use bodega_store::{ArtifactStore, BuildKey, EntryKind};

/// Scanner settings.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Cadence of the sweep loop.
    pub interval: Duration,
    /// Minimum age before a build becomes GC-eligible.
    pub grace_period: Duration,
    /// Fail-safe behavior when the oracle is unreachable or has no
    /// entry for a build's repo/branch.
    pub unreachable_policy: UnreachablePolicy,
}

/// Why a build was kept or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionReason {
    /// Younger than the grace period; tag state was not consulted.
    WithinGracePeriod,
    /// A tag for its repo/branch references this build.
    TagReferenced,
    /// Tags exist for its repo/branch but none reference this build.
    NoReferencingTag,
    /// The snapshot has no entry for its repo/branch; policy applied.
    NoTagEntry,
    /// The oracle could not be reached this sweep; policy applied.
    OracleUnavailable,
}

/// Per-build verdict, computed fresh each sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionDecision {
    pub keep: bool,
    pub reason: RetentionReason,
}

/// Counters for one completed sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub considered: usize,
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Decide a single build's fate. Pure, so the retention rules are
/// testable without a filesystem.
pub fn decide(
    age: Duration,
    grace_period: Duration,
    snapshot: Option<&TagData>,
    key: &BuildKey,
    policy: UnreachablePolicy,
) -> RetentionDecision {
    if age < grace_period {
        return RetentionDecision {
            keep: true,
            reason: RetentionReason::WithinGracePeriod,
        };
    }

    let policy_keep = policy == UnreachablePolicy::Keep;
    match snapshot {
        None => RetentionDecision {
            keep: policy_keep,
            reason: RetentionReason::OracleUnavailable,
        },
        Some(data) => match data.tags_for(key.repo(), key.branch()) {
            None => RetentionDecision {
                keep: policy_keep,
                reason: RetentionReason::NoTagEntry,
            },
            Some(_) if data.references_build(key.repo(), key.branch(), key.build()) => {
                RetentionDecision {
                    keep: true,
                    reason: RetentionReason::TagReferenced,
                }
            }
            Some(_) => RetentionDecision {
                keep: false,
                reason: RetentionReason::NoReferencingTag,
            },
        },
    }
}

/// The retention scanner. Owns a store handle and a tag source;
/// consumed by [`Sweeper::spawn`].
pub struct Sweeper {
    store: Arc<ArtifactStore>,
    tags: Arc<dyn TagSource>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(store: Arc<ArtifactStore>, tags: Arc<dyn TagSource>, config: SweepConfig) -> Self {
        Self { store, tags, config }
    }

    /// Start the sweep loop as an owned background task. The first
    /// sweep runs one full interval after startup.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval's first tick fires immediately; consume it so a
            // freshly started process waits a full interval first.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::info!("retention sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        });
        SweeperHandle { shutdown: shutdown_tx, task }
    }

    /// Run one complete sweep. Never returns an error: every fault is
    /// logged and counted so the loop above can run indefinitely.
    pub async fn sweep_once(&self) -> SweepStats {
        tracing::info!("sweeping builds");

        let snapshot = match self.tags.fetch_tags().await {
            Ok(data) => Some(data),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    policy = ?self.config.unreachable_policy,
                    "tag oracle fetch failed; applying fail-safe policy"
                );
                None
            }
        };

        let mut stats = SweepStats::default();

        let repos = match self.store.list(&[]).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "cannot list builds root; skipping sweep");
                return stats;
            }
        };

        for repo in dirs_only(repos) {
            let branches = match self.store.list(&[repo.as_str()]).await {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(repo, error = %err, "cannot list repo; skipping");
                    continue;
                }
            };
            for branch in dirs_only(branches) {
                let builds = match self.store.list(&[repo.as_str(), branch.as_str()]).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        tracing::warn!(repo, branch, error = %err, "cannot list branch; skipping");
                        continue;
                    }
                };
                for build in dirs_only(builds) {
                    stats.considered += 1;
                    self.consider(&repo, &branch, &build, snapshot.as_ref(), &mut stats)
                        .await;
                }
            }
        }

        tracing::info!(
            considered = stats.considered,
            kept = stats.kept,
            deleted = stats.deleted,
            failed = stats.failed,
            "sweep complete"
        );
        stats
    }

    async fn consider(
        &self,
        repo: &str,
        branch: &str,
        build: &str,
        snapshot: Option<&TagData>,
        stats: &mut SweepStats,
    ) {
        let key = match BuildKey::new(repo, branch, build) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(repo, branch, build, error = %err, "unusable build name; skipping");
                stats.failed += 1;
                return;
            }
        };

        let age = match self.store.modified(&key).await {
            Ok(mtime) => SystemTime::now()
                .duration_since(mtime)
                .unwrap_or(Duration::ZERO),
            Err(err) => {
                // The build may have been deleted since enumeration.
                tracing::debug!(build = %key, error = %err, "cannot stat build; skipping");
                stats.failed += 1;
                return;
            }
        };

        let decision = decide(
            age,
            self.config.grace_period,
            snapshot,
            &key,
            self.config.unreachable_policy,
        );
        tracing::debug!(
            build = %key,
            age_secs = age.as_secs(),
            keep = decision.keep,
            reason = ?decision.reason,
            "retention decision"
        );

        if decision.keep {
            stats.kept += 1;
            return;
        }

        match self.store.delete(&key).await {
            Ok(()) => stats.deleted += 1,
            Err(err) => {
                tracing::warn!(build = %key, error = %err, "deletion failed; continuing sweep");
                stats.failed += 1;
            }
        }
    }
}

/// Handle to a running sweeper: dropping it detaches the task,
/// [`SweeperHandle::shutdown`] stops it cleanly.
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweep loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

fn dirs_only(entries: Vec<bodega_store::DirEntry>) -> impl Iterator<Item = String> {
    entries
        .into_iter()
        .filter(|e| e.kind == EntryKind::Directory)
        .map(|e| e.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use async_trait::async_trait;
    use bodega_oracle::OracleError;
    use bytes::Bytes;

    /// Tag source backed by a fixture, or failing every fetch.
    struct StaticTags(Option<TagData>);

    #[async_trait]
    impl TagSource for StaticTags {
        async fn fetch_tags(&self) -> Result<TagData, OracleError> {
            match &self.0 {
                Some(data) => Ok(data.clone()),
                None => Err(OracleError::Unavailable {
                    reason: "fixture outage".into(),
                }),
            }
        }
    }

    fn tagged(repo: &str, branch: &str, tag: &str, build: &str) -> TagData {
        serde_json::from_value(serde_json::json!({
            "repos": {repo: {"branches": {branch: {"tags": {tag: {"build_id": build}}}}}}
        }))
        .unwrap()
    }

    async fn seeded_store(builds: &[(&str, &str, &str)]) -> (tempfile::TempDir, Arc<ArtifactStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::open(dir.path()).unwrap());
        for (repo, branch, build) in builds {
            let key = BuildKey::new(*repo, *branch, *build).unwrap();
            let chunk: Vec<Result<Bytes, io::Error>> = vec![Ok(Bytes::from_static(b"artifact"))];
            store
                .write(&key, "output.txt", futures::stream::iter(chunk))
                .await
                .unwrap();
        }
        (dir, store)
    }

    fn sweeper(
        store: Arc<ArtifactStore>,
        tags: StaticTags,
        grace_period: Duration,
        policy: UnreachablePolicy,
    ) -> Sweeper {
        Sweeper::new(
            store,
            Arc::new(tags),
            SweepConfig {
                interval: Duration::from_secs(3600),
                grace_period,
                unreachable_policy: policy,
            },
        )
    }

    fn exists(store: &ArtifactStore, repo: &str, branch: &str, build: &str) -> bool {
        store
            .build_dir(&BuildKey::new(repo, branch, build).unwrap())
            .exists()
    }

    #[tokio::test]
    async fn young_build_survives_regardless_of_tag_state() {
        let (_dir, store) = seeded_store(&[("a", "b", "fresh")]).await;
        // Even the delete policy and an empty snapshot cannot touch a
        // build inside the grace period.
        let sweeper = sweeper(
            store.clone(),
            StaticTags(Some(TagData::default())),
            Duration::from_secs(3600),
            UnreachablePolicy::Delete,
        );

        let stats = sweeper.sweep_once().await;
        assert_eq!(stats.considered, 1);
        assert_eq!(stats.kept, 1);
        assert!(exists(&store, "a", "b", "fresh"));
    }

    #[tokio::test]
    async fn old_untagged_build_is_deleted() {
        let (_dir, store) = seeded_store(&[("a", "b", "d")]).await;
        // Grace period zero makes every build GC-eligible; tags for
        // this repo/branch exist but point elsewhere.
        let sweeper = sweeper(
            store.clone(),
            StaticTags(Some(tagged("a", "b", "release", "other"))),
            Duration::ZERO,
            UnreachablePolicy::Keep,
        );

        let stats = sweeper.sweep_once().await;
        assert_eq!(stats.deleted, 1);
        assert!(!exists(&store, "a", "b", "d"));
    }

    #[tokio::test]
    async fn old_tagged_build_survives() {
        let (_dir, store) = seeded_store(&[("a", "b", "c")]).await;
        let sweeper = sweeper(
            store.clone(),
            StaticTags(Some(tagged("a", "b", "release", "c"))),
            Duration::ZERO,
            UnreachablePolicy::Keep,
        );

        let stats = sweeper.sweep_once().await;
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.deleted, 0);
        assert!(exists(&store, "a", "b", "c"));
    }

    #[tokio::test]
    async fn missing_repo_entry_honors_keep_policy() {
        let (_dir, store) = seeded_store(&[("a", "b", "c")]).await;
        let sweeper = sweeper(
            store.clone(),
            StaticTags(Some(TagData::default())),
            Duration::ZERO,
            UnreachablePolicy::Keep,
        );

        sweeper.sweep_once().await;
        assert!(exists(&store, "a", "b", "c"));
    }

    #[tokio::test]
    async fn missing_repo_entry_honors_delete_policy() {
        let (_dir, store) = seeded_store(&[("a", "b", "c")]).await;
        let sweeper = sweeper(
            store.clone(),
            StaticTags(Some(TagData::default())),
            Duration::ZERO,
            UnreachablePolicy::Delete,
        );

        sweeper.sweep_once().await;
        assert!(!exists(&store, "a", "b", "c"));
    }

    #[tokio::test]
    async fn oracle_outage_with_keep_policy_deletes_nothing() {
        let (_dir, store) = seeded_store(&[("a", "b", "c"), ("a", "b", "d")]).await;
        let sweeper = sweeper(
            store.clone(),
            StaticTags(None),
            Duration::ZERO,
            UnreachablePolicy::Keep,
        );

        let stats = sweeper.sweep_once().await;
        assert_eq!(stats.considered, 2);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.deleted, 0);
        assert!(exists(&store, "a", "b", "c"));
        assert!(exists(&store, "a", "b", "d"));
    }

    #[tokio::test]
    async fn oracle_outage_with_delete_policy_deletes_eligible_builds() {
        let (_dir, store) = seeded_store(&[("a", "b", "c")]).await;
        let sweeper = sweeper(
            store.clone(),
            StaticTags(None),
            Duration::ZERO,
            UnreachablePolicy::Delete,
        );

        let stats = sweeper.sweep_once().await;
        assert_eq!(stats.deleted, 1);
        assert!(!exists(&store, "a", "b", "c"));
    }

    #[tokio::test]
    async fn sweep_enumerates_every_branch_and_repo() {
        let (_dir, store) = seeded_store(&[
            ("r1", "main", "1"),
            ("r1", "dev", "2"),
            ("r2", "main", "3"),
        ])
        .await;
        let sweeper = sweeper(
            store.clone(),
            StaticTags(Some(tagged("r1", "main", "latest", "1"))),
            Duration::ZERO,
            UnreachablePolicy::Delete,
        );

        let stats = sweeper.sweep_once().await;
        assert_eq!(stats.considered, 3);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.deleted, 2);
        assert!(exists(&store, "r1", "main", "1"));
        assert!(!exists(&store, "r1", "dev", "2"));
        assert!(!exists(&store, "r2", "main", "3"));
    }

    #[tokio::test]
    async fn spawned_sweeper_shuts_down_cleanly() {
        let (_dir, store) = seeded_store(&[]).await;
        let sweeper = sweeper(
            store,
            StaticTags(Some(TagData::default())),
            Duration::from_secs(3600),
            UnreachablePolicy::Keep,
        );

        let handle = sweeper.spawn();
        handle.shutdown().await;
    }

    #[test]
    fn decide_orders_grace_before_tags() {
        let key = BuildKey::new("a", "b", "c").unwrap();
        let snapshot = tagged("a", "b", "release", "other");

        // Within grace: kept without consulting tags.
        let d = decide(
            Duration::from_secs(10),
            Duration::from_secs(3600),
            Some(&snapshot),
            &key,
            UnreachablePolicy::Delete,
        );
        assert!(d.keep);
        assert_eq!(d.reason, RetentionReason::WithinGracePeriod);

        // Past grace, tags present, none referencing: deleted.
        let d = decide(
            Duration::from_secs(7200),
            Duration::from_secs(3600),
            Some(&snapshot),
            &key,
            UnreachablePolicy::Keep,
        );
        assert!(!d.keep);
        assert_eq!(d.reason, RetentionReason::NoReferencingTag);

        // Past grace, no snapshot: policy decides.
        let d = decide(
            Duration::from_secs(7200),
            Duration::from_secs(3600),
            None,
            &key,
            UnreachablePolicy::Keep,
        );
        assert!(d.keep);
        assert_eq!(d.reason, RetentionReason::OracleUnavailable);
    }
}
