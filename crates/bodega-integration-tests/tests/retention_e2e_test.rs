//! Retention sweep against a live stub Tag Oracle.
//!
//! Exercises the real HTTP path: the reqwest oracle client fetches a
//! snapshot from an in-process axum stub, and the sweeper deletes or
//! keeps builds accordingly.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};

use bodega_oracle::{OracleConfig, TagOracle, UnreachablePolicy};
use bodega_store::{ArtifactStore, BuildKey};
use bodega_sweep::{SweepConfig, Sweeper};

/// Serve a fixed tag snapshot on a random port.
async fn start_stub_oracle(
    snapshot: serde_json::Value,
) -> (String, tokio::sync::oneshot::Sender<()>) {
    let app = Router::new().route(
        "/api/data",
        get(move || {
            let snapshot = snapshot.clone();
            async move { Json(snapshot) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind to random port");
    let port = listener.local_addr().unwrap().port();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await
            .ok();
    });

    (format!("http://127.0.0.1:{port}/api/data"), tx)
}

async fn seed_build(store: &ArtifactStore, repo: &str, branch: &str, build: &str) -> BuildKey {
    let key = BuildKey::new(repo, branch, build).unwrap();
    let chunk: Vec<Result<bytes::Bytes, io::Error>> =
        vec![Ok(bytes::Bytes::from_static(b"artifact bytes"))];
    store
        .write(&key, "output/result.txt", futures::stream::iter(chunk))
        .await
        .unwrap();
    key
}

#[tokio::test]
async fn sweep_deletes_untagged_and_keeps_tagged_builds() {
    let snapshot = serde_json::json!({
        "repos": {
            "proj": {
                "branches": {
                    "main": {
                        "tags": {
                            "release": {"build_id": "kept"}
                        }
                    }
                }
            }
        }
    });
    let (oracle_url, _oracle_shutdown) = start_stub_oracle(snapshot).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::open(dir.path()).unwrap());
    let kept = seed_build(&store, "proj", "main", "kept").await;
    let doomed = seed_build(&store, "proj", "main", "doomed").await;

    let oracle = TagOracle::new(OracleConfig::new(oracle_url)).unwrap();
    let sweeper = Sweeper::new(
        store.clone(),
        Arc::new(oracle),
        SweepConfig {
            interval: Duration::from_secs(3600),
            grace_period: Duration::ZERO,
            unreachable_policy: UnreachablePolicy::Keep,
        },
    );

    let stats = sweeper.sweep_once().await;
    assert_eq!(stats.considered, 2);
    assert_eq!(stats.kept, 1);
    assert_eq!(stats.deleted, 1);
    assert!(store.build_dir(&kept).exists());
    assert!(!store.build_dir(&doomed).exists());
}

#[tokio::test]
async fn oracle_outage_with_default_policy_preserves_everything() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::open(dir.path()).unwrap());
    let build = seed_build(&store, "proj", "main", "old-untagged").await;

    // Nothing listens here; every fetch fails fast.
    let mut config = OracleConfig::new("http://127.0.0.1:1/api/data");
    config.timeout_secs = 2;
    let oracle = TagOracle::new(config).unwrap();

    let sweeper = Sweeper::new(
        store.clone(),
        Arc::new(oracle),
        SweepConfig {
            interval: Duration::from_secs(3600),
            grace_period: Duration::ZERO,
            unreachable_policy: UnreachablePolicy::Keep,
        },
    );

    let stats = sweeper.sweep_once().await;
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.kept, 1);
    assert!(store.build_dir(&build).exists());
}

#[tokio::test]
async fn fresh_build_survives_a_sweep_that_would_otherwise_delete_it() {
    let snapshot = serde_json::json!({"repos": {}});
    let (oracle_url, _oracle_shutdown) = start_stub_oracle(snapshot).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::open(dir.path()).unwrap());
    let build = seed_build(&store, "proj", "main", "just-published").await;

    let oracle = TagOracle::new(OracleConfig::new(oracle_url)).unwrap();
    let sweeper = Sweeper::new(
        store.clone(),
        Arc::new(oracle),
        SweepConfig {
            interval: Duration::from_secs(3600),
            grace_period: Duration::from_secs(3600),
            unreachable_policy: UnreachablePolicy::Delete,
        },
    );

    let stats = sweeper.sweep_once().await;
    assert_eq!(stats.kept, 1);
    assert!(store.build_dir(&build).exists());
}
