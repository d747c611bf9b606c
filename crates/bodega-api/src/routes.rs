//! Route definitions and handlers for the artifact protocol.
//!
//! The surface is deliberately small:
//!
//! - `PUT  /{repo}/{branch}/{build}/{path...}` — streamed upload
//! - `GET  /{repo}/{branch}/{build}/{path...}` — file bytes or index
//! - `GET  /…` at every directory level — HTML index
//! - `DELETE /{repo}/{branch}/{build}` — best-effort, always 200
//! - `GET  /healthz` — liveness
//!
//! GET routes also serve HEAD; the transport strips the body.

use std::io;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;

use bodega_store::{BuildKey, DirEntry, EntryKind, ReadOutcome};

use crate::content_type;
use crate::error::AppError;
use crate::state::AppState;

const OK_BODY: &str = "OK\n";

/// Build the protocol router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index_root))
        .route("/:repo", get(index_repo))
        .route("/:repo/:branch", get(index_branch))
        .route(
            "/:repo/:branch/:build",
            get(index_build).delete(delete_build),
        )
        .route("/:repo/:branch/:build/*path", get(get_file).put(put_file))
}

/// GET /healthz — 200 while the process is alive.
async fn healthz() -> &'static str {
    OK_BODY
}

/// PUT /{repo}/{branch}/{build}/{path...} — stream the request body
/// into the store. Visible at the final path only once fully written.
async fn put_file(
    State(state): State<AppState>,
    Path((repo, branch, build, path)): Path<(String, String, String, String)>,
    request: Request,
) -> Result<&'static str, AppError> {
    let key = BuildKey::new(repo, branch, build)?;
    let body = request
        .into_body()
        .into_data_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    state.store.write(&key, &path, body).await?;
    Ok(OK_BODY)
}

/// GET /{repo}/{branch}/{build}/{path...} — file bytes with an
/// inferred content type, or a directory index.
async fn get_file(
    State(state): State<AppState>,
    Path((repo, branch, build, path)): Path<(String, String, String, String)>,
) -> Result<Response, AppError> {
    let key = BuildKey::new(repo, branch, build)?;
    let rel = path.trim_end_matches('/');

    match state.store.read(&key, rel).await? {
        ReadOutcome::File { file, len, path } => {
            let body = Body::from_stream(ReaderStream::new(file));
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type::from_path(&path))
                .header(header::CONTENT_LENGTH, len)
                .body(body)
                .map_err(|e| AppError::Internal(e.to_string()))
        }
        ReadOutcome::Directory { path } => {
            let entries = state.store.list_dir(&path).await?;
            let title = format!("/{key}/{rel}");
            Ok(Html(directory_index(&title, &entries)).into_response())
        }
    }
}

/// DELETE /{repo}/{branch}/{build} — idempotent recursive delete;
/// 200 regardless of outcome, failures logged.
async fn delete_build(
    State(state): State<AppState>,
    Path((repo, branch, build)): Path<(String, String, String)>,
) -> Result<&'static str, AppError> {
    let key = BuildKey::new(repo, branch, build)?;
    if let Err(err) = state.store.delete(&key).await {
        tracing::warn!(build = %key, error = %err, "delete request failed");
    }
    Ok(OK_BODY)
}

/// GET /{repo}/{branch}/{build} — index of the build tree root.
async fn index_build(
    State(state): State<AppState>,
    Path((repo, branch, build)): Path<(String, String, String)>,
) -> Result<Html<String>, AppError> {
    list_index(&state, &[repo.as_str(), branch.as_str(), build.as_str()]).await
}

/// GET /{repo}/{branch} — index of a branch's builds.
async fn index_branch(
    State(state): State<AppState>,
    Path((repo, branch)): Path<(String, String)>,
) -> Result<Html<String>, AppError> {
    list_index(&state, &[repo.as_str(), branch.as_str()]).await
}

/// GET /{repo} — index of a repo's branches.
async fn index_repo(
    State(state): State<AppState>,
    Path(repo): Path<String>,
) -> Result<Html<String>, AppError> {
    list_index(&state, &[repo.as_str()]).await
}

/// GET / — index of the known repos.
async fn index_root(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    list_index(&state, &[]).await
}

async fn list_index(state: &AppState, segments: &[&str]) -> Result<Html<String>, AppError> {
    let entries = state.store.list(segments).await?;
    let title = format!("/{}", segments.join("/"));
    Ok(Html(directory_index(&title, &entries)))
}

/// Render an HTML index of a directory's immediate children.
/// Directories link with a trailing slash so relative navigation works.
fn directory_index(title: &str, entries: &[DirEntry]) -> String {
    let title = escape(title);
    let mut items = String::new();
    for entry in entries {
        let name = escape(&entry.name);
        match entry.kind {
            EntryKind::Directory => {
                items.push_str(&format!("    <li><a href=\"{name}/\">{name}/</a></li>\n"));
            }
            EntryKind::File => {
                items.push_str(&format!("    <li><a href=\"{name}\">{name}</a></li>\n"));
            }
        }
    }
    format!(
        "<html>\n  <head><title>{title}</title></head>\n  <body>\n    <h1>{title}</h1>\n    \
         <ul>\n{items}    </ul>\n  </body>\n</html>\n"
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
