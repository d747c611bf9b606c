//! # bodega-api — HTTP Gateway for the Bodega Artifact Service
//!
//! Maps the artifact protocol onto [`bodega_store::ArtifactStore`]
//! calls. Responses are plaintext (`OK\n`, `Bad request: …\n`,
//! `Not found: …\n`) or HTML directory indexes; uploads and downloads
//! stream rather than buffering whole artifacts.
//!
//! ## Surface
//!
//! | Method | Path | Behavior |
//! |--------|------|----------|
//! | `PUT`    | `/{repo}/{branch}/{build}/{path...}` | atomic streamed upload |
//! | `GET`/`HEAD` | `/{repo}/{branch}/{build}/{path...}` | file bytes or directory index |
//! | `GET`/`HEAD` | `/`, `/{repo}`, `/{repo}/{branch}`, `/{repo}/{branch}/{build}` | directory index |
//! | `DELETE` | `/{repo}/{branch}/{build}` | recursive delete, always 200 |
//! | `GET`    | `/healthz` | liveness |
//!
//! Trailing slashes on GET/HEAD paths are tolerated (trimmed before
//! routing); a trailing slash on a PUT path is preserved and rejected
//! as a directory target.

pub mod config;
pub mod content_type;
pub mod error;
pub mod routes;
pub mod state;

use axum::extract::Request;
use axum::http::uri::PathAndQuery;
use axum::http::{Method, Uri};
use axum::Router;
use tower::util::{MapRequest, MapRequestLayer};
use tower::Layer;
use tower_http::trace::TraceLayer;

pub use crate::config::Config;
pub use crate::state::AppState;

/// Assemble the protocol router with tracing.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The full service: the router wrapped with pre-routing trailing-slash
/// normalization for GET/HEAD.
pub type BodegaService = MapRequest<Router, fn(Request) -> Request>;

/// Build the complete service for [`axum::serve`] (via
/// `axum::ServiceExt::into_make_service`) or `tower::ServiceExt` in
/// tests.
pub fn service(state: AppState) -> BodegaService {
    MapRequestLayer::new(trim_trailing_slash as fn(Request) -> Request).layer(app(state))
}

/// Trim trailing slashes from GET/HEAD request paths before routing,
/// so `GET /a/b/c/` serves the same index as `GET /a/b/c`. Other
/// methods pass through untouched: a PUT ending in `/` must reach the
/// store and be rejected as a directory target.
fn trim_trailing_slash(mut req: Request) -> Request {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return req;
    }
    let path = req.uri().path();
    if path.len() <= 1 || !path.ends_with('/') {
        return req;
    }

    let trimmed = path.trim_end_matches('/');
    let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
    let replacement = match req.uri().query() {
        Some(query) => format!("{trimmed}?{query}"),
        None => trimmed.to_string(),
    };

    if let Ok(path_and_query) = PathAndQuery::from_maybe_shared(replacement) {
        let mut parts = req.uri().clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        if let Ok(uri) = Uri::from_parts(parts) {
            *req.uri_mut() = uri;
        }
    }
    req
}
