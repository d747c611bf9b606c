//! Shared request-handler state.

use std::sync::Arc;

use bodega_store::ArtifactStore;

/// Handler state: just the artifact store. The retention sweeper runs
/// as its own task and shares nothing with request handling beyond the
/// filesystem.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}
