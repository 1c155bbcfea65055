use std::sync::Arc;

use foa_sync::SyncEngine;

use crate::auth::{AuthProvider, StoreKeyAuth};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    /// State that authenticates against the engine's own store.
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let auth = Arc::new(StoreKeyAuth::new(Arc::clone(engine.store())));
        Self { engine, auth }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }
}
