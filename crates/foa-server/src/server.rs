use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use foa_sync::SyncEngine;
use tokio::net::TcpListener;

use crate::auth::AuthProvider;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::{build_app, App};
use crate::state::AppState;

/// FOA API server.
pub struct FoaServer {
    config: ServerConfig,
    state: AppState,
}

impl FoaServer {
    pub fn new(config: ServerConfig, engine: Arc<SyncEngine>) -> Self {
        Self {
            config,
            state: AppState::new(engine),
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.state = self.state.with_auth(auth);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the application service (useful for testing).
    pub fn app(&self) -> App {
        build_app(self.state.clone(), &self.config)
    }

    /// Serve requests until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "FOA gateway listening");
        let app = axum::ServiceExt::<Request>::into_make_service(self.app());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("FOA gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foa_network::InMemoryNetwork;
    use foa_store::InMemoryStore;
    use foa_sync::SyncConfig;

    fn engine() -> Arc<SyncEngine> {
        Arc::new(
            SyncEngine::new(
                Arc::new(InMemoryStore::new()),
                Arc::new(InMemoryNetwork::new()),
                SyncConfig::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn server_construction() {
        let server = FoaServer::new(ServerConfig::default(), engine());
        assert_eq!(server.config().bind_addr, "127.0.0.1:8081".parse().unwrap());
        let _app = server.app();
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ServerConfig::default()
        };
        FoaServer::new(config, engine())
            .serve(async {})
            .await
            .unwrap();
    }
}
