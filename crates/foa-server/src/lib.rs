//! HTTP server for the FOA gateway.
//!
//! Exposes the sync engine as a JSON REST API under `/v1`, authenticated with
//! per-user access keys (`Authorization: Bearer <key>`). Identifiers travel
//! as hex and external ids and content as base64.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handler;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AuthProvider, Credentials, StoreKeyAuth};
pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use router::{build_app, build_router, App};
pub use server::FoaServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use foa_crypto::MAX_ENTRY_SIZE;
    use foa_network::InMemoryNetwork;
    use foa_store::{InMemoryStore, ObjectStore};
    use foa_sync::{RetryPolicy, SyncConfig, SyncEngine};
    use foa_types::{ChainId, Content, User};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    const KEY: &str = "key-alice";

    struct TestApp {
        app: App,
        engine: Arc<SyncEngine>,
        store: Arc<InMemoryStore>,
        network: Arc<InMemoryNetwork>,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let network = Arc::new(InMemoryNetwork::new());
        store.insert_user(User::new("alice", KEY, 0)).unwrap();
        store.insert_user(User::new("carol", "key-carol", 3)).unwrap();
        let config = SyncConfig {
            network_timeout: Duration::from_millis(200),
            retry: RetryPolicy {
                attempts: 2,
                base: Duration::from_millis(1),
                max: Duration::from_millis(2),
            },
            ..SyncConfig::default()
        };
        let engine = Arc::new(SyncEngine::new(store.clone(), network.clone(), config).unwrap());
        let server_config = ServerConfig {
            request_logging: false,
            ..ServerConfig::default()
        };
        let app = build_app(AppState::new(Arc::clone(&engine)), &server_config);
        TestApp {
            app,
            engine,
            store,
            network,
        }
    }

    fn b64(s: &str) -> String {
        Content::from(s).to_base64()
    }

    impl TestApp {
        async fn call(
            &self,
            method: Method,
            uri: &str,
            key: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(key) = key {
                builder = builder.header("authorization", format!("Bearer {key}"));
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            let response = self
                .app
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, Some(KEY), None).await
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, Some(KEY), Some(body)).await
        }

        async fn create_chain(&self, ext: &str) -> String {
            let (status, body) = self
                .post(
                    "/v1/chains",
                    json!({"extIds": [b64(ext)], "content": b64("first")}),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["result"]["chainId"].as_str().unwrap().to_string()
        }

        /// Confirm everything pending and mirror `chain_id`.
        async fn settle(&self, chain_id: &str) {
            self.network.confirm_pending().unwrap();
            let chain_id = ChainId::from_hex(chain_id).unwrap();
            self.engine.ingest().trigger(chain_id).wait().await.unwrap();
        }
    }

    #[tokio::test]
    async fn missing_or_unknown_key_is_unauthorized() {
        let t = test_app();
        let (status, body) = t.call(Method::GET, "/v1/chains", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["result"], false);
        assert_eq!(body["code"], 1401);

        let (status, _) = t.call(Method::GET, "/v1", Some("wrong"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn info_and_user() {
        let t = test_app();
        let (status, body) = t.get("/v1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["name"], "foa");

        let (status, body) = t.get("/v1/user").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["name"], "alice");
        assert!(body["result"].get("accessKey").is_none());
    }

    #[tokio::test]
    async fn create_and_list_chains() {
        let t = test_app();
        let chain_id = t.create_chain("orders").await;
        let (_, body) = t.get(&format!("/v1/chains/{chain_id}")).await;
        assert_eq!(body["result"]["status"], "processing");
        assert_eq!(body["result"]["links"][0]["rel"], "firstEntry");

        t.create_chain("invoices").await;
        let (status, body) = t.get("/v1/chains/?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["limit"], 1);
        assert_eq!(body["result"].as_array().unwrap().len(), 1);

        let (_, body) = t
            .post("/v1/chains/search", json!({"extIds": [b64("orders")]}))
            .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["result"][0]["chainId"], chain_id.as_str());
    }

    #[tokio::test]
    async fn syncing_chain_answers_accepted_unless_forced() {
        let t = test_app();
        let chain_id = t.create_chain("slow").await;

        let (status, body) = t.get(&format!("/v1/chains/{chain_id}/entries")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["result"].is_null());
        assert_eq!(body["message"], response::SYNCING_MESSAGE);

        let (status, body) = t
            .get(&format!("/v1/chains/{chain_id}/entries?force=true"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn completed_chain_lists_entries_in_both_orders() {
        let t = test_app();
        let chain_id = t.create_chain("ledger").await;
        for i in 0..3 {
            let (status, body) = t
                .post(
                    "/v1/entries",
                    json!({"chainId": chain_id, "extIds": [b64(&format!("e{i}"))], "content": b64("x")}),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }
        t.settle(&chain_id).await;

        let (status, asc) = t
            .get(&format!("/v1/chains/{chain_id}/entries?sort=asc"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(asc["total"], 4);
        let (_, desc) = t
            .get(&format!("/v1/chains/{chain_id}/entries?sort=desc"))
            .await;
        let mut reversed = desc["result"].as_array().unwrap().clone();
        reversed.reverse();
        assert_eq!(&reversed, asc["result"].as_array().unwrap());

        let (_, body) = t
            .post(
                &format!("/v1/chains/{chain_id}/entries/search"),
                json!({"extIds": [b64("e1")]}),
            )
            .await;
        assert_eq!(body["total"], 1);
        let hash = body["result"][0]["entryHash"].as_str().unwrap().to_string();

        let (status, body) = t.get(&format!("/v1/entries/{hash}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "completed");
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        let t = test_app();
        let chain_id = t.create_chain("inputs").await;

        let (status, body) = t
            .post("/v1/entries", json!({"chainId": chain_id, "content": "%%%"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 1405);

        let (status, body) = t
            .post(
                &format!("/v1/chains/{chain_id}/entries/search"),
                json!({"extIds": []}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 1400);

        let (status, body) = t.get("/v1/chains?sort=sideways").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 1400);

        let (status, _) = t.get("/v1/chains?status=done").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = t.get("/v1/chains/not-hex").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 1400);

        let (status, body) = t.post("/v1/chains", json!({"extIds": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 1400);
    }

    #[tokio::test]
    async fn unknown_objects_are_not_found() {
        let t = test_app();
        let missing = ChainId::from_hash([9; 32]);
        let (status, body) = t.get(&format!("/v1/chains/{missing}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 1404);
        assert_eq!(body["error"], "chain not found");

        let (status, body) = t.get(&format!("/v1/entries/{}", "ab".repeat(32))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "entry not found");
    }

    #[tokio::test]
    async fn quota_and_size_limits() {
        let t = test_app();
        let chain_id = t.create_chain("limits").await;
        let carol = Some("key-carol");

        let (status, body) = t
            .call(
                Method::POST,
                "/v1/chains",
                carol,
                Some(json!({"extIds": [b64("carol")]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let (status, body) = t
            .call(
                Method::POST,
                "/v1/chains",
                carol,
                Some(json!({"extIds": [b64("carol-2")]})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], 1403);

        let content = "a".repeat(MAX_ENTRY_SIZE);
        let (status, body) = t
            .post(
                "/v1/entries",
                json!({"chainId": chain_id, "extIds": [b64("big")], "content": b64(&content)}),
            )
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], 1413);
    }

    #[tokio::test]
    async fn offline_network_is_unavailable() {
        let t = test_app();
        let chain_id = t.create_chain("offline").await;
        t.network.set_offline(true);

        let (status, body) = t.get(&format!("/v1/chains/{chain_id}/entries")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], 1503);

        // The stored chain is still readable with its stored status.
        let (status, body) = t.get(&format!("/v1/chains/{chain_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "processing");

        // Writes are still accepted and queued.
        let (status, body) = t
            .post(
                "/v1/entries",
                json!({"chainId": chain_id, "extIds": [b64("later")]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "queued");
        let user = t.store.user_by_key(KEY).unwrap().unwrap();
        assert_eq!(user.usage, 3);
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let t = test_app();
        let (status, body) = t.get("/v2/nothing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["result"], false);
    }
}
