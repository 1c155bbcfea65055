use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use foa_store::ObjectStore;
use foa_types::User;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Read `Authorization: Bearer <key>`. Anything else is anonymous.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return Self::Anonymous;
        };
        match value.split_once(' ') {
            Some((scheme, key)) if scheme.eq_ignore_ascii_case("bearer") && !key.trim().is_empty() => {
                Self::Bearer(key.trim().to_string())
            }
            _ => Self::Anonymous,
        }
    }
}

/// Resolves request credentials to an API user.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<User, ApiError>;
}

/// Looks access keys up in the object store.
pub struct StoreKeyAuth {
    store: Arc<dyn ObjectStore>,
}

impl StoreKeyAuth {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthProvider for StoreKeyAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<User, ApiError> {
        let Credentials::Bearer(key) = credentials else {
            return Err(ApiError::unauthorized("missing access key"));
        };
        let user = self
            .store
            .user_by_key(key)
            .map_err(|e| ApiError::from(foa_sync::SyncError::from(e)))?
            .ok_or_else(|| ApiError::unauthorized("invalid access key"))?;
        if !user.enabled {
            return Err(ApiError::unauthorized(format!("user {} is disabled", user.name)));
        }
        Ok(user)
    }
}

/// Middleware that rejects unauthenticated requests and hands the resolved
/// [`User`] to handlers as a request extension.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = Credentials::from_headers(request.headers());
    let user = state.auth.authenticate(&credentials).await?;
    debug!(user = %user.name, path = %request.uri().path(), "request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
