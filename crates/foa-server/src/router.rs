use axum::routing::{get, post};
use axum::{middleware, Router};
use tower::Layer;
use tower_http::compression::CompressionLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_user;
use crate::config::ServerConfig;
use crate::handler;
use crate::state::AppState;

/// Build the axum router with every FOA endpoint behind key auth.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/v1", get(handler::info))
        .route("/v1/user", get(handler::user))
        .route(
            "/v1/chains",
            get(handler::list_chains).post(handler::create_chain),
        )
        .route("/v1/chains/search", post(handler::search_chains))
        .route("/v1/chains/:chainid", get(handler::get_chain))
        .route("/v1/chains/:chainid/entries", get(handler::chain_entries))
        .route(
            "/v1/chains/:chainid/entries/search",
            post(handler::search_entries),
        )
        .route("/v1/entries", post(handler::create_entry))
        .route("/v1/entries/:entryhash", get(handler::get_entry))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user))
        .fallback(handler::not_found)
        .with_state(state);

    if config.gzip {
        router = router.layer(CompressionLayer::new());
    }
    if config.request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// Service type passed to [`axum::serve`].
pub type App = NormalizePath<Router>;

/// The router wrapped so `/v1/chains/` and `/v1/chains` hit the same route.
///
/// Path normalization has to run before routing, so it wraps the router
/// rather than being added as a router layer.
pub fn build_app(state: AppState, config: &ServerConfig) -> App {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state, config))
}
