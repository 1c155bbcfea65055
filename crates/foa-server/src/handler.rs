use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use foa_types::{ChainId, Entry, EntryHash, User};
use serde_json::{json, Value};
use tracing::debug;

use crate::dto::{ChainView, CreateChainRequest, CreateEntryRequest, ListParams, SearchRequest};
use crate::error::ApiError;
use crate::response::{paginated_or_syncing, Paginated, Success};
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Gateway info.
pub async fn info(State(state): State<AppState>) -> Success<Value> {
    let config = state.engine.config();
    Success::new(json!({
        "name": "foa",
        "version": env!("CARGO_PKG_VERSION"),
        "sync": {
            "networkTimeoutMs": config.network_timeout.as_millis() as u64,
            "ingestPageSize": config.ingest_page_size,
            "refreshIntervalSecs": config.refresh_interval.as_secs(),
            "queueIntervalSecs": config.queue_interval.as_secs(),
        },
    }))
}

/// The calling user.
pub async fn user(Extension(user): Extension<User>) -> Success<User> {
    Success::new(user)
}

pub async fn create_chain(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Result<Json<CreateChainRequest>, JsonRejection>,
) -> ApiResult<Success<ChainView>> {
    let Json(body) = body?;
    let admitted = state
        .engine
        .admission()
        .admit_chain(&user, body.ext_ids, body.content.unwrap_or_default())
        .await?;
    debug!(chain = %admitted.record.chain_id, created = admitted.created, "chain request served");
    Ok(Success::new(admitted.record.into()))
}

pub async fn list_chains(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Paginated<ChainView>> {
    let Query(params) = params?;
    let pagination = params.pagination()?;
    let page = state
        .engine
        .query()
        .list_chains(&user, params.status()?, &pagination)?;
    Ok(Paginated::new(page.map(ChainView::from), &pagination))
}

pub async fn search_chains(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    params: Result<Query<ListParams>, QueryRejection>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Paginated<ChainView>> {
    let Query(params) = params?;
    let Json(body) = body?;
    let pagination = params.pagination()?;
    let page = state.engine.query().search_chains(
        &user,
        body.ext_ids,
        params.status()?,
        &pagination,
    )?;
    Ok(Paginated::new(page.map(ChainView::from), &pagination))
}

pub async fn get_chain(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(chain_id): Path<String>,
) -> ApiResult<Success<ChainView>> {
    let chain_id = ChainId::from_hex(&chain_id)?;
    let chain = state.engine.query().get_chain(&user, &chain_id).await?;
    Ok(Success::new(chain.into()))
}

pub async fn chain_entries(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(chain_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Response> {
    let chain_id = ChainId::from_hex(&chain_id)?;
    let Query(params) = params?;
    let pagination = params.pagination()?;
    let outcome = state
        .engine
        .query()
        .chain_entries(&user, &chain_id, params.status()?, &pagination, params.force())
        .await?;
    Ok(paginated_or_syncing(outcome, &pagination))
}

pub async fn search_entries(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(chain_id): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let chain_id = ChainId::from_hex(&chain_id)?;
    let Query(params) = params?;
    let Json(body) = body?;
    let pagination = params.pagination()?;
    let outcome = state
        .engine
        .query()
        .search_entries(
            &user,
            &chain_id,
            body.ext_ids,
            params.status()?,
            &pagination,
            params.force(),
        )
        .await?;
    Ok(paginated_or_syncing(outcome, &pagination))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    body: Result<Json<CreateEntryRequest>, JsonRejection>,
) -> ApiResult<Success<Entry>> {
    let Json(body) = body?;
    let admitted = state
        .engine
        .admission()
        .admit_entry(
            &user,
            body.chain_id,
            body.ext_ids,
            body.content.unwrap_or_default(),
        )
        .await?;
    debug!(entry = %admitted.record.entry_hash, created = admitted.created, "entry request served");
    Ok(Success::new(admitted.record))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(entry_hash): Path<String>,
) -> ApiResult<Success<Entry>> {
    let entry_hash = EntryHash::from_hex(&entry_hash)?;
    let entry = state.engine.query().get_entry(&user, &entry_hash).await?;
    Ok(Success::new(entry))
}

/// Fallback for unknown paths, in the API's error envelope.
pub async fn not_found() -> Response {
    ApiError::new(
        axum::http::StatusCode::NOT_FOUND,
        crate::error::codes::NOT_FOUND,
        "route not found",
    )
    .into_response()
}
