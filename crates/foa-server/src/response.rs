//! Response envelopes shared by every endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use foa_sync::ReadOutcome;
use foa_types::{Page, Pagination};
use serde::Serialize;

pub const SYNCING_MESSAGE: &str = "Chain is syncing. Please wait for a while and try again. \
     Or add 'force=true' to request to get partial data.";

/// `{"result": …}` with status 200.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub result: T,
}

impl<T> Success<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `{"result": [...], "start", "limit", "total"}` with status 200.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub result: Vec<T>,
    pub start: usize,
    pub limit: usize,
    pub total: usize,
}

impl<T> Paginated<T> {
    pub fn new(page: Page<T>, pagination: &Pagination) -> Self {
        Self {
            result: page.items,
            start: pagination.start,
            limit: pagination.limit,
            total: page.total,
        }
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// The chain is still syncing: status 202 with a `null` result.
#[derive(Debug, Serialize)]
pub struct Syncing {
    result: Option<()>,
    message: &'static str,
}

impl Default for Syncing {
    fn default() -> Self {
        Self {
            result: None,
            message: SYNCING_MESSAGE,
        }
    }
}

impl IntoResponse for Syncing {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, Json(self)).into_response()
    }
}

/// Paginated entries, or 202 while the chain syncs.
pub fn paginated_or_syncing<T: Serialize>(
    outcome: ReadOutcome<Page<T>>,
    pagination: &Pagination,
) -> Response {
    match outcome {
        ReadOutcome::Ready(page) => Paginated::new(page, pagination).into_response(),
        ReadOutcome::Syncing => Syncing::default().into_response(),
    }
}
