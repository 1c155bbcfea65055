use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use foa_sync::SyncError;
use foa_types::TypeError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors raised while starting or running the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("sync engine error: {0}")]
    Sync(#[from] SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Numeric error codes carried in API error bodies.
pub mod codes {
    pub const VALIDATION: u16 = 1400;
    pub const UNAUTHORIZED: u16 = 1401;
    pub const LIMIT_EXCEEDED: u16 = 1403;
    pub const NOT_FOUND: u16 = 1404;
    pub const BIND_DATA: u16 = 1405;
    pub const PAYLOAD_TOO_LARGE: u16 = 1413;
    pub const INTERNAL: u16 = 1500;
    pub const SYNC_UNAVAILABLE: u16 = 1503;
}

/// An error answered to an API client as
/// `{"result": false, "code": <int>, "error": <message>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: u16,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    result: bool,
    code: u16,
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// The request body or query string could not be decoded.
    pub fn bind(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BIND_DATA, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let (status, code) = match &err {
            SyncError::Validation(_) => (StatusCode::BAD_REQUEST, codes::VALIDATION),
            SyncError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED),
            SyncError::LimitExceeded { .. } => (StatusCode::FORBIDDEN, codes::LIMIT_EXCEEDED),
            SyncError::NotFound(_) => (StatusCode::NOT_FOUND, codes::NOT_FOUND),
            SyncError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, codes::PAYLOAD_TOO_LARGE)
            }
            SyncError::SyncUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, codes::SYNC_UNAVAILABLE)
            }
            SyncError::Conflict(_) | SyncError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL)
            }
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<TypeError> for ApiError {
    fn from(err: TypeError) -> Self {
        SyncError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bind(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bind(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() && self.code == codes::INTERNAL {
            error!(code = self.code, error = %self.message, "request failed");
        }
        let body = ErrorBody {
            result: false,
            code: self.code,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foa_sync::NotFoundKind;

    #[test]
    fn sync_errors_map_to_http() {
        let cases = [
            (SyncError::Validation("x".into()), 400, codes::VALIDATION),
            (SyncError::Unauthorized("x".into()), 401, codes::UNAUTHORIZED),
            (
                SyncError::LimitExceeded {
                    limit: 5,
                    usage: 5,
                    cost: 1,
                },
                403,
                codes::LIMIT_EXCEEDED,
            ),
            (SyncError::NotFound(NotFoundKind::Entry), 404, codes::NOT_FOUND),
            (
                SyncError::PayloadTooLarge { size: 2, max: 1 },
                413,
                codes::PAYLOAD_TOO_LARGE,
            ),
            (SyncError::SyncUnavailable("down".into()), 503, codes::SYNC_UNAVAILABLE),
            (SyncError::Conflict("dup".into()), 500, codes::INTERNAL),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status().as_u16(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn not_found_keeps_kind_in_message() {
        let api = ApiError::from(SyncError::NotFound(NotFoundKind::Chain));
        assert_eq!(api.message(), "chain not found");
    }

    #[test]
    fn type_errors_are_validation() {
        let api = ApiError::from(TypeError::InvalidSort("up".into()));
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.code(), codes::VALIDATION);
    }
}
