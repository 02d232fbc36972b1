use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SyncError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("store {0} not found")]
    StoreNotFound(i64),

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{vendor} API error: {message}")]
    VendorApi { vendor: &'static str, message: String },

    #[error("{0} rate limited")]
    RateLimited(&'static str),

    #[error("{vendor} rate limit exhausted after {attempts} attempts")]
    RateLimitExhausted { vendor: &'static str, attempts: usize },

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl SyncError {
    pub fn vendor(vendor: &'static str, message: impl Into<String>) -> Self {
        Self::VendorApi {
            vendor,
            message: message.into(),
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for SyncError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => SyncError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                SyncError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => SyncError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => SyncError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            SyncError::StoreNotFound(id) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "STORE_NOT_FOUND".to_string(),
                    message: format!("store {id} does not exist"),
                },
            ),
            SyncError::InvalidDateRange(ref reason) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "INVALID_DATE_RANGE".to_string(),
                    message: reason.clone(),
                },
            ),
            SyncError::InvalidParameter(ref reason) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "INVALID_PARAMETER".to_string(),
                    message: reason.clone(),
                },
            ),
            SyncError::Database(_) | SyncError::Scheduler(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                },
            ),
            SyncError::Oauth2Token(_) | SyncError::Oauth2Server { .. } => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Vendor authentication error.".to_string(),
                },
            ),
            SyncError::VendorApi { vendor, ref message } => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "VENDOR_ERROR".to_string(),
                    message: format!("{vendor}: {message}"),
                },
            ),
            SyncError::RateLimited(vendor) | SyncError::RateLimitExhausted { vendor, .. } => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "RATE_LIMIT".to_string(),
                    message: format!("{vendor} rate limit exceeded."),
                },
            ),
            SyncError::Reqwest(_) | SyncError::UrlParse(_) | SyncError::Json(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Upstream service is unavailable.".to_string(),
                },
            ),
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
