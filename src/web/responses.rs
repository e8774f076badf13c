//! Response envelopes shared by every JSON endpoint

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::API_EPOCH;

/// Shared cache policy for resolved status responses
pub const STATUS_CACHE_CONTROL: &str = "max-age=0, s-maxage=90, stale-while-revalidate=180";

/// `{ error, result, serverVersion }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEnvelope<T: Serialize> {
    pub error: bool,
    pub result: Option<T>,
    pub server_version: u32,
}

impl<T: Serialize> StatusEnvelope<T> {
    pub fn ok(result: T) -> Self {
        Self {
            error: false,
            result: Some(result),
            server_version: API_EPOCH,
        }
    }

    pub fn ok_or_null(result: Option<T>) -> Self {
        Self {
            error: false,
            result,
            server_version: API_EPOCH,
        }
    }

    pub fn failed() -> Self {
        Self {
            error: true,
            result: None,
            server_version: API_EPOCH,
        }
    }

    /// Render with `status`, optionally attaching the shared cache policy
    pub fn into_response_with(self, status: StatusCode, cacheable: bool) -> Response {
        let mut response = (status, Json(self)).into_response();
        if cacheable {
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(STATUS_CACHE_CONTROL),
            );
        }
        response
    }
}
