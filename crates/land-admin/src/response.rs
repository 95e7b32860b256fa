// SPDX-License-Identifier: Apache-2.0
//! The `{ success, result | error }` envelope every admin endpoint replies
//! with.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// A uniform success/failure envelope wrapping every admin response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful result, replying with `200 OK`.
    pub fn ok(result: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                result: Some(result),
                error: None,
            }),
        )
            .into_response()
    }
}

/// Reply with a failure envelope at the given status code.
pub fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            result: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}
