// SPDX-License-Identifier: Apache-2.0
//! Admin authentication: an API-key header, or an already-validated
//! identity the host's own middleware has attached to the request.
//!
//! `land-admin` never validates a bearer token itself — JWT validation is
//! an external collaborator — it only checks whether *something*
//! authorized this request, the same "host supplies the identity, we
//! don't mint trust" split used for guest-mode `PlayerSession` minting.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::response::fail;

const API_KEY_HEADER: &str = "x-admin-api-key";

/// An already-validated admin caller, attached to the request by the
/// host's own auth middleware (e.g. after verifying a JWT). `land-admin`
/// never constructs one itself.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    /// The caller's identity, opaque to `land-admin` (a subject claim, an
    /// operator username, whatever the host's auth layer produces).
    pub subject: String,
}

impl AdminIdentity {
    /// Wrap a caller-supplied identity string.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Admin-surface configuration: the API key accepted on the
/// [`API_KEY_HEADER`] header, if any is configured.
#[derive(Debug, Clone, Default)]
pub struct AdminAuthConfig {
    api_key: Option<String>,
}

impl AdminAuthConfig {
    /// Require `api_key` on every admin request.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }

    fn authorizes(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.api_key else {
            return false;
        };
        headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|presented| presented == expected)
    }
}

/// Reject any request that carries neither a matching API key nor a
/// pre-attached [`AdminIdentity`] extension.
pub async fn require_admin(
    State(config): State<AdminAuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let authorized =
        request.extensions().get::<AdminIdentity>().is_some() || config.authorizes(request.headers());
    if authorized {
        next.run(request).await
    } else {
        tracing::warn!("rejected unauthenticated admin request");
        fail(StatusCode::UNAUTHORIZED, "missing or invalid admin credentials")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn no_configured_key_never_authorizes_by_header() {
        let config = AdminAuthConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("whatever"));
        assert!(!config.authorizes(&headers));
    }

    #[test]
    fn matching_header_authorizes() {
        let config = AdminAuthConfig::with_api_key("secret");
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(config.authorizes(&headers));
    }

    #[test]
    fn mismatched_header_does_not_authorize() {
        let config = AdminAuthConfig::with_api_key("secret");
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("nope"));
        assert!(!config.authorizes(&headers));
    }

    #[test]
    fn missing_header_does_not_authorize() {
        let config = AdminAuthConfig::with_api_key("secret");
        assert!(!config.authorizes(&HeaderMap::new()));
    }
}
