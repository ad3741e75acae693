//! HTTP Basic authentication for the mutation API.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use depot_core::config::ApiConfig;
use subtle::ConstantTimeEq;

/// Challenge sent with every `401` response.
pub const CHALLENGE: &str = "Basic realm=\"depot\"";

/// Credentials parsed from an `Authorization: Basic` header.
#[derive(PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Parse an `Authorization` header value. The scheme is case-insensitive.
pub fn parse_basic(value: &str) -> Option<BasicCredentials> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Check credentials against the configured pair without short-circuiting.
pub fn credentials_match(credentials: &BasicCredentials, config: &ApiConfig) -> bool {
    let user = credentials
        .username
        .as_bytes()
        .ct_eq(config.username.as_bytes());
    let pass = credentials
        .password
        .as_bytes()
        .ct_eq(config.password.as_bytes());
    (user & pass).into()
}

/// Reject requests that do not carry the configured Basic credentials.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic);

    match credentials {
        Some(credentials) if credentials_match(&credentials, &state.config.api) => {
            Ok(next.run(req).await)
        }
        Some(credentials) => {
            tracing::warn!(username = %credentials.username, "rejected API credentials");
            Err(ApiError::Unauthorized("invalid credentials".to_string()))
        }
        None => Err(ApiError::Unauthorized(
            "authentication required".to_string(),
        )),
    }
}
