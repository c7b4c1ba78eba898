//! HTTP adapters for the hosted backend.
//!
//! The backend exposes password auth under `/auth/v1` and row-level table
//! access under `/rest/v1`. Both adapters share the status classification
//! below, so every caller sees the same [`RemoteError`] for the same failure.

mod auth;
mod tables;

pub use auth::RestAuth;
pub use tables::RestTableStore;

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::AdminConfig;
use crate::error::RemoteError;

/// Header carrying the public API key on every request.
const API_KEY_HEADER: &str = "apikey";

/// Build the shared HTTP client.
///
/// # Errors
///
/// Returns `RemoteError::Unavailable` if the TLS backend cannot be
/// initialized.
pub fn http_client(config: &AdminConfig) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!("shelfdesk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RemoteError::Unavailable(format!("failed to create HTTP client: {e}")))
}

/// Resolve `path` against the backend base URL, keeping any base path.
fn endpoint(base: &Url, path: &str) -> Result<Url, RemoteError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| RemoteError::Malformed(format!("invalid endpoint '{path}': {e}")))
}

/// Map a transport failure.
fn transport_error(err: &reqwest::Error) -> RemoteError {
    if err.is_decode() {
        RemoteError::Malformed(err.to_string())
    } else {
        RemoteError::Unavailable(err.to_string())
    }
}

/// Map a non-success status and its message.
fn status_error(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::Rejected(message)
        }
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(message),
        StatusCode::FORBIDDEN => RemoteError::Forbidden(message),
        _ => RemoteError::Unavailable(format!("HTTP {status}: {message}")),
    }
}

/// Error body shapes returned by the auth and table endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Pick the most specific message out of an error body.
fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no details".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

/// Pass successful responses through; turn everything else into a
/// `RemoteError`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, error_message(&body)))
}
