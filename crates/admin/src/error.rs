//! Error taxonomy for the admin state layer.
//!
//! Collaborator adapters report [`RemoteError`]. Each component converts it
//! into the error its callers act on:
//!
//! - [`AuthError`] - session check, sign-in and sign-out failures
//! - [`FetchError`] - collection and single-record reads
//! - [`WriteError`] - create, update and delete
//!
//! None of these are fatal. The worst outcome is a loading or error state
//! that the user clears by retrying.

use thiserror::Error;

use shelfdesk_core::ProductId;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,

    /// The server rejected the submitted values.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The session is missing or expired.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The session is valid but may not touch this record.
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// Network or service failure; the same call may succeed later.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors from the auth collaborator.
///
/// The session guard never shows these as a blocking dialog; any failure
/// while checking the session is resolved by treating it as absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Email or password were not accepted.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The provider answered with something unexpected.
    #[error("auth provider error: {0}")]
    Provider(String),

    /// The provider could not be reached.
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

impl From<RemoteError> for AuthError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(msg)
            | RemoteError::Unauthorized(msg)
            | RemoteError::Forbidden(msg) => Self::InvalidCredentials(msg),
            RemoteError::Unavailable(msg) => Self::Unavailable(msg),
            RemoteError::NotFound => Self::Provider("auth endpoint not found".to_string()),
            RemoteError::Malformed(msg) => Self::Provider(msg),
        }
    }
}

/// Errors from reading products.
///
/// `Clone` because one coalesced load hands the same result to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The requested product does not exist.
    #[error("product not found")]
    NotFound,

    /// The read failed and can be retried.
    #[error("could not load products: {0}")]
    Unavailable(String),

    /// The server returned records that do not decode as products.
    #[error("unexpected product data: {0}")]
    Malformed(String),
}

impl From<RemoteError> for FetchError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound => Self::NotFound,
            RemoteError::Malformed(msg) => Self::Malformed(msg),
            RemoteError::Rejected(msg)
            | RemoteError::Unauthorized(msg)
            | RemoteError::Forbidden(msg)
            | RemoteError::Unavailable(msg) => Self::Unavailable(msg),
        }
    }
}

/// Errors from create, update and delete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The server rejected the field values; the message is shown verbatim.
    #[error("{0}")]
    Validation(String),

    /// The product no longer exists server-side.
    #[error("product no longer exists")]
    NotFound,

    /// The backend refused the change for this session. Retrying the same
    /// call will not help.
    #[error("not permitted: {0}")]
    Denied(String),

    /// Network or service failure. Retrying is up to the user.
    #[error("service unavailable, please try again: {0}")]
    Unavailable(String),

    /// Another mutation for the same product has not finished yet.
    #[error("another change to product {0} is still in progress")]
    Busy(ProductId),

    /// A mutation was attempted before the collection was loaded.
    #[error("products have not been loaded yet")]
    NotLoaded,
}

impl WriteError {
    /// Whether re-invoking the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Busy(_))
    }
}

impl From<RemoteError> for WriteError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound => Self::NotFound,
            RemoteError::Rejected(msg) => Self::Validation(msg),
            RemoteError::Unauthorized(msg) | RemoteError::Forbidden(msg) => Self::Denied(msg),
            RemoteError::Unavailable(msg) | RemoteError::Malformed(msg) => Self::Unavailable(msg),
        }
    }
}
