//! Errors surfaced by CLI commands.

use thiserror::Error;

use shelfdesk_admin::auth::LoginError;
use shelfdesk_admin::config::ConfigError;
use shelfdesk_admin::form::SubmitError;
use shelfdesk_admin::{AuthError, FetchError, RemoteError, WriteError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Sign-in failed.
    #[error("Sign-in failed: {0}")]
    Login(#[from] LoginError),

    /// The session was not confirmed after sign-in.
    #[error("Session could not be established")]
    NoSession,

    /// Sign-out failed.
    #[error("Sign-out failed: {0}")]
    Auth(#[from] AuthError),

    /// Products could not be read.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A change could not be written.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// The product form refused or failed the submission.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The backend adapter could not be set up.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Writing output failed.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}
