//! Email and password sign-in form.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, instrument, warn};

use shelfdesk_core::{Credentials, Email, EmailError};

use crate::error::AuthError;
use crate::navigation::{NavigationIntent, Navigator};

use super::AuthProvider;

/// Why a sign-in attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    /// Email or password was left empty.
    #[error("Please fill in both fields.")]
    MissingFields,

    /// The email address is not well formed.
    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The auth provider refused or failed the sign-in.
    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// State behind the sign-in surface.
///
/// Implements `Debug` manually to redact the password.
pub struct LoginForm<A> {
    auth: Arc<A>,
    email: String,
    password: SecretString,
    error: Option<LoginError>,
    submitting: bool,
}

impl<A: AuthProvider> LoginForm<A> {
    /// Empty form bound to an auth provider.
    #[must_use]
    pub fn new(auth: Arc<A>) -> Self {
        Self {
            auth,
            email: String::new(),
            password: SecretString::from(String::new()),
            error: None,
            submitting: false,
        }
    }

    /// Replace the email text.
    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    /// Replace the password.
    pub fn set_password(&mut self, password: SecretString) {
        self.password = password;
    }

    /// Email text as typed.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Error from the last attempt, if it failed.
    #[must_use]
    pub const fn error(&self) -> Option<&LoginError> {
        self.error.as_ref()
    }

    /// Whether a sign-in request is outstanding.
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Attempt to sign in.
    ///
    /// Empty fields and malformed emails are rejected without contacting the
    /// provider. On success the navigator receives `GoToDashboard`.
    ///
    /// # Errors
    ///
    /// Returns the `LoginError` that is also kept on the form for display.
    #[instrument(skip(self, navigator), fields(email = %self.email))]
    pub async fn submit<N: Navigator + ?Sized>(&mut self, navigator: &N) -> Result<(), LoginError> {
        self.error = None;

        let result = self.attempt().await;
        match &result {
            Ok(()) => {
                info!("Signed in");
                navigator.navigate(NavigationIntent::GoToDashboard);
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.error = Some(e.clone());
            }
        }
        result
    }

    async fn attempt(&mut self) -> Result<(), LoginError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.expose_secret().is_empty() {
            return Err(LoginError::MissingFields);
        }

        let credentials = Credentials::new(Email::parse(email)?, self.password.clone());

        self.submitting = true;
        let outcome = self.auth.sign_in(&credentials).await;
        self.submitting = false;

        outcome.map(|_| ()).map_err(LoginError::from)
    }
}

impl<A> std::fmt::Debug for LoginForm<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("error", &self.error)
            .field("submitting", &self.submitting)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryAuth, RecordingNavigator};

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn test_empty_fields_skip_provider() {
        let auth = Arc::new(InMemoryAuth::signed_out());
        let navigator = RecordingNavigator::new();
        let mut form = LoginForm::new(Arc::clone(&auth));
        form.set_email("admin@example.com");

        let err = form.submit(&navigator).await.unwrap_err();

        assert_eq!(err, LoginError::MissingFields);
        assert_eq!(err.to_string(), "Please fill in both fields.");
        assert_eq!(auth.sign_in_calls(), 0);
        assert!(navigator.intents().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_email_skips_provider() {
        let auth = Arc::new(InMemoryAuth::signed_out());
        let mut form = LoginForm::new(Arc::clone(&auth));
        form.set_email("not-an-email");
        form.set_password(secret("hunter22"));

        let err = form.submit(&RecordingNavigator::new()).await.unwrap_err();

        assert!(matches!(err, LoginError::InvalidEmail(_)));
        assert_eq!(auth.sign_in_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_goes_to_dashboard() {
        let auth = Arc::new(InMemoryAuth::signed_out());
        auth.set_password("correct horse");
        let navigator = RecordingNavigator::new();
        let mut form = LoginForm::new(Arc::clone(&auth));
        form.set_email("admin@example.com");
        form.set_password(secret("correct horse"));

        form.submit(&navigator).await.unwrap();

        assert!(form.error().is_none());
        assert_eq!(navigator.intents(), vec![NavigationIntent::GoToDashboard]);
        assert_eq!(auth.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_credentials_expose_message() {
        let auth = Arc::new(InMemoryAuth::signed_out());
        auth.set_password("correct horse");
        let navigator = RecordingNavigator::new();
        let mut form = LoginForm::new(Arc::clone(&auth));
        form.set_email("admin@example.com");
        form.set_password(secret("wrong"));

        let err = form.submit(&navigator).await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(form.error(), Some(&err));
        assert!(navigator.intents().is_empty());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut form = LoginForm::new(Arc::new(InMemoryAuth::signed_out()));
        form.set_password(secret("super-secret"));
        let debug = format!("{form:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }
}
