//! Password sign-in credentials.

use secrecy::{ExposeSecret, SecretString};

use super::email::Email;

/// Email and password pair handed to the auth provider at sign-in.
///
/// The password is held as a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Clone)]
pub struct Credentials {
    email: Email,
    password: SecretString,
}

impl Credentials {
    /// Create credentials from a parsed email and a password.
    #[must_use]
    pub const fn new(email: Email, password: SecretString) -> Self {
        Self { email, password }
    }

    /// The sign-in email.
    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// The password, exposed for the single request that needs it.
    #[must_use]
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
