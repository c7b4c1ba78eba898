//! Session gating for the admin panel.
//!
//! The auth provider owns the session; this module only observes it.
//!
//! - [`AuthProvider`] - contract consumed from the external auth collaborator
//! - [`SessionGuard`] - fail-closed session check, change subscription and the
//!   mount policy that sends the shell to the login surface
//! - [`LoginForm`] - the sign-in form

mod guard;
mod login;

pub use guard::{GuardState, MountedSession, SessionGuard, Subscription};
pub use login::{LoginError, LoginForm};

use std::future::Future;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::broadcast;
use uuid::Uuid;

use shelfdesk_core::{Credentials, Email};

use crate::error::AuthError;

/// Whether an authenticated session currently exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPresence {
    /// A session exists.
    Present,
    /// No session, or the session could not be confirmed.
    Absent,
}

impl SessionPresence {
    /// Presence implied by an optional session.
    #[must_use]
    pub const fn of(session: Option<&Session>) -> Self {
        if session.is_some() {
            Self::Present
        } else {
            Self::Absent
        }
    }
}

/// What caused a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// A user signed in (here or in another tab).
    SignedIn,
    /// The user signed out (here or in another tab).
    SignedOut,
    /// The access token was renewed; the session is unchanged.
    TokenRefreshed,
    /// The session ran out or was revoked server-side.
    Expired,
}

/// A session transition reported by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEvent {
    /// Cause of the transition.
    pub kind: SessionEventKind,
    /// Presence after the transition.
    pub presence: SessionPresence,
}

impl SessionEvent {
    /// Event for a successful sign-in.
    #[must_use]
    pub const fn signed_in() -> Self {
        Self {
            kind: SessionEventKind::SignedIn,
            presence: SessionPresence::Present,
        }
    }

    /// Event for a sign-out.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            kind: SessionEventKind::SignedOut,
            presence: SessionPresence::Absent,
        }
    }

    /// Event for a session that expired or was revoked.
    #[must_use]
    pub const fn expired() -> Self {
        Self {
            kind: SessionEventKind::Expired,
            presence: SessionPresence::Absent,
        }
    }
}

/// An authenticated session as issued by the auth provider.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone)]
pub struct Session {
    /// Bearer token for table-store requests.
    pub access_token: SecretString,
    /// Token used to renew the access token, if the provider issued one.
    pub refresh_token: Option<SecretString>,
    /// Provider-side user identity.
    pub user_id: Uuid,
    /// Email the user signed in with.
    pub email: Option<Email>,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Contract consumed from the external auth collaborator.
///
/// The provider is the only owner of the session and its storage. Every
/// transition it observes, including ones caused by another tab or process,
/// must be published on [`AuthProvider::session_events`] in the order they
/// happened.
pub trait AuthProvider: Send + Sync + 'static {
    /// The current session, if any.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send;

    /// A fresh receiver for session transitions.
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;

    /// Sign in with email and password.
    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// End the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}
