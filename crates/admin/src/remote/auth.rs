//! Password auth against the backend's `/auth/v1` endpoints.
//!
//! The session lives in memory only. A process that restarts signs in again.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use shelfdesk_core::{Credentials, Email};

use crate::auth::{AuthProvider, Session, SessionEvent, SessionEventKind, SessionPresence};
use crate::config::AdminConfig;
use crate::error::{AuthError, RemoteError};

use super::{API_KEY_HEADER, check_status, endpoint, transport_error};

/// Treat the access token as expired this long before the server does.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Buffered session events per receiver before it reports lag.
const EVENT_CAPACITY: usize = 32;

/// Auth provider backed by the hosted backend.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct RestAuth {
    inner: Arc<RestAuthInner>,
}

struct RestAuthInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    /// In-memory session cache
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Request body for password sign-in.
#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Request body for token refresh.
#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Token response from the auth endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Token lifetime in seconds.
    expires_in: i64,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            user_id: self.user.id,
            email: self.user.email.as_deref().and_then(|e| Email::parse(e).ok()),
            expires_at: now + TimeDelta::seconds(self.expires_in),
        }
    }
}

impl RestAuth {
    /// Create an auth adapter with no session.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &AdminConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RestAuthInner {
                client,
                base_url: config.backend_url.clone(),
                api_key: config.api_key.clone(),
                session: RwLock::new(None),
                events,
            }),
        }
    }

    /// Bearer token of the current session.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Unauthorized` when no valid session exists.
    pub async fn access_token(&self) -> Result<SecretString, RemoteError> {
        self.current_session()
            .await
            .ok()
            .flatten()
            .map(|session| session.access_token)
            .ok_or_else(|| RemoteError::Unauthorized("not signed in".to_string()))
    }

    /// Drop the cached session after the backend rejected its token.
    pub async fn invalidate(&self) {
        if self.inner.session.write().await.take().is_some() {
            warn!("Session rejected by backend");
            self.emit(SessionEvent::expired());
        }
    }

    pub(super) fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    pub(super) fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(super) fn api_key(&self) -> &str {
        self.inner.api_key.expose_secret()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers just means nothing is mounted
        let _ = self.inner.events.send(event);
    }

    async fn request_token<B: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<Session, RemoteError> {
        let mut url = endpoint(&self.inner.base_url, "auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let now = Utc::now();
        let response = self
            .inner
            .client
            .post(url)
            .header(API_KEY_HEADER, self.api_key())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let response = check_status(response).await?;

        let token: TokenResponse = response.json().await.map_err(|e| transport_error(&e))?;
        Ok(token.into_session(now))
    }

    /// Exchange the refresh token of an expired session.
    async fn refresh(&self, expired: &Session) -> Option<Session> {
        let refresh_token = expired.refresh_token.as_ref()?;
        let body = RefreshGrant {
            refresh_token: refresh_token.expose_secret(),
        };
        match self.request_token("refresh_token", &body).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                None
            }
        }
    }
}

fn is_stale(session: &Session, now: DateTime<Utc>) -> bool {
    session.is_expired_at(now + TimeDelta::seconds(EXPIRY_LEEWAY_SECS))
}

impl AuthProvider for RestAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let cached = self.inner.session.read().await.clone();
        let Some(session) = cached else {
            return Ok(None);
        };
        if !is_stale(&session, Utc::now()) {
            return Ok(Some(session));
        }

        debug!("Access token expired, attempting refresh");
        let refreshed = self.refresh(&session).await;

        let mut slot = self.inner.session.write().await;
        // Another caller may have refreshed or signed out meanwhile
        if slot.as_ref().map(|s| s.expires_at) != Some(session.expires_at) {
            return Ok(slot.clone());
        }
        *slot = refreshed.clone();
        drop(slot);

        if refreshed.is_some() {
            self.emit(SessionEvent {
                kind: SessionEventKind::TokenRefreshed,
                presence: SessionPresence::Present,
            });
        } else {
            info!("Session expired");
            self.emit(SessionEvent::expired());
        }
        Ok(refreshed)
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let body = PasswordGrant {
            email: credentials.email().as_str(),
            password: credentials.expose_password(),
        };
        let session = self.request_token("password", &body).await.map_err(|e| {
            warn!(error = %e, "Sign-in rejected");
            AuthError::from(e)
        })?;

        *self.inner.session.write().await = Some(session.clone());
        info!(user_id = %session.user_id, "Signed in");
        self.emit(SessionEvent::signed_in());
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());

        if let Some(token) = token {
            let url = endpoint(&self.inner.base_url, "auth/v1/logout")?;
            let response = self
                .inner
                .client
                .post(url)
                .header(API_KEY_HEADER, self.api_key())
                .bearer_auth(token.expose_secret())
                .send()
                .await
                .map_err(|e| AuthError::from(transport_error(&e)))?;

            match check_status(response).await {
                // A token the backend no longer knows is as good as signed out
                Ok(_) | Err(RemoteError::NotFound | RemoteError::Unauthorized(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.inner.session.write().await.take();
        info!("Signed out");
        self.emit(SessionEvent::signed_out());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_into_session() {
        let body = r#"{
            "access_token": "eyJhbGciOiJIUzI1NiJ9.payload.sig",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r-123",
            "user": {"id": "6f1c2a8e-4b7d-4e3a-9c1f-0a2b3c4d5e6f", "email": "admin@example.com"}
        }"#;
        let token: TokenResponse = serde_json::from_str(body).unwrap();
        let now = Utc::now();

        let session = token.into_session(now);

        assert_eq!(session.expires_at, now + TimeDelta::seconds(3600));
        assert_eq!(session.email.as_ref().unwrap().as_str(), "admin@example.com");
        assert!(session.refresh_token.is_some());
        assert!(!is_stale(&session, now));
    }

    #[test]
    fn test_session_stale_within_leeway() {
        let now = Utc::now();
        let session = Session {
            access_token: SecretString::from("t".to_string()),
            refresh_token: None,
            user_id: Uuid::new_v4(),
            email: None,
            expires_at: now + TimeDelta::seconds(10),
        };
        assert!(is_stale(&session, now));
        assert!(!session.is_expired_at(now));
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session {
            access_token: SecretString::from("very-secret-token".to_string()),
            refresh_token: None,
            user_id: Uuid::new_v4(),
            email: None,
            expires_at: Utc::now(),
        };
        let debug = format!("{session:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret-token"));
    }
}
