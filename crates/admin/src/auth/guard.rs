//! Session guard and the mount policy built on it.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::AuthError;
use crate::navigation::{NavigationIntent, Navigator};

use super::{AuthProvider, SessionPresence};

/// Authentication state of one mounted view.
///
/// `Unauthenticated` is terminal: once a mounted view has lost its session it
/// stays unauthenticated until it is remounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GuardState {
    /// No session check has completed yet.
    #[default]
    Unknown,
    /// A session was confirmed.
    Authenticated,
    /// The session is gone; the shell has been sent to login.
    Unauthenticated,
}

impl GuardState {
    /// Apply an observed presence.
    ///
    /// Returns the next state and, when this observation is a transition into
    /// `Unauthenticated`, the navigation it triggers. Repeated `Absent`
    /// observations never navigate twice.
    #[must_use]
    pub const fn observe(self, presence: SessionPresence) -> (Self, Option<NavigationIntent>) {
        match (self, presence) {
            (Self::Unknown | Self::Authenticated, SessionPresence::Present) => {
                (Self::Authenticated, None)
            }
            (Self::Unknown | Self::Authenticated, SessionPresence::Absent) => {
                (Self::Unauthenticated, Some(NavigationIntent::GoToLogin))
            }
            (Self::Unauthenticated, _) => (Self::Unauthenticated, None),
        }
    }
}

/// Handle for a session change listener.
///
/// Dropping the handle unsubscribes. `unsubscribe` may be called any number
/// of times.
#[derive(Debug)]
pub struct Subscription {
    listener: Option<AbortHandle>,
}

impl Subscription {
    /// Stop delivering session changes.
    pub fn unsubscribe(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            debug!("Session listener removed");
        }
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.listener.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Observes the auth provider's session on behalf of one mounted view.
///
/// Constructed per view and passed to whatever needs it; there is no
/// process-wide session state.
pub struct SessionGuard<A> {
    auth: Arc<A>,
}

impl<A> Clone for SessionGuard<A> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<A: AuthProvider> SessionGuard<A> {
    /// Create a guard over an auth provider.
    #[must_use]
    pub const fn new(auth: Arc<A>) -> Self {
        Self { auth }
    }

    /// The underlying auth provider.
    #[must_use]
    pub const fn provider(&self) -> &Arc<A> {
        &self.auth
    }

    /// Ask the provider once whether a session exists.
    ///
    /// Fails closed: any provider error is reported as `Absent`.
    #[instrument(skip(self))]
    pub async fn check_session(&self) -> SessionPresence {
        presence_from(self.auth.current_session().await)
    }

    /// Register a listener for session transitions.
    ///
    /// Transitions are delivered in the order the provider emits them, one at
    /// a time. If the listener falls behind the provider's buffer, the
    /// provider is queried again and the current presence is delivered in
    /// place of the skipped events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(SessionPresence) + Send + Sync + 'static,
    {
        let mut events = self.auth.session_events();
        let auth = Arc::clone(&self.auth);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(kind = ?event.kind, presence = ?event.presence, "Session event");
                        on_change(event.presence);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session listener lagged, re-checking session");
                        on_change(presence_from(auth.current_session().await));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            listener: Some(task.abort_handle()),
        }
    }

    /// Sign out through the provider.
    ///
    /// The returned value only reports whether the provider accepted the
    /// request. Navigation happens when the resulting sign-out event reaches
    /// mounted views, so there is a single path for becoming unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns the provider's `AuthError` if sign-out failed.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await.inspect_err(|e| {
            warn!(error = %e, "Sign-out failed");
        })
    }

    /// Mount a view behind the guard.
    ///
    /// Subscribes first so that no transition is missed, then checks the
    /// session. If the session is absent the navigator receives
    /// `GoToLogin` before this returns. While mounted, every transition into
    /// absence navigates to login exactly once.
    pub async fn mount<N>(&self, navigator: N) -> MountedSession
    where
        N: Navigator + 'static,
    {
        let (snapshots, receiver) = watch::channel(GuardState::Unknown);
        let shared = Arc::new(Mutex::new(MountState {
            state: GuardState::Unknown,
            mounted: true,
            navigator: Arc::new(navigator),
            snapshots,
        }));

        let sink = Arc::clone(&shared);
        let subscription = self.subscribe(move |presence| MountState::apply(&sink, presence));

        let presence = self.check_session().await;
        MountState::apply(&shared, presence);

        MountedSession {
            shared,
            subscription,
            receiver,
        }
    }
}

fn presence_from(result: Result<Option<super::Session>, AuthError>) -> SessionPresence {
    match result {
        Ok(session) => SessionPresence::of(session.as_ref()),
        Err(e) => {
            warn!(error = %e, "Session check failed, treating session as absent");
            SessionPresence::Absent
        }
    }
}

struct MountState {
    state: GuardState,
    mounted: bool,
    navigator: Arc<dyn Navigator>,
    snapshots: watch::Sender<GuardState>,
}

impl MountState {
    /// Apply a presence. The transition and its snapshot happen under the
    /// lock; the navigator runs after the lock is released so it may read
    /// the mounted view. Navigation happens at most once per mount because
    /// `Unauthenticated` is terminal.
    fn apply(shared: &Mutex<Self>, presence: SessionPresence) {
        let (navigator, intent) = {
            let mut mount = shared.lock();
            if !mount.mounted {
                return;
            }

            let (next, intent) = mount.state.observe(presence);
            if next == mount.state {
                return;
            }
            info!(from = ?mount.state, to = ?next, "Session state changed");
            mount.state = next;
            mount.snapshots.send_replace(next);
            (Arc::clone(&mount.navigator), intent)
        };

        if let Some(intent) = intent {
            navigator.navigate(intent);
        }
    }
}

/// A view mounted behind the session guard.
///
/// Unmounting (explicitly or by drop) removes the session listener exactly
/// once and suppresses any later state change or navigation.
pub struct MountedSession {
    shared: Arc<Mutex<MountState>>,
    subscription: Subscription,
    receiver: watch::Receiver<GuardState>,
}

impl MountedSession {
    /// Current guard state.
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.shared.lock().state
    }

    /// Whether the view may render authenticated content.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() == GuardState::Authenticated
    }

    /// Receiver that observes every later guard state change. The current
    /// state counts as seen.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GuardState> {
        let mut receiver = self.receiver.clone();
        receiver.borrow_and_update();
        receiver
    }

    /// Tear the view down.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for MountedSession {
    fn drop(&mut self) {
        self.shared.lock().mounted = false;
        self.subscription.unsubscribe();
    }
}
