//! In-memory collaborators for tests.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for other crates in the workspace.
//!
//! - [`InMemoryTables`] - a [`TableStore`] over JSON rows
//! - [`InMemoryAuth`] - an [`AuthProvider`] with a single password account
//! - [`RecordingNavigator`] - a [`Navigator`] that remembers every intent
//!
//! The fakes count calls, fail operations on demand, and can hold a call
//! open until the test releases it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use shelfdesk_core::{Credentials, Email, ProductFields, ProductId};

use crate::auth::{AuthProvider, Session, SessionEvent, SessionPresence};
use crate::catalog::TableStore;
use crate::error::{AuthError, RemoteError};
use crate::navigation::{NavigationIntent, Navigator};

// =============================================================================
// Tables
// =============================================================================

/// Table-store operation, used to count, fail and hold calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableOp {
    SelectAll,
    SelectOne,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct TablesState {
    rows: BTreeMap<String, Vec<Value>>,
    next_id: i64,
    calls: HashMap<TableOp, usize>,
    failures: HashMap<TableOp, VecDeque<RemoteError>>,
    gates: HashMap<TableOp, Arc<Gate>>,
}

/// Table store keeping rows in memory. Ids are assigned from 1 upwards.
#[derive(Default)]
pub struct InMemoryTables {
    state: Mutex<TablesState>,
}

impl InMemoryTables {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row server-side without counting a call. Returns its id.
    pub fn seed(&self, collection: &str, fields: &ProductFields) -> ProductId {
        let record = serde_json::to_value(fields).unwrap_or(Value::Null);
        let mut state = self.state.lock();
        let id = assign_id(&mut state, record, collection);
        ProductId::new(id)
    }

    /// Remove a row server-side without counting a call.
    pub fn remove_row(&self, collection: &str, id: ProductId) {
        if let Some(rows) = self.state.lock().rows.get_mut(collection) {
            rows.retain(|row| !has_id(row, id));
        }
    }

    /// Current rows of `collection`.
    #[must_use]
    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .rows
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of calls made for `op`.
    #[must_use]
    pub fn calls(&self, op: TableOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Make the next call for `op` fail with `err`. Failures queue up.
    pub fn fail_next(&self, op: TableOp, err: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Hold the next call for `op` open until [`InMemoryTables::release`].
    pub fn hold(&self, op: TableOp) {
        self.state.lock().gates.insert(op, Arc::new(Gate::default()));
    }

    /// Wait until a held call for `op` has started.
    pub async fn entered(&self, op: TableOp) {
        let gate = self.state.lock().gates.get(&op).cloned();
        if let Some(gate) = gate {
            gate.entered.notified().await;
        }
    }

    /// Let a held call for `op` continue.
    pub fn release(&self, op: TableOp) {
        if let Some(gate) = self.state.lock().gates.remove(&op) {
            gate.release.notify_one();
        }
    }

    /// Count the call, wait at the gate if one is set, then report any queued
    /// failure.
    async fn enter(&self, op: TableOp) -> Result<(), RemoteError> {
        let gate = {
            let mut state = self.state.lock();
            *state.calls.entry(op).or_default() += 1;
            state.gates.get(&op).cloned()
        };

        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let failure = self
            .state
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        failure.map_or(Ok(()), Err)
    }
}

fn has_id(row: &Value, id: ProductId) -> bool {
    row.get("id").and_then(Value::as_i64) == Some(id.as_i64())
}

fn assign_id(state: &mut TablesState, mut record: Value, collection: &str) -> i64 {
    state.next_id += 1;
    let id = state.next_id;
    if let Value::Object(map) = &mut record {
        map.insert("id".to_string(), Value::from(id));
    }
    state
        .rows
        .entry(collection.to_string())
        .or_default()
        .push(record);
    id
}

impl TableStore for InMemoryTables {
    // Rows are read when the call starts, so a held read returns what the
    // table looked like before any writes made while it waited.
    async fn select_all(&self, collection: &str) -> Result<Vec<Value>, RemoteError> {
        let rows = self.rows(collection);
        self.enter(TableOp::SelectAll).await?;
        Ok(rows)
    }

    async fn select_one(&self, collection: &str, id: ProductId) -> Result<Value, RemoteError> {
        self.enter(TableOp::SelectOne).await?;
        self.rows(collection)
            .into_iter()
            .find(|row| has_id(row, id))
            .ok_or(RemoteError::NotFound)
    }

    async fn insert(&self, collection: &str, fields: &Value) -> Result<Value, RemoteError> {
        self.enter(TableOp::Insert).await?;
        if !fields.is_object() {
            return Err(RemoteError::Rejected("expected an object".to_string()));
        }
        let mut state = self.state.lock();
        let id = assign_id(&mut state, fields.clone(), collection);
        state
            .rows
            .get(collection)
            .and_then(|rows| rows.iter().find(|row| has_id(row, ProductId::new(id))))
            .cloned()
            .ok_or_else(|| RemoteError::Malformed("inserted row missing".to_string()))
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: ProductId,
        fields: &Value,
    ) -> Result<(), RemoteError> {
        self.enter(TableOp::Update).await?;
        let Value::Object(changes) = fields else {
            return Err(RemoteError::Rejected("expected an object".to_string()));
        };
        let mut state = self.state.lock();
        let row = state
            .rows
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
            .ok_or(RemoteError::NotFound)?;
        if let Value::Object(map) = row {
            for (key, value) in changes {
                if key != "id" {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, collection: &str, id: ProductId) -> Result<(), RemoteError> {
        self.enter(TableOp::Delete).await?;
        let mut state = self.state.lock();
        let rows = state
            .rows
            .get_mut(collection)
            .ok_or(RemoteError::NotFound)?;
        let before = rows.len();
        rows.retain(|row| !has_id(row, id));
        if rows.len() == before {
            Err(RemoteError::NotFound)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

const INVALID_CREDENTIALS: &str = "Invalid login credentials";
const TEST_EMAIL: &str = "admin@example.com";

#[derive(Default)]
struct AuthState {
    session: Option<Session>,
    password: Option<String>,
    fail_session_checks: bool,
    fail_sign_out: bool,
    session_checks: usize,
    sign_in_calls: usize,
    sign_out_calls: usize,
}

/// Auth provider with one account and an in-memory session.
///
/// Without [`InMemoryAuth::set_password`] any non-empty password is
/// accepted.
pub struct InMemoryAuth {
    state: Mutex<AuthState>,
    events: broadcast::Sender<SessionEvent>,
}

impl InMemoryAuth {
    /// Provider with no session.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::with_event_capacity(16)
    }

    /// Provider with an active session.
    #[must_use]
    pub fn signed_in() -> Self {
        let auth = Self::signed_out();
        auth.state.lock().session = Some(test_session());
        auth
    }

    /// Provider with no session whose event buffer holds `capacity` events.
    #[must_use]
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Mutex::new(AuthState::default()),
            events,
        }
    }

    /// Only accept `password` from now on.
    pub fn set_password(&self, password: &str) {
        self.state.lock().password = Some(password.to_string());
    }

    /// Make session checks fail (or succeed again).
    pub fn fail_session_checks(&self, fail: bool) {
        self.state.lock().fail_session_checks = fail;
    }

    /// Make sign-out fail (or succeed again).
    pub fn fail_sign_out(&self, fail: bool) {
        self.state.lock().fail_sign_out = fail;
    }

    /// Report a transition as if it happened elsewhere (another tab, token
    /// expiry). The stored session follows the event's presence.
    pub fn emit(&self, event: SessionEvent) {
        {
            let mut state = self.state.lock();
            match event.presence {
                SessionPresence::Present => {
                    if state.session.is_none() {
                        state.session = Some(test_session());
                    }
                }
                SessionPresence::Absent => state.session = None,
            }
        }
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Whether a session currently exists.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// Number of `current_session` calls.
    #[must_use]
    pub fn session_checks(&self) -> usize {
        self.state.lock().session_checks
    }

    /// Number of `sign_in` calls.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.state.lock().sign_in_calls
    }

    /// Number of `sign_out` calls.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.state.lock().sign_out_calls
    }
}

fn test_session() -> Session {
    Session {
        access_token: SecretString::from(Uuid::new_v4().to_string()),
        refresh_token: None,
        user_id: Uuid::new_v4(),
        email: Email::parse(TEST_EMAIL).ok(),
        expires_at: Utc::now() + TimeDelta::hours(1),
    }
}

impl AuthProvider for InMemoryAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let mut state = self.state.lock();
        state.session_checks += 1;
        if state.fail_session_checks {
            return Err(AuthError::Unavailable("session lookup failed".to_string()));
        }
        Ok(state.session.clone())
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let session = {
            let mut state = self.state.lock();
            state.sign_in_calls += 1;
            let accepted = state.password.as_deref().map_or_else(
                || !credentials.expose_password().is_empty(),
                |expected| expected == credentials.expose_password(),
            );
            if !accepted {
                return Err(AuthError::InvalidCredentials(INVALID_CREDENTIALS.to_string()));
            }
            let mut session = test_session();
            session.email = Some(credentials.email().clone());
            state.session = Some(session.clone());
            session
        };
        let _ = self.events.send(SessionEvent::signed_in());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        {
            let mut state = self.state.lock();
            state.sign_out_calls += 1;
            if state.fail_sign_out {
                return Err(AuthError::Unavailable("sign-out failed".to_string()));
            }
            state.session = None;
        }
        let _ = self.events.send(SessionEvent::signed_out());
        Ok(())
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Navigator that records intents instead of routing.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    intents: Arc<Mutex<Vec<NavigationIntent>>>,
}

impl RecordingNavigator {
    /// Navigator with no recorded intents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every intent received, in order.
    #[must_use]
    pub fn intents(&self) -> Vec<NavigationIntent> {
        self.intents.lock().clone()
    }

    /// How many times `intent` was received.
    #[must_use]
    pub fn count(&self, intent: NavigationIntent) -> usize {
        self.intents.lock().iter().filter(|i| **i == intent).count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, intent: NavigationIntent) {
        self.intents.lock().push(intent);
    }
}
