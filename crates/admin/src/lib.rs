//! Shelfdesk Admin library.
//!
//! The client-side state layer of the Shelfdesk admin panel. A rendering
//! shell (browser UI, CLI) composes three components and re-renders on
//! their snapshots:
//!
//! - [`auth::SessionGuard`] - gates every view behind a session and sends
//!   the shell to login when the session goes away, here or elsewhere
//! - [`catalog::ProductStore`] - read-through cache of the product
//!   collection with guarded create, update and delete
//! - [`form::ProductForm`] - validate-then-submit lifecycle of one product
//!   draft
//!
//! The auth provider and the table store are external collaborators behind
//! the [`auth::AuthProvider`] and [`catalog::TableStore`] traits.
//! [`remote`] implements both over HTTP for the hosted backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod form;
pub mod navigation;
pub mod remote;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::AdminConfig;
pub use error::{AuthError, FetchError, RemoteError, WriteError};
pub use navigation::{NavigationIntent, Navigator};
