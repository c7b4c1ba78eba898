//! Shelfdesk Core - Shared catalog types.
//!
//! This crate provides the domain types used by every Shelfdesk component:
//! - `admin` - Session guard, product cache and product form state
//! - `cli` - Headless shell over the admin library
//!
//! # Architecture
//!
//! The core crate contains only types and parsing rules - no I/O, no HTTP
//! clients, no async runtime. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product IDs, prices, stock levels,
//!   emails and sign-in credentials, plus the product record itself

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
