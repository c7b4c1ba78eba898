//! Core types for Shelfdesk.
//!
//! This module provides type-safe wrappers for catalog domain concepts.

pub mod credential;
pub mod email;
pub mod id;
pub mod price;
pub mod product;
pub mod stock;

pub use credential::Credentials;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Product, ProductFields};
pub use stock::{Stock, StockError};
