//! Integration tests for Shelfdesk.
//!
//! The tests drive the admin state layer end to end against the in-memory
//! collaborators from `shelfdesk_admin::testing`, so they need no backend.
//!
//! ```bash
//! cargo test -p shelfdesk-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `admin_session` - session guard, mount policy and login form
//! - `admin_catalog` - product cache loading, filtering and mutations
//! - `admin_product_form` - validation and submit lifecycle

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use shelfdesk_admin::catalog::{DeletePolicy, ProductStore};
use shelfdesk_admin::testing::InMemoryTables;
use shelfdesk_core::{Price, ProductFields, ProductId, Stock};

/// Collection the fixtures seed.
pub const PRODUCTS: &str = "products";

/// Product attributes for a fixture row.
///
/// # Panics
///
/// Panics if `price` is not a valid price.
#[must_use]
pub fn product(name: &str, price: &str, category: Option<&str>, stock: u32) -> ProductFields {
    ProductFields {
        name: name.to_string(),
        description: None,
        price: Price::parse(price).expect("fixture price"),
        category: category.map(str::to_string),
        stock: Stock::new(stock),
    }
}

/// The catalog every test starts from, in server order.
#[must_use]
pub fn sample_catalog() -> Vec<ProductFields> {
    vec![
        product("Desk Lamp", "24.00", Some("Lighting"), 7),
        product("Oak Shelf", "89.50", Some("Furniture"), 2),
        product("Lamp Shade", "12.00", Some("Lighting"), 0),
        product("Notebook", "3.25", None, 120),
    ]
}

/// Seed `catalog` and return the table store with the ids it assigned.
#[must_use]
pub fn seeded_tables(catalog: &[ProductFields]) -> (Arc<InMemoryTables>, Vec<ProductId>) {
    let tables = Arc::new(InMemoryTables::new());
    let ids = catalog
        .iter()
        .map(|fields| tables.seed(PRODUCTS, fields))
        .collect();
    (tables, ids)
}

/// A store over the sample catalog whose first load has completed.
///
/// # Panics
///
/// Panics if the initial load fails.
pub async fn loaded_store(
    policy: DeletePolicy,
) -> (Arc<InMemoryTables>, Vec<ProductId>, ProductStore<InMemoryTables>) {
    let (tables, ids) = seeded_tables(&sample_catalog());
    let store = ProductStore::new(Arc::clone(&tables), PRODUCTS, policy);
    store.load_all().await.expect("initial load");
    (tables, ids, store)
}
