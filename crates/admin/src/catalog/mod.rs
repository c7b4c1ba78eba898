//! Product catalog cache.
//!
//! - [`TableStore`] - generic CRUD contract of the remote table service
//! - [`ProductStore`] - read-through cache of the product collection with
//!   per-product mutation guards
//! - [`ListSnapshot`] - what the list view renders

mod store;

pub use store::ProductStore;

use std::future::Future;
use std::str::FromStr;

use serde_json::Value;

use shelfdesk_core::{Product, ProductId};

use crate::error::{FetchError, RemoteError};

/// CRUD contract of the remote table-store service.
///
/// Records travel as JSON objects shaped like [`Product`]: `price` is a
/// decimal-compatible number and `stock` an integer.
pub trait TableStore: Send + Sync + 'static {
    /// Every record in `collection`, in server order.
    fn select_all(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    /// The record with `id`.
    fn select_one(
        &self,
        collection: &str,
        id: ProductId,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Insert a record and return it with its server-assigned `id`.
    fn insert(
        &self,
        collection: &str,
        fields: &Value,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Replace the attributes of the record with `id`.
    fn update_by_id(
        &self,
        collection: &str,
        id: ProductId,
        fields: &Value,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Delete the record with `id`.
    fn delete_by_id(
        &self,
        collection: &str,
        id: ProductId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// What happens to an optimistically removed product when the remote delete
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeletePolicy {
    /// Leave it removed; the list stays ahead of the server until the next
    /// full load.
    #[default]
    KeepRemoved,
    /// Put it back where it was.
    Restore,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-removed" | "keep_removed" => Ok(Self::KeepRemoved),
            "restore" => Ok(Self::Restore),
            other => Err(format!(
                "unknown delete policy '{other}', expected 'keep-removed' or 'restore'"
            )),
        }
    }
}

/// Reactive state of the product list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSnapshot {
    /// Cached products in server order.
    pub products: Vec<Product>,
    /// A collection load is outstanding.
    pub loading: bool,
    /// The last load failed; rendering of the list is suppressed until a
    /// retry succeeds.
    pub error: Option<FetchError>,
}

impl ListSnapshot {
    /// Products the list view should show for `search`.
    #[must_use]
    pub fn visible(&self, search: &str) -> Vec<Product> {
        if self.error.is_some() {
            return Vec::new();
        }
        filter_products(&self.products, search)
    }
}

/// Case-insensitive substring match of `search` against name and category,
/// preserving order.
#[must_use]
pub fn filter_products(products: &[Product], search: &str) -> Vec<Product> {
    let needle = search.to_lowercase();
    products
        .iter()
        .filter(|p| p.matches_lowercase(&needle))
        .cloned()
        .collect()
}

/// Decode one table record.
pub(crate) fn decode_product(record: Value) -> Result<Product, FetchError> {
    serde_json::from_value(record).map_err(|e| FetchError::Malformed(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use shelfdesk_core::{Price, ProductFields, Stock};

    fn product(id: i64, name: &str, category: Option<&str>) -> Product {
        Product::new(
            ProductId::new(id),
            ProductFields {
                name: name.to_string(),
                description: None,
                price: Price::parse("1").unwrap(),
                category: category.map(str::to_string),
                stock: Stock::new(1),
            },
        )
    }

    #[test]
    fn test_filter_empty_keeps_order() {
        let products = vec![
            product(3, "Lamp", None),
            product(1, "Chair", Some("Furniture")),
            product(2, "Desk", Some("Furniture")),
        ];
        assert_eq!(filter_products(&products, ""), products);
    }

    #[test]
    fn test_filter_matches_name_and_category() {
        let products = vec![
            product(1, "Oak Chair", Some("Furniture")),
            product(2, "Desk Lamp", Some("Lighting")),
            product(3, "Bulb", None),
        ];

        let ids = |search: &str| -> Vec<i64> {
            filter_products(&products, search)
                .iter()
                .map(|p| p.id.as_i64())
                .collect()
        };

        assert_eq!(ids("LAMP"), vec![2]);
        assert_eq!(ids("furn"), vec![1]);
        assert_eq!(ids("l"), vec![2, 3]);
        assert!(ids("sofa").is_empty());
    }

    #[test]
    fn test_delete_policy_from_str() {
        assert_eq!("restore".parse::<DeletePolicy>(), Ok(DeletePolicy::Restore));
        assert_eq!(
            "Keep-Removed".parse::<DeletePolicy>(),
            Ok(DeletePolicy::KeepRemoved)
        );
        assert!("rollback".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn test_snapshot_hides_list_on_error() {
        let snapshot = ListSnapshot {
            products: vec![product(1, "Chair", None)],
            loading: false,
            error: Some(FetchError::Unavailable("timeout".to_string())),
        };
        assert!(snapshot.visible("").is_empty());
    }

    #[test]
    fn test_decode_product_rejects_missing_price() {
        let err = decode_product(json!({"id": 1, "name": "Chair", "stock": 2})).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
