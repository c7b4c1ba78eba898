//! Integration tests for the product catalog cache.
//!
//! Run with: cargo test -p shelfdesk-integration-tests --test admin_catalog

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::Value;

use shelfdesk_admin::catalog::{DeletePolicy, ProductStore};
use shelfdesk_admin::testing::TableOp;
use shelfdesk_admin::{FetchError, RemoteError, WriteError};
use shelfdesk_core::ProductId;
use shelfdesk_integration_tests::{PRODUCTS, loaded_store, product, sample_catalog, seeded_tables};

fn names(products: &[shelfdesk_core::Product]) -> Vec<&str> {
    products.iter().map(shelfdesk_core::Product::name).collect()
}

// ============================================================================
// Load & Filter Tests
// ============================================================================

#[tokio::test]
async fn test_empty_search_returns_everything_in_server_order() {
    let (_tables, _ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;

    let all = store.filtered("");

    assert_eq!(all, store.products());
    assert_eq!(
        names(&all),
        vec!["Desk Lamp", "Oak Shelf", "Lamp Shade", "Notebook"]
    );
}

#[tokio::test]
async fn test_search_matches_name_or_category_ignoring_case() {
    let (_tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;

    assert_eq!(names(&store.filtered("LAMP")), vec!["Desk Lamp", "Lamp Shade"]);
    assert_eq!(names(&store.filtered("furn")), vec!["Oak Shelf"]);

    // Every product is found by its own category
    for product in store.products() {
        if let Some(category) = &product.fields.category {
            assert!(store.filtered(category).iter().any(|p| p.id == product.id));
        }
    }

    // No category never matches a category search
    let notebook = ids[3];
    assert!(!store.filtered("lighting").iter().any(|p| p.id == notebook));
}

#[tokio::test]
async fn test_concurrent_loads_share_one_read() {
    let (tables, _ids) = seeded_tables(&sample_catalog());
    let store = ProductStore::new(Arc::clone(&tables), PRODUCTS, DeletePolicy::KeepRemoved);
    tables.hold(TableOp::SelectAll);

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.load_all().await }
    });
    tables.entered(TableOp::SelectAll).await;
    assert!(store.snapshot().loading);

    let second = tokio::spawn({
        let store = store.clone();
        async move { store.load_all().await }
    });
    tokio::task::yield_now().await;
    tables.release(TableOp::SelectAll);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(tables.calls(TableOp::SelectAll), 1);
    assert_eq!(store.products().len(), 4);
    assert!(!store.snapshot().loading);
}

#[tokio::test]
async fn test_failed_load_suppresses_list_until_retry() {
    let (tables, _ids) = seeded_tables(&sample_catalog());
    let store = ProductStore::new(Arc::clone(&tables), PRODUCTS, DeletePolicy::KeepRemoved);
    tables.fail_next(
        TableOp::SelectAll,
        RemoteError::Unavailable("connection reset".to_string()),
    );

    let err = store.load_all().await.unwrap_err();
    assert_eq!(err, FetchError::Unavailable("connection reset".to_string()));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.error, Some(err));
    assert!(snapshot.visible("").is_empty());

    store.load_all().await.unwrap();
    let snapshot = store.snapshot();
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.visible("").len(), 4);
}

// ============================================================================
// Mutation Tests
// ============================================================================

#[tokio::test]
async fn test_create_then_reload_has_no_duplicate() {
    let (tables, _ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;

    let created = store
        .create(product("Floor Lamp", "120.00", Some("Lighting"), 1))
        .await
        .unwrap();
    assert!(store.get(created.id).is_some());

    store.load_all().await.unwrap();

    let matching = store
        .products()
        .into_iter()
        .filter(|p| p.id == created.id)
        .count();
    assert_eq!(matching, 1);
    assert_eq!(store.products().len(), 5);
    assert_eq!(tables.rows(PRODUCTS).len(), 5);
}

#[tokio::test]
async fn test_mutations_before_first_load_are_refused() {
    let (tables, ids) = seeded_tables(&sample_catalog());
    let store = ProductStore::new(Arc::clone(&tables), PRODUCTS, DeletePolicy::KeepRemoved);

    let err = store
        .create(product("Widget", "1.00", None, 1))
        .await
        .unwrap_err();
    assert_eq!(err, WriteError::NotLoaded);
    assert_eq!(store.delete(ids[0]).await.unwrap_err(), WriteError::NotLoaded);
    assert_eq!(tables.calls(TableOp::Insert), 0);
    assert_eq!(tables.calls(TableOp::Delete), 0);
}

#[tokio::test]
async fn test_delete_removes_before_remote_call_returns() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let target = ids[1];
    tables.hold(TableOp::Delete);

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.delete(target).await }
    });
    tables.entered(TableOp::Delete).await;

    assert!(store.get(target).is_none());
    assert!(!store.filtered("").iter().any(|p| p.id == target));
    assert!(store.is_in_flight(target));

    tables.release(TableOp::Delete);
    pending.await.unwrap().unwrap();

    assert!(!store.is_in_flight(target));
    assert_eq!(tables.rows(PRODUCTS).len(), 3);
}

#[tokio::test]
async fn test_second_mutation_for_same_product_is_busy() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let target = ids[0];
    tables.hold(TableOp::Delete);

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.delete(target).await }
    });
    tables.entered(TableOp::Delete).await;

    let err = store
        .update(target, product("Desk Lamp", "20.00", Some("Lighting"), 7))
        .await
        .unwrap_err();
    assert_eq!(err, WriteError::Busy(target));
    assert!(err.is_retryable());
    assert_eq!(tables.calls(TableOp::Update), 0);

    // Other products are not blocked
    store
        .update(ids[2], product("Lamp Shade", "14.00", Some("Lighting"), 3))
        .await
        .unwrap();

    tables.release(TableOp::Delete);
    pending.await.unwrap().unwrap();
    assert_eq!(tables.calls(TableOp::Delete), 1);
}

#[tokio::test]
async fn test_failed_delete_follows_policy() {
    let (tables, ids, kept) = loaded_store(DeletePolicy::KeepRemoved).await;
    tables.fail_next(TableOp::Delete, RemoteError::Unavailable("timeout".to_string()));
    let err = kept.delete(ids[1]).await.unwrap_err();
    assert_eq!(err, WriteError::Unavailable("timeout".to_string()));
    assert!(kept.get(ids[1]).is_none());

    let (tables, ids, restored) = loaded_store(DeletePolicy::Restore).await;
    let before = restored.products();
    tables.fail_next(TableOp::Delete, RemoteError::Unavailable("timeout".to_string()));
    restored.delete(ids[1]).await.unwrap_err();
    assert_eq!(restored.products(), before);
}

#[tokio::test]
async fn test_delete_of_vanished_product_succeeds() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    tables.remove_row(PRODUCTS, ids[3]);

    store.delete(ids[3]).await.unwrap();

    assert!(store.get(ids[3]).is_none());
}

#[tokio::test]
async fn test_update_of_vanished_product_drops_it() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    tables.remove_row(PRODUCTS, ids[0]);

    let err = store
        .update(ids[0], product("Desk Lamp", "19.00", Some("Lighting"), 7))
        .await
        .unwrap_err();

    assert_eq!(err, WriteError::NotFound);
    assert!(store.get(ids[0]).is_none());
}

#[tokio::test]
async fn test_update_applies_only_after_server_confirms() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let target = ids[1];
    tables.fail_next(
        TableOp::Update,
        RemoteError::Rejected("stock exceeds warehouse capacity".to_string()),
    );

    let err = store
        .update(target, product("Oak Shelf", "89.50", Some("Furniture"), 9999))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WriteError::Validation("stock exceeds warehouse capacity".to_string())
    );
    assert_eq!(store.get(target).unwrap().fields.stock.units(), 2);

    store
        .update(target, product("Oak Shelf", "79.50", Some("Furniture"), 5))
        .await
        .unwrap();
    assert_eq!(store.get(target).unwrap().fields.stock.units(), 5);

    let row = tables
        .rows(PRODUCTS)
        .into_iter()
        .find(|row| row.get("id").and_then(Value::as_i64) == Some(target.as_i64()))
        .unwrap();
    assert_eq!(row.get("stock").and_then(Value::as_u64), Some(5));
}

#[tokio::test]
async fn test_unmounted_store_ignores_late_results() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let before = store.products();
    tables.hold(TableOp::Update);

    let pending = tokio::spawn({
        let store = store.clone();
        let id: ProductId = ids[0];
        async move {
            store
                .update(id, product("Renamed", "1.00", None, 1))
                .await
        }
    });
    tables.entered(TableOp::Update).await;
    store.unmount();
    tables.release(TableOp::Update);

    pending.await.unwrap().unwrap();
    assert_eq!(store.products(), before);
}
