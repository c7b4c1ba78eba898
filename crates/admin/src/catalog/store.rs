//! Read-through product cache.

use std::collections::HashSet;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use shelfdesk_core::{Product, ProductFields, ProductId};

use crate::error::{FetchError, RemoteError, WriteError};

use super::{DeletePolicy, ListSnapshot, TableStore, decode_product, filter_products};

type SharedLoad = Shared<BoxFuture<'static, Result<Vec<Product>, FetchError>>>;

/// Local copy of the product collection.
///
/// The cache is the only place the collection is mutated. It is filled by
/// [`ProductStore::load_all`] and changed afterwards only by `create`,
/// `update` and `delete`. Cloning yields another handle to the same cache.
pub struct ProductStore<T> {
    tables: Arc<T>,
    collection: Arc<str>,
    policy: DeletePolicy,
    core: Arc<StoreCore>,
}

impl<T> Clone for ProductStore<T> {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
            collection: Arc::clone(&self.collection),
            policy: self.policy,
            core: Arc::clone(&self.core),
        }
    }
}

struct StoreCore {
    state: Mutex<StoreState>,
    snapshots: watch::Sender<ListSnapshot>,
}

#[derive(Default)]
struct StoreState {
    products: Vec<Product>,
    loaded: bool,
    loading: Option<SharedLoad>,
    /// Local changes made while a load is outstanding, replayed over its
    /// result.
    journal: Vec<LocalChange>,
    error: Option<FetchError>,
    in_flight: HashSet<ProductId>,
    unmounted: bool,
}

impl StoreState {
    /// Remember a change to the cache if a load could overwrite it.
    fn record(&mut self, change: LocalChange) {
        if self.loading.is_some() {
            self.journal.push(change);
        }
    }
}

/// A cache change a concurrent load may not have seen.
#[derive(Debug, Clone)]
enum LocalChange {
    Upsert(Product),
    Remove(ProductId),
}

impl LocalChange {
    fn apply(self, products: &mut Vec<Product>) {
        match self {
            Self::Upsert(product) => {
                if let Some(existing) = products.iter_mut().find(|p| p.id == product.id) {
                    *existing = product;
                } else {
                    products.push(product);
                }
            }
            Self::Remove(id) => products.retain(|p| p.id != id),
        }
    }
}

impl StoreCore {
    fn publish(&self, state: &StoreState) {
        self.snapshots.send_replace(ListSnapshot {
            products: state.products.clone(),
            loading: state.loading.is_some(),
            error: state.error.clone(),
        });
    }
}

/// Marks a product as having a mutation outstanding until dropped.
struct InFlight {
    core: Arc<StoreCore>,
    id: ProductId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.core.state.lock().in_flight.remove(&self.id);
    }
}

impl<T: TableStore> ProductStore<T> {
    /// Create an empty, not yet loaded cache over `collection`.
    #[must_use]
    pub fn new(tables: Arc<T>, collection: impl Into<Arc<str>>, policy: DeletePolicy) -> Self {
        let (snapshots, _) = watch::channel(ListSnapshot::default());
        Self {
            tables,
            collection: collection.into(),
            policy,
            core: Arc::new(StoreCore {
                state: Mutex::new(StoreState::default()),
                snapshots,
            }),
        }
    }

    /// Collection name the cache reads and writes.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Policy applied when a remote delete fails.
    #[must_use]
    pub const fn delete_policy(&self) -> DeletePolicy {
        self.policy
    }

    /// Receiver that observes every change to the list state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ListSnapshot> {
        self.core.snapshots.subscribe()
    }

    /// Current list state.
    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        self.core.snapshots.borrow().clone()
    }

    /// Cached products in server order.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.core.state.lock().products.clone()
    }

    /// Cached product with `id`, if present.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<Product> {
        self.core
            .state
            .lock()
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Whether a full load has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.core.state.lock().loaded
    }

    /// Whether a mutation for `id` is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, id: ProductId) -> bool {
        self.core.state.lock().in_flight.contains(&id)
    }

    /// Products whose name or category contains `search`, ignoring case.
    ///
    /// Recomputed from the cache on every call; an empty search returns the
    /// whole collection in stored order.
    #[must_use]
    pub fn filtered(&self, search: &str) -> Vec<Product> {
        filter_products(&self.core.state.lock().products, search)
    }

    /// Replace the cache with the server's collection.
    ///
    /// A call made while another load is outstanding waits for that load
    /// instead of issuing a second read. The result is applied to the cache
    /// once, by whichever caller drives the shared load to completion.
    /// Creates, updates and deletes that finish while the read is
    /// outstanding are replayed over its result, so a read that started
    /// before them cannot bring back stale rows.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the read failed or returned records that are
    /// not products. The error is also kept in the list snapshot.
    pub async fn load_all(&self) -> Result<Vec<Product>, FetchError> {
        let load = {
            let mut state = self.core.state.lock();
            if let Some(load) = &state.loading {
                debug!(collection = %self.collection, "Joining outstanding product load");
                load.clone()
            } else {
                let load = self.start_load();
                state.loading = Some(load.clone());
                state.error = None;
                self.core.publish(&state);
                load
            }
        };
        load.await
    }

    fn start_load(&self) -> SharedLoad {
        let tables = Arc::clone(&self.tables);
        let collection = Arc::clone(&self.collection);
        let core = Arc::clone(&self.core);

        async move {
            let result = fetch_collection(tables.as_ref(), &collection).await;

            let mut state = core.state.lock();
            state.loading = None;
            let journal = std::mem::take(&mut state.journal);
            if state.unmounted {
                return result;
            }
            let result = match result {
                Ok(mut products) => {
                    if !journal.is_empty() {
                        debug!(collection = %collection, changes = journal.len(), "Replaying changes made during load");
                    }
                    for change in journal {
                        change.apply(&mut products);
                    }
                    info!(collection = %collection, count = products.len(), "Products loaded");
                    state.products.clone_from(&products);
                    state.loaded = true;
                    state.error = None;
                    Ok(products)
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Product load failed");
                    state.error = Some(e.clone());
                    Err(e)
                }
            };
            core.publish(&state);
            drop(state);
            result
        }
        .boxed()
        .shared()
    }

    /// Read one product straight from the table store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::NotFound` if the product does not exist, or
    /// another `FetchError` if the read failed.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn fetch_one(&self, id: ProductId) -> Result<Product, FetchError> {
        let record = self.tables.select_one(&self.collection, id).await?;
        decode_product(record)
    }

    /// Create a product.
    ///
    /// The server-returned product is appended to the cache only after the
    /// insert succeeded.
    ///
    /// # Errors
    ///
    /// Returns `WriteError::NotLoaded` before the first load, or the remote
    /// failure. The cache is unchanged on error.
    #[instrument(skip(self, fields), fields(collection = %self.collection, name = %fields.name))]
    pub async fn create(&self, fields: ProductFields) -> Result<Product, WriteError> {
        self.ensure_loaded()?;

        let record = encode_fields(&fields)?;
        let created = self.tables.insert(&self.collection, &record).await?;
        let product = decode_product(created)
            .map_err(|e| WriteError::Unavailable(format!("unreadable insert response: {e}")))?;

        let mut state = self.core.state.lock();
        if !state.unmounted {
            LocalChange::Upsert(product.clone()).apply(&mut state.products);
            state.record(LocalChange::Upsert(product.clone()));
            self.core.publish(&state);
        }
        drop(state);

        info!(id = %product.id, "Product created");
        Ok(product)
    }

    /// Replace the attributes of product `id`.
    ///
    /// Nothing changes locally until the server confirmed the write. If the
    /// product no longer exists server-side it is dropped from the cache.
    ///
    /// # Errors
    ///
    /// Returns `WriteError::Busy` if another mutation for `id` is
    /// outstanding, `WriteError::NotLoaded` before the first load, or the
    /// remote failure.
    #[instrument(skip(self, fields), fields(collection = %self.collection))]
    pub async fn update(&self, id: ProductId, fields: ProductFields) -> Result<(), WriteError> {
        let _in_flight = self.claim(id)?;

        let record = encode_fields(&fields)?;
        let result = self.tables.update_by_id(&self.collection, id, &record).await;

        let mut state = self.core.state.lock();
        match result {
            Ok(()) => {
                if !state.unmounted {
                    if let Some(existing) = state.products.iter_mut().find(|p| p.id == id) {
                        existing.fields.clone_from(&fields);
                    }
                    state.record(LocalChange::Upsert(Product::new(id, fields)));
                    self.core.publish(&state);
                }
                info!("Product updated");
                Ok(())
            }
            Err(RemoteError::NotFound) => {
                if !state.unmounted {
                    state.products.retain(|p| p.id != id);
                    state.record(LocalChange::Remove(id));
                    self.core.publish(&state);
                }
                warn!("Product vanished server-side, removed from cache");
                Err(WriteError::NotFound)
            }
            Err(e) => {
                warn!(error = %e, "Product update failed");
                Err(e.into())
            }
        }
    }

    /// Delete product `id`.
    ///
    /// The product leaves the cache before the remote call is issued. A
    /// product that is already gone server-side counts as deleted. On any
    /// other failure the [`DeletePolicy`] decides whether it comes back.
    ///
    /// # Errors
    ///
    /// Returns `WriteError::Busy` if another mutation for `id` is
    /// outstanding, `WriteError::NotLoaded` before the first load, or the
    /// remote failure.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn delete(&self, id: ProductId) -> Result<(), WriteError> {
        let _in_flight = self.claim(id)?;

        let removed = {
            let mut state = self.core.state.lock();
            if state.unmounted {
                None
            } else {
                let removed = state
                    .products
                    .iter()
                    .position(|p| p.id == id)
                    .map(|index| (index, state.products.remove(index)));
                state.record(LocalChange::Remove(id));
                self.core.publish(&state);
                removed
            }
        };

        match self.tables.delete_by_id(&self.collection, id).await {
            Ok(()) | Err(RemoteError::NotFound) => {
                info!("Product deleted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, policy = ?self.policy, "Product delete failed");
                if self.policy == DeletePolicy::Restore
                    && let Some((index, product)) = removed
                {
                    self.restore(index, product);
                }
                Err(e.into())
            }
        }
    }

    /// Stop applying results to the cache.
    ///
    /// Outstanding remote calls still run to completion; their outcome is
    /// returned to the caller but no longer changes the visible state.
    pub fn unmount(&self) {
        self.core.state.lock().unmounted = true;
        debug!(collection = %self.collection, "Product store unmounted");
    }

    fn ensure_loaded(&self) -> Result<(), WriteError> {
        if self.core.state.lock().loaded {
            Ok(())
        } else {
            Err(WriteError::NotLoaded)
        }
    }

    /// Check the mutation preconditions for `id` and mark it in flight.
    fn claim(&self, id: ProductId) -> Result<InFlight, WriteError> {
        let mut state = self.core.state.lock();
        if !state.loaded {
            return Err(WriteError::NotLoaded);
        }
        if !state.in_flight.insert(id) {
            debug!(%id, "Mutation already in flight");
            return Err(WriteError::Busy(id));
        }
        Ok(InFlight {
            core: Arc::clone(&self.core),
            id,
        })
    }

    fn restore(&self, index: usize, product: Product) {
        let mut state = self.core.state.lock();
        if state.unmounted {
            return;
        }
        // The server still has the product, so a running load may keep it
        state
            .journal
            .retain(|change| !matches!(change, LocalChange::Remove(id) if *id == product.id));
        if state.products.iter().any(|p| p.id == product.id) {
            return;
        }
        let index = index.min(state.products.len());
        state.products.insert(index, product);
        self.core.publish(&state);
    }
}

async fn fetch_collection<T: TableStore>(
    tables: &T,
    collection: &str,
) -> Result<Vec<Product>, FetchError> {
    let records = tables.select_all(collection).await?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut products = Vec::with_capacity(records.len());
    for record in records {
        let product = decode_product(record)?;
        if seen.insert(product.id) {
            products.push(product);
        } else {
            warn!(id = %product.id, "Duplicate product id in collection, keeping first");
        }
    }
    Ok(products)
}

fn encode_fields(fields: &ProductFields) -> Result<serde_json::Value, WriteError> {
    serde_json::to_value(fields).map_err(|e| WriteError::Validation(e.to_string()))
}
