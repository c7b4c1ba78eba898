//! Create/edit form state machine.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use shelfdesk_core::ProductId;

use crate::catalog::{ProductStore, TableStore};
use crate::error::{FetchError, WriteError};
use crate::navigation::{NavigationIntent, Navigator};

use super::fields::{Draft, FieldErrors, FieldName, validate};

/// Whether the form creates a new product or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormMode {
    #[default]
    Create,
    Edit(ProductId),
}

/// Where the form is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormPhase {
    /// Fetching the product being edited.
    #[default]
    Loading,
    /// The product could not be fetched; `open` must be retried.
    LoadFailed,
    /// Accepting input.
    Editing,
    /// Checking fields before submission.
    Validating,
    /// A create or update is outstanding.
    Submitting,
    /// The write succeeded and the shell was sent back to the list.
    Succeeded,
    /// The write failed; the draft is intact.
    Failed,
}

/// Why a submission did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Some fields are invalid. Nothing was sent.
    #[error("Please correct the highlighted fields.")]
    Invalid(FieldErrors),

    /// A submission from this form is still outstanding.
    #[error("already submitting")]
    AlreadySubmitting,

    /// The form has no usable draft (still loading, load failed, or already
    /// submitted successfully).
    #[error("form is not ready for submission")]
    NotReady,

    /// The store rejected or failed the write.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Reactive state of the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    pub mode: FormMode,
    pub draft: Draft,
    pub errors: FieldErrors,
    pub phase: FormPhase,
    pub submit_error: Option<SubmitError>,
    pub load_error: Option<FetchError>,
}

/// Drives one product's draft from open to successful submission.
///
/// The draft never touches the product store until it is submitted. Cloning
/// yields another handle to the same form.
pub struct ProductForm<T> {
    store: ProductStore<T>,
    core: Arc<FormCore>,
}

impl<T> Clone for ProductForm<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            core: Arc::clone(&self.core),
        }
    }
}

struct FormCore {
    state: Mutex<FormState>,
    snapshots: watch::Sender<FormSnapshot>,
}

struct FormState {
    view: FormSnapshot,
    /// Bumped by every `open`, so a slow fetch or submit cannot overwrite a
    /// newer one.
    generation: u64,
    /// A create or update from this form is outstanding, whatever was opened
    /// since.
    submitting: bool,
    unmounted: bool,
}

impl FormCore {
    fn publish(&self, state: &FormState) {
        self.snapshots.send_replace(state.view.clone());
    }
}

/// Marks a submission outstanding until dropped. If the submission is
/// abandoned mid-flight, the form it belonged to returns to `Editing`.
struct SubmitInFlight {
    core: Arc<FormCore>,
    generation: u64,
    armed: bool,
}

impl Drop for SubmitInFlight {
    fn drop(&mut self) {
        let mut state = self.core.state.lock();
        state.submitting = false;
        if self.armed
            && state.generation == self.generation
            && state.view.phase == FormPhase::Submitting
        {
            state.view.phase = FormPhase::Editing;
            if !state.unmounted {
                self.core.publish(&state);
            }
        }
    }
}

impl<T: TableStore> ProductForm<T> {
    /// A form over `store`. Call [`ProductForm::open`] before use.
    #[must_use]
    pub fn new(store: ProductStore<T>) -> Self {
        let (snapshots, _) = watch::channel(FormSnapshot::default());
        Self {
            store,
            core: Arc::new(FormCore {
                state: Mutex::new(FormState {
                    view: FormSnapshot::default(),
                    generation: 0,
                    submitting: false,
                    unmounted: false,
                }),
                snapshots,
            }),
        }
    }

    /// Receiver that observes every change to the form state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FormSnapshot> {
        self.core.snapshots.subscribe()
    }

    /// Current form state.
    #[must_use]
    pub fn snapshot(&self) -> FormSnapshot {
        self.core.state.lock().view.clone()
    }

    /// Current draft.
    #[must_use]
    pub fn draft(&self) -> Draft {
        self.core.state.lock().view.draft.clone()
    }

    /// Current field errors.
    #[must_use]
    pub fn errors(&self) -> FieldErrors {
        self.core.state.lock().view.errors.clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> FormPhase {
        self.core.state.lock().view.phase
    }

    /// Open the form.
    ///
    /// Create mode starts from an empty draft. Edit mode fetches the product
    /// from the table store, not from the cache, so the draft reflects the
    /// server's current values.
    ///
    /// A submission still outstanding from an earlier opening completes
    /// without touching the new draft, and blocks new submissions until it
    /// does.
    ///
    /// # Errors
    ///
    /// Returns the `FetchError` when the product could not be loaded. The
    /// form then rejects submission until `open` succeeds.
    #[instrument(skip(self))]
    pub async fn open(&self, mode: FormMode) -> Result<Draft, FetchError> {
        let generation = {
            let mut state = self.core.state.lock();
            state.generation += 1;
            state.view = FormSnapshot {
                mode,
                phase: match mode {
                    FormMode::Create => FormPhase::Editing,
                    FormMode::Edit(_) => FormPhase::Loading,
                },
                ..FormSnapshot::default()
            };
            self.core.publish(&state);
            state.generation
        };

        let FormMode::Edit(id) = mode else {
            return Ok(Draft::default());
        };

        let result = self.store.fetch_one(id).await;

        let mut state = self.core.state.lock();
        let current = !state.unmounted && state.generation == generation;
        match result {
            Ok(product) => {
                let draft = Draft::from_fields(&product.fields);
                if current {
                    state.view.draft = draft.clone();
                    state.view.phase = FormPhase::Editing;
                    self.core.publish(&state);
                }
                Ok(draft)
            }
            Err(e) => {
                warn!(product_id = %id, error = %e, "Could not load product data");
                if current {
                    state.view.phase = FormPhase::LoadFailed;
                    state.view.load_error = Some(e.clone());
                    self.core.publish(&state);
                }
                Err(e)
            }
        }
    }

    /// Replace one field of the draft and clear its error.
    ///
    /// Errors are only recomputed on submit. Editing after a failed submit
    /// returns the form to `Editing`. Ignored while the form has no draft.
    pub fn update_field(&self, field: FieldName, value: impl Into<String>) -> Draft {
        let mut state = self.core.state.lock();
        match state.view.phase {
            FormPhase::Loading | FormPhase::LoadFailed | FormPhase::Succeeded => {
                debug!(%field, phase = ?state.view.phase, "Ignoring edit");
            }
            phase => {
                state.view.draft.set(field, value);
                state.view.errors.remove(&field);
                if phase == FormPhase::Failed {
                    state.view.phase = FormPhase::Editing;
                    state.view.submit_error = None;
                }
                self.core.publish(&state);
            }
        }
        state.view.draft.clone()
    }

    /// Validate and submit the draft.
    ///
    /// Invalid drafts are refused without contacting the store. A valid
    /// draft goes to `create` or `update` depending on the mode. On success
    /// the navigator receives `GoToDashboard`; on failure the draft is kept
    /// as it was and the error is exposed on the form.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` describing why nothing was written.
    #[instrument(skip(self, navigator))]
    pub async fn submit<N: Navigator + ?Sized>(&self, navigator: &N) -> Result<(), SubmitError> {
        let (mode, fields, generation) = {
            let mut state = self.core.state.lock();
            if state.submitting {
                debug!("Submission from an earlier opening still outstanding");
                return Err(SubmitError::AlreadySubmitting);
            }
            match state.view.phase {
                FormPhase::Validating | FormPhase::Submitting => {
                    debug!("Submission already outstanding");
                    return Err(SubmitError::AlreadySubmitting);
                }
                FormPhase::Loading | FormPhase::LoadFailed | FormPhase::Succeeded => {
                    return Err(SubmitError::NotReady);
                }
                FormPhase::Editing | FormPhase::Failed => {}
            }

            state.view.phase = FormPhase::Validating;
            state.view.submit_error = None;
            self.core.publish(&state);

            let errors = validate(&state.view.draft);
            let parsed = if errors.is_empty() {
                state.view.draft.parse()
            } else {
                Err(errors)
            };
            match parsed {
                Ok(fields) => {
                    state.view.errors.clear();
                    state.view.phase = FormPhase::Submitting;
                    state.submitting = true;
                    self.core.publish(&state);
                    (state.view.mode, fields, state.generation)
                }
                Err(errors) => {
                    debug!(fields = errors.len(), "Draft failed validation");
                    state.view.errors.clone_from(&errors);
                    state.view.phase = FormPhase::Editing;
                    self.core.publish(&state);
                    return Err(SubmitError::Invalid(errors));
                }
            }
        };

        let mut in_flight = SubmitInFlight {
            core: Arc::clone(&self.core),
            generation,
            armed: true,
        };

        let result = match mode {
            FormMode::Create => self.store.create(fields).await.map(drop),
            FormMode::Edit(id) => self.store.update(id, fields).await,
        };
        in_flight.armed = false;
        drop(in_flight);

        let mut state = self.core.state.lock();
        let current = !state.unmounted && state.generation == generation;
        match result {
            Ok(()) => {
                if !current {
                    debug!(?mode, "Form reopened or unmounted before the write finished");
                    return Ok(());
                }
                state.view.phase = FormPhase::Succeeded;
                self.core.publish(&state);
                drop(state);
                info!(?mode, "Product form submitted");
                navigator.navigate(NavigationIntent::GoToDashboard);
                Ok(())
            }
            Err(e) => {
                warn!(?mode, error = %e, "Product form submission failed");
                let err = SubmitError::Write(e);
                if current {
                    state.view.phase = FormPhase::Failed;
                    state.view.submit_error = Some(err.clone());
                    self.core.publish(&state);
                }
                Err(err)
            }
        }
    }

    /// Tear the form down. Outstanding calls finish but no longer change the
    /// visible state or navigate.
    pub fn unmount(&self) {
        self.core.state.lock().unmounted = true;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::DeletePolicy;
    use crate::error::RemoteError;
    use crate::testing::{InMemoryTables, RecordingNavigator, TableOp};
    use shelfdesk_core::{Price, ProductFields, Stock};

    const PRODUCTS: &str = "products";

    async fn loaded_store() -> (Arc<InMemoryTables>, ProductStore<InMemoryTables>) {
        let tables = Arc::new(InMemoryTables::new());
        tables.seed(
            PRODUCTS,
            &ProductFields {
                name: "Desk Lamp".to_string(),
                description: Some("Brass".to_string()),
                price: Price::parse("24.00").unwrap(),
                category: Some("Lighting".to_string()),
                stock: Stock::new(7),
            },
        );
        let store = ProductStore::new(Arc::clone(&tables), PRODUCTS, DeletePolicy::KeepRemoved);
        store.load_all().await.unwrap();
        (tables, store)
    }

    fn fill(form: &ProductForm<InMemoryTables>, name: &str, price: &str, stock: &str) {
        form.update_field(FieldName::Name, name);
        form.update_field(FieldName::Price, price);
        form.update_field(FieldName::Stock, stock);
    }

    #[tokio::test]
    async fn test_open_edit_seeds_draft_from_server() {
        let (_tables, store) = loaded_store().await;
        let form = ProductForm::new(store);

        let draft = form.open(FormMode::Edit(ProductId::new(1))).await.unwrap();

        assert_eq!(draft.name, "Desk Lamp");
        assert_eq!(draft.price, "24.00");
        assert_eq!(draft.stock, "7");
        assert_eq!(form.phase(), FormPhase::Editing);
    }

    #[tokio::test]
    async fn test_open_failure_blocks_submit() {
        let (_tables, store) = loaded_store().await;
        let form = ProductForm::new(store);

        let err = form.open(FormMode::Edit(ProductId::new(99))).await.unwrap_err();

        assert_eq!(err, FetchError::NotFound);
        let snapshot = form.snapshot();
        assert_eq!(snapshot.phase, FormPhase::LoadFailed);
        assert_eq!(snapshot.load_error, Some(FetchError::NotFound));
        let err = form.submit(&RecordingNavigator::new()).await.unwrap_err();
        assert_eq!(err, SubmitError::NotReady);
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_store() {
        let (tables, store) = loaded_store().await;
        let form = ProductForm::new(store);
        form.open(FormMode::Create).await.unwrap();
        fill(&form, "", "10", "5");

        let err = form.submit(&RecordingNavigator::new()).await.unwrap_err();

        let SubmitError::Invalid(errors) = err else {
            panic!("expected field errors");
        };
        assert!(errors.contains_key(&FieldName::Name));
        assert_eq!(form.errors(), errors);
        assert_eq!(form.phase(), FormPhase::Editing);
        assert_eq!(tables.calls(TableOp::Insert), 0);
    }

    #[tokio::test]
    async fn test_update_field_clears_its_error_only() {
        let (_tables, store) = loaded_store().await;
        let form = ProductForm::new(store);
        form.open(FormMode::Create).await.unwrap();
        fill(&form, "", "abc", "5");
        form.submit(&RecordingNavigator::new()).await.unwrap_err();

        form.update_field(FieldName::Name, "Widget");

        let errors = form.errors();
        assert!(!errors.contains_key(&FieldName::Name));
        assert!(errors.contains_key(&FieldName::Price));
    }

    #[tokio::test]
    async fn test_create_success_navigates_to_dashboard() {
        let (tables, store) = loaded_store().await;
        let form = ProductForm::new(store.clone());
        let navigator = RecordingNavigator::new();
        form.open(FormMode::Create).await.unwrap();
        fill(&form, "Widget", "9.99", "3");

        form.submit(&navigator).await.unwrap();

        assert_eq!(form.phase(), FormPhase::Succeeded);
        assert_eq!(navigator.intents(), vec![NavigationIntent::GoToDashboard]);
        assert_eq!(tables.calls(TableOp::Insert), 1);
        assert_eq!(store.filtered("widget").len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_draft() {
        let (tables, store) = loaded_store().await;
        let form = ProductForm::new(store);
        let navigator = RecordingNavigator::new();
        form.open(FormMode::Edit(ProductId::new(1))).await.unwrap();
        form.update_field(FieldName::Name, "Floor Lamp");
        let before = form.draft();
        tables.fail_next(
            TableOp::Update,
            RemoteError::Rejected("price exceeds limit".to_string()),
        );

        let err = form.submit(&navigator).await.unwrap_err();

        assert_eq!(
            err,
            SubmitError::Write(WriteError::Validation("price exceeds limit".to_string()))
        );
        let snapshot = form.snapshot();
        assert_eq!(snapshot.draft, before);
        assert_eq!(snapshot.phase, FormPhase::Failed);
        assert_eq!(snapshot.submit_error, Some(err));
        assert!(navigator.intents().is_empty());

        form.update_field(FieldName::Price, "20");
        let snapshot = form.snapshot();
        assert_eq!(snapshot.phase, FormPhase::Editing);
        assert!(snapshot.submit_error.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_submit_returns_to_editing() {
        let (tables, store) = loaded_store().await;
        let form = ProductForm::new(store);
        form.open(FormMode::Create).await.unwrap();
        fill(&form, "Widget", "9.99", "3");
        tables.hold(TableOp::Insert);

        let pending = tokio::spawn({
            let form = form.clone();
            async move { form.submit(&RecordingNavigator::new()).await }
        });
        tables.entered(TableOp::Insert).await;
        assert_eq!(form.phase(), FormPhase::Submitting);

        pending.abort();
        let _ = pending.await;

        assert_eq!(form.phase(), FormPhase::Editing);
        form.submit(&RecordingNavigator::new()).await.unwrap();
        assert_eq!(form.phase(), FormPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_reopen_during_submit_keeps_new_draft() {
        let (tables, store) = loaded_store().await;
        let form = ProductForm::new(store);
        let navigator = RecordingNavigator::new();
        form.open(FormMode::Create).await.unwrap();
        fill(&form, "Widget", "9.99", "3");
        tables.hold(TableOp::Insert);

        let pending = tokio::spawn({
            let form = form.clone();
            let navigator = navigator.clone();
            async move { form.submit(&navigator).await }
        });
        tables.entered(TableOp::Insert).await;

        form.open(FormMode::Create).await.unwrap();
        fill(&form, "Other", "1", "1");
        let err = form.submit(&navigator).await.unwrap_err();
        assert_eq!(err, SubmitError::AlreadySubmitting);
        assert_eq!(tables.calls(TableOp::Insert), 1);

        tables.release(TableOp::Insert);
        pending.await.unwrap().unwrap();

        let snapshot = form.snapshot();
        assert_eq!(snapshot.phase, FormPhase::Editing);
        assert_eq!(snapshot.draft.name, "Other");
        assert!(navigator.intents().is_empty());

        form.submit(&navigator).await.unwrap();
        assert_eq!(tables.calls(TableOp::Insert), 2);
        assert_eq!(navigator.intents(), vec![NavigationIntent::GoToDashboard]);
    }
}
