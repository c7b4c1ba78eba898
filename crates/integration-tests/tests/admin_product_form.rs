//! Integration tests for the product form.
//!
//! Run with: cargo test -p shelfdesk-integration-tests --test admin_product_form

#![allow(clippy::unwrap_used)]

use shelfdesk_admin::catalog::DeletePolicy;
use shelfdesk_admin::form::{
    Draft, FieldName, FormMode, FormPhase, ProductForm, SubmitError, validate,
};
use shelfdesk_admin::testing::{RecordingNavigator, TableOp};
use shelfdesk_admin::{NavigationIntent, RemoteError, WriteError};
use shelfdesk_integration_tests::loaded_store;

fn draft(name: &str, price: &str, stock: &str) -> Draft {
    Draft::default()
        .with(FieldName::Name, name)
        .with(FieldName::Price, price)
        .with(FieldName::Stock, stock)
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_validate_accepts_complete_draft() {
    assert!(validate(&draft("X", "10", "5")).is_empty());
    assert!(validate(&draft("Widget", "0", "0")).is_empty());
}

#[test]
fn test_validate_reports_each_bad_field() {
    let errors = validate(&draft("", "10", "5"));
    assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![FieldName::Name]);

    let errors = validate(&draft("X", "abc", "5"));
    assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![FieldName::Price]);

    let errors = validate(&draft("Widget", "-1", "5"));
    assert_eq!(
        errors.get(&FieldName::Price).map(String::as_str),
        Some("Price cannot be negative.")
    );

    let errors = validate(&draft("Widget", "abc", "5"));
    assert_eq!(
        errors.get(&FieldName::Price).map(String::as_str),
        Some("Price must be a number.")
    );

    let errors = validate(&draft("Widget", "10", "2.5"));
    assert_eq!(
        errors.get(&FieldName::Stock).map(String::as_str),
        Some("Stock must be a whole number.")
    );

    let errors = validate(&draft("   ", "", ""));
    assert_eq!(errors.len(), 3);
}

// ============================================================================
// Submit Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_double_submit_issues_one_insert() {
    let (tables, _ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let form = ProductForm::new(store.clone());
    let navigator = RecordingNavigator::new();
    form.open(FormMode::Create).await.unwrap();
    form.update_field(FieldName::Name, "Floor Lamp");
    form.update_field(FieldName::Price, "120");
    form.update_field(FieldName::Stock, "1");
    tables.hold(TableOp::Insert);

    let first = tokio::spawn({
        let form = form.clone();
        let navigator = navigator.clone();
        async move { form.submit(&navigator).await }
    });
    tables.entered(TableOp::Insert).await;

    let second = form.submit(&navigator).await.unwrap_err();
    assert_eq!(second, SubmitError::AlreadySubmitting);

    tables.release(TableOp::Insert);
    first.await.unwrap().unwrap();

    assert_eq!(tables.calls(TableOp::Insert), 1);
    assert_eq!(form.phase(), FormPhase::Succeeded);
    assert_eq!(navigator.intents(), vec![NavigationIntent::GoToDashboard]);
    assert_eq!(store.filtered("floor lamp").len(), 1);
}

#[tokio::test]
async fn test_rejected_update_keeps_draft_and_stays_put() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let form = ProductForm::new(store.clone());
    let navigator = RecordingNavigator::new();
    form.open(FormMode::Edit(ids[0])).await.unwrap();
    form.update_field(FieldName::Price, "1000000");
    let edited = form.draft();
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
    assert_eq!(snapshot.phase, FormPhase::Failed);
    assert_eq!(snapshot.draft, edited);
    assert!(navigator.intents().is_empty());
    // The cache still shows the server's value
    assert_eq!(store.get(ids[0]).unwrap().fields.price.to_string(), "24.00");

    // Fix the value and resubmit
    form.update_field(FieldName::Price, "22.50");
    form.submit(&navigator).await.unwrap();
    assert_eq!(store.get(ids[0]).unwrap().fields.price.to_string(), "22.50");
    assert_eq!(navigator.intents(), vec![NavigationIntent::GoToDashboard]);
}

#[tokio::test]
async fn test_invalid_submit_shows_errors_without_writing() {
    let (tables, _ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let form = ProductForm::new(store);
    let navigator = RecordingNavigator::new();
    form.open(FormMode::Create).await.unwrap();
    form.update_field(FieldName::Name, "Widget");
    form.update_field(FieldName::Price, "-3");

    let err = form.submit(&navigator).await.unwrap_err();

    let SubmitError::Invalid(errors) = err else {
        panic!("expected field errors");
    };
    assert!(errors.contains_key(&FieldName::Price));
    assert!(errors.contains_key(&FieldName::Stock));
    assert_eq!(form.snapshot().errors, errors);
    assert_eq!(tables.calls(TableOp::Insert), 0);
    assert!(navigator.intents().is_empty());
}

#[tokio::test]
async fn test_edit_of_missing_product_cannot_submit() {
    let (tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    tables.remove_row(shelfdesk_integration_tests::PRODUCTS, ids[2]);
    let form = ProductForm::new(store);

    form.open(FormMode::Edit(ids[2])).await.unwrap_err();

    assert_eq!(form.phase(), FormPhase::LoadFailed);
    assert_eq!(
        form.submit(&RecordingNavigator::new()).await.unwrap_err(),
        SubmitError::NotReady
    );
    assert_eq!(tables.calls(TableOp::Update), 0);
}

#[tokio::test]
async fn test_edits_after_success_are_ignored() {
    let (_tables, ids, store) = loaded_store(DeletePolicy::KeepRemoved).await;
    let form = ProductForm::new(store);
    form.open(FormMode::Edit(ids[3])).await.unwrap();
    form.update_field(FieldName::Stock, "119");
    form.submit(&RecordingNavigator::new()).await.unwrap();

    let draft = form.update_field(FieldName::Stock, "0");

    assert_eq!(draft.stock, "119");
    assert_eq!(form.phase(), FormPhase::Succeeded);
}
