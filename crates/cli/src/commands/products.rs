//! Product commands.

use std::io::Write;

use tracing::{error, info};

use shelfdesk_admin::form::{FieldName, FormMode, ProductForm, SubmitError};
use shelfdesk_admin::navigation::{NavigationIntent, Navigator};
use shelfdesk_core::{Product, ProductId};

use super::AdminSession;
use crate::error::CliError;
use crate::{NewProduct, ProductChanges};

/// Accepts the form's return-to-list intent without acting on it.
struct StayPut;

impl Navigator for StayPut {
    fn navigate(&self, intent: NavigationIntent) {
        tracing::debug!(path = intent.path(), "Form finished");
    }
}

/// Print the cached products matching `search`.
///
/// # Errors
///
/// Returns `CliError::Io` if output cannot be written.
pub fn list(
    session: &AdminSession,
    search: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let products = session.store().filtered(search.unwrap_or(""));
    write_table(out, &products)?;
    writeln!(out, "{} product(s)", products.len())?;
    Ok(())
}

/// Print one product, read fresh from the backend.
///
/// # Errors
///
/// Returns `CliError::Fetch` if the product cannot be read.
pub async fn show(
    session: &AdminSession,
    id: ProductId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let product = session.store().fetch_one(id).await?;
    let fields = &product.fields;
    writeln!(out, "ID:          {}", product.id)?;
    writeln!(out, "Name:        {}", fields.name)?;
    writeln!(out, "Price:       {}", fields.price)?;
    writeln!(out, "Stock:       {}", fields.stock)?;
    writeln!(out, "Category:    {}", product.category())?;
    writeln!(
        out,
        "Description: {}",
        fields.description.as_deref().unwrap_or("")
    )?;
    Ok(())
}

/// Create a product through the product form.
///
/// # Errors
///
/// Returns `CliError::Submit` if the values are invalid or the write fails.
pub async fn add(
    session: &AdminSession,
    new: NewProduct,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let form = ProductForm::new(session.store().clone());
    form.open(FormMode::Create).await?;

    form.update_field(FieldName::Name, new.name);
    form.update_field(FieldName::Price, new.price);
    form.update_field(FieldName::Stock, new.stock);
    if let Some(description) = new.description {
        form.update_field(FieldName::Description, description);
    }
    if let Some(category) = new.category {
        form.update_field(FieldName::Category, category);
    }

    let before: Vec<ProductId> = session.store().products().iter().map(|p| p.id).collect();
    submit(&form).await?;

    match newest(session, &before) {
        Some(product) => writeln!(out, "Created product {}: {}", product.id, product.name())?,
        None => writeln!(out, "Created product")?,
    }
    Ok(())
}

/// Change some fields of a product through the product form.
///
/// # Errors
///
/// Returns `CliError::Fetch` if the product cannot be loaded, or
/// `CliError::Submit` if the values are invalid or the write fails.
pub async fn edit(
    session: &AdminSession,
    id: ProductId,
    changes: ProductChanges,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let form = ProductForm::new(session.store().clone());
    form.open(FormMode::Edit(id)).await?;

    let updates = [
        (FieldName::Name, changes.name),
        (FieldName::Price, changes.price),
        (FieldName::Stock, changes.stock),
        (FieldName::Description, changes.description),
        (FieldName::Category, changes.category),
    ];
    for (field, value) in updates {
        if let Some(value) = value {
            form.update_field(field, value);
        }
    }

    submit(&form).await?;
    writeln!(out, "Updated product {id}")?;
    Ok(())
}

/// Delete a product.
///
/// # Errors
///
/// Returns `CliError::Write` if the delete fails.
pub async fn delete(
    session: &AdminSession,
    id: ProductId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    session.store().delete(id).await?;
    info!(product_id = %id, "Product deleted");
    writeln!(out, "Deleted product {id}")?;
    Ok(())
}

async fn submit<T>(form: &ProductForm<T>) -> Result<(), CliError>
where
    T: shelfdesk_admin::catalog::TableStore,
{
    match form.submit(&StayPut).await {
        Ok(()) => Ok(()),
        Err(SubmitError::Invalid(errors)) => {
            for (field, message) in &errors {
                error!(%field, "{message}");
            }
            Err(SubmitError::Invalid(errors).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// The product with the highest id that was not in `before`.
fn newest(session: &AdminSession, before: &[ProductId]) -> Option<Product> {
    session
        .store()
        .products()
        .into_iter()
        .filter(|p| !before.contains(&p.id))
        .max_by_key(|p| p.id)
}

fn write_table(out: &mut impl Write, products: &[Product]) -> std::io::Result<()> {
    writeln!(
        out,
        "{:>6}  {:<32}  {:<16}  {:>10}  {:>6}",
        "ID", "NAME", "CATEGORY", "PRICE", "STOCK"
    )?;
    for product in products {
        writeln!(
            out,
            "{:>6}  {:<32}  {:<16}  {:>10}  {:>6}",
            product.id,
            truncate(product.name(), 32),
            truncate(product.category(), 16),
            product.fields.price.to_string(),
            product.fields.stock.to_string(),
        )?;
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
