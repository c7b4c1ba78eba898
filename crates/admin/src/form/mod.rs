//! Product create/edit form.
//!
//! - [`fields`] - draft text, per-field parsing and the aggregate `validate`
//! - [`ProductForm`] - open, edit and submit lifecycle over a `ProductStore`

pub mod fields;
mod controller;

pub use controller::{FormMode, FormPhase, FormSnapshot, ProductForm, SubmitError};
pub use fields::{Draft, FieldErrors, FieldName, validate};
