//! Editable field set and its validation rules.

use std::collections::BTreeMap;
use std::fmt;

use shelfdesk_core::{Price, PriceError, ProductFields, Stock, StockError};

/// Field-scoped validation messages. Empty means valid.
pub type FieldErrors = BTreeMap<FieldName, String>;

/// One editable product field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    Name,
    Description,
    Price,
    Category,
    Stock,
}

impl FieldName {
    /// Every field, in display order.
    pub const ALL: [Self; 5] = [
        Self::Name,
        Self::Description,
        Self::Price,
        Self::Category,
        Self::Stock,
    ];

    /// Key used for the field in records and form markup.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::Category => "category",
            Self::Stock => "stock",
        }
    }

    /// Check raw input for this field.
    ///
    /// # Errors
    ///
    /// Returns the message to show next to the field.
    pub fn validate(self, raw: &str) -> Result<(), String> {
        match self {
            Self::Name => parse_name(raw).map(drop),
            Self::Price => parse_price(raw).map(drop),
            Self::Stock => parse_stock(raw).map(drop),
            Self::Description | Self::Category => Ok(()),
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

fn parse_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        Err("Name is required.".to_string())
    } else {
        Ok(name.to_string())
    }
}

fn parse_price(raw: &str) -> Result<Price, String> {
    Price::parse(raw).map_err(|e| match e {
        PriceError::Empty => "Price is required.".to_string(),
        PriceError::NotANumber => "Price must be a number.".to_string(),
        PriceError::Negative => "Price cannot be negative.".to_string(),
    })
}

fn parse_stock(raw: &str) -> Result<Stock, String> {
    Stock::parse(raw).map_err(|e| match e {
        StockError::Empty => "Stock is required.".to_string(),
        StockError::NotAnInteger => "Stock must be a whole number.".to_string(),
        StockError::Negative => "Stock cannot be negative.".to_string(),
    })
}

fn optional_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Raw, unvalidated text of every field as the user typed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub stock: String,
}

impl Draft {
    /// Draft seeded from existing product attributes.
    #[must_use]
    pub fn from_fields(fields: &ProductFields) -> Self {
        Self {
            name: fields.name.clone(),
            description: fields.description.clone().unwrap_or_default(),
            price: fields.price.to_string(),
            category: fields.category.clone().unwrap_or_default(),
            stock: fields.stock.to_string(),
        }
    }

    /// Current text of `field`.
    #[must_use]
    pub fn get(&self, field: FieldName) -> &str {
        match field {
            FieldName::Name => &self.name,
            FieldName::Description => &self.description,
            FieldName::Price => &self.price,
            FieldName::Category => &self.category,
            FieldName::Stock => &self.stock,
        }
    }

    /// Replace the text of `field`.
    pub fn set(&mut self, field: FieldName, value: impl Into<String>) {
        let slot = match field {
            FieldName::Name => &mut self.name,
            FieldName::Description => &mut self.description,
            FieldName::Price => &mut self.price,
            FieldName::Category => &mut self.category,
            FieldName::Stock => &mut self.stock,
        };
        *slot = value.into();
    }

    /// Copy of this draft with `field` replaced.
    #[must_use]
    pub fn with(mut self, field: FieldName, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Coerce the draft into typed attributes.
    ///
    /// # Errors
    ///
    /// Returns every field-scoped error when any field is invalid.
    pub fn parse(&self) -> Result<ProductFields, FieldErrors> {
        let name = parse_name(&self.name);
        let price = parse_price(&self.price);
        let stock = parse_stock(&self.stock);

        match (name, price, stock) {
            (Ok(name), Ok(price), Ok(stock)) => Ok(ProductFields {
                name,
                description: optional_text(&self.description),
                price,
                category: optional_text(&self.category),
                stock,
            }),
            (name, price, stock) => {
                let mut errors = FieldErrors::new();
                if let Err(e) = name {
                    errors.insert(FieldName::Name, e);
                }
                if let Err(e) = price {
                    errors.insert(FieldName::Price, e);
                }
                if let Err(e) = stock {
                    errors.insert(FieldName::Stock, e);
                }
                Err(errors)
            }
        }
    }
}

/// Check every field of `draft`.
///
/// Pure and deterministic; an empty map means the draft can be submitted.
#[must_use]
pub fn validate(draft: &Draft) -> FieldErrors {
    FieldName::ALL
        .into_iter()
        .filter_map(|field| {
            field
                .validate(draft.get(field))
                .err()
                .map(|message| (field, message))
        })
        .collect()
}
