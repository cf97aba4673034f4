//! Field classification: where a translatable field lives in a record.

use crate::cache::RECORD_KEY_SEGMENT;
use crate::config::TranslationConfig;
use crate::error::{Result, TranslationError};
use std::collections::HashSet;

/// Storage home of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Dedicated, indexable column
    Searchable,
    /// Key inside the large-field JSON blob
    Large,
    /// Neither; never stored or retrieved
    Unknown,
}

/// Classifies field names using the static searchable/large configuration.
///
/// The two sets are disjoint by construction, so a field's home never
/// depends on the data.
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    searchable: Vec<String>,
    large: Vec<String>,
}

impl FieldClassifier {
    pub fn new(searchable: Vec<String>, large: Vec<String>) -> Result<Self> {
        if let Some(field) = searchable
            .iter()
            .chain(large.iter())
            .find(|f| f.as_str() == RECORD_KEY_SEGMENT)
        {
            return Err(TranslationError::InvalidConfig(format!(
                "field name '{}' is reserved for whole-record cache entries",
                field
            )));
        }

        let searchable_set: HashSet<&str> = searchable.iter().map(|s| s.as_str()).collect();
        if let Some(field) = large.iter().find(|f| searchable_set.contains(f.as_str())) {
            return Err(TranslationError::AmbiguousField {
                field: field.clone(),
            });
        }

        Ok(Self { searchable, large })
    }

    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        Self::new(config.searchable_fields.clone(), config.large_fields.clone())
    }

    pub fn classify(&self, field: &str) -> FieldKind {
        if self.searchable.iter().any(|f| f == field) {
            FieldKind::Searchable
        } else if self.large.iter().any(|f| f == field) {
            FieldKind::Large
        } else {
            FieldKind::Unknown
        }
    }

    pub fn is_known(&self, field: &str) -> bool {
        self.classify(field) != FieldKind::Unknown
    }

    /// Searchable fields in column order.
    pub fn searchable(&self) -> &[String] {
        &self.searchable
    }

    pub fn large(&self) -> &[String] {
        &self.large
    }
}
