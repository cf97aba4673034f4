//! Error types shared by every layer of the translation engine.

use thiserror::Error;

/// Errors produced by validation, storage and caching.
///
/// `InvalidLocale`, `InvalidField`, `AmbiguousField`, `InvalidConfig` and
/// `InvalidInput` are caller mistakes and always propagate. `Storage` and
/// `Serialization` are infrastructure failures; read paths downgrade them
/// to "no translation" after logging.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Locale is empty or not part of the supported set
    #[error("Invalid locale '{locale}'. Supported locales: [{}]", .supported.join(", "))]
    InvalidLocale {
        locale: String,
        supported: Vec<String>,
    },

    /// Field is not declared translatable for the entity
    #[error("Invalid field '{field}'. Translatable fields: [{}]", .allowed.join(", "))]
    InvalidField { field: String, allowed: Vec<String> },

    /// Field is neither a searchable nor a large field
    #[error("Unknown field '{field}': not configured as searchable or large")]
    UnknownField { field: String },

    /// Field is configured as both searchable and large
    #[error("Field '{field}' is configured as both searchable and large")]
    AmbiguousField { field: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Translation payload has an unsupported shape
    #[error("Invalid translation input: {0}")]
    InvalidInput(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TranslationError {
    /// Whether the error was caused by the caller (bad locale, field or
    /// configuration) rather than by the storage backend.
    pub fn is_caller_error(&self) -> bool {
        match self {
            TranslationError::InvalidLocale { .. } => true,
            TranslationError::InvalidField { .. } => true,
            TranslationError::UnknownField { .. } => true,
            TranslationError::AmbiguousField { .. } => true,
            TranslationError::InvalidConfig(_) => true,
            TranslationError::InvalidInput(_) => true,
            TranslationError::Storage(_) => false,
            TranslationError::Serialization(_) => false,
        }
    }

    pub(crate) fn invalid_locale(locale: &str, supported: &[String]) -> Self {
        TranslationError::InvalidLocale {
            locale: locale.to_string(),
            supported: supported.to_vec(),
        }
    }

    pub(crate) fn invalid_field(field: &str, allowed: &[String]) -> Self {
        TranslationError::InvalidField {
            field: field.to_string(),
            allowed: allowed.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;
