//! Locale and field rules for the translation engine.
//!
//! # Architecture
//!
//! - `registry`: the configured set of supported locales and the default locale
//! - `validator`: strict/lenient validation of locales and translatable fields
//! - `classifier`: searchable-column vs. large-JSON-field classification
//! - `metrics`: cache and storage counters
//!
//! # Example
//!
//! ```rust,ignore
//! use entity_translations::i18n::{LocaleRegistry, LocaleValidator, ValidationMode};
//!
//! let registry = LocaleRegistry::new(vec!["en".into(), "ar".into()], "en");
//! let validator = LocaleValidator::new(registry);
//! validator.validate_locale("ar", ValidationMode::Strict)?;
//! ```

mod classifier;
mod metrics;
mod registry;
mod validator;

pub use classifier::{FieldClassifier, FieldKind};
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::LocaleRegistry;
pub use validator::{validate_field, validate_fields, LocaleValidator, ValidationMode};
