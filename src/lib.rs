//! Per-locale, per-entity translation storage.
//!
//! One record per `(entity_type, entity_id, locale)` holds short searchable
//! fields as indexed columns and long-form fields in a JSON blob. Reads go
//! through a cache layer with deterministic keys and fall back to the
//! default locale at the [`resolver`] level; writes invalidate exactly the
//! keys they touch.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod resolver;
pub mod service;

pub use cache::{CacheLayer, CacheStore, CachedValue, MemoryCache};
pub use config::{CacheSettings, TranslationConfig};
pub use db::{BulkWriteReport, EntityRef, EntityTranslations, TranslationRecord, TranslationStore};
pub use error::{Result, TranslationError};
pub use resolver::{FlushReport, PendingTranslations, Translatable, TranslationInput, TranslationResolver};
pub use service::TranslationService;
