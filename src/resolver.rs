//! Entity-facing translation API.
//!
//! A host entity implements [`Translatable`] and holds a
//! [`TranslationResolver`]. The resolver reads through the cached service
//! with default-locale fallback, and buffers writes per locale until
//! [`TranslationResolver::save_translations`] flushes them.
//!
//! # Locale selection
//!
//! Reads and writes without an explicit locale use, in order:
//!
//! 1. the instance override set with [`TranslationResolver::set_locale`]
//! 2. the ambient request locale given at construction
//!
//! The deprecated [`Translatable::default_locale`] is **never consulted**,
//! not even as a last resort. An entity-level default must not change
//! which locale a read resolves to.

use crate::db::EntityRef;
use crate::error::{Result, TranslationError};
use crate::i18n::{validate_field, ValidationMode};
use crate::service::TranslationService;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Capability interface for entities that carry translations.
pub trait Translatable {
    /// Polymorphic discriminator shared by all entities of this kind
    fn entity_type(&self) -> &str;

    /// `None` until the entity has been persisted
    fn entity_id(&self) -> Option<i64>;

    /// Explicit translatable-field list; `None` uses the configured default
    fn translatable_fields(&self) -> Option<Vec<String>> {
        None
    }

    /// Entity-level default locale from the previous API.
    ///
    /// Kept so existing implementations still compile. The resolver ignores
    /// it: the override or ambient locale always wins.
    #[deprecated(note = "ignored by the resolver; set an override locale instead")]
    fn default_locale(&self) -> Option<String> {
        None
    }
}

/// Staged, unsaved values: locale -> field -> value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTranslations {
    by_locale: BTreeMap<String, BTreeMap<String, String>>,
}

impl PendingTranslations {
    pub fn stage(&mut self, locale: &str, field: &str, value: String) {
        self.by_locale
            .entry(locale.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn get(&self, locale: &str, field: &str) -> Option<&str> {
        self.by_locale
            .get(locale)
            .and_then(|fields| fields.get(field))
            .map(|v| v.as_str())
    }

    pub fn locales(&self) -> Vec<&str> {
        self.by_locale.keys().map(|l| l.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_locale.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_locale.clear();
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.by_locale.iter()
    }
}

/// Shapes accepted by [`TranslationResolver::translate_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationInput {
    /// field -> value, for the current locale
    Flat(BTreeMap<String, String>),
    /// locale -> field -> value
    ByLocale(BTreeMap<String, BTreeMap<String, String>>),
    /// field -> locale -> value
    ByAttribute(BTreeMap<String, BTreeMap<String, String>>),
}

impl TranslationInput {
    /// Infer the shape of an untyped JSON payload from its first entry, in
    /// the order the keys were written.
    ///
    /// A string (or null) first value means [`TranslationInput::Flat`]. An
    /// object first value means [`TranslationInput::ByAttribute`] when its
    /// key is a translatable field, [`TranslationInput::ByLocale`]
    /// otherwise. Prefer building the enum directly: the heuristic cannot
    /// tell a locale from a field that shares its name.
    pub fn from_json(payload: &Value, translatable: &[String]) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| {
            TranslationError::InvalidInput("translation payload must be a JSON object".to_string())
        })?;

        let nested = match object.iter().next() {
            None => return Ok(TranslationInput::Flat(BTreeMap::new())),
            Some((_, Value::Object(_))) => true,
            Some(_) => false,
        };

        if !nested {
            let mut flat = BTreeMap::new();
            for (field, value) in object {
                if let Some(text) = json_text(field, value)? {
                    flat.insert(field.clone(), text);
                }
            }
            return Ok(TranslationInput::Flat(flat));
        }

        let mut outer = BTreeMap::new();
        for (outer_key, inner) in object {
            let inner = inner.as_object().ok_or_else(|| {
                TranslationError::InvalidInput(format!(
                    "expected an object under '{}', mixed payload shapes are not supported",
                    outer_key
                ))
            })?;
            let mut values = BTreeMap::new();
            for (inner_key, value) in inner {
                if let Some(text) = json_text(inner_key, value)? {
                    values.insert(inner_key.clone(), text);
                }
            }
            outer.insert(outer_key.clone(), values);
        }

        let first_key = object.keys().next().map(|k| k.as_str()).unwrap_or_default();
        if translatable.iter().any(|f| f == first_key) {
            Ok(TranslationInput::ByAttribute(outer))
        } else {
            Ok(TranslationInput::ByLocale(outer))
        }
    }
}

fn json_text(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::String(text) => Ok(Some(text.clone())),
        Value::Null => Ok(None),
        other => Err(TranslationError::InvalidInput(format!(
            "value for '{}' must be a string, got {}",
            key, other
        ))),
    }
}

/// Outcome of a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Locales written to storage
    pub saved: Vec<String>,
    /// Locales skipped because every value was empty
    pub skipped: Vec<String>,
    /// Fields dropped because they are not translatable for the entity
    pub dropped_fields: Vec<String>,
    /// Translatable fields the store could not place (neither searchable nor large)
    pub unknown_fields: Vec<String>,
    /// The entity has no id yet; the buffer was kept
    pub deferred: bool,
}

/// Per-entity translation handle.
pub struct TranslationResolver {
    service: Arc<TranslationService>,
    entity_type: String,
    entity_id: Option<i64>,
    fields: Vec<String>,
    ambient_locale: String,
    locale_override: Option<String>,
    pending: PendingTranslations,
}

impl TranslationResolver {
    /// Attach a resolver to `entity`, reading the ambient request locale
    /// once at construction.
    pub fn new(
        service: Arc<TranslationService>,
        entity: &dyn Translatable,
        ambient_locale: &str,
    ) -> Result<Self> {
        service.validator().ensure_locale(ambient_locale)?;

        let config = service.config();
        let fields = match entity.translatable_fields() {
            Some(fields) => fields,
            None if config.auto_detect_fields => config.default_translatable_fields.clone(),
            None => config
                .searchable_fields
                .iter()
                .chain(config.large_fields.iter())
                .cloned()
                .collect(),
        };

        Ok(Self {
            entity_type: entity.entity_type().to_string(),
            entity_id: entity.entity_id(),
            fields,
            ambient_locale: ambient_locale.to_string(),
            locale_override: None,
            pending: PendingTranslations::default(),
            service,
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> Option<i64> {
        self.entity_id
    }

    pub fn entity(&self) -> Option<EntityRef> {
        self.entity_id
            .map(|id| EntityRef::new(self.entity_type.clone(), id))
    }

    /// Record the id assigned when the host entity was persisted.
    pub fn attach_entity_id(&mut self, entity_id: i64) {
        self.entity_id = Some(entity_id);
    }

    pub fn translatable_fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_translatable(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    // ==================== Locale ====================

    /// Effective locale: the override if set, else the ambient locale.
    pub fn locale(&self) -> &str {
        self.locale_override
            .as_deref()
            .unwrap_or(&self.ambient_locale)
    }

    /// Set (or with `None`, clear) the instance locale override.
    pub fn set_locale(&mut self, locale: Option<&str>) -> Result<&mut Self> {
        match locale {
            Some(locale) => {
                self.service.validator().ensure_locale(locale)?;
                self.locale_override = Some(locale.to_string());
            }
            None => self.locale_override = None,
        }
        Ok(self)
    }

    pub fn reset_locale(&mut self) -> &mut Self {
        self.locale_override = None;
        self
    }

    fn resolve_locale(&self, locale: Option<&str>) -> Result<String> {
        let locale = locale.unwrap_or_else(|| self.locale()).to_string();
        self.service.validator().ensure_locale(&locale)?;
        Ok(locale)
    }

    // ==================== Reads ====================

    /// Value of `field`, falling back to the default locale once when the
    /// requested locale has no non-empty value.
    pub fn get_translation(&self, field: &str, locale: Option<&str>) -> Result<Option<String>> {
        validate_field(field, &self.fields, ValidationMode::Strict)?;
        let locale = self.resolve_locale(locale)?;
        let Some(entity_id) = self.entity_id else {
            return Ok(None);
        };

        let value = non_empty(self.service.get(&self.entity_type, entity_id, &locale, field)?);
        if value.is_some() {
            return Ok(value);
        }

        let default_locale = self.service.registry().default_locale();
        if locale == default_locale {
            return Ok(None);
        }

        debug!(
            entity_type = %self.entity_type,
            entity_id = entity_id,
            field = %field,
            locale = %locale,
            fallback = %default_locale,
            "Falling back to default locale"
        );
        Ok(non_empty(self.service.get(
            &self.entity_type,
            entity_id,
            default_locale,
            field,
        )?))
    }

    /// All translatable fields stored for one locale (no fallback).
    pub fn get_translations(&self, locale: Option<&str>) -> Result<BTreeMap<String, String>> {
        let locale = self.resolve_locale(locale)?;
        let Some(entity_id) = self.entity_id else {
            return Ok(BTreeMap::new());
        };

        let mut all = self
            .service
            .get_all(&self.entity_type, entity_id, &locale)?;
        all.retain(|field, _| self.is_translatable(field));
        Ok(all)
    }

    /// Whether `field` has a non-empty value in exactly this locale.
    pub fn has_translation(&self, field: &str, locale: Option<&str>) -> Result<bool> {
        validate_field(field, &self.fields, ValidationMode::Strict)?;
        let locale = self.resolve_locale(locale)?;
        let Some(entity_id) = self.entity_id else {
            return Ok(false);
        };

        Ok(non_empty(self.service.get(&self.entity_type, entity_id, &locale, field)?).is_some())
    }

    /// Locales with a stored record for this entity.
    pub fn available_locales(&self) -> Result<Vec<String>> {
        match self.entity_id {
            Some(entity_id) => self
                .service
                .available_locales(&self.entity_type, entity_id),
            None => Ok(Vec::new()),
        }
    }

    /// Per-locale entity counts for this entity's type.
    pub fn translation_stats(&self, locales: Option<&[String]>) -> Result<BTreeMap<String, u64>> {
        self.service.count_by_locale(&self.entity_type, locales)
    }

    // ==================== Staged writes ====================

    /// Stage one value. Storage is untouched until the next flush.
    pub fn set_translation(
        &mut self,
        field: &str,
        value: impl Into<String>,
        locale: Option<&str>,
    ) -> Result<&mut Self> {
        let locale = self.resolve_locale(locale)?;
        self.pending.stage(&locale, field, value.into());
        Ok(self)
    }

    /// Stage several fields for one locale.
    pub fn set_translations<I, K, V>(&mut self, values: I, locale: Option<&str>) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let locale = self.resolve_locale(locale)?;
        for (field, value) in values {
            self.pending.stage(&locale, field.as_ref(), value.into());
        }
        Ok(self)
    }

    /// Stage several fields for an explicit locale.
    pub fn set_for_locale<I, K, V>(&mut self, locale: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.set_translations(values, Some(locale))
    }

    /// Stage one field across several locales.
    pub fn set_attribute_across_locales<I, K, V>(&mut self, field: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let values: Vec<(K, V)> = values.into_iter().collect();
        let locales: Vec<&str> = values.iter().map(|(l, _)| l.as_ref()).collect();
        self.service
            .validator()
            .validate_locales(&locales, ValidationMode::Strict)?;

        for (locale, value) in values {
            self.pending.stage(locale.as_ref(), field, value.into());
        }
        Ok(self)
    }

    /// Stage values for several locales at once. Every locale is validated
    /// before anything is staged.
    pub fn fill_translations(
        &mut self,
        by_locale: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<&mut Self> {
        let locales: Vec<&String> = by_locale.keys().collect();
        self.service
            .validator()
            .validate_locales(&locales, ValidationMode::Strict)?;

        for (locale, fields) in by_locale {
            for (field, value) in fields {
                self.pending.stage(&locale, &field, value);
            }
        }
        Ok(self)
    }

    /// Stage an explicitly shaped payload.
    pub fn translate_to(&mut self, input: TranslationInput) -> Result<&mut Self> {
        match input {
            TranslationInput::Flat(values) => self.set_translations(values, None),
            TranslationInput::ByLocale(by_locale) => self.fill_translations(by_locale),
            TranslationInput::ByAttribute(by_field) => {
                let mut by_locale: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
                for (field, values) in by_field {
                    for (locale, value) in values {
                        by_locale
                            .entry(locale)
                            .or_default()
                            .insert(field.clone(), value);
                    }
                }
                self.fill_translations(by_locale)
            }
        }
    }

    /// Stage one value for an explicit locale.
    pub fn translate(&mut self, locale: &str, field: &str, value: impl Into<String>) -> Result<&mut Self> {
        self.set_translation(field, value, Some(locale))
    }

    pub fn pending(&self) -> &PendingTranslations {
        &self.pending
    }

    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Flush staged values, one upsert per locale.
    ///
    /// Non-translatable fields are dropped. A locale whose remaining values
    /// are all empty is skipped. Without an entity id the flush is deferred
    /// and the buffer kept. On a storage error the buffer is kept so the
    /// flush can be retried.
    pub fn save_translations(&mut self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        let Some(entity_id) = self.entity_id else {
            debug!(entity_type = %self.entity_type, "Entity not persisted, deferring translation flush");
            report.deferred = true;
            return Ok(report);
        };
        if self.pending.is_empty() {
            return Ok(report);
        }

        for (locale, fields) in self.pending.iter() {
            let mut values: BTreeMap<String, Option<String>> = BTreeMap::new();
            for (field, value) in fields {
                if self.is_translatable(field) {
                    values.insert(field.clone(), Some(value.clone()));
                } else {
                    report.dropped_fields.push(field.clone());
                }
            }

            if values.values().all(|v| v.as_deref().unwrap_or_default().is_empty()) {
                report.skipped.push(locale.clone());
                continue;
            }

            let written = self
                .service
                .bulk_set(&self.entity_type, entity_id, locale, &values)?;
            report.unknown_fields.extend(written.skipped);
            report.saved.push(locale.clone());
        }

        self.pending.clear();
        info!(
            entity_type = %self.entity_type,
            entity_id = entity_id,
            saved = ?report.saved,
            skipped = ?report.skipped,
            "Saved translations"
        );
        Ok(report)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
