//! Locale and field validation.
//!
//! Every check comes in two modes: [`ValidationMode::Strict`] fails with a
//! typed error carrying the offending value and the allowed set, and
//! [`ValidationMode::Lenient`] reports `false` instead. Batch variants stop
//! at the first violation.

use crate::error::{Result, TranslationError};
use crate::i18n::LocaleRegistry;

/// How a failed check is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Return an error on mismatch
    #[default]
    Strict,
    /// Return `Ok(false)` on mismatch
    Lenient,
}

/// Validator for locales against the registry and fields against an
/// entity's translatable set.
#[derive(Debug, Clone)]
pub struct LocaleValidator {
    registry: LocaleRegistry,
}

impl LocaleValidator {
    pub fn new(registry: LocaleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &LocaleRegistry {
        &self.registry
    }

    /// Validate a single locale.
    pub fn validate_locale(&self, locale: &str, mode: ValidationMode) -> Result<bool> {
        if self.registry.is_supported(locale) {
            return Ok(true);
        }
        match mode {
            ValidationMode::Strict => Err(TranslationError::invalid_locale(
                locale,
                self.registry.supported(),
            )),
            ValidationMode::Lenient => Ok(false),
        }
    }

    /// Validate every locale, failing on the first unsupported one.
    pub fn validate_locales<S: AsRef<str>>(
        &self,
        locales: &[S],
        mode: ValidationMode,
    ) -> Result<bool> {
        for locale in locales {
            if !self.validate_locale(locale.as_ref(), mode)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Strict shorthand used on hot paths.
    pub fn ensure_locale(&self, locale: &str) -> Result<()> {
        self.validate_locale(locale, ValidationMode::Strict)
            .map(|_| ())
    }
}

/// Validate that a field belongs to an entity's translatable set.
pub fn validate_field(field: &str, translatable: &[String], mode: ValidationMode) -> Result<bool> {
    if translatable.iter().any(|f| f == field) {
        return Ok(true);
    }
    match mode {
        ValidationMode::Strict => Err(TranslationError::invalid_field(field, translatable)),
        ValidationMode::Lenient => Ok(false),
    }
}

/// Validate every field, failing on the first one outside the set.
pub fn validate_fields<S: AsRef<str>>(
    fields: &[S],
    translatable: &[String],
    mode: ValidationMode,
) -> Result<bool> {
    for field in fields {
        if !validate_field(field.as_ref(), translatable, mode)? {
            return Ok(false);
        }
    }
    Ok(true)
}
