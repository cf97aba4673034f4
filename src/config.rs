use crate::cache::RECORD_KEY_SEGMENT;
use crate::error::TranslationError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Cache settings for the translation cache layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Safety-net expiry; writes invalidate explicitly
    pub ttl_secs: u64,
    /// Namespace prepended to every cache key
    pub prefix: String,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            prefix: "translations".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // Storage
    pub database_path: String,
    pub table_name: String,
    pub use_view: bool,

    // Locales
    pub default_locale: String,
    pub supported_locales: Vec<String>,

    // Field layout
    pub searchable_fields: Vec<String>,
    pub large_fields: Vec<String>,

    // Entity field discovery
    pub auto_detect_fields: bool,
    pub default_translatable_fields: Vec<String>,

    pub cache: CacheSettings,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        let searchable_fields: Vec<String> = [
            "title",
            "slug",
            "description",
            "excerpt",
            "meta_title",
            "meta_description",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            database_path: "translations.db".to_string(),
            table_name: "translations".to_string(),
            use_view: true,
            default_locale: "en".to_string(),
            supported_locales: vec!["en".to_string(), "ar".to_string(), "fr".to_string()],
            default_translatable_fields: searchable_fields.clone(),
            searchable_fields,
            large_fields: vec![
                "content".to_string(),
                "body".to_string(),
                "meta_keywords".to_string(),
            ],
            auto_detect_fields: true,
            cache: CacheSettings::default(),
        }
    }
}

impl TranslationConfig {
    /// Load configuration from `TRANSLATIONS_*` environment variables.
    ///
    /// Unset variables fall back to [`TranslationConfig::default`]. The
    /// result is validated before it is returned.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TranslationConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            // Storage
            database_path: lookup("TRANSLATIONS_DATABASE_PATH")
                .unwrap_or(defaults.database_path),
            table_name: lookup("TRANSLATIONS_TABLE").unwrap_or(defaults.table_name),
            use_view: parse_bool(lookup("TRANSLATIONS_USE_VIEW"), defaults.use_view),

            // Locales
            default_locale: lookup("TRANSLATIONS_DEFAULT_LOCALE")
                .unwrap_or(defaults.default_locale),
            supported_locales: lookup("TRANSLATIONS_SUPPORTED_LOCALES")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.supported_locales),

            // Field layout
            searchable_fields: lookup("TRANSLATIONS_SEARCHABLE_FIELDS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.searchable_fields),
            large_fields: lookup("TRANSLATIONS_LARGE_FIELDS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.large_fields),

            // Entity field discovery
            auto_detect_fields: parse_bool(
                lookup("TRANSLATIONS_AUTO_DETECT_FIELDS"),
                defaults.auto_detect_fields,
            ),
            default_translatable_fields: lookup("TRANSLATIONS_DEFAULT_FIELDS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.default_translatable_fields),

            cache: CacheSettings {
                enabled: parse_bool(
                    lookup("TRANSLATIONS_CACHE_ENABLED"),
                    defaults.cache.enabled,
                ),
                ttl_secs: lookup("TRANSLATIONS_CACHE_TTL")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(defaults.cache.ttl_secs),
                prefix: lookup("TRANSLATIONS_CACHE_PREFIX").unwrap_or(defaults.cache.prefix),
            },
        };

        config
            .validate()
            .context("Invalid translation configuration")?;
        Ok(config)
    }

    /// Reject configurations the engine cannot serve deterministically.
    pub fn validate(&self) -> Result<(), TranslationError> {
        if self.supported_locales.is_empty() {
            return Err(TranslationError::InvalidConfig(
                "supported_locales must not be empty".to_string(),
            ));
        }
        if self.supported_locales.iter().any(|l| l.trim().is_empty()) {
            return Err(TranslationError::InvalidConfig(
                "supported_locales must not contain empty entries".to_string(),
            ));
        }
        if !self.supported_locales.contains(&self.default_locale) {
            return Err(TranslationError::InvalidConfig(format!(
                "default_locale '{}' is not in supported_locales",
                self.default_locale
            )));
        }

        if !is_identifier(&self.table_name) {
            return Err(TranslationError::InvalidConfig(format!(
                "table_name '{}' is not a valid identifier",
                self.table_name
            )));
        }
        for field in self.searchable_fields.iter().chain(self.large_fields.iter()) {
            if !is_identifier(field) {
                return Err(TranslationError::InvalidConfig(format!(
                    "field name '{}' is not a valid identifier",
                    field
                )));
            }
        }
        if let Some(reserved) = self
            .searchable_fields
            .iter()
            .find(|f| RESERVED_COLUMNS.contains(&f.as_str()))
        {
            return Err(TranslationError::InvalidConfig(format!(
                "searchable field '{}' collides with a reserved column",
                reserved
            )));
        }
        if let Some(field) = self
            .searchable_fields
            .iter()
            .chain(self.large_fields.iter())
            .find(|f| f.as_str() == RECORD_KEY_SEGMENT)
        {
            return Err(TranslationError::InvalidConfig(format!(
                "field name '{}' is reserved for whole-record cache entries",
                field
            )));
        }

        let searchable: HashSet<&str> = self.searchable_fields.iter().map(|s| s.as_str()).collect();
        if let Some(field) = self
            .large_fields
            .iter()
            .find(|f| searchable.contains(f.as_str()))
        {
            return Err(TranslationError::AmbiguousField {
                field: field.clone(),
            });
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(TranslationError::InvalidConfig(
                "cache.ttl_secs must be greater than zero when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Columns owned by the store itself; searchable fields may not reuse them.
pub(crate) const RESERVED_COLUMNS: &[&str] = &[
    "id",
    "entity_type",
    "entity_id",
    "locale",
    "large_fields",
    "key",
    "value",
    "created_at",
    "updated_at",
];

pub(crate) fn is_identifier(name: &str) -> bool {
    let regex = IDENTIFIER_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
    regex.is_match(name)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "off" => false,
        _ => default,
    }
}
