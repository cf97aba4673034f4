//! Locale registry: the configured set of supported locales.
//!
//! The registry is built once from [`TranslationConfig`] and shared by the
//! validator, the store and the resolver. Order is preserved so statistics
//! and locale listings follow the configured order.

use crate::config::TranslationConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRegistry {
    supported: Vec<String>,
    default_locale: String,
}

impl LocaleRegistry {
    /// Build a registry from an explicit list and default.
    ///
    /// Duplicate entries are collapsed, keeping the first occurrence.
    pub fn new(supported: Vec<String>, default_locale: impl Into<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(supported.len());
        for locale in supported {
            if !unique.contains(&locale) {
                unique.push(locale);
            }
        }

        Self {
            supported: unique,
            default_locale: default_locale.into(),
        }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(
            config.supported_locales.clone(),
            config.default_locale.clone(),
        )
    }

    /// The fallback locale consulted when the requested one has no value.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    /// Check if a locale is supported. The empty string never is.
    pub fn is_supported(&self, locale: &str) -> bool {
        !locale.is_empty() && self.supported.iter().any(|l| l == locale)
    }

    pub fn is_default(&self, locale: &str) -> bool {
        self.default_locale == locale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LocaleRegistry {
        LocaleRegistry::new(
            vec!["en".to_string(), "ar".to_string(), "fr".to_string()],
            "en",
        )
    }

    #[test]
    fn test_is_supported() {
        let registry = registry();
        assert!(registry.is_supported("en"));
        assert!(registry.is_supported("fr"));
        assert!(!registry.is_supported("de"));
    }

    #[test]
    fn test_empty_locale_never_supported() {
        let registry = LocaleRegistry::new(vec!["".to_string()], "");
        assert!(!registry.is_supported(""));
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let registry = LocaleRegistry::new(
            vec!["en".to_string(), "fr".to_string(), "en".to_string()],
            "en",
        );
        assert_eq!(registry.supported(), &["en".to_string(), "fr".to_string()]);
    }

    #[test]
    fn test_from_config() {
        let config = TranslationConfig::default();
        let registry = LocaleRegistry::from_config(&config);
        assert_eq!(registry.default_locale(), "en");
        assert!(registry.is_default("en"));
        assert!(!registry.is_default("ar"));
        assert_eq!(registry.supported(), config.supported_locales.as_slice());
    }
}
