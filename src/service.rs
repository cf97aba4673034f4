//! Cached, validated access to the translation store.
//!
//! Reads go through the cache layer and degrade to "no translation" when
//! the storage backend fails. Validation errors always propagate. Writes
//! invalidate every cache key derived from the record they touch.

use crate::cache::{CacheLayer, CacheStore, CachedValue, MemoryCache};
use crate::config::TranslationConfig;
use crate::db::{BulkWriteReport, EntityRef, EntityTranslations, TranslationRecord, TranslationStore};
use crate::error::Result;
use crate::i18n::{FieldClassifier, FieldKind, LocaleRegistry, LocaleValidator};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TranslationService {
    config: TranslationConfig,
    store: TranslationStore,
    cache: CacheLayer,
    validator: LocaleValidator,
}

impl TranslationService {
    pub fn new(
        config: TranslationConfig,
        store: TranslationStore,
        cache_store: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        config.validate()?;
        let validator = LocaleValidator::new(LocaleRegistry::from_config(&config));
        let cache = CacheLayer::new(cache_store, config.cache.clone());

        Ok(Self {
            config,
            store,
            cache,
            validator,
        })
    }

    /// Open the configured database with a process-local cache.
    pub fn open(config: TranslationConfig) -> Result<Self> {
        let store = TranslationStore::open(&config)?;
        Self::new(config, store, Arc::new(MemoryCache::new()))
    }

    pub fn open_in_memory(config: TranslationConfig) -> Result<Self> {
        let store = TranslationStore::open_in_memory(&config)?;
        Self::new(config, store, Arc::new(MemoryCache::new()))
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn store(&self) -> &TranslationStore {
        &self.store
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn validator(&self) -> &LocaleValidator {
        &self.validator
    }

    pub fn registry(&self) -> &LocaleRegistry {
        self.validator.registry()
    }

    pub fn classifier(&self) -> &FieldClassifier {
        self.store.classifier()
    }

    /// Log a storage failure on a read path and substitute an empty result.
    fn fail_soft<T: Default>(&self, result: Result<T>, operation: &str, context: &str) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_caller_error() => Err(e),
            Err(e) => {
                self.cache.metrics().record_storage_failure();
                warn!(
                    operation = %operation,
                    context = %context,
                    error = %e,
                    "Translation read failed, returning no translation"
                );
                Ok(T::default())
            }
        }
    }

    /// Read one field in one locale, without fallback.
    pub fn get(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        field: &str,
    ) -> Result<Option<String>> {
        self.validator.ensure_locale(locale)?;
        if self.classifier().classify(field) == FieldKind::Unknown {
            debug!(field = %field, "Unknown field requested, nothing stored");
            return Ok(None);
        }

        let key = self.cache.keys().field(entity_type, entity_id, locale, field);
        let result = self
            .cache
            .remember(&key, || {
                self.store
                    .get(entity_type, entity_id, locale, field)
                    .map(CachedValue::from_text)
            })
            .map(CachedValue::into_text);

        self.fail_soft(
            result,
            "get",
            &format!("{}#{} [{}] {}", entity_type, entity_id, locale, field),
        )
    }

    /// Every populated field of the record in one locale.
    pub fn get_all(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
    ) -> Result<BTreeMap<String, String>> {
        self.validator.ensure_locale(locale)?;

        let key = self.cache.keys().all(entity_type, entity_id, locale);
        let result = self
            .cache
            .remember(&key, || {
                self.store
                    .get_all(entity_type, entity_id, locale)
                    .map(CachedValue::Fields)
            })
            .map(CachedValue::into_fields);

        self.fail_soft(
            result,
            "get_all",
            &format!("{}#{} [{}]", entity_type, entity_id, locale),
        )
    }

    /// Full stored record, uncached.
    pub fn find_record(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
    ) -> Result<Option<TranslationRecord>> {
        self.validator.ensure_locale(locale)?;
        let result = self.store.find_record(entity_type, entity_id, locale);
        self.fail_soft(
            result,
            "find_record",
            &format!("{}#{} [{}]", entity_type, entity_id, locale),
        )
    }

    /// Write one field and invalidate its cache keys.
    ///
    /// Unknown fields are rejected with [`crate::TranslationError::UnknownField`]
    /// and nothing is written.
    pub fn set(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        field: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.validator.ensure_locale(locale)?;
        self.store.set(entity_type, entity_id, locale, field, value)?;
        self.cache
            .invalidate_record(entity_type, entity_id, locale, &[field.to_string()]);
        Ok(())
    }

    /// Write many fields of one record in a single upsert.
    pub fn bulk_set(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        fields: &BTreeMap<String, Option<String>>,
    ) -> Result<BulkWriteReport> {
        self.validator.ensure_locale(locale)?;
        let report = self.store.bulk_set(entity_type, entity_id, locale, fields)?;
        if report.wrote_anything() {
            self.cache
                .invalidate_record(entity_type, entity_id, locale, &report.written);
        }
        Ok(report)
    }

    /// Write the legacy key/value pair. Field caches are unaffected.
    pub fn set_legacy_value(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        self.validator.ensure_locale(locale)?;
        self.store
            .set_legacy_value(entity_type, entity_id, locale, key, value)
    }

    /// Translations of many entities in one locale, one entry per input.
    pub fn bulk_get(
        &self,
        entities: &[EntityRef],
        locale: &str,
        field_names: &[String],
    ) -> Result<Vec<EntityTranslations>> {
        self.validator.ensure_locale(locale)?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let key = self.cache.keys().bulk(entities, locale, field_names);
        self.cache.register_bulk_key(&key, entities, locale);
        let result = self
            .cache
            .remember(&key, || {
                self.store
                    .bulk_get(entities, locale, field_names)
                    .map(CachedValue::Bulk)
            })
            .map(CachedValue::into_bulk);

        let entries = self.fail_soft(
            result,
            "bulk_get",
            &format!("{} entities [{}]", entities.len(), locale),
        )?;

        // A soft failure yields no rows; keep one entry per input anyway
        if entries.len() == entities.len() {
            Ok(entries)
        } else {
            Ok(entities
                .iter()
                .map(|entity| EntityTranslations {
                    entity_type: entity.entity_type.clone(),
                    entity_id: entity.entity_id,
                    locale: locale.to_string(),
                    translations: BTreeMap::new(),
                })
                .collect())
        }
    }

    /// Eager preload for list rendering, keyed by entity.
    pub fn preload(
        &self,
        entities: &[EntityRef],
        locale: &str,
        field_names: &[String],
    ) -> Result<HashMap<EntityRef, BTreeMap<String, String>>> {
        Ok(self
            .bulk_get(entities, locale, field_names)?
            .into_iter()
            .map(|entry| {
                (
                    EntityRef::new(entry.entity_type, entry.entity_id),
                    entry.translations,
                )
            })
            .collect())
    }

    /// Entities of `entity_type` with a record per locale. Defaults to all
    /// supported locales.
    pub fn count_by_locale(
        &self,
        entity_type: &str,
        locales: Option<&[String]>,
    ) -> Result<BTreeMap<String, u64>> {
        let locales: Vec<String> = match locales {
            Some(locales) => {
                self.validator
                    .validate_locales(locales, Default::default())?;
                locales.to_vec()
            }
            None => self.registry().supported().to_vec(),
        };

        let result = self.store.count_by_locale(entity_type, &locales);
        match self.fail_soft(result, "count_by_locale", entity_type)? {
            counts if counts.is_empty() => {
                Ok(locales.into_iter().map(|locale| (locale, 0)).collect())
            }
            counts => Ok(counts),
        }
    }

    pub fn available_locales(&self, entity_type: &str, entity_id: i64) -> Result<Vec<String>> {
        let result = self.store.available_locales(entity_type, entity_id);
        self.fail_soft(
            result,
            "available_locales",
            &format!("{}#{}", entity_type, entity_id),
        )
    }

    /// Ids of entities translated in `locale` (optionally for one field).
    pub fn entities_with_translation(
        &self,
        entity_type: &str,
        locale: &str,
        field: Option<&str>,
    ) -> Result<Vec<i64>> {
        self.validator.ensure_locale(locale)?;
        let result = self
            .store
            .entities_with_translation(entity_type, locale, field);
        self.fail_soft(
            result,
            "entities_with_translation",
            &format!("{} [{}]", entity_type, locale),
        )
    }

    /// Subset of `entity_ids` lacking a record in `locale`.
    pub fn entities_missing_translation(
        &self,
        entity_type: &str,
        entity_ids: &[i64],
        locale: &str,
    ) -> Result<Vec<i64>> {
        self.validator.ensure_locale(locale)?;
        match self
            .store
            .entities_missing_translation(entity_type, entity_ids, locale)
        {
            Ok(ids) => Ok(ids),
            Err(e) if e.is_caller_error() => Err(e),
            Err(e) => {
                // Without storage every candidate counts as untranslated
                self.cache.metrics().record_storage_failure();
                warn!(
                    entity_type = %entity_type,
                    locale = %locale,
                    error = %e,
                    "Missing-translation query failed"
                );
                Ok(entity_ids.to_vec())
            }
        }
    }

    /// Ids of entities whose searchable `field` equals `value`.
    pub fn find_by_field(
        &self,
        entity_type: &str,
        locale: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<i64>> {
        self.validator.ensure_locale(locale)?;
        let result = self.store.find_by_field(entity_type, locale, field, value);
        self.fail_soft(
            result,
            "find_by_field",
            &format!("{} [{}] {}", entity_type, locale, field),
        )
    }

    /// Delete the entity's translations (one locale or all) and drop every
    /// cache key derived from them.
    pub fn delete_translations(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: Option<&str>,
    ) -> Result<Vec<String>> {
        if let Some(locale) = locale {
            self.validator.ensure_locale(locale)?;
        }

        let removed = self.store.delete(entity_type, entity_id, locale)?;
        let fields: Vec<String> = self
            .classifier()
            .searchable()
            .iter()
            .chain(self.classifier().large().iter())
            .cloned()
            .collect();
        for locale in &removed {
            self.cache
                .invalidate_record(entity_type, entity_id, locale, &fields);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslationError;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    fn create_test_service() -> (TranslationService, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = TranslationConfig {
            database_path: temp_dir
                .path()
                .join("service.db")
                .to_str()
                .unwrap()
                .to_string(),
            ..TranslationConfig::default()
        };
        let service = TranslationService::open(config).expect("Failed to open service");
        (service, temp_dir)
    }

    /// Break the backing table behind the service's back
    fn drop_table(temp_dir: &TempDir) {
        let conn = rusqlite::Connection::open(temp_dir.path().join("service.db")).unwrap();
        conn.execute("DROP TABLE translations", []).unwrap();
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_invalid_locale_fails_hard_and_is_not_cached() {
        let (service, _temp_dir) = create_test_service();

        let result = service.get("post", 1, "de", "title");
        assert!(matches!(result, Err(TranslationError::InvalidLocale { .. })));
        assert!(matches!(
            service.set("post", 1, "de", "title", Some("x")),
            Err(TranslationError::InvalidLocale { .. })
        ));
        assert_eq!(service.cache().metrics().cache_writes(), 0);
    }

    #[test]
    fn test_unknown_field_read_is_empty_and_uncached() {
        let (service, _temp_dir) = create_test_service();

        assert_eq!(service.get("post", 1, "en", "price").unwrap(), None);
        assert_eq!(service.cache().metrics().cache_misses(), 0);
    }

    #[test]
    fn test_unknown_field_write_is_recoverable() {
        let (service, _temp_dir) = create_test_service();

        let err = service
            .set("post", 1, "en", "price", Some("9"))
            .unwrap_err();
        assert!(err.is_caller_error());
        assert!(service.available_locales("post", 1).unwrap().is_empty());
    }

    // ==================== Cache Coherence Tests ====================

    #[test]
    fn test_set_invalidates_cached_field() {
        let (service, _temp_dir) = create_test_service();

        assert_eq!(service.get("post", 1, "en", "title").unwrap(), None);
        service.set("post", 1, "en", "title", Some("First")).unwrap();
        assert_eq!(
            service.get("post", 1, "en", "title").unwrap(),
            Some("First".to_string())
        );

        service.set("post", 1, "en", "title", Some("Second")).unwrap();
        assert_eq!(
            service.get("post", 1, "en", "title").unwrap(),
            Some("Second".to_string())
        );
    }

    #[test]
    fn test_bulk_set_invalidates_all_key() {
        let (service, _temp_dir) = create_test_service();

        assert!(service.get_all("post", 1, "en").unwrap().is_empty());

        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), Some("T".to_string()));
        fields.insert("content".to_string(), Some("C".to_string()));
        service.bulk_set("post", 1, "en", &fields).unwrap();

        let all = service.get_all("post", 1, "en").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_field_named_all_is_rejected_at_open() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = TranslationConfig::default();
        config.database_path = temp_dir.path().join("all.db").to_string_lossy().into_owned();
        config.large_fields.push("all".to_string());

        assert!(matches!(
            TranslationService::open(config),
            Err(TranslationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_repeated_reads_hit_cache() {
        let (service, _temp_dir) = create_test_service();
        service.set("post", 1, "en", "title", Some("T")).unwrap();

        service.get("post", 1, "en", "title").unwrap();
        service.get("post", 1, "en", "title").unwrap();

        assert_eq!(service.cache().metrics().cache_misses(), 1);
        assert_eq!(service.cache().metrics().cache_hits(), 1);
    }

    #[test]
    fn test_bulk_get_is_invalidated_by_write() {
        let (service, _temp_dir) = create_test_service();
        let entities = vec![EntityRef::new("post", 1), EntityRef::new("post", 2)];
        service.set("post", 1, "en", "title", Some("One")).unwrap();

        let before = service.bulk_get(&entities, "en", &[]).unwrap();
        assert!(before[1].translations.is_empty());

        service.set("post", 2, "en", "title", Some("Two")).unwrap();
        let after = service.bulk_get(&entities, "en", &[]).unwrap();
        assert_eq!(after[1].translations.get("title"), Some(&"Two".to_string()));
    }

    #[test]
    fn test_delete_translations_invalidates() {
        let (service, _temp_dir) = create_test_service();
        service.set("post", 1, "en", "title", Some("T")).unwrap();
        assert!(service.get("post", 1, "en", "title").unwrap().is_some());

        let removed = service.delete_translations("post", 1, None).unwrap();
        assert_eq!(removed, vec!["en"]);
        assert_eq!(service.get("post", 1, "en", "title").unwrap(), None);
    }

    // ==================== Failure Semantics Tests ====================

    #[test]
    fn test_storage_failure_on_read_is_soft() {
        let (service, temp_dir) = create_test_service();
        drop_table(&temp_dir);

        assert_eq!(service.get("post", 1, "en", "title").unwrap(), None);
        assert!(service.get_all("post", 1, "en").unwrap().is_empty());
        assert!(service.available_locales("post", 1).unwrap().is_empty());
        assert!(service.cache().metrics().storage_failures() >= 3);
    }

    #[test]
    fn test_storage_failure_on_read_is_not_cached() {
        let (service, temp_dir) = create_test_service();
        drop_table(&temp_dir);

        service.get("post", 1, "en", "title").unwrap();
        assert_eq!(service.cache().metrics().cache_writes(), 0);
    }

    #[test]
    fn test_storage_failure_on_write_propagates() {
        let (service, temp_dir) = create_test_service();
        drop_table(&temp_dir);

        let err = service
            .set("post", 1, "en", "title", Some("lost"))
            .unwrap_err();
        assert!(matches!(err, TranslationError::Storage(_)));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_bulk_get_soft_failure_keeps_one_entry_per_input() {
        let (service, temp_dir) = create_test_service();
        drop_table(&temp_dir);

        let entities = vec![EntityRef::new("post", 1), EntityRef::new("page", 2)];
        let result = service.bulk_get(&entities, "en", &[]).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|entry| entry.translations.is_empty()));
    }

    #[test]
    fn test_missing_translation_soft_failure_returns_all_candidates() {
        let (service, temp_dir) = create_test_service();
        drop_table(&temp_dir);

        let missing = service
            .entities_missing_translation("post", &[1, 2], "en")
            .unwrap();
        assert_eq!(missing, vec![1, 2]);
    }

    // ==================== Statistics Tests ====================

    #[test]
    fn test_count_by_locale_defaults_to_supported() {
        let (service, _temp_dir) = create_test_service();
        service.set("post", 1, "ar", "title", Some("a")).unwrap();

        let counts = service.count_by_locale("post", None).unwrap();
        assert_eq!(counts.len(), service.config().supported_locales.len());
        assert_eq!(counts.get("ar"), Some(&1));
        assert_eq!(counts.get("en"), Some(&0));
    }

    #[test]
    fn test_count_by_locale_rejects_unsupported() {
        let (service, _temp_dir) = create_test_service();
        let result = service.count_by_locale("post", Some(&["xx".to_string()]));
        assert!(matches!(result, Err(TranslationError::InvalidLocale { .. })));
    }

    #[test]
    fn test_preload_keys_by_entity() {
        let (service, _temp_dir) = create_test_service();
        service.set("post", 1, "fr", "title", Some("Un")).unwrap();

        let preloaded = service
            .preload(&[EntityRef::new("post", 1)], "fr", &[])
            .unwrap();
        assert_eq!(
            preloaded[&EntityRef::new("post", 1)].get("title"),
            Some(&"Un".to_string())
        );
    }
}
