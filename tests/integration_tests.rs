//! Integration tests for the translation engine
//!
//! These tests drive the public API end to end against a real SQLite file
//! in a temporary directory: validation, round-trips through both storage
//! classes, cache coherence, bulk reads and the resolver's fallback and
//! flush behavior.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use entity_translations::i18n::{validate_field, ValidationMode};
use entity_translations::{
    EntityRef, Translatable, TranslationConfig, TranslationError, TranslationInput,
    TranslationResolver, TranslationService,
};

// ==================== Test Helpers ====================

struct Article {
    id: Option<i64>,
}

impl Translatable for Article {
    fn entity_type(&self) -> &str {
        "article"
    }

    fn entity_id(&self) -> Option<i64> {
        self.id
    }

    fn translatable_fields(&self) -> Option<Vec<String>> {
        Some(vec![
            "title".to_string(),
            "slug".to_string(),
            "description".to_string(),
            "content".to_string(),
        ])
    }
}

/// Config with "ar" as default locale, stored under `temp_dir`
fn create_test_config(temp_dir: &TempDir) -> TranslationConfig {
    TranslationConfig {
        database_path: temp_dir
            .path()
            .join("translations.db")
            .to_string_lossy()
            .into_owned(),
        default_locale: "ar".to_string(),
        supported_locales: vec!["ar".to_string(), "en".to_string(), "fr".to_string()],
        ..TranslationConfig::default()
    }
}

fn create_test_service(temp_dir: &TempDir) -> Arc<TranslationService> {
    Arc::new(TranslationService::open(create_test_config(temp_dir)).expect("Failed to open service"))
}

// ==================== Validation Tests ====================

#[test]
fn test_unsupported_locales_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    let validator = service.validator();

    for locale in ["de", "EN", "", "en-US", "xx"] {
        let result = validator.validate_locale(locale, ValidationMode::Strict);
        assert!(
            matches!(result, Err(TranslationError::InvalidLocale { .. })),
            "{:?} should be rejected",
            locale
        );
    }
    for locale in ["ar", "en", "fr"] {
        assert!(validator.validate_locale(locale, ValidationMode::Strict).unwrap());
    }
}

#[test]
fn test_fields_outside_list_are_rejected() {
    let allowed = vec!["title".to_string(), "content".to_string()];
    for field in ["color", "Title", "", "slug"] {
        assert!(matches!(
            validate_field(field, &allowed, ValidationMode::Strict),
            Err(TranslationError::InvalidField { .. })
        ));
    }
    assert!(validate_field("title", &allowed, ValidationMode::Strict).unwrap());
}

#[test]
fn test_ambiguous_field_configuration_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(&temp_dir);
    config.large_fields.push("title".to_string());

    assert!(matches!(
        TranslationService::open(config),
        Err(TranslationError::AmbiguousField { .. })
    ));
}

// ==================== Storage Round-Trip Tests ====================

#[test]
fn test_round_trip_for_every_configured_field() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    let config = service.config().clone();

    let fields: Vec<&String> = config
        .searchable_fields
        .iter()
        .chain(config.large_fields.iter())
        .collect();
    for (i, field) in fields.iter().enumerate() {
        let value = format!("value of {} #{}", field, i);
        service.set("article", 7, "en", field, Some(&value)).unwrap();
        assert_eq!(
            service.get("article", 7, "en", field).unwrap(),
            Some(value),
            "round-trip failed for {}",
            field
        );
    }
}

#[test]
fn test_translations_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let service = create_test_service(&temp_dir);
        service.set("article", 1, "fr", "title", Some("Titre")).unwrap();
        service.set("article", 1, "fr", "content", Some("Corps")).unwrap();
    }

    let service = create_test_service(&temp_dir);
    let all = service.get_all("article", 1, "fr").unwrap();
    assert_eq!(all.get("title"), Some(&"Titre".to_string()));
    assert_eq!(all.get("content"), Some(&"Corps".to_string()));
}

#[test]
fn test_get_all_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "en", "title", Some("T")).unwrap();
    service.set("article", 1, "en", "body", Some("B")).unwrap();

    let first = service.get_all("article", 1, "en").unwrap();
    let second = service.get_all("article", 1, "en").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

// ==================== Cache Coherence Tests ====================

#[test]
fn test_write_invalidates_every_derived_read() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    let entities = vec![EntityRef::new("article", 1), EntityRef::new("article", 2)];

    service.set("article", 1, "en", "title", Some("Old")).unwrap();
    service.set("article", 1, "en", "content", Some("Old body")).unwrap();

    // Warm field, record and bulk keys
    assert_eq!(service.get("article", 1, "en", "title").unwrap(), Some("Old".to_string()));
    assert_eq!(service.get_all("article", 1, "en").unwrap()["content"], "Old body");
    assert_eq!(service.bulk_get(&entities, "en", &[]).unwrap()[0].translations["title"], "Old");

    service.set("article", 1, "en", "title", Some("New")).unwrap();
    service.set("article", 1, "en", "content", Some("New body")).unwrap();

    assert_eq!(service.get("article", 1, "en", "title").unwrap(), Some("New".to_string()));
    assert_eq!(service.get_all("article", 1, "en").unwrap()["content"], "New body");
    assert_eq!(service.bulk_get(&entities, "en", &[]).unwrap()[0].translations["title"], "New");
}

#[test]
fn test_cached_negative_lookup_is_invalidated() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);

    assert_eq!(service.get("article", 3, "fr", "slug").unwrap(), None);
    service.set("article", 3, "fr", "slug", Some("bonjour")).unwrap();
    assert_eq!(
        service.get("article", 3, "fr", "slug").unwrap(),
        Some("bonjour".to_string())
    );
}

#[test]
fn test_concurrent_readers_see_consistent_value() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "en", "title", Some("Shared")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || service.get("article", 1, "en", "title").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some("Shared".to_string()));
    }
    assert_eq!(service.cache().metrics().cache_misses(), 1);
}

// ==================== Bulk Read Tests ====================

#[test]
fn test_bulk_get_matches_individual_reads() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "en", "title", Some("One")).unwrap();
    service.set("article", 1, "en", "content", Some("Body one")).unwrap();
    service.set("article", 2, "en", "slug", Some("two")).unwrap();

    let entities = vec![
        EntityRef::new("article", 1),
        EntityRef::new("article", 2),
        EntityRef::new("article", 3),
    ];
    let entries = service.bulk_get(&entities, "en", &[]).unwrap();

    assert_eq!(entries.len(), entities.len());
    for (entry, entity) in entries.iter().zip(&entities) {
        assert_eq!(entry.entity_id, entity.entity_id);
        assert_eq!(entry.locale, "en");
        assert_eq!(
            entry.translations,
            service.get_all("article", entity.entity_id, "en").unwrap()
        );
    }
}

#[test]
fn test_preload_keys_by_entity() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 5, "ar", "title", Some("خمسة")).unwrap();

    let preloaded = service
        .preload(&[EntityRef::new("article", 5)], "ar", &["title".to_string()])
        .unwrap();
    assert_eq!(preloaded[&EntityRef::new("article", 5)]["title"], "خمسة");
}

// ==================== Resolver Tests ====================

#[test]
fn test_resolver_falls_back_to_default_locale() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "ar", "title", Some("عنوان")).unwrap();

    let resolver = TranslationResolver::new(service, &Article { id: Some(1) }, "fr").unwrap();
    assert_eq!(
        resolver.get_translation("title", None).unwrap(),
        Some("عنوان".to_string())
    );
}

#[test]
fn test_flush_skips_empty_locale_and_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "ar", "title", Some("افتراضي")).unwrap();

    let mut resolver = TranslationResolver::new(service.clone(), &Article { id: Some(1) }, "en").unwrap();
    resolver
        .set_translation("title", "Hello", Some("en"))
        .unwrap()
        .set_translation("title", "", Some("fr"))
        .unwrap();
    let report = resolver.save_translations().unwrap();

    assert_eq!(report.saved, vec!["en"]);
    assert_eq!(report.skipped, vec!["fr"]);
    assert_eq!(service.available_locales("article", 1).unwrap(), vec!["ar", "en"]);
    assert_eq!(
        resolver.get_translation("title", Some("fr")).unwrap(),
        Some("افتراضي".to_string())
    );
    assert_eq!(
        resolver.get_translation("title", Some("en")).unwrap(),
        Some("Hello".to_string())
    );
}

#[test]
fn test_translate_to_flat_is_set_translations() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);

    let mut via_translate =
        TranslationResolver::new(service.clone(), &Article { id: Some(1) }, "en").unwrap();
    via_translate
        .translate_to(TranslationInput::Flat(BTreeMap::from([
            ("title".to_string(), "T".to_string()),
            ("slug".to_string(), "s".to_string()),
        ])))
        .unwrap();
    via_translate.save_translations().unwrap();
    let translated = service.get_all("article", 1, "en").unwrap();

    let mut via_set = TranslationResolver::new(service.clone(), &Article { id: Some(2) }, "fr").unwrap();
    via_set
        .set_translations([("title", "T"), ("slug", "s")], Some("en"))
        .unwrap();
    via_set.save_translations().unwrap();

    assert_eq!(translated, service.get_all("article", 2, "en").unwrap());
}

#[test]
fn test_new_entity_flushes_after_id_is_attached() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    let mut resolver = TranslationResolver::new(service.clone(), &Article { id: None }, "fr").unwrap();

    resolver
        .set_for_locale("fr", [("title", "Brouillon"), ("content", "Texte")])
        .unwrap();
    assert!(resolver.save_translations().unwrap().deferred);

    resolver.attach_entity_id(99);
    resolver.save_translations().unwrap();

    let record = service.find_record("article", 99, "fr").unwrap().unwrap();
    assert_eq!(record.searchable_fields["title"], Some("Brouillon".to_string()));
    assert_eq!(record.large_fields["content"], "Texte");
}

// ==================== Statistics Tests ====================

#[test]
fn test_statistics_and_missing_translations() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "en", "title", Some("a")).unwrap();
    service.set("article", 2, "en", "title", Some("b")).unwrap();
    service.set("article", 2, "fr", "title", Some("c")).unwrap();

    let counts = service.count_by_locale("article", None).unwrap();
    assert_eq!(counts["en"], 2);
    assert_eq!(counts["fr"], 1);
    assert_eq!(counts["ar"], 0);

    assert_eq!(
        service.entities_missing_translation("article", &[1, 2, 3], "fr").unwrap(),
        vec![1, 3]
    );
    assert_eq!(
        service.entities_with_translation("article", "en", Some("title")).unwrap(),
        vec![1, 2]
    );
}

#[test]
fn test_delete_translations_clears_reads() {
    let temp_dir = TempDir::new().unwrap();
    let service = create_test_service(&temp_dir);
    service.set("article", 1, "en", "title", Some("Gone")).unwrap();
    assert!(service.get("article", 1, "en", "title").unwrap().is_some());

    let removed = service.delete_translations("article", 1, None).unwrap();
    assert_eq!(removed, vec!["en"]);
    assert_eq!(service.get("article", 1, "en", "title").unwrap(), None);
}
