//! Translation cache layer.
//!
//! A key-value cache fronting single-field, whole-record and bulk reads.
//! Keys follow `{prefix}.{entity_type}.{entity_id}.{locale}.{field|all}`,
//! so `all` is never a field name. Bulk keys fold in a blake3 fingerprint of the requested entities and
//! fields. Writes invalidate explicitly. The TTL only backs up missed
//! invalidations.

use crate::config::CacheSettings;
use crate::db::{EntityRef, EntityTranslations};
use crate::error::Result;
use crate::i18n::TranslationMetrics;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Value stored in the cache. `Missing` records a negative lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Missing,
    Text(String),
    Fields(BTreeMap<String, String>),
    Bulk(Vec<EntityTranslations>),
}

impl CachedValue {
    pub fn from_text(value: Option<String>) -> Self {
        match value {
            Some(text) => CachedValue::Text(text),
            None => CachedValue::Missing,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            CachedValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        match self {
            CachedValue::Fields(fields) => fields,
            _ => BTreeMap::new(),
        }
    }

    pub fn into_bulk(self) -> Vec<EntityTranslations> {
        match self {
            CachedValue::Bulk(entries) => entries,
            _ => Vec::new(),
        }
    }
}

/// Backend holding cache entries. Implementations must honour the TTL.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedValue>;
    fn put(&self, key: &str, value: CachedValue, ttl: Duration);
    /// Remove one entry, returning whether it existed.
    fn forget(&self, key: &str) -> bool;
    fn clear(&self);
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: CachedValue,
    expires_at: Instant,
}

/// Expired entries are swept once per this many writes.
const SWEEP_EVERY: usize = 256;

/// Process-local cache store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read()
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Entries held, expired or not.
    #[cfg(test)]
    fn stored(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedValue> {
        {
            let entries = self.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        // A put may have landed between the two locks
        let mut entries = self.write();
        if matches!(entries.get(key), Some(entry) if entry.expires_at <= Instant::now()) {
            entries.remove(key);
        }
        None
    }

    fn put(&self, key: &str, value: CachedValue, ttl: Duration) {
        self.write().insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!(purged = purged, "Swept expired translation cache entries");
            }
        }
    }

    fn forget(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    fn clear(&self) {
        self.write().clear();
    }
}

/// Last key segment of whole-record entries.
pub(crate) const RECORD_KEY_SEGMENT: &str = "all";

/// Deterministic cache key builder.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn field(&self, entity_type: &str, entity_id: i64, locale: &str, field: &str) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.prefix, entity_type, entity_id, locale, field
        )
    }

    pub fn all(&self, entity_type: &str, entity_id: i64, locale: &str) -> String {
        self.field(entity_type, entity_id, locale, RECORD_KEY_SEGMENT)
    }

    /// Key for a bulk read, unique per (entity list, field list, locale).
    pub fn bulk(&self, entities: &[EntityRef], locale: &str, fields: &[String]) -> String {
        let mut hasher = blake3::Hasher::new();
        for entity in entities {
            hasher.update(entity.entity_type.as_bytes());
            hasher.update(&[0]);
            hasher.update(&entity.entity_id.to_le_bytes());
        }
        hasher.update(&[0xff]);
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update(&[0]);
        }
        let hex = hasher.finalize().to_hex();

        format!("{}.bulk.{}.{}", self.prefix, locale, &hex.as_str()[..16])
    }
}

fn record_fingerprint(entity_type: &str, entity_id: i64, locale: &str) -> String {
    format!("{}.{}.{}", entity_type, entity_id, locale)
}

#[derive(Debug)]
struct BulkEntry {
    records: Vec<String>,
    expires_at: Instant,
}

/// Two-way index between bulk keys and the records they cover.
#[derive(Debug, Default)]
struct BulkIndex {
    /// Record fingerprint -> bulk keys whose result includes that record
    by_record: HashMap<String, HashSet<String>>,
    by_key: HashMap<String, BulkEntry>,
    registrations: usize,
}

impl BulkIndex {
    fn register(&mut self, key: &str, records: Vec<String>, expires_at: Instant) {
        self.remove_key(key);
        for record in &records {
            self.by_record
                .entry(record.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.by_key
            .insert(key.to_string(), BulkEntry { records, expires_at });
        self.registrations += 1;
    }

    /// Unlink `key` from every record it covers.
    fn remove_key(&mut self, key: &str) -> bool {
        let Some(entry) = self.by_key.remove(key) else {
            return false;
        };
        for record in &entry.records {
            if let Some(keys) = self.by_record.get_mut(record) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_record.remove(record);
                }
            }
        }
        true
    }

    /// Remove and return every bulk key covering `record`.
    fn take_for_record(&mut self, record: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .by_record
            .get(record)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            self.remove_key(key);
        }
        keys
    }

    /// Unlink `key` unless it was re-registered after `now`.
    fn remove_if_expired(&mut self, key: &str, now: Instant) -> bool {
        match self.by_key.get(key) {
            Some(entry) if entry.expires_at <= now => self.remove_key(key),
            _ => false,
        }
    }

    fn expired_keys(&self, now: Instant) -> Vec<String> {
        self.by_key
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn clear(&mut self) {
        self.by_record.clear();
        self.by_key.clear();
    }
}

/// Cache front for the translation store.
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
    keys: CacheKeys,
    metrics: TranslationMetrics,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    bulk_index: Mutex<BulkIndex>,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self {
            keys: CacheKeys::new(settings.prefix.clone()),
            store,
            settings,
            metrics: TranslationMetrics::new(),
            key_locks: Mutex::new(HashMap::new()),
            bulk_index: Mutex::new(BulkIndex::default()),
        }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.metrics
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Return the cached value for `key`, or run `producer` and cache its
    /// result (including `Missing`).
    ///
    /// Concurrent misses on the same key run the producer once; the others
    /// wait and read the stored value. Producer errors are returned and
    /// nothing is cached.
    ///
    /// The producer runs under the per-key lock, and invalidation forgets
    /// keys under the same lock. A value produced from a row read before a
    /// concurrent write therefore cannot outlive that write's invalidation.
    pub fn remember<F>(&self, key: &str, producer: F) -> Result<CachedValue>
    where
        F: FnOnce() -> Result<CachedValue>,
    {
        if !self.settings.enabled {
            return producer();
        }

        if let Some(value) = self.store.get(key) {
            self.metrics.record_cache_hit();
            debug!(key = %key, "Translation cache hit");
            return Ok(value);
        }

        let key_lock = self.key_lock(key);
        let result = {
            let _guard = key_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

            if let Some(value) = self.store.get(key) {
                self.metrics.record_cache_hit();
                Ok(value)
            } else {
                self.metrics.record_cache_miss();
                debug!(key = %key, "Translation cache miss");
                producer().map(|value| {
                    self.store.put(key, value.clone(), self.settings.ttl());
                    self.metrics.record_cache_write();
                    value
                })
            }
        };
        self.release_key_lock(key, key_lock);

        result
    }

    /// Remove one key.
    pub fn forget(&self, key: &str) -> bool {
        if !self.settings.enabled {
            return false;
        }
        self.bulk_index().remove_key(key);
        let removed = self.forget_locked(key);
        self.metrics.record_invalidations(1);
        removed
    }

    /// Remember that a bulk key covers these records, so writes to any of
    /// them drop the bulk entry too.
    ///
    /// Registrations outlive their cache entry by at most one TTL; expired
    /// ones are swept every few registrations.
    pub fn register_bulk_key(&self, key: &str, entities: &[EntityRef], locale: &str) {
        if !self.settings.enabled {
            return;
        }
        let records = entities
            .iter()
            .map(|entity| record_fingerprint(&entity.entity_type, entity.entity_id, locale))
            .collect();

        let sweep = {
            let mut index = self.bulk_index();
            index.register(key, records, Instant::now() + self.settings.ttl());
            index.registrations % SWEEP_EVERY == 0
        };
        if sweep {
            self.purge_bulk_index();
        }
    }

    /// Drop bulk registrations whose TTL has passed and whose cache entry
    /// is gone. Returns the number of bulk keys unlinked.
    pub fn purge_bulk_index(&self) -> usize {
        let now = Instant::now();
        let candidates = self.bulk_index().expired_keys(now);
        let stale: Vec<String> = candidates
            .into_iter()
            .filter(|key| self.store.get(key).is_none())
            .collect();

        let mut index = self.bulk_index();
        let purged = stale
            .iter()
            .filter(|key| index.remove_if_expired(key, now))
            .count();
        if purged > 0 {
            debug!(purged = purged, "Swept expired bulk cache registrations");
        }
        purged
    }

    /// Records currently linked to at least one bulk key.
    pub fn bulk_index_len(&self) -> usize {
        self.bulk_index().by_record.len()
    }

    /// Invalidate every key derived from one record: the `all` key, the
    /// per-field keys for `fields`, and any bulk key covering the record.
    ///
    /// Returns the number of keys forgotten.
    pub fn invalidate_record(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        fields: &[String],
    ) -> usize {
        if !self.settings.enabled {
            return 0;
        }

        let mut keys: Vec<String> = Vec::with_capacity(fields.len() + 1);
        keys.push(self.keys.all(entity_type, entity_id, locale));
        keys.extend(
            fields
                .iter()
                .map(|field| self.keys.field(entity_type, entity_id, locale, field)),
        );
        let bulk_keys = self
            .bulk_index()
            .take_for_record(&record_fingerprint(entity_type, entity_id, locale));
        keys.extend(bulk_keys);

        for key in &keys {
            self.forget_locked(key);
        }
        self.metrics.record_invalidations(keys.len());
        debug!(
            entity_type = %entity_type,
            entity_id = entity_id,
            locale = %locale,
            keys = keys.len(),
            "Invalidated translation cache keys"
        );
        keys.len()
    }

    /// Drop everything, including the bulk index.
    pub fn flush(&self) {
        self.store.clear();
        self.bulk_index().clear();
    }

    /// Forget `key` once any in-flight producer for it has stored its value.
    fn forget_locked(&self, key: &str) -> bool {
        let key_lock = self.key_lock(key);
        let removed = {
            let _guard = key_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.store.forget(key)
        };
        self.release_key_lock(key, key_lock);
        removed
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_key_lock(&self, key: &str, key_lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks();
        // One reference in the map plus ours: nobody else is waiting
        if Arc::strong_count(&key_lock) <= 2 {
            locks.remove(key);
        }
        // Release our handle while the map is still locked
        drop(key_lock);
    }

    fn key_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.key_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bulk_index(&self) -> MutexGuard<'_, BulkIndex> {
        self.bulk_index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
