use crate::config::TranslationConfig;
use crate::error::{Result, TranslationError};
use crate::i18n::{FieldClassifier, FieldKind};
use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Maximum number of entities per bulk query (two bound parameters each).
const BULK_CHUNK_SIZE: usize = 200;

/// Identity of a translatable entity: its kind plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }
}

/// One stored row: all translations of one entity in one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRecord {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub locale: String,
    /// Searchable columns in configured order, `None` when unset
    pub searchable_fields: BTreeMap<String, Option<String>>,
    /// Large fields unpacked from the JSON column
    pub large_fields: BTreeMap<String, String>,
    /// Legacy key/value pair from the previous schema
    pub key: Option<String>,
    pub value: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TranslationRecord {
    /// Every populated field: searchable columns first, large fields merged in.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields: BTreeMap<String, String> = self
            .searchable_fields
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.clone(), v.clone())))
            .collect();
        fields.extend(self.large_fields.clone());
        fields
    }
}

/// Translations of one entity in one locale, as returned by bulk reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTranslations {
    pub entity_type: String,
    pub entity_id: i64,
    pub locale: String,
    pub translations: BTreeMap<String, String>,
}

/// Outcome of a multi-field write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteReport {
    /// Fields written (set or cleared)
    pub written: Vec<String>,
    /// Unknown fields that were skipped
    pub skipped: Vec<String>,
}

impl BulkWriteReport {
    pub fn wrote_anything(&self) -> bool {
        !self.written.is_empty()
    }
}

/// SQLite-backed translation table plus its read view.
///
/// One row per (entity type, entity id, locale). Searchable fields are
/// columns; large fields share one JSON column.
#[derive(Clone)]
pub struct TranslationStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    view: String,
    use_view: bool,
    classifier: FieldClassifier,
    select_columns: String,
}

impl TranslationStore {
    /// Open the database file and create the schema if needed.
    pub fn open(config: &TranslationConfig) -> Result<Self> {
        config.validate()?;
        let conn = Connection::open(&config.database_path)?;
        info!(path = %config.database_path, "Opened translation database");
        Self::with_connection(conn, config)
    }

    /// In-memory database, mostly for tests and tooling.
    pub fn open_in_memory(config: &TranslationConfig) -> Result<Self> {
        config.validate()?;
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: &TranslationConfig) -> Result<Self> {
        let classifier = FieldClassifier::from_config(config)?;
        let table = config.table_name.clone();
        let view = format!("{}_view", table);

        let mut columns = vec![
            "id".to_string(),
            "entity_type".to_string(),
            "entity_id".to_string(),
            "locale".to_string(),
        ];
        columns.extend(classifier.searchable().iter().map(|f| quote(f)));
        columns.extend(
            ["large_fields", "\"key\"", "\"value\"", "created_at", "updated_at"]
                .iter()
                .map(|c| c.to_string()),
        );

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            table,
            view,
            use_view: config.use_view,
            classifier,
            select_columns: columns.join(", "),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock();
        let searchable_columns: String = self
            .classifier
            .searchable()
            .iter()
            .map(|f| format!("{} TEXT,\n", quote(f)))
            .collect();

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    entity_type TEXT NOT NULL,
                    entity_id INTEGER NOT NULL,
                    locale TEXT NOT NULL,
                    {searchable_columns}
                    large_fields TEXT,
                    \"key\" TEXT,
                    \"value\" TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                table = self.table,
                searchable_columns = searchable_columns,
            ),
            [],
        )?;

        // Tables created before a searchable field was configured
        let missing = Self::missing_columns(&conn, &self.table, self.classifier.searchable())?;
        for column in &missing {
            info!(table = %self.table, column = %column, "Adding searchable column");
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {} TEXT", self.table, quote(column)),
                [],
            )?;
        }

        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {t}_entity_locale_unique
                 ON {t} (entity_type, entity_id, locale)",
                t = self.table
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {t}_type_locale_idx ON {t} (entity_type, locale)",
                t = self.table
            ),
            [],
        )?;
        for field in ["slug", "title"] {
            if self.classifier.classify(field) == FieldKind::Searchable {
                conn.execute(
                    &format!(
                        "CREATE INDEX IF NOT EXISTS {t}_locale_{f}_idx ON {t} (locale, {qf})",
                        t = self.table,
                        f = field,
                        qf = quote(field)
                    ),
                    [],
                )?;
            }
        }

        // Recreated on every open so it always mirrors the current columns
        conn.execute(&format!("DROP VIEW IF EXISTS {}", self.view), [])?;
        conn.execute(
            &format!(
                "CREATE VIEW {view} AS SELECT {columns} FROM {table}",
                view = self.view,
                columns = self.select_columns,
                table = self.table
            ),
            [],
        )?;

        Ok(())
    }

    fn missing_columns(conn: &Connection, table: &str, wanted: &[String]) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let existing: HashSet<String> = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;

        Ok(wanted
            .iter()
            .filter(|column| !existing.contains(column.as_str()))
            .cloned()
            .collect())
    }

    /// Relation used for reads: the view or the base table.
    fn read_source(&self) -> &str {
        if self.use_view {
            &self.view
        } else {
            &self.table
        }
    }

    pub fn classifier(&self) -> &FieldClassifier {
        &self.classifier
    }

    fn row_to_record(&self, row: &Row<'_>) -> rusqlite::Result<TranslationRecord> {
        let searchable = self.classifier.searchable();
        let mut searchable_fields = BTreeMap::new();
        for (offset, name) in searchable.iter().enumerate() {
            searchable_fields.insert(name.clone(), row.get::<_, Option<String>>(4 + offset)?);
        }

        let base = 4 + searchable.len();
        let large_fields = parse_large_fields(row.get::<_, Option<String>>(base)?)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(base, Type::Text, Box::new(e)))?;

        Ok(TranslationRecord {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            locale: row.get(3)?,
            searchable_fields,
            large_fields,
            key: row.get(base + 1)?,
            value: row.get(base + 2)?,
            created_at: row.get(base + 3)?,
            updated_at: row.get(base + 4)?,
        })
    }

    /// Fetch the full record for (type, id, locale).
    pub fn find_record(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
    ) -> Result<Option<TranslationRecord>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM {} WHERE entity_type = ?1 AND entity_id = ?2 AND locale = ?3",
            self.select_columns,
            self.read_source()
        );
        let record = conn
            .query_row(&sql, params![entity_type, entity_id, locale], |row| {
                self.row_to_record(row)
            })
            .optional()?;
        Ok(record)
    }

    /// Read one field, routed to its column or to the large-field map.
    pub fn get(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        field: &str,
    ) -> Result<Option<String>> {
        let column = match self.classifier.classify(field) {
            FieldKind::Searchable => quote(field),
            FieldKind::Large => "large_fields".to_string(),
            FieldKind::Unknown => {
                debug!(field = %field, "Unknown field requested, nothing stored");
                return Ok(None);
            }
        };

        let conn = self.lock();
        let sql = format!(
            "SELECT {} FROM {} WHERE entity_type = ?1 AND entity_id = ?2 AND locale = ?3",
            column,
            self.read_source()
        );
        let raw: Option<String> = conn
            .query_row(&sql, params![entity_type, entity_id, locale], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten();

        match self.classifier.classify(field) {
            FieldKind::Large => Ok(parse_large_fields(raw)?.remove(field)),
            _ => Ok(raw),
        }
    }

    /// Every populated field of the record, empty when there is no record.
    pub fn get_all(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self
            .find_record(entity_type, entity_id, locale)?
            .map(|record| record.fields())
            .unwrap_or_default())
    }

    /// Write one field. `None` clears it.
    ///
    /// Unknown fields are not written and yield [`TranslationError::UnknownField`].
    pub fn set(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        field: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), value.map(|v| v.to_string()));

        let report = self.bulk_set(entity_type, entity_id, locale, &fields)?;
        if !report.skipped.is_empty() {
            return Err(TranslationError::UnknownField {
                field: field.to_string(),
            });
        }
        Ok(())
    }

    /// Write many fields of one record with a single read-modify-write.
    ///
    /// Large fields are merged into the existing JSON map; a `None` value
    /// removes the key. Unknown fields are skipped and reported.
    pub fn bulk_set(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        fields: &BTreeMap<String, Option<String>>,
    ) -> Result<BulkWriteReport> {
        let mut report = BulkWriteReport::default();
        let mut searchable_updates: Vec<(&str, Option<&str>)> = Vec::new();
        let mut large_updates: Vec<(&str, Option<&str>)> = Vec::new();

        for (field, value) in fields {
            match self.classifier.classify(field) {
                FieldKind::Searchable => searchable_updates.push((field.as_str(), value.as_deref())),
                FieldKind::Large => large_updates.push((field.as_str(), value.as_deref())),
                FieldKind::Unknown => {
                    warn!(
                        entity_type = %entity_type,
                        entity_id = entity_id,
                        locale = %locale,
                        field = %field,
                        "Skipping unknown translation field"
                    );
                    report.skipped.push(field.clone());
                    continue;
                }
            }
            report.written.push(field.clone());
        }

        if !report.wrote_anything() {
            return Ok(report);
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let merged_large = if large_updates.is_empty() {
            None
        } else {
            let existing: Option<String> = tx
                .query_row(
                    &format!(
                        "SELECT large_fields FROM {} WHERE entity_type = ?1 AND entity_id = ?2 AND locale = ?3",
                        self.table
                    ),
                    params![entity_type, entity_id, locale],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();

            let mut map = parse_large_fields(existing)?;
            for (field, value) in &large_updates {
                match value {
                    Some(v) => {
                        map.insert(field.to_string(), v.to_string());
                    }
                    None => {
                        map.remove(*field);
                    }
                }
            }
            Some(map)
        };

        let now = Utc::now().to_rfc3339();
        let mut columns: Vec<String> = vec![
            "entity_type".to_string(),
            "entity_id".to_string(),
            "locale".to_string(),
        ];
        let mut values: Vec<Value> = vec![
            Value::Text(entity_type.to_string()),
            Value::Integer(entity_id),
            Value::Text(locale.to_string()),
        ];
        let mut updates: Vec<String> = Vec::new();

        for (field, value) in &searchable_updates {
            let column = quote(field);
            updates.push(format!("{c} = excluded.{c}", c = column));
            columns.push(column);
            values.push(text_or_null(*value));
        }
        if let Some(map) = &merged_large {
            columns.push("large_fields".to_string());
            values.push(if map.is_empty() {
                Value::Null
            } else {
                Value::Text(serde_json::to_string(map)?)
            });
            updates.push("large_fields = excluded.large_fields".to_string());
        }
        columns.push("created_at".to_string());
        values.push(Value::Text(now.clone()));
        columns.push("updated_at".to_string());
        values.push(Value::Text(now));
        updates.push("updated_at = excluded.updated_at".to_string());

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {table} ({columns}) VALUES ({placeholders})
             ON CONFLICT (entity_type, entity_id, locale) DO UPDATE SET {updates}",
            table = self.table,
            columns = columns.join(", "),
            placeholders = placeholders.join(", "),
            updates = updates.join(", ")
        );
        tx.execute(&sql, params_from_iter(values.iter()))?;
        tx.commit()?;

        debug!(
            entity_type = %entity_type,
            entity_id = entity_id,
            locale = %locale,
            fields = ?report.written,
            "Upserted translation record"
        );
        Ok(report)
    }

    /// Write the legacy key/value pair kept from the previous schema.
    pub fn set_legacy_value(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            &format!(
                "INSERT INTO {} (entity_type, entity_id, locale, \"key\", \"value\", created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT (entity_type, entity_id, locale) DO UPDATE SET
                    \"key\" = excluded.\"key\",
                    \"value\" = excluded.\"value\",
                    updated_at = excluded.updated_at",
                self.table
            ),
            params![entity_type, entity_id, locale, key, value, now],
        )?;
        Ok(())
    }

    /// Fetch many entities' translations for one locale.
    ///
    /// Returns exactly one entry per input item, in input order. When
    /// `field_names` is non-empty only those fields are returned.
    pub fn bulk_get(
        &self,
        entities: &[EntityRef],
        locale: &str,
        field_names: &[String],
    ) -> Result<Vec<EntityTranslations>> {
        let mut unique: Vec<&EntityRef> = Vec::new();
        let mut seen: HashSet<&EntityRef> = HashSet::new();
        for entity in entities {
            if seen.insert(entity) {
                unique.push(entity);
            }
        }

        let mut found: HashMap<(String, i64), BTreeMap<String, String>> = HashMap::new();
        {
            let conn = self.lock();
            for chunk in unique.chunks(BULK_CHUNK_SIZE) {
                let mut values: Vec<Value> = vec![Value::Text(locale.to_string())];
                let mut clauses: Vec<String> = Vec::with_capacity(chunk.len());
                for entity in chunk {
                    clauses.push(format!(
                        "(entity_type = ?{} AND entity_id = ?{})",
                        values.len() + 1,
                        values.len() + 2
                    ));
                    values.push(Value::Text(entity.entity_type.clone()));
                    values.push(Value::Integer(entity.entity_id));
                }

                let sql = format!(
                    "SELECT {} FROM {} WHERE locale = ?1 AND ({})",
                    self.select_columns,
                    self.read_source(),
                    clauses.join(" OR ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params_from_iter(values.iter()), |row| self.row_to_record(row))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                for record in records {
                    found.insert(
                        (record.entity_type.clone(), record.entity_id),
                        record.fields(),
                    );
                }
            }
        }

        Ok(entities
            .iter()
            .map(|entity| {
                let mut translations = found
                    .get(&(entity.entity_type.clone(), entity.entity_id))
                    .cloned()
                    .unwrap_or_default();
                if !field_names.is_empty() {
                    translations.retain(|name, _| field_names.contains(name));
                }
                EntityTranslations {
                    entity_type: entity.entity_type.clone(),
                    entity_id: entity.entity_id,
                    locale: locale.to_string(),
                    translations,
                }
            })
            .collect())
    }

    /// Count distinct entities of a type having a record in each locale.
    ///
    /// Every requested locale appears in the result, with zero when absent.
    pub fn count_by_locale(
        &self,
        entity_type: &str,
        locales: &[String],
    ) -> Result<BTreeMap<String, u64>> {
        let mut counts: BTreeMap<String, u64> =
            locales.iter().map(|locale| (locale.clone(), 0)).collect();
        if locales.is_empty() {
            return Ok(counts);
        }

        let conn = self.lock();
        let placeholders: Vec<String> = (0..locales.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT locale, COUNT(DISTINCT entity_id) FROM {}
             WHERE entity_type = ?1 AND locale IN ({})
             GROUP BY locale",
            self.read_source(),
            placeholders.join(", ")
        );
        let mut values: Vec<Value> = vec![Value::Text(entity_type.to_string())];
        values.extend(locales.iter().map(|l| Value::Text(l.clone())));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (locale, count) = row?;
            counts.insert(locale, count as u64);
        }

        Ok(counts)
    }

    /// Locales that have a record for the entity, sorted.
    pub fn available_locales(&self, entity_type: &str, entity_id: i64) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT locale FROM {} WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY locale",
            self.read_source()
        ))?;
        let locales = stmt
            .query_map(params![entity_type, entity_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locales)
    }

    /// Ids of entities with a record in `locale`, optionally requiring a
    /// non-empty value for `field`.
    pub fn entities_with_translation(
        &self,
        entity_type: &str,
        locale: &str,
        field: Option<&str>,
    ) -> Result<Vec<i64>> {
        let condition = match field {
            None => String::new(),
            Some(field) => match self.classifier.classify(field) {
                FieldKind::Searchable => {
                    format!(" AND {c} IS NOT NULL AND {c} != ''", c = quote(field))
                }
                FieldKind::Large => format!(
                    " AND COALESCE(json_extract(large_fields, '$.{f}'), '') != ''",
                    f = field
                ),
                FieldKind::Unknown => {
                    return Err(TranslationError::UnknownField {
                        field: field.to_string(),
                    })
                }
            },
        };

        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT entity_id FROM {} WHERE entity_type = ?1 AND locale = ?2{} ORDER BY entity_id",
            self.read_source(),
            condition
        ))?;
        let ids = stmt
            .query_map(params![entity_type, locale], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Subset of `entity_ids` without any record in `locale`, in input order.
    pub fn entities_missing_translation(
        &self,
        entity_type: &str,
        entity_ids: &[i64],
        locale: &str,
    ) -> Result<Vec<i64>> {
        let mut present: HashSet<i64> = HashSet::new();
        {
            let conn = self.lock();
            for chunk in entity_ids.chunks(BULK_CHUNK_SIZE) {
                let placeholders: Vec<String> =
                    (0..chunk.len()).map(|i| format!("?{}", i + 3)).collect();
                let sql = format!(
                    "SELECT entity_id FROM {} WHERE entity_type = ?1 AND locale = ?2 AND entity_id IN ({})",
                    self.read_source(),
                    placeholders.join(", ")
                );
                let mut values: Vec<Value> = vec![
                    Value::Text(entity_type.to_string()),
                    Value::Text(locale.to_string()),
                ];
                values.extend(chunk.iter().map(|id| Value::Integer(*id)));

                let mut stmt = conn.prepare(&sql)?;
                let ids = stmt
                    .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                present.extend(ids);
            }
        }

        Ok(entity_ids
            .iter()
            .copied()
            .filter(|id| !present.contains(id))
            .collect())
    }

    /// Ids of entities whose searchable `field` equals `value` in `locale`.
    pub fn find_by_field(
        &self,
        entity_type: &str,
        locale: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<i64>> {
        match self.classifier.classify(field) {
            FieldKind::Searchable => {}
            FieldKind::Large => {
                return Err(TranslationError::invalid_field(
                    field,
                    self.classifier.searchable(),
                ))
            }
            FieldKind::Unknown => {
                return Err(TranslationError::UnknownField {
                    field: field.to_string(),
                })
            }
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT entity_id FROM {} WHERE entity_type = ?1 AND locale = ?2 AND {} = ?3 ORDER BY entity_id",
            self.read_source(),
            quote(field)
        ))?;
        let ids = stmt
            .query_map(params![entity_type, locale, value], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Delete the entity's records, in one locale or all. Returns the
    /// locales that were removed.
    pub fn delete(
        &self,
        entity_type: &str,
        entity_id: i64,
        locale: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let locales: Vec<String> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT locale FROM {} WHERE entity_type = ?1 AND entity_id = ?2 AND (?3 IS NULL OR locale = ?3)",
                self.table
            ))?;
            let rows = stmt
                .query_map(params![entity_type, entity_id, locale], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        tx.execute(
            &format!(
                "DELETE FROM {} WHERE entity_type = ?1 AND entity_id = ?2 AND (?3 IS NULL OR locale = ?3)",
                self.table
            ),
            params![entity_type, entity_id, locale],
        )?;
        tx.commit()?;

        Ok(locales)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn text_or_null(value: Option<&str>) -> Value {
    match value {
        Some(v) => Value::Text(v.to_string()),
        None => Value::Null,
    }
}

fn parse_large_fields(raw: Option<String>) -> serde_json::Result<BTreeMap<String, String>> {
    match raw {
        Some(json) if !json.trim().is_empty() => serde_json::from_str(&json),
        _ => Ok(BTreeMap::new()),
    }
}
