//! SQLite-backed offline store: typed source tables, batch ingest,
//! point-in-time-correct historical retrieval and saved datasets.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::{
    DataSource, FeatureRef, FeatureView, Registry, RegistryError, Value, ValueType,
};
use crate::validation::{check_bounds, IngestReport, ValidationPolicy};

#[derive(Debug, Error)]
pub enum OfflineStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown feature reference: {reference}")]
    UnknownFeature { reference: String },
    #[error("entity key {entity} missing from input row")]
    MissingEntityKey { entity: String },
    #[error("value for column {column} of {view} does not match its declared type")]
    ColumnType { view: String, column: String },
    #[error("ingest into {view} failed validation: {detail}")]
    Validation { view: String, detail: String },
    #[error("csv record {line} for {view} is malformed: {detail}")]
    CsvRecord {
        view: String,
        line: u64,
        detail: String,
    },
    #[error("saved dataset already exists: {0}")]
    DatasetExists(String),
    #[error("saved dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("saved dataset {name} is corrupt: {detail}")]
    DatasetCorrupt { name: String, detail: String },
}

/// One historical source row: entity key values, timestamps, feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub keys: BTreeMap<String, Value>,
    pub event_time_ms: i64,
    pub created_time_ms: Option<i64>,
    pub values: BTreeMap<String, Value>,
}

/// One retrieval request row: entity key values and the requested timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    pub keys: BTreeMap<String, Value>,
    pub event_time_ms: i64,
}

/// Feature columns resolved for a batch of entity rows, input order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDataset {
    pub name: String,
    pub feature_refs: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub fingerprint: String,
    pub created_ms: i64,
    pub tags: BTreeMap<String, String>,
}

pub struct OfflineStore {
    conn: Mutex<Connection>,
}

impl OfflineStore {
    pub fn open(path: &Path) -> Result<Self, OfflineStoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            ",
        )?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS saved_datasets (
                name TEXT NOT NULL,
                feature_refs TEXT NOT NULL,
                payload TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                created_ms INTEGER NOT NULL,
                tags TEXT NOT NULL,
                PRIMARY KEY(name)
            ) WITHOUT ROWID;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates the typed table backing a feature view's data source.
    pub fn ensure_source_table(
        &self,
        registry: &Registry,
        view: &FeatureView,
    ) -> Result<(), OfflineStoreError> {
        let source = registry.source(&view.source)?;

        let mut columns = Vec::new();
        for entity_name in &source.entity_columns {
            let entity = registry.entity(entity_name)?;
            columns.push(format!(
                "{} {} NOT NULL",
                entity.name,
                column_affinity(entity.value_type)
            ));
        }
        columns.push(format!("{} INTEGER NOT NULL", source.timestamp_column));
        if let Some(created) = &source.created_timestamp_column {
            columns.push(format!("{created} INTEGER NOT NULL DEFAULT 0"));
        }
        for field in &view.fields {
            columns.push(format!(
                "{} {}",
                field.name,
                column_affinity(field.value_type)
            ));
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY({}, {})) WITHOUT ROWID",
            source.table,
            columns.join(", "),
            source.entity_columns.join(", "),
            source.timestamp_column
        );

        let conn = self.lock_conn();
        conn.execute_batch(&ddl)?;
        Ok(())
    }

    /// Upserts source rows for one feature view in a single transaction,
    /// applying the view's bound rules under the given policy.
    pub fn ingest_rows(
        &self,
        registry: &Registry,
        view_name: &str,
        rows: &[SourceRow],
        policy: ValidationPolicy,
    ) -> Result<IngestReport, OfflineStoreError> {
        let view = registry.feature_view(view_name)?;
        let source = registry.source(&view.source)?;
        self.ensure_source_table(registry, view)?;

        let mut report = IngestReport::new(rows.len() as u64);
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&upsert_sql(source, view))?;

            for row in rows {
                if let Some(detail) = row_violation(registry, view, row)? {
                    match policy {
                        ValidationPolicy::Strict => {
                            return Err(OfflineStoreError::Validation {
                                view: view.name.clone(),
                                detail,
                            });
                        }
                        ValidationPolicy::ReportAndSkip => {
                            warn!(
                                component = "offline_store",
                                event = "ingest.row_skipped",
                                view = view_name,
                                detail = detail.as_str()
                            );
                            report.record_violation(detail);
                            continue;
                        }
                    }
                }

                let mut values = Vec::new();
                for entity_name in &source.entity_columns {
                    let value = row
                        .keys
                        .get(entity_name)
                        .ok_or_else(|| OfflineStoreError::MissingEntityKey {
                            entity: entity_name.clone(),
                        })?;
                    values.push(to_sql_value(value));
                }
                values.push(rusqlite::types::Value::Integer(row.event_time_ms));
                if source.created_timestamp_column.is_some() {
                    values.push(rusqlite::types::Value::Integer(
                        row.created_time_ms.unwrap_or(0),
                    ));
                }
                for field in &view.fields {
                    let value = row.values.get(&field.name).unwrap_or(&Value::Null);
                    values.push(to_sql_value(value));
                }

                stmt.execute(params_from_iter(values))?;
                report.ingested_rows += 1;
            }
        }
        tx.commit()?;

        info!(
            component = "offline_store",
            event = "ingest.finish",
            view = view_name,
            input_rows = report.input_rows,
            ingested_rows = report.ingested_rows,
            skipped_rows = report.skipped_rows
        );

        Ok(report)
    }

    /// Loads a CSV file into a feature view's source table. The header must
    /// carry the source's entity and timestamp columns plus the view fields;
    /// timestamps are accepted as epoch milliseconds or RFC 3339.
    pub fn ingest_csv(
        &self,
        registry: &Registry,
        view_name: &str,
        path: &Path,
        policy: ValidationPolicy,
    ) -> Result<IngestReport, OfflineStoreError> {
        let view = registry.feature_view(view_name)?;
        let source = registry.source(&view.source)?;

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let column_index = |name: &str| headers.iter().position(|header| header == name);

        let mut rows = Vec::new();
        for (record_idx, record) in reader.records().enumerate() {
            let record = record?;
            let line = record_idx as u64 + 2;
            let cell = |name: &str| -> Result<Option<&str>, OfflineStoreError> {
                match column_index(name) {
                    Some(idx) => Ok(record.get(idx)),
                    None => Err(OfflineStoreError::CsvRecord {
                        view: view_name.to_string(),
                        line,
                        detail: format!("missing column {name}"),
                    }),
                }
            };

            let mut keys = BTreeMap::new();
            for entity_name in &source.entity_columns {
                let entity = registry.entity(entity_name)?;
                let raw = cell(entity_name)?.unwrap_or_default();
                let value = parse_csv_value(raw, entity.value_type).ok_or_else(|| {
                    OfflineStoreError::CsvRecord {
                        view: view_name.to_string(),
                        line,
                        detail: format!("unparseable {entity_name} value {raw:?}"),
                    }
                })?;
                keys.insert(entity_name.clone(), value);
            }

            let raw_ts = cell(&source.timestamp_column)?.unwrap_or_default();
            let event_time_ms =
                parse_timestamp_ms(raw_ts).ok_or_else(|| OfflineStoreError::CsvRecord {
                    view: view_name.to_string(),
                    line,
                    detail: format!("unparseable timestamp {raw_ts:?}"),
                })?;

            let created_time_ms = match &source.created_timestamp_column {
                Some(created) => match cell(created)? {
                    Some(raw) if !raw.is_empty() => {
                        Some(parse_timestamp_ms(raw).ok_or_else(|| {
                            OfflineStoreError::CsvRecord {
                                view: view_name.to_string(),
                                line,
                                detail: format!("unparseable created timestamp {raw:?}"),
                            }
                        })?)
                    }
                    _ => None,
                },
                None => None,
            };

            let mut values = BTreeMap::new();
            for field in &view.fields {
                let raw = cell(&field.name)?.unwrap_or_default();
                let value = parse_csv_value(raw, field.value_type).ok_or_else(|| {
                    OfflineStoreError::CsvRecord {
                        view: view_name.to_string(),
                        line,
                        detail: format!("unparseable {} value {raw:?}", field.name),
                    }
                })?;
                values.insert(field.name.clone(), value);
            }

            rows.push(SourceRow {
                keys,
                event_time_ms,
                created_time_ms,
                values,
            });
        }

        self.ingest_rows(registry, view_name, &rows, policy)
    }

    /// Point-in-time join: for every entity row and requested view, selects
    /// the latest source row with `event_time <= requested_ts` whose age is
    /// within the view's TTL. No eligible row degrades to null values.
    pub fn get_historical_features(
        &self,
        registry: &Registry,
        entity_rows: &[EntityRow],
        feature_refs: &[FeatureRef],
    ) -> Result<HistoricalResult, OfflineStoreError> {
        let grouped = group_refs_by_view(registry, feature_refs)?;

        info!(
            component = "offline_store",
            event = "join.start",
            input_rows = entity_rows.len(),
            views = grouped.len(),
            feature_refs = feature_refs.len()
        );

        let conn = self.lock_conn();
        let mut per_view: BTreeMap<&str, Vec<Option<BTreeMap<String, Value>>>> = BTreeMap::new();

        for (view_name, _) in &grouped {
            let view = registry.feature_view(view_name)?;
            let source = registry.source(&view.source)?;
            let mut stmt = conn.prepare(&point_in_time_sql(source, view))?;

            let mut matches = Vec::with_capacity(entity_rows.len());
            for row in entity_rows {
                let mut params_vec = Vec::new();
                for entity_name in &source.entity_columns {
                    let value = row
                        .keys
                        .get(entity_name)
                        .ok_or_else(|| OfflineStoreError::MissingEntityKey {
                            entity: entity_name.clone(),
                        })?;
                    params_vec.push(to_sql_value(value));
                }
                params_vec.push(rusqlite::types::Value::Integer(row.event_time_ms));
                params_vec.push(rusqlite::types::Value::Integer(min_event_time_ms(
                    row.event_time_ms,
                    view.ttl_ms,
                )));

                let fetched = stmt
                    .query_row(params_from_iter(params_vec), |sql_row| {
                        let mut values = BTreeMap::new();
                        for (idx, field) in view.fields.iter().enumerate() {
                            let raw: rusqlite::types::Value = sql_row.get(idx)?;
                            values.insert(field.name.clone(), value_from_sql(raw, field.value_type));
                        }
                        Ok(values)
                    })
                    .optional()?;
                matches.push(fetched);
            }
            per_view.insert(view_name.as_str(), matches);
        }

        let columns: Vec<String> = feature_refs.iter().map(|r| r.field.clone()).collect();
        let mut rows = Vec::with_capacity(entity_rows.len());
        for row_idx in 0..entity_rows.len() {
            let mut out_row = Vec::with_capacity(feature_refs.len());
            for reference in feature_refs {
                let value = per_view
                    .get(reference.view.as_str())
                    .and_then(|matches| matches[row_idx].as_ref())
                    .and_then(|values| values.get(&reference.field))
                    .cloned()
                    .unwrap_or(Value::Null);
                out_row.push(value);
            }
            rows.push(out_row);
        }

        info!(
            component = "offline_store",
            event = "join.finish",
            output_rows = rows.len(),
            columns = columns.len()
        );

        Ok(HistoricalResult { columns, rows })
    }

    /// Scans a view's source for rows in `(from_ts, to_ts]`, ordered by event
    /// time then created time. Used by online materialization.
    pub fn scan_source_rows(
        &self,
        registry: &Registry,
        view: &FeatureView,
        from_ts_ms: i64,
        to_ts_ms: i64,
    ) -> Result<Vec<SourceRow>, OfflineStoreError> {
        let source = registry.source(&view.source)?;
        self.ensure_source_table(registry, view)?;

        let mut select_cols: Vec<String> = source.entity_columns.clone();
        select_cols.push(source.timestamp_column.clone());
        if let Some(created) = &source.created_timestamp_column {
            select_cols.push(created.clone());
        }
        select_cols.extend(view.fields.iter().map(|field| field.name.clone()));

        let order = match &source.created_timestamp_column {
            Some(created) => format!("{} ASC, {} ASC", source.timestamp_column, created),
            None => format!("{} ASC", source.timestamp_column),
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} > ?1 AND {} <= ?2 ORDER BY {}",
            select_cols.join(", "),
            source.table,
            source.timestamp_column,
            source.timestamp_column,
            order
        );

        let mut entity_types = Vec::with_capacity(source.entity_columns.len());
        for entity_name in &source.entity_columns {
            entity_types.push(registry.entity(entity_name)?.value_type);
        }

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut sql_rows = stmt.query(params![from_ts_ms, to_ts_ms])?;

        let mut rows = Vec::new();
        while let Some(sql_row) = sql_rows.next()? {
            let mut idx = 0;
            let mut keys = BTreeMap::new();
            for (entity_name, entity_type) in source.entity_columns.iter().zip(&entity_types) {
                let raw: rusqlite::types::Value = sql_row.get(idx)?;
                keys.insert(entity_name.clone(), value_from_sql(raw, *entity_type));
                idx += 1;
            }
            let event_time_ms: i64 = sql_row.get(idx)?;
            idx += 1;
            let created_time_ms = if source.created_timestamp_column.is_some() {
                let created: i64 = sql_row.get(idx)?;
                idx += 1;
                Some(created)
            } else {
                None
            };
            let mut values = BTreeMap::new();
            for field in &view.fields {
                let raw: rusqlite::types::Value = sql_row.get(idx)?;
                values.insert(field.name.clone(), value_from_sql(raw, field.value_type));
                idx += 1;
            }
            rows.push(SourceRow {
                keys,
                event_time_ms,
                created_time_ms,
                values,
            });
        }

        Ok(rows)
    }

    /// Persists an immutable snapshot of a historical retrieval result.
    pub fn create_saved_dataset(
        &self,
        name: &str,
        feature_refs: &[String],
        columns: &[String],
        rows: &[Vec<Value>],
        tags: BTreeMap<String, String>,
    ) -> Result<SavedDataset, OfflineStoreError> {
        let payload = serde_json::json!({ "columns": columns, "rows": rows }).to_string();
        let refs_json = serde_json::to_string(feature_refs).expect("refs serialize to JSON");
        let tags_json = serde_json::to_string(&tags).expect("tags serialize to JSON");
        let fingerprint = dataset_fingerprint(name, feature_refs, &payload);
        let created_ms = Utc::now().timestamp_millis();

        let conn = self.lock_conn();
        let exists = conn
            .query_row(
                "SELECT 1 FROM saved_datasets WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(OfflineStoreError::DatasetExists(name.to_string()));
        }

        conn.execute(
            "INSERT INTO saved_datasets (name, feature_refs, payload, fingerprint, created_ms, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![name, refs_json, payload, fingerprint, created_ms, tags_json],
        )?;

        info!(
            component = "offline_store",
            event = "saved_dataset.created",
            name = name,
            rows = rows.len(),
            fingerprint = fingerprint.as_str()
        );

        Ok(SavedDataset {
            name: name.to_string(),
            feature_refs: feature_refs.to_vec(),
            columns: columns.to_vec(),
            rows: rows.to_vec(),
            fingerprint,
            created_ms,
            tags,
        })
    }

    pub fn get_saved_dataset(&self, name: &str) -> Result<SavedDataset, OfflineStoreError> {
        let conn = self.lock_conn();
        let fetched = conn
            .query_row(
                "SELECT feature_refs, payload, fingerprint, created_ms, tags
                 FROM saved_datasets WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let (refs_json, payload, fingerprint, created_ms, tags_json) =
            fetched.ok_or_else(|| OfflineStoreError::DatasetNotFound(name.to_string()))?;

        let corrupt = |detail: String| OfflineStoreError::DatasetCorrupt {
            name: name.to_string(),
            detail,
        };
        let feature_refs: Vec<String> = serde_json::from_str(&refs_json)
            .map_err(|err| corrupt(format!("stored feature refs are not valid JSON: {err}")))?;
        let tags: BTreeMap<String, String> = serde_json::from_str(&tags_json)
            .map_err(|err| corrupt(format!("stored tags are not valid JSON: {err}")))?;

        #[derive(Deserialize)]
        struct Payload {
            columns: Vec<String>,
            rows: Vec<Vec<Value>>,
        }
        let decoded: Payload = serde_json::from_str(&payload)
            .map_err(|err| corrupt(format!("stored payload is not valid JSON: {err}")))?;

        Ok(SavedDataset {
            name: name.to_string(),
            feature_refs,
            columns: decoded.columns,
            rows: decoded.rows,
            fingerprint,
            created_ms,
            tags,
        })
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .expect("offline store lock should not be poisoned")
    }
}

fn group_refs_by_view<'a>(
    registry: &Registry,
    feature_refs: &'a [FeatureRef],
) -> Result<Vec<(String, Vec<&'a str>)>, OfflineStoreError> {
    let mut grouped: Vec<(String, Vec<&str>)> = Vec::new();
    for reference in feature_refs {
        let view = registry.feature_view(&reference.view).map_err(|_| {
            OfflineStoreError::UnknownFeature {
                reference: reference.to_string(),
            }
        })?;
        if view.field(&reference.field).is_none() {
            return Err(OfflineStoreError::UnknownFeature {
                reference: reference.to_string(),
            });
        }

        match grouped.iter_mut().find(|(name, _)| name == &reference.view) {
            Some((_, fields)) => fields.push(reference.field.as_str()),
            None => grouped.push((reference.view.clone(), vec![reference.field.as_str()])),
        }
    }
    Ok(grouped)
}

fn upsert_sql(source: &DataSource, view: &FeatureView) -> String {
    let mut columns: Vec<String> = source.entity_columns.clone();
    columns.push(source.timestamp_column.clone());
    if let Some(created) = &source.created_timestamp_column {
        columns.push(created.clone());
    }
    columns.extend(view.fields.iter().map(|field| field.name.clone()));

    let placeholders: Vec<String> = (1..=columns.len()).map(|idx| format!("?{idx}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .skip(source.entity_columns.len() + 1)
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}, {}) DO UPDATE SET {}",
        source.table,
        columns.join(", "),
        placeholders.join(", "),
        source.entity_columns.join(", "),
        source.timestamp_column,
        updates.join(", ")
    )
}

fn point_in_time_sql(source: &DataSource, view: &FeatureView) -> String {
    let fields: Vec<&str> = view.fields.iter().map(|field| field.name.as_str()).collect();
    let mut predicates: Vec<String> = Vec::new();
    let mut placeholder = 1;
    for entity_name in &source.entity_columns {
        predicates.push(format!("{entity_name} = ?{placeholder}"));
        placeholder += 1;
    }
    predicates.push(format!("{} <= ?{placeholder}", source.timestamp_column));
    placeholder += 1;
    predicates.push(format!("{} >= ?{placeholder}", source.timestamp_column));

    let order = match &source.created_timestamp_column {
        Some(created) => format!("{} DESC, {} DESC", source.timestamp_column, created),
        None => format!("{} DESC", source.timestamp_column),
    };

    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT 1",
        fields.join(", "),
        source.table,
        predicates.join(" AND "),
        order
    )
}

fn row_violation(
    registry: &Registry,
    view: &FeatureView,
    row: &SourceRow,
) -> Result<Option<String>, OfflineStoreError> {
    for entity_name in &view.entities {
        let entity = registry.entity(entity_name)?;
        let value = row
            .keys
            .get(entity_name)
            .ok_or_else(|| OfflineStoreError::MissingEntityKey {
                entity: entity_name.clone(),
            })?;
        if value.is_null() || !value.matches(entity.value_type) {
            return Err(OfflineStoreError::ColumnType {
                view: view.name.clone(),
                column: entity_name.clone(),
            });
        }
    }

    for field in &view.fields {
        if let Some(value) = row.values.get(&field.name) {
            if !value.matches(field.value_type) {
                return Err(OfflineStoreError::ColumnType {
                    view: view.name.clone(),
                    column: field.name.clone(),
                });
            }
        }
    }

    Ok(check_bounds(&view.validation, &row.values))
}

// ttl_ms <= 0 disables the age bound.
fn min_event_time_ms(requested_ts_ms: i64, ttl_ms: i64) -> i64 {
    if ttl_ms <= 0 {
        i64::MIN
    } else {
        requested_ts_ms.saturating_sub(ttl_ms)
    }
}

fn column_affinity(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Int64 | ValueType::Bool => "INTEGER",
        ValueType::Float64 => "REAL",
        ValueType::Text => "TEXT",
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Int64(v) => rusqlite::types::Value::Integer(*v),
        Value::Float64(v) => rusqlite::types::Value::Real(*v),
        Value::Bool(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Null => rusqlite::types::Value::Null,
    }
}

fn value_from_sql(raw: rusqlite::types::Value, value_type: ValueType) -> Value {
    match (raw, value_type) {
        (rusqlite::types::Value::Null, _) => Value::Null,
        (rusqlite::types::Value::Integer(v), ValueType::Bool) => Value::Bool(v != 0),
        (rusqlite::types::Value::Integer(v), _) => Value::Int64(v),
        (rusqlite::types::Value::Real(v), _) => Value::Float64(v),
        (rusqlite::types::Value::Text(v), _) => Value::Text(v),
        (rusqlite::types::Value::Blob(_), _) => Value::Null,
    }
}

fn parse_csv_value(raw: &str, value_type: ValueType) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Value::Null);
    }
    match value_type {
        ValueType::Int64 => trimmed.parse().ok().map(Value::Int64),
        ValueType::Float64 => trimmed.parse().ok().map(Value::Float64),
        ValueType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" => Some(Value::Bool(true)),
            "0" | "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ValueType::Text => Some(Value::Text(trimmed.to_string())),
    }
}

fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(ms) = trimmed.parse::<i64>() {
        return Some(ms);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

fn dataset_fingerprint(name: &str, feature_refs: &[String], payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("name:{name};"));
    hasher.update("refs:");
    for reference in feature_refs {
        hasher.update(reference.as_bytes());
        hasher.update(",");
    }
    hasher.update(";payload:");
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
