//! SQLite-backed online store: watermarked incremental materialization and
//! latest-value key-value reads.
//!
//! Materialization of a feature view is serialized by a per-view mutex; the
//! watermark advances in the same transaction as the writes, so a retried run
//! re-scans from the prior watermark (at-least-once) without double-counting.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::offline::{OfflineStore, OfflineStoreError, SourceRow};
use crate::registry::{FeatureView, Registry, RegistryError, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineStoreConfig {
    pub read_parallelism: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for OnlineStoreConfig {
    fn default() -> Self {
        Self {
            read_parallelism: 4,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

pub fn online_store_config_from_env() -> OnlineStoreConfig {
    let mut config = OnlineStoreConfig::default();

    if let Ok(raw) = env::var("FSTORE_READ_PARALLELISM") {
        if let Ok(parsed) = raw.trim().parse::<usize>() {
            if parsed >= 1 {
                config.read_parallelism = parsed;
            }
        }
    }
    if let Ok(raw) = env::var("FSTORE_STORE_MAX_RETRIES") {
        if let Ok(parsed) = raw.trim().parse::<u32>() {
            config.max_retries = parsed;
        }
    }
    if let Ok(raw) = env::var("FSTORE_STORE_RETRY_BACKOFF_MS") {
        if let Ok(parsed) = raw.trim().parse::<u64>() {
            config.retry_backoff_ms = parsed;
        }
    }

    config
}

#[derive(Debug, Error)]
pub enum OnlineStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("offline scan failed: {0}")]
    Offline(#[from] OfflineStoreError),
    #[error("invalid materialization range ({from_ts_ms}, {to_ts_ms}]")]
    InvalidRange { from_ts_ms: i64, to_ts_ms: i64 },
    #[error(
        "stale watermark for {view}: stored {watermark_ms}, requested from {from_ts_ms}; \
         reset_watermark is the manual recovery"
    )]
    StaleWatermark {
        view: String,
        watermark_ms: i64,
        from_ts_ms: i64,
    },
    #[error("entity key {entity} missing from input row for {view}")]
    MissingEntityKey { view: String, entity: String },
    #[error("online store unavailable after {attempts} attempts: {detail}")]
    Unavailable { attempts: u32, detail: String },
    #[error("stored payload for {view}/{entity_key} is not valid JSON: {detail}")]
    PayloadDecode {
        view: String,
        entity_key: String,
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeReport {
    pub feature_view: String,
    pub from_ts_ms: i64,
    pub to_ts_ms: i64,
    pub scanned_rows: u64,
    pub written_keys: u64,
    pub watermark_ms: i64,
}

/// Latest feature values for one input row, bare field name keyed, with the
/// source event timestamp per field for freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineReadRow {
    pub values: BTreeMap<String, Value>,
    pub event_times_ms: BTreeMap<String, Option<i64>>,
}

impl OnlineReadRow {
    fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
            event_times_ms: BTreeMap::new(),
        }
    }
}

pub struct OnlineStore {
    path: PathBuf,
    cfg: OnlineStoreConfig,
    conn: Mutex<Connection>,
    view_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OnlineStore {
    pub fn open(path: &Path, cfg: OnlineStoreConfig) -> Result<Self, OnlineStoreError> {
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
            CREATE TABLE IF NOT EXISTS online_features (
                feature_view TEXT NOT NULL,
                entity_key TEXT NOT NULL,
                event_time_ms INTEGER NOT NULL,
                created_time_ms INTEGER NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY(feature_view, entity_key)
            ) WITHOUT ROWID;
            CREATE TABLE IF NOT EXISTS materialization_watermarks (
                feature_view TEXT NOT NULL,
                watermark_ms INTEGER NOT NULL,
                PRIMARY KEY(feature_view)
            ) WITHOUT ROWID;
            ",
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            cfg,
            conn: Mutex::new(conn),
            view_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Copies the latest source row per entity key for `(from_ts, to_ts]`
    /// into the key-value table. `from_ts = None` resumes from the stored
    /// watermark (or the beginning of the source when there is none).
    pub fn materialize(
        &self,
        registry: &Registry,
        offline: &OfflineStore,
        view_name: &str,
        from_ts_ms: Option<i64>,
        to_ts_ms: i64,
    ) -> Result<MaterializeReport, OnlineStoreError> {
        let view_lock = self.view_lock(view_name);
        let _serialized = view_lock
            .lock()
            .expect("materialization lock should not be poisoned");

        let view = registry.feature_view(view_name)?;
        let stored_watermark = self.watermark(view_name)?;

        let from_ts = match from_ts_ms {
            Some(explicit) => {
                if let Some(watermark) = stored_watermark {
                    if explicit > watermark {
                        return Err(OnlineStoreError::StaleWatermark {
                            view: view_name.to_string(),
                            watermark_ms: watermark,
                            from_ts_ms: explicit,
                        });
                    }
                }
                explicit
            }
            None => stored_watermark.unwrap_or(i64::MIN),
        };

        if to_ts_ms <= from_ts {
            if from_ts_ms.is_none() {
                // Watermark already covers the requested range.
                info!(
                    component = "online_store",
                    event = "materialize.skip",
                    view = view_name,
                    watermark_ms = from_ts,
                    to_ts_ms = to_ts_ms
                );
                return Ok(MaterializeReport {
                    feature_view: view_name.to_string(),
                    from_ts_ms: from_ts,
                    to_ts_ms,
                    scanned_rows: 0,
                    written_keys: 0,
                    watermark_ms: from_ts,
                });
            }
            return Err(OnlineStoreError::InvalidRange {
                from_ts_ms: from_ts,
                to_ts_ms,
            });
        }

        info!(
            component = "online_store",
            event = "materialize.start",
            view = view_name,
            from_ts_ms = from_ts,
            to_ts_ms = to_ts_ms,
            resumed_from_watermark = from_ts_ms.is_none()
        );

        let scanned = offline.scan_source_rows(registry, view, from_ts, to_ts_ms)?;
        let scanned_rows = scanned.len() as u64;
        let latest = latest_per_key(view, view_name, scanned)?;

        let new_watermark = stored_watermark.unwrap_or(i64::MIN).max(to_ts_ms);
        let written_keys = latest.len() as u64;

        with_retry(&self.cfg, || {
            let mut conn = self
                .conn
                .lock()
                .expect("online store lock should not be poisoned");
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "
                    INSERT INTO online_features (
                        feature_view, entity_key, event_time_ms, created_time_ms, payload
                    ) VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(feature_view, entity_key) DO UPDATE SET
                        event_time_ms = excluded.event_time_ms,
                        created_time_ms = excluded.created_time_ms,
                        payload = excluded.payload
                    WHERE excluded.event_time_ms > event_time_ms
                       OR (excluded.event_time_ms = event_time_ms
                           AND excluded.created_time_ms >= created_time_ms)
                    ",
                )?;
                for (entity_key, row) in &latest {
                    let payload = serde_json::to_string(&row.values)
                        .expect("feature values serialize to JSON");
                    stmt.execute(params![
                        view_name,
                        entity_key,
                        row.event_time_ms,
                        row.created_time_ms.unwrap_or(0),
                        payload,
                    ])?;
                }
            }
            tx.execute(
                "
                INSERT INTO materialization_watermarks (feature_view, watermark_ms)
                VALUES (?1, ?2)
                ON CONFLICT(feature_view) DO UPDATE SET watermark_ms = excluded.watermark_ms
                ",
                params![view_name, new_watermark],
            )?;
            tx.commit()
        })?;

        info!(
            component = "online_store",
            event = "materialize.finish",
            view = view_name,
            scanned_rows = scanned_rows,
            written_keys = written_keys,
            watermark_ms = new_watermark
        );

        Ok(MaterializeReport {
            feature_view: view_name.to_string(),
            from_ts_ms: from_ts,
            to_ts_ms,
            scanned_rows,
            written_keys,
            watermark_ms: new_watermark,
        })
    }

    pub fn materialize_incremental(
        &self,
        registry: &Registry,
        offline: &OfflineStore,
        view_name: &str,
        to_ts_ms: i64,
    ) -> Result<MaterializeReport, OnlineStoreError> {
        self.materialize(registry, offline, view_name, None, to_ts_ms)
    }

    pub fn watermark(&self, view_name: &str) -> Result<Option<i64>, OnlineStoreError> {
        let conn = self
            .conn
            .lock()
            .expect("online store lock should not be poisoned");
        let watermark = conn
            .query_row(
                "SELECT watermark_ms FROM materialization_watermarks WHERE feature_view = ?1",
                params![view_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(watermark)
    }

    /// Manual recovery for a stale watermark: the next incremental run
    /// re-scans the source from the beginning.
    pub fn reset_watermark(&self, view_name: &str) -> Result<(), OnlineStoreError> {
        let conn = self
            .conn
            .lock()
            .expect("online store lock should not be poisoned");
        conn.execute(
            "DELETE FROM materialization_watermarks WHERE feature_view = ?1",
            params![view_name],
        )?;
        info!(
            component = "online_store",
            event = "materialize.watermark_reset",
            view = view_name
        );
        Ok(())
    }

    /// Reads the latest values per entity key for every requested view.
    /// Missing keys and fields yield nulls, never an error. Rows are spread
    /// over a bounded pool of read-only connections.
    pub fn get_online_features(
        &self,
        registry: &Registry,
        entity_rows: &[BTreeMap<String, Value>],
        view_fields: &[(String, Vec<String>)],
    ) -> Result<Vec<OnlineReadRow>, OnlineStoreError> {
        if entity_rows.is_empty() || view_fields.is_empty() {
            return Ok(entity_rows.iter().map(|_| OnlineReadRow::empty()).collect());
        }

        let mut keyed_views = Vec::with_capacity(view_fields.len());
        for (view_name, fields) in view_fields {
            let view = registry.feature_view(view_name)?;
            let mut keys = Vec::with_capacity(entity_rows.len());
            for row in entity_rows {
                keys.push(entity_key_text(view, view_name, row)?);
            }
            keyed_views.push((view_name.as_str(), fields, keys));
        }

        let workers = self.cfg.read_parallelism.max(1).min(entity_rows.len());
        let chunk_size = entity_rows.len().div_ceil(workers);
        let row_indices: Vec<usize> = (0..entity_rows.len()).collect();

        let mut merged: Vec<OnlineReadRow> = vec![OnlineReadRow::empty(); entity_rows.len()];
        let chunk_results: Vec<Result<Vec<(usize, OnlineReadRow)>, OnlineStoreError>> =
            thread::scope(|scope| {
                let mut handles = Vec::new();
                for chunk in row_indices.chunks(chunk_size) {
                    let keyed_views = &keyed_views;
                    let path = &self.path;
                    let cfg = &self.cfg;
                    handles.push(scope.spawn(move || {
                        read_chunk(path, cfg, chunk, keyed_views)
                    }));
                }
                handles
                    .into_iter()
                    .map(|handle| handle.join().expect("read worker should not panic"))
                    .collect()
            });

        for chunk_result in chunk_results {
            for (row_idx, read_row) in chunk_result? {
                let slot = &mut merged[row_idx];
                slot.values.extend(read_row.values);
                slot.event_times_ms.extend(read_row.event_times_ms);
            }
        }

        Ok(merged)
    }

    fn view_lock(&self, view_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .view_locks
            .lock()
            .expect("view lock registry should not be poisoned");
        Arc::clone(
            locks
                .entry(view_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

fn read_chunk(
    path: &Path,
    cfg: &OnlineStoreConfig,
    row_indices: &[usize],
    keyed_views: &[(&str, &Vec<String>, Vec<String>)],
) -> Result<Vec<(usize, OnlineReadRow)>, OnlineStoreError> {
    let conn = Connection::open(path)?;
    let mut stmt = conn.prepare(
        "SELECT event_time_ms, payload FROM online_features
         WHERE feature_view = ?1 AND entity_key = ?2",
    )?;

    let mut out = Vec::with_capacity(row_indices.len());
    for &row_idx in row_indices {
        let mut read_row = OnlineReadRow::empty();
        for (view_name, fields, keys) in keyed_views {
            let entity_key = keys[row_idx].as_str();
            let fetched = with_retry(cfg, || {
                stmt.query_row(params![view_name, entity_key], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .optional()
            })?;

            match fetched {
                Some((event_time_ms, payload)) => {
                    let stored: BTreeMap<String, Value> = serde_json::from_str(&payload)
                        .map_err(|err| OnlineStoreError::PayloadDecode {
                            view: (*view_name).to_string(),
                            entity_key: entity_key.to_string(),
                            detail: err.to_string(),
                        })?;
                    for field in fields.iter() {
                        let value = stored.get(field).cloned().unwrap_or(Value::Null);
                        let freshness = if value.is_null() {
                            None
                        } else {
                            Some(event_time_ms)
                        };
                        read_row.values.insert(field.clone(), value);
                        read_row.event_times_ms.insert(field.clone(), freshness);
                    }
                }
                None => {
                    for field in fields.iter() {
                        read_row.values.insert(field.clone(), Value::Null);
                        read_row.event_times_ms.insert(field.clone(), None);
                    }
                }
            }
        }
        out.push((row_idx, read_row));
    }

    Ok(out)
}

fn latest_per_key(
    view: &FeatureView,
    view_name: &str,
    scanned: Vec<SourceRow>,
) -> Result<BTreeMap<String, SourceRow>, OnlineStoreError> {
    let mut latest: BTreeMap<String, SourceRow> = BTreeMap::new();
    for row in scanned {
        let key = entity_key_text(view, view_name, &row.keys)?;
        match latest.get(&key) {
            Some(existing)
                if (existing.event_time_ms, existing.created_time_ms.unwrap_or(0))
                    > (row.event_time_ms, row.created_time_ms.unwrap_or(0)) => {}
            _ => {
                latest.insert(key, row);
            }
        }
    }
    Ok(latest)
}

fn entity_key_text(
    view: &FeatureView,
    view_name: &str,
    keys: &BTreeMap<String, Value>,
) -> Result<String, OnlineStoreError> {
    let mut parts = Vec::with_capacity(view.entities.len());
    for entity_name in &view.entities {
        let value = keys
            .get(entity_name)
            .ok_or_else(|| OnlineStoreError::MissingEntityKey {
                view: view_name.to_string(),
                entity: entity_name.clone(),
            })?;
        parts.push(format!("{}={}", entity_name, value.key_text()));
    }
    Ok(parts.join("|"))
}

fn with_retry<T>(
    cfg: &OnlineStoreConfig,
    mut f: impl FnMut() -> Result<T, rusqlite::Error>,
) -> Result<T, OnlineStoreError> {
    let mut attempt: u32 = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if !is_transient(&err) => return Err(err.into()),
            Err(err) if attempt >= cfg.max_retries => {
                return Err(OnlineStoreError::Unavailable {
                    attempts: attempt.saturating_add(1),
                    detail: err.to_string(),
                });
            }
            Err(_) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let factor = 1u64 << shift;
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(factor);
                thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::DatabaseBusy
                || failure.code == ErrorCode::DatabaseLocked
    )
}
