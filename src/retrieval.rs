//! Feature retrieval facade: resolves feature services and references
//! through the registry, orchestrates the offline/online adapters and the
//! on-demand evaluator, and is the only entry point serving code calls.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::offline::{EntityRow, OfflineStore, OfflineStoreError, SavedDataset, SourceRow};
use crate::ondemand::{evaluate_chain, EvalError};
use crate::online::{
    online_store_config_from_env, MaterializeReport, OnlineStore, OnlineStoreConfig,
    OnlineStoreError,
};
use crate::registry::{
    DataSource, Entity, FeatureRef, FeatureService, FeatureView, FieldSchema,
    OnDemandFeatureView, Registry, RegistryError, RequestDataSource, Transform, Value, ValueType,
};
use crate::validation::{BoundsRule, IngestReport, ValidationPolicy};

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureStoreConfig {
    pub offline_path: PathBuf,
    pub online_path: PathBuf,
    pub online: OnlineStoreConfig,
}

impl Default for FeatureStoreConfig {
    fn default() -> Self {
        Self {
            offline_path: PathBuf::from("data/offline.sqlite"),
            online_path: PathBuf::from("data/online.sqlite"),
            online: OnlineStoreConfig::default(),
        }
    }
}

pub fn feature_store_config_from_env() -> FeatureStoreConfig {
    let mut config = FeatureStoreConfig::default();

    if let Ok(path) = env::var("FSTORE_OFFLINE_PATH") {
        if !path.trim().is_empty() {
            config.offline_path = PathBuf::from(path);
        }
    }
    if let Ok(path) = env::var("FSTORE_ONLINE_PATH") {
        if !path.trim().is_empty() {
            config.online_path = PathBuf::from(path);
        }
    }
    config.online = online_store_config_from_env();

    config
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("unknown feature reference: {0}")]
    UnknownFeature(String),
    #[error("unknown entity or request column: {0}")]
    UnknownEntity(String),
    #[error("required column {0} missing from request")]
    MissingColumn(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("offline store error: {0}")]
    Offline(#[from] OfflineStoreError),
    #[error("online store error: {0}")]
    Online(#[from] OnlineStoreError),
    #[error("on-demand evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Online retrieval request: entity key and request-time columns, one value
/// per row, plus either a feature service name or explicit references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_service: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    pub entities: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineResponse {
    pub feature_names: Vec<String>,
    pub rows: Vec<OnlineResponseRow>,
}

/// Values and per-field freshness, aligned with the response feature names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineResponseRow {
    pub values: Vec<Value>,
    pub event_times_ms: Vec<Option<i64>>,
}

/// Tabular entity frame for historical retrieval: join-key and request-time
/// columns plus one event timestamp per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFrame {
    pub columns: BTreeMap<String, Vec<Value>>,
    pub event_times_ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_service: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    pub frame: EntityFrame,
}

/// Entity frame joined with the resolved feature columns, row count equal to
/// the input frame's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

struct ResolvedRequest {
    requested: Vec<FeatureRef>,
    stored_by_view: Vec<(String, Vec<String>)>,
    on_demand: Vec<String>,
    request_fields: Vec<FieldSchema>,
    entity_keys: Vec<String>,
}

pub struct FeatureStore {
    registry: Registry,
    offline: OfflineStore,
    online: OnlineStore,
}

impl FeatureStore {
    pub fn open(cfg: &FeatureStoreConfig) -> Result<Self, RetrievalError> {
        let offline = OfflineStore::open(&cfg.offline_path)?;
        let online = OnlineStore::open(&cfg.online_path, cfg.online.clone())?;
        Ok(Self {
            registry: Registry::new(),
            offline,
            online,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Creates the offline tables backing every registered feature view.
    pub fn ensure_view_tables(&self) -> Result<(), RetrievalError> {
        for name in self.registry.feature_view_names() {
            let view = self.registry.feature_view(&name)?;
            self.offline.ensure_source_table(&self.registry, view)?;
        }
        Ok(())
    }

    pub fn ingest_rows(
        &self,
        view_name: &str,
        rows: &[SourceRow],
        policy: ValidationPolicy,
    ) -> Result<IngestReport, RetrievalError> {
        Ok(self.offline.ingest_rows(&self.registry, view_name, rows, policy)?)
    }

    pub fn ingest_csv(
        &self,
        view_name: &str,
        path: &std::path::Path,
        policy: ValidationPolicy,
    ) -> Result<IngestReport, RetrievalError> {
        Ok(self.offline.ingest_csv(&self.registry, view_name, path, policy)?)
    }

    pub fn get_online_features(
        &self,
        request: &OnlineRequest,
    ) -> Result<OnlineResponse, RetrievalError> {
        let resolved =
            self.resolve_request(request.feature_service.as_deref(), &request.features)?;
        let row_count = self.validate_request_columns(&request.entities, &resolved, None)?;

        info!(
            component = "retrieval",
            event = "retrieval.online.start",
            rows = row_count,
            features = resolved.requested.len(),
            stored_views = resolved.stored_by_view.len(),
            on_demand_views = resolved.on_demand.len()
        );

        let rows: Vec<BTreeMap<String, Value>> = (0..row_count)
            .map(|idx| {
                request
                    .entities
                    .iter()
                    .map(|(name, values)| (name.clone(), values[idx].clone()))
                    .collect()
            })
            .collect();

        let stored =
            self.online
                .get_online_features(&self.registry, &rows, &resolved.stored_by_view)?;

        let on_demand_views: Vec<&OnDemandFeatureView> = resolved
            .on_demand
            .iter()
            .map(|name| self.registry.on_demand_view(name))
            .collect::<Result<_, _>>()?;

        let feature_names: Vec<String> = resolved
            .requested
            .iter()
            .map(|reference| reference.field.clone())
            .collect();

        let mut out_rows = Vec::with_capacity(row_count);
        for (idx, read_row) in stored.into_iter().enumerate() {
            let freshness = read_row.event_times_ms;
            let mut values_map = read_row.values;
            for field in &resolved.request_fields {
                if let Some(value) = rows[idx].get(&field.name) {
                    values_map.insert(field.name.clone(), value.clone());
                }
            }

            evaluate_chain(&on_demand_views, &mut values_map)?;

            let mut values = Vec::with_capacity(resolved.requested.len());
            let mut event_times_ms = Vec::with_capacity(resolved.requested.len());
            for reference in &resolved.requested {
                values.push(
                    values_map
                        .get(&reference.field)
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                event_times_ms.push(freshness.get(&reference.field).copied().flatten());
            }
            out_rows.push(OnlineResponseRow {
                values,
                event_times_ms,
            });
        }

        info!(
            component = "retrieval",
            event = "retrieval.online.finish",
            rows = out_rows.len()
        );

        Ok(OnlineResponse {
            feature_names,
            rows: out_rows,
        })
    }

    pub fn get_historical_features(
        &self,
        request: &HistoricalRequest,
    ) -> Result<HistoricalResponse, RetrievalError> {
        let resolved =
            self.resolve_request(request.feature_service.as_deref(), &request.features)?;
        let frame = &request.frame;
        let row_count = self.validate_request_columns(
            &frame.columns,
            &resolved,
            Some(frame.event_times_ms.len()),
        )?;

        info!(
            component = "retrieval",
            event = "retrieval.historical.start",
            rows = row_count,
            features = resolved.requested.len(),
            stored_views = resolved.stored_by_view.len(),
            on_demand_views = resolved.on_demand.len()
        );

        let entity_rows: Vec<EntityRow> = (0..row_count)
            .map(|idx| EntityRow {
                keys: frame
                    .columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[idx].clone()))
                    .collect(),
                event_time_ms: frame.event_times_ms[idx],
            })
            .collect();

        let stored_refs: Vec<FeatureRef> = resolved
            .stored_by_view
            .iter()
            .flat_map(|(view, fields)| {
                fields
                    .iter()
                    .map(move |field| FeatureRef::new(view.clone(), field.clone()))
            })
            .collect();
        let stored =
            self.offline
                .get_historical_features(&self.registry, &entity_rows, &stored_refs)?;

        let on_demand_views: Vec<&OnDemandFeatureView> = resolved
            .on_demand
            .iter()
            .map(|name| self.registry.on_demand_view(name))
            .collect::<Result<_, _>>()?;

        let frame_columns: Vec<String> = frame.columns.keys().cloned().collect();
        let mut columns = frame_columns.clone();
        columns.push("event_timestamp".to_string());
        columns.extend(
            resolved
                .requested
                .iter()
                .map(|reference| reference.field.clone()),
        );

        let mut rows = Vec::with_capacity(row_count);
        for idx in 0..row_count {
            let mut values_map: BTreeMap<String, Value> = stored
                .columns
                .iter()
                .cloned()
                .zip(stored.rows[idx].iter().cloned())
                .collect();
            for (name, column) in &frame.columns {
                values_map.insert(name.clone(), column[idx].clone());
            }

            evaluate_chain(&on_demand_views, &mut values_map)?;

            let mut out_row = Vec::with_capacity(columns.len());
            for name in &frame_columns {
                out_row.push(frame.columns[name][idx].clone());
            }
            out_row.push(Value::Int64(frame.event_times_ms[idx]));
            for reference in &resolved.requested {
                out_row.push(
                    values_map
                        .get(&reference.field)
                        .cloned()
                        .unwrap_or(Value::Null),
                );
            }
            rows.push(out_row);
        }

        info!(
            component = "retrieval",
            event = "retrieval.historical.finish",
            rows = rows.len(),
            columns = columns.len()
        );

        Ok(HistoricalResponse { columns, rows })
    }

    pub fn materialize(
        &self,
        view_name: &str,
        from_ts_ms: i64,
        to_ts_ms: i64,
    ) -> Result<MaterializeReport, RetrievalError> {
        Ok(self.online.materialize(
            &self.registry,
            &self.offline,
            view_name,
            Some(from_ts_ms),
            to_ts_ms,
        )?)
    }

    pub fn materialize_incremental(
        &self,
        view_name: &str,
        to_ts_ms: i64,
    ) -> Result<MaterializeReport, RetrievalError> {
        Ok(self
            .online
            .materialize_incremental(&self.registry, &self.offline, view_name, to_ts_ms)?)
    }

    /// Incrementally materializes every registered feature view up to one
    /// target timestamp.
    pub fn materialize_incremental_all(
        &self,
        to_ts_ms: i64,
    ) -> Result<Vec<MaterializeReport>, RetrievalError> {
        let mut reports = Vec::new();
        for name in self.registry.feature_view_names() {
            reports.push(self.materialize_incremental(&name, to_ts_ms)?);
        }
        Ok(reports)
    }

    pub fn watermark(&self, view_name: &str) -> Result<Option<i64>, RetrievalError> {
        Ok(self.online.watermark(view_name)?)
    }

    pub fn reset_watermark(&self, view_name: &str) -> Result<(), RetrievalError> {
        Ok(self.online.reset_watermark(view_name)?)
    }

    pub fn create_saved_dataset(
        &self,
        name: &str,
        features: &[String],
        response: &HistoricalResponse,
        tags: BTreeMap<String, String>,
    ) -> Result<SavedDataset, RetrievalError> {
        Ok(self.offline.create_saved_dataset(
            name,
            features,
            &response.columns,
            &response.rows,
            tags,
        )?)
    }

    pub fn get_saved_dataset(&self, name: &str) -> Result<SavedDataset, RetrievalError> {
        Ok(self.offline.get_saved_dataset(name)?)
    }

    /// Expands a service or explicit reference list into stored fetches and
    /// dependency-ordered on-demand evaluations, failing fast on any name
    /// that does not resolve. No store is touched here.
    fn resolve_request(
        &self,
        feature_service: Option<&str>,
        features: &[String],
    ) -> Result<ResolvedRequest, RetrievalError> {
        let requested: Vec<FeatureRef> = match (feature_service, features.is_empty()) {
            (Some(service), true) => self
                .registry
                .service(service)
                .map_err(|_| RetrievalError::UnknownFeature(service.to_string()))?
                .refs
                .clone(),
            (None, false) => features
                .iter()
                .map(|raw| {
                    FeatureRef::parse(raw).map_err(|_| RetrievalError::UnknownFeature(raw.clone()))
                })
                .collect::<Result<_, _>>()?,
            (Some(_), false) => {
                return Err(RetrievalError::InvalidRequest(
                    "pass either a feature service or explicit features, not both".to_string(),
                ))
            }
            (None, true) => {
                return Err(RetrievalError::InvalidRequest(
                    "no features requested".to_string(),
                ))
            }
        };

        let mut seen_fields = HashSet::new();
        for reference in &requested {
            if !seen_fields.insert(reference.field.clone()) {
                return Err(RetrievalError::InvalidRequest(format!(
                    "duplicate output field {}",
                    reference.field
                )));
            }
        }

        let mut stored_by_view: Vec<(String, Vec<String>)> = Vec::new();
        let mut needed_on_demand: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for reference in &requested {
            self.classify_reference(
                reference,
                &mut stored_by_view,
                &mut needed_on_demand,
                &mut queue,
            )?;
        }
        while let Some(name) = queue.pop_front() {
            let view = self.registry.on_demand_view(&name)?;
            for input in &view.inputs {
                self.classify_reference(
                    input,
                    &mut stored_by_view,
                    &mut needed_on_demand,
                    &mut queue,
                )?;
            }
        }

        let mut request_fields: Vec<FieldSchema> = Vec::new();
        for name in &needed_on_demand {
            let view = self.registry.on_demand_view(name)?;
            for source in &view.request_sources {
                for field in &self.registry.request_source(source)?.fields {
                    if !request_fields.iter().any(|f| f.name == field.name) {
                        request_fields.push(field.clone());
                    }
                }
            }
        }

        let mut entity_keys: BTreeSet<String> = BTreeSet::new();
        for (view_name, _) in &stored_by_view {
            let view = self.registry.feature_view(view_name)?;
            entity_keys.extend(view.entities.iter().cloned());
        }

        let on_demand: Vec<String> = self
            .registry
            .on_demand_order()
            .iter()
            .filter(|name| needed_on_demand.contains(*name))
            .cloned()
            .collect();

        Ok(ResolvedRequest {
            requested,
            stored_by_view,
            on_demand,
            request_fields,
            entity_keys: entity_keys.into_iter().collect(),
        })
    }

    fn classify_reference(
        &self,
        reference: &FeatureRef,
        stored_by_view: &mut Vec<(String, Vec<String>)>,
        needed_on_demand: &mut BTreeSet<String>,
        queue: &mut VecDeque<String>,
    ) -> Result<(), RetrievalError> {
        if self.registry.has_feature_view(&reference.view) {
            let view = self.registry.feature_view(&reference.view)?;
            if view.field(&reference.field).is_none() {
                return Err(RetrievalError::UnknownFeature(reference.to_string()));
            }
            match stored_by_view
                .iter_mut()
                .find(|(name, _)| name == &reference.view)
            {
                Some((_, fields)) => {
                    if !fields.contains(&reference.field) {
                        fields.push(reference.field.clone());
                    }
                }
                None => stored_by_view.push((reference.view.clone(), vec![reference.field.clone()])),
            }
            Ok(())
        } else if self.registry.has_on_demand_view(&reference.view) {
            let view = self.registry.on_demand_view(&reference.view)?;
            if view.output(&reference.field).is_none() {
                return Err(RetrievalError::UnknownFeature(reference.to_string()));
            }
            if needed_on_demand.insert(reference.view.clone()) {
                queue.push_back(reference.view.clone());
            }
            Ok(())
        } else {
            Err(RetrievalError::UnknownFeature(reference.to_string()))
        }
    }

    /// Checks provided columns against the registry and the resolved request:
    /// unknown columns, missing required columns, ragged lengths and type
    /// mismatches all fail before any store is touched.
    fn validate_request_columns(
        &self,
        columns: &BTreeMap<String, Vec<Value>>,
        resolved: &ResolvedRequest,
        expected_rows: Option<usize>,
    ) -> Result<usize, RetrievalError> {
        for name in columns.keys() {
            if !self.registry.has_entity(name) && !self.registry.is_request_field(name) {
                return Err(RetrievalError::UnknownEntity(name.clone()));
            }
        }

        let mut row_count = expected_rows;
        for (name, values) in columns {
            match row_count {
                Some(count) if count != values.len() => {
                    return Err(RetrievalError::InvalidRequest(format!(
                        "column {name} has {} values, expected {count}",
                        values.len()
                    )));
                }
                Some(_) => {}
                None => row_count = Some(values.len()),
            }
        }
        let row_count = row_count.unwrap_or(0);

        for entity_name in &resolved.entity_keys {
            let values = columns
                .get(entity_name)
                .ok_or_else(|| RetrievalError::MissingColumn(entity_name.clone()))?;
            let entity = self.registry.entity(entity_name)?;
            for value in values {
                if !value.matches(entity.value_type) {
                    return Err(RetrievalError::InvalidRequest(format!(
                        "entity column {entity_name} holds a value not matching {:?}",
                        entity.value_type
                    )));
                }
            }
        }

        for field in &resolved.request_fields {
            let values = columns
                .get(&field.name)
                .ok_or_else(|| RetrievalError::MissingColumn(field.name.clone()))?;
            for value in values {
                if !value.matches(field.value_type) {
                    return Err(RetrievalError::InvalidRequest(format!(
                        "request column {} holds a value not matching {:?}",
                        field.name, field.value_type
                    )));
                }
            }
        }

        Ok(row_count)
    }
}

/// Registers the credit scoring walkthrough definitions: zipcode and credit
/// history views, the loan application request source, the total debt
/// on-demand view and the consumer-facing feature service.
pub fn register_credit_scoring_definitions(
    store: &mut FeatureStore,
) -> Result<(), RegistryError> {
    let registry = store.registry_mut();

    registry.register_entity(Entity {
        name: "zipcode".to_string(),
        value_type: ValueType::Int64,
        description: "Zipcode of the loan applicant".to_string(),
    })?;
    registry.register_entity(Entity {
        name: "dob_ssn".to_string(),
        value_type: ValueType::Text,
        description: "Date of birth and last four digits of social security number".to_string(),
    })?;

    registry.register_source(DataSource {
        name: "zipcode_source".to_string(),
        table: "zipcode_table".to_string(),
        entity_columns: vec!["zipcode".to_string()],
        timestamp_column: "event_timestamp".to_string(),
        created_timestamp_column: Some("created_timestamp".to_string()),
    })?;
    registry.register_feature_view(FeatureView {
        name: "zipcode_features".to_string(),
        entities: vec!["zipcode".to_string()],
        ttl_ms: 3_650 * DAY_MS,
        fields: vec![
            FieldSchema::new("city", ValueType::Text),
            FieldSchema::new("state", ValueType::Text),
            FieldSchema::new("location_type", ValueType::Text),
            FieldSchema::new("tax_returns_filed", ValueType::Int64),
            FieldSchema::new("population", ValueType::Int64),
            FieldSchema::new("total_wages", ValueType::Int64),
        ],
        source: "zipcode_source".to_string(),
        validation: vec![
            BoundsRule::new("population", 1.0, 10_000_000.0),
            BoundsRule::new("tax_returns_filed", 0.0, 5_000_000.0),
            BoundsRule::new("total_wages", 0.0, 500_000_000_000.0),
        ],
    })?;

    registry.register_source(DataSource {
        name: "credit_history_source".to_string(),
        table: "credit_history".to_string(),
        entity_columns: vec!["dob_ssn".to_string()],
        timestamp_column: "event_timestamp".to_string(),
        created_timestamp_column: Some("created_timestamp".to_string()),
    })?;
    registry.register_feature_view(FeatureView {
        name: "credit_history".to_string(),
        entities: vec!["dob_ssn".to_string()],
        ttl_ms: 90 * DAY_MS,
        fields: vec![
            FieldSchema::new("credit_card_due", ValueType::Int64),
            FieldSchema::new("mortgage_due", ValueType::Int64),
            FieldSchema::new("student_loan_due", ValueType::Int64),
            FieldSchema::new("vehicle_loan_due", ValueType::Int64),
            FieldSchema::new("hard_pulls", ValueType::Int64),
            FieldSchema::new("missed_payments_2y", ValueType::Int64),
            FieldSchema::new("missed_payments_1y", ValueType::Int64),
            FieldSchema::new("missed_payments_6m", ValueType::Int64),
            FieldSchema::new("bankruptcies", ValueType::Int64),
        ],
        source: "credit_history_source".to_string(),
        validation: vec![
            BoundsRule::new("credit_card_due", 0.0, 500_000.0),
            BoundsRule::new("mortgage_due", 0.0, 2_000_000.0),
            BoundsRule::new("hard_pulls", 0.0, 20.0),
            BoundsRule::new("missed_payments_2y", 0.0, 100.0),
            BoundsRule::new("missed_payments_1y", 0.0, 100.0),
            BoundsRule::new("missed_payments_6m", 0.0, 100.0),
            BoundsRule::new("bankruptcies", 0.0, 10.0),
        ],
    })?;

    registry.register_request_source(RequestDataSource {
        name: "application_data".to_string(),
        fields: vec![FieldSchema::new("loan_amnt", ValueType::Int64)],
    })?;

    registry.register_on_demand_view(OnDemandFeatureView {
        name: "total_debt_calc".to_string(),
        inputs: vec![
            FeatureRef::new("credit_history", "credit_card_due"),
            FeatureRef::new("credit_history", "mortgage_due"),
            FeatureRef::new("credit_history", "student_loan_due"),
            FeatureRef::new("credit_history", "vehicle_loan_due"),
        ],
        request_sources: vec!["application_data".to_string()],
        outputs: vec![FieldSchema::new("total_debt_due", ValueType::Float64)],
        transform: Transform::new(|input| {
            let mut out = BTreeMap::new();
            let total = ["credit_card_due", "mortgage_due", "student_loan_due", "vehicle_loan_due", "loan_amnt"]
                .iter()
                .map(|name| input.get(*name).and_then(Value::as_f64))
                .try_fold(0.0, |acc, value| value.map(|v| acc + v));
            out.insert(
                "total_debt_due".to_string(),
                total.map(Value::Float64).unwrap_or(Value::Null),
            );
            out
        }),
    })?;

    registry.register_service(FeatureService {
        name: "credit_assessment_v1".to_string(),
        refs: vec![
            FeatureRef::new("zipcode_features", "city"),
            FeatureRef::new("zipcode_features", "state"),
            FeatureRef::new("zipcode_features", "location_type"),
            FeatureRef::new("zipcode_features", "tax_returns_filed"),
            FeatureRef::new("zipcode_features", "population"),
            FeatureRef::new("zipcode_features", "total_wages"),
            FeatureRef::new("credit_history", "credit_card_due"),
            FeatureRef::new("credit_history", "mortgage_due"),
            FeatureRef::new("credit_history", "student_loan_due"),
            FeatureRef::new("credit_history", "vehicle_loan_due"),
            FeatureRef::new("credit_history", "hard_pulls"),
            FeatureRef::new("credit_history", "missed_payments_2y"),
            FeatureRef::new("credit_history", "missed_payments_1y"),
            FeatureRef::new("credit_history", "missed_payments_6m"),
            FeatureRef::new("credit_history", "bankruptcies"),
            FeatureRef::new("total_debt_calc", "total_debt_due"),
        ],
        tags: BTreeMap::from([
            ("domain".to_string(), "credit_scoring".to_string()),
            ("owner".to_string(), "risk".to_string()),
        ]),
    })?;

    Ok(())
}

/// Seeds a small batch of credit scoring rows relative to `now_ms`, enough
/// for the serving walkthrough to return non-null features.
pub fn seed_credit_scoring_rows(
    store: &FeatureStore,
    now_ms: i64,
) -> Result<(), RetrievalError> {
    let zipcode_rows = vec![
        zipcode_row(76104, "FORT WORTH", "TX", 18_529, 31_403, now_ms - 30 * DAY_MS),
        zipcode_row(60629, "CHICAGO", "IL", 41_082, 113_916, now_ms - 30 * DAY_MS),
    ];
    store.ingest_rows("zipcode_features", &zipcode_rows, ValidationPolicy::Strict)?;

    let credit_rows = vec![
        credit_history_row("19630621_4278", 8_998, 378_847, 22_328, 9_259, now_ms - 10 * DAY_MS),
        credit_history_row("19790429_9552", 2_944, 0, 32_874, 15_734, now_ms - 10 * DAY_MS),
    ];
    store.ingest_rows("credit_history", &credit_rows, ValidationPolicy::Strict)?;

    Ok(())
}

fn zipcode_row(
    zipcode: i64,
    city: &str,
    state: &str,
    tax_returns_filed: i64,
    population: i64,
    event_time_ms: i64,
) -> SourceRow {
    SourceRow {
        keys: BTreeMap::from([("zipcode".to_string(), Value::Int64(zipcode))]),
        event_time_ms,
        created_time_ms: Some(event_time_ms),
        values: BTreeMap::from([
            ("city".to_string(), Value::Text(city.to_string())),
            ("state".to_string(), Value::Text(state.to_string())),
            ("location_type".to_string(), Value::Text("PRIMARY".to_string())),
            ("tax_returns_filed".to_string(), Value::Int64(tax_returns_filed)),
            ("population".to_string(), Value::Int64(population)),
            ("total_wages".to_string(), Value::Int64(population * 19_000)),
        ]),
    }
}

fn credit_history_row(
    dob_ssn: &str,
    credit_card_due: i64,
    mortgage_due: i64,
    student_loan_due: i64,
    vehicle_loan_due: i64,
    event_time_ms: i64,
) -> SourceRow {
    SourceRow {
        keys: BTreeMap::from([("dob_ssn".to_string(), Value::Text(dob_ssn.to_string()))]),
        event_time_ms,
        created_time_ms: Some(event_time_ms),
        values: BTreeMap::from([
            ("credit_card_due".to_string(), Value::Int64(credit_card_due)),
            ("mortgage_due".to_string(), Value::Int64(mortgage_due)),
            ("student_loan_due".to_string(), Value::Int64(student_loan_due)),
            ("vehicle_loan_due".to_string(), Value::Int64(vehicle_loan_due)),
            ("hard_pulls".to_string(), Value::Int64(1)),
            ("missed_payments_2y".to_string(), Value::Int64(1)),
            ("missed_payments_1y".to_string(), Value::Int64(0)),
            ("missed_payments_6m".to_string(), Value::Int64(0)),
            ("bankruptcies".to_string(), Value::Int64(0)),
        ]),
    }
}
