//! Typed feature definitions and the in-memory registry that owns them.
//!
//! Definition kinds:
//! - entities: named join keys with a declared value type
//! - data sources: offline tables with entity/timestamp column mappings
//! - request sources: request-time scalar fields
//! - feature views: TTL-bounded feature column groups over one source
//! - on-demand feature views: pure request-time transformations
//! - feature services: named retrieval contracts bundling references
//!
//! The registry validates every definition at registration time and keeps the
//! on-demand dependency graph in topological order; cycles are rejected here,
//! never at evaluation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::validation::BoundsRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int64,
    Float64,
    Text,
    Bool,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int64 | ValueType::Float64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null is compatible with every declared type.
    pub fn matches(&self, value_type: ValueType) -> bool {
        match self {
            Value::Int64(_) => value_type == ValueType::Int64,
            Value::Float64(_) => value_type == ValueType::Float64,
            Value::Bool(_) => value_type == ValueType::Bool,
            Value::Text(_) => value_type == ValueType::Text,
            Value::Null => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical text used when the value participates in an online store key.
    pub fn key_text(&self) -> String {
        match self {
            Value::Int64(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Null => "null".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Entity,
    DataSource,
    RequestSource,
    FeatureView,
    OnDemandFeatureView,
    FeatureService,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DefinitionKind::Entity => "entity",
            DefinitionKind::DataSource => "data source",
            DefinitionKind::RequestSource => "request source",
            DefinitionKind::FeatureView => "feature view",
            DefinitionKind::OnDemandFeatureView => "on-demand feature view",
            DefinitionKind::FeatureService => "feature service",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate {kind} definition: {name}")]
    Duplicate { kind: DefinitionKind, name: String },
    #[error("unknown {kind}: {name}")]
    NotFound { kind: DefinitionKind, name: String },
    #[error("schema conflict in {name}: {detail}")]
    SchemaConflict { name: String, detail: String },
    #[error("cyclic on-demand dependency involving: {views:?}")]
    CyclicDependency { views: Vec<String> },
    #[error("invalid feature reference {reference}: expected <view>:<field>")]
    InvalidFeatureRef { reference: String },
    #[error("invalid identifier {name}: only [a-zA-Z0-9_] starting with a letter or underscore")]
    InvalidIdentifier { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub value_type: ValueType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub value_type: ValueType,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Read-only reference to an offline table holding historical feature rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub table: String,
    pub entity_columns: Vec<String>,
    pub timestamp_column: String,
    pub created_timestamp_column: Option<String>,
}

/// Declares scalar fields supplied by the caller at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDataSource {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureView {
    pub name: String,
    pub entities: Vec<String>,
    pub ttl_ms: i64,
    pub fields: Vec<FieldSchema>,
    pub source: String,
    pub validation: Vec<BoundsRule>,
}

impl FeatureView {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }
}

pub type TransformFn = dyn Fn(&BTreeMap<String, Value>) -> BTreeMap<String, Value> + Send + Sync;

/// Pure request-time transformation over named input values.
#[derive(Clone)]
pub struct Transform {
    func: Arc<TransformFn>,
}

impl Transform {
    pub fn new(
        func: impl Fn(&BTreeMap<String, Value>) -> BTreeMap<String, Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    pub fn apply(&self, input: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        (self.func)(input)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

#[derive(Debug, Clone)]
pub struct OnDemandFeatureView {
    pub name: String,
    pub inputs: Vec<FeatureRef>,
    pub request_sources: Vec<String>,
    pub outputs: Vec<FieldSchema>,
    pub transform: Transform,
}

impl OnDemandFeatureView {
    pub fn output(&self, name: &str) -> Option<&FieldSchema> {
        self.outputs.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureService {
    pub name: String,
    pub refs: Vec<FeatureRef>,
    pub tags: BTreeMap<String, String>,
}

/// Fully-qualified feature reference, written `<view>:<field>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureRef {
    pub view: String,
    pub field: String,
}

impl FeatureRef {
    pub fn new(view: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            field: field.into(),
        }
    }

    pub fn parse(reference: &str) -> Result<Self, RegistryError> {
        match reference.split_once(':') {
            Some((view, field)) if !view.is_empty() && !field.is_empty() => Ok(Self {
                view: view.to_string(),
                field: field.to_string(),
            }),
            _ => Err(RegistryError::InvalidFeatureRef {
                reference: reference.to_string(),
            }),
        }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.view, self.field)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<String, Entity>,
    sources: HashMap<String, DataSource>,
    request_sources: HashMap<String, RequestDataSource>,
    feature_views: HashMap<String, FeatureView>,
    on_demand_views: HashMap<String, OnDemandFeatureView>,
    services: HashMap<String, FeatureService>,
    on_demand_order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity(&mut self, entity: Entity) -> Result<(), RegistryError> {
        ensure_identifier(&entity.name)?;
        if self.entities.contains_key(&entity.name) {
            return Err(RegistryError::Duplicate {
                kind: DefinitionKind::Entity,
                name: entity.name,
            });
        }

        log_registered(DefinitionKind::Entity, &entity.name);
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    pub fn register_source(&mut self, source: DataSource) -> Result<(), RegistryError> {
        ensure_identifier(&source.name)?;
        ensure_identifier(&source.table)?;
        ensure_identifier(&source.timestamp_column)?;
        if let Some(created) = &source.created_timestamp_column {
            ensure_identifier(created)?;
        }
        if self.sources.contains_key(&source.name) {
            return Err(RegistryError::Duplicate {
                kind: DefinitionKind::DataSource,
                name: source.name,
            });
        }
        if source.entity_columns.is_empty() {
            return Err(RegistryError::SchemaConflict {
                name: source.name,
                detail: "data source must declare at least one entity column".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for column in &source.entity_columns {
            ensure_identifier(column)?;
            if !seen.insert(column.clone()) {
                return Err(RegistryError::SchemaConflict {
                    name: source.name.clone(),
                    detail: format!("duplicate entity column {column}"),
                });
            }
        }

        log_registered(DefinitionKind::DataSource, &source.name);
        self.sources.insert(source.name.clone(), source);
        Ok(())
    }

    pub fn register_request_source(
        &mut self,
        source: RequestDataSource,
    ) -> Result<(), RegistryError> {
        ensure_identifier(&source.name)?;
        if self.request_sources.contains_key(&source.name) {
            return Err(RegistryError::Duplicate {
                kind: DefinitionKind::RequestSource,
                name: source.name,
            });
        }
        ensure_unique_fields(&source.name, &source.fields)?;

        log_registered(DefinitionKind::RequestSource, &source.name);
        self.request_sources.insert(source.name.clone(), source);
        Ok(())
    }

    pub fn register_feature_view(&mut self, view: FeatureView) -> Result<(), RegistryError> {
        ensure_identifier(&view.name)?;
        if self.feature_views.contains_key(&view.name) || self.on_demand_views.contains_key(&view.name)
        {
            return Err(RegistryError::Duplicate {
                kind: DefinitionKind::FeatureView,
                name: view.name,
            });
        }
        if view.entities.is_empty() {
            return Err(RegistryError::SchemaConflict {
                name: view.name,
                detail: "feature view must be keyed by at least one entity".to_string(),
            });
        }

        for entity in &view.entities {
            if !self.entities.contains_key(entity) {
                return Err(RegistryError::NotFound {
                    kind: DefinitionKind::Entity,
                    name: entity.clone(),
                });
            }
        }

        let source = self
            .sources
            .get(&view.source)
            .ok_or_else(|| RegistryError::NotFound {
                kind: DefinitionKind::DataSource,
                name: view.source.clone(),
            })?;

        let view_keys: BTreeSet<&str> = view.entities.iter().map(String::as_str).collect();
        let source_keys: BTreeSet<&str> = source.entity_columns.iter().map(String::as_str).collect();
        if view_keys != source_keys {
            return Err(RegistryError::SchemaConflict {
                name: view.name,
                detail: format!(
                    "entity keys {view_keys:?} do not match source entity columns {source_keys:?}"
                ),
            });
        }

        ensure_unique_fields(&view.name, &view.fields)?;
        for field in &view.fields {
            if view.entities.contains(&field.name) {
                return Err(RegistryError::SchemaConflict {
                    name: view.name.clone(),
                    detail: format!("field {} collides with an entity key", field.name),
                });
            }
        }

        for rule in &view.validation {
            let field = view
                .field(&rule.field)
                .ok_or_else(|| RegistryError::SchemaConflict {
                    name: view.name.clone(),
                    detail: format!("validation rule references unknown field {}", rule.field),
                })?;
            if !field.value_type.is_numeric() {
                return Err(RegistryError::SchemaConflict {
                    name: view.name.clone(),
                    detail: format!("validation rule on non-numeric field {}", rule.field),
                });
            }
        }

        log_registered(DefinitionKind::FeatureView, &view.name);
        self.feature_views.insert(view.name.clone(), view);
        Ok(())
    }

    pub fn register_on_demand_view(
        &mut self,
        view: OnDemandFeatureView,
    ) -> Result<(), RegistryError> {
        self.register_on_demand_views(vec![view])
    }

    /// Registers a batch of on-demand views atomically. Views within the batch
    /// may reference each other; the whole dependency graph must stay acyclic.
    pub fn register_on_demand_views(
        &mut self,
        views: Vec<OnDemandFeatureView>,
    ) -> Result<(), RegistryError> {
        let mut batch_names = HashSet::new();
        for view in &views {
            ensure_identifier(&view.name)?;
            if self.feature_views.contains_key(&view.name)
                || self.on_demand_views.contains_key(&view.name)
                || !batch_names.insert(view.name.clone())
            {
                return Err(RegistryError::Duplicate {
                    kind: DefinitionKind::OnDemandFeatureView,
                    name: view.name.clone(),
                });
            }
        }

        let batch_by_name: HashMap<&str, &OnDemandFeatureView> =
            views.iter().map(|view| (view.name.as_str(), view)).collect();

        for view in &views {
            ensure_unique_fields(&view.name, &view.outputs)?;

            for source in &view.request_sources {
                if !self.request_sources.contains_key(source) {
                    return Err(RegistryError::NotFound {
                        kind: DefinitionKind::RequestSource,
                        name: source.clone(),
                    });
                }
            }

            let mut input_names = HashSet::new();
            for input in &view.inputs {
                let resolves = match self.feature_views.get(&input.view) {
                    Some(base) => base.field(&input.field).is_some(),
                    None => match self
                        .on_demand_views
                        .get(&input.view)
                        .or_else(|| batch_by_name.get(input.view.as_str()).copied())
                    {
                        Some(dep) => dep.output(&input.field).is_some(),
                        None => false,
                    },
                };
                if !resolves {
                    return Err(RegistryError::NotFound {
                        kind: DefinitionKind::FeatureView,
                        name: input.to_string(),
                    });
                }
                input_names.insert(input.field.clone());
            }
            for source in &view.request_sources {
                for field in &self.request_sources[source].fields {
                    input_names.insert(field.name.clone());
                }
            }
            for output in &view.outputs {
                if input_names.contains(&output.name) {
                    return Err(RegistryError::SchemaConflict {
                        name: view.name.clone(),
                        detail: format!("output {} collides with an input field", output.name),
                    });
                }
            }
        }

        let mut candidate: HashMap<String, OnDemandFeatureView> = self.on_demand_views.clone();
        for view in views {
            candidate.insert(view.name.clone(), view);
        }
        let order = on_demand_topo_order(&candidate)?;

        for name in &order {
            if !self.on_demand_views.contains_key(name) {
                log_registered(DefinitionKind::OnDemandFeatureView, name);
            }
        }
        self.on_demand_views = candidate;
        self.on_demand_order = order;
        Ok(())
    }

    pub fn register_service(&mut self, service: FeatureService) -> Result<(), RegistryError> {
        ensure_identifier(&service.name)?;
        if self.services.contains_key(&service.name) {
            return Err(RegistryError::Duplicate {
                kind: DefinitionKind::FeatureService,
                name: service.name,
            });
        }
        if service.refs.is_empty() {
            return Err(RegistryError::SchemaConflict {
                name: service.name,
                detail: "feature service must reference at least one feature".to_string(),
            });
        }

        let mut fields_by_name: HashMap<&str, &str> = HashMap::new();
        for reference in &service.refs {
            let resolves = match self.feature_views.get(&reference.view) {
                Some(view) => view.field(&reference.field).is_some(),
                None => self
                    .on_demand_views
                    .get(&reference.view)
                    .map(|view| view.output(&reference.field).is_some())
                    .unwrap_or(false),
            };
            if !resolves {
                return Err(RegistryError::NotFound {
                    kind: DefinitionKind::FeatureView,
                    name: reference.to_string(),
                });
            }

            match fields_by_name.insert(&reference.field, &reference.view) {
                Some(other_view) if other_view != reference.view => {
                    return Err(RegistryError::SchemaConflict {
                        name: service.name.clone(),
                        detail: format!(
                            "field {} is provided by both {} and {}",
                            reference.field, other_view, reference.view
                        ),
                    });
                }
                _ => {}
            }
        }

        log_registered(DefinitionKind::FeatureService, &service.name);
        self.services.insert(service.name.clone(), service);
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Result<&Entity, RegistryError> {
        self.entities.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: DefinitionKind::Entity,
            name: name.to_string(),
        })
    }

    pub fn source(&self, name: &str) -> Result<&DataSource, RegistryError> {
        self.sources.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: DefinitionKind::DataSource,
            name: name.to_string(),
        })
    }

    pub fn request_source(&self, name: &str) -> Result<&RequestDataSource, RegistryError> {
        self.request_sources
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                kind: DefinitionKind::RequestSource,
                name: name.to_string(),
            })
    }

    pub fn feature_view(&self, name: &str) -> Result<&FeatureView, RegistryError> {
        self.feature_views
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                kind: DefinitionKind::FeatureView,
                name: name.to_string(),
            })
    }

    pub fn on_demand_view(&self, name: &str) -> Result<&OnDemandFeatureView, RegistryError> {
        self.on_demand_views
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                kind: DefinitionKind::OnDemandFeatureView,
                name: name.to_string(),
            })
    }

    pub fn service(&self, name: &str) -> Result<&FeatureService, RegistryError> {
        self.services.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: DefinitionKind::FeatureService,
            name: name.to_string(),
        })
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn has_feature_view(&self, name: &str) -> bool {
        self.feature_views.contains_key(name)
    }

    pub fn has_on_demand_view(&self, name: &str) -> bool {
        self.on_demand_views.contains_key(name)
    }

    /// True when any request source declares a field with this name.
    pub fn is_request_field(&self, name: &str) -> bool {
        self.request_sources
            .values()
            .any(|source| source.fields.iter().any(|field| field.name == name))
    }

    pub fn feature_view_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.feature_views.keys().cloned().collect();
        names.sort();
        names
    }

    /// Evaluation order for all registered on-demand views, dependencies first.
    pub fn on_demand_order(&self) -> &[String] {
        &self.on_demand_order
    }
}

fn on_demand_topo_order(
    views: &HashMap<String, OnDemandFeatureView>,
) -> Result<Vec<String>, RegistryError> {
    let mut indegree: BTreeMap<&str, usize> = views.keys().map(|name| (name.as_str(), 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for view in views.values() {
        for input in &view.inputs {
            if views.contains_key(&input.view) {
                dependents
                    .entry(input.view.as_str())
                    .or_default()
                    .push(view.name.as_str());
                *indegree
                    .get_mut(view.name.as_str())
                    .expect("every view has an indegree entry") += 1;
            }
        }
    }

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(views.len());

    while let Some(name) = ready.pop() {
        order.push(name.to_string());
        for dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
            let degree = indegree
                .get_mut(dependent)
                .expect("every view has an indegree entry");
            *degree -= 1;
            if *degree == 0 {
                ready.push(dependent);
            }
        }
    }

    if order.len() != views.len() {
        let mut cyclic: Vec<String> = indegree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| (*name).to_string())
            .collect();
        cyclic.sort();
        return Err(RegistryError::CyclicDependency { views: cyclic });
    }

    Ok(order)
}

fn ensure_unique_fields(owner: &str, fields: &[FieldSchema]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();
    for field in fields {
        ensure_identifier(&field.name)?;
        if !seen.insert(field.name.as_str()) {
            return Err(RegistryError::SchemaConflict {
                name: owner.to_string(),
                detail: format!("duplicate field {}", field.name),
            });
        }
    }
    Ok(())
}

fn ensure_identifier(name: &str) -> Result<(), RegistryError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

fn log_registered(kind: DefinitionKind, name: &str) {
    info!(
        component = "registry",
        event = "registry.registered",
        kind = %kind,
        name = name
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform_noop() -> Transform {
        Transform::new(|_| BTreeMap::new())
    }

    #[test]
    fn feature_ref_parse_accepts_view_field_pairs() {
        let parsed = FeatureRef::parse("credit_history:credit_card_due").unwrap();
        assert_eq!(parsed.view, "credit_history");
        assert_eq!(parsed.field, "credit_card_due");
        assert_eq!(parsed.to_string(), "credit_history:credit_card_due");
    }

    #[test]
    fn feature_ref_parse_rejects_malformed_references() {
        for raw in ["", "no_colon", ":field", "view:"] {
            assert!(matches!(
                FeatureRef::parse(raw),
                Err(RegistryError::InvalidFeatureRef { .. })
            ));
        }
    }

    #[test]
    fn identifier_validation_rejects_sql_meta_characters() {
        let mut registry = Registry::new();
        let result = registry.register_entity(Entity {
            name: "zip;drop table".to_string(),
            value_type: ValueType::Int64,
            description: String::new(),
        });
        assert!(matches!(
            result,
            Err(RegistryError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn topo_order_places_dependencies_first() {
        let mut registry = Registry::new();
        registry
            .register_request_source(RequestDataSource {
                name: "req".to_string(),
                fields: vec![FieldSchema::new("amount", ValueType::Int64)],
            })
            .unwrap();
        registry
            .register_on_demand_views(vec![
                OnDemandFeatureView {
                    name: "second".to_string(),
                    inputs: vec![FeatureRef::new("first", "out_a")],
                    request_sources: vec![],
                    outputs: vec![FieldSchema::new("out_b", ValueType::Float64)],
                    transform: transform_noop(),
                },
                OnDemandFeatureView {
                    name: "first".to_string(),
                    inputs: vec![],
                    request_sources: vec!["req".to_string()],
                    outputs: vec![FieldSchema::new("out_a", ValueType::Float64)],
                    transform: transform_noop(),
                },
            ])
            .unwrap();

        let order = registry.on_demand_order();
        let first_idx = order.iter().position(|name| name == "first").unwrap();
        let second_idx = order.iter().position(|name| name == "second").unwrap();
        assert!(first_idx < second_idx);
    }

    #[test]
    fn cyclic_batch_is_rejected_at_registration() {
        let mut registry = Registry::new();
        let result = registry.register_on_demand_views(vec![
            OnDemandFeatureView {
                name: "a".to_string(),
                inputs: vec![FeatureRef::new("b", "out_b")],
                request_sources: vec![],
                outputs: vec![FieldSchema::new("out_a", ValueType::Float64)],
                transform: transform_noop(),
            },
            OnDemandFeatureView {
                name: "b".to_string(),
                inputs: vec![FeatureRef::new("a", "out_a")],
                request_sources: vec![],
                outputs: vec![FieldSchema::new("out_b", ValueType::Float64)],
                transform: transform_noop(),
            },
        ]);

        match result {
            Err(RegistryError::CyclicDependency { views }) => {
                assert_eq!(views, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
        assert!(registry.on_demand_view("a").is_err());
        assert!(registry.on_demand_view("b").is_err());
    }
}
