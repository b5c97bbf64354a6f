use std::collections::BTreeMap;

use fstore::{
    BoundsRule, DataSource, Entity, FeatureRef, FeatureService, FeatureView, FieldSchema,
    OnDemandFeatureView, Registry, RegistryError, RequestDataSource, Transform, Value, ValueType,
};

fn registry_with_credit_view() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_entity(Entity {
            name: "dob_ssn".to_string(),
            value_type: ValueType::Text,
            description: "Date of birth and last four digits of SSN".to_string(),
        })
        .expect("entity registers");
    registry
        .register_source(DataSource {
            name: "credit_history_source".to_string(),
            table: "credit_history".to_string(),
            entity_columns: vec!["dob_ssn".to_string()],
            timestamp_column: "event_timestamp".to_string(),
            created_timestamp_column: Some("created_timestamp".to_string()),
        })
        .expect("source registers");
    registry
        .register_feature_view(FeatureView {
            name: "credit_history".to_string(),
            entities: vec!["dob_ssn".to_string()],
            ttl_ms: 90 * 86_400_000,
            fields: vec![
                FieldSchema::new("credit_card_due", ValueType::Int64),
                FieldSchema::new("mortgage_due", ValueType::Int64),
            ],
            source: "credit_history_source".to_string(),
            validation: vec![BoundsRule::new("credit_card_due", 0.0, 500_000.0)],
        })
        .expect("view registers");
    registry
}

fn null_output_transform(field: &'static str) -> Transform {
    Transform::new(move |_| {
        let mut out = BTreeMap::new();
        out.insert(field.to_string(), Value::Null);
        out
    })
}

#[test]
fn duplicate_entity_registration_fails() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_entity(Entity {
        name: "dob_ssn".to_string(),
        value_type: ValueType::Int64,
        description: String::new(),
    });

    assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
}

#[test]
fn view_with_unknown_entity_fails() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_feature_view(FeatureView {
        name: "zipcode_features".to_string(),
        entities: vec!["zipcode".to_string()],
        ttl_ms: 0,
        fields: vec![FieldSchema::new("population", ValueType::Int64)],
        source: "credit_history_source".to_string(),
        validation: vec![],
    });

    assert!(matches!(result, Err(RegistryError::NotFound { .. })));
}

#[test]
fn view_entity_keys_must_match_source_columns() {
    let mut registry = registry_with_credit_view();
    registry
        .register_entity(Entity {
            name: "zipcode".to_string(),
            value_type: ValueType::Int64,
            description: String::new(),
        })
        .unwrap();

    let result = registry.register_feature_view(FeatureView {
        name: "mismatched".to_string(),
        entities: vec!["zipcode".to_string()],
        ttl_ms: 0,
        fields: vec![FieldSchema::new("population", ValueType::Int64)],
        source: "credit_history_source".to_string(),
        validation: vec![],
    });

    assert!(matches!(result, Err(RegistryError::SchemaConflict { .. })));
}

#[test]
fn view_field_colliding_with_entity_key_fails() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_feature_view(FeatureView {
        name: "shadowing".to_string(),
        entities: vec!["dob_ssn".to_string()],
        ttl_ms: 0,
        fields: vec![FieldSchema::new("dob_ssn", ValueType::Text)],
        source: "credit_history_source".to_string(),
        validation: vec![],
    });

    assert!(matches!(result, Err(RegistryError::SchemaConflict { .. })));
}

#[test]
fn validation_rule_on_unknown_field_fails() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_feature_view(FeatureView {
        name: "bad_rules".to_string(),
        entities: vec!["dob_ssn".to_string()],
        ttl_ms: 0,
        fields: vec![FieldSchema::new("hard_pulls", ValueType::Int64)],
        source: "credit_history_source".to_string(),
        validation: vec![BoundsRule::new("soft_pulls", 0.0, 20.0)],
    });

    assert!(matches!(result, Err(RegistryError::SchemaConflict { .. })));
}

#[test]
fn service_with_unknown_reference_fails() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_service(FeatureService {
        name: "credit_assessment_v1".to_string(),
        refs: vec![FeatureRef::new("credit_history", "soft_pulls")],
        tags: BTreeMap::new(),
    });

    assert!(matches!(result, Err(RegistryError::NotFound { .. })));
}

#[test]
fn service_with_field_collision_across_views_fails() {
    let mut registry = registry_with_credit_view();
    registry
        .register_source(DataSource {
            name: "other_source".to_string(),
            table: "other_history".to_string(),
            entity_columns: vec!["dob_ssn".to_string()],
            timestamp_column: "event_timestamp".to_string(),
            created_timestamp_column: None,
        })
        .unwrap();
    registry
        .register_feature_view(FeatureView {
            name: "other_history".to_string(),
            entities: vec!["dob_ssn".to_string()],
            ttl_ms: 0,
            fields: vec![FieldSchema::new("credit_card_due", ValueType::Int64)],
            source: "other_source".to_string(),
            validation: vec![],
        })
        .unwrap();

    let result = registry.register_service(FeatureService {
        name: "ambiguous".to_string(),
        refs: vec![
            FeatureRef::new("credit_history", "credit_card_due"),
            FeatureRef::new("other_history", "credit_card_due"),
        ],
        tags: BTreeMap::new(),
    });

    assert!(matches!(result, Err(RegistryError::SchemaConflict { .. })));
}

#[test]
fn on_demand_view_with_unresolvable_input_fails() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_on_demand_view(OnDemandFeatureView {
        name: "broken".to_string(),
        inputs: vec![FeatureRef::new("credit_history", "soft_pulls")],
        request_sources: vec![],
        outputs: vec![FieldSchema::new("out", ValueType::Float64)],
        transform: null_output_transform("out"),
    });

    assert!(matches!(result, Err(RegistryError::NotFound { .. })));
}

#[test]
fn self_referencing_on_demand_view_fails_at_registration() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_on_demand_view(OnDemandFeatureView {
        name: "self_ref".to_string(),
        inputs: vec![FeatureRef::new("self_ref", "out")],
        request_sources: vec![],
        outputs: vec![FieldSchema::new("out", ValueType::Float64)],
        transform: null_output_transform("out"),
    });

    assert!(matches!(result, Err(RegistryError::CyclicDependency { .. })));
    assert!(registry.on_demand_view("self_ref").is_err());
}

#[test]
fn cyclic_on_demand_batch_fails_and_registers_nothing() {
    let mut registry = registry_with_credit_view();
    let result = registry.register_on_demand_views(vec![
        OnDemandFeatureView {
            name: "risk_score".to_string(),
            inputs: vec![FeatureRef::new("debt_ratio", "debt_ratio")],
            request_sources: vec![],
            outputs: vec![FieldSchema::new("risk_score", ValueType::Float64)],
            transform: null_output_transform("risk_score"),
        },
        OnDemandFeatureView {
            name: "debt_ratio".to_string(),
            inputs: vec![FeatureRef::new("risk_score", "risk_score")],
            request_sources: vec![],
            outputs: vec![FieldSchema::new("debt_ratio", ValueType::Float64)],
            transform: null_output_transform("debt_ratio"),
        },
    ]);

    assert!(matches!(result, Err(RegistryError::CyclicDependency { .. })));
    assert!(registry.on_demand_view("risk_score").is_err());
    assert!(registry.on_demand_view("debt_ratio").is_err());
}

#[test]
fn on_demand_chain_is_ordered_dependencies_first() {
    let mut registry = registry_with_credit_view();
    registry
        .register_request_source(RequestDataSource {
            name: "application_data".to_string(),
            fields: vec![FieldSchema::new("loan_amnt", ValueType::Int64)],
        })
        .unwrap();
    registry
        .register_on_demand_views(vec![
            OnDemandFeatureView {
                name: "debt_ratio".to_string(),
                inputs: vec![FeatureRef::new("total_debt", "total_debt_due")],
                request_sources: vec![],
                outputs: vec![FieldSchema::new("debt_ratio", ValueType::Float64)],
                transform: null_output_transform("debt_ratio"),
            },
            OnDemandFeatureView {
                name: "total_debt".to_string(),
                inputs: vec![
                    FeatureRef::new("credit_history", "credit_card_due"),
                    FeatureRef::new("credit_history", "mortgage_due"),
                ],
                request_sources: vec!["application_data".to_string()],
                outputs: vec![FieldSchema::new("total_debt_due", ValueType::Float64)],
                transform: null_output_transform("total_debt_due"),
            },
        ])
        .unwrap();

    let order = registry.on_demand_order();
    let total_idx = order.iter().position(|name| name == "total_debt").unwrap();
    let ratio_idx = order.iter().position(|name| name == "debt_ratio").unwrap();
    assert!(total_idx < ratio_idx);
}

#[test]
fn lookup_of_unregistered_names_is_not_found() {
    let registry = registry_with_credit_view();
    assert!(matches!(
        registry.feature_view("zipcode_features"),
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        registry.service("credit_assessment_v1"),
        Err(RegistryError::NotFound { .. })
    ));
    assert!(registry.feature_view("credit_history").is_ok());
}
