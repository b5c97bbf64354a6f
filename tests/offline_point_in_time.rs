use std::collections::BTreeMap;

use chrono::TimeZone;
use fstore::{
    BoundsRule, DataSource, Entity, EntityRow, FeatureRef, FeatureView, FieldSchema,
    OfflineStore, OfflineStoreError, Registry, SourceRow, ValidationPolicy, Value, ValueType,
};
use regex::Regex;
use tempfile::tempdir;

const DAY_MS: i64 = 86_400_000;

fn ts_ms(year: i32, month: u32, day: u32) -> i64 {
    chrono::Utc
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid UTC timestamp expected")
        .timestamp_millis()
}

fn credit_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_entity(Entity {
            name: "dob_ssn".to_string(),
            value_type: ValueType::Text,
            description: "Date of birth and last four digits of SSN".to_string(),
        })
        .unwrap();
    registry
        .register_source(DataSource {
            name: "credit_history_source".to_string(),
            table: "credit_history".to_string(),
            entity_columns: vec!["dob_ssn".to_string()],
            timestamp_column: "event_timestamp".to_string(),
            created_timestamp_column: Some("created_timestamp".to_string()),
        })
        .unwrap();
    registry
        .register_feature_view(FeatureView {
            name: "credit_history".to_string(),
            entities: vec!["dob_ssn".to_string()],
            ttl_ms: 90 * DAY_MS,
            fields: vec![
                FieldSchema::new("credit_card_due", ValueType::Int64),
                FieldSchema::new("hard_pulls", ValueType::Int64),
            ],
            source: "credit_history_source".to_string(),
            validation: vec![
                BoundsRule::new("credit_card_due", 0.0, 500_000.0),
                BoundsRule::new("hard_pulls", 0.0, 20.0),
            ],
        })
        .unwrap();
    registry
}

fn credit_row(dob_ssn: &str, event_time_ms: i64, credit_card_due: i64) -> SourceRow {
    SourceRow {
        keys: BTreeMap::from([("dob_ssn".to_string(), Value::Text(dob_ssn.to_string()))]),
        event_time_ms,
        created_time_ms: Some(event_time_ms),
        values: BTreeMap::from([
            ("credit_card_due".to_string(), Value::Int64(credit_card_due)),
            ("hard_pulls".to_string(), Value::Int64(1)),
        ]),
    }
}

fn entity_row(dob_ssn: &str, event_time_ms: i64) -> EntityRow {
    EntityRow {
        keys: BTreeMap::from([("dob_ssn".to_string(), Value::Text(dob_ssn.to_string()))]),
        event_time_ms,
    }
}

fn refs(raw: &[&str]) -> Vec<FeatureRef> {
    raw.iter().map(|r| FeatureRef::parse(r).unwrap()).collect()
}

#[test]
fn join_never_returns_values_from_future_rows() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let requested = ts_ms(2023, 3, 15);
    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[
                credit_row("19790429_9552", requested - 5 * DAY_MS, 1_000),
                credit_row("19790429_9552", requested + DAY_MS, 9_999),
            ],
            ValidationPolicy::Strict,
        )
        .unwrap();

    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19790429_9552", requested)],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();

    assert_eq!(result.rows[0][0], Value::Int64(1_000));

    // A key whose only row lies in the future resolves to null.
    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[credit_row("19630621_4278", requested + DAY_MS, 123)],
            ValidationPolicy::Strict,
        )
        .unwrap();
    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19630621_4278", requested)],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Null);
}

#[test]
fn ninety_day_ttl_includes_73_day_old_row_and_excludes_134_day_old_row() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let requested = ts_ms(2023, 3, 15);
    let within_ttl = ts_ms(2023, 1, 1);
    let beyond_ttl = ts_ms(2022, 11, 1);

    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[credit_row("19790429_9552", within_ttl, 8_998)],
            ValidationPolicy::Strict,
        )
        .unwrap();
    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19790429_9552", requested)],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Int64(8_998));

    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[credit_row("19630621_4278", beyond_ttl, 2_944)],
            ValidationPolicy::Strict,
        )
        .unwrap();
    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19630621_4278", requested)],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Null);
}

#[test]
fn latest_eligible_row_wins_and_reingest_updates_in_place() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let requested = ts_ms(2023, 3, 15);
    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[
                credit_row("19790429_9552", requested - 60 * DAY_MS, 500),
                credit_row("19790429_9552", requested - 10 * DAY_MS, 700),
            ],
            ValidationPolicy::Strict,
        )
        .unwrap();

    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19790429_9552", requested)],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Int64(700));

    // Re-ingesting the same key and timestamp replaces the stored values.
    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[credit_row("19790429_9552", requested - 10 * DAY_MS, 750)],
            ValidationPolicy::Strict,
        )
        .unwrap();
    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19790429_9552", requested)],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Int64(750));
}

#[test]
fn output_has_one_row_per_input_row_in_input_order() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let requested = ts_ms(2023, 3, 15);
    store
        .ingest_rows(
            &registry,
            "credit_history",
            &[
                credit_row("19790429_9552", requested - DAY_MS, 111),
                credit_row("19630621_4278", requested - DAY_MS, 222),
            ],
            ValidationPolicy::Strict,
        )
        .unwrap();

    let result = store
        .get_historical_features(
            &registry,
            &[
                entity_row("19630621_4278", requested),
                entity_row("no_such_person", requested),
                entity_row("19790429_9552", requested),
            ],
            &refs(&["credit_history:credit_card_due", "credit_history:hard_pulls"]),
        )
        .unwrap();

    assert_eq!(result.columns, vec!["credit_card_due", "hard_pulls"]);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(result.rows[0][0], Value::Int64(222));
    assert_eq!(result.rows[1][0], Value::Null);
    assert_eq!(result.rows[1][1], Value::Null);
    assert_eq!(result.rows[2][0], Value::Int64(111));
}

#[test]
fn unknown_feature_reference_fails_resolution() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let result = store.get_historical_features(
        &registry,
        &[entity_row("19790429_9552", ts_ms(2023, 3, 15))],
        &refs(&["credit_history:soft_pulls"]),
    );
    assert!(matches!(
        result,
        Err(OfflineStoreError::UnknownFeature { .. })
    ));

    let result = store.get_historical_features(
        &registry,
        &[entity_row("19790429_9552", ts_ms(2023, 3, 15))],
        &refs(&["loan_history:credit_card_due"]),
    );
    assert!(matches!(
        result,
        Err(OfflineStoreError::UnknownFeature { .. })
    ));
}

#[test]
fn strict_policy_fails_ingest_on_bound_violation() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let mut bad = credit_row("19790429_9552", ts_ms(2023, 1, 1), 999_999);
    bad.values
        .insert("hard_pulls".to_string(), Value::Int64(1));

    let result = store.ingest_rows(
        &registry,
        "credit_history",
        &[bad],
        ValidationPolicy::Strict,
    );
    assert!(matches!(result, Err(OfflineStoreError::Validation { .. })));
}

#[test]
fn report_and_skip_policy_skips_violations_and_reports_them() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let rows = vec![
        credit_row("19790429_9552", ts_ms(2023, 1, 1), 8_998),
        credit_row("19630621_4278", ts_ms(2023, 1, 1), 999_999),
        credit_row("19860413_2537", ts_ms(2023, 1, 2), 3_000),
    ];

    let report = store
        .ingest_rows(
            &registry,
            "credit_history",
            &rows,
            ValidationPolicy::ReportAndSkip,
        )
        .unwrap();

    assert_eq!(report.input_rows, 3);
    assert_eq!(report.ingested_rows, 2);
    assert_eq!(report.skipped_rows, 1);
    assert_eq!(report.violations.len(), 1);
    assert!(report.first_error.as_deref().unwrap().contains("credit_card_due"));

    // Skipped row is absent, not stored with clamped values.
    let result = store
        .get_historical_features(
            &registry,
            &[entity_row("19630621_4278", ts_ms(2023, 1, 15))],
            &refs(&["credit_history:credit_card_due"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Null);
}

#[test]
fn mistyped_column_value_is_rejected_regardless_of_policy() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let mut bad = credit_row("19790429_9552", ts_ms(2023, 1, 1), 1_000);
    bad.values.insert(
        "credit_card_due".to_string(),
        Value::Text("lots".to_string()),
    );

    let result = store.ingest_rows(
        &registry,
        "credit_history",
        &[bad],
        ValidationPolicy::ReportAndSkip,
    );
    assert!(matches!(result, Err(OfflineStoreError::ColumnType { .. })));
}

#[test]
fn saved_datasets_are_immutable_and_fingerprinted() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();

    let columns = vec!["credit_card_due".to_string()];
    let rows = vec![vec![Value::Int64(8_998)], vec![Value::Null]];
    let feature_refs = vec!["credit_history:credit_card_due".to_string()];
    let tags = BTreeMap::from([("purpose".to_string(), "training".to_string())]);

    let created = store
        .create_saved_dataset("training_v1", &feature_refs, &columns, &rows, tags.clone())
        .unwrap();
    let hex64 = Regex::new(r"^[0-9a-f]{64}$").unwrap();
    assert!(hex64.is_match(&created.fingerprint));

    let fetched = store.get_saved_dataset("training_v1").unwrap();
    assert_eq!(fetched.columns, columns);
    assert_eq!(fetched.rows, rows);
    assert_eq!(fetched.feature_refs, feature_refs);
    assert_eq!(fetched.tags, tags);
    assert_eq!(fetched.fingerprint, created.fingerprint);

    let duplicate = store.create_saved_dataset("training_v1", &feature_refs, &columns, &rows, tags);
    assert!(matches!(
        duplicate,
        Err(OfflineStoreError::DatasetExists(_))
    ));

    let missing = store.get_saved_dataset("training_v2");
    assert!(matches!(
        missing,
        Err(OfflineStoreError::DatasetNotFound(_))
    ));
}

#[test]
fn csv_ingest_parses_typed_columns_and_timestamps() {
    let dir = tempdir().unwrap();
    let store = OfflineStore::open(&dir.path().join("offline.sqlite")).unwrap();
    let registry = credit_registry();

    let csv_path = dir.path().join("credit_history.csv");
    std::fs::write(
        &csv_path,
        "dob_ssn,event_timestamp,created_timestamp,credit_card_due,hard_pulls\n\
         19790429_9552,2023-01-01T00:00:00Z,2023-01-01T00:00:00Z,8998,1\n\
         19630621_4278,1672531200000,,2944,\n",
    )
    .unwrap();

    let report = store
        .ingest_csv(&registry, "credit_history", &csv_path, ValidationPolicy::Strict)
        .unwrap();
    assert_eq!(report.ingested_rows, 2);

    let result = store
        .get_historical_features(
            &registry,
            &[
                entity_row("19790429_9552", ts_ms(2023, 3, 15)),
                entity_row("19630621_4278", ts_ms(2023, 3, 15)),
            ],
            &refs(&["credit_history:credit_card_due", "credit_history:hard_pulls"]),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Int64(8_998));
    assert_eq!(result.rows[0][1], Value::Int64(1));
    assert_eq!(result.rows[1][0], Value::Int64(2_944));
    assert_eq!(result.rows[1][1], Value::Null);
}
