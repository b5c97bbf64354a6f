use std::collections::BTreeMap;

use chrono::Utc;
use fstore::{
    feature_store_config_from_env, init_logging, logging_config_from_env,
    register_credit_scoring_definitions, seed_credit_scoring_rows, EntityFrame, FeatureStore,
    HistoricalRequest, OnlineRequest, Value,
};

const DAY_MS: i64 = 86_400_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let cfg = feature_store_config_from_env();
    let mut store = FeatureStore::open(&cfg)?;
    register_credit_scoring_definitions(&mut store)?;
    store.ensure_view_tables()?;

    let now_ms = Utc::now().timestamp_millis();

    println!("=== ingest ===");
    seed_credit_scoring_rows(&store, now_ms)?;
    println!("Seeded zipcode and credit history rows.");

    println!("\n=== historical retrieval (training frame) ===");
    let frame = EntityFrame {
        columns: BTreeMap::from([
            (
                "zipcode".to_string(),
                vec![Value::Int64(76104), Value::Int64(60629)],
            ),
            (
                "dob_ssn".to_string(),
                vec![
                    Value::Text("19630621_4278".to_string()),
                    Value::Text("19790429_9552".to_string()),
                ],
            ),
            (
                "loan_amnt".to_string(),
                vec![Value::Int64(35_000), Value::Int64(7_500)],
            ),
        ]),
        event_times_ms: vec![now_ms, now_ms],
    };
    let historical = store.get_historical_features(&HistoricalRequest {
        feature_service: Some("credit_assessment_v1".to_string()),
        features: vec![],
        frame,
    })?;
    println!("columns: {:?}", historical.columns);
    for row in &historical.rows {
        println!("row: {row:?}");
    }

    println!("\n=== saved dataset ===");
    let dataset = store.create_saved_dataset(
        "credit_score_training_v1",
        &["credit_assessment_v1".to_string()],
        &historical,
        BTreeMap::from([("purpose".to_string(), "training".to_string())]),
    )?;
    println!(
        "saved dataset {} | rows={} fingerprint={}",
        dataset.name,
        dataset.rows.len(),
        dataset.fingerprint
    );

    println!("\n=== materialization ===");
    for report in store.materialize_incremental_all(now_ms)? {
        println!(
            "view {} | scanned={} written={} watermark={}",
            report.feature_view, report.scanned_rows, report.written_keys, report.watermark_ms
        );
    }

    println!("\n=== online retrieval (loan request) ===");
    let request = OnlineRequest {
        feature_service: Some("credit_assessment_v1".to_string()),
        features: vec![],
        entities: BTreeMap::from([
            ("zipcode".to_string(), vec![Value::Int64(76104)]),
            (
                "dob_ssn".to_string(),
                vec![Value::Text("19630621_4278".to_string())],
            ),
            ("loan_amnt".to_string(), vec![Value::Int64(35_000)]),
        ]),
    };
    let online = store.get_online_features(&request)?;
    for (name, value) in online.feature_names.iter().zip(&online.rows[0].values) {
        println!("{name} = {value:?}");
    }

    let total_debt = online
        .feature_names
        .iter()
        .position(|name| name == "total_debt_due")
        .and_then(|idx| online.rows[0].values[idx].as_f64());
    match total_debt {
        Some(total) => println!("\nTotal debt due including the requested loan: {total}"),
        None => println!("\nTotal debt due could not be computed (missing history)."),
    }

    println!("\n=== freshness window check ===");
    let stale_ts = now_ms - 134 * DAY_MS;
    let frame = EntityFrame {
        columns: BTreeMap::from([(
            "dob_ssn".to_string(),
            vec![Value::Text("19630621_4278".to_string())],
        )]),
        event_times_ms: vec![stale_ts],
    };
    let stale = store.get_historical_features(&HistoricalRequest {
        feature_service: None,
        features: vec!["credit_history:credit_card_due".to_string()],
        frame,
    })?;
    println!(
        "credit_card_due at {} days before ingest: {:?} (outside the 90 day TTL)",
        134, stale.rows[0].last()
    );

    Ok(())
}
