use chrono::{TimeZone, Utc};
use fstore::{
    feature_store_config_from_env, init_logging, log_stores_opened, logging_config_from_env,
    register_credit_scoring_definitions, seed_credit_scoring_rows, FeatureStore,
};

const STEP_MS: i64 = 1_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let cfg = feature_store_config_from_env();
    let mut store = FeatureStore::open(&cfg)?;
    register_credit_scoring_definitions(&mut store)?;
    store.ensure_view_tables()?;
    log_stores_opened("materialize_sync", &cfg.offline_path, &cfg.online_path);

    if env_flag("FSTORE_SEED_DEMO") {
        seed_credit_scoring_rows(&store, Utc::now().timestamp_millis())?;
        println!("Seeded demo rows into the offline store.");
    }

    let to_ts = floor_to_second_ms(Utc::now().timestamp_millis());
    println!(
        "Materialization sync start | offline={} online={} to={}",
        cfg.offline_path.display(),
        cfg.online_path.display(),
        format_ts(to_ts)
    );

    for view_name in store.registry().feature_view_names() {
        let before = store.watermark(&view_name)?;
        let report = store.materialize_incremental(&view_name, to_ts)?;
        println!(
            "view {} | from={} scanned={} written={} watermark={}",
            report.feature_view,
            before.map(format_ts).unwrap_or_else(|| "begin".to_string()),
            report.scanned_rows,
            report.written_keys,
            format_ts(report.watermark_ms)
        );

        let after = store.watermark(&view_name)?;
        if after != Some(report.watermark_ms) {
            return Err(format!(
                "watermark assertion failed for {}: expected {} have {:?}",
                view_name, report.watermark_ms, after
            )
            .into());
        }
    }

    println!("All feature views materialized and watermarks asserted.");
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn floor_to_second_ms(ts_ms: i64) -> i64 {
    ts_ms.div_euclid(STEP_MS) * STEP_MS
}

fn format_ts(ts_ms: i64) -> String {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}
