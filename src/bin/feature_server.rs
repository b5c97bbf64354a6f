use std::{net::SocketAddr, sync::Arc};

use chrono::Utc;
use fstore::{
    feature_server_router, feature_store_config_from_env, init_logging, log_app_bind,
    log_app_start, log_stores_opened, logging_config_from_env,
    register_credit_scoring_definitions, seed_credit_scoring_rows, FeatureStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("feature_server", &logging_cfg);

    let addr: SocketAddr = std::env::var("FSTORE_SERVER_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8866".to_string())
        .parse()?;

    let cfg = feature_store_config_from_env();
    let mut store = FeatureStore::open(&cfg)?;
    register_credit_scoring_definitions(&mut store)?;
    store.ensure_view_tables()?;
    log_stores_opened("feature_server", &cfg.offline_path, &cfg.online_path);

    if seed_demo_from_env() {
        let now_ms = Utc::now().timestamp_millis();
        seed_credit_scoring_rows(&store, now_ms)?;
        store.materialize_incremental_all(now_ms)?;
    }

    let app = feature_server_router(Arc::new(store));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind("feature_server", bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn seed_demo_from_env() -> bool {
    std::env::var("FSTORE_SEED_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
