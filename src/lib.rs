//! Minimal feature store core.
//!
//! Implemented scope:
//! - typed definition registry with on-demand dependency ordering
//! - SQLite offline store with point-in-time-correct historical retrieval
//! - SQLite online store fed by watermarked incremental materialization
//! - pure on-demand transformation evaluation
//! - a retrieval facade and HTTP serving routes on top of it

mod observability;
mod offline;
mod ondemand;
mod online;
mod registry;
mod retrieval;
mod server;
mod validation;

pub use observability::{
    init_logging, log_app_bind, log_app_start, log_stores_opened, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use offline::{
    EntityRow, HistoricalResult, OfflineStore, OfflineStoreError, SavedDataset, SourceRow,
};
pub use ondemand::{evaluate, evaluate_chain, EvalError};
pub use online::{
    online_store_config_from_env, MaterializeReport, OnlineReadRow, OnlineStore,
    OnlineStoreConfig, OnlineStoreError,
};
pub use registry::{
    DataSource, DefinitionKind, Entity, FeatureRef, FeatureService, FeatureView, FieldSchema,
    OnDemandFeatureView, Registry, RegistryError, RequestDataSource, Transform, Value, ValueType,
};
pub use retrieval::{
    feature_store_config_from_env, register_credit_scoring_definitions, seed_credit_scoring_rows,
    EntityFrame, FeatureStore, FeatureStoreConfig, HistoricalRequest, HistoricalResponse,
    OnlineRequest, OnlineResponse, OnlineResponseRow, RetrievalError,
};
pub use server::feature_server_router;
pub use validation::{check_bounds, BoundsRule, IngestReport, ValidationPolicy};
