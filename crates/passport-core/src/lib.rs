pub mod app_config;
pub mod catalog;
pub mod config;
pub mod import;
pub mod reconcile;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    load_catalog_snapshot, save_catalog_snapshot, CatalogEntity, CatalogEntityKind,
    CatalogSnapshot, Category, UnmappedValue,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use import::{ImportJob, ImportJobStatus, ImportRowError, Page, RowStatus, StagingRow};
pub use reconcile::{
    canonicalize, leaf_segment, levenshtein, CategoryMatch, CategoryReconciler, MatchKind,
    ReconcileError, DEFAULT_MAX_DISTANCE,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("catalog snapshot I/O error for {path}: {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog snapshot YAML error: {0}")]
    SnapshotParse(#[from] serde_yaml::Error),

    #[error("catalog snapshot validation failed: {0}")]
    Validation(String),
}
