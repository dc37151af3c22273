use thiserror::Error;

/// Why a single input row was skipped.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("row {row}: {found} columns, expected at least {min}")]
    TooFewColumns { row: u64, found: usize, min: usize },
}

/// Invalid store settings caught before any data is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid table name {0:?}: use letters, digits and underscores")]
    InvalidTableName(String),

    #[error("invalid collection name {0:?}")]
    InvalidCollectionName(String),

    #[error("batch capacity must be at least 1")]
    ZeroBatchCapacity,
}
