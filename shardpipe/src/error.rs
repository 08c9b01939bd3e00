use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardPipeError {
    #[error("record is missing split key '{key}'")]
    MissingSplitKey { key: String },

    #[error("split key '{key}' holds a non-scalar value")]
    NonScalarSplitValue { key: String },

    #[error("record batch is empty")]
    EmptyBatch,

    #[error("shard write failed for key value '{key_value}': {source}")]
    ShardWriteFailed {
        key_value: String,
        #[source]
        source: Box<ShardPipeError>,
    },

    #[error("shard file not found: {resource}/{filename}")]
    ShardFileNotFound { resource: String, filename: String },

    #[error("resource not found: {name}")]
    ResourceNotFound { name: String },

    #[error("search backend unavailable during {operation}: {reason}")]
    SearchBackendUnavailable { operation: String, reason: String },

    #[error("operation '{operation}' exceeded its deadline")]
    Timeout { operation: String },

    #[error("could not acquire index guard for {resource}/{filename}")]
    LockContention { resource: String, filename: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ShardPipeError>;
