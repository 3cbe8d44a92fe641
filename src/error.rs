use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error("blob store '{0}' is missing required setting '{1}'")]
    BlobStore(String, &'static str),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("unable to reach MongoDB: {0}")]
    Unreachable(String),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failures of classroom operations. Each variant maps onto a single HTTP status
/// in [`crate::resp::problem`].
#[derive(Debug, Error)]
pub enum ClassroomError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("upstream service failure: {0}")]
    Upstream(String),
    #[error("unable to find a free classroom code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSer(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClassroomError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        ClassroomError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
