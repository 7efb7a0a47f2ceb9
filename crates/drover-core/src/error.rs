use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid external service kind: {0}")]
    InvalidServiceKind(String),
    #[error("invalid changeset state: {0}")]
    InvalidState(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
