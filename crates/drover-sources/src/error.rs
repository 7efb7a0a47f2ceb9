use thiserror::Error;

use drover_core::types::ExternalServiceKind;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("changeset with external id {external_id} not found on code host")]
    ChangesetNotFound { external_id: String },
    #[error("repository is archived on the code host")]
    RepoArchived,
    #[error("{kind} does not support draft changesets")]
    DraftsUnsupported { kind: ExternalServiceKind },
    #[error("code host rejected credentials: {0}")]
    Unauthorized(String),
    #[error("code host error: status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SourceError {
    pub fn is_archived(&self) -> bool {
        matches!(self, SourceError::RepoArchived)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::ChangesetNotFound { .. })
    }
}
