use thiserror::Error;

use drover_core::id::BatchChangeId;
use drover_git::GitError;
use drover_sources::SourceError;
use drover_store::StoreError;

/// Error returned from plan execution. The external job queue only looks at
/// one bit of it: [`ExecutorError::is_non_retryable`]. Everything not
/// explicitly terminal is treated as transient and re-attempted with
/// backoff.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("changeset with external id {external_id} no longer exists on the code host")]
    ChangesetNotFound { external_id: String },
    #[error("branch {branch} is already in use by another published changeset in this repository")]
    DuplicateBranch { branch: String },
    #[error("repository {repo} is archived on the code host")]
    RepoArchived { repo: String },
    #[error("no usable credentials for {repo}; add a user or site credential")]
    MissingCredentials { repo: String },
    #[error("pushing to this remote requires authentication")]
    AuthenticationRequired,
    #[error("ssh remotes require a credential that carries an ssh key")]
    SshCredentialRequired,
    #[error("batch change {id} no longer exists")]
    BatchChangeNotFound { id: BatchChangeId },
    #[error("operation requires a changeset spec but none is attached")]
    MissingSpec,
    #[error("operation requires an external id but none is recorded")]
    MissingExternalId,
    #[error("execution canceled")]
    Canceled,
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
    #[error("resolving external url: {0}")]
    ExternalUrl(String),
    #[error("invalid external url: {0}")]
    InvalidExternalUrl(#[from] url::ParseError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ExecutorError {
    /// Whether a re-attempt can never succeed without operator action.
    pub fn is_non_retryable(&self) -> bool {
        match self {
            ExecutorError::ChangesetNotFound { .. }
            | ExecutorError::DuplicateBranch { .. }
            | ExecutorError::RepoArchived { .. }
            | ExecutorError::MissingCredentials { .. }
            | ExecutorError::AuthenticationRequired
            | ExecutorError::SshCredentialRequired
            | ExecutorError::BatchChangeNotFound { .. }
            | ExecutorError::MissingSpec
            | ExecutorError::MissingExternalId
            | ExecutorError::Internal(_) => true,
            ExecutorError::Source(SourceError::DraftsUnsupported { .. }) => true,
            // Cancellation is always retryable: the scheduler re-attempts
            // from freshly-read state.
            ExecutorError::Canceled => false,
            ExecutorError::ExternalUrl(_)
            | ExecutorError::InvalidExternalUrl(_)
            | ExecutorError::Source(_)
            | ExecutorError::Git(_)
            | ExecutorError::Store(_) => false,
        }
    }
}
