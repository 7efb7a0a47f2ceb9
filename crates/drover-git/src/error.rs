use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// The commit-from-patch call failed on the remote side. The combined
    /// stderr/stdout of the push is kept so callers can run provider
    /// heuristics (e.g. archived-repository detection) over it.
    #[error("creating commit from patch failed: {combined_output}")]
    CreateCommit { combined_output: String },
    #[error("invalid push remote: {0}")]
    InvalidRemote(String),
    #[error("git service error: status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl GitError {
    /// Combined push output, when this error carries one.
    pub fn push_output(&self) -> Option<&str> {
        match self {
            GitError::CreateCommit { combined_output } => Some(combined_output),
            _ => None,
        }
    }
}
