pub mod error;
pub mod http;

pub use error::GitError;
pub use http::HttpGitClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const HEAD_REF_PREFIX: &str = "refs/heads/";

/// Qualify a branch name as a full ref. Already-qualified names pass
/// through unchanged.
pub fn ensure_ref_prefix(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("{HEAD_REF_PREFIX}{name}")
    }
}

/// Inverse of [`ensure_ref_prefix`] for the branch names host APIs expect.
pub fn strip_ref_prefix(ref_name: &str) -> &str {
    ref_name.strip_prefix(HEAD_REF_PREFIX).unwrap_or(ref_name)
}

/// Where and how a commit gets pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Remote URL with any userinfo credentials already embedded.
    pub remote_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

/// Request to materialize a diff as a commit on a ref and push it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPatchRequest {
    pub repo_name: String,
    /// Revision the patch applies on top of.
    pub base_ref: String,
    /// Ref the resulting commit is pushed to.
    pub target_ref: String,
    pub patch: String,
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
    pub push: PushConfig,
}

/// Client for the internal git service that turns diffs into pushed
/// commits. Implementations must surface the push's combined output on
/// failure so provider archived-repository heuristics can inspect it.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Returns the ref the commit landed on.
    async fn create_commit_from_patch(
        &self,
        req: &CommitPatchRequest,
    ) -> Result<String, GitError>;
}
