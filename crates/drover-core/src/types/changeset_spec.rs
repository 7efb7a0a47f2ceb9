use serde::{Deserialize, Serialize};

use crate::id::{ChangesetSpecId, RepoId, UserId};

/// Immutable desired state for one reconciliation cycle. Produced by the
/// planner; the executor only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesetSpec {
    pub id: ChangesetSpecId,
    pub repo_id: RepoId,
    pub user_id: UserId,
    /// Fully qualified base ref, e.g. `refs/heads/main`.
    pub base_ref: String,
    /// Fully qualified head ref the commit is pushed to.
    pub head_ref: String,
    pub title: String,
    pub body: String,
    pub commit_message: String,
    pub commit_author_name: String,
    pub commit_author_email: String,
    /// Unified diff the git transport materializes into a commit.
    pub diff: String,
    pub published: bool,
}
