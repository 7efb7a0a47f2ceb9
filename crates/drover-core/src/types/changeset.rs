use serde::{Deserialize, Serialize};

use crate::id::{BatchChangeId, ChangesetId, ChangesetSpecId, RepoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    Unpublished,
    Published,
}

/// Lifecycle state of the changeset as reported by the code host.
///
/// `ReadOnly` is terminal: it is set when the backing repository was found
/// archived and no further host mutation may be attempted until an operator
/// intervenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalState {
    Open,
    Draft,
    Closed,
    Merged,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStat {
    pub added: u64,
    pub deleted: u64,
}

/// Membership of a changeset in one batch change, with the pending intents
/// the planner sets on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchChangeAssoc {
    pub batch_change_id: BatchChangeId,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub detach: bool,
}

impl BatchChangeAssoc {
    pub fn new(batch_change_id: BatchChangeId) -> Self {
        Self {
            batch_change_id,
            archive: false,
            is_archived: false,
            detach: false,
        }
    }
}

/// Provider response payload returned by every mutating host call. The
/// executor copies it onto the tracked changeset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetMetadata {
    pub external_id: String,
    /// Branch name as reported by the host, without the refs/heads/ prefix.
    pub head_ref: String,
    pub title: String,
    pub body: String,
    pub state: ExternalState,
    pub diff_stat: Option<DiffStat>,
}

/// Tracked PR/MR record reconciled by the plan executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Changeset {
    pub id: ChangesetId,
    pub repo_id: RepoId,
    /// Provider-assigned identity, known once published or imported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Fully qualified (refs/heads/...) branch the changeset lives on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_branch: Option<String>,
    pub publication_state: PublicationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_state: Option<ExternalState>,
    /// Pending-close intent set by the planner, cleared by the Close handler.
    #[serde(default)]
    pub closing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detached_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_spec_id: Option<ChangesetSpecId>,
    /// None for imported/unowned changesets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by_batch_change_id: Option<BatchChangeId>,
    #[serde(default)]
    pub batch_changes: Vec<BatchChangeAssoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_stat: Option<DiffStat>,
}

impl Changeset {
    pub fn new(id: ChangesetId, repo_id: RepoId) -> Self {
        Self {
            id,
            repo_id,
            external_id: None,
            external_branch: None,
            publication_state: PublicationState::Unpublished,
            external_state: None,
            closing: false,
            detached_at_ms: None,
            current_spec_id: None,
            owned_by_batch_change_id: None,
            batch_changes: Vec::new(),
            title: None,
            body: None,
            diff_stat: None,
        }
    }

    pub fn published(&self) -> bool {
        self.publication_state == PublicationState::Published
    }

    pub fn unowned(&self) -> bool {
        self.owned_by_batch_change_id.is_none()
    }

    /// Batch changes this changeset is currently attached to.
    pub fn attached_to(&self) -> Vec<BatchChangeId> {
        self.batch_changes
            .iter()
            .map(|assoc| assoc.batch_change_id)
            .collect()
    }

    /// Resolve every association the planner flagged for archival.
    pub fn archive_flagged_associations(&mut self) {
        for assoc in &mut self.batch_changes {
            if assoc.archive {
                assoc.is_archived = true;
                assoc.archive = false;
            }
        }
    }

    /// Drop every association flagged for detach. Returns whether any
    /// association was removed.
    pub fn remove_detach_flagged_associations(&mut self) -> bool {
        let before = self.batch_changes.len();
        self.batch_changes.retain(|assoc| !assoc.detach);
        self.batch_changes.len() != before
    }
}
