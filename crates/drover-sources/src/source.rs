use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drover_core::auth::Authenticator;
use drover_core::types::{ChangesetMetadata, Repo};

use crate::SourceError;

/// What a mutating host call sends: the desired state of the changeset on
/// the provider side. Refs are fully qualified; providers shorten them to
/// whatever their API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetPayload {
    /// Host-relative repository name, e.g. `acme/website`.
    pub repo_name: String,
    pub base_ref: String,
    pub head_ref: String,
    pub title: String,
    pub body: String,
    /// Provider-assigned id, required for update calls.
    pub external_id: Option<String>,
}

/// Result of a create call. Creation is not idempotent on any provider, so
/// "already exists" is an expected outcome, not an error: callers converge
/// by updating instead.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub metadata: ChangesetMetadata,
    pub already_exists: bool,
}

/// Capability contract over one code-host provider.
///
/// Every mutating call returns the provider's view of the changeset so the
/// executor can copy it onto the tracked record.
#[async_trait]
pub trait ChangesetSource: Send + Sync {
    /// Re-read the changeset from the host by its provider-assigned id.
    async fn load_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError>;

    async fn create_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError>;

    async fn create_draft_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError>;

    async fn update_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<ChangesetMetadata, SourceError>;

    async fn close_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError>;

    async fn reopen_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError>;

    async fn undraft_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError>;

    /// Whether the combined output of a failed push indicates the
    /// destination repository is archived on this provider.
    fn is_archived_push_error(&self, output: &str) -> bool;
}

/// Builds a [`ChangesetSource`] for a repository, bound to the given
/// credential. `None` means ambient/global configuration.
pub trait Sourcer: Send + Sync {
    fn for_repo(
        &self,
        repo: &Repo,
        authenticator: Option<&Authenticator>,
    ) -> Result<Box<dyn ChangesetSource>, SourceError>;
}
