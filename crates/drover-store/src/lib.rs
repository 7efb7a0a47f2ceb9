pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MemStore;

use async_trait::async_trait;

use drover_core::auth::{SiteCredential, UserCredential};
use drover_core::id::{BatchChangeId, ChangesetId, ExternalServiceId, NamespaceId, RepoId, UserId};
use drover_core::types::{BatchChange, Changeset, ExternalServiceKind, Namespace, Repo};

/// Everything the plan executor reads and writes. Implementations sit in
/// front of whatever persistence the deployment uses; each method is one
/// short transaction and none may hold locks across a host round-trip.
#[async_trait]
pub trait ReconcilerStore: Send + Sync {
    async fn get_repo(&self, id: RepoId) -> Result<Repo, StoreError>;

    async fn update_changeset(&self, changeset: &Changeset) -> Result<(), StoreError>;

    async fn get_batch_change(&self, id: BatchChangeId) -> Result<BatchChange, StoreError>;

    async fn get_namespace(&self, id: NamespaceId) -> Result<Namespace, StoreError>;

    async fn get_site_credential(
        &self,
        kind: ExternalServiceKind,
        service_id: &ExternalServiceId,
    ) -> Result<Option<SiteCredential>, StoreError>;

    async fn get_user_credential(
        &self,
        user_id: UserId,
        kind: ExternalServiceKind,
        service_id: &ExternalServiceId,
    ) -> Result<Option<UserCredential>, StoreError>;

    /// Probe for a branch collision: the id of the published changeset
    /// currently occupying the given fully-qualified branch in the given
    /// repository, if any.
    async fn get_published_changeset_on_branch(
        &self,
        repo_id: RepoId,
        external_branch: &str,
    ) -> Result<Option<ChangesetId>, StoreError>;
}

/// The single repository update path the archived-repository handler uses.
#[async_trait]
pub trait RepoStore: Send + Sync {
    async fn update_repo(&self, repo: &Repo) -> Result<(), StoreError>;
}
