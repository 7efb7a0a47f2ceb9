use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use drover_core::auth::{SiteCredential, UserCredential};
use drover_core::id::{BatchChangeId, ChangesetId, ExternalServiceId, NamespaceId, RepoId, UserId};
use drover_core::types::{
    BatchChange, Changeset, ExternalServiceKind, Namespace, PublicationState, Repo,
};

use crate::{ReconcilerStore, RepoStore, StoreError};

type SiteCredentialKey = (ExternalServiceKind, ExternalServiceId);
type UserCredentialKey = (UserId, ExternalServiceKind, ExternalServiceId);

/// In-memory store for tests and embedded deployments. Every method takes
/// the lock for a single map operation, mirroring the one-short-transaction
/// contract of the traits.
#[derive(Default)]
pub struct MemStore {
    repos: RwLock<HashMap<RepoId, Repo>>,
    changesets: RwLock<HashMap<ChangesetId, Changeset>>,
    batch_changes: RwLock<HashMap<BatchChangeId, BatchChange>>,
    namespaces: RwLock<HashMap<NamespaceId, Namespace>>,
    site_credentials: RwLock<HashMap<SiteCredentialKey, SiteCredential>>,
    user_credentials: RwLock<HashMap<UserCredentialKey, UserCredential>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_repo(&self, repo: Repo) {
        self.repos.write().await.insert(repo.id, repo);
    }

    pub async fn insert_changeset(&self, changeset: Changeset) {
        self.changesets
            .write()
            .await
            .insert(changeset.id, changeset);
    }

    pub async fn insert_batch_change(&self, batch_change: BatchChange) {
        self.batch_changes
            .write()
            .await
            .insert(batch_change.id, batch_change);
    }

    pub async fn insert_namespace(&self, namespace: Namespace) {
        self.namespaces
            .write()
            .await
            .insert(namespace.id, namespace);
    }

    pub async fn insert_site_credential(&self, credential: SiteCredential) {
        let key = (
            credential.external_service_kind,
            credential.external_service_id.clone(),
        );
        self.site_credentials.write().await.insert(key, credential);
    }

    pub async fn insert_user_credential(&self, credential: UserCredential) {
        let key = (
            credential.user_id,
            credential.external_service_kind,
            credential.external_service_id.clone(),
        );
        self.user_credentials.write().await.insert(key, credential);
    }

    pub async fn get_changeset(&self, id: ChangesetId) -> Result<Changeset, StoreError> {
        self.changesets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("changeset", id))
    }
}

#[async_trait]
impl ReconcilerStore for MemStore {
    async fn get_repo(&self, id: RepoId) -> Result<Repo, StoreError> {
        self.repos
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("repo", id))
    }

    async fn update_changeset(&self, changeset: &Changeset) -> Result<(), StoreError> {
        self.changesets
            .write()
            .await
            .insert(changeset.id, changeset.clone());
        Ok(())
    }

    async fn get_batch_change(&self, id: BatchChangeId) -> Result<BatchChange, StoreError> {
        self.batch_changes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("batch change", id))
    }

    async fn get_namespace(&self, id: NamespaceId) -> Result<Namespace, StoreError> {
        self.namespaces
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("namespace", id))
    }

    async fn get_site_credential(
        &self,
        kind: ExternalServiceKind,
        service_id: &ExternalServiceId,
    ) -> Result<Option<SiteCredential>, StoreError> {
        let key = (kind, service_id.clone());
        Ok(self.site_credentials.read().await.get(&key).cloned())
    }

    async fn get_user_credential(
        &self,
        user_id: UserId,
        kind: ExternalServiceKind,
        service_id: &ExternalServiceId,
    ) -> Result<Option<UserCredential>, StoreError> {
        let key = (user_id, kind, service_id.clone());
        Ok(self.user_credentials.read().await.get(&key).cloned())
    }

    async fn get_published_changeset_on_branch(
        &self,
        repo_id: RepoId,
        external_branch: &str,
    ) -> Result<Option<ChangesetId>, StoreError> {
        let changesets = self.changesets.read().await;
        Ok(changesets
            .values()
            .find(|cs| {
                cs.repo_id == repo_id
                    && cs.publication_state == PublicationState::Published
                    && cs.external_branch.as_deref() == Some(external_branch)
            })
            .map(|cs| cs.id))
    }
}

#[async_trait]
impl RepoStore for MemStore {
    async fn update_repo(&self, repo: &Repo) -> Result<(), StoreError> {
        self.repos.write().await.insert(repo.id, repo.clone());
        Ok(())
    }
}
