use drover_core::auth::Authenticator;
use drover_core::types::{Changeset, Repo};
use drover_sources::{ChangesetSource, Sourcer};
use drover_store::ReconcilerStore;

use crate::ExecutorError;

/// A changeset source bound to whatever credential resolution picked. The
/// authenticator is kept alongside because the push-config builder needs
/// it again for the git remote.
pub(crate) struct ResolvedSource {
    pub source: Box<dyn ChangesetSource>,
    pub authenticator: Option<Authenticator>,
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("source", &"<dyn ChangesetSource>")
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

pub(crate) async fn load_changeset_source(
    store: &dyn ReconcilerStore,
    sourcer: &dyn Sourcer,
    changeset: &Changeset,
    repo: &Repo,
) -> Result<ResolvedSource, ExecutorError> {
    let authenticator = resolve_authenticator(store, changeset, repo).await?;
    let source = sourcer.for_repo(repo, authenticator.as_ref())?;
    Ok(ResolvedSource {
        source,
        authenticator,
    })
}

/// Pick the credential for acting on this changeset, in priority order:
/// imported changesets use the site credential or ambient configuration;
/// owned changesets use the owning user's credential, falling back to the
/// site credential. The fallback applies uniformly — site admins get no
/// implicit bypass.
async fn resolve_authenticator(
    store: &dyn ReconcilerStore,
    changeset: &Changeset,
    repo: &Repo,
) -> Result<Option<Authenticator>, ExecutorError> {
    let kind = repo.external_service_kind;
    let service_id = &repo.external_service_id;

    let owner = match changeset.owned_by_batch_change_id {
        None => {
            // Imported changeset: nothing here acts on a user's behalf.
            let site = store.get_site_credential(kind, service_id).await?;
            return Ok(site.map(|cred| cred.authenticator));
        }
        Some(id) => id,
    };

    let batch_change = match store.get_batch_change(owner).await {
        Ok(batch_change) => batch_change,
        Err(err) if err.is_not_found() => {
            return Err(ExecutorError::BatchChangeNotFound { id: owner });
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(cred) = store
        .get_user_credential(batch_change.creator_user_id, kind, service_id)
        .await?
    {
        return Ok(Some(cred.authenticator));
    }

    if let Some(cred) = store.get_site_credential(kind, service_id).await? {
        return Ok(Some(cred.authenticator));
    }

    Err(ExecutorError::MissingCredentials {
        repo: repo.name.clone(),
    })
}
