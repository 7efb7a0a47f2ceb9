use drover_core::types::{Changeset, ExternalState, Repo};
use drover_store::RepoStore;

use crate::ExecutorError;

/// React to a code host reporting the backing repository as archived: mark
/// the repository archived and move the changeset into its terminal
/// ReadOnly state.
///
/// The repository flag is persisted first. If that write fails the error
/// propagates and the changeset is left untouched, so callers never treat
/// ReadOnly as durable unless this returned success.
pub async fn handle_archived_repo(
    repo_store: &dyn RepoStore,
    repo: &mut Repo,
    changeset: &mut Changeset,
) -> Result<(), ExecutorError> {
    repo.archived = true;
    repo_store.update_repo(repo).await?;
    changeset.external_state = Some(ExternalState::ReadOnly);
    Ok(())
}
