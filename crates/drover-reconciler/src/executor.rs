use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use drover_core::types::{
    Changeset, ChangesetMetadata, ChangesetSpec, ExternalState, Operation, PublicationState, Repo,
};
use drover_git::{ensure_ref_prefix, CommitPatchRequest, GitClient, GitError};
use drover_sources::{ChangesetPayload, SourceError, Sourcer};
use drover_store::{ReconcilerStore, RepoStore};

use crate::archived::handle_archived_repo;
use crate::auth::{load_changeset_source, ResolvedSource};
use crate::body::{decorate_changeset_body, ExternalUrlSource};
use crate::config::ExecutorConfig;
use crate::plan::Plan;
use crate::push::build_push_config;
use crate::ExecutorError;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Race a suspension point against the execution's cancellation signal.
/// Cancellation always surfaces as a retryable error.
async fn race<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, ExecutorError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(ExecutorError::Canceled),
        out = fut => Ok(out),
    }
}

/// Executes plans against the collaborators they need: git transport,
/// changeset sources, the store, and the external-URL resolver. One
/// executor serves many sequential or concurrent plan executions; each
/// `execute` call only touches its own changeset and repository rows.
pub struct PlanExecutor {
    git: Arc<dyn GitClient>,
    sourcer: Arc<dyn Sourcer>,
    store: Arc<dyn ReconcilerStore>,
    repo_store: Arc<dyn RepoStore>,
    external_urls: Arc<dyn ExternalUrlSource>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    pub fn new(
        git: Arc<dyn GitClient>,
        sourcer: Arc<dyn Sourcer>,
        store: Arc<dyn ReconcilerStore>,
        repo_store: Arc<dyn RepoStore>,
        external_urls: Arc<dyn ExternalUrlSource>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            git,
            sourcer,
            store,
            repo_store,
            external_urls,
            config,
        }
    }

    /// Run the plan's operations strictly in order, stopping at the first
    /// error. Progress is persisted after every operation, so effects
    /// already applied stay durable across a failed attempt; the next
    /// attempt re-plans from fresh state rather than resuming a cursor.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        plan: Plan,
    ) -> Result<Changeset, ExecutorError> {
        let Plan {
            changeset,
            changeset_spec,
            ops,
        } = plan;

        if ops.is_empty() {
            return Ok(changeset);
        }

        let repo = self.store.get_repo(changeset.repo_id).await?;

        // Resolve credentials lazily: a plan made of purely local
        // operations must never touch the sourcer or credential stores.
        let source = if ops.requires_code_host() {
            Some(
                load_changeset_source(self.store.as_ref(), self.sourcer.as_ref(), &changeset, &repo)
                    .await?,
            )
        } else {
            None
        };

        let mut execution = Execution {
            executor: self,
            cancel,
            repo,
            changeset,
            spec: changeset_spec,
            source,
        };

        for op in ops.iter() {
            if cancel.is_cancelled() {
                return Err(ExecutorError::Canceled);
            }
            tracing::debug!(changeset = %execution.changeset.id, %op, "executing operation");
            if let Err(err) = execution.execute_operation(op).await {
                // Keep whatever state the failed step already recorded
                // (e.g. ReadOnly after archived-repo handling).
                if let Err(persist_err) =
                    self.store.update_changeset(&execution.changeset).await
                {
                    tracing::warn!(
                        changeset = %execution.changeset.id,
                        "persisting state of failed execution: {persist_err}"
                    );
                }
                return Err(err);
            }
            self.store.update_changeset(&execution.changeset).await?;
        }

        Ok(execution.changeset)
    }
}

/// State of one plan run: the changeset being mutated, its repository, and
/// the lazily-resolved source.
struct Execution<'a> {
    executor: &'a PlanExecutor,
    cancel: &'a CancellationToken,
    repo: Repo,
    changeset: Changeset,
    spec: Option<ChangesetSpec>,
    source: Option<ResolvedSource>,
}

impl Execution<'_> {
    async fn execute_operation(&mut self, op: Operation) -> Result<(), ExecutorError> {
        match op {
            Operation::Import => self.import().await,
            Operation::Push => self.push().await,
            Operation::Publish => self.publish(false).await,
            Operation::PublishDraft => self.publish(true).await,
            Operation::Update => self.update().await,
            Operation::Undraft => self.undraft().await,
            Operation::Close => self.close().await,
            Operation::Reopen => self.reopen().await,
            Operation::Sync => self.sync().await,
            Operation::Sleep => self.sleep().await,
            Operation::Archive => self.archive(),
            Operation::Detach => self.detach(),
        }
    }

    fn resolved(&self) -> Result<&ResolvedSource, ExecutorError> {
        self.source
            .as_ref()
            .ok_or(ExecutorError::Internal("operation ran without a changeset source"))
    }

    fn spec(&self) -> Result<&ChangesetSpec, ExecutorError> {
        self.spec.as_ref().ok_or(ExecutorError::MissingSpec)
    }

    fn external_id(&self) -> Result<String, ExecutorError> {
        self.changeset
            .external_id
            .clone()
            .ok_or(ExecutorError::MissingExternalId)
    }

    fn apply_metadata(&mut self, meta: ChangesetMetadata) {
        self.changeset.external_id = Some(meta.external_id);
        self.changeset.external_branch = Some(ensure_ref_prefix(&meta.head_ref));
        self.changeset.external_state = Some(meta.state);
        self.changeset.title = Some(meta.title);
        self.changeset.body = Some(meta.body);
        self.changeset.diff_stat = meta.diff_stat;
    }

    /// Run archived-repo handling, then surface the terminal error. A
    /// failure while persisting the repository flag takes precedence so
    /// the detection step is re-attempted.
    async fn archived_failure(&mut self) -> ExecutorError {
        if let Err(err) = handle_archived_repo(
            self.executor.repo_store.as_ref(),
            &mut self.repo,
            &mut self.changeset,
        )
        .await
        {
            return err;
        }
        ExecutorError::RepoArchived {
            repo: self.repo.name.clone(),
        }
    }

    async fn source_failure(&mut self, err: SourceError) -> ExecutorError {
        match err {
            SourceError::RepoArchived => {
                tracing::warn!(repo = %self.repo.name, "code host reports repository as archived");
                self.archived_failure().await
            }
            SourceError::ChangesetNotFound { external_id } => {
                ExecutorError::ChangesetNotFound { external_id }
            }
            other => ExecutorError::Source(other),
        }
    }

    fn payload(&self, spec: &ChangesetSpec, body: String) -> ChangesetPayload {
        ChangesetPayload {
            repo_name: self.repo.name.clone(),
            base_ref: spec.base_ref.clone(),
            head_ref: spec.head_ref.clone(),
            title: spec.title.clone(),
            body,
            external_id: self.changeset.external_id.clone(),
        }
    }

    async fn decorated_body(&self, spec: &ChangesetSpec) -> Result<String, ExecutorError> {
        decorate_changeset_body(
            self.executor.store.as_ref(),
            self.executor.external_urls.as_ref(),
            &self.changeset,
            &spec.body,
        )
        .await
    }

    /// Adopt an existing changeset by re-reading it from the host.
    async fn import(&mut self) -> Result<(), ExecutorError> {
        let external_id = self.external_id()?;
        let result = race(
            self.cancel,
            self.resolved()?
                .source
                .load_changeset(&self.repo.name, &external_id),
        )
        .await?;
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => return Err(self.source_failure(err).await),
        };
        self.apply_metadata(meta);
        self.changeset.publication_state = PublicationState::Published;
        Ok(())
    }

    async fn push(&mut self) -> Result<(), ExecutorError> {
        let spec = self.spec()?.clone();

        // At most one published changeset per (repo, branch). The conflict
        // is only observable here, once the intended head ref is known, so
        // the check lives in this handler and runs before any transport
        // call.
        if let Some(existing) = self
            .executor
            .store
            .get_published_changeset_on_branch(self.repo.id, &spec.head_ref)
            .await?
        {
            if existing != self.changeset.id {
                return Err(ExecutorError::DuplicateBranch {
                    branch: spec.head_ref,
                });
            }
        }

        let push = {
            let resolved = self.resolved()?;
            build_push_config(&self.repo, resolved.authenticator.as_ref())?
        };
        let req = CommitPatchRequest {
            repo_name: self.repo.name.clone(),
            base_ref: spec.base_ref.clone(),
            target_ref: ensure_ref_prefix(&spec.head_ref),
            patch: spec.diff.clone(),
            commit_message: spec.commit_message.clone(),
            author_name: spec.commit_author_name.clone(),
            author_email: spec.commit_author_email.clone(),
            push,
        };

        let result = race(self.cancel, self.executor.git.create_commit_from_patch(&req)).await?;
        match result {
            Ok(_) => Ok(()),
            Err(GitError::CreateCommit { combined_output }) => {
                let archived = self
                    .resolved()?
                    .source
                    .is_archived_push_error(&combined_output);
                if archived {
                    tracing::warn!(repo = %self.repo.name, "push rejected: repository archived");
                    Err(self.archived_failure().await)
                } else {
                    Err(GitError::CreateCommit { combined_output }.into())
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn publish(&mut self, as_draft: bool) -> Result<(), ExecutorError> {
        let spec = self.spec()?.clone();
        let body = self.decorated_body(&spec).await?;
        let mut payload = self.payload(&spec, body);

        let result = if as_draft {
            race(
                self.cancel,
                self.resolved()?.source.create_draft_changeset(&payload),
            )
            .await?
        } else {
            race(self.cancel, self.resolved()?.source.create_changeset(&payload)).await?
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.source_failure(err).await),
        };

        let meta = if outcome.already_exists {
            // Creation is not idempotent; the host already has a changeset
            // on this head ref. Converge by updating it instead.
            payload.external_id = Some(outcome.metadata.external_id.clone());
            let update = race(
                self.cancel,
                self.resolved()?.source.update_changeset(&payload),
            )
            .await?;
            match update {
                Ok(meta) => meta,
                Err(err) => return Err(self.source_failure(err).await),
            }
        } else {
            outcome.metadata
        };

        self.apply_metadata(meta);
        self.changeset.publication_state = PublicationState::Published;
        Ok(())
    }

    async fn update(&mut self) -> Result<(), ExecutorError> {
        let spec = self.spec()?.clone();
        let external_id = self.external_id()?;
        let body = self.decorated_body(&spec).await?;
        let mut payload = self.payload(&spec, body);
        payload.external_id = Some(external_id);

        let result = race(
            self.cancel,
            self.resolved()?.source.update_changeset(&payload),
        )
        .await?;
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => return Err(self.source_failure(err).await),
        };
        self.apply_metadata(meta);
        Ok(())
    }

    async fn undraft(&mut self) -> Result<(), ExecutorError> {
        let external_id = self.external_id()?;
        let result = race(
            self.cancel,
            self.resolved()?
                .source
                .undraft_changeset(&self.repo.name, &external_id),
        )
        .await?;
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => return Err(self.source_failure(err).await),
        };
        self.apply_metadata(meta);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ExecutorError> {
        // Already closed on the host: skip the call, just clear the
        // pending-close intent.
        if self.changeset.external_state == Some(ExternalState::Closed) {
            self.changeset.closing = false;
            return Ok(());
        }
        let external_id = self.external_id()?;
        let result = race(
            self.cancel,
            self.resolved()?
                .source
                .close_changeset(&self.repo.name, &external_id),
        )
        .await?;
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => return Err(self.source_failure(err).await),
        };
        self.changeset.closing = false;
        self.apply_metadata(meta);
        Ok(())
    }

    async fn reopen(&mut self) -> Result<(), ExecutorError> {
        let external_id = self.external_id()?;
        let result = race(
            self.cancel,
            self.resolved()?
                .source
                .reopen_changeset(&self.repo.name, &external_id),
        )
        .await?;
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => return Err(self.source_failure(err).await),
        };
        self.apply_metadata(meta);
        Ok(())
    }

    async fn sync(&mut self) -> Result<(), ExecutorError> {
        let external_id = self.external_id()?;
        let result = race(
            self.cancel,
            self.resolved()?
                .source
                .load_changeset(&self.repo.name, &external_id),
        )
        .await?;
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => return Err(self.source_failure(err).await),
        };
        self.apply_metadata(meta);
        Ok(())
    }

    /// Pause so host-side indexing settles before a following Sync.
    async fn sleep(&mut self) -> Result<(), ExecutorError> {
        if self.executor.config.skip_sleep {
            return Ok(());
        }
        race(
            self.cancel,
            tokio::time::sleep(self.executor.config.sleep_duration()),
        )
        .await?;
        Ok(())
    }

    fn archive(&mut self) -> Result<(), ExecutorError> {
        self.changeset.archive_flagged_associations();
        Ok(())
    }

    fn detach(&mut self) -> Result<(), ExecutorError> {
        if self.changeset.remove_detach_flagged_associations() {
            self.changeset.detached_at_ms = Some(now_ms());
        }
        Ok(())
    }
}
