use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use drover_core::auth::{Authenticator, SiteCredential};
use drover_core::id::{
    BatchChangeId, ChangesetId, ChangesetSpecId, ExternalServiceId, NamespaceId, RepoId, UserId,
};
use drover_core::types::{
    BatchChange, BatchChangeAssoc, Changeset, ChangesetSpec, ExternalServiceKind, ExternalState,
    Namespace, NamespaceKind, Operation, PublicationState, Repo,
};
use drover_git::{CommitPatchRequest, GitClient, GitError};
use drover_reconciler::{
    ExecutorConfig, ExecutorError, ExternalUrlError, ExternalUrlSource, Plan, PlanExecutor,
};
use drover_sources::testing::{fake_metadata, FakeChangesetSource, FakeSourceError, FakeSourcer};
use drover_store::{MemStore, ReconcilerStore};

const BACKLINK_MARKER: &str = "Created by Sourcegraph batch change";

// === Fixtures =============================================================

fn github_repo() -> Repo {
    Repo {
        id: RepoId::new(1),
        name: "acme/website".to_string(),
        external_service_kind: ExternalServiceKind::GitHub,
        external_service_id: ExternalServiceId::new("https://github.com/"),
        clone_url: "https://github.com/acme/website".to_string(),
        archived: false,
    }
}

fn test_spec() -> ChangesetSpec {
    ChangesetSpec {
        id: ChangesetSpecId::new(1),
        repo_id: RepoId::new(1),
        user_id: UserId::new(7),
        base_ref: "refs/heads/main".to_string(),
        head_ref: "refs/heads/my-pr".to_string(),
        title: "Automated change".to_string(),
        body: "This updates a dependency.".to_string(),
        commit_message: "Update dependency".to_string(),
        commit_author_name: "Drover Bot".to_string(),
        commit_author_email: "bot@drover.dev".to_string(),
        diff: "testdiff".to_string(),
        published: true,
    }
}

fn owned_changeset() -> Changeset {
    let mut cs = Changeset::new(ChangesetId::new(1), RepoId::new(1));
    cs.owned_by_batch_change_id = Some(BatchChangeId::new(10));
    cs.current_spec_id = Some(ChangesetSpecId::new(1));
    cs.batch_changes = vec![BatchChangeAssoc::new(BatchChangeId::new(10))];
    cs
}

struct FixedUrls;

#[async_trait]
impl ExternalUrlSource for FixedUrls {
    async fn external_url(&self) -> Result<String, ExternalUrlError> {
        Ok("https://sourcegraph.test".to_string())
    }
}

#[derive(Default)]
struct FakeGitClient {
    push_failure: Option<String>,
    requests: Mutex<Vec<CommitPatchRequest>>,
}

impl FakeGitClient {
    fn with_push_failure(output: &str) -> Self {
        Self {
            push_failure: Some(output.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn called(&self) -> bool {
        !self.requests.lock().unwrap().is_empty()
    }

    fn requests(&self) -> Vec<CommitPatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitClient for FakeGitClient {
    async fn create_commit_from_patch(&self, req: &CommitPatchRequest) -> Result<String, GitError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(output) = &self.push_failure {
            return Err(GitError::CreateCommit {
                combined_output: output.clone(),
            });
        }
        Ok(req.target_ref.clone())
    }
}

struct Harness {
    store: Arc<MemStore>,
    source: Arc<FakeChangesetSource>,
    sourcer: Arc<FakeSourcer>,
    git: Arc<FakeGitClient>,
}

impl Harness {
    async fn new(source: FakeChangesetSource) -> Self {
        Self::build(source, None, FakeGitClient::default()).await
    }

    async fn with_git(source: FakeChangesetSource, git: FakeGitClient) -> Self {
        Self::build(source, None, git).await
    }

    async fn with_sourcer_error(source: FakeChangesetSource, err: FakeSourceError) -> Self {
        Self::build(source, Some(err), FakeGitClient::default()).await
    }

    async fn build(
        source: FakeChangesetSource,
        sourcer_err: Option<FakeSourceError>,
        git: FakeGitClient,
    ) -> Self {
        let store = Arc::new(MemStore::new());
        store.insert_repo(github_repo()).await;
        store
            .insert_namespace(Namespace {
                id: NamespaceId::new(1),
                name: "my-user".to_string(),
                kind: NamespaceKind::User,
            })
            .await;
        store
            .insert_batch_change(BatchChange {
                id: BatchChangeId::new(10),
                name: "executor-test-batch-change".to_string(),
                namespace_id: NamespaceId::new(1),
                creator_user_id: UserId::new(7),
            })
            .await;
        store
            .insert_site_credential(SiteCredential {
                external_service_kind: ExternalServiceKind::GitHub,
                external_service_id: ExternalServiceId::new("https://github.com/"),
                authenticator: Authenticator::OAuthBearerToken {
                    token: "site-token".to_string(),
                },
            })
            .await;

        let source = Arc::new(source);
        let sourcer = Arc::new(FakeSourcer::new(sourcer_err, source.clone()));
        let git = Arc::new(git);
        Self {
            store,
            source,
            sourcer,
            git,
        }
    }

    fn executor(&self) -> PlanExecutor {
        PlanExecutor::new(
            self.git.clone(),
            self.sourcer.clone(),
            self.store.clone(),
            self.store.clone(),
            Arc::new(FixedUrls),
            ExecutorConfig {
                skip_sleep: true,
                sleep_ms: 1,
            },
        )
    }

    async fn execute(&self, plan: Plan) -> Result<Changeset, ExecutorError> {
        self.executor()
            .execute(&CancellationToken::new(), plan)
            .await
    }

    async fn stored_changeset(&self) -> Changeset {
        self.store
            .get_changeset(ChangesetId::new(1))
            .await
            .unwrap()
    }

    async fn stored_repo(&self) -> Repo {
        ReconcilerStore::get_repo(self.store.as_ref(), RepoId::new(1))
            .await
            .unwrap()
    }
}

fn plan(changeset: Changeset, spec: Option<ChangesetSpec>, ops: &[Operation]) -> Plan {
    let mut plan = Plan::new(changeset, spec);
    for op in ops {
        plan.add_op(*op);
    }
    plan
}

fn assert_synced_open(changeset: &Changeset) {
    assert_eq!(changeset.publication_state, PublicationState::Published);
    assert_eq!(changeset.external_id.as_deref(), Some("12345"));
    assert_eq!(
        changeset.external_branch.as_deref(),
        Some("refs/heads/fake-pr-branch")
    );
    assert_eq!(changeset.external_state, Some(ExternalState::Open));
    assert_eq!(changeset.title.as_deref(), Some("Fake PR title"));
    assert_eq!(changeset.body.as_deref(), Some("Fake PR body."));
    assert!(changeset.diff_stat.is_some());
}

// === Plan execution =======================================================

#[tokio::test]
async fn test_noop_plan() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Unpublished;
    harness.store.insert_changeset(cs.clone()).await;

    let result = harness.execute(plan(cs, Some(test_spec()), &[])).await.unwrap();
    assert_eq!(result.publication_state, PublicationState::Unpublished);
    assert!(!harness.sourcer.was_invoked());
    assert!(!harness.git.called());
}

#[tokio::test]
async fn test_import() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.external_id = Some("12345".to_string());
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, None, &[Operation::Import]))
        .await
        .unwrap();

    assert!(harness.source.calls().load_called);
    assert_synced_open(&harness.stored_changeset().await);
}

#[tokio::test]
async fn test_import_not_found_is_terminal() {
    let harness = Harness::new(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open))
            .with_error(FakeSourceError::ChangesetNotFound),
    )
    .await;

    let mut cs = owned_changeset();
    cs.external_id = Some("100000".to_string());
    harness.store.insert_changeset(cs.clone()).await;

    let err = harness
        .execute(plan(cs, None, &[Operation::Import]))
        .await
        .unwrap_err();

    assert!(harness.source.calls().load_called);
    assert!(matches!(err, ExecutorError::ChangesetNotFound { .. }));
    assert!(err.is_non_retryable());
}

#[tokio::test]
async fn test_push_and_publish() {
    let harness = Harness::new(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open))
            .with_want_refs("refs/heads/my-pr", "refs/heads/main"),
    )
    .await;

    let cs = owned_changeset();
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(
            cs,
            Some(test_spec()),
            &[Operation::Push, Operation::Publish],
        ))
        .await
        .unwrap();

    let calls = harness.source.calls();
    assert!(calls.create_called);
    assert!(!calls.update_called);
    assert!(harness.git.called());

    // The push remote embeds the resolved site credential.
    let requests = harness.git.requests();
    assert_eq!(
        requests[0].push.remote_url,
        "https://site-token@github.com/acme/website"
    );
    assert_eq!(requests[0].target_ref, "refs/heads/my-pr");
    assert_eq!(requests[0].patch, "testdiff");

    // The body sent to the host carries the batch-change back-link.
    assert!(calls.created_payloads[0].body.contains(BACKLINK_MARKER));

    assert_synced_open(&harness.stored_changeset().await);
}

#[tokio::test]
async fn test_publish_when_changeset_already_exists() {
    let harness = Harness::new(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open))
            .with_already_exists(),
    )
    .await;

    let cs = owned_changeset();
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(
            cs,
            Some(test_spec()),
            &[Operation::Push, Operation::Publish],
        ))
        .await
        .unwrap();

    // Exactly one create and, after the "already exists" signal, exactly
    // one update; the final state equals a normal update outcome.
    let calls = harness.source.calls();
    assert!(calls.create_called);
    assert!(calls.update_called);
    assert_eq!(calls.created_payloads.len(), 1);
    assert_eq!(calls.updated_payloads.len(), 1);
    assert_eq!(
        calls.updated_payloads[0].external_id.as_deref(),
        Some("12345")
    );

    assert_synced_open(&harness.stored_changeset().await);
}

#[tokio::test]
async fn test_push_to_archived_repo_detected_at_push() {
    let harness = Harness::with_git(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open))
            .with_archived_push_error(),
        FakeGitClient::with_push_failure("remote: archived"),
    )
    .await;

    let cs = owned_changeset();
    harness.store.insert_changeset(cs.clone()).await;

    let err = harness
        .execute(plan(
            cs,
            Some(test_spec()),
            &[Operation::Push, Operation::Publish],
        ))
        .await
        .unwrap_err();

    assert!(harness.git.called());
    assert!(!harness.source.calls().create_called);
    assert!(matches!(err, ExecutorError::RepoArchived { .. }));
    assert!(err.is_non_retryable());

    assert!(harness.stored_repo().await.archived);
    let stored = harness.stored_changeset().await;
    assert_eq!(stored.external_state, Some(ExternalState::ReadOnly));
    assert_eq!(stored.publication_state, PublicationState::Unpublished);
}

#[tokio::test]
async fn test_publish_to_archived_repo_detected_at_publish() {
    let harness = Harness::new(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open))
            .with_error(FakeSourceError::RepoArchived),
    )
    .await;

    let cs = owned_changeset();
    harness.store.insert_changeset(cs.clone()).await;

    let err = harness
        .execute(plan(
            cs,
            Some(test_spec()),
            &[Operation::Push, Operation::Publish],
        ))
        .await
        .unwrap_err();

    assert!(harness.git.called());
    assert!(harness.source.calls().create_called);
    assert!(matches!(err, ExecutorError::RepoArchived { .. }));
    assert!(err.is_non_retryable());

    assert!(harness.stored_repo().await.archived);
    assert_eq!(
        harness.stored_changeset().await.external_state,
        Some(ExternalState::ReadOnly)
    );
}

#[tokio::test]
async fn test_update() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_branch = Some("refs/heads/head-ref-on-github".to_string());
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Update]))
        .await
        .unwrap();

    let calls = harness.source.calls();
    assert!(calls.update_called);
    assert!(!harness.git.called());
    assert!(calls.updated_payloads[0].body.contains(BACKLINK_MARKER));

    // Title and body come back from the host, not from the spec.
    assert_synced_open(&harness.stored_changeset().await);
}

#[tokio::test]
async fn test_update_on_archived_repo() {
    let harness = Harness::new(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open))
            .with_error(FakeSourceError::RepoArchived),
    )
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    harness.store.insert_changeset(cs.clone()).await;

    let err = harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Update]))
        .await
        .unwrap_err();

    assert!(harness.source.calls().update_called);
    assert!(err.is_non_retryable());
    assert!(harness.stored_repo().await.archived);

    let stored = harness.stored_changeset().await;
    assert_eq!(stored.external_state, Some(ExternalState::ReadOnly));
    assert_eq!(stored.publication_state, PublicationState::Published);
}

#[tokio::test]
async fn test_push_sleep_sync() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_branch = Some("refs/heads/head-ref-on-github".to_string());
    cs.external_state = Some(ExternalState::Open);
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(
            cs,
            Some(test_spec()),
            &[Operation::Push, Operation::Sleep, Operation::Sync],
        ))
        .await
        .unwrap();

    assert!(harness.git.called());
    assert!(harness.source.calls().load_called);
    assert_synced_open(&harness.stored_changeset().await);
}

#[tokio::test]
async fn test_close_open_changeset() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Closed,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Open);
    cs.closing = true;
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Close]))
        .await
        .unwrap();

    assert!(harness.source.calls().close_called);
    let stored = harness.stored_changeset().await;
    assert!(!stored.closing);
    assert_eq!(stored.external_state, Some(ExternalState::Closed));
    assert_eq!(stored.title.as_deref(), Some("Fake PR title"));
}

#[tokio::test]
async fn test_close_already_closed_changeset_is_noop() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Closed,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Closed);
    cs.closing = true;
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Close]))
        .await
        .unwrap();

    // No host call, no field sync; only the closing intent clears.
    assert!(!harness.source.calls().close_called);
    let stored = harness.stored_changeset().await;
    assert!(!stored.closing);
    assert_eq!(stored.external_state, Some(ExternalState::Closed));
    assert_eq!(stored.title, None);
}

#[tokio::test]
async fn test_reopen_closed_changeset() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Closed);
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Reopen]))
        .await
        .unwrap();

    assert!(harness.source.calls().reopen_called);
    assert_synced_open(&harness.stored_changeset().await);
}

#[tokio::test]
async fn test_push_and_publish_draft() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Draft,
    )))
    .await;

    let cs = owned_changeset();
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(
            cs,
            Some(test_spec()),
            &[Operation::Push, Operation::PublishDraft],
        ))
        .await
        .unwrap();

    let calls = harness.source.calls();
    assert!(calls.create_draft_called);
    assert!(!calls.create_called);
    assert!(harness.git.called());

    let stored = harness.stored_changeset().await;
    assert_eq!(stored.publication_state, PublicationState::Published);
    assert_eq!(stored.external_state, Some(ExternalState::Draft));
}

#[tokio::test]
async fn test_undraft() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Draft);
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Undraft]))
        .await
        .unwrap();

    assert!(harness.source.calls().undraft_called);
    assert_eq!(
        harness.stored_changeset().await.external_state,
        Some(ExternalState::Open)
    );
}

#[tokio::test]
async fn test_close_and_archive() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Closed,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Open);
    cs.closing = true;
    cs.batch_changes = vec![BatchChangeAssoc {
        batch_change_id: BatchChangeId::new(10),
        archive: true,
        is_archived: false,
        detach: false,
    }];
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(
            cs,
            None,
            &[Operation::Close, Operation::Archive],
        ))
        .await
        .unwrap();

    assert!(harness.source.calls().close_called);
    let stored = harness.stored_changeset().await;
    assert!(!stored.closing);
    assert_eq!(stored.external_state, Some(ExternalState::Closed));
    assert!(stored.batch_changes[0].is_archived);
    assert!(!stored.batch_changes[0].archive);
}

#[tokio::test]
async fn test_detach() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Closed,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Closed);
    cs.batch_changes = vec![BatchChangeAssoc {
        batch_change_id: BatchChangeId::new(10),
        archive: false,
        is_archived: false,
        detach: true,
    }];
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, None, &[Operation::Detach]))
        .await
        .unwrap();

    let stored = harness.stored_changeset().await;
    assert!(stored.batch_changes.is_empty());
    assert!(stored.detached_at_ms.is_some());

    // A purely local plan must not resolve credentials or a source.
    assert!(!harness.sourcer.was_invoked());
    let calls = harness.source.calls();
    assert!(!calls.close_called && !calls.load_called);
}

// === Branch collisions ====================================================

#[tokio::test]
async fn test_push_with_duplicate_branch() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    // Another published changeset already occupies the head ref.
    let mut occupant = Changeset::new(ChangesetId::new(99), RepoId::new(1));
    occupant.publication_state = PublicationState::Published;
    occupant.external_id = Some("123".to_string());
    occupant.external_branch = Some("refs/heads/collision".to_string());
    harness.store.insert_changeset(occupant).await;

    let cs = owned_changeset();
    harness.store.insert_changeset(cs.clone()).await;

    let mut spec = test_spec();
    spec.head_ref = "refs/heads/collision".to_string();

    let err = harness
        .execute(plan(cs, Some(spec), &[Operation::Push]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::DuplicateBranch { .. }));
    assert!(err.is_non_retryable());

    // Zero host mutations happened.
    assert!(!harness.git.called());
    let calls = harness.source.calls();
    assert!(!calls.create_called && !calls.update_called);
}

#[tokio::test]
async fn test_push_tolerates_own_branch() {
    // Re-execution after a partial failure: the branch already belongs to
    // this changeset, which is not a collision.
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_branch = Some("refs/heads/my-pr".to_string());
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Push]))
        .await
        .unwrap();
    assert!(harness.git.called());
}

// === Source avoidance =====================================================

#[tokio::test]
async fn test_sourcer_error_surfaces_when_plan_requires_source() {
    let harness = Harness::with_sourcer_error(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open)),
        FakeSourceError::Transient("this should not be returned".to_string()),
    )
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    cs.external_state = Some(ExternalState::Open);
    harness.store.insert_changeset(cs.clone()).await;

    let err = harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Close]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Source(_)));
    assert!(!err.is_non_retryable());
}

#[tokio::test]
async fn test_sourcer_error_ignored_for_local_only_plan() {
    let harness = Harness::with_sourcer_error(
        FakeChangesetSource::new(fake_metadata("12345", ExternalState::Open)),
        FakeSourceError::Transient("this should not be returned".to_string()),
    )
    .await;

    let mut cs = owned_changeset();
    cs.batch_changes = vec![BatchChangeAssoc {
        batch_change_id: BatchChangeId::new(10),
        archive: false,
        is_archived: false,
        detach: true,
    }];
    harness.store.insert_changeset(cs.clone()).await;

    harness
        .execute(plan(cs, Some(test_spec()), &[Operation::Detach]))
        .await
        .unwrap();
}

// === Cancellation =========================================================

#[tokio::test]
async fn test_cancellation_is_retryable() {
    let harness = Harness::new(FakeChangesetSource::new(fake_metadata(
        "12345",
        ExternalState::Open,
    )))
    .await;

    let mut cs = owned_changeset();
    cs.publication_state = PublicationState::Published;
    cs.external_id = Some("12345".to_string());
    harness.store.insert_changeset(cs.clone()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .executor()
        .execute(&cancel, plan(cs, Some(test_spec()), &[Operation::Sync]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Canceled));
    assert!(!err.is_non_retryable());
}
