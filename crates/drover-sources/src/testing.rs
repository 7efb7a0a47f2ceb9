//! Fakes for driving the plan executor in tests without a code host.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use drover_core::auth::Authenticator;
use drover_core::types::{ChangesetMetadata, DiffStat, ExternalState, Repo};

use crate::source::{ChangesetPayload, ChangesetSource, CreateOutcome, Sourcer};
use crate::SourceError;

/// Cloneable error recipe; the fake mints a fresh [`SourceError`] from it
/// on every failing call.
#[derive(Debug, Clone)]
pub enum FakeSourceError {
    ChangesetNotFound,
    RepoArchived,
    Transient(String),
}

/// Which calls a [`FakeChangesetSource`] has seen, with the payloads the
/// mutating ones received.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub load_called: bool,
    pub create_called: bool,
    pub create_draft_called: bool,
    pub update_called: bool,
    pub close_called: bool,
    pub reopen_called: bool,
    pub undraft_called: bool,
    pub created_payloads: Vec<ChangesetPayload>,
    pub updated_payloads: Vec<ChangesetPayload>,
}

/// Scriptable [`ChangesetSource`] double. Every host call returns the
/// configured metadata fixture (or the configured error) and records
/// itself in the call log.
pub struct FakeChangesetSource {
    metadata: Mutex<ChangesetMetadata>,
    err: Option<FakeSourceError>,
    already_exists: bool,
    archived_push_error: bool,
    want_head_ref: Option<String>,
    want_base_ref: Option<String>,
    calls: Mutex<CallLog>,
}

/// Metadata fixture shaped like a provider response.
pub fn fake_metadata(external_id: &str, state: ExternalState) -> ChangesetMetadata {
    ChangesetMetadata {
        external_id: external_id.to_string(),
        head_ref: "fake-pr-branch".to_string(),
        title: "Fake PR title".to_string(),
        body: "Fake PR body.".to_string(),
        state,
        diff_stat: Some(DiffStat {
            added: 2,
            deleted: 1,
        }),
    }
}

impl FakeChangesetSource {
    pub fn new(metadata: ChangesetMetadata) -> Self {
        Self {
            metadata: Mutex::new(metadata),
            err: None,
            already_exists: false,
            archived_push_error: false,
            want_head_ref: None,
            want_base_ref: None,
            calls: Mutex::new(CallLog::default()),
        }
    }

    pub fn with_error(mut self, err: FakeSourceError) -> Self {
        self.err = Some(err);
        self
    }

    /// Make create calls report that the changeset already exists.
    pub fn with_already_exists(mut self) -> Self {
        self.already_exists = true;
        self
    }

    /// Make the push-output probe report an archived repository.
    pub fn with_archived_push_error(mut self) -> Self {
        self.archived_push_error = true;
        self
    }

    pub fn with_want_refs(mut self, head_ref: &str, base_ref: &str) -> Self {
        self.want_head_ref = Some(head_ref.to_string());
        self.want_base_ref = Some(base_ref.to_string());
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_metadata(&self, metadata: ChangesetMetadata) {
        *self.metadata.lock().unwrap() = metadata;
    }

    fn metadata(&self) -> ChangesetMetadata {
        self.metadata.lock().unwrap().clone()
    }

    fn fail_if_scripted(&self, external_id: &str) -> Result<(), SourceError> {
        match &self.err {
            Some(FakeSourceError::ChangesetNotFound) => Err(SourceError::ChangesetNotFound {
                external_id: external_id.to_string(),
            }),
            Some(FakeSourceError::RepoArchived) => Err(SourceError::RepoArchived),
            Some(FakeSourceError::Transient(message)) => Err(SourceError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_refs(&self, payload: &ChangesetPayload) -> Result<(), SourceError> {
        if let Some(want) = &self.want_head_ref {
            if payload.head_ref != *want {
                return Err(SourceError::Api {
                    status: 0,
                    message: format!(
                        "unexpected head ref: want {want}, have {}",
                        payload.head_ref
                    ),
                });
            }
        }
        if let Some(want) = &self.want_base_ref {
            if payload.base_ref != *want {
                return Err(SourceError::Api {
                    status: 0,
                    message: format!(
                        "unexpected base ref: want {want}, have {}",
                        payload.base_ref
                    ),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChangesetSource for Arc<FakeChangesetSource> {
    async fn load_changeset(
        &self,
        _repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.calls.lock().unwrap().load_called = true;
        self.fail_if_scripted(external_id)?;
        Ok(self.metadata())
    }

    async fn create_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.create_called = true;
            calls.created_payloads.push(payload.clone());
        }
        self.fail_if_scripted("")?;
        self.check_refs(payload)?;
        Ok(CreateOutcome {
            metadata: self.metadata(),
            already_exists: self.already_exists,
        })
    }

    async fn create_draft_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.create_draft_called = true;
            calls.created_payloads.push(payload.clone());
        }
        self.fail_if_scripted("")?;
        self.check_refs(payload)?;
        Ok(CreateOutcome {
            metadata: self.metadata(),
            already_exists: self.already_exists,
        })
    }

    async fn update_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<ChangesetMetadata, SourceError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.update_called = true;
            calls.updated_payloads.push(payload.clone());
        }
        self.fail_if_scripted(payload.external_id.as_deref().unwrap_or_default())?;
        self.check_refs(payload)?;
        Ok(self.metadata())
    }

    async fn close_changeset(
        &self,
        _repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.calls.lock().unwrap().close_called = true;
        self.fail_if_scripted(external_id)?;
        Ok(self.metadata())
    }

    async fn reopen_changeset(
        &self,
        _repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.calls.lock().unwrap().reopen_called = true;
        self.fail_if_scripted(external_id)?;
        Ok(self.metadata())
    }

    async fn undraft_changeset(
        &self,
        _repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.calls.lock().unwrap().undraft_called = true;
        self.fail_if_scripted(external_id)?;
        Ok(self.metadata())
    }

    fn is_archived_push_error(&self, _output: &str) -> bool {
        self.archived_push_error
    }
}

/// [`Sourcer`] double: hands out one shared fake source and records the
/// authenticator the executor resolved.
pub struct FakeSourcer {
    err: Option<FakeSourceError>,
    source: Arc<FakeChangesetSource>,
    resolved: Mutex<Option<Option<Authenticator>>>,
}

impl FakeSourcer {
    pub fn new(err: Option<FakeSourceError>, source: Arc<FakeChangesetSource>) -> Self {
        Self {
            err,
            source,
            resolved: Mutex::new(None),
        }
    }

    /// The authenticator passed to the last `for_repo` call; outer `None`
    /// when the sourcer was never invoked.
    pub fn resolved_authenticator(&self) -> Option<Option<Authenticator>> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn was_invoked(&self) -> bool {
        self.resolved.lock().unwrap().is_some()
    }
}

impl Sourcer for FakeSourcer {
    fn for_repo(
        &self,
        _repo: &Repo,
        authenticator: Option<&Authenticator>,
    ) -> Result<Box<dyn ChangesetSource>, SourceError> {
        *self.resolved.lock().unwrap() = Some(authenticator.cloned());
        if let Some(err) = &self.err {
            return Err(match err {
                FakeSourceError::ChangesetNotFound => SourceError::ChangesetNotFound {
                    external_id: String::new(),
                },
                FakeSourceError::RepoArchived => SourceError::RepoArchived,
                FakeSourceError::Transient(message) => SourceError::Api {
                    status: 500,
                    message: message.clone(),
                },
            });
        }
        Ok(Box::new(self.source.clone()))
    }
}
