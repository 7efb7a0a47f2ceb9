use drover_core::auth::Authenticator;
use drover_core::types::{ExternalServiceKind, Repo};

use crate::bitbucket_server::BitbucketServerSource;
use crate::github::GithubSource;
use crate::gitlab::GitlabSource;
use crate::source::{ChangesetSource, Sourcer};
use crate::SourceError;

/// Production sourcer: instantiates the provider client matching the
/// repository's external service. Without an authenticator the client runs
/// on ambient/global configuration (anonymous where the host allows it).
#[derive(Debug, Default)]
pub struct HostSourcer;

impl HostSourcer {
    pub fn new() -> Self {
        Self
    }
}

impl Sourcer for HostSourcer {
    fn for_repo(
        &self,
        repo: &Repo,
        authenticator: Option<&Authenticator>,
    ) -> Result<Box<dyn ChangesetSource>, SourceError> {
        let service_id = repo.external_service_id.as_str();
        tracing::debug!(
            repo = %repo.name,
            kind = %repo.external_service_kind,
            authenticated = authenticator.is_some(),
            "instantiating changeset source"
        );
        Ok(match repo.external_service_kind {
            ExternalServiceKind::GitHub => {
                Box::new(GithubSource::new(service_id, authenticator))
            }
            ExternalServiceKind::GitLab => {
                Box::new(GitlabSource::new(service_id, authenticator))
            }
            ExternalServiceKind::BitbucketServer => {
                Box::new(BitbucketServerSource::new(service_id, authenticator))
            }
        })
    }
}
