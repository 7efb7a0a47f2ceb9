use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drover_core::auth::Authenticator;
use drover_core::types::{ChangesetMetadata, ExternalServiceKind, ExternalState};
use drover_git::strip_ref_prefix;

use crate::source::{ChangesetPayload, ChangesetSource, CreateOutcome};
use crate::SourceError;

const ARCHIVED_PUSH_OUTPUT: &str = "You may not pull or push to an archived repository";

/// Bitbucket Server changeset source over the rest/api/1.0 endpoints.
pub struct BitbucketServerSource {
    api_url: String,
    client: reqwest::Client,
    auth: Option<Authenticator>,
}

pub(crate) fn api_base_url(service_id: &str) -> String {
    format!("{}/rest/api/1.0", service_id.trim_end_matches('/'))
}

/// Repository names are `PROJECT_KEY/slug` on Bitbucket Server.
fn split_repo_name(repo_name: &str) -> Result<(&str, &str), SourceError> {
    repo_name.split_once('/').ok_or_else(|| SourceError::Api {
        status: 0,
        message: format!("malformed repository name: {repo_name}"),
    })
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    #[serde(rename = "fromRef")]
    from_ref: RefSpec<'a>,
    #[serde(rename = "toRef")]
    to_ref: RefSpec<'a>,
}

#[derive(Serialize)]
struct RefSpec<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct UpdatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    version: u64,
}

#[derive(Deserialize)]
struct PullRequest {
    id: u64,
    version: u64,
    title: String,
    #[serde(default)]
    description: String,
    state: String,
    #[serde(rename = "fromRef")]
    from_ref: RefId,
}

#[derive(Deserialize)]
struct RefId {
    id: String,
}

#[derive(Deserialize)]
struct ApiErrors {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
}

#[derive(Deserialize)]
struct ApiErrorEntry {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "exceptionName")]
    exception_name: String,
}

fn pr_state(state: &str) -> ExternalState {
    match state {
        "MERGED" => ExternalState::Merged,
        "DECLINED" => ExternalState::Closed,
        _ => ExternalState::Open,
    }
}

fn pr_metadata(pr: PullRequest) -> ChangesetMetadata {
    ChangesetMetadata {
        external_id: pr.id.to_string(),
        head_ref: strip_ref_prefix(&pr.from_ref.id).to_string(),
        title: pr.title,
        body: pr.description,
        state: pr_state(&pr.state),
        diff_stat: None,
    }
}

impl BitbucketServerSource {
    pub fn new(service_id: &str, authenticator: Option<&Authenticator>) -> Self {
        Self {
            api_url: api_base_url(service_id),
            client: reqwest::Client::new(),
            auth: authenticator.cloned(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.api_url));
        builder = match &self.auth {
            Some(Authenticator::BasicAuth { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Authenticator::OAuthBearerToken { token })
            | Some(Authenticator::OAuthBearerTokenWithSsh { token, .. }) => {
                builder.bearer_auth(token)
            }
            None => builder,
        };
        builder
    }

    async fn error_from(&self, resp: reqwest::Response) -> SourceError {
        let status = resp.status().as_u16();
        let parsed = resp.json::<ApiErrors>().await.unwrap_or(ApiErrors {
            errors: Vec::new(),
        });
        let message = parsed
            .errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_default();
        if status == 401 {
            return SourceError::Unauthorized(message);
        }
        if message.contains("archived") {
            return SourceError::RepoArchived;
        }
        SourceError::Api { status, message }
    }

    async fn get_pull_request(
        &self,
        repo_name: &str,
        id: &str,
    ) -> Result<PullRequest, SourceError> {
        let (project, slug) = split_repo_name(repo_name)?;
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/projects/{project}/repos/{slug}/pull-requests/{id}"),
            )
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Err(SourceError::ChangesetNotFound {
                external_id: id.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(resp.json::<PullRequest>().await?)
    }

    /// Declining and reopening go through versioned state endpoints.
    async fn transition(
        &self,
        repo_name: &str,
        id: &str,
        action: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let (project, slug) = split_repo_name(repo_name)?;
        let current = self.get_pull_request(repo_name, id).await?;
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!(
                    "/projects/{project}/repos/{slug}/pull-requests/{id}/{action}?version={}",
                    current.version
                ),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(pr_metadata(resp.json::<PullRequest>().await?))
    }
}

#[async_trait]
impl ChangesetSource for BitbucketServerSource {
    async fn load_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        Ok(pr_metadata(
            self.get_pull_request(repo_name, external_id).await?,
        ))
    }

    async fn create_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError> {
        let (project, slug) = split_repo_name(&payload.repo_name)?;
        let body = CreatePullRequest {
            title: &payload.title,
            description: &payload.body,
            from_ref: RefSpec {
                id: &payload.head_ref,
            },
            to_ref: RefSpec {
                id: &payload.base_ref,
            },
        };
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/projects/{project}/repos/{slug}/pull-requests"),
            )
            .json(&body)
            .send()
            .await?;

        if resp.status().as_u16() == 409 {
            let parsed = resp.json::<ApiErrors>().await.unwrap_or(ApiErrors {
                errors: Vec::new(),
            });
            let duplicate = parsed
                .errors
                .iter()
                .any(|e| e.exception_name.ends_with("DuplicatePullRequestException"));
            if duplicate {
                let metadata = self
                    .find_by_head_ref(&payload.repo_name, &payload.head_ref)
                    .await?;
                return Ok(CreateOutcome {
                    metadata,
                    already_exists: true,
                });
            }
            let message = parsed
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_default();
            return Err(SourceError::Api {
                status: 409,
                message,
            });
        }
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(CreateOutcome {
            metadata: pr_metadata(resp.json::<PullRequest>().await?),
            already_exists: false,
        })
    }

    async fn create_draft_changeset(
        &self,
        _payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError> {
        Err(SourceError::DraftsUnsupported {
            kind: ExternalServiceKind::BitbucketServer,
        })
    }

    async fn update_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<ChangesetMetadata, SourceError> {
        let id = payload.external_id.as_deref().ok_or(SourceError::Api {
            status: 0,
            message: "update without external id".to_string(),
        })?;
        let (project, slug) = split_repo_name(&payload.repo_name)?;
        // Updates require the current version for optimistic locking.
        let current = self.get_pull_request(&payload.repo_name, id).await?;
        let body = UpdatePullRequest {
            title: &payload.title,
            description: &payload.body,
            version: current.version,
        };
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/projects/{project}/repos/{slug}/pull-requests/{id}"),
            )
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(pr_metadata(resp.json::<PullRequest>().await?))
    }

    async fn close_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.transition(repo_name, external_id, "decline").await
    }

    async fn reopen_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.transition(repo_name, external_id, "reopen").await
    }

    async fn undraft_changeset(
        &self,
        _repo_name: &str,
        _external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        Err(SourceError::DraftsUnsupported {
            kind: ExternalServiceKind::BitbucketServer,
        })
    }

    fn is_archived_push_error(&self, output: &str) -> bool {
        output.contains(ARCHIVED_PUSH_OUTPUT)
    }
}

impl BitbucketServerSource {
    async fn find_by_head_ref(
        &self,
        repo_name: &str,
        head_ref: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let (project, slug) = split_repo_name(repo_name)?;
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/projects/{project}/repos/{slug}/pull-requests?at={head_ref}&state=ALL&limit=1"
                ),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }

        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            values: Vec<PullRequest>,
        }
        let mut page = resp.json::<Page>().await?;
        if page.values.is_empty() {
            return Err(SourceError::ChangesetNotFound {
                external_id: head_ref.to_string(),
            });
        }
        Ok(pr_metadata(page.values.remove(0)))
    }
}
