use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drover_core::auth::Authenticator;
use drover_core::types::{ChangesetMetadata, DiffStat, ExternalState};
use drover_git::strip_ref_prefix;

use crate::source::{ChangesetPayload, ChangesetSource, CreateOutcome};
use crate::SourceError;

const ARCHIVED_PUSH_OUTPUT: &str = "This repository was archived so it is read-only";
const ALREADY_EXISTS_MESSAGE: &str = "A pull request already exists";

/// GitHub changeset source over the REST v3 API.
pub struct GithubSource {
    api_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

/// API endpoint for a service instance URL: github.com uses the dedicated
/// api subdomain, GitHub Enterprise serves the API under /api/v3.
pub(crate) fn api_base_url(service_id: &str) -> String {
    let trimmed = service_id.trim_end_matches('/');
    if trimmed == "https://github.com" {
        "https://api.github.com".to_string()
    } else {
        format!("{trimmed}/api/v3")
    }
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    base: &'a str,
    head: &'a str,
    draft: bool,
}

#[derive(Serialize)]
struct UpdatePullRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

#[derive(Deserialize)]
struct PullRequest {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    #[serde(default)]
    draft: bool,
    merged_at: Option<String>,
    head: PullRequestRef,
    additions: Option<u64>,
    deletions: Option<u64>,
}

#[derive(Deserialize)]
struct PullRequestRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

fn pr_state(pr: &PullRequest) -> ExternalState {
    if pr.merged_at.is_some() {
        ExternalState::Merged
    } else if pr.state == "closed" {
        ExternalState::Closed
    } else if pr.draft {
        ExternalState::Draft
    } else {
        ExternalState::Open
    }
}

fn pr_metadata(pr: PullRequest) -> ChangesetMetadata {
    let state = pr_state(&pr);
    let diff_stat = match (pr.additions, pr.deletions) {
        (Some(added), Some(deleted)) => Some(DiffStat { added, deleted }),
        _ => None,
    };
    ChangesetMetadata {
        external_id: pr.number.to_string(),
        head_ref: pr.head.name,
        title: pr.title,
        body: pr.body.unwrap_or_default(),
        state,
        diff_stat,
    }
}

impl GithubSource {
    pub fn new(service_id: &str, authenticator: Option<&Authenticator>) -> Self {
        let token = authenticator.map(|auth| match auth {
            Authenticator::OAuthBearerToken { token } => token.clone(),
            Authenticator::OAuthBearerTokenWithSsh { token, .. } => token.clone(),
            // GitHub accepts a PAT as the basic-auth password.
            Authenticator::BasicAuth { password, .. } => password.clone(),
        });
        Self {
            api_url: api_base_url(service_id),
            client: reqwest::Client::new(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.api_url))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "drover");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn error_from(&self, resp: reqwest::Response) -> SourceError {
        let status = resp.status().as_u16();
        let message = match resp.json::<ApiError>().await {
            Ok(parsed) => parsed.message,
            Err(_) => String::new(),
        };
        if message.contains("archived") {
            return SourceError::RepoArchived;
        }
        if status == 401 {
            return SourceError::Unauthorized(message);
        }
        SourceError::Api { status, message }
    }

    async fn find_by_head_ref(
        &self,
        repo_name: &str,
        head: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let owner = repo_name.split('/').next().unwrap_or_default();
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{repo_name}/pulls?head={owner}:{head}&state=all"),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        let mut prs = resp.json::<Vec<PullRequest>>().await?;
        if prs.is_empty() {
            return Err(SourceError::ChangesetNotFound {
                external_id: head.to_string(),
            });
        }
        Ok(pr_metadata(prs.remove(0)))
    }

    async fn create(
        &self,
        payload: &ChangesetPayload,
        draft: bool,
    ) -> Result<CreateOutcome, SourceError> {
        let body = CreatePullRequest {
            title: &payload.title,
            body: &payload.body,
            base: strip_ref_prefix(&payload.base_ref),
            head: strip_ref_prefix(&payload.head_ref),
            draft,
        };
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/pulls", payload.repo_name),
            )
            .json(&body)
            .send()
            .await?;

        if resp.status().as_u16() == 422 {
            let parsed = resp.json::<ApiError>().await.unwrap_or(ApiError {
                message: String::new(),
            });
            if parsed.message.contains(ALREADY_EXISTS_MESSAGE) {
                // Converge on the PR already occupying the head ref.
                let metadata = self
                    .find_by_head_ref(&payload.repo_name, strip_ref_prefix(&payload.head_ref))
                    .await?;
                return Ok(CreateOutcome {
                    metadata,
                    already_exists: true,
                });
            }
            return Err(SourceError::Api {
                status: 422,
                message: parsed.message,
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

    async fn patch(
        &self,
        repo_name: &str,
        number: &str,
        update: &UpdatePullRequest<'_>,
    ) -> Result<ChangesetMetadata, SourceError> {
        let resp = self
            .request(
                reqwest::Method::PATCH,
                &format!("/repos/{repo_name}/pulls/{number}"),
            )
            .json(update)
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Err(SourceError::ChangesetNotFound {
                external_id: number.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(pr_metadata(resp.json::<PullRequest>().await?))
    }

    async fn set_state(
        &self,
        repo_name: &str,
        number: &str,
        state: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.patch(
            repo_name,
            number,
            &UpdatePullRequest {
                title: None,
                body: None,
                base: None,
                state: Some(state),
            },
        )
        .await
    }
}

#[async_trait]
impl ChangesetSource for GithubSource {
    async fn load_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{repo_name}/pulls/{external_id}"),
            )
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Err(SourceError::ChangesetNotFound {
                external_id: external_id.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(pr_metadata(resp.json::<PullRequest>().await?))
    }

    async fn create_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError> {
        self.create(payload, false).await
    }

    async fn create_draft_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<CreateOutcome, SourceError> {
        self.create(payload, true).await
    }

    async fn update_changeset(
        &self,
        payload: &ChangesetPayload,
    ) -> Result<ChangesetMetadata, SourceError> {
        let number = payload.external_id.as_deref().ok_or(SourceError::Api {
            status: 0,
            message: "update without external id".to_string(),
        })?;
        self.patch(
            &payload.repo_name,
            number,
            &UpdatePullRequest {
                title: Some(&payload.title),
                body: Some(&payload.body),
                base: Some(strip_ref_prefix(&payload.base_ref)),
                state: None,
            },
        )
        .await
    }

    async fn close_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.set_state(repo_name, external_id, "closed").await
    }

    async fn reopen_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.set_state(repo_name, external_id, "open").await
    }

    async fn undraft_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{repo_name}/pulls/{external_id}/ready_for_review"),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(pr_metadata(resp.json::<PullRequest>().await?))
    }

    fn is_archived_push_error(&self, output: &str) -> bool {
        output.contains(ARCHIVED_PUSH_OUTPUT)
    }
}
