use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drover_core::auth::Authenticator;
use drover_core::types::{ChangesetMetadata, ExternalState};
use drover_git::strip_ref_prefix;

use crate::source::{ChangesetPayload, ChangesetSource, CreateOutcome};
use crate::SourceError;

const ARCHIVED_PUSH_OUTPUT: &str = "ERROR: You are not allowed to push code to this project";
const DRAFT_TITLE_PREFIX: &str = "Draft: ";

/// GitLab changeset source over the REST v4 merge-requests API.
pub struct GitlabSource {
    api_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

pub(crate) fn api_base_url(service_id: &str) -> String {
    format!("{}/api/v4", service_id.trim_end_matches('/'))
}

/// GitLab addresses projects by URL-encoded path.
fn project_path(repo_name: &str) -> String {
    urlencoding::encode(repo_name).into_owned()
}

#[derive(Serialize)]
struct CreateMergeRequest<'a> {
    title: String,
    description: &'a str,
    source_branch: &'a str,
    target_branch: &'a str,
}

#[derive(Serialize)]
struct UpdateMergeRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_event: Option<&'a str>,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    title: String,
    #[serde(default)]
    description: String,
    state: String,
    #[serde(default)]
    draft: bool,
    source_branch: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: serde_json::Value,
}

fn mr_state(mr: &MergeRequest) -> ExternalState {
    match mr.state.as_str() {
        "merged" => ExternalState::Merged,
        "closed" | "locked" => ExternalState::Closed,
        _ if mr.draft => ExternalState::Draft,
        _ => ExternalState::Open,
    }
}

fn mr_metadata(mr: MergeRequest) -> ChangesetMetadata {
    let state = mr_state(&mr);
    let title = mr
        .title
        .strip_prefix(DRAFT_TITLE_PREFIX)
        .unwrap_or(&mr.title)
        .to_string();
    ChangesetMetadata {
        external_id: mr.iid.to_string(),
        head_ref: mr.source_branch,
        title,
        body: mr.description,
        state,
        diff_stat: None,
    }
}

impl GitlabSource {
    pub fn new(service_id: &str, authenticator: Option<&Authenticator>) -> Self {
        let token = authenticator.map(|auth| match auth {
            Authenticator::OAuthBearerToken { token } => token.clone(),
            Authenticator::OAuthBearerTokenWithSsh { token, .. } => token.clone(),
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
            .request(method, format!("{}{path}", self.api_url));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn error_from(&self, resp: reqwest::Response) -> SourceError {
        let status = resp.status().as_u16();
        let message = match resp.json::<ApiError>().await {
            Ok(parsed) => parsed.message.to_string(),
            Err(_) => String::new(),
        };
        if status == 401 {
            return SourceError::Unauthorized(message);
        }
        if message.contains("archived") {
            return SourceError::RepoArchived;
        }
        SourceError::Api { status, message }
    }

    async fn mutate(
        &self,
        repo_name: &str,
        iid: &str,
        update: &UpdateMergeRequest<'_>,
    ) -> Result<ChangesetMetadata, SourceError> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!(
                    "/projects/{}/merge_requests/{iid}",
                    project_path(repo_name)
                ),
            )
            .json(update)
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Err(SourceError::ChangesetNotFound {
                external_id: iid.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(mr_metadata(resp.json::<MergeRequest>().await?))
    }

    async fn create(
        &self,
        payload: &ChangesetPayload,
        draft: bool,
    ) -> Result<CreateOutcome, SourceError> {
        let title = if draft {
            format!("{DRAFT_TITLE_PREFIX}{}", payload.title)
        } else {
            payload.title.clone()
        };
        let body = CreateMergeRequest {
            title,
            description: &payload.body,
            source_branch: strip_ref_prefix(&payload.head_ref),
            target_branch: strip_ref_prefix(&payload.base_ref),
        };
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/projects/{}/merge_requests", project_path(&payload.repo_name)),
            )
            .json(&body)
            .send()
            .await?;

        // 409: a merge request for this source branch already exists.
        if resp.status().as_u16() == 409 {
            let metadata = self
                .find_by_source_branch(&payload.repo_name, strip_ref_prefix(&payload.head_ref))
                .await?;
            return Ok(CreateOutcome {
                metadata,
                already_exists: true,
            });
        }
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        Ok(CreateOutcome {
            metadata: mr_metadata(resp.json::<MergeRequest>().await?),
            already_exists: false,
        })
    }

    async fn find_by_source_branch(
        &self,
        repo_name: &str,
        branch: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/projects/{}/merge_requests?source_branch={branch}",
                    project_path(repo_name)
                ),
            )
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        let mut mrs = resp.json::<Vec<MergeRequest>>().await?;
        if mrs.is_empty() {
            return Err(SourceError::ChangesetNotFound {
                external_id: branch.to_string(),
            });
        }
        Ok(mr_metadata(mrs.remove(0)))
    }
}

#[async_trait]
impl ChangesetSource for GitlabSource {
    async fn load_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/projects/{}/merge_requests/{external_id}",
                    project_path(repo_name)
                ),
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
        Ok(mr_metadata(resp.json::<MergeRequest>().await?))
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
        let iid = payload.external_id.as_deref().ok_or(SourceError::Api {
            status: 0,
            message: "update without external id".to_string(),
        })?;
        self.mutate(
            &payload.repo_name,
            iid,
            &UpdateMergeRequest {
                title: Some(payload.title.clone()),
                description: Some(&payload.body),
                target_branch: Some(strip_ref_prefix(&payload.base_ref)),
                state_event: None,
            },
        )
        .await
    }

    async fn close_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.mutate(
            repo_name,
            external_id,
            &UpdateMergeRequest {
                title: None,
                description: None,
                target_branch: None,
                state_event: Some("close"),
            },
        )
        .await
    }

    async fn reopen_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        self.mutate(
            repo_name,
            external_id,
            &UpdateMergeRequest {
                title: None,
                description: None,
                target_branch: None,
                state_event: Some("reopen"),
            },
        )
        .await
    }

    async fn undraft_changeset(
        &self,
        repo_name: &str,
        external_id: &str,
    ) -> Result<ChangesetMetadata, SourceError> {
        // Drafts are a title convention on GitLab; undrafting rewrites the
        // title without the prefix.
        let current = self.load_changeset(repo_name, external_id).await?;
        self.mutate(
            repo_name,
            external_id,
            &UpdateMergeRequest {
                title: Some(current.title),
                description: None,
                target_branch: None,
                state_event: None,
            },
        )
        .await
    }

    fn is_archived_push_error(&self, output: &str) -> bool {
        output.contains(ARCHIVED_PUSH_OUTPUT)
    }
}
