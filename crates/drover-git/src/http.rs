use serde::{Deserialize, Serialize};

use crate::{CommitPatchRequest, GitClient, GitError};

/// HTTP client for the internal git service.
#[derive(Debug, Clone)]
pub struct HttpGitClient {
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateCommitRequestBody<'a> {
    repo: &'a str,
    base_ref: &'a str,
    target_ref: &'a str,
    patch: &'a str,
    commit_message: &'a str,
    author_name: &'a str,
    author_email: &'a str,
    remote_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passphrase: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreateCommitResponseBody {
    #[serde(rename = "ref")]
    target_ref: String,
}

#[derive(Deserialize)]
struct ErrorResponseBody {
    #[serde(default)]
    error: String,
    /// Combined stderr/stdout of the failed push, when the service ran one.
    #[serde(default)]
    combined_output: Option<String>,
}

impl HttpGitClient {
    pub fn new(base_url: String, bearer_token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{path}", self.base_url));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[async_trait::async_trait]
impl GitClient for HttpGitClient {
    async fn create_commit_from_patch(
        &self,
        req: &CommitPatchRequest,
    ) -> Result<String, GitError> {
        let body = CreateCommitRequestBody {
            repo: &req.repo_name,
            base_ref: &req.base_ref,
            target_ref: &req.target_ref,
            patch: &req.patch,
            commit_message: &req.commit_message,
            author_name: &req.author_name,
            author_email: &req.author_email,
            remote_url: &req.push.remote_url,
            private_key: req.push.private_key.as_deref(),
            passphrase: req.push.passphrase.as_deref(),
        };

        let resp = self
            .request("/v1/commit-from-patch")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            let parsed: CreateCommitResponseBody = resp.json().await?;
            return Ok(parsed.target_ref);
        }

        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponseBody>(&text) {
            Ok(parsed) => {
                if let Some(combined_output) = parsed.combined_output {
                    tracing::debug!(
                        repo = %req.repo_name,
                        "commit-from-patch push failed: {combined_output}"
                    );
                    Err(GitError::CreateCommit { combined_output })
                } else {
                    Err(GitError::Api {
                        status: status.as_u16(),
                        message: parsed.error,
                    })
                }
            }
            Err(_) => Err(GitError::Api {
                status: status.as_u16(),
                message: text,
            }),
        }
    }
}
