use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{ExternalServiceId, RepoId};
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalServiceKind {
    GitHub,
    GitLab,
    BitbucketServer,
}

impl ExternalServiceKind {
    pub fn from_string(s: &str) -> Result<Self, CoreError> {
        match s {
            "github" => Ok(ExternalServiceKind::GitHub),
            "gitlab" => Ok(ExternalServiceKind::GitLab),
            "bitbucket_server" => Ok(ExternalServiceKind::BitbucketServer),
            _ => Err(CoreError::InvalidServiceKind(s.to_string())),
        }
    }
}

impl fmt::Display for ExternalServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExternalServiceKind::GitHub => "github",
            ExternalServiceKind::GitLab => "gitlab",
            ExternalServiceKind::BitbucketServer => "bitbucket_server",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: RepoId,
    /// Host-relative name, e.g. `sourcegraph/sourcegraph`.
    pub name: String,
    pub external_service_kind: ExternalServiceKind,
    pub external_service_id: ExternalServiceId,
    /// URL used for push remotes, either https:// or ssh://.
    pub clone_url: String,
    pub archived: bool,
}
