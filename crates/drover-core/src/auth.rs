use serde::{Deserialize, Serialize};

use crate::id::{ExternalServiceId, UserId};
use crate::types::ExternalServiceKind;

/// Credential used to act against a code host on an owner's behalf.
///
/// The executor borrows one of these for a single plan execution; it never
/// stores or re-issues them. Matching is exhaustive wherever a variant maps
/// to transport behavior so that a new kind cannot silently fall through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Authenticator {
    OAuthBearerToken {
        token: String,
    },
    BasicAuth {
        username: String,
        password: String,
    },
    OAuthBearerTokenWithSsh {
        token: String,
        private_key: String,
        public_key: String,
        passphrase: String,
    },
}

impl Authenticator {
    /// Whether this credential can authenticate an ssh:// push remote.
    pub fn supports_ssh(&self) -> bool {
        matches!(self, Authenticator::OAuthBearerTokenWithSsh { .. })
    }
}

/// Fallback credential scoped to one external service, not a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCredential {
    pub external_service_kind: ExternalServiceKind,
    pub external_service_id: ExternalServiceId,
    pub authenticator: Authenticator,
}

/// The domain tag user credentials are scoped under. Other subsystems store
/// their own credentials for the same user and service under other domains.
pub const USER_CREDENTIAL_DOMAIN: &str = "batch-changes";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub user_id: UserId,
    pub domain: String,
    pub external_service_kind: ExternalServiceKind,
    pub external_service_id: ExternalServiceId,
    pub authenticator: Authenticator,
}
