pub mod auth;
pub mod error;
pub mod id;
pub mod types;

pub use auth::Authenticator;
pub use error::CoreError;
pub use id::{BatchChangeId, ChangesetId, ChangesetSpecId, NamespaceId, RepoId, UserId};
