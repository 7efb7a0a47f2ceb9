pub mod bitbucket_server;
pub mod error;
pub mod github;
pub mod gitlab;
pub mod source;
pub mod sourcer;
pub mod testing;

pub use error::SourceError;
pub use source::{ChangesetPayload, ChangesetSource, CreateOutcome, Sourcer};
pub use sourcer::HostSourcer;
