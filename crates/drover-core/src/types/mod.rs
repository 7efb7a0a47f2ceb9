pub mod batch_change;
pub mod changeset;
pub mod changeset_spec;
pub mod operation;
pub mod repo;

pub use batch_change::{BatchChange, Namespace, NamespaceKind};
pub use changeset::{
    BatchChangeAssoc, Changeset, ChangesetMetadata, DiffStat, ExternalState, PublicationState,
};
pub use changeset_spec::ChangesetSpec;
pub use operation::Operation;
pub use repo::{ExternalServiceKind, Repo};
