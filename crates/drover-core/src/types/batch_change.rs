use serde::{Deserialize, Serialize};

use crate::id::{BatchChangeId, NamespaceId, UserId};

/// The owning automated code-change initiative a changeset belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchChange {
    pub id: BatchChangeId,
    pub name: String,
    pub namespace_id: NamespaceId,
    /// User whose credentials publish the owned changesets.
    pub creator_user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    User,
    Organization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub id: NamespaceId,
    pub name: String,
    pub kind: NamespaceKind,
}
