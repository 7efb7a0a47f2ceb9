use serde::{Deserialize, Serialize};
use std::fmt;

/// Atomic action kind the planner schedules and the executor dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Import,
    Push,
    Publish,
    PublishDraft,
    Update,
    Undraft,
    Close,
    Reopen,
    Sync,
    Sleep,
    Archive,
    Detach,
}

impl Operation {
    /// Whether executing this operation involves talking to the code host.
    /// Plans made up entirely of local operations must not trigger
    /// credential resolution.
    pub fn requires_code_host(self) -> bool {
        !matches!(self, Operation::Archive | Operation::Detach)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Import => "import",
            Operation::Push => "push",
            Operation::Publish => "publish",
            Operation::PublishDraft => "publish-draft",
            Operation::Update => "update",
            Operation::Undraft => "undraft",
            Operation::Close => "close",
            Operation::Reopen => "reopen",
            Operation::Sync => "sync",
            Operation::Sleep => "sleep",
            Operation::Archive => "archive",
            Operation::Detach => "detach",
        };
        write!(f, "{s}")
    }
}
