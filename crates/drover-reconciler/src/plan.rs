use drover_core::types::{Changeset, ChangesetSpec, Operation};

/// Ordered operation list for one changeset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operations(Vec<Operation>);

impl Operations {
    pub fn new(ops: Vec<Operation>) -> Self {
        Self(ops)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, op: Operation) -> bool {
        self.0.contains(&op)
    }

    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }

    /// Whether any operation needs a changeset source. Credential
    /// resolution is skipped entirely when this is false.
    pub fn requires_code_host(&self) -> bool {
        self.0.iter().any(|op| op.requires_code_host())
    }
}

impl From<Vec<Operation>> for Operations {
    fn from(ops: Vec<Operation>) -> Self {
        Self(ops)
    }
}

/// One unit of reconciliation work: the operations that move a changeset's
/// actual state toward its spec. Built by the planner, consumed exactly
/// once; only its effects are persisted.
#[derive(Debug, Clone)]
pub struct Plan {
    pub changeset: Changeset,
    pub changeset_spec: Option<ChangesetSpec>,
    pub ops: Operations,
}

impl Plan {
    pub fn new(changeset: Changeset, changeset_spec: Option<ChangesetSpec>) -> Self {
        Self {
            changeset,
            changeset_spec,
            ops: Operations::default(),
        }
    }

    pub fn add_op(&mut self, op: Operation) {
        self.ops.0.push(op);
    }
}
