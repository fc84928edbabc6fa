use crate::traits::Namespace;

/// A single mutation inside a [`StateDelta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Create an empty namespace (program deployment).
    CreateNamespace { namespace: Namespace },
    Put {
        namespace: Namespace,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete { namespace: Namespace, key: Vec<u8> },
}

impl DeltaOp {
    /// The namespace this operation touches.
    pub fn namespace(&self) -> &Namespace {
        match self {
            DeltaOp::CreateNamespace { namespace }
            | DeltaOp::Put { namespace, .. }
            | DeltaOp::Delete { namespace, .. } => namespace,
        }
    }
}

/// The ordered set of mutations produced by one call, applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    ops: Vec<DeltaOp>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: DeltaOp) {
        self.ops.push(op);
    }

    /// Append all operations of `other` after this delta's operations.
    pub fn extend(&mut self, other: StateDelta) {
        self.ops.extend(other.ops);
    }

    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DeltaOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

impl FromIterator<DeltaOp> for StateDelta {
    fn from_iter<I: IntoIterator<Item = DeltaOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}
