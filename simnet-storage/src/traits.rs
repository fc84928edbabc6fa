use std::fmt;

use borsh::BorshSerialize;

use crate::error::StorageError;

/// Result type for prefix scan operations: a list of key-value byte pairs.
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// A partition of the state store. Every key lives in exactly one namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize)]
pub enum Namespace {
    /// Account records keyed by borsh-encoded principal.
    Accounts,
    /// Key/value state owned by one deployed program.
    Program(String),
}

impl Namespace {
    pub fn program(name: impl Into<String>) -> Self {
        Namespace::Program(name.into())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Accounts => write!(f, "accounts"),
            Namespace::Program(name) => write!(f, "program:{name}"),
        }
    }
}

/// Read access to a consistent view of the state.
pub trait StateReader {
    /// Read a value. Fails if the namespace does not exist.
    fn get(&self, namespace: &Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Whether the namespace exists in this view.
    fn has_namespace(&self, namespace: &Namespace) -> bool;

    /// Whether a key exists. Fails if the namespace does not exist.
    fn exists(&self, namespace: &Namespace, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(namespace, key)?.is_some())
    }
}

/// Build the error for an operation on a missing namespace.
pub(crate) fn namespace_not_found(namespace: &Namespace) -> StorageError {
    StorageError::NamespaceNotFound {
        namespace: namespace.to_string(),
    }
}
