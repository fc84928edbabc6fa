use serde::Serialize;
use thiserror::Error;

use simnet_storage::error::StorageError;

/// Coarse classification of a [`VmError`], stable across error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DuplicateName,
    Compile,
    UnknownFunction,
    Arity,
    Type,
    IllegalMutation,
    RuntimeAbort,
}

/// Errors raised while deploying or executing programs.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VmError {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Program name already taken: {name}")]
    DuplicateName { name: String },

    #[error("Compile error at {line}:{column}: {reason}")]
    Compile {
        line: u32,
        column: u32,
        reason: String,
    },

    #[error("Unknown function: {program}::{function}")]
    UnknownFunction { program: String, function: String },

    #[error("Arity mismatch calling {function}: expected {expected}, got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Type error: {reason}")]
    Type { reason: String },

    #[error("Illegal mutation in read-only context: {reason}")]
    IllegalMutation { reason: String },

    #[error("Runtime abort: {reason}")]
    RuntimeAbort { reason: String },
}

impl VmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::NotFound { .. } => ErrorKind::NotFound,
            VmError::DuplicateName { .. } => ErrorKind::DuplicateName,
            VmError::Compile { .. } => ErrorKind::Compile,
            VmError::UnknownFunction { .. } => ErrorKind::UnknownFunction,
            VmError::Arity { .. } => ErrorKind::Arity,
            VmError::Type { .. } => ErrorKind::Type,
            VmError::IllegalMutation { .. } => ErrorKind::IllegalMutation,
            VmError::RuntimeAbort { .. } => ErrorKind::RuntimeAbort,
        }
    }

    pub(crate) fn type_error(reason: impl Into<String>) -> Self {
        VmError::Type {
            reason: reason.into(),
        }
    }

    pub(crate) fn abort(reason: impl Into<String>) -> Self {
        VmError::RuntimeAbort {
            reason: reason.into(),
        }
    }
}

impl From<StorageError> for VmError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NamespaceNotFound { namespace } => VmError::NotFound { what: namespace },
            other => VmError::RuntimeAbort {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let err: VmError = StorageError::NamespaceNotFound {
            namespace: "program:ghost".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: VmError = StorageError::LockPoisoned {
            reason: "boom".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RuntimeAbort);
    }

    #[test]
    fn test_json_is_tagged_by_kind() {
        let err = VmError::Arity {
            function: "increment".to_string(),
            expected: 0,
            got: 1,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "arity");
        assert_eq!(json["got"], 1);
    }
}
