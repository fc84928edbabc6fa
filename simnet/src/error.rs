use thiserror::Error;

use simnet_vm::error::VmError;

/// Errors raised by a simulator session.
#[derive(Debug, Error)]
pub enum SimnetError {
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error("genesis error: {reason}")]
    GenesisError { reason: String },

    #[error("invalid block: {reason}")]
    InvalidBlock { reason: String },

    #[error("unknown account: {name}")]
    UnknownAccount { name: String },

    #[error("storage error: {0}")]
    StorageError(#[from] simnet_storage::error::StorageError),

    #[error("crypto error: {0}")]
    CryptoError(#[from] simnet_crypto::error::CryptoError),

    #[error("types error: {0}")]
    TypesError(#[from] simnet_types::error::TypesError),

    #[error("vm error: {0}")]
    VmError(#[from] VmError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = SimnetError::ConfigError {
            reason: "missing field".to_string(),
        };
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_vm_error_from() {
        let err: SimnetError = VmError::DuplicateName {
            name: "counter".to_string(),
        }
        .into();
        assert!(matches!(err, SimnetError::VmError(VmError::DuplicateName { .. })));
        assert!(err.to_string().contains("counter"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SimnetError = io_err.into();
        assert!(matches!(err, SimnetError::IoError(_)));
    }
}
