use thiserror::Error;

/// Errors raised while deriving or using key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid key material")]
    InvalidKeyMaterial,

    #[error("invalid mnemonic phrase: {reason}")]
    InvalidMnemonic { reason: String },

    #[error("invalid signature")]
    InvalidSignature,
}
