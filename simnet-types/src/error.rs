use thiserror::Error;

/// Errors raised by the shared type layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("invalid program name: {0}")]
    InvalidName(String),

    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("balance overflow")]
    BalanceOverflow,

    #[error("nonce overflow")]
    NonceOverflow,
}
