use bip39::Mnemonic;

use crate::error::CryptoError;

/// Parse a mnemonic from a string of space-separated words.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, CryptoError> {
    Mnemonic::parse_normalized(phrase).map_err(|e| CryptoError::InvalidMnemonic {
        reason: e.to_string(),
    })
}

/// Derive a 64-byte seed from a mnemonic with an optional passphrase.
/// Uses BIP-39 PBKDF2 derivation.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> [u8; 64] {
    mnemonic.to_seed(passphrase)
}
