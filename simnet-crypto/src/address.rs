use simnet_types::primitives::{Address, PublicKey};

use crate::hash::blake3_hash;

/// Derive an address from a public key.
/// Address = BLAKE3(pubkey)[0..20]
pub fn pubkey_to_address(pubkey: &PublicKey) -> Address {
    let hash = blake3_hash(pubkey);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[..20]);
    Address::new(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_derivation_deterministic() {
        let pubkey = [42u8; 32];
        assert_eq!(pubkey_to_address(&pubkey), pubkey_to_address(&pubkey));
    }

    #[test]
    fn test_different_pubkeys_different_addresses() {
        assert_ne!(pubkey_to_address(&[1u8; 32]), pubkey_to_address(&[2u8; 32]));
    }

    #[test]
    fn test_address_is_hash_prefix() {
        let pubkey = [99u8; 32];
        let addr = pubkey_to_address(&pubkey);
        assert_eq!(addr.as_bytes()[..], blake3_hash(&pubkey)[..20]);
    }
}
