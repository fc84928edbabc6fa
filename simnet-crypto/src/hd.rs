use simnet_types::constants::SIMNET_COIN_TYPE;

use crate::keys::Keypair;

/// Derive an Ed25519 keypair using SLIP-0010 from a BIP-39 seed.
///
/// Path: m/44'/{SIMNET_COIN_TYPE}'/0'/0'/{index}'
///
/// All path components are hardened (required for Ed25519 by SLIP-0010).
pub fn derive_keypair(seed: &[u8; 64], index: u32) -> Keypair {
    let path = [44, SIMNET_COIN_TYPE, 0, 0, index];
    let derived = slip10_ed25519::derive_ed25519_private_key(seed, &path);
    Keypair::from_seed(&derived)
}
