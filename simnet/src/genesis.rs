use std::collections::BTreeMap;

use serde::Serialize;

use simnet_crypto::address::pubkey_to_address;
use simnet_crypto::hash::blake3_hash_domain;
use simnet_crypto::hd::derive_keypair;
use simnet_crypto::keys::Keypair;
use simnet_crypto::seed::{mnemonic_to_seed, parse_mnemonic};
use simnet_storage::state_store::StateStore;
use simnet_storage::transaction::Transaction;
use simnet_types::account::Account;
use simnet_types::genesis::{GenesisAccount, GenesisConfig};
use simnet_types::primitives::{Address, Amount, PublicKey};
use simnet_types::principal::Principal;
use simnet_vm::state;

use crate::block::{build_block, Block};
use crate::error::SimnetError;

/// A genesis account with its derived key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedAccount {
    pub name: String,
    pub address: Address,
    #[serde(serialize_with = "crate::block::as_hex")]
    pub public_key: PublicKey,
    pub balance: Amount,
}

/// Derive the address of a named genesis account from its mnemonic.
///
/// Uses the first SLIP-0010 key of the simnet coin type with an empty
/// passphrase.
pub fn derive_account(account: &GenesisAccount) -> Result<DerivedAccount, SimnetError> {
    let mnemonic = parse_mnemonic(&account.mnemonic).map_err(|e| SimnetError::GenesisError {
        reason: format!("account '{}': {}", account.name, e),
    })?;
    let seed = mnemonic_to_seed(&mnemonic, "");
    let keypair = derive_keypair(&seed, 0);
    let public_key = keypair.public_key();
    Ok(DerivedAccount {
        name: account.name.clone(),
        address: pubkey_to_address(&public_key),
        public_key,
        balance: account.balance,
    })
}

/// Keypair that signs the blocks of a chain. Derived from the chain id so
/// that identical configurations produce identical chains.
pub fn miner_keypair(chain_id: &str) -> Keypair {
    Keypair::from_seed(&blake3_hash_domain("simnet miner key v1", chain_id.as_bytes()))
}

/// Seed `store` with the configured accounts and build block 0.
///
/// Account names and addresses must be unique.
pub fn create_genesis(
    config: &GenesisConfig,
    store: &StateStore,
    miner: &Keypair,
) -> Result<(BTreeMap<String, DerivedAccount>, Block), SimnetError> {
    let mut accounts = BTreeMap::new();
    let mut tx = Transaction::new(store.snapshot()?);

    for entry in &config.accounts {
        let derived = derive_account(entry)?;
        if accounts.contains_key(&derived.name) {
            return Err(SimnetError::GenesisError {
                reason: format!("duplicate account name '{}'", derived.name),
            });
        }
        let principal = Principal::Standard(derived.address);
        if state::read_account(&tx, &principal)?.is_some() {
            return Err(SimnetError::GenesisError {
                reason: format!("account '{}' derives an address already in use", derived.name),
            });
        }
        state::write_account(&mut tx, &Account::new(principal, derived.balance))?;
        accounts.insert(derived.name.clone(), derived);
    }

    store.apply(tx.into_delta())?;
    let state_root = store.snapshot()?.state_root();
    let block = build_block(0, [0u8; 32], config.timestamp, state_root, Vec::new(), miner)?;
    Ok((accounts, block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_accounts;
    use simnet_types::constants::DEFAULT_ACCOUNT_BALANCE;

    #[test]
    fn test_derive_account_deterministic() {
        let account = &default_accounts()[0];
        let a = derive_account(account).unwrap();
        let b = derive_account(account).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "deployer");
    }

    #[test]
    fn test_default_accounts_are_distinct() {
        let addresses: std::collections::BTreeSet<_> = default_accounts()
            .iter()
            .map(|a| derive_account(a).unwrap().address)
            .collect();
        assert_eq!(addresses.len(), 9);
    }

    #[test]
    fn test_invalid_mnemonic() {
        let account = GenesisAccount {
            name: "broken".to_string(),
            mnemonic: "not a real mnemonic".to_string(),
            balance: 1,
        };
        assert!(matches!(
            derive_account(&account),
            Err(SimnetError::GenesisError { .. })
        ));
    }

    #[test]
    fn test_create_genesis_seeds_balances() {
        let store = StateStore::new();
        let config = GenesisConfig::with_accounts(default_accounts());
        let miner = miner_keypair(&config.chain_id);
        let (accounts, block) = create_genesis(&config, &store, &miner).unwrap();

        assert_eq!(block.height, 0);
        assert_eq!(block.parent_hash, [0u8; 32]);
        assert!(block.verify().is_ok());

        let snap = store.snapshot().unwrap();
        assert_eq!(block.state_root, snap.state_root());
        let wallet = &accounts["wallet_1"];
        let account = state::read_account(&snap, &Principal::Standard(wallet.address))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, DEFAULT_ACCOUNT_BALANCE);
        assert_eq!(account.nonce, 0);
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let store = StateStore::new();
        let mut accounts = default_accounts();
        accounts.push(accounts[1].clone());
        let config = GenesisConfig::with_accounts(accounts);
        let err = create_genesis(&config, &store, &miner_keypair("simnet")).unwrap_err();
        assert!(matches!(err, SimnetError::GenesisError { .. }));
    }

    #[test]
    fn test_genesis_is_reproducible() {
        let config = GenesisConfig::with_accounts(default_accounts());
        let miner = miner_keypair(&config.chain_id);
        let (_, a) = create_genesis(&config, &StateStore::new(), &miner).unwrap();
        let (_, b) = create_genesis(&config, &StateStore::new(), &miner).unwrap();
        assert_eq!(a.hash, b.hash);
    }
}
