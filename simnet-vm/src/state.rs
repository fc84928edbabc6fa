//! Layout of program and account state inside the store.
//!
//! Program state lives in `Namespace::Program(name)`: data variables under
//! [`data_var_key`], map entries under [`map_entry_key`]. Accounts live in
//! `Namespace::Accounts` keyed by principal.

use borsh::BorshDeserialize;

use simnet_storage::error::StorageError;
use simnet_storage::traits::{Namespace, StateReader};
use simnet_storage::transaction::Transaction;
use simnet_types::account::Account;
use simnet_types::principal::Principal;
use simnet_types::value::Value;

use crate::error::VmError;

const TAG_DATA_VAR: u8 = 0;
const TAG_MAP_ENTRY: u8 = 1;

fn push_framed(key: &mut Vec<u8>, bytes: &[u8]) {
    key.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    key.extend_from_slice(bytes);
}

pub fn data_var_key(var: &str) -> Vec<u8> {
    let mut key = vec![TAG_DATA_VAR];
    push_framed(&mut key, var.as_bytes());
    key
}

/// Common prefix of every entry of `map`.
pub fn map_prefix(map: &str) -> Vec<u8> {
    let mut key = vec![TAG_MAP_ENTRY];
    push_framed(&mut key, map.as_bytes());
    key
}

pub fn map_entry_key(map: &str, entry: &Value) -> Vec<u8> {
    let mut key = map_prefix(map);
    push_framed(&mut key, &entry.to_bytes());
    key
}

/// Recover the map key from a stored entry key of `map`.
pub fn decode_map_key(map: &str, key: &[u8]) -> Result<Value, VmError> {
    let corrupt = || -> VmError {
        StorageError::DeserializationError {
            reason: format!("malformed entry key in map '{map}'"),
        }
        .into()
    };
    let rest = key.strip_prefix(map_prefix(map).as_slice()).ok_or_else(corrupt)?;
    let (len, bytes) = rest.split_first_chunk::<4>().ok_or_else(corrupt)?;
    if u32::from_le_bytes(*len) as usize != bytes.len() {
        return Err(corrupt());
    }
    decode_value(bytes)
}

pub fn account_key(principal: &Principal) -> Vec<u8> {
    borsh::to_vec(principal).unwrap_or_default()
}

/// Decode a stored value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, VmError> {
    Value::from_bytes(bytes).map_err(|e| {
        StorageError::DeserializationError {
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn read_value(
    reader: &impl StateReader,
    namespace: &Namespace,
    key: &[u8],
) -> Result<Option<Value>, VmError> {
    reader
        .get(namespace, key)?
        .map(|bytes| decode_value(&bytes))
        .transpose()
}

pub fn write_value(
    tx: &mut Transaction,
    namespace: &Namespace,
    key: &[u8],
    value: &Value,
) -> Result<usize, VmError> {
    let bytes = value.to_bytes();
    tx.put(namespace, key, &bytes)?;
    Ok(bytes.len())
}

pub fn read_account(
    reader: &impl StateReader,
    principal: &Principal,
) -> Result<Option<Account>, VmError> {
    reader
        .get(&Namespace::Accounts, &account_key(principal))?
        .map(|bytes| decode_account(&bytes))
        .transpose()
}

/// Decode a stored account record.
pub fn decode_account(bytes: &[u8]) -> Result<Account, VmError> {
    Account::try_from_slice(bytes).map_err(|e| {
        StorageError::DeserializationError {
            reason: e.to_string(),
        }
        .into()
    })
}

/// The account of `principal`, or a fresh zero-balance account.
pub fn read_account_or_default(
    reader: &impl StateReader,
    principal: &Principal,
) -> Result<Account, VmError> {
    Ok(read_account(reader, principal)?.unwrap_or_else(|| Account::new(principal.clone(), 0)))
}

pub fn write_account(tx: &mut Transaction, account: &Account) -> Result<usize, VmError> {
    let bytes = borsh::to_vec(account).map_err(|e| StorageError::SerializationError {
        reason: e.to_string(),
    })?;
    tx.put(&Namespace::Accounts, &account_key(&account.principal), &bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simnet_storage::state_store::StateStore;
    use simnet_types::primitives::Address;

    #[test]
    fn test_map_keys_share_prefix() {
        let key = map_entry_key("balances", &Value::UInt(1));
        assert!(key.starts_with(&map_prefix("balances")));
        assert!(!key.starts_with(&map_prefix("balance")));
        assert_ne!(data_var_key("x"), map_prefix("x"));
        assert_eq!(decode_map_key("balances", &key).unwrap(), Value::UInt(1));
        assert!(decode_map_key("balance", &key).is_err());
        assert!(decode_map_key("balances", &map_prefix("balances")).is_err());
    }

    #[test]
    fn test_account_roundtrip_through_store() {
        let store = StateStore::new();
        let principal = Principal::Standard(Address::new([3u8; 20]));
        let mut tx = Transaction::new(store.snapshot().unwrap());
        assert_eq!(read_account(&tx, &principal).unwrap(), None);
        assert_eq!(read_account_or_default(&tx, &principal).unwrap().balance, 0);

        write_account(&mut tx, &Account::new(principal.clone(), 42)).unwrap();
        store.apply(tx.into_delta()).unwrap();

        let snap = store.snapshot().unwrap();
        assert_eq!(read_account(&snap, &principal).unwrap().unwrap().balance, 42);
    }

    #[test]
    fn test_value_roundtrip_through_store() {
        let store = StateStore::new();
        let ns = Namespace::program("counter");
        let mut tx = Transaction::new(store.snapshot().unwrap());
        tx.create_namespace(ns.clone()).unwrap();
        write_value(&mut tx, &ns, &data_var_key("count"), &Value::UInt(7)).unwrap();
        assert_eq!(
            read_value(&tx, &ns, &data_var_key("count")).unwrap(),
            Some(Value::UInt(7))
        );
    }
}
