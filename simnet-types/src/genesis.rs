use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_BLOCK_TIME, DEFAULT_CHAIN_ID, DEFAULT_GENESIS_TIMESTAMP};
use crate::primitives::*;

/// Configuration for the genesis block of a simulated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Chain identifier, mixed into the genesis hash.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Timestamp of block 0.
    #[serde(default = "default_timestamp")]
    pub timestamp: Timestamp,
    /// Simulated seconds added per mined block.
    #[serde(default = "default_block_time")]
    pub block_time: u64,
    /// Seed list of named accounts. Order is preserved.
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

/// A named account seeded at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Logical name, e.g. "deployer" or "wallet_1".
    pub name: String,
    /// BIP-39 mnemonic the account key is derived from.
    pub mnemonic: String,
    /// Opening balance in micro-units. TOML integers stop at i64, so larger
    /// balances are written as decimal strings.
    #[serde(deserialize_with = "deserialize_amount")]
    pub balance: Amount,
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::try_from(v).map_err(|_| E::custom(format!("negative balance {v}")))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.trim()
            .parse::<Amount>()
            .map_err(|e| E::custom(format!("invalid balance '{v}': {e}")))
    }
}

/// Accepts a balance as any integer the format can carry, or as a string.
pub fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

fn default_chain_id() -> String {
    DEFAULT_CHAIN_ID.to_string()
}

fn default_timestamp() -> Timestamp {
    DEFAULT_GENESIS_TIMESTAMP
}

fn default_block_time() -> u64 {
    DEFAULT_BLOCK_TIME
}

impl GenesisConfig {
    /// Genesis with default chain parameters and the given accounts.
    pub fn with_accounts(accounts: Vec<GenesisAccount>) -> Self {
        Self {
            chain_id: default_chain_id(),
            timestamp: default_timestamp(),
            block_time: default_block_time(),
            accounts,
        }
    }

    /// Timestamp of the block at `height`.
    pub fn timestamp_at(&self, height: BlockHeight) -> Timestamp {
        self.timestamp
            .saturating_add(self.block_time.saturating_mul(height))
    }
}
