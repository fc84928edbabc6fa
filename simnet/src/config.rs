use serde::{Deserialize, Serialize};
use std::path::Path;

use simnet_types::constants::DEFAULT_ACCOUNT_BALANCE;
use simnet_types::genesis::{GenesisAccount, GenesisConfig};

use crate::error::SimnetError;

/// Name of the account that deploys programs by default.
pub const DEPLOYER: &str = "deployer";

/// Mnemonics of the default accounts: the deployer, then `wallet_1`..`wallet_8`.
pub const DEFAULT_MNEMONICS: [&str; 9] = [
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
    "legal winner thank year wave sausage worth useful legal winner thank yellow",
    "letter advice cage absurd amount doctor acoustic avoid letter advice cage above",
    "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong",
    "ozone drill grab fiber curtain grace pudding thank cruise elder eight picnic",
    "scheme spot photo card baby mountain device kick cradle pact join borrow",
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
     abandon abandon abandon abandon abandon agent",
    "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo when",
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
     abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimnetConfig {
    /// Free-form label of the simulated network.
    #[serde(default = "default_network_id")]
    pub network_id: String,
    #[serde(default = "default_genesis")]
    pub genesis: GenesisConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_network_id() -> String {
    "simnet".to_string()
}

fn default_genesis() -> GenesisConfig {
    GenesisConfig::with_accounts(default_accounts())
}

/// Deployer plus `wallet_1`..`wallet_8`, each with the default balance.
pub fn default_accounts() -> Vec<GenesisAccount> {
    DEFAULT_MNEMONICS
        .iter()
        .enumerate()
        .map(|(i, mnemonic)| GenesisAccount {
            name: if i == 0 {
                DEPLOYER.to_string()
            } else {
                format!("wallet_{i}")
            },
            mnemonic: mnemonic.to_string(),
            balance: DEFAULT_ACCOUNT_BALANCE,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// When false, an auto-mined call that fails produces no block.
    #[serde(default = "default_failed_calls_advance_height")]
    pub failed_calls_advance_height: bool,
}

fn default_failed_calls_advance_height() -> bool {
    true
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            failed_calls_advance_height: default_failed_calls_advance_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Default for SimnetConfig {
    fn default() -> Self {
        Self {
            network_id: default_network_id(),
            genesis: default_genesis(),
            mining: MiningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimnetConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimnetError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SimnetError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents).map_err(|e| SimnetError::ConfigError {
            reason: format!("failed to parse config file '{}': {}", path.display(), e),
        })
    }

    /// Parse configuration from TOML text. Missing sections take defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, SimnetError> {
        toml::from_str(contents).map_err(|e| SimnetError::ConfigError {
            reason: e.to_string(),
        })
    }
}
