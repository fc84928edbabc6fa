use crate::primitives::{Amount, Timestamp};

// ─── Token Parameters ────────────────────────────────────────────────────────

/// Number of decimal places for the native token.
pub const NATIVE_DECIMALS: u32 = 6;

/// One full native token in micro-units (10^6).
pub const ONE_TOKEN: Amount = 1_000_000;

/// Balance given to each default genesis account (100M tokens).
pub const DEFAULT_ACCOUNT_BALANCE: Amount = 100_000_000 * ONE_TOKEN;

// ─── Program Parameters ──────────────────────────────────────────────────────

/// Maximum length of a program name.
pub const MAX_PROGRAM_NAME_LEN: usize = 40;

/// Maximum length of a program source, in bytes.
pub const MAX_PROGRAM_SOURCE_LEN: usize = 1_048_576; // 1 MB

// ─── Chain Parameters ────────────────────────────────────────────────────────

/// Chain identifier used when none is configured.
pub const DEFAULT_CHAIN_ID: &str = "simnet";

/// Timestamp of the genesis block when none is configured.
pub const DEFAULT_GENESIS_TIMESTAMP: Timestamp = 1_700_000_000;

/// Simulated seconds between consecutive blocks.
pub const DEFAULT_BLOCK_TIME: u64 = 600;

/// SLIP-0044 coin type used when deriving account keys from mnemonics.
pub const SIMNET_COIN_TYPE: u32 = 5757;
