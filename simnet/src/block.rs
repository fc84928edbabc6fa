use serde::{Serialize, Serializer};

use simnet_crypto::hash::{blake3_hash, FramedHasher};
use simnet_crypto::keys::{verify, Keypair, Signature};
use simnet_types::primitives::{BlockHeight, Hash, PublicKey, Timestamp};
use simnet_types::principal::Principal;
use simnet_vm::result::CallResult;

use crate::error::SimnetError;

pub(crate) fn as_hex<S: Serializer, T: AsRef<[u8]>>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// The applied form of one transaction inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub sender: Principal,
    /// `program::function` for calls, `stx-transfer` for native transfers.
    pub target: String,
    pub result: CallResult,
}

/// A sealed block of the simulated chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub height: BlockHeight,
    #[serde(serialize_with = "as_hex")]
    pub hash: Hash,
    #[serde(serialize_with = "as_hex")]
    pub parent_hash: Hash,
    pub timestamp: Timestamp,
    /// Root of the full state after this block's transactions.
    #[serde(serialize_with = "as_hex")]
    pub state_root: Hash,
    #[serde(serialize_with = "as_hex")]
    pub receipts_root: Hash,
    pub receipts: Vec<Receipt>,
    #[serde(serialize_with = "as_hex")]
    pub miner: PublicKey,
    #[serde(serialize_with = "as_hex")]
    pub signature: Signature,
}

/// Digest over the JSON rendering of the receipts, in order.
pub fn compute_receipts_root(receipts: &[Receipt]) -> Result<Hash, SimnetError> {
    Ok(blake3_hash(&serde_json::to_vec(receipts)?))
}

/// Deterministic block hash from every field except the hash itself and
/// the signature.
pub fn compute_block_hash(block: &Block) -> Hash {
    FramedHasher::new("simnet block v1")
        .u64(block.height)
        .field(&block.parent_hash)
        .u64(block.timestamp)
        .field(&block.state_root)
        .field(&block.receipts_root)
        .field(&block.miner)
        .finish()
}

/// Build and sign a block.
pub fn build_block(
    height: BlockHeight,
    parent_hash: Hash,
    timestamp: Timestamp,
    state_root: Hash,
    receipts: Vec<Receipt>,
    miner: &Keypair,
) -> Result<Block, SimnetError> {
    let mut block = Block {
        height,
        hash: [0u8; 32],
        parent_hash,
        timestamp,
        state_root,
        receipts_root: compute_receipts_root(&receipts)?,
        receipts,
        miner: miner.public_key(),
        signature: [0u8; 64],
    };
    block.hash = compute_block_hash(&block);
    block.signature = miner.sign(&block.hash);
    Ok(block)
}

impl Block {
    /// Check the receipts root, the hash and the miner signature.
    pub fn verify(&self) -> Result<(), SimnetError> {
        if self.receipts_root != compute_receipts_root(&self.receipts)? {
            return Err(SimnetError::InvalidBlock {
                reason: format!("block {}: receipts root mismatch", self.height),
            });
        }
        if self.hash != compute_block_hash(self) {
            return Err(SimnetError::InvalidBlock {
                reason: format!("block {}: hash mismatch", self.height),
            });
        }
        verify(&self.hash, &self.signature, &self.miner)?;
        Ok(())
    }
}
