use tracing::info;

use simnet_types::primitives::{BlockHeight, Hash};

use crate::block::Block;
use crate::error::SimnetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// No genesis block yet.
    Uninitialized,
    /// Genesis applied; blocks can be appended.
    Ready,
}

/// The chain of sealed blocks. Height only ever grows by one.
#[derive(Debug, Clone)]
pub struct NetworkClock {
    blocks: Vec<Block>,
}

impl Default for NetworkClock {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClock {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn state(&self) -> ClockState {
        if self.blocks.is_empty() {
            ClockState::Uninitialized
        } else {
            ClockState::Ready
        }
    }

    /// Height of the latest block; 0 before and at genesis.
    pub fn block_height(&self) -> BlockHeight {
        self.blocks.last().map_or(0, |b| b.height)
    }

    /// Height the next sealed block will have.
    pub fn next_height(&self) -> BlockHeight {
        match self.state() {
            ClockState::Uninitialized => 0,
            ClockState::Ready => self.block_height() + 1,
        }
    }

    /// Hash of the latest block, or zeros before genesis.
    pub fn tip_hash(&self) -> Hash {
        self.blocks.last().map_or([0u8; 32], |b| b.hash)
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, height: BlockHeight) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|h| self.blocks.get(h))
    }

    /// Append a sealed block. It must extend the current tip.
    pub fn push(&mut self, block: Block) -> Result<(), SimnetError> {
        if block.height != self.next_height() {
            return Err(SimnetError::InvalidBlock {
                reason: format!(
                    "expected height {}, got {}",
                    self.next_height(),
                    block.height
                ),
            });
        }
        if block.parent_hash != self.tip_hash() {
            return Err(SimnetError::InvalidBlock {
                reason: format!("block {} does not extend the tip", block.height),
            });
        }
        info!(
            height = block.height,
            hash = %hex::encode(block.hash),
            receipts = block.receipts.len(),
            "block sealed"
        );
        self.blocks.push(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::build_block;
    use simnet_crypto::keys::Keypair;

    fn miner() -> Keypair {
        Keypair::from_seed(&[3u8; 32])
    }

    #[test]
    fn test_uninitialized_until_genesis() {
        let mut clock = NetworkClock::new();
        assert_eq!(clock.state(), ClockState::Uninitialized);
        assert_eq!(clock.block_height(), 0);
        assert_eq!(clock.next_height(), 0);

        clock
            .push(build_block(0, [0u8; 32], 0, [0u8; 32], vec![], &miner()).unwrap())
            .unwrap();
        assert_eq!(clock.state(), ClockState::Ready);
        assert_eq!(clock.block_height(), 0);
        assert_eq!(clock.next_height(), 1);
    }

    #[test]
    fn test_blocks_chain() {
        let mut clock = NetworkClock::new();
        clock
            .push(build_block(0, [0u8; 32], 0, [0u8; 32], vec![], &miner()).unwrap())
            .unwrap();
        let parent = clock.tip_hash();
        clock
            .push(build_block(1, parent, 600, [0u8; 32], vec![], &miner()).unwrap())
            .unwrap();
        assert_eq!(clock.block_height(), 1);
        assert_eq!(clock.block(1).unwrap().parent_hash, clock.block(0).unwrap().hash);
        assert!(clock.block(2).is_none());
    }

    #[test]
    fn test_rejects_gaps_and_forks() {
        let mut clock = NetworkClock::new();
        clock
            .push(build_block(0, [0u8; 32], 0, [0u8; 32], vec![], &miner()).unwrap())
            .unwrap();
        let gap = build_block(2, clock.tip_hash(), 0, [0u8; 32], vec![], &miner()).unwrap();
        assert!(clock.push(gap).is_err());
        let fork = build_block(1, [7u8; 32], 0, [0u8; 32], vec![], &miner()).unwrap();
        assert!(clock.push(fork).is_err());
        assert_eq!(clock.blocks().len(), 1);
    }
}
