//! A node's view of the block tree.

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    block::{Balances, Block, BlockId},
    node::NodeId,
    transaction::{LedgerEntry, TxnId, COINBASE_REWARD},
};

/// Tree of every block a node has accepted, indexed by height. Several
/// competing blocks may share a height.
///
/// [`Ledger::tip`] is the block the owning node currently mines on and
/// propagates from. It is chosen by [`Ledger::add_block`]: a block opening a
/// new height always becomes the tip, and a block joining the tip's height
/// replaces it only if it was mined strictly earlier.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// Blocks sorted first by height, then by the order they were added.
    blocks_by_height: Vec<Vec<Block>>,
    /// Position of the tip in `blocks_by_height`.
    tip: Option<(usize, usize)>,
}

/// Reasons a received block is rejected. The block is dropped and never
/// reconsidered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("parent block is not known at the previous height")]
    OrphanParent,
    #[error("stored parent hash does not match the known parent")]
    HashMismatch,
    #[error("transaction {0} has already been confirmed")]
    DoubleSpend(TxnId),
    #[error("entry references unknown account {0}")]
    UnknownAccount(NodeId),
    #[error("account {0} ends with a negative balance")]
    NegativeBalance(NodeId),
    #[error("block must open with a single coinbase paying its miner")]
    BadCoinbase,
    #[error("transaction {0} moves more than a balance can hold")]
    AmountOverflow(TxnId),
}

/// Failures of [`Ledger::add_block`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("block {0} is already stored at its height")]
    DuplicateBlock(BlockId),
    #[error("ledger already holds a genesis block")]
    SecondGenesis,
    #[error("height {height} skips past the next open height {next}")]
    HeightGap { height: u64, next: u64 },
}

impl Ledger {
    /// Creates a ledger without any blocks, genesis included.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the block at the tip, if any block has been added.
    #[inline]
    pub fn tip(&self) -> Option<&Block> {
        self.tip.map(|(h, i)| &self.blocks_by_height[h][i])
    }

    /// Height of [`Ledger::tip`], or `None` for an empty ledger.
    #[inline]
    pub fn tip_height(&self) -> Option<u64> {
        self.tip().map(|block| block.height)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks_by_height.is_empty()
    }

    /// Returns the genesis block, if it has been added.
    pub fn genesis(&self) -> Option<&Block> {
        self.at_height(0).first()
    }

    /// Returns all blocks at the given height, in the order they were added.
    #[inline]
    pub fn at_height(&self, height: u64) -> &[Block] {
        self.blocks_by_height
            .get(height as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true iff a block with the given ID is stored at `height`.
    #[inline]
    pub fn contains_at(&self, height: u64, id: BlockId) -> bool {
        self.at_height(height).iter().any(|block| block.id == id)
    }

    /// Returns true iff a block with the given ID is stored at any height.
    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Linear scan over every height.
    pub fn find_by_id(&self, id: BlockId) -> Option<&Block> {
        self.iter().find(|block| block.id == id)
    }

    /// Iterates over all blocks, lowest height first.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks_by_height.iter().flatten()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks_by_height.iter().map(Vec::len).sum()
    }

    /// Returns the IDs of all blocks on the path from the given block to the
    /// genesis block, in ascending order of height and including `id`. The
    /// path stops early if an ancestor is missing from this ledger.
    pub fn ancestors_of(&self, id: BlockId) -> Vec<BlockId> {
        let mut ancestors: Vec<BlockId> =
            self.branch(id).map(|block| block.id).collect();

        ancestors.reverse();
        ancestors
    }

    /// Returns the IDs of the transfers confirmed on the path from the given
    /// block down to the genesis block, `id` included.
    pub fn transfers_on_branch(&self, id: BlockId) -> HashSet<TxnId> {
        self.branch(id)
            .flat_map(|block| block.transfers().map(|txn| txn.id))
            .collect()
    }

    /// Walks from the given block towards genesis, newest first.
    fn branch(&self, id: BlockId) -> impl Iterator<Item = &Block> {
        std::iter::successors(self.find_by_id(id), |block| {
            let parent = block.parent?;
            self.at_height(block.height - 1)
                .iter()
                .find(|b| b.id == parent)
        })
    }

    /// Returns the IDs of the blocks from genesis to [`Ledger::tip`].
    pub fn longest_chain(&self) -> Vec<BlockId> {
        self.tip()
            .map(|tip| self.ancestors_of(tip.id))
            .unwrap_or_default()
    }

    /// Adds the given block to the ledger and updates the tip.
    pub fn add_block(&mut self, block: Block) -> Result<(), LedgerError> {
        use LedgerError::*;

        let height = block.height as usize;
        let next = self.blocks_by_height.len();

        if height > next {
            return Err(HeightGap { height: block.height, next: next as u64 });
        }
        if height == 0 && next > 0 {
            return Err(SecondGenesis);
        }
        if self.contains_at(block.height, block.id) {
            return Err(DuplicateBlock(block.id));
        }

        if height == next {
            self.blocks_by_height.push(vec![block]);
            self.tip = Some((height, 0));
            return Ok(());
        }

        let replaces_tip = self.tip().is_some_and(|tip| {
            tip.height == block.height && block.mine_time < tip.mine_time
        });

        let bucket = &mut self.blocks_by_height[height];
        bucket.push(block);
        if replaces_tip {
            self.tip = Some((height, bucket.len() - 1));
        }

        Ok(())
    }

    /// Checks `block` against its parent and replays its entries on top of the
    /// parent's balances. `used` holds the transactions already confirmed
    /// below the block, usually [`Ledger::transfers_on_branch`] of its parent.
    ///
    /// Returns the balances the block should carry once added.
    pub fn validate(
        &self,
        block: &Block,
        used: &HashSet<TxnId>,
    ) -> Result<Balances, ValidationError> {
        use ValidationError::*;

        let (parent_id, parent_height) = match (block.parent, block.height) {
            (Some(id), h) if h > 0 => (id, h - 1),
            _ => return Err(OrphanParent),
        };
        let parent = self
            .at_height(parent_height)
            .iter()
            .find(|b| b.id == parent_id)
            .ok_or(OrphanParent)?;

        if parent.content_hash() != block.parent_hash {
            return Err(HashMismatch);
        }

        let opens_with_coinbase = matches!(
            block.entries.first(),
            Some(LedgerEntry::Coinbase { miner, .. }) if Some(*miner) == block.miner
        );
        let single_coinbase = block
            .entries
            .iter()
            .skip(1)
            .all(|entry| entry.as_transfer().is_some());
        if !(opens_with_coinbase && single_coinbase) {
            return Err(BadCoinbase);
        }

        let mut balance = parent.balance.clone().ok_or(OrphanParent)?;
        let mut seen = HashSet::new();

        for entry in &block.entries {
            match entry {
                LedgerEntry::Coinbase { miner, .. } => {
                    *balance
                        .get_mut(miner.get())
                        .ok_or(UnknownAccount(*miner))? += COINBASE_REWARD;
                }
                LedgerEntry::Transfer(txn) => {
                    if used.contains(&txn.id) || !seen.insert(txn.id) {
                        return Err(DoubleSpend(txn.id));
                    }

                    let amount = i64::try_from(txn.amount)
                        .map_err(|_| AmountOverflow(txn.id))?;
                    *balance
                        .get_mut(txn.sender.get())
                        .ok_or(UnknownAccount(txn.sender))? -= amount;
                    *balance
                        .get_mut(txn.receiver.get())
                        .ok_or(UnknownAccount(txn.receiver))? += amount;
                }
            }
        }

        if let Some(account) = balance.iter().position(|&b| b < 0) {
            return Err(NegativeBalance(account.into()));
        }

        Ok(balance)
    }
}
