//! Blocks and the identifiers used to link them into a tree.

use std::{
    collections::hash_map::DefaultHasher,
    fmt::Display,
    hash::{Hash, Hasher},
};

use crate::{
    node::NodeId,
    transaction::{LedgerEntry, Transaction, TxnId, TXN_SIZE_BITS},
};

/// Maximum abstract size of a block, in bits.
pub const MAX_BLOCK_SIZE_BITS: u64 = 8_000_000;

/// Balance vector indexed by [`NodeId`].
pub type Balances = Vec<i64>;

/// A unique identifier assigned to each [`Block`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u64);

impl BlockId {
    /// Returns the [`u64`] corresponding to this [`BlockId`].
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Opaque content hash of a block. Children store the hash of their parent so
/// that a receiver can tell whether its copy of the parent is the one the
/// miner built on.
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHash(u64);

/// Representation of a mined block of transactions.
///
/// Everything except `mine_time` and `balance` is fixed when the block is
/// built. `mine_time` is stamped by the miner when mining completes, and
/// `balance` by each receiving node once the block validates.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    /// `None` only for the genesis block.
    pub parent: Option<BlockId>,
    /// Distance from the genesis block.
    pub height: u64,
    /// `None` only for the genesis block.
    pub miner: Option<NodeId>,
    /// Coinbase entry first, followed by zero or more transfers.
    pub entries: Vec<LedgerEntry>,
    pub parent_hash: BlockHash,
    pub mine_time: f64,
    /// Balances after replaying this block on top of its ancestors.
    pub balance: Option<Balances>,
}

impl Block {
    /// Creates the genesis block, granting `initial` units to each of
    /// `num_nodes` nodes.
    pub fn genesis(id: BlockId, num_nodes: usize, initial: i64) -> Self {
        Block {
            id,
            parent: None,
            height: 0,
            miner: None,
            entries: vec![],
            parent_hash: BlockHash::default(),
            mine_time: 0.0,
            balance: Some(vec![initial; num_nodes]),
        }
    }

    /// Creates an unmined child of `parent` holding only a coinbase entry
    /// for `miner`.
    pub fn child_of(
        parent: &Block,
        id: BlockId,
        miner: NodeId,
        coinbase: TxnId,
    ) -> Self {
        Block {
            id,
            parent: Some(parent.id),
            height: parent.height + 1,
            miner: Some(miner),
            entries: vec![LedgerEntry::Coinbase { id: coinbase, miner }],
            parent_hash: parent.content_hash(),
            mine_time: 0.0,
            balance: None,
        }
    }

    #[inline]
    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }

    /// Appends a transfer, unless doing so would exceed
    /// [`MAX_BLOCK_SIZE_BITS`]. Returns whether the transfer was added.
    pub fn push_transfer(&mut self, txn: Transaction) -> bool {
        if self.size_bits() + TXN_SIZE_BITS > MAX_BLOCK_SIZE_BITS {
            return false;
        }
        self.entries.push(LedgerEntry::Transfer(txn));

        true
    }

    /// Number of entries, coinbase included.
    #[inline]
    pub fn txn_count(&self) -> usize {
        self.entries.len()
    }

    /// Abstract size used by the latency model.
    #[inline]
    pub fn size_bits(&self) -> u64 {
        (self.entries.len().max(1) as u64) * TXN_SIZE_BITS
    }

    pub fn transfers(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().filter_map(LedgerEntry::as_transfer)
    }

    /// Derives this block's [`BlockHash`] from its immutable fields.
    pub fn content_hash(&self) -> BlockHash {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.parent.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.miner.hash(&mut hasher);
        self.parent_hash.hash(&mut hasher);
        for entry in &self.entries {
            entry.id().hash(&mut hasher);
        }

        BlockHash(hasher.finish())
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(id: u64) -> Transaction {
        Transaction {
            id: id.into(),
            sender: 0.into(),
            receiver: 1.into(),
            amount: 1,
        }
    }

    #[test]
    fn child_links_to_parent() {
        let genesis = Block::genesis(0.into(), 3, 50);
        let child = Block::child_of(&genesis, 1.into(), 2.into(), 10.into());

        assert!(genesis.is_genesis());
        assert_eq!(child.parent, Some(genesis.id));
        assert_eq!(child.height, 1);
        assert_eq!(child.parent_hash, genesis.content_hash());
        assert_eq!(child.txn_count(), 1);
    }

    #[test]
    fn hash_ignores_mutable_fields() {
        let genesis = Block::genesis(0.into(), 3, 50);
        let mut child = Block::child_of(&genesis, 1.into(), 2.into(), 10.into());
        let before = child.content_hash();

        child.mine_time = 12.5;
        child.balance = Some(vec![1, 2, 3]);
        assert_eq!(before, child.content_hash());

        child.push_transfer(transfer(11));
        assert_ne!(before, child.content_hash());
    }

    #[test]
    fn size_ceiling_is_enforced() {
        let genesis = Block::genesis(0.into(), 2, 50);
        let mut block = Block::child_of(&genesis, 1.into(), 0.into(), 0.into());

        let added = (1..=2_000).take_while(|&i| block.push_transfer(transfer(i)));
        assert_eq!(added.count(), 999);
        assert_eq!(block.size_bits(), MAX_BLOCK_SIZE_BITS);
    }
}
