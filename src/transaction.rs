//! Transfers and coinbase entries carried by blocks.

use std::fmt::Display;

use crate::node::NodeId;

/// Units minted to the miner of each non-genesis block.
pub const COINBASE_REWARD: i64 = 50;

/// Abstract size of a single transaction or coinbase entry, in bits.
pub const TXN_SIZE_BITS: u64 = 8_000;

/// Unique identifier of a [`Transaction`] or coinbase entry.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub(crate) u64);

impl TxnId {
    /// Returns the [`u64`] corresponding to this [`TxnId`].
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TxnId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A payment of `amount` units from `sender` to `receiver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TxnId,
    pub sender: NodeId,
    pub receiver: NodeId,
    pub amount: u64,
}

impl Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} pays {} {} coins",
            self.id, self.sender, self.receiver, self.amount
        )
    }
}

/// An entry of a block, replayed in order when computing balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Mints [`COINBASE_REWARD`] units to `miner`.
    Coinbase { id: TxnId, miner: NodeId },
    /// Moves units between two nodes.
    Transfer(Transaction),
}

impl LedgerEntry {
    pub fn id(&self) -> TxnId {
        match self {
            Self::Coinbase { id, .. } => *id,
            Self::Transfer(txn) => txn.id,
        }
    }

    /// Returns the wrapped transfer, if this entry is one.
    pub fn as_transfer(&self) -> Option<&Transaction> {
        match self {
            Self::Coinbase { .. } => None,
            Self::Transfer(txn) => Some(txn),
        }
    }
}

impl Display for LedgerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coinbase { id, miner } => {
                write!(f, "{}: {} mines {} coins", id, miner, COINBASE_REWARD)
            }
            Self::Transfer(txn) => write!(f, "{}", txn),
        }
    }
}
