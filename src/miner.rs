/*!
Definitions for mining strategies

A strategy is any type which implements the [`Strategy`] trait. Strategies
decide whether a node publishes the blocks it mines right away, and when a
node that withholds blocks reveals them.

# Examples
A strategy which withholds every block and never reveals any of them.

```
use p2p_sim::prelude::*;

#[derive(Debug, Clone, Default)]
struct Hoarder;

impl Strategy for Hoarder {
    fn name(&self) -> String {
        "Hoarder".to_string()
    }

    fn set_id(&mut self, _id: NodeId) {}

    fn withholds(&self) -> bool {
        true
    }

    fn on_foreign_block(&mut self, _public: &Ledger, _private: &Ledger) -> Action {
        Action::Wait
    }
}
```

# Built-In Strategies
- Honest Mining [`honest::Honest`]
- Selfish Mining [`selfish::Selfish`]
*/

use std::fmt::Debug;

use crate::{block::BlockId, ledger::Ledger, node::NodeId};

pub mod honest;
pub mod selfish;

pub use honest::Honest;
pub use selfish::Selfish;

/// An action taken by a withholding node before it admits a block mined by
/// someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Don't reveal any blocks.
    Wait,
    /// Reveal the given block from the private ledger.
    Reveal(BlockId),
    /// Reveal the given blocks from the private ledger, in order.
    RevealSet(Vec<BlockId>),
}

impl Action {
    /// IDs of the blocks to reveal, in reveal order.
    pub fn into_blocks(self) -> Vec<BlockId> {
        match self {
            Self::Wait => vec![],
            Self::Reveal(id) => vec![id],
            Self::RevealSet(ids) => ids,
        }
    }
}

/// Defines the behavior of a mining strategy.
pub trait Strategy: Debug + dyn_clone::DynClone + Send + Sync {
    /// Returns the name of this strategy.
    fn name(&self) -> String;

    /// Sets the [`NodeId`] of the node running this strategy.
    ///
    /// Called once, when the node is created.
    fn set_id(&mut self, id: NodeId);

    /// Whether mined blocks are kept on a private ledger instead of being
    /// published. Nodes whose strategy withholds own a second, private
    /// [`Ledger`].
    fn withholds(&self) -> bool;

    /// Returns the blocks to reveal before a validated block mined by another
    /// node is admitted. `public` and `private` are the node's ledgers as they
    /// stand before admission.
    ///
    /// Only called for strategies which withhold.
    fn on_foreign_block(&mut self, public: &Ledger, private: &Ledger)
        -> Action;
}

dyn_clone::clone_trait_object!(Strategy);
