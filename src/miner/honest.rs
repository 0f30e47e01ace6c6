//! Honest mining strategy

use crate::{
    ledger::Ledger,
    miner::{Action, Strategy},
    node::NodeId,
};

/// Publishes all blocks as soon as they are mined, at the tip of the ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct Honest;

impl Honest {
    /// Creates a new honest strategy.
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for Honest {
    fn name(&self) -> String {
        "Honest".into()
    }

    fn set_id(&mut self, _id: NodeId) {}

    fn withholds(&self) -> bool {
        false
    }

    fn on_foreign_block(
        &mut self,
        _public: &Ledger,
        _private: &Ledger,
    ) -> Action {
        Action::Wait
    }
}
