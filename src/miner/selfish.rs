//! Selfish mining implementation

use crate::{
    ledger::Ledger,
    miner::{Action, Strategy},
    node::NodeId,
};

/// Follows the selfish mining strategy described by
/// [Eyal and Sirer](https://doi.org/10.48550/arXiv.1311.0243).
///
/// Mined blocks are withheld. When another node's block arrives, the lead of
/// the private ledger over the public one decides what is revealed first:
///
/// | lead | revealed                                              |
/// |------|-------------------------------------------------------|
/// | ≤ 0  | nothing                                               |
/// | 1    | the private tip                                       |
/// | 2    | the private tip's parent, then the private tip        |
/// | ≥ 3  | the own block directly above the public tip           |
#[derive(Debug, Clone, Default)]
pub struct Selfish {
    id: NodeId,
}

impl Selfish {
    /// Creates a new selfish strategy.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for Selfish {
    fn name(&self) -> String {
        "Selfish".into()
    }

    fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    fn withholds(&self) -> bool {
        true
    }

    fn on_foreign_block(
        &mut self,
        public: &Ledger,
        private: &Ledger,
    ) -> Action {
        let (Some(public_height), Some(private_tip)) =
            (public.tip_height(), private.tip())
        else {
            return Action::Wait;
        };

        match private_tip.height.saturating_sub(public_height) {
            0 => Action::Wait,
            1 => Action::Reveal(private_tip.id),
            2 => match private_tip.parent {
                Some(parent) => Action::RevealSet(vec![parent, private_tip.id]),
                None => Action::Reveal(private_tip.id),
            },
            // Several own blocks can share a height after a private fork;
            // the earliest mined one is revealed.
            _ => private
                .at_height(public_height + 1)
                .iter()
                .filter(|block| block.miner == Some(self.id))
                .min_by(|a, b| a.mine_time.total_cmp(&b.mine_time))
                .map_or(Action::Wait, |block| Action::Reveal(block.id)),
        }
    }
}
