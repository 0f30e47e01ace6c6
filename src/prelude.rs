/*!
Re-export of common values and datatypes used for running and analyzing
simulations. Must be imported manually.

```
use p2p_sim::prelude::*;
```
*/

use crate::{
    block, event, ledger, miner, node, power, results, simulation, transaction,
};

pub use block::{Block, BlockId};

pub use event::Time;

pub use ledger::{Ledger, LedgerError, ValidationError};

pub use miner::{honest::Honest, selfish::Selfish, Action, Strategy};

pub use node::{ArrivalRecord, Node, NodeId};

pub use power::{Percent, PowerDistribution, PowerError, PowerValue};

pub use results::{
    selfish_revenue, Average, Format, ResultsBuilder, ResultsTable,
};

pub use simulation::{
    SimulationBuildError, SimulationBuilder, SimulationError, SimulationGroup,
    SimulationOutput,
};

pub use transaction::{LedgerEntry, Transaction, TxnId};
