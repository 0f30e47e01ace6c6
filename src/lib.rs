/*!
Discrete-event simulator of a peer-to-peer cryptocurrency network.

Nodes exchange transactions and mine blocks over a random topology with
randomized link latency, and each node follows a longest-chain rule over its
own view of the block tree. Nodes running a withholding
[`Strategy`](miner::Strategy), such as [`Selfish`](miner::Selfish), keep a
private ledger and release blocks strategically.

```
use p2p_sim::prelude::*;

let results = SimulationBuilder::new()
    .node_count(8)
    .duration(200.0)
    .add_attacker(Selfish::new())
    .attacker_powers([0.3])
    .build()
    .unwrap()
    .run_all()
    .unwrap()
    .all()
    .build();

println!("{}", results);
```
*/

// ## Todo:
// - Let the reference ledger used for metrics be chosen by the caller
// - Model attackers which share a private ledger

pub mod block;
pub mod event;
pub mod latency;
pub mod ledger;
pub mod miner;
pub mod node;
pub mod power;
pub mod prelude;
pub mod results;
pub mod simulation;
pub mod topology;
pub mod transaction;

pub(crate) mod utils;
