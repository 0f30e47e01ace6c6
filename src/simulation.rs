//! Building/running simulations and analyzing the resulting data

use std::num::NonZeroUsize;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{info, trace, warn};

use crate::{
    block::Block,
    event::{Event, EventKind, EventQueue, QueueError, Time},
    latency::LatencyModel,
    ledger::Ledger,
    miner::{Honest, Strategy},
    node::{ArrivalRecord, Context, IdGenerator, Neighbor, Node, NodeId},
    power::{PowerDistribution, PowerError, PowerValue},
    results::ResultsBuilder,
    topology::Topology,
    transaction::COINBASE_REWARD,
    utils::sample_exponential,
};

pub mod builder;

pub use builder::{SimulationBuildError, SimulationBuilder};

/// Network parameters shared by every simulation in a group.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Total number of nodes, attackers included.
    pub node_count: usize,
    /// Fraction of honest nodes on slow links.
    pub slow_fraction: f64,
    /// Fraction of honest nodes with low mining power.
    pub low_power_fraction: f64,
    /// Mean time between transactions across the whole network.
    pub mean_txn_interval: Time,
    /// Mean time between blocks across the whole network.
    pub mean_block_interval: Time,
    /// Simulated time after which only in-flight blocks are delivered.
    pub duration: Time,
}

/// Container for a group of simulations which run on the same network
/// parameters and attackers. Simulations should be run using this struct's
/// `run_all` method.
#[derive(Debug, Clone)]
pub struct SimulationGroup {
    config: SimulationConfig,
    attackers: Vec<Box<dyn Strategy>>,
    power_dists: Vec<PowerDistribution>,
    repeat_all: NonZeroUsize,
    seed: u64,
}

impl SimulationGroup {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Splits the group into its individual runs. Each power distribution is
    /// repeated `repeat_all` times, and run `i` is seeded with `seed + i`.
    pub fn into_simulations(self) -> Vec<Simulation> {
        let SimulationGroup {
            config,
            attackers,
            power_dists,
            repeat_all,
            seed,
        } = self;

        power_dists
            .into_iter()
            .flat_map(|power_dist| vec![power_dist; repeat_all.get()])
            .enumerate()
            .map(|(i, power_dist)| Simulation {
                config: config.clone(),
                attackers: attackers.clone(),
                power_dist,
                seed: seed.wrapping_add(i as u64),
            })
            .collect()
    }

    /// Runs every simulation in the group, in parallel when the `rayon`
    /// feature is enabled.
    pub fn run_all(self) -> Result<ResultsBuilder, SimulationError> {
        let repeat_all = self.repeat_all;
        let sims = self.into_simulations();

        #[cfg(feature = "rayon")]
        let outputs: Result<_, _> =
            sims.into_par_iter().map(Simulation::run).collect();
        #[cfg(not(feature = "rayon"))]
        let outputs: Result<_, _> =
            sims.into_iter().map(Simulation::run).collect();

        Ok(ResultsBuilder::new(outputs?, repeat_all))
    }
}

/// A single run of the network.
///
/// # Details
/// Honest nodes take IDs `0..h` and attackers take the remaining IDs, in the
/// order they were added. The genesis block reaches node 0 at time 0 and
/// floods from there. Once the next event lies past the configured duration,
/// only pending block deliveries are still dispatched.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    attackers: Vec<Box<dyn Strategy>>,
    power_dist: PowerDistribution,
    seed: u64,
}

/// Counts of dispatched events by kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventStats {
    pub txns_generated: usize,
    pub txns_received: usize,
    pub blocks_mined: usize,
    pub blocks_received: usize,
    /// Block deliveries dispatched after the configured duration.
    pub drained: usize,
    /// Events left undispatched after the configured duration.
    pub discarded: usize,
}

impl EventStats {
    fn record(&mut self, kind: &EventKind) {
        match kind {
            EventKind::TxnGenerate => self.txns_generated += 1,
            EventKind::TxnReceive(_) => self.txns_received += 1,
            EventKind::BlockMine(_) => self.blocks_mined += 1,
            EventKind::BlockReceive(_) => self.blocks_received += 1,
        }
    }

    /// Total number of dispatched events.
    pub fn dispatched(&self) -> usize {
        self.txns_generated
            + self.txns_received
            + self.blocks_mined
            + self.blocks_received
    }
}

/// Contains the output data from a simulation.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub config: SimulationConfig,
    pub power_dist: PowerDistribution,
    pub seed: u64,
    pub nodes: Vec<Node>,
    pub topology: Topology,
    pub stats: EventStats,
    /// Simulated time of the last dispatched event.
    pub end_time: Time,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid mining power distribution")]
    PowerError(#[from] PowerError),
    #[error(transparent)]
    QueueError(#[from] QueueError),
}

impl Simulation {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn power_dist(&self) -> &PowerDistribution {
        &self.power_dist
    }

    /// Executes the configured simulation.
    pub fn run(self) -> Result<SimulationOutput, SimulationError> {
        let Simulation {
            config,
            attackers,
            power_dist,
            seed,
        } = self;

        info!(
            seed,
            nodes = config.node_count,
            attackers = attackers.len(),
            duration = config.duration,
            "Simulation started"
        );

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut queue = EventQueue::new();
        let mut ids = IdGenerator::new();

        let (mut nodes, topology) =
            create_nodes(&config, attackers, &power_dist, &mut rng)?;
        let latency = if power_dist.attackers().len() >= 2 {
            LatencyModel::sample_per_pair(&mut rng, config.node_count)
        } else {
            LatencyModel::sample_uniform(&mut rng)
        };

        schedule_transactions(&config, &mut queue, &mut rng);
        let genesis = Block::genesis(
            ids.next_block(),
            config.node_count,
            COINBASE_REWARD,
        );
        queue.schedule(Event::new(
            0.0,
            NodeId(0),
            EventKind::BlockReceive(genesis),
        ));

        let mut ctx = Context {
            queue: &mut queue,
            rng: &mut rng,
            ids: &mut ids,
            latency: &latency,
            num_nodes: config.node_count,
            mean_block_interval: config.mean_block_interval,
        };
        let mut stats = EventStats::default();
        let mut end_time = 0.0;

        while ctx.queue.peek_time().is_some_and(|t| t <= config.duration) {
            let event = ctx.queue.pop_earliest()?;
            stats.record(&event.kind);
            end_time = event.time;
            dispatch(&mut nodes, event, &mut ctx);
        }

        // Deliver blocks still in flight. Mining attempts they trigger are
        // scheduled but never completed.
        while !ctx.queue.is_empty() {
            let event = ctx.queue.pop_earliest()?;
            if let EventKind::BlockReceive(_) = event.kind {
                stats.drained += 1;
                end_time = event.time;
                dispatch(&mut nodes, event, &mut ctx);
            } else {
                stats.discarded += 1;
            }
        }

        info!(
            seed,
            events = stats.dispatched(),
            drained = stats.drained,
            end_time,
            "Simulation finished"
        );

        Ok(SimulationOutput {
            config,
            power_dist,
            seed,
            nodes,
            topology,
            stats,
            end_time,
        })
    }
}

/// Marks `floor(fraction * len)` uniformly chosen entries.
fn choose_flags<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    fraction: f64,
) -> Vec<bool> {
    let count = ((fraction * len as f64).floor() as usize).min(len);
    let mut flags = vec![false; len];
    for i in rand::seq::index::sample(rng, len, count) {
        flags[i] = true;
    }
    flags
}

fn create_nodes(
    config: &SimulationConfig,
    attackers: Vec<Box<dyn Strategy>>,
    power_dist: &PowerDistribution,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<Node>, Topology), PowerError> {
    let num_honest = config.node_count - attackers.len();

    let slow = choose_flags(rng, num_honest, config.slow_fraction);
    let low_power = choose_flags(rng, num_honest, config.low_power_fraction);
    let high_power: Vec<bool> = low_power.iter().map(|&low| !low).collect();
    let shares = power_dist.shares(&high_power)?;

    let honest = (0..num_honest).map(|i| {
        Node::new(
            NodeId(i),
            slow[i],
            high_power[i],
            shares[i],
            Box::new(Honest::new()),
        )
    });
    // Attackers are fast and count as high power.
    let withholding = attackers.into_iter().enumerate().map(|(k, strategy)| {
        let i = num_honest + k;
        Node::new(NodeId(i), false, true, shares[i], strategy)
    });
    let mut nodes: Vec<Node> = honest.chain(withholding).collect();

    let topology = Topology::build(rng, config.node_count);
    let slow_flags: Vec<bool> = nodes.iter().map(Node::is_slow).collect();
    for node in nodes.iter_mut() {
        let neighbors = topology
            .neighbors(node.id())
            .iter()
            .map(|&id| Neighbor { id, slow: slow_flags[id.get()] })
            .collect();
        node.set_neighbors(neighbors);
    }

    Ok((nodes, topology))
}

/// Pre-schedules every transaction generation up to the configured
/// duration, each at a uniformly chosen node.
fn schedule_transactions(
    config: &SimulationConfig,
    queue: &mut EventQueue,
    rng: &mut ChaCha8Rng,
) {
    let mut time = 0.0;
    while time <= config.duration {
        let target = NodeId(rng.gen_range(0..config.node_count));
        queue.schedule(Event::new(time, target, EventKind::TxnGenerate));
        time += sample_exponential(rng, config.mean_txn_interval);
    }
}

fn dispatch(nodes: &mut [Node], event: Event, ctx: &mut Context) {
    let Event { time, target, kind } = event;
    trace!(time, node = %target, event = kind.name(), "Dispatching event");

    let Some(node) = nodes.get_mut(target.get()) else {
        warn!(node = %target, "Event addressed to unknown node");
        return;
    };

    match kind {
        EventKind::TxnGenerate => node.generate_transaction(time, ctx),
        EventKind::TxnReceive(txn) => node.receive_transaction(txn, time, ctx),
        EventKind::BlockMine(block) => node.mine_block(time, block, ctx),
        EventKind::BlockReceive(block) => node.receive_block(time, block, ctx),
    }
}

impl SimulationOutput {
    /// Number of withholding nodes.
    pub fn num_attackers(&self) -> usize {
        self.power_dist.attackers().len()
    }

    /// Node running the `k`th attacker added to the builder (0-based).
    pub fn attacker(&self, k: usize) -> Option<&Node> {
        let first = self.config.node_count - self.num_attackers();
        self.nodes.get(first + k).filter(|_| k < self.num_attackers())
    }

    /// Fraction of the network's mining power held by each node.
    pub fn shares(&self) -> Vec<PowerValue> {
        self.nodes.iter().map(Node::hashing_share).collect()
    }

    /// Ledger used to judge the outcome of the run: the public ledger of
    /// node 0, which is always honest.
    pub fn reference_ledger(&self) -> &Ledger {
        self.nodes[0].ledger()
    }

    /// Number of non-genesis blocks on the reference ledger's longest chain.
    pub fn longest_chain_length(&self) -> usize {
        self.reference_ledger().longest_chain().len().saturating_sub(1)
    }

    /// Number of non-genesis blocks in the reference ledger's block tree.
    pub fn blocks_in_tree(&self) -> usize {
        self.reference_ledger().num_blocks().saturating_sub(1)
    }

    /// Number of blocks on the reference longest chain mined by `miner`.
    pub fn chain_blocks_by(&self, miner: NodeId) -> usize {
        self.chain_blocks_where(|id| id == miner)
    }

    /// Number of blocks `miner` has mined and admitted to its own view.
    pub fn blocks_mined_by(&self, miner: NodeId) -> usize {
        self.nodes.get(miner.get()).map_or(0, |node| {
            node.mining_ledger()
                .iter()
                .filter(|block| block.miner == Some(miner))
                .count()
        })
    }

    /// Longest chain length over blocks in tree. Zero if no block was mined.
    pub fn mpu_overall(&self) -> f64 {
        ratio(self.longest_chain_length(), self.blocks_in_tree())
    }

    /// Blocks of the `k`th attacker on the longest chain over blocks it mined.
    /// Zero if it mined none.
    pub fn mpu_adversary(&self, k: usize) -> f64 {
        self.attacker(k).map_or(0.0, |node| {
            ratio(
                self.chain_blocks_by(node.id()),
                self.blocks_mined_by(node.id()),
            )
        })
    }

    /// Fraction of the longest chain mined by the `k`th attacker.
    pub fn attacker_chain_share(&self, k: usize) -> f64 {
        self.attacker(k).map_or(0.0, |node| {
            ratio(self.chain_blocks_by(node.id()), self.longest_chain_length())
        })
    }

    /// Fraction of the longest chain mined by honest nodes of the given power
    /// class.
    pub fn honest_chain_share(&self, high_power: bool) -> f64 {
        let blocks = self.chain_blocks_where(|id| {
            self.nodes.get(id.get()).is_some_and(|node| {
                !node.is_attacker() && node.is_high_power() == high_power
            })
        });
        ratio(blocks, self.longest_chain_length())
    }

    /// Renders the arrival records of `node` as CSV, header first.
    pub fn arrival_csv(&self, node: NodeId) -> Option<String> {
        let node = self.nodes.get(node.get())?;
        let mut csv = String::from(ArrivalRecord::CSV_HEADER);
        for record in node.arrivals() {
            csv.push('\n');
            csv.push_str(&record.to_string());
        }
        Some(csv)
    }

    fn chain_blocks_where<F>(&self, pred: F) -> usize
    where
        F: Fn(NodeId) -> bool,
    {
        let ledger = self.reference_ledger();
        ledger
            .longest_chain()
            .into_iter()
            .filter_map(|id| ledger.find_by_id(id)?.miner)
            .filter(|&miner| pred(miner))
            .count()
    }
}

#[inline]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::Selfish;

    fn honest_network(seed: u64) -> SimulationOutput {
        let mut sims = SimulationBuilder::new()
            .node_count(12)
            .slow_fraction(0.5)
            .low_power_fraction(0.5)
            .mean_txn_interval(2.0)
            .mean_block_interval(10.0)
            .duration(300.0)
            .seed(seed)
            .build()
            .unwrap()
            .into_simulations();

        assert_eq!(sims.len(), 1);
        sims.remove(0).run().unwrap()
    }

    fn selfish_network(power: PowerValue) -> SimulationOutput {
        SimulationBuilder::new()
            .node_count(10)
            .mean_txn_interval(5.0)
            .mean_block_interval(10.0)
            .duration(400.0)
            .add_attacker(Selfish::new())
            .attacker_powers([power])
            .seed(11)
            .build()
            .unwrap()
            .into_simulations()
            .remove(0)
            .run()
            .unwrap()
    }

    #[test]
    fn runs_are_reproducible() {
        let a = honest_network(5);
        let b = honest_network(5);

        assert_eq!(a.stats, b.stats);
        for node in (0..12).map(NodeId) {
            assert_eq!(a.arrival_csv(node), b.arrival_csv(node));
        }
    }

    #[test]
    fn every_node_adopts_genesis_first() {
        let output = honest_network(1);

        assert!(output.topology.is_connected());
        for node in &output.nodes {
            let first = &node.arrivals()[0];
            assert_eq!(first.height, 0);
            assert_eq!(first.miner, None);
            assert_eq!(node.arrivals().len(), node.ledger().num_blocks());
        }
    }

    #[test]
    fn balances_are_conserved_and_non_negative() {
        let output = honest_network(2);
        let n = output.config.node_count as i64;

        for node in &output.nodes {
            for block in node.ledger().iter() {
                let balance = block.balance.as_ref().unwrap();
                assert!(balance.iter().all(|&b| b >= 0));
                assert_eq!(
                    balance.iter().sum::<i64>(),
                    COINBASE_REWARD * (n + block.height as i64)
                );
            }
        }
    }

    #[test]
    fn honest_metrics_are_consistent() {
        let output = honest_network(3);

        assert!(output.longest_chain_length() > 0);
        assert!(output.longest_chain_length() <= output.blocks_in_tree());
        assert!(output.mpu_overall() > 0.0 && output.mpu_overall() <= 1.0);
        assert_eq!(output.num_attackers(), 0);
        assert_eq!(output.mpu_adversary(0), 0.0);

        let shares = output.honest_chain_share(true)
            + output.honest_chain_share(false);
        assert!((shares - 1.0).abs() < 1e-9);
        assert!((output.shares().iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn selfish_attacker_keeps_private_view_ahead() {
        let output = selfish_network(0.4);
        let attacker = output.attacker(0).unwrap();

        assert!(attacker.is_attacker());
        assert_eq!(attacker.id(), NodeId(9));
        assert_eq!(attacker.hashing_share(), 0.4);

        let private = attacker.private_ledger().unwrap();
        assert!(private.tip_height() >= attacker.ledger().tip_height());
        assert_eq!(attacker.arrivals().len(), private.num_blocks());

        let mpu = output.mpu_adversary(0);
        assert!((0.0..=1.0).contains(&mpu));
        assert!(output.blocks_mined_by(attacker.id()) > 0);
    }

    #[test]
    fn withheld_blocks_reach_the_honest_chain() {
        let output = SimulationBuilder::new()
            .node_count(20)
            .mean_txn_interval(2.0)
            .mean_block_interval(10.0)
            .duration(1000.0)
            .add_attacker(Selfish::new())
            .attacker_powers([0.3])
            .seed(0)
            .build()
            .unwrap()
            .into_simulations()
            .remove(0)
            .run()
            .unwrap();
        let attacker = output.attacker(0).unwrap();
        let private = attacker.private_ledger().unwrap();

        // Honest blocks sharing transfers with withheld ones are still
        // admitted, so the attacker keeps following the public chain.
        let reference = output.reference_ledger().longest_chain();
        let followed =
            reference.iter().filter(|&&id| private.contains(id)).count();
        assert!(followed * 10 >= reference.len() * 9);

        let revealed = attacker
            .ledger()
            .iter()
            .filter(|block| block.miner == Some(attacker.id()))
            .count();
        assert!(revealed > 0);
        assert!(output.chain_blocks_by(attacker.id()) > 0);
        assert!(output.attacker_chain_share(0) > 0.0);
        assert!(output.mpu_adversary(0) > 0.0);
    }

    #[test]
    fn repeats_get_consecutive_seeds() {
        let sims = SimulationBuilder::new()
            .add_attacker(Selfish::new())
            .attacker_power_iter([0.1, 0.2])
            .repeat_all(3)
            .seed(40)
            .build()
            .unwrap()
            .into_simulations();

        let seeds: Vec<_> = sims.iter().map(Simulation::seed).collect();
        assert_eq!(seeds, vec![40, 41, 42, 43, 44, 45]);
        assert_eq!(sims[2].power_dist().attackers(), &[0.1]);
        assert_eq!(sims[3].power_dist().attackers(), &[0.2]);
    }

    #[test]
    fn arrival_csv_starts_with_header() {
        let output = honest_network(4);
        let csv = output.arrival_csv(NodeId(3)).unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(ArrivalRecord::CSV_HEADER));
        assert!(lines.next().unwrap().starts_with("0,-1,0,0,0,"));
        assert_eq!(output.arrival_csv(NodeId(99)), None);
    }
}
