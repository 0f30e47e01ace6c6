/*!
Network participants

A [`Node`] owns its ledger(s), its transaction pool, and the list of its
neighbors. Nodes never read each other's state: every reaction to an event is
expressed as new events scheduled through the [`Context`] they are handed.
*/

use std::{collections::HashSet, fmt::Display};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

use crate::{
    block::{Block, BlockId},
    event::{Event, EventKind, EventQueue, Time},
    latency::LatencyModel,
    ledger::Ledger,
    miner::Strategy,
    power::PowerValue,
    transaction::{Transaction, TxnId, COINBASE_REWARD, TXN_SIZE_BITS},
    utils::sample_exponential,
};

/// Largest amount a generated transaction can carry.
pub const MAX_TXN_AMOUNT: u64 = 5;

/// Unique identifier of a [`Node`]. Doubles as the node's index into balance
/// vectors.
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the [`usize`] corresponding to this [`NodeId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for NodeId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A directly connected peer, along with whether its link is slow. Knowing
/// the flag lets a sender pick a link rate without asking the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub id: NodeId,
    pub slow: bool,
}

/// Record appended each time a node admits a block.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalRecord {
    pub height: u64,
    /// `None` for the genesis block.
    pub miner: Option<NodeId>,
    pub block_id: BlockId,
    pub txn_count: usize,
    pub mine_time: Time,
    pub arrival_time: Time,
}

impl ArrivalRecord {
    /// Column names matching the [`Display`] output of a record.
    pub const CSV_HEADER: &'static str =
        "block_index,miner_id,block_id,num_of_txns,mine_time,arrival_time";
}

impl Display for ArrivalRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.miner {
            Some(miner) => write!(f, "{},{},", self.height, miner)?,
            None => write!(f, "{},-1,", self.height)?,
        }
        write!(
            f,
            "{},{},{},{}",
            self.block_id, self.txn_count, self.mine_time, self.arrival_time
        )
    }
}

/// Hands out transaction and block IDs that are unique across a simulation.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    txns: u64,
    blocks: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_txn(&mut self) -> TxnId {
        let id = TxnId(self.txns);
        self.txns += 1;
        id
    }

    pub fn next_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks);
        self.blocks += 1;
        id
    }
}

/// Shared simulation state a node may use while handling an event.
#[derive(Debug)]
pub struct Context<'a> {
    pub queue: &'a mut EventQueue,
    pub rng: &'a mut ChaCha8Rng,
    pub ids: &'a mut IdGenerator,
    pub latency: &'a LatencyModel,
    pub num_nodes: usize,
    /// Mean time between blocks across the whole network.
    pub mean_block_interval: Time,
}

/// A participant in the peer-to-peer network.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    slow: bool,
    high_power: bool,
    /// Fraction of the network's mining power held by this node.
    hashing_share: PowerValue,
    neighbors: Vec<Neighbor>,
    /// Received transactions not yet confirmed, in arrival order.
    pool: Vec<Transaction>,
    pooled: HashSet<TxnId>,
    /// Every entry ever confirmed by an admitted block.
    used: HashSet<TxnId>,
    /// Blocks as published to the network.
    ledger: Ledger,
    /// Full view of a withholding node, unrevealed blocks included.
    private: Option<Ledger>,
    strategy: Box<dyn Strategy>,
    /// Parent of the most recently scheduled mining attempt.
    mining_on: Option<BlockId>,
    arrivals: Vec<ArrivalRecord>,
}

impl Node {
    pub fn new(
        id: NodeId,
        slow: bool,
        high_power: bool,
        hashing_share: PowerValue,
        mut strategy: Box<dyn Strategy>,
    ) -> Self {
        strategy.set_id(id);
        let private = strategy.withholds().then(Ledger::new);

        Node {
            id,
            slow,
            high_power,
            hashing_share,
            neighbors: vec![],
            pool: vec![],
            pooled: HashSet::new(),
            used: HashSet::new(),
            ledger: Ledger::new(),
            private,
            strategy,
            mining_on: None,
            arrivals: vec![],
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn is_slow(&self) -> bool {
        self.slow
    }

    #[inline]
    pub fn is_high_power(&self) -> bool {
        self.high_power
    }

    #[inline]
    pub fn hashing_share(&self) -> PowerValue {
        self.hashing_share
    }

    /// Whether this node withholds the blocks it mines.
    #[inline]
    pub fn is_attacker(&self) -> bool {
        self.private.is_some()
    }

    pub fn strategy_name(&self) -> String {
        self.strategy.name()
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn set_neighbors(&mut self, neighbors: Vec<Neighbor>) {
        self.neighbors = neighbors;
    }

    /// Pending transactions, in arrival order.
    pub fn pool(&self) -> &[Transaction] {
        &self.pool
    }

    /// Returns true iff an admitted block has confirmed `txn`.
    pub fn is_used(&self, txn: TxnId) -> bool {
        self.used.contains(&txn)
    }

    /// The public ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The private ledger, for nodes which withhold blocks.
    pub fn private_ledger(&self) -> Option<&Ledger> {
        self.private.as_ref()
    }

    /// The ledger this node validates against and mines on: the private one
    /// if it exists, otherwise the public one.
    pub fn mining_ledger(&self) -> &Ledger {
        self.private.as_ref().unwrap_or(&self.ledger)
    }

    /// Every block admission so far, in order.
    pub fn arrivals(&self) -> &[ArrivalRecord] {
        &self.arrivals
    }

    /// Creates a transaction paying a random other node and handles it as if
    /// it had just been received.
    pub fn generate_transaction(&mut self, now: Time, ctx: &mut Context) {
        let mut receiver = ctx.rng.gen_range(0..ctx.num_nodes - 1);
        if receiver >= self.id.0 {
            receiver += 1;
        }

        let txn = Transaction {
            id: ctx.ids.next_txn(),
            sender: self.id,
            receiver: receiver.into(),
            amount: ctx.rng.gen_range(0..=MAX_TXN_AMOUNT),
        };
        trace!(node = %self.id, txn = %txn, "Transaction generated");

        self.receive_transaction(txn, now, ctx);
    }

    /// Pools an unseen transaction and forwards it to every neighbor.
    pub fn receive_transaction(
        &mut self,
        txn: Transaction,
        now: Time,
        ctx: &mut Context,
    ) {
        if self.pooled.contains(&txn.id) || self.used.contains(&txn.id) {
            return;
        }

        for neighbor in &self.neighbors {
            let delay = ctx.latency.delay(
                ctx.rng,
                self.id,
                self.slow,
                neighbor,
                TXN_SIZE_BITS,
            );
            ctx.queue.schedule(Event::new(
                now + delay,
                neighbor.id,
                EventKind::TxnReceive(txn.clone()),
            ));
        }

        self.pooled.insert(txn.id);
        self.pool.push(txn);
    }

    /// Builds a candidate on the tip of the mining ledger and schedules the
    /// moment mining it completes.
    ///
    /// Pooled transfers are added in arrival order, skipping any that would
    /// overdraw their sender, until the block is full.
    pub fn generate_block(&mut self, now: Time, ctx: &mut Context) {
        let Some(parent) = self.mining_ledger().tip() else {
            return;
        };
        let parent_id = parent.id;

        let mut candidate = Block::child_of(
            parent,
            ctx.ids.next_block(),
            self.id,
            ctx.ids.next_txn(),
        );

        if let Some(mut balance) = parent.balance.clone() {
            balance[self.id.0] += COINBASE_REWARD;

            for txn in self.pool.iter().filter(|t| !self.used.contains(&t.id)) {
                let Ok(amount) = i64::try_from(txn.amount) else {
                    continue;
                };
                if balance[txn.sender.0] < amount {
                    continue;
                }
                if !candidate.push_transfer(txn.clone()) {
                    break;
                }
                balance[txn.sender.0] -= amount;
                balance[txn.receiver.0] += amount;
            }
        }

        let mean = ctx.mean_block_interval / self.hashing_share;
        let delay = sample_exponential(ctx.rng, mean);
        trace!(
            node = %self.id,
            parent = %parent_id,
            txns = candidate.txn_count(),
            delay,
            "Mining started"
        );

        self.mining_on = Some(parent_id);
        ctx.queue.schedule(Event::new(
            now + delay,
            self.id,
            EventKind::BlockMine(candidate),
        ));
    }

    /// Completes mining of `candidate`. A candidate whose parent is no longer
    /// the tip is discarded, and mining restarts on the new tip unless an
    /// attempt on it is already underway.
    pub fn mine_block(
        &mut self,
        now: Time,
        mut candidate: Block,
        ctx: &mut Context,
    ) {
        candidate.mine_time = now;

        let tip = self.mining_ledger().tip().map(|block| block.id);
        if candidate.parent != tip {
            trace!(node = %self.id, block = %candidate.id, "Stale candidate");
            if self.mining_on != tip {
                self.generate_block(now, ctx);
            }
            return;
        }

        debug!(
            node = %self.id,
            block = %candidate.id,
            height = candidate.height,
            "Block mined"
        );
        self.receive_block(now, candidate, ctx);
    }

    /// Validates and admits a block, then keeps mining on the resulting tip.
    /// Blocks already known, or failing validation, are dropped silently.
    pub fn receive_block(
        &mut self,
        now: Time,
        mut block: Block,
        ctx: &mut Context,
    ) {
        if block.is_genesis() {
            self.receive_genesis(now, block, ctx);
            return;
        }

        let ledger = self.mining_ledger();
        if ledger.contains_at(block.height, block.id) {
            return;
        }

        let spent = block
            .parent
            .map(|parent| ledger.transfers_on_branch(parent))
            .unwrap_or_default();
        match ledger.validate(&block, &spent) {
            Ok(balance) => block.balance = Some(balance),
            Err(err) => {
                debug!(
                    node = %self.id,
                    block = %block.id,
                    error = %err,
                    "Block rejected"
                );
                return;
            }
        }

        self.confirm(&block);
        self.record_arrival(&block, now);

        if self.private.is_some() {
            self.admit_withheld(now, block, ctx);
        } else {
            self.forward(now, &block, ctx);
            self.add_to_public(block);
        }

        self.mine_next(now, ctx);
    }

    fn receive_genesis(&mut self, now: Time, block: Block, ctx: &mut Context) {
        if self.mining_ledger().genesis().is_some() {
            return;
        }

        self.record_arrival(&block, now);
        if let Some(private) = self.private.as_mut() {
            if let Err(err) = private.add_block(block.clone()) {
                warn!(node = %self.id, error = %err, "Genesis not stored");
            }
        } else {
            self.forward(now, &block, ctx);
        }
        self.add_to_public(block);

        self.mine_next(now, ctx);
    }

    /// Admission path of a node which withholds its own blocks.
    fn admit_withheld(&mut self, now: Time, block: Block, ctx: &mut Context) {
        let Some(private) = self.private.as_mut() else {
            return;
        };

        if block.miner == Some(self.id) {
            if let Err(err) = private.add_block(block) {
                warn!(node = %self.id, error = %err, "Block not stored");
            }
            return;
        }

        let reveals: Vec<Block> = self
            .strategy
            .on_foreign_block(&self.ledger, private)
            .into_blocks()
            .into_iter()
            .filter_map(|id| private.find_by_id(id).cloned())
            .collect();

        if let Err(err) = private.add_block(block.clone()) {
            warn!(node = %self.id, error = %err, "Block not stored");
        }

        for revealed in reveals {
            self.broadcast_block(now, revealed, ctx);
        }
        self.add_to_public(block);
    }

    /// Publishes a withheld block: adds it to the public ledger and sends it
    /// to every neighbor. Blocks already public are left alone.
    pub fn broadcast_block(
        &mut self,
        now: Time,
        block: Block,
        ctx: &mut Context,
    ) {
        if self.ledger.contains_at(block.height, block.id) {
            return;
        }

        debug!(
            node = %self.id,
            block = %block.id,
            height = block.height,
            "Block revealed"
        );
        self.forward(now, &block, ctx);
        self.add_to_public(block);
    }

    /// Schedules delivery of `block` to every neighbor.
    fn forward(&self, now: Time, block: &Block, ctx: &mut Context) {
        for neighbor in &self.neighbors {
            let delay = ctx.latency.delay(
                ctx.rng,
                self.id,
                self.slow,
                neighbor,
                block.size_bits(),
            );
            ctx.queue.schedule(Event::new(
                now + delay,
                neighbor.id,
                EventKind::BlockReceive(block.clone()),
            ));
        }
    }

    fn add_to_public(&mut self, block: Block) {
        if let Err(err) = self.ledger.add_block(block) {
            warn!(node = %self.id, error = %err, "Block not stored");
        }
    }

    /// Removes the block's entries from the pool and marks them used.
    fn confirm(&mut self, block: &Block) {
        let ids: HashSet<TxnId> =
            block.entries.iter().map(|entry| entry.id()).collect();

        if ids.iter().any(|id| self.pooled.contains(id)) {
            self.pool.retain(|txn| !ids.contains(&txn.id));
            self.pooled.retain(|id| !ids.contains(id));
        }
        self.used.extend(ids);
    }

    fn record_arrival(&mut self, block: &Block, now: Time) {
        debug!(
            node = %self.id,
            block = %block.id,
            height = block.height,
            "Block admitted"
        );
        self.arrivals.push(ArrivalRecord {
            height: block.height,
            miner: block.miner,
            block_id: block.id,
            txn_count: block.txn_count(),
            mine_time: block.mine_time,
            arrival_time: now,
        });
    }

    /// Starts mining on the current tip, unless already doing so.
    fn mine_next(&mut self, now: Time, ctx: &mut Context) {
        let tip = self.mining_ledger().tip().map(|block| block.id);
        if tip.is_some() && self.mining_on != tip {
            self.generate_block(now, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{
        latency::PropagationDelay,
        miner::{Honest, Selfish},
    };

    const NUM_NODES: usize = 3;
    const ATTACKER: usize = 2;

    struct Harness {
        queue: EventQueue,
        rng: ChaCha8Rng,
        ids: IdGenerator,
        latency: LatencyModel,
    }

    impl Harness {
        fn new() -> Self {
            let mut ids = IdGenerator::new();
            // Leave low IDs free for blocks built by hand.
            for _ in 0..1000 {
                ids.next_block();
                ids.next_txn();
            }

            Harness {
                queue: EventQueue::new(),
                rng: ChaCha8Rng::seed_from_u64(3),
                ids,
                latency: LatencyModel::new(PropagationDelay::Uniform(0.05)),
            }
        }

        fn ctx(&mut self) -> Context<'_> {
            Context {
                queue: &mut self.queue,
                rng: &mut self.rng,
                ids: &mut self.ids,
                latency: &self.latency,
                num_nodes: NUM_NODES,
                mean_block_interval: 10.0,
            }
        }

        fn drain(&mut self) -> Vec<Event> {
            std::iter::from_fn(|| self.queue.pop_earliest().ok()).collect()
        }
    }

    fn node(id: usize, strategy: Box<dyn Strategy>) -> Node {
        let mut node = Node::new(id.into(), false, true, 0.4, strategy);
        let neighbors = (0..NUM_NODES)
            .filter(|&peer| peer != id)
            .map(|peer| Neighbor { id: peer.into(), slow: false })
            .collect();
        node.set_neighbors(neighbors);
        node
    }

    fn genesis() -> Block {
        Block::genesis(0.into(), NUM_NODES, COINBASE_REWARD)
    }

    fn child(parent: &Block, id: u64, miner: usize, mine_time: f64) -> Block {
        let mut block =
            Block::child_of(parent, id.into(), miner.into(), (500 + id).into());
        block.mine_time = mine_time;
        block
    }

    fn transfer(id: u64, sender: usize, receiver: usize, amount: u64) -> Transaction {
        Transaction {
            id: id.into(),
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
        }
    }

    fn block_receipts(events: &[Event], block: BlockId) -> usize {
        events
            .iter()
            .filter(|event| {
                matches!(&event.kind, EventKind::BlockReceive(b) if b.id == block)
            })
            .count()
    }

    #[test]
    fn generated_transactions_pay_someone_else() {
        let mut h = Harness::new();
        let mut n = node(1, Box::new(Honest::new()));

        for _ in 0..50 {
            n.generate_transaction(0.0, &mut h.ctx());
        }

        assert_eq!(n.pool().len(), 50);
        for txn in n.pool() {
            assert_eq!(txn.sender, NodeId(1));
            assert_ne!(txn.receiver, NodeId(1));
            assert!(txn.receiver.get() < NUM_NODES);
            assert!(txn.amount <= MAX_TXN_AMOUNT);
        }
    }

    #[test]
    fn transaction_receipt_is_idempotent() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        let txn = transfer(1, 1, 2, 3);

        n.receive_transaction(txn.clone(), 1.0, &mut h.ctx());
        n.receive_transaction(txn, 2.0, &mut h.ctx());

        assert_eq!(n.pool().len(), 1);
        let events = h.drain();
        assert_eq!(events.len(), NUM_NODES - 1);
        assert!(events.iter().all(|event| event.time > 1.0
            && matches!(event.kind, EventKind::TxnReceive(_))));
    }

    #[test]
    fn genesis_is_admitted_once() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));

        n.receive_block(0.0, genesis(), &mut h.ctx());
        let mut other = genesis();
        other.id = 1.into();
        n.receive_block(0.5, other, &mut h.ctx());

        assert_eq!(n.ledger().num_blocks(), 1);
        assert_eq!(n.arrivals().len(), 1);
        assert_eq!(n.arrivals()[0].to_string(), "0,-1,0,0,0,0");

        let events = h.drain();
        assert_eq!(block_receipts(&events, 0.into()), NUM_NODES - 1);
        let mining = events
            .iter()
            .filter(|event| matches!(event.kind, EventKind::BlockMine(_)))
            .count();
        assert_eq!(mining, 1);
    }

    #[test]
    fn block_receipt_confirms_transactions_once() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        let g = genesis();
        n.receive_block(0.0, g.clone(), &mut h.ctx());

        let txn = transfer(1, 1, 2, 3);
        n.receive_transaction(txn.clone(), 0.1, &mut h.ctx());
        h.drain();

        let mut block = child(&g, 1, 1, 1.0);
        block.push_transfer(txn.clone());
        n.receive_block(1.5, block.clone(), &mut h.ctx());

        assert!(n.pool().is_empty());
        assert!(n.is_used(txn.id));
        assert_eq!(n.ledger().tip().unwrap().id, block.id);
        assert_eq!(
            n.ledger().tip().unwrap().balance,
            Some(vec![50, 97, 53])
        );

        let events = h.drain();
        assert_eq!(block_receipts(&events, block.id), NUM_NODES - 1);

        n.receive_block(2.0, block.clone(), &mut h.ctx());
        n.receive_transaction(txn, 2.0, &mut h.ctx());
        assert!(h.queue.is_empty());
        assert_eq!(n.arrivals().len(), 2);
        assert!(n.pool().is_empty());
    }

    #[test]
    fn invalid_blocks_are_dropped() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        let g = genesis();
        n.receive_block(0.0, g.clone(), &mut h.ctx());
        h.drain();

        let mut overdraft = child(&g, 1, 1, 1.0);
        overdraft.push_transfer(transfer(1, 2, 0, 51));
        n.receive_block(1.0, overdraft, &mut h.ctx());

        assert_eq!(n.ledger().num_blocks(), 1);
        assert!(h.queue.is_empty());
    }

    #[test]
    fn candidates_skip_overdrafts() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        n.receive_transaction(transfer(1, 1, 2, 60), 0.0, &mut h.ctx());
        n.receive_transaction(transfer(2, 1, 2, 5), 0.0, &mut h.ctx());
        n.receive_transaction(transfer(3, 0, 1, 100), 0.0, &mut h.ctx());
        n.receive_block(0.0, genesis(), &mut h.ctx());

        let candidate = h
            .drain()
            .into_iter()
            .find_map(|event| match event.kind {
                EventKind::BlockMine(block) => Some(block),
                _ => None,
            })
            .unwrap();
        let included: Vec<u64> =
            candidate.transfers().map(|txn| txn.id.get()).collect();

        // Node 0 can spend its coinbase on top of its genesis balance.
        assert_eq!(included, vec![2, 3]);
        assert_eq!(candidate.miner, Some(NodeId(0)));
    }

    #[test]
    fn stale_candidates_are_discarded() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        let g = genesis();
        n.receive_block(0.0, g.clone(), &mut h.ctx());
        h.drain();

        let stale = child(&g, 1, 0, 0.0);
        n.receive_block(1.0, child(&g, 2, 1, 1.0), &mut h.ctx());
        h.drain();

        n.mine_block(2.0, stale, &mut h.ctx());
        assert_eq!(n.ledger().num_blocks(), 2);
        assert_eq!(n.ledger().tip().unwrap().id, BlockId(2));
        // Already mining on the new tip, so nothing is rescheduled.
        assert!(h.queue.is_empty());
    }

    #[test]
    fn fork_transfers_do_not_block_candidates() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        let g = genesis();
        let txn = transfer(1, 1, 2, 3);
        n.receive_transaction(txn.clone(), 0.0, &mut h.ctx());
        n.receive_block(0.0, g.clone(), &mut h.ctx());
        n.receive_block(1.0, child(&g, 2, 1, 1.0), &mut h.ctx());

        let candidate = h
            .drain()
            .into_iter()
            .find_map(|event| match event.kind {
                EventKind::BlockMine(block)
                    if block.parent == Some(BlockId(2)) =>
                {
                    Some(block)
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(candidate.transfers().count(), 1);

        // A later sibling of the tip confirms the same transfer on its own
        // branch.
        let mut sibling = child(&g, 3, 2, 2.0);
        sibling.push_transfer(txn.clone());
        n.receive_block(2.0, sibling, &mut h.ctx());
        h.drain();
        assert_eq!(n.ledger().tip().unwrap().id, BlockId(2));
        assert!(n.is_used(txn.id));

        let id = candidate.id;
        n.mine_block(3.0, candidate, &mut h.ctx());
        assert_eq!(n.ledger().num_blocks(), 4);
        let tip = n.ledger().tip().unwrap();
        assert_eq!(tip.id, id);
        assert_eq!(tip.balance, Some(vec![100, 97, 53]));
    }

    #[test]
    fn mined_blocks_are_published_by_honest_nodes() {
        let mut h = Harness::new();
        let mut n = node(0, Box::new(Honest::new()));
        n.receive_block(0.0, genesis(), &mut h.ctx());

        let candidate = h
            .drain()
            .into_iter()
            .find_map(|event| match event.kind {
                EventKind::BlockMine(block) => Some(block),
                _ => None,
            })
            .unwrap();
        let id = candidate.id;
        n.mine_block(4.0, candidate, &mut h.ctx());

        let tip = n.ledger().tip().unwrap();
        assert_eq!(tip.id, id);
        assert_eq!(tip.mine_time, 4.0);
        assert_eq!(block_receipts(&h.drain(), id), NUM_NODES - 1);
    }

    #[test]
    fn selfish_node_withholds_then_reveals_above_public_tip() {
        let mut h = Harness::new();
        let mut attacker = node(ATTACKER, Box::new(Selfish::new()));
        let g = genesis();
        attacker.receive_block(0.0, g.clone(), &mut h.ctx());
        assert!(block_receipts(&h.drain(), g.id) == 0);

        // Two withheld blocks, then an honest block at height 1.
        let a1 = child(&g, 1, ATTACKER, 1.0);
        let a2 = child(&a1, 2, ATTACKER, 2.0);
        attacker.receive_block(1.0, a1.clone(), &mut h.ctx());
        attacker.receive_block(2.0, a2.clone(), &mut h.ctx());
        assert_eq!(attacker.ledger().num_blocks(), 1);
        assert_eq!(attacker.private_ledger().unwrap().tip_height(), Some(2));
        assert_eq!(block_receipts(&h.drain(), a2.id), 0);

        attacker.receive_block(3.0, child(&g, 10, 0, 2.5), &mut h.ctx());
        let events = h.drain();
        assert_eq!(block_receipts(&events, a1.id), NUM_NODES - 1);
        assert_eq!(block_receipts(&events, a2.id), NUM_NODES - 1);
        assert_eq!(attacker.ledger().tip().unwrap().id, a2.id);

        // Extend the lead to three, then let an honest block land at height 3.
        let a3 = child(&a2, 3, ATTACKER, 4.0);
        let a4 = child(&a3, 4, ATTACKER, 5.0);
        let a5 = child(&a4, 5, ATTACKER, 6.0);
        for block in [&a3, &a4, &a5] {
            attacker.receive_block(block.mine_time, block.clone(), &mut h.ctx());
        }
        h.drain();
        assert_eq!(attacker.private_ledger().unwrap().tip_height(), Some(5));
        assert_eq!(attacker.ledger().tip_height(), Some(2));

        let h3 = child(&a2, 11, 1, 6.5);
        attacker.receive_block(7.0, h3.clone(), &mut h.ctx());
        let events = h.drain();

        assert_eq!(block_receipts(&events, a3.id), NUM_NODES - 1);
        assert_eq!(block_receipts(&events, a4.id), 0);
        assert_eq!(block_receipts(&events, a5.id), 0);
        assert_eq!(block_receipts(&events, h3.id), 0);

        let public = attacker.ledger();
        assert!(public.contains_at(3, a3.id));
        assert!(public.contains_at(3, h3.id));
        assert!(!public.contains(a4.id));
        assert_eq!(attacker.private_ledger().unwrap().tip().unwrap().id, a5.id);
    }
}
