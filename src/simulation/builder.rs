use std::num::NonZeroUsize;

use crate::{
    event::Time,
    miner::Strategy,
    power::{PowerDistribution, PowerError, PowerValue},
};

use super::{SimulationConfig, SimulationGroup};

/// Builds a [`SimulationGroup`].
///
/// # Defaults
/// | parameter             | value  |
/// |-----------------------|--------|
/// | `node_count`          | 10     |
/// | `slow_fraction`       | 0.5    |
/// | `low_power_fraction`  | 0.5    |
/// | `mean_txn_interval`   | 1.0    |
/// | `mean_block_interval` | 10.0   |
/// | `duration`            | 1000.0 |
/// | `repeat_all`          | 1      |
/// | `seed`                | 0      |
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    pub node_count: Option<usize>,
    pub slow_fraction: Option<f64>,
    pub low_power_fraction: Option<f64>,
    pub mean_txn_interval: Option<Time>,
    pub mean_block_interval: Option<Time>,
    pub duration: Option<Time>,
    pub repeat_all: Option<usize>,
    pub seed: Option<u64>,
    pub power_dists: Vec<PowerDistribution>,
    attackers: Vec<Box<dyn Strategy>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error(
        "need at least 2 nodes and at least one honest node, \
         got {nodes} node(s) with {attackers} attacker(s)"
    )]
    TooFewNodes { nodes: usize, attackers: usize },
    #[error("{name} must lie between 0.0 and 1.0, got {value}")]
    BadFraction { name: &'static str, value: f64 },
    #[error("{name} must be positive and finite, got {value}")]
    BadTime { name: &'static str, value: Time },
    #[error("attackers were added without any attacker power values")]
    MissingAttackerPower,
    #[error("power distribution lists {found} attacker(s), expected {expected}")]
    AttackerCountMismatch { expected: usize, found: usize },
    #[error("simulations must be repeated at least once")]
    ZeroRepeats,
    #[error(transparent)]
    PowerError(#[from] PowerError),
}

impl SimulationBuilder {
    const DEFAULT_NODE_COUNT: usize = 10;
    const DEFAULT_SLOW_FRACTION: f64 = 0.5;
    const DEFAULT_LOW_POWER_FRACTION: f64 = 0.5;
    const DEFAULT_MEAN_TXN_INTERVAL: Time = 1.0;
    const DEFAULT_MEAN_BLOCK_INTERVAL: Time = 10.0;
    const DEFAULT_DURATION: Time = 1000.0;

    /// Creates a new [`SimulationBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes in the network, attackers included.
    pub fn node_count(mut self, count: usize) -> Self {
        self.node_count = Some(count);

        self
    }

    /// Fraction of honest nodes on slow links.
    pub fn slow_fraction(mut self, fraction: f64) -> Self {
        self.slow_fraction = Some(fraction);

        self
    }

    /// Fraction of honest nodes with low mining power.
    pub fn low_power_fraction(mut self, fraction: f64) -> Self {
        self.low_power_fraction = Some(fraction);

        self
    }

    /// Mean time between transactions across the whole network.
    pub fn mean_txn_interval(mut self, interval: Time) -> Self {
        self.mean_txn_interval = Some(interval);

        self
    }

    /// Mean time between blocks across the whole network.
    pub fn mean_block_interval(mut self, interval: Time) -> Self {
        self.mean_block_interval = Some(interval);

        self
    }

    /// Simulated time after which no new events are dispatched, except for
    /// blocks already in flight.
    pub fn duration(mut self, duration: Time) -> Self {
        self.duration = Some(duration);

        self
    }

    /// Each simulation will run `num` times, with consecutive seeds.
    pub fn repeat_all(mut self, num: usize) -> Self {
        self.repeat_all = Some(num);

        self
    }

    /// Seed of the first simulation in the group.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// Add a withholding node running `strategy`. Attackers take the highest
    /// node IDs, in the order they are added.
    pub fn add_attacker<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.attackers.push(Box::new(strategy));

        self
    }

    /// Run a simulation in which attacker `i` holds `values[i]` of the total
    /// mining power.
    pub fn attacker_powers<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = PowerValue>,
    {
        self.power_dists.push(PowerDistribution::new(values));

        self
    }

    /// Call [`SimulationBuilder::attacker_powers`] once for each element of
    /// `values`, giving every attacker that same value. Only attackers added
    /// before this call are counted.
    pub fn attacker_power_iter<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = PowerValue>,
    {
        let num_attackers = self.attackers.len();
        for val in values {
            self.power_dists
                .push(PowerDistribution::new(vec![val; num_attackers]));
        }

        self
    }

    /// Creates a [`SimulationGroup`] from the specified parameters.
    pub fn build(self) -> Result<SimulationGroup, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            node_count,
            slow_fraction,
            low_power_fraction,
            mean_txn_interval,
            mean_block_interval,
            duration,
            repeat_all,
            seed,
            mut power_dists,
            attackers,
        } = self;

        let config = SimulationConfig {
            node_count: node_count.unwrap_or(Self::DEFAULT_NODE_COUNT),
            slow_fraction: slow_fraction
                .unwrap_or(Self::DEFAULT_SLOW_FRACTION),
            low_power_fraction: low_power_fraction
                .unwrap_or(Self::DEFAULT_LOW_POWER_FRACTION),
            mean_txn_interval: mean_txn_interval
                .unwrap_or(Self::DEFAULT_MEAN_TXN_INTERVAL),
            mean_block_interval: mean_block_interval
                .unwrap_or(Self::DEFAULT_MEAN_BLOCK_INTERVAL),
            duration: duration.unwrap_or(Self::DEFAULT_DURATION),
        };

        if config.node_count < 2 || config.node_count <= attackers.len() {
            return Err(TooFewNodes {
                nodes: config.node_count,
                attackers: attackers.len(),
            });
        }

        for (name, value) in [
            ("slow_fraction", config.slow_fraction),
            ("low_power_fraction", config.low_power_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BadFraction { name, value });
            }
        }

        for (name, value) in [
            ("mean_txn_interval", config.mean_txn_interval),
            ("mean_block_interval", config.mean_block_interval),
            ("duration", config.duration),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(BadTime { name, value });
            }
        }

        let repeat_all =
            NonZeroUsize::new(repeat_all.unwrap_or(1)).ok_or(ZeroRepeats)?;

        if power_dists.is_empty() {
            if !attackers.is_empty() {
                return Err(MissingAttackerPower);
            }
            power_dists.push(PowerDistribution::default());
        }

        for dist in power_dists.iter() {
            if dist.attackers().len() != attackers.len() {
                return Err(AttackerCountMismatch {
                    expected: attackers.len(),
                    found: dist.attackers().len(),
                });
            }
            dist.validate()?;
        }

        Ok(SimulationGroup {
            config,
            attackers,
            power_dists,
            repeat_all,
            seed: seed.unwrap_or_default(),
        })
    }
}
