//! Propagation delay between directly connected nodes.

use rand::Rng;

use crate::{
    event::Time,
    node::{Neighbor, NodeId},
    utils::sample_exponential,
};

/// Link rate when both endpoints are fast, in bits per second.
pub const FAST_LINK_RATE: f64 = 100_000_000.0;
/// Link rate when either endpoint is slow, in bits per second.
pub const SLOW_LINK_RATE: f64 = 5_000_000.0;
/// Mean queuing delay at a link is this many bits over the link rate.
pub const QUEUING_BITS: f64 = 96_000.0;
/// Bounds of the sampled speed-of-light delay, in seconds.
pub const PROPAGATION_RANGE: std::ops::RangeInclusive<f64> = 0.01..=0.5;

/// Fixed speed-of-light component of the delay.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagationDelay {
    /// The same delay between every pair of nodes.
    Uniform(Time),
    /// Symmetric per-pair delays, indexed by [`NodeId`].
    PerPair(Vec<Vec<Time>>),
}

/// Computes `propagation + size / link_rate + queuing`, where queuing is drawn
/// from an exponential distribution with mean [`QUEUING_BITS`]` / link_rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyModel {
    propagation: PropagationDelay,
}

impl LatencyModel {
    pub fn new(propagation: PropagationDelay) -> Self {
        Self { propagation }
    }

    /// Samples a single delay shared by every pair of nodes.
    pub fn sample_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(PropagationDelay::Uniform(rng.gen_range(PROPAGATION_RANGE)))
    }

    /// Samples a symmetric delay matrix over `num_nodes` nodes.
    pub fn sample_per_pair<R: Rng + ?Sized>(
        rng: &mut R,
        num_nodes: usize,
    ) -> Self {
        let mut matrix = vec![vec![0.0; num_nodes]; num_nodes];
        for i in 0..num_nodes {
            for j in (i + 1)..num_nodes {
                let delay = rng.gen_range(PROPAGATION_RANGE);
                matrix[i][j] = delay;
                matrix[j][i] = delay;
            }
        }

        Self::new(PropagationDelay::PerPair(matrix))
    }

    pub fn propagation(&self, from: NodeId, to: NodeId) -> Time {
        match &self.propagation {
            PropagationDelay::Uniform(delay) => *delay,
            PropagationDelay::PerPair(matrix) => matrix[from.get()][to.get()],
        }
    }

    #[inline]
    pub fn link_rate(from_slow: bool, to_slow: bool) -> f64 {
        if from_slow || to_slow {
            SLOW_LINK_RATE
        } else {
            FAST_LINK_RATE
        }
    }

    /// Delay for a message of `size_bits` sent from `from` to `to`.
    pub fn delay<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        from: NodeId,
        from_slow: bool,
        to: &Neighbor,
        size_bits: u64,
    ) -> Time {
        let rate = Self::link_rate(from_slow, to.slow);
        let queuing = sample_exponential(rng, QUEUING_BITS / rate);

        self.propagation(from, to.id) + size_bits as f64 / rate + queuing
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn slow_endpoint_uses_slow_rate() {
        assert_eq!(LatencyModel::link_rate(false, false), FAST_LINK_RATE);
        assert_eq!(LatencyModel::link_rate(true, false), SLOW_LINK_RATE);
        assert_eq!(LatencyModel::link_rate(false, true), SLOW_LINK_RATE);
    }

    #[test]
    fn delay_has_fixed_lower_bound() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let model = LatencyModel::new(PropagationDelay::Uniform(0.1));
        let to = Neighbor { id: 1.into(), slow: true };

        for _ in 0..100 {
            let delay = model.delay(&mut rng, 0.into(), false, &to, 8_000);
            // 0.1 s propagation + 8000 bits at 5 Mbit/s
            assert!(delay >= 0.1 + 0.0016);
        }
    }

    #[test]
    fn per_pair_matrix_is_symmetric() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let model = LatencyModel::sample_per_pair(&mut rng, 4);

        for i in 0..4usize {
            for j in 0..4usize {
                let d = model.propagation(i.into(), j.into());
                assert_eq!(d, model.propagation(j.into(), i.into()));
                if i != j {
                    assert!(PROPAGATION_RANGE.contains(&d));
                }
            }
        }
    }
}
