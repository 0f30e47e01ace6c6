//! Random connected peer-to-peer graphs.

use std::collections::{BTreeSet, VecDeque};

use rand::{seq::SliceRandom, Rng};
use tracing::trace;

use crate::node::NodeId;

/// Lower bound on the degree targeted for each node.
pub const MIN_DEGREE: usize = 3;
/// Upper bound on the degree of each node.
pub const MAX_DEGREE: usize = 6;

/// Undirected graph over every node in a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    adjacency: Vec<Vec<NodeId>>,
}

impl Topology {
    /// Builds a connected graph over `num_nodes` nodes in which every node's
    /// degree lies in `MIN_DEGREE..=MAX_DEGREE`, both bounds capped at
    /// `num_nodes - 1`.
    ///
    /// Each node draws a target degree, then random edges between nodes with
    /// spare degree are added until none can be. Graphs that come out
    /// disconnected or under-connected are discarded and regenerated.
    pub fn build<R: Rng + ?Sized>(rng: &mut R, num_nodes: usize) -> Self {
        let mut attempts = 1;
        loop {
            let topology = Self::attempt(rng, num_nodes);
            if topology.is_connected() && topology.meets_min_degree() {
                trace!(attempts, num_nodes, "Topology generated");
                return topology;
            }

            attempts += 1;
        }
    }

    fn attempt<R: Rng + ?Sized>(rng: &mut R, num_nodes: usize) -> Self {
        let cap = num_nodes.saturating_sub(1);
        let targets: Vec<usize> = (0..num_nodes)
            .map(|_| rng.gen_range(MIN_DEGREE..=MAX_DEGREE).min(cap))
            .collect();
        let mut adjacency = vec![BTreeSet::new(); num_nodes];

        loop {
            let open: Vec<(usize, usize)> = (0..num_nodes)
                .filter(|&i| adjacency[i].len() < targets[i])
                .flat_map(|i| ((i + 1)..num_nodes).map(move |j| (i, j)))
                .filter(|&(i, j)| {
                    adjacency[j].len() < targets[j]
                        && !adjacency[i].contains(&j)
                })
                .collect();

            match open.choose(rng) {
                Some(&(i, j)) => {
                    adjacency[i].insert(j);
                    adjacency[j].insert(i);
                }
                None => break,
            }
        }

        Self::from_adjacency(
            adjacency
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
        )
    }

    /// Wraps an adjacency list given as node indices. Every edge must be
    /// listed from both of its ends.
    pub fn from_adjacency(adjacency: Vec<Vec<usize>>) -> Self {
        Self {
            adjacency: adjacency
                .into_iter()
                .map(|peers| peers.into_iter().map(NodeId::from).collect())
                .collect(),
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    #[inline]
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.adjacency[node.get()]
    }

    #[inline]
    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node.get()].len()
    }

    /// Iterates over every edge once, as `(lower, higher)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(i, peers)| {
            peers
                .iter()
                .filter(move |peer| peer.get() > i)
                .map(move |&peer| (NodeId::from(i), peer))
        })
    }

    pub fn is_connected(&self) -> bool {
        let n = self.num_nodes();
        if n == 0 {
            return true;
        }

        let mut visited = vec![false; n];
        let mut queue = VecDeque::from([0]);
        visited[0] = true;

        while let Some(node) = queue.pop_front() {
            for peer in &self.adjacency[node] {
                if !visited[peer.get()] {
                    visited[peer.get()] = true;
                    queue.push_back(peer.get());
                }
            }
        }

        visited.into_iter().all(|v| v)
    }

    fn meets_min_degree(&self) -> bool {
        let floor = MIN_DEGREE.min(self.num_nodes().saturating_sub(1));
        self.adjacency.iter().all(|peers| peers.len() >= floor)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn built_graphs_are_connected_and_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for num_nodes in [2, 3, 4, 7, 10, 25, 60] {
            let topology = Topology::build(&mut rng, num_nodes);
            assert!(topology.is_connected());

            let floor = MIN_DEGREE.min(num_nodes - 1);
            for i in 0..num_nodes {
                let degree = topology.degree(i.into());
                assert!(
                    (floor..=MAX_DEGREE).contains(&degree),
                    "node {i} of {num_nodes} has degree {degree}"
                );

                let peers = topology.neighbors(i.into());
                assert!(!peers.contains(&i.into()), "self loop at {i}");
                for peer in peers {
                    assert!(topology.neighbors(*peer).contains(&i.into()));
                }
            }
        }
    }

    #[test]
    fn edges_are_listed_once() {
        let topology =
            Topology::from_adjacency(vec![vec![1, 2], vec![0], vec![0]]);
        let edges: Vec<_> = topology.edges().collect();

        assert_eq!(edges, vec![(NodeId(0), NodeId(1)), (NodeId(0), NodeId(2))]);
    }

    #[test]
    fn detects_disconnected_graphs() {
        let split = Topology::from_adjacency(vec![
            vec![1],
            vec![0],
            vec![3],
            vec![2],
        ]);
        assert!(!split.is_connected());
    }
}
