//! Node bipartitions and the cuts they induce
//!
//! A [`Partition`] orders the interior nodes of a network and splits them at
//! a movable splitter: the prefix forms the set S, the suffix the set T. The
//! source is implicitly a member of S and the target of T. A [`Cut`] lists
//! the indices of the edges crossing from S to T.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::data_structures::topology::NodeRef;
use crate::math::random::RandomSource;
use crate::math::range::Interval;

/// Cuts with fewer crossing edges are degenerate
pub const MIN_CUT_SIZE: usize = 2;

/// Ordered interior nodes split into S (prefix) and T (suffix)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    nodes: Vec<NodeRef>,
    splitter: usize,
}

/// Outcome of a partition mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionMutation {
    /// Membership swaps performed
    pub swaps: usize,
    /// Whether the splitter moved
    pub splitter_shifted: bool,
}

impl PartitionMutation {
    /// Whether the partition changed at all
    pub fn changed(&self) -> bool {
        self.swaps > 0 || self.splitter_shifted
    }
}

impl Partition {
    /// Create a partition from a node ordering; the splitter is clamped to
    /// the node count
    pub fn new(nodes: Vec<NodeRef>, splitter: usize) -> Self {
        let splitter = splitter.min(nodes.len());
        Self { nodes, splitter }
    }

    /// Replace the node ordering and splitter
    pub fn copy_from(&mut self, nodes: &[NodeRef], splitter: usize) {
        self.nodes.clear();
        self.nodes.extend_from_slice(nodes);
        self.splitter = splitter.min(self.nodes.len());
    }

    /// Move the splitter; the total node count is unchanged
    pub fn resize(&mut self, splitter: usize) {
        self.splitter = splitter.min(self.nodes.len());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn splitter(&self) -> usize {
        self.splitter
    }

    #[inline]
    pub fn size_s(&self) -> usize {
        self.splitter
    }

    #[inline]
    pub fn size_t(&self) -> usize {
        self.nodes.len() - self.splitter
    }

    pub fn s_nodes(&self) -> &[NodeRef] {
        &self.nodes[..self.splitter]
    }

    pub fn t_nodes(&self) -> &[NodeRef] {
        &self.nodes[self.splitter..]
    }

    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Membership in S; the source always belongs to S
    pub fn contains_in_s(&self, node: NodeRef) -> bool {
        node.is_source() || self.s_nodes().contains(&node)
    }

    /// Membership in T; the target always belongs to T
    pub fn contains_in_t(&self, node: NodeRef) -> bool {
        node.is_target() || self.t_nodes().contains(&node)
    }

    /// Mutate the partition in place.
    ///
    /// Each position is swapped with a random position with probability
    /// `mutation_rate`. With probability `p_change_size` the splitter is
    /// shifted by a random offset, keeping both sides at least
    /// `min_partition_size` large.
    pub fn shuffle(
        &mut self,
        mutation_rate: f64,
        p_change_size: f64,
        min_partition_size: usize,
        random: &mut RandomSource,
    ) -> PartitionMutation {
        let swaps = random.shuffle_with_probability(&mut self.nodes, mutation_rate);
        let mut splitter_shifted = false;

        if random.prob(p_change_size) {
            let n = self.nodes.len() as i64;
            let min = min_partition_size as i64;
            let size_s = self.size_s() as i64;
            let size_t = self.size_t() as i64;

            let min_x = (min - size_s).div_euclid(2);
            let max_x = (size_t - min).div_euclid(2);
            if min_x <= max_x {
                let x = random.get_int(Interval::ordered(min_x, max_x));
                let lower = min.min(n);
                let upper = (n - min).max(lower);
                let splitter = (size_s + x).clamp(lower, upper) as usize;
                splitter_shifted = splitter != self.splitter;
                self.splitter = splitter;
            }
        }

        PartitionMutation { swaps, splitter_shifted }
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |nodes: &[NodeRef]| {
            nodes
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        write!(f, "S={{{}}} T={{{}}}", join(self.s_nodes()), join(self.t_nodes()))
    }
}

/// Edge indices crossing from S to T
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cut {
    edges: Vec<usize>,
}

impl Cut {
    /// Build a cut from crossing edge indices; degenerate sets yield an
    /// invalid, empty cut
    pub fn from_edges(edges: Vec<usize>) -> Self {
        if edges.len() < MIN_CUT_SIZE {
            Self::invalid()
        } else {
            Self { edges }
        }
    }

    pub fn invalid() -> Self {
        Self { edges: Vec::new() }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.edges.len() >= MIN_CUT_SIZE
    }

    /// Number of crossing edges, 0 for an invalid cut
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[usize] {
        &self.edges
    }
}

impl Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "(Cut not valid)");
        }
        let edges: Vec<String> = self.edges.iter().map(|e| e.to_string()).collect();
        write!(f, "({})", edges.join(","))
    }
}
