//! Flow network model
//!
//! A [`Network`] wraps a [`Topology`] with the two sentinel nodes, the dense
//! interior nodes and their adjacency lists. It provides the flow primitives
//! shared by the solvers: walk construction, cycle removal, bottleneck
//! capacity, flow augmentation and cut evaluation.
//!
//! Networks are built either from an explicit edge list
//! ([`Network::from_topology`]) or by the layered random generator
//! ([`Network::generate`]). Structural edits (pruning, completion with
//! reverse edges) rebuild the adjacency lists so they always mirror the
//! topology.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{self, Display};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data_structures::partition::{Cut, Partition};
use crate::data_structures::topology::{Edge, EdgeKey, NodeRef, Topology, TopologyError};
use crate::math::parse::{parse_interval, parse_number, ParseValueError};
use crate::math::random::RandomSource;
use crate::math::range::Interval;

/// Probability that a generated forward edge skips layers
const LAYER_SKIP_PROBABILITY: f64 = 0.4;

/// Random edges added per node and unit of entropy
const ENTROPY_ROUNDS: f64 = 30.0;

/// Traversal color used by cycle removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeColor {
    #[default]
    White,
    Green,
    Yellow,
    Red,
}

/// Network node with adjacency lists
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeRef,
    /// Successors, one per outgoing edge
    pub next: Vec<NodeRef>,
    /// Predecessors, one per incoming edge
    pub prev: Vec<NodeRef>,
    pub color: NodeColor,
    /// Advisory distance-to-target estimate, negative when unknown
    pub distance_heuristic: i64,
}

impl Node {
    fn new(id: NodeRef) -> Self {
        Self {
            id,
            next: Vec::new(),
            prev: Vec::new(),
            color: NodeColor::White,
            distance_heuristic: -1,
        }
    }
}

/// Walk through the network as a sequence of nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    nodes: Vec<NodeRef>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<NodeRef>) -> Self {
        Self { nodes }
    }

    #[inline]
    pub fn push(&mut self, node: NodeRef) {
        self.nodes.push(node);
    }

    #[inline]
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<&NodeRef> {
        self.nodes.first()
    }

    pub fn last(&self) -> Option<&NodeRef> {
        self.nodes.last()
    }

    /// Starts at the source and ends at the target
    pub fn is_valid(&self) -> bool {
        matches!(
            (self.nodes.first(), self.nodes.last()),
            (Some(NodeRef::Source), Some(NodeRef::Target))
        )
    }

    /// Consecutive edges of the walk, repeats included
    pub fn edges(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        self.nodes.windows(2).map(|w| EdgeKey::new(w[0], w[1]))
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self.nodes.iter().map(|n| n.to_string()).collect();
        write!(f, "[{}]({})", self.nodes.len(), nodes.join(","))
    }
}

/// Selects which per-edge and per-node fields [`Network::reset`] clears
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetOptions {
    /// Zero the flow
    pub flow: bool,
    /// Zero the capacity
    pub capacity: bool,
    /// Set the trail to `default_tau` and the counter to 1
    pub status: bool,
    /// Paint every node white
    pub color: bool,
    /// Forget distance estimates
    pub heuristic: bool,
    pub default_tau: f64,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            flow: true,
            capacity: false,
            status: true,
            color: true,
            heuristic: true,
            default_tau: 1.0,
        }
    }
}

impl ResetOptions {
    /// Only repaint the nodes
    pub fn colors_only() -> Self {
        Self {
            flow: false,
            capacity: false,
            status: false,
            color: true,
            heuristic: false,
            default_tau: 1.0,
        }
    }
}

/// Layered random generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    /// Interior node count
    pub count_node: usize,
    /// Number of layers
    pub count_layer: usize,
    /// Allowed deviation of a layer's size from the average
    pub delta_node_layer: usize,
    /// Out-degree range of layer nodes
    pub count_edge_for_node: Interval<i64>,
    /// Edge capacity range
    pub capacity_edge: Interval<f64>,
    /// Density of extra random edges
    pub entropy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            count_node: 100,
            count_layer: 20,
            delta_node_layer: 10,
            count_edge_for_node: Interval::ordered(2, 5),
            capacity_edge: Interval::ordered(2.0, 20.0),
            entropy: 0.3,
            seed: None,
        }
    }
}

impl GeneratorOptions {
    /// Build options from a flat key/value map on top of the defaults
    pub fn from_arguments(arguments: &HashMap<String, String>) -> Result<Self, TopologyError> {
        let mut options = Self::default();
        for (name, value) in arguments {
            options.set_parameter(name, value)?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Set one option from its textual value
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), TopologyError> {
        let invalid = |e: ParseValueError| TopologyError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        };
        match name {
            "countNode" => self.count_node = parse_number(value).map_err(invalid)?,
            "countLayer" => self.count_layer = parse_number(value).map_err(invalid)?,
            "deltaNodeLayer" => self.delta_node_layer = parse_number(value).map_err(invalid)?,
            "countEdgeForNode" => {
                self.count_edge_for_node =
                    parse_interval(value, |n| Interval::ordered(1, n)).map_err(invalid)?
            }
            "capacityEdge" => {
                self.capacity_edge =
                    parse_interval(value, |x| Interval::ordered(0.5, x)).map_err(invalid)?
            }
            "entropy" => self.entropy = parse_number(value).map_err(invalid)?,
            "seed" => self.seed = Some(parse_number(value).map_err(invalid)?),
            _ => {
                return Err(TopologyError::InvalidParameter {
                    name: name.to_string(),
                    reason: "unknown generator option".to_string(),
                })
            }
        }
        Ok(())
    }

    /// Reject configurations the generator cannot honor
    pub fn validate(&self) -> Result<(), TopologyError> {
        let invalid = |name: &str, reason: &str| {
            Err(TopologyError::InvalidParameter {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };
        if self.count_node == 0 {
            return invalid("countNode", "at least one node is required");
        }
        if self.count_layer == 0 {
            return invalid("countLayer", "at least one layer is required");
        }
        if self.count_edge_for_node.min() < 0 {
            return invalid("countEdgeForNode", "out-degree cannot be negative");
        }
        if self.capacity_edge.min() < 0.0 || !self.capacity_edge.max().is_finite() {
            return invalid("capacityEdge", "capacities must be finite and non-negative");
        }
        if !(self.entropy >= 0.0 && self.entropy.is_finite()) {
            return invalid("entropy", "must be a finite non-negative number");
        }
        Ok(())
    }
}

/// Dense capacity matrix over source, target and interior nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualMatrix {
    /// `capacity[u][v]` for dense indices `u`, `v`
    pub capacity: Vec<Vec<f64>>,
    pub source: usize,
    pub target: usize,
}

/// Headline figures of a network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub nodes: usize,
    pub edges: usize,
    pub flow_upperbound: f64,
}

impl Display for NetworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes: {}", self.nodes)?;
        writeln!(f, "Edges: {}", self.edges)?;
        write!(f, "UpperBoundFlow: {}", self.flow_upperbound)
    }
}

/// Topology plus sentinel and interior nodes
#[derive(Debug, Clone)]
pub struct Network {
    topology: Topology,
    nodes: Vec<Node>,
    source: Node,
    target: Node,
}

impl Default for Network {
    fn default() -> Self {
        Self::with_node_count(0)
    }
}

impl Network {
    /// Empty network
    pub fn new() -> Self {
        Self::default()
    }

    fn with_node_count(count: usize) -> Self {
        Self {
            topology: Topology::new(),
            nodes: (0..count).map(|i| Node::new(NodeRef::Interior(i))).collect(),
            source: Node::new(NodeRef::Source),
            target: Node::new(NodeRef::Target),
        }
    }

    /// Build a network from an explicit edge list.
    ///
    /// Interior ids are remapped, in ascending order, to the dense range
    /// `0..N`; sentinels keep their identity. Only capacities are replayed.
    pub fn from_topology(topology: &Topology) -> Self {
        let interior: BTreeSet<usize> = topology
            .keys()
            .iter()
            .flat_map(|k| [k.from, k.to])
            .filter_map(|n| match n {
                NodeRef::Interior(i) => Some(i),
                _ => None,
            })
            .collect();
        let dense: HashMap<usize, usize> = interior
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();
        let remap = |node: NodeRef| match node {
            NodeRef::Interior(i) => dense.get(&i).map_or(node, |&d| NodeRef::Interior(d)),
            sentinel => sentinel,
        };

        let mut network = Self::with_node_count(interior.len());
        for (key, edge) in topology.iter() {
            network.connect(remap(key.from), remap(key.to), edge.capacity);
        }
        debug!(
            "Built network from edge list: {} nodes, {} edges",
            network.count_nodes(),
            network.count_edges()
        );
        network
    }

    /// Build a layered random network.
    ///
    /// Interior nodes are split into consecutive layers of random size. The
    /// source feeds the first layer and the last layer feeds the target.
    /// Every node of an inner layer links forward, usually to the next layer
    /// and sometimes further ahead or straight to the target; a few edges
    /// join nodes of the same layer. `entropy` adds edges between random
    /// node pairs. A final pass links any node left without predecessor or
    /// successor.
    pub fn generate(options: &GeneratorOptions, random: &mut RandomSource) -> Result<Self, TopologyError> {
        options.validate()?;

        let count = options.count_node;
        let mut network = Self::with_node_count(count);

        let delta = options.delta_node_layer as i64;
        let mut average = (count as f64 / options.count_layer as f64).round() as i64;
        if average <= delta {
            average = delta + 1;
        }
        let layer_size = Interval::ordered(average - delta, average + delta);

        // (first node, node count) per layer
        let mut layers: Vec<(usize, usize)> = Vec::with_capacity(options.count_layer);
        let mut placed = 0;
        for i in 0..options.count_layer {
            if placed >= count {
                break;
            }
            let size = if i == options.count_layer - 1 {
                count - placed
            } else {
                random.get_int(layer_size) as usize
            };
            let size = size.min(count - placed);
            layers.push((placed, size));
            placed += size;
        }
        let last = layers.len() - 1;

        let capacity_avg = options.capacity_edge.mean();
        let jitter = Interval::ordered(-capacity_avg / 2.0, capacity_avg / 2.0);

        let (start, size) = layers[0];
        for i in start..start + size {
            let mut capacity = random.get_double(options.capacity_edge);
            if capacity < capacity_avg {
                capacity = capacity_avg + random.get_double(jitter);
            }
            network.connect(NodeRef::Source, NodeRef::Interior(i), capacity);
        }

        for layer in 0..last {
            let (start, size) = layers[layer];
            let max_offset = (last - layer + 1) as i64;
            for i in start..start + size {
                let out_degree = random.get_int(options.count_edge_for_node).max(1);
                for _ in 0..out_degree {
                    let offset = if random.prob(LAYER_SKIP_PROBABILITY) {
                        random.get_int(Interval::ordered(1, max_offset))
                    } else {
                        1
                    };
                    let to = if offset < max_offset {
                        let (next_start, next_size) = layers[layer + offset as usize];
                        NodeRef::Interior(next_start + random.get_index(next_size))
                    } else {
                        NodeRef::Target
                    };
                    let capacity = random.get_double(options.capacity_edge);
                    network.connect(NodeRef::Interior(i), to, capacity);
                }
            }
        }

        let intra_edges = Interval::ordered(1, layer_size.min());
        for &(start, size) in &layers {
            let attempts = random.get_int(intra_edges);
            for _ in 0..attempts {
                let a = random.get_index(size);
                let b = random.get_index(size);
                if a == b {
                    continue;
                }
                let capacity = random.get_double(options.capacity_edge);
                let out_degree = network.nodes[start + a].next.len() as i64;
                if out_degree < options.count_edge_for_node.max() {
                    network.connect(NodeRef::Interior(start + a), NodeRef::Interior(start + b), capacity);
                }
            }
        }

        let (start, size) = layers[last];
        for i in start..start + size {
            let capacity = random.get_double(options.capacity_edge);
            network.connect(NodeRef::Interior(i), NodeRef::Target, capacity);
        }

        if options.entropy > 0.0 {
            let rounds = (options.entropy * ENTROPY_ROUNDS).floor() as usize;
            let any_node = Interval::ordered(0, count as i64);
            for _ in 0..rounds {
                for i in 0..count {
                    let index = random.get_int(any_node) as usize;
                    if index == i {
                        continue;
                    }
                    let to = if index == count {
                        NodeRef::Target
                    } else {
                        NodeRef::Interior(index)
                    };
                    let capacity = random.get_double(options.capacity_edge);
                    network.connect(NodeRef::Interior(i), to, capacity);
                }
            }
        }

        for i in 0..count {
            if network.nodes[i].prev.is_empty() {
                let pick = random.get_int(Interval::ordered(-1, i as i64 - 1));
                let from = if pick < 0 {
                    NodeRef::Source
                } else {
                    NodeRef::Interior(pick as usize)
                };
                let capacity = random.get_double(options.capacity_edge);
                network.connect(from, NodeRef::Interior(i), capacity);
            }
            if network.nodes[i].next.is_empty() {
                let pick = random.get_int(Interval::ordered(i as i64 + 1, count as i64)) as usize;
                let to = if pick == count {
                    NodeRef::Target
                } else {
                    NodeRef::Interior(pick)
                };
                let capacity = random.get_double(options.capacity_edge);
                network.connect(NodeRef::Interior(i), to, capacity);
            }
        }

        debug!(
            "Generated network: {} nodes in {} layers, {} edges",
            network.count_nodes(),
            layers.len(),
            network.count_edges()
        );
        Ok(network)
    }

    /// Interior node count
    #[inline]
    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn count_edges(&self) -> usize {
        self.topology.len()
    }

    pub fn count_enabled_edges(&self) -> usize {
        self.topology.len_enabled()
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn source(&self) -> &Node {
        &self.source
    }

    pub fn target(&self) -> &Node {
        &self.target
    }

    /// Interior nodes in id order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeRef) -> Option<&Node> {
        match id {
            NodeRef::Source => Some(&self.source),
            NodeRef::Target => Some(&self.target),
            NodeRef::Interior(i) => self.nodes.get(i),
        }
    }

    fn node_mut(&mut self, id: NodeRef) -> Option<&mut Node> {
        match id {
            NodeRef::Source => Some(&mut self.source),
            NodeRef::Target => Some(&mut self.target),
            NodeRef::Interior(i) => self.nodes.get_mut(i),
        }
    }

    pub fn edge(&self, key: &EdgeKey) -> Result<&Edge, TopologyError> {
        self.topology.get(key)
    }

    pub fn edge_mut(&mut self, key: &EdgeKey) -> Result<&mut Edge, TopologyError> {
        self.topology.get_mut(key)
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.topology.contains(key)
    }

    /// Visit every edge mutably in edge-index order
    pub fn for_each_edge_mut<F>(&mut self, f: F)
    where
        F: FnMut(&EdgeKey, &mut Edge),
    {
        self.topology.for_each_mut(f);
    }

    /// Node ids, optionally prefixed by source and target
    pub fn populate_node_ids(&self, include_sentinels: bool) -> Vec<NodeRef> {
        let mut ids = Vec::with_capacity(self.nodes.len() + 2);
        if include_sentinels {
            ids.extend([NodeRef::Source, NodeRef::Target]);
        }
        ids.extend(self.nodes.iter().map(|n| n.id));
        ids
    }

    /// Remove self-loops, edges into the source or out of the target, and
    /// net opposite edges. Returns the number of edges removed.
    pub fn pruning(&mut self) -> usize {
        let removed = self.topology.pruning(true, true);
        if removed > 0 {
            self.rebuild_adjacency();
        }
        removed
    }

    /// Add a reverse edge for every edge lacking one, with a capacity drawn
    /// up to the flow upper bound. Returns the number of edges added.
    pub fn fullconnected(&mut self, random: &mut RandomSource) -> usize {
        let range = Interval::ordered(0.0, self.get_flow_upperbound());
        let added = self.topology.fullconnected(range, random);
        if added > 0 {
            self.rebuild_adjacency();
        }
        added
    }

    /// Total flow leaving the source
    pub fn get_flow(&self) -> f64 {
        self.source
            .next
            .iter()
            .filter_map(|&n| self.topology.get(&EdgeKey::new(NodeRef::Source, n)).ok())
            .map(|e| e.flow)
            .sum()
    }

    /// `min(source out-capacity, target in-capacity)`
    pub fn get_flow_upperbound(&self) -> f64 {
        let out_capacity: f64 = self
            .source
            .next
            .iter()
            .filter_map(|&n| self.topology.get(&EdgeKey::new(NodeRef::Source, n)).ok())
            .map(|e| e.capacity)
            .sum();
        let in_capacity: f64 = self
            .target
            .prev
            .iter()
            .filter_map(|&n| self.topology.get(&EdgeKey::new(n, NodeRef::Target)).ok())
            .map(|e| e.capacity)
            .sum();
        out_capacity.min(in_capacity)
    }

    /// Build one walk from the source.
    ///
    /// `select_next` receives the network, the current node and the walk so
    /// far, and returns the next node or `None` to stop. Every traversed
    /// edge has its counter incremented. The walk ends at the target, when
    /// the selector gives up, or after `max_size` steps when `max_size > 0`.
    pub fn navigate<F>(&mut self, mut select_next: F, max_size: i64) -> Result<Path, TopologyError>
    where
        F: FnMut(&Network, NodeRef, &Path) -> Option<NodeRef>,
    {
        let mut path = Path::from_nodes(vec![NodeRef::Source]);
        let mut current = NodeRef::Source;
        let mut steps = 0;

        while !current.is_target() && (max_size <= 0 || steps < max_size) {
            let Some(next) = select_next(&*self, current, &path) else {
                break;
            };
            self.topology.get_mut(&EdgeKey::new(current, next))?.counter += 1;
            path.push(next);
            current = next;
            steps += 1;
        }
        Ok(path)
    }

    /// Remove cycles from a walk in one pass.
    ///
    /// A first visit paints the node green and keeps it; a revisit unwinds
    /// the kept nodes back to, and including, the first occurrence.
    pub fn normalize_path(&mut self, path: &Path) -> Path {
        self.reset(ResetOptions::colors_only());

        let mut kept: Vec<NodeRef> = Vec::with_capacity(path.len());
        let mut index = 0;
        while index < path.len() {
            let node = path.nodes()[index];
            let color = self.node(node).map_or(NodeColor::White, |n| n.color);
            if color == NodeColor::Green {
                while let Some(top) = kept.pop() {
                    self.set_color(top, NodeColor::White);
                    if top == node {
                        break;
                    }
                }
            } else {
                self.set_color(node, NodeColor::Green);
                kept.push(node);
                index += 1;
            }
        }
        Path::from_nodes(kept)
    }

    fn set_color(&mut self, id: NodeRef, color: NodeColor) {
        if let Some(node) = self.node_mut(id) {
            node.color = color;
        }
    }

    /// Smallest residual capacity along the path, `+inf` for an edgeless path
    pub fn get_min_residual_capacity(&self, path: &Path) -> Result<f64, TopologyError> {
        path.edges().try_fold(f64::INFINITY, |min, key| {
            Ok(min.min(self.topology.get(&key)?.residual_capacity()))
        })
    }

    /// Add `delta_flow` to every edge of the path
    pub fn update_flow(&mut self, path: &Path, delta_flow: f64) -> Result<(), TopologyError> {
        for key in path.edges() {
            self.topology.get_mut(&key)?.flow += delta_flow;
        }
        Ok(())
    }

    /// Edges leaving S for T; fewer than two crossing edges give an invalid
    /// cut
    pub fn compute_network_cut(&self, partition: &Partition) -> Cut {
        let s: HashSet<NodeRef> = partition
            .s_nodes()
            .iter()
            .copied()
            .chain(std::iter::once(NodeRef::Source))
            .collect();
        let t: HashSet<NodeRef> = partition
            .t_nodes()
            .iter()
            .copied()
            .chain(std::iter::once(NodeRef::Target))
            .collect();

        let edges = self
            .topology
            .keys()
            .iter()
            .enumerate()
            .filter(|(_, k)| s.contains(&k.from) && t.contains(&k.to))
            .map(|(i, _)| i)
            .collect();
        Cut::from_edges(edges)
    }

    /// Sum of the capacities of a valid cut
    pub fn compute_cut_capacity(&self, cut: &Cut) -> Option<f64> {
        if !cut.is_valid() {
            return None;
        }
        Some(
            cut.edges()
                .iter()
                .filter_map(|&i| self.topology.edge_at(i))
                .map(|e| e.capacity)
                .sum(),
        )
    }

    /// Clear the selected edge and node fields
    pub fn reset(&mut self, options: ResetOptions) {
        self.topology.for_each_mut(|_, edge| {
            if options.capacity {
                edge.capacity = 0.0;
            }
            if options.flow {
                edge.flow = 0.0;
            }
            if options.status {
                edge.tau = options.default_tau;
                edge.counter = 1;
            }
        });

        let nodes = self
            .nodes
            .iter_mut()
            .chain([&mut self.source, &mut self.target]);
        for node in nodes {
            if options.color {
                node.color = NodeColor::White;
            }
            if options.heuristic {
                node.distance_heuristic = if node.id.is_target() { 0 } else { -1 };
            }
        }
    }

    pub fn enable_all_edges(&mut self) {
        self.topology.for_each_mut(|_, edge| edge.enabled = true);
    }

    /// Disable an edge; returns whether it was enabled
    pub fn disable_edge(&mut self, key: &EdgeKey) -> Result<bool, TopologyError> {
        let edge = self.topology.get_mut(key)?;
        let was_enabled = edge.enabled;
        edge.enabled = false;
        Ok(was_enabled)
    }

    /// Enable an edge; returns whether it was disabled
    pub fn enable_edge(&mut self, key: &EdgeKey) -> Result<bool, TopologyError> {
        let edge = self.topology.get_mut(key)?;
        let was_disabled = !edge.enabled;
        edge.enabled = true;
        Ok(was_disabled)
    }

    /// Disable each internal edge with probability `prob`. Returns the number
    /// of edges newly disabled.
    pub fn disable_random_edges(&mut self, prob: f64, random: &mut RandomSource) -> usize {
        let mut disabled = 0;
        self.topology.for_each_mut(|key, edge| {
            if key.is_internal() && random.prob(prob) {
                if edge.enabled {
                    disabled += 1;
                }
                edge.enabled = false;
            }
        });
        disabled
    }

    /// Record advisory distance-to-target estimates from a walk.
    ///
    /// A walk that misses the target pins its last node at a pessimistic
    /// distance; earlier nodes get the distance implied by their position
    /// unless they already hold a smaller one.
    pub fn update_heuristic_distance(&mut self, path: &Path) {
        let Some(&last) = path.last() else {
            return;
        };
        let size = path.len() as i64;
        let mut end_value = size;

        if !last.is_target() {
            let upper = ((self.count_edges() as f64 * 0.7) as i64).max(size);
            if let Some(node) = self.node_mut(last) {
                node.distance_heuristic = upper;
            }
            end_value = upper - 1;
        }

        for (j, &id) in path.nodes()[..path.len() - 1].iter().enumerate() {
            let estimate = end_value - j as i64;
            if let Some(node) = self.node_mut(id) {
                if node.distance_heuristic < 0 || node.distance_heuristic > estimate {
                    node.distance_heuristic = estimate;
                }
            }
        }
    }

    /// Dense `(N + 2) x (N + 2)` capacity matrix; source at 0, target at 1
    pub fn residual_matrix(&self) -> ResidualMatrix {
        let n = self.nodes.len() + 2;
        let mut capacity = vec![vec![0.0; n]; n];
        for (key, edge) in self.topology.iter() {
            if let Some(cell) = capacity
                .get_mut(key.from.dense_index())
                .and_then(|row| row.get_mut(key.to.dense_index()))
            {
                *cell = edge.capacity;
            }
        }
        ResidualMatrix {
            capacity,
            source: NodeRef::Source.dense_index(),
            target: NodeRef::Target.dense_index(),
        }
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            nodes: self.count_nodes(),
            edges: self.count_edges(),
            flow_upperbound: self.get_flow_upperbound(),
        }
    }

    /// Insert an edge, accumulating capacity if it exists; adjacency lists
    /// only grow when the edge is new
    fn connect(&mut self, from: NodeRef, to: NodeRef, capacity: f64) -> bool {
        let created = self.topology.link(from, to, capacity, true);
        if created {
            self.push_adjacency(from, to);
        }
        created
    }

    fn push_adjacency(&mut self, from: NodeRef, to: NodeRef) {
        if let Some(node) = self.node_mut(from) {
            node.next.push(to);
        }
        if let Some(node) = self.node_mut(to) {
            node.prev.push(from);
        }
    }

    fn rebuild_adjacency(&mut self) {
        for node in self
            .nodes
            .iter_mut()
            .chain([&mut self.source, &mut self.target])
        {
            node.next.clear();
            node.prev.clear();
        }
        let keys = self.topology.keys().to_vec();
        for key in keys {
            self.push_adjacency(key.from, key.to);
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const A: NodeRef = NodeRef::Interior(0);
    const B: NodeRef = NodeRef::Interior(1);

    fn diamond() -> Network {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, A, 10.0, true);
        topology.link(NodeRef::Source, B, 10.0, true);
        topology.link(A, NodeRef::Target, 5.0, true);
        topology.link(B, NodeRef::Target, 7.0, true);
        topology.link(A, B, 3.0, true);
        Network::from_topology(&topology)
    }

    #[test]
    fn test_from_topology_remaps_sparse_ids() {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, NodeRef::Interior(40), 1.0, true);
        topology.link(NodeRef::Interior(40), NodeRef::Interior(7), 2.0, true);
        topology.link(NodeRef::Interior(7), NodeRef::Target, 3.0, true);

        let network = Network::from_topology(&topology);

        assert_eq!(network.count_nodes(), 2);
        assert_eq!(network.count_edges(), 3);
        // 7 -> 0, 40 -> 1
        assert_eq!(network.edge(&EdgeKey::new(B, A)).unwrap().capacity, 2.0);
        assert_eq!(network.source().next, vec![B]);
        assert_eq!(network.target().prev, vec![A]);
    }

    #[test]
    fn test_flow_upperbound_and_summary() {
        let network = diamond();
        assert_eq!(network.get_flow_upperbound(), 12.0);
        let summary = network.summary();
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.edges, 5);
        assert!(summary.to_string().contains("UpperBoundFlow: 12"));
    }

    #[test]
    fn test_navigate_increments_counters() {
        let mut network = diamond();
        let route = [A, B, NodeRef::Target];
        let mut step = 0;
        let path = network
            .navigate(
                |_, _, _| {
                    let next = route.get(step).copied();
                    step += 1;
                    next
                },
                -1,
            )
            .unwrap();

        assert!(path.is_valid());
        assert_eq!(path.len(), 4);
        for key in path.edges() {
            assert_eq!(network.edge(&key).unwrap().counter, 2);
        }
        assert_eq!(network.edge(&EdgeKey::new(A, NodeRef::Target)).unwrap().counter, 1);
    }

    #[test]
    fn test_navigate_respects_max_size() {
        let mut network = diamond();
        let path = network
            .navigate(|net, current, _| net.node(current).and_then(|n| n.next.first().copied()), 1)
            .unwrap();
        assert_eq!(path.nodes(), &[NodeRef::Source, A]);
        assert!(!path.is_valid());
    }

    #[test]
    fn test_navigate_to_missing_edge_is_error() {
        let mut network = diamond();
        let result = network.navigate(|_, _, _| Some(NodeRef::Target), -1);
        assert!(matches!(result, Err(TopologyError::EdgeNotFound(_))));
    }

    #[test]
    fn test_normalize_path_removes_cycles() {
        let mut network = diamond();
        let walk = Path::from_nodes(vec![NodeRef::Source, A, B, A, NodeRef::Target]);
        let normalized = network.normalize_path(&walk);
        assert_eq!(normalized.nodes(), &[NodeRef::Source, A, NodeRef::Target]);
        assert_eq!(network.node(A).unwrap().color, NodeColor::Green);
        assert_eq!(network.node(B).unwrap().color, NodeColor::White);
    }

    #[test]
    fn test_min_residual_and_update_flow() {
        let mut network = diamond();
        let path = Path::from_nodes(vec![NodeRef::Source, A, B, NodeRef::Target]);
        assert_eq!(network.get_min_residual_capacity(&path).unwrap(), 3.0);

        network.update_flow(&path, 3.0).unwrap();
        assert_eq!(network.get_min_residual_capacity(&path).unwrap(), 0.0);
        assert_eq!(network.get_flow(), 3.0);
        assert!(network.edge(&EdgeKey::new(A, B)).unwrap().is_saturated());

        assert!(network.get_min_residual_capacity(&Path::new()).unwrap().is_infinite());
    }

    #[test]
    fn test_cut_capacity_includes_sentinel_edges() {
        let network = diamond();

        let partition = Partition::new(vec![A, B], 2);
        let cut = network.compute_network_cut(&partition);
        assert!(cut.is_valid());
        assert_eq!(network.compute_cut_capacity(&cut), Some(12.0));

        let partition = Partition::new(vec![A, B], 1);
        let cut = network.compute_network_cut(&partition);
        assert_relative_eq!(network.compute_cut_capacity(&cut).unwrap(), 18.0);
    }

    #[test]
    fn test_single_edge_cut_is_invalid() {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, A, 4.0, true);
        topology.link(A, NodeRef::Target, 4.0, true);
        let network = Network::from_topology(&topology);

        let cut = network.compute_network_cut(&Partition::new(vec![A], 1));
        assert!(!cut.is_valid());
        assert_eq!(network.compute_cut_capacity(&cut), None);
    }

    #[test]
    fn test_reset_preserves_capacity() {
        let mut network = diamond();
        let path = Path::from_nodes(vec![NodeRef::Source, A, NodeRef::Target]);
        network.update_flow(&path, 2.0).unwrap();
        network.edge_mut(&EdgeKey::new(NodeRef::Source, A)).unwrap().counter = 9;

        network.reset(ResetOptions {
            default_tau: 2.5,
            ..ResetOptions::default()
        });

        let edge = network.edge(&EdgeKey::new(NodeRef::Source, A)).unwrap();
        assert_eq!(edge.flow, 0.0);
        assert_eq!(edge.capacity, 10.0);
        assert_eq!(edge.tau, 2.5);
        assert_eq!(edge.counter, 1);
        assert_eq!(network.target().distance_heuristic, 0);
        assert_eq!(network.source().distance_heuristic, -1);
    }

    #[test]
    fn test_pruning_rebuilds_adjacency() {
        let mut network = diamond();
        let mut random = RandomSource::new(4);
        let added = network.fullconnected(&mut random);
        assert_eq!(added, 5);
        assert!(network.node(A).unwrap().prev.contains(&B));

        let removed = network.pruning();
        assert!(removed >= 4);
        for (key, _) in network.topology().iter() {
            assert!(network.node(key.from).unwrap().next.contains(&key.to));
            assert!(network.node(key.to).unwrap().prev.contains(&key.from));
        }
        let adjacency: usize = network.nodes().iter().map(|n| n.next.len()).sum::<usize>()
            + network.source().next.len()
            + network.target().next.len();
        assert_eq!(adjacency, network.count_edges());
    }

    #[test]
    fn test_disable_random_edges_spares_sentinel_edges() {
        let mut network = diamond();
        let mut random = RandomSource::new(8);
        assert_eq!(network.disable_random_edges(1.0, &mut random), 1);
        assert!(!network.edge(&EdgeKey::new(A, B)).unwrap().enabled);
        assert_eq!(network.count_enabled_edges(), 4);

        assert!(network.enable_edge(&EdgeKey::new(A, B)).unwrap());
        assert!(network.disable_edge(&EdgeKey::new(A, B)).unwrap());
        network.enable_all_edges();
        assert_eq!(network.count_enabled_edges(), 5);
    }

    #[test]
    fn test_residual_matrix_layout() {
        let matrix = diamond().residual_matrix();
        assert_eq!(matrix.capacity.len(), 4);
        assert_eq!(matrix.source, 0);
        assert_eq!(matrix.target, 1);
        assert_eq!(matrix.capacity[0][2], 10.0);
        assert_eq!(matrix.capacity[2][3], 3.0);
        assert_eq!(matrix.capacity[3][1], 7.0);
        assert_eq!(matrix.capacity[1][0], 0.0);
    }

    #[test]
    fn test_update_heuristic_distance() {
        let mut network = diamond();
        network.reset(ResetOptions::default());
        let path = Path::from_nodes(vec![NodeRef::Source, A, B, NodeRef::Target]);
        network.update_heuristic_distance(&path);
        assert_eq!(network.source().distance_heuristic, 4);
        assert_eq!(network.node(A).unwrap().distance_heuristic, 3);
        assert_eq!(network.node(B).unwrap().distance_heuristic, 2);

        let dead_end = Path::from_nodes(vec![NodeRef::Source, A]);
        network.update_heuristic_distance(&dead_end);
        // max(5 * 0.7, 2) = 3 pins A; the source drops to the smaller estimate.
        assert_eq!(network.node(A).unwrap().distance_heuristic, 3);
        assert_eq!(network.source().distance_heuristic, 2);
    }

    #[test]
    fn test_generate_is_connected_and_reproducible() {
        let options = GeneratorOptions {
            count_node: 40,
            count_layer: 5,
            delta_node_layer: 2,
            ..GeneratorOptions::default()
        };
        let network = Network::generate(&options, &mut RandomSource::new(21)).unwrap();

        assert_eq!(network.count_nodes(), 40);
        assert!(!network.source().next.is_empty());
        assert!(!network.target().prev.is_empty());
        for node in network.nodes() {
            assert!(!node.prev.is_empty(), "node {} has no predecessor", node.id);
            assert!(!node.next.is_empty(), "node {} has no successor", node.id);
            let unique: HashSet<_> = node.next.iter().collect();
            assert_eq!(unique.len(), node.next.len());
        }
        for (key, edge) in network.topology().iter() {
            assert!(!key.is_self_loop());
            assert!(edge.capacity >= 0.0);
        }

        let again = Network::generate(&options, &mut RandomSource::new(21)).unwrap();
        assert_eq!(again.topology().keys(), network.topology().keys());
    }

    #[test]
    fn test_generator_options_parsing() {
        let mut arguments = HashMap::new();
        arguments.insert("countNode".to_string(), "30".to_string());
        arguments.insert("countEdgeForNode".to_string(), "4".to_string());
        arguments.insert("capacityEdge".to_string(), "1:9".to_string());
        let options = GeneratorOptions::from_arguments(&arguments).unwrap();

        assert_eq!(options.count_node, 30);
        assert_eq!(options.count_edge_for_node, Interval::ordered(1, 4));
        assert_eq!(options.capacity_edge, Interval::ordered(1.0, 9.0));

        let mut options = GeneratorOptions::default();
        assert!(options.set_parameter("countNode", "many").is_err());
        assert!(options.set_parameter("colour", "1").is_err());
        options.count_layer = 0;
        assert!(options.validate().is_err());
    }
}
