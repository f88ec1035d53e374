//! Directed capacitated topology
//!
//! The topology is the owning container of every edge of a network. Edges
//! are keyed by the ordered pair of their endpoints, so a pair appears at
//! most once; linking an existing pair can accumulate its capacity instead.
//! Alongside the hash map the topology keeps an insertion-ordered key list
//! which gives edges a stable index and a deterministic iteration order.
//! The two are kept in sync: removals rebuild the list from the map.
//!
//! Nodes are referenced through [`NodeRef`], which separates the two
//! sentinel nodes (source and target) from the dense interior ids.
//!
//! The persisted form is a plain edge list:
//!
//! ```text
//! <unique node count>
//! <edge count>
//! <source external id>
//! <target external id>
//! <from> <to> <capacity>
//! ...
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::math::random::RandomSource;
use crate::math::range::Interval;

/// External id written for the source sentinel
pub const SOURCE_EXTERNAL_ID: i64 = -2;

/// External id written for the target sentinel
pub const TARGET_EXTERNAL_ID: i64 = -1;

/// Topology errors
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed topology at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeKey),

    #[error("Invalid node id: {0}")]
    InvalidNode(i64),

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Reference to a node of a network
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRef {
    /// Universal source sentinel
    Source,
    /// Universal target sentinel
    Target,
    /// Interior node with dense id
    Interior(usize),
}

impl NodeRef {
    #[inline]
    pub fn is_source(self) -> bool {
        matches!(self, NodeRef::Source)
    }

    #[inline]
    pub fn is_target(self) -> bool {
        matches!(self, NodeRef::Target)
    }

    #[inline]
    pub fn is_sentinel(self) -> bool {
        !matches!(self, NodeRef::Interior(_))
    }

    /// Id used in persisted edge lists
    pub fn external_id(self) -> i64 {
        match self {
            NodeRef::Source => SOURCE_EXTERNAL_ID,
            NodeRef::Target => TARGET_EXTERNAL_ID,
            NodeRef::Interior(i) => i as i64,
        }
    }

    /// Index in the dense `(N + 2)` numbering: source 0, target 1,
    /// interior `i` at `i + 2`
    pub fn dense_index(self) -> usize {
        match self {
            NodeRef::Source => 0,
            NodeRef::Target => 1,
            NodeRef::Interior(i) => i + 2,
        }
    }

    /// Inverse of [`NodeRef::dense_index`]
    pub fn from_dense_index(index: usize) -> Self {
        match index {
            0 => NodeRef::Source,
            1 => NodeRef::Target,
            i => NodeRef::Interior(i - 2),
        }
    }
}

impl Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Source => write!(f, "s"),
            NodeRef::Target => write!(f, "t"),
            NodeRef::Interior(i) => write!(f, "{}", i),
        }
    }
}

/// Ordered endpoint pair identifying an edge
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: NodeRef,
    pub to: NodeRef,
}

impl EdgeKey {
    #[inline]
    pub fn new(from: NodeRef, to: NodeRef) -> Self {
        Self { from, to }
    }

    /// Key of the opposite edge
    #[inline]
    pub fn reversed(self) -> Self {
        Self::new(self.to, self.from)
    }

    #[inline]
    pub fn is_self_loop(self) -> bool {
        self.from == self.to
    }

    /// Neither leaves the source nor enters the target
    #[inline]
    pub fn is_internal(self) -> bool {
        !self.from.is_source() && !self.to.is_target()
    }
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.from, self.to)
    }
}

/// Edge state: capacity, flow and the heuristic trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Maximum flow the edge can carry
    pub capacity: f64,
    /// Current flow, `0 <= flow <= capacity`
    pub flow: f64,
    /// Pheromone trail
    pub tau: f64,
    /// Disabled edges are never chosen by path construction
    pub enabled: bool,
    /// Traversal counter, never below 1
    pub counter: u64,
}

impl Edge {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity,
            flow: 0.0,
            tau: 0.0,
            enabled: true,
            counter: 1,
        }
    }

    /// `capacity - flow`, zero once saturated
    #[inline]
    pub fn residual_capacity(&self) -> f64 {
        if self.flow >= self.capacity {
            0.0
        } else {
            self.capacity - self.flow
        }
    }

    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.flow >= self.capacity
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{enabled={}, tau={:.6}, counter={}, ({:.6}/{:.6})}}",
            self.enabled, self.tau, self.counter, self.flow, self.capacity
        )
    }
}

/// Edge container keyed by endpoint pair with a stable edge order
#[derive(Debug, Clone, Default)]
pub struct Topology {
    keys: Vec<EdgeKey>,
    map: HashMap<EdgeKey, Edge>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edges
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of enabled edges
    pub fn len_enabled(&self) -> usize {
        self.map.values().filter(|e| e.enabled).count()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.map.clear();
    }

    #[inline]
    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.map.contains_key(key)
    }

    /// Edge by key; an absent key is an error
    pub fn get(&self, key: &EdgeKey) -> Result<&Edge, TopologyError> {
        self.map.get(key).ok_or(TopologyError::EdgeNotFound(*key))
    }

    /// Mutable edge by key; an absent key is an error
    pub fn get_mut(&mut self, key: &EdgeKey) -> Result<&mut Edge, TopologyError> {
        self.map.get_mut(key).ok_or(TopologyError::EdgeNotFound(*key))
    }

    /// Key of the edge with the given index
    #[inline]
    pub fn key_at(&self, index: usize) -> Option<&EdgeKey> {
        self.keys.get(index)
    }

    /// Edge with the given index
    pub fn edge_at(&self, index: usize) -> Option<&Edge> {
        self.keys.get(index).and_then(|k| self.map.get(k))
    }

    /// Keys in edge-index order
    #[inline]
    pub fn keys(&self) -> &[EdgeKey] {
        &self.keys
    }

    /// Edges in edge-index order
    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &Edge)> + '_ {
        self.keys
            .iter()
            .filter_map(move |k| self.map.get(k).map(|e| (k, e)))
    }

    /// Visit every edge mutably in edge-index order
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&EdgeKey, &mut Edge),
    {
        for key in &self.keys {
            if let Some(edge) = self.map.get_mut(key) {
                f(key, edge);
            }
        }
    }

    /// Insert an edge, or accumulate capacity into an existing one when
    /// `increase_if_exists` is set. Returns whether a new edge was created.
    pub fn link(&mut self, from: NodeRef, to: NodeRef, capacity: f64, increase_if_exists: bool) -> bool {
        let key = EdgeKey::new(from, to);
        match self.map.get_mut(&key) {
            None => {
                self.map.insert(key, Edge::new(capacity));
                self.keys.push(key);
                true
            }
            Some(edge) => {
                if increase_if_exists {
                    edge.capacity += capacity;
                }
                false
            }
        }
    }

    /// Remove degenerate edges and return how many were removed.
    ///
    /// Self-loops always go. With `massive`, edges entering the source or
    /// leaving the target go too. With `compact`, each pair of opposite
    /// edges is netted: the larger keeps its capacity minus the smaller's and
    /// the smaller is removed (both when equal). The surviving edge keeps its
    /// own flow and trail; nothing of the removed edge is carried over.
    pub fn pruning(&mut self, massive: bool, compact: bool) -> usize {
        let mut removed: Vec<EdgeKey> = self
            .keys
            .iter()
            .filter(|k| k.is_self_loop() || (massive && (k.to.is_source() || k.from.is_target())))
            .copied()
            .collect();
        for key in &removed {
            self.map.remove(key);
        }

        if compact {
            let mut cancelled: HashSet<EdgeKey> = HashSet::new();
            for key in &self.keys {
                if cancelled.contains(key) || !self.map.contains_key(key) {
                    continue;
                }
                let opposite = key.reversed();
                if cancelled.contains(&opposite) {
                    continue;
                }
                let (forward, backward) = match (self.map.get(key), self.map.get(&opposite)) {
                    (Some(f), Some(b)) => (f.capacity, b.capacity),
                    _ => continue,
                };

                if backward > forward {
                    if let Some(e) = self.map.get_mut(&opposite) {
                        e.capacity -= forward;
                    }
                    cancelled.insert(*key);
                } else if backward < forward {
                    if let Some(e) = self.map.get_mut(key) {
                        e.capacity -= backward;
                    }
                    cancelled.insert(opposite);
                } else {
                    cancelled.insert(*key);
                    cancelled.insert(opposite);
                }
            }

            for key in &cancelled {
                self.map.remove(key);
            }
            removed.extend(cancelled);
        }

        if !removed.is_empty() {
            self.update_keys_by_map();
        }
        removed.len()
    }

    /// Add the reverse of every edge that lacks one, with a capacity drawn
    /// from `capacity_range`. Returns the number of edges added.
    pub fn fullconnected(&mut self, capacity_range: Interval<f64>, random: &mut RandomSource) -> usize {
        let snapshot = self.keys.clone();
        snapshot
            .into_iter()
            .filter(|key| {
                let capacity = random.get_double(capacity_range);
                self.link(key.to, key.from, capacity, false)
            })
            .count()
    }

    /// Number of distinct nodes touched by an edge
    pub fn unique_nodes(&self) -> usize {
        self.keys
            .iter()
            .flat_map(|k| [k.from, k.to])
            .collect::<HashSet<_>>()
            .len()
    }

    /// Read an edge list from a file
    pub fn read<P: AsRef<FsPath>>(path: P) -> Result<Self, TopologyError> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Parse an edge list.
    ///
    /// Blank lines are skipped and edge lines with fewer than three fields
    /// are ignored. Ids equal to the declared source/target map to the
    /// sentinels; every other id must be non-negative.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, TopologyError> {
        let mut topology = Topology::new();
        let mut source_id = SOURCE_EXTERNAL_ID;
        let mut target_id = TARGET_EXTERNAL_ID;
        let mut line_index = 0;

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            line_index += 1;
            let line_number = number + 1;

            match line_index {
                1 | 2 => {
                    parse_field::<u64>(line, line_number)?;
                }
                3 => source_id = parse_field::<i64>(line, line_number)?,
                4 => target_id = parse_field::<i64>(line, line_number)?,
                _ => {
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    if fields.len() < 3 {
                        continue;
                    }
                    let from = parse_field::<i64>(fields[0], line_number)?;
                    let to = parse_field::<i64>(fields[1], line_number)?;
                    let capacity = parse_field::<f64>(fields[2], line_number)?;
                    if !(capacity.is_finite() && capacity >= 0.0) {
                        return Err(TopologyError::Parse {
                            line: line_number,
                            reason: format!("capacity must be finite and non-negative, got '{}'", fields[2]),
                        });
                    }

                    let from = normalize_node_id(from, source_id, target_id)?;
                    let to = normalize_node_id(to, source_id, target_id)?;
                    topology.link(from, to, capacity, true);
                }
            }
        }

        if line_index < 4 {
            return Err(TopologyError::Parse {
                line: line_index,
                reason: "missing header (node count, edge count, source, target)".to_string(),
            });
        }
        Ok(topology)
    }

    /// Write the edge list to a file
    pub fn write<P: AsRef<FsPath>>(&self, path: P) -> Result<(), TopologyError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the edge list; sentinels are emitted as their internal constants
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), TopologyError> {
        writeln!(writer, "{}", self.unique_nodes())?;
        writeln!(writer, "{}", self.len())?;
        writeln!(writer, "{}", SOURCE_EXTERNAL_ID)?;
        writeln!(writer, "{}", TARGET_EXTERNAL_ID)?;
        for (key, edge) in self.iter() {
            writeln!(
                writer,
                "{} {} {}",
                key.from.external_id(),
                key.to.external_id(),
                edge.capacity
            )?;
        }
        Ok(())
    }

    fn update_keys_by_map(&mut self) {
        let map = &self.map;
        self.keys.retain(|k| map.contains_key(k));
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, line: usize) -> Result<T, TopologyError> {
    field.trim().parse::<T>().map_err(|_| TopologyError::Parse {
        line,
        reason: format!("cannot parse '{}'", field),
    })
}

fn normalize_node_id(id: i64, source_id: i64, target_id: i64) -> Result<NodeRef, TopologyError> {
    if id == source_id {
        Ok(NodeRef::Source)
    } else if id == target_id {
        Ok(NodeRef::Target)
    } else if id >= 0 {
        Ok(NodeRef::Interior(id as usize))
    } else {
        Err(TopologyError::InvalidNode(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const A: NodeRef = NodeRef::Interior(0);
    const B: NodeRef = NodeRef::Interior(1);

    #[test]
    fn test_link_accumulates_without_duplicates() {
        let mut topology = Topology::new();
        assert!(topology.link(A, B, 4.0, true));
        assert!(!topology.link(A, B, 3.0, true));
        assert!(!topology.link(A, B, 100.0, false));

        assert_eq!(topology.len(), 1);
        assert_eq!(topology.get(&EdgeKey::new(A, B)).unwrap().capacity, 7.0);
    }

    #[test]
    fn test_get_missing_edge_is_error() {
        let topology = Topology::new();
        let err = topology.get(&EdgeKey::new(A, B)).unwrap_err();
        assert!(matches!(err, TopologyError::EdgeNotFound(_)));
    }

    #[test]
    fn test_pruning_nets_opposite_edges_and_self_loops() {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, A, 10.0, true);
        topology.link(A, A, 1.0, true);
        topology.link(A, B, 5.0, true);
        topology.link(B, A, 3.0, true);
        topology.link(B, NodeRef::Target, 10.0, true);

        let removed = topology.pruning(true, true);

        assert_eq!(removed, 2);
        assert_eq!(topology.len(), 3);
        assert!(!topology.contains(&EdgeKey::new(A, A)));
        assert!(!topology.contains(&EdgeKey::new(B, A)));
        assert_eq!(topology.get(&EdgeKey::new(A, B)).unwrap().capacity, 2.0);
        // Key order survives removal.
        assert_eq!(
            topology.keys(),
            &[
                EdgeKey::new(NodeRef::Source, A),
                EdgeKey::new(A, B),
                EdgeKey::new(B, NodeRef::Target)
            ]
        );
    }

    #[test]
    fn test_pruning_massive_drops_edges_into_source_and_out_of_target() {
        let mut topology = Topology::new();
        topology.link(A, NodeRef::Source, 1.0, true);
        topology.link(NodeRef::Target, B, 1.0, true);
        topology.link(A, B, 1.0, true);

        assert_eq!(topology.clone().pruning(false, false), 0);
        assert_eq!(topology.pruning(true, false), 2);
        assert_eq!(topology.len(), 1);
    }

    #[test]
    fn test_pruning_equal_opposite_edges_removes_both() {
        let mut topology = Topology::new();
        topology.link(A, B, 4.0, true);
        topology.link(B, A, 4.0, true);
        assert_eq!(topology.pruning(false, true), 2);
        assert!(topology.is_empty());
    }

    #[test]
    fn test_fullconnected_adds_missing_reverse_edges() {
        let mut topology = Topology::new();
        topology.link(A, B, 5.0, true);
        topology.link(B, A, 2.0, true);
        topology.link(B, NodeRef::Target, 5.0, true);

        let mut random = RandomSource::new(1);
        let added = topology.fullconnected(Interval::new(0.0, 3.0).unwrap(), &mut random);

        assert_eq!(added, 1);
        assert_eq!(topology.len(), 4);
        let reverse = topology.get(&EdgeKey::new(NodeRef::Target, B)).unwrap();
        assert!(reverse.capacity >= 0.0 && reverse.capacity < 3.0);
        assert_eq!(topology.get(&EdgeKey::new(B, A)).unwrap().capacity, 2.0);
    }

    #[test]
    fn test_parse_remaps_declared_sentinels() {
        let text = "4\n3\n\n10\n20\n10 1 5.5\n1 2 3\n2 20 4\nbad\n";
        let topology = Topology::parse(Cursor::new(text)).unwrap();

        assert_eq!(topology.len(), 3);
        assert_eq!(
            topology.get(&EdgeKey::new(NodeRef::Source, NodeRef::Interior(1))).unwrap().capacity,
            5.5
        );
        assert!(topology.contains(&EdgeKey::new(NodeRef::Interior(2), NodeRef::Target)));
        assert_eq!(topology.unique_nodes(), 4);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            Topology::parse(Cursor::new("2\n1\n")),
            Err(TopologyError::Parse { .. })
        ));
        assert!(matches!(
            Topology::parse(Cursor::new("2\n1\n0\n1\nx 1 2\n")),
            Err(TopologyError::Parse { .. })
        ));
        assert!(matches!(
            Topology::parse(Cursor::new("2\n1\n0\n1\n-7 1 2\n")),
            Err(TopologyError::InvalidNode(-7))
        ));
        for capacity in ["-5", "NaN", "inf"] {
            let text = format!("2\n1\n0\n1\n0 1 {}\n", capacity);
            assert!(matches!(
                Topology::parse(Cursor::new(text)),
                Err(TopologyError::Parse { line: 5, .. })
            ));
        }
    }

    #[test]
    fn test_write_then_read_file() {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, A, 10.0, true);
        topology.link(A, B, 2.5, true);
        topology.link(B, NodeRef::Target, 7.0, true);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.txt");
        topology.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("4\n3\n-2\n-1\n-2 0 10\n"));

        let loaded = Topology::read(&path).unwrap();
        assert_eq!(loaded.keys(), topology.keys());
        assert_eq!(loaded.get(&EdgeKey::new(A, B)).unwrap().capacity, 2.5);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Topology::read(dir.path().join("absent.txt"));
        assert!(matches!(result, Err(TopologyError::Io(_))));
    }

    #[test]
    fn test_dense_index_round_trip() {
        for node in [NodeRef::Source, NodeRef::Target, NodeRef::Interior(0), NodeRef::Interior(9)] {
            assert_eq!(NodeRef::from_dense_index(node.dense_index()), node);
        }
        assert_eq!(NodeRef::Interior(3).external_id(), 3);
        assert_eq!(NodeRef::Source.external_id(), SOURCE_EXTERNAL_ID);
    }
}
