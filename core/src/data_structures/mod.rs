//! Graph model: edge topology, node bipartitions and the flow network
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod network;
pub mod partition;
pub mod topology;

pub use self::network::{GeneratorOptions, Network, NetworkSummary, Node, NodeColor, Path, ResetOptions, ResidualMatrix};
pub use self::partition::{Cut, Partition, PartitionMutation};
pub use self::topology::{Edge, EdgeKey, NodeRef, Topology, TopologyError};
