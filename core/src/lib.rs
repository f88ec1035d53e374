//! FLOWNET Core
//!
//! Directed capacitated networks and three interchangeable maximum-flow
//! solvers: an exact augmenting-path solver (Ford-Fulkerson), a pheromone
//! guided Ant Colony heuristic, and an Artificial Immune System that searches
//! the space of node bipartitions for a minimum cut.
//!
//! Layering, leaf first:
//! - [`math`]: seeded randomness, inclusive intervals, trend regression
//! - [`data_structures`]: topology, partitions and cuts, the network model
//! - [`algorithm`]: solver lifecycle, statistics, the solvers themselves
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod algorithm;
pub mod data_structures;
pub mod math;

pub use algorithm::max_flow::{
    create_solver, AntColonySolver, FordFulkersonSolver, ImmuneSolver,
};
pub use algorithm::{FlowSolver, Objective, Solution, SolverError, SolverMethod, SolverState, Statistic};
pub use data_structures::network::{GeneratorOptions, Network, Path};
pub use data_structures::topology::{Edge, EdgeKey, NodeRef, Topology, TopologyError};
pub use math::random::RandomSource;
