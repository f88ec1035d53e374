//! Maximum-flow solvers
//!
//! Three interchangeable implementations of [`FlowSolver`]:
//! - [`FordFulkersonSolver`]: exact, breadth-first augmenting paths
//! - [`AntColonySolver`]: pheromone guided path construction
//! - [`ImmuneSolver`]: clonal selection over node bipartitions, searching
//!   for a minimum cut
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod ant_colony;
pub mod ford_fulkerson;
pub mod immune;
pub mod solver;

pub use self::ant_colony::{AntColonyOptions, AntColonySolver};
pub use self::ford_fulkerson::FordFulkersonSolver;
pub use self::immune::{CutSolution, ImmuneCandidate, ImmuneOptions, ImmuneSolver, SelectionKey};
pub use self::solver::{FlowSolution, SolverCore};

use crate::algorithm::traits::{FlowSolver, SolverMethod};

/// Create a solver in `Init` state for the given method
pub fn create_solver(method: SolverMethod) -> Box<dyn FlowSolver> {
    match method {
        SolverMethod::Immune => Box::new(ImmuneSolver::new()),
        SolverMethod::AntColony => Box::new(AntColonySolver::new()),
        SolverMethod::FordFulkerson => Box::new(FordFulkersonSolver::new()),
    }
}
