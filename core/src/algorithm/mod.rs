//! FLOWNET solver framework
//!
//! The shared solver lifecycle and statistics live here; the solvers
//! themselves are in [`max_flow`].
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod max_flow;
pub mod statistics;
pub mod traits;

pub use self::statistics::{Statistic, StatisticRow};
pub use self::traits::{FlowSolver, Objective, Solution, SolverError, SolverMethod, SolverState};
