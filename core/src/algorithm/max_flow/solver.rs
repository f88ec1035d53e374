//! Shared solver core
//!
//! State every solver carries regardless of its algorithm: the lifecycle
//! state, the owned network, the random source, the statistics sequence and
//! the index of the best statistic so far.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;

use crate::algorithm::statistics::Statistic;
use crate::algorithm::traits::{Objective, Solution, SolverError, SolverMethod, SolverState};
use crate::data_structures::network::{Network, NetworkSummary, ResetOptions};
use crate::math::random::RandomSource;

/// Lifecycle, network, randomness and statistics of one solver
#[derive(Debug)]
pub struct SolverCore {
    method: SolverMethod,
    state: SolverState,
    pub(crate) random: RandomSource,
    pub(crate) network: Network,
    statistics: Vec<Statistic>,
    best_index: Option<usize>,
    pub(crate) iteration: usize,
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl SolverCore {
    /// Fresh core in `Init`, seeded from entropy
    pub fn new(method: SolverMethod) -> Self {
        Self {
            method,
            state: SolverState::Init,
            random: RandomSource::from_entropy(),
            network: Network::new(),
            statistics: Vec::new(),
            best_index: None,
            iteration: 0,
            started: None,
            finished: None,
        }
    }

    #[inline]
    pub fn state(&self) -> SolverState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SolverState) {
        self.state = state;
    }

    /// Fail unless the current state is one of `allowed`
    pub fn require_state(&self, operation: &str, allowed: &[SolverState]) -> Result<(), SolverError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SolverError::InvalidState {
                operation: operation.to_string(),
                state: self.state,
            })
        }
    }

    /// Restart the random sequence from a fixed seed
    pub fn set_seed(&mut self, seed: u64) {
        self.random.reseed(seed);
    }

    pub fn seed(&self) -> u64 {
        self.random.seed()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub(crate) fn set_network(&mut self, network: Network) {
        self.network = network;
    }

    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    pub fn best(&self) -> Option<&Statistic> {
        self.best_index.and_then(|i| self.statistics.get(i))
    }

    /// Current iteration counter
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn execution_time(&self) -> Option<Duration> {
        match (self.state, self.started, self.finished) {
            (SolverState::Computed, Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }

    /// Enter `Computing`; only allowed from `Ready`
    pub(crate) fn begin(&mut self) -> Result<(), SolverError> {
        self.require_state("solve", &[SolverState::Ready])?;
        self.state = SolverState::Computing;
        self.started = Some(Instant::now());
        self.finished = None;
        info!(
            "Start {} solver: {} nodes, {} edges, seed {}",
            self.method,
            self.network.count_nodes(),
            self.network.count_edges(),
            self.random.seed()
        );
        Ok(())
    }

    /// Enter `Computed`
    pub(crate) fn finish(&mut self) {
        self.state = SolverState::Computed;
        self.finished = Some(Instant::now());
        let elapsed = self.execution_time().unwrap_or_default();
        match self.best() {
            Some(best) => info!(
                "{} solver finished in {:.3}ms after {} iterations, best fitness {}",
                self.method,
                elapsed.as_secs_f64() * 1000.0,
                self.statistics.len(),
                best.fitness
            ),
            None => info!(
                "{} solver finished in {:.3}ms without a valid result",
                self.method,
                elapsed.as_secs_f64() * 1000.0
            ),
        }
    }

    /// Append a statistic and promote it to best if it carries a solution
    /// that strictly improves on the incumbent
    pub(crate) fn push_statistic(&mut self, statistic: Statistic, objective: Objective) {
        let improves = statistic.solution.is_some()
            && match self.best() {
                Some(best) => objective.is_better(statistic.fitness, best.fitness),
                None => true,
            };
        self.statistics.push(statistic);
        if improves {
            self.best_index = Some(self.statistics.len() - 1);
        }
    }

    /// Clear results and flow, re-enable every edge, keep capacities, and
    /// replay the seed
    pub(crate) fn reset(&mut self) {
        self.network.reset(ResetOptions::default());
        self.network.enable_all_edges();
        self.statistics.clear();
        self.best_index = None;
        self.iteration = 0;
        self.started = None;
        self.finished = None;
        let seed = self.random.seed();
        self.random.reseed(seed);
        if self.state != SolverState::Init {
            self.state = SolverState::Ready;
        }
    }

    /// Drop everything, network included, and return to `Init`
    pub(crate) fn dispose(&mut self) {
        self.reset();
        self.network = Network::new();
        self.state = SolverState::Init;
    }

    /// JSON document describing the solver input
    pub(crate) fn describe<T: Serialize>(&self, options: &T) -> String {
        #[derive(Serialize)]
        struct Input<'a, T> {
            method: SolverMethod,
            state: SolverState,
            seed: u64,
            options: &'a T,
            network: NetworkSummary,
        }
        crate::algorithm::traits::render_json(&Input {
            method: self.method,
            state: self.state,
            seed: self.random.seed(),
            options,
            network: self.network.summary(),
        })
    }
}

/// Per-edge flow assignment, the solution of the flow-based solvers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSolution {
    /// Flow of each edge in edge-index order
    pub flows: Vec<f64>,
    pub max_flow: f64,
}

impl FlowSolution {
    /// Snapshot the current flow of a network
    pub fn from_network(network: &Network) -> Self {
        Self {
            flows: network.topology().iter().map(|(_, e)| e.flow).collect(),
            max_flow: network.get_flow(),
        }
    }

    fn format_flows(&self) -> String {
        let flows: Vec<String> = self.flows.iter().map(|f| format!("{}", f)).collect();
        format!("[{}]", flows.join(","))
    }
}

impl Display for FlowSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\tCount edges: {}", self.flows.len())?;
        writeln!(f, "\tMax flow: {}", self.max_flow)?;
        write!(f, "\tFlows: {}", self.format_flows())
    }
}

impl Solution for FlowSolution {
    fn fitness(&self) -> f64 {
        self.max_flow
    }

    fn objective(&self) -> Objective {
        Objective::Maximize
    }

    fn to_compact_string(&self) -> String {
        self.format_flows()
    }
}
