//! Ant Colony maximum-flow heuristic
//!
//! Each generation sends `colony_size` ants from the source. At every step an
//! ant scores the outgoing edges of its node as
//!
//! ```text
//! tau^alfa * residual^beta1 / counter^beta2
//! ```
//!
//! and picks one, by weighted draw or by maximum. An unsaturated edge into
//! the target is always taken. After the colony has moved, every edge
//! evaporates its trail and the edges walked this generation receive a
//! deposit inversely proportional to their traversal counter. The shortest
//! walk that reached the target is stripped of cycles and its bottleneck,
//! scaled by `ni`, is pushed as new flow.
//!
//! The run stops after `max_iterations` generations or when the flow reaches
//! the network's upper bound.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashSet;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::algorithm::max_flow::solver::{FlowSolution, SolverCore};
use crate::algorithm::statistics::Statistic;
use crate::algorithm::traits::{option_value, FlowSolver, Objective, SolverError, SolverMethod};
use crate::data_structures::network::{Network, Path, ResetOptions};
use crate::data_structures::topology::{Edge, EdgeKey, NodeRef};
use crate::math::parse::{parse_flag, parse_number, ParseValueError};
use crate::math::random::RandomSource;

/// Walks are cut off after this fraction of the edge count
const MAX_PATH_RATIO: f64 = 0.6;

/// Ant Colony configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntColonyOptions {
    /// Trail deposited per ant; edges start at half of it
    pub pheromone: f64,
    pub max_iterations: usize,
    pub colony_size: usize,
    /// Trail exponent
    pub alfa: f64,
    /// Residual capacity exponent
    pub beta1: f64,
    /// Traversal counter exponent
    pub beta2: f64,
    /// Evaporation rate
    pub rho: f64,
    /// Fraction of the bottleneck pushed per generation
    pub ni: f64,
    /// Always take the best scored edge instead of drawing one
    pub deterministic_selection: bool,
    /// Randomly disable walked edges between generations
    pub remove_edge: bool,
    pub remove_edge_probs: f64,
    /// Record distance estimates from the augmenting paths
    pub track_distance_heuristic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AntColonyOptions {
    fn default() -> Self {
        Self {
            pheromone: 5.0,
            max_iterations: 100,
            colony_size: 100,
            alfa: 3.0,
            beta1: 5.0,
            beta2: 5.0,
            rho: 0.5,
            ni: 1.0,
            deterministic_selection: false,
            remove_edge: false,
            remove_edge_probs: 0.2,
            track_distance_heuristic: false,
            seed: None,
        }
    }
}

impl AntColonyOptions {
    /// Canonical option name, resolving the legacy spellings
    fn canonical(name: &str) -> &str {
        match name {
            "max_interations" | "max_interation" => "max_iterations",
            other => other,
        }
    }

    /// Reject values the colony cannot run with
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.colony_size == 0 {
            return Err(SolverError::invalid_parameter("colony_size", "at least one ant is required"));
        }
        if !(0.0..=1.0).contains(&self.rho) {
            return Err(SolverError::invalid_parameter("rho", "must lie in [0, 1]"));
        }
        if !(self.pheromone >= 0.0 && self.pheromone.is_finite()) {
            return Err(SolverError::invalid_parameter("pheromone", "must be finite and non-negative"));
        }
        if !(self.ni > 0.0 && self.ni <= 1.0) {
            return Err(SolverError::invalid_parameter("ni", "must lie in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.remove_edge_probs) {
            return Err(SolverError::invalid_parameter("remove_edge_probs", "must lie in [0, 1]"));
        }
        for (name, value) in [("alfa", self.alfa), ("beta1", self.beta1), ("beta2", self.beta2)] {
            if !value.is_finite() {
                return Err(SolverError::invalid_parameter(name, "must be finite"));
            }
        }
        Ok(())
    }

    /// Desirability of an edge for an ant
    fn score(&self, edge: &Edge) -> f64 {
        if edge.is_saturated() {
            return 0.0;
        }
        let counter = edge.counter.max(1) as f64;
        edge.tau.max(0.0).powf(self.alfa) * edge.residual_capacity().powf(self.beta1) / counter.powf(self.beta2)
    }
}

/// Ant Colony solver
#[derive(Debug)]
pub struct AntColonySolver {
    core: SolverCore,
    options: AntColonyOptions,
}

impl Default for AntColonySolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AntColonySolver {
    pub fn new() -> Self {
        Self {
            core: SolverCore::new(SolverMethod::AntColony),
            options: AntColonyOptions::default(),
        }
    }

    pub fn options(&self) -> &AntColonyOptions {
        &self.options
    }

    /// Pick the next node of an ant standing on `current`
    fn select_next(
        network: &Network,
        current: NodeRef,
        options: &AntColonyOptions,
        random: &mut RandomSource,
    ) -> Option<NodeRef> {
        let node = network.node(current)?;
        let mut scores = Vec::with_capacity(node.next.len());
        for &next in &node.next {
            let score = match network.edge(&EdgeKey::new(current, next)) {
                Ok(edge) if edge.enabled => {
                    if next.is_target() && !edge.is_saturated() {
                        return Some(next);
                    }
                    options.score(edge)
                }
                _ => 0.0,
            };
            scores.push(score);
        }

        let total: f64 = scores.iter().sum();
        if !(total > 0.0) {
            return None;
        }
        if log::log_enabled!(log::Level::Trace) {
            let probabilities: Vec<String> = scores.iter().map(|s| format!("{:.4}", s / total)).collect();
            trace!("Ant at {}: candidates {:?}, p = [{}]", current, node.next, probabilities.join(", "));
        }
        // Overflowing scores cannot be sampled; fall back to the maximum
        let deterministic = options.deterministic_selection || !total.is_finite();
        random.argmax(&scores, deterministic).map(|i| node.next[i])
    }

    /// Run one generation and return its statistic
    fn generation(core: &mut SolverCore, options: &AntColonyOptions, max_path: i64) -> Result<Statistic, SolverError> {
        let mut stat = Statistic::new(core.iteration);

        let mut visited: Vec<EdgeKey> = Vec::new();
        let mut seen: HashSet<EdgeKey> = HashSet::new();
        let mut shortest: Option<Path> = None;

        for _ in 0..options.colony_size {
            let random = &mut core.random;
            let walk = core
                .network
                .navigate(|network, current, _| Self::select_next(network, current, options, random), max_path)?;
            for key in walk.edges() {
                if seen.insert(key) {
                    visited.push(key);
                }
            }
            if walk.is_valid() {
                if shortest.as_ref().map_or(true, |s| walk.len() < s.len()) {
                    shortest = Some(walk);
                }
            } else {
                stat.invalid += 1;
            }
        }

        let deposit = options.colony_size as f64 * options.pheromone;
        let rho = options.rho;
        core.network.for_each_edge_mut(|key, edge| {
            let delta_tau = if seen.contains(key) {
                deposit / edge.counter.max(1) as f64
            } else {
                0.0
            };
            edge.tau = (1.0 - rho) * edge.tau + delta_tau;
        });

        match shortest {
            Some(walk) => {
                let path = core.network.normalize_path(&walk);
                let bottleneck = core.network.get_min_residual_capacity(&path)?;
                if bottleneck.is_finite() && bottleneck > 0.0 {
                    let increment = bottleneck * options.ni;
                    core.network.update_flow(&path, increment)?;
                    stat.alfa = increment;
                }
                stat.gamma = path.len().saturating_sub(1) as f64;
                if options.track_distance_heuristic {
                    core.network.update_heuristic_distance(&path);
                }
                trace!("Augmenting path {}", path);
            }
            None => stat.beta = 1.0,
        }

        if options.remove_edge {
            core.network.enable_all_edges();
            for key in &visited {
                if core.random.prob(options.remove_edge_probs) {
                    core.network.disable_edge(key)?;
                }
            }
        }

        let network = &core.network;
        stat.fitness = network.get_flow();
        stat.avg_fitness = stat.fitness / options.colony_size as f64;
        stat.count_edges = network.count_enabled_edges();
        stat.count_nodes = network.count_nodes();
        stat.solution = Some(Box::new(FlowSolution::from_network(network)));
        stat.close();

        debug!(
            "Generation {}: flow {:.5}, increment {:.5}, invalid paths {}, edges walked {}/{}",
            stat.iteration,
            stat.fitness,
            stat.alfa,
            stat.invalid,
            visited.len(),
            network.count_edges()
        );
        Ok(stat)
    }
}

impl FlowSolver for AntColonySolver {
    fn method(&self) -> SolverMethod {
        SolverMethod::AntColony
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), SolverError> {
        let invalid = |e: ParseValueError| SolverError::invalid_parameter(name, e);
        let options = &mut self.options;
        match AntColonyOptions::canonical(name) {
            "pheromone" => options.pheromone = parse_number(value).map_err(invalid)?,
            "max_iterations" => options.max_iterations = parse_number(value).map_err(invalid)?,
            "colony_size" => options.colony_size = parse_number(value).map_err(invalid)?,
            "alfa" => options.alfa = parse_number(value).map_err(invalid)?,
            "beta1" => options.beta1 = parse_number(value).map_err(invalid)?,
            "beta2" => options.beta2 = parse_number(value).map_err(invalid)?,
            "rho" => options.rho = parse_number(value).map_err(invalid)?,
            "ni" => options.ni = parse_number(value).map_err(invalid)?,
            "deterministic_selection" => options.deterministic_selection = parse_flag(value).map_err(invalid)?,
            "remove_edge" => options.remove_edge = parse_flag(value).map_err(invalid)?,
            "remove_edge_probs" => options.remove_edge_probs = parse_number(value).map_err(invalid)?,
            "track_distance_heuristic" => options.track_distance_heuristic = parse_flag(value).map_err(invalid)?,
            "seed" => {
                let seed = parse_number(value).map_err(invalid)?;
                options.seed = Some(seed);
                self.core.set_seed(seed);
            }
            _ => return Err(SolverError::invalid_parameter(name, "unknown option")),
        }
        Ok(())
    }

    fn get_parameter(&self, name: &str) -> Option<String> {
        option_value(&self.options, AntColonyOptions::canonical(name))
    }

    fn describe_input(&self) -> String {
        self.core.describe(&self.options)
    }

    fn solve(&mut self) -> Result<(), SolverError> {
        self.options.validate()?;
        self.core.begin()?;

        let options = &self.options;
        let core = &mut self.core;
        core.network.reset(ResetOptions {
            flow: false,
            default_tau: options.pheromone / 2.0,
            ..ResetOptions::default()
        });
        core.network.enable_all_edges();

        let upper_bound = core.network.get_flow_upperbound();
        let max_path = ((core.network.count_edges() as f64 * MAX_PATH_RATIO) as i64).max(1);
        let mut flow = core.network.get_flow();

        while core.iteration < options.max_iterations && flow < upper_bound {
            let stat = Self::generation(core, options, max_path)?;
            flow = stat.fitness;
            core.push_statistic(stat, Objective::Maximize);
            core.iteration += 1;
        }

        core.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::traits::SolverState;
    use crate::data_structures::topology::Topology;
    use std::collections::HashMap;

    const A: NodeRef = NodeRef::Interior(0);
    const B: NodeRef = NodeRef::Interior(1);

    fn diamond() -> Topology {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, A, 10.0, true);
        topology.link(NodeRef::Source, B, 10.0, true);
        topology.link(A, NodeRef::Target, 5.0, true);
        topology.link(B, NodeRef::Target, 7.0, true);
        topology.link(A, B, 3.0, true);
        topology
    }

    fn arguments(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn solved(pairs: &[(&str, &str)]) -> AntColonySolver {
        let mut solver = AntColonySolver::new();
        solver.set_topology(&diamond()).unwrap();
        solver.set_arguments(&arguments(pairs)).unwrap();
        solver.solve().unwrap();
        solver
    }

    #[test]
    fn test_diamond_reaches_upper_bound() {
        let solver = solved(&[("seed", "3"), ("colony_size", "10"), ("max_iterations", "50")]);

        assert_eq!(solver.state(), SolverState::Computed);
        let best = solver.best().unwrap();
        assert!((best.fitness - 12.0).abs() < 1e-9);
        // Saturating the sentinel edges stops the run before the iteration limit
        assert!(solver.statistics().len() < 50);
        for (_, edge) in solver.network().topology().iter() {
            assert!(edge.flow <= edge.capacity + 1e-9);
        }
    }

    #[test]
    fn test_flow_never_decreases() {
        let solver = solved(&[("seed", "11"), ("colony_size", "5"), ("max_iterations", "20")]);
        let flows: Vec<f64> = solver.statistics().iter().map(|s| s.fitness).collect();
        assert!(flows.windows(2).all(|w| w[1] >= w[0]));
        assert!(flows.iter().all(|&f| f <= solver.network().get_flow_upperbound() + 1e-9));
    }

    #[test]
    fn test_trail_update_keeps_tau_non_negative() {
        let mut solver = AntColonySolver::new();
        solver.set_topology(&diamond()).unwrap();
        solver
            .set_arguments(&arguments(&[("seed", "5"), ("colony_size", "4"), ("max_iterations", "1"), ("rho", "0.3")]))
            .unwrap();
        solver.solve().unwrap();

        let walked: HashSet<EdgeKey> = solver
            .network()
            .topology()
            .iter()
            .filter(|(_, e)| e.counter > 1)
            .map(|(k, _)| *k)
            .collect();
        for (key, edge) in solver.network().topology().iter() {
            assert!(edge.tau >= 0.0);
            if !walked.contains(key) {
                // 0.7 * 2.5 with no deposit
                assert!((edge.tau - 1.75).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_select_next_prefers_open_target_edge() {
        let network = Network::from_topology(&diamond());
        let options = AntColonyOptions::default();
        let mut random = RandomSource::new(1);
        assert_eq!(AntColonySolver::select_next(&network, A, &options, &mut random), Some(NodeRef::Target));
        // Untouched trails score zero everywhere else
        assert_eq!(AntColonySolver::select_next(&network, NodeRef::Source, &options, &mut random), None);
    }

    #[test]
    fn test_same_seed_same_statistics() {
        let pairs = [("seed", "42"), ("colony_size", "6"), ("max_iterations", "8"), ("remove_edge", "true")];
        let first = solved(&pairs);
        let second = solved(&pairs);

        let fitness = |s: &AntColonySolver| s.statistics().iter().map(|x| (x.fitness, x.invalid, x.count_edges)).collect::<Vec<_>>();
        assert_eq!(fitness(&first), fitness(&second));
    }

    #[test]
    fn test_reset_replays_run_with_edge_removal() {
        let mut solver = solved(&[
            ("seed", "12"),
            ("colony_size", "4"),
            ("max_iterations", "10"),
            ("remove_edge", ""),
            ("remove_edge_probs", "0.5"),
        ]);
        let digest = |s: &AntColonySolver| {
            s.statistics()
                .iter()
                .map(|x| (x.fitness.to_bits(), x.invalid, x.count_edges))
                .collect::<Vec<_>>()
        };
        let before = digest(&solver);

        solver.reset();
        assert_eq!(solver.network().count_enabled_edges(), solver.network().count_edges());
        solver.solve().unwrap();
        assert_eq!(digest(&solver), before);
    }

    #[test]
    fn test_saturated_edge_scores_zero() {
        let options = AntColonyOptions {
            beta1: 0.0,
            ..AntColonyOptions::default()
        };
        let mut edge = Edge::new(4.0);
        edge.tau = 1.0;
        assert!(options.score(&edge) > 0.0);

        edge.flow = 4.0;
        assert_eq!(options.score(&edge), 0.0);
    }

    #[test]
    fn test_parameters_and_validation() {
        let mut solver = AntColonySolver::new();
        solver.set_parameter("max_interations", "7").unwrap();
        assert_eq!(solver.get_parameter("max_iterations").as_deref(), Some("7"));
        assert_eq!(solver.get_parameter("max_interations").as_deref(), Some("7"));
        solver.set_parameter("remove_edge", "").unwrap();
        assert_eq!(solver.get_parameter("remove_edge").as_deref(), Some("true"));
        assert!(solver.set_parameter("colony_size", "-1").is_err());
        assert!(solver.set_parameter("enable_log", "x").is_err());

        solver.set_parameter("rho", "1.5").unwrap();
        solver.set_topology(&diamond()).unwrap();
        solver.set_arguments(&HashMap::new()).unwrap();
        assert!(matches!(solver.solve(), Err(SolverError::InvalidParameter { .. })));
        assert_eq!(solver.state(), SolverState::Ready);
    }
}
