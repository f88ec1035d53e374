//! Artificial Immune System minimum-cut search
//!
//! The population is a set of node bipartitions. A candidate's fitness is
//! the capacity of the cut it induces; by max-flow/min-cut duality the
//! lowest valid cut bounds the maximum flow from above, so the solver
//! minimizes.
//!
//! One generation runs five operators in order:
//!
//! 1. age increment: clear the per-generation flags and advance the clock
//! 2. cloning: every candidate stays and gains `cloning_factor` clones
//! 3. hypermutation: clones are shuffled at an adaptive rate
//! 4. fitness: missing cut capacities are computed
//! 5. selection: invalid cuts are dropped, the smallest cuts still within
//!    their life span survive, and fresh random candidates fill the gap
//!
//! The mutation rate follows `(e^(-rho * best / estimate) * N + 1) / N`,
//! where the estimate is the last best fitness or, with regression enabled,
//! a forecast from the trend of recent best fitness values.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Instant;

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::max_flow::solver::SolverCore;
use crate::algorithm::statistics::Statistic;
use crate::algorithm::traits::{option_value, FlowSolver, Objective, Solution, SolverError, SolverMethod};
use crate::data_structures::network::Network;
use crate::data_structures::partition::{Cut, Partition};
use crate::data_structures::topology::EdgeKey;
use crate::math::parse::{parse_flag, parse_interval, parse_number, ParseValueError};
use crate::math::range::Interval;
use crate::math::trend::{TrendBuffer, DEFAULT_TREND_WINDOW};

/// Lower clamp of the mutation rate
pub const MIN_MUTATION_RATE: f64 = 0.01;
/// Upper clamp of the mutation rate
pub const MAX_MUTATION_RATE: f64 = 0.99;
/// Rate used while no fitness history exists
const INITIAL_MUTATION_RATE: f64 = 0.5;
/// Swap probability when shuffling node ids for a fresh candidate
const GENERATION_SHUFFLE_PROBABILITY: f64 = 0.6;

/// Ordering used by the selection operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKey {
    /// Fewest crossing edges first
    #[default]
    CutSize,
    /// Lowest capacity first
    CutCapacity,
}

impl FromStr for SelectionKey {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cut_size" => Ok(SelectionKey::CutSize),
            "cut_capacity" => Ok(SelectionKey::CutCapacity),
            _ => Err(ParseValueError {
                value: s.to_string(),
                expected: "'cut_size' or 'cut_capacity'",
            }),
        }
    }
}

/// Immune solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmuneOptions {
    pub population_size: usize,
    /// Life span range, in generations, drawn per candidate
    pub age_range: Interval<i64>,
    /// Clones added per candidate and generation
    pub cloning_factor: usize,
    pub max_iterations: usize,
    /// Estimate the achievable cut from the fitness trend
    pub enable_regression: bool,
    /// Probability of moving the splitter when mutating
    pub probs_mutation_partition_size: f64,
    /// Forecast horizon, and stable generations before the estimate grows
    pub delta_prediction: usize,
    pub rho: f64,
    /// Smallest side of a partition
    pub min_partition_size: usize,
    /// Slopes inside this band count as a stalled search
    pub regression_stable_interval: Interval<f64>,
    pub regression_window: usize,
    pub selection_key: SelectionKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ImmuneOptions {
    fn default() -> Self {
        Self {
            population_size: 100,
            age_range: Interval::ordered(3, 10),
            cloning_factor: 2,
            max_iterations: 1000,
            enable_regression: false,
            probs_mutation_partition_size: 0.4,
            delta_prediction: 3,
            rho: 1.0,
            min_partition_size: 2,
            regression_stable_interval: Interval::ordered(-0.01, 0.01),
            regression_window: DEFAULT_TREND_WINDOW,
            selection_key: SelectionKey::CutSize,
            seed: None,
        }
    }
}

impl ImmuneOptions {
    fn canonical(name: &str) -> &str {
        match name {
            "max_interation" | "max_interations" => "max_iterations",
            other => other,
        }
    }

    /// Reject values the population cannot run with
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.population_size == 0 {
            return Err(SolverError::invalid_parameter("population_size", "at least one candidate is required"));
        }
        if self.age_range.min() < 1 {
            return Err(SolverError::invalid_parameter("age_range", "candidates must live at least one generation"));
        }
        if !(0.0..=1.0).contains(&self.probs_mutation_partition_size) {
            return Err(SolverError::invalid_parameter("probs_mutation_partition_size", "must lie in [0, 1]"));
        }
        if !(self.rho >= 0.0 && self.rho.is_finite()) {
            return Err(SolverError::invalid_parameter("rho", "must be finite and non-negative"));
        }
        if self.regression_window < 2 {
            return Err(SolverError::invalid_parameter("regression_window", "at least two samples are required"));
        }
        Ok(())
    }

    /// Check the options against the network they will run on
    fn validate_for(&self, network: &Network) -> Result<(), SolverError> {
        self.validate()?;
        let n = network.count_nodes();
        if n < 2 || n < 2 * self.min_partition_size {
            return Err(SolverError::InvalidGraph(format!(
                "{} interior nodes cannot form partitions with sides of at least {}",
                n,
                self.min_partition_size.max(1)
            )));
        }
        Ok(())
    }
}

/// Population member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmuneCandidate {
    pub partition: Partition,
    pub cut: Cut,
    /// Cached capacity of `cut`; `None` until computed or when the cut is
    /// invalid
    pub cut_capacity: Option<f64>,
    /// Generation of creation
    pub age: usize,
    /// Generations the candidate may live
    pub max_age: usize,
    /// Mutations undergone
    pub mutation: usize,
    /// Cloned in the current generation
    pub is_clone: bool,
    /// Mutated in the current generation
    pub is_mutate: bool,
}

impl ImmuneCandidate {
    /// Generations elapsed since creation
    pub fn years_old(&self, generation: usize) -> usize {
        generation.saturating_sub(self.age)
    }

    /// Whether the candidate may still be selected at `generation`
    pub fn is_alive(&self, generation: usize) -> bool {
        self.years_old(generation) < self.max_age
    }

    fn clone_at(&self, generation: usize, max_age: usize) -> Self {
        Self {
            partition: self.partition.clone(),
            cut: self.cut.clone(),
            cut_capacity: self.cut_capacity,
            age: generation,
            max_age,
            mutation: 0,
            is_clone: true,
            is_mutate: false,
        }
    }
}

impl Display for ImmuneCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\tAge: {}", self.age)?;
        writeln!(f, "\tMax Age: {}", self.max_age)?;
        writeln!(f, "\tMutation: {}", self.mutation)?;
        match self.cut_capacity {
            Some(capacity) => writeln!(f, "\tCut Capacity: {}", capacity)?,
            None => writeln!(f, "\tCut Capacity: none")?,
        }
        writeln!(f, "\tIs Clone: {}", self.is_clone)?;
        writeln!(f, "\tIs Mutate: {}", self.is_mutate)?;
        writeln!(f, "\tIs Valid: {}", self.cut.is_valid())?;
        writeln!(f, "\tPartition: {}", self.partition)?;
        write!(f, "\tCut: {}", self.cut)
    }
}

/// Best candidate of a generation, with the crossing edges resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutSolution {
    pub candidate: ImmuneCandidate,
    pub edges: Vec<EdgeKey>,
    pub cut_capacity: f64,
}

impl CutSolution {
    fn from_candidate(candidate: &ImmuneCandidate, network: &Network) -> Self {
        Self {
            candidate: candidate.clone(),
            edges: candidate
                .cut
                .edges()
                .iter()
                .filter_map(|&i| network.topology().key_at(i).copied())
                .collect(),
            cut_capacity: candidate.cut_capacity.unwrap_or(f64::INFINITY),
        }
    }
}

impl Display for CutSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.candidate)?;
        let edges: Vec<String> = self.edges.iter().map(|e| e.to_string()).collect();
        write!(f, "\tEdges: {}", edges.join(" "))
    }
}

impl Solution for CutSolution {
    fn fitness(&self) -> f64 {
        self.cut_capacity
    }

    fn objective(&self) -> Objective {
        Objective::Minimize
    }

    fn to_compact_string(&self) -> String {
        self.candidate.cut.to_string()
    }
}

/// Clonal selection solver over node bipartitions
#[derive(Debug)]
pub struct ImmuneSolver {
    core: SolverCore,
    options: ImmuneOptions,
    population: Vec<ImmuneCandidate>,
    trend: TrendBuffer,
    count_stable: usize,
}

impl Default for ImmuneSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmuneSolver {
    pub fn new() -> Self {
        Self {
            core: SolverCore::new(SolverMethod::Immune),
            options: ImmuneOptions::default(),
            population: Vec::new(),
            trend: TrendBuffer::default(),
            count_stable: 0,
        }
    }

    pub fn options(&self) -> &ImmuneOptions {
        &self.options
    }

    /// Current population
    pub fn population(&self) -> &[ImmuneCandidate] {
        &self.population
    }

    /// Create `count` random candidates aged at the current generation.
    ///
    /// Node ids are shuffled cumulatively from one candidate to the next.
    fn generate_candidates(&mut self, count: usize) -> Vec<ImmuneCandidate> {
        let core = &mut self.core;
        let options = &self.options;
        let n = core.network.count_nodes() as i64;
        let k = options.min_partition_size as i64;
        let splitter_range = Interval::ordered(k.min(n), (n - k).max(0));

        let mut ids = core.network.populate_node_ids(false);
        let mut candidates = Vec::with_capacity(count);
        for _ in 0..count {
            let max_age = core.random.get_int(options.age_range).max(0) as usize;
            core.random.shuffle_with_probability(&mut ids, GENERATION_SHUFFLE_PROBABILITY);
            let splitter = core.random.get_int(splitter_range) as usize;
            candidates.push(ImmuneCandidate {
                partition: Partition::new(ids.clone(), splitter),
                cut: Cut::invalid(),
                cut_capacity: None,
                age: core.iteration,
                max_age,
                mutation: 0,
                is_clone: false,
                is_mutate: false,
            });
        }

        let network = &core.network;
        candidates
            .par_iter_mut()
            .for_each(|c| c.cut = network.compute_network_cut(&c.partition));
        candidates
    }

    fn increment_age(&mut self) {
        for candidate in &mut self.population {
            candidate.is_clone = false;
            candidate.is_mutate = false;
        }
        self.core.iteration += 1;
    }

    fn cloning(&mut self) {
        let generation = self.core.iteration;
        let factor = self.options.cloning_factor;
        let mut expanded = Vec::with_capacity(self.population.len() * (1 + factor));
        for candidate in std::mem::take(&mut self.population) {
            let original = expanded.len();
            expanded.push(candidate);
            for _ in 0..factor {
                let max_age = self.core.random.get_int(self.options.age_range).max(0) as usize;
                let clone = expanded[original].clone_at(generation, max_age);
                expanded.push(clone);
            }
        }
        self.population = expanded;
    }

    /// Adaptive mutation rate, before clamping
    fn compute_mutation_rate(&mut self, stat: &mut Statistic) -> f64 {
        let options = &self.options;
        let best = self.core.best().map(|b| b.fitness);

        let estimate = if options.enable_regression && self.trend.is_full() {
            let slope = self.trend.slope();
            if options.regression_stable_interval.contains(slope) {
                let mut estimate = self.trend.mean();
                if self.count_stable >= options.delta_prediction {
                    estimate += (self.count_stable as f64).exp2();
                }
                self.count_stable += 1;
                estimate
            } else {
                self.count_stable = 0;
                self.trend.estimate(options.delta_prediction).max(0.0)
            }
        } else if !self.trend.is_empty() {
            match best {
                Some(best) => best,
                None => return INITIAL_MUTATION_RATE,
            }
        } else {
            return INITIAL_MUTATION_RATE;
        };
        let Some(best) = best else {
            return INITIAL_MUTATION_RATE;
        };

        stat.alfa = self.trend.loss();
        stat.beta = estimate;
        stat.gamma = self.count_stable as f64;

        let n = self.core.network.count_nodes() as f64;
        let g = if estimate > 0.0 { best / estimate } else { f64::INFINITY };
        let alfa = (-options.rho * g).exp();
        // rho = 0 with an infinite ratio
        let alfa = if alfa.is_nan() { 1.0 } else { alfa };
        (alfa * n + 1.0) / n
    }

    fn hypermutation(&mut self, stat: &mut Statistic) {
        let rate = self
            .compute_mutation_rate(stat)
            .clamp(MIN_MUTATION_RATE, MAX_MUTATION_RATE);
        stat.mutation_probability = rate;
        stat.mutation_count = 0;

        let options = &self.options;
        let core = &mut self.core;
        for candidate in self.population.iter_mut().filter(|c| c.is_clone) {
            let mutation = candidate.partition.shuffle(
                rate,
                options.probs_mutation_partition_size,
                options.min_partition_size,
                &mut core.random,
            );
            if mutation.changed() {
                let count = mutation.swaps + usize::from(mutation.splitter_shifted);
                candidate.mutation += count;
                candidate.is_mutate = true;
                candidate.cut_capacity = None;
                stat.mutation_count += count;
            }
        }

        let network = &core.network;
        self.population
            .par_iter_mut()
            .filter(|c| c.is_mutate)
            .for_each(|c| c.cut = network.compute_network_cut(&c.partition));
    }

    /// Fill missing capacities and record the generation's best and mean
    fn compute_fitness(&mut self, stat: &mut Statistic) {
        let network = &self.core.network;
        self.population
            .par_iter_mut()
            .filter(|c| c.cut_capacity.is_none())
            .for_each(|c| c.cut_capacity = network.compute_cut_capacity(&c.cut));

        let mut best: Option<(usize, f64)> = None;
        let mut sum = 0.0;
        let mut valid = 0usize;
        for (i, candidate) in self.population.iter().enumerate() {
            if let Some(capacity) = candidate.cut_capacity {
                sum += capacity;
                valid += 1;
                if best.map_or(true, |(_, b)| capacity < b) {
                    best = Some((i, capacity));
                }
            }
        }

        stat.count_edges = network.count_edges();
        stat.count_nodes = network.count_nodes();
        stat.avg_fitness = if valid > 0 { sum / valid as f64 } else { 0.0 };
        match best {
            Some((i, capacity)) => {
                stat.fitness = capacity;
                stat.solution = Some(Box::new(CutSolution::from_candidate(&self.population[i], network)));
            }
            None => {
                stat.fitness = f64::INFINITY;
                stat.solution = None;
            }
        }
    }

    fn selection(&mut self, stat: &mut Statistic) {
        let generation = self.core.iteration;
        let population_size = self.options.population_size;

        let (mut valid, invalid): (Vec<_>, Vec<_>) = std::mem::take(&mut self.population)
            .into_iter()
            .partition(|c| c.cut.is_valid());
        stat.invalid += invalid.len();

        match self.options.selection_key {
            SelectionKey::CutSize => valid.sort_by_key(|c| c.cut.len()),
            SelectionKey::CutCapacity => valid.sort_by(|a, b| {
                let a = a.cut_capacity.unwrap_or(f64::INFINITY);
                let b = b.cut_capacity.unwrap_or(f64::INFINITY);
                a.total_cmp(&b)
            }),
        }

        let mut next: Vec<ImmuneCandidate> = valid
            .into_iter()
            .filter(|c| c.is_alive(generation))
            .take(population_size)
            .collect();
        if next.len() < population_size {
            let fresh = self.generate_candidates(population_size - next.len());
            next.extend(fresh);
        }
        self.population = next;
    }
}

impl FlowSolver for ImmuneSolver {
    fn method(&self) -> SolverMethod {
        SolverMethod::Immune
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
        match ImmuneOptions::canonical(name) {
            "population_size" => options.population_size = parse_number(value).map_err(invalid)?,
            "age_range" => {
                options.age_range =
                    parse_interval(value, |n: i64| Interval::ordered(n / 2, 2 * n - n / 2)).map_err(invalid)?
            }
            "cloning_factor" => options.cloning_factor = parse_number(value).map_err(invalid)?,
            "max_iterations" => options.max_iterations = parse_number(value).map_err(invalid)?,
            "enable_regression" => options.enable_regression = parse_flag(value).map_err(invalid)?,
            "probs_mutation_partition_size" => {
                options.probs_mutation_partition_size = parse_number(value).map_err(invalid)?
            }
            "delta_prediction" => options.delta_prediction = parse_number(value).map_err(invalid)?,
            "rho" => options.rho = parse_number(value).map_err(invalid)?,
            "min_partition_size" => options.min_partition_size = parse_number(value).map_err(invalid)?,
            "regression_stable_interval" => {
                options.regression_stable_interval =
                    parse_interval(value, |x: f64| Interval::ordered(-x, x)).map_err(invalid)?
            }
            "regression_window" => options.regression_window = parse_number(value).map_err(invalid)?,
            "selection_key" => options.selection_key = value.parse().map_err(invalid)?,
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
        option_value(&self.options, ImmuneOptions::canonical(name))
    }

    fn describe_input(&self) -> String {
        self.core.describe(&self.options)
    }

    fn reset_state(&mut self) {
        self.population.clear();
        self.trend.clear();
        self.count_stable = 0;
    }

    fn solve(&mut self) -> Result<(), SolverError> {
        self.options.validate_for(&self.core.network)?;
        self.core.begin()?;

        self.trend.resize(self.options.regression_window);
        self.count_stable = 0;
        self.core.iteration = 0;

        let mut stat = Statistic::new(0);
        self.population = self.generate_candidates(self.options.population_size);
        self.compute_fitness(&mut stat);
        stat.close();
        debug!(
            "Initial population: {} candidates, best cut {}, avg {:.4}",
            self.population.len(),
            stat.fitness,
            stat.avg_fitness
        );
        self.core.push_statistic(stat, Objective::Minimize);

        while self.core.iteration < self.options.max_iterations {
            let mut stat = Statistic::new(self.core.iteration + 1);

            let clock = Instant::now();
            self.increment_age();
            trace!("incrementAge: {:?}", clock.elapsed());

            let clock = Instant::now();
            self.cloning();
            trace!("cloning: {:?}, population {}", clock.elapsed(), self.population.len());

            let clock = Instant::now();
            self.hypermutation(&mut stat);
            trace!("hypermutation: {:?}, mutations {}", clock.elapsed(), stat.mutation_count);

            let clock = Instant::now();
            self.compute_fitness(&mut stat);
            trace!("computeFitness: {:?}", clock.elapsed());

            let clock = Instant::now();
            self.selection(&mut stat);
            trace!("selection: {:?}, invalid {}", clock.elapsed(), stat.invalid);

            stat.iteration = self.core.iteration;
            stat.close();
            if stat.fitness.is_finite() {
                self.trend.insert(stat.fitness);
            }
            debug!(
                "Generation {}: cut capacity {}, avg {:.4}, mutation rate {:.4}, invalid {}",
                stat.iteration,
                stat.fitness,
                stat.avg_fitness,
                stat.mutation_probability,
                stat.invalid
            );
            self.core.push_statistic(stat, Objective::Minimize);
        }

        self.core.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::traits::SolverState;
    use crate::data_structures::network::GeneratorOptions;
    use crate::data_structures::topology::{NodeRef, Topology};
    use crate::math::random::RandomSource;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn layered() -> Topology {
        let options = GeneratorOptions {
            count_node: 12,
            count_layer: 3,
            delta_node_layer: 1,
            seed: None,
            ..GeneratorOptions::default()
        };
        let network = Network::generate(&options, &mut RandomSource::new(5)).unwrap();
        let mut topology = Topology::new();
        for (key, edge) in network.topology().iter() {
            topology.link(key.from, key.to, edge.capacity, true);
        }
        topology
    }

    fn arguments(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn solved(pairs: &[(&str, &str)]) -> ImmuneSolver {
        let mut solver = ImmuneSolver::new();
        solver.set_topology(&layered()).unwrap();
        solver.set_arguments(&arguments(pairs)).unwrap();
        solver.solve().unwrap();
        solver
    }

    #[test]
    fn test_population_is_refilled_and_alive() {
        let solver = solved(&[("seed", "9"), ("population_size", "15"), ("max_iterations", "12")]);

        assert_eq!(solver.state(), SolverState::Computed);
        assert_eq!(solver.population().len(), 15);
        let generation = solver.core().iteration();
        assert_eq!(generation, 12);
        for candidate in solver.population() {
            assert!(candidate.is_alive(generation));
            assert_eq!(candidate.partition.len(), 12);
        }
        assert_eq!(solver.statistics().len(), 13);
        assert_eq!(solver.statistics()[0].iteration, 0);
        assert_eq!(solver.statistics()[12].iteration, 12);
    }

    #[test]
    fn test_mutation_rate_is_clamped() {
        let solver = solved(&[
            ("seed", "4"),
            ("population_size", "10"),
            ("max_iterations", "30"),
            ("enable_regression", "true"),
            ("regression_window", "5"),
        ]);
        for stat in &solver.statistics()[1..] {
            assert!(stat.mutation_probability >= MIN_MUTATION_RATE);
            assert!(stat.mutation_probability <= MAX_MUTATION_RATE);
        }
        // First generation has no history yet
        assert_eq!(solver.statistics()[1].mutation_probability, INITIAL_MUTATION_RATE);
    }

    /// Ready solver whose best result so far has fitness `best`, with the
    /// trend window pre-filled with `series`
    fn with_history(best: f64, series: &[f64]) -> ImmuneSolver {
        use crate::algorithm::max_flow::solver::FlowSolution;

        let mut solver = ImmuneSolver::new();
        solver.set_topology(&layered()).unwrap();
        solver
            .set_arguments(&arguments(&[("seed", "3"), ("enable_regression", "true")]))
            .unwrap();
        let mut stat = Statistic::new(0);
        stat.fitness = best;
        stat.solution = Some(Box::new(FlowSolution {
            flows: vec![best],
            max_flow: best,
        }));
        solver.core.push_statistic(stat, Objective::Minimize);

        solver.trend = TrendBuffer::new(series.len());
        for &sample in series {
            solver.trend.insert(sample);
        }
        solver
    }

    fn expected_rate(best: f64, estimate: f64, n: f64) -> f64 {
        ((-best / estimate).exp() * n + 1.0) / n
    }

    #[test]
    fn test_stable_trend_uses_mean_then_bonus() {
        let mut solver = with_history(8.0, &[10.0; 4]);
        let n = solver.core.network.count_nodes() as f64;

        let mut stat = Statistic::new(1);
        let rate = solver.compute_mutation_rate(&mut stat);
        assert_relative_eq!(stat.beta, 10.0);
        assert_eq!(stat.gamma, 1.0);
        assert_relative_eq!(rate, expected_rate(8.0, 10.0, n));

        // delta_prediction (3) consecutive stable generations add 2^count
        solver.count_stable = 3;
        let mut stat = Statistic::new(2);
        let rate = solver.compute_mutation_rate(&mut stat);
        assert_relative_eq!(stat.beta, 18.0);
        assert_eq!(stat.gamma, 4.0);
        assert_relative_eq!(rate, expected_rate(8.0, 18.0, n));
    }

    #[test]
    fn test_trending_series_uses_forecast() {
        // Rising: slope 10, intercept 0, forecast at x = 4 + 3
        let mut solver = with_history(8.0, &[10.0, 20.0, 30.0, 40.0]);
        solver.count_stable = 5;
        let n = solver.core.network.count_nodes() as f64;

        let mut stat = Statistic::new(1);
        let rate = solver.compute_mutation_rate(&mut stat);
        assert_relative_eq!(stat.beta, 70.0, epsilon = 1e-9);
        assert_eq!(stat.gamma, 0.0);
        assert_eq!(solver.count_stable, 0);
        assert_relative_eq!(rate, expected_rate(8.0, 70.0, n), epsilon = 1e-12);
    }

    #[test]
    fn test_falling_forecast_is_floored_at_zero() {
        // Slope -10, intercept 60: the forecast at x = 7 is -10
        let mut solver = with_history(8.0, &[50.0, 40.0, 30.0, 20.0]);
        let n = solver.core.network.count_nodes() as f64;

        let mut stat = Statistic::new(1);
        let rate = solver.compute_mutation_rate(&mut stat);
        assert_eq!(stat.beta, 0.0);
        assert_eq!(stat.gamma, 0.0);
        // e^(-inf) leaves only the 1/N floor
        assert_relative_eq!(rate, 1.0 / n);
    }

    #[test]
    fn test_best_cut_bounds_exact_flow() {
        use crate::algorithm::max_flow::FordFulkersonSolver;

        let topology = layered();
        let solver = solved(&[("seed", "1"), ("population_size", "20"), ("max_iterations", "40")]);

        let mut exact = FordFulkersonSolver::new();
        exact.set_topology(&topology).unwrap();
        exact.set_arguments(&HashMap::new()).unwrap();
        exact.solve().unwrap();
        let max_flow = exact.best().unwrap().fitness;

        let best = solver.best().unwrap();
        assert!(best.fitness + 1e-9 >= max_flow);
        let solution = best.solution.as_ref().unwrap();
        assert_eq!(solution.objective(), Objective::Minimize);
        assert_eq!(solution.fitness(), best.fitness);
    }

    #[test]
    fn test_same_seed_same_statistics() {
        let pairs = [("seed", "77"), ("population_size", "8"), ("max_iterations", "10"), ("cloning_factor", "3")];
        let a = solved(&pairs);
        let b = solved(&pairs);
        let digest = |s: &ImmuneSolver| {
            s.statistics()
                .iter()
                .map(|x| (x.fitness.to_bits(), x.avg_fitness.to_bits(), x.mutation_count, x.invalid))
                .collect::<Vec<_>>()
        };
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn test_cloning_keeps_original_first() {
        let mut solver = ImmuneSolver::new();
        solver.set_topology(&layered()).unwrap();
        solver
            .set_arguments(&arguments(&[("seed", "2"), ("population_size", "3"), ("cloning_factor", "2")]))
            .unwrap();
        solver.population = solver.generate_candidates(3);
        solver.increment_age();
        solver.cloning();

        assert_eq!(solver.population.len(), 9);
        for group in solver.population.chunks(3) {
            assert!(!group[0].is_clone);
            assert!(group[1].is_clone && group[2].is_clone);
            assert_eq!(group[1].partition, group[0].partition);
            assert_eq!(group[1].age, 1);
            assert_eq!(group[1].mutation, 0);
        }
    }

    #[test]
    fn test_selection_drops_invalid_and_expired() {
        let mut solver = ImmuneSolver::new();
        solver.set_topology(&layered()).unwrap();
        solver
            .set_arguments(&arguments(&[("seed", "6"), ("population_size", "4")]))
            .unwrap();
        let mut population = solver.generate_candidates(4);
        population[0].cut = Cut::invalid();
        population[1].max_age = 1;
        solver.core.iteration = 1;
        let expired = population[1].clone();
        solver.population = population;

        let mut stat = Statistic::new(1);
        solver.selection(&mut stat);

        assert!(stat.invalid >= 1);
        assert_eq!(solver.population.len(), 4);
        assert!(!solver.population.iter().any(|c| *c == expired));
        assert!(solver.population.iter().all(|c| c.is_alive(1)));
    }

    #[test]
    fn test_parameters() {
        let mut solver = ImmuneSolver::new();
        solver.set_parameter("age_range", "5").unwrap();
        assert_eq!(solver.options().age_range, Interval::ordered(2, 8));
        assert_eq!(solver.get_parameter("age_range").as_deref(), Some("2:8"));
        solver.set_parameter("max_interation", "3").unwrap();
        assert_eq!(solver.get_parameter("max_iterations").as_deref(), Some("3"));
        solver.set_parameter("selection_key", "cut_capacity").unwrap();
        assert_eq!(solver.get_parameter("selection_key").as_deref(), Some("cut_capacity"));
        solver.set_parameter("regression_stable_interval", "0.5").unwrap();
        assert_eq!(solver.options().regression_stable_interval, Interval::ordered(-0.5, 0.5));
        assert!(solver.set_parameter("selection_key", "random").is_err());
        assert!(solver.set_parameter("population_size", "many").is_err());
    }

    #[test]
    fn test_tiny_network_is_rejected_before_running() {
        let mut topology = Topology::new();
        topology.link(NodeRef::Source, NodeRef::Interior(0), 1.0, true);
        topology.link(NodeRef::Interior(0), NodeRef::Target, 1.0, true);
        let mut solver = ImmuneSolver::new();
        solver.set_topology(&topology).unwrap();
        solver.set_arguments(&HashMap::new()).unwrap();

        assert!(matches!(solver.solve(), Err(SolverError::InvalidGraph(_))));
        assert_eq!(solver.state(), SolverState::Ready);
    }
}
