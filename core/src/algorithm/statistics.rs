//! Per-iteration solver statistics
//!
//! A solver appends one [`Statistic`] per iteration (generation for the
//! heuristics, a single entry for the exact solver). Each statistic owns a
//! snapshot of the iteration's best solution. [`StatisticRow`] is the flat,
//! serializable projection used for tabular export.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::{self, Display};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::algorithm::traits::Solution;

/// One iteration's record
#[derive(Debug, Default)]
pub struct Statistic {
    /// Best fitness of the iteration
    pub fitness: f64,
    /// Mean fitness over the valid candidates
    pub avg_fitness: f64,
    pub iteration: usize,
    pub started: Option<Instant>,
    pub finished: Option<Instant>,
    pub count_edges: usize,
    pub count_nodes: usize,
    pub mutation_probability: f64,
    pub mutation_count: usize,
    /// Solver-specific diagnostic
    pub alfa: f64,
    /// Solver-specific diagnostic
    pub beta: f64,
    /// Solver-specific diagnostic
    pub gamma: f64,
    /// Discarded candidates (invalid paths or cuts)
    pub invalid: usize,
    pub solution: Option<Box<dyn Solution>>,
}

impl Statistic {
    /// Open a record for `iteration`, timestamped now
    pub fn new(iteration: usize) -> Self {
        Self {
            iteration,
            started: Some(Instant::now()),
            ..Self::default()
        }
    }

    /// Stamp the end time
    pub fn close(&mut self) {
        self.finished = Some(Instant::now());
    }

    /// Time between opening and closing the record
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.finished) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

impl Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Iteration: {}", self.iteration)?;
        writeln!(f, "AVG Fitness: {:.6}", self.avg_fitness)?;
        writeln!(f, "Fitness: {:.6}", self.fitness)?;
        writeln!(f, "Invalid count: {}", self.invalid)?;
        writeln!(f, "Mutation rate: {:.6}", self.mutation_probability)?;
        writeln!(f, "Mutation count: {}", self.mutation_count)?;
        writeln!(f, "Count edges: {}", self.count_edges)?;
        writeln!(f, "Count nodes: {}", self.count_nodes)?;
        writeln!(f, "Alfa: {:.6}", self.alfa)?;
        writeln!(f, "Beta: {:.6}", self.beta)?;
        writeln!(f, "Gamma: {:.6}", self.gamma)?;
        writeln!(f, "BEST")?;
        match &self.solution {
            Some(solution) => write!(f, "{}", solution),
            None => write!(f, "none"),
        }
    }
}

/// Flat export row of a statistic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticRow {
    pub iteration: usize,
    pub time_ms: f64,
    pub fitness: f64,
    /// Relative change of fitness from the previous row
    pub fitness_increment: f64,
    pub avg_fitness: f64,
    pub invalid: usize,
    pub count_edges: usize,
    pub count_nodes: usize,
    pub mutation_probability: f64,
    pub mutation_count: usize,
    pub solution: String,
    pub alfa: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl StatisticRow {
    /// Project a statistics sequence into rows
    pub fn from_statistics(statistics: &[Statistic]) -> Vec<StatisticRow> {
        statistics
            .iter()
            .enumerate()
            .map(|(i, stat)| {
                let fitness_increment = match i.checked_sub(1).map(|p| statistics[p].fitness) {
                    Some(last) if last != 0.0 && last.is_finite() && stat.fitness.is_finite() => {
                        (stat.fitness - last) / last
                    }
                    _ => 0.0,
                };
                StatisticRow {
                    iteration: stat.iteration,
                    time_ms: stat.elapsed().as_secs_f64() * 1000.0,
                    fitness: stat.fitness,
                    fitness_increment,
                    avg_fitness: stat.avg_fitness,
                    invalid: stat.invalid,
                    count_edges: stat.count_edges,
                    count_nodes: stat.count_nodes,
                    mutation_probability: stat.mutation_probability,
                    mutation_count: stat.mutation_count,
                    solution: stat
                        .solution
                        .as_ref()
                        .map(|s| s.to_compact_string())
                        .unwrap_or_default(),
                    alfa: stat.alfa,
                    beta: stat.beta,
                    gamma: stat.gamma,
                }
            })
            .collect()
    }
}
