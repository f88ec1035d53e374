//! Exact maximum flow with breadth-first augmenting paths
//!
//! Builds the dense residual matrix of the network (sentinels included),
//! repeatedly finds an augmenting path by BFS over positive residual
//! capacities and pushes its bottleneck, until the target is unreachable.
//! The resulting net flow is written back onto the network edges.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::VecDeque;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithm::max_flow::solver::{FlowSolution, SolverCore};
use crate::algorithm::statistics::Statistic;
use crate::algorithm::traits::{option_value, FlowSolver, Objective, SolverError, SolverMethod};
use crate::math::parse::parse_number;

/// Residual capacities at or below this are treated as saturated
const RESIDUAL_EPSILON: f64 = 1e-12;

/// Options of the exact solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FordFulkersonOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Ford-Fulkerson (Edmonds-Karp path order) solver
#[derive(Debug)]
pub struct FordFulkersonSolver {
    core: SolverCore,
    options: FordFulkersonOptions,
}

impl Default for FordFulkersonSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FordFulkersonSolver {
    pub fn new() -> Self {
        Self {
            core: SolverCore::new(SolverMethod::FordFulkerson),
            options: FordFulkersonOptions::default(),
        }
    }

    pub fn options(&self) -> &FordFulkersonOptions {
        &self.options
    }

    /// Shortest augmenting path in the residual matrix as dense indices,
    /// source first
    fn find_augmenting_path(residual: &[Vec<f64>], source: usize, target: usize) -> Option<Vec<usize>> {
        let n = residual.len();
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut queue = VecDeque::new();

        visited[source] = true;
        queue.push_back(source);

        while let Some(u) = queue.pop_front() {
            if u == target {
                break;
            }
            for v in 0..n {
                if !visited[v] && residual[u][v] > RESIDUAL_EPSILON {
                    visited[v] = true;
                    parent[v] = Some(u);
                    queue.push_back(v);
                }
            }
        }

        if !visited[target] {
            return None;
        }

        let mut path = vec![target];
        let mut current = target;
        while let Some(p) = parent[current] {
            path.push(p);
            current = p;
        }
        path.reverse();
        Some(path)
    }
}

impl FlowSolver for FordFulkersonSolver {
    fn method(&self) -> SolverMethod {
        SolverMethod::FordFulkerson
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), SolverError> {
        match name {
            "seed" => {
                let seed = parse_number(value).map_err(|e| SolverError::invalid_parameter(name, e))?;
                self.options.seed = Some(seed);
                self.core.set_seed(seed);
                Ok(())
            }
            _ => Err(SolverError::invalid_parameter(name, "unknown option")),
        }
    }

    fn get_parameter(&self, name: &str) -> Option<String> {
        option_value(&self.options, name)
    }

    fn describe_input(&self) -> String {
        self.core.describe(&self.options)
    }

    fn solve(&mut self) -> Result<(), SolverError> {
        self.core.begin()?;
        let mut stat = Statistic::new(0);

        let matrix = self.core.network.residual_matrix();
        let mut residual = matrix.capacity.clone();
        let mut total_flow = 0.0;
        let mut augmentations = 0usize;

        while let Some(path) = Self::find_augmenting_path(&residual, matrix.source, matrix.target) {
            let bottleneck = path
                .windows(2)
                .map(|w| residual[w[0]][w[1]])
                .fold(f64::INFINITY, f64::min);
            for w in path.windows(2) {
                residual[w[0]][w[1]] -= bottleneck;
                residual[w[1]][w[0]] += bottleneck;
            }
            total_flow += bottleneck;
            augmentations += 1;
            debug!(
                "Augmenting path #{}: {} edges, bottleneck {}",
                augmentations,
                path.len() - 1,
                bottleneck
            );
        }

        // Net flow per edge; opposite edges cancel out
        let capacity = &matrix.capacity;
        self.core.network.for_each_edge_mut(|key, edge| {
            let (u, v) = (key.from.dense_index(), key.to.dense_index());
            let net = capacity[u][v] - residual[u][v];
            edge.flow = net.clamp(0.0, edge.capacity.max(0.0));
        });

        let network = &self.core.network;
        stat.fitness = total_flow;
        stat.avg_fitness = total_flow;
        stat.count_edges = network.count_edges();
        stat.count_nodes = network.count_nodes();
        stat.alfa = augmentations as f64;
        stat.solution = Some(Box::new(FlowSolution::from_network(network)));
        stat.close();
        info!(
            "Max flow {} after {} augmenting paths (upper bound {})",
            total_flow,
            augmentations,
            network.get_flow_upperbound()
        );

        self.core.push_statistic(stat, Objective::Maximize);
        self.core.finish();
        Ok(())
    }
}
