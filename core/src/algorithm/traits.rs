//! Solver trait definitions
//!
//! Every max-flow solver follows the same lifecycle:
//!
//! ```text
//! Init --set_arguments--> Ready --solve--> Computing --> Computed
//!                           ^                                |
//!                           +------------- reset ------------+
//! ```
//!
//! Configuration arrives as a flat string-to-string map. Each solver parses
//! and validates its own options in `set_parameter`, so the same map can come
//! from a script, the command line or a test.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::max_flow::solver::SolverCore;
use crate::algorithm::statistics::Statistic;
use crate::data_structures::network::Network;
use crate::data_structures::topology::{Topology, TopologyError};

/// Solver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverState {
    /// Created, not configured
    Init,
    /// Configured and ready to run
    Ready,
    /// Running
    Computing,
    /// Finished; `reset` makes it runnable again
    Computed,
}

impl Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverState::Init => "INIT",
            SolverState::Ready => "READY",
            SolverState::Computing => "COMPUTING",
            SolverState::Computed => "COMPUTED",
        };
        write!(f, "{}", name)
    }
}

/// Available solvers with their numeric ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    Immune = 0,
    AntColony = 1,
    FordFulkerson = 2,
}

impl SolverMethod {
    pub const ALL: [SolverMethod; 3] = [
        SolverMethod::Immune,
        SolverMethod::AntColony,
        SolverMethod::FordFulkerson,
    ];

    /// Numeric id used on the command surface
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            SolverMethod::Immune => "immune",
            SolverMethod::AntColony => "ant_colony",
            SolverMethod::FordFulkerson => "ford_fulkerson",
        }
    }
}

impl Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u8> for SolverMethod {
    type Error = SolverError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        SolverMethod::ALL
            .into_iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| SolverError::invalid_parameter("method", format!("unknown solver id {}", id)))
    }
}

impl FromStr for SolverMethod {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u8>() {
            return SolverMethod::try_from(id);
        }
        match s.to_ascii_lowercase().as_str() {
            "immune" | "ais" => Ok(SolverMethod::Immune),
            "ant_colony" | "aco" => Ok(SolverMethod::AntColony),
            "ford_fulkerson" | "ff" => Ok(SolverMethod::FordFulkerson),
            _ => Err(SolverError::invalid_parameter("method", format!("unknown solver '{}'", s))),
        }
    }
}

/// Direction in which fitness improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Flow amounts: higher is better
    Maximize,
    /// Cut capacities: lower is better
    Minimize,
}

impl Objective {
    /// Whether `candidate` strictly improves on `incumbent`
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Objective::Maximize => candidate > incumbent,
            Objective::Minimize => candidate < incumbent,
        }
    }
}

/// Result snapshot recorded by a solver iteration
pub trait Solution: Debug + Display + Send + Sync {
    /// Flow amount or cut capacity
    fn fitness(&self) -> f64;

    fn objective(&self) -> Objective;

    /// Single-line rendering used in statistic exports
    fn to_compact_string(&self) -> String;
}

/// Solver errors
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Cannot {operation} while solver is {state}")]
    InvalidState { operation: String, state: SolverState },

    #[error("Invalid graph state: {0}")]
    InvalidGraph(String),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl SolverError {
    pub fn invalid_parameter(name: &str, reason: impl ToString) -> Self {
        SolverError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Common interface of the max-flow solvers
pub trait FlowSolver: Debug + Send {
    fn method(&self) -> SolverMethod;

    /// Shared lifecycle, network and statistics
    fn core(&self) -> &SolverCore;

    fn core_mut(&mut self) -> &mut SolverCore;

    /// Set one option from its textual value
    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), SolverError>;

    /// Current value of an option
    fn get_parameter(&self, name: &str) -> Option<String>;

    /// Active options and network summary as pretty JSON
    fn describe_input(&self) -> String;

    /// Run to completion
    fn solve(&mut self) -> Result<(), SolverError>;

    /// Drop solver-specific working state; the shared core is reset by
    /// [`FlowSolver::reset`]
    fn reset_state(&mut self) {}

    fn state(&self) -> SolverState {
        self.core().state()
    }

    /// Apply a flat option map and move to `Ready`
    fn set_arguments(&mut self, arguments: &HashMap<String, String>) -> Result<(), SolverError> {
        self.core().require_state("configure", &[SolverState::Init])?;
        let mut names: Vec<&String> = arguments.keys().collect();
        names.sort();
        for name in names {
            self.set_parameter(name, &arguments[name])?;
        }
        self.core_mut().set_state(SolverState::Ready);
        Ok(())
    }

    /// Replace the network with one built from `topology`
    fn set_topology(&mut self, topology: &Topology) -> Result<(), SolverError> {
        self.core()
            .require_state("set topology", &[SolverState::Init, SolverState::Ready])?;
        self.core_mut().set_network(Network::from_topology(topology));
        Ok(())
    }

    /// Clear statistics and flow so the solver can run again
    fn reset(&mut self) {
        self.reset_state();
        self.core_mut().reset();
    }

    /// Release the network and return to `Init`
    fn dispose(&mut self) {
        self.reset_state();
        self.core_mut().dispose();
    }

    fn network(&self) -> &Network {
        self.core().network()
    }

    fn statistics(&self) -> &[Statistic] {
        self.core().statistics()
    }

    /// Statistic holding the best result so far
    fn best(&self) -> Option<&Statistic> {
        self.core().best()
    }

    fn best_solution(&self) -> Option<&dyn Solution> {
        self.best().and_then(|s| s.solution.as_deref())
    }

    /// Wall time of the last completed run
    fn execution_time(&self) -> Option<Duration> {
        self.core().execution_time()
    }

    /// Best result in human-readable form
    fn describe_output(&self) -> String {
        match self.best() {
            Some(best) => format!("Iteration: {}\nBEST OUTPUT:\n{}", self.core().iteration(), best),
            None => "No result available".to_string(),
        }
    }
}

/// Render a serializable value as pretty JSON
pub(crate) fn render_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Look up an option by name in the JSON form of an options struct.
///
/// Intervals render as `min:max` and strings without quotes.
pub(crate) fn option_value<T: Serialize>(options: &T, name: &str) -> Option<String> {
    let value = serde_json::to_value(options).ok()?;
    let field = value.get(name)?;
    match field {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => match (map.get("min"), map.get("max")) {
            (Some(min), Some(max)) => Some(format!("{}:{}", min, max)),
            _ => Some(field.to_string()),
        },
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::range::Interval;

    #[test]
    fn test_solver_method_ids() {
        assert_eq!(SolverMethod::try_from(0).unwrap(), SolverMethod::Immune);
        assert_eq!(SolverMethod::try_from(1).unwrap(), SolverMethod::AntColony);
        assert_eq!(SolverMethod::try_from(2).unwrap(), SolverMethod::FordFulkerson);
        assert!(SolverMethod::try_from(3).is_err());

        assert_eq!("2".parse::<SolverMethod>().unwrap(), SolverMethod::FordFulkerson);
        assert_eq!("ACO".parse::<SolverMethod>().unwrap(), SolverMethod::AntColony);
        assert!("simplex".parse::<SolverMethod>().is_err());
    }

    #[test]
    fn test_objective_direction() {
        assert!(Objective::Maximize.is_better(5.0, 4.0));
        assert!(!Objective::Maximize.is_better(4.0, 4.0));
        assert!(Objective::Minimize.is_better(3.0, 4.0));
        assert!(!Objective::Minimize.is_better(f64::INFINITY, 4.0));
    }

    #[test]
    fn test_option_value_rendering() {
        #[derive(Serialize)]
        struct Sample {
            rate: f64,
            range: Interval<i64>,
            label: String,
            seed: Option<u64>,
        }
        let sample = Sample {
            rate: 0.5,
            range: Interval::ordered(3, 10),
            label: "cut_size".to_string(),
            seed: None,
        };
        assert_eq!(option_value(&sample, "rate").as_deref(), Some("0.5"));
        assert_eq!(option_value(&sample, "range").as_deref(), Some("3:10"));
        assert_eq!(option_value(&sample, "label").as_deref(), Some("cut_size"));
        assert_eq!(option_value(&sample, "seed"), None);
        assert_eq!(option_value(&sample, "missing"), None);
    }

    #[test]
    fn test_state_error_message() {
        let err = SolverError::InvalidState {
            operation: "solve".to_string(),
            state: SolverState::Init,
        };
        assert_eq!(err.to_string(), "Cannot solve while solver is INIT");
    }
}
