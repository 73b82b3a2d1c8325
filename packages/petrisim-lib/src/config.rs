use std::{fmt::Display, path::PathBuf, str::FromStr};

use petrisim_macros::config;
use serde::{Deserialize, Serialize};

use crate::logger::LogLevel;

pub trait IntoOr<T> {
    fn into_or(self, or: T) -> T;
}

impl<T> IntoOr<Option<T>> for Option<T> {
    fn into_or(self, or: Option<T>) -> Option<T> {
        match self {
            Some(t) => Some(t),
            None => or,
        }
    }
}

impl<T> IntoOr<T> for Option<T> {
    fn into_or(self, or: T) -> T {
        self.unwrap_or(or)
    }
}

pub trait GeneralConfig {
    fn logger(&self) -> &LoggerConfig;
}

config! {
    pub struct LoggerConfig {
        enabled: bool = false,
        log_file: bool = false,
        log_level: LogLevel = LogLevel::Warn,
    }
}

/// The state space exploration strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchAlgorithm {
    BreadthFirst,
    BestFirst,
    AStar,
    FullReachability,
    FullCoverability,
    StochAStar,
    StochDijkstra,
    StochFullReach,
    StochFullPath,
}

impl SearchAlgorithm {
    /// Whether the algorithm searches for a target marking, as opposed to
    /// enumerating the whole state space.
    pub fn is_target_search(&self) -> bool {
        matches!(
            self,
            SearchAlgorithm::BreadthFirst
                | SearchAlgorithm::BestFirst
                | SearchAlgorithm::AStar
                | SearchAlgorithm::StochAStar
                | SearchAlgorithm::StochDijkstra
        )
    }

    pub fn is_stochastic(&self) -> bool {
        matches!(
            self,
            SearchAlgorithm::StochAStar
                | SearchAlgorithm::StochDijkstra
                | SearchAlgorithm::StochFullReach
                | SearchAlgorithm::StochFullPath
        )
    }
}

impl FromStr for SearchAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "bfs" | "breadthfirst" => Ok(SearchAlgorithm::BreadthFirst),
            "bestfirst" => Ok(SearchAlgorithm::BestFirst),
            "astar" | "a*" => Ok(SearchAlgorithm::AStar),
            "fullreachability" | "reachability" => Ok(SearchAlgorithm::FullReachability),
            "fullcoverability" | "coverability" => Ok(SearchAlgorithm::FullCoverability),
            "stochastar" => Ok(SearchAlgorithm::StochAStar),
            "stochdijkstra" | "stochdijk" => Ok(SearchAlgorithm::StochDijkstra),
            "stochfullreach" => Ok(SearchAlgorithm::StochFullReach),
            "stochfullpath" => Ok(SearchAlgorithm::StochFullPath),
            _ => Err(format!("Invalid search algorithm: {}", s)),
        }
    }
}

impl Display for SearchAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchAlgorithm::BreadthFirst => "BreadthFirst",
            SearchAlgorithm::BestFirst => "BestFirst",
            SearchAlgorithm::AStar => "AStar",
            SearchAlgorithm::FullReachability => "FullReachability",
            SearchAlgorithm::FullCoverability => "FullCoverability",
            SearchAlgorithm::StochAStar => "StochAStar",
            SearchAlgorithm::StochDijkstra => "StochDijkstra",
            SearchAlgorithm::StochFullReach => "StochFullReach",
            SearchAlgorithm::StochFullPath => "StochFullPath",
        };
        write!(f, "{}", name)
    }
}

/// Distance measure used by best-first search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heuristic {
    /// Sum of absolute per-place differences to the target.
    Default,
    /// Like [`Heuristic::Default`], but every place is weighted by the inverse
    /// of the number of transitions touching it.
    WeightedDefault,
}

config! {
    pub struct ReachabilityConfig {
        algorithm: SearchAlgorithm = SearchAlgorithm::BreadthFirst,
        heuristic: Heuristic = Heuristic::Default,
        /// A `PROGRESS` event is emitted every `progress_interval` expansions.
        progress_interval: u64 = 100,
        /// Depth bound for the full path distribution. `None` explores until the
        /// probability mass in flight drops below `probability_epsilon`.
        max_depth: Option<u32> = Some(5),
        probability_epsilon: f64 = 1e-12,
        timeout: Option<std::time::Duration> = None,
        max_iterations: Option<u64> = None,
        logger: LoggerConfig (Option<PartialLoggerConfig> = LoggerConfig::default()),
    }
}

impl GeneralConfig for ReachabilityConfig {
    fn logger(&self) -> &LoggerConfig {
        &self.logger
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationAlgorithm {
    Exact,
    TauLeaping,
}

impl FromStr for SimulationAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "exact" | "ssa" | "exactssa" => Ok(SimulationAlgorithm::Exact),
            "tau" | "tauleaping" => Ok(SimulationAlgorithm::TauLeaping),
            _ => Err(format!("Invalid simulation algorithm: {}", s)),
        }
    }
}

impl Display for SimulationAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationAlgorithm::Exact => write!(f, "Exact"),
            SimulationAlgorithm::TauLeaping => write!(f, "TauLeaping"),
        }
    }
}

config! {
    pub struct SimulationConfig {
        algorithm: SimulationAlgorithm = SimulationAlgorithm::Exact,
        runs: usize = 1,
        /// Global seed. Every run derives its own seed from it.
        seed: Option<u64> = None,
        /// Caps the worker pool. Defaults to the available parallelism.
        max_threads: Option<usize> = None,
        /// Simulated time limit in seconds, 0 means unlimited.
        max_time: f64 = 0.0,
        /// Output is written whenever simulated time passes a multiple of this
        /// value, 0 writes after every step.
        update_interval: f64 = 0.0,
        poll_interval_ms: u64 = 3000,
        epsilon: f64 = 0.03,
        critical_threshold: u64 = 20,
        exact_fallback_steps: u32 = 100,
        output: Option<PathBuf> = None,
        merge_output: bool = false,
        keep_trajectory: bool = false,
        logger: LoggerConfig (Option<PartialLoggerConfig> = LoggerConfig::default()),
    }
}

impl GeneralConfig for SimulationConfig {
    fn logger(&self) -> &LoggerConfig {
        &self.logger
    }
}

#[test]
fn test_partial_config() {
    let config = SimulationConfig::from_toml_str(
        r#"
        runs = 4
        seed = 7
        algorithm = "TauLeaping"

        [logger]
        enabled = true
        "#,
    )
    .unwrap();

    assert_eq!(*config.get_runs(), 4);
    assert_eq!(*config.get_seed(), Some(7));
    assert_eq!(*config.get_algorithm(), SimulationAlgorithm::TauLeaping);
    assert_eq!(*config.get_poll_interval_ms(), 3000);
    assert!(*config.logger().get_enabled());
    assert_eq!(*config.logger().get_log_level(), LogLevel::Warn);
}

#[test]
fn test_search_algorithm_from_str() {
    assert_eq!(
        "bfs".parse::<SearchAlgorithm>(),
        Ok(SearchAlgorithm::BreadthFirst)
    );
    assert_eq!(
        "Stoch-Dijkstra".parse::<SearchAlgorithm>(),
        Ok(SearchAlgorithm::StochDijkstra)
    );
    assert!("dfs".parse::<SearchAlgorithm>().is_err());
}
