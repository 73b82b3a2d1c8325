use crate::{
    marking::Marking,
    net::PetriNetQuery,
    reachability::{
        algorithms::{
            ReachabilityAlgorithm,
            target_search::{TargetPolicy, run_target_search},
        },
        event::Reporter,
        node::ReachabilityNode,
        pathfinder::Pathfinder,
        result::SearchResult,
    },
};

/// Uniform cost search where a firing costs `-ln(p)` with `p` its branching
/// probability. The cheapest path is the most probable one.
#[derive(Debug, Clone)]
pub struct StochDijkstra<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    target: Marking,
    rate_constants: Vec<f64>,
}

impl<N: PetriNetQuery> StochDijkstra<N> {
    pub fn new(
        pathfinder: Pathfinder<N>,
        initial: Marking,
        target: Marking,
        rate_constants: Vec<f64>,
    ) -> Self {
        StochDijkstra {
            pathfinder,
            initial,
            target,
            rate_constants,
        }
    }

    pub fn from_net_rates(pathfinder: Pathfinder<N>, initial: Marking, target: Marking) -> Self {
        let rate_constants = pathfinder.rate_constants();
        Self::new(pathfinder, initial, target, rate_constants)
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for StochDijkstra<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "StochDijkstra"
    }

    fn compute_priority(&self, node: &ReachabilityNode) -> f64 {
        node.cost
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_target_search(self, reporter)
    }
}

impl<N: PetriNetQuery> TargetPolicy for StochDijkstra<N> {
    type Net = N;

    fn pathfinder(&self) -> &Pathfinder<N> {
        &self.pathfinder
    }

    fn initial(&self) -> &Marking {
        &self.initial
    }

    fn target(&self) -> &Marking {
        &self.target
    }

    fn rate_constants(&self) -> Option<&[f64]> {
        Some(&self.rate_constants)
    }

    fn improves(&self, candidate: &ReachabilityNode, existing: &ReachabilityNode) -> bool {
        candidate.cost < existing.cost
    }
}
