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

/// A* search with priority `depth + estimate`.
///
/// The estimate is a lower bound on the number of firings still needed: a
/// place missing `d` tokens needs at least `ceil(d / w)` firings, where `w` is
/// the largest weight of an arc producing into it (consuming from it for
/// surplus tokens). The maximum over all places is taken. Since one firing
/// lowers the estimate by at most one, the search returns shortest paths.
#[derive(Debug, Clone)]
pub struct AStar<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    target: Marking,
}

impl<N: PetriNetQuery> AStar<N> {
    pub fn new(pathfinder: Pathfinder<N>, initial: Marking, target: Marking) -> Self {
        AStar {
            pathfinder,
            initial,
            target,
        }
    }

    /// Infinite if some place can never reach its target count.
    pub fn heuristic(&self, marking: &Marking) -> f64 {
        let mut estimate = 0.0f64;

        for p in self.pathfinder.net().places() {
            let (diff, arcs) = if self.target[p] > marking[p] {
                (self.target[p] - marking[p], self.pathfinder.producers(p))
            } else if self.target[p] < marking[p] {
                (marking[p] - self.target[p], self.pathfinder.consumers(p))
            } else {
                continue;
            };

            let Some(max_weight) = arcs.iter().map(|(_, w)| *w).max() else {
                return f64::INFINITY;
            };

            estimate = estimate.max(diff.div_ceil(max_weight) as f64);
        }

        estimate
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for AStar<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "AStar"
    }

    fn compute_priority(&self, node: &ReachabilityNode) -> f64 {
        node.depth as f64 + self.heuristic(&node.marking)
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_target_search(self, reporter)
    }
}

impl<N: PetriNetQuery> TargetPolicy for AStar<N> {
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
}
