use crate::{
    config::Heuristic,
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

/// Greedy search that always expands the node closest to the target.
#[derive(Debug, Clone)]
pub struct BestFirst<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    target: Marking,
    heuristic: Heuristic,
}

impl<N: PetriNetQuery> BestFirst<N> {
    pub fn new(
        pathfinder: Pathfinder<N>,
        initial: Marking,
        target: Marking,
        heuristic: Heuristic,
    ) -> Self {
        BestFirst {
            pathfinder,
            initial,
            target,
            heuristic,
        }
    }

    /// Distance of `marking` to the target under the configured heuristic.
    pub fn distance(&self, marking: &Marking) -> f64 {
        self.pathfinder
            .net()
            .places()
            .map(|p| {
                let diff = marking.abs_diff(&self.target, p) as f64;
                match self.heuristic {
                    Heuristic::Default => diff,
                    Heuristic::WeightedDefault => match self.pathfinder.degree(p) {
                        0 => diff,
                        degree => diff / degree as f64,
                    },
                }
            })
            .sum()
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for BestFirst<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "BestFirst"
    }

    fn compute_priority(&self, node: &ReachabilityNode) -> f64 {
        self.distance(&node.marking)
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_target_search(self, reporter)
    }
}

impl<N: PetriNetQuery> TargetPolicy for BestFirst<N> {
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
