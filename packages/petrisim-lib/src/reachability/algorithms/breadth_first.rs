use crate::{
    marking::Marking,
    net::PetriNetQuery,
    reachability::{
        algorithms::{
            ReachabilityAlgorithm,
            target_search::{TargetPolicy, run_target_search},
        },
        event::Reporter,
        frontier::Frontier,
        pathfinder::Pathfinder,
        result::SearchResult,
    },
};

/// Breadth-first search for a target marking. The found path is a shortest one
/// in the number of firings.
#[derive(Debug, Clone)]
pub struct BreadthFirst<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    target: Marking,
}

impl<N: PetriNetQuery> BreadthFirst<N> {
    pub fn new(pathfinder: Pathfinder<N>, initial: Marking, target: Marking) -> Self {
        BreadthFirst {
            pathfinder,
            initial,
            target,
        }
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for BreadthFirst<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "BreadthFirst"
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_target_search(self, reporter)
    }
}

impl<N: PetriNetQuery> TargetPolicy for BreadthFirst<N> {
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

    fn frontier(&self) -> Frontier {
        Frontier::fifo()
    }
}
