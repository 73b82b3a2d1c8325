use crate::{
    marking::Marking,
    net::PetriNetQuery,
    reachability::{
        algorithms::{ReachabilityAlgorithm, full_reachability::run_exhaustive},
        event::Reporter,
        pathfinder::Pathfinder,
        result::SearchResult,
    },
};

/// [`FullReachability`](super::FullReachability) with branching
/// probabilities on the edges. The probability of a node is the sum over all
/// discovered incoming edges of the parent's probability times the edge
/// probability, taken at the time the edge is found.
#[derive(Debug, Clone)]
pub struct StochFullReach<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    rate_constants: Vec<f64>,
}

impl<N: PetriNetQuery> StochFullReach<N> {
    pub fn new(pathfinder: Pathfinder<N>, initial: Marking, rate_constants: Vec<f64>) -> Self {
        StochFullReach {
            pathfinder,
            initial,
            rate_constants,
        }
    }

    pub fn from_net_rates(pathfinder: Pathfinder<N>, initial: Marking) -> Self {
        let rate_constants = pathfinder.rate_constants();
        Self::new(pathfinder, initial, rate_constants)
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for StochFullReach<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "StochFullReach"
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_exhaustive(
            self.name(),
            &self.pathfinder,
            &self.initial,
            Some(&self.rate_constants),
            reporter,
        )
    }
}
