use crate::{
    marking::{Marking, MarkingLike},
    net::{PetriNetQuery, TransitionIndex},
    reachability::{
        edge::ReachabilityEdge, event::Reporter, node::ReachabilityNode,
        pathfinder::Pathfinder, result::SearchResult,
    },
};

pub mod a_star;
pub mod best_first;
pub mod breadth_first;
pub mod full_coverability;
pub mod full_reachability;
pub mod stoch_a_star;
pub mod stoch_dijkstra;
pub mod stoch_full_path;
pub mod stoch_full_reach;
mod target_search;

pub use a_star::AStar;
pub use best_first::BestFirst;
pub use breadth_first::BreadthFirst;
pub use full_coverability::FullCoverability;
pub use full_reachability::FullReachability;
pub use stoch_a_star::StochAStar;
pub use stoch_dijkstra::StochDijkstra;
pub use stoch_full_path::{Absorption, PathDistribution, StochFullPath};
pub use stoch_full_reach::StochFullReach;

/// A state space search. Implementations differ in the order in which they
/// expand nodes and in when they stop.
pub trait ReachabilityAlgorithm {
    type Marking: MarkingLike;

    fn name(&self) -> &'static str;

    /// Ordering key of a node in the frontier, lower is expanded first.
    /// Unordered searches leave this at 0.
    fn compute_priority(&self, _node: &ReachabilityNode<Self::Marking>) -> f64 {
        0.0
    }

    /// Runs the search to completion, reporting to `reporter` on the way. The
    /// search stops at the next expansion once the reporter's cancellation
    /// token is triggered.
    fn run(&mut self, reporter: &mut Reporter) -> SearchResult<Self::Marking>;
}

/// One outgoing step of a marking.
#[derive(Debug, Clone)]
pub(crate) struct Successor {
    pub transition: TransitionIndex,
    pub marking: Marking,
    /// Propensity of the transition, only known to stochastic searches.
    pub rate: Option<f64>,
    /// Branching probability `rate / sum of rates`.
    pub probability: Option<f64>,
}

impl Successor {
    /// Updates the path dependent fields of `child` for this step and returns
    /// the matching edge.
    pub fn annotate<M>(&self, child: &mut ReachabilityNode<M>) -> ReachabilityEdge {
        match (self.rate, self.probability) {
            (Some(rate), Some(probability)) => {
                child.probability *= probability;
                child.time += 1.0 / rate;
                child.cost += -probability.ln();
                ReachabilityEdge::with_probability(self.transition, probability)
            }
            _ => ReachabilityEdge::new(self.transition),
        }
    }
}

/// All successors of `marking`. With rate constants, transitions that have a
/// propensity of zero are left out and the others carry their branching
/// probability.
pub(crate) fn successors<N: PetriNetQuery>(
    pathfinder: &Pathfinder<N>,
    marking: &Marking,
    rate_constants: Option<&[f64]>,
) -> Vec<Successor> {
    let active = pathfinder.compute_active(marking);

    let Some(rate_constants) = rate_constants else {
        return active
            .into_iter()
            .map(|t| Successor {
                transition: t,
                marking: pathfinder.compute_marking(marking, t),
                rate: None,
                probability: None,
            })
            .collect();
    };

    let rates = active
        .into_iter()
        .map(|t| (t, pathfinder.compute_reaction_rate(t, marking, rate_constants)))
        .filter(|(_, rate)| *rate > 0.0)
        .collect::<Vec<_>>();
    let sum: f64 = rates.iter().map(|(_, r)| r).sum();

    rates
        .into_iter()
        .map(|(t, rate)| Successor {
            transition: t,
            marking: pathfinder.compute_marking(marking, t),
            rate: Some(rate),
            probability: Some(rate / sum),
        })
        .collect()
}

pub(crate) fn print_start_banner<N: PetriNetQuery>(name: &str, pathfinder: &Pathfinder<N>) {
    tracing::info!(
        algorithm = %name,
        places = %pathfinder.place_count(),
        transitions = %pathfinder.transitions().len(),
        "Search Info"
    );
}

pub(crate) fn print_end_banner<M: MarkingLike>(name: &str, result: &SearchResult<M>) {
    tracing::info!(
        algorithm = %name,
        status = ?result.status,
        steps = %result.statistics.steps,
        nodes = %result.statistics.nodes,
        edges = %result.statistics.edges,
        time = ?result.statistics.time,
        "Search Result"
    );
}
