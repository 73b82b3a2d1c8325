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

/// A* over the expected time of a path. Every firing of `t` adds `1 / rate(t)`
/// to the time of a node, the frontier is ordered by `time + estimate`.
#[derive(Debug, Clone)]
pub struct StochAStar<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    target: Marking,
    rate_constants: Vec<f64>,
}

impl<N: PetriNetQuery> StochAStar<N> {
    pub fn new(
        pathfinder: Pathfinder<N>,
        initial: Marking,
        target: Marking,
        rate_constants: Vec<f64>,
    ) -> Self {
        StochAStar {
            pathfinder,
            initial,
            target,
            rate_constants,
        }
    }

    /// Uses the constant rates of the net.
    pub fn from_net_rates(pathfinder: Pathfinder<N>, initial: Marking, target: Marking) -> Self {
        let rate_constants = pathfinder.rate_constants();
        Self::new(pathfinder, initial, target, rate_constants)
    }

    /// For every place off target, the smallest `floor(diff / k)` over the
    /// transitions with rate constant `k > 0` that move it towards the
    /// target. The maximum over the places is returned.
    pub fn estimate(&self, marking: &Marking) -> f64 {
        let mut estimate = 0.0f64;

        for p in self.pathfinder.net().places() {
            let diff = marking.abs_diff(&self.target, p);
            if diff == 0 {
                continue;
            }

            let arcs = if self.target[p] > marking[p] {
                self.pathfinder.producers(p)
            } else {
                self.pathfinder.consumers(p)
            };

            let best = arcs
                .iter()
                .map(|(t, _)| self.rate_constants[t.to_usize()])
                .filter(|rate| *rate > 0.0)
                .map(|rate| (diff as f64 / rate).floor())
                .min_by(f64::total_cmp);

            if let Some(best) = best {
                estimate = estimate.max(best);
            }
        }

        estimate
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for StochAStar<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "StochAStar"
    }

    fn compute_priority(&self, node: &ReachabilityNode) -> f64 {
        node.time + self.estimate(&node.marking)
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_target_search(self, reporter)
    }
}

impl<N: PetriNetQuery> TargetPolicy for StochAStar<N> {
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
        candidate.time < existing.time
    }
}
