use hashbrown::HashMap;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    marking::Marking,
    net::PetriNetQuery,
    reachability::{
        algorithms::{ReachabilityAlgorithm, print_end_banner, print_start_banner, successors},
        event::Reporter,
        graph::ReachabilityGraph,
        node::ReachabilityNode,
        pathfinder::Pathfinder,
        result::{SearchResult, SearchStatus},
    },
};

/// Probability mass that ended in a dead marking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absorption {
    pub node: NodeIndex,
    /// Number of firings after which the mass arrived.
    pub depth: u32,
    pub probability: f64,
}

/// How the probability mass of the initial marking spreads over the state
/// space, layer by layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathDistribution {
    pub absorbed: Vec<Absorption>,
    /// Mass that was still moving when the propagation stopped.
    pub in_flight: Vec<(NodeIndex, f64)>,
    /// Number of propagated layers.
    pub depth: u32,
}

impl PathDistribution {
    pub fn absorbed_mass(&self) -> f64 {
        self.absorbed.iter().map(|a| a.probability).sum()
    }

    pub fn in_flight_mass(&self) -> f64 {
        self.in_flight.iter().map(|(_, p)| p).sum()
    }

    /// Absorbed mass summed per dead node.
    pub fn absorbed_per_node(&self) -> HashMap<NodeIndex, f64> {
        let mut per_node = HashMap::new();
        for absorption in &self.absorbed {
            *per_node.entry(absorption.node).or_insert(0.0) += absorption.probability;
        }
        per_node
    }
}

/// Propagates the probability mass of the initial marking along all firing
/// sequences, one firing per layer.
///
/// With a depth bound the propagation stops after that many layers. Without
/// one it stops once less than `epsilon` of the mass is still moving, which
/// never happens in a net whose mass cycles forever. Such runs only end
/// through the reporter's timeout, iteration limit or cancellation. The
/// `probability` of a graph node is the total mass that passed through it.
#[derive(Debug, Clone)]
pub struct StochFullPath<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
    rate_constants: Vec<f64>,
    max_depth: Option<u32>,
    epsilon: f64,
    distribution: Option<PathDistribution>,
}

impl<N: PetriNetQuery> StochFullPath<N> {
    pub fn new(
        pathfinder: Pathfinder<N>,
        initial: Marking,
        rate_constants: Vec<f64>,
        max_depth: Option<u32>,
        epsilon: f64,
    ) -> Self {
        StochFullPath {
            pathfinder,
            initial,
            rate_constants,
            max_depth,
            epsilon,
            distribution: None,
        }
    }

    pub fn from_net_rates(
        pathfinder: Pathfinder<N>,
        initial: Marking,
        max_depth: Option<u32>,
        epsilon: f64,
    ) -> Self {
        let rate_constants = pathfinder.rate_constants();
        Self::new(pathfinder, initial, rate_constants, max_depth, epsilon)
    }

    /// The distribution of the last completed run.
    pub fn distribution(&self) -> Option<&PathDistribution> {
        self.distribution.as_ref()
    }

    fn propagate(
        &self,
        graph: &mut ReachabilityGraph,
        reporter: &mut Reporter,
        steps: &mut u64,
        distribution: &mut PathDistribution,
    ) -> SearchStatus {
        let Some(root) = graph.root() else {
            return SearchStatus::Finished;
        };
        let mut level = HashMap::new();
        level.insert(root, 1.0);

        loop {
            let mass: f64 = level.values().sum();
            let bounded = self.max_depth.is_some_and(|max| distribution.depth >= max);
            if level.is_empty() || bounded || (self.max_depth.is_none() && mass < self.epsilon) {
                break;
            }

            let mut next: HashMap<NodeIndex, f64> = HashMap::new();
            for (work, mass) in sorted(&level) {
                *steps += 1;
                if let Err(reason) = reporter.expanded(*steps) {
                    return SearchStatus::Aborted(reason);
                }

                let marking = graph.node(work).marking.clone();
                let successors = successors(&self.pathfinder, &marking, Some(&self.rate_constants));

                if successors.is_empty() {
                    distribution.absorbed.push(Absorption {
                        node: work,
                        depth: distribution.depth,
                        probability: mass,
                    });
                    continue;
                }

                for successor in successors {
                    let mut child = ReachabilityNode::successor(
                        successor.marking.clone(),
                        work,
                        graph.node(work),
                        successor.transition,
                    );
                    let edge = successor.annotate(&mut child);
                    let flow = mass * successor.probability.unwrap_or(0.0);

                    let index = match graph.find(&child.marking) {
                        Some(existing) => {
                            graph.node_mut(existing).probability += flow;
                            existing
                        }
                        None => {
                            child.probability = flow;
                            graph.insert(child)
                        }
                    };
                    graph.add_edge(work, index, edge);
                    *next.entry(index).or_insert(0.0) += flow;
                }
            }

            level = next;
            distribution.depth += 1;
        }

        // dead markings of the last layer are absorbed even at the bound
        for (work, mass) in sorted(&level) {
            let marking = &graph.node(work).marking;
            if successors(&self.pathfinder, marking, Some(&self.rate_constants)).is_empty() {
                distribution.absorbed.push(Absorption {
                    node: work,
                    depth: distribution.depth,
                    probability: mass,
                });
            } else {
                distribution.in_flight.push((work, mass));
            }
        }
        SearchStatus::Finished
    }
}

/// Layer entries in node order, so that runs are reproducible.
fn sorted(level: &HashMap<NodeIndex, f64>) -> Vec<(NodeIndex, f64)> {
    let mut entries = level.iter().map(|(n, p)| (*n, *p)).collect::<Vec<_>>();
    entries.sort_by_key(|(n, _)| *n);
    entries
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for StochFullPath<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "StochFullPath"
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        print_start_banner(self.name(), &self.pathfinder);
        reporter.started();

        let mut graph = ReachabilityGraph::new();
        graph.add_root(self.initial.clone());
        let mut steps = 0;
        let mut distribution = PathDistribution::default();

        let status = self.propagate(&mut graph, reporter, &mut steps, &mut distribution);

        tracing::debug!(
            depth = %distribution.depth,
            absorbed = %distribution.absorbed_mass(),
            in_flight = %distribution.in_flight_mass(),
            "Path distribution"
        );
        self.distribution = status.is_finished().then_some(distribution);

        reporter.finished(&status, steps);
        let result = SearchResult::new(status, graph, steps, reporter.elapsed());
        print_end_banner(self.name(), &result);

        result
    }
}
