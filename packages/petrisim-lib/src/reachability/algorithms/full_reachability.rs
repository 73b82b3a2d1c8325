use petgraph::graph::NodeIndex;

use crate::{
    marking::{Marking, MarkingLike},
    net::PetriNetQuery,
    reachability::{
        algorithms::{ReachabilityAlgorithm, print_end_banner, print_start_banner, successors},
        event::Reporter,
        frontier::Frontier,
        graph::ReachabilityGraph,
        node::ReachabilityNode,
        pathfinder::Pathfinder,
        result::{AbortReason, SearchResult, SearchStatus},
    },
};

/// Enumerates the complete reachability graph in breadth-first order.
///
/// The search aborts with [`AbortReason::Unbounded`] as soon as a marking
/// strictly dominates one of its ancestors, since the pumping sequence in
/// between could then be repeated forever.
#[derive(Debug, Clone)]
pub struct FullReachability<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: Marking,
}

impl<N: PetriNetQuery> FullReachability<N> {
    pub fn new(pathfinder: Pathfinder<N>, initial: Marking) -> Self {
        FullReachability {
            pathfinder,
            initial,
        }
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for FullReachability<N> {
    type Marking = Marking;

    fn name(&self) -> &'static str {
        "FullReachability"
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult {
        run_exhaustive(self.name(), &self.pathfinder, &self.initial, None, reporter)
    }
}

/// Shared driver of the exhaustive searches over finite markings. With rate
/// constants, edges carry their branching probability and revisited nodes
/// accumulate the probability mass of every incoming edge.
pub(crate) fn run_exhaustive<N: PetriNetQuery>(
    name: &str,
    pathfinder: &Pathfinder<N>,
    initial: &Marking,
    rate_constants: Option<&[f64]>,
    reporter: &mut Reporter,
) -> SearchResult {
    print_start_banner(name, pathfinder);
    reporter.started();

    let mut graph = ReachabilityGraph::new();
    let root = graph.add_root(initial.clone());
    let mut steps = 0;

    let status = explore(pathfinder, &mut graph, root, rate_constants, reporter, &mut steps);

    reporter.finished(&status, steps);
    let result = SearchResult::new(status, graph, steps, reporter.elapsed());
    print_end_banner(name, &result);

    result
}

fn explore<N: PetriNetQuery>(
    pathfinder: &Pathfinder<N>,
    graph: &mut ReachabilityGraph,
    root: NodeIndex,
    rate_constants: Option<&[f64]>,
    reporter: &mut Reporter,
    steps: &mut u64,
) -> SearchStatus {
    let mut frontier = Frontier::fifo();
    frontier.push(root, 0.0);

    while let Some(work) = frontier.pop() {
        *steps += 1;
        if let Err(reason) = reporter.expanded(*steps) {
            return SearchStatus::Aborted(reason);
        }

        let marking = graph.node(work).marking.clone();
        for successor in successors(pathfinder, &marking, rate_constants) {
            let unbounded = graph
                .chain(work)
                .any(|ancestor| successor.marking.strictly_dominates(&graph.node(ancestor).marking));
            if unbounded {
                tracing::debug!(marking = %successor.marking, "Marking dominates an ancestor");
                return SearchStatus::Aborted(AbortReason::Unbounded);
            }

            let mut child = ReachabilityNode::successor(
                successor.marking.clone(),
                work,
                graph.node(work),
                successor.transition,
            );
            let edge = successor.annotate(&mut child);

            match graph.find(&child.marking) {
                Some(existing) => {
                    graph.add_edge(work, existing, edge);
                    if rate_constants.is_some() {
                        graph.node_mut(existing).probability += child.probability;
                    }
                }
                None => {
                    let index = graph.insert(child);
                    graph.add_edge(work, index, edge);
                    frontier.push(index, 0.0);
                }
            }
        }
    }

    SearchStatus::Finished
}
