use crate::{
    marking::Marking,
    net::PetriNetQuery,
    reachability::{
        algorithms::{ReachabilityAlgorithm, print_end_banner, print_start_banner, successors},
        event::Reporter,
        frontier::Frontier,
        graph::ReachabilityGraph,
        node::ReachabilityNode,
        pathfinder::Pathfinder,
        result::{SearchResult, SearchStatus},
    },
};

/// The parts in which the searches for a single target marking differ.
pub(crate) trait TargetPolicy: ReachabilityAlgorithm<Marking = Marking> {
    type Net: PetriNetQuery;

    fn pathfinder(&self) -> &Pathfinder<Self::Net>;

    fn initial(&self) -> &Marking;

    fn target(&self) -> &Marking;

    fn frontier(&self) -> Frontier {
        Frontier::ordered()
    }

    /// Rate constants for stochastic searches.
    fn rate_constants(&self) -> Option<&[f64]> {
        None
    }

    /// Whether `candidate` reaches the marking of `existing` on a better
    /// path.
    fn improves(&self, candidate: &ReachabilityNode, existing: &ReachabilityNode) -> bool {
        candidate.depth < existing.depth
    }
}

/// Expands nodes in frontier order until a successor equals the target.
pub(crate) fn run_target_search<A: TargetPolicy>(
    algorithm: &A,
    reporter: &mut Reporter,
) -> SearchResult {
    print_start_banner(algorithm.name(), algorithm.pathfinder());
    reporter.started();

    let mut graph = ReachabilityGraph::new();
    let root = graph.add_root(algorithm.initial().clone());
    let mut steps = 0;

    let status = if graph.node(root).marking == *algorithm.target() {
        SearchStatus::Success(vec![])
    } else {
        expand(algorithm, &mut graph, reporter, &mut steps)
    };

    reporter.finished(&status, steps);
    let result = SearchResult::new(status, graph, steps, reporter.elapsed());
    print_end_banner(algorithm.name(), &result);

    result
}

fn expand<A: TargetPolicy>(
    algorithm: &A,
    graph: &mut ReachabilityGraph,
    reporter: &mut Reporter,
    steps: &mut u64,
) -> SearchStatus {
    let mut frontier = algorithm.frontier();
    let target = algorithm.target();

    let Some(root) = graph.root() else {
        return SearchStatus::Failure;
    };
    let priority = algorithm.compute_priority(graph.node(root));
    graph.node_mut(root).priority = priority;
    frontier.push(root, priority);

    while let Some(work) = frontier.pop() {
        *steps += 1;
        if let Err(reason) = reporter.expanded(*steps) {
            return SearchStatus::Aborted(reason);
        }

        let marking = graph.node(work).marking.clone();
        for successor in successors(algorithm.pathfinder(), &marking, algorithm.rate_constants()) {
            let mut child = ReachabilityNode::successor(
                successor.marking.clone(),
                work,
                graph.node(work),
                successor.transition,
            );
            let edge = successor.annotate(&mut child);

            if child.marking == *target {
                let index = graph.insert(child);
                graph.add_edge(work, index, edge);
                tracing::debug!(steps = %steps, nodes = %graph.node_count(), "Target found");
                return SearchStatus::Success(graph.backtrack(index));
            }

            match graph.find(&child.marking) {
                Some(existing) => {
                    graph.add_edge(work, existing, edge);

                    if algorithm.improves(&child, graph.node(existing)) {
                        graph.reparent(existing, &child);
                        if frontier.contains(existing) {
                            let priority = algorithm.compute_priority(graph.node(existing));
                            graph.node_mut(existing).priority = priority;
                            frontier.reposition(existing, priority);
                        }
                    }
                }
                None => {
                    child.priority = algorithm.compute_priority(&child);
                    let priority = child.priority;
                    let index = graph.insert(child);
                    graph.add_edge(work, index, edge);
                    frontier.push(index, priority);
                }
            }
        }
    }

    SearchStatus::Failure
}
