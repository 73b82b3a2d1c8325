use crate::{
    marking::{Marking, MarkingLike, OmegaMarking},
    net::PetriNetQuery,
    reachability::{
        algorithms::{ReachabilityAlgorithm, print_end_banner, print_start_banner},
        edge::ReachabilityEdge,
        event::Reporter,
        frontier::Frontier,
        graph::ReachabilityGraph,
        node::ReachabilityNode,
        pathfinder::Pathfinder,
        result::{SearchResult, SearchStatus},
    },
};

/// Karp-Miller construction of the coverability graph.
///
/// Whenever a new marking strictly dominates an ancestor, every place in
/// which it is larger is accelerated to omega. The resulting graph is always
/// finite.
#[derive(Debug, Clone)]
pub struct FullCoverability<N: PetriNetQuery> {
    pathfinder: Pathfinder<N>,
    initial: OmegaMarking,
}

impl<N: PetriNetQuery> FullCoverability<N> {
    pub fn new(pathfinder: Pathfinder<N>, initial: &Marking) -> Self {
        FullCoverability {
            pathfinder,
            initial: initial.to_omega(),
        }
    }

    fn explore(
        &self,
        graph: &mut ReachabilityGraph<OmegaMarking>,
        reporter: &mut Reporter,
        steps: &mut u64,
    ) -> SearchStatus {
        let Some(root) = graph.root() else {
            return SearchStatus::Finished;
        };
        let mut frontier = Frontier::fifo();
        frontier.push(root, 0.0);

        while let Some(work) = frontier.pop() {
            *steps += 1;
            if let Err(reason) = reporter.expanded(*steps) {
                return SearchStatus::Aborted(reason);
            }

            let marking = graph.node(work).marking.clone();
            for t in self.pathfinder.compute_omega_active(&marking) {
                let mut next = self.pathfinder.compute_omega_marking(&marking, t);

                let ancestors = graph.chain(work).collect::<Vec<_>>();
                for ancestor in ancestors {
                    let ancestor = &graph.node(ancestor).marking;
                    if next.strictly_dominates(ancestor) {
                        next = self.pathfinder.omega_computation(next, ancestor);
                    }
                }

                let edge = ReachabilityEdge::new(t);
                match graph.find(&next) {
                    Some(existing) => {
                        graph.add_edge(work, existing, edge);
                    }
                    None => {
                        let child = ReachabilityNode::successor(next, work, graph.node(work), t);
                        let index = graph.insert(child);
                        graph.add_edge(work, index, edge);
                        frontier.push(index, 0.0);
                    }
                }
            }
        }

        SearchStatus::Finished
    }
}

impl<N: PetriNetQuery> ReachabilityAlgorithm for FullCoverability<N> {
    type Marking = OmegaMarking;

    fn name(&self) -> &'static str {
        "FullCoverability"
    }

    fn run(&mut self, reporter: &mut Reporter) -> SearchResult<OmegaMarking> {
        print_start_banner(self.name(), &self.pathfinder);
        reporter.started();

        let mut graph = ReachabilityGraph::new();
        graph.add_root(self.initial.clone());
        let mut steps = 0;

        let status = self.explore(&mut graph, reporter, &mut steps);

        reporter.finished(&status, steps);
        let result = SearchResult::new(status, graph, steps, reporter.elapsed());
        print_end_banner(self.name(), &result);

        result
    }
}
