use hashbrown::HashMap;
use itertools::Itertools;
use petgraph::{
    Direction,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};

use crate::{
    marking::{Marking, MarkingLike},
    net::{PetriNetQuery, TransitionIndex},
    reachability::{edge::ReachabilityEdge, node::ReachabilityNode},
};

/// The explored part of a state space.
///
/// Nodes live in an arena and are unique by marking: a second node with an
/// already known marking can not be inserted. Predecessor links point into the
/// same arena, so the best known path to every node is a chain of indices
/// back to the root.
#[derive(Debug, Clone)]
pub struct ReachabilityGraph<M: MarkingLike = Marking> {
    graph: DiGraph<ReachabilityNode<M>, ReachabilityEdge>,
    index: HashMap<M, NodeIndex>,
    root: Option<NodeIndex>,
}

impl<M: MarkingLike> ReachabilityGraph<M> {
    pub fn new() -> Self {
        ReachabilityGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
            root: None,
        }
    }

    pub fn add_root(&mut self, marking: M) -> NodeIndex {
        let root = self.insert(ReachabilityNode::root(marking));
        self.root = Some(root);
        root
    }

    /// Inserts a node with a marking that is not yet part of the graph.
    /// If the marking is already known, the existing index is returned and
    /// the graph is left unchanged.
    pub fn insert(&mut self, node: ReachabilityNode<M>) -> NodeIndex {
        if let Some(existing) = self.index.get(&node.marking) {
            return *existing;
        }

        let marking = node.marking.clone();
        let index = self.graph.add_node(node);
        self.index.insert(marking, index);
        index
    }

    pub fn find(&self, marking: &M) -> Option<NodeIndex> {
        self.index.get(marking).copied()
    }

    pub fn contains(&self, marking: &M) -> bool {
        self.index.contains_key(marking)
    }

    /// Adds an edge unless the same transition already connects the two
    /// nodes.
    pub fn add_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        edge: ReachabilityEdge,
    ) -> EdgeIndex {
        let existing = self
            .graph
            .edges_connecting(source, target)
            .find(|e| e.weight().transition == edge.transition)
            .map(|e| e.id());

        match existing {
            Some(e) => e,
            None => self.graph.add_edge(source, target, edge),
        }
    }

    /// The first edge from `source` to `target`.
    pub fn edge(&self, source: NodeIndex, target: NodeIndex) -> Option<&ReachabilityEdge> {
        self.graph
            .find_edge(source, target)
            .map(|e| &self.graph[e])
    }

    pub fn node(&self, index: NodeIndex) -> &ReachabilityNode<M> {
        &self.graph[index]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut ReachabilityNode<M> {
        &mut self.graph[index]
    }

    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &ReachabilityNode<M>)> {
        self.graph
            .node_indices()
            .map(move |i| (i, &self.graph[i]))
    }

    pub fn markings(&self) -> impl Iterator<Item = &M> {
        self.graph.node_weights().map(|n| &n.marking)
    }

    /// All edges as `(source, target, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &ReachabilityEdge)> {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    pub fn successors(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> {
        self.graph.neighbors_directed(index, Direction::Outgoing)
    }

    /// Nodes without outgoing edges.
    pub fn dead_nodes(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices().filter(move |i| {
            self.graph
                .neighbors_directed(*i, Direction::Outgoing)
                .next()
                .is_none()
        })
    }

    /// The node itself followed by its predecessors up to the root.
    pub fn chain(&self, index: NodeIndex) -> Chain<'_, M> {
        Chain {
            graph: self,
            next: Some(index),
            remaining: self.graph.node_count(),
        }
    }

    /// Transitions along the predecessor chain from the root to `index`, in
    /// firing order.
    pub fn backtrack(&self, index: NodeIndex) -> Vec<TransitionIndex> {
        let mut path = self
            .chain(index)
            .filter_map(|i| self.graph[i].via)
            .collect::<Vec<_>>();
        path.reverse();
        path
    }

    /// Moves `index` below a new predecessor, copying the path dependent
    /// fields of `candidate`.
    pub fn reparent(&mut self, index: NodeIndex, candidate: &ReachabilityNode<M>) {
        let node = &mut self.graph[index];
        node.prev = candidate.prev;
        node.via = candidate.via;
        node.depth = candidate.depth;
        node.probability = candidate.probability;
        node.time = candidate.time;
        node.cost = candidate.cost;
    }

    /// Renders the graph in graphviz dot format. Nodes are labelled with
    /// their markings, edges with transition names.
    pub fn to_graphviz<N: PetriNetQuery>(
        &self,
        net: &N,
        highlight_nodes: Option<&[NodeIndex]>,
    ) -> String {
        let mut dot = String::new();
        dot.push_str("digraph reachability_graph {\n");
        dot.push_str("fontname=\"Helvetica,Arial,sans-serif\"\n");
        dot.push_str("node [fontname=\"Helvetica,Arial,sans-serif\"]\n");
        dot.push_str("edge [fontname=\"Helvetica,Arial,sans-serif\"]\n");
        dot.push_str("rankdir=LR;\n");
        dot.push_str("node [shape = box];\n");

        let header = net.places().map(|p| net.place_name(p)).join(", ");
        dot.push_str(&format!("label=\"({})\";\n", header));

        for (index, node) in self.nodes() {
            let mut attrs = vec![("label", format!("\"{}\"", node.marking))];

            if Some(index) == self.root {
                attrs.push(("style", "bold".to_string()));
            }

            if let Some(nodes) = highlight_nodes
                && nodes.contains(&index)
            {
                attrs.push(("color", "red".to_string()));
            }

            dot.push_str(&format!(
                "{} [ {} ];\n",
                index.index(),
                attrs.iter().map(|(k, v)| format!("{}={}", k, v)).join(" ")
            ));
        }

        for (source, target, edge) in self.edges() {
            let label = match edge.probability {
                Some(p) => format!("{} ({:.3})", net.transition_name(edge.transition), p),
                None => net.transition_name(edge.transition).to_string(),
            };
            dot.push_str(&format!(
                "{} -> {} [ label = \"{}\" ];\n",
                source.index(),
                target.index(),
                label
            ));
        }

        dot.push('}');
        dot
    }
}

impl<M: MarkingLike> Default for ReachabilityGraph<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a predecessor chain, see [`ReachabilityGraph::chain`].
pub struct Chain<'a, M: MarkingLike> {
    graph: &'a ReachabilityGraph<M>,
    next: Option<NodeIndex>,
    remaining: usize,
}

impl<M: MarkingLike> Iterator for Chain<'_, M> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next?;
        self.next = self.graph.node(current).prev;
        Some(current)
    }
}

#[test]
fn test_insert_unique_by_marking() {
    let mut graph = ReachabilityGraph::<Marking>::new();
    let root = graph.add_root(Marking::from(vec![1, 0]));
    let a = graph.insert(ReachabilityNode::successor(
        Marking::from(vec![0, 1]),
        root,
        graph.node(root),
        TransitionIndex::new(0),
    ));
    let again = graph.insert(ReachabilityNode::root(Marking::from(vec![0, 1])));

    assert_eq!(a, again);
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.node(a).depth, 1);
}

#[test]
fn test_backtrack() {
    let mut graph = ReachabilityGraph::<Marking>::new();
    let root = graph.add_root(Marking::from(vec![2]));
    let mut last = root;
    for i in 0..2u32 {
        let marking = Marking::from(vec![1 - i as u64]);
        let node = ReachabilityNode::successor(marking, last, graph.node(last), TransitionIndex::new(i));
        let next = graph.insert(node);
        graph.add_edge(last, next, ReachabilityEdge::new(TransitionIndex::new(i)));
        last = next;
    }

    assert_eq!(
        graph.backtrack(last),
        vec![TransitionIndex::new(0), TransitionIndex::new(1)]
    );
    assert!(graph.backtrack(root).is_empty());
    assert_eq!(graph.chain(last).count(), 3);
    assert_eq!(
        graph.edge(root, last),
        None
    );
    assert!(graph.edge(root, graph.find(&Marking::from(vec![1])).unwrap()).is_some());
}
