use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{marking::Marking, net::TransitionIndex};

/// A state of the explored state space.
///
/// Nodes are compared by marking only. The scalar fields carry what the
/// different searches need: `priority` orders the frontier, `probability` is
/// the product of branching probabilities along the predecessor chain, `time`
/// the sum of mean reaction times and `cost` the sum of negative
/// log-probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityNode<M = Marking> {
    pub marking: M,
    /// Predecessor on the currently best known path from the root.
    pub prev: Option<NodeIndex>,
    /// Transition fired from `prev` to reach this node.
    pub via: Option<TransitionIndex>,
    pub depth: u32,
    pub priority: f64,
    pub probability: f64,
    pub time: f64,
    pub cost: f64,
}

impl<M> ReachabilityNode<M> {
    pub fn root(marking: M) -> Self {
        ReachabilityNode {
            marking,
            prev: None,
            via: None,
            depth: 0,
            priority: 0.0,
            probability: 1.0,
            time: 0.0,
            cost: 0.0,
        }
    }

    /// A successor of `parent` (stored at `parent_index`), reached by firing
    /// `via`. The scalar fields are inherited and have to be updated by the
    /// caller.
    pub fn successor(
        marking: M,
        parent_index: NodeIndex,
        parent: &ReachabilityNode<M>,
        via: TransitionIndex,
    ) -> Self {
        ReachabilityNode {
            marking,
            prev: Some(parent_index),
            via: Some(via),
            depth: parent.depth + 1,
            priority: 0.0,
            probability: parent.probability,
            time: parent.time,
            cost: parent.cost,
        }
    }

    pub fn is_root(&self) -> bool {
        self.prev.is_none()
    }
}

impl<M: PartialEq> PartialEq for ReachabilityNode<M> {
    fn eq(&self, other: &Self) -> bool {
        self.marking == other.marking
    }
}

impl<M: Eq> Eq for ReachabilityNode<M> {}
