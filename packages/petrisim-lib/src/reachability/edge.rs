use serde::{Deserialize, Serialize};

use crate::net::TransitionIndex;

/// One firing step. Source and target are the endpoints of the edge in the
/// [`super::graph::ReachabilityGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityEdge {
    pub transition: TransitionIndex,
    /// Branching probability of the step, only set by stochastic searches.
    pub probability: Option<f64>,
}

impl ReachabilityEdge {
    pub fn new(transition: TransitionIndex) -> Self {
        ReachabilityEdge {
            transition,
            probability: None,
        }
    }

    pub fn with_probability(transition: TransitionIndex, probability: f64) -> Self {
        ReachabilityEdge {
            transition,
            probability: Some(probability),
        }
    }
}
