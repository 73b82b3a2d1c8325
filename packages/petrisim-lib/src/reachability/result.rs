use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    marking::{Marking, MarkingLike},
    net::{PetriNetQuery, TransitionIndex},
    reachability::{event::ReachabilityStatus, graph::ReachabilityGraph},
};

/// Why a search stopped before reaching a conclusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The cancellation token was triggered.
    Cancelled,
    /// A marking strictly larger than one of its ancestors was found, so the
    /// state space is infinite.
    Unbounded,
    Timeout,
    MaxIterationsReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    /// The target was found, with the firing sequence leading to it.
    Success(Vec<TransitionIndex>),
    /// The frontier ran empty without reaching the target.
    Failure,
    /// An exhaustive search enumerated the whole state space.
    Finished,
    Aborted(AbortReason),
}

impl SearchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchStatus::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SearchStatus::Failure)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SearchStatus::Finished)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, SearchStatus::Aborted(_))
    }

    pub fn unwrap_success(self) -> Vec<TransitionIndex> {
        match self {
            SearchStatus::Success(path) => path,
            _ => panic!("Called unwrap_success on a non-successful SearchStatus"),
        }
    }

    pub fn unwrap_aborted(self) -> AbortReason {
        match self {
            SearchStatus::Aborted(reason) => reason,
            _ => panic!("Called unwrap_aborted on a non-aborted SearchStatus"),
        }
    }

    pub fn to_event_status(&self) -> ReachabilityStatus {
        match self {
            SearchStatus::Success(_) => ReachabilityStatus::Success,
            SearchStatus::Failure => ReachabilityStatus::Failure,
            SearchStatus::Finished => ReachabilityStatus::Finished,
            SearchStatus::Aborted(_) => ReachabilityStatus::Aborted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistics {
    /// Number of expanded nodes.
    pub steps: u64,
    pub nodes: usize,
    pub edges: usize,
    pub time: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchResult<M: MarkingLike = Marking> {
    pub status: SearchStatus,
    /// The explored graph. Dropped for aborted searches, since it is not
    /// complete.
    pub graph: Option<ReachabilityGraph<M>>,
    pub statistics: SearchStatistics,
}

impl<M: MarkingLike> SearchResult<M> {
    pub fn new(
        status: SearchStatus,
        graph: ReachabilityGraph<M>,
        steps: u64,
        time: Duration,
    ) -> Self {
        let statistics = SearchStatistics {
            steps,
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            time,
        };
        let graph = if status.is_aborted() { None } else { Some(graph) };

        SearchResult {
            status,
            graph,
            statistics,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn is_aborted(&self) -> bool {
        self.status.is_aborted()
    }

    pub fn path(&self) -> Option<&[TransitionIndex]> {
        match &self.status {
            SearchStatus::Success(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializableSearchStatus {
    Success,
    Failure,
    Finished,
    Aborted,
}

impl From<&SearchStatus> for SerializableSearchStatus {
    fn from(status: &SearchStatus) -> Self {
        match status {
            SearchStatus::Success(_) => SerializableSearchStatus::Success,
            SearchStatus::Failure => SerializableSearchStatus::Failure,
            SearchStatus::Finished => SerializableSearchStatus::Finished,
            SearchStatus::Aborted(_) => SerializableSearchStatus::Aborted,
        }
    }
}

/// Result of a search in a form that can be printed as JSON. Transitions are
/// given by name and markings as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableSearchResult {
    pub status: SerializableSearchStatus,
    pub abort_reason: Option<AbortReason>,
    pub path: Option<Vec<String>>,
    pub markings: Option<Vec<String>>,
    pub statistics: SearchStatistics,
}

impl SerializableSearchResult {
    pub fn from_result<M: MarkingLike, N: PetriNetQuery>(result: &SearchResult<M>, net: &N) -> Self {
        let abort_reason = match &result.status {
            SearchStatus::Aborted(reason) => Some(*reason),
            _ => None,
        };
        let path = result.path().map(|path| {
            path.iter()
                .map(|t| net.transition_name(*t).to_string())
                .collect()
        });
        let markings = result
            .graph
            .as_ref()
            .filter(|_| result.is_finished())
            .map(|graph| graph.markings().map(|m| m.to_string()).collect());

        SerializableSearchResult {
            status: SerializableSearchStatus::from(&result.status),
            abort_reason,
            path,
            markings,
            statistics: result.statistics.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, SerializableSearchStatus::Success)
    }
}
