use std::collections::BTreeSet;

use petrisim_lib::{
    marking::{Marking, OmegaMarking, OmegaValue},
    net::PetriNet,
    reachability::{
        algorithms::{FullCoverability, FullReachability, ReachabilityAlgorithm},
        event::Reporter,
        pathfinder::Pathfinder,
        result::{AbortReason, SearchStatus},
    },
};

/// A single transition without input places that produces into `p`.
fn producer_net() -> PetriNet {
    let mut net = PetriNet::new();
    let p = net.add_place("p");
    net.add_transition("produce", vec![], vec![(1, p)]);
    net
}

/// Tokens move back and forth between `a` and `b`.
fn cycle_net() -> PetriNet {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    net.add_transition("ab", vec![(1, a)], vec![(1, b)]);
    net.add_transition("ba", vec![(1, b)], vec![(1, a)]);
    net
}

#[test]
fn test_unbounded_reachability() {
    let net = producer_net();
    let result = FullReachability::new(Pathfinder::new(&net), Marking::from(vec![0]))
        .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Aborted(AbortReason::Unbounded));
    assert!(result.graph.is_none());
}

#[test]
fn test_omega_coverability() {
    let net = producer_net();
    let result = FullCoverability::new(Pathfinder::new(&net), &Marking::from(vec![0]))
        .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Finished);
    let graph = result.graph.unwrap();
    assert_eq!(graph.node_count(), 2);

    let omega = OmegaMarking::from(vec![OmegaValue::Omega]);
    let omega_node = graph.find(&omega).unwrap();
    // firing in the omega marking leads back to it
    assert!(graph.successors(omega_node).any(|n| n == omega_node));
    assert!(omega.covers(&Marking::from(vec![1000])));
}

#[test]
fn test_bounded_coverability_has_no_omega() {
    let net = cycle_net();
    let result = FullCoverability::new(Pathfinder::new(&net), &Marking::from(vec![2, 0]))
        .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Finished);
    let graph = result.graph.unwrap();
    assert_eq!(graph.node_count(), 3);
    assert!(graph.markings().all(|m| !m.has_omega()));
}

#[test]
fn test_full_reachability_vertex_set() {
    let net = cycle_net();
    let result = FullReachability::new(Pathfinder::new(&net), Marking::from(vec![2, 0]))
        .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Finished);
    let graph = result.graph.unwrap();
    let reached = graph
        .markings()
        .map(|m| m.as_slice().to_vec())
        .collect::<BTreeSet<_>>();
    let expected = [vec![2, 0], vec![1, 1], vec![0, 2]]
        .into_iter()
        .collect::<BTreeSet<_>>();

    assert_eq!(reached, expected);
    // every firing is an edge: 1 from each border marking, 2 from the middle
    assert_eq!(graph.edge_count(), 4);
    assert_eq!(result.statistics.steps, 3);
}

#[test]
fn test_omega_arithmetic() {
    assert_eq!(OmegaValue::Omega + 3, OmegaValue::Omega);
    assert_eq!(OmegaValue::Omega - 3, OmegaValue::Omega);
    assert_eq!(OmegaValue::Finite(2) + 3, OmegaValue::Finite(5));
    assert_eq!(OmegaValue::Omega, OmegaValue::Omega);
    assert!(OmegaValue::Omega > OmegaValue::Finite(u64::MAX));
    assert!(OmegaValue::Omega >= 7);
    assert_eq!(OmegaValue::Finite(1).checked_sub(2), None);
}
