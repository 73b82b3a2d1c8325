use petrisim_lib::{
    marking::Marking,
    net::{PetriNet, TransitionIndex},
    reachability::{
        algorithms::{
            ReachabilityAlgorithm, StochAStar, StochDijkstra, StochFullPath, StochFullReach,
        },
        event::Reporter,
        pathfinder::Pathfinder,
        result::{AbortReason, SearchStatus},
    },
};

/// `a` turns into `b` with rate 1 or into `c` with rate 3.
fn branching_net() -> PetriNet {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    let c = net.add_place("c");
    net.add_transition("to_b", vec![(1, a)], vec![(1, b)]);
    net.add_transition("to_c", vec![(1, a)], vec![(1, c)]);
    net.transition_mut(TransitionIndex::new(1)).set_rate("3");
    net
}

#[test]
fn test_stoch_dijkstra() {
    let net = branching_net();
    let result = StochDijkstra::from_net_rates(
        Pathfinder::new(&net),
        Marking::from(vec![1, 0, 0]),
        Marking::from(vec![0, 0, 1]),
    )
    .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Success(vec![TransitionIndex::new(1)]));
}

#[test]
fn test_stoch_a_star() {
    let net = branching_net();
    let mut a_star = StochAStar::from_net_rates(
        Pathfinder::new(&net),
        Marking::from(vec![2, 0, 0]),
        Marking::from(vec![0, 2, 0]),
    );

    let result = a_star.run(&mut Reporter::new());
    assert_eq!(
        result.status,
        SearchStatus::Success(vec![TransitionIndex::new(0), TransitionIndex::new(0)])
    );
}

#[test]
fn test_zero_rates_are_skipped() {
    let mut net = branching_net();
    net.transition_mut(TransitionIndex::new(0)).set_rate("0");

    let result = StochDijkstra::from_net_rates(
        Pathfinder::new(&net),
        Marking::from(vec![1, 0, 0]),
        Marking::from(vec![0, 1, 0]),
    )
    .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Failure);
}

#[test]
fn test_stoch_full_reach_probabilities() {
    let net = branching_net();
    let result = StochFullReach::from_net_rates(Pathfinder::new(&net), Marking::from(vec![1, 0, 0]))
        .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Finished);
    let graph = result.graph.unwrap();
    assert_eq!(graph.node_count(), 3);

    let to_b = graph.find(&Marking::from(vec![0, 1, 0])).unwrap();
    let to_c = graph.find(&Marking::from(vec![0, 0, 1])).unwrap();
    assert!((graph.node(to_b).probability - 0.25).abs() < 1e-12);
    assert!((graph.node(to_c).probability - 0.75).abs() < 1e-12);

    let root = graph.root().unwrap();
    let edge = graph.edge(root, to_c).unwrap();
    assert_eq!(edge.transition, TransitionIndex::new(1));
    assert!((edge.probability.unwrap() - 0.75).abs() < 1e-12);
}

#[test]
fn test_stoch_full_reach_unbounded() {
    let mut net = PetriNet::new();
    let p = net.add_place("p");
    net.add_transition("grow", vec![(1, p)], vec![(2, p)]);

    let result = StochFullReach::from_net_rates(Pathfinder::new(&net), Marking::from(vec![1]))
        .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Aborted(AbortReason::Unbounded));
}

#[test]
fn test_full_path_mass_is_conserved() {
    let net = branching_net();
    let mut full_path = StochFullPath::from_net_rates(
        Pathfinder::new(&net),
        Marking::from(vec![3, 0, 0]),
        Some(10),
        1e-12,
    );

    let result = full_path.run(&mut Reporter::new());
    assert_eq!(result.status, SearchStatus::Finished);

    let distribution = full_path.distribution().unwrap();
    assert!((distribution.absorbed_mass() + distribution.in_flight_mass() - 1.0).abs() < 1e-9);
    // every run of three firings ends in a dead marking
    assert!(distribution.in_flight_mass() < 1e-12);
    assert!(distribution.absorbed.iter().all(|a| a.depth == 3));

    let graph = result.graph.unwrap();
    let all_c = graph.find(&Marking::from(vec![0, 0, 3])).unwrap();
    let per_node = distribution.absorbed_per_node();
    assert!((per_node[&all_c] - 0.75f64.powi(3)).abs() < 1e-12);
}

#[test]
fn test_full_path_depth_bound() {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    net.add_transition("ab", vec![(1, a)], vec![(1, b)]);
    net.add_transition("ba", vec![(1, b)], vec![(1, a)]);

    let mut full_path =
        StochFullPath::from_net_rates(Pathfinder::new(&net), Marking::from(vec![1, 0]), Some(4), 1e-12);
    full_path.run(&mut Reporter::new());

    let distribution = full_path.distribution().unwrap();
    assert_eq!(distribution.depth, 4);
    assert!(distribution.absorbed.is_empty());
    assert!((distribution.in_flight_mass() - 1.0).abs() < 1e-12);
}

#[test]
fn test_full_path_absorbs_at_the_bound() {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    net.add_transition("ab", vec![(1, a)], vec![(1, b)]);

    let mut full_path =
        StochFullPath::from_net_rates(Pathfinder::new(&net), Marking::from(vec![1, 0]), Some(1), 1e-12);
    let result = full_path.run(&mut Reporter::new());

    let distribution = full_path.distribution().unwrap();
    assert_eq!(distribution.depth, 1);
    assert!(distribution.in_flight.is_empty());
    assert_eq!(distribution.absorbed.len(), 1);
    assert_eq!(distribution.absorbed[0].depth, 1);
    assert!((distribution.absorbed_mass() - 1.0).abs() < 1e-12);

    let graph = result.graph.unwrap();
    assert_eq!(
        distribution.absorbed[0].node,
        graph.find(&Marking::from(vec![0, 1])).unwrap()
    );
}

#[test]
fn test_full_path_bound_at_absorption_depth() {
    let net = branching_net();
    let mut full_path = StochFullPath::from_net_rates(
        Pathfinder::new(&net),
        Marking::from(vec![3, 0, 0]),
        Some(3),
        1e-12,
    );
    full_path.run(&mut Reporter::new());

    let distribution = full_path.distribution().unwrap();
    assert_eq!(distribution.depth, 3);
    assert!(distribution.in_flight.is_empty());
    assert!((distribution.absorbed_mass() - 1.0).abs() < 1e-9);
    assert!(distribution.absorbed.iter().all(|a| a.depth == 3));
}

#[test]
fn test_unbounded_full_path_ends_on_iteration_limit() {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    net.add_transition("ab", vec![(1, a)], vec![(1, b)]);
    net.add_transition("ba", vec![(1, b)], vec![(1, a)]);

    // the mass cycles between the two markings and never drains
    let config = petrisim_lib::config::ReachabilityConfig::default().with_max_iterations(Some(50));
    let mut full_path =
        StochFullPath::from_net_rates(Pathfinder::new(&net), Marking::from(vec![1, 0]), None, 1e-12);
    let result = full_path.run(&mut Reporter::from_config(&config));

    assert_eq!(
        result.status,
        SearchStatus::Aborted(AbortReason::MaxIterationsReached)
    );
    assert!(full_path.distribution().is_none());
}
