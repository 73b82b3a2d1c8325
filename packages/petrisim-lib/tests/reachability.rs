use petrisim_lib::{
    config::Heuristic,
    marking::Marking,
    net::{PetriNet, PlaceIndex, TransitionIndex},
    reachability::{
        algorithms::{AStar, BestFirst, BreadthFirst, ReachabilityAlgorithm},
        event::{ReachabilityEvent, ReachabilityStatus, Reporter},
        pathfinder::Pathfinder,
        result::{AbortReason, SearchStatus},
        runner,
    },
};

/// `p1 -> t1 -> p2`
fn chain_net() -> PetriNet {
    let mut net = PetriNet::with_places(2);
    net.add_transition(
        "t1",
        vec![(1, PlaceIndex::new(0))],
        vec![(1, PlaceIndex::new(1))],
    );
    net
}

/// Two tokens move from `a` to `c`, either directly or via `b`.
fn detour_net() -> PetriNet {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    let c = net.add_place("c");
    net.add_transition("ab", vec![(1, a)], vec![(1, b)]);
    net.add_transition("bc", vec![(1, b)], vec![(1, c)]);
    net.add_transition("ac", vec![(1, a)], vec![(1, c)]);
    net
}

fn replay(net: &PetriNet, initial: &Marking, path: &[TransitionIndex]) -> Marking {
    let pathfinder = Pathfinder::new(net);
    path.iter().fold(initial.clone(), |marking, t| {
        assert!(pathfinder.compute_active(&marking).contains(t));
        pathfinder.compute_marking(&marking, *t)
    })
}

#[test]
fn test_single_step_path() {
    let net = chain_net();
    let initial = Marking::from(vec![1, 0]);
    let target = Marking::from(vec![0, 1]);

    let mut bfs = BreadthFirst::new(Pathfinder::new(&net), initial.clone(), target.clone());
    let mut best = BestFirst::new(
        Pathfinder::new(&net),
        initial.clone(),
        target.clone(),
        Heuristic::Default,
    );
    let mut a_star = AStar::new(Pathfinder::new(&net), initial, target);

    let expected = SearchStatus::Success(vec![TransitionIndex::new(0)]);
    assert_eq!(bfs.run(&mut Reporter::new()).status, expected);
    assert_eq!(best.run(&mut Reporter::new()).status, expected);
    assert_eq!(a_star.run(&mut Reporter::new()).status, expected);
}

#[test]
fn test_unreachable_target() {
    let net = chain_net();
    let mut bfs = BreadthFirst::new(
        Pathfinder::new(&net),
        Marking::from(vec![1, 0]),
        Marking::from(vec![0, 2]),
    );

    let result = bfs.run(&mut Reporter::new());
    assert_eq!(result.status, SearchStatus::Failure);
    assert_eq!(result.statistics.nodes, 2);
    assert!(result.path().is_none());
}

#[test]
fn test_initial_is_target() {
    let net = chain_net();
    let marking = Marking::from(vec![1, 0]);
    let mut a_star = AStar::new(Pathfinder::new(&net), marking.clone(), marking);

    let result = a_star.run(&mut Reporter::new());
    assert_eq!(result.status, SearchStatus::Success(vec![]));
    assert_eq!(result.statistics.steps, 0);
}

#[test]
fn test_shortest_paths() {
    let net = detour_net();
    let initial = Marking::from(vec![2, 0, 0]);
    let target = Marking::from(vec![0, 0, 2]);

    let bfs = BreadthFirst::new(Pathfinder::new(&net), initial.clone(), target.clone())
        .run(&mut Reporter::new());
    let a_star = AStar::new(Pathfinder::new(&net), initial.clone(), target.clone())
        .run(&mut Reporter::new());

    let bfs_path = bfs.path().unwrap();
    let a_star_path = a_star.path().unwrap();
    assert_eq!(bfs_path.len(), 2);
    assert_eq!(a_star_path.len(), bfs_path.len());
    assert_eq!(replay(&net, &initial, bfs_path), target);
    assert_eq!(replay(&net, &initial, a_star_path), target);
}

#[test]
fn test_best_first_paths_are_valid() {
    let net = detour_net();
    let initial = Marking::from(vec![3, 0, 0]);
    let target = Marking::from(vec![0, 1, 2]);

    for heuristic in [Heuristic::Default, Heuristic::WeightedDefault] {
        let result = BestFirst::new(Pathfinder::new(&net), initial.clone(), target.clone(), heuristic)
            .run(&mut Reporter::new());
        let path = result.path().unwrap();
        assert_eq!(replay(&net, &initial, path), target);
    }
}

#[test]
fn test_a_star_heuristic() {
    let net = detour_net();
    let a_star = AStar::new(
        Pathfinder::new(&net),
        Marking::from(vec![2, 0, 0]),
        Marking::from(vec![0, 0, 2]),
    );

    assert_eq!(a_star.heuristic(&Marking::from(vec![2, 0, 0])), 2.0);
    assert_eq!(a_star.heuristic(&Marking::from(vec![0, 0, 2])), 0.0);
    assert_eq!(a_star.heuristic(&Marking::from(vec![1, 1, 0])), 2.0);
}

#[test]
fn test_graph_has_unique_markings() {
    let net = detour_net();
    let result = BreadthFirst::new(
        Pathfinder::new(&net),
        Marking::from(vec![2, 0, 0]),
        Marking::from(vec![0, 0, 3]),
    )
    .run(&mut Reporter::new());

    assert_eq!(result.status, SearchStatus::Failure);
    let graph = result.graph.unwrap();
    // all ways to distribute two tokens over three places
    assert_eq!(graph.node_count(), 6);
    let mut markings = graph.markings().cloned().collect::<Vec<_>>();
    markings.sort_by(|a, b| a.as_slice().cmp(b.as_slice()));
    markings.dedup();
    assert_eq!(markings.len(), 6);
}

#[test]
fn test_events() {
    let net = chain_net();
    let mut events: Vec<ReachabilityEvent> = vec![];
    let (sender, receiver) = std::sync::mpsc::channel();
    let mut reporter = Reporter::new().with_listener(sender);

    BreadthFirst::new(
        Pathfinder::new(&net),
        Marking::from(vec![1, 0]),
        Marking::from(vec![0, 1]),
    )
    .run(&mut reporter);
    drop(reporter);
    events.extend(receiver.iter());

    assert_eq!(events.first().unwrap().status, ReachabilityStatus::Started);
    let last = events.last().unwrap();
    assert_eq!(last.status, ReachabilityStatus::Success);
    assert_eq!(last.path, Some(vec![TransitionIndex::new(0)]));
}

#[test]
fn test_cancelled_search() {
    let net = chain_net();
    let reporter = Reporter::new();
    reporter.cancellation_token().cancel();

    let handle = runner::spawn(
        BreadthFirst::new(
            Pathfinder::new(net),
            Marking::from(vec![1, 0]),
            Marking::from(vec![0, 1]),
        ),
        reporter,
    );
    let result = handle.join().unwrap();

    assert_eq!(result.status, SearchStatus::Aborted(AbortReason::Cancelled));
}

#[test]
fn test_max_iterations() {
    let net = detour_net();
    let config = petrisim_lib::config::ReachabilityConfig::default().with_max_iterations(Some(1));
    let result = BreadthFirst::new(
        Pathfinder::new(&net),
        Marking::from(vec![5, 0, 0]),
        Marking::from(vec![0, 0, 6]),
    )
    .run(&mut Reporter::from_config(&config));

    assert_eq!(
        result.status,
        SearchStatus::Aborted(AbortReason::MaxIterationsReached)
    );
}
