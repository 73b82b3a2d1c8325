use petrisim_lib::{
    marking::{Marking, OmegaMarking, OmegaValue},
    net::{PetriNet, PetriNetQuery, PlaceIndex, TransitionIndex},
    reachability::pathfinder::{PInvariant, Pathfinder},
};

/// `2a -> b` and `b -> c`
fn dimer_net() -> PetriNet {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    let c = net.add_place("c");
    net.add_transition("dimerize", vec![(2, a)], vec![(1, b)]);
    net.add_transition("convert", vec![(1, b)], vec![(1, c)]);
    net
}

#[test]
fn test_compute_active() {
    let net = dimer_net();
    let pathfinder = Pathfinder::new(&net);

    assert_eq!(
        pathfinder.compute_active(&Marking::from(vec![2, 0, 0])),
        vec![TransitionIndex::new(0)]
    );
    assert!(
        pathfinder
            .compute_active(&Marking::from(vec![1, 0, 0]))
            .is_empty()
    );
    assert_eq!(
        pathfinder.compute_active(&Marking::from(vec![3, 1, 0])),
        vec![TransitionIndex::new(0), TransitionIndex::new(1)]
    );
}

#[test]
fn test_compute_marking() {
    let net = dimer_net();
    let pathfinder = Pathfinder::new(&net);
    let marking = Marking::from(vec![3, 0, 0]);

    let next = pathfinder.compute_marking(&marking, TransitionIndex::new(0));
    assert_eq!(next, Marking::from(vec![1, 1, 0]));
    assert_eq!(marking, Marking::from(vec![3, 0, 0]));
    assert_eq!(
        pathfinder.compute_marking(&marking, TransitionIndex::new(0)),
        next
    );
}

#[test]
fn test_constant_places_fire_like_others() {
    let mut net = dimer_net();
    net.set_constant(PlaceIndex::new(0), true);
    let pathfinder = Pathfinder::new(&net);

    let next = pathfinder.compute_marking(&Marking::from(vec![2, 0, 0]), TransitionIndex::new(0));
    assert_eq!(next, Marking::from(vec![0, 1, 0]));

    let omega = OmegaMarking::from(vec![OmegaValue::Finite(3), OmegaValue::Finite(0), OmegaValue::Finite(0)]);
    assert_eq!(
        pathfinder.compute_omega_marking(&omega, TransitionIndex::new(0)),
        OmegaMarking::from(vec![OmegaValue::Finite(1), OmegaValue::Finite(1), OmegaValue::Finite(0)])
    );
}

#[test]
fn test_omega_marking() {
    let net = dimer_net();
    let pathfinder = Pathfinder::new(&net);
    let marking = OmegaMarking::from(vec![OmegaValue::Omega, OmegaValue::Finite(0), OmegaValue::Finite(0)]);

    let next = pathfinder.compute_omega_marking(&marking, TransitionIndex::new(0));
    assert_eq!(
        next,
        OmegaMarking::from(vec![OmegaValue::Omega, OmegaValue::Finite(1), OmegaValue::Finite(0)])
    );

    let ancestor = OmegaMarking::from(vec![OmegaValue::Omega, OmegaValue::Finite(0), OmegaValue::Finite(0)]);
    let accelerated = pathfinder.omega_computation(next, &ancestor);
    assert_eq!(
        accelerated,
        OmegaMarking::from(vec![OmegaValue::Omega, OmegaValue::Omega, OmegaValue::Finite(0)])
    );
}

#[test]
fn test_reaction_rate() {
    let net = dimer_net();
    let pathfinder = Pathfinder::new(&net);
    let rates = [2.0, 1.0];

    // 2 * C(3, 2)
    assert_eq!(
        pathfinder.compute_reaction_rate(TransitionIndex::new(0), &Marking::from(vec![3, 0, 0]), &rates),
        6.0
    );
    assert_eq!(
        pathfinder.compute_reaction_rate(TransitionIndex::new(0), &Marking::from(vec![1, 0, 0]), &rates),
        0.0
    );
    assert_eq!(
        pathfinder.compute_reaction_rate(TransitionIndex::new(1), &Marking::from(vec![0, 4, 0]), &rates),
        4.0
    );
}

#[test]
fn test_capacity() {
    let mut net = dimer_net();
    net.set_capacity(PlaceIndex::new(1), 1);
    let pathfinder = Pathfinder::new(&net);

    assert_eq!(
        pathfinder.compute_active(&Marking::from(vec![2, 0, 0])),
        vec![TransitionIndex::new(0)]
    );
    assert_eq!(
        pathfinder.compute_active(&Marking::from(vec![2, 1, 0])),
        vec![TransitionIndex::new(1)]
    );
}

#[test]
fn test_knockouts() {
    let net = dimer_net();
    let convert = net.find_transition("convert").unwrap();
    let pathfinder = Pathfinder::with_knockouts(&net, &[convert]);

    assert_eq!(pathfinder.transitions(), &[TransitionIndex::new(0)]);
    assert_eq!(
        pathfinder.compute_active(&Marking::from(vec![2, 1, 0])),
        vec![TransitionIndex::new(0)]
    );
    assert!(pathfinder.producers(PlaceIndex::new(2)).is_empty());
}

#[test]
fn test_p_invariants() {
    let net = dimer_net();
    let pathfinder = Pathfinder::new(&net);
    // a + 2b + 2c is preserved
    let invariant = PInvariant::new(vec![
        (PlaceIndex::new(0), 1),
        (PlaceIndex::new(1), 2),
        (PlaceIndex::new(2), 2),
    ]);

    assert!(pathfinder.check_p_invariants(
        std::slice::from_ref(&invariant),
        &Marking::from(vec![4, 0, 0]),
        &Marking::from(vec![0, 1, 1]),
    ));
    assert!(!pathfinder.check_p_invariants(
        &[invariant],
        &Marking::from(vec![4, 0, 0]),
        &Marking::from(vec![0, 0, 1]),
    ));
}

#[test]
fn test_rate_constants() {
    let mut net = dimer_net();
    net.transition_mut(TransitionIndex::new(0)).set_rate("2 * 1.5");
    net.transition_mut(TransitionIndex::new(1)).set_rate("0.1 * a");
    let pathfinder = Pathfinder::new(&net);

    assert_eq!(pathfinder.rate_constants(), vec![3.0, 1.0]);
}
