use std::sync::Arc;

use petrisim_lib::{
    marking::Marking,
    net::{PetriNet, PlaceIndex, TransitionIndex},
    simulation::{
        RunEnd, StochasticRun,
        exact::{ExactSsa, RunOptions},
        setup::SimulationSetup,
        storage::SimulationStorage,
        tau_leaping::TauLeaping,
    },
};

fn storage(net: &PetriNet, marking: Vec<u64>) -> Arc<SimulationStorage> {
    let setup = SimulationSetup::from_net(net, &Marking::from(marking));
    Arc::new(SimulationStorage::new(net, &setup).unwrap())
}

/// `a -> b`
fn conversion_net() -> PetriNet {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    net.add_transition("convert", vec![(1, a)], vec![(1, b)]);
    net
}

/// `a <-> b`
fn reversible_net() -> PetriNet {
    let mut net = conversion_net();
    net.add_transition(
        "back",
        vec![(1, PlaceIndex::new(1))],
        vec![(1, PlaceIndex::new(0))],
    );
    net
}

fn temp_file(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("petrisim_simulation_{}", std::process::id()))
        .join(name)
}

#[test]
fn test_reaction_probabilities() {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    let c = net.add_place("c");
    net.add_transition("to_b", vec![(1, a)], vec![(1, b)]);
    net.add_transition("to_c", vec![(1, a)], vec![(1, c)]);
    net.transition_mut(TransitionIndex::new(1)).set_rate("3");

    let mut ssa = ExactSsa::new(storage(&net, vec![10, 0, 0]), RunOptions::new(0, 1));
    let probabilities = ssa.reaction_probabilities();

    assert_eq!(probabilities.len(), 2);
    assert!((probabilities[0].1 - 0.25).abs() < 1e-12);
    assert!((probabilities[1].1 - 0.75).abs() < 1e-12);
    assert!((probabilities.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-12);
    assert!((ssa.sum_of_rates() - 40.0).abs() < 1e-9);
}

#[test]
fn test_exact_runs_until_exhausted() {
    let net = conversion_net();
    let mut ssa = ExactSsa::new(storage(&net, vec![100, 0]), RunOptions::new(0, 7));

    let summary = ssa.simulate();
    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.steps, 100);
    assert!(!summary.stopped);
    assert_eq!(ssa.marking(), &[0, 100]);
    assert!(summary.time > 0.0);
}

#[test]
fn test_seed_determinism() {
    let net = reversible_net();
    let storage = storage(&net, vec![50, 50]);
    let options = |seed| RunOptions::new(0, seed).with_max_time(2.0).with_trajectory();

    let first = ExactSsa::new(Arc::clone(&storage), options(42)).simulate();
    let second = ExactSsa::new(Arc::clone(&storage), options(42)).simulate();
    let other = ExactSsa::new(Arc::clone(&storage), options(43)).simulate();

    assert_eq!(first.steps, second.steps);
    assert_eq!(first.time, second.time);
    assert_eq!(first.trajectory, second.trajectory);
    assert_ne!(first.trajectory, other.trajectory);
}

#[test]
fn test_max_time() {
    let net = reversible_net();
    let summary = ExactSsa::new(
        storage(&net, vec![100, 0]),
        RunOptions::new(0, 3).with_max_time(1.0),
    )
    .simulate();

    assert_eq!(summary.end, RunEnd::MaxTime);
    assert!(summary.time <= 1.0);
    assert!(summary.steps > 0);
}

#[test]
fn test_stop_request() {
    let net = reversible_net();
    let options = RunOptions::new(0, 3);
    options.control.request_stop();

    let mut ssa = ExactSsa::new(storage(&net, vec![100, 0]), options);
    let summary = ssa.simulate();

    assert_eq!(summary.end, RunEnd::Stopped);
    assert!(summary.stopped);
    assert_eq!(summary.steps, 0);
    assert!(ssa.control().is_finished());
}

#[test]
fn test_constant_educt() {
    let mut net = PetriNet::new();
    let e = net.add_place("e");
    let s = net.add_place("s");
    let p = net.add_place("p");
    net.add_transition("catalyze", vec![(1, e), (1, s)], vec![(1, e), (1, p)]);
    net.set_constant(e, true);

    let mut ssa = ExactSsa::new(storage(&net, vec![5, 10, 0]), RunOptions::new(0, 11));
    let summary = ssa.simulate();

    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.steps, 10);
    assert_eq!(ssa.marking(), &[0, 10]);
    assert_eq!(ssa.constant_marking(), &[5]);
}

#[test]
fn test_knocked_out_reaction_never_fires() {
    let net = reversible_net();
    let setup = SimulationSetup::from_net(&net, &Marking::from(vec![0, 20]));
    let storage =
        SimulationStorage::with_knockouts(&net, &setup, &[TransitionIndex::new(1)]).unwrap();

    let summary = ExactSsa::new(Arc::new(storage), RunOptions::new(0, 5)).simulate();
    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(summary.steps, 0);
}

#[test]
fn test_output_file() {
    let net = conversion_net();
    let path = temp_file("exact.csv");
    let summary = ExactSsa::new(
        storage(&net, vec![20, 0]),
        RunOptions::new(0, 9).with_output(&path),
    )
    .simulate();

    assert_eq!(summary.output.as_deref(), Some(path.as_path()));
    let content = std::fs::read_to_string(&path).unwrap();
    let lines = content.lines().collect::<Vec<_>>();

    assert_eq!(lines[0], "Step\tTime[sec]\tReaction\ta\tb");
    assert_eq!(lines[1], "0\t0\tnone\t20\t0");
    assert_eq!(lines.len(), 22);
    assert!(lines[21].starts_with("20\t"));
    assert!(lines[21].ends_with("\tconvert\t0\t20"));
}

#[test]
fn test_update_interval() {
    let net = conversion_net();
    let summary = ExactSsa::new(
        storage(&net, vec![200, 0]),
        RunOptions::new(0, 13)
            .with_update_interval(0.1)
            .with_trajectory(),
    )
    .simulate();

    let rows = summary.trajectory.unwrap();
    assert!(rows.len() > 2);
    assert!(rows.len() < 202);
    assert_eq!(rows[0].reactions, "none");

    for row in &rows[1..rows.len() - 1] {
        let intervals = row.time / 0.1;
        assert!((intervals - intervals.round()).abs() < 1e-6);
        assert_eq!(row.tokens.iter().sum::<u64>(), 200);
    }
    for pair in rows.windows(2) {
        assert!(pair[0].time <= pair[1].time);
    }
    assert_eq!(rows.last().unwrap().tokens, vec![0, 200]);
}

#[test]
fn test_tau_leaping_conserves_tokens() {
    let net = conversion_net();
    let mut tau = TauLeaping::new(
        storage(&net, vec![10_000, 0]),
        RunOptions::new(0, 17).with_trajectory(),
    );

    let summary = tau.simulate();
    assert_eq!(summary.end, RunEnd::Exhausted);
    assert_eq!(tau.marking(), &[0, 10_000]);
    assert!(summary.steps < 10_000);

    for row in summary.trajectory.unwrap() {
        assert_eq!(row.tokens.iter().sum::<u64>(), 10_000);
    }
}

#[test]
fn test_tau_leaping_determinism() {
    let net = reversible_net();
    let storage = storage(&net, vec![5_000, 5_000]);
    let run = |seed| {
        TauLeaping::new(Arc::clone(&storage), RunOptions::new(0, seed).with_max_time(0.5))
            .with_epsilon(0.05)
            .simulate()
    };

    let first = run(21);
    let second = run(21);
    assert_eq!(first.steps, second.steps);
    assert_eq!(first.time, second.time);
    assert_eq!(first.end, RunEnd::MaxTime);
}
