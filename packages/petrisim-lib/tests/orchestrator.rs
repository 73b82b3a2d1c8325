use std::{
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use petrisim_lib::{
    config::{SimulationAlgorithm, SimulationConfig},
    marking::Marking,
    net::PetriNet,
    simulation::{
        RunEnd, SimulationEvent,
        orchestrator::{SimulationOrchestrator, derive_seeds},
        setup::SimulationSetup,
        storage::SimulationStorage,
    },
};

fn reversible_storage(tokens: u64) -> Arc<SimulationStorage> {
    let mut net = PetriNet::new();
    let a = net.add_place("a");
    let b = net.add_place("b");
    net.add_transition("forward", vec![(1, a)], vec![(1, b)]);
    net.add_transition("backward", vec![(1, b)], vec![(1, a)]);

    let setup = SimulationSetup::from_net(&net, &Marking::from(vec![tokens, 0]));
    Arc::new(SimulationStorage::new(&net, &setup).unwrap())
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("petrisim_orchestrator_{}_{}", name, std::process::id()))
}

#[test]
fn test_runs_and_seeds() {
    let config = SimulationConfig::default()
        .with_runs(5)
        .with_seed(Some(99))
        .with_max_threads(Some(2))
        .with_max_time(0.5)
        .with_poll_interval_ms(5);

    let summaries = SimulationOrchestrator::new(reversible_storage(100), config)
        .run()
        .unwrap();

    assert_eq!(summaries.len(), 5);
    assert_eq!(
        summaries.iter().map(|s| s.run).collect::<Vec<_>>(),
        vec![0, 1, 2, 3, 4]
    );
    assert_eq!(
        summaries.iter().map(|s| s.seed).collect::<Vec<_>>(),
        derive_seeds(Some(99), 5)
    );
    assert!(summaries.iter().all(|s| s.end == RunEnd::MaxTime));
}

#[test]
fn test_same_seed_same_results() {
    let config = SimulationConfig::default()
        .with_runs(3)
        .with_seed(Some(5))
        .with_max_time(0.5)
        .with_algorithm(SimulationAlgorithm::TauLeaping)
        .with_poll_interval_ms(5);

    let storage = reversible_storage(1_000);
    let first = SimulationOrchestrator::new(Arc::clone(&storage), config.clone())
        .run()
        .unwrap();
    let second = SimulationOrchestrator::new(storage, config).run().unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_events() {
    let config = SimulationConfig::default()
        .with_runs(2)
        .with_seed(Some(1))
        .with_max_time(0.2)
        .with_poll_interval_ms(5);
    let (sender, receiver) = mpsc::channel();

    SimulationOrchestrator::new(reversible_storage(50), config)
        .with_listener(sender)
        .run()
        .unwrap();
    let events = receiver.iter().collect::<Vec<_>>();

    let started = events
        .iter()
        .filter(|e| matches!(e, SimulationEvent::Started { .. }))
        .count();
    let finished = events
        .iter()
        .filter(|e| matches!(e, SimulationEvent::Finished(_)))
        .count();
    assert_eq!(started, 2);
    assert_eq!(finished, 2);
    assert_eq!(events.last(), Some(&SimulationEvent::Done));
}

#[test]
fn test_merged_output() {
    let dir = temp_dir("merge");
    let config = SimulationConfig::default()
        .with_runs(3)
        .with_seed(Some(3))
        .with_max_time(0.2)
        .with_output(Some(dir.join("run.csv")))
        .with_merge_output(true)
        .with_poll_interval_ms(5);

    let summaries = SimulationOrchestrator::new(reversible_storage(20), config)
        .run()
        .unwrap();

    assert_eq!(summaries[0].output, Some(dir.join("run.csv")));
    assert_eq!(summaries[1].output, Some(dir.join("run_1.csv")));
    assert_eq!(summaries[2].output, Some(dir.join("run_2.csv")));

    let merged = std::fs::read_to_string(dir.join("summary.csv")).unwrap();
    let lines = merged.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "Step\tTime[sec]\tReaction\ta\tb");
    assert_eq!(lines[1], "\t ----- run 0 -----");
    assert_eq!(lines.iter().filter(|l| l.starts_with("Step")).count(), 1);
    assert!(lines.contains(&"\t ----- run 2 -----"));
}

#[test]
fn test_stop() {
    let config = SimulationConfig::default()
        .with_runs(4)
        .with_seed(Some(8))
        .with_max_threads(Some(2))
        .with_poll_interval_ms(5);
    let orchestrator = Arc::new(SimulationOrchestrator::new(reversible_storage(1_000), config));

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        thread::spawn(move || orchestrator.run())
    };

    // unlimited runs of a reversible net never end on their own
    while orchestrator.active_runs() == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    let active = orchestrator.active_runs();
    orchestrator.stop();

    let summaries = runner.join().unwrap().unwrap();
    assert!(active <= 2);
    assert!(!summaries.is_empty());
    assert!(summaries.len() <= 2);
    assert!(summaries.iter().all(|s| s.stopped));
}

#[test]
fn test_stop_before_run() {
    let config = SimulationConfig::default()
        .with_runs(3)
        .with_seed(Some(8))
        .with_poll_interval_ms(5);
    let (sender, receiver) = mpsc::channel();
    let orchestrator =
        SimulationOrchestrator::new(reversible_storage(1_000), config).with_listener(sender);

    orchestrator.stop();
    let summaries = orchestrator.run().unwrap();

    assert!(orchestrator.is_stopped());
    assert!(summaries.is_empty());
    assert_eq!(orchestrator.active_runs(), 0);
    let events = receiver.try_iter().collect::<Vec<_>>();
    assert!(!events.iter().any(|e| matches!(e, SimulationEvent::Started { .. })));
    assert_eq!(events.last(), Some(&SimulationEvent::Done));
}

#[test]
fn test_stop_while_starting() {
    let config = SimulationConfig::default()
        .with_runs(6)
        .with_seed(Some(8))
        .with_max_threads(Some(1))
        .with_poll_interval_ms(5);
    let orchestrator = Arc::new(SimulationOrchestrator::new(reversible_storage(1_000), config));

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        thread::spawn(move || orchestrator.run())
    };
    // lands anywhere between queue setup and the first spawn
    orchestrator.stop();

    let summaries = runner.join().unwrap().unwrap();
    assert!(summaries.len() <= 1);
    assert!(summaries.iter().all(|s| s.stopped));
}
