use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use colored::Colorize;
use petrisim_lib::{
    config::{GeneralConfig, ReachabilityConfig, SearchAlgorithm, SimulationAlgorithm, SimulationConfig},
    logger,
    marking::MarkingLike,
    net::{PetriNet, PetriNetQuery, TransitionIndex, initialized::InitializedPetriNet},
    reachability::{
        algorithms::{
            AStar, BestFirst, BreadthFirst, FullCoverability, FullReachability,
            ReachabilityAlgorithm, StochAStar, StochDijkstra, StochFullPath, StochFullReach,
        },
        event::Reporter,
        pathfinder::Pathfinder,
        result::{SearchResult, SerializableSearchResult},
    },
    simulation::{
        SimulationEvent, orchestrator::SimulationOrchestrator, setup::SimulationSetup,
        storage::SimulationStorage,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Petri Net Simulation Tool")]
#[command(version = "0.1")]
#[command(about = "Explore and simulate Petri nets", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the state space of a net.
    Reach {
        file: String,

        #[arg(short, long)]
        algorithm: Option<SearchAlgorithm>,

        #[arg(short, long)]
        config: Option<String>,

        /// Names of transitions to ignore.
        #[arg(long, num_args = 1..)]
        knockout: Vec<String>,

        /// Writes the explored graph in graphviz format.
        #[arg(long)]
        dot: Option<PathBuf>,
    },
    /// Run stochastic simulations of a net.
    Simulate {
        file: String,

        #[arg(long)]
        setup: Option<PathBuf>,

        #[arg(short, long)]
        algorithm: Option<SimulationAlgorithm>,

        #[arg(short, long)]
        config: Option<String>,

        #[arg(short, long)]
        runs: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, num_args = 1..)]
        knockout: Vec<String>,
    },
    /// Print the default simulation setup of a net.
    ExportSetup {
        file: String,

        #[arg(long)]
        xml: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Reach {
            file,
            algorithm,
            config,
            knockout,
            dot,
        } => {
            let mut config = ReachabilityConfig::from_optional_file(config)?;
            if let Some(algorithm) = algorithm {
                config.set_algorithm(algorithm);
            }
            logger::init(config.logger())?;

            let petri_net = InitializedPetriNet::from_file(&file)?;
            tracing::info!(
                file = %file,
                places = %petri_net.net.place_count(),
                transitions = %petri_net.net.transition_count(),
                "Loaded net"
            );
            let knockouts = resolve_knockouts(&petri_net.net, &knockout)?;
            reach(&petri_net, &config, &knockouts, dot)
        }
        Command::Simulate {
            file,
            setup,
            algorithm,
            config,
            runs,
            seed,
            output,
            knockout,
        } => {
            let mut config = SimulationConfig::from_optional_file(config)?;
            if let Some(algorithm) = algorithm {
                config.set_algorithm(algorithm);
            }
            if let Some(runs) = runs {
                config.set_runs(runs);
            }
            if seed.is_some() {
                config.set_seed(seed);
            }
            if output.is_some() {
                config.set_output(output);
            }
            logger::init(config.logger())?;

            let mut petri_net = InitializedPetriNet::from_file(&file)?;
            tracing::info!(file = %file, "Loaded net");
            let setup = match setup {
                Some(path) => {
                    let setup = SimulationSetup::from_file(path)?;
                    setup.apply(&mut petri_net.net)?;
                    setup
                }
                None => SimulationSetup::from_net(&petri_net.net, &petri_net.initial_marking),
            };
            let knockouts = resolve_knockouts(&petri_net.net, &knockout)?;
            simulate(&petri_net.net, &setup, &knockouts, config)
        }
        Command::ExportSetup { file, xml } => {
            let petri_net = InitializedPetriNet::from_file(&file)?;
            let setup = SimulationSetup::from_net(&petri_net.net, &petri_net.initial_marking);

            if xml {
                println!("{}", setup.to_xml(&petri_net.net));
            } else {
                println!("{}", setup.to_json()?);
            }
            Ok(())
        }
    }
}

fn resolve_knockouts(net: &PetriNet, names: &[String]) -> anyhow::Result<Vec<TransitionIndex>> {
    names
        .iter()
        .map(|name| {
            net.find_transition(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown transition '{}'", name))
        })
        .collect()
}

fn reach(
    petri_net: &InitializedPetriNet,
    config: &ReachabilityConfig,
    knockouts: &[TransitionIndex],
    dot: Option<PathBuf>,
) -> anyhow::Result<()> {
    let net = &petri_net.net;
    let pathfinder = Pathfinder::with_knockouts(net, knockouts);
    let initial = petri_net.initial_marking.clone();
    let target = petri_net.target_marking.clone();
    let mut reporter = Reporter::from_config(config);

    let output = match config.get_algorithm() {
        SearchAlgorithm::BreadthFirst => run_search(
            BreadthFirst::new(pathfinder, initial, target),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::BestFirst => run_search(
            BestFirst::new(pathfinder, initial, target, *config.get_heuristic()),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::AStar => run_search(
            AStar::new(pathfinder, initial, target),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::FullReachability => run_search(
            FullReachability::new(pathfinder, initial),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::FullCoverability => run_search(
            FullCoverability::new(pathfinder, &initial),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::StochAStar => run_search(
            StochAStar::from_net_rates(pathfinder, initial, target),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::StochDijkstra => run_search(
            StochDijkstra::from_net_rates(pathfinder, initial, target),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::StochFullReach => run_search(
            StochFullReach::from_net_rates(pathfinder, initial),
            &mut reporter,
            net,
            dot,
        )?,
        SearchAlgorithm::StochFullPath => {
            let mut algorithm = StochFullPath::from_net_rates(
                pathfinder,
                initial,
                *config.get_max_depth(),
                *config.get_probability_epsilon(),
            );
            let result = algorithm.run(&mut reporter);
            write_dot(&result, net, dot)?;
            print_status(&result);

            serde_json::json!({
                "result": SerializableSearchResult::from_result(&result, net),
                "distribution": algorithm.distribution(),
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_search<A: ReachabilityAlgorithm>(
    mut algorithm: A,
    reporter: &mut Reporter,
    net: &PetriNet,
    dot: Option<PathBuf>,
) -> anyhow::Result<serde_json::Value> {
    let result = algorithm.run(reporter);
    write_dot(&result, net, dot)?;
    print_status(&result);

    Ok(serde_json::to_value(SerializableSearchResult::from_result(
        &result, net,
    ))?)
}

fn write_dot<M: MarkingLike>(
    result: &SearchResult<M>,
    net: &PetriNet,
    dot: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(path) = dot
        && let Some(graph) = &result.graph
    {
        std::fs::write(path, graph.to_graphviz(net, None))?;
    }
    Ok(())
}

fn print_status<M: MarkingLike>(result: &SearchResult<M>) {
    let status = format!("{:?}", result.status);
    let colored = if result.is_success() || result.is_finished() {
        status.green()
    } else if result.is_failure() {
        status.yellow()
    } else {
        status.red()
    };

    eprintln!(
        "{} after {} steps, {} nodes, {:?}",
        colored.bold(),
        result.statistics.steps,
        result.statistics.nodes,
        result.statistics.time
    );
}

fn simulate(
    net: &PetriNet,
    setup: &SimulationSetup,
    knockouts: &[TransitionIndex],
    config: SimulationConfig,
) -> anyhow::Result<()> {
    let storage = Arc::new(SimulationStorage::with_knockouts(net, setup, knockouts)?);

    let orchestrator =
        SimulationOrchestrator::new(storage, config).with_listener(|event: &SimulationEvent| {
            match event {
                SimulationEvent::Progress { run, steps, time } => {
                    eprintln!("run {}: {} steps, t = {:.4}", run, steps, time);
                }
                SimulationEvent::Merged { path } => {
                    eprintln!("merged into {}", path.display());
                }
                _ => {}
            }
        });

    let summaries = orchestrator.run()?;

    let stopped = summaries.iter().filter(|s| s.stopped).count();
    let line = format!("{} runs finished, {} stopped", summaries.len(), stopped);
    if stopped == 0 {
        eprintln!("{}", line.green().bold());
    } else {
        eprintln!("{}", line.yellow().bold());
    }

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
