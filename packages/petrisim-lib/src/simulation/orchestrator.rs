use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::{SimulationAlgorithm, SimulationConfig},
    simulation::{
        RunControl, RunSummary, SimulationEvent, SimulationListener, StochasticRun,
        exact::{ExactSsa, RunOptions},
        output::merge_outputs,
        storage::SimulationStorage,
        tau_leaping::TauLeaping,
    },
};

/// Creates the run selected by `config.algorithm`.
pub fn create_run(
    storage: Arc<SimulationStorage>,
    options: RunOptions,
    config: &SimulationConfig,
) -> Box<dyn StochasticRun> {
    match config.algorithm {
        SimulationAlgorithm::Exact => Box::new(ExactSsa::new(storage, options)),
        SimulationAlgorithm::TauLeaping => {
            Box::new(TauLeaping::from_config(storage, options, config))
        }
    }
}

/// `runs` seeds drawn from a generator seeded with the global seed, or from
/// system entropy without one.
pub fn derive_seeds(seed: Option<u64>, runs: usize) -> Vec<u64> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    (0..runs).map(|_| rng.random::<u64>()).collect()
}

struct RunningRun {
    run: usize,
    control: Arc<RunControl>,
    handle: JoinHandle<RunSummary>,
}

#[derive(Default)]
struct PoolState {
    running: Vec<RunningRun>,
    queue: VecDeque<RunOptions>,
    summaries: Vec<RunSummary>,
}

/// Runs a number of independent simulations on a bounded pool of threads.
///
/// Runs beyond the pool size wait in a queue. The thread calling
/// [`SimulationOrchestrator::run`] polls the pool: it retires finished runs,
/// promotes queued ones into free slots and periodically asks the running
/// ones to flush their output.
pub struct SimulationOrchestrator {
    storage: Arc<SimulationStorage>,
    config: SimulationConfig,
    listeners: Mutex<Vec<Box<dyn SimulationListener>>>,
    state: Mutex<PoolState>,
    active: AtomicUsize,
    stopped: AtomicBool,
}

impl SimulationOrchestrator {
    pub fn new(storage: Arc<SimulationStorage>, config: SimulationConfig) -> Self {
        SimulationOrchestrator {
            storage,
            config,
            listeners: Mutex::new(vec![]),
            state: Mutex::new(PoolState::default()),
            active: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn with_listener(self, listener: impl SimulationListener + 'static) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&self, listener: impl SimulationListener + 'static) {
        lock(&self.listeners).push(Box::new(listener));
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn pool_size(&self) -> usize {
        self.config
            .max_threads
            .unwrap_or_else(|| {
                thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Number of runs currently executing.
    pub fn active_runs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether [`SimulationOrchestrator::stop`] was called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stops all running runs and drops the queued ones. Output written so
    /// far stays valid. The stop is permanent: a later
    /// [`SimulationOrchestrator::run`] starts no runs.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        self.stopped.store(true, Ordering::SeqCst);
        state.queue.clear();
        for running in &state.running {
            running.control.request_stop();
        }
        tracing::info!(running = %state.running.len(), "Stopping simulation");
    }

    fn emit(&self, event: SimulationEvent) {
        for listener in lock(&self.listeners).iter_mut() {
            listener.on_event(&event);
        }
    }

    /// Executes all runs and blocks until they are done. Returns the run
    /// summaries ordered by run index.
    pub fn run(&self) -> anyhow::Result<Vec<RunSummary>> {
        let seeds = derive_seeds(self.config.seed, self.config.runs);

        tracing::info!(
            runs = %self.config.runs,
            pool = %self.pool_size(),
            algorithm = %self.config.algorithm,
            "Starting simulation"
        );

        {
            let mut state = lock(&self.state);
            state.summaries.clear();
            if self.stopped.load(Ordering::SeqCst) {
                tracing::info!("Simulation was stopped before it started");
                state.queue.clear();
            } else {
                state.queue = seeds
                    .iter()
                    .enumerate()
                    .map(|(run, seed)| RunOptions::from_config(&self.config, run, *seed))
                    .collect();
            }
        }

        let (done_sender, done_receiver) = mpsc::channel::<usize>();
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));

        while self.poll(&done_sender)? {
            match done_receiver.recv_timeout(poll_interval) {
                Ok(run) => tracing::trace!(run = %run, "Run signalled completion"),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }

        let mut summaries = std::mem::take(&mut lock(&self.state).summaries);
        summaries.sort_by_key(|s| s.run);

        if self.config.merge_output {
            self.merge(&summaries)?;
        }

        self.emit(SimulationEvent::Done);
        Ok(summaries)
    }

    /// One scan over the pool. Returns whether runs are still running or
    /// queued.
    fn poll(&self, done: &mpsc::Sender<usize>) -> anyhow::Result<bool> {
        let mut finished = vec![];
        let mut progress = vec![];
        let mut started = vec![];

        let remaining = {
            let mut state = lock(&self.state);

            let (done_runs, running): (Vec<_>, Vec<_>) = std::mem::take(&mut state.running)
                .into_iter()
                .partition(|r| r.handle.is_finished());
            state.running = running;

            for retired in done_runs {
                self.active.fetch_sub(1, Ordering::SeqCst);
                match retired.handle.join() {
                    Ok(summary) => {
                        state.summaries.push(summary.clone());
                        finished.push(summary);
                    }
                    Err(_) => tracing::error!(run = %retired.run, "Simulation run panicked"),
                }
            }

            for running in &state.running {
                running.control.request_flush();
                progress.push((running.run, running.control.steps(), running.control.time()));
            }

            if self.stopped.load(Ordering::SeqCst) {
                state.queue.clear();
            }
            while state.running.len() < self.pool_size() {
                let Some(options) = state.queue.pop_front() else {
                    break;
                };
                started.push((options.run, options.seed));
                let running = self.spawn(options, done.clone())?;
                state.running.push(running);
                self.active.fetch_add(1, Ordering::SeqCst);
            }

            !state.running.is_empty() || !state.queue.is_empty()
        };

        for summary in finished {
            self.emit(SimulationEvent::Finished(summary));
        }
        for (run, steps, time) in progress {
            self.emit(SimulationEvent::Progress { run, steps, time });
        }
        for (run, seed) in started {
            self.emit(SimulationEvent::Started { run, seed });
        }

        Ok(remaining)
    }

    fn spawn(&self, options: RunOptions, done: mpsc::Sender<usize>) -> anyhow::Result<RunningRun> {
        let run = options.run;
        let control = Arc::clone(&options.control);
        let storage = Arc::clone(&self.storage);
        let config = self.config.clone();

        tracing::debug!(run = %run, seed = %options.seed, "Starting run");

        let handle = thread::Builder::new()
            .name(format!("simulation-run-{}", run))
            .spawn(move || {
                let mut simulation = create_run(storage, options, &config);
                let summary = simulation.simulate();
                // the orchestrator may already be gone
                let _ = done.send(run);
                summary
            })?;

        Ok(RunningRun {
            run,
            control,
            handle,
        })
    }

    /// Merges all run files into `summary.csv` next to the first one.
    fn merge(&self, summaries: &[RunSummary]) -> anyhow::Result<()> {
        let files = summaries
            .iter()
            .filter_map(|s| s.output.clone().map(|path| (s.run, path)))
            .collect::<Vec<(usize, PathBuf)>>();
        let Some((_, first)) = files.first() else {
            tracing::warn!("No output files to merge");
            return Ok(());
        };

        let target = first.with_file_name("summary.csv");
        merge_outputs(&files, &target)?;
        tracing::info!(path = %target.display(), files = %files.len(), "Merged outputs");

        self.emit(SimulationEvent::Merged { path: target });
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn test_derive_seeds() {
    assert_eq!(derive_seeds(Some(42), 3), derive_seeds(Some(42), 3));
    assert_ne!(derive_seeds(Some(42), 2), derive_seeds(Some(43), 2));
    assert_eq!(derive_seeds(None, 5).len(), 5);
}
