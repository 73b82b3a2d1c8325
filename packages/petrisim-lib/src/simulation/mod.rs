use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::simulation::output::TrajectoryRow;

pub mod exact;
pub mod expression;
pub mod orchestrator;
pub mod output;
pub mod setup;
pub mod storage;
pub mod tau_leaping;

/// Shared state between a running simulation and the outside world. The run
/// publishes its progress here and picks up stop and flush requests at the
/// start of every step.
#[derive(Debug, Default)]
pub struct RunControl {
    stop: AtomicBool,
    flush_requested: AtomicBool,
    finished: AtomicBool,
    steps: AtomicU64,
    /// Bits of the simulated time as `f64`.
    time: AtomicU64,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn request_flush(&self) {
        self.flush_requested.store(true, Ordering::SeqCst);
    }

    /// Returns whether a flush was requested and resets the request.
    pub fn take_flush_request(&self) -> bool {
        self.flush_requested.swap(false, Ordering::SeqCst)
    }

    pub fn publish(&self, steps: u64, time: f64) {
        self.steps.store(steps, Ordering::Relaxed);
        self.time.store(time.to_bits(), Ordering::Relaxed);
    }

    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn time(&self) -> f64 {
        f64::from_bits(self.time.load(Ordering::Relaxed))
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEnd {
    /// The maximal simulated time was reached.
    MaxTime,
    /// No reaction has a positive propensity anymore.
    Exhausted,
    /// A stop was requested.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: usize,
    pub seed: u64,
    pub steps: u64,
    /// Simulated time at the end of the run.
    pub time: f64,
    pub stopped: bool,
    pub end: RunEnd,
    pub output: Option<PathBuf>,
    /// All written rows, only kept on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trajectory: Option<Vec<TrajectoryRow>>,
}

/// A single stochastic simulation run.
pub trait StochasticRun: Send {
    fn control(&self) -> &RunControl;

    /// Performs one step. Returns why the run ended, if it did.
    fn step(&mut self) -> Option<RunEnd>;

    fn flush(&mut self);

    fn steps(&self) -> u64;

    fn time(&self) -> f64;

    /// Closes the output and summarizes the run.
    fn finish(&mut self, end: RunEnd) -> RunSummary;

    /// Steps until the run ends or a stop is requested.
    fn simulate(&mut self) -> RunSummary {
        let end = loop {
            if self.control().is_stop_requested() {
                break RunEnd::Stopped;
            }
            if self.control().take_flush_request() {
                self.flush();
            }

            if let Some(end) = self.step() {
                break end;
            }
            self.control().publish(self.steps(), self.time());
        };

        self.control().publish(self.steps(), self.time());
        let summary = self.finish(end);
        self.control().mark_finished();

        tracing::debug!(
            run = %summary.run,
            steps = %summary.steps,
            time = %summary.time,
            end = ?summary.end,
            "Run finished"
        );
        summary
    }
}

/// Events of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulationEvent {
    Started { run: usize, seed: u64 },
    Progress { run: usize, steps: u64, time: f64 },
    Finished(RunSummary),
    Merged { path: PathBuf },
    Done,
}

pub trait SimulationListener: Send {
    fn on_event(&mut self, event: &SimulationEvent);
}

impl<F: FnMut(&SimulationEvent) + Send> SimulationListener for F {
    fn on_event(&mut self, event: &SimulationEvent) {
        self(event)
    }
}

impl SimulationListener for std::sync::mpsc::Sender<SimulationEvent> {
    fn on_event(&mut self, event: &SimulationEvent) {
        let _ = self.send(event.clone());
    }
}
