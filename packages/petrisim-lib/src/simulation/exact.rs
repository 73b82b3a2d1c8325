use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::SimulationConfig,
    simulation::{
        RunControl, RunEnd, RunSummary, StochasticRun,
        output::{TrajectoryRow, TrajectoryWriter, header_line},
        storage::SimulationStorage,
    },
    utils::suffixed_path,
};

/// Per-run parameters.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run: usize,
    pub seed: u64,
    /// 0 means unlimited.
    pub max_time: f64,
    /// 0 writes a row after every step.
    pub update_interval: f64,
    pub output: Option<PathBuf>,
    pub keep_trajectory: bool,
    pub control: Arc<RunControl>,
}

impl RunOptions {
    pub fn new(run: usize, seed: u64) -> Self {
        RunOptions {
            run,
            seed,
            max_time: 0.0,
            update_interval: 0.0,
            output: None,
            keep_trajectory: false,
            control: Arc::new(RunControl::new()),
        }
    }

    /// Run 0 writes to the configured output, run `i` to `<stem>_<i>.<ext>`.
    pub fn from_config(config: &SimulationConfig, run: usize, seed: u64) -> Self {
        let output = config.output.as_ref().map(|path| match run {
            0 => path.clone(),
            i => suffixed_path(path, i),
        });

        RunOptions {
            max_time: config.max_time,
            update_interval: config.update_interval,
            output,
            keep_trajectory: config.keep_trajectory,
            ..Self::new(run, seed)
        }
    }

    pub fn with_max_time(mut self, max_time: f64) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn with_update_interval(mut self, update_interval: f64) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_trajectory(mut self) -> Self {
        self.keep_trajectory = true;
        self
    }

    pub fn with_control(mut self, control: Arc<RunControl>) -> Self {
        self.control = control;
        self
    }
}

/// Gillespie's direct method.
///
/// Propensities are kept in a sparse map that only holds reactions with a
/// positive propensity. After a firing only the reactions influenced by the
/// changed places are recomputed, plus the reactions that depend on
/// constant places or time.
pub struct ExactSsa {
    pub(crate) storage: Arc<SimulationStorage>,
    pub(crate) rng: StdRng,
    pub(crate) marking: Vec<u64>,
    pub(crate) constant_marking: Vec<u64>,
    /// Concentration of every place, indexed by place index.
    concentrations: Vec<f64>,
    pub(crate) rates: BTreeMap<usize, f64>,
    pub(crate) sum_of_rates: f64,
    dirty: BTreeSet<usize>,
    pub(crate) time: f64,
    pub(crate) steps: u64,
    last_update: f64,
    /// Reactions fired since the last written row.
    fired: Vec<usize>,
    options: RunOptions,
    writer: Option<TrajectoryWriter>,
    trajectory: Option<Vec<TrajectoryRow>>,
}

impl ExactSsa {
    pub fn new(storage: Arc<SimulationStorage>, options: RunOptions) -> Self {
        let mut concentrations = vec![0.0; storage.place_count];
        for (slot, place) in storage.places.iter().enumerate() {
            concentrations[place.to_usize()] = storage.initial_marking[slot] as f64 / storage.vol_mol;
        }

        let mut ssa = ExactSsa {
            rng: StdRng::seed_from_u64(options.seed),
            marking: storage.initial_marking.clone(),
            constant_marking: vec![0; storage.constant_places.len()],
            concentrations,
            rates: BTreeMap::new(),
            sum_of_rates: 0.0,
            dirty: (0..storage.reactions.len()).collect(),
            time: 0.0,
            steps: 0,
            last_update: 0.0,
            fired: vec![],
            writer: None,
            trajectory: options.keep_trajectory.then(Vec::new),
            options,
            storage,
        };
        ssa.update_constant_places();

        if let Some(path) = ssa.options.output.clone() {
            match TrajectoryWriter::create(&path, &header_line(ssa.storage.column_names())) {
                Ok(writer) => ssa.writer = Some(writer),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Could not create output file")
                }
            }
        }

        let initial = ssa.row("none".to_string(), 0.0);
        ssa.record(initial);

        ssa
    }

    pub fn run_index(&self) -> usize {
        self.options.run
    }

    pub fn seed(&self) -> u64 {
        self.options.seed
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn storage(&self) -> &SimulationStorage {
        &self.storage
    }

    /// Counts of the non-constant places.
    pub fn marking(&self) -> &[u64] {
        &self.marking
    }

    /// Counts of the constant places.
    pub fn constant_marking(&self) -> &[u64] {
        &self.constant_marking
    }

    pub fn sum_of_rates(&self) -> f64 {
        self.sum_of_rates
    }

    /// Branching probability of every reaction with a positive propensity in
    /// the current state.
    pub fn reaction_probabilities(&mut self) -> Vec<(usize, f64)> {
        self.update_rates();
        if self.sum_of_rates <= 0.0 {
            return vec![];
        }
        self.rates
            .iter()
            .map(|(r, rate)| (*r, rate / self.sum_of_rates))
            .collect()
    }

    /// Recomputes the propensities of the dirty reactions.
    pub(crate) fn update_rates(&mut self) {
        let dirty = std::mem::take(&mut self.dirty);
        for reaction in dirty {
            let rate = self.propensity(reaction);
            if let Some(old) = self.rates.remove(&reaction) {
                self.sum_of_rates -= old;
            }
            if rate > 0.0 {
                self.rates.insert(reaction, rate);
                self.sum_of_rates += rate;
            }
        }

        if self.rates.is_empty() {
            self.sum_of_rates = 0.0;
        }
        self.dirty.extend(self.storage.always_dirty.iter().copied());
    }

    fn propensity(&self, reaction: usize) -> f64 {
        let reaction = &self.storage.reactions[reaction];
        let k = reaction.rate_constant.evaluate(&self.concentrations, self.time);
        reaction.propensity(k, self.storage.vol_mol, &self.marking, &self.constant_marking)
    }

    /// The reaction at which the cumulated propensities of `candidates` reach
    /// `threshold`.
    pub(crate) fn select(
        &self,
        candidates: impl Iterator<Item = usize>,
        threshold: f64,
    ) -> Option<usize> {
        let mut cumulated = 0.0;
        let mut last = None;
        for reaction in candidates {
            let Some(rate) = self.rates.get(&reaction) else {
                continue;
            };
            cumulated += rate;
            last = Some(reaction);
            if cumulated >= threshold {
                break;
            }
        }
        last
    }

    /// Fires `reaction` `count` times at once, but at most as often as its
    /// non-constant educts allow.
    pub(crate) fn fire(&mut self, reaction: usize, count: u64) {
        let storage = Arc::clone(&self.storage);
        let count = storage.reactions[reaction]
            .educts
            .iter()
            .map(|(slot, w)| self.marking[*slot] / w)
            .fold(count, u64::min);

        for (slot, change) in &storage.reactions[reaction].changes {
            let amount = change.unsigned_abs().saturating_mul(count);
            let tokens = &mut self.marking[*slot];
            *tokens = if *change >= 0 {
                tokens.saturating_add(amount)
            } else {
                tokens.saturating_sub(amount)
            };

            self.concentrations[storage.places[*slot].to_usize()] = *tokens as f64 / storage.vol_mol;
            self.dirty.extend(storage.influence[*slot].iter().copied());
        }

        self.update_constant_places();
        self.fired.push(reaction);
    }

    fn update_constant_places(&mut self) {
        for (i, expression) in self.storage.constant_expressions.iter().enumerate() {
            let value = expression.evaluate(&self.concentrations, self.time);
            self.constant_marking[i] = (value * self.storage.vol_mol).round().max(0.0) as u64;
            self.concentrations[self.storage.constant_places[i].to_usize()] = value;
        }
    }

    pub(crate) fn random_unit(&mut self) -> f64 {
        // in (0, 1], safe for ln
        1.0 - self.rng.random::<f64>()
    }

    /// One step of the direct method.
    pub(crate) fn exact_step(&mut self) -> Option<RunEnd> {
        self.update_rates();
        if self.sum_of_rates <= 0.0 {
            return Some(RunEnd::Exhausted);
        }

        let tau = -self.random_unit().ln() / self.sum_of_rates;
        if self.options.max_time > 0.0 && self.time + tau > self.options.max_time {
            return Some(RunEnd::MaxTime);
        }

        let threshold = self.rng.random::<f64>() * self.sum_of_rates;
        let reaction = self.select(self.rates.keys().copied(), threshold)?;

        self.steps += 1;
        self.time += tau;
        self.fire(reaction, 1);
        self.write_if_due();

        None
    }

    fn row(&self, reactions: String, time: f64) -> TrajectoryRow {
        TrajectoryRow {
            step: self.steps,
            time,
            reactions,
            tokens: self
                .marking
                .iter()
                .chain(&self.constant_marking)
                .copied()
                .collect(),
        }
    }

    fn record(&mut self, row: TrajectoryRow) {
        if let Some(writer) = &mut self.writer {
            writer.write_row(&row);
        }
        if let Some(trajectory) = &mut self.trajectory {
            trajectory.push(row);
        }
    }

    fn fired_names(&mut self) -> String {
        let mut names: Vec<&str> = vec![];
        for reaction in self.fired.drain(..) {
            let name = self.storage.reactions[reaction].name.as_str();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.join(";")
    }

    /// Writes a row if simulated time passed the next interval boundary. The
    /// row is stamped with the latest boundary not after the current time.
    pub(crate) fn write_if_due(&mut self) {
        let interval = self.options.update_interval;
        let time = if interval <= 0.0 {
            self.time
        } else if self.time >= self.last_update + interval {
            self.last_update + ((self.time - self.last_update) / interval).floor() * interval
        } else {
            return;
        };

        self.last_update = time;
        let names = self.fired_names();
        let row = self.row(names, time);
        self.record(row);
    }
}

impl StochasticRun for ExactSsa {
    fn control(&self) -> &RunControl {
        &self.options.control
    }

    fn step(&mut self) -> Option<RunEnd> {
        self.exact_step()
    }

    fn flush(&mut self) {
        if let Some(writer) = &mut self.writer {
            writer.flush();
        }
    }

    fn steps(&self) -> u64 {
        self.steps
    }

    fn time(&self) -> f64 {
        self.time
    }

    /// Rows that were not written yet because the interval did not pass are
    /// written with the current time.
    fn finish(&mut self, end: RunEnd) -> RunSummary {
        if !self.fired.is_empty() {
            let names = self.fired_names();
            let row = self.row(names, self.time);
            self.record(row);
        }

        let output = self.writer.take().map(|mut writer| {
            writer.flush();
            writer.path().to_path_buf()
        });

        RunSummary {
            run: self.options.run,
            seed: self.options.seed,
            steps: self.steps,
            time: self.time,
            stopped: end == RunEnd::Stopped,
            end,
            output,
            trajectory: self.trajectory.take(),
        }
    }
}
