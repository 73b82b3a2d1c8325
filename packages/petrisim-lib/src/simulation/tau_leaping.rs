use std::sync::Arc;

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::{
    config::SimulationConfig,
    simulation::{
        RunControl, RunEnd, RunSummary, StochasticRun,
        exact::{ExactSsa, RunOptions},
        storage::SimulationStorage,
    },
};

/// Approximate simulation that fires many reactions per step.
///
/// Reactions that can fire fewer than `critical_threshold` more times are
/// critical and never leaped. The leap `tau` is chosen so that the expected
/// change of every non-constant place stays within `epsilon` times its count
/// (at least one molecule). If `tau` is not considerably larger than the
/// expected time of a single reaction, a batch of exact steps is done
/// instead.
pub struct TauLeaping {
    ssa: ExactSsa,
    epsilon: f64,
    critical_threshold: u64,
    exact_fallback_steps: u32,
}

impl TauLeaping {
    pub fn new(storage: Arc<SimulationStorage>, options: RunOptions) -> Self {
        TauLeaping {
            ssa: ExactSsa::new(storage, options),
            epsilon: 0.03,
            critical_threshold: 20,
            exact_fallback_steps: 100,
        }
    }

    pub fn from_config(
        storage: Arc<SimulationStorage>,
        options: RunOptions,
        config: &SimulationConfig,
    ) -> Self {
        TauLeaping {
            epsilon: config.epsilon,
            critical_threshold: config.critical_threshold,
            exact_fallback_steps: config.exact_fallback_steps,
            ..Self::new(storage, options)
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_critical_threshold(mut self, critical_threshold: u64) -> Self {
        self.critical_threshold = critical_threshold;
        self
    }

    pub fn ssa(&self) -> &ExactSsa {
        &self.ssa
    }

    pub fn marking(&self) -> &[u64] {
        self.ssa.marking()
    }

    fn is_critical(&self, reaction: usize) -> bool {
        self.ssa.storage.reactions[reaction]
            .max_firings(&self.ssa.marking, &self.ssa.constant_marking)
            < self.critical_threshold
    }

    /// Largest leap that keeps the expected relative change of every place
    /// below `epsilon`, at most `limit`.
    fn leap_time(&self, non_critical: &[usize], limit: f64) -> f64 {
        let storage = &self.ssa.storage;
        let mut mu = vec![0.0; storage.places.len()];
        let mut sigma = vec![0.0; storage.places.len()];

        for reaction in non_critical {
            let rate = self.ssa.rates.get(reaction).copied().unwrap_or(0.0);
            for (slot, change) in &storage.reactions[*reaction].changes {
                let change = *change as f64;
                mu[*slot] += change * rate;
                sigma[*slot] += change * change * rate;
            }
        }

        let mut tau = limit;
        for slot in 0..storage.places.len() {
            if mu[slot] == 0.0 && sigma[slot] == 0.0 {
                continue;
            }
            let bound = (self.epsilon * self.ssa.marking[slot] as f64).max(1.0);
            tau = tau.min(bound / mu[slot].abs()).min(bound * bound / sigma[slot]);
        }
        tau
    }

    fn leap(&mut self) -> Option<RunEnd> {
        self.ssa.update_rates();
        if self.ssa.sum_of_rates <= 0.0 {
            return Some(RunEnd::Exhausted);
        }

        let max_time = self.ssa.options().max_time;
        let remaining = if max_time > 0.0 {
            if max_time - self.ssa.time <= 0.0 {
                return Some(RunEnd::MaxTime);
            }
            max_time - self.ssa.time
        } else {
            f64::INFINITY
        };

        let (critical, non_critical): (Vec<usize>, Vec<usize>) = self
            .ssa
            .rates
            .keys()
            .copied()
            .partition(|r| self.is_critical(*r));

        let tau = if non_critical.is_empty() {
            remaining
        } else {
            self.leap_time(&non_critical, remaining)
        };

        if tau < 10.0 / self.ssa.sum_of_rates {
            for _ in 0..self.exact_fallback_steps {
                if let Some(end) = self.ssa.exact_step() {
                    return Some(end);
                }
            }
            return None;
        }

        let critical_sum: f64 = critical.iter().filter_map(|r| self.ssa.rates.get(r)).sum();
        let tau_critical = if critical_sum > 0.0 {
            -self.ssa.random_unit().ln() / critical_sum
        } else {
            f64::INFINITY
        };

        let (dt, critical_reaction) = if tau < tau_critical {
            (tau, None)
        } else {
            let threshold = self.ssa.rng.random::<f64>() * critical_sum;
            (tau_critical, self.ssa.select(critical.iter().copied(), threshold))
        };

        if !dt.is_finite() {
            return self.ssa.exact_step();
        }
        if max_time > 0.0 && self.ssa.time + dt > max_time {
            return Some(RunEnd::MaxTime);
        }

        self.ssa.steps += 1;
        self.ssa.time += dt;

        for reaction in non_critical {
            let rate = self.ssa.rates.get(&reaction).copied().unwrap_or(0.0);
            let count = self.sample_firings(rate * dt);
            if count > 0 {
                self.ssa.fire(reaction, count);
            }
        }
        if let Some(reaction) = critical_reaction {
            self.ssa.fire(reaction, 1);
        }

        self.ssa.write_if_due();
        None
    }

    fn sample_firings(&mut self, mean: f64) -> u64 {
        if mean <= 0.0 {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(poisson) => poisson.sample(&mut self.ssa.rng) as u64,
            Err(e) => {
                tracing::warn!(mean = %mean, error = %e, "Could not sample firings");
                0
            }
        }
    }
}

impl StochasticRun for TauLeaping {
    fn control(&self) -> &RunControl {
        self.ssa.control()
    }

    fn step(&mut self) -> Option<RunEnd> {
        self.leap()
    }

    fn flush(&mut self) {
        self.ssa.flush();
    }

    fn steps(&self) -> u64 {
        self.ssa.steps
    }

    fn time(&self) -> f64 {
        self.ssa.time
    }

    fn finish(&mut self, end: RunEnd) -> RunSummary {
        self.ssa.finish(end)
    }
}
