use std::collections::BTreeSet;

use anyhow::bail;

use crate::{
    net::{PetriNetQuery, PlaceIndex, TransitionIndex},
    simulation::{
        expression::MathematicalExpression,
        setup::{AVOGADRO, SimulationSetup},
    },
    utils::{binomial, factorial},
};

/// Order of a reaction (sum of its educt weights) and the multiplier
/// `prod w!` used to convert between deterministic and stochastic rate
/// constants.
pub fn reaction_order<N: PetriNetQuery>(
    net: &N,
    transition: TransitionIndex,
) -> (u64, f64) {
    net.input_arcs(transition)
        .iter()
        .fold((0, 1.0), |(order, multiplier), (w, _)| {
            (order + w, multiplier * factorial(*w))
        })
}

/// Converts a deterministic rate constant `k` into the stochastic constant
/// `c`.
pub fn stochastic_rate_constant(k: f64, order: u64, multiplier: f64, vol_mol: f64) -> f64 {
    match order {
        0 => k * vol_mol,
        1 => k,
        _ => k * multiplier / vol_mol.powi(order as i32 - 1),
    }
}

/// One reaction in the index space of the storage.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub name: String,
    /// `(slot, weight)` of the non-constant educts.
    pub educts: Vec<(usize, u64)>,
    /// `(slot, weight)` of the constant educts.
    pub constant_educts: Vec<(usize, u64)>,
    /// `(slot, change)` of every non-constant place whose count the reaction
    /// changes.
    pub changes: Vec<(usize, i64)>,
    pub order: u64,
    pub multiplier: f64,
    /// Deterministic rate constant.
    pub rate_constant: MathematicalExpression,
}

impl Reaction {
    /// Propensity for the given markings: the stochastic rate constant times
    /// the number of distinct educt combinations.
    pub fn propensity(&self, k: f64, vol_mol: f64, marking: &[u64], constant_marking: &[u64]) -> f64 {
        let mut combinations = 1.0;
        for (slot, weight) in &self.educts {
            if marking[*slot] < *weight {
                return 0.0;
            }
            combinations *= binomial(marking[*slot], *weight);
        }
        for (slot, weight) in &self.constant_educts {
            if constant_marking[*slot] < *weight {
                return 0.0;
            }
            combinations *= binomial(constant_marking[*slot], *weight);
        }

        combinations * stochastic_rate_constant(k, self.order, self.multiplier, vol_mol)
    }

    /// How often the reaction can fire before an educt runs out.
    pub fn max_firings(&self, marking: &[u64], constant_marking: &[u64]) -> u64 {
        self.educts
            .iter()
            .map(|(slot, w)| marking[*slot] / w)
            .chain(
                self.constant_educts
                    .iter()
                    .map(|(slot, w)| constant_marking[*slot] / w),
            )
            .min()
            .unwrap_or(u64::MAX)
    }
}

/// Everything about a net that stays fixed during a simulation, flattened
/// into index arrays. Shared read-only by all runs.
///
/// Places are split into non-constant ones, whose counts change by firing,
/// and constant ones, whose counts are given by an expression. Expressions
/// are evaluated against a concentration array indexed by place index.
#[derive(Debug, Clone)]
pub struct SimulationStorage {
    /// Volume times the Avogadro constant.
    pub vol_mol: f64,
    pub place_count: usize,
    pub places: Vec<PlaceIndex>,
    pub place_names: Vec<String>,
    pub initial_marking: Vec<u64>,
    pub constant_places: Vec<PlaceIndex>,
    pub constant_names: Vec<String>,
    pub constant_expressions: Vec<MathematicalExpression>,
    pub reactions: Vec<Reaction>,
    /// For every non-constant place the reactions whose propensity depends
    /// on it.
    pub influence: Vec<Vec<usize>>,
    /// Reactions whose propensity has to be recomputed after every step:
    /// those with constant educts and those whose rate depends on time or on
    /// a constant place.
    pub always_dirty: Vec<usize>,
}

impl SimulationStorage {
    pub fn new<N: PetriNetQuery>(net: &N, setup: &SimulationSetup) -> anyhow::Result<Self> {
        Self::with_knockouts(net, setup, &[])
    }

    /// Like [`SimulationStorage::new`], but the knocked out transitions get a
    /// rate constant of 0 and never fire.
    pub fn with_knockouts<N: PetriNetQuery>(
        net: &N,
        setup: &SimulationSetup,
        knockouts: &[TransitionIndex],
    ) -> anyhow::Result<Self> {
        if setup.volume <= 0.0 {
            bail!("Volume has to be positive, got {}", setup.volume);
        }
        let vol_mol = setup.volume * AVOGADRO;

        let mut slots = vec![Slot::Variable(0); net.place_count()];
        let mut places = vec![];
        let mut place_names = vec![];
        let mut initial_marking = vec![];
        let mut constant_places = vec![];
        let mut constant_names = vec![];
        let mut constant_texts = vec![];

        for p in net.places() {
            let Some(place) = setup.place(p) else {
                bail!("Setup has no entry for place '{}'", net.place_name(p));
            };

            if place.constant {
                slots[p.to_usize()] = Slot::Constant(constant_places.len());
                constant_places.push(p);
                constant_names.push(place.name.clone());
                constant_texts.push(
                    place
                        .expression
                        .clone()
                        .unwrap_or_else(|| (place.tokens as f64 / vol_mol).to_string()),
                );
            } else {
                slots[p.to_usize()] = Slot::Variable(places.len());
                places.push(p);
                place_names.push(place.name.clone());
                initial_marking.push(place.tokens);
            }
        }

        let resolve = |name: &str| {
            setup
                .places
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.id as usize)
                .filter(|id| *id < net.place_count())
        };
        let parse = |text: &str, what: &str| {
            MathematicalExpression::parse(text, resolve).unwrap_or_else(|e| {
                tracing::error!(%what, error = %e, "Could not parse expression, using 0");
                MathematicalExpression::constant(0.0)
            })
        };

        let constant_expressions = constant_texts
            .iter()
            .zip(&constant_names)
            .map(|(text, name)| parse(text, name))
            .collect::<Vec<_>>();

        let mut reactions = vec![];
        let mut influence = vec![BTreeSet::new(); places.len()];
        let mut always_dirty = vec![];

        for t in net.transitions() {
            let index = reactions.len();
            let text = setup
                .transition(t)
                .map(|s| s.rate.as_str())
                .unwrap_or_else(|| net.rate_expression(t));
            let rate_constant = if knockouts.contains(&t) {
                MathematicalExpression::constant(0.0)
            } else {
                parse(text, net.transition_name(t))
            };
            let (order, multiplier) = reaction_order(net, t);

            let mut educts = vec![];
            let mut constant_educts = vec![];
            for (w, p) in net.input_arcs(t) {
                match slots[p.to_usize()] {
                    Slot::Variable(slot) => {
                        educts.push((slot, *w));
                        influence[slot].insert(index);
                    }
                    Slot::Constant(slot) => constant_educts.push((slot, *w)),
                }
            }

            let mut changes: Vec<(usize, i64)> = vec![];
            for p in net.input_places(t).chain(net.output_places(t)) {
                let Slot::Variable(slot) = slots[p.to_usize()] else {
                    continue;
                };
                let change = net.output_weight(t, p) as i64 - net.input_weight(p, t) as i64;
                if change != 0 && !changes.iter().any(|(s, _)| *s == slot) {
                    changes.push((slot, change));
                }
            }

            let mut depends_on_constant = rate_constant.uses_time();
            for (_, place) in rate_constant.variables() {
                match slots[place] {
                    Slot::Variable(slot) => {
                        influence[slot].insert(index);
                    }
                    Slot::Constant(_) => depends_on_constant = true,
                }
            }
            if depends_on_constant || !constant_educts.is_empty() {
                always_dirty.push(index);
            }

            reactions.push(Reaction {
                name: net.transition_name(t).to_string(),
                educts,
                constant_educts,
                changes,
                order,
                multiplier,
                rate_constant,
            });
        }

        tracing::debug!(
            places = %places.len(),
            constant_places = %constant_places.len(),
            reactions = %reactions.len(),
            always_dirty = ?always_dirty,
            "Simulation storage"
        );

        Ok(SimulationStorage {
            vol_mol,
            place_count: net.place_count(),
            places,
            place_names,
            initial_marking,
            constant_places,
            constant_names,
            constant_expressions,
            reactions,
            influence: influence
                .into_iter()
                .map(|set| set.into_iter().collect())
                .collect(),
            always_dirty,
        })
    }

    /// Column names of the output, non-constant places first.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.place_names
            .iter()
            .chain(&self.constant_names)
            .map(|n| n.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Variable(usize),
    Constant(usize),
}

#[test]
fn test_rate_constant_conversion() {
    let vol_mol = 10.0;
    assert_eq!(stochastic_rate_constant(2.0, 0, 1.0, vol_mol), 20.0);
    assert_eq!(stochastic_rate_constant(2.0, 1, 1.0, vol_mol), 2.0);
    assert_eq!(stochastic_rate_constant(2.0, 2, 2.0, vol_mol), 0.4);
    assert_eq!(stochastic_rate_constant(2.0, 3, 6.0, vol_mol), 0.12);
}
