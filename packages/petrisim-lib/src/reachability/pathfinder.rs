use serde::{Deserialize, Serialize};

use crate::{
    marking::{Marking, MarkingLike, OmegaMarking, OmegaValue},
    net::{PetriNetQuery, PlaceIndex, TransitionIndex},
    simulation::expression::MathematicalExpression,
    utils::binomial,
};

/// A place invariant: a weighting of places whose weighted token sum does not
/// change under any firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PInvariant {
    pub weights: Vec<(PlaceIndex, i64)>,
}

impl PInvariant {
    pub fn new(weights: Vec<(PlaceIndex, i64)>) -> Self {
        PInvariant { weights }
    }

    pub fn weighted_sum(&self, marking: &Marking) -> i64 {
        self.weights
            .iter()
            .map(|(p, w)| marking[*p] as i64 * w)
            .sum()
    }
}

/// Computes successor markings and enabled transitions of a net.
///
/// The pathfinder only considers the transitions that are not knocked out and
/// respects place capacities.
#[derive(Debug, Clone)]
pub struct Pathfinder<N: PetriNetQuery> {
    net: N,
    transitions: Vec<TransitionIndex>,
    /// For every place the transitions producing into it, with arc weights.
    producers: Vec<Vec<(TransitionIndex, u64)>>,
    /// For every place the transitions consuming from it, with arc weights.
    consumers: Vec<Vec<(TransitionIndex, u64)>>,
}

impl<N: PetriNetQuery> Pathfinder<N> {
    pub fn new(net: N) -> Self {
        let transitions = net.transitions().collect();
        Self::with_transitions(net, transitions)
    }

    /// A pathfinder that ignores the given transitions.
    pub fn with_knockouts(net: N, knockouts: &[TransitionIndex]) -> Self {
        let transitions = net
            .transitions()
            .filter(|t| !knockouts.contains(t))
            .collect::<Vec<_>>();

        if !knockouts.is_empty() {
            tracing::debug!(knockouts = ?knockouts, "Knocked out transitions");
        }

        Self::with_transitions(net, transitions)
    }

    fn with_transitions(net: N, transitions: Vec<TransitionIndex>) -> Self {
        let mut producers = vec![vec![]; net.place_count()];
        let mut consumers = vec![vec![]; net.place_count()];

        for t in &transitions {
            for (w, p) in net.output_arcs(*t) {
                producers[p.to_usize()].push((*t, *w));
            }
            for (w, p) in net.input_arcs(*t) {
                consumers[p.to_usize()].push((*t, *w));
            }
        }

        Pathfinder {
            net,
            transitions,
            producers,
            consumers,
        }
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn place_count(&self) -> usize {
        self.net.place_count()
    }

    /// All transitions that are not knocked out.
    pub fn transitions(&self) -> &[TransitionIndex] {
        &self.transitions
    }

    pub fn producers(&self, place: PlaceIndex) -> &[(TransitionIndex, u64)] {
        &self.producers[place.to_usize()]
    }

    pub fn consumers(&self, place: PlaceIndex) -> &[(TransitionIndex, u64)] {
        &self.consumers[place.to_usize()]
    }

    /// Number of transitions connected to a place.
    pub fn degree(&self, place: PlaceIndex) -> usize {
        self.producers[place.to_usize()].len() + self.consumers[place.to_usize()].len()
    }

    pub fn is_active<M: MarkingLike>(&self, transition: TransitionIndex, marking: &M) -> bool
    where
        M::Value: PartialOrd<u64>,
    {
        self.net
            .input_arcs(transition)
            .iter()
            .all(|(w, p)| marking.get(*p) >= *w)
    }

    /// The transitions of `transitions` that are enabled in `marking`.
    pub fn compute_active_in<M: MarkingLike>(
        &self,
        transitions: &[TransitionIndex],
        marking: &M,
    ) -> Vec<TransitionIndex>
    where
        M::Value: PartialOrd<u64>,
    {
        transitions
            .iter()
            .copied()
            .filter(|t| self.is_active(*t, marking))
            .collect()
    }

    /// Enabled transitions of `marking` whose firing does not exceed a place
    /// capacity, in index order.
    pub fn compute_active(&self, marking: &Marking) -> Vec<TransitionIndex> {
        let active = self.compute_active_in(&self.transitions, marking);
        self.remove_over_capacity(active, marking)
    }

    /// Enabled transitions of an omega marking. Capacities are not checked,
    /// as an omega place exceeds every capacity.
    pub fn compute_omega_active(&self, marking: &OmegaMarking) -> Vec<TransitionIndex> {
        self.compute_active_in(&self.transitions, marking)
    }

    /// Removes the transitions whose firing would put more tokens on a place
    /// than its capacity allows.
    pub fn remove_over_capacity(
        &self,
        mut active: Vec<TransitionIndex>,
        marking: &Marking,
    ) -> Vec<TransitionIndex> {
        active.retain(|t| {
            self.net.output_places(*t).all(|p| {
                let capacity = self.net.capacity(p);
                if capacity == 0 {
                    return true;
                }
                let after = marking[p] + self.net.output_weight(*t, p);
                after.saturating_sub(self.net.input_weight(p, *t)) <= capacity
            })
        });
        active
    }

    /// The marking after firing `transition`. The given marking is left
    /// untouched. Constant places are only special in simulations, here
    /// every arc moves its tokens.
    pub fn compute_marking(&self, marking: &Marking, transition: TransitionIndex) -> Marking {
        let mut next = marking.clone();
        for (w, p) in self.net.input_arcs(transition) {
            next[*p] -= w;
        }
        for (w, p) in self.net.output_arcs(transition) {
            next[*p] += w;
        }
        next
    }

    /// [`Pathfinder::compute_marking`] for omega markings. Omega places stay
    /// omega.
    pub fn compute_omega_marking(
        &self,
        marking: &OmegaMarking,
        transition: TransitionIndex,
    ) -> OmegaMarking {
        let mut next = marking.clone();
        for (w, p) in self.net.input_arcs(transition) {
            next[*p] = next[*p] - *w;
        }
        for (w, p) in self.net.output_arcs(transition) {
            next[*p] = next[*p] + *w;
        }
        next
    }

    /// Sets every place of `marking` that exceeds `ancestor` to omega. Only
    /// meaningful if `marking` strictly dominates `ancestor`.
    pub fn omega_computation(&self, mut marking: OmegaMarking, ancestor: &OmegaMarking) -> OmegaMarking {
        for p in self.net.places() {
            if marking[p] > ancestor[p] {
                marking[p] = OmegaValue::Omega;
            }
        }
        marking
    }

    /// Mass action propensity: the rate constant times the number of distinct
    /// reactant combinations, `C(tokens, weight)` per input place.
    pub fn compute_reaction_rate(
        &self,
        transition: TransitionIndex,
        marking: &Marking,
        rate_constants: &[f64],
    ) -> f64 {
        let mut rate = rate_constants[transition.to_usize()];
        for (w, p) in self.net.input_arcs(transition) {
            let combinations = binomial(marking[*p], *w);
            if combinations == 0.0 {
                return 0.0;
            }
            rate *= combinations;
        }
        rate
    }

    /// Constant rate of every transition, indexed by transition.
    ///
    /// Rate expressions that depend on markings or on time can not be used for
    /// a state space search. They fall back to 1, unparsable ones to 0.
    pub fn rate_constants(&self) -> Vec<f64> {
        self.net
            .transitions()
            .map(|t| {
                let text = self.net.rate_expression(t);
                match MathematicalExpression::parse(text, |name| {
                    self.net.find_place(name).map(|p| p.to_usize())
                }) {
                    Ok(expression) if expression.is_constant() => expression.evaluate(&[], 0.0),
                    Ok(_) => {
                        tracing::warn!(
                            transition = %self.net.transition_name(t),
                            rate = %text,
                            "Rate is not constant, using 1"
                        );
                        1.0
                    }
                    Err(e) => {
                        tracing::error!(
                            transition = %self.net.transition_name(t),
                            rate = %text,
                            error = %e,
                            "Could not parse rate, disabling transition"
                        );
                        0.0
                    }
                }
            })
            .collect()
    }

    /// `false` if some invariant has a different weighted token sum in the
    /// two markings, which proves `target` unreachable from `start`.
    pub fn check_p_invariants(
        &self,
        invariants: &[PInvariant],
        start: &Marking,
        target: &Marking,
    ) -> bool {
        invariants
            .iter()
            .all(|inv| inv.weighted_sum(start) == inv.weighted_sum(target))
    }
}
