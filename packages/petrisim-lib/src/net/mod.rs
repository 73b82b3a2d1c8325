use std::sync::Arc;

use serde::{Deserialize, Serialize};
use transition::PetriNetTransition;

use crate::marking::Marking;

pub mod initialized;
pub mod spec;
pub mod transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceIndex {
    index: u32,
}

impl PlaceIndex {
    pub fn new(index: u32) -> Self {
        PlaceIndex { index }
    }

    pub fn iter_places(place_count: usize) -> impl Iterator<Item = PlaceIndex> {
        (0..place_count).map(|i| PlaceIndex::new(i as u32))
    }

    pub fn to_usize(&self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for PlaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.index)
    }
}

impl From<u32> for PlaceIndex {
    fn from(index: u32) -> Self {
        PlaceIndex::new(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionIndex {
    index: u32,
}

impl TransitionIndex {
    pub fn new(index: u32) -> Self {
        TransitionIndex { index }
    }

    pub fn iter_transitions(transition_count: usize) -> impl Iterator<Item = TransitionIndex> {
        (0..transition_count).map(|i| TransitionIndex::new(i as u32))
    }

    pub fn to_usize(&self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for TransitionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.index)
    }
}

impl From<u32> for TransitionIndex {
    fn from(index: u32) -> Self {
        TransitionIndex::new(index)
    }
}

/// Read-only view of a Petri net, as needed by the search and simulation
/// engines.
///
/// Arcs are given as `(weight, place)` tuples.
pub trait PetriNetQuery {
    fn place_count(&self) -> usize;

    fn transition_count(&self) -> usize;

    fn place_name(&self, place: PlaceIndex) -> &str;

    fn transition_name(&self, transition: TransitionIndex) -> &str;

    fn input_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)];

    fn output_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)];

    /// Constant places hold a fixed amount (or an expression) and are never
    /// changed by firing.
    fn is_constant(&self, _place: PlaceIndex) -> bool {
        false
    }

    /// Maximal number of tokens a place may hold, 0 means unlimited.
    fn capacity(&self, _place: PlaceIndex) -> u64 {
        0
    }

    /// Rate constant of a transition as a mathematical expression.
    fn rate_expression(&self, _transition: TransitionIndex) -> &str {
        "1"
    }

    fn places(&self) -> impl Iterator<Item = PlaceIndex> {
        PlaceIndex::iter_places(self.place_count())
    }

    fn transitions(&self) -> impl Iterator<Item = TransitionIndex> {
        TransitionIndex::iter_transitions(self.transition_count())
    }

    fn input_places(&self, transition: TransitionIndex) -> impl Iterator<Item = PlaceIndex> {
        self.input_arcs(transition).iter().map(|(_, p)| *p)
    }

    fn output_places(&self, transition: TransitionIndex) -> impl Iterator<Item = PlaceIndex> {
        self.output_arcs(transition).iter().map(|(_, p)| *p)
    }

    /// Weight of the arc from `place` to `transition`, 0 if there is none.
    fn input_weight(&self, place: PlaceIndex, transition: TransitionIndex) -> u64 {
        self.input_arcs(transition)
            .iter()
            .filter(|(_, p)| *p == place)
            .map(|(w, _)| *w)
            .sum()
    }

    /// Weight of the arc from `transition` to `place`, 0 if there is none.
    fn output_weight(&self, transition: TransitionIndex, place: PlaceIndex) -> u64 {
        self.output_arcs(transition)
            .iter()
            .filter(|(_, p)| *p == place)
            .map(|(w, _)| *w)
            .sum()
    }

    fn find_place(&self, name: &str) -> Option<PlaceIndex> {
        self.places().find(|p| self.place_name(*p) == name)
    }

    fn find_transition(&self, name: &str) -> Option<TransitionIndex> {
        self.transitions().find(|t| self.transition_name(*t) == name)
    }
}

impl<N: PetriNetQuery> PetriNetQuery for &N {
    fn place_count(&self) -> usize {
        (**self).place_count()
    }

    fn transition_count(&self) -> usize {
        (**self).transition_count()
    }

    fn place_name(&self, place: PlaceIndex) -> &str {
        (**self).place_name(place)
    }

    fn transition_name(&self, transition: TransitionIndex) -> &str {
        (**self).transition_name(transition)
    }

    fn input_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)] {
        (**self).input_arcs(transition)
    }

    fn output_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)] {
        (**self).output_arcs(transition)
    }

    fn is_constant(&self, place: PlaceIndex) -> bool {
        (**self).is_constant(place)
    }

    fn capacity(&self, place: PlaceIndex) -> u64 {
        (**self).capacity(place)
    }

    fn rate_expression(&self, transition: TransitionIndex) -> &str {
        (**self).rate_expression(transition)
    }
}

impl<N: PetriNetQuery> PetriNetQuery for Arc<N> {
    fn place_count(&self) -> usize {
        (**self).place_count()
    }

    fn transition_count(&self) -> usize {
        (**self).transition_count()
    }

    fn place_name(&self, place: PlaceIndex) -> &str {
        (**self).place_name(place)
    }

    fn transition_name(&self, transition: TransitionIndex) -> &str {
        (**self).transition_name(transition)
    }

    fn input_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)] {
        (**self).input_arcs(transition)
    }

    fn output_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)] {
        (**self).output_arcs(transition)
    }

    fn is_constant(&self, place: PlaceIndex) -> bool {
        (**self).is_constant(place)
    }

    fn capacity(&self, place: PlaceIndex) -> u64 {
        (**self).capacity(place)
    }

    fn rate_expression(&self, transition: TransitionIndex) -> &str {
        (**self).rate_expression(transition)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub constant: bool,
    #[serde(default)]
    pub capacity: u64,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Place {
            name: name.into(),
            constant: false,
            capacity: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetriNet {
    places: Vec<Place>,
    transitions: Vec<PetriNetTransition>,
}

impl PetriNet {
    pub fn new() -> Self {
        Self {
            places: vec![],
            transitions: vec![],
        }
    }

    /// Creates a net with `place_count` places named `p1`, `p2`, ...
    pub fn with_places(place_count: usize) -> Self {
        let mut net = Self::new();
        for i in 1..=place_count {
            net.add_place(format!("p{}", i));
        }
        net
    }

    pub fn add_place(&mut self, name: impl Into<String>) -> PlaceIndex {
        self.places.push(Place::new(name));
        PlaceIndex::new(self.places.len() as u32 - 1)
    }

    /// The first element of each tuple is the weight and the second element
    /// is the place.
    pub fn add_transition(
        &mut self,
        name: impl Into<String>,
        input: Vec<(u64, PlaceIndex)>,
        output: Vec<(u64, PlaceIndex)>,
    ) -> TransitionIndex {
        self.add_transition_struct(PetriNetTransition::new(name, input, output))
    }

    pub fn add_transition_struct(&mut self, transition: PetriNetTransition) -> TransitionIndex {
        self.transitions.push(transition);
        TransitionIndex::new(self.transitions.len() as u32 - 1)
    }

    pub fn place(&self, place: PlaceIndex) -> &Place {
        &self.places[place.to_usize()]
    }

    pub fn place_mut(&mut self, place: PlaceIndex) -> &mut Place {
        &mut self.places[place.to_usize()]
    }

    pub fn transition(&self, transition: TransitionIndex) -> &PetriNetTransition {
        &self.transitions[transition.to_usize()]
    }

    pub fn transition_mut(&mut self, transition: TransitionIndex) -> &mut PetriNetTransition {
        &mut self.transitions[transition.to_usize()]
    }

    pub fn set_constant(&mut self, place: PlaceIndex, constant: bool) {
        self.place_mut(place).constant = constant;
    }

    pub fn set_capacity(&mut self, place: PlaceIndex, capacity: u64) {
        self.place_mut(place).capacity = capacity;
    }

    pub fn init(self, initial_marking: Marking, target_marking: Marking) -> initialized::InitializedPetriNet {
        initialized::InitializedPetriNet::new(self, initial_marking, target_marking)
    }
}

impl Default for PetriNet {
    fn default() -> Self {
        Self::new()
    }
}

impl PetriNetQuery for PetriNet {
    fn place_count(&self) -> usize {
        self.places.len()
    }

    fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    fn place_name(&self, place: PlaceIndex) -> &str {
        &self.places[place.to_usize()].name
    }

    fn transition_name(&self, transition: TransitionIndex) -> &str {
        self.transitions[transition.to_usize()].name()
    }

    fn input_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)] {
        self.transitions[transition.to_usize()].input()
    }

    fn output_arcs(&self, transition: TransitionIndex) -> &[(u64, PlaceIndex)] {
        self.transitions[transition.to_usize()].output()
    }

    fn is_constant(&self, place: PlaceIndex) -> bool {
        self.places[place.to_usize()].constant
    }

    fn capacity(&self, place: PlaceIndex) -> u64 {
        self.places[place.to_usize()].capacity
    }

    fn rate_expression(&self, transition: TransitionIndex) -> &str {
        self.transitions[transition.to_usize()].rate()
    }
}

#[test]
fn test_arc_weights() {
    let mut net = PetriNet::with_places(2);
    let p1 = PlaceIndex::new(0);
    let p2 = PlaceIndex::new(1);
    let t = net.add_transition("t1", vec![(2, p1)], vec![(3, p2)]);

    assert_eq!(net.input_weight(p1, t), 2);
    assert_eq!(net.input_weight(p2, t), 0);
    assert_eq!(net.output_weight(t, p2), 3);
    assert_eq!(net.find_place("p2"), Some(p2));
    assert_eq!(net.find_transition("t1"), Some(t));
    assert_eq!(net.input_places(t).collect::<Vec<_>>(), vec![p1]);
}
