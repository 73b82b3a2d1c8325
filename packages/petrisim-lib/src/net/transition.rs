use serde::{Deserialize, Serialize};

use crate::net::PlaceIndex;

fn default_rate() -> String {
    "1".to_string()
}

/// Petri net transition. The first element of each arc tuple is the weight and
/// the second element is the place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetriNetTransition {
    name: String,
    input: Vec<(u64, PlaceIndex)>,
    output: Vec<(u64, PlaceIndex)>,
    /// Rate constant as a mathematical expression over place names and `Time`.
    #[serde(default = "default_rate")]
    rate: String,
}

impl PetriNetTransition {
    pub fn new(
        name: impl Into<String>,
        input: Vec<(u64, PlaceIndex)>,
        output: Vec<(u64, PlaceIndex)>,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            output,
            rate: default_rate(),
        }
    }

    /// Builds a transition from per-place consumption and production vectors.
    /// Entries that are zero do not produce an arc.
    pub fn from_updates(name: impl Into<String>, input: &[u64], output: &[u64]) -> Self {
        let arcs = |values: &[u64]| {
            values
                .iter()
                .enumerate()
                .filter(|(_, w)| **w > 0)
                .map(|(i, w)| (*w, PlaceIndex::new(i as u32)))
                .collect::<Vec<_>>()
        };

        Self::new(name, arcs(input), arcs(output))
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = rate.into();
        self
    }

    pub fn set_rate(&mut self, rate: impl Into<String>) {
        self.rate = rate.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> &str {
        &self.rate
    }

    pub fn input(&self) -> &[(u64, PlaceIndex)] {
        &self.input
    }

    pub fn output(&self) -> &[(u64, PlaceIndex)] {
        &self.output
    }

    /// Returns (consumed, produced) tokens for the given place.
    pub fn get_update_for_place(&self, place: PlaceIndex) -> (u64, u64) {
        let consumed = self
            .input
            .iter()
            .filter(|(_, p)| *p == place)
            .map(|(w, _)| w)
            .sum();
        let produced = self
            .output
            .iter()
            .filter(|(_, p)| *p == place)
            .map(|(w, _)| w)
            .sum();

        (consumed, produced)
    }

    /// Net effect of one firing on the given place.
    pub fn net_change(&self, place: PlaceIndex) -> i64 {
        let (consumed, produced) = self.get_update_for_place(place);
        produced as i64 - consumed as i64
    }
}
