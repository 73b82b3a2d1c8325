use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
    hash::Hash,
    ops::{Add, Index, IndexMut, Sub},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::net::PlaceIndex;

/// Common interface of finite markings and omega markings, so that the graph
/// model and the search loops can be shared by reachability and coverability.
pub trait MarkingLike: Clone + Debug + Display + PartialEq + Eq + Hash + Send + 'static {
    type Value: Copy + Ord + Debug + Display;

    fn place_count(&self) -> usize;

    fn get(&self, place: PlaceIndex) -> Self::Value;

    /// `self >= other` in every place and `self > other` in at least one.
    fn strictly_dominates(&self, other: &Self) -> bool {
        debug_assert_eq!(self.place_count(), other.place_count());

        let mut larger = false;
        for place in PlaceIndex::iter_places(self.place_count()) {
            match self.get(place).cmp(&other.get(place)) {
                Ordering::Less => return false,
                Ordering::Greater => larger = true,
                Ordering::Equal => {}
            }
        }
        larger
    }
}

/// A token count for every place of a net.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking {
    tokens: Box<[u64]>,
}

impl Marking {
    pub fn new(tokens: Box<[u64]>) -> Self {
        Marking { tokens }
    }

    pub fn zero(place_count: usize) -> Self {
        Marking {
            tokens: vec![0; place_count].into_boxed_slice(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u64> {
        self.tokens.iter()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.tokens
    }

    pub fn total(&self) -> u64 {
        self.tokens.iter().sum()
    }

    /// Absolute per-place difference to `other`.
    pub fn abs_diff(&self, other: &Marking, place: PlaceIndex) -> u64 {
        self[place].abs_diff(other[place])
    }

    pub fn to_omega(&self) -> OmegaMarking {
        OmegaMarking::from(self)
    }
}

impl MarkingLike for Marking {
    type Value = u64;

    fn place_count(&self) -> usize {
        self.tokens.len()
    }

    fn get(&self, place: PlaceIndex) -> u64 {
        self[place]
    }
}

impl Index<PlaceIndex> for Marking {
    type Output = u64;

    fn index(&self, index: PlaceIndex) -> &Self::Output {
        &self.tokens[index.to_usize()]
    }
}

impl IndexMut<PlaceIndex> for Marking {
    fn index_mut(&mut self, index: PlaceIndex) -> &mut Self::Output {
        &mut self.tokens[index.to_usize()]
    }
}

impl From<Vec<u64>> for Marking {
    fn from(tokens: Vec<u64>) -> Self {
        Marking::new(tokens.into_boxed_slice())
    }
}

impl From<&[u64]> for Marking {
    fn from(tokens: &[u64]) -> Self {
        Marking::new(tokens.into())
    }
}

impl Display for Marking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.tokens.iter().join(", "))
    }
}

/// Token count of a single place in a coverability graph.
///
/// `Omega` stands for "arbitrarily many". It absorbs every addition and
/// subtraction, equals itself and is larger than every finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OmegaValue {
    Finite(u64),
    Omega,
}

impl OmegaValue {
    pub fn is_omega(&self) -> bool {
        matches!(self, OmegaValue::Omega)
    }

    pub fn finite(&self) -> Option<u64> {
        match self {
            OmegaValue::Finite(v) => Some(*v),
            OmegaValue::Omega => None,
        }
    }

    /// Subtraction that fails instead of going below zero.
    pub fn checked_sub(self, rhs: u64) -> Option<OmegaValue> {
        match self {
            OmegaValue::Finite(v) => v.checked_sub(rhs).map(OmegaValue::Finite),
            OmegaValue::Omega => Some(OmegaValue::Omega),
        }
    }
}

impl Default for OmegaValue {
    fn default() -> Self {
        OmegaValue::Finite(0)
    }
}

impl From<u64> for OmegaValue {
    fn from(value: u64) -> Self {
        OmegaValue::Finite(value)
    }
}

impl PartialOrd for OmegaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OmegaValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (OmegaValue::Omega, OmegaValue::Omega) => Ordering::Equal,
            (OmegaValue::Omega, OmegaValue::Finite(_)) => Ordering::Greater,
            (OmegaValue::Finite(_), OmegaValue::Omega) => Ordering::Less,
            (OmegaValue::Finite(a), OmegaValue::Finite(b)) => a.cmp(b),
        }
    }
}

impl PartialEq<u64> for OmegaValue {
    fn eq(&self, other: &u64) -> bool {
        *self == OmegaValue::Finite(*other)
    }
}

impl PartialOrd<u64> for OmegaValue {
    fn partial_cmp(&self, other: &u64) -> Option<Ordering> {
        Some(self.cmp(&OmegaValue::Finite(*other)))
    }
}

impl Add for OmegaValue {
    type Output = OmegaValue;

    fn add(self, rhs: OmegaValue) -> Self::Output {
        match (self, rhs) {
            (OmegaValue::Finite(a), OmegaValue::Finite(b)) => OmegaValue::Finite(a + b),
            _ => OmegaValue::Omega,
        }
    }
}

impl Add<u64> for OmegaValue {
    type Output = OmegaValue;

    fn add(self, rhs: u64) -> Self::Output {
        self + OmegaValue::Finite(rhs)
    }
}

/// Saturates at zero for finite values. Use [`OmegaValue::checked_sub`] if
/// an underflow has to be detected.
impl Sub<u64> for OmegaValue {
    type Output = OmegaValue;

    fn sub(self, rhs: u64) -> Self::Output {
        match self {
            OmegaValue::Finite(v) => OmegaValue::Finite(v.saturating_sub(rhs)),
            OmegaValue::Omega => OmegaValue::Omega,
        }
    }
}

impl Display for OmegaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OmegaValue::Finite(v) => write!(f, "{}", v),
            OmegaValue::Omega => write!(f, "ω"),
        }
    }
}

/// A marking whose places may hold [`OmegaValue::Omega`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OmegaMarking {
    tokens: Box<[OmegaValue]>,
}

impl OmegaMarking {
    pub fn new(tokens: Box<[OmegaValue]>) -> Self {
        OmegaMarking { tokens }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OmegaValue> {
        self.tokens.iter()
    }

    pub fn has_omega(&self) -> bool {
        self.tokens.iter().any(OmegaValue::is_omega)
    }

    /// Whether this marking covers the finite marking `other` in every place.
    pub fn covers(&self, other: &Marking) -> bool {
        PlaceIndex::iter_places(self.tokens.len()).all(|p| self[p] >= other[p])
    }

    /// Converts back to a finite marking, if no place is omega.
    pub fn to_finite(&self) -> Option<Marking> {
        self.tokens
            .iter()
            .map(OmegaValue::finite)
            .collect::<Option<Vec<_>>>()
            .map(Marking::from)
    }
}

impl MarkingLike for OmegaMarking {
    type Value = OmegaValue;

    fn place_count(&self) -> usize {
        self.tokens.len()
    }

    fn get(&self, place: PlaceIndex) -> OmegaValue {
        self[place]
    }
}

impl Index<PlaceIndex> for OmegaMarking {
    type Output = OmegaValue;

    fn index(&self, index: PlaceIndex) -> &Self::Output {
        &self.tokens[index.to_usize()]
    }
}

impl IndexMut<PlaceIndex> for OmegaMarking {
    fn index_mut(&mut self, index: PlaceIndex) -> &mut Self::Output {
        &mut self.tokens[index.to_usize()]
    }
}

impl From<&Marking> for OmegaMarking {
    fn from(marking: &Marking) -> Self {
        OmegaMarking {
            tokens: marking.iter().map(|&v| OmegaValue::Finite(v)).collect(),
        }
    }
}

impl From<Vec<OmegaValue>> for OmegaMarking {
    fn from(tokens: Vec<OmegaValue>) -> Self {
        OmegaMarking::new(tokens.into_boxed_slice())
    }
}

impl Display for OmegaMarking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.tokens.iter().join(", "))
    }
}

#[test]
fn test_strictly_dominates() {
    let a = Marking::from(vec![1, 2, 3]);
    let b = Marking::from(vec![1, 2, 2]);
    assert!(a.strictly_dominates(&b));
    assert!(!b.strictly_dominates(&a));
    assert!(!a.strictly_dominates(&a));

    let c = Marking::from(vec![0, 5, 3]);
    assert!(!a.strictly_dominates(&c));
    assert!(!c.strictly_dominates(&a));
}

#[test]
fn test_omega_marking_display() {
    let m = OmegaMarking::from(vec![OmegaValue::Finite(3), OmegaValue::Omega]);
    assert_eq!(m.to_string(), "[3, ω]");
    assert!(m.has_omega());
    assert_eq!(m.to_finite(), None);
}
