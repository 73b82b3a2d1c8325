use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    marking::Marking,
    net::{PetriNet, PetriNetQuery, PlaceIndex, TransitionIndex},
    simulation::{
        expression::MathematicalExpression,
        storage::{reaction_order, stochastic_rate_constant},
    },
};

pub const AVOGADRO: f64 = 6.02214076e23;

fn default_volume() -> f64 {
    1e-9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSetup {
    /// Index of the place in the net.
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub constant: bool,
    /// Initial molecule count of a non-constant place.
    #[serde(default)]
    pub tokens: u64,
    /// Concentration of a constant place. Without an expression the
    /// concentration is `tokens / (volume * N_A)`.
    #[serde(default)]
    pub expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSetup {
    /// Index of the transition in the net.
    pub id: u32,
    pub name: String,
    /// Deterministic rate constant as an expression.
    pub rate: String,
}

/// Parameters of a stochastic simulation of a net: the reaction volume, the
/// initial molecule counts and the rate constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSetup {
    /// Volume in liters.
    #[serde(default = "default_volume")]
    pub volume: f64,
    pub places: Vec<PlaceSetup>,
    pub transitions: Vec<TransitionSetup>,
}

impl SimulationSetup {
    /// Default setup of a net: the given marking as molecule counts, the rate
    /// expressions of the net and a volume of 1 nl.
    pub fn from_net<N: PetriNetQuery>(net: &N, marking: &Marking) -> Self {
        let places = net
            .places()
            .map(|p| PlaceSetup {
                id: p.to_usize() as u32,
                name: net.place_name(p).to_string(),
                constant: net.is_constant(p),
                tokens: marking.as_slice().get(p.to_usize()).copied().unwrap_or(0),
                expression: None,
            })
            .collect();
        let transitions = net
            .transitions()
            .map(|t| TransitionSetup {
                id: t.to_usize() as u32,
                name: net.transition_name(t).to_string(),
                rate: net.rate_expression(t).to_string(),
            })
            .collect();

        SimulationSetup {
            volume: default_volume(),
            places,
            transitions,
        }
    }

    pub fn vol_mol(&self) -> f64 {
        self.volume * AVOGADRO
    }

    pub fn place(&self, place: PlaceIndex) -> Option<&PlaceSetup> {
        self.places
            .iter()
            .find(|p| p.id as usize == place.to_usize())
    }

    pub fn transition(&self, transition: TransitionIndex) -> Option<&TransitionSetup> {
        self.transitions
            .iter()
            .find(|t| t.id as usize == transition.to_usize())
    }

    /// Writes constant flags and rates into `net` and returns the initial
    /// marking of the setup.
    pub fn apply(&self, net: &mut PetriNet) -> anyhow::Result<Marking> {
        let mut marking = Marking::zero(net.place_count());

        for place in &self.places {
            let index = PlaceIndex::new(place.id);
            if place.id as usize >= net.place_count() {
                anyhow::bail!("Setup refers to unknown place {} ('{}')", place.id, place.name);
            }
            if net.place_name(index) != place.name {
                tracing::warn!(
                    id = %place.id,
                    setup = %place.name,
                    net = %net.place_name(index),
                    "Place names differ"
                );
            }
            net.set_constant(index, place.constant);
            marking[index] = place.tokens;
        }

        for transition in &self.transitions {
            if transition.id as usize >= net.transition_count() {
                anyhow::bail!(
                    "Setup refers to unknown transition {} ('{}')",
                    transition.id,
                    transition.name
                );
            }
            net.transition_mut(TransitionIndex::new(transition.id))
                .set_rate(transition.rate.clone());
        }

        Ok(marking)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        Ok(std::fs::write(path, self.to_json()?)?)
    }

    /// Renders the setup as a `<SimulationSetup>` XML document. Transitions
    /// carry their stochastic firing rate if the rate is constant, and 0
    /// otherwise.
    pub fn to_xml<N: PetriNetQuery>(&self, net: &N) -> String {
        let resolve = |name: &str| {
            self.places
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.id as usize)
        };

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<SimulationSetup>\n");
        xml.push_str(&format!("  <volume>{}</volume>\n", self.volume));

        xml.push_str("  <places>\n");
        for place in &self.places {
            let mut attrs = format!(
                "id=\"{}\" name=\"{}\" isConstant=\"{}\"",
                place.id,
                escape(&place.name),
                place.constant
            );
            if !place.constant {
                attrs.push_str(&format!(" nrOfTokens=\"{}\"", place.tokens));
            }

            match (&place.expression, place.constant) {
                (Some(text), true) => {
                    xml.push_str(&format!("    <place {}>\n", attrs));
                    xml.push_str("      <mathematicalExpression>\n");
                    push_expression(&mut xml, text, resolve, "        ");
                    xml.push_str("      </mathematicalExpression>\n");
                    xml.push_str("    </place>\n");
                }
                _ => xml.push_str(&format!("    <place {}/>\n", attrs)),
            }
        }
        xml.push_str("  </places>\n");

        xml.push_str("  <transitions>\n");
        for transition in &self.transitions {
            let firing_rate = match MathematicalExpression::parse(&transition.rate, resolve) {
                Ok(expression) if expression.is_constant() => {
                    let (order, multiplier) =
                        reaction_order(net, TransitionIndex::new(transition.id));
                    stochastic_rate_constant(
                        expression.evaluate(&[], 0.0),
                        order,
                        multiplier,
                        self.vol_mol(),
                    )
                }
                _ => 0.0,
            };

            xml.push_str(&format!(
                "    <transition id=\"{}\" name=\"{}\" firingRate=\"{}\">\n",
                transition.id,
                escape(&transition.name),
                firing_rate
            ));
            xml.push_str("      <detReactionRateConstant>\n");
            push_expression(&mut xml, &transition.rate, resolve, "        ");
            xml.push_str("      </detReactionRateConstant>\n");
            xml.push_str("    </transition>\n");
        }
        xml.push_str("  </transitions>\n");
        xml.push_str("</SimulationSetup>\n");

        xml
    }
}

fn push_expression(
    xml: &mut String,
    text: &str,
    resolve: impl Fn(&str) -> Option<usize>,
    indent: &str,
) {
    xml.push_str(&format!(
        "{}<expressionText>{}</expressionText>\n",
        indent,
        escape(text)
    ));

    // unparsable expressions are exported without variables
    if let Ok(expression) = MathematicalExpression::parse(text, resolve) {
        for (name, place) in expression.variables() {
            xml.push_str(&format!(
                "{}<variable name=\"{}\" placeId=\"{}\"/>\n",
                indent,
                escape(name),
                place
            ));
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[test]
fn test_setup_from_net() {
    let mut net = PetriNet::new();
    let a = net.add_place("A");
    let b = net.add_place("B");
    net.add_transition("r1", vec![(2, a)], vec![(1, b)]);
    let t = net.add_transition("r2", vec![(1, b)], vec![]);
    net.transition_mut(t).set_rate("0.5 * A");

    let setup = SimulationSetup::from_net(&net, &Marking::from(vec![10, 0]));
    assert_eq!(setup.places[0].tokens, 10);
    assert_eq!(setup.transitions[1].rate, "0.5 * A");

    let json = setup.to_json().unwrap();
    assert_eq!(SimulationSetup::from_json(&json).unwrap(), setup);

    let xml = setup.to_xml(&net);
    assert!(xml.contains("<SimulationSetup>"));
    assert!(xml.contains("<place id=\"0\" name=\"A\" isConstant=\"false\" nrOfTokens=\"10\"/>"));
    assert!(xml.contains("<variable name=\"A\" placeId=\"0\"/>"));
    assert!(xml.contains("firingRate=\"0\""));
}

#[test]
fn test_apply_setup() {
    let mut net = PetriNet::with_places(2);
    net.add_transition("t1", vec![(1, PlaceIndex::new(0))], vec![(1, PlaceIndex::new(1))]);

    let mut setup = SimulationSetup::from_net(&net, &Marking::zero(2));
    setup.places[0].tokens = 7;
    setup.places[1].constant = true;
    setup.transitions[0].rate = "2".to_string();

    let marking = setup.apply(&mut net).unwrap();
    assert_eq!(marking, Marking::from(vec![7, 0]));
    assert!(net.is_constant(PlaceIndex::new(1)));
    assert_eq!(net.rate_expression(TransitionIndex::new(0)), "2");
}
