use serde::{Deserialize, Serialize};

use crate::{
    marking::Marking,
    net::{
        PetriNet,
        spec::{PetriNetSpec, ToSpecFormat},
    },
};

/// A net together with its initial marking and a target marking for
/// reachability queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedPetriNet {
    pub net: PetriNet,
    pub initial_marking: Marking,
    pub target_marking: Marking,
}

impl InitializedPetriNet {
    pub fn new(net: PetriNet, initial_marking: Marking, target_marking: Marking) -> Self {
        Self {
            net,
            initial_marking,
            target_marking,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_file(&self, path: &str) -> anyhow::Result<()> {
        Ok(std::fs::write(path, self.to_json()?)?)
    }

    pub fn to_spec_file(&self, path: &str) -> anyhow::Result<()> {
        Ok(std::fs::write(path, self.to_spec_format())?)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let path = std::path::Path::new(path);
        match path.extension() {
            Some(ext) if ext == "json" => {
                let json_str = std::fs::read_to_string(path)?;
                Self::from_json(&json_str)
            }
            Some(ext) if ext == "spec" => {
                let spec_str = std::fs::read_to_string(path)?;
                Self::parse_from_spec(&spec_str)
            }
            _ => Err(anyhow::anyhow!(
                "Unsupported file extension: {:?}",
                path.extension()
            )),
        }
    }

    pub fn parse_from_spec(spec_str: &str) -> anyhow::Result<Self> {
        let spec = PetriNetSpec::parse(spec_str)?;
        InitializedPetriNet::try_from(spec)
    }
}

impl TryFrom<PetriNetSpec<'_>> for InitializedPetriNet {
    type Error = anyhow::Error;

    fn try_from(spec: PetriNetSpec) -> Result<Self, Self::Error> {
        let mut net = PetriNet::new();
        for variable in &spec.variables {
            net.add_place(*variable);
        }

        for (i, rule) in spec.rules.iter().enumerate() {
            net.add_transition_struct(rule.to_transition(format!("t{}", i + 1), &spec.variables)?);
        }

        for rate in &spec.rates {
            let Some(transition) = (0..spec.rules.len())
                .find(|i| format!("t{}", i + 1) == rate.transition)
            else {
                anyhow::bail!(
                    "Rate given for unknown transition '{}'.",
                    rate.transition
                );
            };
            net.transition_mut((transition as u32).into())
                .set_rate(rate.expression.trim());
        }

        Ok(InitializedPetriNet::new(
            net,
            spec.initial.to_marking(&spec.variables)?,
            spec.target.to_marking(&spec.variables)?,
        ))
    }
}
