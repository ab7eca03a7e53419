use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    error::Result,
    optimization::{AdadeltaConfig, RmspropConfig},
    parameters::{ParamGroup, ParamId},
};

/// The specification for the update rule and its default hyperparameters.
///
/// Any hyperparameter missing from the document takes the rule's default value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSpec {
    Adadelta(AdadeltaConfig),
    Rmsprop(RmspropConfig),
}

/// The specification for a single parameter group.
///
/// `overrides` is merged over the rule's defaults, so a group only lists what it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub params: Vec<ParamId>,
    #[serde(default)]
    pub overrides: Map<String, Value>,
}

/// The specification for building an `Optimizer`.
///
/// When `groups` is empty every parameter of the store goes into a single group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSpec {
    pub rule: RuleSpec,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

impl OptimizerSpec {
    /// Parses an `OptimizerSpec` out of a json document.
    ///
    /// # Returns
    /// `MalformedSpec` if the document doesn't describe a valid spec.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl GroupSpec {
    /// Resolves this group's hyperparameters against the rule's defaults.
    ///
    /// # Arguments
    /// * `defaults` - The rule-wide hyperparameters.
    ///
    /// # Returns
    /// The resolved group, or `MalformedSpec` if an override doesn't fit the config.
    pub fn resolve<C>(&self, defaults: &C) -> Result<ParamGroup<C>>
    where
        C: Serialize + DeserializeOwned,
    {
        let mut merged = match serde_json::to_value(defaults)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(self.overrides.clone());

        let config = serde_json::from_value(Value::Object(merged))?;
        Ok(ParamGroup::new(config, self.params.iter().copied()))
    }
}
