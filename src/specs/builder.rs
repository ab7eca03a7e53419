use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::Result,
    optimization::{Adadelta, GroupOptimizer, Optimizer, Rmsprop, UpdateRule},
    parameters::{ParamGroup, ParameterStore},
    specs::{GroupSpec, OptimizerSpec, RuleSpec},
};

/// Builds rule-erased `Optimizer`s from an `OptimizerSpec`.
pub struct OptimizerBuilder;

impl OptimizerBuilder {
    /// Builds an optimizer following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification of the optimizer.
    /// * `store` - The parameters the optimizer will update.
    ///
    /// # Returns
    /// A boxed optimizer, or an error if the spec doesn't fit the store or holds invalid
    /// hyperparameters.
    pub fn build(spec: &OptimizerSpec, store: &ParameterStore) -> Result<Box<dyn Optimizer>> {
        match spec.rule {
            RuleSpec::Adadelta(defaults) => {
                Self::resolve::<Adadelta>(&defaults, &spec.groups, store)
            }
            RuleSpec::Rmsprop(defaults) => Self::resolve::<Rmsprop>(&defaults, &spec.groups, store),
        }
    }

    /// Resolves the groups for rule `R` and instanciates the optimizer.
    ///
    /// # Arguments
    /// * `defaults` - The rule-wide hyperparameters.
    /// * `groups` - The group specs, empty means a single group with every parameter.
    /// * `store` - The parameters the optimizer will update.
    fn resolve<R>(
        defaults: &R::Config,
        groups: &[GroupSpec],
        store: &ParameterStore,
    ) -> Result<Box<dyn Optimizer>>
    where
        R: UpdateRule + 'static,
        R::Config: Serialize + DeserializeOwned,
    {
        let groups = if groups.is_empty() {
            vec![ParamGroup::new(*defaults, store.ids())]
        } else {
            groups
                .iter()
                .map(|group| group.resolve(defaults))
                .collect::<Result<Vec<_>>>()?
        };

        let optimizer = GroupOptimizer::<R>::new(store, groups)?;
        Ok(Box::new(optimizer))
    }
}
