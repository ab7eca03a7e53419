use log::{debug, info};
use rayon::prelude::*;

use super::UpdateRule;
use crate::{
    error::{OptimErr, Result},
    parameters::{ParamGroup, ParamId, Parameter, ParameterStore},
};

/// Defines the strategy for updating model parameters based on calculated gradients.
///
/// This is the rule-erased face of a `GroupOptimizer`, used when the rule is only known at
/// runtime (e.g. built from an `OptimizerSpec`).
pub trait Optimizer: Send {
    /// Updates every registered parameter of `store` that currently holds a gradient.
    ///
    /// # Arguments
    /// * `store` - The parameter arena this optimizer was built for.
    ///
    /// # Returns
    /// `UnknownParameter` if `store` is missing parameters this optimizer knows about,
    /// `ShapeMismatch` if one of them no longer has the shape its state was built for.
    fn step(&mut self, store: &mut ParameterStore) -> Result<()>;

    /// Zeroes every running statistic and step counter, the hyperparameters are kept.
    fn reset_state(&mut self);

    /// The name of the underlying update rule.
    fn name(&self) -> &'static str;
}

/// Applies an `UpdateRule` over groups of parameters.
///
/// Statistics live in a side table indexed by `ParamId`, next to a table telling which group
/// owns each parameter. Both are filled when a group is registered, so no state is ever
/// created during a `step`.
#[derive(Debug)]
pub struct GroupOptimizer<R: UpdateRule> {
    groups: Vec<ParamGroup<R::Config>>,
    owners: Vec<Option<usize>>,
    states: Vec<Option<R::State>>,
}

impl<R: UpdateRule> GroupOptimizer<R> {
    /// Creates a new `GroupOptimizer` and initializes the state of every parameter.
    ///
    /// # Arguments
    /// * `store` - The arena holding the parameters of `groups`.
    /// * `groups` - The parameter groups and their hyperparameters.
    ///
    /// # Returns
    /// `InvalidConfiguration` if a group's hyperparameters are out of range,
    /// `UnknownParameter` or `DuplicateParameter` if the groups don't match the store.
    pub fn new(store: &ParameterStore, groups: Vec<ParamGroup<R::Config>>) -> Result<Self> {
        let mut optimizer = Self {
            groups: Vec::with_capacity(groups.len()),
            owners: Vec::new(),
            states: Vec::new(),
        };

        for group in groups {
            optimizer.add_param_group(store, group)?;
        }

        info!(
            rule = R::NAME,
            groups = optimizer.groups.len(),
            params = optimizer.registered();
            "optimizer ready"
        );

        Ok(optimizer)
    }

    /// Registers a new group, validating it and initializing its parameters' state.
    ///
    /// On error the optimizer is left untouched.
    pub fn add_param_group(
        &mut self,
        store: &ParameterStore,
        group: ParamGroup<R::Config>,
    ) -> Result<()> {
        R::validate(&group.config)?;

        let mut seen = vec![false; store.len()];
        for &id in &group.params {
            if !store.contains(id) {
                return Err(OptimErr::UnknownParameter(id));
            }

            let taken = self.owners.get(id.index()).is_some_and(Option::is_some);
            if taken || seen[id.index()] {
                return Err(OptimErr::DuplicateParameter(id));
            }
            seen[id.index()] = true;
        }

        if self.states.len() < store.len() {
            self.owners.resize(store.len(), None);
            self.states.resize_with(store.len(), || None);
        }

        let group_idx = self.groups.len();
        for &id in &group.params {
            let value = store.value(id)?;
            self.owners[id.index()] = Some(group_idx);
            self.states[id.index()] = Some(R::init_state(value, &group.config));
        }

        self.groups.push(group);
        Ok(())
    }

    /// Returns the registered parameter groups.
    pub fn param_groups(&self) -> &[ParamGroup<R::Config>] {
        &self.groups
    }

    /// Returns the statistics of a parameter, `None` if it isn't registered.
    pub fn state(&self, id: ParamId) -> Option<&R::State> {
        self.states.get(id.index())?.as_ref()
    }

    fn registered(&self) -> usize {
        self.owners.iter().flatten().count()
    }
}

impl<R: UpdateRule> GroupOptimizer<R> {
    /// Runs the update rule on every parameter that has a gradient and applies
    /// `value -= lr * delta`.
    ///
    /// Parameters are independent of each other so they're updated in parallel. Parameters
    /// without a gradient are skipped and their step counter doesn't move.
    ///
    /// Every parameter is checked before any of them is touched, so on error neither the
    /// store nor the statistics change.
    pub fn step(&mut self, store: &mut ParameterStore) -> Result<()> {
        let registered = self.states.len();
        if store.len() < registered {
            return Err(OptimErr::UnknownParameter(ParamId::new(store.len())));
        }

        let groups = &self.groups;
        let params = &mut store.params_mut()[..registered];
        self.check_shapes(params)?;

        let updated: usize = params
            .par_iter_mut()
            .zip(self.states.par_iter_mut())
            .zip(self.owners.par_iter())
            .map(|((param, state), owner)| match (state, owner) {
                (Some(state), Some(group_idx)) => {
                    let config = &groups[*group_idx].config;
                    usize::from(apply::<R>(param, state, config))
                }
                _ => 0,
            })
            .sum();

        debug!(rule = R::NAME, updated = updated; "optimizer step");
        Ok(())
    }

    /// Fails with `ShapeMismatch` on the first parameter whose shape differs from its state.
    fn check_shapes(&self, params: &[Parameter]) -> Result<()> {
        let states = params.iter().zip(&self.states).enumerate();

        for (idx, (param, state)) in states {
            let Some(state) = state else {
                continue;
            };

            let expected = R::shape(state);
            if param.value.shape() != expected {
                return Err(OptimErr::ShapeMismatch {
                    id: ParamId::new(idx),
                    got: param.value.shape().to_vec(),
                    expected: expected.to_vec(),
                });
            }
        }

        Ok(())
    }

    /// Zeroes every running statistic in place and rewinds every step counter.
    pub fn reset_state(&mut self) {
        self.states.iter_mut().flatten().for_each(R::reset);
        debug!(rule = R::NAME, params = self.registered(); "optimizer state reset");
    }
}

/// Updates a single parameter, returning whether it had a gradient.
fn apply<R: UpdateRule>(param: &mut Parameter, state: &mut R::State, config: &R::Config) -> bool {
    let Parameter { value, grad } = param;
    let Some(grad) = grad.as_ref() else {
        return false;
    };

    let delta = R::compute_update(value.view(), grad.view(), state, config);
    value.scaled_add(-R::learning_rate(config), &delta);
    true
}

impl<R: UpdateRule> Optimizer for GroupOptimizer<R> {
    fn step(&mut self, store: &mut ParameterStore) -> Result<()> {
        GroupOptimizer::step(self, store)
    }

    fn reset_state(&mut self) {
        GroupOptimizer::reset_state(self)
    }

    fn name(&self) -> &'static str {
        R::NAME
    }
}
