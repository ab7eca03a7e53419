use std::fmt::Debug;

use ndarray::{ArrayD, ArrayViewD};

use crate::error::{OptimErr, Result};

/// A per-parameter update rule.
///
/// A rule is stateless by itself: hyperparameters live in `Config` (one per parameter group)
/// and running statistics live in `State` (one per parameter). The optimizer owns both and
/// feeds them back into `compute_update` on every step.
pub trait UpdateRule {
    /// The hyperparameters of the rule.
    type Config: Copy + Debug + Send + Sync;

    /// The running statistics kept for every parameter.
    type State: Debug + Send;

    /// Human readable name of the rule.
    const NAME: &'static str;

    /// Checks that every hyperparameter is within its valid range.
    ///
    /// # Returns
    /// An `InvalidConfiguration` error naming the first offending hyperparameter.
    fn validate(config: &Self::Config) -> Result<()>;

    /// Creates fresh, zeroed statistics for `param`.
    fn init_state(param: &ArrayD<f32>, config: &Self::Config) -> Self::State;

    /// Zeroes every statistic of `state` in place and rewinds its step counter.
    fn reset(state: &mut Self::State);

    /// Returns the shape of the parameter `state` was created for.
    fn shape(state: &Self::State) -> &[usize];

    /// Advances `state` with a new gradient and returns the delta for the parameter.
    ///
    /// The learning rate is not applied here, the caller subtracts `lr * delta`. `state` must
    /// come from `init_state` with the same `config`, rules may rely on the buffers it
    /// allocated.
    ///
    /// # Arguments
    /// * `param` - The current value of the parameter.
    /// * `grad` - The gradient of the parameter, same shape as `param`.
    /// * `state` - The statistics of the parameter, updated in place.
    /// * `config` - The hyperparameters of the parameter's group.
    fn compute_update(
        param: ArrayViewD<'_, f32>,
        grad: ArrayViewD<'_, f32>,
        state: &mut Self::State,
        config: &Self::Config,
    ) -> ArrayD<f32>;

    /// Returns the learning rate stored in `config`.
    fn learning_rate(config: &Self::Config) -> f32;

    /// Returns the amount of updates `state` went through since its last reset.
    fn step(state: &Self::State) -> u64;
}

/// Fails with `InvalidConfiguration` unless `value` is in `[0, +inf)`.
///
/// `NaN` fails as well since it isn't comparable.
pub(super) fn non_negative(name: &'static str, value: f32) -> Result<()> {
    if !(0. <= value) {
        return Err(OptimErr::InvalidConfiguration { name, value });
    }

    Ok(())
}

/// Applies the L2 penalty to a copy of `grad`, the caller's buffer stays untouched.
pub(super) fn decayed_grad(
    param: &ArrayViewD<'_, f32>,
    grad: &ArrayViewD<'_, f32>,
    weight_decay: f32,
) -> ArrayD<f32> {
    let mut grad = grad.to_owned();

    if weight_decay > 0. {
        grad.scaled_add(weight_decay, param);
    }

    grad
}
