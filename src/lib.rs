//! Adaptive per-parameter update rules (Adadelta, RMSprop).
//!
//! Parameters live in a `ParameterStore` arena and are addressed by `ParamId`. An optimizer
//! keeps the running statistics of each parameter in a side table indexed by the same ids and,
//! on every `step`, turns gradients into deltas that are applied as `value -= lr * delta`.
//!
//! The learning rate is never part of an update rule, it's applied by the optimizer for every
//! rule alike.

pub mod error;
pub mod optimization;
pub mod parameters;
pub mod specs;

pub use error::{OptimErr, Result};
pub use optimization::{
    Adadelta, AdadeltaConfig, AdadeltaOptimizer, AdadeltaState, GroupOptimizer, Optimizer,
    Rmsprop, RmspropConfig, RmspropOptimizer, RmspropState, UpdateRule,
};
pub use parameters::{ParamGroup, ParamId, ParameterStore};
pub use specs::{GroupSpec, OptimizerBuilder, OptimizerSpec, RuleSpec};
