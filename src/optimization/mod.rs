mod adadelta;
mod optimizer;
mod rmsprop;
mod rule;

pub use adadelta::{Adadelta, AdadeltaConfig, AdadeltaState};
pub use optimizer::{GroupOptimizer, Optimizer};
pub use rmsprop::{Rmsprop, RmspropConfig, RmspropState};
pub use rule::UpdateRule;

/// A `GroupOptimizer` running the Adadelta rule.
pub type AdadeltaOptimizer = GroupOptimizer<Adadelta>;

/// A `GroupOptimizer` running the RMSprop rule.
pub type RmspropOptimizer = GroupOptimizer<Rmsprop>;
