mod group;
mod store;

pub use group::ParamGroup;
pub(crate) use store::Parameter;
pub use store::{ParamId, ParameterStore};
