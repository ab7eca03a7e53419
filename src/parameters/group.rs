use super::ParamId;

/// A set of parameters sharing one hyperparameter configuration.
#[derive(Debug, Clone)]
pub struct ParamGroup<C> {
    pub config: C,
    pub params: Vec<ParamId>,
}

impl<C> ParamGroup<C> {
    /// Creates a new `ParamGroup`.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters used for every parameter in the group.
    /// * `params` - The ids of the parameters of the group.
    pub fn new(config: C, params: impl IntoIterator<Item = ParamId>) -> Self {
        Self {
            config,
            params: params.into_iter().collect(),
        }
    }
}
