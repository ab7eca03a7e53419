use std::fmt::{self, Display};

use ndarray::{ArrayD, ArrayViewMutD, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{OptimErr, Result};

/// A stable handle to a parameter inside a `ParameterStore`.
///
/// Ids are handed out densely starting at `0` and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamId(usize);

impl ParamId {
    /// Creates a new `ParamId` from a raw index.
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }

    /// Returns the raw index of this id.
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single trainable tensor and its (optional) gradient.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) value: ArrayD<f32>,
    pub(crate) grad: Option<ArrayD<f32>>,
}

impl Parameter {
    fn new(value: ArrayD<f32>) -> Self {
        Self { value, grad: None }
    }
}

/// An arena of parameters addressed by `ParamId`.
///
/// Optimizers keep their per-parameter statistics in side tables indexed by the same ids,
/// so the store itself knows nothing about the update rules.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: Vec<Parameter>,
}

impl ParameterStore {
    /// Creates a new, empty `ParameterStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves a new parameter into the store.
    ///
    /// # Arguments
    /// * `value` - The initial value of the parameter, of any dimensionality.
    ///
    /// # Returns
    /// The id of the inserted parameter.
    pub fn insert<D: Dimension>(&mut self, value: ndarray::Array<f32, D>) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(Parameter::new(value.into_dyn()));
        id
    }

    /// Returns the amount of parameters in the store.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns an iterator over every id in the store, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ParamId> + use<> {
        (0..self.params.len()).map(ParamId)
    }

    /// Checks that `id` refers to a parameter of this store.
    pub fn contains(&self, id: ParamId) -> bool {
        id.0 < self.params.len()
    }

    pub fn value(&self, id: ParamId) -> Result<&ArrayD<f32>> {
        self.get(id).map(|p| &p.value)
    }

    /// Returns a mutable view over a parameter's value.
    ///
    /// Elements can be overwritten but the shape is fixed for the lifetime of the parameter,
    /// optimizers size their statistics after it.
    pub fn value_mut(&mut self, id: ParamId) -> Result<ArrayViewMutD<'_, f32>> {
        self.get_mut(id).map(|p| p.value.view_mut())
    }

    /// Returns the current gradient of a parameter, `None` if it has none yet.
    pub fn grad(&self, id: ParamId) -> Result<Option<&ArrayD<f32>>> {
        self.get(id).map(|p| p.grad.as_ref())
    }

    /// Sets the gradient of a parameter.
    ///
    /// # Arguments
    /// * `id` - The parameter receiving the gradient.
    /// * `grad` - The gradient, must have the exact same shape as the parameter.
    ///
    /// # Returns
    /// `ShapeMismatch` if the shapes differ, `UnknownParameter` if `id` isn't in the store.
    pub fn set_grad<D: Dimension>(&mut self, id: ParamId, grad: ndarray::Array<f32, D>) -> Result<()> {
        let param = self.get_mut(id)?;

        if param.value.shape() != grad.shape() {
            return Err(OptimErr::ShapeMismatch {
                id,
                got: grad.shape().to_vec(),
                expected: param.value.shape().to_vec(),
            });
        }

        param.grad = Some(grad.into_dyn());
        Ok(())
    }

    /// Fills every present gradient with zeros.
    pub fn zero_grad(&mut self) {
        self.params
            .iter_mut()
            .filter_map(|p| p.grad.as_mut())
            .for_each(|g| g.fill(0.));
    }

    pub(crate) fn params_mut(&mut self) -> &mut [Parameter] {
        &mut self.params
    }

    fn get(&self, id: ParamId) -> Result<&Parameter> {
        self.params.get(id.0).ok_or(OptimErr::UnknownParameter(id))
    }

    fn get_mut(&mut self, id: ParamId) -> Result<&mut Parameter> {
        self.params.get_mut(id.0).ok_or(OptimErr::UnknownParameter(id))
    }
}
