use std::{
    error::Error,
    fmt::{self, Display},
};

use crate::parameters::ParamId;

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, OptimErr>;

/// The crate's error type.
///
/// Only `InvalidConfiguration` comes from the update rules themselves, and it is only
/// returned while an optimizer is being built. Numerical trouble during an update is
/// never reported here, it shows up as `inf`/`NaN` in the returned deltas.
#[derive(Debug)]
pub enum OptimErr {
    InvalidConfiguration {
        name: &'static str,
        value: f32,
    },
    UnknownParameter(ParamId),
    DuplicateParameter(ParamId),
    ShapeMismatch {
        id: ParamId,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    MalformedSpec(serde_json::Error),
}

impl Display for OptimErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimErr::InvalidConfiguration { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
            OptimErr::UnknownParameter(id) => {
                write!(f, "parameter {id} is not part of the store")
            }
            OptimErr::DuplicateParameter(id) => {
                write!(f, "parameter {id} appears in more than one place")
            }
            OptimErr::ShapeMismatch { id, got, expected } => write!(
                f,
                "shape mismatch for parameter {id}: got {got:?}, expected {expected:?}"
            ),
            OptimErr::MalformedSpec(e) => write!(f, "malformed optimizer spec: {e}"),
        }
    }
}

impl Error for OptimErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OptimErr::MalformedSpec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OptimErr {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedSpec(value)
    }
}
