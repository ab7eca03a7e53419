// Adadelta: "ADADELTA: An Adaptive Learning Rate Method" (Zeiler, 2012)
//
//   E[g²]  = ρ * E[g²]  + (1 - ρ) * g²
//   Δ      = √(E[Δ²] + ε) / √(E[g²] + ε) * g
//   E[Δ²]  = ρ * E[Δ²]  + (1 - ρ) * Δ²
//   θ      = θ - lr * Δ
//
// The learning rate only scales Δ when it's applied, it never enters the statistics.

use ndarray::{ArrayD, ArrayViewD, Zip};
use serde::{Deserialize, Serialize};

use super::{
    UpdateRule,
    rule::{decayed_grad, non_negative},
};
use crate::error::{OptimErr, Result};

/// Hyperparameters of the `Adadelta` rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdadeltaConfig {
    /// Coefficient scaling the delta before it is applied to the parameter.
    pub lr: f32,
    /// Decay of the running averages, in `[0, 1]`.
    pub rho: f32,
    /// Term added inside both square roots.
    pub eps: f32,
    /// L2 penalty folded into the gradient.
    pub weight_decay: f32,
}

impl Default for AdadeltaConfig {
    fn default() -> Self {
        Self {
            lr: 1.0,
            rho: 0.9,
            eps: 1e-6,
            weight_decay: 0.,
        }
    }
}

/// Running statistics of a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdadeltaState {
    pub step: u64,
    pub square_avg: ArrayD<f32>,
    pub acc_delta: ArrayD<f32>,
}

/// The Adadelta update rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct Adadelta;

impl UpdateRule for Adadelta {
    type Config = AdadeltaConfig;
    type State = AdadeltaState;

    const NAME: &'static str = "adadelta";

    fn validate(config: &AdadeltaConfig) -> Result<()> {
        non_negative("lr", config.lr)?;

        let rho = config.rho;
        if !(0. ..=1.).contains(&rho) {
            return Err(OptimErr::InvalidConfiguration {
                name: "rho",
                value: rho,
            });
        }

        non_negative("eps", config.eps)?;
        non_negative("weight_decay", config.weight_decay)
    }

    fn init_state(param: &ArrayD<f32>, _config: &AdadeltaConfig) -> AdadeltaState {
        AdadeltaState {
            step: 0,
            square_avg: ArrayD::zeros(param.raw_dim()),
            acc_delta: ArrayD::zeros(param.raw_dim()),
        }
    }

    fn reset(state: &mut AdadeltaState) {
        state.step = 0;
        state.square_avg.fill(0.);
        state.acc_delta.fill(0.);
    }

    fn shape(state: &AdadeltaState) -> &[usize] {
        state.square_avg.shape()
    }

    fn compute_update(
        param: ArrayViewD<'_, f32>,
        grad: ArrayViewD<'_, f32>,
        state: &mut AdadeltaState,
        config: &AdadeltaConfig,
    ) -> ArrayD<f32> {
        let AdadeltaConfig {
            rho,
            eps,
            weight_decay,
            ..
        } = *config;

        let grad = decayed_grad(&param, &grad, weight_decay);

        state.step += 1;

        Zip::from(state.square_avg.view_mut())
            .and(grad.view())
            .for_each(|s, &g| *s = rho * *s + (1. - rho) * g * g);

        let delta = Zip::from(state.acc_delta.view())
            .and(state.square_avg.view())
            .and(grad.view())
            .map_collect(|&a, &s, &g| (a + eps).sqrt() / (s + eps).sqrt() * g);

        Zip::from(state.acc_delta.view_mut())
            .and(delta.view())
            .for_each(|a, &d| *a = rho * *a + (1. - rho) * d * d);

        delta
    }

    fn learning_rate(config: &AdadeltaConfig) -> f32 {
        config.lr
    }

    fn step(state: &AdadeltaState) -> u64 {
        state.step
    }
}
