// RMSprop, from Hinton, "Neural Networks for Machine Learning", lecture 6e.
// Centered variant from Graves, "Generating Sequences With Recurrent Neural Networks".
//
//   v    = α * v + (1 - α) * g²
//   m    = α * m + (1 - α) * g          (centered only)
//   u    = g / (√(v - m²) + ε)          (√v when not centered)
//   buf  = μ * buf + u                  (momentum only, then u = buf)
//   θ    = θ - lr * u
//
// The square root is taken before ε is added. Swapping the two gives a different
// optimizer, so the order in `compute_update` must stay as it is.

use ndarray::{ArrayD, ArrayViewD, Zip};
use serde::{Deserialize, Serialize};

use super::{
    UpdateRule,
    rule::{decayed_grad, non_negative},
};
use crate::error::Result;

/// Hyperparameters of the `Rmsprop` rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RmspropConfig {
    pub lr: f32,
    /// Smoothing constant of the running averages.
    pub alpha: f32,
    pub eps: f32,
    pub weight_decay: f32,
    pub momentum: f32,
    /// Normalize by the estimated variance of the gradient instead of its second moment.
    pub centered: bool,
}

impl Default for RmspropConfig {
    fn default() -> Self {
        Self {
            lr: 1e-2,
            alpha: 0.99,
            eps: 1e-8,
            weight_decay: 0.,
            momentum: 0.,
            centered: false,
        }
    }
}

/// Running statistics of a single parameter.
///
/// `momentum_buffer` only exists when the group's momentum is positive and `grad_avg` only
/// when the group is centered.
#[derive(Debug, Clone, PartialEq)]
pub struct RmspropState {
    pub step: u64,
    pub square_avg: ArrayD<f32>,
    pub momentum_buffer: Option<ArrayD<f32>>,
    pub grad_avg: Option<ArrayD<f32>>,
}

/// The RMSprop update rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmsprop;

impl UpdateRule for Rmsprop {
    type Config = RmspropConfig;
    type State = RmspropState;

    const NAME: &'static str = "rmsprop";

    fn validate(config: &RmspropConfig) -> Result<()> {
        non_negative("lr", config.lr)?;
        non_negative("eps", config.eps)?;
        non_negative("momentum", config.momentum)?;
        non_negative("weight_decay", config.weight_decay)?;
        non_negative("alpha", config.alpha)
    }

    fn init_state(param: &ArrayD<f32>, config: &RmspropConfig) -> RmspropState {
        let zeros = || ArrayD::zeros(param.raw_dim());

        RmspropState {
            step: 0,
            square_avg: zeros(),
            momentum_buffer: (config.momentum > 0.).then(zeros),
            grad_avg: config.centered.then(zeros),
        }
    }

    fn reset(state: &mut RmspropState) {
        state.step = 0;
        state.square_avg.fill(0.);

        if let Some(buf) = state.momentum_buffer.as_mut() {
            buf.fill(0.);
        }
        if let Some(grad_avg) = state.grad_avg.as_mut() {
            grad_avg.fill(0.);
        }
    }

    fn shape(state: &RmspropState) -> &[usize] {
        state.square_avg.shape()
    }

    fn compute_update(
        param: ArrayViewD<'_, f32>,
        grad: ArrayViewD<'_, f32>,
        state: &mut RmspropState,
        config: &RmspropConfig,
    ) -> ArrayD<f32> {
        let RmspropConfig {
            alpha,
            eps,
            weight_decay,
            momentum,
            centered,
            ..
        } = *config;

        let grad = decayed_grad(&param, &grad, weight_decay);

        state.step += 1;

        Zip::from(state.square_avg.view_mut())
            .and(grad.view())
            .for_each(|v, &g| *v = alpha * *v + (1. - alpha) * g * g);

        debug_assert_eq!(
            state.grad_avg.is_some(),
            centered,
            "rmsprop state was built for another `centered` setting"
        );
        debug_assert_eq!(
            state.momentum_buffer.is_some(),
            momentum > 0.,
            "rmsprop state was built for another `momentum` setting"
        );

        let mut update = match (centered, state.grad_avg.as_mut()) {
            (true, Some(grad_avg)) => {
                Zip::from(grad_avg.view_mut())
                    .and(grad.view())
                    .for_each(|m, &g| *m = alpha * *m + (1. - alpha) * g);

                Zip::from(grad.view())
                    .and(state.square_avg.view())
                    .and(grad_avg.view())
                    .map_collect(|&g, &v, &m| g / ((v - m * m).sqrt() + eps))
            }
            _ => Zip::from(grad.view())
                .and(state.square_avg.view())
                .map_collect(|&g, &v| g / (v.sqrt() + eps)),
        };

        if let Some(buf) = state.momentum_buffer.as_mut().filter(|_| momentum > 0.) {
            Zip::from(buf.view_mut())
                .and(update.view())
                .for_each(|b, &u| *b = momentum * *b + u);
            update = buf.clone();
        }

        update
    }

    fn learning_rate(config: &RmspropConfig) -> f32 {
        config.lr
    }

    fn step(state: &RmspropState) -> u64 {
        state.step
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr1};

    use super::*;
    use crate::error::OptimErr;

    fn config() -> RmspropConfig {
        RmspropConfig::default()
    }

    fn assert_close(got: f32, expected: f32) {
        let tol = 1e-5 * expected.abs().max(1.);
        assert!(
            (got - expected).abs() <= tol,
            "got {got}, expected {expected}"
        );
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let cases = [
            ("lr", RmspropConfig { lr: -1., ..config() }),
            ("eps", RmspropConfig { eps: -1e-8, ..config() }),
            ("momentum", RmspropConfig { momentum: -0.9, ..config() }),
            ("weight_decay", RmspropConfig { weight_decay: -0.1, ..config() }),
            ("alpha", RmspropConfig { alpha: -0.5, ..config() }),
            ("alpha", RmspropConfig { alpha: f32::NAN, ..config() }),
        ];

        for (expected, cfg) in cases {
            match Rmsprop::validate(&cfg) {
                Err(OptimErr::InvalidConfiguration { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate_reports_first_failure() {
        let cfg = RmspropConfig {
            lr: -1.,
            alpha: -1.,
            ..config()
        };

        match Rmsprop::validate(&cfg) {
            Err(OptimErr::InvalidConfiguration { name, value }) => {
                assert_eq!(name, "lr");
                assert_eq!(value, -1.);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_accepts_valid_configs() {
        Rmsprop::validate(&config()).unwrap();

        let cfg = RmspropConfig {
            lr: 0.,
            alpha: 1.5,
            eps: 0.,
            weight_decay: 0.,
            momentum: 0.9,
            centered: true,
        };
        Rmsprop::validate(&cfg).unwrap();
    }

    #[test]
    fn test_optional_buffers_follow_config() {
        let param = ArrayD::<f32>::ones(IxDyn(&[3, 2]));

        let plain = Rmsprop::init_state(&param, &config());
        assert!(plain.momentum_buffer.is_none());
        assert!(plain.grad_avg.is_none());

        let cfg = RmspropConfig {
            momentum: 0.5,
            centered: true,
            ..config()
        };
        let full = Rmsprop::init_state(&param, &cfg);
        let zeros = ArrayD::<f32>::zeros(IxDyn(&[3, 2]));

        assert_eq!(full.step, 0);
        assert_eq!(full.square_avg, zeros);
        assert_eq!(full.momentum_buffer.as_ref(), Some(&zeros));
        assert_eq!(full.grad_avg.as_ref(), Some(&zeros));
    }

    #[test]
    fn test_single_update_matches_formula() {
        let param = arr1(&[1.0_f32]).into_dyn();
        let grad = arr1(&[1.0_f32]).into_dyn();
        let mut state = Rmsprop::init_state(&param, &config());

        let update = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &config());

        assert_eq!(state.step, 1);
        assert_close(state.square_avg[[0]], 0.01);
        assert_close(update[[0]], 1. / (0.1 + 1e-8));
    }

    #[test]
    fn test_square_root_is_taken_before_eps() {
        let param = arr1(&[0.0_f32]).into_dyn();
        let grad = arr1(&[1.0_f32]).into_dyn();
        let cfg = RmspropConfig {
            alpha: 0.,
            eps: 1.,
            ..config()
        };
        let mut state = Rmsprop::init_state(&param, &cfg);

        let update = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);

        // 1 / (√1 + 1), eps inside the root would give 1 / √2
        assert_eq!(update[[0]], 0.5);
    }

    #[test]
    fn test_weight_decay_is_folded_into_gradient() {
        let param = arr1(&[2.0_f32]).into_dyn();
        let grad = arr1(&[0.0_f32]).into_dyn();
        let cfg = RmspropConfig {
            weight_decay: 0.1,
            alpha: 0.,
            eps: 0.,
            ..config()
        };
        let mut state = Rmsprop::init_state(&param, &cfg);

        let update = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);

        assert_close(state.square_avg[[0]], 0.2 * 0.2);
        assert_close(update[[0]], 1.);
        assert_eq!(grad[[0]], 0.);
    }

    #[test]
    fn test_centered_uses_variance_without_touching_square_avg() {
        let param = arr1(&[0.0_f32]).into_dyn();
        let grad = arr1(&[2.0_f32]).into_dyn();
        let cfg = RmspropConfig {
            alpha: 0.5,
            eps: 0.,
            centered: true,
            ..config()
        };
        let mut state = Rmsprop::init_state(&param, &cfg);

        let update = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);

        // v = 0.5 * 4 = 2, m = 0.5 * 2 = 1, u = 2 / √(2 - 1)
        assert_eq!(state.square_avg[[0]], 2.);
        assert_eq!(state.grad_avg.as_ref().unwrap()[[0]], 1.);
        assert_eq!(update[[0]], 2.);
    }

    #[test]
    fn test_centered_denominator_is_not_clamped() {
        let param = arr1(&[0.0_f32]).into_dyn();
        let grad = arr1(&[1.0_f32]).into_dyn();
        let cfg = RmspropConfig {
            alpha: 0.5,
            centered: true,
            ..config()
        };
        let mut state = Rmsprop::init_state(&param, &cfg);
        state.square_avg.fill(0.);
        state.grad_avg.as_mut().unwrap().fill(4.);

        let update = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);

        // v - m² = 0.5 - 2.5² < 0, so the root is NaN and nothing hides it
        assert!(update[[0]].is_nan());
        assert_eq!(state.square_avg[[0]], 0.5);
    }

    #[test]
    fn test_momentum_accumulates_updates() {
        let param = arr1(&[0.0_f32]).into_dyn();
        let grad = arr1(&[1.0_f32]).into_dyn();
        let cfg = RmspropConfig {
            alpha: 0.,
            eps: 0.,
            momentum: 0.9,
            ..config()
        };
        let mut state = Rmsprop::init_state(&param, &cfg);

        let first = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);
        let second = Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);

        // every raw update is 1 / √1 = 1
        assert_eq!(first[[0]], 1.);
        assert_close(second[[0]], 0.9 * 1. + 1.);
        assert_eq!(state.momentum_buffer.as_ref().unwrap()[[0]], second[[0]]);
        assert_eq!(state.step, 2);
    }

    #[test]
    fn test_reset_keeps_optional_buffers() {
        let param = arr1(&[1.0_f32, 2.]).into_dyn();
        let grad = arr1(&[0.5_f32, -0.5]).into_dyn();
        let cfg = RmspropConfig {
            momentum: 0.9,
            centered: true,
            ..config()
        };
        let mut state = Rmsprop::init_state(&param, &cfg);

        for _ in 0..3 {
            Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);
        }
        Rmsprop::reset(&mut state);

        assert_eq!(state, Rmsprop::init_state(&param, &cfg));
    }

    #[test]
    fn test_update_is_deterministic() {
        let param = arr1(&[0.3_f32, -1.2, 4.0]).into_dyn();
        let grad = arr1(&[-0.7_f32, 0.01, 3.3]).into_dyn();
        let cfg = RmspropConfig {
            momentum: 0.5,
            centered: true,
            weight_decay: 0.01,
            ..config()
        };

        let mut a = Rmsprop::init_state(&param, &cfg);
        let mut b = Rmsprop::init_state(&param, &cfg);

        for _ in 0..4 {
            let ua = Rmsprop::compute_update(param.view(), grad.view(), &mut a, &cfg);
            let ub = Rmsprop::compute_update(param.view(), grad.view(), &mut b, &cfg);
            assert_eq!(ua, ub);
        }

        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_is_the_param_shape() {
        let param = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let state = Rmsprop::init_state(&param, &config());

        assert_eq!(Rmsprop::shape(&state), [2, 3]);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "another `centered` setting")]
    fn test_centered_step_on_plain_state_is_caught() {
        let param = arr1(&[1.0_f32]).into_dyn();
        let grad = arr1(&[0.5_f32]).into_dyn();
        let mut state = Rmsprop::init_state(&param, &config());
        let cfg = RmspropConfig {
            centered: true,
            ..config()
        };

        Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "another `momentum` setting")]
    fn test_momentum_step_on_plain_state_is_caught() {
        let param = arr1(&[1.0_f32]).into_dyn();
        let grad = arr1(&[0.5_f32]).into_dyn();
        let mut state = Rmsprop::init_state(&param, &config());
        let cfg = RmspropConfig {
            momentum: 0.9,
            ..config()
        };

        Rmsprop::compute_update(param.view(), grad.view(), &mut state, &cfg);
    }
}
