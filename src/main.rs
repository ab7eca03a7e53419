use std::{env, fs};

use anyhow::Context;
use log::info;
use ndarray::{ArrayD, arr1, arr2};
use update_rules::{OptimizerBuilder, OptimizerSpec, ParameterStore};

const STEPS: usize = 500;
const DEFAULT_SPEC: &str = r#"{ "rule": { "rmsprop": {} } }"#;

/// Minimizes `½‖x − target‖²` with the optimizer described by the spec passed as argument.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            OptimizerSpec::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => OptimizerSpec::from_json(DEFAULT_SPEC)?,
    };

    let targets = [
        arr1(&[1.5_f32, -0.5, 3.0]).into_dyn(),
        arr2(&[[0.25_f32, -2.0], [1.0, 0.0]]).into_dyn(),
    ];

    let mut store = ParameterStore::new();
    let ids: Vec<_> = targets
        .iter()
        .map(|t| store.insert(ArrayD::<f32>::zeros(t.raw_dim())))
        .collect();

    let mut optimizer = OptimizerBuilder::build(&spec, &store)?;
    info!("minimizing with {}", optimizer.name());

    for step in 1..=STEPS {
        let mut loss = 0.;

        for (&id, target) in ids.iter().zip(&targets) {
            let grad = store.value(id)? - target;
            loss += 0.5 * grad.mapv(|g| g * g).sum();
            store.set_grad(id, grad)?;
        }

        optimizer.step(&mut store)?;

        if step % 100 == 0 {
            info!("step={step} loss={loss}");
        }
    }

    for (&id, target) in ids.iter().zip(&targets) {
        println!("{id}: {} (target {})", store.value(id)?, target);
    }

    Ok(())
}
