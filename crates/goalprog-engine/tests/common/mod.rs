#![allow(dead_code)]

use goalprog_engine::goal_programming::{FunctionContext, Goal, GoalValue};
use goalprog_model::{CollocatedModel, EnsembleMember};

pub const DT: f64 = 0.05;
pub const X0: f64 = 1.1;

/// 21 points on `[0, 1]`.
pub fn times() -> Vec<f64> {
    (0..=20).map(|i| i as f64 / 20.0).collect()
}

/// `der(x) = x + u`, `x(0) = 1.1`, `u` in `[-2, 2]`.
pub fn model() -> CollocatedModel {
    CollocatedModel::builder(times())
        .state("x", -10.0, 10.0)
        .control("u", -2.0, 2.0)
        .derivative("x", &[("x", 1.0), ("u", 1.0)], 0.0)
        .initial("x", X0)
        .build()
        .unwrap()
}

/// Same dynamics with two equally likely members starting at `x0` and `x1`.
pub fn ensemble_model(x0: f64, x1: f64) -> CollocatedModel {
    CollocatedModel::builder(times())
        .state("x", -10.0, 10.0)
        .control("u", -2.0, 2.0)
        .derivative("x", &[("x", 1.0), ("u", 1.0)], 0.0)
        .ensemble(vec![
            EnsembleMember::new(0.5).with_initial("x", x0),
            EnsembleMember::new(0.5).with_initial("x", x1),
        ])
        .build()
        .unwrap()
}

/// Implicit Euler trajectory of the fixture under a constant control from step 1 on.
pub fn trajectory(x0: f64, u: f64, steps: usize) -> Vec<f64> {
    let mut x = vec![x0];
    for _ in 0..steps {
        let prev = *x.last().unwrap();
        x.push((prev + DT * u) / (1.0 - DT));
    }
    x
}

/// Order-one point goal on `state` at time `t`, without a function range.
pub fn state_value(name: &str, state: &'static str, t: f64) -> Goal {
    Goal::new(name, move |cx: &FunctionContext<'_>| {
        cx.state_at(state, t).map(GoalValue::from)
    })
    .with_order(1)
}

/// [`state_value`] with function range `[-10, 10]`, ready for targets.
pub fn state_at(name: &str, state: &'static str, t: f64) -> Goal {
    state_value(name, state, t).with_function_range(-10.0, 10.0)
}

/// Order-one path minimization of `-u`, pushing the control up at every step.
pub fn push_control_up(priority: i64) -> Goal {
    Goal::new("push_up", |cx: &FunctionContext<'_>| {
        cx.state("u").map(|u| GoalValue::from(-u))
    })
    .with_order(1)
    .with_priority(priority)
}
