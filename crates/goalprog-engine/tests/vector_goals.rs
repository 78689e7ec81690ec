mod common;

use common::{model, push_control_up};
use goalprog_engine::goal_programming::{
    FunctionContext, Goal, GoalError, GoalProgramming, GoalValue, Target,
};
use goalprog_model::LinearExpr;
use pretty_assertions::assert_eq;

fn pair() -> Goal {
    Goal::new("pair", |cx: &FunctionContext<'_>| {
        Ok(GoalValue(vec![cx.state_at("x", 0.5)?, cx.state_at("x", 0.7)?]))
    })
    .with_size(2)
    .with_function_range(-10.0, 10.0)
    .with_order(1)
}

#[test]
fn component_targets_bound_each_entry() {
    let goal = pair()
        .with_target_max(Target::Components(vec![0.6, 0.3]))
        .with_function_value_timeseries_id("pair_value")
        .with_violation_timeseries_id("pair_violation");
    let mut session = GoalProgramming::new(model())
        .with_goals([goal])
        .with_path_goals([push_control_up(2)]);

    assert_eq!(session.optimize(), Ok(true));
    let x = &session.results(0).unwrap()["x"];
    assert!(x[10] <= 0.6 + 1e-6, "x(0.5) = {}", x[10]);
    assert!(x[14] <= 0.3 + 1e-6, "x(0.7) = {}", x[14]);

    let diagnostics = session.diagnostics();
    for id in ["pair_value_0", "pair_value_1"] {
        let series = diagnostics.get(id, 0).unwrap();
        assert_eq!(series.len(), 21);
        assert!(series.iter().all(|v| *v == series[0]));
    }
    assert!(diagnostics.get("pair_value", 0).is_none());
    assert!(diagnostics.get("pair_value_1", 0).unwrap()[0] <= 0.3 + 1e-6);

    let violation = diagnostics.get("pair_violation", 0).unwrap();
    assert_eq!(violation.len(), 21);
    assert!(violation.iter().all(|v| v.is_nan() || v.abs() < 1e-6));
}

#[test]
fn wrong_number_of_values_is_an_error() {
    let short = Goal::new("short", |cx: &FunctionContext<'_>| {
        cx.state_at("x", 0.5).map(GoalValue::from)
    })
    .with_size(2)
    .with_order(1);

    let mut session = GoalProgramming::new(model()).with_goals([short]);
    assert!(matches!(
        session.optimize(),
        Err(GoalError::SizeMismatch { expected: 2, actual: 1, .. })
    ));
}

#[test]
fn component_target_length_must_match_size() {
    let goal = pair().with_target_min(vec![0.1]);
    let mut session = GoalProgramming::new(model()).with_goals([goal]);
    assert!(matches!(
        session.optimize(),
        Err(GoalError::SizeMismatch { what: "target", .. })
    ));
}

#[test]
fn constant_goal_has_nothing_to_minimize() {
    let constant = Goal::new("constant", |_cx: &FunctionContext<'_>| {
        Ok(LinearExpr::constant(3.0).into())
    })
    .with_order(1);
    let mut session = GoalProgramming::new(model()).with_goals([constant]);
    assert_eq!(session.optimize(), Ok(true));
    assert!((session.reports()[0].objective - 3.0).abs() < 1e-9);
}
