use goalprog_model::{CollocatedModel, EnsembleMember, ModelError, ModelView, VarId};
use pretty_assertions::assert_eq;

fn model() -> CollocatedModel {
    CollocatedModel::builder(vec![0.0, 0.5, 1.0])
        .state("x", -10.0, 10.0)
        .control("u", -2.0, 2.0)
        .nominal("x", 4.0)
        .derivative("x", &[("x", 1.0), ("u", 1.0)], 0.0)
        .initial("x", 1.1)
        .build()
        .unwrap()
}

#[test]
fn state_at_interpolates_between_grid_points() {
    let model = model();
    let expr = model.state_at("x", 0.25, 0).unwrap();
    assert_eq!(expr.coefficient(VarId(0)), 0.5);
    assert_eq!(expr.coefficient(VarId(1)), 0.5);

    let on_grid = model.state_at("x", 0.5, 0).unwrap();
    assert_eq!(on_grid.coefficient(VarId(1)), 1.0);
    assert_eq!(on_grid.terms().count(), 1);

    assert!(matches!(
        model.state_at("x", 1.5, 0),
        Err(ModelError::TimeOutOfRange { .. })
    ));
}

#[test]
fn integral_follows_trapezoid_rule() {
    let model = model();
    let all = model.integral("x", 0.0, 1.0, 0).unwrap();
    assert_eq!(all.coefficient(VarId(0)), 0.25);
    assert_eq!(all.coefficient(VarId(1)), 0.5);
    assert_eq!(all.coefficient(VarId(2)), 0.25);

    // x = (1, 3, 5): the interpolant integrates to 1.5 over [0.25, 0.75].
    let part = model.integral("x", 0.25, 0.75, 0).unwrap();
    let value = part.evaluate(&[1.0, 3.0, 5.0]);
    assert!((value - 1.5).abs() < 1e-12, "value={value}");

    assert!(model.integral("x", 0.5, 0.5, 0).unwrap().is_constant());
    assert!(matches!(
        model.integral("x", 1.0, 0.0, 0),
        Err(ModelError::ReversedInterval { .. })
    ));
}

#[test]
fn bounds_nominal_and_seed() {
    let model = model();
    assert_eq!(model.bounds("x"), Some((-10.0, 10.0)));
    assert_eq!(model.nominal("x"), 4.0);
    assert_eq!(model.nominal("u"), 1.0);
    assert_eq!(model.bounds("missing"), None);
    assert_eq!(model.ensemble_size(), 1);
    assert_eq!(model.ensemble_member_probability(0), 1.0);
    assert_eq!(model.seed(), vec![1.1, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn unknown_names_are_reported() {
    let model = model();
    assert_eq!(
        model.state_vector("y", 0),
        Err(ModelError::UnknownVariable("y".to_string()))
    );
    assert!(matches!(
        model.state_vector("x", 3),
        Err(ModelError::EnsembleMemberOutOfRange { member: 3, size: 1 })
    ));
}

#[test]
fn ensemble_members_load_from_json() {
    let members: Vec<EnsembleMember> = serde_json::from_str(
        r#"[{"probability": 0.25, "initial": {"x": 2.0}}, {"probability": 0.75}]"#,
    )
    .unwrap();
    assert_eq!(members[1], EnsembleMember::new(0.75));

    let model = CollocatedModel::builder(vec![0.0, 1.0])
        .state("x", -10.0, 10.0)
        .derivative("x", &[("x", 1.0)], 0.0)
        .initial("x", 1.0)
        .ensemble(members)
        .build()
        .unwrap();
    assert_eq!(model.ensemble_size(), 2);
    assert_eq!(model.ensemble_member_probability(1), 0.75);
    assert_eq!(model.seed(), vec![2.0, 0.0, 1.0, 0.0]);
}
