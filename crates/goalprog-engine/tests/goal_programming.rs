mod common;

use common::{model, push_control_up, state_at, state_value, trajectory, DT, X0};
use goalprog_engine::goal_programming::{
    FunctionContext, Goal, GoalError, GoalProgramming, GoalProgrammingHooks,
    GoalProgrammingOptions, GoalValue, PriorityReport, RunOptions, SessionState,
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

#[test]
fn earlier_priorities_survive_later_objectives() {
    let goals = vec![
        state_at("x_mid", "x", 0.5).with_target_max(0.6).with_priority(1),
        state_at("x_late", "x", 0.7).with_target_min(0.1).with_priority(2),
    ];
    let mut session = GoalProgramming::new(model())
        .with_goals(goals)
        .with_path_goals([push_control_up(3)]);

    assert_eq!(session.optimize(), Ok(true));
    assert_eq!(session.state(), SessionState::Finished);
    assert!(session.results_are_current());

    let reports = session.reports();
    assert_eq!(
        reports.iter().map(|r| r.priority).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(reports[0].objective.abs() < 1e-9);
    assert!(reports[1].objective.abs() < 1e-9);

    let x = &session.results(0).unwrap()["x"];
    assert!(x[10] <= 0.6 + 1e-6, "x(0.5) = {}", x[10]);
    assert!(x[10] >= 0.6 - 1e-6, "push-up should make x(0.5) active: {}", x[10]);
    assert!(x[14] > 0.1 - 1e-6, "x(0.7) = {}", x[14]);
    assert!((x[0] - X0).abs() < 1e-12);

    let u = &session.results(0).unwrap()["u"];
    assert!(u[20] > 2.0 - 1e-6, "u is free after t = 0.5: {}", u[20]);
}

#[test]
fn results_include_epsilons_of_last_priority() {
    let mut session = GoalProgramming::new(model()).with_goals([
        state_at("a", "x", 0.5).with_target_max(0.6),
        state_at("b", "x", 0.7).with_target_min(0.1).with_priority(2),
    ]);
    assert_eq!(session.optimize(), Ok(true));
    let results = session.results(0).unwrap();
    assert!(results.contains_key("eps_1_0"));
    assert!(!results.contains_key("eps_0_0"));
    assert_eq!(results["eps_1_0"].len(), 1);
}

#[test]
fn decreasing_targets_on_one_key_are_rejected() {
    let goals = vec![
        state_at("first", "x", 0.5)
            .with_target_min(0.5)
            .with_function_key("x_mid"),
        state_at("second", "x", 0.5)
            .with_target_min(0.3)
            .with_function_key("x_mid")
            .with_priority(2),
    ];
    let mut session = GoalProgramming::new(model()).with_goals(goals.clone());
    assert!(matches!(
        session.optimize(),
        Err(GoalError::NonMonotonicMin { .. })
    ));
    assert_eq!(session.state(), SessionState::NotStarted);

    let mut session = GoalProgramming::new(model())
        .with_goals(goals)
        .with_options(GoalProgrammingOptions {
            check_monotonicity: false,
            ..GoalProgrammingOptions::default()
        });
    assert_eq!(session.optimize(), Ok(true));
}

#[test]
fn goals_without_explicit_key_never_share_one() {
    let session = GoalProgramming::new(model()).with_goals([
        state_at("g", "x", 0.5).with_target_min(0.5),
        state_at("g", "x", 0.5).with_target_min(0.3).with_priority(2),
        state_at("h", "x", 0.5).with_function_key("explicit"),
    ]);
    assert_eq!(
        session.goal_function_keys(),
        &["g_0".to_string(), "g_1".to_string(), "explicit".to_string()]
    );
}

#[test]
fn minimization_goal_reaches_lowest_reachable_value() {
    let mut session = GoalProgramming::new(model())
        .with_goals([state_value("x_end", "x", 1.0)]);
    assert_eq!(session.optimize(), Ok(true));

    let expected = trajectory(X0, -2.0, 20)[20];
    let x = &session.results(0).unwrap()["x"];
    assert!((x[20] - expected).abs() < 1e-6, "{} vs {expected}", x[20]);
    assert!((session.reports()[0].objective - expected).abs() < 1e-6);
}

#[test]
fn critical_goal_stays_a_hard_bound() {
    let mut session = GoalProgramming::new(model())
        .with_goals([state_at("x_mid", "x", 0.5)
            .with_target_max(0.6)
            .with_critical(true)])
        .with_path_goals([push_control_up(2)]);

    assert_eq!(session.optimize(), Ok(true));
    let reports = session.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].objective, 0.0);

    let results = session.results(0).unwrap();
    assert!(!results.contains_key("eps_0_0"));
    let x = &results["x"];
    assert!(x[10] <= 0.6 + 1e-6, "x(0.5) = {}", x[10]);
    assert!(x[10] >= 0.6 - 1e-6, "push-up should reach the bound: {}", x[10]);
}

#[test]
fn failed_critical_priority_keeps_previous_results() {
    let mut session = GoalProgramming::new(model()).with_goals([
        state_at("reachable", "x", 0.5).with_target_max(0.6),
        state_at("impossible", "x", 0.5)
            .with_target_min(5.0)
            .with_critical(true)
            .with_priority(2),
    ]);

    assert_eq!(session.optimize(), Ok(false));
    assert_eq!(session.state(), SessionState::Aborted(2));
    assert!(!session.results_are_current());
    assert_eq!(session.reports().len(), 1);

    let x = &session.results(0).unwrap()["x"];
    assert!(x[10] <= 0.6 + 1e-6);
}

#[test]
fn invalid_goals_fail_before_solving() {
    let mut session =
        GoalProgramming::new(model()).with_goals([state_at("bad", "x", 0.5).with_target_min(-10.0)]);
    assert!(matches!(
        session.optimize(),
        Err(GoalError::TargetMinOutsideRange { .. })
    ));
    assert!(session.results(0).is_none());
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
    last_results: Vec<IndexMap<String, Vec<f64>>>,
}

impl GoalProgrammingHooks for Recorder {
    fn pre(&mut self) {
        self.events.push("pre".into());
    }

    fn post(&mut self) {
        self.events.push("post".into());
    }

    fn priority_started(&mut self, priority: i64) {
        self.events.push(format!("start {priority}"));
    }

    fn priority_completed(
        &mut self,
        report: &PriorityReport,
        results: &[IndexMap<String, Vec<f64>>],
    ) {
        self.events.push(format!("done {}", report.priority));
        self.last_results = results.to_vec();
    }
}

#[test]
fn hooks_run_around_each_priority() {
    let mut session = GoalProgramming::new(model()).with_goals([
        state_at("a", "x", 0.5).with_target_max(0.6).with_priority(-1),
        state_at("b", "x", 0.7).with_target_min(0.1).with_priority(4),
    ]);

    let mut recorder = Recorder::default();
    assert_eq!(
        session.optimize_with(&mut recorder, RunOptions::default()),
        Ok(true)
    );
    assert_eq!(
        recorder.events,
        vec!["pre", "start -1", "done -1", "start 4", "done 4", "post"]
    );
    assert_eq!(recorder.last_results.len(), 1);
    assert!(recorder.last_results[0].contains_key("x"));

    let mut recorder = Recorder::default();
    let run = RunOptions {
        preprocessing: false,
        postprocessing: false,
    };
    assert_eq!(session.optimize_with(&mut recorder, run), Ok(true));
    assert_eq!(recorder.events, vec!["start -1", "done -1", "start 4", "done 4"]);
}

#[test]
fn session_without_goals_reports_no_success() {
    let mut session = GoalProgramming::new(model());
    assert_eq!(session.optimize(), Ok(false));
    assert_eq!(session.state(), SessionState::Finished);
    assert!(session.results(0).is_none());
}

#[test]
fn integral_goal_is_frozen_before_point_goals() {
    let area = Goal::new("area", |cx: &FunctionContext<'_>| {
        cx.integral("x", 0.1, 1.0).map(GoalValue::from)
    })
    .with_function_range(-10.0, 10.0)
    .with_target_max(1.0)
    .with_order(1);
    let mut session = GoalProgramming::new(model()).with_goals([
        area,
        state_at("x_mid", "x", 0.5).with_target_min(0.0).with_priority(2),
        state_at("x_late", "x", 0.7).with_target_min(0.1).with_priority(2),
    ]);

    assert_eq!(session.optimize(), Ok(true));
    assert_eq!(session.reports().len(), 2);
    assert_eq!(session.reports()[1].goals, 2);

    let x = &session.results(0).unwrap()["x"];
    assert!(x[14] > 0.1 - 1e-6, "x(0.7) = {}", x[14]);
    let area: f64 = (3..=20).map(|t| 0.5 * DT * (x[t - 1] + x[t])).sum();
    assert!(area <= 1.0 + 1e-6, "integral = {area}");
}

#[test]
fn lowest_upper_target_matches_minimization() {
    let solve = |goal| {
        let mut session = GoalProgramming::new(model()).with_goals([goal]);
        assert_eq!(session.optimize(), Ok(true));
        session.results(0).unwrap()["x"].iter().sum::<f64>()
    };
    let minimized = solve(state_value("x_end", "x", 1.0));
    let targeted = solve(state_at("x_end", "x", 1.0).with_target_max(-10.0));
    assert!((minimized - targeted).abs() < 1e-6, "{minimized} vs {targeted}");
}

#[test]
fn vector_goal_matches_scalar_goals() {
    let vector = Goal::new("triple", |cx: &FunctionContext<'_>| {
        Ok(GoalValue(vec![
            cx.state_at("x", 0.3)?,
            cx.state_at("x", 0.5)?,
            cx.state_at("x", 0.7)?,
        ]))
    })
    .with_size(3)
    .with_function_range(-10.0, 10.0)
    .with_target_min(vec![1.0, f64::NEG_INFINITY, f64::NEG_INFINITY])
    .with_target_max(vec![f64::INFINITY, 0.8, 0.5])
    .with_order(1);
    let scalars = [
        state_at("x_early", "x", 0.3).with_target_min(1.0),
        state_at("x_mid", "x", 0.5).with_target_max(0.8),
        state_at("x_late", "x", 0.7).with_target_max(0.5),
    ];

    let mut as_vector = GoalProgramming::new(model())
        .with_goals([vector])
        .with_path_goals([push_control_up(2)]);
    let mut as_scalars = GoalProgramming::new(model())
        .with_goals(scalars)
        .with_path_goals([push_control_up(2)]);
    assert_eq!(as_vector.optimize(), Ok(true));
    assert_eq!(as_scalars.optimize(), Ok(true));

    let (a, b) = (as_vector.objective_values(), as_scalars.objective_values());
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-6, "{a:?} vs {b:?}");
    }
    let x = &as_vector.results(0).unwrap()["x"];
    assert!(x[6] >= 1.0 - 1e-6);
    assert!(x[10] <= 0.8 + 1e-6);
    assert!(x[14] <= 0.5 + 1e-6);
}
