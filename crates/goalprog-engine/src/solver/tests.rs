use super::*;
use goalprog_model::{LinearExpr, VarId};

fn var(i: usize) -> LinearExpr {
    LinearExpr::variable(VarId(i))
}

fn solve(problem: &SolverProblem) -> SolveOutcome {
    OuterApproximationSolver::default()
        .solve(problem)
        .expect("solve")
}

#[test]
fn linear_program_solves_in_one_iteration() {
    // Maximize 3x + 2y
    // s.t. x + y <= 4
    //      x <= 2
    //      y <= 3
    //      x,y >= 0
    let problem = SolverProblem {
        variables: vec![VarSpec::new(0.0, 2.0), VarSpec::new(0.0, 3.0)],
        objective: Function::linear(var(0) * -3.0 - var(1) * 2.0),
        constraints: vec![Constraint::new(
            Function::linear(var(0) + var(1)),
            f64::NEG_INFINITY,
            4.0,
        )],
        seed: Vec::new(),
    };

    let outcome = solve(&problem);
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert_eq!(outcome.iterations, 1);
    assert!((outcome.values[0] - 2.0).abs() < 1e-9, "x={}", outcome.values[0]);
    assert!((outcome.values[1] - 2.0).abs() < 1e-9, "y={}", outcome.values[1]);
    assert!((outcome.objective + 10.0).abs() < 1e-9);
    assert!(outcome.max_constraint_violation < 1e-9);
}

#[test]
fn quadratic_objective_converges_to_interior_minimum() {
    // Minimize (x - 1.5)^2 + (y + 0.5)^2 s.t. x + y <= 0.
    // Optimum on the boundary at x = 1, y = -1 with value 0.5.
    let problem = SolverProblem {
        variables: vec![VarSpec::free(), VarSpec::free()],
        objective: {
            let mut f = Function::power(1.0, var(0) - 1.5, 2);
            f.add_power(1.0, var(1) + 0.5, 2);
            f
        },
        constraints: vec![Constraint::new(
            Function::linear(var(0) + var(1)),
            f64::NEG_INFINITY,
            0.0,
        )],
        seed: vec![0.0, 0.0],
    };

    let outcome = solve(&problem);
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert!((outcome.values[0] - 1.0).abs() < 1e-4, "x={}", outcome.values[0]);
    assert!((outcome.values[1] + 1.0).abs() < 1e-4, "y={}", outcome.values[1]);
    assert!((outcome.objective - 0.5).abs() < 1e-6, "f={}", outcome.objective);
}

#[test]
fn power_term_at_its_minimizer_converges_tightly() {
    // Minimize eps^2 with eps in [0, 1]; the minimizer sits on a flat stretch of the first cuts.
    let problem = SolverProblem {
        variables: vec![VarSpec::new(0.0, 1.0)],
        objective: Function::power(1.0, var(0), 2),
        constraints: Vec::new(),
        seed: vec![1.0],
    };

    let outcome = solve(&problem);
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert!(outcome.values[0] < 1e-7, "eps={}", outcome.values[0]);
}

#[test]
fn power_sum_constraint_is_respected() {
    // Maximize x s.t. x^2 + y^2 <= 1, y = 0.
    let problem = SolverProblem {
        variables: vec![VarSpec::free(), VarSpec::fixed(0.0)],
        objective: Function::linear(-var(0)),
        constraints: vec![Constraint::new(
            {
                let mut f = Function::power(1.0, var(0), 2);
                f.add_power(1.0, var(1), 2);
                f
            },
            f64::NEG_INFINITY,
            1.0,
        )],
        seed: Vec::new(),
    };

    let outcome = solve(&problem);
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert!((outcome.values[0] - 1.0).abs() < 1e-6, "x={}", outcome.values[0]);
    assert!(outcome.max_constraint_violation < 1e-9);
}

#[test]
fn infeasible_problem_reports_status() {
    let problem = SolverProblem {
        variables: vec![VarSpec::new(0.0, 1.0)],
        objective: Function::linear(var(0)),
        constraints: vec![Constraint::new(
            Function::linear(var(0)),
            2.0,
            f64::INFINITY,
        )],
        seed: Vec::new(),
    };

    let outcome = solve(&problem);
    assert_eq!(outcome.status, SolveStatus::Infeasible);
    assert!(!outcome.status.is_success());
    assert!(outcome.values.is_empty());
}

#[test]
fn unbounded_problem_reports_status() {
    let problem = SolverProblem {
        variables: vec![VarSpec::new(0.0, f64::INFINITY)],
        objective: Function::linear(-var(0)),
        constraints: Vec::new(),
        seed: Vec::new(),
    };
    assert_eq!(solve(&problem).status, SolveStatus::Unbounded);
}

#[test]
fn non_convex_terms_are_rejected() {
    let problem = SolverProblem {
        variables: vec![VarSpec::new(-1.0, 1.0)],
        objective: Function::power(-1.0, var(0), 2),
        constraints: Vec::new(),
        seed: Vec::new(),
    };
    let err = OuterApproximationSolver::default()
        .solve(&problem)
        .unwrap_err();
    assert!(err.to_string().contains("convex"), "{err}");

    let problem = SolverProblem {
        variables: vec![VarSpec::new(-1.0, 1.0)],
        objective: Function::zero(),
        constraints: vec![Constraint::new(Function::power(1.0, var(0), 2), 0.5, 1.0)],
        seed: Vec::new(),
    };
    assert!(OuterApproximationSolver::default().solve(&problem).is_err());
}

#[test]
fn out_of_range_variables_are_rejected() {
    let problem = SolverProblem {
        variables: vec![VarSpec::free()],
        objective: Function::linear(var(3)),
        constraints: Vec::new(),
        seed: Vec::new(),
    };
    let err = OuterApproximationSolver::default()
        .solve(&problem)
        .unwrap_err();
    assert!(err.to_string().contains("x[3]"), "{err}");
}

#[test]
fn order_one_power_folds_into_linear_part() {
    let f = Function::power(2.0, var(0) + 1.0, 1);
    assert!(f.is_linear());
    assert_eq!(f.evaluate(&[3.0]), 8.0);

    let g = Function::power(2.0, var(0), 3);
    assert_eq!(g.evaluate(&[-2.0]), 16.0);
    assert_eq!(g.powers[0].slope_at(-2.0), -24.0);
}
