use goalprog_model::LinearExpr;

use super::simplex::{solve_lp, LinearProgram, LpRow, LpStatus};
use super::{
    clamp_vars, max_constraint_violation, Function, PowerTerm, SolveBackend, SolveOptions,
    SolveOutcome, SolveStatus, SolverError, SolverProblem, VarSpec,
};

/// Scale factors for the extra cuts placed between a new iterate and the term's minimizer.
const REFINEMENT_FACTORS: [f64; 2] = [1e-4, 1e-8];

/// Kelley-style outer approximation over the dense simplex.
///
/// Every power term `w·|a(x)|^p` is replaced by an epigraph column `τ` bounded below by tangent
/// cuts. Each LP solve adds cuts at the iterate until every `τ` matches its term within
/// [`SolveOptions::tolerance`]. Linear problems take a single LP solve.
#[derive(Clone, Debug, Default)]
pub struct OuterApproximationSolver {
    options: SolveOptions,
}

struct Epigraph<'a> {
    term: &'a PowerTerm,
    column: usize,
    cuts: Vec<f64>,
}

impl OuterApproximationSolver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }
}

impl SolveBackend for OuterApproximationSolver {
    fn solve(&mut self, problem: &SolverProblem) -> Result<SolveOutcome, SolverError> {
        check_problem(problem)?;
        let n = problem.variables.len();

        let mut lp = LinearProgram {
            columns: problem.variables.clone(),
            objective: vec![0.0; n],
            rows: Vec::with_capacity(problem.constraints.len()),
        };
        for (id, c) in problem.objective.linear.terms() {
            lp.objective[id.0] += c;
        }

        let mut epigraphs: Vec<Epigraph<'_>> = Vec::new();
        for term in &problem.objective.powers {
            let column = lp.add_column(VarSpec::free(), 1.0);
            epigraphs.push(Epigraph {
                term,
                column,
                cuts: Vec::new(),
            });
        }
        for constraint in &problem.constraints {
            let function = &constraint.function;
            let mut coeffs = linear_coeffs(&function.linear, 1.0);
            for term in &function.powers {
                let column = lp.add_column(VarSpec::free(), 0.0);
                coeffs.push((column, 1.0));
                epigraphs.push(Epigraph {
                    term,
                    column,
                    cuts: Vec::new(),
                });
            }
            let constant = function.linear.constant_part();
            lp.rows.push(LpRow {
                coeffs,
                lower: constraint.lower - constant,
                upper: constraint.upper - constant,
            });
        }

        let mut seed = if problem.seed.len() == n {
            problem.seed.clone()
        } else {
            vec![0.0; n]
        };
        clamp_vars(&mut seed, &problem.variables);
        for epigraph in &mut epigraphs {
            let a0 = epigraph.term.argument.evaluate(&seed);
            let a0 = if a0.is_finite() { a0 } else { 0.0 };
            let s = a0.abs().max(1.0);
            for c in [a0, s, -s] {
                add_cut(&mut lp, epigraph, c);
            }
        }

        let tolerance = self.options.tolerance;
        for iteration in 1..=self.options.max_iterations {
            let solution = solve_lp(&lp, &self.options.simplex);
            match solution.status {
                LpStatus::Optimal => {}
                LpStatus::Infeasible => {
                    return Ok(SolveOutcome::failed(SolveStatus::Infeasible, iteration))
                }
                LpStatus::Unbounded => {
                    return Ok(SolveOutcome::failed(SolveStatus::Unbounded, iteration))
                }
                LpStatus::IterationLimit => {
                    return Ok(SolveOutcome::failed(SolveStatus::IterationLimit, iteration))
                }
            }

            let mut values = solution.x[..n].to_vec();
            let mut converged = true;
            let mut progressed = false;
            for epigraph in &mut epigraphs {
                let a = epigraph.term.argument.evaluate(&values);
                let v = epigraph.term.value_at(a);
                let gap = v - solution.x[epigraph.column];
                if gap <= tolerance * v.abs().max(1.0) {
                    continue;
                }
                converged = false;
                // Iterate lies between the minimizer and every cut on its side.
                let inside = epigraph
                    .cuts
                    .iter()
                    .filter(|c| **c != 0.0 && c.signum() == a.signum())
                    .all(|c| a.abs() < c.abs());
                progressed |= add_cut(&mut lp, epigraph, a);
                if inside {
                    for factor in REFINEMENT_FACTORS {
                        progressed |= add_cut(&mut lp, epigraph, a * factor);
                    }
                }
            }

            if converged || !progressed {
                if !converged {
                    log::debug!("outer approximation stalled at numerical precision");
                }
                log::debug!("outer approximation finished after {iteration} LP solves");
                clamp_vars(&mut values, &problem.variables);
                let objective = problem.objective.evaluate(&values);
                let max_violation = max_constraint_violation(&values, &problem.constraints);
                return Ok(SolveOutcome {
                    status: SolveStatus::Optimal,
                    iterations: iteration,
                    values,
                    objective,
                    max_constraint_violation: max_violation,
                });
            }
        }

        Ok(SolveOutcome::failed(
            SolveStatus::IterationLimit,
            self.options.max_iterations,
        ))
    }
}

/// Adds `τ >= w·g(c) + slope·(a(x) - c)` unless a cut at `c` already exists.
fn add_cut(lp: &mut LinearProgram, epigraph: &mut Epigraph<'_>, c: f64) -> bool {
    if !c.is_finite()
        || epigraph
            .cuts
            .iter()
            .any(|e| (e - c).abs() <= 1e-12 * c.abs().max(1.0))
    {
        return false;
    }
    let term = epigraph.term;
    let slope = term.slope_at(c);
    let mut coeffs = linear_coeffs(&term.argument, -slope);
    coeffs.push((epigraph.column, 1.0));
    lp.rows.push(LpRow {
        coeffs,
        lower: term.value_at(c) + slope * (term.argument.constant_part() - c),
        upper: f64::INFINITY,
    });
    epigraph.cuts.push(c);
    true
}

fn linear_coeffs(expr: &LinearExpr, factor: f64) -> Vec<(usize, f64)> {
    expr.terms()
        .filter(|(_, c)| *c != 0.0)
        .map(|(id, c)| (id.0, factor * c))
        .collect()
}

fn check_problem(problem: &SolverProblem) -> Result<(), SolverError> {
    let n = problem.variables.len();
    let check_expr = |expr: &LinearExpr, what: &str| -> Result<(), SolverError> {
        match expr.max_var() {
            Some(id) if id.0 >= n => Err(SolverError::new(format!(
                "{what} references {id} but the problem has {n} variables"
            ))),
            _ => Ok(()),
        }
    };
    let check_function = |f: &Function, what: &str| -> Result<(), SolverError> {
        check_expr(&f.linear, what)?;
        for term in &f.powers {
            check_expr(&term.argument, what)?;
            if term.order < 2 {
                return Err(SolverError::new(format!(
                    "{what} has a power term of order {}",
                    term.order
                )));
            }
            if !(term.weight.is_finite() && term.weight >= 0.0) {
                return Err(SolverError::new(format!(
                    "{what} has a power term with weight {}; only convex terms are supported",
                    term.weight
                )));
            }
        }
        Ok(())
    };

    check_function(&problem.objective, "objective")?;
    for (idx, constraint) in problem.constraints.iter().enumerate() {
        let what = format!("constraint {idx}");
        check_function(&constraint.function, &what)?;
        if !constraint.function.is_linear() && constraint.lower.is_finite() {
            return Err(SolverError::new(format!(
                "{what} bounds a power sum from below; only upper bounds are convex"
            )));
        }
    }
    Ok(())
}
