//! Epsilon-constraint records for goals with targets, and their numeric freezing.
//!
//! A symbolic record ties one side of a goal to its epsilon variable:
//!
//! * lower: `(f - ε·(range_lo - m) - m) / nominal >= 0`
//! * upper: `(f - ε·(range_hi - M) - M) / nominal <= 0`
//!
//! After a priority is solved the record is replaced by a frozen one, plain bounds on
//! `f / nominal` derived from the achieved epsilon (or from the achieved value when the violation
//! was too large to be worth keeping, and for minimization goals).

use goalprog_model::{LinearExpr, ModelError, ModelView};

use super::goal::{FunctionContext, Goal};
use super::layout::VariableLayout;
use super::validate::TargetArrays;
use super::{GoalError, GoalProgrammingOptions, GoalResult};
use crate::solver::{Constraint, Function};

/// Index of a goal in the session's point or path goal list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct GoalRef {
    pub path: bool,
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Lower,
    Upper,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GoalConstraint {
    /// Violation constraint on one side, against the named epsilon.
    Symbolic {
        goal: GoalRef,
        epsilon: String,
        side: Side,
        /// Target per element; non-finite entries produce no row.
        targets: Vec<f64>,
    },
    /// Bounds on `f / nominal` per element, fixed by an earlier solve.
    Frozen {
        goal: GoalRef,
        min: Vec<f64>,
        max: Vec<f64>,
    },
}

impl GoalConstraint {
    pub fn goal(&self) -> GoalRef {
        match self {
            GoalConstraint::Symbolic { goal, .. } | GoalConstraint::Frozen { goal, .. } => *goal,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, GoalConstraint::Frozen { .. })
    }
}

/// One symbolic record per targeted side of `goal`.
pub(crate) fn symbolic_constraints(
    goal: &Goal,
    goal_ref: GoalRef,
    arrays: &TargetArrays,
    epsilon: &str,
) -> Vec<GoalConstraint> {
    let mut out = Vec::with_capacity(2);
    if goal.has_target_min() {
        out.push(GoalConstraint::Symbolic {
            goal: goal_ref,
            epsilon: epsilon.to_string(),
            side: Side::Lower,
            targets: arrays.min.clone(),
        });
    }
    if goal.has_target_max() {
        out.push(GoalConstraint::Symbolic {
            goal: goal_ref,
            epsilon: epsilon.to_string(),
            side: Side::Upper,
            targets: arrays.max.clone(),
        });
    }
    out
}

/// Goal function expressions, one row per step (a single row for point goals).
pub(crate) fn goal_expressions(
    model: &dyn ModelView,
    goal: &Goal,
    path: bool,
    member: usize,
) -> GoalResult<Vec<Vec<LinearExpr>>> {
    if path {
        (0..model.times().len())
            .map(|step| goal.evaluate(&FunctionContext::path(model, member, step)))
            .collect()
    } else {
        Ok(vec![goal.evaluate(&FunctionContext::point(model, member))?])
    }
}

/// Flattened values of `exprs` at `values`.
pub(crate) fn evaluate_expressions(exprs: &[Vec<LinearExpr>], values: &[f64]) -> Vec<f64> {
    exprs
        .iter()
        .flat_map(|row| row.iter().map(|e| e.evaluate(values)))
        .collect()
}

/// Solver rows of `record` for one ensemble member.
pub(crate) fn resolve_constraint(
    record: &GoalConstraint,
    goal: &Goal,
    exprs: &[Vec<LinearExpr>],
    layout: &VariableLayout,
    member: usize,
) -> GoalResult<Vec<Constraint>> {
    let nominal = goal.nominal();
    let size = goal.size();
    let mut out = Vec::new();
    match record {
        GoalConstraint::Symbolic {
            goal: goal_ref,
            epsilon,
            side,
            targets,
        } => {
            let Some(range) = goal.function_range() else {
                return Err(GoalError::MissingFunctionRange {
                    goal: goal.to_string(),
                });
            };
            for (step, row) in exprs.iter().enumerate() {
                for (c, f) in row.iter().enumerate() {
                    let target = targets[step * size + c];
                    if !target.is_finite() {
                        continue;
                    }
                    let eps = if goal_ref.path {
                        layout.path(epsilon, member, step)
                    } else {
                        layout.scalar(epsilon, member)
                    }
                    .ok_or_else(|| GoalError::Model(ModelError::UnknownVariable(epsilon.clone())))?;

                    let bound = match side {
                        Side::Lower => range.lower(c),
                        Side::Upper => range.upper(c),
                    };
                    let mut expr = f.scaled(1.0 / nominal);
                    expr.add_term(eps, -(bound - target) / nominal);
                    expr.add_constant(-target / nominal);
                    let (lower, upper) = match side {
                        Side::Lower => (0.0, f64::INFINITY),
                        Side::Upper => (f64::NEG_INFINITY, 0.0),
                    };
                    out.push(Constraint::new(Function::linear(expr), lower, upper));
                }
            }
        }
        GoalConstraint::Frozen { min, max, .. } => {
            for (step, row) in exprs.iter().enumerate() {
                for (c, f) in row.iter().enumerate() {
                    let k = step * size + c;
                    if !min[k].is_finite() && !max[k].is_finite() {
                        continue;
                    }
                    out.push(Constraint::new(
                        Function::linear(f.scaled(1.0 / nominal)),
                        min[k],
                        max[k],
                    ));
                }
            }
        }
    }
    Ok(out)
}

/// Frozen bounds for a goal with targets.
///
/// `epsilon` holds the achieved epsilon per step (already relaxed by the caller). Steps whose
/// epsilon exceeds the violation tolerance are pinned to `values` instead, and pinned steps are
/// left out of the intersection with `existing` frozen records on the same key. Without `values`
/// (critical goals before any solve) no step is pinned.
#[allow(clippy::too_many_arguments)]
pub(crate) fn freeze_bounded(
    goal: &Goal,
    goal_ref: GoalRef,
    key: &str,
    arrays: &TargetArrays,
    epsilon: &[f64],
    values: Option<&[f64]>,
    existing: &[GoalConstraint],
    options: &GoalProgrammingOptions,
) -> GoalResult<GoalConstraint> {
    let nominal = goal.nominal();
    let relaxation = goal.relaxation();
    let size = arrays.size;
    let n = arrays.len();
    let Some(range) = goal.function_range() else {
        return Err(GoalError::MissingFunctionRange {
            goal: goal.to_string(),
        });
    };

    let mut min = vec![f64::NEG_INFINITY; n];
    let mut max = vec![f64::INFINITY; n];
    let mut pinned = vec![false; arrays.steps];

    for step in 0..arrays.steps {
        if !arrays.step_targeted(step) {
            continue;
        }
        let eps = epsilon.get(step).copied().unwrap_or(0.0);
        let pin = values.filter(|_| eps > options.violation_tolerance);
        for c in 0..size {
            let k = step * size + c;
            if let Some(values) = pin {
                min[k] = (values[k] - relaxation) / nominal;
                max[k] = (values[k] + relaxation) / nominal;
                continue;
            }
            let (m, big_m) = (arrays.min[k], arrays.max[k]);
            if m.is_finite() {
                min[k] = (eps * (range.lower(c) - m) + m - relaxation) / nominal;
            }
            if big_m.is_finite() {
                max[k] = (eps * (range.upper(c) - big_m) + big_m + relaxation) / nominal;
            }
            if min[k].is_finite()
                && max[k].is_finite()
                && (min[k] - max[k]).abs() < options.equality_threshold
            {
                let mid = 0.5 * (min[k] + max[k]);
                min[k] = mid;
                max[k] = mid;
            }
        }
        pinned[step] = pin.is_some();
    }

    intersect(goal_ref, key, &mut min, &mut max, |k| pinned[k / size], existing)?;
    for (lo, hi) in min.iter_mut().zip(max.iter()) {
        *lo = lo.min(*hi);
    }
    Ok(GoalConstraint::Frozen {
        goal: goal_ref,
        min,
        max,
    })
}

/// Frozen bounds for a minimization goal: at most its achieved value plus relaxation, or exactly
/// the achieved value when `fix_minimized_values` is set and the relaxation is zero.
pub(crate) fn freeze_minimized(
    goal: &Goal,
    goal_ref: GoalRef,
    values: &[f64],
    options: &GoalProgrammingOptions,
) -> GoalConstraint {
    let nominal = goal.nominal();
    let relaxation = goal.relaxation();
    let exact = options.fix_minimized_values && relaxation == 0.0;
    let min = values
        .iter()
        .map(|v| if exact { v / nominal } else { f64::NEG_INFINITY })
        .collect();
    let max = values.iter().map(|v| (v + relaxation) / nominal).collect();
    GoalConstraint::Frozen {
        goal: goal_ref,
        min,
        max,
    }
}

/// Tightens `min`/`max` against frozen records of other goals on the same key, without letting
/// the interval invert against them.
fn intersect(
    goal_ref: GoalRef,
    key: &str,
    min: &mut [f64],
    max: &mut [f64],
    skip: impl Fn(usize) -> bool,
    existing: &[GoalConstraint],
) -> GoalResult<()> {
    for record in existing {
        let GoalConstraint::Frozen {
            goal,
            min: other_min,
            max: other_max,
        } = record
        else {
            continue;
        };
        if *goal == goal_ref {
            continue;
        }
        if other_min.len() != min.len() {
            return Err(GoalError::ShapeMismatch {
                key: key.to_string(),
            });
        }
        for k in 0..min.len() {
            if skip(k) {
                continue;
            }
            min[k] = min[k].max(other_min[k]);
            max[k] = max[k].min(other_max[k]);
            min[k] = min[k].min(other_max[k]);
            max[k] = max[k].max(other_min[k]);
        }
    }
    Ok(())
}
