use goalprog_model::{LinearExpr, ModelError, VarId};

use super::builder::{goal_expressions, GoalRef};
use super::layout::{alias_name, epsilon_name};
use super::pipeline::AssemblyContext;
use super::{GoalError, GoalResult};
use crate::solver::{Constraint, Function};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ContributionKind {
    /// `weight · ε^order`, summed over steps for path goals.
    Violation,
    /// `weight · α`, the linear stand-in for `Violation`.
    ViolationAlias,
    /// `weight · |f/nominal|^order` (signed for order 1), summed over components.
    Minimization,
    /// `ε^order - α <= 0`; contributes constraints only.
    AliasBound,
}

/// A goal's share of a priority's objective, resolved against the model at assembly time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Contribution {
    pub kind: ContributionKind,
    pub goal: GoalRef,
    pub subproblem: usize,
    pub slot: usize,
}

impl Contribution {
    pub fn epsilon(&self) -> String {
        epsilon_name(self.goal.path, self.subproblem, self.slot)
    }

    pub fn alias(&self) -> String {
        alias_name(self.goal.path, self.subproblem, self.slot)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Resolved {
    pub objective: Function,
    pub constraints: Vec<Constraint>,
}

/// Objective terms or constraints of one contribution for one ensemble member.
pub(crate) fn resolve(
    contribution: &Contribution,
    cx: &AssemblyContext<'_>,
    member: usize,
) -> GoalResult<Resolved> {
    let goal = cx.goal(contribution.goal);
    let mut out = Resolved::default();
    match contribution.kind {
        ContributionKind::Violation => {
            for eps in extra_ids(cx, &contribution.epsilon(), member)? {
                out.objective
                    .add_power(goal.weight(), LinearExpr::variable(eps), goal.order());
            }
        }
        ContributionKind::ViolationAlias => {
            for alias in extra_ids(cx, &contribution.alias(), member)? {
                out.objective
                    .add_power(goal.weight(), LinearExpr::variable(alias), 1);
            }
        }
        ContributionKind::Minimization => {
            let exprs = goal_expressions(cx.model, goal, contribution.goal.path, member)?;
            for f in exprs.iter().flatten() {
                out.objective
                    .add_power(goal.weight(), f.scaled(1.0 / goal.nominal()), goal.order());
            }
        }
        ContributionKind::AliasBound => {
            let eps = extra_ids(cx, &contribution.epsilon(), member)?;
            let alias = extra_ids(cx, &contribution.alias(), member)?;
            for (e, a) in eps.into_iter().zip(alias) {
                let mut f = Function::power(1.0, LinearExpr::variable(e), goal.order());
                f.linear.add_term(a, -1.0);
                out.constraints
                    .push(Constraint::new(f, f64::NEG_INFINITY, 0.0));
            }
        }
    }
    Ok(out)
}

fn extra_ids(cx: &AssemblyContext<'_>, name: &str, member: usize) -> GoalResult<Vec<VarId>> {
    let ids = cx.layout.ids(name, member);
    if ids.is_empty() {
        return Err(GoalError::Model(ModelError::UnknownVariable(name.to_string())));
    }
    Ok(ids)
}

/// Objective of one priority: point terms and path-summed violations in `objectives`, per-step
/// minimization of path goals in `path_objectives`, each with its own scale.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ObjectiveSet {
    pub objectives: Vec<Contribution>,
    pub path_objectives: Vec<Contribution>,
    pub objective_scale: f64,
    pub path_scale: f64,
}

impl Default for ObjectiveSet {
    fn default() -> Self {
        Self {
            objectives: Vec::new(),
            path_objectives: Vec::new(),
            objective_scale: 1.0,
            path_scale: 1.0,
        }
    }
}

impl ObjectiveSet {
    /// Divides by the number of terms, and path terms also by the number of time steps.
    pub fn scale_by_problem_size(&mut self, steps: usize) {
        let n = (self.objectives.len() + self.path_objectives.len()) as f64;
        if n > 0.0 {
            self.objective_scale = 1.0 / n;
            self.path_scale = 1.0 / (n * steps.max(1) as f64);
        }
    }

    pub fn objective(&self, cx: &AssemblyContext<'_>, member: usize) -> GoalResult<Function> {
        sum(&self.objectives, self.objective_scale, cx, member)
    }

    pub fn path_objective(&self, cx: &AssemblyContext<'_>, member: usize) -> GoalResult<Function> {
        sum(&self.path_objectives, self.path_scale, cx, member)
    }

    /// Probability-weighted sum over ensemble members of both objective parts.
    pub fn total(&self, cx: &AssemblyContext<'_>) -> GoalResult<Function> {
        let mut total = Function::zero();
        for member in 0..cx.model.ensemble_size() {
            let p = cx.model.ensemble_member_probability(member);
            total.add_scaled(&self.objective(cx, member)?, p);
            total.add_scaled(&self.path_objective(cx, member)?, p);
        }
        Ok(total)
    }
}

fn sum(
    contributions: &[Contribution],
    scale: f64,
    cx: &AssemblyContext<'_>,
    member: usize,
) -> GoalResult<Function> {
    let mut out = Function::zero();
    for contribution in contributions {
        out.add_scaled(&resolve(contribution, cx, member)?.objective, scale);
    }
    Ok(out)
}

/// Retention-mode cap on an earlier priority's objective.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ParetoBound {
    pub objective: ObjectiveSet,
    pub value: f64,
}

impl ParetoBound {
    pub fn constraint(&self, cx: &AssemblyContext<'_>) -> GoalResult<Constraint> {
        let total = self.objective.total(cx)?;
        let options = cx.options;
        Ok(if options.fix_minimized_values {
            Constraint::new(total, self.value, self.value)
        } else {
            Constraint::new(
                total,
                f64::NEG_INFINITY,
                self.value + options.constraint_relaxation,
            )
        })
    }
}
