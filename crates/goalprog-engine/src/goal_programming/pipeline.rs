//! Problem assembly as a chain of stages.
//!
//! Each stage receives the previous stage's bounds, constraints, objectives and seed and returns
//! them extended. The model stage starts the chain; the goal stage layers the goal programming
//! state of the current priority on top.

use goalprog_model::ModelView;

use super::builder::{evaluate_expressions, goal_expressions, resolve_constraint, GoalRef};
use super::contribution::{resolve, Contribution, ObjectiveSet, ParetoBound};
use super::goal::Goal;
use super::layout::VariableLayout;
use super::store::{ConstraintStore, Solved};
use super::{GoalProgrammingOptions, GoalResult};
use crate::solver::{Constraint, Function, SolverProblem, VarSpec};

/// Read-only view of the session shared by all stages.
#[derive(Clone, Copy)]
pub(crate) struct AssemblyContext<'a> {
    pub model: &'a dyn ModelView,
    pub goals: &'a [Goal],
    pub path_goals: &'a [Goal],
    pub layout: &'a VariableLayout,
    pub options: &'a GoalProgrammingOptions,
}

impl<'a> AssemblyContext<'a> {
    pub fn goal(&self, goal: GoalRef) -> &'a Goal {
        if goal.path {
            &self.path_goals[goal.index]
        } else {
            &self.goals[goal.index]
        }
    }
}

pub(crate) trait ProblemStage {
    fn bounds(&self, _cx: &AssemblyContext<'_>, bounds: Vec<VarSpec>) -> GoalResult<Vec<VarSpec>> {
        Ok(bounds)
    }

    fn constraints(
        &self,
        _cx: &AssemblyContext<'_>,
        constraints: Vec<Constraint>,
    ) -> GoalResult<Vec<Constraint>> {
        Ok(constraints)
    }

    fn path_constraints(
        &self,
        _cx: &AssemblyContext<'_>,
        constraints: Vec<Constraint>,
    ) -> GoalResult<Vec<Constraint>> {
        Ok(constraints)
    }

    fn objective(
        &self,
        _cx: &AssemblyContext<'_>,
        _member: usize,
        objective: Function,
    ) -> GoalResult<Function> {
        Ok(objective)
    }

    fn path_objective(
        &self,
        _cx: &AssemblyContext<'_>,
        _member: usize,
        objective: Function,
    ) -> GoalResult<Function> {
        Ok(objective)
    }

    fn seed(&self, _cx: &AssemblyContext<'_>, seed: Vec<f64>) -> GoalResult<Vec<f64>> {
        Ok(seed)
    }
}

/// Runs `stages` in order and combines member objectives with their probabilities.
pub(crate) fn assemble(
    stages: &[&dyn ProblemStage],
    cx: &AssemblyContext<'_>,
) -> GoalResult<SolverProblem> {
    let n = cx.layout.len();

    let mut variables = vec![VarSpec::free(); n];
    for stage in stages {
        variables = stage.bounds(cx, variables)?;
    }

    let mut constraints = Vec::new();
    for stage in stages {
        constraints = stage.constraints(cx, constraints)?;
    }
    for stage in stages {
        constraints = stage.path_constraints(cx, constraints)?;
    }

    let mut objective = Function::zero();
    for member in 0..cx.model.ensemble_size() {
        let mut member_objective = Function::zero();
        let mut member_path_objective = Function::zero();
        for stage in stages {
            member_objective = stage.objective(cx, member, member_objective)?;
            member_path_objective = stage.path_objective(cx, member, member_path_objective)?;
        }
        let p = cx.model.ensemble_member_probability(member);
        objective.add_scaled(&member_objective, p);
        objective.add_scaled(&member_path_objective, p);
    }

    let mut seed = vec![0.0; n];
    for stage in stages {
        seed = stage.seed(cx, seed)?;
    }

    Ok(SolverProblem {
        variables,
        objective,
        constraints,
        seed,
    })
}

/// Bounds, structural constraints and seed of the model itself.
pub(crate) struct ModelStage;

impl ProblemStage for ModelStage {
    fn bounds(&self, cx: &AssemblyContext<'_>, mut bounds: Vec<VarSpec>) -> GoalResult<Vec<VarSpec>> {
        for (spec, (lower, upper)) in bounds.iter_mut().zip(cx.model.variable_bounds()) {
            *spec = VarSpec::new(lower, upper);
        }
        Ok(bounds)
    }

    fn constraints(
        &self,
        cx: &AssemblyContext<'_>,
        mut constraints: Vec<Constraint>,
    ) -> GoalResult<Vec<Constraint>> {
        constraints.extend(cx.model.constraints().into_iter().map(Constraint::from));
        Ok(constraints)
    }

    fn seed(&self, cx: &AssemblyContext<'_>, mut seed: Vec<f64>) -> GoalResult<Vec<f64>> {
        for (slot, value) in seed.iter_mut().zip(cx.model.seed()) {
            *slot = value;
        }
        Ok(seed)
    }
}

/// Where the goal stage takes its starting point from.
#[derive(Clone, Copy)]
pub(crate) enum SeedSource<'s> {
    /// First priority: keep the model seed, extras at zero.
    Model,
    /// Later priorities: the previous priority's solution, matched by extra name.
    Previous(&'s Solved),
}

/// Goal programming state of one priority.
pub(crate) struct GoalStage<'s> {
    pub store: &'s ConstraintStore,
    pub objective: &'s ObjectiveSet,
    pub pareto: &'s [ParetoBound],
    pub aliases: &'s [Contribution],
    pub seed: SeedSource<'s>,
    /// Extras introduced by this priority, seeded at one.
    pub current: &'s [String],
}

impl GoalStage<'_> {
    fn store_constraints(
        &self,
        cx: &AssemblyContext<'_>,
        path: bool,
        constraints: &mut Vec<Constraint>,
    ) -> GoalResult<()> {
        for member in 0..cx.model.ensemble_size() {
            for record in self.store.records(path, member) {
                let goal = cx.goal(record.goal());
                let exprs = goal_expressions(cx.model, goal, path, member)?;
                constraints.extend(resolve_constraint(record, goal, &exprs, cx.layout, member)?);
            }
        }
        Ok(())
    }
}

impl ProblemStage for GoalStage<'_> {
    fn bounds(&self, cx: &AssemblyContext<'_>, mut bounds: Vec<VarSpec>) -> GoalResult<Vec<VarSpec>> {
        for member in 0..cx.model.ensemble_size() {
            for (name, _) in cx.layout.extras() {
                for id in cx.layout.ids(name, member) {
                    bounds[id.0] = VarSpec::new(0.0, 1.0);
                }
            }
        }
        Ok(bounds)
    }

    fn constraints(
        &self,
        cx: &AssemblyContext<'_>,
        mut constraints: Vec<Constraint>,
    ) -> GoalResult<Vec<Constraint>> {
        self.store_constraints(cx, false, &mut constraints)?;
        for bound in self.pareto {
            constraints.push(bound.constraint(cx)?);
        }
        for member in 0..cx.model.ensemble_size() {
            for alias in self.aliases {
                constraints.extend(resolve(alias, cx, member)?.constraints);
            }
        }
        Ok(constraints)
    }

    fn path_constraints(
        &self,
        cx: &AssemblyContext<'_>,
        mut constraints: Vec<Constraint>,
    ) -> GoalResult<Vec<Constraint>> {
        self.store_constraints(cx, true, &mut constraints)?;
        Ok(constraints)
    }

    fn objective(
        &self,
        cx: &AssemblyContext<'_>,
        member: usize,
        mut objective: Function,
    ) -> GoalResult<Function> {
        objective.add(&self.objective.objective(cx, member)?);
        Ok(objective)
    }

    fn path_objective(
        &self,
        cx: &AssemblyContext<'_>,
        member: usize,
        mut objective: Function,
    ) -> GoalResult<Function> {
        objective.add(&self.objective.path_objective(cx, member)?);
        Ok(objective)
    }

    fn seed(&self, cx: &AssemblyContext<'_>, mut seed: Vec<f64>) -> GoalResult<Vec<f64>> {
        let layout = cx.layout;
        if let SeedSource::Previous(previous) = self.seed {
            let model_len = layout.model_len().min(previous.values.len());
            seed[..model_len].copy_from_slice(&previous.values[..model_len]);
            for (name, _) in layout.extras() {
                for member in 0..cx.model.ensemble_size() {
                    let old = previous.layout.ids(name, member);
                    for (id, old_id) in layout.ids(name, member).into_iter().zip(old) {
                        if let Some(v) = previous.values.get(old_id.0) {
                            seed[id.0] = *v;
                        }
                    }
                }
            }
        }
        for name in self.current {
            for member in 0..cx.model.ensemble_size() {
                for id in layout.ids(name, member) {
                    seed[id.0] = 1.0;
                }
            }
        }
        Ok(seed)
    }
}

/// Values of the extras for one member, scalars as single-entry vectors.
pub(crate) fn extras_results(
    layout: &VariableLayout,
    values: &[f64],
    member: usize,
) -> Vec<(String, Vec<f64>)> {
    layout
        .extras()
        .map(|(name, _)| {
            let series = layout
                .ids(name, member)
                .into_iter()
                .map(|id| values.get(id.0).copied().unwrap_or(f64::NAN))
                .collect();
            (name.to_string(), series)
        })
        .collect()
}

/// Goal function values at a solution, flattened per step and component.
pub(crate) fn goal_values(
    cx: &AssemblyContext<'_>,
    goal: GoalRef,
    member: usize,
    values: &[f64],
) -> GoalResult<Vec<f64>> {
    let exprs = goal_expressions(cx.model, cx.goal(goal), goal.path, member)?;
    Ok(evaluate_expressions(&exprs, values))
}
