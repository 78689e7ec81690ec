use std::collections::BTreeMap;

use goalprog_model::{ModelView, VarId};
use indexmap::IndexMap;
use log::{debug, info, warn};

use super::builder::{freeze_bounded, freeze_minimized, symbolic_constraints, GoalRef};
use super::contribution::{Contribution, ContributionKind, ObjectiveSet, ParetoBound};
use super::diagnostics::{record_goal, DiagnosticChannels};
use super::goal::Goal;
use super::layout::{alias_name, epsilon_name, ExtraKind, VariableLayout};
use super::pipeline::{
    assemble, extras_results, goal_values, AssemblyContext, GoalStage, ModelStage, SeedSource,
};
use super::store::{ConstraintStore, ResultsCache, Solved};
use super::validate::{validate_goals, TargetArrays};
use super::{GoalProgrammingOptions, GoalResult};
use crate::solver::{OuterApproximationSolver, SolveBackend, SolveStatus};

/// Callbacks around a goal programming run. Every method defaults to doing nothing.
pub trait GoalProgrammingHooks {
    fn pre(&mut self) {}

    fn post(&mut self) {}

    fn priority_started(&mut self, _priority: i64) {}

    /// Called after each successful priority with the trajectories of every ensemble member.
    fn priority_completed(
        &mut self,
        _report: &PriorityReport,
        _results: &[IndexMap<String, Vec<f64>>],
    ) {
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl GoalProgrammingHooks for NoHooks {}

/// Whether [`GoalProgramming::optimize_with`] calls the `pre` and `post` hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub preprocessing: bool,
    pub postprocessing: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            preprocessing: true,
            postprocessing: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    SolvingPriority(i64),
    PriorityCompleted(i64),
    Finished,
    /// The solve at this priority failed; results of the previous priority are kept.
    Aborted(i64),
}

/// Outcome of one priority's solve.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorityReport {
    pub priority: i64,
    pub status: SolveStatus,
    pub iterations: usize,
    pub objective: f64,
    pub max_constraint_violation: f64,
    pub goals: usize,
    pub path_goals: usize,
}

struct Subproblem {
    priority: i64,
    goals: Vec<usize>,
    path_goals: Vec<usize>,
}

/// Non-empty goals grouped by priority, ascending.
fn subproblems(goals: &[Goal], path_goals: &[Goal]) -> Vec<Subproblem> {
    let mut groups: BTreeMap<i64, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (i, goal) in goals.iter().enumerate() {
        if !goal.is_empty() {
            groups.entry(goal.priority()).or_default().0.push(i);
        }
    }
    for (i, goal) in path_goals.iter().enumerate() {
        if !goal.is_empty() {
            groups.entry(goal.priority()).or_default().1.push(i);
        }
    }
    groups
        .into_iter()
        .map(|(priority, (goals, path_goals))| Subproblem {
            priority,
            goals,
            path_goals,
        })
        .collect()
}

/// One kind of goal with its resolved function keys.
#[derive(Clone, Copy)]
struct GoalSet<'a> {
    goals: &'a [Goal],
    keys: &'a [String],
    path: bool,
}

impl GoalSet<'_> {
    fn goal_ref(&self, index: usize) -> GoalRef {
        GoalRef {
            path: self.path,
            index,
        }
    }

    fn extra_kind(&self) -> ExtraKind {
        if self.path {
            ExtraKind::Path
        } else {
            ExtraKind::Scalar
        }
    }
}

/// What one priority adds to the objective.
#[derive(Default)]
struct PriorityObjective {
    objective: ObjectiveSet,
    /// Extras declared by this priority.
    current: Vec<String>,
}

/// Mutable state of one run across priorities.
struct RunState {
    store: ConstraintStore,
    layout: VariableLayout,
    pareto: Vec<ParetoBound>,
    aliases: Vec<Contribution>,
}

impl RunState {
    fn new(model: &dyn ModelView) -> Self {
        Self {
            store: ConstraintStore::new(model.ensemble_size()),
            layout: fresh_layout(model),
            pareto: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Declares epsilons, objective terms and constraint records of one priority's goals.
    fn register(
        &mut self,
        model: &dyn ModelView,
        set: GoalSet<'_>,
        indices: &[usize],
        subproblem: usize,
        options: &GoalProgrammingOptions,
        out: &mut PriorityObjective,
    ) -> GoalResult<()> {
        for (slot, &index) in indices.iter().enumerate() {
            let goal = &set.goals[index];
            let key = set.keys[index].as_str();
            let goal_ref = set.goal_ref(index);
            let contribution = |kind| Contribution {
                kind,
                goal: goal_ref,
                subproblem,
                slot,
            };

            if !goal.has_target_bounds() {
                let minimization = contribution(ContributionKind::Minimization);
                if set.path {
                    out.objective.path_objectives.push(minimization);
                } else {
                    out.objective.objectives.push(minimization);
                }
                continue;
            }

            let arrays = TargetArrays::new(goal, model.times(), set.path);
            if goal.critical() {
                let zeros = vec![0.0; arrays.steps];
                for member in 0..model.ensemble_size() {
                    let record = freeze_bounded(
                        goal,
                        goal_ref,
                        key,
                        &arrays,
                        &zeros,
                        None,
                        self.store.list(set.path, member, key),
                        options,
                    )?;
                    self.store.insert_frozen(set.path, member, key, record);
                }
                continue;
            }

            let epsilon = epsilon_name(set.path, subproblem, slot);
            self.layout.declare(epsilon.clone(), set.extra_kind());
            out.current.push(epsilon.clone());
            if options.linear_obj_eps && goal.order() != 1 {
                let alias = alias_name(set.path, subproblem, slot);
                self.layout.declare(alias.clone(), set.extra_kind());
                out.current.push(alias);
                out.objective
                    .objectives
                    .push(contribution(ContributionKind::ViolationAlias));
                self.aliases.push(contribution(ContributionKind::AliasBound));
            } else {
                out.objective
                    .objectives
                    .push(contribution(ContributionKind::Violation));
            }

            for member in 0..model.ensemble_size() {
                for record in symbolic_constraints(goal, goal_ref, &arrays, &epsilon) {
                    self.store.push_symbolic(set.path, member, key, record);
                }
            }
        }
        Ok(())
    }

    /// Replaces the symbolic records of one priority's goals by frozen bounds.
    fn freeze(
        &mut self,
        cx: &AssemblyContext<'_>,
        set: GoalSet<'_>,
        indices: &[usize],
        subproblem: usize,
        values: &[f64],
    ) -> GoalResult<()> {
        let options = cx.options;
        for (slot, &index) in indices.iter().enumerate() {
            let goal = &set.goals[index];
            if goal.critical() {
                continue;
            }
            let key = set.keys[index].as_str();
            let goal_ref = set.goal_ref(index);
            for member in 0..cx.model.ensemble_size() {
                let function_values = goal_values(cx, goal_ref, member, values)?;
                let record = if goal.has_target_bounds() {
                    let arrays = TargetArrays::new(goal, cx.model.times(), set.path);
                    let epsilon = epsilon_values(
                        cx.layout,
                        &epsilon_name(set.path, subproblem, slot),
                        member,
                        values,
                        options.constraint_relaxation,
                    );
                    freeze_bounded(
                        goal,
                        goal_ref,
                        key,
                        &arrays,
                        &epsilon,
                        Some(&function_values),
                        self.store.list(set.path, member, key),
                        options,
                    )?
                } else {
                    freeze_minimized(goal, goal_ref, &function_values, options)
                };
                self.store.insert_frozen(set.path, member, key, record);
            }
        }
        Ok(())
    }
}

fn fresh_layout(model: &dyn ModelView) -> VariableLayout {
    VariableLayout::new(
        model.num_variables(),
        model.ensemble_size(),
        model.times().len(),
    )
}

fn epsilon_values(
    layout: &VariableLayout,
    name: &str,
    member: usize,
    values: &[f64],
    relaxation: f64,
) -> Vec<f64> {
    layout
        .ids(name, member)
        .into_iter()
        .map(|VarId(i)| values.get(i).copied().unwrap_or(0.0) + relaxation)
        .collect()
}

/// Writes diagnostic channels of one priority's goals.
fn record_diagnostics(
    channels: &mut DiagnosticChannels,
    cx: &AssemblyContext<'_>,
    set: GoalSet<'_>,
    indices: &[usize],
    subproblem: usize,
    values: &[f64],
) -> GoalResult<()> {
    let steps = cx.model.times().len();
    for (slot, &index) in indices.iter().enumerate() {
        let goal = &set.goals[index];
        if goal.critical()
            || (goal.function_value_timeseries_id().is_none()
                && goal.violation_timeseries_id().is_none())
        {
            continue;
        }
        let arrays = TargetArrays::new(goal, cx.model.times(), set.path);
        for member in 0..cx.model.ensemble_size() {
            let function_values = goal_values(cx, set.goal_ref(index), member, values)?;
            let epsilon = goal.has_target_bounds().then(|| {
                epsilon_values(
                    cx.layout,
                    &epsilon_name(set.path, subproblem, slot),
                    member,
                    values,
                    0.0,
                )
            });
            record_goal(
                channels,
                goal,
                &arrays,
                member,
                steps,
                &function_values,
                epsilon.as_deref(),
                cx.options,
            );
        }
    }
    Ok(())
}

/// Lexicographic goal programming over a [`ModelView`].
///
/// Goals are solved in ascending priority. After each priority, the achieved goal values are
/// frozen into constraints for the following ones, or, with `keep_eps_variable`, the epsilons
/// stay free behind a cap on the earlier objective. The last successful results stay available
/// through [`results`](Self::results) even when a later priority fails.
pub struct GoalProgramming<M, B = OuterApproximationSolver> {
    model: M,
    backend: B,
    options: GoalProgrammingOptions,
    goals: Vec<Goal>,
    goal_keys: Vec<String>,
    path_goals: Vec<Goal>,
    path_goal_keys: Vec<String>,
    next_key: usize,
    state: SessionState,
    cache: ResultsCache,
    reports: Vec<PriorityReport>,
    diagnostics: DiagnosticChannels,
}

impl<M: ModelView> GoalProgramming<M> {
    pub fn new(model: M) -> Self {
        Self::with_backend(model, OuterApproximationSolver::default())
    }
}

impl<M: ModelView, B: SolveBackend> GoalProgramming<M, B> {
    pub fn with_backend(model: M, backend: B) -> Self {
        Self {
            model,
            backend,
            options: GoalProgrammingOptions::default(),
            goals: Vec::new(),
            goal_keys: Vec::new(),
            path_goals: Vec::new(),
            path_goal_keys: Vec::new(),
            next_key: 0,
            state: SessionState::NotStarted,
            cache: ResultsCache::default(),
            reports: Vec::new(),
            diagnostics: DiagnosticChannels::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: GoalProgrammingOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_goals(mut self, goals: impl IntoIterator<Item = Goal>) -> Self {
        for goal in goals {
            self.add_goal(goal);
        }
        self
    }

    #[must_use]
    pub fn with_path_goals(mut self, goals: impl IntoIterator<Item = Goal>) -> Self {
        for goal in goals {
            self.add_path_goal(goal);
        }
        self
    }

    pub fn add_goal(&mut self, goal: Goal) {
        let key = self.function_key_for(&goal);
        self.goals.push(goal);
        self.goal_keys.push(key);
    }

    pub fn add_path_goal(&mut self, goal: Goal) {
        let key = self.function_key_for(&goal);
        self.path_goals.push(goal);
        self.path_goal_keys.push(key);
    }

    /// Explicit key, or `{name}_{n}` from a per-session counter so that goals without a key
    /// never share one.
    fn function_key_for(&mut self, goal: &Goal) -> String {
        match goal.function_key() {
            Some(key) => key.to_string(),
            None => {
                let key = format!("{}_{}", goal.name(), self.next_key);
                self.next_key += 1;
                key
            }
        }
    }

    pub fn set_options(&mut self, options: GoalProgrammingOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &GoalProgrammingOptions {
        &self.options
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn path_goals(&self) -> &[Goal] {
        &self.path_goals
    }

    /// Resolved function key of every point goal, in insertion order.
    pub fn goal_function_keys(&self) -> &[String] {
        &self.goal_keys
    }

    pub fn path_goal_function_keys(&self) -> &[String] {
        &self.path_goal_keys
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reports(&self) -> &[PriorityReport] {
        &self.reports
    }

    /// Objective value of every solved priority, in order.
    pub fn objective_values(&self) -> Vec<f64> {
        self.reports.iter().map(|r| r.objective).collect()
    }

    pub fn diagnostics(&self) -> &DiagnosticChannels {
        &self.diagnostics
    }

    /// Trajectories of the last successful priority for one ensemble member, including the
    /// epsilon variables of that priority.
    pub fn results(&self, member: usize) -> Option<&IndexMap<String, Vec<f64>>> {
        self.cache.solved().and_then(|s| s.results.get(member))
    }

    /// Raw decision vector of the last successful priority.
    pub fn solution(&self) -> Option<&[f64]> {
        self.cache.solved().map(|s| s.values.as_slice())
    }

    /// False while a priority is being solved or after a failed one.
    pub fn results_are_current(&self) -> bool {
        self.cache.is_current()
    }

    pub fn optimize(&mut self) -> GoalResult<bool> {
        self.optimize_with(&mut NoHooks, RunOptions::default())
    }

    /// Solves all priorities in order. Returns `Ok(false)` when a solve fails; validation and
    /// backend errors are returned as `Err`.
    pub fn optimize_with(
        &mut self,
        hooks: &mut dyn GoalProgrammingHooks,
        run: RunOptions,
    ) -> GoalResult<bool> {
        if run.preprocessing {
            hooks.pre();
        }

        let options = self.options.clone();
        options.validate()?;
        let times = self.model.times();
        validate_goals(&self.goals, &self.goal_keys, times, false, &options)?;
        validate_goals(&self.path_goals, &self.path_goal_keys, times, true, &options)?;

        let subproblems = subproblems(&self.goals, &self.path_goals);
        info!(
            "starting goal programming: {} priorities over {} goals and {} path goals",
            subproblems.len(),
            self.goals.len(),
            self.path_goals.len()
        );

        self.state = SessionState::NotStarted;
        self.cache.clear();
        self.reports.clear();
        self.diagnostics.clear();

        let mut run_state = RunState::new(&self.model);
        let mut success = false;

        for (i, sub) in subproblems.iter().enumerate() {
            let priority = sub.priority;
            info!("solving goals at priority {priority}");
            self.state = SessionState::SolvingPriority(priority);
            hooks.priority_started(priority);
            self.cache.invalidate();

            if !options.keep_eps_variable {
                run_state.layout = fresh_layout(&self.model);
            }
            let goal_set = GoalSet {
                goals: &self.goals,
                keys: &self.goal_keys,
                path: false,
            };
            let path_set = GoalSet {
                goals: &self.path_goals,
                keys: &self.path_goal_keys,
                path: true,
            };

            let mut added = PriorityObjective::default();
            run_state.register(&self.model, goal_set, &sub.goals, i, &options, &mut added)?;
            run_state.register(&self.model, path_set, &sub.path_goals, i, &options, &mut added)?;
            if options.scale_by_problem_size {
                added.objective.scale_by_problem_size(self.model.times().len());
            }

            let layout = run_state.layout.clone();
            let cx = AssemblyContext {
                model: &self.model,
                goals: &self.goals,
                path_goals: &self.path_goals,
                layout: &layout,
                options: &options,
            };
            let problem = {
                let stage = GoalStage {
                    store: &run_state.store,
                    objective: &added.objective,
                    pareto: &run_state.pareto,
                    aliases: &run_state.aliases,
                    seed: match self.cache.solved() {
                        Some(previous) => SeedSource::Previous(previous),
                        None => SeedSource::Model,
                    },
                    current: &added.current,
                };
                assemble(&[&ModelStage, &stage], &cx)?
            };
            debug!(
                "priority {priority}: {} variables, {} constraints",
                problem.variables.len(),
                problem.constraints.len()
            );

            let outcome = self.backend.solve(&problem)?;
            if !outcome.status.is_success() {
                warn!(
                    "solver failed at priority {priority} with status {:?}",
                    outcome.status
                );
                self.state = SessionState::Aborted(priority);
                success = false;
                break;
            }
            success = true;

            let mut results = Vec::with_capacity(self.model.ensemble_size());
            for member in 0..self.model.ensemble_size() {
                let mut trajectories = self.model.extract_results(&outcome.values, member)?;
                trajectories.extend(extras_results(&layout, &outcome.values, member));
                results.push(trajectories);
            }
            let report = PriorityReport {
                priority,
                status: outcome.status,
                iterations: outcome.iterations,
                objective: outcome.objective,
                max_constraint_violation: outcome.max_constraint_violation,
                goals: sub.goals.len(),
                path_goals: sub.path_goals.len(),
            };
            info!(
                "priority {priority} solved: objective {} after {} iterations",
                report.objective, report.iterations
            );
            self.reports.push(report.clone());
            hooks.priority_completed(&report, &results);
            self.cache.store(Solved {
                values: outcome.values.clone(),
                layout: layout.clone(),
                results,
            });
            self.state = SessionState::PriorityCompleted(priority);

            for (set, indices) in [(goal_set, &sub.goals), (path_set, &sub.path_goals)] {
                record_diagnostics(
                    &mut self.diagnostics,
                    &cx,
                    set,
                    indices,
                    i,
                    &outcome.values,
                )?;
            }

            if options.keep_eps_variable {
                let value = added.objective.total(&cx)?.evaluate(&outcome.values);
                run_state.pareto.push(ParetoBound {
                    objective: added.objective,
                    value,
                });
            } else {
                run_state.freeze(&cx, goal_set, &sub.goals, i, &outcome.values)?;
                run_state.freeze(&cx, path_set, &sub.path_goals, i, &outcome.values)?;
            }
        }

        if !matches!(self.state, SessionState::Aborted(_)) {
            self.state = SessionState::Finished;
        }
        info!("done goal programming");

        if run.postprocessing {
            hooks.post();
        }
        Ok(success)
    }
}
