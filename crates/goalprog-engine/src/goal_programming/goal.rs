use std::fmt;
use std::sync::Arc;

use goalprog_model::{LinearExpr, ModelError, ModelResult, ModelView, Timeseries};

use super::{GoalError, GoalResult};

/// Desired lower or upper value of a goal function.
///
/// `Value(NaN)` (the default) means no target. `Components` gives one entry per component of a
/// vector goal; non-finite entries leave that component untargeted. `Series` is only valid on path
/// goals and is resampled onto the model's time grid.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Value(f64),
    Components(Vec<f64>),
    Series(Timeseries),
}

impl Default for Target {
    fn default() -> Self {
        Target::Value(f64::NAN)
    }
}

impl From<f64> for Target {
    fn from(value: f64) -> Self {
        Target::Value(value)
    }
}

impl From<Vec<f64>> for Target {
    fn from(values: Vec<f64>) -> Self {
        Target::Components(values)
    }
}

impl From<Timeseries> for Target {
    fn from(series: Timeseries) -> Self {
        Target::Series(series)
    }
}

impl Target {
    /// A series counts as set even when every sample is NaN.
    pub fn is_set(&self) -> bool {
        match self {
            Target::Value(v) => v.is_finite(),
            Target::Components(values) => values.iter().any(|v| v.is_finite()),
            Target::Series(_) => true,
        }
    }

    pub fn has_finite_values(&self) -> bool {
        match self {
            Target::Value(v) => v.is_finite(),
            Target::Components(values) => values.iter().any(|v| v.is_finite()),
            Target::Series(series) => !series.has_no_finite_values(),
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, Target::Series(_))
    }

    /// Element `step · size + component` for every step and component. Samples outside a series'
    /// domain take `outside`: `-inf` for a minimum, `+inf` for a maximum.
    pub(crate) fn expand(
        &self,
        times: &[f64],
        steps: usize,
        size: usize,
        outside: f64,
    ) -> Vec<f64> {
        let mut out = Vec::with_capacity(steps * size);
        match self {
            Target::Value(v) => out.resize(steps * size, *v),
            Target::Components(values) => {
                for _ in 0..steps {
                    for c in 0..size {
                        out.push(values.get(c).copied().unwrap_or(f64::NAN));
                    }
                }
            }
            Target::Series(series) => {
                let sampled = series.resample(times, outside, outside);
                for step in 0..steps {
                    let v = sampled.get(step).copied().unwrap_or(outside);
                    for _ in 0..size {
                        out.push(v);
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Value(v) => write!(f, "{v}"),
            Target::Components(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Target::Series(series) => write!(f, "Timeseries({} samples)", series.len()),
        }
    }
}

/// Range the goal function can take, per component. Single-entry vectors broadcast.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionRange {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl FunctionRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: vec![lower],
            upper: vec![upper],
        }
    }

    pub fn components(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn lower(&self, component: usize) -> f64 {
        broadcast(&self.lower, component)
    }

    pub fn upper(&self, component: usize) -> f64 {
        broadcast(&self.upper, component)
    }

    pub(crate) fn lengths(&self) -> (usize, usize) {
        (self.lower.len(), self.upper.len())
    }
}

fn broadcast(values: &[f64], component: usize) -> f64 {
    match values {
        [single] => *single,
        _ => values.get(component).copied().unwrap_or(f64::NAN),
    }
}

impl fmt::Display for FunctionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower.as_slice(), self.upper.as_slice()) {
            ([lo], [hi]) => write!(f, "({lo}, {hi})"),
            (lo, hi) => write!(f, "({lo:?}, {hi:?})"),
        }
    }
}

/// Value of a goal function: one affine expression per component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GoalValue(pub Vec<LinearExpr>);

impl From<LinearExpr> for GoalValue {
    fn from(expr: LinearExpr) -> Self {
        GoalValue(vec![expr])
    }
}

impl From<Vec<LinearExpr>> for GoalValue {
    fn from(exprs: Vec<LinearExpr>) -> Self {
        GoalValue(exprs)
    }
}

/// Model access handed to goal functions.
///
/// Point goals see the whole horizon; path goals are evaluated once per time step and can read
/// the current step through [`state`](Self::state).
#[derive(Clone, Copy)]
pub struct FunctionContext<'a> {
    model: &'a dyn ModelView,
    member: usize,
    step: Option<usize>,
}

impl<'a> FunctionContext<'a> {
    pub fn point(model: &'a dyn ModelView, member: usize) -> Self {
        Self {
            model,
            member,
            step: None,
        }
    }

    pub fn path(model: &'a dyn ModelView, member: usize, step: usize) -> Self {
        Self {
            model,
            member,
            step: Some(step),
        }
    }

    pub fn model(&self) -> &'a dyn ModelView {
        self.model
    }

    pub fn ensemble_member(&self) -> usize {
        self.member
    }

    pub fn time_index(&self) -> Option<usize> {
        self.step
    }

    pub fn times(&self) -> &'a [f64] {
        self.model.times()
    }

    /// Time of the current path step.
    pub fn time(&self) -> Option<f64> {
        self.step.and_then(|i| self.times().get(i).copied())
    }

    /// The quantity at the current path step.
    pub fn state(&self, name: &str) -> ModelResult<LinearExpr> {
        let step = self.step.ok_or(ModelError::NotInPathContext)?;
        let mut series = self.model.state_vector(name, self.member)?;
        if step >= series.len() {
            return Err(ModelError::LengthMismatch {
                what: "state vector",
                expected: step + 1,
                actual: series.len(),
            });
        }
        Ok(series.swap_remove(step))
    }

    pub fn state_at(&self, name: &str, t: f64) -> ModelResult<LinearExpr> {
        self.model.state_at(name, t, self.member)
    }

    pub fn state_vector(&self, name: &str) -> ModelResult<Vec<LinearExpr>> {
        self.model.state_vector(name, self.member)
    }

    pub fn integral(&self, name: &str, t0: f64, t1: f64) -> ModelResult<LinearExpr> {
        self.model.integral(name, t0, t1, self.member)
    }
}

/// Goal function. Implemented for every `Fn(&FunctionContext) -> ModelResult<GoalValue>`.
pub trait GoalFunction: Send + Sync {
    fn evaluate(&self, cx: &FunctionContext<'_>) -> ModelResult<GoalValue>;
}

impl<F> GoalFunction for F
where
    F: Fn(&FunctionContext<'_>) -> ModelResult<GoalValue> + Send + Sync,
{
    fn evaluate(&self, cx: &FunctionContext<'_>) -> ModelResult<GoalValue> {
        self(cx)
    }
}

/// An optimization goal.
///
/// With neither target set the goal minimizes `weight · (f/nominal)^order`. With at least one
/// target it becomes an epsilon-constraint goal on the normalized function, which needs a finite
/// [`FunctionRange`]. Goals sharing a function key are treated as the same quantity when results
/// of earlier priorities are frozen.
#[derive(Clone)]
pub struct Goal {
    name: String,
    function: Arc<dyn GoalFunction>,
    size: usize,
    function_range: Option<FunctionRange>,
    nominal: f64,
    target_min: Target,
    target_max: Target,
    priority: i64,
    weight: f64,
    order: u32,
    critical: bool,
    relaxation: f64,
    function_key: Option<String>,
    function_value_timeseries_id: Option<String>,
    violation_timeseries_id: Option<String>,
}

impl Goal {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&FunctionContext<'_>) -> ModelResult<GoalValue> + Send + Sync + 'static,
    {
        Self::from_function(name, Arc::new(function))
    }

    pub fn from_function(name: impl Into<String>, function: Arc<dyn GoalFunction>) -> Self {
        Self {
            name: name.into(),
            function,
            size: 1,
            function_range: None,
            nominal: 1.0,
            target_min: Target::default(),
            target_max: Target::default(),
            priority: 1,
            weight: 1.0,
            order: 2,
            critical: false,
            relaxation: 0.0,
            function_key: None,
            function_value_timeseries_id: None,
            violation_timeseries_id: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_function_range(mut self, lower: f64, upper: f64) -> Self {
        self.function_range = Some(FunctionRange::new(lower, upper));
        self
    }

    #[must_use]
    pub fn with_range(mut self, range: FunctionRange) -> Self {
        self.function_range = Some(range);
        self
    }

    #[must_use]
    pub fn with_nominal(mut self, nominal: f64) -> Self {
        self.nominal = nominal;
        self
    }

    #[must_use]
    pub fn with_target_min(mut self, target: impl Into<Target>) -> Self {
        self.target_min = target.into();
        self
    }

    #[must_use]
    pub fn with_target_max(mut self, target: impl Into<Target>) -> Self {
        self.target_max = target.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    #[must_use]
    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    #[must_use]
    pub fn with_function_key(mut self, key: impl Into<String>) -> Self {
        self.function_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_function_value_timeseries_id(mut self, id: impl Into<String>) -> Self {
        self.function_value_timeseries_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_violation_timeseries_id(mut self, id: impl Into<String>) -> Self {
        self.violation_timeseries_id = Some(id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn function_range(&self) -> Option<&FunctionRange> {
        self.function_range.as_ref()
    }

    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    pub fn target_min(&self) -> &Target {
        &self.target_min
    }

    pub fn target_max(&self) -> &Target {
        &self.target_max
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn critical(&self) -> bool {
        self.critical
    }

    pub fn relaxation(&self) -> f64 {
        self.relaxation
    }

    /// Explicit function key, if one was given.
    pub fn function_key(&self) -> Option<&str> {
        self.function_key.as_deref()
    }

    pub fn function_value_timeseries_id(&self) -> Option<&str> {
        self.function_value_timeseries_id.as_deref()
    }

    pub fn violation_timeseries_id(&self) -> Option<&str> {
        self.violation_timeseries_id.as_deref()
    }

    pub fn has_target_min(&self) -> bool {
        self.target_min.is_set()
    }

    pub fn has_target_max(&self) -> bool {
        self.target_max.is_set()
    }

    pub fn has_target_bounds(&self) -> bool {
        self.has_target_min() || self.has_target_max()
    }

    /// Series-targeted goal without a single finite target value. Skipped entirely.
    pub fn is_empty(&self) -> bool {
        (self.target_min.is_series() || self.target_max.is_series())
            && !self.target_min.has_finite_values()
            && !self.target_max.has_finite_values()
    }

    /// Evaluates the goal function and checks its size.
    pub fn evaluate(&self, cx: &FunctionContext<'_>) -> GoalResult<Vec<LinearExpr>> {
        let GoalValue(exprs) = self.function.evaluate(cx)?;
        if exprs.len() != self.size {
            return Err(GoalError::SizeMismatch {
                goal: self.to_string(),
                what: "function value",
                expected: self.size,
                actual: exprs.len(),
            });
        }
        Ok(exprs)
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Goal({}, priority={}, target_min={}, target_max={}, function_range=",
            self.name, self.priority, self.target_min, self.target_max
        )?;
        match &self.function_range {
            Some(range) => write!(f, "{range})"),
            None => write!(f, "None)"),
        }
    }
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Goal")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("function_range", &self.function_range)
            .field("nominal", &self.nominal)
            .field("target_min", &self.target_min)
            .field("target_max", &self.target_max)
            .field("priority", &self.priority)
            .field("weight", &self.weight)
            .field("order", &self.order)
            .field("critical", &self.critical)
            .field("relaxation", &self.relaxation)
            .field("function_key", &self.function_key)
            .finish_non_exhaustive()
    }
}

/// Path goal on a single model state.
///
/// The function range and nominal come from the model's bounds and nominal for the state, and
/// the state name is the function key, so all goals on one state share their frozen bounds.
#[derive(Clone, Debug)]
pub struct StateGoal {
    state: String,
    target_min: Target,
    target_max: Target,
    priority: i64,
    weight: f64,
    order: u32,
    critical: bool,
    relaxation: f64,
    function_value_timeseries_id: Option<String>,
    violation_timeseries_id: Option<String>,
}

impl StateGoal {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            target_min: Target::default(),
            target_max: Target::default(),
            priority: 1,
            weight: 1.0,
            order: 2,
            critical: false,
            relaxation: 0.0,
            function_value_timeseries_id: None,
            violation_timeseries_id: None,
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    #[must_use]
    pub fn with_target_min(mut self, target: impl Into<Target>) -> Self {
        self.target_min = target.into();
        self
    }

    #[must_use]
    pub fn with_target_max(mut self, target: impl Into<Target>) -> Self {
        self.target_max = target.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    #[must_use]
    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    #[must_use]
    pub fn with_function_value_timeseries_id(mut self, id: impl Into<String>) -> Self {
        self.function_value_timeseries_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_violation_timeseries_id(mut self, id: impl Into<String>) -> Self {
        self.violation_timeseries_id = Some(id.into());
        self
    }

    /// Resolves range and nominal against `model` into a path [`Goal`].
    pub fn build(&self, model: &dyn ModelView) -> GoalResult<Goal> {
        let state = self.state.clone();
        let (lower, upper) = model
            .bounds(&state)
            .ok_or_else(|| GoalError::MissingStateBounds {
                state: state.clone(),
            })?;
        let targeted = self.target_min.is_set() || self.target_max.is_set();
        if targeted && !(lower.is_finite() && upper.is_finite()) {
            return Err(GoalError::MissingStateBounds { state });
        }

        let mut goal = Goal::new(self.state.clone(), move |cx: &FunctionContext<'_>| {
            cx.state(&state).map(GoalValue::from)
        })
        .with_nominal(model.nominal(&self.state))
        .with_target_min(self.target_min.clone())
        .with_target_max(self.target_max.clone())
        .with_priority(self.priority)
        .with_weight(self.weight)
        .with_order(self.order)
        .with_critical(self.critical)
        .with_relaxation(self.relaxation)
        .with_function_key(self.state.clone());
        if targeted {
            goal = goal.with_function_range(lower, upper);
        }
        goal.function_value_timeseries_id = self.function_value_timeseries_id.clone();
        goal.violation_timeseries_id = self.violation_timeseries_id.clone();
        Ok(goal)
    }
}
