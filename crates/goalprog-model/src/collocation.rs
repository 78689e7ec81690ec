use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    LinearConstraint, LinearExpr, ModelError, ModelResult, ModelView, Timeseries, VarId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Differentiated quantity; its grid values are linked by a derivative equation.
    State,
    /// Free input chosen by the optimizer.
    Control,
    /// Quantity defined implicitly by algebraic equations.
    Algebraic,
}

#[derive(Clone, Debug)]
struct Variable {
    kind: VariableKind,
    lower: f64,
    upper: f64,
    nominal: f64,
}

/// A linear model equation. Terms refer to variables or constant inputs by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Equation {
    /// `der(state) = Σ coefficient · term + constant`
    Derivative {
        state: String,
        terms: Vec<(String, f64)>,
        constant: f64,
    },
    /// `Σ coefficient · term + constant = 0` at every time step.
    Algebraic {
        terms: Vec<(String, f64)>,
        constant: f64,
    },
}

/// One ensemble member: a probability and initial values overriding the model defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    #[serde(default = "unit_probability")]
    pub probability: f64,
    #[serde(default)]
    pub initial: IndexMap<String, f64>,
}

fn unit_probability() -> f64 {
    1.0
}

impl EnsembleMember {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            initial: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_initial(mut self, name: impl Into<String>, value: f64) -> Self {
        self.initial.insert(name.into(), value);
        self
    }
}

/// Linear DAE discretized on a fixed time grid with implicit Euler.
///
/// Decision variables are laid out member-major, then variable, then time step:
/// `member · (n_vars · n_times) + var · n_times + step`.
#[derive(Clone, Debug)]
pub struct CollocatedModel {
    times: Vec<f64>,
    variables: IndexMap<String, Variable>,
    inputs: IndexMap<String, Vec<f64>>,
    equations: Vec<Equation>,
    initial: IndexMap<String, f64>,
    members: Vec<EnsembleMember>,
}

impl CollocatedModel {
    pub fn builder(times: Vec<f64>) -> ModelBuilder {
        ModelBuilder::new(times)
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn variable_kind(&self, name: &str) -> Option<VariableKind> {
        self.variables.get(name).map(|v| v.kind)
    }

    /// Position of `name` at `step` for `member` in the decision vector.
    pub fn variable_id(&self, name: &str, member: usize, step: usize) -> ModelResult<VarId> {
        self.check_member(member)?;
        let index = self
            .variables
            .get_index_of(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))?;
        if step >= self.times.len() {
            return Err(ModelError::TimeOutOfRange {
                time: step as f64,
                start: 0.0,
                end: (self.times.len() - 1) as f64,
            });
        }
        Ok(self.id(member, index, step))
    }

    fn id(&self, member: usize, index: usize, step: usize) -> VarId {
        let n = self.times.len();
        VarId(member * self.variables.len() * n + index * n + step)
    }

    fn check_member(&self, member: usize) -> ModelResult<()> {
        if member >= self.members.len() {
            return Err(ModelError::EnsembleMemberOutOfRange {
                member,
                size: self.members.len(),
            });
        }
        Ok(())
    }

    fn initial_value(&self, name: &str, member: usize) -> Option<f64> {
        self.members
            .get(member)
            .and_then(|m| m.initial.get(name))
            .or_else(|| self.initial.get(name))
            .copied()
    }

    /// Expression for an equation term: a decision variable or a known input value.
    fn term(&self, name: &str, member: usize, step: usize) -> LinearExpr {
        if let Some(index) = self.variables.get_index_of(name) {
            LinearExpr::variable(self.id(member, index, step))
        } else {
            // Names are checked at build time, so anything else is an input.
            LinearExpr::constant(self.inputs.get(name).map_or(f64::NAN, |v| v[step]))
        }
    }

    fn weighted_sum(&self, terms: &[(String, f64)], member: usize, step: usize) -> LinearExpr {
        let mut out = LinearExpr::zero();
        for (name, coefficient) in terms {
            out.add_scaled(&self.term(name, member, step), *coefficient);
        }
        out
    }
}

impl ModelView for CollocatedModel {
    fn times(&self) -> &[f64] {
        &self.times
    }

    fn ensemble_size(&self) -> usize {
        self.members.len()
    }

    fn ensemble_member_probability(&self, member: usize) -> f64 {
        self.members.get(member).map_or(0.0, |m| m.probability)
    }

    fn bounds(&self, name: &str) -> Option<(f64, f64)> {
        self.variables.get(name).map(|v| (v.lower, v.upper))
    }

    fn nominal(&self, name: &str) -> f64 {
        self.variables.get(name).map_or(1.0, |v| v.nominal)
    }

    fn state_vector(&self, name: &str, member: usize) -> ModelResult<Vec<LinearExpr>> {
        self.check_member(member)?;
        if let Some(index) = self.variables.get_index_of(name) {
            return Ok((0..self.times.len())
                .map(|step| LinearExpr::variable(self.id(member, index, step)))
                .collect());
        }
        if let Some(values) = self.inputs.get(name) {
            return Ok(values.iter().map(|v| LinearExpr::constant(*v)).collect());
        }
        Err(ModelError::UnknownVariable(name.to_string()))
    }

    fn num_variables(&self) -> usize {
        self.members.len() * self.variables.len() * self.times.len()
    }

    fn variable_bounds(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(self.num_variables());
        for member in 0..self.members.len() {
            for (name, var) in &self.variables {
                for step in 0..self.times.len() {
                    match self.initial_value(name, member) {
                        Some(value) if step == 0 => out.push((value, value)),
                        _ => out.push((var.lower, var.upper)),
                    }
                }
            }
        }
        out
    }

    fn constraints(&self) -> Vec<LinearConstraint> {
        let n = self.times.len();
        let mut out = Vec::new();
        for member in 0..self.members.len() {
            for equation in &self.equations {
                match equation {
                    Equation::Derivative {
                        state,
                        terms,
                        constant,
                    } => {
                        for step in 1..n {
                            let dt = self.times[step] - self.times[step - 1];
                            let rhs = self.weighted_sum(terms, member, step) + *constant;
                            let expr = self.term(state, member, step)
                                - self.term(state, member, step - 1)
                                - rhs * dt;
                            out.push(LinearConstraint::equal(expr, 0.0));
                        }
                    }
                    Equation::Algebraic { terms, constant } => {
                        for step in 0..n {
                            let expr = self.weighted_sum(terms, member, step) + *constant;
                            out.push(LinearConstraint::equal(expr, 0.0));
                        }
                    }
                }
            }
        }
        out
    }

    fn extract_results(
        &self,
        values: &[f64],
        member: usize,
    ) -> ModelResult<IndexMap<String, Vec<f64>>> {
        self.check_member(member)?;
        if values.len() < self.num_variables() {
            return Err(ModelError::LengthMismatch {
                what: "decision vector",
                expected: self.num_variables(),
                actual: values.len(),
            });
        }
        let n = self.times.len();
        let mut out = IndexMap::with_capacity(self.variables.len());
        for (index, name) in self.variables.keys().enumerate() {
            let start = self.id(member, index, 0).0;
            out.insert(name.clone(), values[start..start + n].to_vec());
        }
        Ok(out)
    }
}

/// Collects declarations for a [`CollocatedModel`]; everything is checked in [`build`](Self::build).
#[derive(Clone, Debug)]
pub struct ModelBuilder {
    times: Vec<f64>,
    variables: Vec<(String, VariableKind, f64, f64)>,
    nominals: Vec<(String, f64)>,
    inputs: Vec<(String, Timeseries)>,
    equations: Vec<Equation>,
    initial: Vec<(String, f64)>,
    members: Vec<EnsembleMember>,
}

impl ModelBuilder {
    pub fn new(times: Vec<f64>) -> Self {
        Self {
            times,
            variables: Vec::new(),
            nominals: Vec::new(),
            inputs: Vec::new(),
            equations: Vec::new(),
            initial: Vec::new(),
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.variable(name, VariableKind::State, lower, upper)
    }

    #[must_use]
    pub fn control(self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.variable(name, VariableKind::Control, lower, upper)
    }

    #[must_use]
    pub fn algebraic(self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.variable(name, VariableKind::Algebraic, lower, upper)
    }

    fn variable(mut self, name: impl Into<String>, kind: VariableKind, lower: f64, upper: f64) -> Self {
        self.variables.push((name.into(), kind, lower, upper));
        self
    }

    #[must_use]
    pub fn nominal(mut self, name: impl Into<String>, nominal: f64) -> Self {
        self.nominals.push((name.into(), nominal));
        self
    }

    /// Known input, resampled onto the time grid. It must cover the whole grid.
    #[must_use]
    pub fn constant_input(mut self, name: impl Into<String>, series: Timeseries) -> Self {
        self.inputs.push((name.into(), series));
        self
    }

    /// `der(state) = Σ coefficient · term + constant`
    #[must_use]
    pub fn derivative(mut self, state: impl Into<String>, terms: &[(&str, f64)], constant: f64) -> Self {
        self.equations.push(Equation::Derivative {
            state: state.into(),
            terms: owned_terms(terms),
            constant,
        });
        self
    }

    /// `Σ coefficient · term + constant = 0`
    #[must_use]
    pub fn equation(mut self, terms: &[(&str, f64)], constant: f64) -> Self {
        self.equations.push(Equation::Algebraic {
            terms: owned_terms(terms),
            constant,
        });
        self
    }

    /// Fixes the first grid value of a variable (for every member unless overridden).
    #[must_use]
    pub fn initial(mut self, name: impl Into<String>, value: f64) -> Self {
        self.initial.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn ensemble(mut self, members: Vec<EnsembleMember>) -> Self {
        self.members = members;
        self
    }

    pub fn build(self) -> ModelResult<CollocatedModel> {
        let times = self.times;
        if times.len() < 2 {
            return Err(ModelError::TooFewTimes(times.len()));
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ModelError::NonIncreasingTimes);
        }

        let mut variables: IndexMap<String, Variable> = IndexMap::new();
        for (name, kind, lower, upper) in self.variables {
            if lower.is_nan() || upper.is_nan() || lower > upper {
                return Err(ModelError::InvalidBounds { name, lower, upper });
            }
            if variables.contains_key(&name) {
                return Err(ModelError::DuplicateVariable(name));
            }
            variables.insert(
                name,
                Variable {
                    kind,
                    lower,
                    upper,
                    nominal: 1.0,
                },
            );
        }

        for (name, nominal) in self.nominals {
            let Some(var) = variables.get_mut(&name) else {
                return Err(ModelError::UnknownVariable(name));
            };
            if !(nominal.is_finite() && nominal > 0.0) {
                return Err(ModelError::InvalidNominal { name, nominal });
            }
            var.nominal = nominal;
        }

        let mut inputs: IndexMap<String, Vec<f64>> = IndexMap::new();
        for (name, series) in self.inputs {
            if variables.contains_key(&name) || inputs.contains_key(&name) {
                return Err(ModelError::DuplicateVariable(name));
            }
            let values = series.resample(&times, f64::NAN, f64::NAN);
            if values.iter().any(|v| v.is_nan()) {
                return Err(ModelError::MissingInputData(name));
            }
            inputs.insert(name, values);
        }

        let known = |name: &str| variables.contains_key(name) || inputs.contains_key(name);
        let mut differentiated: Vec<&str> = Vec::new();
        for equation in &self.equations {
            let terms = match equation {
                Equation::Derivative { state, terms, .. } => {
                    match variables.get(state) {
                        None => return Err(ModelError::UnknownVariable(state.clone())),
                        Some(var) if var.kind != VariableKind::State => {
                            return Err(ModelError::NotAState(state.clone()))
                        }
                        Some(_) => {}
                    }
                    if differentiated.contains(&state.as_str()) {
                        return Err(ModelError::DuplicateDerivative(state.clone()));
                    }
                    differentiated.push(state);
                    terms
                }
                Equation::Algebraic { terms, .. } => terms,
            };
            if let Some((name, _)) = terms.iter().find(|(name, _)| !known(name)) {
                return Err(ModelError::UnknownVariable(name.clone()));
            }
        }

        let mut initial = IndexMap::new();
        for (name, value) in self.initial {
            if !variables.contains_key(&name) {
                return Err(ModelError::UnknownVariable(name));
            }
            initial.insert(name, value);
        }

        let members = if self.members.is_empty() {
            vec![EnsembleMember::new(1.0)]
        } else {
            self.members
        };
        for member in &members {
            if !(member.probability.is_finite() && member.probability >= 0.0) {
                return Err(ModelError::InvalidProbability(member.probability));
            }
            if let Some(name) = member.initial.keys().find(|n| !variables.contains_key(*n)) {
                return Err(ModelError::UnknownVariable(name.clone()));
            }
        }

        Ok(CollocatedModel {
            times,
            variables,
            inputs,
            equations: self.equations,
            initial,
            members,
        })
    }
}

fn owned_terms(terms: &[(&str, f64)]) -> Vec<(String, f64)> {
    terms.iter().map(|(n, c)| ((*n).to_string(), *c)).collect()
}
