//! Convex solve backend used by the goal-programming session.
//!
//! Problems are an affine objective plus power terms `w·|a(x)|^p`, subject to range constraints
//! of the same shape. [`OuterApproximationSolver`] handles the convex cases by solving a sequence
//! of linear programs with the dense simplex in [`simplex`].

mod outer_approximation;
mod simplex;

use goalprog_model::{LinearConstraint, LinearExpr};

pub use outer_approximation::OuterApproximationSolver;
pub use simplex::SimplexOptions;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VarSpec {
    pub lower: f64,
    pub upper: f64,
}

impl VarSpec {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn free() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn fixed(value: f64) -> Self {
        Self::new(value, value)
    }
}

/// `weight · |argument|^order` with `order >= 2`.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerTerm {
    pub weight: f64,
    pub argument: LinearExpr,
    pub order: u32,
}

impl PowerTerm {
    pub fn value_at(&self, argument: f64) -> f64 {
        self.weight * argument.abs().powi(self.order as i32)
    }

    /// Derivative of `value_at` with respect to the argument.
    pub fn slope_at(&self, argument: f64) -> f64 {
        let p = self.order as i32;
        self.weight * f64::from(p) * argument.signum() * argument.abs().powi(p - 1)
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.value_at(self.argument.evaluate(values))
    }
}

/// Affine part plus power terms.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Function {
    pub linear: LinearExpr,
    pub powers: Vec<PowerTerm>,
}

impl Function {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn linear(expr: LinearExpr) -> Self {
        Self {
            linear: expr,
            powers: Vec::new(),
        }
    }

    /// `weight · argument` for order 1, `weight · |argument|^order` otherwise.
    pub fn power(weight: f64, argument: LinearExpr, order: u32) -> Self {
        let mut out = Self::zero();
        out.add_power(weight, argument, order);
        out
    }

    pub fn add_power(&mut self, weight: f64, argument: LinearExpr, order: u32) {
        if weight == 0.0 {
            return;
        }
        if order <= 1 {
            self.linear.add_scaled(&argument, weight);
        } else {
            self.powers.push(PowerTerm {
                weight,
                argument,
                order,
            });
        }
    }

    pub fn add(&mut self, other: &Function) {
        self.add_scaled(other, 1.0);
    }

    pub fn add_scaled(&mut self, other: &Function, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.linear.add_scaled(&other.linear, factor);
        for term in &other.powers {
            self.powers.push(PowerTerm {
                weight: term.weight * factor,
                argument: term.argument.clone(),
                order: term.order,
            });
        }
    }

    pub fn is_linear(&self) -> bool {
        self.powers.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.powers
            .iter()
            .fold(self.linear.evaluate(values), |acc, t| acc + t.evaluate(values))
    }
}

/// `lower <= function <= upper`.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub function: Function,
    pub lower: f64,
    pub upper: f64,
}

impl Constraint {
    pub fn new(function: Function, lower: f64, upper: f64) -> Self {
        Self {
            function,
            lower,
            upper,
        }
    }

    pub fn violation(&self, values: &[f64]) -> f64 {
        let v = self.function.evaluate(values);
        if !v.is_finite() {
            return f64::INFINITY;
        }
        let below = if self.lower.is_finite() { self.lower - v } else { 0.0 };
        let above = if self.upper.is_finite() { v - self.upper } else { 0.0 };
        below.max(above).max(0.0)
    }
}

impl From<LinearConstraint> for Constraint {
    fn from(c: LinearConstraint) -> Self {
        Self::new(Function::linear(c.expr), c.lower, c.upper)
    }
}

/// Minimize `objective` over `variables` subject to `constraints`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverProblem {
    pub variables: Vec<VarSpec>,
    pub objective: Function,
    pub constraints: Vec<Constraint>,
    /// Starting point; backends may ignore it.
    pub seed: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

impl SolveStatus {
    pub fn is_success(self) -> bool {
        self == SolveStatus::Optimal
    }
}

#[derive(Clone, Debug)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Outer iterations (LP solves) used.
    pub iterations: usize,
    pub values: Vec<f64>,
    pub objective: f64,
    pub max_constraint_violation: f64,
}

impl SolveOutcome {
    pub(crate) fn failed(status: SolveStatus, iterations: usize) -> Self {
        Self {
            status,
            iterations,
            values: Vec::new(),
            objective: f64::NAN,
            max_constraint_violation: f64::INFINITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SolverError {
    message: String,
}

impl SolverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Blocking solve of one assembled problem.
pub trait SolveBackend {
    fn solve(&mut self, problem: &SolverProblem) -> Result<SolveOutcome, SolverError>;
}

impl<B: SolveBackend + ?Sized> SolveBackend for &mut B {
    fn solve(&mut self, problem: &SolverProblem) -> Result<SolveOutcome, SolverError> {
        (**self).solve(problem)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SolveOptions {
    /// Absolute gap between a power term and its cutting-plane model at which a term counts as
    /// converged.
    pub tolerance: f64,
    /// Maximum number of LP solves per problem.
    pub max_iterations: usize,
    pub simplex: SimplexOptions,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 200,
            simplex: SimplexOptions::default(),
        }
    }
}

pub(crate) fn clamp_vars(vars: &mut [f64], specs: &[VarSpec]) {
    for (v, spec) in vars.iter_mut().zip(specs.iter()) {
        if spec.lower.is_finite() && *v < spec.lower {
            *v = spec.lower;
        }
        if spec.upper.is_finite() && *v > spec.upper {
            *v = spec.upper;
        }
    }
}

pub(crate) fn max_constraint_violation(values: &[f64], constraints: &[Constraint]) -> f64 {
    constraints
        .iter()
        .map(|c| c.violation(values))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests;
