use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Position of a decision variable in the flattened problem vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x[{}]", self.0)
    }
}

/// Affine expression `constant + Σ coefficient · x[var]`.
///
/// Terms are kept sorted by variable so that two expressions built in a different order compare
/// equal and produce identical solver rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    terms: BTreeMap<VarId, f64>,
    constant: f64,
}

impl LinearExpr {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    #[must_use]
    pub fn variable(id: VarId) -> Self {
        Self::term(id, 1.0)
    }

    #[must_use]
    pub fn term(id: VarId, coefficient: f64) -> Self {
        let mut expr = Self::zero();
        expr.add_term(id, coefficient);
        expr
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(id, c)| (*id, *c))
    }

    pub fn coefficient(&self, id: VarId) -> f64 {
        self.terms.get(&id).copied().unwrap_or(0.0)
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn add_term(&mut self, id: VarId, coefficient: f64) {
        if coefficient == 0.0 {
            return;
        }
        let entry = self.terms.entry(id).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.terms.remove(&id);
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// `self += factor · other`
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        if factor == 0.0 {
            return;
        }
        for (id, c) in other.terms() {
            self.add_term(id, factor * c);
        }
        self.constant += factor * other.constant;
    }

    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = Self::zero();
        out.add_scaled(self, factor);
        out
    }

    /// Evaluates the expression at `values`. Variables beyond the end of `values` yield NaN.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().fold(self.constant, |acc, (id, c)| {
            acc + c * values.get(id.0).copied().unwrap_or(f64::NAN)
        })
    }

    /// Largest variable index referenced, if any.
    pub fn max_var(&self) -> Option<VarId> {
        self.terms.keys().next_back().copied()
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<VarId> for LinearExpr {
    fn from(id: VarId) -> Self {
        Self::variable(id)
    }
}

impl fmt::Display for LinearExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (id, c) in self.terms() {
            if first {
                write!(f, "{c}*{id}")?;
                first = false;
            } else if c < 0.0 {
                write!(f, " - {}*{id}", -c)?;
            } else {
                write!(f, " + {c}*{id}")?;
            }
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant < 0.0 {
            write!(f, " - {}", -self.constant)
        } else if self.constant > 0.0 {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}

impl AddAssign<&LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, 1.0);
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        self.add_scaled(&rhs, 1.0);
    }
}

impl SubAssign<&LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, -1.0);
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += rhs;
        self
    }
}

impl Add<&LinearExpr> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: &LinearExpr) -> LinearExpr {
        self += rhs;
        self
    }
}

impl Add<f64> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: f64) -> LinearExpr {
        self.constant += rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self -= &rhs;
        self
    }
}

impl Sub<&LinearExpr> for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: &LinearExpr) -> LinearExpr {
        self -= rhs;
        self
    }
}

impl Sub<f64> for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: f64) -> LinearExpr {
        self.constant -= rhs;
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.scaled(rhs)
    }
}

impl Mul<f64> for &LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.scaled(rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self.scaled(-1.0)
    }
}

impl Sum for LinearExpr {
    fn sum<I: Iterator<Item = LinearExpr>>(iter: I) -> Self {
        iter.fold(LinearExpr::zero(), |acc, e| acc + e)
    }
}

/// `lower <= expr <= upper`; either side may be infinite.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearConstraint {
    pub expr: LinearExpr,
    pub lower: f64,
    pub upper: f64,
}

impl LinearConstraint {
    pub fn new(expr: LinearExpr, lower: f64, upper: f64) -> Self {
        Self { expr, lower, upper }
    }

    pub fn equal(expr: LinearExpr, value: f64) -> Self {
        Self::new(expr, value, value)
    }

    /// Largest amount by which `values` violates the constraint (0 when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let v = self.expr.evaluate(values);
        if !v.is_finite() {
            return f64::INFINITY;
        }
        let below = if self.lower.is_finite() { self.lower - v } else { 0.0 };
        let above = if self.upper.is_finite() { v - self.upper } else { 0.0 };
        below.max(above).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn terms_merge_and_cancel() {
        let x = VarId(0);
        let y = VarId(3);
        let a = LinearExpr::variable(x) * 2.0 + LinearExpr::term(y, -1.0) + 1.5;
        let b = LinearExpr::term(x, -2.0) + LinearExpr::variable(y);

        let sum = a.clone() + b;
        assert!(sum.is_constant());
        assert_eq!(sum.constant_part(), 1.5);

        let diff = a - LinearExpr::variable(x);
        assert_eq!(diff.coefficient(x), 1.0);
        assert_eq!(diff.coefficient(y), -1.0);
        assert_eq!(diff.max_var(), Some(y));
    }

    #[test]
    fn evaluate_uses_constant_and_coefficients() {
        let expr = LinearExpr::term(VarId(1), 3.0) - LinearExpr::variable(VarId(0)) + 2.0;
        assert_eq!(expr.evaluate(&[1.0, 2.0]), 7.0);
        assert!(expr.evaluate(&[1.0]).is_nan());
    }

    #[test]
    fn display_is_readable() {
        let expr = LinearExpr::term(VarId(0), 2.0) - LinearExpr::variable(VarId(2)) - 0.5;
        assert_eq!(expr.to_string(), "2*x[0] - 1*x[2] - 0.5");
        assert_eq!(LinearExpr::constant(4.0).to_string(), "4");
    }

    #[test]
    fn constraint_violation_measures_distance_outside() {
        let c = LinearConstraint::new(LinearExpr::variable(VarId(0)), 0.0, 1.0);
        assert_eq!(c.violation(&[0.5]), 0.0);
        assert_eq!(c.violation(&[1.25]), 0.25);
        assert_eq!(c.violation(&[-2.0]), 2.0);
        assert_eq!(c.violation(&[f64::NAN]), f64::INFINITY);
    }
}
