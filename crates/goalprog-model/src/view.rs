use indexmap::IndexMap;

use crate::interpolate::bracket;
use crate::{LinearConstraint, LinearExpr, ModelError, ModelResult};

/// Read-only surface a goal-programming session needs from a discretized model.
///
/// Decision variables of every ensemble member live in one flat vector of length
/// [`num_variables`](ModelView::num_variables); expressions returned by the accessors index into
/// it. The default `state_at` and `integral` are derived from `state_vector` by linear
/// interpolation between grid points.
pub trait ModelView {
    /// Time grid shared by all path quantities.
    fn times(&self) -> &[f64];

    fn ensemble_size(&self) -> usize {
        1
    }

    fn ensemble_member_probability(&self, _member: usize) -> f64 {
        1.0 / self.ensemble_size().max(1) as f64
    }

    /// Declared `(lower, upper)` bounds of a named quantity, if it has any.
    fn bounds(&self, name: &str) -> Option<(f64, f64)>;

    fn nominal(&self, _name: &str) -> f64 {
        1.0
    }

    /// The quantity at every grid point for one ensemble member.
    fn state_vector(&self, name: &str, member: usize) -> ModelResult<Vec<LinearExpr>>;

    /// The quantity at an arbitrary time inside the grid.
    fn state_at(&self, name: &str, t: f64, member: usize) -> ModelResult<LinearExpr> {
        let series = self.state_vector(name, member)?;
        interpolate_expr(self.times(), &series, t)
    }

    /// Integral of the piecewise-linear interpolant over `[t0, t1]`.
    fn integral(&self, name: &str, t0: f64, t1: f64, member: usize) -> ModelResult<LinearExpr> {
        let times = self.times();
        if t0 > t1 {
            return Err(ModelError::ReversedInterval { start: t0, end: t1 });
        }
        let series = self.state_vector(name, member)?;

        let mut points = vec![(t0, interpolate_expr(times, &series, t0)?)];
        for (t, value) in times.iter().zip(series.iter()) {
            if *t > t0 && *t < t1 {
                points.push((*t, value.clone()));
            }
        }
        points.push((t1, interpolate_expr(times, &series, t1)?));

        let mut total = LinearExpr::zero();
        for pair in points.windows(2) {
            let ((a, fa), (b, fb)) = (&pair[0], &pair[1]);
            let half = 0.5 * (b - a);
            total.add_scaled(fa, half);
            total.add_scaled(fb, half);
        }
        Ok(total)
    }

    /// Length of the flattened decision vector (all ensemble members).
    fn num_variables(&self) -> usize;

    /// `(lower, upper)` for every decision variable.
    fn variable_bounds(&self) -> Vec<(f64, f64)>;

    /// Structural constraints (discretized dynamics and the like).
    fn constraints(&self) -> Vec<LinearConstraint>;

    /// Starting point for the first solve: zero, clamped into each variable's bounds.
    fn seed(&self) -> Vec<f64> {
        self.variable_bounds()
            .into_iter()
            .map(|(lo, hi)| 0.0_f64.max(lo).min(hi))
            .collect()
    }

    /// Named trajectories of one ensemble member, read from a solved decision vector.
    fn extract_results(
        &self,
        values: &[f64],
        member: usize,
    ) -> ModelResult<IndexMap<String, Vec<f64>>>;
}

/// Linear interpolation of a per-grid-point expression series at `t`.
pub(crate) fn interpolate_expr(
    times: &[f64],
    series: &[LinearExpr],
    t: f64,
) -> ModelResult<LinearExpr> {
    if series.len() != times.len() {
        return Err(ModelError::LengthMismatch {
            what: "state vector",
            expected: times.len(),
            actual: series.len(),
        });
    }
    let Some((i, w)) = bracket(times, t) else {
        return Err(ModelError::TimeOutOfRange {
            time: t,
            start: times.first().copied().unwrap_or(f64::NAN),
            end: times.last().copied().unwrap_or(f64::NAN),
        });
    };
    if w == 0.0 {
        return Ok(series[i].clone());
    }
    let mut out = series[i].scaled(1.0 - w);
    out.add_scaled(&series[i + 1], w);
    Ok(out)
}
