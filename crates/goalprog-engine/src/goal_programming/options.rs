use serde::{Deserialize, Serialize};

use super::{GoalError, GoalResult};

/// Options controlling the goal programming process.
///
/// Deserializes from partial JSON; missing fields keep their defaults. `violation_tolerance` is
/// written as `null` when infinite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalProgrammingOptions {
    /// Added to every frozen epsilon and to the Pareto cap in retention mode.
    pub constraint_relaxation: f64,
    /// Goals whose achieved epsilon exceeds this are pinned to their solved value instead.
    #[serde(with = "infinite_as_null")]
    pub violation_tolerance: f64,
    /// Freeze minimization goals as equalities (when their relaxation is zero).
    pub fix_minimized_values: bool,
    /// Reject goal sequences on one function key whose targets loosen with priority.
    pub check_monotonicity: bool,
    /// Frozen two-sided bounds closer than this collapse into an equality.
    pub equality_threshold: f64,
    /// Scaled distance inside the targets at which a goal counts as inactive in diagnostics.
    pub interior_distance: f64,
    /// Divide the objective by the number of objective terms (and time steps for path terms).
    pub scale_by_problem_size: bool,
    /// Keep epsilons free in later priorities behind a Pareto constraint instead of freezing.
    pub keep_eps_variable: bool,
    /// Replace `eps^order` objective terms by linear alias variables. Needs `keep_eps_variable`.
    pub linear_obj_eps: bool,
}

impl Default for GoalProgrammingOptions {
    fn default() -> Self {
        Self {
            constraint_relaxation: 0.0,
            violation_tolerance: f64::INFINITY,
            fix_minimized_values: false,
            check_monotonicity: true,
            equality_threshold: 1e-8,
            interior_distance: 1e-6,
            scale_by_problem_size: false,
            keep_eps_variable: false,
            linear_obj_eps: false,
        }
    }
}

impl GoalProgrammingOptions {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> GoalResult<()> {
        if self.linear_obj_eps && !self.keep_eps_variable {
            return Err(GoalError::Options(
                "linear_obj_eps can be set only if keep_eps_variable is also set",
            ));
        }
        if !(self.constraint_relaxation >= 0.0) {
            return Err(GoalError::Options("constraint_relaxation must be nonnegative"));
        }
        if !(self.equality_threshold >= 0.0) {
            return Err(GoalError::Options("equality_threshold must be nonnegative"));
        }
        if !(self.interior_distance >= 0.0) {
            return Err(GoalError::Options("interior_distance must be nonnegative"));
        }
        if self.violation_tolerance.is_nan() {
            return Err(GoalError::Options("violation_tolerance must not be NaN"));
        }
        Ok(())
    }
}

mod infinite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() && *value > 0.0 {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
