use goalprog_model::ModelError;

use crate::solver::SolverError;

pub type GoalResult<T> = Result<T, GoalError>;

/// Validation and assembly failures. Goals are identified by their debug representation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GoalError {
    #[error("nonpositive nominal value specified for goal {goal}")]
    NonPositiveNominal { goal: String },

    #[error("minimization goals cannot be critical: {goal}")]
    CriticalMinimization { goal: String },

    #[error("no function range specified for goal {goal}")]
    MissingFunctionRange { goal: String },

    #[error("invalid function range for goal {goal}")]
    InvalidFunctionRange { goal: String },

    #[error("specifying a function range is not allowed for minimization goal {goal}")]
    UnexpectedFunctionRange { goal: String },

    #[error("order of goal {goal} must be at least 1")]
    InvalidOrder { goal: String },

    #[error("weight of goal {goal} must be positive and finite when targets are set")]
    InvalidWeight { goal: String },

    #[error("relaxation of goal {goal} should be a nonnegative value")]
    NegativeRelaxation { goal: String },

    #[error("target minimum exceeds target maximum for goal {goal}")]
    TargetMinExceedsMax { goal: String },

    #[error(
        "target minimum should be greater than the lower bound of the function range for goal {goal}"
    )]
    TargetMinOutsideRange { goal: String },

    #[error(
        "target maximum should be smaller than the upper bound of the function range for goal {goal}"
    )]
    TargetMaxOutsideRange { goal: String },

    #[error("target minimum of goal {goal} must be greater or equal than target minimum of goal {previous}")]
    NonMonotonicMin { goal: String, previous: String },

    #[error("target maximum of goal {goal} must be less or equal than target maximum of goal {previous}")]
    NonMonotonicMax { goal: String, previous: String },

    #[error("goal {goal} has {actual} {what} entries, expected {expected}")]
    SizeMismatch {
        goal: String,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("time-indexed targets are only allowed on path goals: {goal}")]
    SeriesOnPointGoal { goal: String },

    #[error("state {state} has no bounds or does not exist in the model")]
    MissingStateBounds { state: String },

    #[error("goals sharing function key {key} have different shapes")]
    ShapeMismatch { key: String },

    #[error("invalid goal programming options: {0}")]
    Options(&'static str),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}
