pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("duplicate variable: {0}")]
    DuplicateVariable(String),

    #[error("{0} is not a state; derivative equations need a state on the left-hand side")]
    NotAState(String),

    #[error("state {0} already has a derivative equation")]
    DuplicateDerivative(String),

    #[error("time {time} lies outside the grid [{start}, {end}]")]
    TimeOutOfRange { time: f64, start: f64, end: f64 },

    #[error("integral bounds are reversed: {start} > {end}")]
    ReversedInterval { start: f64, end: f64 },

    #[error("{what} length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("times must be finite and strictly increasing")]
    NonIncreasingTimes,

    #[error("a time grid needs at least two points, got {0}")]
    TooFewTimes(usize),

    #[error("invalid bounds for {name}: [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("nominal for {name} must be positive and finite, got {nominal}")]
    InvalidNominal { name: String, nominal: f64 },

    #[error("input {0} does not cover the whole time grid")]
    MissingInputData(String),

    #[error("ensemble member {member} out of range (ensemble size {size})")]
    EnsembleMemberOutOfRange { member: usize, size: usize },

    #[error("ensemble member probability must be non-negative and finite, got {0}")]
    InvalidProbability(f64),

    #[error("path accessor used outside a time-indexed context")]
    NotInPathContext,
}
