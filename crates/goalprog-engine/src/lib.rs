#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Lexicographic goal programming on top of [`goalprog_model`].
//!
//! [`goal_programming`] turns prioritized goals into a sequence of convex problems and solves
//! them through a [`solver::SolveBackend`]. The bundled backend, [`solver::OuterApproximationSolver`],
//! handles power-term objectives with cutting planes over a dense simplex.

pub mod goal_programming;
pub mod solver;

pub use goal_programming::{
    FunctionContext, Goal, GoalError, GoalProgramming, GoalProgrammingOptions, GoalResult,
    StateGoal, Target,
};
pub use solver::{OuterApproximationSolver, SolveBackend, SolveStatus};
