//! Lexicographic (preemptive) goal programming.
//!
//! Goals are grouped by integer priority and solved in ascending order, each priority as one
//! convex problem. A goal with targets gets an epsilon variable in `[0, 1]` measuring how far its
//! normalized function may fall outside the target interval toward the edge of its function
//! range; the priority minimizes `weight · ε^order`. A goal without targets minimizes
//! `weight · (f/nominal)^order` directly.
//!
//! Once a priority is solved, its achieved epsilons become plain bounds on the goal functions so
//! later priorities cannot degrade them. Goals that share a function key share those bounds.
//! With [`GoalProgrammingOptions::keep_eps_variable`], epsilons instead remain decision variables
//! and the earlier objective is capped at its achieved value.
//!
//! ```
//! use goalprog_engine::goal_programming::{FunctionContext, Goal, GoalProgramming};
//! use goalprog_model::CollocatedModel;
//!
//! let model = CollocatedModel::builder(vec![0.0, 0.5, 1.0])
//!     .state("x", -10.0, 10.0)
//!     .control("u", -1.0, 1.0)
//!     .derivative("x", &[("u", 1.0)], 0.0)
//!     .initial("x", 0.0)
//!     .build()
//!     .unwrap();
//!
//! let reach = Goal::new("x_end", |cx: &FunctionContext<'_>| {
//!     cx.state_at("x", 1.0).map(Into::into)
//! })
//! .with_function_range(-10.0, 10.0)
//! .with_target_min(0.5);
//!
//! let mut session = GoalProgramming::new(model).with_goals([reach]);
//! assert!(session.optimize().unwrap());
//! let x = &session.results(0).unwrap()["x"];
//! assert!(x[2] >= 0.5 - 1e-5);
//! ```

mod builder;
mod contribution;
mod diagnostics;
mod error;
mod goal;
mod layout;
mod options;
mod pipeline;
mod session;
mod store;
mod validate;

pub use diagnostics::DiagnosticChannels;
pub use error::{GoalError, GoalResult};
pub use goal::{FunctionContext, FunctionRange, Goal, GoalFunction, GoalValue, StateGoal, Target};
pub use options::GoalProgrammingOptions;
pub use session::{
    GoalProgramming, GoalProgrammingHooks, NoHooks, PriorityReport, RunOptions, SessionState,
};
