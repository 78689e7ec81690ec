//! Optimization model surface for goalprog.
//!
//! The engine never looks at equations directly. It works against [`ModelView`], which hands out
//! affine expressions ([`LinearExpr`]) over the flattened decision vector: states at a time, over
//! the whole grid, or integrated over an interval. [`CollocatedModel`] is the bundled
//! implementation, a linear DAE discretized on a fixed time grid with implicit Euler.

mod collocation;
mod error;
mod expr;
mod interpolate;
mod timeseries;
mod view;

pub use collocation::{CollocatedModel, EnsembleMember, Equation, ModelBuilder, VariableKind};
pub use error::{ModelError, ModelResult};
pub use expr::{LinearConstraint, LinearExpr, VarId};
pub use interpolate::{interpolate, interpolate_at};
pub use timeseries::Timeseries;
pub use view::ModelView;
