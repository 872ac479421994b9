// Expression Module
// Guard statements (`only_if`, `not_if`, `fail_if`) and `%{key}` interpolation

pub mod evaluator;
pub mod interpolate;

pub use evaluator::{EvalError, Evaluator};
pub use interpolate::{escape_literal_percent, interpolate, InterpolationError};
