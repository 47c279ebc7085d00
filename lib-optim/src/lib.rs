//! A library for optimization algorithms in Rust

pub mod bounds;
pub mod lbfgsb;
pub mod line_search;

pub use lbfgsb::{lbfgsb, LbfgsParams, Minimum, Status};
pub use line_search::ArmijoParams;

pub type Result<T> = std::result::Result<T, OptimizeError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// During optimization, the evaluated point was to become numerically unstable
    NumericalDivergence,
    /// The objective was evaluated as often as allowed.
    MaxEvaluationReached,
    /// No step along the search direction decreased the objective.
    LineSearchFailed,
    /// The starting point and the bounds have different lengths.
    DimensionMismatch {
        /// Number of bounds
        expected: usize,
        /// Length of the starting point
        given: usize,
    },
    /// A lower bound is above its upper bound, or one of them is NaN.
    InvalidBounds {
        /// Position of the offending bound
        index: usize,
        lower: f64,
        upper: f64,
    },
}

impl std::error::Error for OptimizeError {}

impl std::fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NumericalDivergence => {
                write!(f, "objective is not finite at the starting point")
            }
            Self::MaxEvaluationReached => {
                write!(f, "maximum number of function evaluations reached")
            }
            Self::LineSearchFailed => {
                write!(f, "line search could not decrease the objective")
            }
            Self::DimensionMismatch { expected, given } => write!(
                f,
                "expected a starting point of length {expected}, got {given}"
            ),
            Self::InvalidBounds {
                index,
                lower,
                upper,
            } => write!(
                f,
                "invalid bounds for parameter {index}: ({lower}, {upper})"
            ),
        }
    }
}
