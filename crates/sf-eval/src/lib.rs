//! sf-eval: the textual expression evaluator collaborator.
//!
//! The control engine hands this crate fully substituted literal expressions
//! (`"3.5 * 2 + 1"`, `"7.0 > 4.0"`) and gets a number back; comparisons
//! yield `1.0` for true and `0.0` for false. Consumers depend on the
//! [`Evaluate`] trait, never on the concrete parser, so the evaluator stays
//! a replaceable black box.

pub mod expr;

pub use expr::ExprEvaluator;

use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Unexpected character '{found}' at position {pos}")]
    UnexpectedChar { found: char, pos: usize },

    #[error("Expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("Unbalanced parenthesis at position {pos}")]
    UnbalancedParen { pos: usize },

    #[error("Malformed number literal at position {pos}")]
    MalformedNumber { pos: usize },

    #[error("Trailing input at position {pos}")]
    TrailingInput { pos: usize },
}

/// The single capability the control engine needs: literal expression text
/// in, number out.
pub trait Evaluate {
    fn evaluate(&self, expr: &str) -> EvalResult<f64>;
}
