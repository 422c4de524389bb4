//! L3eval - Scheme evaluators with classes
//!
//! This crate evaluates "L3", a small Scheme dialect with literals, quoted data,
//! `if`, `lambda`, `let`, top-level `define` and a `class` form. Objects are
//! plain procedures that answer to symbolic messages:
//!
//! ```scheme
//! (L3
//!   (define pair (class (a b)
//!                  ((first (lambda () a))
//!                   (scale (lambda (k) (pair (* k a) (* k b)))))))
//!   (define p34 (pair 3 4))
//!   ((p34 'scale 2) 'first))   ; => 6
//! ```
//!
//! ## Two evaluators, one language
//!
//! The same program can be run by two independent implementations of the
//! [`evaluator::Evaluator`] trait:
//!
//! - `evaluator::env_model`: closures capture a persistent chain of frames
//!   ([`environment::Env`]) and bodies run in an extended copy of it.
//! - `evaluator::sub_model`: argument values are turned back into terms and
//!   substituted into an alpha-renamed copy of the body.
//!
//! Both report identical values and error messages. The one place they differ
//! from the desugared form is an unmatched message: direct dispatch fails with
//! `Unrecognized method: <name>`, whereas a class rewritten by
//! [`transform::lex_transform`] answers `#f`.
//!
//! ## Modules
//!
//! - `scheme`: S-expression reading and L3 parsing from text
//! - `ast`: expression types and the unparser
//! - `value`: runtime values
//! - `environment`: persistent environments
//! - `builtinops`: primitive operations
//! - `transform`: class-to-lambda rewriting
//! - `evaluator`: the evaluator contract and both implementations

use thiserror::Error;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested structures in the S-expression reader
pub const MAX_PARSE_DEPTH: usize = 64;

/// Error types for the interpreter
///
/// Every public operation returns this type. Messages are part of the
/// contract: both evaluators must produce the same text for the same failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    Parse(String),
    /// Unbound variable
    #[error("var not found: {0}")]
    NotFound(String),
    /// Binding count mismatch between names and values
    #[error("ArityError: expected {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },
    /// Application target is not a primitive, closure, class or object
    #[error("Bad procedure {0}")]
    BadProcedure(String),
    #[error("Empty sequence")]
    EmptySequence,
    /// Message send without any argument
    #[error("Empty method name")]
    EmptyMethodName,
    /// Message send whose first argument is not a symbol
    #[error("Invalid method name")]
    InvalidMethodName,
    #[error("Unrecognized method: {0}")]
    UnrecognizedMethod(String),
    /// Failure reported by a primitive operation, surfaced unchanged
    #[error("{0}")]
    Primitive(String),
}

impl Error {
    /// Create an ArityError
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::Arity { expected, got }
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod transform;
pub mod value;

#[cfg(feature = "scheme")]
pub mod scheme;
