//! Error types shared by the lexer, the evaluator and native callbacks.
//!
//! Everything that can go wrong while a script runs is a [`ScriptError`].
//! The public entry points on [`crate::Context`] wrap it into an
//! [`Exception`], which also carries the call-stack frames that were active
//! when the error was raised.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

/// 1-based line / column inside a script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(line: {}, col: {})", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// The lexer found a different token than the grammar required.
    #[error("Got {found} expected {expected} at {position}")]
    UnexpectedToken {
        found: String,
        expected: String,
        position: Position,
    },

    /// Well-formed tokens used in a place the grammar does not allow.
    #[error("{message} at {position}")]
    Syntax { message: String, position: Position },

    /// Unsupported operator for a pair of values, calling something that is
    /// not callable, integer division by zero, unknown constructor.
    #[error("{0}")]
    Type(String),

    /// A loop ran into the configured iteration ceiling.
    #[error("{kind} loop exceeded {limit} iterations at {position}")]
    LoopLimit {
        kind: &'static str,
        limit: usize,
        position: Position,
    },

    /// Raised by a native (host) callback.
    #[error("{0}")]
    Host(String),
}

impl ScriptError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        ScriptError::Type(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        ScriptError::Host(msg.into())
    }
}

/// What a failed `execute` / `evaluate` hands back to the host.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Error: {error}{}", frames(.call_stack))]
pub struct Exception {
    pub error: ScriptError,
    /// Innermost frame last. Empty when the call-stack feature is disabled.
    pub call_stack: Vec<String>,
}

impl Exception {
    pub fn new(error: ScriptError, call_stack: Vec<String>) -> Self {
        Self { error, call_stack }
    }

    pub fn into_error(self) -> ScriptError {
        self.error
    }
}

impl From<ScriptError> for Exception {
    fn from(error: ScriptError) -> Self {
        Exception::new(error, Vec::new())
    }
}

fn frames(call_stack: &[String]) -> String {
    call_stack
        .iter()
        .enumerate()
        .rev()
        .map(|(i, frame)| format!("\n{i}: {frame}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_lists_frames_innermost_first() {
        let exc = Exception::new(
            ScriptError::type_error("Expecting 'nope' to be a function"),
            vec!["outer (line: 1, col: 6)".into(), "inner (line: 2, col: 3)".into()],
        );
        assert_eq!(
            exc.to_string(),
            "Error: Expecting 'nope' to be a function\n\
             1: inner (line: 2, col: 3)\n\
             0: outer (line: 1, col: 6)"
        );
    }

    #[test]
    fn test_unexpected_token_message() {
        let err = ScriptError::UnexpectedToken {
            found: "EOF".into(),
            expected: "';'".into(),
            position: Position { line: 3, col: 7 },
        };
        assert_eq!(err.to_string(), "Got EOF expected ';' at (line: 3, col: 7)");
    }
}
