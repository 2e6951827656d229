use std::fmt;

use thiserror::Error;

use super::library::LibraryError;
use super::memory::MemoryError;

/// Error taxonomy reported to the caller of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NameError,
    MemoryError,
    AttributeError,
    TypeError,
    StackOverflowError,
    CancelledError,
    TimeoutError,
    LibraryError,
    ArithmeticError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::NameError => "NameError",
            ErrorKind::MemoryError => "MemoryError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::StackOverflowError => "StackOverflowError",
            ErrorKind::CancelledError => "CancelledError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::LibraryError => "LibraryError",
            ErrorKind::ArithmeticError => "ArithmeticError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("Unknown attribute '{attribute}' for type {type_name}")]
    UnknownAttribute {
        attribute: String,
        type_name: String,
    },
    #[error("Operation '{operation}' is not supported for types {left} and {right}")]
    UnsupportedOperands {
        operation: String,
        left: String,
        right: String,
    },
    #[error("Operation '{operation}' is not supported for type {type_name}")]
    UnsupportedOperation {
        operation: String,
        type_name: String,
    },
    #[error("Invalid argument for '{operation}': expected {expected}, got {got}")]
    InvalidArgument {
        operation: String,
        expected: String,
        got: String,
    },
    #[error("Object of type {type_name} is not callable")]
    NotCallable { type_name: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Maximum call depth of {limit} frames exceeded")]
    StackOverflow { limit: usize },
    #[error("cancelled")]
    Cancelled,
    #[error("Joined {handle} was cancelled")]
    JoinCancelled { handle: String },
    #[error("Timed out after {turns} turns waiting for {waiting_for}")]
    Timeout { waiting_for: String, turns: u64 },
    #[error("deadlock: {waiting_for} can never be satisfied")]
    Deadlock { waiting_for: String },
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in '{operation}'")]
    Overflow { operation: String },
    #[error("Lock '{name}' is not held by this context")]
    LockNotHeld { name: String },
    #[error("Lock '{name}' is already held by this context")]
    LockAlreadyHeld { name: String },
    #[error("A context cannot join {handle} from inside it")]
    SelfJoin { handle: String },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::UndefinedVariable { .. } => ErrorKind::NameError,
            RuntimeError::Memory(_) => ErrorKind::MemoryError,
            RuntimeError::UnknownAttribute { .. } => ErrorKind::AttributeError,
            RuntimeError::UnsupportedOperands { .. }
            | RuntimeError::UnsupportedOperation { .. }
            | RuntimeError::InvalidArgument { .. }
            | RuntimeError::NotCallable { .. }
            | RuntimeError::ArityMismatch { .. }
            | RuntimeError::LockNotHeld { .. }
            | RuntimeError::LockAlreadyHeld { .. }
            | RuntimeError::SelfJoin { .. } => ErrorKind::TypeError,
            RuntimeError::StackOverflow { .. } => ErrorKind::StackOverflowError,
            RuntimeError::Cancelled | RuntimeError::JoinCancelled { .. } => {
                ErrorKind::CancelledError
            }
            RuntimeError::Timeout { .. } | RuntimeError::Deadlock { .. } => {
                ErrorKind::TimeoutError
            }
            RuntimeError::Library(_) => ErrorKind::LibraryError,
            RuntimeError::DivisionByZero | RuntimeError::Overflow { .. } => {
                ErrorKind::ArithmeticError
            }
        }
    }

    pub(crate) fn invalid_argument(
        operation: &str,
        expected: &str,
        got: impl Into<String>,
    ) -> Self {
        RuntimeError::InvalidArgument {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got: got.into(),
        }
    }

    pub(crate) fn expect_arity(name: &str, expected: usize, found: usize) -> Result<(), Self> {
        if expected == found {
            Ok(())
        } else {
            Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected,
                found,
            })
        }
    }
}

/// A runtime error pinned to the statement that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}: {error} at line {line}, column {column}", error.kind())]
pub struct RuntimeFailure {
    pub error: RuntimeError,
    pub line: usize,
    pub column: usize,
}

impl RuntimeFailure {
    pub fn new(error: RuntimeError, line: usize, column: usize) -> Self {
        Self {
            error,
            line,
            column,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_kind_and_position() {
        let failure = RuntimeFailure::new(
            RuntimeError::Memory(MemoryError::OutOfBounds {
                name: "arr".to_string(),
                index: 5,
                capacity: 3,
            }),
            2,
            1,
        );
        assert_eq!(failure.kind(), ErrorKind::MemoryError);
        assert_eq!(
            failure.to_string(),
            "MemoryError: index out of bounds: index 5 in buffer 'arr' of capacity 3 at line 2, column 1"
        );
    }

    #[test]
    fn maps_variants_onto_kinds() {
        assert_eq!(RuntimeError::Cancelled.kind(), ErrorKind::CancelledError);
        assert_eq!(
            RuntimeError::Deadlock {
                waiting_for: "lock 'm'".to_string()
            }
            .kind(),
            ErrorKind::TimeoutError
        );
        assert_eq!(RuntimeError::DivisionByZero.kind(), ErrorKind::ArithmeticError);
        assert_eq!(
            RuntimeError::LockNotHeld {
                name: "m".to_string()
            }
            .kind(),
            ErrorKind::TypeError
        );
    }
}
