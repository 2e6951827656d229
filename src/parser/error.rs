use thiserror::Error;

use crate::lexer::LexError;

/// Syntax errors. Lexing failures surface through here unchanged so callers
/// see a single front-end error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Expected {expected}, got {found} at line {line}, column {column}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Unknown {command} command '{verb}' at line {line}, column {column}")]
    UnknownCommand {
        command: &'static str,
        verb: String,
        line: usize,
        column: usize,
    },
    #[error("'{keyword}' outside of {context} at line {line}, column {column}")]
    Misplaced {
        keyword: &'static str,
        context: &'static str,
        line: usize,
        column: usize,
    },
    #[error("Invalid assignment target at line {line}, column {column}")]
    InvalidAssignmentTarget { line: usize, column: usize },
    #[error("Class body may only contain function definitions, at line {line}, column {column}")]
    InvalidClassBody { line: usize, column: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Lex(error) => error.line(),
            ParseError::UnexpectedToken { line, .. }
            | ParseError::UnknownCommand { line, .. }
            | ParseError::Misplaced { line, .. }
            | ParseError::InvalidAssignmentTarget { line, .. }
            | ParseError::InvalidClassBody { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::Lex(error) => error.column(),
            ParseError::UnexpectedToken { column, .. }
            | ParseError::UnknownCommand { column, .. }
            | ParseError::Misplaced { column, .. }
            | ParseError::InvalidAssignmentTarget { column, .. }
            | ParseError::InvalidClassBody { column, .. } => *column,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
