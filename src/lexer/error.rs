use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Inconsistent dedent to {indent_level} spaces at line {line}, column {column}")]
    InvalidDedent {
        indent_level: usize,
        line: usize,
        column: usize,
    },
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Tabs are not supported for indentation at line {line}, column {column}")]
    TabIndentation { line: usize, column: usize },
    #[error("Invalid number literal '{literal}' at line {line}, column {column}")]
    InvalidNumberLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Invalid escape sequence '\\{escape}' at line {line}, column {column}")]
    InvalidEscape {
        escape: char,
        line: usize,
        column: usize,
    },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::InvalidDedent { line, .. }
            | LexError::UnexpectedCharacter { line, .. }
            | LexError::TabIndentation { line, .. }
            | LexError::InvalidNumberLiteral { line, .. }
            | LexError::UnterminatedString { line, .. }
            | LexError::InvalidEscape { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            LexError::InvalidDedent { column, .. }
            | LexError::UnexpectedCharacter { column, .. }
            | LexError::TabIndentation { column, .. }
            | LexError::InvalidNumberLiteral { column, .. }
            | LexError::UnterminatedString { column, .. }
            | LexError::InvalidEscape { column, .. } => *column,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
