use std::{iter::Peekable, str::CharIndices};

use crate::token::{Span, Token, TokenKind};

pub mod error;

pub use error::{LexError, LexResult};

/// Indentation-aware tokenizer.
///
/// Produces `Indent`/`Dedent` pairs from leading spaces, skipping blank and
/// comment-only lines so they never open or close a block. The lexer is a
/// cheap `Clone`, so a caller can restart from any point it has saved.
#[derive(Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    pending_tokens: Vec<Token<'a>>,
    at_line_start: bool,
    eof_reached: bool,
    finished: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            pending_tokens: Vec::new(),
            at_line_start: true,
            eof_reached: false,
            finished: false,
            line: 1,
            column: 1,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        if let Some(token) = self.pending_tokens.pop() {
            return Ok(token);
        }

        if self.eof_reached {
            return Ok(Token::new(TokenKind::EOF, self.here()));
        }

        if self.at_line_start {
            self.at_line_start = false;
            let indent_level = self.count_indentation()?;
            let current_indent = self.current_indent();
            let span = self.here();

            if indent_level > current_indent {
                self.indent_stack.push(indent_level);
                return Ok(Token::new(TokenKind::Indent, span));
            } else if indent_level < current_indent {
                while let Some(&top) = self.indent_stack.last() {
                    if top > indent_level {
                        self.indent_stack.pop();
                        self.pending_tokens
                            .push(Token::new(TokenKind::Dedent, span));
                    } else {
                        break;
                    }
                }
                if self.current_indent() != indent_level {
                    return Err(LexError::InvalidDedent {
                        indent_level,
                        line: self.line,
                        column: self.column,
                    });
                }
                if let Some(token) = self.pending_tokens.pop() {
                    return Ok(token);
                }
            }
        }

        self.skip_whitespace_and_comment();

        let (start_idx, ch) = match self.chars.peek() {
            Some(&(idx, c)) => (idx, c),
            None => {
                self.eof_reached = true;
                let span = self.here();
                // Close every open block before the end marker.
                while self.indent_stack.len() > 1 {
                    self.indent_stack.pop();
                    self.pending_tokens
                        .push(Token::new(TokenKind::Dedent, span));
                }
                if let Some(token) = self.pending_tokens.pop() {
                    return Ok(token);
                }
                return Ok(Token::new(TokenKind::EOF, span));
            }
        };

        let start_line = self.line;
        let start_column = self.column;
        match ch {
            '\n' => {
                self.advance_char();
                self.at_line_start = true;
                Ok(Token::new(
                    TokenKind::Newline,
                    Span::new(start_idx, start_idx + 1, start_line, start_column),
                ))
            }
            '=' => Ok(self.operator(
                start_idx,
                ('=', TokenKind::EqualEqual),
                TokenKind::Equal,
            )),
            '!' => Ok(self.operator(start_idx, ('=', TokenKind::BangEqual), TokenKind::Bang)),
            '<' => Ok(self.operator(start_idx, ('=', TokenKind::LessEqual), TokenKind::Less)),
            '>' => Ok(self.operator(
                start_idx,
                ('=', TokenKind::GreaterEqual),
                TokenKind::Greater,
            )),
            '&' | '|' => {
                self.advance_char();
                match (ch, self.chars.peek().map(|&(_, c)| c)) {
                    ('&', Some('&')) => {
                        self.advance_char();
                        Ok(self.token_from(TokenKind::AmpAmp, start_idx, start_line, start_column))
                    }
                    ('|', Some('|')) => {
                        self.advance_char();
                        Ok(self.token_from(
                            TokenKind::PipePipe,
                            start_idx,
                            start_line,
                            start_column,
                        ))
                    }
                    _ => Err(LexError::UnexpectedCharacter {
                        character: ch,
                        line: start_line,
                        column: start_column,
                    }),
                }
            }
            '+' => Ok(self.single(TokenKind::Plus, start_idx)),
            '-' => Ok(self.single(TokenKind::Minus, start_idx)),
            '*' => Ok(self.single(TokenKind::Star, start_idx)),
            '/' => Ok(self.single(TokenKind::Slash, start_idx)),
            '%' => Ok(self.single(TokenKind::Percent, start_idx)),
            ':' => Ok(self.single(TokenKind::Colon, start_idx)),
            ';' => Ok(self.single(TokenKind::Semicolon, start_idx)),
            ',' => Ok(self.single(TokenKind::Comma, start_idx)),
            '.' => Ok(self.single(TokenKind::Dot, start_idx)),
            '(' => Ok(self.single(TokenKind::LParen, start_idx)),
            ')' => Ok(self.single(TokenKind::RParen, start_idx)),
            '"' | '\'' => self.read_string(ch, start_idx, start_line, start_column),
            c if c.is_alphabetic() || c == '_' => {
                Ok(self.read_identifier(start_idx, start_line, start_column))
            }
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column),
            _ => Err(LexError::UnexpectedCharacter {
                character: ch,
                line: start_line,
                column: start_column,
            }),
        }
    }

    fn count_indentation(&mut self) -> LexResult<usize> {
        // Look ahead on a clone first: blank and comment-only lines keep the
        // current indentation so they never emit Indent/Dedent.
        let mut temp_chars = self.chars.clone();
        let mut column = self.column;
        let mut is_empty_line = true;

        while let Some(&(_, c)) = temp_chars.peek() {
            match c {
                ' ' | '\r' => {
                    temp_chars.next();
                    column += 1;
                }
                '\t' => {
                    return Err(LexError::TabIndentation {
                        line: self.line,
                        column,
                    });
                }
                '\n' | '#' => break,
                _ => {
                    is_empty_line = false;
                    break;
                }
            }
        }

        if is_empty_line {
            return Ok(self.current_indent());
        }

        let mut count = 0;
        while let Some(&(_, ' ')) = self.chars.peek() {
            self.advance_char();
            count += 1;
        }

        Ok(count)
    }

    fn skip_whitespace_and_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance_char();
                }
                '#' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance_char();
                    }
                }
                _ => break,
            }
        }
    }

    fn single(&mut self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        let (line, column) = (self.line, self.column);
        self.advance_char();
        self.token_from(kind, start, line, column)
    }

    /// Lexes a one-character operator that may be extended by a second
    /// character into a two-character operator (`=` vs `==`).
    fn operator(
        &mut self,
        start: usize,
        (second, long): (char, TokenKind<'a>),
        short: TokenKind<'a>,
    ) -> Token<'a> {
        let (line, column) = (self.line, self.column);
        self.advance_char();
        if let Some(&(_, c)) = self.chars.peek()
            && c == second
        {
            self.advance_char();
            return self.token_from(long, start, line, column);
        }
        self.token_from(short, start, line, column)
    }

    fn token_from(
        &mut self,
        kind: TokenKind<'a>,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'a> {
        let end = self.current_index();
        Token::new(kind, Span::new(start, end, line, column))
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = TokenKind::keyword(ident).unwrap_or(TokenKind::Identifier(ident));
        Token::new(kind, Span::new(start, end_idx, line, column))
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.consume_digits();

        // A dot only continues the literal when a digit follows it, so
        // `1.foo` stays an integer followed by member access.
        let mut is_float = false;
        let mut lookahead = self.chars.clone();
        if let Some((_, '.')) = lookahead.next()
            && let Some(&(_, c)) = lookahead.peek()
            && c.is_ascii_digit()
        {
            self.advance_char();
            self.consume_digits();
            is_float = true;
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let invalid = || LexError::InvalidNumberLiteral {
            literal: literal.to_string(),
            line,
            column,
        };
        let kind = if is_float {
            TokenKind::Float(literal.parse::<f64>().map_err(|_| invalid())?)
        } else {
            TokenKind::Integer(literal.parse::<i64>().map_err(|_| invalid())?)
        };
        Ok(Token::new(kind, Span::new(start, end_idx, line, column)))
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_string(
        &mut self,
        quote: char,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        self.advance_char(); // opening quote
        let content_start = start + quote.len_utf8();
        while let Some(&(idx, c)) = self.chars.peek() {
            if c == quote {
                self.advance_char();
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    Span::new(start, idx + 1, line, column),
                ));
            }
            if c == '\n' {
                break;
            }
            if c == '\\' {
                let escape_column = self.column;
                self.advance_char();
                match self.chars.peek() {
                    Some(&(_, 'n' | 't' | '\\' | '"' | '\'')) => {
                        self.advance_char();
                    }
                    Some(&(_, other)) if other != '\n' => {
                        return Err(LexError::InvalidEscape {
                            escape: other,
                            line: self.line,
                            column: escape_column,
                        });
                    }
                    _ => break,
                }
                continue;
            }
            self.advance_char();
        }
        Err(LexError::UnterminatedString { line, column })
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn here(&mut self) -> Span {
        let index = self.current_index();
        Span::new(index, index, self.line, self.column)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    /// Yields tokens up to and including `EOF`, then stops. An error ends
    /// the sequence as well.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        if matches!(&result, Ok(token) if token.kind == TokenKind::EOF) || result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// Resolves the escapes the lexer validated inside a raw string body.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    Lexer::new(input).collect()
}
