#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Integer(i64),
    Float(f64),
    /// Raw string body between the quotes, escapes not yet resolved.
    String(&'a str),
    True,
    False,
    Null,

    // Keywords
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Function,
    Return,
    Class,
    Extends,
    New,
    Pass,
    And,
    Or,
    Not,
    As,
    Memory,
    Thread,
    Task,
    Process,
    Yield,
    Sleep,
    Join,
    Cancel,
    Lock,
    Unlock,
    Debug,
    Breakpoint,

    // Operators
    Equal,        // =
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Bang,         // !
    AmpAmp,       // &&
    PipePipe,     // ||

    // Delimiters
    Colon,     // :
    Semicolon, // ;
    Comma,     // ,
    Dot,       // .
    LParen,    // (
    RParen,    // )

    // Structural
    Newline,
    Indent,
    Dedent,
    EOF,
}

impl TokenKind<'_> {
    /// Exact-match keyword table. Anything else lexes as an identifier.
    pub fn keyword(ident: &str) -> Option<TokenKind<'static>> {
        let kind = match ident {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "class" => TokenKind::Class,
            "extends" => TokenKind::Extends,
            "new" => TokenKind::New,
            "pass" => TokenKind::Pass,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "as" => TokenKind::As,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "memory" => TokenKind::Memory,
            "thread" => TokenKind::Thread,
            "task" => TokenKind::Task,
            "process" => TokenKind::Process,
            "yield" => TokenKind::Yield,
            "sleep" => TokenKind::Sleep,
            "join" => TokenKind::Join,
            "cancel" => TokenKind::Cancel,
            "lock" => TokenKind::Lock,
            "unlock" => TokenKind::Unlock,
            "debug" => TokenKind::Debug,
            "breakpoint" => TokenKind::Breakpoint,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable rendering used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Integer(value) => format!("integer {value}"),
            TokenKind::Float(value) => format!("float {value}"),
            TokenKind::String(value) => format!("string \"{value}\""),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::EOF => "end of input".to_string(),
            other => format!("{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind<'a>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TokenKind<'a> {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}
