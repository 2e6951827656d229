//! Syntax tree produced by the parser and walked by the interpreter.
//!
//! Children are reference counted rather than boxed: a suspended execution
//! context keeps cursors into blocks and expressions it has not finished, and
//! function values keep their declaration alive after the defining block is
//! gone.

use std::rc::Rc;

use crate::token::Span;

pub type Block = Rc<[Statement]>;

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
    Identifier(String),
    Unary {
        op: UnaryOperator,
        operand: Rc<Expression>,
    },
    BinaryOp {
        left: Rc<Expression>,
        op: BinaryOperator,
        right: Rc<Expression>,
    },
    Call {
        callee: Rc<Expression>,
        args: Vec<Rc<Expression>>,
    },
    Member {
        object: Rc<Expression>,
        name: String,
    },
    New {
        class: String,
        args: Vec<Rc<Expression>>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum StatementKind {
    Assign {
        target: AssignTarget,
        value: Rc<Expression>,
    },
    If {
        condition: Rc<Expression>,
        then_body: Block,
        else_body: Block,
    },
    While {
        condition: Rc<Expression>,
        body: Block,
    },
    FunctionDef(Rc<FunctionDecl>),
    Return(Option<Rc<Expression>>),
    ClassDef {
        name: String,
        parent: Option<String>,
        methods: Vec<Rc<FunctionDecl>>,
    },
    Break,
    Continue,
    Pass,
    Memory(MemoryCommand),
    Thread(SpawnCommand),
    Task {
        spawn: SpawnCommand,
        priority: Option<Rc<Expression>>,
        delay: Option<Rc<Expression>>,
    },
    Process(SpawnCommand),
    Yield,
    Sleep(Rc<Expression>),
    Join {
        handle: Rc<Expression>,
        timeout: Option<Rc<Expression>>,
        bind: Option<String>,
    },
    Cancel(Rc<Expression>),
    Lock(String),
    Unlock(String),
    Debug(DebugCommand),
    Breakpoint(BreakpointCommand),
    Expr(Rc<Expression>),
}

/// Assignment target forms accepted by the parser.
#[derive(Debug, PartialEq, Clone)]
pub enum AssignTarget {
    Name(String),
    Attribute { object: Rc<Expression>, name: String },
}

#[derive(Debug, PartialEq, Clone)]
pub enum MemoryCommand {
    Allocate {
        buffer: String,
        size: Rc<Expression>,
    },
    Write {
        buffer: String,
        index: Rc<Expression>,
        value: Rc<Expression>,
    },
    Read {
        buffer: String,
        index: Rc<Expression>,
        bind: Option<String>,
    },
    Free {
        buffer: String,
    },
    Wait {
        buffer: String,
        index: Rc<Expression>,
        timeout: Option<Rc<Expression>>,
    },
}

/// `CALLEE(args) [as NAME]` shared by `thread start`, `task schedule` and
/// `process start`.
#[derive(Debug, PartialEq, Clone)]
pub struct SpawnCommand {
    pub callee: Rc<Expression>,
    pub args: Vec<Rc<Expression>>,
    pub bind: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DebugCommand {
    On,
    Off,
    Step,
    Over,
    Continue,
    Variables,
    CallStack,
    Memory,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BreakpointCommand {
    Set(usize),
    Clear(usize),
    ClearAll,
    Enable(usize),
    Disable(usize),
    List,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub statements: Block,
}
