//! Execution contexts: main, threads and tasks, grouped into processes.
//!
//! A context never uses the host stack to remember where it is. Its
//! continuation is the explicit `frames` vector: each frame holds cursors
//! into the blocks it is executing and, while a statement's operands are
//! being evaluated, the pending work stack for that statement. Suspending a
//! context is just not stepping it.

use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOperator, Block, Expression, UnaryOperator};

use super::class::InstanceRef;
use super::environment::Environment;
use super::error::RuntimeFailure;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub usize);

impl ContextId {
    pub const MAIN: ContextId = ContextId(0);
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == ContextId::MAIN {
            f.write_str("main")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub usize);

/// Reference to a schedulable unit, as held by program values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Thread(ContextId),
    Task(ContextId),
    Process(ProcessId),
}

impl Handle {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Handle::Thread(_) => "thread",
            Handle::Task(_) => "task",
            Handle::Process(_) => "process",
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Thread(id) | Handle::Task(id) => write!(f, "<{} {}>", self.kind_name(), id.0),
            Handle::Process(id) => write!(f, "<process {}>", id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Main,
    Thread,
    Task,
}

impl ContextKind {
    pub fn name(self) -> &'static str {
        match self {
            ContextKind::Main => "main",
            ContextKind::Thread => "thread",
            ContextKind::Task => "task",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    Ready,
    Running,
    Blocked,
    /// Sleeping, or a task whose start delay has not elapsed.
    Suspended,
    Completed,
    Failed,
}

impl ContextStatus {
    pub fn name(self) -> &'static str {
        match self {
            ContextStatus::Ready => "ready",
            ContextStatus::Running => "running",
            ContextStatus::Blocked => "blocked",
            ContextStatus::Suspended => "suspended",
            ContextStatus::Completed => "completed",
            ContextStatus::Failed => "failed",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, ContextStatus::Completed | ContextStatus::Failed)
    }
}

impl fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position inside one block. A loop cursor walks a `while` body; the
/// `while` statement itself stays current in the enclosing cursor.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub block: Block,
    pub index: usize,
    pub is_loop: bool,
}

impl Cursor {
    pub fn new(block: Block, is_loop: bool) -> Self {
        Self {
            block,
            index: 0,
            is_loop,
        }
    }
}

/// Operand evaluation work for the statement under the top cursor.
#[derive(Debug, Default)]
pub struct Pending {
    pub tasks: Vec<ExprTask>,
    pub values: Vec<Value>,
}

/// One unit of expression work. `Eval` expands into operand evaluations
/// followed by the operator that combines them.
#[derive(Debug)]
pub enum ExprTask {
    Eval(Rc<Expression>),
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    /// Left operand is on the value stack; decide whether to evaluate `right`.
    ShortCircuit {
        op: BinaryOperator,
        right: Rc<Expression>,
    },
    Truthy,
    Call {
        argc: usize,
    },
    Member(String),
    Construct {
        class: String,
        argc: usize,
    },
    LibraryCall {
        namespace: String,
        name: String,
        argc: usize,
    },
    /// Replaces an `init` return value with the instance being built.
    Constructed(InstanceRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAction {
    /// Push the return value onto the caller's pending values.
    Push,
    /// Bottom frame: the return value is the context's result.
    Finish,
}

#[derive(Debug)]
pub struct Frame {
    pub name: String,
    pub env: Environment,
    pub cursors: Vec<Cursor>,
    pub pending: Option<Pending>,
    pub call_line: usize,
    pub on_return: ReturnAction,
}

impl Frame {
    pub fn new(
        name: impl Into<String>,
        env: Environment,
        body: Block,
        call_line: usize,
        on_return: ReturnAction,
    ) -> Self {
        Self {
            name: name.into(),
            env,
            cursors: vec![Cursor::new(body, false)],
            pending: None,
            call_line,
            on_return,
        }
    }

    /// Line of the statement this frame is executing or about to execute.
    pub fn current_line(&self) -> usize {
        self.cursors
            .last()
            .and_then(|cursor| cursor.block.get(cursor.index))
            .map(|statement| statement.line())
            .unwrap_or(self.call_line)
    }
}

/// Result of a blocking wait, applied when the context next runs.
#[derive(Debug)]
pub enum Resume {
    Bind { name: Option<String>, value: Value },
    Fail(RuntimeFailure),
}

#[derive(Debug)]
pub struct Context {
    pub id: ContextId,
    pub kind: ContextKind,
    pub name: String,
    pub priority: i64,
    pub status: ContextStatus,
    pub process: Option<ProcessId>,
    pub frames: Vec<Frame>,
    pub result: Option<Value>,
    pub error: Option<RuntimeFailure>,
    pub cancelled: bool,
    pub resume: Option<Resume>,
}

impl Context {
    pub fn new(
        id: ContextId,
        kind: ContextKind,
        name: impl Into<String>,
        priority: i64,
        entry: Frame,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            priority,
            status: ContextStatus::Ready,
            process: None,
            frames: vec![entry],
            result: None,
            error: None,
            cancelled: false,
            resume: None,
        }
    }

    pub fn handle(&self) -> Handle {
        match self.kind {
            ContextKind::Task => Handle::Task(self.id),
            ContextKind::Main | ContextKind::Thread => Handle::Thread(self.id),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current_line(&self) -> usize {
        self.frames.last().map(Frame::current_line).unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    pub members: Vec<ContextId>,
}

impl Process {
    pub fn new(id: ProcessId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: Vec::new(),
        }
    }
}
