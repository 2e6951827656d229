use std::collections::BTreeMap;
use std::fmt;

use crate::parser::ParseError;
use crate::runtime::context::{ContextId, ContextKind, ContextStatus, ProcessId};
use crate::runtime::debugger::PauseReason;
use crate::runtime::error::{ErrorKind, RuntimeFailure};
use crate::runtime::memory::BufferView;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    RuntimeError {
        kind: ErrorKind,
        message: String,
        line: usize,
        column: usize,
    },
    ParseError {
        message: String,
    },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub(crate) fn from_failure(failure: &RuntimeFailure) -> Self {
        RunStatus::RuntimeError {
            kind: failure.kind(),
            message: failure.error.to_string(),
            line: failure.line,
            column: failure.column,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => f.write_str("completed"),
            RunStatus::RuntimeError {
                kind,
                message,
                line,
                column,
            } => write!(f, "{kind}: {message} at line {line}, column {column}"),
            RunStatus::ParseError { message } => write!(f, "ParseError: {message}"),
        }
    }
}

/// Returned by the interpreter whenever it hands control back to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Paused(Inspection),
    Finished(RunStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEntry {
    pub function: String,
    pub line: usize,
}

/// Read-only view of one context, taken at a pause or by a `debug`
/// listing statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub context: ContextId,
    pub line: usize,
    /// `None` when produced by a `debug` statement rather than a pause.
    pub reason: Option<PauseReason>,
    /// Bindings of the innermost frame's own scope, rendered.
    pub variables: Vec<(String, String)>,
    /// Innermost frame first.
    pub call_stack: Vec<StackEntry>,
    pub buffers: Vec<BufferView>,
}

impl Inspection {
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn variables_listing(&self) -> Vec<String> {
        let mut lines = vec!["Variables:".to_string()];
        if self.variables.is_empty() {
            lines.push("  No variables defined".to_string());
        }
        for (name, value) in &self.variables {
            lines.push(format!("  {name} = {value}"));
        }
        lines
    }

    pub fn call_stack_listing(&self) -> Vec<String> {
        let mut lines = vec!["Call stack:".to_string()];
        for (depth, entry) in self.call_stack.iter().enumerate() {
            lines.push(format!("  {depth}: {} (line {})", entry.function, entry.line));
        }
        lines
    }

    pub fn memory_listing(&self) -> Vec<String> {
        let mut lines = vec!["Memory:".to_string()];
        if self.buffers.is_empty() {
            lines.push("  No buffers allocated".to_string());
        }
        for buffer in &self.buffers {
            if !buffer.live {
                lines.push(format!("  {} (freed)", buffer.name));
                continue;
            }
            let slots = buffer
                .slots
                .iter()
                .map(|slot| slot.as_deref().unwrap_or("_"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("  {}[{}] = [{slots}]", buffer.name, buffer.capacity));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    pub id: ContextId,
    pub name: String,
    pub kind: ContextKind,
    pub status: ContextStatus,
    pub process: Option<ProcessId>,
    pub error: Option<String>,
}

/// A process group as seen at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub id: ProcessId,
    /// Name of the function the process was started with.
    pub name: String,
    /// `running`, `completed` or `failed`.
    pub status: String,
    pub members: Vec<ContextId>,
}

/// Scheduler-visible events, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Dispatch { turn: u64, context: ContextId },
    Output { context: ContextId, text: String },
    Finished { context: ContextId, status: ContextStatus },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Dispatch { turn, context } => write!(f, "[{turn}] run {context}"),
            TraceEvent::Output { context, text } => write!(f, "{context}: {text}"),
            TraceEvent::Finished { context, status } => write!(f, "{context} {status}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub output: Vec<String>,
    /// Final global bindings rendered as display strings, builtins omitted.
    pub globals: BTreeMap<String, String>,
    pub contexts: Vec<ContextSummary>,
    pub processes: Vec<ProcessSummary>,
    pub trace: Vec<TraceEvent>,
    pub pauses: Vec<Inspection>,
}

impl RunOutcome {
    pub(crate) fn parse_error(error: &ParseError) -> Self {
        Self {
            status: RunStatus::ParseError {
                message: error.to_string(),
            },
            output: Vec::new(),
            globals: BTreeMap::new(),
            contexts: Vec::new(),
            processes: Vec::new(),
            trace: Vec::new(),
            pauses: Vec::new(),
        }
    }

    /// Output lines, each newline-terminated.
    pub fn stdout(&self) -> String {
        self.output.iter().map(|line| format!("{line}\n")).collect()
    }

    pub fn context(&self, name: &str) -> Option<&ContextSummary> {
        self.contexts.iter().find(|context| context.name == name)
    }

    pub fn process(&self, name: &str) -> Option<&ProcessSummary> {
        self.processes.iter().find(|process| process.name == name)
    }
}
