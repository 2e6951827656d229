//! Statement-stepping interpreter with an embedded cooperative scheduler.
//!
//! Execution pipeline:
//! run -> drive (dispatch loop) -> run_slice -> step (one statement boundary)
//! -> eval_task (operand work stack) -> apply_statement / apply_command.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::ast::Program;
use crate::builtins::BuiltinFunction;
use crate::config::RuntimeConfig;
use crate::runtime::class::ClassArena;
use crate::runtime::context::{
    Context, ContextId, ContextKind, ContextStatus, Frame, Handle, Process, Resume, ReturnAction,
};
use crate::runtime::debugger::{Breakpoint, Debugger, PauseReason, StepMode};
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeFailure};
use crate::runtime::library::{Library, LibraryError, LibraryRegistry};
use crate::runtime::memory::MemoryTable;
use crate::runtime::scheduler::{Blocked, Scheduler, WaitCondition};
use crate::runtime::value::Value;

mod commands;
mod eval;
mod exec;
pub mod outcome;

use exec::Flow;
use outcome::{
    ContextSummary, Inspection, ProcessSummary, RunOutcome, RunState, RunStatus, StackEntry,
    TraceEvent,
};

/// One program run: the global scope, buffers, classes, every execution
/// context and the scheduler interleaving them.
pub struct Interpreter {
    config: RuntimeConfig,
    globals: Environment,
    memory: MemoryTable,
    classes: ClassArena,
    contexts: Vec<Context>,
    processes: Vec<Process>,
    scheduler: Scheduler,
    debugger: Debugger,
    /// Lock name to owning context.
    locks: BTreeMap<String, ContextId>,
    libraries: LibraryRegistry,
    output: Vec<String>,
    trace: Vec<TraceEvent>,
    /// Context holding the current slice.
    current: Option<ContextId>,
    slice_used: usize,
    status: Option<RunStatus>,
    paused: Option<(ContextId, PauseReason)>,
    pauses: Vec<Inspection>,
}

impl Interpreter {
    pub fn new(program: &Program, config: RuntimeConfig) -> Self {
        let globals = Environment::new();
        for builtin in BuiltinFunction::ALL {
            globals.define(builtin.name(), Value::Builtin(builtin));
        }
        let entry = Frame::new(
            "<main>",
            globals.clone(),
            program.statements.clone(),
            0,
            ReturnAction::Finish,
        );
        let main = Context::new(ContextId::MAIN, ContextKind::Main, "main", 0, entry);
        let mut scheduler = Scheduler::new();
        scheduler.enqueue(ContextId::MAIN, 0);

        Self {
            debugger: Debugger::new(config.debug),
            config,
            globals,
            memory: MemoryTable::new(),
            classes: ClassArena::new(),
            contexts: vec![main],
            processes: Vec::new(),
            scheduler,
            locks: BTreeMap::new(),
            libraries: LibraryRegistry::new(),
            output: Vec::new(),
            trace: Vec::new(),
            current: None,
            slice_used: 0,
            status: None,
            paused: None,
            pauses: Vec::new(),
        }
    }

    pub fn register_library(
        &mut self,
        namespace: &str,
        library: Box<dyn Library>,
    ) -> Result<(), LibraryError> {
        self.libraries.register(namespace, library)
    }

    /// Runs until the program finishes or the debugger pauses it.
    pub fn run(&mut self) -> RunState {
        self.drive()
    }

    /// Continues a paused run without stepping.
    pub fn resume(&mut self) -> RunState {
        self.proceed(StepMode::Run)
    }

    /// Continues and pauses before the next statement of the paused context.
    pub fn step_into(&mut self) -> RunState {
        let context = self.focus();
        self.proceed(StepMode::StepInto { context })
    }

    /// Like `step_into`, but runs calls made by the current statement to
    /// completion.
    pub fn step_over(&mut self) -> RunState {
        let context = self.focus();
        let depth = self.contexts[context.0].depth();
        self.proceed(StepMode::StepOver { context, depth })
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.debugger.set_breakpoint(line);
    }

    pub fn clear_breakpoint(&mut self, line: usize) -> bool {
        self.debugger.clear_breakpoint(line)
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.debugger.breakpoints()
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debugger.set_enabled(enabled);
    }

    pub fn is_debugging(&self) -> bool {
        self.debugger.is_enabled()
    }

    /// State of the paused context, if the run is paused.
    pub fn inspect(&self) -> Option<Inspection> {
        self.paused
            .map(|(id, reason)| self.inspection(id, Some(reason)))
    }

    /// Runs to completion, recording each pause and resuming in the step
    /// mode that was active.
    pub fn run_to_end(&mut self) -> RunStatus {
        info!(quantum = self.config.quantum, "run started");
        let mut state = self.drive();
        loop {
            match state {
                RunState::Paused(inspection) => {
                    self.pauses.push(inspection);
                    state = self.proceed(self.debugger.mode());
                }
                RunState::Finished(status) => {
                    info!(status = %status, turns = self.scheduler.clock(), "run finished");
                    return status;
                }
            }
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        let globals = self
            .globals
            .bindings()
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Builtin(_)))
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        let contexts = self
            .contexts
            .iter()
            .map(|context| ContextSummary {
                id: context.id,
                name: context.name.clone(),
                kind: context.kind,
                status: context.status,
                process: context.process,
                error: context.error.as_ref().map(ToString::to_string),
            })
            .collect();
        let processes = self
            .processes
            .iter()
            .map(|process| ProcessSummary {
                id: process.id,
                name: process.name.clone(),
                status: self.handle_status(Handle::Process(process.id)).to_string(),
                members: process.members.clone(),
            })
            .collect();
        RunOutcome {
            status: self.status.clone().unwrap_or(RunStatus::Completed),
            output: self.output.clone(),
            globals,
            contexts,
            processes,
            trace: self.trace.clone(),
            pauses: self.pauses.clone(),
        }
    }

    fn focus(&self) -> ContextId {
        self.paused
            .map(|(id, _)| id)
            .or(self.current)
            .unwrap_or(ContextId::MAIN)
    }

    fn proceed(&mut self, mode: StepMode) -> RunState {
        if self.paused.take().is_some() {
            self.debugger.resume(mode);
        } else {
            self.debugger.set_mode(mode);
        }
        self.drive()
    }

    /// The dispatch loop: finish the current slice, then release timers,
    /// wake waiters and pick the next ready context.
    fn drive(&mut self) -> RunState {
        loop {
            if let Some(status) = &self.status {
                return RunState::Finished(status.clone());
            }
            if let Some(id) = self.current {
                if let Some(inspection) = self.run_slice(id) {
                    return RunState::Paused(inspection);
                }
                self.current = None;
                continue;
            }

            self.scheduler.release_timers();
            self.wake_blocked();
            if let Some((id, turn)) = self.scheduler.dispatch() {
                debug!(context = %id, turn, "dispatch");
                self.trace.push(TraceEvent::Dispatch { turn, context: id });
                self.contexts[id.0].status = ContextStatus::Running;
                self.current = Some(id);
                self.slice_used = 0;
                continue;
            }
            if self.scheduler.fast_forward() {
                continue;
            }
            if let Some(blocked) = self.scheduler.pop_oldest_blocked() {
                let error = RuntimeError::Deadlock {
                    waiting_for: blocked.condition.to_string(),
                };
                self.fail_context(
                    blocked.id,
                    RuntimeFailure::new(error, blocked.line, blocked.column),
                );
                continue;
            }
            self.status = Some(RunStatus::Completed);
        }
    }

    /// Steps `id` until its slice ends. Returns an inspection if the
    /// debugger paused it; the slice then continues on the next `drive`.
    fn run_slice(&mut self, id: ContextId) -> Option<Inspection> {
        loop {
            let priority = self.contexts[id.0].priority;
            match self.step(id) {
                Ok(Flow::Next) => {}
                Ok(Flow::Yield) => {
                    self.requeue(id, priority);
                    return None;
                }
                Ok(Flow::Preempt) => {
                    debug!(context = %id, used = self.slice_used, "quantum exhausted");
                    self.requeue(id, priority);
                    return None;
                }
                Ok(Flow::Sleep(turns)) => {
                    self.contexts[id.0].status = ContextStatus::Suspended;
                    self.scheduler.sleep(id, priority, turns);
                    return None;
                }
                Ok(Flow::Block(wait)) => {
                    debug!(context = %id, waiting_for = %wait.condition, "blocked");
                    self.contexts[id.0].status = ContextStatus::Blocked;
                    let since = self.scheduler.clock();
                    self.scheduler.block(Blocked {
                        id,
                        priority,
                        condition: wait.condition,
                        bind: wait.bind,
                        since,
                        deadline: wait.timeout.map(|turns| since.saturating_add(turns)),
                        line: wait.line,
                        column: wait.column,
                    });
                    return None;
                }
                Ok(Flow::Finished(value)) => {
                    self.complete_context(id, value);
                    return None;
                }
                Ok(Flow::Cancelled) => {
                    self.contexts[id.0].cancelled = true;
                    let line = self.contexts[id.0].current_line();
                    self.fail_context(id, RuntimeFailure::new(RuntimeError::Cancelled, line, 0));
                    return None;
                }
                Ok(Flow::Pause(reason)) => {
                    debug!(context = %id, ?reason, "debugger pause");
                    self.paused = Some((id, reason));
                    return Some(self.inspection(id, Some(reason)));
                }
                Err(failure) => {
                    self.fail_context(id, failure);
                    return None;
                }
            }
        }
    }

    fn requeue(&mut self, id: ContextId, priority: i64) {
        self.contexts[id.0].status = ContextStatus::Ready;
        self.scheduler.enqueue(id, priority);
    }

    /// Re-checks every blocked context, oldest first. Satisfied or expired
    /// waits are resumed; the rest stay blocked in their original order.
    fn wake_blocked(&mut self) {
        for blocked in self.scheduler.drain_blocked() {
            let resume = match self.poll_wait(&blocked) {
                Ok(None) => {
                    self.scheduler.block(blocked);
                    continue;
                }
                Ok(Some(value)) => Resume::Bind {
                    name: blocked.bind,
                    value,
                },
                Err(error) => Resume::Fail(RuntimeFailure::new(error, blocked.line, blocked.column)),
            };
            debug!(context = %blocked.id, "woken");
            self.contexts[blocked.id.0].resume = Some(resume);
            self.requeue(blocked.id, blocked.priority);
        }
    }

    fn poll_wait(&mut self, blocked: &Blocked) -> Result<Option<Value>, RuntimeError> {
        let ready = match &blocked.condition {
            WaitCondition::Join(handle) => self.join_result(*handle).transpose()?,
            WaitCondition::Lock(name) => {
                if self.locks.contains_key(name) {
                    None
                } else {
                    self.locks.insert(name.clone(), blocked.id);
                    Some(Value::Null)
                }
            }
            WaitCondition::Slot { buffer, index } => self
                .memory
                .is_written(buffer, *index)?
                .then_some(Value::Null),
        };
        if ready.is_some() {
            return Ok(ready);
        }
        if let Some(deadline) = blocked.deadline
            && self.scheduler.clock() >= deadline
        {
            return Err(RuntimeError::Timeout {
                waiting_for: blocked.condition.to_string(),
                turns: deadline - blocked.since,
            });
        }
        Ok(None)
    }

    fn complete_context(&mut self, id: ContextId, value: Value) {
        debug!(context = %id, result = %value, "context completed");
        let context = &mut self.contexts[id.0];
        context.status = ContextStatus::Completed;
        context.result = Some(value);
        self.retire(id);
    }

    /// Marks `id` failed and records why. A failure in main ends the run.
    fn fail_context(&mut self, id: ContextId, failure: RuntimeFailure) {
        let context = &mut self.contexts[id.0];
        if context.status.is_finished() {
            return;
        }
        warn!(context = %id, name = %context.name, error = %failure, "context failed");
        context.status = ContextStatus::Failed;
        if id == ContextId::MAIN {
            self.status = Some(RunStatus::from_failure(&failure));
        }
        context.error = Some(failure);
        self.retire(id);
    }

    /// Bookkeeping shared by completion and failure.
    fn retire(&mut self, id: ContextId) {
        let context = &mut self.contexts[id.0];
        context.frames.clear();
        context.resume = None;
        let status = context.status;
        self.locks.retain(|_, owner| *owner != id);
        self.scheduler.remove(id);
        if self.current == Some(id) {
            self.current = None;
        }
        self.trace.push(TraceEvent::Finished {
            context: id,
            status,
        });
    }

    pub(super) fn top_frame_mut(&mut self, id: ContextId) -> Option<&mut Frame> {
        self.contexts[id.0].frames.last_mut()
    }

    /// Scope of the innermost frame of `id`; globals once its frames are gone.
    pub(super) fn scope(&self, id: ContextId) -> Environment {
        self.contexts[id.0]
            .frames
            .last()
            .map_or_else(|| self.globals.clone(), |frame| frame.env.clone())
    }

    pub(super) fn emit(&mut self, id: ContextId, text: String) {
        self.trace.push(TraceEvent::Output {
            context: id,
            text: text.clone(),
        });
        self.output.push(text);
    }

    pub(super) fn handle_status(&self, handle: Handle) -> &'static str {
        match handle {
            Handle::Thread(id) | Handle::Task(id) => self
                .contexts
                .get(id.0)
                .map_or("unknown", |context| context.status.name()),
            Handle::Process(pid) => {
                let Some(process) = self.processes.get(pid.0) else {
                    return "unknown";
                };
                let statuses = process
                    .members
                    .iter()
                    .map(|member| self.contexts[member.0].status);
                let mut failed = false;
                for status in statuses {
                    if !status.is_finished() {
                        return "running";
                    }
                    failed |= status == ContextStatus::Failed;
                }
                if failed { "failed" } else { "completed" }
            }
        }
    }

    /// Message of the first recorded failure behind `handle`.
    pub(super) fn handle_error(&self, handle: Handle) -> Option<String> {
        let members = match handle {
            Handle::Thread(id) | Handle::Task(id) => vec![id],
            Handle::Process(pid) => self.processes.get(pid.0)?.members.clone(),
        };
        members.into_iter().find_map(|member| {
            self.contexts
                .get(member.0)?
                .error
                .as_ref()
                .map(|failure| failure.error.to_string())
        })
    }

    fn inspection(&self, id: ContextId, reason: Option<PauseReason>) -> Inspection {
        let context = &self.contexts[id.0];
        let variables = context
            .frames
            .last()
            .map(|frame| frame.env.bindings())
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Builtin(_)))
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        let call_stack = context
            .frames
            .iter()
            .rev()
            .map(|frame| StackEntry {
                function: frame.name.clone(),
                line: frame.current_line(),
            })
            .collect();
        Inspection {
            context: id,
            line: context.current_line(),
            reason,
            variables,
            call_stack,
            buffers: self.memory.views(),
        }
    }
}
