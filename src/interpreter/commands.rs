use tracing::debug;

use crate::ast::{
    BreakpointCommand, DebugCommand, MemoryCommand, SpawnCommand, Statement, StatementKind,
};
use crate::runtime::context::{
    Context, ContextId, ContextKind, ContextStatus, Handle, Process, ProcessId, ReturnAction,
};
use crate::runtime::debugger::StepMode;
use crate::runtime::environment::Environment;
use crate::runtime::error::{RuntimeError, RuntimeFailure};
use crate::runtime::scheduler::WaitCondition;
use crate::runtime::value::Value;

use super::Interpreter;
use super::eval::{expect_handle, function_frame};
use super::exec::{Flow, Wait};

impl Interpreter {
    /// Memory, concurrency and debugger statements. `operand` yields the
    /// statement's evaluated operands in source order.
    pub(super) fn apply_command<F>(
        &mut self,
        id: ContextId,
        statement: &Statement,
        operand: &mut F,
    ) -> Result<Flow, RuntimeError>
    where
        F: FnMut() -> Value,
    {
        let env = self.scope(id);
        let wait = |condition, timeout, bind| Wait {
            condition,
            timeout,
            bind,
            line: statement.span.line,
            column: statement.span.column,
        };

        match &statement.kind {
            StatementKind::Memory(command) => match command {
                MemoryCommand::Allocate { buffer, .. } => {
                    let size = operand().as_int("memory allocate")?;
                    let handle = self.memory.allocate(buffer, size)?;
                    env.define(buffer.clone(), Value::Buffer(handle));
                }
                MemoryCommand::Write { buffer, .. } => {
                    let index = operand().as_int("memory write")?;
                    let value = operand();
                    self.memory.write(buffer, index, value)?;
                }
                MemoryCommand::Read { buffer, bind, .. } => {
                    let index = operand().as_int("memory read")?;
                    let value = self.memory.read(buffer, index)?;
                    match bind {
                        Some(name) => env.assign(name, value),
                        None => self.emit(id, value.to_string()),
                    }
                }
                MemoryCommand::Free { buffer } => self.memory.free(buffer)?,
                MemoryCommand::Wait {
                    buffer, timeout, ..
                } => {
                    let index = operand().as_int("memory wait")?;
                    let timeout = timeout
                        .as_ref()
                        .map(|_| turns("memory wait timeout", operand()))
                        .transpose()?;
                    if !self.memory.is_written(buffer, index)? {
                        self.advance(id);
                        let condition = WaitCondition::Slot {
                            buffer: buffer.clone(),
                            index,
                        };
                        return Ok(Flow::Block(wait(condition, timeout, None)));
                    }
                }
            },
            StatementKind::Thread(spawn) => {
                let callee = operand();
                let args = spawn.args.iter().map(|_| operand()).collect();
                let priority = self.contexts[id.0].priority;
                let process = self.contexts[id.0].process;
                let child = self.spawn(id, ContextKind::Thread, callee, args, priority, 0, process)?;
                bind_handle(&env, spawn, Handle::Thread(child));
            }
            StatementKind::Task {
                spawn,
                priority,
                delay,
            } => {
                let callee = operand();
                let args = spawn.args.iter().map(|_| operand()).collect();
                let priority = match priority {
                    Some(_) => operand().as_int("task priority")?,
                    None => 0,
                };
                let delay = match delay {
                    Some(_) => turns("task delay", operand())?,
                    None => 0,
                };
                let process = self.contexts[id.0].process;
                let child =
                    self.spawn(id, ContextKind::Task, callee, args, priority, delay, process)?;
                bind_handle(&env, spawn, Handle::Task(child));
            }
            StatementKind::Process(spawn) => {
                let callee = operand();
                let args = spawn.args.iter().map(|_| operand()).collect();
                let priority = self.contexts[id.0].priority;
                let pid = ProcessId(self.processes.len());
                let child = self.spawn(
                    id,
                    ContextKind::Thread,
                    callee,
                    args,
                    priority,
                    0,
                    Some(pid),
                )?;
                let name = self.contexts[child.0].name.clone();
                let mut process = Process::new(pid, name);
                process.members.push(child);
                self.processes.push(process);
                bind_handle(&env, spawn, Handle::Process(pid));
            }
            StatementKind::Yield => {
                self.advance(id);
                return Ok(Flow::Yield);
            }
            StatementKind::Sleep(_) => {
                let turns = turns("sleep", operand())?;
                self.advance(id);
                return Ok(Flow::Sleep(turns));
            }
            StatementKind::Join { timeout, bind, .. } => {
                let handle = expect_handle("join", &operand())?;
                let timeout = timeout
                    .as_ref()
                    .map(|_| turns("join timeout", operand()))
                    .transpose()?;
                if self.is_self(id, handle) {
                    return Err(RuntimeError::SelfJoin {
                        handle: handle.to_string(),
                    });
                }
                self.advance(id);
                return match self.join_result(handle) {
                    Some(result) => {
                        let value = result?;
                        if let Some(name) = bind {
                            env.assign(name, value);
                        }
                        Ok(Flow::Next)
                    }
                    None => Ok(Flow::Block(wait(
                        WaitCondition::Join(handle),
                        timeout,
                        bind.clone(),
                    ))),
                };
            }
            StatementKind::Cancel(_) => {
                let handle = expect_handle("cancel", &operand())?;
                if self.cancel(id, handle) {
                    return Ok(Flow::Cancelled);
                }
            }
            StatementKind::Lock(name) => match self.locks.get(name).copied() {
                None => {
                    self.locks.insert(name.clone(), id);
                }
                Some(owner) if owner == id => {
                    return Err(RuntimeError::LockAlreadyHeld { name: name.clone() });
                }
                Some(_) => {
                    self.advance(id);
                    let condition = WaitCondition::Lock(name.clone());
                    return Ok(Flow::Block(wait(condition, None, None)));
                }
            },
            StatementKind::Unlock(name) => {
                if self.locks.get(name) != Some(&id) {
                    return Err(RuntimeError::LockNotHeld { name: name.clone() });
                }
                self.locks.remove(name);
            }
            StatementKind::Debug(command) => self.debug_command(id, *command),
            StatementKind::Breakpoint(command) => self.breakpoint_command(id, *command),
            _ => {}
        }
        self.advance(id);
        Ok(Flow::Next)
    }

    /// Creates a context running `callee(args)` and queues it, after `delay`
    /// turns when non-zero.
    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &mut self,
        creator: ContextId,
        kind: ContextKind,
        callee: Value,
        args: Vec<Value>,
        priority: i64,
        delay: u64,
        process: Option<ProcessId>,
    ) -> Result<ContextId, RuntimeError> {
        let call_line = self.contexts[creator.0].current_line();
        let frame = match callee {
            Value::Function(function) => {
                function_frame(&function, None, args, call_line, ReturnAction::Finish)?
            }
            Value::Method(method) => function_frame(
                &method.function,
                Some(method.receiver.clone()),
                args,
                call_line,
                ReturnAction::Finish,
            )?,
            other => {
                return Err(RuntimeError::NotCallable {
                    type_name: other.type_name().to_string(),
                });
            }
        };

        let id = ContextId(self.contexts.len());
        let mut context = Context::new(id, kind, frame.name.clone(), priority, frame);
        context.process = process;
        if let Some(pid) = process
            && let Some(group) = self.processes.get_mut(pid.0)
        {
            group.members.push(id);
        }
        if delay > 0 {
            context.status = ContextStatus::Suspended;
            self.scheduler.sleep(id, priority, delay);
        } else {
            self.scheduler.enqueue(id, priority);
        }
        debug!(
            context = %id,
            kind = kind.name(),
            name = %context.name,
            priority,
            delay,
            "context spawned"
        );
        self.contexts.push(context);
        Ok(id)
    }

    /// Whether `handle` names the caller or the process it belongs to.
    fn is_self(&self, id: ContextId, handle: Handle) -> bool {
        match handle {
            Handle::Thread(target) | Handle::Task(target) => target == id,
            Handle::Process(pid) => self.contexts[id.0].process == Some(pid),
        }
    }

    /// Result of joining `handle` now, or `None` while it is still running.
    pub(super) fn join_result(&self, handle: Handle) -> Option<Result<Value, RuntimeError>> {
        let cancelled = || {
            Err(RuntimeError::JoinCancelled {
                handle: handle.to_string(),
            })
        };
        match handle {
            Handle::Thread(target) | Handle::Task(target) => {
                let context = self.contexts.get(target.0)?;
                match context.status {
                    ContextStatus::Completed => {
                        Some(Ok(context.result.clone().unwrap_or(Value::Null)))
                    }
                    ContextStatus::Failed if context.cancelled => Some(cancelled()),
                    ContextStatus::Failed => Some(Ok(Value::Null)),
                    _ => None,
                }
            }
            Handle::Process(pid) => {
                let process = self.processes.get(pid.0)?;
                let finished = process
                    .members
                    .iter()
                    .all(|member| self.contexts[member.0].status.is_finished());
                let was_cancelled = process
                    .members
                    .iter()
                    .any(|member| self.contexts[member.0].cancelled);
                if !finished {
                    None
                } else if was_cancelled {
                    Some(cancelled())
                } else {
                    Some(Ok(Value::Null))
                }
            }
        }
    }

    /// Cancels `handle`. Returns true when the caller cancelled itself and
    /// must stop running.
    fn cancel(&mut self, id: ContextId, handle: Handle) -> bool {
        let targets = match handle {
            Handle::Thread(target) | Handle::Task(target) => vec![target],
            Handle::Process(pid) => self
                .processes
                .get(pid.0)
                .map(|process| process.members.clone())
                .unwrap_or_default(),
        };
        let mut cancelled_self = false;
        for target in targets {
            if target == id {
                cancelled_self = true;
            } else {
                self.cancel_context(target);
            }
        }
        cancelled_self
    }

    /// Fails an unfinished context with `CancelledError`.
    pub(super) fn cancel_context(&mut self, target: ContextId) {
        let Some(context) = self.contexts.get_mut(target.0) else {
            return;
        };
        if context.status.is_finished() {
            return;
        }
        context.cancelled = true;
        let line = context.current_line();
        debug!(context = %target, "context cancelled");
        self.fail_context(target, RuntimeFailure::new(RuntimeError::Cancelled, line, 0));
    }

    fn debug_command(&mut self, id: ContextId, command: DebugCommand) {
        let message = match command {
            DebugCommand::On => {
                self.debugger.set_enabled(true);
                "Debug mode enabled"
            }
            DebugCommand::Off => {
                self.debugger.set_enabled(false);
                "Debug mode disabled"
            }
            DebugCommand::Step => {
                self.debugger.set_mode(StepMode::StepInto { context: id });
                "Step-by-step execution enabled"
            }
            DebugCommand::Over => {
                let depth = self.contexts[id.0].depth();
                self.debugger.set_mode(StepMode::StepOver { context: id, depth });
                "Stepping over calls"
            }
            DebugCommand::Continue => {
                self.debugger.set_mode(StepMode::Run);
                "Continuing execution"
            }
            DebugCommand::Variables | DebugCommand::CallStack | DebugCommand::Memory => {
                let inspection = self.inspection(id, None);
                let lines = match command {
                    DebugCommand::Variables => inspection.variables_listing(),
                    DebugCommand::CallStack => inspection.call_stack_listing(),
                    _ => inspection.memory_listing(),
                };
                for line in lines {
                    self.emit(id, line);
                }
                return;
            }
        };
        self.emit(id, message.to_string());
    }

    fn breakpoint_command(&mut self, id: ContextId, command: BreakpointCommand) {
        let message = match command {
            BreakpointCommand::Set(line) => {
                self.debugger.set_breakpoint(line);
                format!("Breakpoint set at line {line}")
            }
            BreakpointCommand::Clear(line) => {
                if self.debugger.clear_breakpoint(line) {
                    format!("Breakpoint at line {line} cleared")
                } else {
                    format!("No breakpoint at line {line}")
                }
            }
            BreakpointCommand::ClearAll => {
                self.debugger.clear_all();
                "All breakpoints cleared".to_string()
            }
            BreakpointCommand::Enable(line) | BreakpointCommand::Disable(line) => {
                let enabled = matches!(command, BreakpointCommand::Enable(_));
                if self.debugger.toggle_breakpoint(line, enabled) {
                    let state = if enabled { "enabled" } else { "disabled" };
                    format!("Breakpoint at line {line} {state}")
                } else {
                    format!("No breakpoint at line {line}")
                }
            }
            BreakpointCommand::List => {
                let breakpoints = self.debugger.breakpoints();
                if breakpoints.is_empty() {
                    "No breakpoints set".to_string()
                } else {
                    self.emit(id, "Breakpoints:".to_string());
                    for breakpoint in breakpoints {
                        let suffix = if breakpoint.enabled { "" } else { " (disabled)" };
                        self.emit(id, format!("  Line {}{suffix}", breakpoint.line));
                    }
                    return;
                }
            }
        };
        self.emit(id, message);
    }
}

fn bind_handle(env: &Environment, spawn: &SpawnCommand, handle: Handle) {
    if let Some(name) = &spawn.bind {
        env.assign(name, Value::Handle(handle));
    }
}

/// A non-negative turn count.
fn turns(operation: &str, value: Value) -> Result<u64, RuntimeError> {
    let count = value.as_int(operation)?;
    u64::try_from(count).map_err(|_| {
        RuntimeError::invalid_argument(operation, "non-negative turn count", count.to_string())
    })
}
