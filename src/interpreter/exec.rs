use std::rc::Rc;

use crate::ast::{AssignTarget, Expression, MemoryCommand, Statement, StatementKind};
use crate::runtime::context::{ContextId, Cursor, ExprTask, Pending, Resume, ReturnAction};
use crate::runtime::debugger::PauseReason;
use crate::runtime::error::{RuntimeError, RuntimeFailure};
use crate::runtime::scheduler::WaitCondition;
use crate::runtime::value::{Function, Value};

use super::Interpreter;
use super::eval::Evaluated;

/// A blocking wait requested by the statement that just ran.
#[derive(Debug)]
pub(super) struct Wait {
    pub(super) condition: WaitCondition,
    pub(super) timeout: Option<u64>,
    pub(super) bind: Option<String>,
    pub(super) line: usize,
    pub(super) column: usize,
}

/// What the scheduler should do with a context after one step.
#[derive(Debug)]
pub(super) enum Flow {
    Next,
    Yield,
    Preempt,
    Sleep(u64),
    Block(Wait),
    Finished(Value),
    /// The context cancelled itself.
    Cancelled,
    Pause(PauseReason),
}

impl Interpreter {
    /// Advances context `id` by one statement boundary: starts the next
    /// statement, or continues one whose operands were waiting on a call.
    pub(super) fn step(&mut self, id: ContextId) -> Result<Flow, RuntimeFailure> {
        if let Some(resume) = self.contexts[id.0].resume.take() {
            match resume {
                Resume::Bind { name, value } => {
                    if let Some(name) = name
                        && let Some(frame) = self.contexts[id.0].frames.last()
                    {
                        frame.env.assign(&name, value);
                    }
                }
                Resume::Fail(failure) => return Err(failure),
            }
        }

        // Unwind finished blocks until a statement is current.
        let (block, index, fresh) = loop {
            let depth = self.contexts[id.0].frames.len();
            let Some(frame) = self.contexts[id.0].frames.last_mut() else {
                return Ok(Flow::Finished(Value::Null));
            };
            let Some(cursor) = frame.cursors.last() else {
                return self
                    .return_from_frame(id, Value::Null)
                    .map_err(|error| RuntimeFailure::new(error, 0, 0));
            };
            if cursor.index >= cursor.block.len() {
                frame.cursors.pop();
                continue;
            }
            let (block, index) = (cursor.block.clone(), cursor.index);
            let fresh = frame.pending.is_none();
            if fresh {
                let statement = &block[index];
                if self.slice_used >= self.config.quantum.max(1) {
                    return Ok(Flow::Preempt);
                }
                if let Some(reason) = self.debugger.check(id, statement.line(), depth) {
                    return Ok(Flow::Pause(reason));
                }
                self.slice_used += 1;
            }
            break (block, index, fresh);
        };
        let statement = &block[index];
        let at = |error: RuntimeError| {
            RuntimeFailure::new(error, statement.span.line, statement.span.column)
        };

        let mut pending = if fresh {
            operand_tasks(statement)
        } else {
            self.top_frame_mut(id)
                .and_then(|frame| frame.pending.take())
                .unwrap_or_default()
        };
        while let Some(task) = pending.tasks.pop() {
            match self.eval_task(id, task, &mut pending).map_err(at)? {
                Evaluated::Continue => {}
                Evaluated::Call(frame) => {
                    if let Some(caller) = self.top_frame_mut(id) {
                        caller.pending = Some(pending);
                    }
                    self.contexts[id.0].frames.push(frame);
                    return Ok(Flow::Next);
                }
            }
        }
        self.apply_statement(id, statement, pending.values)
            .map_err(at)
    }

    fn apply_statement(
        &mut self,
        id: ContextId,
        statement: &Statement,
        values: Vec<Value>,
    ) -> Result<Flow, RuntimeError> {
        let env = self.scope(id);
        let mut values = values.into_iter();
        let mut operand = move || values.next().unwrap_or(Value::Null);

        match &statement.kind {
            StatementKind::Assign { target, .. } => {
                match target {
                    AssignTarget::Name(name) => env.assign(name, operand()),
                    AssignTarget::Attribute { name, .. } => {
                        let object = operand();
                        let value = operand();
                        match object {
                            Value::Instance(instance) => {
                                instance.borrow_mut().set_field(name.clone(), value);
                            }
                            other => {
                                return Err(RuntimeError::UnsupportedOperation {
                                    operation: format!("set attribute '{name}'"),
                                    type_name: other.type_name().to_string(),
                                });
                            }
                        }
                    }
                }
                self.advance(id);
            }
            StatementKind::If {
                then_body,
                else_body,
                ..
            } => {
                self.advance(id);
                let body = if operand().is_truthy() {
                    then_body
                } else {
                    else_body
                };
                if !body.is_empty() {
                    self.enter_block(id, Cursor::new(body.clone(), false));
                }
            }
            StatementKind::While { body, .. } => {
                if operand().is_truthy() {
                    self.enter_block(id, Cursor::new(body.clone(), true));
                } else {
                    self.advance(id);
                }
            }
            StatementKind::FunctionDef(decl) => {
                let function = Function::new(decl.clone(), env.clone());
                env.define(decl.name.clone(), Value::Function(Rc::new(function)));
                self.advance(id);
            }
            StatementKind::ClassDef {
                name,
                parent,
                methods,
            } => {
                let parent = match parent {
                    Some(parent) => match env.get(parent)? {
                        Value::Class(class) => Some(class.id),
                        other => {
                            return Err(RuntimeError::invalid_argument(
                                "extends",
                                "class",
                                other.type_name(),
                            ));
                        }
                    },
                    None => None,
                };
                let methods = methods
                    .iter()
                    .map(|decl| Rc::new(Function::new(decl.clone(), env.clone())));
                let class = self.classes.define(name, parent, methods);
                env.define(name.clone(), Value::Class(class));
                self.advance(id);
            }
            StatementKind::Return(_) => return self.return_from_frame(id, operand()),
            StatementKind::Break => self.exit_loop(id, true),
            StatementKind::Continue => self.exit_loop(id, false),
            StatementKind::Pass | StatementKind::Expr(_) => self.advance(id),
            _ => return self.apply_command(id, statement, &mut operand),
        }
        Ok(Flow::Next)
    }

    /// Pops the innermost frame, handing `value` to whoever is waiting on it.
    pub(super) fn return_from_frame(
        &mut self,
        id: ContextId,
        value: Value,
    ) -> Result<Flow, RuntimeError> {
        let context = &mut self.contexts[id.0];
        let Some(frame) = context.frames.pop() else {
            return Ok(Flow::Finished(value));
        };
        match frame.on_return {
            ReturnAction::Finish => Ok(Flow::Finished(value)),
            ReturnAction::Push => {
                if let Some(caller) = context.frames.last_mut() {
                    caller
                        .pending
                        .get_or_insert_with(Pending::default)
                        .values
                        .push(value);
                }
                Ok(Flow::Next)
            }
        }
    }

    /// `break` leaves the loop and moves past its `while`; `continue`
    /// leaves the body and re-tests the condition.
    fn exit_loop(&mut self, id: ContextId, leave: bool) {
        let Some(frame) = self.top_frame_mut(id) else {
            return;
        };
        while let Some(cursor) = frame.cursors.pop() {
            if cursor.is_loop {
                break;
            }
        }
        if leave {
            self.advance(id);
        }
    }

    pub(super) fn advance(&mut self, id: ContextId) {
        if let Some(cursor) = self
            .top_frame_mut(id)
            .and_then(|frame| frame.cursors.last_mut())
        {
            cursor.index += 1;
        }
    }

    fn enter_block(&mut self, id: ContextId, cursor: Cursor) {
        if let Some(frame) = self.top_frame_mut(id) {
            frame.cursors.push(cursor);
        }
    }
}

/// Operand expressions of a statement, in evaluation order, as a work stack.
fn operand_tasks(statement: &Statement) -> Pending {
    let operands: Vec<&Rc<Expression>> = match &statement.kind {
        StatementKind::Assign { target, value } => match target {
            AssignTarget::Name(_) => vec![value],
            AssignTarget::Attribute { object, .. } => vec![object, value],
        },
        StatementKind::If { condition, .. } | StatementKind::While { condition, .. } => {
            vec![condition]
        }
        StatementKind::Return(value) => value.iter().collect(),
        StatementKind::Expr(expr)
        | StatementKind::Sleep(expr)
        | StatementKind::Cancel(expr) => vec![expr],
        StatementKind::Memory(command) => match command {
            MemoryCommand::Allocate { size, .. } => vec![size],
            MemoryCommand::Write { index, value, .. } => vec![index, value],
            MemoryCommand::Read { index, .. } => vec![index],
            MemoryCommand::Free { .. } => Vec::new(),
            MemoryCommand::Wait { index, timeout, .. } => {
                std::iter::once(index).chain(timeout).collect()
            }
        },
        StatementKind::Thread(spawn) | StatementKind::Process(spawn) => {
            std::iter::once(&spawn.callee).chain(&spawn.args).collect()
        }
        StatementKind::Task {
            spawn,
            priority,
            delay,
        } => std::iter::once(&spawn.callee)
            .chain(&spawn.args)
            .chain(priority)
            .chain(delay)
            .collect(),
        StatementKind::Join {
            handle, timeout, ..
        } => std::iter::once(handle).chain(timeout).collect(),
        StatementKind::FunctionDef(_)
        | StatementKind::ClassDef { .. }
        | StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Pass
        | StatementKind::Yield
        | StatementKind::Lock(_)
        | StatementKind::Unlock(_)
        | StatementKind::Debug(_)
        | StatementKind::Breakpoint(_) => Vec::new(),
    };
    Pending {
        tasks: operands
            .into_iter()
            .rev()
            .map(|expr| ExprTask::Eval(expr.clone()))
            .collect(),
        values: Vec::new(),
    }
}
