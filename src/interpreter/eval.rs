use std::rc::Rc;

use crate::ast::{BinaryOperator, Expression};
use crate::builtins::BuiltinFunction;
use crate::runtime::class::{ClassRef, Instance, InstanceRef};
use crate::runtime::context::{ContextId, ExprTask, Frame, Handle, Pending, ReturnAction};
use crate::runtime::environment::Environment;
use crate::runtime::error::RuntimeError;
use crate::runtime::library;
use crate::runtime::value::{BoundMethod, Function, Value, binary_op, unary_op};

use super::Interpreter;

pub(super) enum Evaluated {
    Continue,
    /// A user function must run before evaluation can go on.
    Call(Frame),
}

impl Interpreter {
    /// Runs one task of a statement's operand work stack.
    pub(super) fn eval_task(
        &mut self,
        id: ContextId,
        task: ExprTask,
        pending: &mut Pending,
    ) -> Result<Evaluated, RuntimeError> {
        match task {
            ExprTask::Eval(expr) => {
                let env = self.scope(id);
                expand(&expr, &env, pending)?;
            }
            ExprTask::Unary(op) => {
                let operand = pop(pending);
                pending.values.push(unary_op(op, operand)?);
            }
            ExprTask::Binary(op) => {
                let right = pop(pending);
                let left = pop(pending);
                pending.values.push(binary_op(op, &left, &right)?);
            }
            ExprTask::ShortCircuit { op, right } => {
                let left = pop(pending).is_truthy();
                match (op, left) {
                    (BinaryOperator::And, false) => pending.values.push(Value::Boolean(false)),
                    (BinaryOperator::Or, true) => pending.values.push(Value::Boolean(true)),
                    _ => {
                        pending.tasks.push(ExprTask::Truthy);
                        pending.tasks.push(ExprTask::Eval(right));
                    }
                }
            }
            ExprTask::Truthy => {
                let value = pop(pending);
                pending.values.push(Value::Boolean(value.is_truthy()));
            }
            ExprTask::Call { argc } => {
                let args = pop_args(pending, argc);
                let callee = pop(pending);
                return self.call_value(id, callee, args, pending);
            }
            ExprTask::Member(name) => {
                let object = pop(pending);
                pending.values.push(self.member(&object, &name)?);
            }
            ExprTask::Construct { class, argc } => {
                let args = pop_args(pending, argc);
                let env = self.scope(id);
                return match env.get(&class)? {
                    Value::Class(class) => self.instantiate(id, class, args, pending),
                    other => Err(RuntimeError::invalid_argument(
                        "new",
                        "class",
                        other.type_name(),
                    )),
                };
            }
            ExprTask::LibraryCall {
                namespace,
                name,
                argc,
            } => {
                let args = pop_args(pending, argc);
                let value = self.libraries.call(&namespace, &name, &args)?;
                pending.values.push(value);
            }
            ExprTask::Constructed(instance) => {
                pop(pending);
                pending.values.push(Value::Instance(instance));
            }
        }
        Ok(Evaluated::Continue)
    }

    fn call_value(
        &mut self,
        id: ContextId,
        callee: Value,
        args: Vec<Value>,
        pending: &mut Pending,
    ) -> Result<Evaluated, RuntimeError> {
        match callee {
            Value::Builtin(builtin) => {
                let value = self.call_builtin(id, builtin, args)?;
                pending.values.push(value);
                Ok(Evaluated::Continue)
            }
            Value::Function(function) => Ok(Evaluated::Call(self.call_frame(
                id, &function, None, args,
            )?)),
            Value::Method(method) => Ok(Evaluated::Call(self.call_frame(
                id,
                &method.function,
                Some(method.receiver.clone()),
                args,
            )?)),
            Value::Class(class) => self.instantiate(id, class, args, pending),
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name().to_string(),
            }),
        }
    }

    fn call_frame(
        &self,
        id: ContextId,
        function: &Function,
        receiver: Option<InstanceRef>,
        args: Vec<Value>,
    ) -> Result<Frame, RuntimeError> {
        let context = &self.contexts[id.0];
        let limit = self.config.max_call_depth;
        if context.depth() >= limit {
            return Err(RuntimeError::StackOverflow { limit });
        }
        function_frame(
            function,
            receiver,
            args,
            context.current_line(),
            ReturnAction::Push,
        )
    }

    /// Builds an instance, running `init` from the nearest class defining it.
    fn instantiate(
        &mut self,
        id: ContextId,
        class: ClassRef,
        args: Vec<Value>,
        pending: &mut Pending,
    ) -> Result<Evaluated, RuntimeError> {
        let init = self.classes.find_method(class.id, "init");
        let instance = Instance::new_ref(class);
        match init {
            Some(init) => {
                let frame = self.call_frame(id, &init, Some(instance.clone()), args)?;
                pending.tasks.push(ExprTask::Constructed(instance));
                Ok(Evaluated::Call(frame))
            }
            None => {
                RuntimeError::expect_arity("init", 0, args.len())?;
                pending.values.push(Value::Instance(instance));
                Ok(Evaluated::Continue)
            }
        }
    }

    /// Field first, then the method table of the class and its ancestors.
    fn member(&self, object: &Value, name: &str) -> Result<Value, RuntimeError> {
        let unknown = |type_name: &str| RuntimeError::UnknownAttribute {
            attribute: name.to_string(),
            type_name: type_name.to_string(),
        };
        match object {
            Value::Instance(instance) => {
                let (field, class) = {
                    let borrowed = instance.borrow();
                    (borrowed.field(name), borrowed.class.clone())
                };
                if let Some(value) = field {
                    return Ok(value);
                }
                let function = self
                    .classes
                    .find_method(class.id, name)
                    .ok_or_else(|| unknown(&class.name))?;
                Ok(Value::Method(Rc::new(BoundMethod {
                    receiver: instance.clone(),
                    function,
                })))
            }
            Value::Class(class) => self
                .classes
                .find_method(class.id, name)
                .map(Value::Function)
                .ok_or_else(|| unknown(&class.name)),
            other => Err(unknown(other.type_name())),
        }
    }

    fn call_builtin(
        &mut self,
        id: ContextId,
        builtin: BuiltinFunction,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if let Some(expected) = builtin.arity() {
            RuntimeError::expect_arity(builtin.name(), expected, args.len())?;
        }
        if builtin == BuiltinFunction::Print {
            let text = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            self.emit(id, text);
            return Ok(Value::Null);
        }

        let Some(arg) = args.into_iter().next() else {
            return Ok(Value::Null);
        };
        match builtin {
            BuiltinFunction::Len => match &arg {
                Value::String(text) => Ok(Value::Integer(text.chars().count() as i64)),
                Value::Buffer(handle) => {
                    Ok(Value::Integer(self.memory.capacity(handle)? as i64))
                }
                other => Err(RuntimeError::invalid_argument(
                    "len",
                    "string or buffer",
                    other.type_name(),
                )),
            },
            BuiltinFunction::Str => Ok(Value::String(arg.to_string())),
            BuiltinFunction::Type => Ok(Value::String(arg.type_name().to_string())),
            BuiltinFunction::Status => {
                let handle = expect_handle("status", &arg)?;
                Ok(Value::String(self.handle_status(handle).to_string()))
            }
            BuiltinFunction::Error => {
                let handle = expect_handle("error", &arg)?;
                Ok(self
                    .handle_error(handle)
                    .map(Value::String)
                    .unwrap_or(Value::Null))
            }
            BuiltinFunction::Print => Ok(Value::Null),
        }
    }
}

/// Frame for a user function with its parameters (and `self`) bound in a
/// fresh child of the function's defining scope.
pub(super) fn function_frame(
    function: &Function,
    receiver: Option<InstanceRef>,
    args: Vec<Value>,
    call_line: usize,
    on_return: ReturnAction,
) -> Result<Frame, RuntimeError> {
    let decl = &function.decl;
    RuntimeError::expect_arity(&decl.name, decl.params.len(), args.len())?;
    let env = function.closure.child();
    let name = match &receiver {
        Some(instance) => format!("{}.{}", instance.borrow().class.name, decl.name),
        None => decl.name.clone(),
    };
    if let Some(instance) = receiver {
        env.define("self", Value::Instance(instance));
    }
    for (param, arg) in decl.params.iter().zip(args) {
        env.define(param.clone(), arg);
    }
    Ok(Frame::new(name, env, decl.body.clone(), call_line, on_return))
}

/// Pushes the work for one expression node: either its value, or operand
/// evaluations beneath the operator task that combines them.
fn expand(
    expr: &Rc<Expression>,
    env: &Environment,
    pending: &mut Pending,
) -> Result<(), RuntimeError> {
    let value = match &**expr {
        Expression::Integer(value) => Value::Integer(*value),
        Expression::Float(value) => Value::Float(*value),
        Expression::Boolean(value) => Value::Boolean(*value),
        Expression::String(value) => Value::String(value.clone()),
        Expression::Null => Value::Null,
        Expression::Identifier(name) => env.get(name)?,
        Expression::Unary { op, operand } => {
            pending.tasks.push(ExprTask::Unary(*op));
            pending.tasks.push(ExprTask::Eval(operand.clone()));
            return Ok(());
        }
        Expression::BinaryOp { left, op, right } => {
            if op.is_logical() {
                pending.tasks.push(ExprTask::ShortCircuit {
                    op: *op,
                    right: right.clone(),
                });
            } else {
                pending.tasks.push(ExprTask::Binary(*op));
                pending.tasks.push(ExprTask::Eval(right.clone()));
            }
            pending.tasks.push(ExprTask::Eval(left.clone()));
            return Ok(());
        }
        Expression::Call { callee, args } => {
            if let Some((namespace, name)) = library_target(callee, env) {
                pending.tasks.push(ExprTask::LibraryCall {
                    namespace,
                    name,
                    argc: args.len(),
                });
                push_args(pending, args);
            } else {
                pending.tasks.push(ExprTask::Call { argc: args.len() });
                push_args(pending, args);
                pending.tasks.push(ExprTask::Eval(callee.clone()));
            }
            return Ok(());
        }
        Expression::Member { object, name } => {
            pending.tasks.push(ExprTask::Member(name.clone()));
            pending.tasks.push(ExprTask::Eval(object.clone()));
            return Ok(());
        }
        Expression::New { class, args } => {
            pending.tasks.push(ExprTask::Construct {
                class: class.clone(),
                argc: args.len(),
            });
            push_args(pending, args);
            return Ok(());
        }
    };
    pending.values.push(value);
    Ok(())
}

/// `ns.name(...)` goes to the library registry when `ns` is a library
/// namespace not shadowed by a variable.
fn library_target(callee: &Expression, env: &Environment) -> Option<(String, String)> {
    if let Expression::Member { object, name } = callee
        && let Expression::Identifier(namespace) = &**object
        && library::is_namespace(namespace)
        && env.lookup(namespace).is_none()
    {
        return Some((namespace.clone(), name.clone()));
    }
    None
}

fn push_args(pending: &mut Pending, args: &[Rc<Expression>]) {
    // Last argument deepest, so arguments evaluate left to right.
    for arg in args.iter().rev() {
        pending.tasks.push(ExprTask::Eval(arg.clone()));
    }
}

fn pop(pending: &mut Pending) -> Value {
    pending.values.pop().unwrap_or(Value::Null)
}

fn pop_args(pending: &mut Pending, argc: usize) -> Vec<Value> {
    let split = pending.values.len().saturating_sub(argc);
    pending.values.split_off(split)
}

pub(super) fn expect_handle(operation: &str, value: &Value) -> Result<Handle, RuntimeError> {
    match value {
        Value::Handle(handle) => Ok(*handle),
        other => Err(RuntimeError::invalid_argument(
            operation,
            "thread, task or process handle",
            other.type_name(),
        )),
    }
}
