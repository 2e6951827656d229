use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOperator, FunctionDecl, UnaryOperator};
use crate::builtins::BuiltinFunction;

use super::class::{ClassRef, InstanceRef};
use super::context::Handle;
use super::environment::Environment;
use super::error::RuntimeError;

/// A user function closed over the scope it was defined in.
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: Environment,
}

impl Function {
    pub fn new(decl: Rc<FunctionDecl>, closure: Environment) -> Self {
        Self { decl, closure }
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.decl.name)
    }
}

/// A method looked up through an instance, with `self` already chosen.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: InstanceRef,
    pub function: Rc<Function>,
}

/// Names one allocation. A handle outlives its buffer: after `free`, or
/// once the name is allocated again, its generation no longer matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHandle {
    pub name: String,
    pub capacity: usize,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
    Buffer(BufferHandle),
    Function(Rc<Function>),
    Method(Rc<BoundMethod>),
    Builtin(BuiltinFunction),
    Class(ClassRef),
    Instance(InstanceRef),
    Handle(Handle),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Boolean(value) => *value,
            Value::String(value) => !value.is_empty(),
            Value::Null => false,
            Value::Buffer(_)
            | Value::Function(_)
            | Value::Method(_)
            | Value::Builtin(_)
            | Value::Class(_)
            | Value::Instance(_)
            | Value::Handle(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::Boolean(_) => "bool",
            Value::String(_) => "string",
            Value::Null => "null",
            Value::Buffer(_) => "buffer",
            Value::Function(_) => "function",
            Value::Method(_) => "method",
            Value::Builtin(_) => "builtin",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Handle(handle) => handle.kind_name(),
        }
    }

    pub fn as_int(&self, operation: &str) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(value) => Ok(*value),
            other => Err(RuntimeError::invalid_argument(
                operation,
                "int",
                other.type_name(),
            )),
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Language equality: numbers compare by value across int and float,
    /// shared kinds compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Buffer(a), Value::Buffer(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => {
                Rc::ptr_eq(&a.receiver, &b.receiver) && Rc::ptr_eq(&a.function, &b.function)
            }
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a.id == b.id,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value:?}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Null => f.write_str("null"),
            Value::Buffer(handle) => write!(f, "<buffer {}[{}]>", handle.name, handle.capacity),
            Value::Function(function) => write!(f, "<function {}>", function.name()),
            Value::Method(method) => write!(
                f,
                "<method {}.{}>",
                method.receiver.borrow().class.name,
                method.function.name()
            ),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<{} object>", instance.borrow().class.name),
            Value::Handle(handle) => write!(f, "{handle}"),
        }
    }
}

pub fn unary_op(op: UnaryOperator, operand: Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnaryOperator::Not, value) => Ok(Value::Boolean(!value.is_truthy())),
        (UnaryOperator::Negate, Value::Integer(value)) => value
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| overflow("-")),
        (UnaryOperator::Negate, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOperator::Negate, other) => Err(RuntimeError::UnsupportedOperation {
            operation: "-".to_string(),
            type_name: other.type_name().to_string(),
        }),
    }
}

/// Applies an arithmetic or comparison operator. `and`/`or` short-circuit
/// and never reach here.
pub fn binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOperator::Equal => return Ok(Value::Boolean(left == right)),
        BinaryOperator::NotEqual => return Ok(Value::Boolean(left != right)),
        BinaryOperator::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return Ok(Value::String(format!("{left}{right}")));
            }
        }
        _ => {}
    }

    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let result = match op {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Sub => a.checked_sub(b),
            BinaryOperator::Mul => a.checked_mul(b),
            BinaryOperator::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                return Ok(Value::Float(a as f64 / b as f64));
            }
            BinaryOperator::Mod => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.checked_rem_euclid(b)
            }
            BinaryOperator::Less => return Ok(Value::Boolean(a < b)),
            BinaryOperator::LessEqual => return Ok(Value::Boolean(a <= b)),
            BinaryOperator::Greater => return Ok(Value::Boolean(a > b)),
            BinaryOperator::GreaterEqual => return Ok(Value::Boolean(a >= b)),
            _ => return Err(unsupported(op, left, right)),
        };
        return result
            .map(Value::Integer)
            .ok_or_else(|| overflow(op.symbol()));
    }

    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return match op {
            BinaryOperator::Add => Ok(Value::Float(a + b)),
            BinaryOperator::Sub => Ok(Value::Float(a - b)),
            BinaryOperator::Mul => Ok(Value::Float(a * b)),
            BinaryOperator::Div | BinaryOperator::Mod if b == 0.0 => {
                Err(RuntimeError::DivisionByZero)
            }
            BinaryOperator::Div => Ok(Value::Float(a / b)),
            BinaryOperator::Mod => Ok(Value::Float(a.rem_euclid(b))),
            BinaryOperator::Less => Ok(Value::Boolean(a < b)),
            BinaryOperator::LessEqual => Ok(Value::Boolean(a <= b)),
            BinaryOperator::Greater => Ok(Value::Boolean(a > b)),
            BinaryOperator::GreaterEqual => Ok(Value::Boolean(a >= b)),
            _ => Err(unsupported(op, left, right)),
        };
    }

    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinaryOperator::Less => Ok(Value::Boolean(a < b)),
            BinaryOperator::LessEqual => Ok(Value::Boolean(a <= b)),
            BinaryOperator::Greater => Ok(Value::Boolean(a > b)),
            BinaryOperator::GreaterEqual => Ok(Value::Boolean(a >= b)),
            _ => Err(unsupported(op, left, right)),
        };
    }

    Err(unsupported(op, left, right))
}

fn unsupported(op: BinaryOperator, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperands {
        operation: op.symbol().to_string(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

fn overflow(operation: &str) -> RuntimeError {
    RuntimeError::Overflow {
        operation: operation.to_string(),
    }
}
