//! Runtime value model.
//!
//! Every datum the engine touches is a [`Value`]. Values are immutable; collections
//! share structure through `Arc`, so cloning a value is cheap and values can be handed
//! to other threads freely.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub mod bridge;
pub mod frame;
pub mod func;
pub mod list;
pub mod range;
pub mod seq;
pub mod types;
pub mod vector;

pub use bridge::{FromValue, HostArgs, HostFn, IntoValue, TypedFn};
pub use func::{Closure, CodeUnit, Func, NativeUnit};
pub use list::List;
pub use range::Range;
pub use seq::{Collection, Indexed, Seq};
pub use types::{box_value, HostValue, TypeRegistry, TypeTag, TYPES};
pub use vector::ArrayVector;

/// Argument count a callee accepts, as reported by [`RuntimeError::Arity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("type error: {value} {reason} {target}")]
    Type {
        value: String,
        reason: &'static str,
        target: &'static str,
    },
    #[error("arity error: {callee} expects {expected} argument(s), got {got}")]
    Arity {
        callee: String,
        expected: Arity,
        got: usize,
    },
    #[error("{0} is not callable")]
    NotCallable(String),
    #[error("unbound symbol `{0}`")]
    Unbound(String),
    #[error("{0}")]
    Execution(String),
    #[error("operand stack overflow (limit {0})")]
    StackOverflow(usize),
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),
    #[error("invalid constant index: {0}")]
    InvalidConstant(usize),
    #[error("invalid argument slot: {0}")]
    InvalidArgument(usize),
    #[error("invalid closed-over slot: {0}")]
    InvalidClosedOver(usize),
    #[error("malformed bytecode: {0}")]
    MalformedBytecode(String),
    #[error("runtime already initialized")]
    AlreadyInitialized,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        RuntimeError::Execution(msg.into())
    }

    pub(crate) fn type_error(
        value: impl fmt::Display,
        reason: &'static str,
        target: &'static str,
    ) -> Self {
        RuntimeError::Type {
            value: value.to_string(),
            reason,
            target,
        }
    }

    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        RuntimeError::MalformedBytecode(msg.into())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(List),
    Vector(ArrayVector),
    Range(Range),
    Func(Arc<Func>),
    Closure(Arc<Closure>),
    Type(&'static TypeTag),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// The singleton tag describing this value's runtime type.
    pub fn type_tag(&self) -> &'static TypeTag {
        let types: &'static TypeRegistry = &TYPES;
        match self {
            Value::Nil => &types.nil,
            Value::Bool(_) => &types.boolean,
            Value::Int(_) => &types.int,
            Value::Float(_) => &types.float,
            Value::Str(_) => &types.string,
            Value::List(_) => &types.list,
            Value::Vector(_) => &types.vector,
            Value::Range(_) => &types.range,
            Value::Func(_) | Value::Closure(_) => &types.func,
            Value::Type(_) => &types.type_tag,
        }
    }

    /// Converts into the host-native representation.
    ///
    /// Collections unbox to the ordered values they hold; functions and closures
    /// unbox to a [`HostFn`] adapter that calls back into the runtime.
    pub fn unbox(&self) -> HostValue {
        match self {
            Value::Nil => HostValue::Nil,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Int(i) => HostValue::Int(*i),
            Value::Float(x) => HostValue::Float(*x),
            Value::Str(s) => HostValue::Str(s.to_string()),
            Value::List(list) => HostValue::Values(list.iter().cloned().collect()),
            Value::Vector(vec) => HostValue::Values(vec.as_slice().to_vec()),
            Value::Range(range) => HostValue::Values(range.seq().iter().cloned().collect()),
            Value::Func(_) | Value::Closure(_) => HostValue::Callable(HostFn::adapting(self.clone())),
            Value::Type(tag) => HostValue::Str(tag.name().to_string()),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&dyn Seq> {
        match self {
            Value::List(list) => Some(list),
            Value::Vector(vec) => Some(vec),
            Value::Range(range) => Some(range),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&dyn Collection> {
        match self {
            Value::List(list) => Some(list),
            Value::Vector(vec) => Some(vec),
            Value::Range(range) => Some(range),
            _ => None,
        }
    }

    pub fn as_indexed(&self) -> Option<&dyn Indexed> {
        match self {
            Value::Vector(vec) => Some(vec),
            Value::Range(range) => Some(range),
            _ => None,
        }
    }

    /// Declared arity of a callable value, `None` for everything else.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Value::Func(func) => Some(func.arity()),
            Value::Closure(closure) => Some(closure.arity()),
            _ => None,
        }
    }

    pub fn invoke(&self, args: Vec<Value>) -> RuntimeResult<Value> {
        match self {
            Value::Func(func) => func.invoke(args),
            Value::Closure(closure) => closure.invoke(args),
            other => Err(RuntimeError::NotCallable(other.to_string())),
        }
    }

    /// Wraps a callable value as a host function of a fixed shape.
    pub fn bind<A: HostArgs, R: FromValue>(&self) -> RuntimeResult<TypedFn<A, R>> {
        TypedFn::new(self.clone())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => match (self.as_seq(), other.as_seq()) {
                (Some(a), Some(b)) => sequential_eq(a, b),
                _ => false,
            },
        }
    }
}

// Lists, vectors and ranges holding the same elements in order are equal.
fn sequential_eq(a: &dyn Seq, b: &dyn Seq) -> bool {
    let (a, b) = (a.seq(), b.seq());
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{:?}", &**s),
            Value::List(list) => write!(f, "{list}"),
            Value::Vector(vec) => write!(f, "{vec}"),
            Value::Range(range) => write!(f, "{range}"),
            Value::Func(func) => write!(f, "{func}"),
            Value::Closure(closure) => write!(f, "{closure}"),
            Value::Type(tag) => write!(f, "{}", tag.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(list) => serializer.collect_seq(list.iter()),
            Value::Vector(vec) => serializer.collect_seq(vec.as_slice()),
            Value::Range(range) => serializer.collect_seq(range.seq().iter()),
            Value::Func(_) | Value::Closure(_) | Value::Type(_) => serializer.collect_str(self),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<ArrayVector> for Value {
    fn from(vec: ArrayVector) -> Self {
        Value::Vector(vec)
    }
}

impl From<Func> for Value {
    fn from(func: Func) -> Self {
        Value::Func(Arc::new(func))
    }
}

impl From<Closure> for Value {
    fn from(closure: Closure) -> Self {
        Value::Closure(Arc::new(closure))
    }
}
