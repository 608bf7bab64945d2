//! Type tags and the host boxing contract.
//!
//! One [`TypeTag`] exists per runtime type, created once in the [`TYPES`] registry.
//! Tags are compared by identity. Each tag knows how to box a host value into its
//! runtime type and rejects host values of any other shape with a type error.

use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

use super::{ArrayVector, HostFn, IntoValue, List, RuntimeError, RuntimeResult, Value};

type Boxer = fn(&TypeTag, HostValue) -> RuntimeResult<Value>;

pub struct TypeTag {
    name: &'static str,
    boxer: Boxer,
}

impl TypeTag {
    const fn new(name: &'static str, boxer: Boxer) -> Self {
        TypeTag { name, boxer }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Converts a host value into this tag's runtime type.
    pub fn box_host(&self, host: HostValue) -> RuntimeResult<Value> {
        (self.boxer)(self, host)
    }

    fn reject(&self, host: HostValue) -> RuntimeError {
        RuntimeError::type_error(format!("{host:?}"), "can't be boxed as", self.name)
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for TypeTag {}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<type {}>", self.name)
    }
}

pub struct TypeRegistry {
    pub nil: TypeTag,
    pub boolean: TypeTag,
    pub int: TypeTag,
    pub float: TypeTag,
    pub string: TypeTag,
    pub list: TypeTag,
    pub vector: TypeTag,
    pub range: TypeTag,
    pub func: TypeTag,
    pub type_tag: TypeTag,
}

impl TypeRegistry {
    pub fn all(&self) -> [&TypeTag; 10] {
        [
            &self.nil,
            &self.boolean,
            &self.int,
            &self.float,
            &self.string,
            &self.list,
            &self.vector,
            &self.range,
            &self.func,
            &self.type_tag,
        ]
    }

    pub fn by_name(&self, name: &str) -> Option<&TypeTag> {
        self.all().into_iter().find(|tag| tag.name == name)
    }
}

lazy_static! {
    pub static ref TYPES: TypeRegistry = TypeRegistry {
        nil: TypeTag::new("nightvm.lang.Nil", box_nil),
        boolean: TypeTag::new("nightvm.lang.Bool", box_bool),
        int: TypeTag::new("nightvm.lang.Int", box_int),
        float: TypeTag::new("nightvm.lang.Float", box_float),
        string: TypeTag::new("nightvm.lang.String", box_string),
        list: TypeTag::new("nightvm.lang.List", box_list),
        vector: TypeTag::new("nightvm.lang.ArrayVector", box_vector),
        range: TypeTag::new("nightvm.lang.Range", reject_all),
        func: TypeTag::new("nightvm.lang.Fn", box_func),
        type_tag: TypeTag::new("nightvm.lang.Type", reject_all),
    };
}

fn box_nil(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Nil => Ok(Value::Nil),
        other => Err(tag.reject(other)),
    }
}

fn box_bool(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Bool(b) => Ok(Value::Bool(b)),
        other => Err(tag.reject(other)),
    }
}

fn box_int(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Int(i) => Ok(Value::Int(i)),
        other => Err(tag.reject(other)),
    }
}

fn box_float(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Float(x) => Ok(Value::Float(x)),
        other => Err(tag.reject(other)),
    }
}

fn box_string(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Str(s) => Ok(Value::Str(Arc::from(s))),
        other => Err(tag.reject(other)),
    }
}

// Elements are already runtime values; they are taken as they are.
fn box_list(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Values(values) => Ok(Value::List(values.into_iter().collect::<List>())),
        other => Err(tag.reject(other)),
    }
}

fn box_vector(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Values(values) => Ok(Value::Vector(ArrayVector::from_vec(values))),
        other => Err(tag.reject(other)),
    }
}

fn box_func(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    match host {
        HostValue::Callable(f) => f.into_value(),
        other => Err(tag.reject(other)),
    }
}

fn reject_all(tag: &TypeTag, host: HostValue) -> RuntimeResult<Value> {
    Err(tag.reject(host))
}

/// Host-native representation of a runtime value.
#[derive(Clone)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An ordered sequence of runtime values.
    Values(Vec<Value>),
    Callable(HostFn),
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "Nil"),
            HostValue::Bool(b) => write!(f, "Bool({b})"),
            HostValue::Int(i) => write!(f, "Int({i})"),
            HostValue::Float(x) => write!(f, "Float({x:?})"),
            HostValue::Str(s) => write!(f, "Str({s:?})"),
            HostValue::Values(values) => f.debug_tuple("Values").field(values).finish(),
            HostValue::Callable(func) => write!(f, "Callable(arity {})", func.arity()),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Nil, HostValue::Nil) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Values(a), HostValue::Values(b)) => a == b,
            (HostValue::Callable(a), HostValue::Callable(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Boxes a host value through the tag matching its shape. Ordered sequences become
/// vectors.
pub fn box_value(host: HostValue) -> RuntimeResult<Value> {
    let tag = match &host {
        HostValue::Nil => &TYPES.nil,
        HostValue::Bool(_) => &TYPES.boolean,
        HostValue::Int(_) => &TYPES.int,
        HostValue::Float(_) => &TYPES.float,
        HostValue::Str(_) => &TYPES.string,
        HostValue::Values(_) => &TYPES.vector,
        HostValue::Callable(_) => &TYPES.func,
    };
    tag.box_host(host)
}
