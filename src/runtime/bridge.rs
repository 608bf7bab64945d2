//! Host bridge: calling runtime functions from Rust and Rust closures from the runtime.
//!
//! [`HostFn`] is the dynamically shaped adapter produced by unboxing a function or
//! closure. [`TypedFn`] is the statically shaped one: its argument tuple and return type
//! pick the conversions at compile time through [`HostArgs`], [`IntoValue`] and
//! [`FromValue`].

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{box_value, ArrayVector, Func, HostValue, List, RuntimeError, RuntimeResult, Value};

type HostCall = dyn Fn(Vec<HostValue>) -> RuntimeResult<HostValue> + Send + Sync;

/// A callable in host-native terms.
#[derive(Clone)]
pub struct HostFn {
    arity: usize,
    // Set when this adapter was produced by unboxing a runtime callable.
    origin: Option<Value>,
    call: Arc<HostCall>,
}

impl HostFn {
    /// A host function taking exactly `arity` arguments.
    pub fn new<F>(arity: usize, f: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> RuntimeResult<HostValue> + Send + Sync + 'static,
    {
        HostFn {
            arity,
            origin: None,
            call: Arc::new(f),
        }
    }

    pub(crate) fn adapting(callee: Value) -> Self {
        let target = callee.clone();
        HostFn {
            arity: callee.arity().unwrap_or(0),
            origin: Some(callee),
            call: Arc::new(move |args: Vec<HostValue>| {
                let args = args
                    .into_iter()
                    .map(box_value)
                    .collect::<RuntimeResult<Vec<_>>>()?;
                Ok(target.invoke(args)?.unbox())
            }),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: Vec<HostValue>) -> RuntimeResult<HostValue> {
        (self.call)(args)
    }

    pub fn ptr_eq(&self, other: &HostFn) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "HostFn({origin})"),
            None => write!(f, "HostFn(arity {})", self.arity),
        }
    }
}

/// Host-to-runtime conversion.
pub trait IntoValue {
    fn into_value(self) -> RuntimeResult<Value>;
}

/// Runtime-to-host conversion.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> RuntimeResult<Self>;
}

fn unbox_error<T>(value: &Value) -> RuntimeError {
    RuntimeError::type_error(value, "can't be unboxed as", type_name::<T>())
}

impl IntoValue for Value {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(self)
    }
}

impl IntoValue for HostValue {
    fn into_value(self) -> RuntimeResult<Value> {
        box_value(self)
    }
}

/// Unboxed runtime callables box back to the value they came from; host closures become
/// native functions.
impl IntoValue for HostFn {
    fn into_value(self) -> RuntimeResult<Value> {
        if let Some(origin) = self.origin {
            return Ok(origin);
        }
        let call = self.call;
        let func = Func::native(self.arity, move |args| {
            let host = args.iter().map(Value::unbox).collect();
            box_value(call(host)?)
        });
        Ok(Value::Func(Arc::new(func)))
    }
}

impl IntoValue for () {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::Nil)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::Bool(self))
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::Int(self))
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::Int(i64::from(self)))
    }
}

impl IntoValue for usize {
    fn into_value(self) -> RuntimeResult<Value> {
        i64::try_from(self)
            .map(Value::Int)
            .map_err(|_| RuntimeError::type_error(self, "overflows", "nightvm.lang.Int"))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::Float(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::from(self))
    }
}

impl IntoValue for &str {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::from(self))
    }
}

impl IntoValue for List {
    fn into_value(self) -> RuntimeResult<Value> {
        Ok(Value::List(self))
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> RuntimeResult<Value> {
        let values = self
            .into_iter()
            .map(IntoValue::into_value)
            .collect::<RuntimeResult<Vec<_>>>()?;
        Ok(Value::Vector(ArrayVector::from_vec(values)))
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> RuntimeResult<Value> {
        match self {
            Some(v) => v.into_value(),
            None => Ok(Value::Nil),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        Ok(value)
    }
}

impl FromValue for HostValue {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        Ok(value.unbox())
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> RuntimeResult<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(unbox_error::<Self>(&other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(unbox_error::<Self>(&other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            other => Err(unbox_error::<Self>(&other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(unbox_error::<Self>(&other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        let Some(seq) = value.as_seq() else {
            return Err(unbox_error::<Self>(&value));
        };
        seq.seq().iter().cloned().map(T::from_value).collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// An argument list convertible into runtime values.
pub trait HostArgs {
    fn into_args(self) -> RuntimeResult<Vec<Value>>;
}

impl HostArgs for Vec<Value> {
    fn into_args(self) -> RuntimeResult<Vec<Value>> {
        Ok(self)
    }
}

macro_rules! impl_host_args {
    ($($arg:ident),*) => {
        impl<$($arg: IntoValue),*> HostArgs for ($($arg,)*) {
            #[allow(non_snake_case)]
            fn into_args(self) -> RuntimeResult<Vec<Value>> {
                let ($($arg,)*) = self;
                Ok(vec![$($arg.into_value()?),*])
            }
        }
    };
}

impl_host_args!();
impl_host_args!(A);
impl_host_args!(A, B);
impl_host_args!(A, B, C);
impl_host_args!(A, B, C, D);
impl_host_args!(A, B, C, D, E);
impl_host_args!(A, B, C, D, E, F);

/// A runtime callable seen as a Rust function `A -> R`.
pub struct TypedFn<A, R> {
    callee: Value,
    shape: PhantomData<fn(A) -> R>,
}

impl<A: HostArgs, R: FromValue> TypedFn<A, R> {
    pub fn new(callee: Value) -> RuntimeResult<Self> {
        if callee.arity().is_none() {
            return Err(RuntimeError::NotCallable(callee.to_string()));
        }
        Ok(TypedFn {
            callee,
            shape: PhantomData,
        })
    }

    /// Converts the arguments, invokes, and converts the result. The first conversion
    /// failure aborts the call.
    pub fn call(&self, args: A) -> RuntimeResult<R> {
        let args = args.into_args()?;
        R::from_value(self.callee.invoke(args)?)
    }

    pub fn callee(&self) -> &Value {
        &self.callee
    }

    pub fn into_fn(self) -> impl Fn(A) -> RuntimeResult<R> + Send + Sync {
        move |args| self.call(args)
    }
}

impl<A, R> Clone for TypedFn<A, R> {
    fn clone(&self) -> Self {
        TypedFn {
            callee: self.callee.clone(),
            shape: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn subtract() -> Value {
        Value::from(Func::native(2, |args| match (&args[0], &args[1]) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => Err(RuntimeError::new("subtract expects integers")),
        }))
    }

    #[test]
    fn typed_call_converts_both_ways() {
        let sub: TypedFn<(i64, i64), i64> = subtract().bind().unwrap();
        assert_eq!(sub.call((10, 3)).unwrap(), 7);
    }

    #[test]
    fn runtime_function_as_sort_comparator() {
        let cmp = subtract().bind::<(i64, i64), i64>().unwrap().into_fn();
        let mut items = vec![5i64, 1, 4, 2, 3];
        items.sort_by(|a, b| match cmp((*a, *b)) {
            Ok(d) => d.cmp(&0),
            Err(_) => Ordering::Equal,
        });
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn result_conversion_failure_is_reported() {
        let sub: TypedFn<(i64, i64), String> = subtract().bind().unwrap();
        let err = sub.call((1, 1)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Type { ref value, target: "alloc::string::String", .. } if value == "0"
        ));
    }

    #[test]
    fn argument_conversion_failure_skips_the_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let f = Value::from(Func::native(2, move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Value::Nil)
        }));
        let typed: TypedFn<(i64, usize), ()> = f.bind().unwrap();
        assert!(typed.call((1, usize::MAX)).is_err());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
        assert!(typed.call((1, 2)).is_ok());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn binding_a_non_callable_fails() {
        assert!(matches!(
            Value::Int(1).bind::<(), ()>(),
            Err(RuntimeError::NotCallable(_))
        ));
    }

    #[test]
    fn unboxed_function_is_host_callable() {
        let HostValue::Callable(host) = subtract().unbox() else {
            panic!("functions unbox to callables");
        };
        assert_eq!(host.arity(), 2);
        let out = host.call(vec![HostValue::Int(9), HostValue::Int(4)]).unwrap();
        assert_eq!(out, HostValue::Int(5));
        let err = host.call(vec![HostValue::Int(9)]).unwrap_err();
        assert!(matches!(err, RuntimeError::Arity { got: 1, .. }));
    }

    #[test]
    fn unbox_then_box_returns_the_same_function() {
        let f = subtract();
        let HostValue::Callable(host) = f.unbox() else {
            panic!("functions unbox to callables");
        };
        assert_eq!(host.into_value().unwrap(), f);
    }

    #[test]
    fn host_closure_boxes_into_a_runtime_function() {
        let shout = HostFn::new(1, |args| match args.into_iter().next() {
            Some(HostValue::Str(s)) => Ok(HostValue::Str(s.to_uppercase())),
            other => Err(RuntimeError::new(format!("unexpected {other:?}"))),
        });
        let f = shout.into_value().unwrap();
        assert_eq!(f.arity(), Some(1));
        assert_eq!(f.invoke(vec![Value::from("hey")]).unwrap(), Value::from("HEY"));
        assert!(f.invoke(vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn sequences_unbox_into_vecs() {
        let evens: Vec<i64> = Vec::from_value(crate::runtime::Range::new(0, 7, 2)).unwrap();
        assert_eq!(evens, vec![0, 2, 4, 6]);
        let mixed = Vec::<i64>::from_value(Value::Vector(ArrayVector::new(&[
            Value::Int(1),
            Value::from("x"),
        ])));
        assert!(mixed.is_err());
        let maybe: Option<i64> = Option::from_value(Value::Nil).unwrap();
        assert_eq!(maybe, None);
    }
}
