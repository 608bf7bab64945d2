//! Functions, closures and their calling convention.
//!
//! A [`Func`] pairs an arity with a shared [`CodeUnit`]. Invocation checks the argument
//! count, packs variadic tails into a list, and hands the result to the unit. A
//! [`Closure`] adds a snapshot of captured values that the unit sees separately from its
//! positional arguments.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{Arity, List, RuntimeError, RuntimeResult, Value};
use crate::bytecode::CodeChunk;

/// Executable body of a function.
///
/// Units must be re-entrant: the same unit may be running several times on one thread
/// (recursion) or on several threads at once.
pub trait CodeUnit: Send + Sync {
    fn run(&self, args: Vec<Value>, closed_overs: &[Value]) -> RuntimeResult<Value>;

    /// The bytecode behind this unit, if it has any.
    fn as_chunk(&self) -> Option<&CodeChunk> {
        None
    }
}

type NativeCall = dyn Fn(&[Value], &[Value]) -> RuntimeResult<Value> + Send + Sync;

/// A code unit implemented by a host closure.
pub struct NativeUnit {
    call: Box<NativeCall>,
}

impl NativeUnit {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        NativeUnit {
            call: Box::new(move |args, _| f(args)),
        }
    }

    /// A unit that also reads the closed-over values of the closure invoking it.
    pub fn with_closed_overs<F>(f: F) -> Self
    where
        F: Fn(&[Value], &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        NativeUnit { call: Box::new(f) }
    }
}

impl CodeUnit for NativeUnit {
    fn run(&self, args: Vec<Value>, closed_overs: &[Value]) -> RuntimeResult<Value> {
        (self.call)(&args, closed_overs)
    }
}

pub struct Func {
    name: Option<String>,
    arity: usize,
    variadic: bool,
    unit: Arc<dyn CodeUnit>,
}

impl Func {
    pub fn new(arity: usize, variadic: bool, unit: Arc<dyn CodeUnit>) -> Self {
        Func {
            name: None,
            arity,
            variadic,
            unit,
        }
    }

    /// A fixed-arity function backed by a host closure.
    pub fn native<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Func::new(arity, false, Arc::new(NativeUnit::new(f)))
    }

    /// Names the function for diagnostics. The name plays no part in invocation.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn unit(&self) -> &Arc<dyn CodeUnit> {
        &self.unit
    }

    /// Validates the argument count and, for variadic functions of arity `k`, packs
    /// every argument from position `k-1` on into one trailing list.
    pub fn pack_args(&self, mut args: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        if !self.variadic {
            if args.len() != self.arity {
                return Err(self.arity_error(Arity::Exactly(self.arity), args.len()));
            }
            return Ok(args);
        }
        let Some(fixed) = self.arity.checked_sub(1) else {
            return Err(RuntimeError::new(format!(
                "variadic {self} declares no parameters"
            )));
        };
        if args.len() < fixed {
            return Err(self.arity_error(Arity::AtLeast(fixed), args.len()));
        }
        let rest: List = args.split_off(fixed).into_iter().collect();
        args.push(Value::List(rest));
        Ok(args)
    }

    pub fn invoke(&self, args: Vec<Value>) -> RuntimeResult<Value> {
        self.call_with(args, &[])
    }

    fn call_with(&self, args: Vec<Value>, closed_overs: &[Value]) -> RuntimeResult<Value> {
        let argc = args.len();
        let args = self.pack_args(args)?;
        trace!(callee = %self, argc, captured = closed_overs.len(), "invoke");
        self.unit.run(args, closed_overs)
    }

    /// Snapshots `captured` into a new closure over this function.
    pub fn make_closure(self: &Arc<Self>, captured: &[Value]) -> Closure {
        Closure {
            func: Arc::clone(self),
            closed_overs: Arc::from(captured),
        }
    }

    fn arity_error(&self, expected: Arity, got: usize) -> RuntimeError {
        RuntimeError::Arity {
            callee: self.to_string(),
            expected,
            got,
        }
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {name} {:p}>", self),
            None => write!(f, "<fn {:p}>", self),
        }
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub struct Closure {
    func: Arc<Func>,
    closed_overs: Arc<[Value]>,
}

impl Closure {
    pub fn func(&self) -> &Arc<Func> {
        &self.func
    }

    pub fn closed_overs(&self) -> &[Value] {
        &self.closed_overs
    }

    pub fn arity(&self) -> usize {
        self.func.arity
    }

    pub fn invoke(&self, args: Vec<Value>) -> RuntimeResult<Value> {
        self.func.call_with(args, &self.closed_overs)
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.func, f)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
