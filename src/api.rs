//! Embedding façade.
//!
//! A [`Runtime`] owns one namespace of bindings. Hosts define values into it, look them
//! up, call bound functions with host values and run bytecode chunks against it.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::bytecode::CodeChunk;
use crate::runtime::{
    box_value, CodeUnit, FromValue, HostArgs, HostValue, IntoValue, RuntimeError, RuntimeResult,
    TypedFn, Value,
};

pub struct Runtime {
    namespace: String,
    bindings: RwLock<BTreeMap<String, Value>>,
}

impl Runtime {
    pub fn new(namespace: impl Into<String>) -> Self {
        Runtime {
            namespace: namespace.into(),
            bindings: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Boxes `value` and binds it under `name`, replacing any earlier binding.
    pub fn def(&self, name: &str, value: impl IntoValue) -> RuntimeResult<()> {
        let value = value.into_value()?;
        debug!(ns = %self.namespace, name, value = %value.type_tag(), "def");
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> RuntimeResult<Value> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::Unbound(format!("{}/{name}", self.namespace)))
    }

    /// Names bound in this namespace, in order.
    pub fn names(&self) -> Vec<String> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Calls the function bound under `name` with host arguments and unboxes the result.
    pub fn call(&self, name: &str, args: Vec<HostValue>) -> RuntimeResult<HostValue> {
        let callee = self.lookup(name)?;
        let args = args
            .into_iter()
            .map(box_value)
            .collect::<RuntimeResult<Vec<_>>>()?;
        Ok(callee.invoke(args)?.unbox())
    }

    /// Binds the function under `name` as a typed host function.
    pub fn bind<A: HostArgs, R: FromValue>(&self, name: &str) -> RuntimeResult<TypedFn<A, R>> {
        self.lookup(name)?.bind()
    }

    /// Verifies and runs a top-level chunk with no arguments.
    pub fn run(&self, chunk: &CodeChunk) -> RuntimeResult<Value> {
        self.run_with_args(chunk, Vec::new())
    }

    pub fn run_with_args(&self, chunk: &CodeChunk, args: Vec<Value>) -> RuntimeResult<Value> {
        chunk.verify()?;
        debug!(ns = %self.namespace, code_len = chunk.code().len(), argc = args.len(), "run");
        chunk.run(args, &[])
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new("user")
    }
}
