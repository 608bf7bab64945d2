//! Bytecode interpreter.
//!
//! Each invocation of a chunk-backed function gets its own [`Frame`]: an operand stack
//! plus read-only views of the positional arguments and the closure's captured values.
//! Frames never outlive the call that created them.

use std::cell::Cell;

use tracing::trace;

use super::{CodeUnit, List, Range, RuntimeError, RuntimeResult, Value};
use crate::bytecode::{CodeChunk, Opcode};
use crate::config::config;

// Remaining native stack below which a nested frame moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts nested frames on the current thread; dropping it leaves the frame.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> RuntimeResult<Self> {
        let limit = config().max_call_depth;
        DEPTH.with(|depth| {
            let current = depth.get();
            if current >= limit {
                return Err(RuntimeError::CallDepthExceeded(limit));
            }
            depth.set(current + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub struct Frame<'a> {
    chunk: &'a CodeChunk,
    args: Vec<Value>,
    closed_overs: &'a [Value],
    stack: Vec<Value>,
    ip: usize,
    stack_limit: usize,
}

impl<'a> Frame<'a> {
    pub fn new(chunk: &'a CodeChunk, args: Vec<Value>, closed_overs: &'a [Value]) -> Self {
        Frame {
            chunk,
            args,
            closed_overs,
            stack: Vec::new(),
            ip: 0,
            stack_limit: config().max_stack_size,
        }
    }

    pub fn run(mut self) -> RuntimeResult<Value> {
        let _guard = DepthGuard::enter()?;
        loop {
            let at = self.ip;
            let byte = self.read_u8()?;
            let op = Opcode::from_u8(byte).ok_or(RuntimeError::InvalidOpcode(byte))?;
            trace!(ip = at, op = op.mnemonic(), depth = self.stack.len(), "step");
            match op {
                Opcode::Nil => self.push(Value::Nil)?,
                Opcode::Const => {
                    let idx = self.read_u16()? as usize;
                    let value = self.chunk.constant(idx)?.clone();
                    self.push(value)?;
                }
                Opcode::LoadArg => {
                    let slot = self.read_u8()? as usize;
                    let value = self
                        .args
                        .get(slot)
                        .cloned()
                        .ok_or(RuntimeError::InvalidArgument(slot))?;
                    self.push(value)?;
                }
                Opcode::LoadClosedOver => {
                    let slot = self.read_u8()? as usize;
                    let value = self
                        .closed_overs
                        .get(slot)
                        .cloned()
                        .ok_or(RuntimeError::InvalidClosedOver(slot))?;
                    self.push(value)?;
                }
                Opcode::Invoke => {
                    let argc = self.read_u8()? as usize;
                    let args = self.pop_n(argc)?;
                    let callee = self.pop()?;
                    let result = callee.invoke(args)?;
                    self.push(result)?;
                }
                Opcode::MakeClosure => {
                    let captures = self.read_u8()? as usize;
                    let captured = self.pop_n(captures)?;
                    let closure = match self.pop()? {
                        Value::Func(template) => template.make_closure(&captured),
                        other => {
                            return Err(RuntimeError::type_error(other, "can't be closed over as", "fn"))
                        }
                    };
                    self.push(Value::from(closure))?;
                }
                Opcode::Jump => {
                    let offset = self.read_i16()?;
                    self.jump(offset)?;
                }
                Opcode::JumpIfFalse => {
                    let offset = self.read_i16()?;
                    if !self.pop()?.is_truthy() {
                        self.jump(offset)?;
                    }
                }
                Opcode::Ret => return self.pop(),
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Dup => {
                    let top = self.stack.last().cloned().ok_or(RuntimeError::StackUnderflow)?;
                    self.push(top)?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(arithmetic(op, lhs, rhs)?)?;
                }
                Opcode::Lt => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let less = match (&lhs, &rhs) {
                        (Value::Int(a), Value::Int(b)) => a < b,
                        _ => as_float(&lhs)? < as_float(&rhs)?,
                    };
                    self.push(Value::Bool(less))?;
                }
                Opcode::Eq => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Bool(lhs == rhs))?;
                }
                Opcode::MakeList => {
                    let count = self.read_u16()? as usize;
                    let items = self.pop_n(count)?;
                    self.push(Value::List(items.into_iter().collect()))?;
                }
                Opcode::MakeVector => {
                    let count = self.read_u16()? as usize;
                    let items = self.pop_n(count)?;
                    self.push(Value::Vector(super::ArrayVector::from_vec(items)))?;
                }
                Opcode::First => {
                    let coll = self.pop()?;
                    let first = match &coll {
                        Value::Nil => Value::Nil,
                        other => seq_of(other)?.first(),
                    };
                    self.push(first)?;
                }
                Opcode::More => {
                    let coll = self.pop()?;
                    let more = match &coll {
                        Value::Nil => List::EMPTY,
                        other => seq_of(other)?.more(),
                    };
                    self.push(Value::List(more))?;
                }
                Opcode::Cons => {
                    let value = self.pop()?;
                    let coll = self.pop()?;
                    let list = match &coll {
                        Value::Nil => List::EMPTY.prepend(value),
                        other => seq_of(other)?.cons(value),
                    };
                    self.push(Value::List(list))?;
                }
                Opcode::Count => {
                    let coll = self.pop()?;
                    let count = match &coll {
                        Value::Nil => Value::Int(0),
                        other => other
                            .as_collection()
                            .map(|coll| coll.count())
                            .ok_or_else(|| RuntimeError::type_error(other, "is not a", "collection"))?,
                    };
                    self.push(count)?;
                }
                Opcode::ValueAt => {
                    let key = self.pop()?;
                    let coll = self.pop()?;
                    let value = coll
                        .as_indexed()
                        .map(|indexed| indexed.value_at(&key))
                        .ok_or_else(|| RuntimeError::type_error(&coll, "is not", "indexed"))?;
                    self.push(value)?;
                }
                Opcode::Range => {
                    let step = self.pop_int()?;
                    let end = self.pop_int()?;
                    let start = self.pop_int()?;
                    self.push(Range::new(start, end, step))?;
                }
            }
        }
    }

    fn push(&mut self, value: Value) -> RuntimeResult<()> {
        if self.stack.len() >= self.stack_limit {
            return Err(RuntimeError::StackOverflow(self.stack_limit));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RuntimeResult<Value> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn pop_int(&mut self) -> RuntimeResult<i64> {
        let value = self.pop()?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::type_error(&value, "is not an", "int"))
    }

    // Removes the top `n` values, oldest first.
    fn pop_n(&mut self, n: usize) -> RuntimeResult<Vec<Value>> {
        let from = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(from))
    }

    fn jump(&mut self, offset: i16) -> RuntimeResult<()> {
        let target = self.ip as isize + offset as isize;
        match usize::try_from(target) {
            Ok(target) if target <= self.chunk.code().len() => {
                self.ip = target;
                Ok(())
            }
            _ => Err(RuntimeError::malformed(format!("jump target {target} out of range"))),
        }
    }

    fn read_u8(&mut self) -> RuntimeResult<u8> {
        let byte = *self
            .chunk
            .code()
            .get(self.ip)
            .ok_or_else(|| RuntimeError::malformed(format!("ran off the end of code at {}", self.ip)))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> RuntimeResult<u16> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read_i16(&mut self) -> RuntimeResult<i16> {
        Ok(self.read_u16()? as i16)
    }
}

fn seq_of(value: &Value) -> RuntimeResult<&dyn super::Seq> {
    value
        .as_seq()
        .ok_or_else(|| RuntimeError::type_error(value, "is not a", "seq"))
}

fn as_float(value: &Value) -> RuntimeResult<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(x) => Ok(*x),
        other => Err(RuntimeError::type_error(other, "is not a", "number")),
    }
}

fn arithmetic(op: Opcode, lhs: Value, rhs: Value) -> RuntimeResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
        let result = match op {
            Opcode::Add => a.checked_add(*b),
            Opcode::Sub => a.checked_sub(*b),
            _ => a.checked_mul(*b),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::new(format!("integer overflow in {}", op.mnemonic())));
    }
    let (a, b) = (as_float(&lhs)?, as_float(&rhs)?);
    Ok(Value::Float(match op {
        Opcode::Add => a + b,
        Opcode::Sub => a - b,
        _ => a * b,
    }))
}

impl CodeUnit for CodeChunk {
    fn run(&self, args: Vec<Value>, closed_overs: &[Value]) -> RuntimeResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            Frame::new(self, args, closed_overs).run()
        })
    }

    fn as_chunk(&self) -> Option<&CodeChunk> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bytecode::ChunkBuilder;
    use crate::runtime::Func;

    fn run(chunk: CodeChunk) -> RuntimeResult<Value> {
        chunk.run(Vec::new(), &[])
    }

    #[test]
    fn arithmetic_and_comparison() {
        let mut b = ChunkBuilder::new();
        b.emit_const(Value::Int(6)).unwrap();
        b.emit_const(Value::Int(7)).unwrap();
        b.emit(Opcode::Mul);
        b.emit_const(Value::Float(0.5)).unwrap();
        b.emit(Opcode::Add).emit(Opcode::Ret);
        assert_eq!(run(b.finish()).unwrap(), Value::Float(42.5));

        let mut b = ChunkBuilder::new();
        b.emit_const(Value::Int(1)).unwrap();
        b.emit_const(Value::Float(1.5)).unwrap();
        b.emit(Opcode::Lt).emit(Opcode::Ret);
        assert_eq!(run(b.finish()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let mut b = ChunkBuilder::new();
        b.emit_const(Value::Int(i64::MAX)).unwrap();
        b.emit_const(Value::Int(1)).unwrap();
        b.emit(Opcode::Add).emit(Opcode::Ret);
        assert!(matches!(run(b.finish()), Err(RuntimeError::Execution(_))));
    }

    #[test]
    fn conditional_jump() {
        // (if arg0 "yes" "no")
        let mut b = ChunkBuilder::new();
        b.emit_load_arg(0);
        let else_jump = b.emit_jump(Opcode::JumpIfFalse);
        b.emit_const(Value::from("yes")).unwrap();
        b.emit(Opcode::Ret);
        b.patch_jump_here(else_jump).unwrap();
        b.emit_const(Value::from("no")).unwrap();
        b.emit(Opcode::Ret);
        let chunk = b.finish();
        chunk.verify().unwrap();

        assert_eq!(chunk.run(vec![Value::Int(0)], &[]).unwrap(), Value::from("yes"));
        assert_eq!(chunk.run(vec![Value::Nil], &[]).unwrap(), Value::from("no"));
    }

    #[test]
    fn collections_from_bytecode() {
        let mut b = ChunkBuilder::new();
        b.emit_const(Value::Int(0)).unwrap();
        b.emit_const(Value::Int(10)).unwrap();
        b.emit_const(Value::Int(3)).unwrap();
        b.emit(Opcode::Range);
        b.emit(Opcode::Dup).emit(Opcode::Count);
        b.emit(Opcode::Cons);
        b.emit(Opcode::Ret);
        assert_eq!(run(b.finish()).unwrap().to_string(), "(4 0 3 6 9)");

        let mut b = ChunkBuilder::new();
        b.emit_const(Value::Int(1)).unwrap();
        b.emit_const(Value::Int(2)).unwrap();
        b.emit_make_vector(2);
        b.emit_const(Value::Int(1)).unwrap();
        b.emit(Opcode::ValueAt).emit(Opcode::Ret);
        assert_eq!(run(b.finish()).unwrap(), Value::Int(2));

        let mut b = ChunkBuilder::new();
        b.emit(Opcode::Nil).emit(Opcode::More).emit(Opcode::Ret);
        assert_eq!(run(b.finish()).unwrap(), Value::List(List::EMPTY));
    }

    #[test]
    fn closures_capture_at_creation() {
        // inner: closed_over[0] + arg0
        let mut inner = ChunkBuilder::new();
        inner.emit_load_closed_over(0).emit_load_arg(0).emit(Opcode::Add).emit(Opcode::Ret);
        let template = Func::new(1, false, Arc::new(inner.finish())).with_name("adder");

        // outer: ((make-closure inner arg0) 5)
        let mut outer = ChunkBuilder::new();
        outer.emit_const(Value::from(template)).unwrap();
        outer.emit_load_arg(0).emit_make_closure(1);
        outer.emit_const(Value::Int(5)).unwrap();
        outer.emit_invoke(1).emit(Opcode::Ret);
        let outer = outer.finish();

        assert_eq!(outer.run(vec![Value::Int(10)], &[]).unwrap(), Value::Int(15));
        assert_eq!(outer.run(vec![Value::Int(-5)], &[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn bad_slots_and_stack_misuse() {
        let mut b = ChunkBuilder::new();
        b.emit_load_arg(3).emit(Opcode::Ret);
        assert!(matches!(run(b.finish()), Err(RuntimeError::InvalidArgument(3))));

        let mut b = ChunkBuilder::new();
        b.emit_load_closed_over(0).emit(Opcode::Ret);
        assert!(matches!(run(b.finish()), Err(RuntimeError::InvalidClosedOver(0))));

        let mut b = ChunkBuilder::new();
        b.emit(Opcode::Pop);
        assert!(matches!(run(b.finish()), Err(RuntimeError::StackUnderflow)));

        let mut b = ChunkBuilder::new();
        b.emit(Opcode::Nil);
        assert!(matches!(run(b.finish()), Err(RuntimeError::MalformedBytecode(_))));
    }

    #[test]
    fn invoking_non_callable_from_bytecode() {
        let mut b = ChunkBuilder::new();
        b.emit_const(Value::Int(1)).unwrap();
        b.emit_invoke(0).emit(Opcode::Ret);
        assert!(matches!(run(b.finish()), Err(RuntimeError::NotCallable(_))));
    }

    #[test]
    fn default_depth_limit_holds_on_small_threads() {
        // (fn [f] (f f)) applied to itself, on a thread with the usual 2 MiB stack.
        let mut body = ChunkBuilder::new();
        body.emit_load_arg(0).emit_load_arg(0).emit_invoke(1).emit(Opcode::Ret);
        let looping = Value::from(Func::new(1, false, Arc::new(body.finish())));

        let handle = std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(move || {
                let result = looping.invoke(vec![looping.clone()]);
                (result, DEPTH.with(Cell::get))
            })
            .unwrap();
        let (result, depth_after) = handle.join().unwrap();
        let limit = config().max_call_depth;
        assert_eq!(limit, 256);
        assert!(matches!(result, Err(RuntimeError::CallDepthExceeded(n)) if n == limit));
        assert_eq!(depth_after, 0);
    }

    #[test]
    fn operand_stack_is_bounded() {
        let limit = config().max_stack_size;
        let mut b = ChunkBuilder::new();
        for _ in 0..=limit {
            b.emit(Opcode::Nil);
        }
        b.emit(Opcode::Ret);
        assert!(matches!(run(b.finish()), Err(RuntimeError::StackOverflow(n)) if n == limit));
    }

    #[test]
    fn depth_is_released_after_errors() {
        let mut b = ChunkBuilder::new();
        b.emit(Opcode::Pop);
        let chunk = b.finish();
        for _ in 0..(config().max_call_depth + 5) {
            assert!(chunk.run(Vec::new(), &[]).is_err());
        }
        DEPTH.with(|depth| assert_eq!(depth.get(), 0));
    }
}
