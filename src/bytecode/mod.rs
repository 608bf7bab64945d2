//! NVBC (NightVM bytecode) chunks.
//!
//! A [`CodeChunk`] is the compiled body of one function: a constant pool plus code.
//! Chunks run through [`crate::runtime::frame::Frame`] and can be saved and loaded.
//!
//! Binary format (v1):
//! - Magic: "NVBC" (4 bytes)
//! - Version: u16 (little-endian)
//! - Chunk body:
//!   - Constant pool count: u32
//!   - Constant pool entries: [tag: u8, payload...]
//!   - Code length: u32
//!   - Code: raw bytes
//!
//! Function constants carry their own nested chunk body.

use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::runtime::{Func, RuntimeError, RuntimeResult, Value};

/// NVBC file magic bytes
pub const MAGIC: &[u8; 4] = b"NVBC";

/// Current format version
pub const VERSION: u16 = 1;

/// Deepest nesting of function constants a file may contain.
pub const MAX_NESTING: usize = 64;

// ============================================================================
// Opcodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Push constant from pool: CONST <u16 index>
    Const = 0x01,
    /// Push positional argument: LOAD_ARG <u8 slot>
    LoadArg = 0x02,
    /// Push captured value: LOAD_CLOSED_OVER <u8 slot>
    LoadClosedOver = 0x03,
    /// Push nil: NIL
    Nil = 0x06,
    /// Invoke callee below the arguments: INVOKE <u8 argc>
    Invoke = 0x10,
    /// Return top of stack: RET
    Ret = 0x11,
    /// Unconditional jump: JUMP <i16 offset>
    Jump = 0x20,
    /// Jump if top of stack is falsy: JUMP_IF_FALSE <i16 offset>
    JumpIfFalse = 0x21,
    /// Close over values: MAKE_CLOSURE <u8 capture_count>
    MakeClosure = 0x30,
    /// Collect values into a list: MAKE_LIST <u16 count>
    MakeList = 0x40,
    /// Collect values into a vector: MAKE_VECTOR <u16 count>
    MakeVector = 0x41,
    First = 0x42,
    More = 0x43,
    Cons = 0x44,
    Count = 0x45,
    ValueAt = 0x46,
    /// Pops start, end and step: RANGE
    Range = 0x47,
    Add = 0x70,
    Sub = 0x71,
    Mul = 0x72,
    Eq = 0x75,
    Lt = 0x77,
    /// Duplicate top of stack
    Dup = 0x80,
    /// Pop and discard top of stack
    Pop = 0x81,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Const),
            0x02 => Some(Self::LoadArg),
            0x03 => Some(Self::LoadClosedOver),
            0x06 => Some(Self::Nil),
            0x10 => Some(Self::Invoke),
            0x11 => Some(Self::Ret),
            0x20 => Some(Self::Jump),
            0x21 => Some(Self::JumpIfFalse),
            0x30 => Some(Self::MakeClosure),
            0x40 => Some(Self::MakeList),
            0x41 => Some(Self::MakeVector),
            0x42 => Some(Self::First),
            0x43 => Some(Self::More),
            0x44 => Some(Self::Cons),
            0x45 => Some(Self::Count),
            0x46 => Some(Self::ValueAt),
            0x47 => Some(Self::Range),
            0x70 => Some(Self::Add),
            0x71 => Some(Self::Sub),
            0x72 => Some(Self::Mul),
            0x75 => Some(Self::Eq),
            0x77 => Some(Self::Lt),
            0x80 => Some(Self::Dup),
            0x81 => Some(Self::Pop),
            _ => None,
        }
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> usize {
        match self {
            Self::Const | Self::Jump | Self::JumpIfFalse | Self::MakeList | Self::MakeVector => 2,
            Self::LoadArg | Self::LoadClosedOver | Self::Invoke | Self::MakeClosure => 1,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Const => "CONST",
            Self::LoadArg => "LOAD_ARG",
            Self::LoadClosedOver => "LOAD_CLOSED_OVER",
            Self::Nil => "NIL",
            Self::Invoke => "INVOKE",
            Self::Ret => "RET",
            Self::Jump => "JUMP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::MakeClosure => "MAKE_CLOSURE",
            Self::MakeList => "MAKE_LIST",
            Self::MakeVector => "MAKE_VECTOR",
            Self::First => "FIRST",
            Self::More => "MORE",
            Self::Cons => "CONS",
            Self::Count => "COUNT",
            Self::ValueAt => "VALUE_AT",
            Self::Range => "RANGE",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Eq => "EQ",
            Self::Lt => "LT",
            Self::Dup => "DUP",
            Self::Pop => "POP",
        }
    }
}

// ============================================================================
// Constant Pool Tags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConstantTag {
    Utf8 = 1,
    Int64 = 2,
    Float64 = 3,
    Bool = 4,
    Null = 5,
    Func = 6,
}

// ============================================================================
// Code Chunk
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CodeChunk {
    constants: Vec<Value>,
    code: Vec<u8>,
}

impl CodeChunk {
    pub fn new(constants: Vec<Value>, code: Vec<u8>) -> Self {
        Self { constants, code }
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn constant(&self, idx: usize) -> RuntimeResult<&Value> {
        self.constants
            .get(idx)
            .ok_or(RuntimeError::InvalidConstant(idx))
    }

    /// Checks that every instruction decodes, operands are complete, constant indices
    /// exist and jumps land on an instruction boundary (or the end of code).
    pub fn verify(&self) -> RuntimeResult<()> {
        let mut starts = vec![false; self.code.len() + 1];
        let mut jumps = Vec::new();
        let mut ip = 0;
        while ip < self.code.len() {
            starts[ip] = true;
            let byte = self.code[ip];
            let op = Opcode::from_u8(byte).ok_or(RuntimeError::InvalidOpcode(byte))?;
            let operand = ip + 1;
            let next = operand + op.operand_len();
            if next > self.code.len() {
                return Err(RuntimeError::malformed(format!(
                    "truncated operand for {} at {ip}",
                    op.mnemonic()
                )));
            }
            match op {
                Opcode::Const => {
                    let idx = self.read_u16(operand) as usize;
                    self.constant(idx)?;
                }
                Opcode::Jump | Opcode::JumpIfFalse => {
                    let offset = self.read_u16(operand) as i16;
                    jumps.push((ip, next as isize + offset as isize));
                }
                _ => {}
            }
            ip = next;
        }
        starts[self.code.len()] = true;
        for (at, target) in jumps {
            let landed = usize::try_from(target)
                .ok()
                .and_then(|t| starts.get(t).copied())
                .unwrap_or(false);
            if !landed {
                return Err(RuntimeError::malformed(format!(
                    "jump at {at} targets {target}"
                )));
            }
        }
        Ok(())
    }

    fn read_u16(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.code[at], self.code[at + 1]])
    }

    /// Write to binary format
    pub fn write<W: Write>(&self, w: &mut W) -> RuntimeResult<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        self.write_body(w)
    }

    fn write_body<W: Write>(&self, w: &mut W) -> RuntimeResult<()> {
        w.write_all(&(self.constants.len() as u32).to_le_bytes())?;
        for constant in &self.constants {
            write_constant(w, constant)?;
        }
        w.write_all(&(self.code.len() as u32).to_le_bytes())?;
        w.write_all(&self.code)?;
        Ok(())
    }

    /// Read from binary format. The chunk and every nested function chunk are verified.
    pub fn read<R: Read>(r: &mut R) -> RuntimeResult<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(RuntimeError::malformed("invalid NVBC magic"));
        }
        let version = read_u16(r)?;
        if version != VERSION {
            return Err(RuntimeError::malformed(format!(
                "unsupported NVBC version: {version}"
            )));
        }
        Self::read_body(r, 0)
    }

    fn read_body<R: Read>(r: &mut R, depth: usize) -> RuntimeResult<Self> {
        if depth > MAX_NESTING {
            return Err(RuntimeError::malformed(format!(
                "function constants nested deeper than {MAX_NESTING}"
            )));
        }
        let const_count = read_u32(r)? as usize;
        let mut constants = Vec::with_capacity(const_count.min(1024));
        for _ in 0..const_count {
            constants.push(read_constant(r, depth)?);
        }
        let code_len = read_u32(r)? as usize;
        let mut code = Vec::new();
        r.by_ref().take(code_len as u64).read_to_end(&mut code)?;
        if code.len() != code_len {
            return Err(RuntimeError::malformed("code section truncated"));
        }
        let chunk = Self { constants, code };
        chunk.verify()?;
        Ok(chunk)
    }

    /// Human-readable listing, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let mut ip = 0;
        while ip < self.code.len() {
            let byte = self.code[ip];
            let Some(op) = Opcode::from_u8(byte) else {
                let _ = writeln!(out, "{ip:04}  ?? 0x{byte:02X}");
                ip += 1;
                continue;
            };
            let operand = ip + 1;
            let next = operand + op.operand_len();
            if next > self.code.len() {
                let _ = writeln!(out, "{ip:04}  {} <truncated>", op.mnemonic());
                break;
            }
            let _ = match op.operand_len() {
                0 => writeln!(out, "{ip:04}  {}", op.mnemonic()),
                1 => writeln!(out, "{ip:04}  {} {}", op.mnemonic(), self.code[operand]),
                _ => {
                    let raw = self.read_u16(operand);
                    match op {
                        Opcode::Const => {
                            let shown = self
                                .constants
                                .get(raw as usize)
                                .map_or_else(|| "<missing>".to_string(), |v| v.to_string());
                            writeln!(out, "{ip:04}  {} {raw} ; {shown}", op.mnemonic())
                        }
                        Opcode::Jump | Opcode::JumpIfFalse => {
                            let target = next as isize + raw as i16 as isize;
                            writeln!(out, "{ip:04}  {} {} -> {target}", op.mnemonic(), raw as i16)
                        }
                        _ => writeln!(out, "{ip:04}  {} {raw}", op.mnemonic()),
                    }
                }
            };
            ip = next;
        }
        out
    }
}

fn write_constant<W: Write>(w: &mut W, value: &Value) -> RuntimeResult<()> {
    match value {
        Value::Str(s) => {
            w.write_all(&[ConstantTag::Utf8 as u8])?;
            write_bytes(w, s.as_bytes())?;
        }
        Value::Int(n) => {
            w.write_all(&[ConstantTag::Int64 as u8])?;
            w.write_all(&n.to_le_bytes())?;
        }
        Value::Float(n) => {
            w.write_all(&[ConstantTag::Float64 as u8])?;
            w.write_all(&n.to_le_bytes())?;
        }
        Value::Bool(b) => {
            w.write_all(&[ConstantTag::Bool as u8, u8::from(*b)])?;
        }
        Value::Nil => {
            w.write_all(&[ConstantTag::Null as u8])?;
        }
        Value::Func(func) => {
            let chunk = func.unit().as_chunk().ok_or_else(|| {
                RuntimeError::type_error(value, "has no bytecode to write", "NVBC")
            })?;
            let arity = u16::try_from(func.arity())
                .map_err(|_| RuntimeError::type_error(value, "has too many parameters for", "NVBC"))?;
            w.write_all(&[ConstantTag::Func as u8])?;
            w.write_all(&arity.to_le_bytes())?;
            w.write_all(&[u8::from(func.is_variadic())])?;
            write_bytes(w, func.name().unwrap_or_default().as_bytes())?;
            chunk.write_body(w)?;
        }
        other => {
            return Err(RuntimeError::type_error(other, "can't be written as", "NVBC constant"));
        }
    }
    Ok(())
}

fn read_constant<R: Read>(r: &mut R, depth: usize) -> RuntimeResult<Value> {
    let mut tag = [0u8; 1];
    r.read_exact(&mut tag)?;
    match tag[0] {
        1 => Ok(Value::from(read_string(r)?)),
        2 => {
            let mut bytes = [0u8; 8];
            r.read_exact(&mut bytes)?;
            Ok(Value::Int(i64::from_le_bytes(bytes)))
        }
        3 => {
            let mut bytes = [0u8; 8];
            r.read_exact(&mut bytes)?;
            Ok(Value::Float(f64::from_le_bytes(bytes)))
        }
        4 => {
            let mut bytes = [0u8; 1];
            r.read_exact(&mut bytes)?;
            Ok(Value::Bool(bytes[0] != 0))
        }
        5 => Ok(Value::Nil),
        6 => {
            let arity = read_u16(r)? as usize;
            let mut variadic = [0u8; 1];
            r.read_exact(&mut variadic)?;
            let name = read_string(r)?;
            let chunk = CodeChunk::read_body(r, depth + 1)?;
            let mut func = Func::new(arity, variadic[0] != 0, Arc::new(chunk));
            if !name.is_empty() {
                func = func.with_name(name);
            }
            Ok(Value::Func(Arc::new(func)))
        }
        other => Err(RuntimeError::malformed(format!(
            "unknown constant tag: {other}"
        ))),
    }
}

fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_string<R: Read>(r: &mut R) -> RuntimeResult<String> {
    let len = read_u32(r)? as usize;
    let mut bytes = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(RuntimeError::malformed("string constant truncated"));
    }
    String::from_utf8(bytes).map_err(|e| RuntimeError::malformed(e.to_string()))
}

fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

// ============================================================================
// Chunk Builder
// ============================================================================

/// Helper for assembling chunks by hand (tests, tools, hosts without a compiler).
#[derive(Default)]
pub struct ChunkBuilder {
    code: Vec<u8>,
    constants: Vec<Value>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant to the pool, returning its index. Equal scalars are shared.
    pub fn add_constant(&mut self, value: Value) -> RuntimeResult<u16> {
        let shareable = !matches!(value, Value::Func(_) | Value::Closure(_));
        if shareable {
            if let Some(i) = self.constants.iter().position(|c| c == &value) {
                return Ok(i as u16);
            }
        }
        let idx = u16::try_from(self.constants.len())
            .map_err(|_| RuntimeError::malformed("constant pool is full"))?;
        self.constants.push(value);
        Ok(idx)
    }

    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    pub fn emit_u8(&mut self, value: u8) -> &mut Self {
        self.code.push(value);
        self
    }

    pub fn emit_u16(&mut self, value: u16) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn emit_i16(&mut self, value: i16) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn emit_const(&mut self, value: Value) -> RuntimeResult<&mut Self> {
        let idx = self.add_constant(value)?;
        Ok(self.emit(Opcode::Const).emit_u16(idx))
    }

    pub fn emit_load_arg(&mut self, slot: u8) -> &mut Self {
        self.emit(Opcode::LoadArg).emit_u8(slot)
    }

    pub fn emit_load_closed_over(&mut self, slot: u8) -> &mut Self {
        self.emit(Opcode::LoadClosedOver).emit_u8(slot)
    }

    pub fn emit_invoke(&mut self, argc: u8) -> &mut Self {
        self.emit(Opcode::Invoke).emit_u8(argc)
    }

    pub fn emit_make_closure(&mut self, captures: u8) -> &mut Self {
        self.emit(Opcode::MakeClosure).emit_u8(captures)
    }

    pub fn emit_make_list(&mut self, count: u16) -> &mut Self {
        self.emit(Opcode::MakeList).emit_u16(count)
    }

    pub fn emit_make_vector(&mut self, count: u16) -> &mut Self {
        self.emit(Opcode::MakeVector).emit_u16(count)
    }

    /// Emits a jump with a placeholder offset and returns the operand position for
    /// [`ChunkBuilder::patch_jump_here`].
    pub fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit(op);
        let at = self.code.len();
        self.emit_i16(0);
        at
    }

    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn patch_jump(&mut self, offset: usize, target: i16) -> RuntimeResult<()> {
        let operand = offset
            .checked_add(2)
            .and_then(|end| self.code.get_mut(offset..end))
            .ok_or_else(|| RuntimeError::malformed(format!("no jump operand at {offset}")))?;
        operand.copy_from_slice(&target.to_le_bytes());
        Ok(())
    }

    /// Points the jump whose operand sits at `offset` to the current end of code.
    pub fn patch_jump_here(&mut self, offset: usize) -> RuntimeResult<()> {
        let distance = offset
            .checked_add(2)
            .and_then(|end| self.code.len().checked_sub(end))
            .ok_or_else(|| RuntimeError::malformed(format!("no jump operand at {offset}")))?;
        let target = i16::try_from(distance)
            .map_err(|_| RuntimeError::malformed("jump distance out of range"))?;
        self.patch_jump(offset, target)
    }

    pub fn finish(self) -> CodeChunk {
        CodeChunk::new(self.constants, self.code)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn add_one() -> CodeChunk {
        let mut b = ChunkBuilder::new();
        b.emit_load_arg(0);
        b.emit_const(Value::Int(1)).unwrap();
        b.emit(Opcode::Add).emit(Opcode::Ret);
        b.finish()
    }

    #[test]
    fn test_builder_layout() {
        let chunk = add_one();
        assert_eq!(
            chunk.code(),
            &[0x02, 0x00, 0x01, 0x00, 0x00, 0x70, 0x11]
        );
        assert_eq!(chunk.constants(), &[Value::Int(1)]);
        chunk.verify().unwrap();
    }

    #[test]
    fn test_constants_are_shared() {
        let mut b = ChunkBuilder::new();
        assert_eq!(b.add_constant(Value::from("a")).unwrap(), 0);
        assert_eq!(b.add_constant(Value::Int(3)).unwrap(), 1);
        assert_eq!(b.add_constant(Value::from("a")).unwrap(), 0);
    }

    #[test]
    fn test_file_roundtrip_with_nested_function() {
        let inner = Func::new(1, false, Arc::new(add_one())).with_name("inc");
        let mut b = ChunkBuilder::new();
        b.emit_const(Value::from(inner)).unwrap();
        b.emit_const(Value::Int(41)).unwrap();
        b.emit_const(Value::from("label")).unwrap();
        b.emit(Opcode::Pop).emit_invoke(1).emit(Opcode::Ret);
        let chunk = b.finish();

        let mut buf = Vec::new();
        chunk.write(&mut buf).unwrap();
        assert_eq!(&buf[..4], MAGIC);

        let loaded = CodeChunk::read(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.code(), chunk.code());
        assert_eq!(loaded.constants()[1], Value::Int(41));
        let Value::Func(func) = &loaded.constants()[0] else {
            panic!("expected a function constant");
        };
        assert_eq!(func.name(), Some("inc"));
        assert_eq!(func.arity(), 1);
        assert_eq!(func.invoke(vec![Value::Int(1)]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_native_functions_cannot_be_written() {
        let native = Func::native(0, |_| Ok(Value::Nil));
        let chunk = CodeChunk::new(vec![Value::from(native)], vec![Opcode::Ret as u8]);
        assert!(matches!(
            chunk.write(&mut Vec::new()),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn test_read_rejects_bad_magic_and_version() {
        let err = CodeChunk::read(&mut &b"AFBC\x01\x00"[..]).unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedBytecode(_)));
        let err = CodeChunk::read(&mut &b"NVBC\x09\x00"[..]).unwrap_err();
        assert!(err.to_string().contains("unsupported NVBC version"));
    }

    #[test]
    fn test_read_rejects_deep_nesting() {
        // Each level is a one-constant pool holding a function whose body is the next level.
        fn nested(levels: usize) -> Vec<u8> {
            let mut bytes = MAGIC.to_vec();
            bytes.extend_from_slice(&VERSION.to_le_bytes());
            for _ in 0..levels {
                bytes.extend_from_slice(&1u32.to_le_bytes());
                bytes.push(ConstantTag::Func as u8);
                bytes.extend_from_slice(&0u16.to_le_bytes());
                bytes.push(0);
                bytes.extend_from_slice(&0u32.to_le_bytes());
            }
            // innermost body: no constants, no code
            bytes.extend_from_slice(&0u32.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
            for _ in 0..levels {
                bytes.extend_from_slice(&0u32.to_le_bytes());
            }
            bytes
        }

        let shallow = CodeChunk::read(&mut nested(8).as_slice()).unwrap();
        assert!(matches!(shallow.constants()[0], Value::Func(_)));
        assert!(CodeChunk::read(&mut nested(MAX_NESTING).as_slice()).is_ok());

        let err = CodeChunk::read(&mut nested(200_000).as_slice()).unwrap_err();
        assert!(matches!(err, RuntimeError::MalformedBytecode(ref m) if m.contains("nested deeper")));
    }

    #[test]
    fn test_patch_jump_rejects_foreign_offsets() {
        let mut b = ChunkBuilder::new();
        let at = b.emit_jump(Opcode::Jump);
        b.emit(Opcode::Nil).emit(Opcode::Ret);
        assert!(matches!(b.patch_jump(at + 4, 0), Err(RuntimeError::MalformedBytecode(_))));
        assert!(matches!(b.patch_jump(usize::MAX, 0), Err(RuntimeError::MalformedBytecode(_))));
        assert!(matches!(b.patch_jump_here(40), Err(RuntimeError::MalformedBytecode(_))));
        assert!(matches!(b.patch_jump_here(usize::MAX), Err(RuntimeError::MalformedBytecode(_))));

        b.patch_jump(at, 1).unwrap();
        let chunk = b.finish();
        chunk.verify().unwrap();
        assert_eq!(&chunk.code()[1..3], &[1, 0]);
    }

    #[test]
    fn test_verify_rejects_bad_code() {
        let bad_const = CodeChunk::new(Vec::new(), vec![0x01, 0x05, 0x00, 0x11]);
        assert!(matches!(bad_const.verify(), Err(RuntimeError::InvalidConstant(5))));

        let truncated = CodeChunk::new(Vec::new(), vec![0x02]);
        assert!(matches!(truncated.verify(), Err(RuntimeError::MalformedBytecode(_))));

        let unknown = CodeChunk::new(Vec::new(), vec![0xEE]);
        assert!(matches!(unknown.verify(), Err(RuntimeError::InvalidOpcode(0xEE))));

        // jumps into the middle of the LOAD_ARG operand
        let mid = CodeChunk::new(Vec::new(), vec![0x20, 0x01, 0x00, 0x02, 0x00, 0x11]);
        assert!(matches!(mid.verify(), Err(RuntimeError::MalformedBytecode(_))));
    }

    #[test]
    fn test_disassemble() {
        let listing = add_one().disassemble();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(
            lines,
            vec!["0000  LOAD_ARG 0", "0002  CONST 0 ; 1", "0005  ADD", "0006  RET"]
        );
    }
}
