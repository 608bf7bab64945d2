// NightVM library entry point
// Value model, collections, functions and the host bridge of the NightVM runtime,
// plus a small bytecode engine for running compiled function bodies.

pub mod api;
pub mod bytecode;
pub mod config;
pub mod runtime;


// Re-export commonly used types
pub use api::Runtime;
pub use bytecode::{ChunkBuilder, CodeChunk, Opcode};
pub use config::{config, init, VmConfig};
pub use runtime::{
    box_value, ArrayVector, Closure, Func, HostFn, HostValue, List, Range, RuntimeError,
    RuntimeResult, TypedFn, Value, TYPES,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
