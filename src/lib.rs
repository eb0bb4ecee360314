//! Kiln - a trace JIT backend for a two-lane stack machine
//!
//! Kiln lowers linear traces of typed operations into straight-line methods
//! for a small managed stack machine, and exposes each compiled method as a
//! directly callable entry point. All data exchange with a compiled method
//! runs through a two-lane argument pack: inputs are unmarshaled from it on
//! entry, and the bailout operation writes live values back into it.

pub mod config;
pub mod jit;
pub mod loader;
pub mod vm;

// Re-export commonly used types
pub use config::BackendConfig;
pub use jit::{Backend, ConstValue, EmitError, OpCode, TableError, Trace, TraceBox, TraceOp};
pub use vm::{ArgPack, CompiledLoop, ExecError, Lane, Obj};
