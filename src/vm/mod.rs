//! The managed target machine.
//!
//! Everything the backend compiles *into*: the slot/value model, the
//! stack-machine instruction set, method shells and finalized method images,
//! the straight-line executor, the two-lane argument pack, and the trusted
//! runtime-support library.

mod insn;
mod interp;
mod method;
mod pack;
pub mod runtime;
mod value;

pub use insn::{Insn, LocalId};
pub use interp::ExecError;
pub use method::{CompiledLoop, MethodImage, MethodShell};
pub use pack::ArgPack;
pub use value::{obj_eq, Lane, MachineType, Obj, Slot};
