//! The backend facade.
//!
//! One [`Backend`] owns one opcode table, built at construction and never
//! mutated again. Traces compile independently against the shared table, so
//! a single backend can serve concurrent compilations from multiple threads.

use crate::config::BackendConfig;
use crate::vm::CompiledLoop;

use super::method::{EmitError, MethodEmitter};
use super::opcodes::OpCode;
use super::table::{OpTable, TableError};
use super::trace::Trace;

pub struct Backend {
    table: OpTable,
    config: BackendConfig,
}

impl Backend {
    /// A backend with default configuration.
    pub fn new() -> Result<Backend, TableError> {
        Self::with_config(BackendConfig::default())
    }

    /// Build the opcode table once; fail construction outright if the
    /// template source is broken.
    pub fn with_config(config: BackendConfig) -> Result<Backend, TableError> {
        Ok(Backend { table: OpTable::build()?, config })
    }

    /// Compile one trace into a directly callable loop.
    pub fn compile_loop(&self, name: &str, trace: &Trace) -> Result<CompiledLoop, EmitError> {
        let compiled = MethodEmitter::compile(&self.table, name, trace)?;
        if self.config.trace_compile {
            eprintln!(
                "[JIT] Compiled loop '{}' ({} instructions, {} locals)",
                name,
                compiled.image().code().len(),
                compiled.image().locals().len()
            );
        }
        if self.config.dump_code {
            eprint!("{}", compiled.image());
        }
        Ok(compiled)
    }

    /// Whether the opcode has any table entry (including the explicit
    /// not-yet-supported stubs).
    pub fn is_mapped(&self, op: OpCode) -> bool {
        self.table.is_mapped(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::trace::{TraceBox, TraceOp};
    use crate::vm::{ArgPack, Lane};

    #[test]
    fn test_compile_and_invoke() {
        let backend = Backend::new().unwrap();
        let a = TraceBox::var(0, Lane::Int);
        let trace = Trace {
            inputs: vec![a.clone()],
            ops: vec![TraceOp::new(OpCode::Fail, vec![a], None)],
        };
        let compiled = backend.compile_loop("echo", &trace).unwrap();
        let mut pack = ArgPack::with_sizes(1, 0);
        pack.ints[0] = 99;
        compiled.invoke(&mut pack).unwrap();
        assert_eq!(pack.ints, vec![99]);
    }

    #[test]
    fn test_is_mapped() {
        let backend = Backend::new().unwrap();
        assert!(backend.is_mapped(OpCode::IntAdd));
        assert!(!backend.is_mapped(OpCode::IntMulOvf));
    }
}
