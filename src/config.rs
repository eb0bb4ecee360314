//! Backend configuration types.

/// Diagnostics switches for the backend. Everything defaults to off.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendConfig {
    /// Log a one-line event to stderr for every compiled trace.
    pub trace_compile: bool,
    /// Dump each compiled method's disassembly to stderr.
    pub dump_code: bool,
}
