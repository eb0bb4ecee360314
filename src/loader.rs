//! On-disk trace documents.
//!
//! A small JSON description of a trace (inputs, operations, operands) so
//! traces can be fed to the CLI and to tests without a recording front end.
//! The loader validates variable references and opcode names while
//! converting into the backend's in-memory [`Trace`].
//!
//! Format:
//! ```json
//! {
//!   "inputs": [{ "var": 0, "lane": "int" }],
//!   "ops": [
//!     { "op": "int_add", "args": [{ "var": 0 }, { "int": 1 }],
//!       "result": { "var": 1, "lane": "int" } },
//!     { "op": "fail", "args": [{ "var": 1 }] }
//!   ]
//! }
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::jit::{OpCode, Trace, TraceBox, TraceOp};
use crate::vm::Lane;

#[derive(Debug, Deserialize)]
pub struct TraceDoc {
    #[serde(default)]
    pub inputs: Vec<VarDoc>,
    #[serde(default)]
    pub ops: Vec<OpDoc>,
}

/// A variable declaration: an id plus its lane.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VarDoc {
    pub var: u32,
    pub lane: LaneDoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneDoc {
    Int,
    Ref,
}

impl From<LaneDoc> for Lane {
    fn from(lane: LaneDoc) -> Lane {
        match lane {
            LaneDoc::Int => Lane::Int,
            LaneDoc::Ref => Lane::Ref,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpDoc {
    pub op: String,
    #[serde(default)]
    pub args: Vec<OperandDoc>,
    #[serde(default)]
    pub result: Option<VarDoc>,
}

/// An operand: a reference to a declared variable, an integer constant, or
/// the null constant (`{"null": null}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OperandDoc {
    Var { var: u32 },
    Int { int: i64 },
    Null { null: () },
}

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Json(serde_json::Error),
    /// An operation named an opcode outside the IR opcode universe.
    UnknownOpcode(String),
    /// An operand referenced a variable no input or result declares.
    UnknownVar(u32),
    /// Two declarations used the same variable id.
    DuplicateVar(u32),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::Json(e) => write!(f, "invalid trace document: {}", e),
            LoadError::UnknownOpcode(name) => write!(f, "unknown opcode '{}'", name),
            LoadError::UnknownVar(id) => write!(f, "operand references undeclared variable {}", id),
            LoadError::DuplicateVar(id) => write!(f, "variable {} declared twice", id),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

/// Load and validate a trace document from a file.
pub fn load_trace(path: &Path) -> Result<Trace, LoadError> {
    parse_trace(&fs::read_to_string(path)?)
}

/// Parse and validate a trace document from JSON text.
pub fn parse_trace(text: &str) -> Result<Trace, LoadError> {
    let doc: TraceDoc = serde_json::from_str(text)?;
    convert(doc)
}

fn convert(doc: TraceDoc) -> Result<Trace, LoadError> {
    // Lanes of every declared variable, inputs first, then op results.
    let mut lanes: std::collections::HashMap<u32, Lane> = std::collections::HashMap::new();
    let mut declare = |v: &VarDoc| -> Result<(), LoadError> {
        if lanes.insert(v.var, v.lane.into()).is_some() {
            return Err(LoadError::DuplicateVar(v.var));
        }
        Ok(())
    };
    for input in &doc.inputs {
        declare(input)?;
    }
    for op in &doc.ops {
        if let Some(result) = &op.result {
            declare(result)?;
        }
    }

    let inputs = doc
        .inputs
        .iter()
        .map(|v| TraceBox::var(v.var, v.lane.into()))
        .collect();

    let mut ops = Vec::with_capacity(doc.ops.len());
    for op in &doc.ops {
        let opcode =
            OpCode::from_name(&op.op).ok_or_else(|| LoadError::UnknownOpcode(op.op.clone()))?;
        let mut args = Vec::with_capacity(op.args.len());
        for arg in &op.args {
            args.push(match arg {
                OperandDoc::Var { var } => {
                    let lane = *lanes.get(var).ok_or(LoadError::UnknownVar(*var))?;
                    TraceBox::var(*var, lane)
                }
                OperandDoc::Int { int } => TraceBox::int_const(*int),
                OperandDoc::Null { null: () } => TraceBox::null_const(),
            });
        }
        let result = op.result.as_ref().map(|v| TraceBox::var(v.var, v.lane.into()));
        ops.push(TraceOp::new(opcode, args, result));
    }
    Ok(Trace { inputs, ops })
}
