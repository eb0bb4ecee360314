//! The opcode dispatch table and its builder.
//!
//! Built once per backend instance: every IR opcode resolves to at most one
//! emission routine, either a hand-written override (bailout, the
//! not-yet-supported stubs) or a routine synthesized from the opcode's
//! declarative template. After the build the table is immutable and can be
//! shared read-only across threads; dispatch is a flat array index.

use std::fmt;

use crate::vm::runtime;
use crate::vm::{Insn, MachineType};

use super::method::{EmitError, MethodEmitter};
use super::opcodes::OpCode;
use super::templates::{self, TemplateElem};
use super::trace::TraceOp;

/// A code-generation routine for one opcode.
pub type EmitFn =
    Box<dyn Fn(&mut MethodEmitter, &TraceOp) -> Result<(), EmitError> + Send + Sync>;

/// Fatal table-build failure. Raised before any trace is compiled; a backend
/// with a broken template source must not come up at all.
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// A template used a mnemonic the target machine does not define.
    UnknownMnemonic { opcode: OpCode, mnemonic: String },
    /// A call descriptor could not be parsed.
    BadDescriptor { descriptor: String, reason: &'static str },
    /// A call descriptor named a foreign assembly. Only the backend's own
    /// runtime-support library may be called from compiled code.
    UntrustedCall { descriptor: String },
    /// A parameter or return type name outside the fixed alias table.
    UnknownTypeName { descriptor: String, name: String },
    /// The descriptor parsed but no registered method matches it.
    UnknownMethod { descriptor: String },
    /// The registered method's return type differs from the descriptor's.
    ReturnTypeMismatch { descriptor: String },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::UnknownMnemonic { opcode, mnemonic } => {
                write!(f, "unknown mnemonic '{}' in template for '{}'", mnemonic, opcode.name())
            }
            TableError::BadDescriptor { descriptor, reason } => {
                write!(f, "malformed call descriptor '{}': {}", descriptor, reason)
            }
            TableError::UntrustedCall { descriptor } => {
                write!(f, "call descriptor '{}' names an untrusted assembly", descriptor)
            }
            TableError::UnknownTypeName { descriptor, name } => {
                write!(f, "unknown type name '{}' in call descriptor '{}'", name, descriptor)
            }
            TableError::UnknownMethod { descriptor } => {
                write!(f, "no runtime-support method matches '{}'", descriptor)
            }
            TableError::ReturnTypeMismatch { descriptor } => {
                write!(f, "return type mismatch in call descriptor '{}'", descriptor)
            }
        }
    }
}

impl std::error::Error for TableError {}

/// One synthesized emission step, the compiled form of a template element.
enum Step {
    PushArgs,
    StoreResult,
    Emit(Insn),
}

/// Immutable opcode → routine mapping.
pub struct OpTable {
    routines: Vec<Option<EmitFn>>,
}

impl std::fmt::Debug for OpTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mapped = self.routines.iter().filter(|r| r.is_some()).count();
        f.debug_struct("OpTable")
            .field("slots", &self.routines.len())
            .field("mapped", &mapped)
            .finish()
    }
}

impl OpTable {
    /// Build the table from the static template source.
    pub fn build() -> Result<OpTable, TableError> {
        Self::build_from(templates::TEMPLATES)
    }

    /// Build the table from an explicit template source. Overrides win over
    /// templates; opcodes with neither stay unmapped.
    pub(crate) fn build_from(
        source: &[(OpCode, &'static [TemplateElem])],
    ) -> Result<OpTable, TableError> {
        let mut routines: Vec<Option<EmitFn>> = Vec::with_capacity(OpCode::ALL.len());
        for _ in OpCode::ALL {
            routines.push(None);
        }
        for &op in OpCode::ALL {
            if let Some(routine) = override_for(op) {
                routines[op.index()] = Some(routine);
            } else if let Some(template) = lookup_in(source, op) {
                routines[op.index()] = Some(compile_template(op, template)?);
            }
        }
        Ok(OpTable { routines })
    }

    /// The routine for an opcode, if it has one.
    pub fn routine(&self, op: OpCode) -> Option<&EmitFn> {
        self.routines[op.index()].as_ref()
    }

    /// Whether the backend can emit code for this opcode at all. Stubbed
    /// opcodes count as supported here; they fail at emission time instead.
    pub fn is_mapped(&self, op: OpCode) -> bool {
        self.routines[op.index()].is_some()
    }
}

fn lookup_in(
    source: &[(OpCode, &'static [TemplateElem])],
    op: OpCode,
) -> Option<&'static [TemplateElem]> {
    source.iter().find(|(o, _)| *o == op).map(|(_, t)| *t)
}

/// Hand-written routines for opcodes the templates cannot express.
fn override_for(op: OpCode) -> Option<EmitFn> {
    match op {
        OpCode::Fail => Some(Box::new(|meth, op| meth.emit_fail(op))),
        // Explicit scope boundary: these opcodes are known but have no
        // emission strategy yet. Dispatching one aborts the trace.
        OpCode::Jump
        | OpCode::GuardTrue
        | OpCode::GuardFalse
        | OpCode::GuardValue
        | OpCode::GuardClass
        | OpCode::GuardNoException
        | OpCode::NewWithVtable
        | OpCode::NewArray
        | OpCode::ArraylenGc
        | OpCode::GetarrayitemGc
        | OpCode::SetarrayitemGc
        | OpCode::GetfieldGc
        | OpCode::SetfieldGc
        | OpCode::Newstr
        | OpCode::Strlen
        | OpCode::Strgetitem
        | OpCode::Strsetitem
        | OpCode::Call
        | OpCode::CallPure
        | OpCode::Oosend
        | OpCode::CastPtrToInt
        | OpCode::CastIntToPtr => {
            Some(Box::new(move |_, op| Err(EmitError::NotImplemented(op.opcode))))
        }
        _ => None,
    }
}

/// Translate a template into a routine: parse every mnemonic now, run the
/// resulting steps at emission time.
fn compile_template(
    op: OpCode,
    template: &'static [TemplateElem],
) -> Result<EmitFn, TableError> {
    let mut steps = Vec::with_capacity(template.len());
    for elem in template {
        steps.push(match elem {
            TemplateElem::PushArgs => Step::PushArgs,
            TemplateElem::StoreResult => Step::StoreResult,
            TemplateElem::Instr(text) => Step::Emit(parse_instr(op, text)?),
        });
    }
    Ok(Box::new(move |meth, trace_op| {
        for step in &steps {
            match step {
                Step::PushArgs => meth.push_all_args(trace_op)?,
                Step::StoreResult => meth.store_result(trace_op)?,
                Step::Emit(insn) => meth.emit(*insn),
            }
        }
        Ok(())
    }))
}

/// Parse one template mnemonic into a target instruction.
fn parse_instr(op: OpCode, text: &str) -> Result<Insn, TableError> {
    if let Some(descriptor) = text.strip_prefix("call ") {
        return parse_call_descriptor(descriptor);
    }
    let mut words = text.split_whitespace();
    let mnemonic = words.next().unwrap_or("");
    let operand = words.next();
    let insn = match (mnemonic, operand) {
        ("add", None) => Insn::Add,
        ("sub", None) => Insn::Sub,
        ("mul", None) => Insn::Mul,
        ("div", None) => Insn::Div,
        ("rem", None) => Insn::Rem,
        ("neg", None) => Insn::Neg,
        ("not", None) => Insn::Not,
        ("and", None) => Insn::And,
        ("or", None) => Insn::Or,
        ("xor", None) => Insn::Xor,
        ("shl", None) => Insn::Shl,
        ("shr", None) => Insn::Shr,
        ("shr.un", None) => Insn::ShrUn,
        ("ceq", None) => Insn::Ceq,
        ("cgt", None) => Insn::Cgt,
        ("cgt.un", None) => Insn::CgtUn,
        ("clt", None) => Insn::Clt,
        ("clt.un", None) => Insn::CltUn,
        ("dup", None) => Insn::Dup,
        ("pop", None) => Insn::Pop,
        ("ldnull", None) => Insn::Ldnull,
        ("ldc.i4", Some(v)) => match v.parse::<i32>() {
            Ok(v) => Insn::LdcI4(v),
            Err(_) => return Err(unknown_mnemonic(op, text)),
        },
        ("ldc.i8", Some(v)) => match v.parse::<i64>() {
            Ok(v) => Insn::LdcI8(v),
            Err(_) => return Err(unknown_mnemonic(op, text)),
        },
        _ => return Err(unknown_mnemonic(op, text)),
    };
    Ok(insn)
}

fn unknown_mnemonic(op: OpCode, text: &str) -> TableError {
    TableError::UnknownMnemonic { opcode: op, mnemonic: text.to_string() }
}

/// Parse and resolve a call descriptor of the form
/// `<returntype> <qualifier> [<assembly>]<owner>::<method>(<param>,...)`.
///
/// The assembly tag is checked first: anything but the runtime-support
/// library is rejected here, at table-build time, so an untrusted call can
/// never reach emission.
fn parse_call_descriptor(descriptor: &str) -> Result<Insn, TableError> {
    let bad = |reason: &'static str| TableError::BadDescriptor {
        descriptor: descriptor.to_string(),
        reason,
    };

    let mut parts = descriptor.splitn(3, ' ');
    let ret_name = parts.next().ok_or_else(|| bad("missing return type"))?;
    let _qualifier = parts.next().ok_or_else(|| bad("missing qualifier"))?;
    let target = parts.next().ok_or_else(|| bad("missing call target"))?;

    let rest = target.strip_prefix('[').ok_or_else(|| bad("missing assembly tag"))?;
    let (assembly, rest) = rest.split_once(']').ok_or_else(|| bad("unterminated assembly tag"))?;
    if assembly != runtime::ASSEMBLY {
        return Err(TableError::UntrustedCall { descriptor: descriptor.to_string() });
    }

    let (owner, rest) = rest.split_once("::").ok_or_else(|| bad("missing '::'"))?;
    let (name, rest) = rest.split_once('(').ok_or_else(|| bad("missing parameter list"))?;
    let params_text = rest.strip_suffix(')').ok_or_else(|| bad("unterminated parameter list"))?;

    let mut params = Vec::new();
    if !params_text.is_empty() {
        for param in params_text.split(',') {
            params.push(resolve_type(descriptor, param.trim())?);
        }
    }
    let ret = resolve_type(descriptor, ret_name)?;

    let id = runtime::lookup(owner, name, &params)
        .ok_or_else(|| TableError::UnknownMethod { descriptor: descriptor.to_string() })?;
    if runtime::method(id).ret != ret {
        return Err(TableError::ReturnTypeMismatch { descriptor: descriptor.to_string() });
    }
    Ok(Insn::Call(id))
}

/// The fixed alias table for type names in call descriptors.
fn resolve_type(descriptor: &str, name: &str) -> Result<MachineType, TableError> {
    match name {
        "int32" => Ok(MachineType::Int32),
        "int64" => Ok(MachineType::Int64),
        "float64" => Ok(MachineType::Float64),
        _ => Err(TableError::UnknownTypeName {
            descriptor: descriptor.to_string(),
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::templates::TemplateElem::{Instr, PushArgs, StoreResult};

    #[test]
    fn test_build_succeeds() {
        let table = OpTable::build().unwrap();
        assert!(table.is_mapped(OpCode::IntAdd));
        assert!(table.is_mapped(OpCode::Fail));
        assert!(table.is_mapped(OpCode::GuardTrue));
        assert!(!table.is_mapped(OpCode::IntAddOvf));
    }

    #[test]
    fn test_build_is_idempotent() {
        let first = OpTable::build().unwrap();
        let second = OpTable::build().unwrap();
        for &op in OpCode::ALL {
            assert_eq!(first.is_mapped(op), second.is_mapped(op), "{:?}", op);
        }
    }

    #[test]
    fn test_overrides_win_over_templates() {
        // A template for the bailout opcode must not displace its routine:
        // the synthesized routine would store a result the opcode lacks.
        let source: &[(OpCode, &'static [TemplateElem])] =
            &[(OpCode::Fail, &[PushArgs, Instr("pop"), StoreResult])];
        let table = OpTable::build_from(source).unwrap();
        assert!(table.is_mapped(OpCode::Fail));
        // Everything template-driven is now unmapped.
        assert!(!table.is_mapped(OpCode::IntAdd));
    }

    #[test]
    fn test_unknown_mnemonic_rejected() {
        let source: &[(OpCode, &'static [TemplateElem])] =
            &[(OpCode::IntAdd, &[PushArgs, Instr("fadd"), StoreResult])];
        let err = OpTable::build_from(source).unwrap_err();
        assert!(matches!(err, TableError::UnknownMnemonic { opcode: OpCode::IntAdd, .. }));
    }

    #[test]
    fn test_untrusted_call_rejected_at_build() {
        let source: &[(OpCode, &'static [TemplateElem])] = &[(
            OpCode::IntAbs,
            &[PushArgs, Instr("call int64 static [mscorlib]System.Math::Abs(int64)"), StoreResult],
        )];
        let err = OpTable::build_from(source).unwrap_err();
        assert!(matches!(err, TableError::UntrustedCall { .. }));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let source: &[(OpCode, &'static [TemplateElem])] = &[(
            OpCode::IntAbs,
            &[PushArgs, Instr("call int64 static [kiln]rt.Math::cbrt(int64)"), StoreResult],
        )];
        let err = OpTable::build_from(source).unwrap_err();
        assert!(matches!(err, TableError::UnknownMethod { .. }));
    }

    #[test]
    fn test_unknown_type_name_rejected() {
        let source: &[(OpCode, &'static [TemplateElem])] = &[(
            OpCode::IntAbs,
            &[PushArgs, Instr("call int64 static [kiln]rt.Math::abs(decimal)"), StoreResult],
        )];
        let err = OpTable::build_from(source).unwrap_err();
        assert!(matches!(err, TableError::UnknownTypeName { .. }));
    }

    #[test]
    fn test_return_type_mismatch_rejected() {
        let source: &[(OpCode, &'static [TemplateElem])] = &[(
            OpCode::IntAbs,
            &[PushArgs, Instr("call float64 static [kiln]rt.Math::abs(int64)"), StoreResult],
        )];
        let err = OpTable::build_from(source).unwrap_err();
        assert!(matches!(err, TableError::ReturnTypeMismatch { .. }));
    }

    #[test]
    fn test_malformed_descriptor_rejected() {
        let source: &[(OpCode, &'static [TemplateElem])] = &[(
            OpCode::IntAbs,
            &[PushArgs, Instr("call int64 static [kiln]rt.Math::abs(int64"), StoreResult],
        )];
        let err = OpTable::build_from(source).unwrap_err();
        assert!(matches!(
            err,
            TableError::BadDescriptor { reason: "unterminated parameter list", .. }
        ));
    }

    #[test]
    fn test_parse_parameterized_constant() {
        assert_eq!(parse_instr(OpCode::IntNe, "ldc.i4 0").unwrap(), Insn::LdcI4(0));
        assert_eq!(parse_instr(OpCode::IntNe, "ldc.i8 -3").unwrap(), Insn::LdcI8(-3));
        assert!(parse_instr(OpCode::IntNe, "ldc.i4 x").is_err());
        assert!(parse_instr(OpCode::IntNe, "add 1").is_err());
    }
}
