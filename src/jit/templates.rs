//! Declarative per-opcode instruction templates.
//!
//! The table builder treats this module as an external, versioned, read-only
//! data source: each entry is an ordered recipe of target-instruction
//! mnemonics plus the two markers `PushArgs` (load every operand box, in
//! order) and `StoreResult` (store the single result box). Mnemonic text is
//! parsed once, at table-build time; a bad mnemonic or call descriptor here
//! is a build failure, never an emission-time surprise.

use super::opcodes::OpCode;
use TemplateElem::{Instr, PushArgs, StoreResult};

/// Version marker of the template source, bumped whenever entries change
/// meaning (not just grow).
pub const VERSION: u32 = 2;

/// One element of an opcode's recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateElem {
    /// Load every operand box, in operand order.
    PushArgs,
    /// Store the operation's result box.
    StoreResult,
    /// A literal target-instruction mnemonic, optionally parameterized
    /// ("add", "ldc.i4 0", "call int64 static [kiln]rt.Math::abs(int64)").
    Instr(&'static str),
}

/// Recipes for every opcode emitted by template synthesis.
///
/// Comparison lowering leans on `ceq` with a constant: `a != b` is
/// `(a ceq b) ceq 0`, `a <= b` is `(a cgt b) ceq 0`, and truth-testing is a
/// double `ceq 0`.
pub static TEMPLATES: &[(OpCode, &[TemplateElem])] = &[
    (OpCode::IntAdd, &[PushArgs, Instr("add"), StoreResult]),
    (OpCode::IntSub, &[PushArgs, Instr("sub"), StoreResult]),
    (OpCode::IntMul, &[PushArgs, Instr("mul"), StoreResult]),
    (OpCode::IntFloorDiv, &[PushArgs, Instr("div"), StoreResult]),
    (OpCode::IntMod, &[PushArgs, Instr("rem"), StoreResult]),
    (OpCode::IntAnd, &[PushArgs, Instr("and"), StoreResult]),
    (OpCode::IntOr, &[PushArgs, Instr("or"), StoreResult]),
    (OpCode::IntXor, &[PushArgs, Instr("xor"), StoreResult]),
    (OpCode::IntLshift, &[PushArgs, Instr("shl"), StoreResult]),
    (OpCode::IntRshift, &[PushArgs, Instr("shr"), StoreResult]),
    (OpCode::UintRshift, &[PushArgs, Instr("shr.un"), StoreResult]),
    (OpCode::IntNeg, &[PushArgs, Instr("neg"), StoreResult]),
    (OpCode::IntInvert, &[PushArgs, Instr("not"), StoreResult]),
    (
        OpCode::IntAbs,
        &[PushArgs, Instr("call int64 static [kiln]rt.Math::abs(int64)"), StoreResult],
    ),
    (OpCode::IntEq, &[PushArgs, Instr("ceq"), StoreResult]),
    (
        OpCode::IntNe,
        &[PushArgs, Instr("ceq"), Instr("ldc.i4 0"), Instr("ceq"), StoreResult],
    ),
    (OpCode::IntLt, &[PushArgs, Instr("clt"), StoreResult]),
    (
        OpCode::IntLe,
        &[PushArgs, Instr("cgt"), Instr("ldc.i4 0"), Instr("ceq"), StoreResult],
    ),
    (OpCode::IntGt, &[PushArgs, Instr("cgt"), StoreResult]),
    (
        OpCode::IntGe,
        &[PushArgs, Instr("clt"), Instr("ldc.i4 0"), Instr("ceq"), StoreResult],
    ),
    (OpCode::UintLt, &[PushArgs, Instr("clt.un"), StoreResult]),
    (
        OpCode::UintLe,
        &[PushArgs, Instr("cgt.un"), Instr("ldc.i4 0"), Instr("ceq"), StoreResult],
    ),
    (OpCode::UintGt, &[PushArgs, Instr("cgt.un"), StoreResult]),
    (
        OpCode::UintGe,
        &[PushArgs, Instr("clt.un"), Instr("ldc.i4 0"), Instr("ceq"), StoreResult],
    ),
    (
        OpCode::IntIsTrue,
        &[
            PushArgs,
            Instr("ldc.i4 0"),
            Instr("ceq"),
            Instr("ldc.i4 0"),
            Instr("ceq"),
            StoreResult,
        ],
    ),
    (
        OpCode::BoolNot,
        &[PushArgs, Instr("ldc.i4 0"), Instr("ceq"), StoreResult],
    ),
    (
        OpCode::OoIsNull,
        &[PushArgs, Instr("ldnull"), Instr("ceq"), StoreResult],
    ),
    (
        OpCode::OoNonNull,
        &[PushArgs, Instr("ldnull"), Instr("cgt.un"), StoreResult],
    ),
    (OpCode::SameAs, &[PushArgs, StoreResult]),
];

/// Template for one opcode, if it has one.
pub fn lookup(op: OpCode) -> Option<&'static [TemplateElem]> {
    TEMPLATES.iter().find(|(o, _)| *o == op).map(|(_, t)| *t)
}
