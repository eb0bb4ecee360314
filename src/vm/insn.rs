//! The target machine's instruction set.
//!
//! A small stack-machine ISA: every instruction pops its operands from the
//! evaluation stack and pushes its result back. Method bodies emitted by the
//! backend are straight-line, with no branches, and end with `ret`.

use std::fmt;

use super::runtime::{self, MethodId};
use super::value::Lane;

/// Index into a method's local-slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u16);

/// One target-machine instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Insn {
    /// Push a local slot.
    Ldloc(LocalId),
    /// Pop into a local slot.
    Stloc(LocalId),
    /// Push a formal argument (0 = constants array, 1 = argument pack).
    Ldarg(u16),
    /// Pop into a formal argument slot.
    Starg(u16),
    /// Push a 32-bit integer constant (sign-extended).
    LdcI4(i32),
    /// Push a 64-bit integer constant.
    LdcI8(i64),
    /// Push the null reference.
    Ldnull,
    Dup,
    Pop,
    // Integer ALU. Binary forms pop b then a and push `a op b`;
    // arithmetic wraps on overflow, shifts mask the count to 0..63.
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
    // Comparisons push 1 or 0 as an integer. `ceq` also compares references
    // by identity; the unsigned forms compare references against null.
    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,
    /// Pop the argument-pack handle, push the handle of one lane array.
    Ldfld(Lane),
    /// Pop an index and an array handle, push the element.
    Ldelem,
    /// Pop a value, an index, and an array handle, store the element.
    Stelem,
    /// Call a runtime-support method: pops its parameters, pushes its result.
    Call(MethodId),
    /// Return to the caller. Compiled methods return no value.
    Ret,
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Insn::Ldloc(LocalId(n)) => write!(f, "ldloc {}", n),
            Insn::Stloc(LocalId(n)) => write!(f, "stloc {}", n),
            Insn::Ldarg(n) => write!(f, "ldarg {}", n),
            Insn::Starg(n) => write!(f, "starg {}", n),
            Insn::LdcI4(v) => write!(f, "ldc.i4 {}", v),
            Insn::LdcI8(v) => write!(f, "ldc.i8 {}", v),
            Insn::Ldnull => write!(f, "ldnull"),
            Insn::Dup => write!(f, "dup"),
            Insn::Pop => write!(f, "pop"),
            Insn::Add => write!(f, "add"),
            Insn::Sub => write!(f, "sub"),
            Insn::Mul => write!(f, "mul"),
            Insn::Div => write!(f, "div"),
            Insn::Rem => write!(f, "rem"),
            Insn::Neg => write!(f, "neg"),
            Insn::Not => write!(f, "not"),
            Insn::And => write!(f, "and"),
            Insn::Or => write!(f, "or"),
            Insn::Xor => write!(f, "xor"),
            Insn::Shl => write!(f, "shl"),
            Insn::Shr => write!(f, "shr"),
            Insn::ShrUn => write!(f, "shr.un"),
            Insn::Ceq => write!(f, "ceq"),
            Insn::Cgt => write!(f, "cgt"),
            Insn::CgtUn => write!(f, "cgt.un"),
            Insn::Clt => write!(f, "clt"),
            Insn::CltUn => write!(f, "clt.un"),
            Insn::Ldfld(Lane::Int) => write!(f, "ldfld ints"),
            Insn::Ldfld(Lane::Ref) => write!(f, "ldfld objs"),
            Insn::Ldelem => write!(f, "ldelem"),
            Insn::Stelem => write!(f, "stelem"),
            Insn::Call(id) => write!(f, "call {}", runtime::method(id).qualified()),
            Insn::Ret => write!(f, "ret"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Insn::Ldloc(LocalId(3)).to_string(), "ldloc 3");
        assert_eq!(Insn::LdcI4(0).to_string(), "ldc.i4 0");
        assert_eq!(Insn::ShrUn.to_string(), "shr.un");
        assert_eq!(Insn::Ldfld(Lane::Int).to_string(), "ldfld ints");
        assert_eq!(Insn::Ldfld(Lane::Ref).to_string(), "ldfld objs");
    }
}
