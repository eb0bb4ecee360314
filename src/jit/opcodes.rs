//! IR opcodes the backend can be asked to compile.
//!
//! The enum is the complete opcode universe: some opcodes have declarative
//! instruction templates, some have hand-written emission routines, some are
//! explicitly stubbed as unsupported, and a few have no table entry at all
//! yet. Discriminants are contiguous from zero so the dispatch table can be a
//! flat array indexed by opcode.

/// One IR operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Integer arithmetic
    IntAdd,
    IntSub,
    IntMul,
    IntFloorDiv,
    IntMod,
    IntAnd,
    IntOr,
    IntXor,
    IntLshift,
    IntRshift,
    UintRshift,
    IntNeg,
    IntInvert,
    IntAbs,
    // Integer comparisons
    IntEq,
    IntNe,
    IntLt,
    IntLe,
    IntGt,
    IntGe,
    UintLt,
    UintLe,
    UintGt,
    UintGe,
    IntIsTrue,
    BoolNot,
    // Reference tests
    OoIsNull,
    OoNonNull,
    SameAs,
    // Overflow-checked arithmetic. No emission strategy exists for these
    // yet, so they have neither a routine nor a template.
    IntAddOvf,
    IntSubOvf,
    IntMulOvf,
    // Control
    Fail,
    Jump,
    // Guards
    GuardTrue,
    GuardFalse,
    GuardValue,
    GuardClass,
    GuardNoException,
    // Heap access
    NewWithVtable,
    NewArray,
    ArraylenGc,
    GetarrayitemGc,
    SetarrayitemGc,
    GetfieldGc,
    SetfieldGc,
    // Strings
    Newstr,
    Strlen,
    Strgetitem,
    Strsetitem,
    // Calls and casts
    Call,
    CallPure,
    Oosend,
    CastPtrToInt,
    CastIntToPtr,
}

impl OpCode {
    /// Every opcode, in discriminant order.
    pub const ALL: &'static [OpCode] = &[
        OpCode::IntAdd,
        OpCode::IntSub,
        OpCode::IntMul,
        OpCode::IntFloorDiv,
        OpCode::IntMod,
        OpCode::IntAnd,
        OpCode::IntOr,
        OpCode::IntXor,
        OpCode::IntLshift,
        OpCode::IntRshift,
        OpCode::UintRshift,
        OpCode::IntNeg,
        OpCode::IntInvert,
        OpCode::IntAbs,
        OpCode::IntEq,
        OpCode::IntNe,
        OpCode::IntLt,
        OpCode::IntLe,
        OpCode::IntGt,
        OpCode::IntGe,
        OpCode::UintLt,
        OpCode::UintLe,
        OpCode::UintGt,
        OpCode::UintGe,
        OpCode::IntIsTrue,
        OpCode::BoolNot,
        OpCode::OoIsNull,
        OpCode::OoNonNull,
        OpCode::SameAs,
        OpCode::IntAddOvf,
        OpCode::IntSubOvf,
        OpCode::IntMulOvf,
        OpCode::Fail,
        OpCode::Jump,
        OpCode::GuardTrue,
        OpCode::GuardFalse,
        OpCode::GuardValue,
        OpCode::GuardClass,
        OpCode::GuardNoException,
        OpCode::NewWithVtable,
        OpCode::NewArray,
        OpCode::ArraylenGc,
        OpCode::GetarrayitemGc,
        OpCode::SetarrayitemGc,
        OpCode::GetfieldGc,
        OpCode::SetfieldGc,
        OpCode::Newstr,
        OpCode::Strlen,
        OpCode::Strgetitem,
        OpCode::Strsetitem,
        OpCode::Call,
        OpCode::CallPure,
        OpCode::Oosend,
        OpCode::CastPtrToInt,
        OpCode::CastIntToPtr,
    ];

    /// Position in the dispatch table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opcode's lowercase IR name.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::IntAdd => "int_add",
            OpCode::IntSub => "int_sub",
            OpCode::IntMul => "int_mul",
            OpCode::IntFloorDiv => "int_floordiv",
            OpCode::IntMod => "int_mod",
            OpCode::IntAnd => "int_and",
            OpCode::IntOr => "int_or",
            OpCode::IntXor => "int_xor",
            OpCode::IntLshift => "int_lshift",
            OpCode::IntRshift => "int_rshift",
            OpCode::UintRshift => "uint_rshift",
            OpCode::IntNeg => "int_neg",
            OpCode::IntInvert => "int_invert",
            OpCode::IntAbs => "int_abs",
            OpCode::IntEq => "int_eq",
            OpCode::IntNe => "int_ne",
            OpCode::IntLt => "int_lt",
            OpCode::IntLe => "int_le",
            OpCode::IntGt => "int_gt",
            OpCode::IntGe => "int_ge",
            OpCode::UintLt => "uint_lt",
            OpCode::UintLe => "uint_le",
            OpCode::UintGt => "uint_gt",
            OpCode::UintGe => "uint_ge",
            OpCode::IntIsTrue => "int_is_true",
            OpCode::BoolNot => "bool_not",
            OpCode::OoIsNull => "ooisnull",
            OpCode::OoNonNull => "oononnull",
            OpCode::SameAs => "same_as",
            OpCode::IntAddOvf => "int_add_ovf",
            OpCode::IntSubOvf => "int_sub_ovf",
            OpCode::IntMulOvf => "int_mul_ovf",
            OpCode::Fail => "fail",
            OpCode::Jump => "jump",
            OpCode::GuardTrue => "guard_true",
            OpCode::GuardFalse => "guard_false",
            OpCode::GuardValue => "guard_value",
            OpCode::GuardClass => "guard_class",
            OpCode::GuardNoException => "guard_no_exception",
            OpCode::NewWithVtable => "new_with_vtable",
            OpCode::NewArray => "new_array",
            OpCode::ArraylenGc => "arraylen_gc",
            OpCode::GetarrayitemGc => "getarrayitem_gc",
            OpCode::SetarrayitemGc => "setarrayitem_gc",
            OpCode::GetfieldGc => "getfield_gc",
            OpCode::SetfieldGc => "setfield_gc",
            OpCode::Newstr => "newstr",
            OpCode::Strlen => "strlen",
            OpCode::Strgetitem => "strgetitem",
            OpCode::Strsetitem => "strsetitem",
            OpCode::Call => "call",
            OpCode::CallPure => "call_pure",
            OpCode::Oosend => "oosend",
            OpCode::CastPtrToInt => "cast_ptr_to_int",
            OpCode::CastIntToPtr => "cast_int_to_ptr",
        }
    }

    /// Look an opcode up by its IR name.
    pub fn from_name(name: &str) -> Option<OpCode> {
        OpCode::ALL.iter().copied().find(|op| op.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_matches_discriminants() {
        for (i, &op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(op.index(), i, "{:?} out of order in ALL", op);
        }
    }

    #[test]
    fn test_name_roundtrip() {
        for &op in OpCode::ALL {
            assert_eq!(OpCode::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(OpCode::from_name("int_frobnicate"), None);
    }
}
