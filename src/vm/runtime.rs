//! The trusted runtime-support library.
//!
//! A fixed registry of pure helper methods that emitted code may call. Call
//! descriptors in opcode templates resolve against this registry at
//! table-build time; `call` instructions carry the resulting [`MethodId`].
//! Only methods of this library are callable from compiled code; descriptors
//! naming any other assembly are rejected before a single trace is compiled.

use super::interp::ExecError;
use super::value::{MachineType, Slot};

/// Assembly tag a call descriptor must carry to be trusted.
pub const ASSEMBLY: &str = "kiln";

/// Handle of a registered runtime-support method.
///
/// Ids are only minted by [`lookup`], so an id always indexes [`METHODS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub(crate) u16);

/// Implementation of a runtime-support method. Receives the popped arguments
/// in declaration order and returns the value to push.
pub type NativeFn = fn(&[Slot]) -> Result<Slot, ExecError>;

/// One registry entry: a fully qualified signature plus its implementation.
pub struct RuntimeMethod {
    pub owner: &'static str,
    pub name: &'static str,
    pub params: &'static [MachineType],
    pub ret: MachineType,
    pub invoke: NativeFn,
}

impl RuntimeMethod {
    /// `owner::name`, as it appears in disassembly.
    pub fn qualified(&self) -> String {
        format!("{}::{}", self.owner, self.name)
    }
}

fn math_abs(args: &[Slot]) -> Result<Slot, ExecError> {
    match args {
        [Slot::Int(n)] => Ok(Slot::Int(n.wrapping_abs())),
        _ => Err(ExecError::NativeArgMismatch { method: "rt.Math::abs" }),
    }
}

fn math_min(args: &[Slot]) -> Result<Slot, ExecError> {
    match args {
        [Slot::Int(a), Slot::Int(b)] => Ok(Slot::Int(*a.min(b))),
        _ => Err(ExecError::NativeArgMismatch { method: "rt.Math::min" }),
    }
}

fn math_max(args: &[Slot]) -> Result<Slot, ExecError> {
    match args {
        [Slot::Int(a), Slot::Int(b)] => Ok(Slot::Int(*a.max(b))),
        _ => Err(ExecError::NativeArgMismatch { method: "rt.Math::max" }),
    }
}

/// Every method compiled code may call.
pub static METHODS: &[RuntimeMethod] = &[
    RuntimeMethod {
        owner: "rt.Math",
        name: "abs",
        params: &[MachineType::Int64],
        ret: MachineType::Int64,
        invoke: math_abs,
    },
    RuntimeMethod {
        owner: "rt.Math",
        name: "min",
        params: &[MachineType::Int64, MachineType::Int64],
        ret: MachineType::Int64,
        invoke: math_min,
    },
    RuntimeMethod {
        owner: "rt.Math",
        name: "max",
        params: &[MachineType::Int64, MachineType::Int64],
        ret: MachineType::Int64,
        invoke: math_max,
    },
];

/// Resolve a method by owner type, name, and exact parameter types.
pub fn lookup(owner: &str, name: &str, params: &[MachineType]) -> Option<MethodId> {
    METHODS
        .iter()
        .position(|m| m.owner == owner && m.name == name && m.params == params)
        .map(|i| MethodId(i as u16))
}

/// Registry entry for a minted id.
pub fn method(id: MethodId) -> &'static RuntimeMethod {
    &METHODS[id.0 as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_abs() {
        let id = lookup("rt.Math", "abs", &[MachineType::Int64]).unwrap();
        assert_eq!(method(id).qualified(), "rt.Math::abs");
        assert_eq!(method(id).ret, MachineType::Int64);
    }

    #[test]
    fn test_lookup_wrong_arity() {
        assert!(lookup("rt.Math", "abs", &[MachineType::Int64, MachineType::Int64]).is_none());
    }

    #[test]
    fn test_lookup_unknown_owner() {
        assert!(lookup("sys.Console", "write", &[MachineType::Int64]).is_none());
    }

    #[test]
    fn test_abs_negative() {
        let out = math_abs(&[Slot::Int(-5)]).unwrap();
        assert!(matches!(out, Slot::Int(5)));
    }

    #[test]
    fn test_min_max() {
        assert!(matches!(math_min(&[Slot::Int(2), Slot::Int(7)]).unwrap(), Slot::Int(2)));
        assert!(matches!(math_max(&[Slot::Int(2), Slot::Int(7)]).unwrap(), Slot::Int(7)));
    }

    #[test]
    fn test_native_arg_mismatch() {
        assert!(math_abs(&[Slot::Obj(None)]).is_err());
    }
}
