use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An opaque reference-lane object. `None` is the null reference.
///
/// The machine never looks inside an object; it only moves handles around
/// and compares them by identity.
pub type Obj = Option<Arc<dyn Any + Send + Sync>>;

/// Compare two reference values by identity. Null equals only null.
pub fn obj_eq(a: &Obj, b: &Obj) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

/// The two value categories the machine supports.
///
/// A lane decides which argument-pack array a value travels in, which
/// machine type its storage gets, and which instructions may touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Int,
    Ref,
}

impl Lane {
    /// Storage type for a value of this lane.
    pub fn machine_type(self) -> MachineType {
        match self {
            Lane::Int => MachineType::Int64,
            Lane::Ref => MachineType::Object,
        }
    }
}

/// Target-machine types.
///
/// `Int32`/`Int64`/`Float64` are the types call-descriptor parameter names
/// resolve to; `ObjectArray` and `ArgPack` only occur as the types of the two
/// formal parameters every compiled method takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineType {
    Int32,
    Int64,
    Float64,
    Object,
    ObjectArray,
    ArgPack,
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MachineType::Int32 => "int32",
            MachineType::Int64 => "int64",
            MachineType::Float64 => "float64",
            MachineType::Object => "object",
            MachineType::ObjectArray => "object[]",
            MachineType::ArgPack => "argpack",
        };
        write!(f, "{}", name)
    }
}

/// One evaluation-stack slot.
///
/// Besides plain values, a slot can hold a handle to one of the method's two
/// formal parameters (`Consts`, `Args`) or to one lane array of the argument
/// pack (`IntArr`, `ObjArr`). Handles are opaque tokens; the executor supplies
/// the backing storage when an element access consumes one.
#[derive(Clone)]
pub enum Slot {
    Int(i64),
    Obj(Obj),
    /// The constants-array parameter (formal argument 0).
    Consts,
    /// The argument-pack parameter (formal argument 1).
    Args,
    /// The integer lane of the argument pack.
    IntArr,
    /// The reference lane of the argument pack.
    ObjArr,
}

impl Slot {
    /// Default contents of a freshly declared local of the given type.
    pub fn default_for(ty: MachineType) -> Slot {
        match ty {
            MachineType::Int32 | MachineType::Int64 => Slot::Int(0),
            // Reference-typed storage starts out null. The remaining types
            // never occur as locals; null is a harmless placeholder.
            _ => Slot::Obj(None),
        }
    }

    /// Short tag for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Slot::Int(_) => "int",
            Slot::Obj(_) => "object",
            Slot::Consts => "consts",
            Slot::Args => "argpack",
            Slot::IntArr => "int[]",
            Slot::ObjArr => "object[]",
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Int(n) => write!(f, "Int({})", n),
            Slot::Obj(None) => write!(f, "Obj(null)"),
            Slot::Obj(Some(_)) => write!(f, "Obj(<object>)"),
            Slot::Consts => write!(f, "Consts"),
            Slot::Args => write!(f, "Args"),
            Slot::IntArr => write!(f, "IntArr"),
            Slot::ObjArr => write!(f, "ObjArr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_eq_null() {
        assert!(obj_eq(&None, &None));
        let o: Obj = Some(Arc::new(3u8));
        assert!(!obj_eq(&o, &None));
        assert!(!obj_eq(&None, &o));
    }

    #[test]
    fn test_obj_eq_identity() {
        let a: Obj = Some(Arc::new("x"));
        let b = a.clone();
        let c: Obj = Some(Arc::new("x"));
        assert!(obj_eq(&a, &b));
        assert!(!obj_eq(&a, &c));
    }

    #[test]
    fn test_lane_machine_type() {
        assert_eq!(Lane::Int.machine_type(), MachineType::Int64);
        assert_eq!(Lane::Ref.machine_type(), MachineType::Object);
    }

    #[test]
    fn test_default_locals() {
        assert!(matches!(Slot::default_for(MachineType::Int64), Slot::Int(0)));
        assert!(matches!(Slot::default_for(MachineType::Object), Slot::Obj(None)));
    }
}
