//! The two-lane argument pack shared between the embedding runtime and
//! compiled methods.
//!
//! All data exchange with a compiled method goes through one of these: inputs
//! are read from it on entry, and a bailout writes live values back into it
//! before returning. The embedding runtime owns the arrays and is responsible
//! for sizing them; the machine only reads and writes existing positions.

use std::fmt;

use super::value::Obj;

/// Integer-lane and reference-lane argument arrays.
#[derive(Clone, Default)]
pub struct ArgPack {
    pub ints: Vec<i64>,
    pub objs: Vec<Obj>,
}

impl ArgPack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pack with `ints` integer slots and `objs` null reference slots.
    pub fn with_sizes(ints: usize, objs: usize) -> Self {
        ArgPack {
            ints: vec![0; ints],
            objs: vec![None; objs],
        }
    }
}

impl fmt::Debug for ArgPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArgPack {{ ints: {:?}, objs: [", self.ints)?;
        for (i, o) in self.objs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match o {
                None => write!(f, "null")?,
                Some(_) => write!(f, "<object>")?,
            }
        }
        write!(f, "] }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sizes() {
        let pack = ArgPack::with_sizes(3, 2);
        assert_eq!(pack.ints, vec![0, 0, 0]);
        assert_eq!(pack.objs.len(), 2);
        assert!(pack.objs.iter().all(|o| o.is_none()));
    }

    #[test]
    fn test_debug_format() {
        let pack = ArgPack::with_sizes(1, 1);
        assert_eq!(format!("{:?}", pack), "ArgPack { ints: [0], objs: [null] }");
    }
}
