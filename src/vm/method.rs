//! Method shells, finalized method images, and compiled-loop entry points.
//!
//! A [`MethodShell`] is the open form: locals can be declared and
//! instructions appended. [`MethodShell::finish`] seals it into an immutable
//! [`MethodImage`], and a [`CompiledLoop`] binds an image to the fixed
//! entry-point shape the embedding runtime invokes.

use std::fmt;

use super::insn::{Insn, LocalId};
use super::interp::{self, ExecError};
use super::pack::ArgPack;
use super::value::{MachineType, Obj};

/// A method under construction.
pub struct MethodShell {
    name: String,
    locals: Vec<MachineType>,
    code: Vec<Insn>,
}

impl MethodShell {
    pub fn new(name: &str) -> Self {
        MethodShell {
            name: name.to_string(),
            locals: Vec::new(),
            code: Vec::new(),
        }
    }

    /// Declare a new local slot of the given type.
    pub fn declare_local(&mut self, ty: MachineType) -> LocalId {
        let id = LocalId(self.locals.len() as u16);
        self.locals.push(ty);
        id
    }

    /// Append one instruction.
    pub fn emit(&mut self, insn: Insn) {
        self.code.push(insn);
    }

    /// Number of instructions emitted so far.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Seal the shell into an immutable image.
    pub fn finish(self) -> MethodImage {
        MethodImage {
            name: self.name,
            locals: self.locals,
            code: self.code,
        }
    }
}

/// An immutable, finalized method body.
#[derive(Debug, Clone)]
pub struct MethodImage {
    name: String,
    locals: Vec<MachineType>,
    code: Vec<Insn>,
}

impl MethodImage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[Insn] {
        &self.code
    }

    pub fn locals(&self) -> &[MachineType] {
        &self.locals
    }
}

impl fmt::Display for MethodImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method '{}' ({} locals)", self.name, self.locals.len())?;
        for (pc, insn) in self.code.iter().enumerate() {
            writeln!(f, "  {:4}: {}", pc, insn)?;
        }
        Ok(())
    }
}

/// A directly callable compiled loop.
///
/// Holds the method image plus the constants array bound at finalization
/// (always empty in the current design; the parameter is reserved). The
/// value is immutable: it can be invoked repeatedly and from multiple threads
/// at once, each call against its own argument pack.
pub struct CompiledLoop {
    image: MethodImage,
    consts: Vec<Obj>,
}

impl std::fmt::Debug for CompiledLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledLoop")
            .field("image", &self.image)
            .field("consts", &self.consts.len())
            .finish()
    }
}

impl CompiledLoop {
    pub(crate) fn new(image: MethodImage, consts: Vec<Obj>) -> Self {
        CompiledLoop { image, consts }
    }

    /// Run the compiled body against an argument pack.
    ///
    /// Inputs are read from the pack on entry; a bailout writes live values
    /// back into it before returning. The method itself returns nothing.
    pub fn invoke(&self, pack: &mut ArgPack) -> Result<(), ExecError> {
        interp::run(&self.image, &self.consts, pack)
    }

    pub fn image(&self) -> &MethodImage {
        &self.image
    }
}
