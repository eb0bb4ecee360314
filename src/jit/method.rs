//! The method emitter: one trace in, one callable compiled loop out.
//!
//! Emission runs in five strict phases: allocate the method shell with the
//! fixed two-parameter shape, unmarshal the trace inputs from the argument
//! pack, emit the body by dispatching every operation through the opcode
//! table, emit the epilogue, finalize. Boxes are mapped to target local
//! slots lazily on first use; the mapping lives exactly as long as one
//! emission.

use std::collections::HashMap;
use std::fmt;

use crate::vm::{CompiledLoop, Insn, Lane, LocalId, MachineType, MethodShell};

use super::opcodes::OpCode;
use super::table::OpTable;
use super::trace::{ConstValue, Trace, TraceBox, TraceOp, VarId};

/// Fatal emission failure. All variants abort compilation of the trace; none
/// are recoverable within the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitError {
    /// The opcode has no table entry at all, a backend-completeness gap.
    MissingHandler(OpCode),
    /// The opcode is explicitly stubbed as unsupported.
    NotImplemented(OpCode),
    /// An IR producer tried to use a constant box as an assignment target.
    StoreToConst,
    /// A formal-argument box showed up where a laned operand was required.
    UntypedBox,
    /// A template stores a result but the operation carries none.
    MissingResult(OpCode),
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::MissingHandler(op) => {
                write!(f, "no emission routine for opcode '{}'", op.name())
            }
            EmitError::NotImplemented(op) => {
                write!(f, "opcode '{}' is not supported by this backend", op.name())
            }
            EmitError::StoreToConst => write!(f, "cannot store to a constant box"),
            EmitError::UntypedBox => {
                write!(f, "formal-argument box used where a laned value is required")
            }
            EmitError::MissingResult(op) => {
                write!(f, "opcode '{}' stores a result but the operation has none", op.name())
            }
        }
    }
}

impl std::error::Error for EmitError {}

impl TraceBox {
    /// Emit instructions that push this box's current value.
    pub(crate) fn load(&self, meth: &mut MethodEmitter) -> Result<(), EmitError> {
        match self {
            TraceBox::Var { id, lane } => {
                let local = meth.local_for(*id, *lane);
                meth.emit(Insn::Ldloc(local));
            }
            TraceBox::Const(ConstValue::Int(v)) => meth.emit(Insn::LdcI8(*v)),
            TraceBox::Const(ConstValue::Null) => meth.emit(Insn::Ldnull),
            TraceBox::Arg { index, .. } => meth.emit(Insn::Ldarg(*index)),
        }
        Ok(())
    }

    /// Emit instructions that pop the top of stack into this box.
    ///
    /// Constants are never assignment targets; asking for one is an IR
    /// producer bug and fails fatally.
    pub(crate) fn store(&self, meth: &mut MethodEmitter) -> Result<(), EmitError> {
        match self {
            TraceBox::Var { id, lane } => {
                let local = meth.local_for(*id, *lane);
                meth.emit(Insn::Stloc(local));
                Ok(())
            }
            TraceBox::Const(_) => Err(EmitError::StoreToConst),
            TraceBox::Arg { index, .. } => {
                meth.emit(Insn::Starg(*index));
                Ok(())
            }
        }
    }
}

/// Emission state for one method.
pub struct MethodEmitter {
    shell: MethodShell,
    /// Box variable → target local slot, filled lazily on first use.
    slots: HashMap<VarId, LocalId>,
    av_consts: TraceBox,
    av_args: TraceBox,
}

impl MethodEmitter {
    /// Compile one trace into a callable loop.
    pub(crate) fn compile(
        table: &OpTable,
        name: &str,
        trace: &Trace,
    ) -> Result<CompiledLoop, EmitError> {
        let mut meth = MethodEmitter::new(name);
        meth.emit_load_inputargs(trace)?;
        meth.emit_operations(table, trace)?;
        meth.emit_end();
        Ok(meth.finalize())
    }

    /// Allocate the method shell: two formal parameters, the constants array
    /// and the argument pack. This shape is the fixed ABI of every compiled
    /// method.
    fn new(name: &str) -> MethodEmitter {
        MethodEmitter {
            shell: MethodShell::new(name),
            slots: HashMap::new(),
            av_consts: TraceBox::Arg { index: 0, ty: MachineType::ObjectArray },
            av_args: TraceBox::Arg { index: 1, ty: MachineType::ArgPack },
        }
    }

    /// Copy each trace input from the argument pack into its local slot.
    /// Integer inputs are drawn from the integer array and reference inputs
    /// from the reference array, each lane's counter advancing on its own.
    fn emit_load_inputargs(&mut self, trace: &Trace) -> Result<(), EmitError> {
        let mut counters = LaneCounters::default();
        for input in &trace.inputs {
            let lane = operand_lane(input)?;
            let index = counters.next(lane);
            self.load_pack_slot(index, lane)?;
            input.store(self)?;
        }
        Ok(())
    }

    /// Dispatch every operation, in trace order, to its table routine.
    fn emit_operations(&mut self, table: &OpTable, trace: &Trace) -> Result<(), EmitError> {
        for op in &trace.ops {
            let routine = table
                .routine(op.opcode)
                .ok_or(EmitError::MissingHandler(op.opcode))?;
            routine(self, op)?;
        }
        Ok(())
    }

    fn emit_end(&mut self) {
        self.emit(Insn::Ret);
    }

    /// Bind the finished body to the fixed entry-point shape. The constants
    /// array parameter is reserved; finalization always binds it empty.
    fn finalize(self) -> CompiledLoop {
        CompiledLoop::new(self.shell.finish(), Vec::new())
    }

    pub(crate) fn emit(&mut self, insn: Insn) {
        self.shell.emit(insn);
    }

    /// Local slot for a trace variable, declared on first use.
    fn local_for(&mut self, id: VarId, lane: Lane) -> LocalId {
        if let Some(&local) = self.slots.get(&id) {
            return local;
        }
        let local = self.shell.declare_local(lane.machine_type());
        self.slots.insert(id, local);
        local
    }

    /// Push one argument-pack slot: `ldarg 1; ldfld <lane>; ldc.i4 i; ldelem`.
    fn load_pack_slot(&mut self, index: u32, lane: Lane) -> Result<(), EmitError> {
        let av_args = self.av_args.clone();
        av_args.load(self)?;
        self.emit(Insn::Ldfld(lane));
        self.emit(Insn::LdcI4(index as i32));
        self.emit(Insn::Ldelem);
        Ok(())
    }

    /// Store a box into one argument-pack slot:
    /// `ldarg 1; ldfld <lane>; ldc.i4 i; <load box>; stelem`.
    fn store_pack_slot(
        &mut self,
        index: u32,
        lane: Lane,
        value: &TraceBox,
    ) -> Result<(), EmitError> {
        let av_args = self.av_args.clone();
        av_args.load(self)?;
        self.emit(Insn::Ldfld(lane));
        self.emit(Insn::LdcI4(index as i32));
        value.load(self)?;
        self.emit(Insn::Stelem);
        Ok(())
    }

    /// Load every operand box, in order (the `PushArgs` template marker).
    pub(crate) fn push_all_args(&mut self, op: &TraceOp) -> Result<(), EmitError> {
        for arg in &op.args {
            arg.load(self)?;
        }
        Ok(())
    }

    /// Store the result box (the `StoreResult` template marker).
    pub(crate) fn store_result(&mut self, op: &TraceOp) -> Result<(), EmitError> {
        match &op.result {
            Some(result) => result.store(self),
            None => Err(EmitError::MissingResult(op.opcode)),
        }
    }

    /// The universal bailout: marshal every operand back into the argument
    /// pack at sequential per-lane positions, then return. This is the only
    /// path that carries data out of a compiled method.
    pub(crate) fn emit_fail(&mut self, op: &TraceOp) -> Result<(), EmitError> {
        let mut counters = LaneCounters::default();
        for value in &op.args {
            let lane = operand_lane(value)?;
            let index = counters.next(lane);
            self.store_pack_slot(index, lane, value)?;
        }
        self.emit(Insn::Ret);
        Ok(())
    }

    /// Unused half of the reserved constants-array parameter; kept so the
    /// two formal-argument boxes mirror the method's actual signature.
    #[allow(dead_code)]
    pub(crate) fn consts_arg(&self) -> &TraceBox {
        &self.av_consts
    }
}

/// Independent per-lane running counters for argument-pack positions.
#[derive(Default)]
struct LaneCounters {
    ints: u32,
    objs: u32,
}

impl LaneCounters {
    fn next(&mut self, lane: Lane) -> u32 {
        let counter = match lane {
            Lane::Int => &mut self.ints,
            Lane::Ref => &mut self.objs,
        };
        let index = *counter;
        *counter += 1;
        index
    }
}

fn operand_lane(value: &TraceBox) -> Result<Lane, EmitError> {
    value.lane().ok_or(EmitError::UntypedBox)
}
