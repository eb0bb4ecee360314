//! Straight-line executor for method images.
//!
//! Compiled bodies contain no branches: execution walks the instruction list
//! from the top until `ret`. The backend only emits well-typed code, but the
//! image type is public, so every operand is still checked and faults surface
//! as [`ExecError`] values rather than panics.

use std::fmt;

use super::insn::Insn;
use super::method::MethodImage;
use super::pack::ArgPack;
use super::runtime;
use super::value::{obj_eq, Lane, Obj, Slot};

/// Execution fault raised by a method image.
#[derive(Debug)]
pub enum ExecError {
    /// An instruction needed more operands than the stack holds.
    StackUnderflow { pc: usize, insn: &'static str },
    /// An operand had the wrong slot kind for the instruction.
    OperandMismatch {
        pc: usize,
        insn: &'static str,
        found: &'static str,
    },
    /// An argument-pack or constants-array access was out of bounds.
    IndexOutOfBounds {
        pc: usize,
        array: &'static str,
        index: i64,
        len: usize,
    },
    /// A formal-argument index beyond the fixed two-parameter shape.
    BadArgIndex { pc: usize, index: u16 },
    /// A local-slot index beyond the declared locals.
    BadLocalIndex { pc: usize, index: u16 },
    DivideByZero { pc: usize },
    /// A runtime-support method received argument kinds that do not match
    /// its registered signature.
    NativeArgMismatch { method: &'static str },
    /// Execution fell off the end of the body without hitting `ret`.
    MissingReturn,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::StackUnderflow { pc, insn } => {
                write!(f, "stack underflow at pc={} ({})", pc, insn)
            }
            ExecError::OperandMismatch { pc, insn, found } => {
                write!(f, "operand mismatch at pc={}: {} got {}", pc, insn, found)
            }
            ExecError::IndexOutOfBounds { pc, array, index, len } => {
                write!(
                    f,
                    "index {} out of bounds for {} (len {}) at pc={}",
                    index, array, len, pc
                )
            }
            ExecError::BadArgIndex { pc, index } => {
                write!(f, "no formal argument {} at pc={}", index, pc)
            }
            ExecError::BadLocalIndex { pc, index } => {
                write!(f, "no local slot {} at pc={}", index, pc)
            }
            ExecError::DivideByZero { pc } => write!(f, "integer division by zero at pc={}", pc),
            ExecError::NativeArgMismatch { method } => {
                write!(f, "argument kinds do not match signature of {}", method)
            }
            ExecError::MissingReturn => write!(f, "method body ended without ret"),
        }
    }
}

impl std::error::Error for ExecError {}

/// Run one method image to completion.
pub fn run(image: &MethodImage, consts: &[Obj], pack: &mut ArgPack) -> Result<(), ExecError> {
    let mut stack: Vec<Slot> = Vec::with_capacity(8);
    let mut locals: Vec<Slot> = image.locals().iter().map(|&t| Slot::default_for(t)).collect();
    // The two formal arguments: constants array and argument pack.
    let mut args = [Slot::Consts, Slot::Args];

    for (pc, insn) in image.code().iter().enumerate() {
        let name = insn_name(insn);
        match *insn {
            Insn::Ldloc(local) => {
                let slot = locals
                    .get(local.0 as usize)
                    .cloned()
                    .ok_or(ExecError::BadLocalIndex { pc, index: local.0 })?;
                stack.push(slot);
            }
            Insn::Stloc(local) => {
                let value = pop(&mut stack, pc, name)?;
                let dest = locals
                    .get_mut(local.0 as usize)
                    .ok_or(ExecError::BadLocalIndex { pc, index: local.0 })?;
                *dest = value;
            }
            Insn::Ldarg(index) => {
                let slot = args
                    .get(index as usize)
                    .cloned()
                    .ok_or(ExecError::BadArgIndex { pc, index })?;
                stack.push(slot);
            }
            Insn::Starg(index) => {
                let value = pop(&mut stack, pc, name)?;
                let dest = args
                    .get_mut(index as usize)
                    .ok_or(ExecError::BadArgIndex { pc, index })?;
                *dest = value;
            }
            Insn::LdcI4(v) => stack.push(Slot::Int(v as i64)),
            Insn::LdcI8(v) => stack.push(Slot::Int(v)),
            Insn::Ldnull => stack.push(Slot::Obj(None)),
            Insn::Dup => {
                let top = stack
                    .last()
                    .cloned()
                    .ok_or(ExecError::StackUnderflow { pc, insn: name })?;
                stack.push(top);
            }
            Insn::Pop => {
                pop(&mut stack, pc, name)?;
            }
            Insn::Add => int_binop(&mut stack, pc, name, i64::wrapping_add)?,
            Insn::Sub => int_binop(&mut stack, pc, name, i64::wrapping_sub)?,
            Insn::Mul => int_binop(&mut stack, pc, name, i64::wrapping_mul)?,
            Insn::Div => {
                let (a, b) = pop_int_pair(&mut stack, pc, name)?;
                if b == 0 {
                    return Err(ExecError::DivideByZero { pc });
                }
                stack.push(Slot::Int(a.wrapping_div(b)));
            }
            Insn::Rem => {
                let (a, b) = pop_int_pair(&mut stack, pc, name)?;
                if b == 0 {
                    return Err(ExecError::DivideByZero { pc });
                }
                stack.push(Slot::Int(a.wrapping_rem(b)));
            }
            Insn::Neg => {
                let a = pop_int(&mut stack, pc, name)?;
                stack.push(Slot::Int(a.wrapping_neg()));
            }
            Insn::Not => {
                let a = pop_int(&mut stack, pc, name)?;
                stack.push(Slot::Int(!a));
            }
            Insn::And => int_binop(&mut stack, pc, name, |a, b| a & b)?,
            Insn::Or => int_binop(&mut stack, pc, name, |a, b| a | b)?,
            Insn::Xor => int_binop(&mut stack, pc, name, |a, b| a ^ b)?,
            Insn::Shl => int_binop(&mut stack, pc, name, |a, b| a.wrapping_shl(b as u32 & 63))?,
            Insn::Shr => int_binop(&mut stack, pc, name, |a, b| a.wrapping_shr(b as u32 & 63))?,
            Insn::ShrUn => int_binop(&mut stack, pc, name, |a, b| {
                ((a as u64).wrapping_shr(b as u32 & 63)) as i64
            })?,
            Insn::Ceq => {
                let b = pop(&mut stack, pc, name)?;
                let a = pop(&mut stack, pc, name)?;
                let eq = match (&a, &b) {
                    (Slot::Int(x), Slot::Int(y)) => x == y,
                    (Slot::Obj(x), Slot::Obj(y)) => obj_eq(x, y),
                    _ => {
                        return Err(ExecError::OperandMismatch { pc, insn: name, found: a.kind() })
                    }
                };
                stack.push(Slot::Int(eq as i64));
            }
            Insn::Cgt => {
                let (a, b) = pop_int_pair(&mut stack, pc, name)?;
                stack.push(Slot::Int((a > b) as i64));
            }
            Insn::Clt => {
                let (a, b) = pop_int_pair(&mut stack, pc, name)?;
                stack.push(Slot::Int((a < b) as i64));
            }
            Insn::CgtUn => {
                let b = pop(&mut stack, pc, name)?;
                let a = pop(&mut stack, pc, name)?;
                let gt = match (&a, &b) {
                    (Slot::Int(x), Slot::Int(y)) => (*x as u64) > (*y as u64),
                    // Unsigned compare against null tests non-nullness.
                    (Slot::Obj(x), Slot::Obj(y)) => x.is_some() && y.is_none(),
                    _ => {
                        return Err(ExecError::OperandMismatch { pc, insn: name, found: a.kind() })
                    }
                };
                stack.push(Slot::Int(gt as i64));
            }
            Insn::CltUn => {
                let b = pop(&mut stack, pc, name)?;
                let a = pop(&mut stack, pc, name)?;
                let lt = match (&a, &b) {
                    (Slot::Int(x), Slot::Int(y)) => (*x as u64) < (*y as u64),
                    (Slot::Obj(x), Slot::Obj(y)) => x.is_none() && y.is_some(),
                    _ => {
                        return Err(ExecError::OperandMismatch { pc, insn: name, found: a.kind() })
                    }
                };
                stack.push(Slot::Int(lt as i64));
            }
            Insn::Ldfld(lane) => {
                let handle = pop(&mut stack, pc, name)?;
                match handle {
                    Slot::Args => stack.push(match lane {
                        Lane::Int => Slot::IntArr,
                        Lane::Ref => Slot::ObjArr,
                    }),
                    other => {
                        return Err(ExecError::OperandMismatch {
                            pc,
                            insn: name,
                            found: other.kind(),
                        })
                    }
                }
            }
            Insn::Ldelem => {
                let index = pop_int(&mut stack, pc, name)?;
                let handle = pop(&mut stack, pc, name)?;
                let slot = match handle {
                    Slot::IntArr => {
                        let i = checked_index(pc, "ints", index, pack.ints.len())?;
                        Slot::Int(pack.ints[i])
                    }
                    Slot::ObjArr => {
                        let i = checked_index(pc, "objs", index, pack.objs.len())?;
                        Slot::Obj(pack.objs[i].clone())
                    }
                    Slot::Consts => {
                        let i = checked_index(pc, "consts", index, consts.len())?;
                        Slot::Obj(consts[i].clone())
                    }
                    other => {
                        return Err(ExecError::OperandMismatch {
                            pc,
                            insn: name,
                            found: other.kind(),
                        })
                    }
                };
                stack.push(slot);
            }
            Insn::Stelem => {
                let value = pop(&mut stack, pc, name)?;
                let index = pop_int(&mut stack, pc, name)?;
                let handle = pop(&mut stack, pc, name)?;
                match (handle, value) {
                    (Slot::IntArr, Slot::Int(v)) => {
                        let i = checked_index(pc, "ints", index, pack.ints.len())?;
                        pack.ints[i] = v;
                    }
                    (Slot::ObjArr, Slot::Obj(v)) => {
                        let i = checked_index(pc, "objs", index, pack.objs.len())?;
                        pack.objs[i] = v;
                    }
                    (_, value) => {
                        return Err(ExecError::OperandMismatch {
                            pc,
                            insn: name,
                            found: value.kind(),
                        })
                    }
                }
            }
            Insn::Call(id) => {
                let meth = runtime::method(id);
                let argc = meth.params.len();
                if stack.len() < argc {
                    return Err(ExecError::StackUnderflow { pc, insn: name });
                }
                let call_args = stack.split_off(stack.len() - argc);
                stack.push((meth.invoke)(&call_args)?);
            }
            Insn::Ret => return Ok(()),
        }
    }
    Err(ExecError::MissingReturn)
}

fn insn_name(insn: &Insn) -> &'static str {
    match insn {
        Insn::Ldloc(_) => "ldloc",
        Insn::Stloc(_) => "stloc",
        Insn::Ldarg(_) => "ldarg",
        Insn::Starg(_) => "starg",
        Insn::LdcI4(_) => "ldc.i4",
        Insn::LdcI8(_) => "ldc.i8",
        Insn::Ldnull => "ldnull",
        Insn::Dup => "dup",
        Insn::Pop => "pop",
        Insn::Add => "add",
        Insn::Sub => "sub",
        Insn::Mul => "mul",
        Insn::Div => "div",
        Insn::Rem => "rem",
        Insn::Neg => "neg",
        Insn::Not => "not",
        Insn::And => "and",
        Insn::Or => "or",
        Insn::Xor => "xor",
        Insn::Shl => "shl",
        Insn::Shr => "shr",
        Insn::ShrUn => "shr.un",
        Insn::Ceq => "ceq",
        Insn::Cgt => "cgt",
        Insn::CgtUn => "cgt.un",
        Insn::Clt => "clt",
        Insn::CltUn => "clt.un",
        Insn::Ldfld(_) => "ldfld",
        Insn::Ldelem => "ldelem",
        Insn::Stelem => "stelem",
        Insn::Call(_) => "call",
        Insn::Ret => "ret",
    }
}

fn pop(stack: &mut Vec<Slot>, pc: usize, insn: &'static str) -> Result<Slot, ExecError> {
    stack.pop().ok_or(ExecError::StackUnderflow { pc, insn })
}

fn pop_int(stack: &mut Vec<Slot>, pc: usize, insn: &'static str) -> Result<i64, ExecError> {
    match pop(stack, pc, insn)? {
        Slot::Int(n) => Ok(n),
        other => Err(ExecError::OperandMismatch { pc, insn, found: other.kind() }),
    }
}

fn pop_int_pair(
    stack: &mut Vec<Slot>,
    pc: usize,
    insn: &'static str,
) -> Result<(i64, i64), ExecError> {
    let b = pop_int(stack, pc, insn)?;
    let a = pop_int(stack, pc, insn)?;
    Ok((a, b))
}

fn int_binop(
    stack: &mut Vec<Slot>,
    pc: usize,
    insn: &'static str,
    op: impl Fn(i64, i64) -> i64,
) -> Result<(), ExecError> {
    let (a, b) = pop_int_pair(stack, pc, insn)?;
    stack.push(Slot::Int(op(a, b)));
    Ok(())
}

fn checked_index(
    pc: usize,
    array: &'static str,
    index: i64,
    len: usize,
) -> Result<usize, ExecError> {
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(i),
        _ => Err(ExecError::IndexOutOfBounds { pc, array, index, len }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::method::MethodShell;
    use crate::vm::value::MachineType;
    use std::sync::Arc;

    fn image_of(code: &[Insn]) -> MethodImage {
        let mut shell = MethodShell::new("t");
        for &insn in code {
            shell.emit(insn);
        }
        shell.finish()
    }

    fn run_into_pack(code: &[Insn], pack: &mut ArgPack) -> Result<(), ExecError> {
        run(&image_of(code), &[], pack)
    }

    #[test]
    fn test_arithmetic_into_pack() {
        // pack.ints[0] = (2 + 3) * 4
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Int),
            Insn::LdcI4(0),
            Insn::LdcI8(2),
            Insn::LdcI8(3),
            Insn::Add,
            Insn::LdcI8(4),
            Insn::Mul,
            Insn::Stelem,
            Insn::Ret,
        ];
        let mut pack = ArgPack::with_sizes(1, 0);
        run_into_pack(&code, &mut pack).unwrap();
        assert_eq!(pack.ints, vec![20]);
    }

    #[test]
    fn test_locals_roundtrip() {
        let mut shell = MethodShell::new("t");
        let v = shell.declare_local(MachineType::Int64);
        shell.emit(Insn::LdcI8(7));
        shell.emit(Insn::Stloc(v));
        shell.emit(Insn::Ldarg(1));
        shell.emit(Insn::Ldfld(Lane::Int));
        shell.emit(Insn::LdcI4(0));
        shell.emit(Insn::Ldloc(v));
        shell.emit(Insn::Stelem);
        shell.emit(Insn::Ret);
        let mut pack = ArgPack::with_sizes(1, 0);
        run(&shell.finish(), &[], &mut pack).unwrap();
        assert_eq!(pack.ints, vec![7]);
    }

    #[test]
    fn test_obj_lane_copy() {
        // pack.objs[1] = pack.objs[0]
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Ref),
            Insn::LdcI4(1),
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Ref),
            Insn::LdcI4(0),
            Insn::Ldelem,
            Insn::Stelem,
            Insn::Ret,
        ];
        let mut pack = ArgPack::with_sizes(0, 2);
        pack.objs[0] = Some(Arc::new(42i64));
        run_into_pack(&code, &mut pack).unwrap();
        assert!(obj_eq(&pack.objs[0], &pack.objs[1]));
    }

    #[test]
    fn test_ceq_null() {
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Int),
            Insn::LdcI4(0),
            Insn::Ldnull,
            Insn::Ldnull,
            Insn::Ceq,
            Insn::Stelem,
            Insn::Ret,
        ];
        let mut pack = ArgPack::with_sizes(1, 0);
        run_into_pack(&code, &mut pack).unwrap();
        assert_eq!(pack.ints, vec![1]);
    }

    #[test]
    fn test_call_abs() {
        let id = runtime::lookup("rt.Math", "abs", &[MachineType::Int64]).unwrap();
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Int),
            Insn::LdcI4(0),
            Insn::LdcI8(-9),
            Insn::Call(id),
            Insn::Stelem,
            Insn::Ret,
        ];
        let mut pack = ArgPack::with_sizes(1, 0);
        run_into_pack(&code, &mut pack).unwrap();
        assert_eq!(pack.ints, vec![9]);
    }

    #[test]
    fn test_divide_by_zero() {
        let code = [Insn::LdcI8(1), Insn::LdcI8(0), Insn::Div, Insn::Ret];
        let err = run_into_pack(&code, &mut ArgPack::new()).unwrap_err();
        assert!(matches!(err, ExecError::DivideByZero { pc: 2 }));
    }

    #[test]
    fn test_stack_underflow() {
        let code = [Insn::Add, Insn::Ret];
        let err = run_into_pack(&code, &mut ArgPack::new()).unwrap_err();
        assert!(matches!(err, ExecError::StackUnderflow { .. }));
    }

    #[test]
    fn test_missing_return() {
        let code = [Insn::LdcI4(1)];
        let err = run_into_pack(&code, &mut ArgPack::new()).unwrap_err();
        assert!(matches!(err, ExecError::MissingReturn));
    }

    #[test]
    fn test_pack_index_out_of_bounds() {
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Int),
            Insn::LdcI4(5),
            Insn::Ldelem,
            Insn::Ret,
        ];
        let err = run_into_pack(&code, &mut ArgPack::with_sizes(1, 0)).unwrap_err();
        assert!(matches!(err, ExecError::IndexOutOfBounds { index: 5, .. }));
    }

    #[test]
    fn test_operand_mismatch() {
        let code = [Insn::Ldnull, Insn::LdcI8(1), Insn::Add, Insn::Ret];
        let err = run_into_pack(&code, &mut ArgPack::new()).unwrap_err();
        assert!(matches!(err, ExecError::OperandMismatch { .. }));
    }

    #[test]
    fn test_shift_masks_count() {
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Int),
            Insn::LdcI4(0),
            Insn::LdcI8(1),
            Insn::LdcI8(65),
            Insn::Shl,
            Insn::Stelem,
            Insn::Ret,
        ];
        let mut pack = ArgPack::with_sizes(1, 0);
        run_into_pack(&code, &mut pack).unwrap();
        assert_eq!(pack.ints, vec![2]);
    }

    #[test]
    fn test_unsigned_compare() {
        // -1 as u64 is the largest value: (-1 cgt.un 1) == 1
        let code = [
            Insn::Ldarg(1),
            Insn::Ldfld(Lane::Int),
            Insn::LdcI4(0),
            Insn::LdcI8(-1),
            Insn::LdcI8(1),
            Insn::CgtUn,
            Insn::Stelem,
            Insn::Ret,
        ];
        let mut pack = ArgPack::with_sizes(1, 0);
        run_into_pack(&code, &mut pack).unwrap();
        assert_eq!(pack.ints, vec![1]);
    }
}
