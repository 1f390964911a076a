//! Arithmetic-logic unit.
//!
//! The ALU works on the register file only. It is selected by the decoded
//! opcode and advances PC past the three-byte instruction itself.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::{Flags, RegisterError, Registers};
use thiserror::Error;

/// Execute an ALU operation on `R[a]` and `R[b]`.
pub fn alu(op: Opcode, regs: &mut Registers, a: u8, b: u8) -> Result<(), AluError> {
    let lhs = regs.get(a)?;
    let rhs = regs.get(b)?;

    match op {
        Opcode::Add => {
            regs.set(a, lhs.wrapping_add(rhs))?;
        }

        Opcode::Cmp => {
            regs.fl = compare(lhs, rhs);
        }

        other => return Err(AluError::UnsupportedAluOperation(other)),
    }

    regs.advance_pc(op.len());
    Ok(())
}

/// The flags register value after comparing `lhs` with `rhs`.
pub fn compare(lhs: u8, rhs: u8) -> Flags {
    match lhs.cmp(&rhs) {
        std::cmp::Ordering::Less => Flags::LESS,
        std::cmp::Ordering::Greater => Flags::GREATER,
        std::cmp::Ordering::Equal => Flags::EQUAL,
    }
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation: {0}")]
    UnsupportedAluOperation(Opcode),

    #[error(transparent)]
    Register(#[from] RegisterError),
}
