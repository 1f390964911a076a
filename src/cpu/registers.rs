//! LS-8 CPU registers.
//!
//! The LS-8 has:
//! - R0-R7: eight 8-bit general purpose registers
//! - R7 is reserved by convention as the stack pointer (SP)
//! - PC: program counter
//! - FL: flags register, written by CMP

use bitflags::bitflags;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Register index holding the stack pointer.
pub const SP: u8 = 7;

/// Initial stack pointer value. The stack grows downward from here.
pub const SP_INIT: u8 = 0xF4;

bitflags! {
    /// Comparison result flags. CMP rewrites the whole register, so at
    /// most one flag is ever set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Flags: u8 {
        /// `reg[a] == reg[b]`
        const EQUAL = 0b0000_0001;
        /// `reg[a] > reg[b]`
        const GREATER = 0b0000_0010;
        /// `reg[a] < reg[b]`
        const LESS = 0b0000_0100;
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    gp: [u8; REGISTER_COUNT],

    /// Program counter: address of the next instruction to fetch.
    pub pc: usize,

    /// FL: result of the most recent CMP.
    pub fl: Flags,
}

impl Registers {
    /// Create a new register file: all zero except SP.
    pub fn new() -> Self {
        let mut gp = [0; REGISTER_COUNT];
        gp[SP as usize] = SP_INIT;

        Self {
            gp,
            pc: 0,
            fl: Flags::empty(),
        }
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general purpose register.
    #[inline]
    pub fn get(&self, index: u8) -> Result<u8, RegisterError> {
        self.gp
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::InvalidRegister(index))
    }

    /// Write a general purpose register.
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) -> Result<(), RegisterError> {
        let reg = self.gp
            .get_mut(index as usize)
            .ok_or(RegisterError::InvalidRegister(index))?;
        *reg = value;
        Ok(())
    }

    /// All general purpose registers, R0 first.
    pub fn all(&self) -> &[u8; REGISTER_COUNT] {
        &self.gp
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> u8 {
        self.gp[SP as usize]
    }

    /// Move SP down one cell and return the new top of stack.
    /// Wraps below zero like any other register arithmetic.
    pub fn sp_dec(&mut self) -> u8 {
        let sp = self.sp().wrapping_sub(1);
        self.gp[SP as usize] = sp;
        sp
    }

    /// Move SP up one cell. Returns the old top of stack.
    pub fn sp_inc(&mut self) -> u8 {
        let old = self.sp();
        self.gp[SP as usize] = old.wrapping_add(1);
        old
    }

    /// Advance the program counter past an instruction of `len` bytes.
    pub fn advance_pc(&mut self, len: usize) {
        self.pc += len;
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr as usize;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised by register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("invalid register R{0} (valid: R0-R7)")]
    InvalidRegister(u8),
}
