//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 byte-addressable memory cells
//! - 8 general purpose registers, R7 being the stack pointer
//! - flags register written by CMP (equal, greater-than, less-than)
//! - 13-instruction set, opcodes followed by 0-2 operand bytes

pub mod memory;
pub mod registers;
pub mod alu;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, RegisterError, Flags};
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState};
