//! # LS-8 Emulator
//!
//! An emulator of the LS-8, a small 8-bit register machine.
//!
//! The machine has 256 bytes of memory, eight general purpose registers
//! (R7 doubles as the stack pointer), a three-bit flags register and a
//! closed instruction set of single-byte opcodes followed by up to two
//! operand bytes.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Flags, Instruction, Opcode};
pub use asm::{assemble, disassemble, AssemblerError, LoadError, load_image, parse_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
