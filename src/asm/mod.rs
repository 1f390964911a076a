//! Program tooling for the LS-8.
//!
//! This module provides:
//! - The `.ls8` image loader (binary text, one byte per line)
//! - A two-pass assembler (mnemonics → bytes)
//! - A disassembler (bytes → readable text)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{LoadError, load_image, parse_image, render_image, save_image};
