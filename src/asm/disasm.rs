//! Disassembler for LS-8 programs.
//!
//! Converts raw bytes back to readable assembly using a linear sweep.

use crate::cpu::decode::{decode, DecodeError};

/// Disassemble the instruction starting at `addr`.
///
/// Returns the text and the number of bytes consumed. Bytes that do not
/// decode (unknown opcodes, instructions cut off by the end of `bytes`)
/// are rendered as a single `DB` byte.
pub fn disassemble_at(bytes: &[u8], addr: usize) -> (String, usize) {
    match bytes.get(addr..).map(decode) {
        Some(Ok(instr)) => (instr.to_string(), instr.len()),
        Some(Err(DecodeError::Empty)) | None => (String::new(), 0),
        Some(Err(_)) => (format!("DB {:#04x}", bytes[addr]), 1),
    }
}

/// Sweep `bytes` from address 0, returning `(addr, text)` per instruction.
pub fn listing(bytes: &[u8]) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut addr = 0;

    while addr < bytes.len() {
        let (text, len) = disassemble_at(bytes, addr);
        lines.push((addr, text));
        addr += len.max(1);
    }

    lines
}

/// Disassemble a whole program.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; ----------------\n\n");

    for (addr, text) in listing(bytes) {
        output.push_str(&format!("{:03}: {}\n", addr, text));
    }

    output
}
