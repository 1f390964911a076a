//! LS-8 program image format.
//!
//! An image is a text file with one byte per line written as an
//! 8-digit binary literal:
//! - Anything after `#` is a comment
//! - Blank and comment-only lines are ignored
//! - Opcodes and operands each take their own line
//!
//! ```text
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 00000001 # HLT
//! ```

use crate::asm::disasm::disassemble_at;
use crate::cpu::memory::MEMORY_SIZE;
use log::debug;
use std::path::Path;
use thiserror::Error;

/// Parse image text into the bytes to load at address 0.
pub fn parse_image(source: &str) -> Result<Vec<u8>, LoadError> {
    let mut bytes = Vec::new();

    for (line_num, line) in source.lines().enumerate() {
        let code = line.split('#').next().unwrap_or("").trim();

        // Skip empty lines and comments
        if code.is_empty() {
            continue;
        }

        if code.len() != 8 || !code.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(LoadError::ParseError {
                line: line_num + 1,
                message: format!("expected an 8-digit binary literal, found `{}`", code),
            });
        }

        let byte = u8::from_str_radix(code, 2).map_err(|e| LoadError::ParseError {
            line: line_num + 1,
            message: e.to_string(),
        })?;

        if bytes.len() == MEMORY_SIZE {
            return Err(LoadError::TooLarge { size: bytes.len() + 1 });
        }
        bytes.push(byte);
    }

    Ok(bytes)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, LoadError> {
    let source = std::fs::read_to_string(path.as_ref())
        .map_err(|e| LoadError::IoError(e.to_string()))?;
    let bytes = parse_image(&source)?;
    debug!("read {} bytes from {}", bytes.len(), path.as_ref().display());
    Ok(bytes)
}

/// Render bytes as image text, commenting each instruction with its disassembly.
pub fn render_image(bytes: &[u8]) -> String {
    let mut output = String::new();
    let mut addr = 0;

    while addr < bytes.len() {
        let (text, len) = disassemble_at(bytes, addr);
        output.push_str(&format!("{:08b} # {:03}: {}\n", bytes[addr], addr, text));
        for &operand in bytes.iter().skip(addr + 1).take(len - 1) {
            output.push_str(&format!("{:08b}\n", operand));
        }
        addr += len;
    }

    output
}

/// Save bytes to disk as an image file.
pub fn save_image<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), LoadError> {
    if bytes.len() > MEMORY_SIZE {
        return Err(LoadError::TooLarge { size: bytes.len() });
    }

    std::fs::write(path.as_ref(), render_image(bytes))
        .map_err(|e| LoadError::IoError(e.to_string()))
}

/// Errors that can occur while loading or saving an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("program of {size} bytes does not fit in 256 bytes of memory")]
    TooLarge { size: usize },
}
