//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (`#` works too)
//!         LDI R0, 10      ; Load immediate
//!         LDI R1, LOOP    ; Labels are valid immediates
//! LOOP:                   ; Define a label
//!         PRN R0
//!         JMP R1
//!         DB 0x2A         ; Raw data byte
//! ```
//!
//! Numbers may be decimal, `0x` hex or `0b` binary.

use crate::cpu::decode::Opcode;
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::REGISTER_COUNT;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// Kind of operand an instruction slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Register,
    Immediate,
}

/// Operand layout for each opcode.
fn operand_kinds(opcode: Opcode) -> &'static [Operand] {
    match opcode {
        Opcode::Hlt | Opcode::Ret => &[],
        Opcode::Ldi => &[Operand::Register, Operand::Immediate],
        Opcode::Add | Opcode::Mul | Opcode::Cmp => &[Operand::Register, Operand::Register],
        Opcode::Push
        | Opcode::Pop
        | Opcode::Prn
        | Opcode::Call
        | Opcode::Jmp
        | Opcode::Jeq
        | Opcode::Jne => &[Operand::Register],
    }
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Pending references.
    pending: Vec<(usize, String, usize)>, // (output_index, label, source_line)
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        if self.output.len() > MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { size: self.output.len() });
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find([';', '#']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label `{}`", &line[..colon_idx]),
                });
            }
            let addr = u8::try_from(self.output.len()).map_err(|_| {
                AssemblerError::ProgramTooLarge { size: self.output.len() }
            })?;
            if self.symbols.insert(label.clone(), addr).is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("label `{}` defined twice", label),
                });
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest),
            None => (line, ""),
        };
        let operands: Vec<&str> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        let mnemonic = mnemonic.to_uppercase();

        // Data directive
        if mnemonic == "DB" {
            if operands.is_empty() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "DB requires at least one value".into(),
                });
            }
            for operand in operands {
                self.emit_immediate(operand, line_num)?;
            }
            return Ok(());
        }

        let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
            AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
        })?;

        let kinds = operand_kinds(opcode);
        if operands.len() != kinds.len() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!(
                    "{} takes {} operand(s), found {}",
                    opcode,
                    kinds.len(),
                    operands.len()
                ),
            });
        }

        self.output.push(opcode.into());
        for (kind, operand) in kinds.iter().zip(operands) {
            match kind {
                Operand::Register => {
                    let reg = self.parse_register(operand, line_num)?;
                    self.output.push(reg);
                }
                Operand::Immediate => self.emit_immediate(operand, line_num)?,
            }
        }

        Ok(())
    }

    fn parse_register(&self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let index = operand
            .strip_prefix(['R', 'r'])
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| AssemblerError::SyntaxError {
                line: line_num,
                message: format!("expected a register, found `{}`", operand),
            })?;

        if !(0..REGISTER_COUNT as i64).contains(&index) {
            return Err(AssemblerError::ValueOutOfRange { line: line_num, value: index });
        }
        Ok(index as u8)
    }

    /// Emit a number or a label reference.
    fn emit_immediate(&mut self, operand: &str, line_num: usize) -> Result<(), AssemblerError> {
        match parse_number(operand) {
            Some(Ok(value)) => {
                let byte = u8::try_from(value)
                    .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })?;
                self.output.push(byte);
            }
            Some(Err(message)) => {
                return Err(AssemblerError::SyntaxError { line: line_num, message });
            }
            None => {
                // Label reference - resolved in pass 2
                self.pending.push((self.output.len(), operand.to_uppercase(), line_num));
                self.output.push(0);
            }
        }
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

/// Parse a numeric literal. `None` means the operand is not a number at all.
fn parse_number(operand: &str) -> Option<Result<i64, String>> {
    let (digits, radix) = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
        (bin, 2)
    } else if operand.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        (operand, 10)
    } else {
        return None;
    };

    Some(
        i64::from_str_radix(digits, radix)
            .map_err(|_| format!("invalid base-{} literal `{}`", radix, operand)),
    )
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program of {size} bytes does not fit in 256 bytes of memory")]
    ProgramTooLarge { size: usize },
}
