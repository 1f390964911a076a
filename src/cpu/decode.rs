//! Instruction decoder for the LS-8.
//!
//! Every instruction starts with a one-byte opcode. The two high bits of
//! the opcode give the number of operand bytes that follow it:
//!
//! ```text
//! AABCDDDD
//! AA   operand count (0-2)
//! B    ALU operation
//! C    sets PC
//! DDDD instruction identifier
//! ```

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Opcode byte values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(TryFromPrimitive, IntoPrimitive)]
pub enum Opcode {
    /// Halt the CPU
    Hlt = 0b0000_0001,
    /// Return from subroutine
    Ret = 0b0001_0001,
    /// Push register onto the stack
    Push = 0b0100_0101,
    /// Pop the stack into a register
    Pop = 0b0100_0110,
    /// Print register as decimal
    Prn = 0b0100_0111,
    /// Call subroutine at the address in a register
    Call = 0b0101_0000,
    /// Jump to the address in a register
    Jmp = 0b0101_0100,
    /// Jump if the equal flag is set
    Jeq = 0b0101_0101,
    /// Jump if the equal flag is clear
    Jne = 0b0101_0110,
    /// Load immediate
    Ldi = 0b1000_0010,
    /// Add two registers
    Add = 0b1010_0000,
    /// Multiply two registers
    Mul = 0b1010_0010,
    /// Compare two registers
    Cmp = 0b1010_0111,
}

impl Opcode {
    pub const ALL: [Opcode; 13] = [
        Opcode::Hlt,
        Opcode::Ret,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Prn,
        Opcode::Call,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
        Opcode::Ldi,
        Opcode::Add,
        Opcode::Mul,
        Opcode::Cmp,
    ];

    /// Number of operand bytes following the opcode.
    #[inline]
    pub fn operand_count(self) -> usize {
        (u8::from(self) >> 6) as usize
    }

    /// Total instruction length in bytes.
    #[inline]
    pub fn len(self) -> usize {
        1 + self.operand_count()
    }

    /// Whether the instruction is executed by the ALU.
    #[inline]
    pub fn is_alu(self) -> bool {
        u8::from(self) & 0b0010_0000 != 0
    }

    /// Whether the instruction assigns PC itself.
    #[inline]
    pub fn sets_pc(self) -> bool {
        u8::from(self) & 0b0001_0000 != 0
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Ret => "RET",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Prn => "PRN",
            Opcode::Call => "CALL",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
            Opcode::Ldi => "LDI",
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
        }
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Decoded LS-8 instruction.
///
/// Register operands are kept as raw bytes; they are validated when the
/// register file is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Data ====================

    /// Load immediate: R[reg] := value
    Ldi { reg: u8, value: u8 },

    /// Print R[reg] as a decimal line
    Prn { reg: u8 },

    // ==================== Arithmetic ====================

    /// R[a] := R[a] * R[b] (mod 256)
    Mul { a: u8, b: u8 },

    /// R[a] := R[a] + R[b] (mod 256)
    Add { a: u8, b: u8 },

    /// Set FL from comparing R[a] with R[b]
    Cmp { a: u8, b: u8 },

    // ==================== Stack ====================

    /// SP -= 1; [SP] := R[reg]
    Push { reg: u8 },

    /// R[reg] := [SP]; SP += 1
    Pop { reg: u8 },

    // ==================== Control Flow ====================

    /// Push the return address and jump to R[reg]
    Call { reg: u8 },

    /// PC := [SP]
    Ret,

    /// PC := R[reg]
    Jmp { reg: u8 },

    /// If FL.E then PC := R[reg]
    Jeq { reg: u8 },

    /// If not FL.E then PC := R[reg]
    Jne { reg: u8 },

    /// Halt execution
    Hlt,
}

impl Instruction {
    /// The opcode this instruction encodes to.
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Ldi { .. } => Opcode::Ldi,
            Instruction::Prn { .. } => Opcode::Prn,
            Instruction::Mul { .. } => Opcode::Mul,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Cmp { .. } => Opcode::Cmp,
            Instruction::Push { .. } => Opcode::Push,
            Instruction::Pop { .. } => Opcode::Pop,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Ret => Opcode::Ret,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jeq { .. } => Opcode::Jeq,
            Instruction::Jne { .. } => Opcode::Jne,
            Instruction::Hlt => Opcode::Hlt,
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.opcode().len()
    }

    /// Operand bytes in encoding order.
    fn operands(&self) -> Vec<u8> {
        match *self {
            Instruction::Ldi { reg, value } => vec![reg, value],
            Instruction::Mul { a, b }
            | Instruction::Add { a, b }
            | Instruction::Cmp { a, b } => vec![a, b],
            Instruction::Prn { reg }
            | Instruction::Push { reg }
            | Instruction::Pop { reg }
            | Instruction::Call { reg }
            | Instruction::Jmp { reg }
            | Instruction::Jeq { reg }
            | Instruction::Jne { reg } => vec![reg],
            Instruction::Ret | Instruction::Hlt => Vec::new(),
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Instruction::Ldi { reg, value } => write!(f, "LDI R{}, {}", reg, value),
            Instruction::Mul { a, b } => write!(f, "MUL R{}, R{}", a, b),
            Instruction::Add { a, b } => write!(f, "ADD R{}, R{}", a, b),
            Instruction::Cmp { a, b } => write!(f, "CMP R{}, R{}", a, b),
            Instruction::Ret => f.write_str("RET"),
            Instruction::Hlt => f.write_str("HLT"),
            other => {
                let reg = other.operands()[0];
                write!(f, "{} R{}", other.opcode(), reg)
            }
        }
    }
}

/// Decode an instruction from the bytes starting at its opcode.
///
/// `bytes` may be longer than the instruction; extra bytes are ignored.
pub fn decode(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let (&raw, operands) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let opcode = Opcode::try_from(raw).map_err(|_| DecodeError::IllegalInstruction(raw))?;

    if operands.len() < opcode.operand_count() {
        return Err(DecodeError::Truncated {
            opcode,
            needed: opcode.operand_count(),
            available: operands.len(),
        });
    }

    Ok(from_parts(opcode, operands))
}

/// Build an instruction from an opcode and at least `operand_count` operand bytes.
pub(crate) fn from_parts(opcode: Opcode, operands: &[u8]) -> Instruction {
    match opcode {
        Opcode::Hlt => Instruction::Hlt,
        Opcode::Ret => Instruction::Ret,
        Opcode::Push => Instruction::Push { reg: operands[0] },
        Opcode::Pop => Instruction::Pop { reg: operands[0] },
        Opcode::Prn => Instruction::Prn { reg: operands[0] },
        Opcode::Call => Instruction::Call { reg: operands[0] },
        Opcode::Jmp => Instruction::Jmp { reg: operands[0] },
        Opcode::Jeq => Instruction::Jeq { reg: operands[0] },
        Opcode::Jne => Instruction::Jne { reg: operands[0] },
        Opcode::Ldi => Instruction::Ldi { reg: operands[0], value: operands[1] },
        Opcode::Add => Instruction::Add { a: operands[0], b: operands[1] },
        Opcode::Mul => Instruction::Mul { a: operands[0], b: operands[1] },
        Opcode::Cmp => Instruction::Cmp { a: operands[0], b: operands[1] },
    }
}

/// Encode an instruction to its byte sequence.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(instr.len());
    bytes.push(instr.opcode().into());
    bytes.extend(instr.operands());
    bytes
}

/// Encode a sequence of instructions back to back.
pub fn encode_all(instrs: &[Instruction]) -> Vec<u8> {
    instrs.iter().flat_map(encode).collect()
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("illegal instruction: opcode {0:#04x}")]
    IllegalInstruction(u8),

    #[error("{opcode} needs {needed} operand byte(s), only {available} available")]
    Truncated { opcode: Opcode, needed: usize, available: usize },

    #[error("no bytes to decode")]
    Empty,
}
