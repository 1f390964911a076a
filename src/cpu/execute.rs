//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::alu::{self, AluError};
use crate::cpu::decode::{self, Instruction, Opcode, DecodeError};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{Flags, RegisterError};
use log::{debug, info, trace};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU aborted on a fatal error.
    Error,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Values printed by PRN that have not been taken yet.
    output: Vec<u8>,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            output: Vec::new(),
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.output.clear();
        self.last_instr = None;
    }

    /// Load a program image into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)?;
        debug!("loaded {} byte program", program.len());
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. A failed
    /// instruction leaves registers and memory untouched and moves the CPU
    /// to [`CpuState::Error`].
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.regs.pc;
        let result = self.fetch(pc).and_then(|instr| {
            trace!("{:02X}: {}", pc, instr);
            self.execute(instr).map(|()| instr)
        });

        match result {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(e) => {
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        info!("halted after {} cycles", self.cycles);
        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        if self.is_halted() {
            info!("halted after {} cycles", self.cycles);
        }
        Ok(self.cycles - start_cycles)
    }

    /// Fetch and decode the instruction at `pc`.
    ///
    /// Only the operand bytes the opcode declares are read, so an
    /// instruction ending on the last memory cell is still valid.
    fn fetch(&self, pc: usize) -> Result<Instruction, CpuError> {
        let raw = self.mem.read(pc)?;
        let opcode = Opcode::try_from(raw).map_err(|_| CpuError::Decode {
            pc,
            source: DecodeError::IllegalInstruction(raw),
        })?;

        let operands = (1..=opcode.operand_count())
            .map(|offset| self.mem.read(pc + offset))
            .collect::<Result<Vec<u8>, _>>()?;

        Ok(decode::from_parts(opcode, &operands))
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        let len = instr.len();

        match instr {
            // ==================== Data ====================

            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value)?;
                self.regs.advance_pc(len);
            }

            Instruction::Prn { reg } => {
                let value = self.regs.get(reg)?;
                self.output.push(value);
                self.regs.advance_pc(len);
            }

            // ==================== Arithmetic ====================

            Instruction::Mul { a, b } => {
                let product = self.regs.get(a)?.wrapping_mul(self.regs.get(b)?);
                self.regs.set(a, product)?;
                self.regs.advance_pc(len);
            }

            Instruction::Add { a, b } => alu::alu(Opcode::Add, &mut self.regs, a, b)?,

            Instruction::Cmp { a, b } => alu::alu(Opcode::Cmp, &mut self.regs, a, b)?,

            // ==================== Stack ====================

            Instruction::Push { reg } => {
                let value = self.regs.get(reg)?;
                let sp = self.regs.sp_dec();
                self.mem.write(sp as usize, value)?;
                self.regs.advance_pc(len);
            }

            Instruction::Pop { reg } => {
                self.regs.get(reg)?;
                let value = self.mem.read(self.regs.sp() as usize)?;
                self.regs.set(reg, value)?;
                self.regs.sp_inc();
                self.regs.advance_pc(len);
            }

            // ==================== Control Flow ====================

            Instruction::Call { reg } => {
                let target = self.regs.get(reg)?;
                let ret = self.regs.pc + len;
                let ret = u8::try_from(ret).map_err(|_| CpuError::ReturnAddressOverflow(ret))?;
                let sp = self.regs.sp_dec();
                self.mem.write(sp as usize, ret)?;
                self.regs.jump(target);
            }

            Instruction::Ret => {
                // SP is left pointing at the consumed return address.
                let ret = self.mem.read(self.regs.sp() as usize)?;
                self.regs.jump(ret);
            }

            Instruction::Jmp { reg } => {
                let target = self.regs.get(reg)?;
                self.regs.jump(target);
            }

            Instruction::Jeq { reg } => {
                self.branch_if(reg, self.regs.fl.contains(Flags::EQUAL), len)?;
            }

            Instruction::Jne { reg } => {
                self.branch_if(reg, !self.regs.fl.contains(Flags::EQUAL), len)?;
            }

            Instruction::Hlt => {
                self.state = CpuState::Halted;
                debug!("HLT at {:02X}", self.regs.pc);
            }
        }

        Ok(())
    }

    /// Jump to `R[reg]` when `taken`, otherwise step over the instruction.
    fn branch_if(&mut self, reg: u8, taken: bool, len: usize) -> Result<(), CpuError> {
        let target = self.regs.get(reg)?;
        if taken {
            self.regs.jump(target);
        } else {
            self.regs.advance_pc(len);
        }
        Ok(())
    }

    /// One-line diagnostic snapshot:
    /// `TRACE: PC | [PC] [PC+1] [PC+2] | R0 .. R7`, all in hex.
    ///
    /// Bytes past the end of memory show as `00`.
    pub fn trace(&self) -> String {
        let pc = self.regs.pc;
        let byte = |offset: usize| self.mem.peek(pc + offset).unwrap_or(0);

        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            byte(0),
            byte(1),
            byte(2)
        );
        for value in self.regs.all() {
            line.push_str(&format!(" {:02X}", value));
        }
        line
    }

    /// Values printed so far, oldest first.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take the pending PRN output, leaving the buffer empty.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("decode error at PC={pc:#04x}: {source}")]
    Decode { pc: usize, source: DecodeError },

    #[error("unsupported ALU operation: {0}")]
    UnsupportedAluOperation(Opcode),

    #[error("return address {0} does not fit in a byte")]
    ReturnAddressOverflow(usize),
}

impl From<AluError> for CpuError {
    fn from(err: AluError) -> Self {
        match err {
            AluError::UnsupportedAluOperation(op) => CpuError::UnsupportedAluOperation(op),
            AluError::Register(e) => CpuError::Register(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode_all;
    use crate::cpu::registers::SP_INIT;

    fn boot(program: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(&encode_all(program)).unwrap();
        cpu
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = boot(&[Instruction::Hlt]);

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_step_after_halt_fails() {
        let mut cpu = boot(&[Instruction::Hlt]);
        cpu.run().unwrap();

        assert_eq!(cpu.step(), Err(CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_ldi_prn() {
        let mut cpu = boot(&[
            Instruction::Ldi { reg: 2, value: 200 },
            Instruction::Prn { reg: 2 },
            Instruction::Hlt,
        ]);

        cpu.run().unwrap();

        assert_eq!(cpu.output(), &[200]);
        assert_eq!(cpu.regs.pc, 5);
    }

    #[test]
    fn test_mul_wraps() {
        let mut cpu = boot(&[
            Instruction::Ldi { reg: 0, value: 20 },
            Instruction::Ldi { reg: 1, value: 13 },
            Instruction::Mul { a: 0, b: 1 },
            Instruction::Hlt,
        ]);

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(0).unwrap(), (20u32 * 13 % 256) as u8);
    }

    #[test]
    fn test_push_pop() {
        let mut cpu = boot(&[
            Instruction::Ldi { reg: 0, value: 42 },
            Instruction::Push { reg: 0 },
            Instruction::Pop { reg: 3 },
            Instruction::Hlt,
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.sp(), SP_INIT - 1);
        assert_eq!(cpu.mem.read((SP_INIT - 1) as usize).unwrap(), 42);

        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(3).unwrap(), 42);
        assert_eq!(cpu.regs.sp(), SP_INIT);
    }

    #[test]
    fn test_call_ret() {
        // 0: LDI R1, 9   3: CALL R1   5: PRN R0   7: HLT   8: (pad)
        // 9: LDI R0, 5  12: RET
        let mut program = encode_all(&[
            Instruction::Ldi { reg: 1, value: 9 },
            Instruction::Call { reg: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
        ]);
        program.push(0);
        program.extend(encode_all(&[
            Instruction::Ldi { reg: 0, value: 5 },
            Instruction::Ret,
        ]));
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 9);
        assert_eq!(cpu.mem.read((SP_INIT - 1) as usize).unwrap(), 5);

        cpu.run().unwrap();
        assert_eq!(cpu.output(), &[5]);
    }

    #[test]
    fn test_ret_leaves_stack_pointer() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x50, 1, 0x01, 0x11]).unwrap(); // CALL R1; HLT; RET
        cpu.regs.set(1, 3).unwrap();

        cpu.run().unwrap();

        // RET reads the return address without popping it
        assert_eq!(cpu.regs.sp(), SP_INIT - 1);
        assert_eq!(cpu.cycles, 3);
    }

    #[test]
    fn test_jeq_jne() {
        let mut cpu = Cpu::new();
        cpu.regs.set(2, 40).unwrap();

        cpu.regs.fl = Flags::EQUAL;
        cpu.load_program(&[0x55, 2]).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 40);

        cpu.regs.pc = 0;
        cpu.load_program(&[0x56, 2]).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 2);

        cpu.regs.pc = 0;
        cpu.regs.fl = Flags::LESS;
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 40);
    }

    #[test]
    fn test_illegal_instruction() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 1, 0xFF]).unwrap();

        cpu.step().unwrap();
        let err = cpu.step().unwrap_err();

        assert_eq!(
            err,
            CpuError::Decode { pc: 3, source: DecodeError::IllegalInstruction(0xFF) }
        );
        assert_eq!(cpu.state, CpuState::Error);
        assert!(cpu.step().is_err());
    }

    #[test]
    fn test_zeroed_memory_is_illegal() {
        let mut cpu = Cpu::new();

        assert!(matches!(cpu.run(), Err(CpuError::Decode { pc: 0, .. })));
    }

    #[test]
    fn test_invalid_register_is_atomic() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x45, 8]).unwrap(); // PUSH R8

        let err = cpu.step().unwrap_err();

        assert_eq!(err, CpuError::Register(RegisterError::InvalidRegister(8)));
        assert_eq!(cpu.regs.sp(), SP_INIT);
        assert_eq!(cpu.regs.pc, 0);
    }

    #[test]
    fn test_pc_runs_off_memory() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x54, 0]).unwrap(); // JMP R0
        cpu.regs.set(0, 254).unwrap();
        cpu.mem.write(254, 0x82).unwrap(); // LDI with operands past the end

        cpu.step().unwrap();
        assert_eq!(cpu.step(), Err(CpuError::Memory(MemoryError::OutOfBounds(256))));
    }

    #[test]
    fn test_call_return_address_overflow() {
        let mut cpu = Cpu::new();
        cpu.regs.pc = 254;
        cpu.mem.write(254, 0x50).unwrap();

        assert_eq!(cpu.step(), Err(CpuError::ReturnAddressOverflow(256)));
        assert_eq!(cpu.regs.sp(), SP_INIT);
    }

    #[test]
    fn test_run_limited() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x54, 0]).unwrap(); // JMP R0 -> 0, forever

        let executed = cpu.run_limited(10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_trace_format() {
        let mut cpu = boot(&[Instruction::Ldi { reg: 0, value: 8 }, Instruction::Hlt]);

        assert_eq!(cpu.trace(), "TRACE: 00 | 82 00 08 | 00 00 00 00 00 00 00 F4");

        cpu.step().unwrap();
        assert_eq!(cpu.trace(), "TRACE: 03 | 01 00 00 | 08 00 00 00 00 00 00 F4");
    }

    #[test]
    fn test_reset() {
        let mut cpu = boot(&[Instruction::Ldi { reg: 0, value: 1 }, Instruction::Prn { reg: 0 }, Instruction::Hlt]);
        cpu.run().unwrap();

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert!(cpu.output().is_empty());
        assert_eq!(cpu.regs, Registers::new());
        assert_eq!(cpu.mem, Memory::new());
    }

    #[test]
    fn test_take_output() {
        let mut cpu = boot(&[Instruction::Prn { reg: 7 }, Instruction::Hlt]);
        cpu.run().unwrap();

        assert_eq!(cpu.take_output(), vec![SP_INIT]);
        assert!(cpu.output().is_empty());
    }
}
