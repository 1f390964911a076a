//! Property tests for instruction semantics.

use ls8::cpu::decode::encode_all;
use ls8::{Cpu, Flags, Instruction};
use proptest::prelude::*;

/// Run a program to HLT and return the CPU.
fn run(program: &[Instruction]) -> Cpu {
    let mut cpu = Cpu::new();
    cpu.load_program(&encode_all(program)).unwrap();
    cpu.run().unwrap();
    cpu
}

/// General purpose registers that are not the stack pointer.
fn gp_reg() -> impl Strategy<Value = u8> {
    0u8..7
}

proptest! {
    #[test]
    fn ldi_then_prn_prints_value(reg in 0u8..8, value in any::<u8>()) {
        let cpu = run(&[
            Instruction::Ldi { reg, value },
            Instruction::Prn { reg },
            Instruction::Hlt,
        ]);

        prop_assert_eq!(cpu.output(), &[value]);
    }

    #[test]
    fn add_and_mul_wrap(x in any::<u8>(), y in any::<u8>()) {
        let cpu = run(&[
            Instruction::Ldi { reg: 0, value: x },
            Instruction::Ldi { reg: 1, value: y },
            Instruction::Ldi { reg: 2, value: x },
            Instruction::Add { a: 0, b: 1 },
            Instruction::Mul { a: 2, b: 1 },
            Instruction::Hlt,
        ]);

        prop_assert_eq!(cpu.regs.get(0).unwrap() as u32, (x as u32 + y as u32) % 256);
        prop_assert_eq!(cpu.regs.get(2).unwrap() as u32, (x as u32 * y as u32) % 256);
    }

    #[test]
    fn cmp_sets_exactly_one_flag(x in any::<u8>(), y in any::<u8>()) {
        let cpu = run(&[
            Instruction::Ldi { reg: 0, value: x },
            Instruction::Ldi { reg: 1, value: y },
            Instruction::Cmp { a: 0, b: 1 },
            Instruction::Hlt,
        ]);

        let fl = cpu.regs.fl;
        prop_assert_eq!(fl.bits().count_ones(), 1);
        prop_assert_eq!(fl.contains(Flags::EQUAL), x == y);
        prop_assert_eq!(fl.contains(Flags::GREATER), x > y);
        prop_assert_eq!(fl.contains(Flags::LESS), x < y);
    }

    #[test]
    fn jeq_jne_follow_cmp(x in any::<u8>(), y in any::<u8>()) {
        // 0: LDI R0,x  3: LDI R1,y  6: LDI R2,15  9: CMP R0,R1  12: Jxx R2
        // 14: HLT  15: PRN R2  17: HLT
        for (jump, taken_when_equal) in [
            (Instruction::Jeq { reg: 2 }, true),
            (Instruction::Jne { reg: 2 }, false),
        ] {
            let cpu = run(&[
                Instruction::Ldi { reg: 0, value: x },
                Instruction::Ldi { reg: 1, value: y },
                Instruction::Ldi { reg: 2, value: 15 },
                Instruction::Cmp { a: 0, b: 1 },
                jump,
                Instruction::Hlt,
                Instruction::Prn { reg: 2 },
                Instruction::Hlt,
            ]);

            let branched = cpu.output() == [15];
            prop_assert_eq!(branched, (x == y) == taken_when_equal);
        }
    }

    #[test]
    fn push_pop_round_trip(src in gp_reg(), dst in gp_reg(), value in any::<u8>()) {
        prop_assume!(src != dst);

        let cpu = run(&[
            Instruction::Ldi { reg: src, value },
            Instruction::Push { reg: src },
            Instruction::Pop { reg: dst },
            Instruction::Hlt,
        ]);

        prop_assert_eq!(cpu.regs.get(dst).unwrap(), value);
        prop_assert_eq!(cpu.regs.sp(), 0xF4);
    }

    #[test]
    fn call_returns_after_call(reg in gp_reg(), pad in 0usize..40) {
        // 0: LDI Rreg,target  3: CALL Rreg  5: HLT  6..: padding  target: RET
        let target = 6 + pad;
        let mut program = encode_all(&[
            Instruction::Ldi { reg, value: target as u8 },
            Instruction::Call { reg },
            Instruction::Hlt,
        ]);
        program.resize(target, 0);
        program.extend(encode_all(&[Instruction::Ret]));

        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        cpu.run().unwrap();

        prop_assert_eq!(cpu.regs.pc, 5);
        prop_assert_eq!(cpu.cycles, 4);
    }
}
