//! End-to-end runs of the sample programs in `programs/`.

use ls8::{assemble, load_image, Cpu, CpuState};
use std::path::PathBuf;

fn program_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("programs").join(name)
}

/// Load and run an image to completion, returning the CPU and its output.
fn run_image(name: &str) -> (Cpu, Vec<u8>) {
    let bytes = load_image(program_path(name)).unwrap();
    run_bytes(&bytes)
}

fn run_bytes(bytes: &[u8]) -> (Cpu, Vec<u8>) {
    let mut cpu = Cpu::new();
    cpu.load_program(bytes).unwrap();
    cpu.run_limited(10_000).unwrap();
    assert_eq!(cpu.state, CpuState::Halted, "program did not halt");
    let output = cpu.take_output();
    (cpu, output)
}

#[test]
fn test_print8() {
    let (_, output) = run_image("print8.ls8");
    assert_eq!(output, vec![8]);
}

#[test]
fn test_mult() {
    let (cpu, output) = run_image("mult.ls8");
    assert_eq!(output, vec![72]);
    assert_eq!(cpu.cycles, 5);
}

#[test]
fn test_stack() {
    let (cpu, output) = run_image("stack.ls8");
    assert_eq!(output, vec![2, 4, 1]);
    assert_eq!(cpu.regs.sp(), 0xF4);
}

#[test]
fn test_call() {
    let (cpu, output) = run_image("call.ls8");
    assert_eq!(output, vec![20, 30, 36, 60]);
    // RET leaves SP on the return address slot, so each CALL sinks the stack by one
    assert_eq!(cpu.regs.sp(), 0xF4 - 4);
}

#[test]
fn test_countdown_loop() {
    let (cpu, output) = run_image("countdown.ls8");
    assert_eq!(output, vec![5, 4, 3, 2, 1]);
    // 4 setup LDIs, 5 iterations of 4 instructions, HLT
    assert_eq!(cpu.cycles, 4 + 5 * 4 + 1);
    assert_eq!(cpu.regs.get(0).unwrap(), 0);
}

#[test]
fn test_sctest_source() {
    let source = std::fs::read_to_string(program_path("sctest.asm")).unwrap();
    let bytes = assemble(&source).unwrap();

    let (_, output) = run_bytes(&bytes);
    assert_eq!(output, vec![1, 4, 5]);
}

#[test]
fn test_assembled_mult_matches_image() {
    let source = "LDI R0, 8\nLDI R1, 9\nMUL R0, R1\nPRN R0\nHLT\n";
    let image = load_image(program_path("mult.ls8")).unwrap();

    assert_eq!(assemble(source).unwrap(), image);
}

#[test]
fn test_state_dump_is_json() {
    let (cpu, _) = run_image("mult.ls8");

    let json = serde_json::to_value(&cpu).unwrap();

    assert_eq!(json["state"], "Halted");
    assert_eq!(json["cycles"], 5);
    assert_eq!(json["regs"]["pc"], 11);
}
