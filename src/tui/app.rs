//! Debugger application state and logic.

use crate::Cpu;
use crate::asm::disasm::listing;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Everything PRN has printed since the last reset.
    pub output: Vec<u8>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset (in rows of 16 bytes).
    pub mem_scroll: usize,
}

/// Memory view rows (16 bytes each).
pub const MEMORY_ROWS: usize = 16;

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut cpu = Cpu::new();
        let status = match cpu.load_program(&program) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            Err(e) => format!("Load failed: {}", e),
        };

        Self {
            cpu,
            program,
            breakpoints: HashSet::new(),
            output: Vec::new(),
            running: false,
            should_quit: false,
            status,
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step() {
            Ok(instr) => {
                self.output.extend(self.cpu.take_output());
                self.status = format!("PC={:02X}: {}", pc, instr);
            }
            Err(e) => {
                self.status = format!("Error at PC={:02X}: {}", pc, e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.cpu.cycles);
            return;
        }

        self.step();

        // Stop before executing the instruction under a breakpoint
        let pc = self.cpu.regs.pc;
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:02X}", pc);
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:02X}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        let _ = self.cpu.load_program(&self.program);
        self.output.clear();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Scroll the memory view by `delta` rows.
    pub fn scroll_memory(&mut self, delta: isize) {
        let max = MEMORY_ROWS.saturating_sub(1);
        self.mem_scroll = self.mem_scroll.saturating_add_signed(delta).min(max);
    }

    /// Get disassembly around current PC.
    ///
    /// The sweep starts at address 0, so PC is only highlighted when it
    /// lands on an instruction boundary of the loaded program.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.cpu.regs.pc;
        let all = listing(self.cpu.mem.as_slice());
        let center = all.iter().position(|(addr, _)| *addr >= pc).unwrap_or(0);
        let start = center.saturating_sub(lines / 2);

        all.into_iter()
            .skip(start)
            .take(lines)
            .map(|(addr, text)| (addr, text, addr == pc))
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(program);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // LDI R0, 3; PRN R0; HLT
    const PROGRAM: [u8; 6] = [0x82, 0, 3, 0x47, 0, 0x01];

    #[test]
    fn test_step_collects_output() {
        let mut app = DebuggerApp::new(PROGRAM.to_vec());

        app.step();
        app.step();

        assert_eq!(app.output, vec![3]);
        assert!(app.status.contains("PRN R0"));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = DebuggerApp::new(PROGRAM.to_vec());
        app.cpu.regs.pc = 3;
        app.toggle_breakpoint();
        app.cpu.regs.pc = 0;

        app.run();
        app.tick();

        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 3);
        assert!(app.status.contains("Breakpoint"));
    }

    #[test]
    fn test_reset_restores_program() {
        let mut app = DebuggerApp::new(PROGRAM.to_vec());
        app.step();
        app.step();

        app.reset();

        assert_eq!(app.cpu.regs.pc, 0);
        assert!(app.output.is_empty());
        assert_eq!(app.cpu.mem.read(1).unwrap(), 0);
        assert_eq!(app.cpu.mem.read(2).unwrap(), 3);
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let mut app = DebuggerApp::new(PROGRAM.to_vec());
        app.step();

        let lines = app.get_disassembly(4);
        let current: Vec<_> = lines.iter().filter(|(_, _, cur)| *cur).collect();

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].0, 3);
        assert_eq!(current[0].1, "PRN R0");
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut app = DebuggerApp::new(PROGRAM.to_vec());

        app.scroll_memory(-1);
        assert_eq!(app.mem_scroll, 0);

        app.scroll_memory(100);
        assert_eq!(app.mem_scroll, MEMORY_ROWS - 1);
    }
}
