//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an `.ls8` image or `.asm` source
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu asm <source>` - Assemble to an `.ls8` image
//! - `ls8-emu disasm <image>` - Disassemble an `.ls8` image

use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the LS-8 8-bit computer")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 or .asm file to execute
        program: String,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "100000")]
        max_cycles: u64,
        /// Print a TRACE line before every instruction (to stderr)
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the .ls8 or .asm file to debug
        program: String,
    },
    /// Assemble source to an .ls8 image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an .ls8 image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("failed to initialize logging: {}", e);
    }

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, dump_state }) => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        #[cfg(feature = "tui")]
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        None => {
            println!("LS-8 Emulator v0.1.0");
            println!("An 8-bit computer emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Read a program as bytes, assembling `.asm` sources first.
fn read_program(path: &str) -> Vec<u8> {
    use ls8::{assemble, load_image};

    let program = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(bytes) => {
                info!("assembled {} bytes from {}", bytes.len(), path);
                bytes
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(bytes) => {
                info!("loaded {} bytes from {}", bytes.len(), path);
                bytes
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    };

    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    program
}

fn run_program(path: &str, max_cycles: u64, trace: bool, dump_state: bool) {
    use ls8::Cpu;

    let program = read_program(path);

    // Create CPU and load program
    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    // PRN output goes to stdout as it happens
    while cpu.is_running() && cpu.cycles < max_cycles {
        let pc = cpu.regs.pc;
        if trace {
            eprintln!("{}", cpu.trace());
        }

        let result = cpu.step();
        for value in cpu.take_output() {
            println!("{}", value);
        }

        if let Err(e) = result {
            eprintln!("❌ CPU error at PC={:02X}: {}", pc, e);
            std::process::exit(1);
        }
    }

    info!("state: {:?}, cycles: {}", cpu.state, cpu.cycles);

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }

    if cpu.is_running() {
        warn!("reached max cycles limit ({}); use --max-cycles to increase", max_cycles);
        std::process::exit(2);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use ls8::tui::run_debugger;

    let program = read_program(path);

    if let Err(e) = run_debugger(program) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use ls8::{assemble, save_image};

    let out_path = output.unwrap_or_else(|| {
        source_path.replace(".asm", ".ls8")
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    // Read source
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    // Assemble
    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} bytes", bytes.len());

    if let Err(e) = save_image(&out_path, &bytes) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    use ls8::{disassemble, load_image};

    let bytes = match load_image(image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&bytes));
}
