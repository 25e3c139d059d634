//! The CLI host: argument parsing, backend dispatch, and the verbose
//! diagnostic dump that restates `original_source/optasmjit.cpp` and
//! `optinterp3.cpp`'s `-v` output (translated IR, elapsed run time, and the
//! tape's nonzero cells after execution).

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use log::{debug, info};

use crate::error::Result;
use crate::interp::run_switch;
use crate::interp_threaded::{run_threaded, ThreadedProgram};
use crate::jit::JitProgram;
use crate::source::read_program;
use crate::tape::Tape;
use crate::translate::translate;

/// Which realization executes the translated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Switch,
    Threaded,
    Jit,
}

/// An optimizing translator, interpreter, and x86-64 JIT for a minimal
/// eight-instruction tape-automaton language.
#[derive(Debug, Parser)]
#[command(name = "tapevm", version, about)]
pub struct Args {
    /// Path to the source program.
    pub program: PathBuf,

    /// Which back end executes the translated program.
    #[arg(long, value_enum, default_value_t = Backend::Jit)]
    pub backend: Backend,

    /// Dump the translated IR, run timing, and nonzero tape cells after
    /// execution. In JIT mode this also writes the compiled machine code to
    /// `/tmp/bjout.bin`, mirroring the reference's `-v` dump.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the CLI end to end. Returns the process exit code: 0 on success, 1
/// on any fatal [`crate::error::TapeVmError`].
pub fn run(args: Args) -> i32 {
    match run_inner(&args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("tapevm: {e}");
            1
        }
    }
}

fn run_inner(args: &Args) -> Result<()> {
    info!("reading program from {}", args.program.display());
    let raw = read_program(&args.program)?;
    debug!("{} significant bytes after stripping comments", raw.len());

    let program = translate(&raw)?;
    info!(
        "translated {} source bytes into {} ir ops",
        program.source_len,
        program.len()
    );

    if args.verbose {
        print!("{}", program.dump());
    }

    let mut tape = Tape::new();
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();

    let start = Instant::now();
    match args.backend {
        Backend::Switch => {
            run_switch(&program, &mut tape, &mut input, &mut output)?;
        }
        Backend::Threaded => {
            let threaded = ThreadedProgram::compile(&program);
            run_threaded(&threaded, &mut tape, &mut input, &mut output)?;
        }
        Backend::Jit => {
            let (jit, code_bytes) = JitProgram::compile_traced(&program)?;
            if args.verbose {
                if let Err(e) = std::fs::write("/tmp/bjout.bin", &code_bytes) {
                    debug!("failed to write /tmp/bjout.bin: {e}");
                }
            }
            jit.run(&mut tape)?;
        }
    }
    let elapsed = start.elapsed();
    info!("execution finished in {:?}", elapsed);

    if args.verbose {
        println!("elapsed: {:?}", elapsed);
        println!("* Memory nonzero locations:");
        let mut count = 0usize;
        for (i, v) in tape.nonzero_cells() {
            print!("[{i:>3}] = {v:<3}      ");
            count += 1;
            if count % 4 == 0 {
                println!();
            }
        }
        println!();
    }

    Ok(())
}
