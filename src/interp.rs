//! Interpreter back end: two realizations (switch-dispatched and
//! direct-threaded) that MUST produce byte-identical observable behavior
//! (T2). Both share [`tape::Tape`] and the injected I/O streams.
//!
//! Grounded in `original_source/optinterp3.cpp` (switch dispatch) and
//! `original_source/x86-64/optdt.cpp` (direct-threaded dispatch over the
//! same optimized IR), and in the teacher's `machine.rs` `do_instruction`
//! match-per-opcode style and its `Option<&mut dyn Read>`/`Option<&mut dyn
//! Write>` I/O injection (`SBrainVM::new`).

use std::io::{Read, Write};

use crate::error::{Result, TapeVmError};
use crate::ir::{Opcode, Program};
use crate::tape::Tape;

/// Read one byte from `input`, returning 0 on EOF (Open Question (a),
/// resolved in SPEC_FULL.md / DESIGN.md: EOF reads as zero, matching the
/// JIT shim).
fn read_one(input: &mut dyn Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    match input.read(&mut buf)? {
        0 => Ok(0),
        _ => Ok(buf[0]),
    }
}

/// Execute `program` to completion against a fresh `tape`, reading from
/// `input` and writing to `output` in program order.
///
/// This is the switch-dispatched realization: a `match` over `Opcode` in a
/// loop whose program counter advances by one except where a jump op moves
/// it explicitly.
pub fn run_switch(
    program: &Program,
    tape: &mut Tape,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<()> {
    let ops = program.ops();
    let len = ops.len();
    let mut pc: usize = 0;
    let mut dp: i64 = 0;

    while pc < len {
        match ops[pc] {
            Opcode::IncPtr(n) => dp += n,
            Opcode::DecPtr(n) => dp -= n,
            Opcode::IncData(n) => {
                let v = tape.get(dp)?;
                tape.set(dp, v.wrapping_add((n.rem_euclid(256)) as u8))?;
            }
            Opcode::DecData(n) => {
                let v = tape.get(dp)?;
                tape.set(dp, v.wrapping_sub((n.rem_euclid(256)) as u8))?;
            }
            Opcode::ReadStdin(n) => {
                let mut last = 0u8;
                for _ in 0..n {
                    last = read_one(input)?;
                }
                tape.set(dp, last)?;
            }
            Opcode::WriteStdout(n) => {
                let v = tape.get(dp)?;
                for _ in 0..n {
                    output.write_all(&[v])?;
                }
            }
            Opcode::LoopSetZero => tape.set(dp, 0)?,
            Opcode::LoopMovePtr(d) => {
                while tape.get(dp)? != 0 {
                    dp += d;
                }
            }
            Opcode::LoopMoveData(d) => {
                let v = tape.get(dp)?;
                if v != 0 {
                    let target = dp + d;
                    let tv = tape.get(target)?;
                    tape.set(target, tv.wrapping_add(v))?;
                    tape.set(dp, 0)?;
                }
            }
            Opcode::JumpIfDataZero(target) => {
                if tape.get(dp)? == 0 {
                    pc = target as usize;
                    continue;
                }
            }
            Opcode::JumpIfDataNotZero(target) => {
                if tape.get(dp)? != 0 {
                    pc = target as usize;
                    continue;
                }
            }
            Opcode::Invalid => return Err(TapeVmError::InvalidOp { pc }),
        }
        pc += 1;
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::translate;
    use std::io::Cursor;

    fn run(source: &[u8], stdin: &[u8]) -> (Vec<u8>, Tape) {
        let program = translate(source).unwrap();
        let mut tape = Tape::new();
        let mut input = Cursor::new(stdin.to_vec());
        let mut output = Vec::new();
        run_switch(&program, &mut tape, &mut input, &mut output).unwrap();
        (output, tape)
    }

    #[test]
    fn modular_arithmetic_wraps_at_256() {
        let (_out, tape) = run(&b"+".repeat(256), &[]);
        assert_eq!(tape.get(0).unwrap(), 0);
    }

    #[test]
    fn reads_zero_on_eof() {
        let (out, tape) = run(b",.", &[]);
        assert_eq!(out, vec![0]);
        assert_eq!(tape.get(0).unwrap(), 0);
    }
}
