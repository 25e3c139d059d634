//! Direct-threaded interpreter back end.
//!
//! Rust has no computed-goto/label-as-value like the `void*` table in
//! `original_source/simpledt.cpp` and `original_source/x86-64/optdt.cpp`.
//! Per Design Note 2 this restates the "language without computed goto"
//! fallback: each opcode is pre-annotated with a dispatch token (here, a
//! `DispatchFn` entry in a fixed table built once from the `Program`), and
//! the interpreter loop tail-calls `table[pc](&mut state)` instead of doing
//! an indirect jump. A sentinel `halt` token sits past the last opcode,
//! mirroring `instructions[originalSize] = &&HALT` in the reference.
//!
//! This realization and [`crate::interp::run_switch`] MUST behave
//! identically (T2); the test in `tests/backends.rs` checks this directly.

use std::io::{Read, Write};

use crate::error::{Result, TapeVmError};
use crate::ir::{Opcode, Program};
use crate::tape::Tape;

/// Mutable execution state threaded through every dispatch call.
struct ThreadedState<'a> {
    tape: &'a mut Tape,
    input: &'a mut dyn Read,
    output: &'a mut dyn Write,
    dp: i64,
    pc: usize,
    /// Set by a jump handler when it moves `pc` itself, so the trampoline
    /// doesn't also add the default +1 advance.
    jumped: bool,
    error: Option<TapeVmError>,
}

type DispatchFn = fn(&mut ThreadedState, i64);

fn read_one(input: &mut dyn Read) -> std::result::Result<u8, std::io::Error> {
    let mut buf = [0u8; 1];
    match input.read(&mut buf)? {
        0 => Ok(0),
        _ => Ok(buf[0]),
    }
}

fn handler_inc_ptr(s: &mut ThreadedState, n: i64) {
    s.dp += n;
}

fn handler_dec_ptr(s: &mut ThreadedState, n: i64) {
    s.dp -= n;
}

fn handler_inc_data(s: &mut ThreadedState, n: i64) {
    let dp = s.dp;
    match s.tape.get(dp) {
        Ok(v) => {
            if let Err(e) = s.tape.set(dp, v.wrapping_add(n as u8)) {
                s.error = Some(e);
            }
        }
        Err(e) => s.error = Some(e),
    }
}

fn handler_dec_data(s: &mut ThreadedState, n: i64) {
    let dp = s.dp;
    match s.tape.get(dp) {
        Ok(v) => {
            if let Err(e) = s.tape.set(dp, v.wrapping_sub(n as u8)) {
                s.error = Some(e);
            }
        }
        Err(e) => s.error = Some(e),
    }
}

fn handler_read_stdin(s: &mut ThreadedState, n: i64) {
    let mut last = 0u8;
    for _ in 0..n {
        match read_one(s.input) {
            Ok(b) => last = b,
            Err(e) => {
                s.error = Some(TapeVmError::HostIoError(e));
                return;
            }
        }
    }
    let dp = s.dp;
    if let Err(e) = s.tape.set(dp, last) {
        s.error = Some(e);
    }
}

fn handler_write_stdout(s: &mut ThreadedState, n: i64) {
    let v = match s.tape.get(s.dp) {
        Ok(v) => v,
        Err(e) => {
            s.error = Some(e);
            return;
        }
    };
    for _ in 0..n {
        if let Err(e) = s.output.write_all(&[v]) {
            s.error = Some(TapeVmError::HostIoError(e));
            return;
        }
    }
}

fn handler_loop_set_zero(s: &mut ThreadedState, _arg: i64) {
    let dp = s.dp;
    if let Err(e) = s.tape.set(dp, 0) {
        s.error = Some(e);
    }
}

fn handler_loop_move_ptr(s: &mut ThreadedState, d: i64) {
    loop {
        match s.tape.get(s.dp) {
            Ok(0) => break,
            Ok(_) => s.dp += d,
            Err(e) => {
                s.error = Some(e);
                break;
            }
        }
    }
}

fn handler_loop_move_data(s: &mut ThreadedState, d: i64) {
    let v = match s.tape.get(s.dp) {
        Ok(v) => v,
        Err(e) => {
            s.error = Some(e);
            return;
        }
    };
    if v != 0 {
        let target = s.dp + d;
        let tv = match s.tape.get(target) {
            Ok(tv) => tv,
            Err(e) => {
                s.error = Some(e);
                return;
            }
        };
        if let Err(e) = s.tape.set(target, tv.wrapping_add(v)) {
            s.error = Some(e);
            return;
        }
        let dp = s.dp;
        if let Err(e) = s.tape.set(dp, 0) {
            s.error = Some(e);
        }
    }
}

fn handler_jump_if_zero(s: &mut ThreadedState, target: i64) {
    match s.tape.get(s.dp) {
        Ok(0) => {
            s.pc = target as usize;
            s.jumped = true;
        }
        Ok(_) => {}
        Err(e) => s.error = Some(e),
    }
}

fn handler_jump_if_not_zero(s: &mut ThreadedState, target: i64) {
    match s.tape.get(s.dp) {
        Ok(v) if v != 0 => {
            s.pc = target as usize;
            s.jumped = true;
        }
        Ok(_) => {}
        Err(e) => s.error = Some(e),
    }
}

fn handler_invalid(s: &mut ThreadedState, _arg: i64) {
    s.error = Some(TapeVmError::InvalidOp { pc: s.pc });
}

fn handler_halt(_s: &mut ThreadedState, _arg: i64) {}

fn dispatch_fn_for(op: &Opcode) -> DispatchFn {
    match op {
        Opcode::IncPtr(_) => handler_inc_ptr,
        Opcode::DecPtr(_) => handler_dec_ptr,
        Opcode::IncData(_) => handler_inc_data,
        Opcode::DecData(_) => handler_dec_data,
        Opcode::ReadStdin(_) => handler_read_stdin,
        Opcode::WriteStdout(_) => handler_write_stdout,
        Opcode::LoopSetZero => handler_loop_set_zero,
        Opcode::LoopMovePtr(_) => handler_loop_move_ptr,
        Opcode::LoopMoveData(_) => handler_loop_move_data,
        Opcode::JumpIfDataZero(_) => handler_jump_if_zero,
        Opcode::JumpIfDataNotZero(_) => handler_jump_if_not_zero,
        Opcode::Invalid => handler_invalid,
    }
}

/// A program pre-compiled into direct-threaded dispatch tokens: one
/// `(DispatchFn, argument)` pair per opcode plus a trailing `halt` token,
/// matching `instructions[originalSize] = &&HALT` in the reference.
pub struct ThreadedProgram {
    tokens: Vec<(DispatchFn, i64)>,
}

impl ThreadedProgram {
    pub fn compile(program: &Program) -> Self {
        let mut tokens: Vec<(DispatchFn, i64)> = program
            .ops()
            .iter()
            .map(|op| (dispatch_fn_for(op), op.argument()))
            .collect();
        tokens.push((handler_halt, 0));
        ThreadedProgram { tokens }
    }
}

/// Execute a pre-compiled [`ThreadedProgram`] to completion.
pub fn run_threaded(
    threaded: &ThreadedProgram,
    tape: &mut Tape,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> Result<()> {
    let halt_pc = threaded.tokens.len() - 1;
    let mut state = ThreadedState {
        tape,
        input,
        output,
        dp: 0,
        pc: 0,
        jumped: false,
        error: None,
    };

    loop {
        if state.pc == halt_pc {
            break;
        }
        let (handler, arg) = threaded.tokens[state.pc];
        state.jumped = false;
        handler(&mut state, arg);
        if let Some(e) = state.error.take() {
            return Err(e);
        }
        if !state.jumped {
            state.pc += 1;
        }
    }

    state.output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::run_switch;
    use crate::translate::translate;
    use std::io::Cursor;

    fn run_both(source: &[u8], stdin: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let program = translate(source).unwrap();

        let mut tape_a = Tape::new();
        let mut input_a = Cursor::new(stdin.to_vec());
        let mut out_a = Vec::new();
        run_switch(&program, &mut tape_a, &mut input_a, &mut out_a).unwrap();

        let threaded = ThreadedProgram::compile(&program);
        let mut tape_b = Tape::new();
        let mut input_b = Cursor::new(stdin.to_vec());
        let mut out_b = Vec::new();
        run_threaded(&threaded, &mut tape_b, &mut input_b, &mut out_b).unwrap();

        assert_eq!(tape_a.as_slice(), tape_b.as_slice());
        (out_a, out_b)
    }

    #[test]
    fn threaded_matches_switch_on_hello_world() {
        let src = b"++++++++[>++++++++<-]>+.";
        let (a, b) = run_both(src, &[]);
        assert_eq!(a, b);
        assert_eq!(a, vec![65]);
    }

    #[test]
    fn threaded_matches_switch_with_stdin() {
        let (a, b) = run_both(b",.", &[0x41]);
        assert_eq!(a, b);
    }
}
