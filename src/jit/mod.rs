//! The x86-64 JIT back end: lowers the optimized IR directly to machine
//! code instead of interpreting it.
//!
//! Unlike the two interpreter realizations, JITed code does not take
//! injected `Read`/`Write` streams -- it calls [`shims::putchar_shim`] and
//! [`shims::getchar_shim`] directly against the process's real stdin/stdout,
//! matching `original_source/optasmjit.cpp`'s `myputchar`/`mygetchar`
//! (themselves unconditional `putchar`/`getchar` wrappers).

pub mod code_buffer;
pub mod encoder;
pub mod shims;

use crate::error::{Result, TapeVmError};
use crate::ir::{Opcode, Program};
use crate::tape::Tape;

use code_buffer::CodeBuffer;
use encoder::{Encoder, Label};

/// A compiled, mapped, ready-to-run program. Dropping this unmaps its code.
pub struct JitProgram {
    code: CodeBuffer,
}

impl JitProgram {
    /// Lower `program` to x86-64 machine code and map it executable.
    ///
    /// Every jump pair in the IR (`JumpIfDataZero`/`JumpIfDataNotZero`) is
    /// re-established here via its own `(open, close)` label pair rather
    /// than trusting the IR's already-resolved integer targets directly --
    /// the bracket stack below exists purely to validate that the IR's
    /// targets still pair up the way the translator produced them; the
    /// labels, not the integers, drive the emitted branches.
    pub fn compile(program: &Program) -> Result<Self> {
        let (jit, _bytes) = Self::compile_traced(program)?;
        Ok(jit)
    }

    /// Like [`JitProgram::compile`], but also returns the raw machine code
    /// bytes before they're mapped, for the verbose dump's `/tmp/bjout.bin`
    /// (matching `optasmjit.cpp`'s own raw code dump in `-v` mode).
    pub fn compile_traced(program: &Program) -> Result<(Self, Vec<u8>)> {
        let ops = program.ops();
        // A rough estimate: the largest single lowering (LoopMoveData) is
        // under 40 bytes; overallocating is cheap and avoids reallocation
        // during encoding.
        let mut enc = Encoder::with_capacity(ops.len() * 16 + 16);
        let mut bracket_stack: Vec<(usize, Label, Label)> = Vec::new();

        enc.prologue();

        for (i, op) in ops.iter().enumerate() {
            match *op {
                Opcode::IncPtr(n) => enc.inc_ptr(n)?,
                Opcode::DecPtr(n) => enc.dec_ptr(n)?,
                Opcode::IncData(n) => enc.inc_data(n),
                Opcode::DecData(n) => enc.dec_data(n),
                Opcode::WriteStdout(n) => {
                    enc.write_stdout(n, shims::putchar_shim as usize as u64)
                }
                Opcode::ReadStdin(n) => {
                    enc.read_stdin(n, shims::getchar_shim as usize as u64)
                }
                Opcode::LoopSetZero => enc.loop_set_zero(),
                Opcode::LoopMovePtr(d) => enc.loop_move_ptr(d)?,
                Opcode::LoopMoveData(d) => enc.loop_move_data(d)?,
                Opcode::JumpIfDataZero(_target) => {
                    let open_label = enc.new_label();
                    let close_label = enc.new_label();
                    bracket_stack.push((i, open_label, close_label));
                    enc.jump_if_zero(open_label, close_label);
                }
                Opcode::JumpIfDataNotZero(target) => {
                    let (expected_open_idx, open_label, close_label) =
                        bracket_stack.pop().ok_or_else(|| {
                            TapeVmError::JitEncodeError(format!(
                                "unmatched JumpIfDataNotZero at ir index {i}"
                            ))
                        })?;
                    if target as usize != expected_open_idx {
                        return Err(TapeVmError::JitEncodeError(format!(
                            "bracket target mismatch at ir index {i}: expected {expected_open_idx}, got {target}"
                        )));
                    }
                    enc.jump_if_not_zero(open_label, close_label);
                }
                Opcode::Invalid => {
                    return Err(TapeVmError::JitEncodeError(format!(
                        "invalid opcode at ir index {i}"
                    )))
                }
            }
        }

        if !bracket_stack.is_empty() {
            return Err(TapeVmError::JitEncodeError(
                "unresolved bracket labels at end of program".into(),
            ));
        }

        enc.epilogue();
        let bytes = enc.finish()?;
        let code = CodeBuffer::new(&bytes)?;
        Ok((JitProgram { code }, bytes))
    }

    /// Run the compiled program against `tape`, writing/reading the
    /// process's real stdout/stdin through the shims baked into the code.
    pub fn run(&self, tape: &mut Tape) -> Result<()> {
        let entry = self.code.entry_point();
        // SAFETY: `entry` was compiled from a well-formed `Program` by
        // `compile`, which only emits `r13`-relative accesses within
        // `[0, TAPE_SIZE)` for in-range IR, and `tape` is exactly
        // `TAPE_SIZE` bytes.
        unsafe {
            entry(tape.as_mut_ptr());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::translate;

    #[test]
    fn compiles_straight_line_program() {
        let program = translate(b"+++").unwrap();
        let jit = JitProgram::compile(&program).unwrap();
        let mut tape = Tape::new();
        jit.run(&mut tape).unwrap();
        assert_eq!(tape.get(0).unwrap(), 3);
    }

    #[test]
    fn compiles_set_zero_loop() {
        let program = translate(b"+++++[-]").unwrap();
        let jit = JitProgram::compile(&program).unwrap();
        let mut tape = Tape::new();
        jit.run(&mut tape).unwrap();
        assert_eq!(tape.get(0).unwrap(), 0);
    }

    #[test]
    fn compiles_move_data_loop() {
        let program = translate(b"+++[->>+<<]").unwrap();
        let jit = JitProgram::compile(&program).unwrap();
        let mut tape = Tape::new();
        jit.run(&mut tape).unwrap();
        assert_eq!(tape.get(0).unwrap(), 0);
        assert_eq!(tape.get(2).unwrap(), 3);
    }

    #[test]
    fn compiles_generic_bracket_pair() {
        // `[>.<]` isn't one of the peephole shapes, so it stays a real
        // jump pair; a zero starting cell means the loop body never runs.
        let program = translate(b"[>.<]").unwrap();
        let jit = JitProgram::compile(&program).unwrap();
        let mut tape = Tape::new();
        jit.run(&mut tape).unwrap();
        assert_eq!(tape.get(0).unwrap(), 0);
        assert_eq!(tape.get(1).unwrap(), 0);
    }
}
