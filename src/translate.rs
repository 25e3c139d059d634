//! The optimizing translator: folds runs of identical instructions into
//! counted opcodes, matches brackets, and rewrites a small catalog of
//! idiomatic loops into higher-level opcodes with resolved jump targets.
//!
//! Restates `original_source/x86-64/optutils.cpp`'s `translate_program` and
//! `optimize_loop` in idiomatic Rust: a `Vec<usize>` bracket stack stands in
//! for `std::stack<size_t>`, and a loop rewrite truncates the `Vec<Opcode>`
//! at the open-bracket offset instead of `ops.erase(...)`.

use crate::error::{Result, TapeVmError};
use crate::ir::{Opcode, Program};

/// The eight significant source characters; any other byte is a fatal
/// `BadChar`.
fn opcode_for(c: u8) -> Option<fn(i64) -> Opcode> {
    match c {
        b'>' => Some(Opcode::IncPtr),
        b'<' => Some(Opcode::DecPtr),
        b'+' => Some(Opcode::IncData),
        b'-' => Some(Opcode::DecData),
        b',' => Some(Opcode::ReadStdin),
        b'.' => Some(Opcode::WriteStdout),
        _ => None,
    }
}

/// Translate a byte sequence containing only the eight significant source
/// characters into a well-formed IR.
pub fn translate(source: &[u8]) -> Result<Program> {
    let mut ops: Vec<Opcode> = Vec::new();
    let mut open_brackets: Vec<usize> = Vec::new();
    let mut pc = 0usize;

    while pc < source.len() {
        let instruction = source[pc];
        match instruction {
            b'[' => {
                open_brackets.push(ops.len());
                ops.push(Opcode::JumpIfDataZero(0));
                pc += 1;
            }
            b']' => {
                let open_off = open_brackets
                    .pop()
                    .ok_or(TapeVmError::UnmatchedClose { offset: pc })?;

                let rewrite = optimize_loop(&ops, open_off);
                if !rewrite.is_empty() {
                    ops.truncate(open_off);
                    ops.extend(rewrite);
                } else {
                    let close_off = ops.len();
                    ops[open_off] = Opcode::JumpIfDataZero(close_off as i64);
                    ops.push(Opcode::JumpIfDataNotZero(open_off as i64));
                }
                pc += 1;
            }
            b'>' | b'<' | b'+' | b'-' | b',' | b'.' => {
                let start = pc;
                pc += 1;
                while pc < source.len() && source[pc] == instruction {
                    pc += 1;
                }
                let count = (pc - start) as i64;
                let ctor = opcode_for(instruction).expect("checked above");
                ops.push(ctor(count));
            }
            other => {
                return Err(TapeVmError::BadChar {
                    offset: pc,
                    byte: other,
                })
            }
        }
    }

    if let Some(&offset) = open_brackets.last() {
        return Err(TapeVmError::UnmatchedOpen { offset });
    }

    Ok(Program::new(ops, source.len()))
}

/// Inspect the IR slice `ops[loop_start..]`, which begins with the
/// placeholder open-bracket produced for a `[` at `loop_start`, for one of
/// the two peephole-rewritable shapes. Returns an empty vector if no
/// rewrite applies.
fn optimize_loop(ops: &[Opcode], loop_start: usize) -> Vec<Opcode> {
    let body = &ops[loop_start..];

    if body.len() == 2 {
        match body[1] {
            Opcode::IncData(_) | Opcode::DecData(_) => return vec![Opcode::LoopSetZero],
            Opcode::IncPtr(k) => return vec![Opcode::LoopMovePtr(k)],
            Opcode::DecPtr(k) => return vec![Opcode::LoopMovePtr(-k)],
            _ => {}
        }
    } else if body.len() == 5 {
        if let (Opcode::DecData(1), Opcode::IncData(1)) = (body[1], body[3]) {
            match (body[2], body[4]) {
                (Opcode::IncPtr(k1), Opcode::DecPtr(k2)) if k1 == k2 => {
                    return vec![Opcode::LoopMoveData(k1)];
                }
                (Opcode::DecPtr(k1), Opcode::IncPtr(k2)) if k1 == k2 => {
                    return vec![Opcode::LoopMoveData(-k1)];
                }
                _ => {}
            }
        }
    }

    Vec::new()
}
