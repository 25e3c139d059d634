//! The opcode IR: the data contract shared by the translator and both back
//! ends. See the `[MODULE] Opcode IR` section of the design for the full
//! invariants a well-formed `Program` must satisfy.

use std::fmt;

/// A single IR instruction. `argument` is interpreted differently per
/// variant: an unsigned repeat count for the run-length folded ops, a
/// signed offset for the two loop-rewrite ops, and an absolute IR index for
/// the two jump ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Advance the data pointer by `n` cells (n >= 1).
    IncPtr(i64),
    /// Retreat the data pointer by `n` cells (n >= 1).
    DecPtr(i64),
    /// Add `n` modulo 256 to the current cell (n >= 1).
    IncData(i64),
    /// Subtract `n` modulo 256 from the current cell (n >= 1).
    DecData(i64),
    /// Read `n` bytes from stdin into the current cell; only the last
    /// persists.
    ReadStdin(i64),
    /// Emit the current cell `n` times to stdout.
    WriteStdout(i64),
    /// Store 0 into the current cell.
    LoopSetZero,
    /// Advance the pointer by `d` (signed) while the current cell is
    /// nonzero.
    LoopMovePtr(i64),
    /// If the current cell is nonzero, add it to the cell at offset `d`
    /// (signed) and zero the current cell.
    LoopMoveData(i64),
    /// If the current cell is zero, jump to IR index `target`.
    JumpIfDataZero(i64),
    /// If the current cell is nonzero, jump to IR index `target`.
    JumpIfDataNotZero(i64),
    /// Sentinel; must never appear in a well-formed IR.
    Invalid,
}

impl Opcode {
    /// A short, stable name for each variant, used by the verbose IR dump
    /// and in log output.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::IncPtr(_) => "INC_PTR",
            Opcode::DecPtr(_) => "DEC_PTR",
            Opcode::IncData(_) => "INC_DATA",
            Opcode::DecData(_) => "DEC_DATA",
            Opcode::ReadStdin(_) => "READ_STDIN",
            Opcode::WriteStdout(_) => "WRITE_STDOUT",
            Opcode::LoopSetZero => "LOOP_SET_TO_ZERO",
            Opcode::LoopMovePtr(_) => "LOOP_MOVE_PTR",
            Opcode::LoopMoveData(_) => "LOOP_MOVE_DATA",
            Opcode::JumpIfDataZero(_) => "JUMP_IF_DATA_ZERO",
            Opcode::JumpIfDataNotZero(_) => "JUMP_IF_DATA_NOT_ZERO",
            Opcode::Invalid => "INVALID_OP",
        }
    }

    /// The raw argument value, for dumping and for the JIT lowering tables.
    pub fn argument(&self) -> i64 {
        match *self {
            Opcode::IncPtr(n)
            | Opcode::DecPtr(n)
            | Opcode::IncData(n)
            | Opcode::DecData(n)
            | Opcode::ReadStdin(n)
            | Opcode::WriteStdout(n)
            | Opcode::LoopMovePtr(n)
            | Opcode::LoopMoveData(n)
            | Opcode::JumpIfDataZero(n)
            | Opcode::JumpIfDataNotZero(n) => n,
            Opcode::LoopSetZero | Opcode::Invalid => 0,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.argument())
    }
}

/// The ordered sequence of opcodes produced by translation. Immutable once
/// built; see [`crate::translate::translate`].
#[derive(Debug, Clone, Default)]
pub struct Program {
    ops: Vec<Opcode>,
    /// Length of the source byte sequence this was translated from, kept
    /// only for diagnostics.
    pub source_len: usize,
}

impl Program {
    pub(crate) fn new(ops: Vec<Opcode>, source_len: usize) -> Self {
        Program { ops, source_len }
    }

    pub fn ops(&self) -> &[Opcode] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Render the IR the way the reference dumps look in verbose mode:
    /// one ` [i] KIND argument` line per opcode.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, op) in self.ops.iter().enumerate() {
            out.push_str(&format!(" [{}] {} {}\n", i, op.name(), op.argument()));
        }
        out
    }
}
