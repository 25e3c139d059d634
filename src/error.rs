//! The error taxonomy shared by the translator, both interpreter back ends,
//! the JIT back end, and the host.

use thiserror::Error;

/// Every fatal condition this crate can raise. Propagation is fail-fast
/// everywhere: none of these have a recovery path, matching the reference
/// semantics this crate implements.
#[derive(Debug, Error)]
pub enum TapeVmError {
    /// The translator encountered a byte outside the eight significant
    /// source characters.
    #[error("bad character {byte:#04x} at source offset {offset}")]
    BadChar { offset: usize, byte: u8 },

    /// End-of-input reached with open brackets still pending.
    #[error("unmatched '[' opened at offset {offset}")]
    UnmatchedOpen { offset: usize },

    /// A `]` was encountered with no matching `[`.
    #[error("unmatched ']' at offset {offset}")]
    UnmatchedClose { offset: usize },

    /// The machine-code encoder rejected an instruction it was asked to
    /// emit. Should be unreachable for the lowering schema this crate uses.
    #[error("JIT encoding error: {0}")]
    JitEncodeError(String),

    /// The runtime failed to obtain executable memory or bind the entry
    /// point.
    #[error("JIT bind error: {0}")]
    JitBindError(String),

    /// The source file (or other host I/O) could not be opened or read.
    #[error("host I/O error: {0}")]
    HostIoError(#[from] std::io::Error),

    /// An `Opcode::Invalid` sentinel was encountered during execution --
    /// indicates a translator bug, never a user error.
    #[error("invalid opcode encountered at pc={pc}")]
    InvalidOp { pc: usize },

    /// Only raised when the `checked` feature is enabled: the data pointer
    /// moved outside `[0, 30000)`.
    #[error("data pointer {0} out of tape range")]
    OutOfRange(i64),
}

pub type Result<T> = std::result::Result<T, TapeVmError>;
