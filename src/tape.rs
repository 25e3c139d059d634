//! The 30,000-cell data tape shared by both interpreter back ends.
//!
//! The JIT back end does not use this type: JITed code addresses the tape
//! directly through a raw pointer handed to it in `rdi`/`r13` (see
//! `jit::code_buffer`). `Tape` exists for the two interpreter realizations
//! and for seeding/inspecting a tape from host code and tests.

use crate::error::Result;
#[cfg(feature = "checked")]
use crate::error::TapeVmError;

pub const TAPE_SIZE: usize = 30_000;

/// A contiguous, zero-initialized array of 30,000 unsigned 8-bit cells.
pub struct Tape {
    cells: Box<[u8; TAPE_SIZE]>,
}

impl Default for Tape {
    fn default() -> Self {
        Tape {
            cells: Box::new([0u8; TAPE_SIZE]),
        }
    }
}

impl Tape {
    pub fn new() -> Self {
        Tape::default()
    }

    /// Read the cell at `p`. Bounds-checked only when the `checked` feature
    /// is enabled; otherwise an out-of-range `p` is undefined behavior for
    /// parity with the reference semantics (spec.md "Tape bounds").
    #[inline]
    pub fn get(&self, p: i64) -> Result<u8> {
        #[cfg(feature = "checked")]
        {
            if p < 0 || p as usize >= TAPE_SIZE {
                return Err(TapeVmError::OutOfRange(p));
            }
        }
        Ok(self.cells[p as usize])
    }

    /// Write `value` into the cell at `p`. See [`Tape::get`] for the
    /// checked/unchecked distinction.
    #[inline]
    pub fn set(&mut self, p: i64, value: u8) -> Result<()> {
        #[cfg(feature = "checked")]
        {
            if p < 0 || p as usize >= TAPE_SIZE {
                return Err(TapeVmError::OutOfRange(p));
            }
        }
        self.cells[p as usize] = value;
        Ok(())
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr()
    }

    /// Iterate `(index, value)` pairs for every nonzero cell, in the order
    /// the reference's verbose dump uses.
    pub fn nonzero_cells(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(|(i, &v)| (i, v))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.cells[..]
    }
}
