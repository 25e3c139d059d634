//! Source reader: strips anything that isn't one of the eight significant
//! characters before it reaches [`crate::translate::translate`], matching
//! the reference's "everything else is a comment" convention (every byte
//! that the grammar doesn't recognize is simply not a program character;
//! only the translator treats bytes outside that set as fatal -- this
//! module is for the literal brainfuck dialect convention of reading a file
//! byte-for-byte, not for scrubbing genuinely invalid input).

use std::fs;
use std::path::Path;

use crate::error::Result;

const SIGNIFICANT: &[u8] = b"><+-.,[]";

/// Read `path` and discard every byte that is not one of `><+-.,[]`.
pub fn read_program(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path)?;
    Ok(strip_comments(&raw))
}

/// Discard every byte in `raw` that isn't one of the eight significant
/// source characters.
pub fn strip_comments(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .copied()
        .filter(|b| SIGNIFICANT.contains(b))
        .collect()
}
