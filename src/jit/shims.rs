//! `extern "C"` trampolines the JIT calls directly by address, replacing
//! `myputchar`/`mygetchar` in `original_source/optasmjit.cpp` (there,
//! indirected through because libc's `putchar`/`getchar` can be macros and
//! aren't reliably addressable). `#[inline(never)]` keeps these at a stable
//! address so `&(putchar_shim as extern "C" fn(u8))` survives optimization.
//!
//! EOF on [`getchar_shim`] returns 0, matching `interp::read_one`'s
//! resolution of Open Question (a).

use std::io::{Read, Write};

/// Write one byte to stdout. Called by JITed code with the current cell's
/// value in `dil`.
#[inline(never)]
pub extern "C" fn putchar_shim(byte: u8) {
    let _ = std::io::stdout().write_all(&[byte]);
}

/// Read one byte from stdin, or 0 on EOF. JITed code stores the return
/// value (in `al`) into the current cell.
#[inline(never)]
pub extern "C" fn getchar_shim() -> u8 {
    let mut buf = [0u8; 1];
    match std::io::stdin().read(&mut buf) {
        Ok(0) | Err(_) => 0,
        Ok(_) => buf[0],
    }
}
