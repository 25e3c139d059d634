//! W^X executable memory management for JITed code.
//!
//! Grounded in `other_examples/b2643d1d_danthedaniel-BF-JIT__src-runnable-jit_target.rs.rs`'s
//! `make_executable` (allocate writable, copy, `mprotect` to
//! read+execute) and in `rizqme-raya`'s `jit/runtime/code_cache.rs` typed
//! fields (`code_ptr`/`code_size`) for the RAII shape: the mapping is
//! mapped writable, filled with the encoded bytes, flipped to
//! read+execute, and unmapped on `Drop`. We use `libc::mmap`/`mprotect`
//! directly rather than `posix_memalign` since an anonymous mapping is
//! already page-aligned.

use std::ffi::c_void;
use std::ptr;

use crate::error::{Result, TapeVmError};

/// An executable mapping holding one compiled program's machine code. The
/// mapping is unmapped when this value is dropped; it must outlive every
/// call made through [`CodeBuffer::entry_point`].
pub struct CodeBuffer {
    ptr: *mut c_void,
    len: usize,
}

/// The JITed program's entry signature: takes the tape's base address and
/// returns nothing. Matches the `prologue`'s `mov r13, rdi`.
pub type EntryFn = unsafe extern "C" fn(*mut u8);

impl CodeBuffer {
    /// Map `code.len()` bytes of anonymous memory, copy `code` into it, and
    /// flip the mapping from writable to executable. `code` must already be
    /// fully resolved machine code (all [`super::encoder::Encoder`] fixups
    /// applied).
    pub fn new(code: &[u8]) -> Result<Self> {
        if code.is_empty() {
            return Err(TapeVmError::JitBindError("empty code buffer".into()));
        }

        let len = code.len();
        // SAFETY: a fixed-size anonymous private mapping with no file
        // backing; the result is checked against MAP_FAILED below.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(TapeVmError::JitBindError(
                "mmap failed to allocate executable page".into(),
            ));
        }

        // SAFETY: `ptr` is a fresh writable mapping of at least `len` bytes.
        unsafe {
            ptr::copy_nonoverlapping(code.as_ptr(), ptr as *mut u8, len);
        }

        // SAFETY: `ptr`/`len` describe exactly the mapping just created.
        let rc = unsafe { libc::mprotect(ptr, len, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            unsafe {
                libc::munmap(ptr, len);
            }
            return Err(TapeVmError::JitBindError(
                "mprotect failed to mark code executable".into(),
            ));
        }

        Ok(CodeBuffer { ptr, len })
    }

    /// The mapping's entry point, callable as `fn(*mut u8)`. The caller must
    /// pass a pointer to a tape of at least [`crate::tape::TAPE_SIZE`] bytes.
    pub fn entry_point(&self) -> EntryFn {
        // SAFETY: `self.ptr` holds PROT_READ|PROT_EXEC machine code whose
        // first byte is the compiled program's prologue.
        unsafe { std::mem::transmute::<*mut c_void, EntryFn>(self.ptr) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        // SAFETY: `self.ptr`/`self.len` describe exactly the mapping `new`
        // created, and no other reference to it can outlive this value.
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}

// The mapping's only readers are threads that call `entry_point()` and run
// the code themselves; nothing here is `!Send`/`!Sync` by accident, but we
// don't claim either since the JITed code mutates the tape through a raw
// pointer handed in by the caller, not through `CodeBuffer` itself.
