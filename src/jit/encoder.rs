//! A small hand-rolled x86-64 System V encoder for the twelve-opcode IR.
//!
//! Grounded in `other_examples/6562e13f_n9v9-brainfuck__src-jit.rs.rs`'s
//! `MachineCode`: a private `Vec<u8>` buffer with one `emit_*` method per
//! lowering rule, raw opcode bytes written as array literals with a
//! disassembly comment above each. This encoder differs from that grounding
//! file in using `r13` as the data pointer and `call`-through-shims for I/O
//! (per spec.md's register/ABI conventions) instead of `r12` and raw
//! syscalls; the actual byte sequences restate
//! `original_source/optasmjit.cpp`'s asmjit lowering one instruction at a
//! time.

use crate::error::{Result, TapeVmError};

/// An as-yet-unbound branch target. Handed out by [`Encoder::new_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

enum LabelState {
    Unbound,
    Bound(usize),
}

/// A forward reference to a label: the offset of a 4-byte rel32 slot that
/// must be patched once the label is bound, plus the offset of the
/// instruction immediately following the slot (rel32 is relative to that
/// address).
struct Fixup {
    label: Label,
    slot_offset: usize,
    next_insn_offset: usize,
}

/// Emits x86-64 machine code into a growable buffer and resolves
/// forward/backward branches via label fixups -- the Rust restatement of
/// `asmjit::Label`/`BracketLabels` in `optasmjit.cpp` (Design Note 1).
pub struct Encoder {
    buf: Vec<u8>,
    labels: Vec<LabelState>,
    fixups: Vec<Fixup>,
}

impl Encoder {
    pub fn with_capacity(cap: usize) -> Self {
        Encoder {
            buf: Vec::with_capacity(cap),
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::Unbound);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current end of the buffer. Any fixups already
    /// recorded for this label are resolved immediately since all branches
    /// this encoder emits are near (32-bit displacement).
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = LabelState::Bound(self.buf.len());
    }

    fn emit(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn displacement_to(&self, label: Label, next_insn_offset: usize) -> Option<i32> {
        match self.labels[label.0] {
            LabelState::Bound(target) => Some((target as i64 - next_insn_offset as i64) as i32),
            LabelState::Unbound => None,
        }
    }

    /// Emit a 4-byte rel32 branch operand for `label`, recording a fixup if
    /// the label isn't bound yet.
    fn emit_rel32(&mut self, label: Label) {
        let slot_offset = self.buf.len();
        let next_insn_offset = slot_offset + 4;
        match self.displacement_to(label, next_insn_offset) {
            Some(disp) => self.emit(&disp.to_le_bytes()),
            None => {
                self.emit(&[0, 0, 0, 0]);
                self.fixups.push(Fixup {
                    label,
                    slot_offset,
                    next_insn_offset,
                });
            }
        }
    }

    /// Resolve every fixup recorded against now-bound labels. Must be
    /// called after all labels used by the program have been bound.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        for fixup in &self.fixups {
            let disp = match self.labels[fixup.label.0] {
                LabelState::Bound(target) => {
                    (target as i64 - fixup.next_insn_offset as i64) as i32
                }
                LabelState::Unbound => {
                    return Err(TapeVmError::JitEncodeError(
                        "label referenced but never bound".into(),
                    ))
                }
            };
            self.buf[fixup.slot_offset..fixup.slot_offset + 4]
                .copy_from_slice(&disp.to_le_bytes());
        }
        Ok(self.buf)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    // ---- Prologue / epilogue ----

    /// `mov r13, rdi`
    pub fn prologue(&mut self) {
        self.emit(&[0x49, 0x89, 0xfd]);
    }

    /// `ret`
    pub fn epilogue(&mut self) {
        self.emit(&[0xc3]);
    }

    // ---- Pointer / data arithmetic ----

    /// `add r13, n`
    pub fn inc_ptr(&mut self, n: i64) -> Result<()> {
        let imm = i32::try_from(n)
            .map_err(|_| TapeVmError::JitEncodeError(format!("IncPtr count {n} too large")))?;
        self.emit(&[0x49, 0x81, 0xc5]);
        self.emit(&imm.to_le_bytes());
        Ok(())
    }

    /// `sub r13, n`
    pub fn dec_ptr(&mut self, n: i64) -> Result<()> {
        let imm = i32::try_from(n)
            .map_err(|_| TapeVmError::JitEncodeError(format!("DecPtr count {n} too large")))?;
        self.emit(&[0x49, 0x81, 0xed]);
        self.emit(&imm.to_le_bytes());
        Ok(())
    }

    /// `addb n, (r13)` -- `n` is reduced modulo 256 to match the
    /// interpreter's wrapping semantics.
    pub fn inc_data(&mut self, n: i64) {
        self.emit(&[0x41, 0x80, 0x45, 0x00, n.rem_euclid(256) as u8]);
    }

    /// `subb n, (r13)`
    pub fn dec_data(&mut self, n: i64) {
        self.emit(&[0x41, 0x80, 0x6d, 0x00, n.rem_euclid(256) as u8]);
    }

    /// `cmpb $0, (r13)`
    fn cmp_zero(&mut self) {
        self.emit(&[0x41, 0x80, 0x7d, 0x00, 0x00]);
    }

    /// `movb $0, (r13)`
    fn store_zero(&mut self) {
        self.emit(&[0x41, 0xc6, 0x45, 0x00, 0x00]);
    }

    // ---- I/O shims ----

    /// `movzbq (r13), %rdi; mov r11, shim; call r11`, `n` times.
    pub fn write_stdout(&mut self, n: i64, shim_addr: u64) {
        for _ in 0..n {
            // movzx rdi, byte ptr [r13]
            self.emit(&[0x49, 0x0f, 0xb6, 0x7d, 0x00]);
            self.call_shim(shim_addr);
        }
    }

    /// `call r11; movb %al, (r13)`, `n` times. Only the last read persists
    /// (matches `READ_STDIN(n)`'s "only the last byte" rule).
    pub fn read_stdin(&mut self, n: i64, shim_addr: u64) {
        for _ in 0..n {
            self.call_shim(shim_addr);
            // mov byte ptr [r13], al
            self.emit(&[0x41, 0x88, 0x45, 0x00]);
        }
    }

    /// `mov r11, shim_addr; call r11`
    fn call_shim(&mut self, shim_addr: u64) {
        // mov r11, imm64
        self.emit(&[0x49, 0xbb]);
        self.emit(&shim_addr.to_le_bytes());
        // call r11
        self.emit(&[0x41, 0xff, 0xd3]);
    }

    // ---- Loop rewrites ----

    pub fn loop_set_zero(&mut self) {
        self.store_zero();
    }

    /// ```text
    /// loop:
    ///   cmpb $0, (r13)
    ///   jz endloop
    ///   add/sub |d|, r13
    ///   jmp loop
    /// endloop:
    /// ```
    pub fn loop_move_ptr(&mut self, d: i64) -> Result<()> {
        let loop_lbl = self.new_label();
        let end_lbl = self.new_label();
        self.bind(loop_lbl);
        self.cmp_zero();
        // jz rel32
        self.emit(&[0x0f, 0x84]);
        self.emit_rel32(end_lbl);
        if d < 0 {
            self.dec_ptr(-d)?;
        } else {
            self.inc_ptr(d)?;
        }
        // jmp rel32
        self.emit(&[0xe9]);
        self.emit_rel32(loop_lbl);
        self.bind(end_lbl);
        Ok(())
    }

    /// ```text
    ///   cmpb $0, (r13)
    ///   jz skip
    ///   mov r14, r13
    ///   add/sub |d|, r14
    ///   movzx eax, byte ptr (r13)
    ///   addb al, (r14)
    ///   movb $0, (r13)
    /// skip:
    /// ```
    pub fn loop_move_data(&mut self, d: i64) -> Result<()> {
        let skip_lbl = self.new_label();
        self.cmp_zero();
        self.emit(&[0x0f, 0x84]);
        self.emit_rel32(skip_lbl);

        // mov r14, r13
        self.emit(&[0x4d, 0x89, 0xee]);
        let imm = i32::try_from(d.abs())
            .map_err(|_| TapeVmError::JitEncodeError(format!("LoopMoveData offset {d} too large")))?;
        if d < 0 {
            // sub r14, imm32
            self.emit(&[0x49, 0x81, 0xee]);
        } else {
            // add r14, imm32
            self.emit(&[0x49, 0x81, 0xc6]);
        }
        self.emit(&imm.to_le_bytes());

        // movzx eax, byte ptr [r13]
        self.emit(&[0x41, 0x0f, 0xb6, 0x45, 0x00]);
        // add byte ptr [r14], al
        self.emit(&[0x41, 0x00, 0x46, 0x00]);
        self.store_zero();

        self.bind(skip_lbl);
        Ok(())
    }

    // ---- Bracket pair ----

    /// `cmpb $0, (r13); jz close_label`, binds `open_label` here and
    /// returns it so the caller can hold it on its own bracket stack.
    pub fn jump_if_zero(&mut self, open_label: Label, close_label: Label) {
        self.cmp_zero();
        self.emit(&[0x0f, 0x84]);
        self.emit_rel32(close_label);
        self.bind(open_label);
    }

    /// `cmpb $0, (r13); jnz open_label`, binds `close_label` here.
    pub fn jump_if_not_zero(&mut self, open_label: Label, close_label: Label) {
        self.cmp_zero();
        self.emit(&[0x0f, 0x85]);
        self.emit_rel32(open_label);
        self.bind(close_label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prologue_epilogue_bytes() {
        let mut e = Encoder::with_capacity(16);
        e.prologue();
        e.epilogue();
        assert_eq!(e.finish().unwrap(), vec![0x49, 0x89, 0xfd, 0xc3]);
    }

    #[test]
    fn inc_ptr_encodes_add_r13_imm32() {
        let mut e = Encoder::with_capacity(16);
        e.inc_ptr(10).unwrap();
        assert_eq!(
            e.finish().unwrap(),
            vec![0x49, 0x81, 0xc5, 0x0a, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn inc_data_reduces_modulo_256() {
        let mut e = Encoder::with_capacity(16);
        e.inc_data(300);
        // 300 % 256 == 44 == 0x2c
        assert_eq!(e.finish().unwrap(), vec![0x41, 0x80, 0x45, 0x00, 0x2c]);
    }

    #[test]
    fn forward_jump_is_backpatched() {
        let mut e = Encoder::with_capacity(32);
        let open = e.new_label();
        let close = e.new_label();
        e.jump_if_zero(open, close);
        e.inc_data(1);
        e.jump_if_not_zero(open, close);
        let bytes = e.finish().unwrap();
        // Layout: cmp(5)+jz(2)+rel32(4) = 11 bytes for the open jump (open
        // label bound at offset 11), then inc_data (5 bytes, offset 16),
        // then the close jump's cmp(5)+jnz(2)+rel32(4). The jz's rel32 sits
        // at offset 7..11 and must point at the close label's bind site
        // (offset 27, right after the close jump): disp = 27 - 11 = 16.
        let rel = i32::from_le_bytes(bytes[7..11].try_into().unwrap());
        assert_eq!(rel, 16);
    }
}
