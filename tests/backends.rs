//! End-to-end scenario tests (S1-S6) run against all three back ends.
//!
//! The switch and direct-threaded interpreters take injected `Read`/`Write`
//! streams, so they're tested directly. The JIT back end calls the real
//! process stdin/stdout through its shims, so its scenarios route through
//! `with_redirected_stdio`, a small `libc::dup2`-based harness that swaps
//! file descriptors 0 and 1 for the duration of one JIT run and restores
//! them afterward.

use std::io::{Cursor, Read, Write};
use std::os::unix::io::RawFd;

use tapevm::interp::run_switch;
use tapevm::interp_threaded::{run_threaded, ThreadedProgram};
use tapevm::jit::JitProgram;
use tapevm::tape::Tape;
use tapevm::translate::translate;

struct SavedFd {
    original: RawFd,
    target: RawFd,
}

impl SavedFd {
    fn replace(target: RawFd, with: RawFd) -> Self {
        let original = unsafe { libc::dup(target) };
        assert!(original >= 0, "dup failed");
        let rc = unsafe { libc::dup2(with, target) };
        assert_eq!(rc, 0, "dup2 failed");
        SavedFd { original, target }
    }
}

impl Drop for SavedFd {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.original, self.target);
            libc::close(self.original);
        }
    }
}

/// Run `f` with stdin fed from `stdin_bytes` and stdout captured, via raw
/// fd swaps. Returns whatever stdout bytes were written during `f`.
fn with_redirected_stdio<F: FnOnce()>(stdin_bytes: &[u8], f: F) -> Vec<u8> {
    let mut in_fds = [0 as RawFd; 2];
    let mut out_fds = [0 as RawFd; 2];
    assert_eq!(unsafe { libc::pipe(in_fds.as_mut_ptr()) }, 0);
    assert_eq!(unsafe { libc::pipe(out_fds.as_mut_ptr()) }, 0);
    let [in_read, in_write] = in_fds;
    let [out_read, out_write] = out_fds;

    // Fill the stdin pipe before swapping descriptors so the writer side
    // never blocks waiting on a reader.
    {
        let mut writer = unsafe { std::fs::File::from_raw_fd(in_write) };
        writer.write_all(stdin_bytes).unwrap();
        // Dropping `writer` closes `in_write`, signaling EOF to the reader
        // once all of `stdin_bytes` has been consumed.
    }

    let saved_in = SavedFd::replace(0, in_read);
    let saved_out = SavedFd::replace(1, out_write);
    unsafe {
        libc::close(in_read);
    }

    f();

    drop(saved_in);
    drop(saved_out);
    unsafe {
        libc::close(out_write);
    }

    let mut reader = unsafe { std::fs::File::from_raw_fd(out_read) };
    let mut captured = Vec::new();
    reader.read_to_end(&mut captured).unwrap();
    captured
}

use std::os::unix::io::FromRawFd;

struct Scenario {
    name: &'static str,
    source: &'static [u8],
    stdin: &'static [u8],
    stdout: &'static [u8],
    nonzero: &'static [(usize, u8)],
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "S1",
        source: b"++>+++++[<+>-]++++++++[<++++++>-].",
        stdin: b"",
        stdout: &[0x37],
        nonzero: &[(0, 55)],
    },
    Scenario {
        name: "S2",
        source: b"+++[>+++[>+<-]<-]",
        stdin: b"",
        stdout: b"",
        nonzero: &[(2, 9)],
    },
    Scenario {
        name: "S3",
        source: b",.",
        stdin: &[0x41],
        stdout: &[0x41],
        nonzero: &[(0, 0x41)],
    },
    Scenario {
        name: "S4",
        source: b"++++++++[>++++++++<-]>+.",
        stdin: b"",
        stdout: &[0x41],
        nonzero: &[(1, 65)],
    },
    Scenario {
        name: "S5",
        source: b"++++++++++[-]+",
        stdin: b"",
        stdout: b"",
        nonzero: &[(0, 1)],
    },
    Scenario {
        name: "S6",
        source: b"+>+>+<<[>>+<<-]",
        stdin: b"",
        stdout: b"",
        nonzero: &[(1, 1), (2, 2)],
    },
];

fn assert_tape_matches(tape: &Tape, expected: &[(usize, u8)], scenario: &str) {
    let actual: Vec<(usize, u8)> = tape.nonzero_cells().collect();
    assert_eq!(actual, expected.to_vec(), "{scenario}: tape mismatch");
}

#[test]
fn switch_interpreter_matches_all_scenarios() {
    for s in SCENARIOS {
        let program = translate(s.source).unwrap();
        let mut tape = Tape::new();
        let mut input = Cursor::new(s.stdin.to_vec());
        let mut output = Vec::new();
        run_switch(&program, &mut tape, &mut input, &mut output).unwrap();
        assert_eq!(output, s.stdout.to_vec(), "{}: stdout mismatch", s.name);
        assert_tape_matches(&tape, s.nonzero, s.name);
    }
}

#[test]
fn threaded_interpreter_matches_all_scenarios() {
    for s in SCENARIOS {
        let program = translate(s.source).unwrap();
        let threaded = ThreadedProgram::compile(&program);
        let mut tape = Tape::new();
        let mut input = Cursor::new(s.stdin.to_vec());
        let mut output = Vec::new();
        run_threaded(&threaded, &mut tape, &mut input, &mut output).unwrap();
        assert_eq!(output, s.stdout.to_vec(), "{}: stdout mismatch", s.name);
        assert_tape_matches(&tape, s.nonzero, s.name);
    }
}

#[test]
fn jit_matches_all_scenarios() {
    for s in SCENARIOS {
        let program = translate(s.source).unwrap();
        let mut tape = Tape::new();
        let captured = with_redirected_stdio(s.stdin, || {
            let jit = JitProgram::compile(&program).unwrap();
            jit.run(&mut tape).unwrap();
        });
        assert_eq!(captured, s.stdout.to_vec(), "{}: stdout mismatch", s.name);
        assert_tape_matches(&tape, s.nonzero, s.name);
    }
}
