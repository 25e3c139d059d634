//! `tapevm`: an optimizing translator, two interpreter back ends, and an
//! x86-64 JIT for a minimal eight-instruction tape-automaton language.
//!
//! The pipeline is always: [`source::read_program`] (strip non-instruction
//! bytes) -> [`translate::translate`] (fold runs, match brackets, rewrite
//! idiomatic loops) -> one of [`interp::run_switch`],
//! [`interp_threaded::run_threaded`], or [`jit::JitProgram`].

pub mod error;
pub mod host;
pub mod interp;
pub mod interp_threaded;
pub mod ir;
pub mod jit;
pub mod source;
pub mod tape;
pub mod translate;
