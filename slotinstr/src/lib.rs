//! Instruction traces for constructor-like routines.
//!
//! This crate is the accessor side of slot inference: it defines a small,
//! closed set of stack-machine operations ([`instr::Instr`]), the
//! [`routine::Routine`] container that owns an ordered trace, and the
//! [`routine::InstructionTrace`] trait through which a host runtime exposes a
//! decoded instruction stream. With the `chumsky` feature (default) routines
//! can also be written as textual listings, see [`parser`].
pub mod instr;
#[cfg(feature = "chumsky")]
pub mod parser;
pub mod routine;
pub mod utils;
