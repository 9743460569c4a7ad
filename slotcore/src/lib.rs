//! Fixed-layout inference for types built from constructor traces.
//!
//! A type that opts in through one of the built-in base markers gets its
//! instance layout computed from the attribute names its constructor assigns
//! onto the instance parameter. The pieces, bottom-up:
//!
//! - [`scanner`] walks an instruction trace and collects the assigned names.
//! - [`layout`] merges them with whatever the author pre-declared.
//! - [`hierarchy`] answers the questions that depend on ancestors, and keeps a
//!   single dynamic store per chain.
//! - [`registry`] is the construction hook tying everything together; it is
//!   the entry point most embedders need, along with [`instance::Instance`].

pub mod hierarchy;
pub mod instance;
pub mod layout;
pub mod namespace;
pub mod registry;
pub mod scanner;
#[cfg(any(test, feature = "test-utils"))]
pub mod tests_utils;
pub mod utils;
