use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

/// A single diagnostic emitted while parsing a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseDiagnostic {
    pub message: String,
    /// Byte offsets into the parsed source.
    pub start: usize,
    pub end: usize,
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}: {}", self.start, self.end, self.message)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// Two parameters of the same routine share a name.
    #[error("Routine `{routine}` declares parameter `{parameter}` more than once.")]
    DuplicateParameter { routine: String, parameter: String },

    /// A branch points past the end of the trace.
    #[error(
        "Instruction {index} of routine `{routine}` jumps to {target}, but the routine only has {len} instructions."
    )]
    BranchOutOfRange {
        routine: String,
        index: usize,
        target: u32,
        len: usize,
    },

    /// A closure refers to a nested routine that does not exist.
    #[error(
        "Instruction {index} of routine `{routine}` builds a closure over nested routine #{nested}, but only {count} are defined."
    )]
    UndefinedNestedRoutine {
        routine: String,
        index: usize,
        nested: u32,
        count: usize,
    },

    /// A captured load or store names a binding that is neither a cell nor a
    /// free variable of the routine.
    #[error(
        "Instruction {index} of routine `{routine}` accesses `{binding}` as a captured binding, but it is neither a cell nor a free variable."
    )]
    UndeclaredCapture {
        routine: String,
        index: usize,
        binding: String,
    },

    /// The listing could not be parsed.
    #[error(
        "Failed to parse listing ({} error(s)): {}",
        .errors.len(),
        .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
    )]
    ParserErrors { errors: Vec<ParseDiagnostic> },
}
