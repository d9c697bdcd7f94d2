//! Error types for the shadex IR.

/// Errors raised by IR lookups.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("{kind} handle {index} out of bounds (arena size: {len})")]
    BadHandle {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// No entry point carries the requested name.
    #[error("no entry point named `{0}`")]
    MissingEntryPoint(String),

    /// A constant was expected to hold a scalar integer.
    #[error("constant {0} is not a scalar integer")]
    NotAnInteger(usize),
}
