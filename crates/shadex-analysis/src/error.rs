//! Errors raised while analysing a module.

use shadex_ir::IrError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// GLSL has no recursion; a cycle in the call graph cannot be emitted.
    #[error("function `{0}` is recursive")]
    Recursion(String),

    /// An expression's type could not be determined.
    #[error("cannot resolve the type of expression {expr} in `{function}`: {reason}")]
    Typify {
        function: String,
        expr: usize,
        reason: String,
    },

    #[error(transparent)]
    Ir(#[from] IrError),
}
