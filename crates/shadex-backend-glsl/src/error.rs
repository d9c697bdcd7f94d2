use shadex_analysis::AnalysisError;
use shadex_backend_core::BackendError;
use shadex_ir::IrError;

use crate::extensions::Trigger;
use crate::layout::{LayoutError, PackingStandard};

/// Errors produced while generating GLSL.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The module needs a feature the target dialect cannot provide.
    #[error("{trigger} not supported: {reason}")]
    UnsupportedFeature { trigger: Trigger, reason: String },

    /// No packing standard reproduces the block's declared offsets.
    #[error(
        "buffer block `{block}` cannot be expressed as std430, std140 or scalar, even with \
         enhanced layouts (member {member}{} does not follow {standard})",
        .member_name.as_ref().map(|name| format!(" `{name}`")).unwrap_or_default()
    )]
    LayoutInexpressible {
        block: String,
        member: usize,
        member_name: Option<String>,
        standard: PackingStandard,
    },

    /// The pass loop stopped making progress without converging.
    #[error("code generation did not converge after {passes} passes")]
    NonTermination { passes: u32 },

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The IR uses a construct this backend cannot spell in GLSL.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error("formatting failed")]
    Fmt(#[from] std::fmt::Error),
}

impl From<Error> for BackendError {
    fn from(err: Error) -> Self {
        match err {
            Error::UnsupportedFeature { .. }
            | Error::LayoutInexpressible { .. }
            | Error::Unsupported(_) => BackendError::Unsupported(err.to_string()),
            other => BackendError::Other(other.to_string()),
        }
    }
}
