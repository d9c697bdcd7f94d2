//! WGSL parser for shadex.
//!
//! Parses WGSL source text into a [`shadex_ir::Module`] by using
//! [naga](https://crates.io/crates/naga)'s WGSL frontend and then
//! lowering the resulting `naga::Module` to shadex IR.
//!
//! Entry point arguments and results become `Input` and `Output` global
//! variables, since shadex entry points take no parameters. Overrides
//! become specialization constants.

mod lower;

/// Parse WGSL source into a shadex IR module.
///
/// Vertex, fragment and compute entry points are kept. Images,
/// samplers and ray queries are rejected.
pub fn parse(source: &str) -> Result<shadex_ir::Module, ParseError> {
    let naga_module = naga::front::wgsl::parse_str(source)?;
    lower::lower_module(&naga_module)
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Wgsl(#[from] naga::front::wgsl::ParseError),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("lowering: {0}")]
    Lowering(String),
}

impl ParseError {
    /// Renders the error against `source`, with spans for WGSL errors.
    pub fn emit_to_string(&self, source: &str) -> String {
        match self {
            Self::Wgsl(err) => err.emit_to_string(source),
            other => other.to_string(),
        }
    }
}
