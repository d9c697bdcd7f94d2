//! GLSL backend for shadex.
//!
//! Generates GLSL source for one entry point of a shadex IR module. The
//! backend writes the whole program in passes: whatever a pass discovers
//! late (an extension, a helper function, a temporary that must exist)
//! is recorded and the program is written again, until a pass asks for
//! nothing new. See [`driver`] for the loop and [`layout`] for how
//! buffer blocks get their packing standard.

mod builtin;
mod driver;
mod error;
mod expr;
pub mod extensions;
mod ids;
pub mod layout;
mod names;
mod options;
mod polyfill;
mod state;
mod stmt;
mod types;
mod writer;

use shadex_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, Diagnostic,
};
use shadex_ir::Module;

pub use driver::{Compiled, compile, compile_with_report};
pub use error::Error;
pub use extensions::{SubgroupFeature, Trigger};
pub use layout::{BlockLayout, BufferKind, PackingStandard};
pub use options::Options;

/// GLSL backend for the [`shadex_backend_core::BackendRegistry`].
#[derive(Clone, Debug, Default)]
pub struct GlslBackend {
    pub options: Options,
}

impl GlslBackend {
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

impl Backend for GlslBackend {
    fn name(&self) -> &str {
        "GLSL"
    }

    fn targets(&self) -> &[&str] {
        &["glsl"]
    }

    fn compile(
        &self,
        module: &Module,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let mut options = self.options.clone();
        if opts.entry_point.is_some() {
            options.entry_point = opts.entry_point.clone();
        }
        let entry_point = options.validate(module)?;
        let compiled = compile_with_report(module, &options)?;

        let ep = &module.entry_points[entry_point];
        let mut output = BackendOutput::single(
            format!("{}.{}.glsl", ep.name, ep.stage.file_extension()),
            compiled.source,
        );
        output.diagnostics.push(Diagnostic::info(format!(
            "entry point '{}': converged after {} pass(es)",
            ep.name, compiled.passes
        )));
        for (block, layout) in &compiled.blocks {
            output.diagnostics.push(if layout.standard.has_flexible_offset() {
                Diagnostic::warning(format!(
                    "block `{block}` uses {}; its offsets match no standard layout",
                    layout.standard
                ))
            } else {
                Diagnostic::info(format!("block `{block}` uses {}", layout.standard))
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{EntryPoint, Function, ShaderStage};

    fn compute_module() -> Module {
        let mut module = Module::default();
        module.entry_points.push(EntryPoint {
            name: "cs_main".into(),
            stage: ShaderStage::Compute,
            modes: vec![],
            function: Function::new("cs_main"),
        });
        module
    }

    #[test]
    fn backend_metadata() {
        let backend = GlslBackend::default();
        assert_eq!(backend.name(), "GLSL");
        assert_eq!(backend.targets(), &["glsl"]);
    }

    #[test]
    fn output_file_is_named_after_the_entry_point() {
        let output = GlslBackend::default()
            .compile(&compute_module(), &BackendOptions::default())
            .unwrap();
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, "cs_main.comp.glsl");
        assert!(output.files[0].text.starts_with("#version 450\n"));
        assert!(output.diagnostics[0].message.contains("converged after 1 pass"));
    }

    #[test]
    fn unknown_entry_point_is_an_error() {
        let opts = BackendOptions {
            entry_point: Some("missing".into()),
            ..BackendOptions::default()
        };
        let err = GlslBackend::default()
            .compile(&compute_module(), &opts)
            .unwrap_err();
        assert!(matches!(err, BackendError::Other(_)));
    }
}
