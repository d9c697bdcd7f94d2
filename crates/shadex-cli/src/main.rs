use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use shadex_backend_core::{BackendOptions, BackendRegistry, OutputFile};
use shadex_backend_glsl::{GlslBackend, Options};

/// shadex: WGSL to GLSL compiler
#[derive(Debug, Parser)]
#[command(about, disable_version_flag = true)]
struct Cli {
    /// Input WGSL file
    input: PathBuf,

    /// Output path (default: stdout). A directory when several entry
    /// points are compiled.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target backend
    #[arg(short, long, default_value = "glsl")]
    target: String,

    /// GLSL version (default: 450, or 310 with --es)
    #[arg(long)]
    version: Option<u32>,

    /// Target OpenGL ES
    #[arg(long)]
    es: bool,

    /// Emit GLSL for Vulkan (GL_KHR_vulkan_glsl)
    #[arg(long)]
    vulkan: bool,

    /// Entry point to compile (default: every entry point)
    #[arg(long)]
    entry: Option<String>,

    /// Never emit stage interface blocks
    #[arg(long)]
    flatten_io: bool,

    /// Zero-initialize variables without an initializer
    #[arg(long)]
    zero_init: bool,

    /// Emit push constants as a uniform buffer
    #[arg(long)]
    push_constant_ubo: bool,

    /// Emit uniform buffers as plain uniforms
    #[arg(long)]
    plain_uniforms: bool,

    /// Default float precision to highp in ES fragment shaders
    #[arg(long)]
    es_highp: bool,

    /// Compile passes allowed before giving up
    #[arg(long, default_value_t = 3)]
    max_passes: u32,

    /// Dump IR to stderr before backend compilation
    #[arg(long)]
    emit_ir: bool,

    /// Parse and lower without producing output
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn glsl_options(&self) -> Options {
        Options {
            version: self.version.unwrap_or(if self.es { 310 } else { 450 }),
            es: self.es,
            vulkan_semantics: self.vulkan,
            entry_point: self.entry.clone(),
            force_flattened_io_blocks: self.flatten_io,
            force_zero_initialized_variables: self.zero_init,
            emit_push_constant_as_uniform_buffer: self.push_constant_ubo,
            emit_uniform_buffer_as_plain_uniforms: self.plain_uniforms,
            es_default_highp: self.es_highp,
            max_passes: self.max_passes,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read source file.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    // 2. Parse WGSL to IR.
    let module = shadex_parser::parse(&source)
        .map_err(|e| miette::miette!("{}", e.emit_to_string(&source)))
        .wrap_err("WGSL parse failed")?;

    // 3. Optionally dump IR to stderr.
    if cli.emit_ir {
        eprintln!("{}", shadex_ir::dump_module(&module));
    }

    // 4. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 5. Backend dispatch.
    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(GlslBackend::new(cli.glsl_options())));
    let backend = registry
        .resolve(&cli.target)
        .map_err(|e| miette::miette!("{e}"))?;

    let entries: Vec<Option<String>> = match &cli.entry {
        Some(name) => vec![Some(name.clone())],
        None if module.entry_points.len() > 1 => module
            .entry_points
            .iter()
            .map(|ep| Some(ep.name.clone()))
            .collect(),
        None => vec![None],
    };

    let mut files: Vec<OutputFile> = Vec::new();
    for entry_point in entries {
        let opts = BackendOptions {
            entry_point,
            ..BackendOptions::default()
        };
        let output = backend
            .compile(&module, &opts)
            .map_err(|e| miette::miette!("{e}"))
            .wrap_err_with(|| format!("{} compilation failed", backend.name()))?;

        // 6. Print diagnostics.
        for diag in &output.diagnostics {
            eprintln!("{diag}");
        }
        // Backends that ignore the entry point produce the same file again.
        for file in output.files {
            if !files.iter().any(|f| f.name == file.name) {
                files.push(file);
            }
        }
    }

    // 7. Write output.
    match (&cli.output, files.as_slice()) {
        (Some(path), [file]) => {
            std::fs::write(path, &file.text)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        }
        (Some(dir), files) => {
            std::fs::create_dir_all(dir)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
            for file in files {
                let path = dir.join(&file.name);
                std::fs::write(&path, &file.text)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
        }
        (None, [file]) => print!("{}", file.text),
        (None, files) => {
            for file in files {
                println!("// {}", file.name);
                print!("{}", file.text);
            }
        }
    }
    log::debug!("wrote {} file(s)", files.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_desktop_450() {
        let cli = Cli::try_parse_from(["shadex", "in.wgsl"]).unwrap();
        assert_eq!(cli.target, "glsl");
        let options = cli.glsl_options();
        assert_eq!(options.version, 450);
        assert!(!options.es);
        assert_eq!(options.max_passes, 3);
        assert_eq!(options.entry_point, None);
    }

    #[test]
    fn es_defaults_to_310() {
        let cli = Cli::try_parse_from(["shadex", "in.wgsl", "--es"]).unwrap();
        let options = cli.glsl_options();
        assert!(options.es);
        assert_eq!(options.version, 310);
    }

    #[test]
    fn flags_map_onto_options() {
        let cli = Cli::try_parse_from([
            "shadex",
            "in.wgsl",
            "--version",
            "330",
            "--vulkan",
            "--entry",
            "cs_main",
            "--flatten-io",
            "--zero-init",
            "--push-constant-ubo",
            "--max-passes",
            "5",
        ])
        .unwrap();
        let options = cli.glsl_options();
        assert_eq!(options.version, 330);
        assert!(options.vulkan_semantics);
        assert_eq!(options.entry_point.as_deref(), Some("cs_main"));
        assert!(options.force_flattened_io_blocks);
        assert!(options.force_zero_initialized_variables);
        assert!(options.emit_push_constant_as_uniform_buffer);
        assert!(!options.emit_uniform_buffer_as_plain_uniforms);
        assert_eq!(options.max_passes, 5);
    }

    #[test]
    fn version_is_a_value_not_a_flag() {
        assert!(Cli::try_parse_from(["shadex", "in.wgsl", "--version"]).is_err());
    }
}
