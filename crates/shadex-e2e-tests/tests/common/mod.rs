use shadex_backend_core::{Backend, BackendOptions, BackendOutput};
use shadex_backend_glsl::{Error, Options};

/// Read a shader from the repository's `shaders/` directory.
#[allow(dead_code)]
pub fn load_shader(name: &str) -> String {
    let path = format!("{}/../../shaders/{name}.wgsl", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

/// Parse WGSL source and compile it to GLSL.
#[allow(dead_code)]
pub fn compile_wgsl(source: &str, options: &Options) -> String {
    try_compile_wgsl(source, options).expect("GLSL compilation failed")
}

/// Parse WGSL source and compile it, keeping the backend error.
#[allow(dead_code)]
pub fn try_compile_wgsl(source: &str, options: &Options) -> Result<String, Error> {
    let module = shadex_parser::parse(source).expect("WGSL parse failed");
    shadex_backend_glsl::compile(&module, options)
}

/// Parse WGSL source and run it through a registry backend.
#[allow(dead_code)]
pub fn compile_with_backend(
    source: &str,
    backend: &dyn Backend,
    entry_point: Option<&str>,
) -> BackendOutput {
    let module = shadex_parser::parse(source).expect("WGSL parse failed");
    backend
        .compile(
            &module,
            &BackendOptions {
                entry_point: entry_point.map(str::to_owned),
                ..Default::default()
            },
        )
        .expect("backend compilation failed")
}

#[allow(dead_code)]
pub fn desktop(version: u32) -> Options {
    Options {
        version,
        ..Options::default()
    }
}

#[allow(dead_code)]
pub fn es(version: u32) -> Options {
    Options {
        version,
        es: true,
        ..Options::default()
    }
}
