//! Target-independent backend plumbing for shadex.
//!
//! A [`Backend`] turns a [`Module`] into one or more text files plus
//! diagnostics. Backends are looked up by target name through a
//! [`BackendRegistry`], which is how the CLI dispatches `--target`.

use std::fmt;

use shadex_ir::Module;

/// A code generator from shadex IR to shader source text.
///
/// Implementations hold only immutable configuration, so one instance may
/// serve concurrent compiles.
pub trait Backend: fmt::Debug + Send + Sync {
    /// Display name, used in error context.
    fn name(&self) -> &str;

    /// Target names this backend answers to.
    fn targets(&self) -> &[&str];

    /// Compile `module` under `opts`.
    fn compile(&self, module: &Module, opts: &BackendOptions)
    -> Result<BackendOutput, BackendError>;
}

/// Settings shared by every backend. Dialect options belong to the backend
/// value itself.
#[derive(Clone, Debug, Default)]
pub struct BackendOptions {
    /// Optimization level; 0 disables optional rewrites.
    pub opt_level: u8,
    /// Entry point to compile. `None` selects the only entry point and is
    /// an error when the module has several.
    pub entry_point: Option<String>,
}

/// Files and diagnostics from one compile.
#[derive(Clone, Debug, Default)]
pub struct BackendOutput {
    pub files: Vec<OutputFile>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BackendOutput {
    /// An output holding one file and no diagnostics.
    pub fn single(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            files: vec![OutputFile {
                name: name.into(),
                text: text.into(),
            }],
            diagnostics: Vec::new(),
        }
    }

    /// Looks a file up by name.
    pub fn file(&self, name: &str) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Whether any diagnostic is a warning.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warning)
    }
}

/// A generated source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    /// File name, e.g. `main.frag.glsl`.
    pub name: String,
    pub text: String,
}

/// A note attached to a successful compile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    /// An informational diagnostic.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
        }
    }

    /// A warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Info,
    /// The output is valid but may not be what the author expects.
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
        })
    }
}

/// Errors from backend lookup and compilation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The module needs something the requested dialect cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// No registered backend answers to the target name.
    #[error("unknown target '{target}' (available: {})", .available.join(", "))]
    UnknownTarget {
        target: String,
        available: Vec<String>,
    },
    #[error("{0}")]
    Other(String),
}

/// Backends by target name, used for CLI `--target` dispatch.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in [`IrDumpBackend`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IrDumpBackend));
        registry
    }

    /// Registers a backend. Later registrations win on target clashes.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.insert(0, backend);
    }

    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Like [`find`](Self::find), but an unknown target is an error that
    /// lists what is available.
    pub fn resolve(&self, target: &str) -> Result<&dyn Backend, BackendError> {
        self.find(target).ok_or_else(|| BackendError::UnknownTarget {
            target: target.to_owned(),
            available: self.list_targets().into_iter().map(str::to_owned).collect(),
        })
    }

    /// Every target name, sorted, without duplicates.
    pub fn list_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self
            .backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }
}

/// Writes the module as text with [`shadex_ir::dump_module`].
#[derive(Debug)]
pub struct IrDumpBackend;

impl Backend for IrDumpBackend {
    fn name(&self) -> &str {
        "IR dump"
    }

    fn targets(&self) -> &[&str] {
        &["ir-dump", "ir"]
    }

    fn compile(
        &self,
        module: &Module,
        _opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        Ok(BackendOutput::single(
            "module.ir",
            shadex_ir::dump_module(module),
        ))
    }
}
