use shadex_ir::Module;

use crate::Error;

const DESKTOP_VERSIONS: &[u32] = &[
    110, 120, 130, 140, 150, 330, 400, 410, 420, 430, 440, 450, 460,
];
const ES_VERSIONS: &[u32] = &[100, 300, 310, 320];

/// Target dialect and code generation switches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// GLSL version number, e.g. `450` or `310`.
    pub version: u32,
    /// Target OpenGL ES instead of desktop GLSL.
    pub es: bool,
    /// Emit Vulkan GLSL (`set`, `push_constant`, `constant_id`).
    pub vulkan_semantics: bool,
    /// Entry point to compile; `None` picks the only one.
    pub entry_point: Option<String>,
    /// Declare interface blocks as loose `instance_member` variables.
    pub force_flattened_io_blocks: bool,
    /// Zero-initialize locals and private globals without an initializer.
    pub force_zero_initialized_variables: bool,
    /// Declare push constants as a uniform buffer.
    pub emit_push_constant_as_uniform_buffer: bool,
    /// Declare uniform buffers as plain uniform structs.
    pub emit_uniform_buffer_as_plain_uniforms: bool,
    /// Default fragment float precision on ES is `highp` instead of `mediump`.
    pub es_default_highp: bool,
    /// Pass ceiling; exceeding it without progress is a defect.
    pub max_passes: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: 450,
            es: false,
            vulkan_semantics: false,
            entry_point: None,
            force_flattened_io_blocks: false,
            force_zero_initialized_variables: false,
            emit_push_constant_as_uniform_buffer: false,
            emit_uniform_buffer_as_plain_uniforms: false,
            es_default_highp: false,
            max_passes: 3,
        }
    }
}

impl Options {
    /// Checks the options against the module and returns the index of the
    /// entry point to compile.
    pub fn validate(&self, module: &Module) -> Result<usize, Error> {
        let known = if self.es { ES_VERSIONS } else { DESKTOP_VERSIONS };
        if !known.contains(&self.version) {
            return Err(Error::InvalidOptions(format!(
                "unknown version {} for {}",
                self.version,
                if self.es { "OpenGL ES" } else { "desktop GLSL" }
            )));
        }
        if self.vulkan_semantics {
            let min = if self.es { 310 } else { 450 };
            if self.version < min {
                return Err(Error::InvalidOptions(format!(
                    "Vulkan semantics need version {min} or later, got {}",
                    self.version
                )));
            }
        }
        if self.emit_push_constant_as_uniform_buffer && !self.supports_uniform_blocks() {
            return Err(Error::InvalidOptions(format!(
                "{} has no uniform blocks to hold push constants",
                self.target_label()
            )));
        }
        if self.max_passes == 0 {
            return Err(Error::InvalidOptions("max_passes must be at least 1".into()));
        }

        match self.entry_point.as_deref() {
            Some(name) => Ok(module.entry_point(name)?.0),
            None => match module.entry_points.len() {
                0 => Err(Error::InvalidOptions("module has no entry points".into())),
                1 => Ok(0),
                n => Err(Error::InvalidOptions(format!(
                    "module has {n} entry points; select one by name"
                ))),
            },
        }
    }

    /// Short description of the dialect for messages, e.g. `ES 300`.
    pub fn target_label(&self) -> String {
        let profile = if self.es { "ES" } else { "GLSL" };
        if self.vulkan_semantics {
            format!("Vulkan {profile} {}", self.version)
        } else {
            format!("{profile} {}", self.version)
        }
    }

    /// The `#version` directive.
    pub fn version_directive(&self) -> String {
        if self.es && self.version > 100 {
            format!("#version {} es", self.version)
        } else {
            format!("#version {}", self.version)
        }
    }

    /// GLSL 1.10/1.20 and ES 1.00: `attribute`/`varying`, no integers
    /// beyond `int`, no interface blocks.
    pub fn is_legacy(&self) -> bool {
        if self.es {
            self.version < 300
        } else {
            self.version < 130
        }
    }

    pub fn supports_uniform_blocks(&self) -> bool {
        self.vulkan_semantics || if self.es { self.version >= 300 } else { self.version >= 140 }
    }

    /// `#version` at or above `desktop` (or `es` on ES targets).
    pub fn at_least(&self, desktop: u32, es: u32) -> bool {
        self.version >= if self.es { es } else { desktop }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{EntryPoint, Function, ShaderStage};

    fn module_with(names: &[&str]) -> Module {
        let mut module = Module::default();
        for name in names {
            module.entry_points.push(EntryPoint {
                name: (*name).into(),
                stage: ShaderStage::Fragment,
                modes: vec![],
                function: Function::new(*name),
            });
        }
        module
    }

    #[test]
    fn defaults() {
        let opts = Options::default();
        assert_eq!(opts.version, 450);
        assert!(!opts.es);
        assert_eq!(opts.max_passes, 3);
        assert_eq!(opts.version_directive(), "#version 450");
        assert_eq!(opts.target_label(), "GLSL 450");
    }

    #[test]
    fn version_directives() {
        let es = |version| Options {
            version,
            es: true,
            ..Options::default()
        };
        assert_eq!(es(100).version_directive(), "#version 100");
        assert_eq!(es(310).version_directive(), "#version 310 es");
        assert!(es(100).is_legacy());
        assert!(!es(300).is_legacy());
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let module = module_with(&["main"]);
        let opts = Options {
            version: 451,
            ..Options::default()
        };
        assert!(matches!(opts.validate(&module), Err(Error::InvalidOptions(_))));
        let opts = Options {
            version: 330,
            es: true,
            ..Options::default()
        };
        assert!(opts.validate(&module).is_err());
    }

    #[test]
    fn vulkan_needs_modern_versions() {
        let module = module_with(&["main"]);
        let opts = Options {
            version: 440,
            vulkan_semantics: true,
            ..Options::default()
        };
        assert!(opts.validate(&module).is_err());
        let opts = Options {
            version: 310,
            es: true,
            vulkan_semantics: true,
            ..Options::default()
        };
        assert_eq!(opts.validate(&module).unwrap(), 0);
    }

    #[test]
    fn push_constant_ubo_needs_uniform_blocks() {
        let module = module_with(&["main"]);
        let opts = Options {
            version: 130,
            emit_push_constant_as_uniform_buffer: true,
            ..Options::default()
        };
        let err = opts.validate(&module).unwrap_err();
        assert!(err.to_string().contains("GLSL 130"));
    }

    #[test]
    fn zero_passes_rejected() {
        let module = module_with(&["main"]);
        let opts = Options {
            max_passes: 0,
            ..Options::default()
        };
        assert!(opts.validate(&module).is_err());
    }

    #[test]
    fn entry_point_selection() {
        let module = module_with(&["vs", "fs"]);
        assert!(Options::default().validate(&module).is_err());
        let opts = Options {
            entry_point: Some("fs".into()),
            ..Options::default()
        };
        assert_eq!(opts.validate(&module).unwrap(), 1);
        let opts = Options {
            entry_point: Some("cs".into()),
            ..Options::default()
        };
        assert!(matches!(opts.validate(&module), Err(Error::Ir(_))));
        assert!(Options::default().validate(&Module::default()).is_err());
    }
}
