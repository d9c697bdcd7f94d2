//! The pass loop.
//!
//! Some declarations are only discovered while writing function bodies:
//! an extension needed by one builtin, a helper function, an expression
//! that has to live in a temporary. Rather than predicting them, the
//! whole program is written again once they are known. Everything that
//! was learned is kept in [`StickyState`]; everything else starts over.

use std::collections::HashMap;

use shadex_analysis::{CallGraph, ExpressionUsage, Liveness, Typifier};
use shadex_ir::{Expression, FunctionKey, GlobalVariable, Handle, Module, Type};

use crate::extensions::{self, SubgroupFeature, Trigger};
use crate::ids::{Entity, IdMap};
use crate::layout::{BlockLayout, BufferKind, Layouter};
use crate::names::{NameKey, NameRegistry, Namespace};
use crate::options::Options;
use crate::polyfill::Polyfill;
use crate::state::{PassState, StickyState};
use crate::writer::Plan;
use crate::Error;

/// Read-only facts about the module, computed once per compile.
#[derive(Debug)]
pub(crate) struct Analyses {
    pub ids: IdMap,
    pub graph: CallGraph,
    pub liveness: Liveness,
    functions: HashMap<FunctionKey, FunctionInfo>,
}

#[derive(Debug)]
pub(crate) struct FunctionInfo {
    pub typifier: Typifier,
    pub usage: ExpressionUsage,
}

impl Analyses {
    pub fn new(module: &Module, entry_point: usize) -> Result<Self, Error> {
        let graph = CallGraph::build(module, entry_point)?;
        let liveness = Liveness::compute(module, entry_point)?;
        let mut functions = HashMap::new();
        for key in graph.reachable_keys(entry_point) {
            let func = module.function(key)?;
            functions.insert(
                key,
                FunctionInfo {
                    typifier: Typifier::resolve(module, func)?,
                    usage: ExpressionUsage::compute(func),
                },
            );
        }
        Ok(Self {
            ids: IdMap::new(module),
            graph,
            liveness,
            functions,
        })
    }

    pub fn function(&self, key: FunctionKey) -> Result<&FunctionInfo, Error> {
        self.functions
            .get(&key)
            .ok_or_else(|| Error::Unsupported(format!("{key:?} is not reachable")))
    }
}

/// State of one compile.
pub(crate) struct Compiler<'a> {
    pub module: &'a Module,
    pub options: &'a Options,
    pub analyses: &'a Analyses,
    pub entry_point: usize,
    pub sticky: StickyState,
    pub names: NameRegistry,
    /// Decoration overlay: the layout chosen for each buffer block type.
    pub layouts: HashMap<(Handle<Type>, BufferKind), BlockLayout>,
    /// Layouts of non-struct buffers, by global.
    pub value_layouts: HashMap<Handle<GlobalVariable>, BlockLayout>,
    pub pass: PassState,
    /// How each live global is declared; rebuilt every pass.
    pub plan: Plan,
    /// The function whose body is being written.
    pub current: Option<FunctionKey>,
    names_dirty: bool,
    generation: u32,
}

impl<'a> Compiler<'a> {
    pub fn new(
        module: &'a Module,
        options: &'a Options,
        analyses: &'a Analyses,
        entry_point: usize,
    ) -> Self {
        Self {
            module,
            options,
            analyses,
            entry_point,
            sticky: StickyState::default(),
            names: NameRegistry::new(),
            layouts: HashMap::new(),
            value_layouts: HashMap::new(),
            pass: PassState::default(),
            plan: Plan::default(),
            current: None,
            names_dirty: false,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Runs `emit` until a pass finishes without asking for another one
    /// and returns that pass's text.
    pub fn converge(
        &mut self,
        mut emit: impl FnMut(&mut Self) -> Result<(), Error>,
    ) -> Result<String, Error> {
        loop {
            self.generation += 1;
            if self.generation > self.options.max_passes && !self.pass.progress {
                let passes = self.generation - 1;
                log::error!(
                    "no forward progress after {passes} passes; last requests: {}",
                    self.pass.reasons.join(", ")
                );
                return Err(Error::NonTermination { passes });
            }

            if std::mem::take(&mut self.names_dirty) {
                self.names.reset();
            }
            self.pass = PassState::default();
            self.current = None;
            log::debug!("pass {} ({} sticky requirements)", self.generation, self.sticky.len());

            let before = self.sticky.clone();
            emit(self)?;
            debug_assert!(self.sticky.includes(&before), "sticky state shrank");

            if !self.pass.needs_recompile {
                log::debug!("converged after {} pass(es)", self.generation);
                return Ok(std::mem::take(&mut self.pass.out));
            }
            log::debug!(
                "pass {} needs a recompile: {}",
                self.generation,
                self.pass.reasons.join(", ")
            );
        }
    }

    pub fn request_recompile(&mut self, reason: impl Into<String>) {
        self.pass.needs_recompile = true;
        self.pass.reasons.push(reason.into());
    }

    pub fn request_recompile_guaranteeing_progress(&mut self, reason: impl Into<String>) {
        self.pass.progress = true;
        self.request_recompile(reason);
    }

    /// Adds `name` to the extension list. Extensions found after the
    /// header was written take effect in the next pass.
    pub fn request_extension(&mut self, name: &str) {
        if self.sticky.extensions.insert(name.to_string()) {
            log::trace!("requires {name}");
            if self.pass.header_written {
                self.request_recompile_guaranteeing_progress(format!("extension {name}"));
            }
        }
    }

    /// Enables whatever `trigger` needs, failing when the target has no way
    /// to provide it.
    pub fn require(&mut self, trigger: Trigger) -> Result<(), Error> {
        for ext in extensions::resolve(trigger, self.options)? {
            self.request_extension(ext);
        }
        Ok(())
    }

    /// Like [`Self::require`], but reports an unavailable feature as `false`.
    pub fn require_optional(&mut self, trigger: Trigger) -> bool {
        match extensions::resolve_optional(trigger, self.options) {
            Some(exts) => {
                for ext in exts {
                    self.request_extension(ext);
                }
                true
            }
            None => false,
        }
    }

    pub fn require_subgroup(&mut self, feature: SubgroupFeature) {
        if self.options.vulkan_semantics {
            self.request_extension(feature.khr_extension());
        } else if self.sticky.subgroup_features.insert(feature) {
            log::trace!("requires subgroup feature {feature:?}");
            if self.pass.header_written {
                self.request_recompile_guaranteeing_progress(format!("subgroup {feature:?}"));
            }
        }
    }

    /// Helpers are declared before every function, so a new one always
    /// costs a pass. Its name is withdrawn from user entities.
    pub fn require_polyfill(&mut self, polyfill: Polyfill) {
        let mut added = Vec::new();
        for p in polyfill.closure() {
            if self.sticky.polyfills.insert(p) {
                log::trace!("requires helper {}", p.helper_name());
                added.push(p.helper_name());
            }
        }
        if added.is_empty() {
            return;
        }
        if self.names.reserve_helpers(added.iter().copied()) {
            self.names_dirty = true;
        }
        self.request_recompile_guaranteeing_progress(format!("helper {}", added.join(", ")));
    }

    pub fn force_temporary(&mut self, key: FunctionKey, expr: Handle<Expression>) {
        if self.sticky.forced_temporaries.insert((key, expr)) {
            log::trace!("forcing temporary for {expr:?} in {key:?}");
            self.request_recompile_guaranteeing_progress(format!("temporary {expr:?}"));
        } else {
            self.request_recompile(format!("stale use of {expr:?}"));
        }
    }

    pub fn reserve_name(
        &mut self,
        entity: Entity,
        proposed: Option<&str>,
        namespace: Namespace,
        preserve: bool,
    ) -> String {
        let key = NameKey::Entity(self.analyses.ids.id(entity));
        self.names.reserve(key, proposed, namespace, preserve)
    }

    pub fn reserve_member_name(
        &mut self,
        owner: Entity,
        index: u32,
        proposed: Option<&str>,
        namespace: Namespace,
    ) -> String {
        let key = NameKey::Member {
            owner: self.analyses.ids.id(owner),
            index,
        };
        self.names.reserve(key, proposed, namespace, false)
    }

    pub fn id(&self, entity: Entity) -> u32 {
        self.analyses.ids.id(entity)
    }

    /// Picks the packing standard of a buffer block and enables what it
    /// depends on.
    pub fn classify_layout(
        &mut self,
        ty: Handle<Type>,
        kind: BufferKind,
    ) -> Result<BlockLayout, Error> {
        let layout = match self.layouts.get(&(ty, kind)) {
            Some(&layout) => layout,
            None => {
                let layout = Layouter::new(self.module).buffer_to_packing_standard(
                    ty,
                    kind,
                    self.options.vulkan_semantics,
                )?;
                log::debug!(
                    "block `{}` uses {}",
                    self.module.types[ty].name.as_deref().unwrap_or("_"),
                    layout.standard
                );
                self.layouts.insert((ty, kind), layout);
                layout
            }
        };
        if let Some(trigger) = layout.requires {
            self.require(trigger)?;
        }
        Ok(layout)
    }

    /// Like [`classify_layout`](Self::classify_layout), for a non-struct
    /// buffer declared as the only member of its own block.
    pub fn classify_value_layout(
        &mut self,
        global: Handle<GlobalVariable>,
        kind: BufferKind,
    ) -> Result<BlockLayout, Error> {
        let layout = match self.value_layouts.get(&global) {
            Some(&layout) => layout,
            None => {
                let module = self.module;
                let var = module.global_variables.fetch(global)?;
                let block = match var.name {
                    Some(ref name) => format!("{name}_block"),
                    None => format!("_{}", global.index()),
                };
                let layout = Layouter::new(module).value_to_packing_standard(
                    var.ty,
                    kind,
                    self.options.vulkan_semantics,
                    &block,
                )?;
                log::debug!("block `{block}` uses {}", layout.standard);
                self.value_layouts.insert(global, layout);
                layout
            }
        };
        if let Some(trigger) = layout.requires {
            self.require(trigger)?;
        }
        Ok(layout)
    }
}

/// Result of a compile, with what the backend reports as diagnostics.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub source: String,
    pub passes: u32,
    /// Chosen layout per buffer block, by block name.
    pub blocks: Vec<(String, BlockLayout)>,
}

/// Compiles the selected entry point of `module` to GLSL source.
pub fn compile(module: &Module, options: &Options) -> Result<String, Error> {
    Ok(compile_with_report(module, options)?.source)
}

pub fn compile_with_report(module: &Module, options: &Options) -> Result<Compiled, Error> {
    let entry_point = options.validate(module)?;
    let analyses = Analyses::new(module, entry_point)?;
    let mut cx = Compiler::new(module, options, &analyses, entry_point);
    let source = cx.converge(|cx| cx.emit_pass())?;

    let mut blocks: Vec<_> = cx
        .layouts
        .iter()
        .map(|(&(ty, _), &layout)| {
            let name = cx
                .names
                .get(NameKey::Entity(analyses.ids.id(Entity::Type(ty))))
                .map(str::to_string)
                .unwrap_or_else(|| format!("_{}", ty.index()));
            (name, layout)
        })
        .chain(cx.value_layouts.iter().map(|(&global, &layout)| {
            let key = NameKey::Member {
                owner: analyses.ids.id(Entity::Global(global)),
                index: 0,
            };
            let name = cx
                .names
                .get(key)
                .map(str::to_string)
                .unwrap_or_else(|| format!("_{}", global.index()));
            (name, layout)
        }))
        .collect();
    blocks.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Compiled {
        source,
        passes: cx.generation(),
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadex_ir::{EntryPoint, Function, ShaderStage};

    fn trivial_module() -> Module {
        let mut module = Module::default();
        module.entry_points.push(EntryPoint {
            name: "main".into(),
            stage: ShaderStage::Fragment,
            modes: vec![],
            function: Function::new("main"),
        });
        module
    }

    #[test]
    fn recompiles_without_progress_fail() {
        let module = trivial_module();
        let options = Options::default();
        let analyses = Analyses::new(&module, 0).unwrap();
        let mut cx = Compiler::new(&module, &options, &analyses, 0);
        let err = cx
            .converge(|cx| {
                cx.pass.out.push_str("void main() {}\n");
                cx.request_recompile("always");
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::NonTermination { passes: 3 }));
    }

    #[test]
    fn progress_extends_past_the_pass_ceiling() {
        let module = trivial_module();
        let options = Options {
            max_passes: 1,
            ..Options::default()
        };
        let analyses = Analyses::new(&module, 0).unwrap();
        let mut cx = Compiler::new(&module, &options, &analyses, 0);
        let exts = ["GL_A", "GL_B", "GL_C"];
        let text = cx
            .converge(|cx| {
                cx.pass.header_written = true;
                let n = cx.generation() as usize;
                for ext in exts.iter().take(n) {
                    cx.request_extension(ext);
                }
                cx.pass.out = format!("pass {n}");
                Ok(())
            })
            .unwrap();
        // Passes 1-3 each add one extension; pass 4 adds nothing.
        assert_eq!(text, "pass 4");
        assert_eq!(cx.generation(), 4);
    }

    #[test]
    fn extensions_before_the_header_are_free() {
        let module = trivial_module();
        let options = Options::default();
        let analyses = Analyses::new(&module, 0).unwrap();
        let mut cx = Compiler::new(&module, &options, &analyses, 0);
        cx.converge(|cx| {
            cx.request_extension("GL_EXT_early");
            cx.pass.header_written = true;
            cx.request_extension("GL_EXT_early");
            Ok(())
        })
        .unwrap();
        assert_eq!(cx.generation(), 1);
    }

    #[test]
    fn sticky_requirements_only_grow() {
        let module = trivial_module();
        let options = Options::default();
        let analyses = Analyses::new(&module, 0).unwrap();
        let mut cx = Compiler::new(&module, &options, &analyses, 0);
        let mut snapshots = vec![cx.sticky.clone()];
        let expr = Handle::from_usize(0).unwrap();
        cx.converge(|cx| {
            cx.pass.header_written = true;
            match cx.generation() {
                1 => cx.request_extension("GL_ARB_shader_bit_encoding"),
                2 => cx.require_polyfill(Polyfill::Inverse(shadex_ir::VectorSize::Bi)),
                3 => cx.force_temporary(FunctionKey::EntryPoint(0), expr),
                _ => cx.request_extension("GL_ARB_shader_bit_encoding"),
            }
            snapshots.push(cx.sticky.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(cx.generation(), 4);
        assert_eq!(snapshots.len(), 5);
        assert_eq!(snapshots[0].len(), 0);
        for pair in snapshots.windows(2) {
            assert!(pair[1].includes(&pair[0]));
        }
        assert_eq!(snapshots[3], snapshots[4]);
        assert!(!snapshots[2].includes(&snapshots[3]));
    }

    #[test]
    fn polyfills_reserve_their_names() {
        let module = trivial_module();
        let options = Options::default();
        let analyses = Analyses::new(&module, 0).unwrap();
        let mut cx = Compiler::new(&module, &options, &analyses, 0);
        cx.converge(|cx| {
            cx.require_polyfill(Polyfill::Inverse(shadex_ir::VectorSize::Tri));
            Ok(())
        })
        .unwrap();
        assert_eq!(cx.generation(), 2);
        assert!(cx.sticky.polyfills.contains(&Polyfill::Det2x2));
        let taken = cx.names.reserve(
            NameKey::Entity(99),
            Some("spvInverse3x3"),
            Namespace::Global,
            false,
        );
        assert_eq!(taken, "_99");
    }
}
