//! State carried by the pass loop.
//!
//! [`StickyState`] only ever grows and survives every pass of a compile;
//! [`PassState`] is rebuilt from scratch at the start of each pass.

use std::collections::BTreeSet;

use shadex_ir::{Expression, FunctionKey, GlobalVariable, Handle, LocalVariable};

use crate::extensions::SubgroupFeature;
use crate::polyfill::Polyfill;

/// Requirements discovered during emission that later passes must honor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StickyState {
    pub extensions: BTreeSet<String>,
    pub subgroup_features: BTreeSet<SubgroupFeature>,
    pub polyfills: BTreeSet<Polyfill>,
    /// Expressions that must be stored in a temporary at their emit point.
    pub forced_temporaries: BTreeSet<(FunctionKey, Handle<Expression>)>,
}

impl StickyState {
    /// Total number of requirements; strictly grows when a pass makes progress.
    pub fn len(&self) -> usize {
        self.extensions.len()
            + self.subgroup_features.len()
            + self.polyfills.len()
            + self.forced_temporaries.len()
    }

    /// `true` when every requirement of `earlier` is still present.
    pub fn includes(&self, earlier: &Self) -> bool {
        earlier.extensions.is_subset(&self.extensions)
            && earlier.subgroup_features.is_subset(&self.subgroup_features)
            && earlier.polyfills.is_subset(&self.polyfills)
            && earlier
                .forced_temporaries
                .is_subset(&self.forced_temporaries)
    }
}

/// A variable an expression reads through a load.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Root {
    Local(Handle<LocalVariable>),
    Global(Handle<GlobalVariable>),
    /// A pointer argument of the current function.
    Argument(u32),
}

/// How an expression of the current function is spelled at its use sites.
#[derive(Clone, Debug, Default)]
pub enum ExprState {
    /// Not emitted yet; spelled by recomputing it from its operands.
    #[default]
    Pending,
    /// Inlined into each use.
    Forwarded {
        text: String,
        roots: BTreeSet<Root>,
        loop_depth: u32,
        /// Cleared when a store may have changed one of `roots`.
        valid: bool,
    },
    /// Stored in a named temporary.
    Baked(String),
}

/// Scratch state of one pass.
#[derive(Debug, Default)]
pub struct PassState {
    pub out: String,
    pub indent: usize,
    pub needs_recompile: bool,
    /// A sticky set grew, or a name collision was resolved.
    pub progress: bool,
    /// Extensions requested after this point need another pass.
    pub header_written: bool,
    /// Why the pass asked for a recompile, for logging.
    pub reasons: Vec<String>,
    /// Expression cache of the function being written.
    pub exprs: Vec<ExprState>,
    pub loop_depth: u32,
    /// Loops written so far in the current function.
    pub loop_count: u32,
    /// Optional qualifiers the target turned out to support.
    pub dialect: Dialect,
}

/// Qualifiers emitted only when the target can express them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dialect {
    pub bindings: bool,
    pub attribute_locations: bool,
    pub varying_locations: bool,
}

impl PassState {
    pub fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn open(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    pub fn close(&mut self, suffix: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("}}{suffix}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_inclusion() {
        let mut a = StickyState::default();
        assert_eq!(a.len(), 0);
        a.extensions.insert("GL_ARB_gpu_shader_int64".into());
        let mut b = a.clone();
        b.subgroup_features.insert(SubgroupFeature::Vote);
        assert!(b.includes(&a));
        assert!(!a.includes(&b));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn pass_state_indents_blocks() {
        let mut pass = PassState::default();
        pass.line("void main()");
        pass.open();
        pass.line("return;");
        pass.close("");
        assert_eq!(pass.out, "void main()\n{\n    return;\n}\n");
    }
}
