//! Identifier assignment.
//!
//! Every declared entity gets exactly one GLSL name per compile. Source
//! names are kept when they are legal and free in their namespace;
//! anything else falls back to `_<id>` (or `_<id>_<member>` for struct
//! members), a pattern no accepted source name can take.

use std::collections::{BTreeSet, HashMap, HashSet};

/// Scope in which names must be unique.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Namespace {
    /// Members of the struct with this id.
    Member(u32),
    Global,
    /// Instance names of buffer and interface blocks; share the global scope.
    BlockInstance,
    InputBlock,
    OutputBlock,
    BufferBlock,
    /// Arguments, locals and temporaries of the function with this id.
    Local(u32),
}

/// What a name belongs to.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum NameKey {
    Entity(u32),
    Member { owner: u32, index: u32 },
}

impl NameKey {
    fn fallback(self) -> String {
        match self {
            Self::Entity(id) => format!("_{id}"),
            Self::Member { owner, index } => format!("_{owner}_{index}"),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    namespace: Namespace,
    preserve: bool,
}

/// Name assignments that persist across the passes of one compile.
#[derive(Clone, Debug, Default)]
pub struct NameRegistry {
    entries: HashMap<NameKey, Entry>,
    taken: HashMap<Namespace, HashSet<String>>,
    /// Helper names that user entities may not take.
    reserved: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the name for `key`, assigning one on first use.
    pub fn reserve(
        &mut self,
        key: NameKey,
        proposed: Option<&str>,
        namespace: Namespace,
        preserve: bool,
    ) -> String {
        if let Some(entry) = self.entries.get(&key) {
            return entry.name.clone();
        }
        let name = match proposed {
            Some(name) if self.is_acceptable(name, namespace) => name.to_string(),
            _ => key.fallback(),
        };
        self.taken
            .entry(namespace)
            .or_default()
            .insert(name.clone());
        self.entries.insert(
            key,
            Entry {
                name: name.clone(),
                namespace,
                preserve,
            },
        );
        name
    }

    /// The name already assigned to `key`, if any.
    pub fn get(&self, key: NameKey) -> Option<&str> {
        self.entries.get(&key).map(|e| e.name.as_str())
    }

    /// Adds helper names; returns `true` when the reserved set grew.
    pub fn reserve_helpers<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let mut grew = false;
        for name in names {
            grew |= self.reserved.insert(name.to_string());
        }
        grew
    }

    /// Drops every assignment not marked `preserve`, and preserved ones
    /// that a helper has since claimed.
    pub fn reset(&mut self) {
        let reserved = &self.reserved;
        self.entries
            .retain(|_, entry| entry.preserve && !reserved.contains(&entry.name));
        self.taken.clear();
        for entry in self.entries.values() {
            self.taken
                .entry(entry.namespace)
                .or_default()
                .insert(entry.name.clone());
        }
    }

    fn is_taken(&self, name: &str, namespace: Namespace) -> bool {
        let in_ns = |ns: Namespace| self.taken.get(&ns).is_some_and(|set| set.contains(name));
        match namespace {
            Namespace::Global => in_ns(Namespace::Global) || in_ns(Namespace::BlockInstance),
            Namespace::BlockInstance | Namespace::Local(_) => {
                in_ns(namespace) || in_ns(Namespace::Global) || in_ns(Namespace::BlockInstance)
            }
            _ => in_ns(namespace),
        }
    }

    fn is_acceptable(&self, name: &str, namespace: Namespace) -> bool {
        is_valid_identifier(name)
            && !self.reserved.contains(name)
            && !self.is_taken(name, namespace)
    }
}

/// Checks the rules every GLSL name must follow, independent of scope.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !name.starts_with("gl_")
        && !name.contains("__")
        && !is_fallback_pattern(name)
        && !is_keyword(name)
}

/// `_<digits>` and `_<digits>_<digits>`.
fn is_fallback_pattern(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('_') else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match rest.split_once('_') {
        Some((a, b)) => digits(a) && digits(b),
        None => digits(rest),
    }
}

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.binary_search(&name).is_ok()
}

/// Reserved words, type names and builtin functions, sorted.
const KEYWORDS: &[&str] = &[
    "abs", "acos", "acosh", "active", "all", "any", "asin", "asinh", "asm", "atan", "atanh",
    "atomicAdd", "atomicAnd", "atomicCompSwap", "atomicCounter", "atomicCounterDecrement",
    "atomicCounterIncrement", "atomicExchange", "atomicMax", "atomicMin", "atomicOr", "atomicXor",
    "atomic_uint", "attribute", "barrier", "bitCount", "bitfieldExtract", "bitfieldInsert",
    "bitfieldReverse", "bool", "break", "buffer", "bvec2", "bvec3", "bvec4", "case", "cast",
    "ceil", "centroid", "clamp", "class", "coherent", "common", "const", "continue", "cos", "cosh",
    "cross", "dFdx", "dFdxCoarse", "dFdxFine", "dFdy", "dFdyCoarse", "dFdyFine", "default",
    "degrees", "determinant", "discard", "distance", "dmat2", "dmat2x2", "dmat2x3", "dmat2x4",
    "dmat3", "dmat3x2", "dmat3x3", "dmat3x4", "dmat4", "dmat4x2", "dmat4x3", "dmat4x4", "do",
    "dot", "double", "dvec2", "dvec3", "dvec4", "else", "enum", "equal", "exp", "exp2", "extern",
    "external", "faceforward", "false", "filter", "findLSB", "findMSB", "fixed", "flat", "float",
    "float16_t", "floatBitsToInt", "floatBitsToUint", "floor", "fma", "for", "fract", "frexp",
    "fvec2", "fvec3", "fvec4", "fwidth", "fwidthCoarse", "fwidthFine", "goto", "greaterThan",
    "greaterThanEqual", "half", "highp", "hvec2", "hvec3", "hvec4", "if", "iimage1D", "iimage2D",
    "iimage3D", "image1D", "image2D", "image3D", "imageLoad", "imageSize", "imageStore",
    "imulExtended", "in", "inline", "inout", "input", "int", "int16_t", "int64_t", "int8_t",
    "intBitsToFloat", "interface", "invariant", "inverse", "inversesqrt", "isampler2D", "isinf",
    "isnan", "ivec2", "ivec3", "ivec4", "layout", "ldexp", "length", "lessThan", "lessThanEqual",
    "log", "log2", "long", "lowp", "main", "mat2", "mat2x2", "mat2x3", "mat2x4", "mat3", "mat3x2",
    "mat3x3", "mat3x4", "mat4", "mat4x2", "mat4x3", "mat4x4", "matrixCompMult", "max", "mediump",
    "memoryBarrier", "memoryBarrierBuffer", "memoryBarrierShared", "min", "mix", "mod", "modf",
    "namespace", "noinline", "noperspective", "normalize", "not", "notEqual", "out",
    "outerProduct", "output", "packHalf2x16", "packSnorm2x16", "packSnorm4x8", "packUnorm2x16",
    "packUnorm4x8", "packed", "partition", "patch", "pow", "precise", "precision", "public",
    "radians", "readonly", "reflect", "refract", "resource", "restrict", "return", "round",
    "roundEven", "sample", "sampler", "sampler1D", "sampler2D", "sampler2DArray",
    "sampler2DShadow", "sampler3D", "samplerBuffer", "samplerCube", "shared", "short", "sign",
    "sin", "sinh", "sizeof", "smooth", "smoothstep", "sqrt", "static", "step", "struct",
    "subgroupAdd", "subgroupAll", "subgroupAllEqual", "subgroupAnd", "subgroupAny",
    "subgroupBallot", "subgroupBallotBitCount", "subgroupBarrier", "subgroupBroadcast",
    "subgroupBroadcastFirst", "subgroupElect", "subgroupExclusiveAdd", "subgroupExclusiveMul",
    "subgroupInclusiveAdd", "subgroupInclusiveMul", "subgroupInverseBallot", "subgroupMax",
    "subgroupMin", "subgroupMul", "subgroupOr", "subgroupShuffle", "subgroupShuffleXor",
    "subgroupXor", "subroutine", "superp", "switch", "tan", "tanh", "template", "texelFetch",
    "texture", "textureLod", "textureSize", "this", "transpose", "true", "trunc", "typedef",
    "uaddCarry", "uimage2D", "uint", "uint16_t", "uint64_t", "uint8_t", "uintBitsToFloat",
    "umulExtended", "uniform", "union", "unpackHalf2x16", "unpackSnorm2x16", "unpackSnorm4x8",
    "unpackUnorm2x16", "unpackUnorm4x8", "unsigned", "usampler2D", "using", "usubBorrow", "uvec2",
    "uvec3", "uvec4", "varying", "vec2", "vec3", "vec4", "void", "volatile", "while", "writeonly",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_is_sorted() {
        assert!(KEYWORDS.windows(2).all(|w| w[0] < w[1]), "KEYWORDS must stay sorted");
    }

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("value"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("_1a"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1value"));
        assert!(!is_valid_identifier("val-ue"));
        assert!(!is_valid_identifier("float"));
        assert!(!is_valid_identifier("texture"));
        assert!(!is_valid_identifier("main"));
        assert!(!is_valid_identifier("gl_Position"));
        assert!(!is_valid_identifier("a__b"));
        assert!(!is_valid_identifier("_12"));
        assert!(!is_valid_identifier("_12_3"));
        assert!(!is_valid_identifier("héllo"));
    }

    #[test]
    fn duplicate_proposals_fall_back_to_ids() {
        let mut names = NameRegistry::new();
        let a = names.reserve(NameKey::Entity(4), Some("value"), Namespace::Global, false);
        let b = names.reserve(NameKey::Entity(9), Some("value"), Namespace::Global, false);
        assert_eq!(a, "value");
        assert_eq!(b, "_9");
    }

    #[test]
    fn assignments_are_stable() {
        let mut names = NameRegistry::new();
        let first = names.reserve(NameKey::Entity(1), Some("color"), Namespace::Global, false);
        let again = names.reserve(NameKey::Entity(1), Some("other"), Namespace::Global, false);
        assert_eq!(first, again);
        assert_eq!(names.get(NameKey::Entity(1)), Some("color"));
    }

    #[test]
    fn locals_and_instances_see_globals() {
        let mut names = NameRegistry::new();
        names.reserve(NameKey::Entity(1), Some("light"), Namespace::Global, false);
        let local = names.reserve(NameKey::Entity(2), Some("light"), Namespace::Local(7), false);
        let instance =
            names.reserve(NameKey::Entity(3), Some("light"), Namespace::BlockInstance, false);
        assert_eq!(local, "_2");
        assert_eq!(instance, "_3");
        // Distinct functions do not clash.
        let a = names.reserve(NameKey::Entity(4), Some("tmp"), Namespace::Local(7), false);
        let b = names.reserve(NameKey::Entity(5), Some("tmp"), Namespace::Local(8), false);
        assert_eq!((a.as_str(), b.as_str()), ("tmp", "tmp"));
    }

    #[test]
    fn members_use_their_own_namespace() {
        let mut names = NameRegistry::new();
        names.reserve(NameKey::Entity(1), Some("x"), Namespace::Global, false);
        let key = NameKey::Member { owner: 3, index: 0 };
        assert_eq!(names.reserve(key, Some("x"), Namespace::Member(3), false), "x");
        let bad = NameKey::Member { owner: 3, index: 1 };
        assert_eq!(names.reserve(bad, Some("int"), Namespace::Member(3), false), "_3_1");
    }

    #[test]
    fn reset_keeps_preserved_names() {
        let mut names = NameRegistry::new();
        names.reserve(NameKey::Entity(1), Some("Params"), Namespace::BufferBlock, true);
        names.reserve(NameKey::Entity(2), Some("spvNMin"), Namespace::Global, false);
        assert!(names.reserve_helpers(["spvNMin"]));
        assert!(!names.reserve_helpers(["spvNMin"]));
        names.reset();
        assert_eq!(names.get(NameKey::Entity(1)), Some("Params"));
        assert_eq!(names.get(NameKey::Entity(2)), None);
        let renamed = names.reserve(NameKey::Entity(2), Some("spvNMin"), Namespace::Global, false);
        assert_eq!(renamed, "_2");
        let dup = names.reserve(NameKey::Entity(5), Some("Params"), Namespace::BufferBlock, true);
        assert_eq!(dup, "_5");
    }

    #[test]
    fn helper_names_evict_preserved_assignments() {
        let mut names = NameRegistry::new();
        let key = NameKey::Entity(7);
        let block = names.reserve(key, Some("spvInverse2x2"), Namespace::BlockInstance, true);
        let kept = names.reserve(NameKey::Entity(8), Some("params"), Namespace::BlockInstance, true);
        assert_eq!(block, "spvInverse2x2");

        assert!(names.reserve_helpers(["spvInverse2x2"]));
        names.reset();
        assert_eq!(names.get(key), None);
        assert_eq!(names.get(NameKey::Entity(8)), Some(kept.as_str()));
        let renamed = names.reserve(key, Some("spvInverse2x2"), Namespace::BlockInstance, true);
        assert_eq!(renamed, "_7");
    }
}
