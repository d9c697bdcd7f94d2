//! Functions, entry points, and local variables.

use std::collections::HashMap;

use crate::arena::{Arena, Handle};
use crate::expr::Expression;
use crate::stmt::Block;
use crate::types::Type;

/// A function argument declaration.
#[derive(Clone, Debug)]
pub struct FunctionArgument {
    pub name: Option<String>,
    pub ty: Handle<Type>,
}

/// The return type of a function.
#[derive(Clone, Debug)]
pub struct FunctionResult {
    pub ty: Handle<Type>,
}

/// A function-local variable.
#[derive(Clone, Debug)]
pub struct LocalVariable {
    pub name: Option<String>,
    pub ty: Handle<Type>,
    pub init: Option<Handle<Expression>>,
}

/// An IR function.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Option<String>,
    pub arguments: Vec<FunctionArgument>,
    pub result: Option<FunctionResult>,
    pub local_variables: Arena<LocalVariable>,
    pub expressions: Arena<Expression>,
    /// Source-level names given to expression results (`let` bindings).
    pub named_expressions: HashMap<Handle<Expression>, String>,
    pub body: Block,
}

impl Function {
    /// Creates an empty function with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            arguments: Vec::new(),
            result: None,
            local_variables: Arena::new(),
            expressions: Arena::new(),
            named_expressions: HashMap::new(),
            body: Vec::new(),
        }
    }
}

/// Pipeline stage of an entry point.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
    Task,
    Mesh,
    RayGeneration,
    Intersection,
    AnyHit,
    ClosestHit,
    Miss,
    Callable,
}

impl ShaderStage {
    /// File extension conventionally used for this stage's GLSL source.
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::TessellationControl => "tesc",
            Self::TessellationEvaluation => "tese",
            Self::Geometry => "geom",
            Self::Fragment => "frag",
            Self::Compute => "comp",
            Self::Task => "task",
            Self::Mesh => "mesh",
            Self::RayGeneration => "rgen",
            Self::Intersection => "rint",
            Self::AnyHit => "rahit",
            Self::ClosestHit => "rchit",
            Self::Miss => "rmiss",
            Self::Callable => "rcall",
        }
    }

    pub fn is_ray_tracing(self) -> bool {
        matches!(
            self,
            Self::RayGeneration
                | Self::Intersection
                | Self::AnyHit
                | Self::ClosestHit
                | Self::Miss
                | Self::Callable
        )
    }
}

/// Primitive topology named by geometry, tessellation and mesh modes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Primitive {
    Points,
    Lines,
    LinesAdjacency,
    Triangles,
    TrianglesAdjacency,
    LineStrip,
    TriangleStrip,
    Quads,
    Isolines,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum TessSpacing {
    Equal,
    FractionalEven,
    FractionalOdd,
}

/// An execution mode declared on an entry point.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ExecutionMode {
    LocalSize([u32; 3]),
    EarlyFragmentTests,
    OriginUpperLeft,
    PixelCenterInteger,
    DepthGreater,
    DepthLess,
    DepthUnchanged,
    PostDepthCoverage,
    Invocations(u32),
    InputPrimitive(Primitive),
    OutputPrimitive(Primitive),
    OutputVertices(u32),
    OutputPrimitives(u32),
    Spacing(TessSpacing),
    VertexOrderCw,
    VertexOrderCcw,
    PointMode,
}

/// A shader entry point.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    pub name: String,
    pub stage: ShaderStage,
    pub modes: Vec<ExecutionMode>,
    /// The entry point body. Stage inputs and outputs are `Input` and
    /// `Output` globals, so this function takes no arguments.
    pub function: Function,
}

impl EntryPoint {
    /// Workgroup size declared by a `LocalSize` mode.
    pub fn workgroup_size(&self) -> Option<[u32; 3]> {
        self.modes.iter().find_map(|mode| match *mode {
            ExecutionMode::LocalSize(size) => Some(size),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Literal;
    use crate::types::{Scalar, TypeInner};

    #[test]
    fn function_new() {
        let f = Function::new("shade");
        assert_eq!(f.name.as_deref(), Some("shade"));
        assert!(f.arguments.is_empty());
        assert!(f.result.is_none());
        assert!(f.body.is_empty());
    }

    #[test]
    fn function_with_local_vars() {
        let mut types = Arena::new();
        let f32_ty = types.append(Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::F32),
        });

        let mut f = Function::new("shade");
        let init = f.expressions.append(Expression::Literal(Literal::F32(0.0)));
        f.local_variables.append(LocalVariable {
            name: Some("sum".into()),
            ty: f32_ty,
            init: Some(init),
        });
        assert_eq!(f.local_variables.len(), 1);
    }

    #[test]
    fn entry_point_workgroup_size() {
        let ep = EntryPoint {
            name: "main".into(),
            stage: ShaderStage::Compute,
            modes: vec![ExecutionMode::LocalSize([64, 1, 1])],
            function: Function::new("main"),
        };
        assert_eq!(ep.workgroup_size(), Some([64, 1, 1]));
        assert_eq!(ep.stage.file_extension(), "comp");
    }

    #[test]
    fn ray_tracing_stages() {
        assert!(ShaderStage::ClosestHit.is_ray_tracing());
        assert!(!ShaderStage::Fragment.is_ray_tracing());
    }
}
