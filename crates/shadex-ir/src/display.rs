//! Display implementations and text dump for debugging.

use std::fmt;
use std::fmt::Write as _;

use crate::Module;
use crate::arena::{Arena, Handle};
use crate::constant::{Constant, ConstantValue};
use crate::expr::{
    AtomicFunction, BinaryOp, DerivativeAxis, DerivativeControl, Expression, Literal,
    MathFunction, SubgroupOperation, SwizzleComponent, UnaryOp,
};
use crate::func::{ExecutionMode, ShaderStage};
use crate::global::{AddressSpace, BuiltIn, Decorations, StorageAccess};
use crate::stmt::{Barrier, Statement, SwitchValue};
use crate::types::{ArraySize, MatrixMajor, Scalar, ScalarKind, Type, TypeInner, VectorSize};

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Sint => "sint",
            Self::Uint => "uint",
            Self::Float => "float",
        })
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ScalarKind::Bool => return f.write_str("bool"),
            ScalarKind::Sint => 'i',
            ScalarKind::Uint => 'u',
            ScalarKind::Float => 'f',
        };
        write!(f, "{prefix}{}", u32::from(self.width) * 8)
    }
}

impl fmt::Display for VectorSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

impl fmt::Display for StorageAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(
            match (self.contains(Self::LOAD), self.contains(Self::STORE)) {
                (true, true) => "read_write",
                (true, false) => "read",
                (false, true) => "write",
                (false, false) => "none",
            },
        )
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Storage { access } => return write!(f, "storage, {access}"),
            Self::Function => "function",
            Self::Private => "private",
            Self::Workgroup => "workgroup",
            Self::Uniform => "uniform",
            Self::PushConstant => "push_constant",
            Self::Input => "input",
            Self::Output => "output",
            Self::PhysicalStorage => "physical_storage",
        };
        f.write_str(name)
    }
}

impl fmt::Display for BuiltIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Position => "position",
            Self::PointSize => "point_size",
            Self::ClipDistance => "clip_distance",
            Self::VertexIndex => "vertex_index",
            Self::InstanceIndex => "instance_index",
            Self::FrontFacing => "front_facing",
            Self::FragCoord => "frag_coord",
            Self::FragDepth => "frag_depth",
            Self::PointCoord => "point_coord",
            Self::SampleIndex => "sample_index",
            Self::SampleMask => "sample_mask",
            Self::PrimitiveId => "primitive_id",
            Self::InvocationId => "invocation_id",
            Self::Layer => "layer",
            Self::ViewportIndex => "viewport_index",
            Self::ViewIndex => "view_index",
            Self::TessLevelOuter => "tess_level_outer",
            Self::TessLevelInner => "tess_level_inner",
            Self::TessCoord => "tess_coord",
            Self::GlobalInvocationId => "global_invocation_id",
            Self::LocalInvocationId => "local_invocation_id",
            Self::LocalInvocationIndex => "local_invocation_index",
            Self::WorkgroupId => "workgroup_id",
            Self::NumWorkgroups => "num_workgroups",
            Self::SubgroupSize => "subgroup_size",
            Self::SubgroupInvocationId => "subgroup_invocation_id",
            Self::NumSubgroups => "num_subgroups",
            Self::SubgroupId => "subgroup_id",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Decorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(b) = self.built_in {
            parts.push(format!("@builtin({b})"));
        }
        if let Some(loc) = self.location {
            parts.push(format!("@location({loc})"));
        }
        if let Some(set) = self.descriptor_set {
            parts.push(format!("@set({set})"));
        }
        if let Some(binding) = self.binding {
            parts.push(format!("@binding({binding})"));
        }
        if self.invariant {
            parts.push("@invariant".into());
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::TessellationControl => "tess_control",
            Self::TessellationEvaluation => "tess_eval",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
            Self::Task => "task",
            Self::Mesh => "mesh",
            Self::RayGeneration => "ray_generation",
            Self::Intersection => "intersection",
            Self::AnyHit => "any_hit",
            Self::ClosestHit => "closest_hit",
            Self::Miss => "miss",
            Self::Callable => "callable",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}i"),
            Self::U32(v) => write!(f, "{v}u"),
            Self::I64(v) => write!(f, "{v}li"),
            Self::U64(v) => write!(f, "{v}lu"),
            Self::F16(v) => write!(f, "{v}h"),
            Self::F32(v) => write!(f, "{v}f"),
            Self::F64(v) => write!(f, "{v}lf"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for MathFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug names are already the IR mnemonics.
        let name = format!("{self:?}");
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => write!(f, "{}{}", first.to_ascii_lowercase(), chars.as_str()),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Barrier::STORAGE) {
            parts.push("storage");
        }
        if self.contains(Barrier::WORKGROUP) {
            parts.push("workgroup");
        }
        if self.contains(Barrier::SUBGROUP) {
            parts.push("subgroup");
        }
        if parts.is_empty() {
            write!(f, "<no barrier>")
        } else {
            write!(f, "{}", parts.join(" | "))
        }
    }
}

impl fmt::Display for SwizzleComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(["x", "y", "z", "w"][*self as usize])
    }
}

impl fmt::Display for AtomicFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "atomicAdd"),
            Self::Subtract => write!(f, "atomicSub"),
            Self::And => write!(f, "atomicAnd"),
            Self::ExclusiveOr => write!(f, "atomicXor"),
            Self::InclusiveOr => write!(f, "atomicOr"),
            Self::Min => write!(f, "atomicMin"),
            Self::Max => write!(f, "atomicMax"),
            Self::Exchange { compare: None } => write!(f, "atomicExchange"),
            Self::Exchange { compare: Some(c) } => write!(f, "atomicCompareExchange({c:?})"),
        }
    }
}

/// Formats a type using the type arena for resolving inner references.
pub fn format_type(ty: &Type, types: &Arena<Type>) -> String {
    if let Some(ref name) = ty.name {
        return name.clone();
    }
    format_type_inner(&ty.inner, types)
}

/// Formats a [`TypeInner`] using the type arena for resolving references.
pub fn format_type_inner(inner: &TypeInner, types: &Arena<Type>) -> String {
    let name_of = |h: Handle<Type>| match types.try_get(h) {
        Some(ty) => format_type(ty, types),
        None => format!("<bad type {h:?}>"),
    };
    match inner {
        TypeInner::Scalar(s) => format!("{s}"),
        TypeInner::Vector { size, scalar } => format!("vec{size}<{scalar}>"),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => format!("mat{columns}x{rows}<{scalar}>"),
        TypeInner::Atomic(s) => format!("atomic<{s}>"),
        TypeInner::Pointer { base, space } => format!("ptr<{space}, {}>", name_of(*base)),
        TypeInner::Array { base, size, stride } => {
            let base_str = name_of(*base);
            match size {
                ArraySize::Literal(n) => format!("array<{base_str}, {n}> /*stride {stride}*/"),
                ArraySize::Constant(c) => {
                    format!("array<{base_str}, const {c:?}> /*stride {stride}*/")
                }
                ArraySize::Dynamic => format!("array<{base_str}> /*stride {stride}*/"),
            }
        }
        TypeInner::Struct { members, is_block } => {
            let kind = if *is_block { "block" } else { "struct" };
            format!("{kind}({} members)", members.len())
        }
    }
}

fn format_constant(constant: &Constant) -> String {
    let value = match &constant.value {
        ConstantValue::Scalar(lit) => format!("{lit}"),
        ConstantValue::Composite(parts) => {
            let parts: Vec<_> = parts.iter().map(|h| format!("{h:?}")).collect();
            format!("Composite([{}])", parts.join(", "))
        }
        ConstantValue::Zero => "Zero".into(),
        ConstantValue::SpecOp { op, left, right } => format!("SpecOp({left:?} {op} {right:?})"),
    };
    match constant.spec_id {
        Some(id) => format!("@id({id}) {value}"),
        None => value,
    }
}

fn format_expr(handle: Handle<Expression>, exprs: &Arena<Expression>) -> String {
    let Some(expr) = exprs.try_get(handle) else {
        return format!("<bad expression {handle:?}>");
    };
    match expr {
        Expression::Literal(lit) => format!("{lit}"),
        Expression::Constant(c) => format!("Constant({c:?})"),
        Expression::ZeroValue(ty) => format!("ZeroValue({ty:?})"),
        Expression::Compose { ty, components } => {
            let args: Vec<_> = components.iter().map(|h| format!("{h:?}")).collect();
            format!("Compose({ty:?}, [{}])", args.join(", "))
        }
        Expression::FunctionArgument(i) => format!("FunctionArgument({i})"),
        Expression::GlobalVariable(h) => format!("GlobalVariable({h:?})"),
        Expression::LocalVariable(h) => format!("LocalVariable({h:?})"),
        Expression::Load { pointer } => format!("Load({pointer:?})"),
        Expression::Access { base, index } => format!("Access({base:?}, {index:?})"),
        Expression::AccessIndex { base, index } => format!("AccessIndex({base:?}, {index})"),
        Expression::Swizzle {
            size,
            vector,
            pattern,
        } => {
            let n = *size as usize;
            let comps: String = pattern[..n].iter().map(|c| c.to_string()).collect();
            format!("Swizzle({vector:?}).{comps}")
        }
        Expression::Splat { size, value } => format!("Splat({value:?}, vec{size})"),
        Expression::Unary { op, expr } => format!("{op}{expr:?}"),
        Expression::Binary { op, left, right } => format!("{left:?} {op} {right:?}"),
        Expression::Select {
            condition,
            accept,
            reject,
        } => format!("Select({condition:?}, {accept:?}, {reject:?})"),
        Expression::Derivative {
            axis,
            control,
            expr,
        } => {
            let axis = match axis {
                DerivativeAxis::X => "dpdx",
                DerivativeAxis::Y => "dpdy",
                DerivativeAxis::Width => "fwidth",
            };
            let control = match control {
                DerivativeControl::Coarse => "Coarse",
                DerivativeControl::Fine => "Fine",
                DerivativeControl::None => "",
            };
            format!("{axis}{control}({expr:?})")
        }
        Expression::Relational { fun, argument } => format!("{fun:?}({argument:?})"),
        Expression::Math {
            fun,
            arg,
            arg1,
            arg2,
            arg3,
        } => {
            let mut args = format!("{arg:?}");
            for extra in [arg1, arg2, arg3].into_iter().flatten() {
                let _ = write!(args, ", {extra:?}");
            }
            format!("{fun}({args})")
        }
        Expression::As {
            expr,
            kind,
            convert,
        } => match convert {
            Some(w) => format!("As({expr:?} -> {kind}/{w})"),
            None => format!("Bitcast({expr:?} -> {kind})"),
        },
        Expression::ArrayLength(expr) => format!("ArrayLength({expr:?})"),
        Expression::CallResult(f) => format!("CallResult({f:?})"),
        Expression::AtomicResult { ty, comparison } => {
            format!("AtomicResult({ty:?}, cmp={comparison})")
        }
        Expression::SubgroupResult { ty } => format!("SubgroupResult({ty:?})"),
    }
}

fn format_subgroup(op: &SubgroupOperation) -> String {
    match op {
        SubgroupOperation::Reduce(c) => format!("Reduce{c:?}"),
        SubgroupOperation::InclusiveScan(c) => format!("InclusiveScan{c:?}"),
        SubgroupOperation::ExclusiveScan(c) => format!("ExclusiveScan{c:?}"),
        other => format!("{other:?}"),
    }
}

fn write_block(out: &mut String, block: &[Statement], indent: usize) {
    for stmt in block {
        write_stmt(out, stmt, indent);
    }
}

fn write_stmt(out: &mut String, stmt: &Statement, indent: usize) {
    let pad = " ".repeat(indent);
    let result_suffix = |r: &Option<Handle<Expression>>| match r {
        Some(r) => format!(" -> {r:?}"),
        None => String::new(),
    };
    match stmt {
        Statement::Emit(range) => {
            let _ = writeln!(out, "{pad}Emit({range:?})");
        }
        Statement::Store { pointer, value } => {
            let _ = writeln!(out, "{pad}Store {pointer:?} = {value:?}");
        }
        Statement::If {
            condition,
            accept,
            reject,
        } => {
            let _ = writeln!(out, "{pad}If ({condition:?}) {{");
            write_block(out, accept, indent + 4);
            if !reject.is_empty() {
                let _ = writeln!(out, "{pad}}} else {{");
                write_block(out, reject, indent + 4);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::Switch { selector, cases } => {
            let _ = writeln!(out, "{pad}Switch ({selector:?}) {{");
            for case in cases {
                let label = match case.value {
                    SwitchValue::I32(v) => format!("case {v}i"),
                    SwitchValue::U32(v) => format!("case {v}u"),
                    SwitchValue::Default => "default".into(),
                };
                let ft = if case.fall_through { " fallthrough" } else { "" };
                let _ = writeln!(out, "{pad}  {label}:{ft}");
                write_block(out, &case.body, indent + 4);
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::Loop {
            body,
            continuing,
            break_if,
        } => {
            let _ = writeln!(out, "{pad}Loop {{");
            write_block(out, body, indent + 4);
            if !continuing.is_empty() || break_if.is_some() {
                let _ = writeln!(out, "{pad}  Continuing {{");
                write_block(out, continuing, indent + 8);
                if let Some(brk) = break_if {
                    let _ = writeln!(out, "{pad}    BreakIf({brk:?})");
                }
                let _ = writeln!(out, "{pad}  }}");
            }
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::Call {
            function,
            arguments,
            result,
        } => {
            let args: Vec<_> = arguments.iter().map(|h| format!("{h:?}")).collect();
            let _ = writeln!(
                out,
                "{pad}Call {function:?}({}){}",
                args.join(", "),
                result_suffix(result)
            );
        }
        Statement::Atomic {
            pointer,
            fun,
            value,
            result,
        } => {
            let _ = writeln!(
                out,
                "{pad}{fun}({pointer:?}, {value:?}){}",
                result_suffix(result)
            );
        }
        Statement::Subgroup {
            op,
            argument,
            index,
            result,
        } => {
            let args: Vec<_> = [argument, index]
                .into_iter()
                .flatten()
                .map(|h| format!("{h:?}"))
                .collect();
            let _ = writeln!(
                out,
                "{pad}Subgroup{}({}) -> {result:?}",
                format_subgroup(op),
                args.join(", ")
            );
        }
        Statement::Break => {
            let _ = writeln!(out, "{pad}Break");
        }
        Statement::Continue => {
            let _ = writeln!(out, "{pad}Continue");
        }
        Statement::Return { value } => match value {
            Some(v) => {
                let _ = writeln!(out, "{pad}Return {v:?}");
            }
            None => {
                let _ = writeln!(out, "{pad}Return");
            }
        },
        Statement::Kill => {
            let _ = writeln!(out, "{pad}Kill");
        }
        Statement::Barrier(b) => {
            let _ = writeln!(out, "{pad}Barrier({b})");
        }
    }
}

fn format_mode(mode: &ExecutionMode) -> String {
    match mode {
        ExecutionMode::LocalSize([x, y, z]) => format!("@workgroup_size({x}, {y}, {z})"),
        other => format!("@{other:?}"),
    }
}

/// Produces a human-readable text dump of a [`Module`] for debugging.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();

    out.push_str("Types:\n");
    for (handle, ty) in module.types.iter() {
        let formatted = format_type(ty, &module.types);
        let _ = writeln!(out, "  {handle:?} {formatted}");
        if let TypeInner::Struct { members, .. } = &ty.inner {
            for member in members {
                let name = member.name.as_deref().unwrap_or("_");
                let member_ty = name_of_type(member.ty, &module.types);
                let offset = match member.layout.offset {
                    Some(o) => format!(" @offset({o})"),
                    None => String::new(),
                };
                let major = match member.layout.major {
                    MatrixMajor::Row => " @row_major",
                    MatrixMajor::Column => "",
                };
                let _ = writeln!(out, "      {name}: {member_ty}{offset}{major}");
            }
        }
    }

    if !module.constants.is_empty() {
        out.push_str("\nConstants:\n");
        for (handle, constant) in module.constants.iter() {
            let name = constant.name.as_deref().unwrap_or("_");
            let _ = writeln!(out, "  {handle:?} {name} = {}", format_constant(constant));
        }
    }

    if !module.global_variables.is_empty() {
        out.push_str("\nGlobal Variables:\n");
        for (handle, var) in module.global_variables.iter() {
            let name = var.name.as_deref().unwrap_or("_");
            let ty_str = name_of_type(var.ty, &module.types);
            let deco = var.decorations.to_string();
            let deco = if deco.is_empty() {
                deco
            } else {
                format!("{deco} ")
            };
            let _ = writeln!(
                out,
                "  {handle:?} {deco}var<{}>  {name}: {ty_str}",
                var.space
            );
        }
    }

    if !module.capabilities.is_empty() {
        let caps: Vec<_> = module.capabilities.iter().map(|c| format!("{c:?}")).collect();
        let _ = writeln!(out, "\nCapabilities: {}", caps.join(", "));
    }

    if !module.functions.is_empty() {
        out.push_str("\nFunctions:\n");
        for (handle, func) in module.functions.iter() {
            dump_function(&mut out, &format!("{handle:?}"), func, &module.types);
        }
    }

    if !module.entry_points.is_empty() {
        out.push_str("\nEntry Points:\n");
        for ep in &module.entry_points {
            let modes: Vec<_> = ep.modes.iter().map(format_mode).collect();
            let _ = writeln!(out, "  @{} {}", ep.stage, modes.join(" "));
            dump_function(&mut out, &ep.name, &ep.function, &module.types);
        }
    }

    out
}

fn name_of_type(handle: Handle<Type>, types: &Arena<Type>) -> String {
    match types.try_get(handle) {
        Some(ty) => format_type(ty, types),
        None => format!("<bad type {handle:?}>"),
    }
}

fn dump_function(out: &mut String, label: &str, func: &crate::Function, types: &Arena<Type>) {
    let name = func.name.as_deref().unwrap_or("_");

    let args: Vec<_> = func
        .arguments
        .iter()
        .map(|arg| {
            let arg_name = arg.name.as_deref().unwrap_or("_");
            format!("{arg_name}: {}", name_of_type(arg.ty, types))
        })
        .collect();
    let ret = match &func.result {
        Some(r) => format!(" -> {}", name_of_type(r.ty, types)),
        None => String::new(),
    };
    let _ = writeln!(out, "  fn {name}({})  [{label}]{ret} {{", args.join(", "));

    for (handle, var) in func.local_variables.iter() {
        let var_name = var.name.as_deref().unwrap_or("_");
        let ty_str = name_of_type(var.ty, types);
        let init = match var.init {
            Some(h) => format!(" = {}", format_expr(h, &func.expressions)),
            None => String::new(),
        };
        let _ = writeln!(out, "    var {handle:?} {var_name}: {ty_str}{init}");
    }

    if !func.expressions.is_empty() {
        out.push_str("    Expressions:\n");
        for (handle, _) in func.expressions.iter() {
            let formatted = format_expr(handle, &func.expressions);
            let named = match func.named_expressions.get(&handle) {
                Some(n) => format!("  // {n}"),
                None => String::new(),
            };
            let _ = writeln!(out, "      {handle:?} {formatted}{named}");
        }
    }

    if !func.body.is_empty() {
        out.push_str("    Body:\n");
        write_block(out, &func.body, 6);
    }

    out.push_str("  }\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Function;
    use crate::func::EntryPoint;

    #[test]
    fn display_scalar() {
        assert_eq!(format!("{}", Scalar::F32), "f32");
        assert_eq!(format!("{}", Scalar::I64), "i64");
        assert_eq!(format!("{}", Scalar::U16), "u16");
        assert_eq!(format!("{}", Scalar::BOOL), "bool");
    }

    #[test]
    fn display_address_space() {
        assert_eq!(format!("{}", AddressSpace::PushConstant), "push_constant");
        assert_eq!(
            format!(
                "{}",
                AddressSpace::Storage {
                    access: StorageAccess::LOAD | StorageAccess::STORE
                }
            ),
            "storage, read_write"
        );
    }

    #[test]
    fn display_literal() {
        assert_eq!(format!("{}", Literal::F32(3.125)), "3.125f");
        assert_eq!(format!("{}", Literal::U64(42)), "42lu");
        assert_eq!(format!("{}", Literal::Bool(true)), "true");
    }

    #[test]
    fn display_math_function() {
        assert_eq!(format!("{}", MathFunction::Dot), "dot");
        assert_eq!(format!("{}", MathFunction::InverseSqrt), "inverseSqrt");
        assert_eq!(format!("{}", MathFunction::NClamp), "nClamp");
    }

    #[test]
    fn display_barrier() {
        let b = Barrier::WORKGROUP | Barrier::SUBGROUP;
        assert_eq!(format!("{b}"), "workgroup | subgroup");
        assert_eq!(format!("{}", Barrier::EMPTY), "<no barrier>");
    }

    #[test]
    fn display_decorations() {
        let deco = Decorations {
            descriptor_set: Some(1),
            binding: Some(2),
            ..Decorations::default()
        };
        assert_eq!(format!("{deco}"), "@set(1) @binding(2)");
    }

    #[test]
    fn dump_empty_module() {
        let module = Module::default();
        let dump = dump_module(&module);
        assert!(dump.contains("Types:"));
        assert!(!dump.contains("Entry Points:"));
    }

    #[test]
    fn dump_entry_point_with_modes() {
        let mut module = Module::default();
        module.entry_points.push(EntryPoint {
            name: "main".into(),
            stage: ShaderStage::Compute,
            modes: vec![ExecutionMode::LocalSize([8, 8, 1])],
            function: Function::new("main"),
        });
        let dump = dump_module(&module);
        assert!(dump.contains("@compute @workgroup_size(8, 8, 1)"));
        assert!(dump.contains("fn main()  [main]"));
    }
}
