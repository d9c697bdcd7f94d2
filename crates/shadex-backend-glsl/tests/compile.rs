//! End-to-end compiles of hand-built modules.

use shadex_backend_glsl::{
    Error, Options, PackingStandard, Trigger, compile, compile_with_report,
};
use shadex_ir::{
    AddressSpace, ArraySize, BinaryOp, Decorations, EntryPoint, Expression, Function,
    GlobalVariable, Handle, Literal, LocalVariable, MathFunction, Module, Range, Scalar,
    ScalarKind, ShaderStage, Statement, StorageAccess, Type, TypeInner, VectorSize,
};

fn ty(module: &mut Module, inner: TypeInner) -> Handle<Type> {
    module.types.append(Type { name: None, inner })
}

fn fragment(module: &mut Module, function: Function) {
    module.entry_points.push(EntryPoint {
        name: "main".into(),
        stage: ShaderStage::Fragment,
        modes: vec![],
        function,
    });
}

fn output(module: &mut Module, name: &str, ty: Handle<Type>) -> Handle<GlobalVariable> {
    module.global_variables.append(GlobalVariable {
        name: Some(name.into()),
        space: AddressSpace::Output,
        ty,
        init: None,
        decorations: Decorations::default(),
    })
}

fn emit_all(func: &Function) -> Statement {
    Statement::Emit(Range::from_index_range(0..func.expressions.len() as u32))
}

fn emit_one(h: Handle<Expression>) -> Statement {
    let index = h.index() as u32;
    Statement::Emit(Range::from_index_range(index..index + 1))
}

fn desktop(version: u32) -> Options {
    Options {
        version,
        ..Options::default()
    }
}

/// Writes `floatBitsToUint(1.0) + packUnorm2x16(vec2(1.0))` to a color
/// output; at 150 both builtins come from extensions.
fn two_late_extensions() -> Module {
    let mut module = Module::default();
    let vec4 = ty(
        &mut module,
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar: Scalar::F32,
        },
    );
    let color = output(&mut module, "color", vec4);

    let mut main = Function::new("main");
    let e = &mut main.expressions;
    let one = e.append(Expression::Literal(Literal::F32(1.0)));
    let bits = e.append(Expression::As {
        expr: one,
        kind: ScalarKind::Uint,
        convert: None,
    });
    let pair = e.append(Expression::Splat {
        size: VectorSize::Bi,
        value: one,
    });
    let packed = e.append(Expression::Math {
        fun: MathFunction::Pack2x16Unorm,
        arg: pair,
        arg1: None,
        arg2: None,
        arg3: None,
    });
    let sum = e.append(Expression::Binary {
        op: BinaryOp::Add,
        left: bits,
        right: packed,
    });
    let float = e.append(Expression::As {
        expr: sum,
        kind: ScalarKind::Float,
        convert: Some(4),
    });
    let value = e.append(Expression::Splat {
        size: VectorSize::Quad,
        value: float,
    });
    let target = e.append(Expression::GlobalVariable(color));
    main.body = vec![
        emit_all(&main),
        Statement::Store {
            pointer: target,
            value,
        },
        Statement::Return { value: None },
    ];
    fragment(&mut module, main);
    module
}

#[test]
fn late_extensions_cost_exactly_one_extra_pass() {
    let module = two_late_extensions();
    let compiled = compile_with_report(&module, &desktop(150)).unwrap();
    assert_eq!(compiled.passes, 2);
    let text = &compiled.source;
    assert!(text.starts_with("#version 150\n"));
    assert!(text.contains("#extension GL_ARB_shader_bit_encoding : require\n"));
    assert!(text.contains("#extension GL_ARB_shading_language_packing : require\n"));
    assert!(text.contains("out vec4 color;\n"));
    assert!(text.contains(
        "    color = vec4(float((floatBitsToUint(1.0) + packUnorm2x16(vec2(1.0)))));\n"
    ));
}

#[test]
fn core_features_converge_in_one_pass() {
    let module = two_late_extensions();
    let compiled = compile_with_report(&module, &desktop(450)).unwrap();
    assert_eq!(compiled.passes, 1);
    assert!(!compiled.source.contains("#extension"));
}

#[test]
fn compiling_twice_is_byte_identical() {
    let module = two_late_extensions();
    let options = desktop(150);
    let first = compile(&module, &options).unwrap();
    let second = compile(&module, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn int64_on_es_300_is_unsupported() {
    let mut module = Module::default();
    let mut main = Function::new("main");
    main.expressions.append(Expression::Literal(Literal::I64(1)));
    main.body = vec![emit_all(&main)];
    fragment(&mut module, main);

    let options = Options {
        version: 300,
        es: true,
        ..Options::default()
    };
    let err = compile(&module, &options).unwrap_err();
    assert!(
        matches!(
            err,
            Error::UnsupportedFeature {
                trigger: Trigger::Int64,
                ..
            }
        ),
        "{err}"
    );
    assert!(err.to_string().starts_with("64-bit integers not supported"));
}

fn locals_named(names: &[&str]) -> Module {
    let mut module = Module::default();
    let float = ty(&mut module, TypeInner::Scalar(Scalar::F32));
    let mut main = Function::new("main");
    for name in names {
        main.local_variables.append(LocalVariable {
            name: Some((*name).into()),
            ty: float,
            init: None,
        });
    }
    fragment(&mut module, main);
    module
}

#[test]
fn second_claim_on_a_name_falls_back_to_its_id() {
    // Ids: type 1, entry point 2, locals 3 and 4.
    let module = locals_named(&["value", "value"]);
    let text = compile(&module, &Options::default()).unwrap();
    assert!(text.contains("    float value;\n"));
    assert!(text.contains("    float _4;\n"));
}

#[test]
fn keywords_and_reserved_prefixes_are_never_emitted() {
    let module = locals_named(&["float", "gl_Thing", "a__b", "_3", "fine"]);
    let text = compile(&module, &Options::default()).unwrap();
    for bad in ["float float", "gl_Thing", "a__b"] {
        assert!(!text.contains(bad), "{bad} leaked into:\n{text}");
    }
    assert!(text.contains("    float _3;\n"));
    assert!(text.contains("    float fine;\n"));
}

#[test]
fn helper_functions_are_declared_once() {
    let mut module = Module::default();
    let vec4 = ty(
        &mut module,
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar: Scalar::F32,
        },
    );
    let mat2 = ty(
        &mut module,
        TypeInner::Matrix {
            columns: VectorSize::Bi,
            rows: VectorSize::Bi,
            scalar: Scalar::F32,
        },
    );
    let color = output(&mut module, "color", vec4);

    let mut main = Function::new("main");
    let e = &mut main.expressions;
    let zero = e.append(Expression::ZeroValue(mat2));
    let inverse = e.append(Expression::Math {
        fun: MathFunction::Inverse,
        arg: zero,
        arg1: None,
        arg2: None,
        arg3: None,
    });
    let column = e.append(Expression::AccessIndex {
        base: inverse,
        index: 0,
    });
    let x = e.append(Expression::AccessIndex {
        base: column,
        index: 0,
    });
    let value = e.append(Expression::Splat {
        size: VectorSize::Quad,
        value: x,
    });
    let target = e.append(Expression::GlobalVariable(color));
    main.body = vec![
        emit_all(&main),
        Statement::Store {
            pointer: target,
            value,
        },
    ];
    fragment(&mut module, main);

    let compiled = compile_with_report(&module, &desktop(130)).unwrap();
    assert_eq!(compiled.passes, 2);
    let text = &compiled.source;
    assert_eq!(text.matches("mat2 spvInverse2x2(mat2 m)").count(), 1);
    assert!(text.contains("color = vec4(spvInverse2x2(mat2(0.0))[0].x);"));

    // Where `inverse` is core no helper is written.
    let core = compile(&module, &desktop(450)).unwrap();
    assert!(!core.contains("spvInverse"));
    assert!(core.contains("inverse(mat2(0.0))[0].x"));
}

fn vec4_type(module: &mut Module) -> Handle<Type> {
    ty(
        module,
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar: Scalar::F32,
        },
    )
}

/// Reads `x + 1.0` into an inlinable expression, stores 2.0 to `x`, then
/// writes the expression to `color`.
#[test]
fn store_between_read_and_use_forces_a_temporary() {
    let mut module = Module::default();
    let float = ty(&mut module, TypeInner::Scalar(Scalar::F32));
    let vec4 = vec4_type(&mut module);
    let color = output(&mut module, "color", vec4);

    let mut main = Function::new("main");
    let x = main.local_variables.append(LocalVariable {
        name: Some("x".into()),
        ty: float,
        init: None,
    });
    let e = &mut main.expressions;
    let x_ptr = e.append(Expression::LocalVariable(x));
    let one = e.append(Expression::Literal(Literal::F32(1.0)));
    let two = e.append(Expression::Literal(Literal::F32(2.0)));
    let load = e.append(Expression::Load { pointer: x_ptr });
    let sum = e.append(Expression::Binary {
        op: BinaryOp::Add,
        left: load,
        right: one,
    });
    let value = e.append(Expression::Splat {
        size: VectorSize::Quad,
        value: sum,
    });
    let target = e.append(Expression::GlobalVariable(color));
    main.body = vec![
        Statement::Store {
            pointer: x_ptr,
            value: one,
        },
        emit_one(load),
        emit_one(sum),
        Statement::Store {
            pointer: x_ptr,
            value: two,
        },
        emit_one(value),
        Statement::Store {
            pointer: target,
            value,
        },
    ];
    fragment(&mut module, main);

    let compiled = compile_with_report(&module, &desktop(330)).unwrap();
    assert_eq!(compiled.passes, 2);
    let text = &compiled.source;
    let read = text.find(" = (x + 1.0);\n").expect("sum is declared as a temporary");
    let overwrite = text.find("    x = 2.0;\n").unwrap();
    assert!(read < overwrite, "{text}");
    assert!(text.contains("    color = vec4(_"), "{text}");
    assert!(!text.contains("vec4((x + 1.0))"));
}

/// A load made before a loop must not be re-read inside it.
#[test]
fn read_used_inside_a_loop_forces_a_temporary() {
    let mut module = Module::default();
    let float = ty(&mut module, TypeInner::Scalar(Scalar::F32));
    let vec4 = vec4_type(&mut module);
    let color = output(&mut module, "color", vec4);

    let mut main = Function::new("main");
    let x = main.local_variables.append(LocalVariable {
        name: Some("x".into()),
        ty: float,
        init: None,
    });
    let e = &mut main.expressions;
    let x_ptr = e.append(Expression::LocalVariable(x));
    let load = e.append(Expression::Load { pointer: x_ptr });
    let value = e.append(Expression::Splat {
        size: VectorSize::Quad,
        value: load,
    });
    let target = e.append(Expression::GlobalVariable(color));
    main.body = vec![
        emit_one(load),
        Statement::Loop {
            body: vec![
                emit_one(value),
                Statement::Store {
                    pointer: target,
                    value,
                },
                Statement::Break,
            ],
            continuing: vec![],
            break_if: None,
        },
    ];
    fragment(&mut module, main);

    let compiled = compile_with_report(&module, &desktop(330)).unwrap();
    assert_eq!(compiled.passes, 2);
    let text = &compiled.source;
    let baked = text.find(" = x;\n").expect("load is declared as a temporary");
    let header = text.find("for (;;)").unwrap();
    assert!(baked < header, "{text}");
    assert!(!text.contains("color = vec4(x);"), "{text}");
}

/// A fragment shader copying `data[0]` of a storage buffer whose type is
/// a bare `array<f32, 4>` with the given stride.
fn wrapped_storage_array(stride: u32) -> Module {
    let mut module = Module::default();
    let float = ty(&mut module, TypeInner::Scalar(Scalar::F32));
    let array = ty(
        &mut module,
        TypeInner::Array {
            base: float,
            size: ArraySize::Literal(4),
            stride,
        },
    );
    let vec4 = vec4_type(&mut module);
    let color = output(&mut module, "color", vec4);
    let data = module.global_variables.append(GlobalVariable {
        name: Some("data".into()),
        space: AddressSpace::Storage {
            access: StorageAccess::LOAD,
        },
        ty: array,
        init: None,
        decorations: Decorations::default(),
    });

    let mut main = Function::new("main");
    let e = &mut main.expressions;
    let buffer = e.append(Expression::GlobalVariable(data));
    let first = e.append(Expression::AccessIndex {
        base: buffer,
        index: 0,
    });
    let load = e.append(Expression::Load { pointer: first });
    let value = e.append(Expression::Splat {
        size: VectorSize::Quad,
        value: load,
    });
    let target = e.append(Expression::GlobalVariable(color));
    main.body = vec![
        emit_all(&main),
        Statement::Store {
            pointer: target,
            value,
        },
    ];
    fragment(&mut module, main);
    module
}

#[test]
fn wrapped_buffers_take_the_standard_their_stride_matches() {
    let tight = compile_with_report(&wrapped_storage_array(4), &desktop(430)).unwrap();
    assert!(
        tight.source.contains("layout(std430) readonly buffer data_block"),
        "{}",
        tight.source
    );
    assert_eq!(tight.blocks.len(), 1);
    assert_eq!(tight.blocks[0].0, "data_block");
    assert_eq!(tight.blocks[0].1.standard, PackingStandard::Std430);

    let padded = compile_with_report(&wrapped_storage_array(16), &desktop(430)).unwrap();
    assert!(
        padded.source.contains("layout(std140) readonly buffer data_block"),
        "{}",
        padded.source
    );
    assert_eq!(padded.blocks[0].1.standard, PackingStandard::Std140);
}

#[test]
fn wrapped_buffer_with_foreign_stride_is_rejected() {
    let err = compile(&wrapped_storage_array(8), &desktop(430)).unwrap_err();
    assert!(
        matches!(
            err,
            Error::LayoutInexpressible { ref block, member: 0, .. } if block == "data_block"
        ),
        "{err}"
    );
}
