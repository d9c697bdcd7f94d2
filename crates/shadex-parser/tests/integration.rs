//! Integration tests for the WGSL parser.

use shadex_ir::{AddressSpace, BuiltIn, ShaderStage, Statement, StorageAccess, dump_module};
use shadex_parser::{ParseError, parse};

#[test]
fn parse_reduce() {
    let source = include_str!("../../../shaders/reduce.wgsl");
    let module = parse(source).expect("reduce.wgsl should parse");
    let dump = dump_module(&module);

    assert_eq!(module.entry_points.len(), 1);
    assert_eq!(module.entry_points[0].name, "main");
    assert_eq!(module.entry_points[0].workgroup_size(), Some([64, 1, 1]));

    // input, output, params, partial, plus the two builtin inputs.
    assert_eq!(module.global_variables.len(), 6);

    assert!(dump.contains("Entry Points:"), "dump should have entry points");
    assert!(dump.contains("@compute @workgroup_size(64, 1, 1)"));
    assert!(dump.contains("Global Variables:"));
}

#[test]
fn parse_vecadd() {
    let source = include_str!("../../../shaders/vecadd.wgsl");
    let module = parse(source).expect("vecadd should parse");

    assert_eq!(module.entry_points[0].workgroup_size(), Some([256, 1, 1]));

    let buffers: Vec<_> = module
        .global_variables
        .iter()
        .filter_map(|(_, v)| match v.space {
            AddressSpace::Storage { access } => Some((v.name.clone(), access)),
            _ => None,
        })
        .collect();
    assert_eq!(buffers.len(), 3);
    assert!(!buffers[0].1.contains(StorageAccess::STORE));
    assert!(buffers[2].1.contains(StorageAccess::STORE));
    assert_eq!(buffers[2].0.as_deref(), Some("c"));
}

#[test]
fn parse_workgroup_barrier() {
    let source = r#"
@group(0) @binding(0) var<storage, read_write> buf: array<u32>;
var<workgroup> shmem: array<u32, 256>;

@compute @workgroup_size(256)
fn main(@builtin(local_invocation_index) lid: u32) {
    shmem[lid] = buf[lid];
    workgroupBarrier();
    buf[lid] = shmem[lid];
}
"#;
    let module = parse(source).expect("barrier shader should parse");
    let has_workgroup = module
        .global_variables
        .iter()
        .any(|(_, v)| matches!(v.space, AddressSpace::Workgroup));
    assert!(has_workgroup, "should have a workgroup variable");

    let body = &module.entry_points[0].function.body;
    assert!(body.iter().any(|s| matches!(s, Statement::Barrier(_))));
}

#[test]
fn parse_vertex_and_fragment_stages() {
    let source = include_str!("../../../shaders/triangle.wgsl");
    let module = parse(source).expect("triangle.wgsl should parse");

    let stages: Vec<_> = module.entry_points.iter().map(|ep| ep.stage).collect();
    assert_eq!(stages, [ShaderStage::Vertex, ShaderStage::Fragment]);
    for ep in &module.entry_points {
        assert!(ep.function.arguments.is_empty());
        assert!(ep.function.result.is_none());
    }

    let index = module
        .global_variables
        .iter()
        .find(|(_, v)| v.decorations.built_in == Some(BuiltIn::VertexIndex))
        .map(|(_, v)| v)
        .expect("vertex index input");
    assert_eq!(index.space, AddressSpace::Input);

    // Both stages write location 0; the vertex color comes first.
    let location_zero: Vec<_> = module
        .global_variables
        .iter()
        .filter(|(_, v)| v.space == AddressSpace::Output && v.decorations.location == Some(0))
        .map(|(_, v)| v.name.as_deref())
        .collect();
    assert_eq!(location_zero.len(), 2);
    let fragment_output = module.global_variables.iter().find(|(_, v)| {
        v.name.as_deref() == Some("fs_main_output") && v.decorations.location == Some(0)
    });
    assert!(fragment_output.is_some_and(|(_, v)| v.space == AddressSpace::Output));
}

#[test]
fn parse_switch_and_helper_function() {
    let source = r#"
fn pick(x: i32) -> f32 {
    switch x {
        case 0: { return 1.0; }
        case 1, 2: { return 2.0; }
        default: { return 0.0; }
    }
}

@group(0) @binding(0) var<storage, read_write> out: array<f32>;

@compute @workgroup_size(1)
fn main() {
    out[0] = pick(1);
}
"#;
    let module = parse(source).expect("switch shader should parse");
    assert_eq!(module.functions.len(), 1);
    let (_, pick) = module.functions.iter().next().unwrap();
    assert_eq!(pick.arguments.len(), 1);
    assert!(pick.result.is_some());
    let cases = pick
        .body
        .iter()
        .find_map(|s| match s {
            Statement::Switch { cases, .. } => Some(cases),
            _ => None,
        })
        .expect("pick should contain a switch");
    // `case 1, 2` is two labels, the first falling through.
    assert_eq!(cases.len(), 4);
    assert!(cases[1].fall_through);
}

#[test]
fn parse_wgsl_syntax_error() {
    let source = "this is not valid wgsl @@@ {{{";
    let err = parse(source).unwrap_err();
    assert!(matches!(err, ParseError::Wgsl(_)));
    assert!(!err.emit_to_string(source).is_empty());
}

#[test]
fn parse_empty_compute() {
    let source = r#"
@compute @workgroup_size(1)
fn main() {}
"#;
    let module = parse(source).expect("empty compute should parse");
    assert_eq!(module.entry_points.len(), 1);
    assert_eq!(module.entry_points[0].workgroup_size(), Some([1, 1, 1]));
}
