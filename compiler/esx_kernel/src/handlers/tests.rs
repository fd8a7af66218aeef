#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;
use crate::header::{ParamDesc, ParamKind};
use crate::test_helpers::{
    accessor, accessor_with, int, kernel, record, sampler, spec_constant, stream, Kernel,
};
use crate::visitor::visit_kernel_object;
use esx_diagnostic::ErrorCode;
use esx_ir::{
    Builtin, ExprKind, RecordKind, Span, SpecialKind, Stmt, TemplateArg, TypeKind, VarId,
};

// -- Helpers --

/// Error codes from the legality and union checks.
fn check(program: &Program, object: RecordId, std_layout: bool) -> Vec<ErrorCode> {
    let mut legality = LegalityChecker::new(false, std_layout);
    let mut unions = UnionChecker::new();
    visit_kernel_object(program, object, &mut [&mut legality, &mut unions]);
    legality
        .into_diagnostics()
        .into_iter()
        .chain(unions.into_diagnostics())
        .map(|d| d.code)
        .collect()
}

/// Run the marker and apply its marks, as synthesis does.
fn mark(program: &mut Program, object: RecordId) {
    let mut marker = DecompositionMarker::new();
    visit_kernel_object(program, object, &mut [&mut marker]);
    program.apply_marks(&marker.into_marks());
}

fn params(program: &mut Program, object: RecordId, simd: bool) -> Vec<KernelParam> {
    mark(program, object);
    let mut decls = DeclBuilder::new(simd);
    visit_kernel_object(program, object, &mut [&mut decls]);
    let (params, diags) = decls.finish(program);
    assert!(diags.is_empty());
    params
}

fn descriptors(program: &mut Program, object: RecordId) -> Vec<ParamDesc> {
    mark(program, object);
    let mut table = SideTableBuilder::new(false);
    visit_kernel_object(program, object, &mut [&mut table]);
    table.finish().0
}

fn named(program: &mut Program, name: &str, args: Vec<TemplateArg>) -> TypeId {
    program
        .add_record_type(RecordDecl::new(name, RecordKind::Class).with_template_args(args))
        .1
}

/// `accessor_property_list<buffer_location<n>...>`.
fn property_list(program: &mut Program, locations: &[i64]) -> TemplateArg {
    let properties = locations
        .iter()
        .map(|n| {
            TemplateArg::Type(named(
                program,
                "sycl::property::buffer_location",
                vec![TemplateArg::Integral(*n)],
            ))
        })
        .collect();
    TemplateArg::Type(named(
        program,
        "sycl::ONEAPI::accessor_property_list",
        vec![TemplateArg::Pack(properties)],
    ))
}

// -- Legality --

#[test]
fn legal_object_passes() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);

    assert!(check(&program, k.object, true).is_empty());
}

#[test]
fn reference_members_are_rejected() {
    let mut program = Program::new();
    let int = int(&mut program);
    let reference = program.types.reference(int);
    let k = kernel(&mut program, &[("r", reference, 0)], false);

    assert_eq!(check(&program, k.object, false), vec![ErrorCode::E1001]);
}

#[test]
fn non_trivial_structs_are_rejected() {
    let mut program = Program::new();
    let int = int(&mut program);
    let (inner, inner_ty) = record(&mut program, "Guard", &[("x", int, 0)]);
    program.record_mut(inner).trivial_copy = false;
    program.record_mut(inner).trivial_destructor = false;
    let k = kernel(&mut program, &[("g", inner_ty, 0)], false);

    assert_eq!(
        check(&program, k.object, false),
        vec![ErrorCode::E1002, ErrorCode::E1002]
    );
}

#[test]
fn unsized_arrays_are_rejected() {
    let mut program = Program::new();
    let int = int(&mut program);
    let vla = program.types.variable_array(int);
    let empty = program.types.array(int, 0);
    let ptr_to_vla = program.types.pointer(vla, esx_ir::AddressSpace::Global);
    let k = kernel(
        &mut program,
        &[("vla", vla, 0), ("empty", empty, 0), ("p", ptr_to_vla, 0)],
        false,
    );

    assert_eq!(
        check(&program, k.object, false),
        vec![ErrorCode::E1003, ErrorCode::E1004, ErrorCode::E1003]
    );
}

#[test]
fn accessor_data_must_be_device_representable() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    let long_double = program.types.builtin(Builtin::LongDouble);
    let record = program.types.as_record(acc).unwrap();
    if let Some(SpecialKind::Accessor(info)) = &mut program.record_mut(record).special {
        info.data_ty = long_double;
    }
    let k = kernel(&mut program, &[("acc", acc, 0)], false);

    assert_eq!(check(&program, k.object, false), vec![ErrorCode::E1005]);
}

#[test]
fn malformed_property_lists_are_rejected() {
    let mut program = Program::new();
    let not_a_type = accessor_with(&mut program, Some(TemplateArg::Integral(3)));
    let wrong_list = named(&mut program, "sycl::property_list", Vec::new());
    let wrong_record = accessor_with(&mut program, Some(TemplateArg::Type(wrong_list)));
    let k = kernel(
        &mut program,
        &[("a", not_a_type, 0), ("b", wrong_record, 32)],
        false,
    );

    assert_eq!(
        check(&program, k.object, false),
        vec![ErrorCode::E1006, ErrorCode::E1006]
    );
}

#[test]
fn buffer_location_arguments_are_checked() {
    let mut program = Program::new();
    let negative = property_list(&mut program, &[-1]);
    let negative = accessor_with(&mut program, Some(negative));
    let two_args = named(
        &mut program,
        "sycl::property::buffer_location",
        vec![TemplateArg::Integral(1), TemplateArg::Integral(2)],
    );
    let list = named(
        &mut program,
        "sycl::ONEAPI::accessor_property_list",
        vec![TemplateArg::Pack(vec![TemplateArg::Type(two_args)])],
    );
    let two_args = accessor_with(&mut program, Some(TemplateArg::Type(list)));
    let k = kernel(&mut program, &[("a", negative, 0), ("b", two_args, 32)], false);

    assert_eq!(
        check(&program, k.object, false),
        vec![ErrorCode::E1008, ErrorCode::E1007]
    );
}

#[test]
fn standard_layout_is_only_required_on_request() {
    let mut program = Program::new();
    let int = int(&mut program);
    let (inner, inner_ty) = record(&mut program, "Mixed", &[("x", int, 0)]);
    program.record_mut(inner).standard_layout = false;
    let k = kernel(&mut program, &[("m", inner_ty, 0)], false);

    assert!(check(&program, k.object, false).is_empty());
    assert_eq!(check(&program, k.object, true), vec![ErrorCode::E1011]);
}

#[test]
fn void_members_are_rejected() {
    let mut program = Program::new();
    let void = program.types.builtin(Builtin::Void);
    let k = kernel(&mut program, &[("v", void, 0)], false);

    assert_eq!(check(&program, k.object, false), vec![ErrorCode::E1012]);
}

#[test]
fn resources_need_an_initializer() {
    let mut program = Program::new();
    let (_, bare) = program.add_record_type(
        RecordDecl::new("sycl::sampler", RecordKind::Class)
            .with_special(SpecialKind::Sampler)
            .with_layout(8, 8),
    );
    let k = kernel(&mut program, &[("s", bare, 0)], false);

    assert_eq!(check(&program, k.object, false), vec![ErrorCode::E9001]);
}

#[test]
fn resources_inside_unions_are_rejected() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let (_, union_ty) = program.add_record_type(
        RecordDecl::new("U", RecordKind::Union)
            .with_field("acc", acc, 0)
            .with_field("n", int, 0)
            .with_layout(32, 8),
    );
    let k = kernel(&mut program, &[("u", union_ty, 0)], false);

    assert_eq!(check(&program, k.object, false), vec![ErrorCode::E2001]);
}

// -- Decomposition marks --

#[test]
fn only_containers_with_pointers_or_resources_are_marked() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ptr = program.types.pointer(int, esx_ir::AddressSpace::Global);
    let (plain, plain_ty) = record(&mut program, "Plain", &[("x", int, 0)]);
    let (holder, holder_ty) = record(&mut program, "Holder", &[("p", ptr, 0)]);
    let (outer, outer_ty) = record(&mut program, "Outer", &[("h", holder_ty, 0)]);
    let holders = program.types.array(holder_ty, 2);
    let ints = program.types.array(int, 2);
    let k = kernel(
        &mut program,
        &[
            ("plain", plain_ty, 0),
            ("outer", outer_ty, 8),
            ("holders", holders, 16),
            ("ints", ints, 32),
        ],
        false,
    );

    let mut marker = DecompositionMarker::default();
    visit_kernel_object(&program, k.object, &mut [&mut marker]);
    let marks = marker.into_marks();

    assert!(!marks.has_record(plain));
    assert!(marks.has_record(holder));
    assert!(marks.has_record(outer));
    assert!(marks.has_array_field(esx_ir::FieldRef::new(k.object, 2)));
    assert!(!marks.has_array_field(esx_ir::FieldRef::new(k.object, 3)));
}

// -- Entry parameters --

#[test]
fn accessors_expand_to_their_initializer_parameters() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);

    let params = params(&mut program, k.object, false);
    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();

    assert_eq!(names, vec!["_arg_acc", "_arg_acc", "_arg_acc", "_arg_n"]);
    assert_eq!(params[3].ty, int);
    assert!(params.iter().all(|p| !p.esimd_accessor_ptr));
}

#[test]
fn simd_accessors_take_one_tagged_pointer() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0)], true);

    let params = params(&mut program, k.object, true);

    assert_eq!(params.len(), 1);
    assert!(params[0].esimd_accessor_ptr);
}

#[test]
fn pointers_are_retargeted_and_wrapped_when_nested() {
    let mut program = Program::new();
    let int = int(&mut program);
    let generic = program.types.pointer(int, esx_ir::AddressSpace::Generic);
    let (_, holder_ty) = record(&mut program, "Holder", &[("p", generic, 0)]);
    let k = kernel(&mut program, &[("p", generic, 0), ("h", holder_ty, 8)], false);

    let params = params(&mut program, k.object, false);

    let global = program.types.pointer(int, esx_ir::AddressSpace::Global);
    assert_eq!(params[0].ty, global);
    let wrapper = program.types.as_record(params[1].ty).unwrap();
    assert_eq!(program.record(wrapper).name, WRAPPER_CLASS);
    assert_eq!(program.record(wrapper).fields[0].ty, global);
    assert_eq!(program.record(wrapper).size, 8);
}

#[test]
fn whole_arrays_travel_in_a_wrapper() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ints = program.types.array(int, 4);
    let k = kernel(&mut program, &[("ints", ints, 0)], false);

    let params = params(&mut program, k.object, false);

    let wrapper = program.types.as_record(params[0].ty).unwrap();
    assert_eq!(program.record(wrapper).fields[0].ty, ints);
    assert_eq!(program.record(wrapper).align, 4);
}

#[test]
fn buffer_location_tags_the_accessor_pointer() {
    let mut program = Program::new();
    let list = property_list(&mut program, &[3]);
    let acc = accessor_with(&mut program, Some(list));
    let k = kernel(&mut program, &[("acc", acc, 0)], false);

    let params = params(&mut program, k.object, false);
    let locations: Vec<Option<i64>> = params.iter().map(|p| p.buffer_location).collect();

    assert_eq!(locations, vec![Some(3), None, None]);
}

#[test]
fn duplicate_buffer_location_is_an_error() {
    let mut program = Program::new();
    let list = property_list(&mut program, &[1, 2]);
    let acc = accessor_with(&mut program, Some(list));
    let k = kernel(&mut program, &[("acc", acc, 0)], false);

    let mut decls = DeclBuilder::new(false);
    visit_kernel_object(&program, k.object, &mut [&mut decls]);
    let (_, diags) = decls.finish(&mut program);

    assert_eq!(
        diags.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![ErrorCode::E1009]
    );
}

#[test]
fn argument_size_warns_past_the_limit() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);

    let mut size = ArgsSizeChecker::new(false, 16);
    visit_kernel_object(&program, k.object, &mut [&mut size]);
    // pointer, two ranges, int
    assert_eq!(size.total(), 28);
    let warning = size.finish(Span::DUMMY).unwrap();
    assert_eq!(warning.code, ErrorCode::W1001);
    assert!(!warning.is_error());

    let mut size = ArgsSizeChecker::new(false, MAX_KERNEL_ARGS_SIZE);
    visit_kernel_object(&program, k.object, &mut [&mut size]);
    assert!(size.finish(Span::DUMMY).is_none());
}

// -- Entry body --

fn build_body(program: &mut Program, k: &Kernel, simd: bool) -> (esx_ir::FunctionBody, usize) {
    mark(program, k.object);
    let caller = program.function(k.caller).clone();
    let mut body = BodyBuilder::new(simd, &caller, k.object_ty);
    visit_kernel_object(program, k.object, &mut [&mut body]);
    let depth = body.init_depth();
    (body.finish(&caller), depth)
}

#[test]
fn body_initializes_then_runs_the_caller() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);

    let (body, depth) = build_body(&mut program, &k, false);
    assert_eq!(depth, 1);
    assert_eq!(body.stmts.len(), 3);
    let clone = VarId::new(0);
    assert_eq!(body.locals[0].ty, k.object_ty);

    let Stmt::Decl {
        var,
        init: Some(init),
    } = &body.stmts[0]
    else {
        panic!("expected the clone declaration, got {:?}", body.stmts[0]);
    };
    assert_eq!(*var, clone);
    let ExprKind::InitList(items) = body.exprs.kind(*init) else {
        panic!("expected an initializer list");
    };
    assert_eq!(body.exprs.kind(items[0]), &ExprKind::DefaultInit(acc));
    assert_eq!(body.exprs.kind(items[1]), &ExprKind::Param(3));

    let Stmt::Expr(call) = &body.stmts[1] else {
        panic!("expected the accessor initializer");
    };
    let ExprKind::MethodCall { method, args, .. } = body.exprs.kind(*call) else {
        panic!("expected a method call");
    };
    assert_eq!(method, INIT);
    let args: Vec<&ExprKind> = args.iter().map(|a| body.exprs.kind(*a)).collect();
    assert_eq!(
        args,
        vec![&ExprKind::Param(0), &ExprKind::Param(1), &ExprKind::Param(2)]
    );

    let Stmt::Expr(invoke) = &body.stmts[2] else {
        panic!("expected the caller statement");
    };
    let ExprKind::MethodCall { receiver, .. } = body.exprs.kind(*invoke) else {
        panic!("expected the kernel invocation");
    };
    assert_eq!(body.exprs.kind(*receiver), &ExprKind::Var(clone));
}

#[test]
fn streams_are_finalized_after_the_caller() {
    let mut program = Program::new();
    let stream = stream(&mut program);
    let k = kernel(&mut program, &[("out", stream, 0)], false);

    let (body, depth) = build_body(&mut program, &k, false);
    assert_eq!(depth, 1);

    let methods: Vec<&str> = body
        .stmts
        .iter()
        .filter_map(|s| match s {
            Stmt::Expr(e) => match body.exprs.kind(*e) {
                ExprKind::MethodCall { method, .. } => Some(method.as_str()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(
        methods,
        vec![INIT, INIT, INIT, "operator()", FINALIZE]
    );
}

#[test]
fn generic_pointers_are_cast_back() {
    let mut program = Program::new();
    let int = int(&mut program);
    let generic = program.types.pointer(int, esx_ir::AddressSpace::Generic);
    let k = kernel(&mut program, &[("p", generic, 0)], false);

    let (body, _) = build_body(&mut program, &k, false);
    let Stmt::Decl {
        init: Some(init), ..
    } = &body.stmts[0]
    else {
        panic!("expected the clone declaration");
    };
    let ExprKind::InitList(items) = body.exprs.kind(*init) else {
        panic!("expected an initializer list");
    };
    let ExprKind::AddrSpaceCast { operand, space } = body.exprs.kind(items[0]) else {
        panic!("expected an address space cast");
    };
    assert_eq!(*space, esx_ir::AddressSpace::Generic);
    assert_eq!(body.exprs.kind(*operand), &ExprKind::Param(0));
}

#[test]
fn spec_constants_are_default_initialized() {
    let mut program = Program::new();
    let constant = spec_constant(&mut program, "width");
    let k = kernel(&mut program, &[("c", constant, 0)], false);

    let (body, depth) = build_body(&mut program, &k, false);
    assert_eq!(depth, 1);
    let Stmt::Decl {
        init: Some(init), ..
    } = &body.stmts[0]
    else {
        panic!("expected the clone declaration");
    };
    let ExprKind::InitList(items) = body.exprs.kind(*init) else {
        panic!("expected an initializer list");
    };
    assert_eq!(body.exprs.kind(items[0]), &ExprKind::DefaultInit(constant));
    assert_eq!(body.stmts.len(), 3);
}

// -- Side table --

#[test]
fn nested_members_are_offset_from_the_object_start() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ptr = program.types.pointer(int, esx_ir::AddressSpace::Global);
    let (_, holder_ty) = record(&mut program, "Holder", &[("a", int, 0), ("p", ptr, 8)]);
    let k = kernel(
        &mut program,
        &[("n", int, 0), ("h", holder_ty, 8), ("q", ptr, 24)],
        false,
    );

    assert_eq!(
        descriptors(&mut program, k.object),
        vec![
            ParamDesc {
                kind: ParamKind::StdLayout,
                info: 4,
                offset: 0
            },
            ParamDesc {
                kind: ParamKind::StdLayout,
                info: 4,
                offset: 8
            },
            ParamDesc {
                kind: ParamKind::StdLayout,
                info: 8,
                offset: 16
            },
            ParamDesc {
                kind: ParamKind::Pointer,
                info: 8,
                offset: 24
            },
        ]
    );
}

#[test]
fn resources_describe_every_argument() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    let sampler = sampler(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("s", sampler, 32)], false);

    let descs = descriptors(&mut program, k.object);
    let accessor = ParamDesc {
        kind: ParamKind::Accessor,
        info: 2014 | (1 << 11),
        offset: 0,
    };
    assert_eq!(
        descs,
        vec![
            accessor,
            accessor,
            accessor,
            ParamDesc {
                kind: ParamKind::Sampler,
                info: 8,
                offset: 32
            },
        ]
    );
}

#[test]
fn stream_accessors_sit_inside_the_stream() {
    let mut program = Program::new();
    let stream = stream(&mut program);
    let k = kernel(&mut program, &[("out", stream, 8)], false);

    let descs = descriptors(&mut program, k.object);
    let offsets: Vec<(ParamKind, u32)> = descs.iter().map(|d| (d.kind, d.offset)).collect();
    assert_eq!(
        offsets,
        vec![
            (ParamKind::StdLayout, 8),
            (ParamKind::Accessor, 8),
            (ParamKind::Accessor, 8),
            (ParamKind::Accessor, 8),
            (ParamKind::Accessor, 40),
            (ParamKind::Accessor, 40),
            (ParamKind::Accessor, 40),
        ]
    );
}

#[test]
fn spec_constants_are_collected_not_described() {
    let mut program = Program::new();
    let constant = spec_constant(&mut program, "width");
    let k = kernel(&mut program, &[("c", constant, 0)], false);

    let mut table = SideTableBuilder::new(false);
    visit_kernel_object(&program, k.object, &mut [&mut table]);
    let (descs, constants) = table.finish();

    assert!(descs.is_empty());
    assert_eq!(
        constants,
        vec![SpecConstantId {
            type_name: "sycl::ONEAPI::experimental::spec_constant<int, width>".to_string(),
            id: "width".to_string(),
        }]
    );
}

// -- Utilities --

#[test]
fn initializer_names() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    let sampler = sampler(&mut program);
    let acc = program.record(program.types.as_record(acc).unwrap());
    let sampler = program.record(program.types.as_record(sampler).unwrap());

    assert_eq!(init_method(acc, false), INIT);
    assert_eq!(init_method(acc, true), INIT_ESIMD);
    assert_eq!(init_method(sampler, true), INIT);
}

#[test]
fn unqualified_strips_namespaces_and_arguments() {
    assert_eq!(unqualified("sycl::property::buffer_location<3>"), "buffer_location");
    assert_eq!(unqualified("accessor_property_list"), "accessor_property_list");
    assert_eq!(unqualified("a::b<c::d>"), "b");
}

#[test]
fn kernel_pointers_stay_in_global_spaces() {
    use esx_ir::AddressSpace;

    assert_eq!(kernel_pointer_space(AddressSpace::Generic), AddressSpace::Global);
    assert_eq!(kernel_pointer_space(AddressSpace::Local), AddressSpace::Global);
    assert_eq!(
        kernel_pointer_space(AddressSpace::GlobalDevice),
        AddressSpace::GlobalDevice
    );
}

#[test]
fn type_kinds_of_wrapped_pointers() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ptr = program.types.pointer(int, esx_ir::AddressSpace::Global);
    let (_, holder_ty) = record(&mut program, "Holder", &[("p", ptr, 0)]);
    let k = kernel(&mut program, &[("h", holder_ty, 0)], false);

    let params = params(&mut program, k.object, false);
    let wrapper = program.types.as_record(params[0].ty).unwrap();
    let inner = program.record(wrapper).fields[0].ty;

    assert!(matches!(
        program.types.kind(inner),
        TypeKind::Pointer { pointee, .. } if *pointee == int
    ));
}
