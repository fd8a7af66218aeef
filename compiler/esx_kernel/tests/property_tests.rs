//! Property-based tests for kernel entry synthesis.
//!
//! These check properties that hold across whole families of kernel objects:
//! 1. Agreement: entry parameters and side-table descriptors line up one to one
//! 2. Round trip: rebuilding an object from its flattened arguments is lossless
//! 3. Offsets: elements of a decomposed array sit one element size apart
//! 4. Exclusivity: every container takes the simple path or is entered, never both
//! 5. Determinism: synthesizing the same program twice gives the same header

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::doc_markdown,
    clippy::disallowed_types,
    clippy::uninlined_format_args,
    reason = "Proptest macros generate code with these patterns"
)]

use esx_diagnostic::queue::DiagnosticQueue;
use esx_ir::{
    AccessTarget, AccessorInfo, AddressSpace, AttrKind, Builtin, DecompositionMarks, ExprKind,
    FieldRef, FuncId, FunctionBody, FunctionDecl, FunctionKind, InvocationKind, KernelNames,
    MethodParam, Program, RecordDecl, RecordId, RecordKind, Span, SpecialKind, Stmt, TypeId,
};
use esx_kernel::eval::{flatten, round_trip, Value};
use esx_kernel::visitor::{visit_kernel_object, Capabilities, Event, FieldHandler};
use esx_kernel::{check_kernel_call, synthesize, ParamKind, SynthesisOptions};
use proptest::prelude::*;

// -- Builders --

#[derive(Copy, Clone, Debug)]
enum Member {
    Int,
    /// `true` for a generic-space pointer.
    Pointer(bool),
    Accessor,
    /// A struct holding an int and a pointer.
    Holder,
    /// A struct of two ints.
    Plain,
    Ints(u64),
}

fn member() -> impl Strategy<Value = Member> {
    prop_oneof![
        Just(Member::Int),
        any::<bool>().prop_map(Member::Pointer),
        Just(Member::Accessor),
        Just(Member::Holder),
        Just(Member::Plain),
        (1u64..5).prop_map(Member::Ints),
    ]
}

fn accessor_type(program: &mut Program) -> TypeId {
    let int = program.types.builtin(Builtin::Int);
    let ulong = program.types.builtin(Builtin::ULong);
    let ptr = program.types.pointer(int, AddressSpace::Global);
    let (_, range) = program.add_record_type(
        RecordDecl::new("sycl::range<1>", RecordKind::Class)
            .with_field("dim", ulong, 0)
            .with_layout(8, 8),
    );
    let decl = RecordDecl::new("sycl::accessor<int, 1>", RecordKind::Class)
        .with_special(SpecialKind::Accessor(AccessorInfo {
            data_ty: int,
            dims: 1,
            target: AccessTarget::GlobalBuffer,
            property_list: None,
        }))
        .with_method(
            "__init",
            vec![
                MethodParam::new("ptr", ptr),
                MethodParam::new("access_range", range),
                MethodParam::new("mem_range", range),
            ],
        )
        .with_method("__init_esimd", vec![MethodParam::new("ptr", ptr)])
        .with_layout(32, 8);
    program.add_record_type(decl).1
}

fn member_type(program: &mut Program, member: Member) -> TypeId {
    let int = program.types.builtin(Builtin::Int);
    match member {
        Member::Int => int,
        Member::Pointer(generic) => {
            let space = if generic {
                AddressSpace::Generic
            } else {
                AddressSpace::Global
            };
            program.types.pointer(int, space)
        }
        Member::Accessor => accessor_type(program),
        Member::Holder => {
            let ptr = program.types.pointer(int, AddressSpace::Global);
            let decl = RecordDecl::new("Holder", RecordKind::Struct)
                .with_field("n", int, 0)
                .with_field("p", ptr, 8)
                .with_layout(16, 8);
            program.add_record_type(decl).1
        }
        Member::Plain => {
            let decl = RecordDecl::new("Plain", RecordKind::Struct)
                .with_field("a", int, 0)
                .with_field("b", int, 4)
                .with_layout(8, 4);
            program.add_record_type(decl).1
        }
        Member::Ints(len) => program.types.array(int, len),
    }
}

struct Built {
    program: Program,
    caller: FuncId,
    object: RecordId,
    object_ty: TypeId,
}

/// A lambda capturing `fields` at the given offsets, plus its caller.
fn build_with(mut program: Program, fields: &[(TypeId, u64)], simd: bool) -> Built {
    let end = fields
        .iter()
        .map(|(ty, offset)| offset + program.size_of(*ty))
        .max()
        .unwrap_or(0);
    let decl = fields
        .iter()
        .enumerate()
        .fold(RecordDecl::new("lambda", RecordKind::Lambda), |decl, (i, (ty, offset))| {
            decl.with_field(format!("m{i}"), *ty, *offset)
        })
        .with_layout(end.div_ceil(8) * 8, 8);
    let (object, object_ty) = program.add_record_type(decl);

    let mut operator = FunctionDecl::new("lambda::operator()", FunctionKind::CallOperator(object));
    if simd {
        operator = operator.with_attr(AttrKind::ExplicitSimd, Span::new(1, 2));
    }
    let operator = program.add_function(operator);
    program.record_mut(object).call_operator = Some(operator);

    let span = Span::new(10, 20);
    let mut body = FunctionBody::new();
    let receiver = body.exprs.alloc(ExprKind::Param(0), span);
    let call = body.exprs.alloc(
        ExprKind::MethodCall {
            receiver,
            method: "operator()".to_string(),
            args: Vec::new(),
        },
        span,
    );
    body.stmts.push(Stmt::Expr(call));

    let caller = program.add_function(
        FunctionDecl::new(
            "sycl::handler::kernel_parallel_for<K>",
            FunctionKind::KernelCaller {
                invocation: InvocationKind::ParallelFor,
                names: KernelNames {
                    mangled: "_ZTS1K".to_string(),
                    stable: "_ZTSZ4mainE1K".to_string(),
                    type_name: "K".to_string(),
                },
            },
        )
        .with_param("KernelFunc", object_ty)
        .with_call(operator, span)
        .with_body(body),
    );
    Built {
        program,
        caller,
        object,
        object_ty,
    }
}

fn build(members: &[Member], simd: bool) -> Built {
    let mut program = Program::new();
    let mut offset = 0;
    let mut fields = Vec::with_capacity(members.len());
    for &member in members {
        let ty = member_type(&mut program, member);
        fields.push((ty, offset));
        offset = (offset + program.size_of(ty)).div_ceil(8) * 8;
    }
    build_with(program, &fields, simd)
}

/// Counts how containers are handled by a handler that skips simple ones.
#[derive(Default)]
struct PathCounter {
    structs: usize,
    simple_structs: usize,
    entered_structs: usize,
    arrays: usize,
    simple_arrays: usize,
    entered_arrays: usize,
}

impl FieldHandler for PathCounter {
    fn capabilities(&self) -> Capabilities {
        Capabilities::VISIT_EVERY_ELEMENT
    }

    fn handle(&mut self, _program: &Program, event: &Event) {
        match event {
            Event::Struct { .. } => self.structs += 1,
            Event::SimpleStruct { .. } => self.simple_structs += 1,
            Event::EnterStruct { .. } => self.entered_structs += 1,
            Event::Array(_) => self.arrays += 1,
            Event::SimpleArray(_) => self.simple_arrays += 1,
            Event::EnterArray { .. } => self.entered_arrays += 1,
            _ => {}
        }
    }
}

// -- Properties --

proptest! {
    #[test]
    fn params_and_descriptors_agree(
        members in prop::collection::vec(member(), 0..8),
        simd in any::<bool>(),
    ) {
        let mut built = build(&members, simd);
        let mut diags = DiagnosticQueue::new();
        let synthesis = synthesize(&mut built.program, &SynthesisOptions::default(), &mut diags);

        prop_assert!(diags.has_errors().is_none());
        prop_assert_eq!(synthesis.kernels.len(), 1);
        let kernel = &synthesis.kernels[0];
        let entry = &synthesis.header.kernels()[0];
        prop_assert_eq!(kernel.params.len(), entry.params.len());
        prop_assert_eq!(
            built.program.function(kernel.kernel).params.len(),
            kernel.params.len()
        );
        for (param, desc) in kernel.params.iter().zip(&entry.params) {
            if param.esimd_accessor_ptr {
                prop_assert_eq!(desc.kind, ParamKind::Accessor);
            }
        }
    }

    #[test]
    fn flattening_round_trips(
        members in prop::collection::vec(member(), 0..8),
        simd in any::<bool>(),
        seed in 0i64..1000,
    ) {
        let mut built = build(&members, simd);
        let mut diags = DiagnosticQueue::new();
        let synthesis = synthesize(&mut built.program, &SynthesisOptions::default(), &mut diags);
        let kernel = &synthesis.kernels[0];
        let body = built.program.function(kernel.kernel).body.clone().unwrap();

        let mut next = seed;
        let object = Value::sample(&built.program, built.object_ty, simd, &mut next);
        let args = flatten(&built.program, built.object, &object).unwrap();
        prop_assert_eq!(args.len(), kernel.params.len());
        prop_assert_eq!(round_trip(&built.program, built.object, &body, &object), Ok(object));
    }

    #[test]
    fn decomposed_array_elements_are_evenly_spaced(len in 1u64..9) {
        let mut program = Program::new();
        let int = program.types.builtin(Builtin::Int);
        let array = program.types.array(int, len);
        let mut built = build_with(
            program,
            &[(int, 0), (int, 8), (int, 16), (array, 20)],
            false,
        );
        let mut marks = DecompositionMarks::new();
        marks.mark_array_field(FieldRef::new(built.object, 3));
        built.program.apply_marks(&marks);

        let mut diags = DiagnosticQueue::new();
        let synthesis = synthesize(&mut built.program, &SynthesisOptions::default(), &mut diags);
        let offsets: Vec<u32> = synthesis.header.kernels()[0]
            .params
            .iter()
            .map(|d| d.offset)
            .collect();

        let expected: Vec<u32> = [0, 8, 16]
            .into_iter()
            .chain((0..len).map(|i| 20 + 4 * u32::try_from(i).unwrap()))
            .collect();
        prop_assert_eq!(offsets, expected);
        prop_assert_eq!(synthesis.kernels[0].params.len(), 3 + usize::try_from(len).unwrap());
    }

    #[test]
    fn containers_take_exactly_one_path(members in prop::collection::vec(member(), 0..8)) {
        let mut built = build(&members, false);
        let mut diags = DiagnosticQueue::new();
        check_kernel_call(
            &mut built.program,
            built.caller,
            &SynthesisOptions::default(),
            &mut diags,
        )
        .unwrap();

        let mut counter = PathCounter::default();
        visit_kernel_object(&built.program, built.object, &mut [&mut counter]);
        prop_assert_eq!(counter.structs, counter.simple_structs + counter.entered_structs);
        prop_assert_eq!(counter.arrays, counter.simple_arrays + counter.entered_arrays);
    }

    #[test]
    fn synthesis_is_deterministic(
        members in prop::collection::vec(member(), 0..8),
        simd in any::<bool>(),
    ) {
        let render = || {
            let mut built = build(&members, simd);
            let mut diags = DiagnosticQueue::new();
            let synthesis =
                synthesize(&mut built.program, &SynthesisOptions::default(), &mut diags);
            (synthesis.header.to_string(), synthesis.header.encode())
        };
        prop_assert_eq!(render(), render());
    }
}

#[test]
fn accessor_and_int_give_four_arguments() {
    let mut program = Program::new();
    let acc = accessor_type(&mut program);
    let int = program.types.builtin(Builtin::Int);
    let mut built = build_with(program, &[(acc, 0), (int, 32)], false);

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut built.program, &SynthesisOptions::default(), &mut diags);

    let kinds: Vec<ParamKind> = synthesis.header.kernels()[0]
        .params
        .iter()
        .map(|d| d.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ParamKind::Accessor,
            ParamKind::Accessor,
            ParamKind::Accessor,
            ParamKind::StdLayout
        ]
    );
    assert_eq!(synthesis.kernels[0].params.len(), 4);
}
