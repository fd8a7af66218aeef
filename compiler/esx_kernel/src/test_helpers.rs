//! Program builders shared by the unit tests.

use esx_ir::{
    AccessTarget, AccessorInfo, AddressSpace, AttrKind, Builtin, ExprKind, FuncId, FunctionBody,
    FunctionDecl, FunctionKind, InvocationKind, KernelNames, MethodParam, Program, RecordDecl,
    RecordId, RecordKind, Span, SpecialKind, Stmt, TemplateArg, TypeId,
};

pub(crate) const CALL_SPAN: Span = Span::new(100, 120);

pub(crate) fn int(program: &mut Program) -> TypeId {
    program.types.builtin(Builtin::Int)
}

/// `sycl::range<1>`: one `size_t`.
pub(crate) fn range(program: &mut Program) -> TypeId {
    let ulong = program.types.builtin(Builtin::ULong);
    program
        .add_record_type(
            RecordDecl::new("sycl::range<1>", RecordKind::Class)
                .with_field("dim", ulong, 0)
                .with_layout(8, 8),
        )
        .1
}

/// `sycl::accessor<int, 1>` with `__init(ptr, range, range)` and
/// `__init_esimd(ptr)`.
pub(crate) fn accessor_with(program: &mut Program, property_list: Option<TemplateArg>) -> TypeId {
    let int = int(program);
    let ptr = program.types.pointer(int, AddressSpace::Global);
    let range = range(program);
    let decl = RecordDecl::new("sycl::accessor<int, 1>", RecordKind::Class)
        .with_special(SpecialKind::Accessor(AccessorInfo {
            data_ty: int,
            dims: 1,
            target: AccessTarget::GlobalBuffer,
            property_list,
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

pub(crate) fn accessor(program: &mut Program) -> TypeId {
    accessor_with(program, None)
}

/// `sycl::sampler` with `__init(sampler)`.
pub(crate) fn sampler(program: &mut Program) -> TypeId {
    let handle = program.types.builtin(Builtin::Long);
    let decl = RecordDecl::new("sycl::sampler", RecordKind::Class)
        .with_special(SpecialKind::Sampler)
        .with_method("__init", vec![MethodParam::new("sampler", handle)])
        .with_layout(8, 8);
    program.add_record_type(decl).1
}

/// `sycl::stream` holding two accessors and a size.
pub(crate) fn stream(program: &mut Program) -> TypeId {
    let int = int(program);
    let acc = accessor(program);
    let ptr = program.types.pointer(int, AddressSpace::Global);
    let range = range(program);
    let decl = RecordDecl::new("sycl::stream", RecordKind::Class)
        .with_special(SpecialKind::Stream)
        .with_field("acc", acc, 0)
        .with_field("flush_acc", acc, 32)
        .with_field("size", int, 64)
        .with_method(
            "__init",
            vec![
                MethodParam::new("ptr", ptr),
                MethodParam::new("access_range", range),
                MethodParam::new("mem_range", range),
            ],
        )
        .with_method("__finalize", Vec::new())
        .with_layout(72, 8);
    program.add_record_type(decl).1
}

pub(crate) fn spec_constant(program: &mut Program, id: &str) -> TypeId {
    let decl = RecordDecl::new(
        format!("sycl::ONEAPI::experimental::spec_constant<int, {id}>"),
        RecordKind::Class,
    )
    .with_special(SpecialKind::SpecConstant { id: id.to_string() })
    .with_method("__init", Vec::new())
    .with_layout(4, 4);
    program.add_record_type(decl).1
}

/// A plain struct with the given `(name, type, offset)` fields.
pub(crate) fn record(
    program: &mut Program,
    name: &str,
    fields: &[(&str, TypeId, u64)],
) -> (RecordId, TypeId) {
    let size = layout_size(program, fields);
    let decl = fields
        .iter()
        .fold(RecordDecl::new(name, RecordKind::Struct), |decl, (n, ty, off)| {
            decl.with_field(*n, *ty, *off)
        })
        .with_layout(size, 8);
    program.add_record_type(decl)
}

fn layout_size(program: &Program, fields: &[(&str, TypeId, u64)]) -> u64 {
    let end = fields
        .iter()
        .map(|(_, ty, off)| off + program.size_of(*ty))
        .max()
        .unwrap_or(0);
    end.div_ceil(8) * 8
}

pub(crate) struct Kernel {
    pub caller: FuncId,
    pub object: RecordId,
    pub object_ty: TypeId,
    pub operator: FuncId,
}

/// A lambda kernel object with `fields`, its `operator()`, and a
/// `parallel_for` caller whose body invokes the lambda.
pub(crate) fn kernel(program: &mut Program, fields: &[(&str, TypeId, u64)], simd: bool) -> Kernel {
    let size = layout_size(program, fields);
    let decl = fields
        .iter()
        .fold(RecordDecl::new("lambda", RecordKind::Lambda), |decl, (n, ty, off)| {
            decl.with_field(*n, *ty, *off)
        })
        .with_layout(size, 8);
    let (object, object_ty) = program.add_record_type(decl);

    let mut op = FunctionDecl::new("lambda::operator()", FunctionKind::CallOperator(object));
    op.span = Span::new(10, 40);
    if simd {
        op = op.with_attr(AttrKind::ExplicitSimd, Span::new(10, 20));
    }
    let operator = program.add_function(op);
    program.record_mut(object).call_operator = Some(operator);

    let mut body = FunctionBody::new();
    let receiver = body.exprs.alloc(ExprKind::Param(0), CALL_SPAN);
    let call = body.exprs.alloc(
        ExprKind::MethodCall {
            receiver,
            method: "operator()".to_string(),
            args: Vec::new(),
        },
        CALL_SPAN,
    );
    body.stmts.push(Stmt::Expr(call));

    let mut caller = FunctionDecl::new(
        "sycl::handler::kernel_parallel_for<Name>",
        FunctionKind::KernelCaller {
            invocation: InvocationKind::ParallelFor,
            names: KernelNames {
                mangled: "_ZTS4Name".to_string(),
                stable: "_ZTSZ4mainE4Name".to_string(),
                type_name: "Name".to_string(),
            },
        },
    )
    .with_param("KernelFunc", object_ty)
    .with_call(operator, CALL_SPAN)
    .with_body(body);
    caller.span = CALL_SPAN;
    let caller = program.add_function(caller);

    Kernel {
        caller,
        object,
        object_ty,
        operator,
    }
}
