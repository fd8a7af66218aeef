#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;
use esx_diagnostic::ErrorCode;
use esx_ir::{
    AccessTarget, AccessorInfo, AddressSpace, AttrKind, Builtin, ExprKind, FuncId, FunctionBody,
    FunctionDecl, FunctionKind, InvocationKind, KernelNames, MethodParam, RecordDecl, RecordId,
    RecordKind, Span, SpecialKind, Stmt,
};
use esx_lower::{CallingConv, Function, Ty};

const CALL_SPAN: Span = Span::new(100, 120);

struct Kernel {
    object: RecordId,
    operator: FuncId,
}

/// A lambda holding one accessor, launched by `parallel_for`.
fn accessor_kernel(program: &mut Program, simd: bool) -> Kernel {
    let int = program.types.builtin(Builtin::Int);
    let ulong = program.types.builtin(Builtin::ULong);
    let ptr = program.types.pointer(int, AddressSpace::Global);
    let (_, range) = program.add_record_type(
        RecordDecl::new("sycl::range<1>", RecordKind::Class)
            .with_field("dim", ulong, 0)
            .with_layout(8, 8),
    );
    let (_, accessor) = program.add_record_type(
        RecordDecl::new("sycl::accessor<int, 1>", RecordKind::Class)
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
            .with_layout(32, 8),
    );
    let (object, object_ty) = program.add_record_type(
        RecordDecl::new("lambda", RecordKind::Lambda)
            .with_field("acc", accessor, 0)
            .with_layout(32, 8),
    );

    let mut op = FunctionDecl::new("lambda::operator()", FunctionKind::CallOperator(object));
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
    program.add_function(caller);

    Kernel { object, operator }
}

/// Device module with the kernel entry and the lambda's call operator.
fn device_module(kernel_params: Vec<Ty>) -> Module {
    let mut module = Module::new("device", "spir64-unknown-unknown");
    module.add_function(Function::definition(
        "_ZTS4Name",
        kernel_params,
        Ty::Void,
        CallingConv::SpirKernel,
    ));
    module.add_function(Function::definition(
        "lambda::operator()",
        Vec::new(),
        Ty::Void,
        CallingConv::Spir,
    ));
    module
}

#[test]
fn simd_kernels_reach_the_lowering_pass() {
    let mut program = Program::new();
    accessor_kernel(&mut program, true);
    let mut module = device_module(vec![Ty::ptr(1)]);

    let output = compile_device(&mut program, &mut module, &Config::default()).unwrap();

    assert!(!output.has_errors());
    assert_eq!(output.lowering.map(|s| s.functions), Some(2));
    let kernel = module.function(module.find_function("_ZTS4Name").unwrap());
    assert!(kernel.metadata.explicit_simd);
    assert_eq!(kernel.metadata.accessor_ptrs, vec![true]);
    assert_eq!(kernel.metadata.arg_types.len(), 1);
    let operator = module.function(module.find_function("lambda::operator()").unwrap());
    assert!(operator.metadata.explicit_simd);

    let kernels = module.genx_kernels.as_ref().unwrap();
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].arg_descs, vec!["buffer_t".to_string()]);
    assert!(output.header.unwrap().contains("\"_ZTS4Name\""));
}

#[test]
fn plain_kernels_are_left_alone() {
    let mut program = Program::new();
    accessor_kernel(&mut program, false);
    let mut module = device_module(vec![Ty::ptr(1), Ty::I64, Ty::I64]);

    let output = compile_device(&mut program, &mut module, &Config::default()).unwrap();

    assert_eq!(output.lowering.map(|s| s.functions), Some(0));
    let kernel = module.function(module.find_function("_ZTS4Name").unwrap());
    assert!(!kernel.metadata.explicit_simd);
    assert_eq!(kernel.metadata.accessor_ptrs, vec![false, false, false]);
    assert_eq!(module.genx_kernels.as_ref().map(Vec::len), Some(0));
}

#[test]
fn synthesis_errors_stop_before_lowering() {
    let mut program = Program::new();
    let k = accessor_kernel(&mut program, true);
    program.record_mut(k.object).implicit_this_capture = Some(Span::new(12, 16));
    let mut module = device_module(vec![Ty::ptr(1)]);

    let output = compile_device(&mut program, &mut module, &Config::default()).unwrap();

    assert!(output.has_errors());
    assert_eq!(output.diagnostics[0].code, ErrorCode::E1010);
    assert!(output.lowering.is_none());
    assert!(output.header.is_none());
    assert!(module.genx_kernels.is_none());
    assert!(program.function(k.operator).is_explicit_simd());
}

#[test]
fn headers_can_be_skipped() {
    let mut program = Program::new();
    accessor_kernel(&mut program, false);
    let mut module = device_module(vec![Ty::ptr(1), Ty::I64, Ty::I64]);
    let config = Config {
        emit_header: false,
        ..Config::default()
    };

    let output = compile_device(&mut program, &mut module, &config).unwrap();

    assert!(output.lowering.is_some());
    assert!(output.header.is_none());
}

#[test]
fn kernels_without_a_device_function_are_skipped() {
    let mut program = Program::new();
    accessor_kernel(&mut program, true);
    let mut module = Module::new("device", "spir64-unknown-unknown");

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &Config::default().synthesis_options(), &mut diags);

    assert_eq!(annotate_module(&program, &synthesis, &mut module), 0);
    assert_eq!(module.function_count(), 0);
}

#[test]
fn diagnostics_render_with_a_summary() {
    let mut program = Program::new();
    let k = accessor_kernel(&mut program, false);
    program.record_mut(k.object).implicit_this_capture = Some(Span::new(12, 16));
    let mut module = device_module(Vec::new());
    let output = compile_device(&mut program, &mut module, &Config::default()).unwrap();

    let mut rendered = Vec::new();
    emit_diagnostics(&mut rendered, &output.diagnostics, ColorMode::Never, false);

    let text = String::from_utf8(rendered).unwrap();
    assert!(text.starts_with("error[E1010]: "));
    assert!(text.contains("\n  = kernel: _ZTS4Name\n"));
    assert!(text.ends_with("error: aborting due to previous error\n"));
}
