#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;
use crate::header::{ParamDesc, ParamKind};
use crate::test_helpers::{accessor, int, kernel, record, spec_constant, CALL_SPAN};
use esx_ir::{AttrKind, CallSite, Span};

fn codes(diags: &mut DiagnosticQueue) -> Vec<ErrorCode> {
    diags.flush().into_iter().map(|d| d.code).collect()
}

#[test]
fn accessor_and_scalar_become_four_arguments() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &SynthesisOptions::default(), &mut diags);

    assert!(codes(&mut diags).is_empty());
    assert_eq!(synthesis.kernels.len(), 1);
    let synthesized = &synthesis.kernels[0];
    assert_eq!(synthesized.caller, k.caller);
    assert_eq!(synthesized.object, k.object);
    assert!(!synthesized.simd);
    assert_eq!(synthesized.params.len(), 4);

    let decl = program.function(synthesized.kernel);
    assert_eq!(decl.name, "_ZTS4Name");
    assert_eq!(decl.kind, FunctionKind::Kernel);
    assert_eq!(decl.span, CALL_SPAN);
    assert_eq!(decl.params.len(), 4);
    assert_eq!(decl.params[3].name, "_arg_n");
    assert_eq!(decl.calls[0].callee, k.operator);
    assert!(!decl.invalid);

    let entry = synthesis.header.kernel("_ZTS4Name").unwrap();
    assert_eq!(entry.type_name, "Name");
    assert_eq!(entry.params.len(), 4);
    assert_eq!(
        entry.params[3],
        ParamDesc {
            kind: ParamKind::StdLayout,
            info: 4,
            offset: 32
        }
    );
    assert!(!entry.calls_this_item);
    assert_eq!(synthesis.propagation.roots, 1);
}

#[test]
fn this_capture_rejects_the_kernel() {
    let mut program = Program::new();
    let int = int(&mut program);
    let k = kernel(&mut program, &[("n", int, 0)], false);
    program.record_mut(k.object).implicit_this_capture = Some(Span::new(12, 16));

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &SynthesisOptions::default(), &mut diags);

    let reported = diags.flush();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].code, ErrorCode::E1010);
    assert_eq!(reported[0].kernel.as_deref(), Some("_ZTS4Name"));
    assert!(synthesis.kernels.is_empty());
    assert!(program.function(k.caller).invalid);
}

#[test]
fn illegal_objects_are_still_marked() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ptr = program.types.pointer(int, esx_ir::AddressSpace::Global);
    let reference = program.types.reference(int);
    let (holder, holder_ty) = record(&mut program, "Holder", &[("p", ptr, 0)]);
    let k = kernel(&mut program, &[("r", reference, 0), ("h", holder_ty, 8)], false);

    let mut diags = DiagnosticQueue::new();
    let result = check_kernel_call(&mut program, k.caller, &SynthesisOptions::default(), &mut diags);

    assert!(result.is_err());
    assert_eq!(codes(&mut diags), vec![ErrorCode::E1001]);
    assert!(program.requires_decomposition(holder));
    assert!(program.function(k.caller).invalid);
}

#[test]
fn invalid_callers_are_skipped() {
    let mut program = Program::new();
    let int = int(&mut program);
    let k = kernel(&mut program, &[("n", int, 0)], false);
    program.function_mut(k.caller).invalid = true;

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &SynthesisOptions::default(), &mut diags);

    assert!(synthesis.kernels.is_empty());
    assert!(synthesis.header.kernels().is_empty());
    assert!(codes(&mut diags).is_empty());
}

#[test]
fn callers_without_an_object_are_rejected() {
    let mut program = Program::new();
    let caller = program.add_function(FunctionDecl::new(
        "sycl::handler::kernel_single_task<Empty>",
        FunctionKind::KernelCaller {
            invocation: InvocationKind::SingleTask,
            names: KernelNames {
                mangled: "_ZTS5Empty".to_string(),
                stable: "_ZTS5Empty".to_string(),
                type_name: "Empty".to_string(),
            },
        },
    ));

    let mut diags = DiagnosticQueue::new();
    let result = check_kernel_call(&mut program, caller, &SynthesisOptions::default(), &mut diags);

    assert!(result.is_err());
    assert_eq!(codes(&mut diags), vec![ErrorCode::E9001]);
}

#[test]
fn oversized_arguments_warn_but_synthesize() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    kernel(&mut program, &[("acc", acc, 0)], false);
    let options = SynthesisOptions {
        max_kernel_args_size: 8,
        ..SynthesisOptions::default()
    };

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &options, &mut diags);

    assert_eq!(codes(&mut diags), vec![ErrorCode::W1001]);
    assert_eq!(synthesis.kernels.len(), 1);
}

#[test]
fn this_item_calls_are_detected() {
    let mut program = Program::new();
    let int = int(&mut program);
    let k = kernel(&mut program, &[("n", int, 0)], false);
    let this_item = program.add_function(FunctionDecl::new(
        "sycl::this_item",
        FunctionKind::Free,
    ));
    program.function_mut(k.operator).calls.push(CallSite {
        callee: this_item,
        span: Span::new(30, 35),
    });

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &SynthesisOptions::default(), &mut diags);

    assert!(synthesis.header.kernels()[0].calls_this_item);
}

#[test]
fn unnamed_lambdas_use_the_stable_name() {
    let mut program = Program::new();
    let int = int(&mut program);
    kernel(&mut program, &[("n", int, 0)], false);
    let options = SynthesisOptions {
        unnamed_lambda: true,
        ..SynthesisOptions::default()
    };

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &options, &mut diags);

    let decl = program.function(synthesis.kernels[0].kernel);
    assert_eq!(decl.name, "_ZTSZ4mainE4Name");
    assert!(synthesis.header.kernel("_ZTSZ4mainE4Name").is_some());
    assert!(synthesis
        .header
        .to_string()
        .contains("template <> struct KernelInfoData<'_', 'Z', 'T', 'S'"));
}

#[test]
fn simd_kernels_are_tagged_end_to_end() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0)], true);

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &SynthesisOptions::default(), &mut diags);

    let synthesized = &synthesis.kernels[0];
    assert!(synthesized.simd);
    assert_eq!(synthesized.params.len(), 1);
    assert!(synthesized.params[0].esimd_accessor_ptr);
    assert!(synthesis.header.kernels()[0].esimd);
    assert!(program.function(synthesized.kernel).is_explicit_simd());
    assert!(program.function(k.operator).is_explicit_simd());
    assert!(program
        .function(synthesized.kernel)
        .find_attr(&AttrKind::ExplicitSimd)
        .is_some_and(|a| a.implicit));
}

#[test]
fn spec_constants_reach_the_header() {
    let mut program = Program::new();
    let constant = spec_constant(&mut program, "width");
    kernel(&mut program, &[("c", constant, 0)], false);

    let mut diags = DiagnosticQueue::new();
    let synthesis = synthesize(&mut program, &SynthesisOptions::default(), &mut diags);

    let ids: Vec<&str> = synthesis
        .header
        .spec_constants()
        .iter()
        .map(|sc| sc.id.as_str())
        .collect();
    assert_eq!(ids, vec!["width"]);
    assert!(synthesis.kernels[0].params.is_empty());
}
