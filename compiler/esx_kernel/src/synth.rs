//! Kernel entry synthesis.
//!
//! For every kernel caller instantiation:
//! 1. [`check_kernel_call`] validates the kernel object and records which of
//!    its containers must be decomposed.
//! 2. [`construct_kernel`] builds the device entry (flat parameters, body)
//!    and its integration header entry in one walk.
//!
//! [`synthesize`] drives both for the whole program, then runs attribute
//! propagation over the new kernels.

use esx_diagnostic::queue::DiagnosticQueue;
use esx_diagnostic::{Diagnostic, ErrorCode, ErrorGuaranteed};
use esx_ir::{
    FuncId, FunctionDecl, FunctionKind, InvocationKind, KernelNames, ParamDecl, Program, RecordId,
};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::handlers::{
    ArgsSizeChecker, BodyBuilder, DeclBuilder, DecompositionMarker, KernelParam, LegalityChecker,
    SideTableBuilder, UnionChecker, MAX_KERNEL_ARGS_SIZE,
};
use crate::header::IntegrationHeader;
use crate::propagate::{propagate_attributes, PropagationReport};
use crate::visitor::visit_kernel_object;

/// Knobs for kernel synthesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Total kernel argument size above which a warning is issued.
    pub max_kernel_args_size: u64,
    /// Name kernels by their stable lambda name.
    pub unnamed_lambda: bool,
    /// Reject kernel arguments whose class is not standard layout.
    pub std_layout_kernel_params: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        SynthesisOptions {
            max_kernel_args_size: MAX_KERNEL_ARGS_SIZE,
            unnamed_lambda: false,
            std_layout_kernel_params: false,
        }
    }
}

/// A device kernel entry produced from one caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesizedKernel {
    pub caller: FuncId,
    pub kernel: FuncId,
    pub object: RecordId,
    pub simd: bool,
    /// Flat argument list, one entry per kernel parameter.
    pub params: Vec<KernelParam>,
}

#[derive(Debug)]
pub struct Synthesis {
    pub kernels: Vec<SynthesizedKernel>,
    pub header: IntegrationHeader,
    pub propagation: PropagationReport,
}

/// Report `diagnostics` raised for `kernel`, returning proof if any of
/// them is an error.
fn report(
    diags: &mut DiagnosticQueue,
    kernel: &str,
    diagnostics: Vec<Diagnostic>,
) -> Option<ErrorGuaranteed> {
    let mut guarantee = None;
    for diag in diagnostics {
        let diag = diag.in_kernel(kernel);
        if diag.is_error() && guarantee.is_none() {
            guarantee = Some(diags.emit_error(diag));
        } else {
            diags.add(diag);
        }
    }
    guarantee
}

/// Validate the kernel object passed to `caller`.
///
/// Applies decomposition marks to `program` whether or not the object is
/// legal; an illegal object marks `caller` invalid.
pub fn check_kernel_call(
    program: &mut Program,
    caller: FuncId,
    options: &SynthesisOptions,
    diags: &mut DiagnosticQueue,
) -> Result<RecordId, ErrorGuaranteed> {
    let caller_decl = program.function(caller);
    let kernel = kernel_name(caller_decl).to_string();
    let launch = caller_decl.span;
    let Some(object) = program.kernel_object(caller) else {
        return Err(diags.emit_error(
            Diagnostic::error(ErrorCode::E9001)
                .with_message(format!(
                    "kernel caller '{}' takes no kernel object",
                    caller_decl.name
                ))
                .with_label(launch, "kernel launched here")
                .in_kernel(&kernel),
        ));
    };

    let mut diagnostics = Vec::new();
    if let Some(capture) = program.record(object).implicit_this_capture {
        diagnostics.push(
            Diagnostic::error(ErrorCode::E1010)
                .with_message("implicit capture of 'this' is not allowed for kernel functions")
                .with_label(capture, "'this' captured here")
                .with_secondary_label(launch, "kernel launched here")
                .with_note("capture the needed members by copy instead"),
        );
    }

    let simd = program.is_simd_kernel_object(object);
    let mut legality = LegalityChecker::new(simd, options.std_layout_kernel_params);
    let mut unions = UnionChecker::new();
    let mut marker = DecompositionMarker::new();
    visit_kernel_object(
        program,
        object,
        &mut [&mut legality, &mut unions, &mut marker],
    );
    let legal = legality.is_valid() && unions.is_valid();
    diagnostics.extend(legality.into_diagnostics());
    diagnostics.extend(unions.into_diagnostics());
    program.apply_marks(&marker.into_marks());

    if legal {
        let mut size = ArgsSizeChecker::new(simd, options.max_kernel_args_size);
        visit_kernel_object(program, object, &mut [&mut size]);
        diagnostics.extend(size.finish(launch));
    }

    match report(diags, &kernel, diagnostics) {
        Some(guarantee) => {
            program.function_mut(caller).invalid = true;
            debug!(caller = %program.function(caller).name, "kernel object rejected");
            Err(guarantee)
        }
        None => Ok(object),
    }
}

/// The name diagnostics use for the kernel launched by `caller`.
fn kernel_name(caller: &FunctionDecl) -> &str {
    match &caller.kind {
        FunctionKind::KernelCaller { names, .. } => &names.mangled,
        _ => &caller.name,
    }
}

/// True when `from` reaches a function named `sycl::this_item`.
fn calls_this_item(program: &Program, from: FuncId) -> bool {
    let mut visited = FxHashSet::default();
    let mut worklist = vec![from];
    while let Some(func) = worklist.pop() {
        if !visited.insert(func) {
            continue;
        }
        let decl = program.function(func);
        if decl.name.ends_with("sycl::this_item") {
            return true;
        }
        worklist.extend(decl.calls.iter().map(|c| c.callee));
    }
    false
}

/// Build the device entry for a checked kernel call.
pub fn construct_kernel(
    program: &mut Program,
    caller: FuncId,
    object: RecordId,
    options: &SynthesisOptions,
    header: &mut IntegrationHeader,
    diags: &mut DiagnosticQueue,
) -> SynthesizedKernel {
    let simd = program.is_simd_kernel_object(object);
    let object_ty = program.types.record(object);
    let caller_decl = program.function(caller).clone();
    let (invocation, names) = match &caller_decl.kind {
        FunctionKind::KernelCaller { invocation, names } => (*invocation, names.clone()),
        _ => (
            InvocationKind::SingleTask,
            KernelNames {
                mangled: caller_decl.name.clone(),
                stable: caller_decl.name.clone(),
                type_name: caller_decl.name.clone(),
            },
        ),
    };
    let name = if options.unnamed_lambda {
        names.stable.clone()
    } else {
        names.mangled.clone()
    };

    let mut decls = DeclBuilder::new(simd);
    let mut body = BodyBuilder::new(simd, &caller_decl, object_ty);
    let mut table = SideTableBuilder::new(simd);
    visit_kernel_object(program, object, &mut [&mut decls, &mut body, &mut table]);
    debug_assert_eq!(body.init_depth(), 1, "unbalanced initializer stack");

    let (params, decl_diags) = decls.finish(program);
    let invalid = report(diags, &name, decl_diags).is_some();
    let (descs, spec_constants) = table.finish();

    let mut kernel = FunctionDecl::new(name.clone(), FunctionKind::Kernel);
    kernel.span = caller_decl.span;
    kernel.params = params
        .iter()
        .map(|p| ParamDecl {
            name: p.name.clone(),
            ty: p.ty,
            span: p.span,
        })
        .collect();
    kernel.calls.clone_from(&caller_decl.calls);
    kernel.body = Some(body.finish(&caller_decl));
    kernel.invalid = invalid;
    let kernel = program.add_function(kernel);

    let this_item =
        invocation == InvocationKind::ParallelFor && calls_this_item(program, kernel);
    let entry = header.start_kernel(name.as_str(), names.type_name, names.stable, simd);
    entry.params = descs;
    entry.calls_this_item = this_item;
    header.add_spec_constants(spec_constants);

    debug!(
        kernel = %name,
        params = params.len(),
        simd,
        "synthesized kernel"
    );
    SynthesizedKernel {
        caller,
        kernel,
        object,
        simd,
        params,
    }
}

/// Synthesize a kernel for every legal kernel caller, then propagate
/// kernel attributes.
pub fn synthesize(
    program: &mut Program,
    options: &SynthesisOptions,
    diags: &mut DiagnosticQueue,
) -> Synthesis {
    let callers: Vec<FuncId> = program
        .kernel_callers()
        .filter(|&c| !program.function(c).invalid)
        .collect();
    let mut header = IntegrationHeader::new(options.unnamed_lambda);
    let mut kernels = Vec::with_capacity(callers.len());

    for caller in callers {
        if let Ok(object) = check_kernel_call(program, caller, options, diags) {
            kernels.push(construct_kernel(
                program,
                caller,
                object,
                options,
                &mut header,
                diags,
            ));
        }
    }

    let propagation = propagate_attributes(program, diags);
    Synthesis {
        kernels,
        header,
        propagation,
    }
}

#[cfg(test)]
mod tests;
