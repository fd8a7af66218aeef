//! Kernel attribute propagation over the static call graph.
//!
//! Attributes such as `reqd_work_group_size` may be written on any function a
//! kernel reaches; the runtime only reads them off the kernel. For every root
//! (synthesized kernels and device-external functions) this pass collects
//! the attributes of every reachable function, re-applies them to the root,
//! and reports combinations that cannot all hold.
//!
//! # Design
//!
//! Collection only reads the program; the edits it implies (attributes to
//! drop, attributes to add, declarations to invalidate) are gathered first
//! and applied afterwards. Explicit SIMD flooding runs last, once every root
//! has been checked against the SIMD state its body was written with.

use esx_diagnostic::queue::DiagnosticQueue;
use esx_diagnostic::{Diagnostic, ErrorCode};
use esx_ir::{Attr, AttrKind, FuncId, FunctionKind, Program, Span};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

/// What propagation changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub roots: usize,
    /// Declarations marked invalid by a conflict.
    pub invalidated: Vec<FuncId>,
    /// Functions that received an implicit explicit-SIMD marker.
    pub simd_marked: usize,
}

/// Propagate kernel attributes for every root in `program`.
pub fn propagate_attributes(
    program: &mut Program,
    diags: &mut DiagnosticQueue,
) -> PropagationReport {
    let roots: Vec<FuncId> = program
        .functions()
        .filter(|(_, f)| matches!(f.kind, FunctionKind::Kernel) || f.device_external)
        .map(|(id, _)| id)
        .collect();

    let mut report = PropagationReport {
        roots: roots.len(),
        ..PropagationReport::default()
    };
    let mut graph = KernelGraph::default();
    let mut simd_bodies = Vec::new();

    for &root in &roots {
        let mut stack = FxHashSet::default();
        graph.collect(program, root, &mut stack);

        let collected = collect_attributes(program, root, diags);
        for (func, probe) in &collected.dropped {
            program.function_mut(*func).remove_attrs(probe);
        }
        apply_attributes(program, root, &collected, diags, &mut report);

        if let Some(body) = collected.body {
            if program.function(body).is_explicit_simd() {
                simd_bodies.push(body);
            }
        }
    }

    graph.warn_recursion(program, diags);
    for body in simd_bodies {
        report.simd_marked += flood_simd(program, body);
    }
    report
}

// ── Reachability and recursion ──

#[derive(Default)]
struct KernelGraph {
    reached: FxHashSet<FuncId>,
    recursive: FxHashSet<FuncId>,
}

impl KernelGraph {
    /// Depth-first walk from `node`; `stack` holds the functions on the
    /// current path.
    fn collect(&mut self, program: &Program, node: FuncId, stack: &mut FxHashSet<FuncId>) {
        if !self.reached.insert(node) {
            return;
        }
        for call in &program.function(node).calls {
            if stack.contains(&call.callee) {
                self.recursive.insert(call.callee);
                self.recursive.insert(node);
            } else {
                stack.insert(call.callee);
                self.collect(program, call.callee, stack);
                stack.remove(&call.callee);
            }
        }
    }

    /// One warning per call into a recursive function from reachable code.
    fn warn_recursion(&self, program: &Program, diags: &mut DiagnosticQueue) {
        let mut reached: Vec<FuncId> = self.reached.iter().copied().collect();
        reached.sort_unstable();
        for caller in reached {
            for call in &program.function(caller).calls {
                if self.recursive.contains(&call.callee) {
                    diags.add(
                        Diagnostic::warning(ErrorCode::W1002)
                            .with_message(format!(
                                "kernel code cannot call recursive function '{}'",
                                program.function(call.callee).name
                            ))
                            .with_label(call.span, "recursive call reachable from a kernel"),
                    );
                }
            }
        }
    }
}

// ── Collection ──

struct Collected {
    /// Each attribute with the function it was written on.
    attrs: Vec<(FuncId, Attr)>,
    /// The kernel object's call operator, if reached.
    body: Option<FuncId>,
    /// Attributes to remove from a function, by kind.
    dropped: Vec<(FuncId, AttrKind)>,
}

fn collect_attributes(
    program: &Program,
    root: FuncId,
    diags: &mut DiagnosticQueue,
) -> Collected {
    let mut collected = Collected {
        attrs: Vec::new(),
        body: None,
        dropped: Vec::new(),
    };
    let mut visited = FxHashSet::default();
    let mut worklist: Vec<(FuncId, Option<FuncId>)> = vec![(root, None)];

    while let Some((func, parent)) = worklist.pop() {
        let decl = program.function(func);
        // A call operator called from the kernel, or from the current body
        // (range rounding wraps the user's lambda in another), is the body.
        if decl.is_call_operator()
            && parent.is_some()
            && (parent == Some(root) || parent == collected.body)
        {
            collected.body = Some(func);
        }
        if !visited.insert(func) {
            continue;
        }

        let direct = parent == Some(root);
        for attr in &decl.attrs {
            match attr.kind {
                AttrKind::UseStallEnableClusters if !direct => {
                    diags.add(
                        Diagnostic::warning(ErrorCode::W1003)
                            .with_message(format!("'{}' attribute ignored", attr.kind.name()))
                            .with_label(
                                attr.span,
                                "only allowed on the kernel's function object",
                            )
                            .with_note(format!("in '{}'", decl.name)),
                    );
                    collected.dropped.push((func, attr.kind.clone()));
                }
                AttrKind::LoopFuse(_) if !direct => {
                    warn!(function = %decl.name, "loop_fuse not propagated from indirect callee");
                }
                _ => collected.attrs.push((func, attr.clone())),
            }
        }

        for call in decl.calls.iter().rev() {
            if !visited.contains(&call.callee) {
                worklist.push((call.callee, Some(func)));
            }
        }
    }
    collected
}

// ── Application ──

fn conflict(
    program: &Program,
    code: ErrorCode,
    kernel: FuncId,
    existing: Span,
    new: Span,
) -> Diagnostic {
    let kernel = program.function(kernel);
    Diagnostic::error(code)
        .with_message(format!(
            "conflicting attributes applied to kernel '{}'",
            kernel.name
        ))
        .with_label(kernel.span, "kernel declared here")
        .with_secondary_label(existing, "conflicting attribute")
        .with_secondary_label(new, "conflicting attribute")
}

fn exceeds(lhs: [u64; 3], rhs: [u64; 3]) -> bool {
    lhs.iter().zip(rhs).any(|(l, r)| *l > r)
}

fn apply_attributes(
    program: &mut Program,
    root: FuncId,
    collected: &Collected,
    diags: &mut DiagnosticQueue,
    report: &mut PropagationReport,
) {
    let body_simd = collected
        .body
        .is_some_and(|b| program.function(b).is_explicit_simd());
    let mut invalid_root = false;

    for (origin, attr) in &collected.attrs {
        let kernel = program.function(root);
        let existing = kernel.find_attr(&attr.kind).cloned();
        let verdict = match (&attr.kind, &existing) {
            (AttrKind::ReqdSubGroupSize(_) | AttrKind::ReqdWorkGroupSize(_), Some(old)) => {
                (old.kind != attr.kind)
                    .then(|| conflict(program, ErrorCode::E3001, root, old.span, attr.span))
            }
            (AttrKind::ReqdSubGroupSize(size), None) if body_simd && *size != 1 => {
                if let Some(body) = collected.body {
                    let body_decl = program.function(body);
                    diags.add(
                        Diagnostic::error(ErrorCode::E3003)
                            .with_message(format!(
                                "explicit SIMD function '{}' requires a sub-group size of 1",
                                body_decl.name
                            ))
                            .with_label(body_decl.span, "explicit SIMD function")
                            .with_secondary_label(attr.span, "sub-group size set here"),
                    );
                    program.function_mut(body).invalid = true;
                    report.invalidated.push(body);
                }
                continue;
            }
            (AttrKind::ReqdWorkGroupSize(reqd), None) => {
                match kernel.find_attr(&AttrKind::MaxWorkGroupSize([0; 3])) {
                    Some(Attr {
                        kind: AttrKind::MaxWorkGroupSize(max),
                        span,
                        ..
                    }) if exceeds(*reqd, *max) => {
                        Some(conflict(program, ErrorCode::E3002, root, *span, attr.span))
                    }
                    _ => None,
                }
            }
            (AttrKind::MaxWorkGroupSize(max), _) => {
                match kernel.find_attr(&AttrKind::ReqdWorkGroupSize([0; 3])) {
                    Some(Attr {
                        kind: AttrKind::ReqdWorkGroupSize(reqd),
                        span,
                        ..
                    }) if exceeds(*reqd, *max) => {
                        Some(conflict(program, ErrorCode::E3002, root, *span, attr.span))
                    }
                    _ => None,
                }
            }
            (AttrKind::ExplicitSimd, _) if collected.body.is_some() && !body_simd => {
                if let Some(body) = collected.body {
                    let body_decl = program.function(body);
                    diags.add(
                        Diagnostic::error(ErrorCode::E3004)
                            .with_message(format!(
                                "'{}' attribute mismatch: '{}' is not explicit SIMD",
                                attr.kind.name(),
                                body_decl.name
                            ))
                            .with_label(body_decl.span, "kernel body")
                            .with_secondary_label(attr.span, "explicit SIMD function reached here"),
                    );
                    program.function_mut(body).invalid = true;
                    report.invalidated.push(body);
                }
                continue;
            }
            _ => None,
        };

        match verdict {
            Some(diag) => {
                diags.add(diag);
                invalid_root = true;
            }
            None => {
                let mut propagated = attr.clone();
                propagated.implicit |= *origin != root;
                program.function_mut(root).add_attr(propagated);
            }
        }
    }

    if invalid_root {
        program.function_mut(root).invalid = true;
        report.invalidated.push(root);
    }
    debug!(
        kernel = %program.function(root).name,
        attrs = collected.attrs.len(),
        invalid = invalid_root,
        "propagated kernel attributes"
    );
}

/// Mark every function reachable from `body` explicit SIMD.
fn flood_simd(program: &mut Program, body: FuncId) -> usize {
    let mut visited = FxHashSet::default();
    let mut worklist = vec![body];
    let mut marked = 0;
    while let Some(func) = worklist.pop() {
        if !visited.insert(func) {
            continue;
        }
        let decl = program.function_mut(func);
        if !decl.is_explicit_simd() {
            decl.add_attr(Attr::implicit(AttrKind::ExplicitSimd));
            marked += 1;
        }
        worklist.extend(decl.calls.iter().map(|c| c.callee));
    }
    marked
}
