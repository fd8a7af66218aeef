//! Handlers plugged into the field visitor.
//!
//! Checking walks the kernel object first:
//! - [`LegalityChecker`]: rejects member types that cannot become kernel
//!   arguments
//! - [`UnionChecker`]: rejects resource types inside unions
//! - [`DecompositionMarker`]: records which containers must be split
//!
//! Kernels that pass get their marks applied, then [`ArgsSizeChecker`] runs
//! alone. Synthesis is a single walk driving [`DeclBuilder`], [`BodyBuilder`],
//! and [`SideTableBuilder`] side by side, so all three see the same flat
//! argument order.

mod body;
mod check;
mod decl;
mod marker;
mod side_table;

use esx_ir::{AddressSpace, MethodParam, Program, RecordDecl, RecordId, TypeId};

pub use body::BodyBuilder;
pub use check::{LegalityChecker, UnionChecker};
pub use decl::{ArgsSizeChecker, DeclBuilder, KernelParam, MAX_KERNEL_ARGS_SIZE, WRAPPER_CLASS};
pub use marker::DecompositionMarker;
pub use side_table::{SideTableBuilder, SpecConstantId};

/// Initializer that rebuilds a resource from its kernel arguments.
pub const INIT: &str = "__init";
/// Accessor initializer used by explicit SIMD kernels.
pub const INIT_ESIMD: &str = "__init_esimd";
/// Stream method run after the kernel body.
pub const FINALIZE: &str = "__finalize";

/// Name of the initializer used for `record` in a kernel.
pub fn init_method(record: &RecordDecl, simd: bool) -> &'static str {
    if simd && record.accessor().is_some() {
        INIT_ESIMD
    } else {
        INIT
    }
}

/// Parameters of `record`'s initializer; empty when it has none.
pub(crate) fn init_params(program: &Program, record: RecordId, simd: bool) -> &[MethodParam] {
    let decl = program.record(record);
    match decl.method(init_method(decl, simd)) {
        Some(method) => &method.params,
        None => &[],
    }
}

/// Address space a pointer kernel argument points into.
///
/// Device and host global spaces are kept; everything else becomes global.
pub(crate) fn kernel_pointer_space(space: AddressSpace) -> AddressSpace {
    if space.is_global_family() {
        space
    } else {
        AddressSpace::Global
    }
}

/// Record name without namespace or template arguments.
pub(crate) fn unqualified(name: &str) -> &str {
    let head = name.split('<').next().unwrap_or(name);
    head.rsplit("::").next().unwrap_or(head)
}

/// True when `ty` is a record whose unqualified name is `name`.
pub(crate) fn is_record_named(program: &Program, ty: TypeId, name: &str) -> bool {
    program
        .types
        .as_record(ty)
        .is_some_and(|r| unqualified(&program.record(r).name) == name)
}

#[cfg(test)]
mod tests;
