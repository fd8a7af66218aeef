//! Explicit-SIMD intrinsic lowering.
//!
//! This crate provides:
//!
//! - **Vector IR** ([`Module`], [`Function`], [`Body`], [`Inst`]): a small
//!   call-centric instruction list, enough to express the intrinsic calls a
//!   device module carries and the code that replaces them.
//!
//! - **Demangler** ([`demangle`]): an Itanium name parser that turns a
//!   call-site symbol into an arena-allocated [`Ast`](demangle::Ast).
//!
//! - **Rewrite rules** ([`rules`]): the static table mapping each
//!   `__esimd_*` source intrinsic to its target spelling, argument rules,
//!   and name-suffix rule.
//!
//! - **Target catalog** ([`target`]): declared signatures of the target
//!   intrinsics, used to pick the overloaded positions of a declaration.
//!
//! - **Lowering pass** ([`lower_module`]): rewrites every intrinsic call in
//!   every explicit-SIMD function, plus the special-cased builtins and
//!   work-item queries, and legalizes narrow float-to-int casts.
//!
//! - **Kernel metadata** ([`metadata`]): the `genx.kernels` table and the
//!   volatile-global type set.
//!
//! # Design
//!
//! Every step that can hit a malformed input returns [`LowerError`]. The one
//! silent path is a source intrinsic with no rule: the call is left in place
//! and a warning is logged.

pub mod demangle;
mod error;
pub mod ir;
mod lower;
pub mod metadata;
pub mod rules;
pub mod target;

#[cfg(test)]
mod test_helpers;

pub use error::LowerError;
pub use ir::{
    BinOp, Body, CallingConv, CastOp, Const, FnAttr, FuncId, Function, FunctionMetadata, Global,
    GlobalId, GlobalTy, ICmpPred, Inst, InstId, InstKind, Module, ScalarTy, Ty, Value,
};
pub use lower::{lower_module, lower_name, LowerOptions, LowerStats};
pub use metadata::{ArgKind, IoKind, KernelMetadata};
