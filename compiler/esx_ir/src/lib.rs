//! ESX IR - Front-end Declaration Model
//!
//! This crate contains the declarations the kernel synthesis engine walks:
//! - Spans for source locations
//! - Interned types (`TypeId` into a `TypeTable`)
//! - Records with bases, fields, methods, and special-type descriptors
//! - Functions with attributes, call edges, and expression bodies
//! - The `Program` that owns all of it, plus decomposition marks
//!
//! # Design Philosophy
//!
//! - **Intern Types**: structurally equal types share one `TypeId`
//! - **Flatten Bodies**: expressions live in a per-body `ExprArena`, addressed
//!   by `ExprId(u32)`
//! - **Layout Is Input**: field offsets, record sizes, and alignment come from
//!   the front-end; nothing here recomputes ABI layout for records

/// Define a `u32` index newtype with the usual accessors.
macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create from a raw index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            /// Get the index into the owning arena.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Get the raw u32 value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) fn from_len(len: usize) -> Self {
                match u32::try_from(len) {
                    Ok(raw) => $name(raw),
                    Err(_) => panic!(concat!(stringify!($name), " space exhausted")),
                }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

mod expr;
mod function;
mod program;
mod record;
mod span;
mod ty;

pub use expr::{Expr, ExprArena, ExprId, ExprKind, LocalVar, Stmt, VarId};
pub use function::{
    Attr, AttrKind, CallSite, FuncId, FunctionBody, FunctionDecl, FunctionKind, InvocationKind,
    KernelNames, ParamDecl,
};
pub use program::{DecompositionMarks, Program, TypeClass};
pub use record::{
    AccessTarget, AccessorInfo, BaseRef, BaseSpec, FieldDecl, FieldRef, MethodDecl, MethodParam,
    RecordDecl, RecordId, RecordKind, SpecialKind, TemplateArg,
};
pub use span::Span;
pub use ty::{AddressSpace, Builtin, TypeId, TypeKind, TypeTable};
