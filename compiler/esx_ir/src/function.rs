//! Function declarations, attributes, and the static call graph.

use crate::expr::{ExprArena, LocalVar, Stmt, VarId};
use crate::record::RecordId;
use crate::span::Span;
use crate::ty::TypeId;

define_index!(
    /// Index into the program's function list.
    FuncId
);

/// Which kernel-launch entry a caller template represents.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum InvocationKind {
    SingleTask,
    ParallelFor,
    ParallelForWorkGroup,
}

/// Names a kernel is known by.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelNames {
    /// Itanium-mangled name of the kernel entry.
    pub mangled: String,
    /// Unique stable name, used when kernels are named by their lambda.
    pub stable: String,
    /// Spelling of the kernel name type, as used in `KernelInfo<...>`.
    pub type_name: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum FunctionKind {
    Free,
    /// `operator()` of the given record.
    CallOperator(RecordId),
    /// A `kernel_*` launch template instantiation; parameter 0 is the kernel
    /// object.
    KernelCaller {
        invocation: InvocationKind,
        names: KernelNames,
    },
    /// A synthesized device kernel entry.
    Kernel,
}

/// Kernel-scope attributes that propagate through the call graph.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrKind {
    ReqdSubGroupSize(u32),
    ReqdWorkGroupSize([u64; 3]),
    MaxWorkGroupSize([u64; 3]),
    KernelArgsRestrict,
    NumSimdWorkItems(u32),
    SchedulerTargetFmaxMhz(u32),
    MaxGlobalWorkDim(u32),
    NoGlobalWorkOffset(bool),
    ExplicitSimd,
    UseStallEnableClusters,
    LoopFuse(u32),
}

impl AttrKind {
    /// Attribute spelling used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            AttrKind::ReqdSubGroupSize(_) => "reqd_sub_group_size",
            AttrKind::ReqdWorkGroupSize(_) => "reqd_work_group_size",
            AttrKind::MaxWorkGroupSize(_) => "max_work_group_size",
            AttrKind::KernelArgsRestrict => "kernel_args_restrict",
            AttrKind::NumSimdWorkItems(_) => "num_simd_work_items",
            AttrKind::SchedulerTargetFmaxMhz(_) => "scheduler_target_fmax_mhz",
            AttrKind::MaxGlobalWorkDim(_) => "max_global_work_dim",
            AttrKind::NoGlobalWorkOffset(_) => "no_global_work_offset",
            AttrKind::ExplicitSimd => "sycl_explicit_simd",
            AttrKind::UseStallEnableClusters => "use_stall_enable_clusters",
            AttrKind::LoopFuse(_) => "loop_fuse",
        }
    }

    /// True when both attributes are of the same kind, ignoring values.
    pub fn same_kind(&self, other: &AttrKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Attr {
    pub kind: AttrKind,
    pub span: Span,
    /// Added by propagation rather than written by the user.
    pub implicit: bool,
}

impl Attr {
    pub fn new(kind: AttrKind, span: Span) -> Self {
        Attr {
            kind,
            span,
            implicit: false,
        }
    }

    pub fn implicit(kind: AttrKind) -> Self {
        Attr {
            kind,
            span: Span::DUMMY,
            implicit: true,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
}

/// A direct call edge in the static call graph.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct CallSite {
    pub callee: FuncId,
    pub span: Span,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionBody {
    pub exprs: ExprArena,
    pub stmts: Vec<Stmt>,
    pub locals: Vec<LocalVar>,
}

impl FunctionBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_local(&mut self, name: impl Into<String>, ty: TypeId) -> VarId {
        let id = VarId::from_len(self.locals.len());
        self.locals.push(LocalVar {
            name: name.into(),
            ty,
        });
        id
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionDecl {
    /// Qualified name, e.g. `sycl::this_item`.
    pub name: String,
    pub span: Span,
    pub kind: FunctionKind,
    pub params: Vec<ParamDecl>,
    pub attrs: Vec<Attr>,
    pub calls: Vec<CallSite>,
    pub body: Option<FunctionBody>,
    pub invalid: bool,
    /// Declared `SYCL_EXTERNAL`; a root for attribute collection.
    pub device_external: bool,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>, kind: FunctionKind) -> Self {
        FunctionDecl {
            name: name.into(),
            span: Span::DUMMY,
            kind,
            params: Vec::new(),
            attrs: Vec::new(),
            calls: Vec::new(),
            body: None,
            invalid: false,
            device_external: false,
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            ty,
            span: Span::DUMMY,
        });
        self
    }

    #[must_use]
    pub fn with_attr(mut self, kind: AttrKind, span: Span) -> Self {
        self.attrs.push(Attr::new(kind, span));
        self
    }

    #[must_use]
    pub fn with_call(mut self, callee: FuncId, span: Span) -> Self {
        self.calls.push(CallSite { callee, span });
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: FunctionBody) -> Self {
        self.body = Some(body);
        self
    }

    /// First attribute of the same kind as `probe`.
    pub fn find_attr(&self, probe: &AttrKind) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.kind.same_kind(probe))
    }

    pub fn is_explicit_simd(&self) -> bool {
        self.attrs
            .iter()
            .any(|a| matches!(a.kind, AttrKind::ExplicitSimd))
    }

    pub fn is_call_operator(&self) -> bool {
        matches!(self.kind, FunctionKind::CallOperator(_))
    }

    /// Adds `attr` unless an identical attribute is already present.
    pub fn add_attr(&mut self, attr: Attr) {
        if !self.attrs.iter().any(|a| a.kind == attr.kind) {
            self.attrs.push(attr);
        }
    }

    pub fn remove_attrs(&mut self, probe: &AttrKind) {
        self.attrs.retain(|a| !a.kind.same_kind(probe));
    }
}
