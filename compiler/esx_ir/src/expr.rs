//! Flat expression trees for function bodies.
//!
//! Each body owns one `ExprArena`; expressions refer to children by
//! `ExprId`. Kernel synthesis builds new bodies in fresh arenas and copies
//! the caller's statements across with `ExprArena::import`.

use crate::function::FuncId;
use crate::span::Span;
use crate::ty::{AddressSpace, TypeId};

define_index!(
    /// Index into an `ExprArena`.
    ExprId
);

define_index!(
    /// Index into a body's local variable list.
    VarId
);

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalVar {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    /// Reference to parameter `n` of the enclosing function.
    Param(u32),
    Var(VarId),
    /// `base.fields[field]`
    Member { base: ExprId, field: u32 },
    /// Derived-to-base conversion selecting base `index`.
    Base { base: ExprId, index: u32 },
    /// `base[index]`
    Subscript { base: ExprId, index: u64 },
    /// Aggregate initializer; bases first, then fields, or array elements.
    InitList(Vec<ExprId>),
    /// Value-initialization of a type.
    DefaultInit(TypeId),
    MethodCall {
        receiver: ExprId,
        method: String,
        args: Vec<ExprId>,
    },
    Call {
        callee: FuncId,
        args: Vec<ExprId>,
    },
    IntLit(i64),
    AddrSpaceCast {
        operand: ExprId,
        space: AddressSpace,
    },
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Stmt {
    Decl { var: VarId, init: Option<ExprId> },
    Expr(ExprId),
    Return(Option<ExprId>),
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId::from_len(self.exprs.len());
        self.exprs.push(Expr { kind, span });
        id
    }

    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.exprs[id.index()].kind
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Deep-copy `root` from `source` into this arena.
    ///
    /// `map_param` may replace a parameter reference with an expression
    /// already allocated here; returning `None` keeps the reference.
    pub fn import(
        &mut self,
        source: &ExprArena,
        root: ExprId,
        map_param: &mut dyn FnMut(&mut ExprArena, u32) -> Option<ExprId>,
    ) -> ExprId {
        let expr = source.get(root);
        let kind = match &expr.kind {
            ExprKind::Param(n) => {
                if let Some(mapped) = map_param(self, *n) {
                    return mapped;
                }
                ExprKind::Param(*n)
            }
            ExprKind::Var(v) => ExprKind::Var(*v),
            ExprKind::Member { base, field } => ExprKind::Member {
                base: self.import(source, *base, map_param),
                field: *field,
            },
            ExprKind::Base { base, index } => ExprKind::Base {
                base: self.import(source, *base, map_param),
                index: *index,
            },
            ExprKind::Subscript { base, index } => ExprKind::Subscript {
                base: self.import(source, *base, map_param),
                index: *index,
            },
            ExprKind::InitList(items) => ExprKind::InitList(
                items
                    .iter()
                    .map(|&item| self.import(source, item, map_param))
                    .collect(),
            ),
            ExprKind::DefaultInit(ty) => ExprKind::DefaultInit(*ty),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => ExprKind::MethodCall {
                receiver: self.import(source, *receiver, map_param),
                method: method.clone(),
                args: args
                    .iter()
                    .map(|&arg| self.import(source, arg, map_param))
                    .collect(),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: *callee,
                args: args
                    .iter()
                    .map(|&arg| self.import(source, arg, map_param))
                    .collect(),
            },
            ExprKind::IntLit(v) => ExprKind::IntLit(*v),
            ExprKind::AddrSpaceCast { operand, space } => ExprKind::AddrSpaceCast {
                operand: self.import(source, *operand, map_param),
                space: *space,
            },
        };
        self.alloc(kind, expr.span)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn import_redirects_params() {
        let mut src = ExprArena::new();
        let p = src.alloc(ExprKind::Param(0), Span::DUMMY);
        let call = src.alloc(
            ExprKind::MethodCall {
                receiver: p,
                method: "operator()".into(),
                args: vec![],
            },
            Span::new(4, 8),
        );

        let mut dst = ExprArena::new();
        let clone = dst.alloc(ExprKind::Var(VarId::new(0)), Span::DUMMY);
        let copied = dst.import(&src, call, &mut |_, n| (n == 0).then_some(clone));

        assert_eq!(
            dst.kind(copied),
            &ExprKind::MethodCall {
                receiver: clone,
                method: "operator()".into(),
                args: vec![],
            }
        );
        assert_eq!(dst.get(copied).span, Span::new(4, 8));
        assert_eq!(dst.len(), 2);
    }
}
