//! Builtins rewritten without the rule table: mask packing, plain vector
//! loads and stores, `get_value`, `slm_init`, and the SPIR-V work-item
//! queries.

use tracing::debug;

use super::{intrinsic::template_arg, FnLowering};
use crate::demangle;
use crate::error::LowerError;
use crate::ir::{BinOp, CastOp, Const, Inst, InstId, InstKind, ScalarTy, Ty, Value};
use crate::metadata;
use crate::target;

const SLM_INIT: &str = "N2cl4sycl5INTEL3gpu8slm_init";
const PACK_MASK: &str = "__esimd_pack_mask";
const UNPACK_MASK: &str = "__esimd_unpack_mask";
const VLOAD: &str = "__esimd_vload";
const VSTORE: &str = "__esimd_vstore";
const GET_VALUE: &str = "__esimd_get_value";
const SPIRV_PREFIX: &str = "__spirv_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Builtin<'a> {
    SlmInit,
    PackMask,
    UnpackMask,
    VLoad,
    VStore,
    GetValue,
    /// Query name with the `__spirv_` prefix removed, e.g. `WorkgroupSize_xv`.
    SpirvQuery(&'a str),
}

/// Classify a symbol already stripped of `_Z<len>`.
pub(super) fn classify(name: &str) -> Option<Builtin<'_>> {
    let builtin = if name.starts_with(SLM_INIT) {
        Builtin::SlmInit
    } else if name.starts_with(PACK_MASK) {
        Builtin::PackMask
    } else if name.starts_with(UNPACK_MASK) {
        Builtin::UnpackMask
    } else if name.starts_with(VLOAD) {
        Builtin::VLoad
    } else if name.starts_with(VSTORE) {
        Builtin::VStore
    } else if name.starts_with(GET_VALUE) {
        Builtin::GetValue
    } else if let Some(query) = name.strip_prefix(SPIRV_PREFIX) {
        Builtin::SpirvQuery(query)
    } else {
        return None;
    };
    Some(builtin)
}

/// Rewrite a special builtin. `false` means the call was left for the rule
/// table (loads and stores of volatile vector types).
pub(super) fn lower_builtin(cx: &mut FnLowering<'_>, call: InstId, builtin: Builtin<'_>) -> Result<bool, LowerError> {
    let inst = cx.body.inst(call);
    let Some((callee, args)) = inst.as_call() else {
        return Ok(false);
    };
    let args: Vec<Value> = args.to_vec();
    let call_ty = inst.ty;
    let call_name = inst.name.clone();
    let symbol = cx.module.function(callee).name.clone();
    let arg = |index: usize| {
        args.get(index).copied().ok_or_else(|| LowerError::MissingOperand {
            intrinsic: symbol.clone(),
            index: i32::try_from(index).unwrap_or(i32::MAX),
        })
    };

    match builtin {
        Builtin::SlmInit => {
            slm_init(cx, arg(0)?)?;
        }
        Builtin::PackMask => {
            let lanes = mask_width(&symbol)?;
            let mask = arg(0)?;
            let mask_ty = cx.ty_of(mask);
            let bools = Ty::vector(ScalarTy::Int(1), lanes);
            let truncated = if mask_ty == bools {
                mask
            } else {
                cx.insert(call, Inst::cast(CastOp::Trunc, mask, bools, ""))
            };
            let packed = if lanes == 32 {
                cx.insert(call, Inst::cast(CastOp::BitCast, truncated, Ty::I32, call_name))
            } else {
                let bits = cx.insert(call, Inst::cast(CastOp::BitCast, truncated, Ty::int(lanes), ""));
                cx.insert(call, Inst::cast(CastOp::ZExt, bits, Ty::I32, call_name))
            };
            cx.replace_uses(call, packed);
        }
        Builtin::UnpackMask => {
            let lanes = mask_width(&symbol)?;
            let mut mask = arg(0)?;
            let width = cx.ty_of(mask).total_bits();
            if width > lanes {
                mask = cx.insert(call, Inst::cast(CastOp::Trunc, mask, Ty::int(lanes), ""));
            } else if width < lanes {
                return Err(LowerError::InvalidOperand {
                    intrinsic: symbol.clone(),
                    index: 0,
                    ty: cx.ty_of(mask),
                });
            }
            let bools = Ty::vector(ScalarTy::Int(1), lanes);
            let bools = cx.insert(call, Inst::cast(CastOp::BitCast, mask, bools, ""));
            let wide = Ty::vector(ScalarTy::Int(16), lanes);
            let unpacked = cx.insert(call, Inst::cast(CastOp::ZExt, bools, wide, call_name));
            cx.replace_uses(call, unpacked);
        }
        Builtin::VLoad => {
            if cx.volatile.contains(&call_ty) {
                return Ok(false);
            }
            let load = Inst::new(InstKind::Load { ptr: arg(0)? }, call_ty, call_name);
            let load = cx.insert(call, load);
            cx.replace_uses(call, load);
        }
        Builtin::VStore => {
            let value = arg(1)?;
            if cx.volatile.contains(&cx.ty_of(value)) {
                return Ok(false);
            }
            let store = InstKind::Store {
                value,
                ptr: arg(0)?,
            };
            cx.insert(call, Inst::new(store, Ty::Void, ""));
        }
        Builtin::GetValue => {
            let ptr = arg(0)?;
            let ty = cx.ty_of(ptr);
            if !ty.is_pointer() {
                return Err(LowerError::InvalidOperand {
                    intrinsic: symbol.clone(),
                    index: 0,
                    ty,
                });
            }
            let value = cx.insert(call, Inst::cast(CastOp::PtrToInt, ptr, Ty::I32, ""));
            cx.replace_uses(call, value);
        }
        Builtin::SpirvQuery(_) => return Ok(false),
    }
    debug!(callee = %symbol, ?builtin, "lowered builtin");
    Ok(true)
}

/// Lane count `N` of `pack_mask<N>` / `unpack_mask<N>`.
fn mask_width(symbol: &str) -> Result<u32, LowerError> {
    let ast = demangle::parse(symbol).map_err(|source| LowerError::Demangle {
        symbol: symbol.to_string(),
        source,
    })?;
    let enc = ast
        .encoding()
        .ok_or_else(|| LowerError::NotFunctionEncoding {
            symbol: symbol.to_string(),
        })?;
    let (_, lanes) = template_arg(&ast, enc, 0)?;
    match u32::try_from(lanes) {
        Ok(lanes @ 1..=32) => Ok(lanes),
        _ => Err(LowerError::InvalidIntegerLiteral(lanes.to_string())),
    }
}

/// Raise the shared local memory size of the enclosing kernel.
fn slm_init(cx: &mut FnLowering<'_>, size: Value) -> Result<(), LowerError> {
    let size = size.as_const_int().ok_or(LowerError::SlmSizeNotConstant)?;
    if size == 0 {
        return Err(LowerError::ZeroSlmSize);
    }
    let size = u64::from_ne_bytes(size.to_ne_bytes());

    let index = metadata::enclosing_kernel(cx.module, cx.func)
        .ok_or_else(|| LowerError::SlmInitOutsideKernel(cx.function_name().to_string()))?;
    if let Some(entry) = cx
        .module
        .genx_kernels
        .as_mut()
        .and_then(|kernels| kernels.get_mut(index))
    {
        entry.slm_size = entry.slm_size.max(size);
        debug!(kernel = %entry.name, slm = entry.slm_size, "shared local memory size");
    }
    Ok(())
}

// ── Work-item queries ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Query {
    WorkgroupSize,
    LocalInvocationId,
    WorkgroupId,
    GlobalInvocationId,
    GlobalSize,
    GlobalOffset,
    NumWorkgroups,
}

const QUERIES: &[(&str, Query)] = &[
    ("WorkgroupSize", Query::WorkgroupSize),
    ("LocalInvocationId", Query::LocalInvocationId),
    ("WorkgroupId", Query::WorkgroupId),
    ("GlobalInvocationId", Query::GlobalInvocationId),
    ("GlobalSize", Query::GlobalSize),
    ("GlobalOffset", Query::GlobalOffset),
    ("NumWorkgroups", Query::NumWorkgroups),
];

/// Rewrite a `__spirv_<Query>_<x|y|z>` call. Unknown queries are left in
/// place and return `false`.
pub(super) fn lower_spirv_query(cx: &mut FnLowering<'_>, call: InstId, query: &str) -> Result<bool, LowerError> {
    let Some((kind, rest)) = QUERIES
        .iter()
        .find_map(|&(prefix, kind)| query.strip_prefix(prefix).map(|rest| (kind, rest)))
    else {
        debug!(query, "unhandled SPIR-V builtin");
        return Ok(false);
    };
    let call_ty = cx.body.inst(call).ty;

    let value = if kind == Query::GlobalOffset {
        Value::Const(Const::Zero(call_ty))
    } else {
        let coord = Coord::parse(rest).ok_or_else(|| {
            let symbol = cx.body.inst(call).as_call().map_or_else(String::new, |(callee, _)| {
                cx.module.function(callee).name.clone()
            });
            LowerError::BadCoordinate(symbol)
        })?;
        let mut q = QueryBuilder {
            cx: &mut *cx,
            call,
            call_ty,
            coord,
        };
        q.build(kind)?
    };
    cx.replace_uses(call, value);
    Ok(true)
}

/// One of the three work-item dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Coord(u32);

impl Coord {
    /// The character after the leading `_`, e.g. `x` in `_xv`.
    fn parse(rest: &str) -> Option<Coord> {
        match rest.strip_prefix('_')?.chars().next()? {
            'x' => Some(Coord(0)),
            'y' => Some(Coord(1)),
            'z' => Some(Coord(2)),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self.0 {
            0 => 'x',
            1 => 'y',
            _ => 'z',
        }
    }
}

struct QueryBuilder<'c, 'm> {
    cx: &'c mut FnLowering<'m>,
    call: InstId,
    call_ty: Ty,
    coord: Coord,
}

impl QueryBuilder<'_, '_> {
    fn build(&mut self, kind: Query) -> Result<Value, LowerError> {
        let value = match kind {
            Query::WorkgroupSize => self.vector("local.size", "wgsize.")?,
            Query::LocalInvocationId => self.vector("local.id", "local_id.")?,
            Query::WorkgroupId => self.scalar()?,
            Query::GlobalInvocationId => {
                // local_id + wgsize * group_id
                let local_id = self.vector("local.id", "local_id.")?;
                let wg_size = self.vector("local.size", "wgsize.")?;
                let group_id = self.scalar()?;
                let mul = self.binary(BinOp::Mul, wg_size, group_id, "mul");
                self.binary(BinOp::Add, local_id, mul, "add")
            }
            Query::GlobalSize => {
                let wg_size = self.vector("local.size", "wgsize.")?;
                let count = self.vector("group.count", "group_count.")?;
                self.binary(BinOp::Mul, wg_size, count, "mul")
            }
            Query::NumWorkgroups => self.vector("group.count", "group_count.")?,
            Query::GlobalOffset => Value::Const(Const::Zero(self.call_ty)),
        };
        Ok(value)
    }

    /// `<name>.esimd = call <3 x i32> @llvm.genx.<intrinsic>.v3i32()`, then
    /// the lane for this coordinate, cast to the call's type.
    fn vector(&mut self, intrinsic: &str, value_name: &str) -> Result<Value, LowerError> {
        let coords = Ty::vector(ScalarTy::Int(32), 3);
        let (decl, ret) = target::declare(self.cx.module, intrinsic, "", coords, &[])?;
        let name = format!("{}.esimd", self.cx.body.inst(self.call).name);
        let all = self.cx.insert(self.call, Inst::call(decl, std::iter::empty(), ret, name));
        let lane = InstKind::ExtractElement {
            vector: all,
            index: self.coord.0,
        };
        let lane_name = format!("{value_name}{}", self.coord.letter());
        let lane = self.cx.insert(self.call, Inst::new(lane, Ty::I32, lane_name));
        self.cx.bridge(self.call, lane, Ty::I32, self.call_ty)
    }

    /// `group.id.<c> = call i32 @llvm.genx.group.id.<c>()`, cast to the
    /// call's type.
    fn scalar(&mut self) -> Result<Value, LowerError> {
        let spelling = format!("group.id.{}", self.coord.letter());
        let (decl, ret) = target::declare(self.cx.module, &spelling, "", Ty::I32, &[])?;
        let id = self.cx.insert(self.call, Inst::call(decl, std::iter::empty(), ret, spelling));
        self.cx.bridge(self.call, id, ret, self.call_ty)
    }

    fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value, name: &str) -> Value {
        let inst = Inst::new(InstKind::Binary { op, lhs, rhs }, self.call_ty, name);
        self.cx.insert(self.call, inst)
    }
}
