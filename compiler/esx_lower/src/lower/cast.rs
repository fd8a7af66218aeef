//! Float-to-int cast legalization.
//!
//! The back-end converts floats only to 32-bit signed integers. Unsigned
//! conversions to at most 32 bits and signed conversions to fewer than 32
//! bits become `fptosi` to `i32` (keeping the vector shape) followed by a
//! truncation to the original type.

use super::FnLowering;
use crate::ir::{CastOp, Inst, InstId, InstKind, ScalarTy, Ty};

/// Rewrite the cast at `id` if it needs legalizing. Returns whether it was
/// replaced; the caller erases it.
pub(super) fn legalize_fp_to_int(cx: &mut FnLowering<'_>, id: InstId) -> bool {
    let inst = cx.body.inst(id);
    let InstKind::Cast { op, value } = inst.kind else {
        return false;
    };
    let dst = inst.ty;
    if !needs_legalizing(op, dst) {
        return false;
    }

    let wide = dst.with_element(ScalarTy::Int(32));
    let signed = cx.insert(id, Inst::cast(CastOp::FPToSI, value, wide, ""));
    let result = if dst == wide {
        signed
    } else {
        cx.insert(id, Inst::cast(CastOp::Trunc, signed, dst, ""))
    };
    cx.replace_uses(id, result);
    true
}

/// Whether a float-to-int cast producing `dst` is rewritten.
pub(super) fn needs_legalizing(op: CastOp, dst: Ty) -> bool {
    match (op, dst.element()) {
        (CastOp::FPToUI, Some(ScalarTy::Int(bits))) => bits <= 32,
        (CastOp::FPToSI, Some(ScalarTy::Int(bits))) => bits < 32,
        _ => false,
    }
}
