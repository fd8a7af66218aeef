//! Rule-table lowering of `__esimd_*` calls.

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::FnLowering;
use crate::demangle::{self, Ast, Encoding, Node, NodeId};
use crate::error::LowerError;
use crate::ir::{CastOp, Const, ICmpPred, Inst, InstId, InstKind, ScalarTy, Ty, Value};
use crate::rules::{self, num_kind_suffix, ArgConv, ArgRule, Rule, SuffixRule, SOURCE_PREFIX};
use crate::target;

/// Rewrite one source intrinsic call into its target intrinsic.
///
/// Returns `false`, leaving the call untouched, when the intrinsic has no
/// rule.
pub(super) fn lower_intrinsic(cx: &mut FnLowering<'_>, call: InstId) -> Result<bool, LowerError> {
    let inst = cx.body.inst(call);
    let Some((callee, args)) = inst.as_call() else {
        return Ok(false);
    };
    let args: SmallVec<[Value; 8]> = args.iter().copied().collect();
    let call_ty = inst.ty;
    let call_name = inst.name.clone();
    let symbol = cx.module.function(callee).name.clone();

    let ast = demangle::parse(&symbol).map_err(|source| LowerError::Demangle {
        symbol: symbol.clone(),
        source,
    })?;
    let enc = ast
        .encoding()
        .ok_or_else(|| LowerError::NotFunctionEncoding {
            symbol: symbol.clone(),
        })?;
    let spelling = ast
        .base_name(enc.name)
        .and_then(|name| name.strip_prefix(SOURCE_PREFIX))
        .ok_or_else(|| LowerError::NotAnIntrinsic(symbol.clone()))?;
    let Some(rule) = rules::lookup(spelling) else {
        warn!(callee = %symbol, "no lowering rule for intrinsic; call left in place");
        return Ok(false);
    };

    let mut call_site = CallSite {
        cx: &mut *cx,
        anchor: call,
        spelling,
        args: &args,
        ty: call_ty,
    };
    let suffix = call_site.suffix(rule, &ast, enc)?;
    let operands = call_site.operands(rule, &ast, enc)?;
    let arg_tys: Vec<Ty> = operands.iter().map(|&v| cx.ty_of(v)).collect();

    let (decl, ret) = target::declare(cx.module, rule.target, suffix, call_ty, &arg_tys)?;
    let name = if ret.is_void() {
        String::new()
    } else {
        format!("{call_name}.esimd")
    };
    debug!(
        callee = %symbol,
        target = %cx.module.function(decl).name,
        args = operands.len(),
        "lowered intrinsic"
    );
    let lowered = cx.insert(call, Inst::call(decl, operands, ret, name));
    let result = cx.bridge(call, lowered, ret, call_ty)?;
    cx.replace_uses(call, result);
    Ok(true)
}

/// One call being lowered.
struct CallSite<'c, 'm> {
    cx: &'c mut FnLowering<'m>,
    anchor: InstId,
    spelling: &'c str,
    args: &'c [Value],
    ty: Ty,
}

impl CallSite<'_, '_> {
    fn suffix(&self, rule: &Rule, ast: &Ast<'_>, enc: Encoding) -> Result<&'static str, LowerError> {
        match rule.suffix {
            SuffixRule::None => Ok(""),
            SuffixRule::BinOp(index) => {
                let (_, opcode) = template_arg(ast, enc, index)?;
                target::atomic_suffix(opcode)
            }
            SuffixRule::NumKind(index) => {
                let ty = self.operand_ty(index)?;
                let elem = ty.element().ok_or_else(|| self.invalid(index, ty))?;
                Ok(num_kind_suffix(elem))
            }
        }
    }

    fn operands(
        &mut self,
        rule: &Rule,
        ast: &Ast<'_>,
        enc: Encoding,
    ) -> Result<SmallVec<[Value; 8]>, LowerError> {
        let mut out = SmallVec::new();
        let mut last_copied = 0usize;
        for arg_rule in rule.args {
            match *arg_rule {
                ArgRule::CallArg { index, conv } => {
                    let value = self.operand(index)?;
                    out.push(self.convert(value, index, conv)?);
                    last_copied = index as usize;
                }
                ArgRule::CallAll { .. } => {
                    if last_copied >= self.args.len() {
                        return Err(self.missing(last_copied));
                    }
                    out.extend(self.args[last_copied..].iter().copied());
                }
                ArgRule::TemplateArg(index) => {
                    let (ty, value) = template_arg(ast, enc, index)?;
                    out.push(Value::Const(Const::int(ty, value)));
                }
                ArgRule::NumBytes(index) => {
                    let ty = self.operand_ty(index)?;
                    let Ty::Vector(elem, _) = ty else {
                        return Err(self.invalid(index, ty));
                    };
                    let bits = elem.bits();
                    if !matches!(bits, 8 | 16 | 32) {
                        return Err(LowerError::NumBytesWidth(bits));
                    }
                    out.push(Value::Const(Const::int(Ty::I32, i64::from(bits / 16))));
                }
                ArgRule::Undef(index) => {
                    let ty = self.operand_ty(index)?;
                    out.push(Value::Const(Const::Undef(ty)));
                }
                ArgRule::ConstI16(value) => out.push(Value::Const(Const::int(Ty::I16, value))),
                ArgRule::ConstI32(value) => out.push(Value::Const(Const::int(Ty::I32, value))),
                ArgRule::ConstI64(value) => out.push(Value::Const(Const::int(Ty::I64, value))),
            }
        }
        Ok(out)
    }

    fn convert(&mut self, value: Value, index: u32, conv: ArgConv) -> Result<Value, LowerError> {
        let ty = self.cx.ty_of(value);
        match conv {
            ArgConv::None => Ok(value),
            ArgConv::ToI1 => {
                if !ty.is_int_or_int_vector() {
                    return Err(self.invalid(signed(index), ty));
                }
                let cmp = InstKind::ICmp {
                    pred: ICmpPred::Ne,
                    lhs: value,
                    rhs: Value::Const(Const::int(ty, 0)),
                };
                let bools = ty.with_element(ScalarTy::Int(1));
                Ok(self.cx.insert(self.anchor, Inst::new(cmp, bools, "")))
            }
            ArgConv::ToSurfaceIndex => {
                if !ty.is_pointer() {
                    return Err(self.invalid(signed(index), ty));
                }
                let cast = Inst::cast(CastOp::PtrToInt, value, Ty::I32, "");
                Ok(self.cx.insert(self.anchor, cast))
            }
        }
    }

    fn operand(&self, index: u32) -> Result<Value, LowerError> {
        self.args
            .get(index as usize)
            .copied()
            .ok_or_else(|| self.missing(index as usize))
    }

    /// Type of operand `index`; `-1` is the call's return type.
    fn operand_ty(&self, index: i32) -> Result<Ty, LowerError> {
        match u32::try_from(index) {
            Err(_) => Ok(self.ty),
            Ok(index) => Ok(self.cx.ty_of(self.operand(index)?)),
        }
    }

    fn missing(&self, index: usize) -> LowerError {
        LowerError::MissingOperand {
            intrinsic: self.spelling.to_string(),
            index: i32::try_from(index).unwrap_or(i32::MAX),
        }
    }

    fn invalid(&self, index: i32, ty: Ty) -> LowerError {
        LowerError::InvalidOperand {
            intrinsic: self.spelling.to_string(),
            index,
            ty,
        }
    }
}

fn signed(index: u32) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

/// Value and type of template argument `index` of the encoding's name.
///
/// Integer literals take the type their mangling names (plain `int` when
/// unspecified); enum literals are `i32`.
pub(super) fn template_arg(ast: &Ast<'_>, enc: Encoding, index: u32) -> Result<(Ty, i64), LowerError> {
    let args = ast
        .template_args_of(enc.name)
        .ok_or_else(|| LowerError::MissingTemplateArgs(ast.symbol().to_string()))?;
    let &arg = args
        .get(index as usize)
        .ok_or_else(|| LowerError::TemplateArgOutOfRange {
            intrinsic: ast.symbol().to_string(),
            index,
        })?;

    match ast.node(ast.resolve(arg)) {
        Node::IntegerLiteral {
            ty,
            negative,
            digits,
        } => Ok((primitive_int(ty)?, parse_literal(negative, digits)?)),
        Node::EnumLiteral {
            negative, digits, ..
        } => Ok((Ty::I32, parse_literal(negative, digits)?)),
        _ => Err(LowerError::UnsupportedTemplateArg(ast.render(arg))),
    }
}

fn primitive_int(name: &str) -> Result<Ty, LowerError> {
    let bits = match name {
        "" | "int" | "unsigned int" | "unsigned" => 32,
        "bool" => 1,
        "char" | "signed char" | "unsigned char" => 8,
        "short" | "unsigned short" => 16,
        "long" | "unsigned long" | "long long" | "unsigned long long" => 64,
        _ => return Err(LowerError::UnknownPrimitiveType(name.to_string())),
    };
    Ok(Ty::int(bits))
}

fn parse_literal(negative: bool, digits: &str) -> Result<i64, LowerError> {
    let invalid = || LowerError::InvalidIntegerLiteral(digits.to_string());
    let magnitude: u64 = digits.parse().map_err(|_| invalid())?;
    // Wide unsigned literals keep their bit pattern.
    let value = i64::from_ne_bytes(magnitude.to_ne_bytes());
    Ok(if negative { value.wrapping_neg() } else { value })
}

/// Whether a demangled type node has a floating-point element type.
pub(super) fn is_float_node(ast: &Ast<'_>, id: NodeId) -> bool {
    match ast.node(ast.resolve(id)) {
        Node::Builtin(name) => matches!(
            name,
            "float" | "double" | "long double" | "half" | "_Float16" | "__float128"
        ),
        Node::Vector { elem, .. } | Node::Array { elem, .. } => is_float_node(ast, elem),
        Node::Qualified { inner, .. } => is_float_node(ast, inner),
        _ => false,
    }
}
