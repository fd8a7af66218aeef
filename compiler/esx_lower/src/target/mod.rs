//! Catalog of target intrinsics.
//!
//! Each entry records which positions of a target intrinsic are overloaded:
//! the return type, some argument types, or both. Overloaded positions are
//! appended to the declaration name as `.<mangled type>` in order, the
//! return type first, so `llvm.genx.svm.gather` returning `<16 x i32>` from
//! `<16 x i1>` and `<16 x i64>` operands is declared as
//! `llvm.genx.svm.gather.v16i32.v16i1.v16i64`.
//!
//! The catalog is the contract with the back-end's intrinsic definitions and
//! changes only together with them.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::error::LowerError;
use crate::ir::{FuncId, Module, Ty};
use crate::rules::{binop_suffix, BINOP_SUFFIXES, TARGET_PREFIX};

/// Return type of a target intrinsic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetSig {
    /// Taken from the call site and mangled into the name.
    Overloaded,
    Fixed(Ty),
    Void,
}

/// Name suffixes an intrinsic family accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suffixes {
    None,
    /// `f` or `i`.
    NumKind,
    /// Atomic operation, e.g. `.add`.
    BinOp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetIntrinsic {
    pub spelling: &'static str,
    pub ret: RetSig,
    /// Argument positions whose types are mangled into the name.
    pub overloaded_args: &'static [u32],
    pub suffixes: Suffixes,
}

impl TargetIntrinsic {
    const fn new(spelling: &'static str, ret: RetSig, overloaded_args: &'static [u32]) -> Self {
        TargetIntrinsic {
            spelling,
            ret,
            overloaded_args,
            suffixes: Suffixes::None,
        }
    }

    const fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = suffixes;
        self
    }

    pub fn accepts_suffix(&self, suffix: &str) -> bool {
        match self.suffixes {
            Suffixes::None => suffix.is_empty(),
            Suffixes::NumKind => suffix == "f" || suffix == "i",
            Suffixes::BinOp => BINOP_SUFFIXES.iter().any(|(_, s)| *s == suffix),
        }
    }

    /// Full declaration name for a call returning `ret` with operands typed
    /// `args`.
    pub fn declaration_name(&self, suffix: &str, ret: Ty, args: &[Ty]) -> Result<String, LowerError> {
        let mut name = format!("{TARGET_PREFIX}{}{suffix}", self.spelling);
        if self.ret == RetSig::Overloaded {
            name.push('.');
            name.push_str(&ret.mangle());
        }
        for &index in self.overloaded_args {
            let ty = args
                .get(index as usize)
                .ok_or_else(|| LowerError::MissingOperand {
                    intrinsic: format!("{}{suffix}", self.spelling),
                    index: index as i32,
                })?;
            name.push('.');
            name.push_str(&ty.mangle());
        }
        Ok(name)
    }

    /// Declared return type for a call site expecting `call_ret`.
    pub fn return_type(&self, call_ret: Ty) -> Ty {
        match self.ret {
            RetSig::Overloaded => call_ret,
            RetSig::Fixed(ty) => ty,
            RetSig::Void => Ty::Void,
        }
    }
}

const O: RetSig = RetSig::Overloaded;
const V: RetSig = RetSig::Void;

/// Every target intrinsic the rule table and the work-item queries produce.
pub static CATALOG: &[TargetIntrinsic] = &[
    TargetIntrinsic::new("group.id.x", RetSig::Fixed(Ty::I32), &[]),
    TargetIntrinsic::new("group.id.y", RetSig::Fixed(Ty::I32), &[]),
    TargetIntrinsic::new("group.id.z", RetSig::Fixed(Ty::I32), &[]),
    TargetIntrinsic::new("local.id", O, &[]),
    TargetIntrinsic::new("local.size", O, &[]),
    TargetIntrinsic::new("group.count", O, &[]),
    TargetIntrinsic::new("any", RetSig::Fixed(Ty::I1), &[0]),
    TargetIntrinsic::new("all", RetSig::Fixed(Ty::I1), &[0]),
    // Regions
    TargetIntrinsic::new("rdregion", O, &[0, 4]).with_suffixes(Suffixes::NumKind),
    TargetIntrinsic::new("wrregion", O, &[1, 5, 7]).with_suffixes(Suffixes::NumKind),
    TargetIntrinsic::new("vload", O, &[0]),
    TargetIntrinsic::new("vstore", V, &[0, 1]),
    // Shared virtual memory
    TargetIntrinsic::new("svm.block.ld.unaligned", O, &[0]),
    TargetIntrinsic::new("svm.block.st", V, &[0, 1]),
    TargetIntrinsic::new("svm.gather", O, &[0, 2]),
    TargetIntrinsic::new("svm.gather4.scaled", O, &[0, 4]),
    TargetIntrinsic::new("svm.scatter", V, &[0, 2, 3]),
    TargetIntrinsic::new("svm.scatter4.scaled", V, &[0, 4, 5]),
    TargetIntrinsic::new("svm.atomic", O, &[0, 1]).with_suffixes(Suffixes::BinOp),
    // Surfaces and shared local memory
    TargetIntrinsic::new("gather.scaled2", O, &[4]),
    TargetIntrinsic::new("gather.scaled", O, &[0, 5]),
    TargetIntrinsic::new("gather4.scaled", O, &[0, 5]),
    TargetIntrinsic::new("scatter.scaled", V, &[0, 5, 6]),
    TargetIntrinsic::new("scatter4.scaled", V, &[0, 5, 6]),
    TargetIntrinsic::new("dword.atomic", O, &[0, 2]).with_suffixes(Suffixes::BinOp),
    TargetIntrinsic::new("media.ld", O, &[]),
    TargetIntrinsic::new("media.st", V, &[6]),
    TargetIntrinsic::new("oword.ld.unaligned", O, &[]),
    TargetIntrinsic::new("oword.st", V, &[2]),
    TargetIntrinsic::new("fence", V, &[]),
    TargetIntrinsic::new("barrier", V, &[]),
    // Raw messages
    TargetIntrinsic::new("raw.sends2", O, &[2, 9, 10]),
    TargetIntrinsic::new("raw.send2", O, &[2, 8]),
    TargetIntrinsic::new("raw.sends2.noresult", V, &[2, 8, 9]),
    TargetIntrinsic::new("raw.send2.noresult", V, &[2, 7]),
    // Arithmetic
    TargetIntrinsic::new("fmax", O, &[0]),
    TargetIntrinsic::new("umax", O, &[0]),
    TargetIntrinsic::new("smax", O, &[0]),
    TargetIntrinsic::new("fmin", O, &[0]),
    TargetIntrinsic::new("umin", O, &[0]),
    TargetIntrinsic::new("smin", O, &[0]),
    TargetIntrinsic::new("dp4", O, &[0]),
    TargetIntrinsic::new("dp4a", O, &[0, 1, 2]),
    TargetIntrinsic::new("sat", O, &[0]),
    TargetIntrinsic::new("fptoui.sat", O, &[0]),
    TargetIntrinsic::new("fptosi.sat", O, &[0]),
    TargetIntrinsic::new("uutrunc.sat", O, &[0]),
    TargetIntrinsic::new("ustrunc.sat", O, &[0]),
    TargetIntrinsic::new("sutrunc.sat", O, &[0]),
    TargetIntrinsic::new("sstrunc.sat", O, &[0]),
    TargetIntrinsic::new("abs", O, &[]).with_suffixes(Suffixes::NumKind),
    TargetIntrinsic::new("ssshl", O, &[0]),
    TargetIntrinsic::new("sushl", O, &[0]),
    TargetIntrinsic::new("usshl", O, &[0]),
    TargetIntrinsic::new("uushl", O, &[0]),
    TargetIntrinsic::new("ssshl.sat", O, &[0]),
    TargetIntrinsic::new("sushl.sat", O, &[0]),
    TargetIntrinsic::new("usshl.sat", O, &[0]),
    TargetIntrinsic::new("uushl.sat", O, &[0]),
    TargetIntrinsic::new("rol", O, &[0]),
    TargetIntrinsic::new("ror", O, &[0]),
    TargetIntrinsic::new("umulh", O, &[]),
    TargetIntrinsic::new("smulh", O, &[]),
    TargetIntrinsic::new("frc", O, &[]),
    // Bit manipulation
    TargetIntrinsic::new("lzd", O, &[]),
    TargetIntrinsic::new("bfrev", O, &[]),
    TargetIntrinsic::new("cbit", O, &[0]),
    TargetIntrinsic::new("bfi", O, &[]),
    TargetIntrinsic::new("sbfe", O, &[]),
    TargetIntrinsic::new("fbl", O, &[]),
    TargetIntrinsic::new("sfbh", O, &[]),
    TargetIntrinsic::new("ufbh", O, &[]),
    // Math
    TargetIntrinsic::new("inv", O, &[]),
    TargetIntrinsic::new("log", O, &[]),
    TargetIntrinsic::new("exp", O, &[]),
    TargetIntrinsic::new("sqrt", O, &[]),
    TargetIntrinsic::new("ieee.sqrt", O, &[]),
    TargetIntrinsic::new("rsqrt", O, &[]),
    TargetIntrinsic::new("sin", O, &[]),
    TargetIntrinsic::new("cos", O, &[]),
    TargetIntrinsic::new("pow", O, &[]),
    TargetIntrinsic::new("ieee.div", O, &[]),
];

static BY_SPELLING: OnceLock<FxHashMap<&'static str, &'static TargetIntrinsic>> = OnceLock::new();

fn build_map() -> FxHashMap<&'static str, &'static TargetIntrinsic> {
    CATALOG.iter().map(|entry| (entry.spelling, entry)).collect()
}

/// Target intrinsic `spelling` completed by `suffix`.
pub fn lookup(spelling: &str, suffix: &str) -> Option<&'static TargetIntrinsic> {
    BY_SPELLING
        .get_or_init(build_map)
        .get(spelling)
        .copied()
        .filter(|entry| entry.accepts_suffix(suffix))
}

/// Declare (or find) the target intrinsic a call returning `call_ret` with
/// operands typed `args` resolves to.
///
/// Returns the declaration and its return type, which differs from
/// `call_ret` for intrinsics with a fixed return type.
pub fn declare(
    module: &mut Module,
    spelling: &str,
    suffix: &str,
    call_ret: Ty,
    args: &[Ty],
) -> Result<(FuncId, Ty), LowerError> {
    let entry = lookup(spelling, suffix)
        .ok_or_else(|| LowerError::UnknownTarget(format!("{spelling}{suffix}")))?;
    let ret = entry.return_type(call_ret);
    let name = entry.declaration_name(suffix, ret, args)?;
    Ok((module.get_or_insert_declaration(&name, args.to_vec(), ret), ret))
}

/// Suffix string for an atomic opcode, as a [`LowerError`] when unknown.
pub fn atomic_suffix(opcode: i64) -> Result<&'static str, LowerError> {
    binop_suffix(opcode).ok_or(LowerError::UnknownBinOp(opcode))
}
