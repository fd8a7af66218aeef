//! Rewrite rules for explicit-SIMD intrinsics.
//!
//! Each source intrinsic `__esimd_<name>` maps to one [`Rule`]: the target
//! intrinsic spelling, an ordered list of [`ArgRule`]s that build the target
//! call's operands, and a [`SuffixRule`] that completes the target name.
//!
//! # Invariants
//!
//! - A `CallAll` argument rule, if present, is the last rule.
//! - Source spellings are unique; lookup is exact and case-sensitive.

mod table;

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::ir::ScalarTy;

pub use table::RULES;

/// Prefix of every source intrinsic's base name.
pub const SOURCE_PREFIX: &str = "__esimd_";

/// Prefix of every target intrinsic name.
pub const TARGET_PREFIX: &str = "llvm.genx.";

/// Binding table index of shared local memory.
pub const SLM_BTI: i64 = 254;

/// Conversion applied to a copied call operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgConv {
    None,
    /// Lane-wise `!= 0`, giving an `i1` vector.
    ToI1,
    /// Pointer to a 32-bit surface index.
    ToSurfaceIndex,
}

/// How one target operand is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgRule {
    /// Copy call operand `index`.
    CallArg { index: u32, conv: ArgConv },
    /// Copy every call operand from the last copied operand to the end.
    /// `remaining` is the declared count the static arity assumes.
    CallAll { remaining: u32 },
    /// Integer constant taken from template argument `index`.
    TemplateArg(u32),
    /// `i32` word count (`bits / 16`) of the element type of operand `index`;
    /// `-1` is the return value.
    NumBytes(i32),
    /// `undef` of the type of operand `index`; `-1` is the return value.
    Undef(i32),
    ConstI16(i64),
    ConstI32(i64),
    ConstI64(i64),
}

/// How the target name suffix is formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SuffixRule {
    None,
    /// Atomic operation suffix from template argument `index`.
    BinOp(u32),
    /// `f` or `i` from the element type of operand `index`; `-1` is the
    /// return value.
    NumKind(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub source: &'static str,
    pub target: &'static str,
    pub args: &'static [ArgRule],
    pub suffix: SuffixRule,
}

impl Rule {
    pub const fn new(source: &'static str, target: &'static str, args: &'static [ArgRule]) -> Self {
        Rule {
            source,
            target,
            args,
            suffix: SuffixRule::None,
        }
    }

    #[must_use]
    pub const fn with_suffix(mut self, suffix: SuffixRule) -> Self {
        self.suffix = suffix;
        self
    }

    /// Static arity: the rule count, with a trailing `CallAll` standing for
    /// its declared `remaining` operands.
    pub fn declared_arg_count(&self) -> usize {
        match self.args.split_last() {
            None => 0,
            Some((ArgRule::CallAll { remaining }, rest)) => *remaining as usize + rest.len(),
            Some(_) => self.args.len(),
        }
    }

    /// Number of target operands built for a call with `call_args` operands.
    pub fn target_arg_count(&self, call_args: usize) -> usize {
        let mut count = 0;
        let mut last_copied = 0;
        for rule in self.args {
            match *rule {
                ArgRule::CallArg { index, .. } => {
                    count += 1;
                    last_copied = index as usize;
                }
                ArgRule::CallAll { .. } => count += call_args.saturating_sub(last_copied),
                _ => count += 1,
            }
        }
        count
    }

    /// `CallAll` appears at most once, and only last.
    pub fn is_well_formed(&self) -> bool {
        let call_all = self
            .args
            .iter()
            .filter(|r| matches!(r, ArgRule::CallAll { .. }))
            .count();
        call_all == 0 || (call_all == 1 && matches!(self.args.last(), Some(ArgRule::CallAll { .. })))
    }
}

// ── Rule constructors ──

/// Copy operand `n` as is.
pub const fn a(n: u32) -> ArgRule {
    ArgRule::CallArg {
        index: n,
        conv: ArgConv::None,
    }
}

/// Copy operand `n` as a boolean vector.
pub const fn ai1(n: u32) -> ArgRule {
    ArgRule::CallArg {
        index: n,
        conv: ArgConv::ToI1,
    }
}

/// Copy pointer operand `n` as a surface index.
pub const fn a_si(n: u32) -> ArgRule {
    ArgRule::CallArg {
        index: n,
        conv: ArgConv::ToSurfaceIndex,
    }
}

pub const fn l(remaining: u32) -> ArgRule {
    ArgRule::CallAll { remaining }
}

pub const fn t(n: u32) -> ArgRule {
    ArgRule::TemplateArg(n)
}

pub const fn nbs(n: i32) -> ArgRule {
    ArgRule::NumBytes(n)
}

pub const fn u(n: i32) -> ArgRule {
    ArgRule::Undef(n)
}

pub const fn c16(v: i64) -> ArgRule {
    ArgRule::ConstI16(v)
}

pub const fn c32(v: i64) -> ArgRule {
    ArgRule::ConstI32(v)
}

pub const fn c64(v: i64) -> ArgRule {
    ArgRule::ConstI64(v)
}

pub const fn bo(n: u32) -> SuffixRule {
    SuffixRule::BinOp(n)
}

pub const fn nk(n: i32) -> SuffixRule {
    SuffixRule::NumKind(n)
}

// ── Suffixes ──

/// Atomic opcodes and their target name suffixes.
pub const BINOP_SUFFIXES: &[(i64, &str)] = &[
    (0x0, ".add"),
    (0x1, ".sub"),
    (0x2, ".inc"),
    (0x3, ".dec"),
    (0x4, ".min"),
    (0x5, ".max"),
    (0x6, ".xchg"),
    (0x7, ".cmpxchg"),
    (0x8, ".and"),
    (0x9, ".or"),
    (0xa, ".xor"),
    (0xb, ".minsint"),
    (0xc, ".maxsint"),
    (0x10, ".fmax"),
    (0x11, ".fmin"),
    (0x12, ".fcmpwr"),
    (0xff, ".predec"),
];

pub fn binop_suffix(opcode: i64) -> Option<&'static str> {
    BINOP_SUFFIXES
        .iter()
        .find(|(op, _)| *op == opcode)
        .map(|(_, suffix)| *suffix)
}

pub fn num_kind_suffix(elem: ScalarTy) -> &'static str {
    if elem.is_float() {
        "f"
    } else {
        "i"
    }
}

// ── Lookup ──

static RULES_BY_SOURCE: OnceLock<FxHashMap<&'static str, &'static Rule>> = OnceLock::new();

fn build_map() -> FxHashMap<&'static str, &'static Rule> {
    RULES.iter().map(|rule| (rule.source, rule)).collect()
}

/// Rule for a source spelling with the `__esimd_` prefix already stripped.
pub fn lookup(spelling: &str) -> Option<&'static Rule> {
    RULES_BY_SOURCE.get_or_init(build_map).get(spelling).copied()
}
