//! The lowering pass.
//!
//! [`lower_module`] runs once per device module:
//!
//! 1. Emit `genx.kernels` and retarget the triple (unless disabled or
//!    already present).
//! 2. Collect the vector types pinned by `genx_volatile` globals.
//! 3. For every explicit-SIMD function with a body, walk the instructions
//!    in order:
//!    - legalize narrow float-to-int casts ([`cast`]);
//!    - rewrite special builtins and work-item queries in place
//!      ([`special`]);
//!    - collect every other `__esimd_*` call.
//! 4. Rewrite the collected calls through the rule table ([`intrinsic`]).
//! 5. Erase every replaced instruction.
//!
//! # Design
//!
//! A function's body is taken out of the module while it is rewritten, so
//! the module can be mutated (declarations added, kernel metadata updated)
//! while instructions are inserted. The body is put back before any error
//! propagates.

mod cast;
mod intrinsic;
mod special;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::demangle;
use crate::error::LowerError;
use crate::ir::{Body, CastOp, FuncId, Inst, InstId, InstKind, Module, Ty, Value};
use crate::metadata;
use crate::rules::{self, SuffixRule, SOURCE_PREFIX, TARGET_PREFIX};

use intrinsic::template_arg;

/// Mangling prefix of every C++ function symbol.
const MANGLED_PREFIX: &str = "_Z";

/// Knobs for [`lower_module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    /// Generate `genx.kernels` and retarget the module before lowering.
    pub emit_kernel_metadata: bool,
    /// Rewrite narrow float-to-int casts through a signed 32-bit conversion.
    pub legalize_fp_casts: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        LowerOptions {
            emit_kernel_metadata: true,
            legalize_fp_casts: true,
        }
    }
}

/// What a lowering run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LowerStats {
    /// Explicit-SIMD functions visited.
    pub functions: usize,
    /// Calls rewritten through the rule table.
    pub intrinsics: usize,
    /// Source intrinsics with no rule, left in place.
    pub skipped: usize,
    /// Special builtins rewritten (masks, loads, stores, `slm_init`, ...).
    pub builtins: usize,
    /// Work-item queries rewritten.
    pub queries: usize,
    /// Float-to-int casts legalized.
    pub casts: usize,
}

/// Lower every explicit-SIMD function of `module`.
pub fn lower_module(module: &mut Module, options: &LowerOptions) -> Result<LowerStats, LowerError> {
    if options.emit_kernel_metadata && metadata::generate_kernel_metadata(module) {
        debug!(triple = %module.triple, "generated kernel metadata");
    }
    let volatile = metadata::collect_volatile_types(module);

    let targets: Vec<FuncId> = module
        .functions()
        .filter(|(_, f)| f.metadata.explicit_simd && !f.is_declaration())
        .map(|(id, _)| id)
        .collect();

    let mut stats = LowerStats::default();
    for func in targets {
        let Some(body) = module.function_mut(func).body.take() else {
            continue;
        };
        let mut cx = FnLowering {
            module: &mut *module,
            func,
            body,
            volatile: &volatile,
            stats: &mut stats,
        };
        let result = cx.run(options);
        let body = cx.body;
        module.function_mut(func).body = Some(body);
        result?;
        stats.functions += 1;
    }
    Ok(stats)
}

/// Target intrinsic a call to `symbol` would lower to, e.g.
/// `llvm.genx.svm.atomic.add`. `None` when the intrinsic has no rule.
pub fn lower_name(symbol: &str) -> Result<Option<String>, LowerError> {
    let ast = demangle::parse(symbol).map_err(|source| LowerError::Demangle {
        symbol: symbol.to_string(),
        source,
    })?;
    let enc = ast
        .encoding()
        .ok_or_else(|| LowerError::NotFunctionEncoding {
            symbol: symbol.to_string(),
        })?;
    let spelling = ast
        .base_name(enc.name)
        .and_then(|name| name.strip_prefix(SOURCE_PREFIX))
        .ok_or_else(|| LowerError::NotAnIntrinsic(symbol.to_string()))?;
    let Some(rule) = rules::lookup(spelling) else {
        return Ok(None);
    };

    let suffix = match rule.suffix {
        SuffixRule::None => "",
        SuffixRule::BinOp(index) => {
            let (_, opcode) = template_arg(&ast, enc, index)?;
            crate::target::atomic_suffix(opcode)?
        }
        SuffixRule::NumKind(index) => {
            let ty = if index < 0 {
                enc.ret
            } else {
                usize::try_from(index)
                    .ok()
                    .and_then(|i| ast.list(enc.params).get(i).copied())
            };
            let ty = ty.ok_or_else(|| LowerError::MissingOperand {
                intrinsic: spelling.to_string(),
                index,
            })?;
            if intrinsic::is_float_node(&ast, ty) {
                "f"
            } else {
                "i"
            }
        }
    };
    Ok(Some(format!("{TARGET_PREFIX}{}{suffix}", rule.target)))
}

/// Symbol with the `_Z` prefix and the length digits that follow it
/// removed, e.g. `__esimd_flat_readIiLi16EE...`.
fn strip_mangling(symbol: &str) -> Option<&str> {
    let rest = symbol.strip_prefix(MANGLED_PREFIX)?;
    Some(rest.trim_start_matches(|c: char| c.is_ascii_digit()))
}

/// Lowering state for one function.
struct FnLowering<'a> {
    module: &'a mut Module,
    func: FuncId,
    body: Body,
    volatile: &'a FxHashSet<Ty>,
    stats: &'a mut LowerStats,
}

impl FnLowering<'_> {
    fn run(&mut self, options: &LowerOptions) -> Result<(), LowerError> {
        let order: Vec<InstId> = self.body.order().to_vec();
        let mut intrinsics = Vec::new();
        let mut erase = Vec::new();

        for id in order {
            let inst = self.body.inst(id);
            if let InstKind::Cast { op, .. } = inst.kind {
                if options.legalize_fp_casts
                    && matches!(op, CastOp::FPToUI | CastOp::FPToSI)
                    && cast::legalize_fp_to_int(self, id)
                {
                    self.stats.casts += 1;
                    erase.push(id);
                }
                continue;
            }
            let Some((callee, _)) = inst.as_call() else {
                continue;
            };
            let symbol = self.module.function(callee).name.clone();
            let Some(name) = strip_mangling(&symbol) else {
                continue;
            };

            match special::classify(name) {
                Some(special::Builtin::SpirvQuery(query)) => {
                    if special::lower_spirv_query(self, id, query)? {
                        self.stats.queries += 1;
                        erase.push(id);
                    }
                }
                Some(builtin) => {
                    if special::lower_builtin(self, id, builtin)? {
                        self.stats.builtins += 1;
                        erase.push(id);
                    } else if name.starts_with(SOURCE_PREFIX) {
                        intrinsics.push(id);
                    }
                }
                None if name.starts_with(SOURCE_PREFIX) => intrinsics.push(id),
                None => {}
            }
        }

        for id in intrinsics {
            if intrinsic::lower_intrinsic(self, id)? {
                self.stats.intrinsics += 1;
                erase.push(id);
            } else {
                self.stats.skipped += 1;
            }
        }
        for id in erase {
            self.body.erase(id);
        }
        Ok(())
    }

    fn ty_of(&self, value: Value) -> Ty {
        self.module.value_ty(self.func, &self.body, value)
    }

    fn function_name(&self) -> &str {
        &self.module.function(self.func).name
    }

    /// Insert `inst` before `anchor` and return it as an operand.
    fn insert(&mut self, anchor: InstId, inst: Inst) -> Value {
        Value::Inst(self.body.insert_before(anchor, inst))
    }

    /// Cast `value` from `from` to `to` before `anchor` when the types
    /// differ; the cast is named `<name>.cast.ty`.
    fn bridge(&mut self, anchor: InstId, value: Value, from: Ty, to: Ty) -> Result<Value, LowerError> {
        if from == to || from.is_void() || to.is_void() {
            return Ok(value);
        }
        let op = CastOp::between(from, to).ok_or(LowerError::NoCast { from, to })?;
        let name = match value {
            Value::Inst(id) if !self.body.inst(id).name.is_empty() => {
                format!("{}.cast.ty", self.body.inst(id).name)
            }
            _ => String::new(),
        };
        Ok(self.insert(anchor, Inst::cast(op, value, to, name)))
    }

    /// Redirect every use of `old` to `new`.
    fn replace_uses(&mut self, old: InstId, new: Value) {
        self.body.replace_all_uses(old, new);
    }
}
