//! Module builders shared by the unit tests.

use crate::ir::{
    Body, CallingConv, FuncId, Function, FunctionMetadata, Inst, InstId, InstKind, Module, Ty,
    Value,
};

pub(crate) const TRIPLE: &str = "spir64-unknown-unknown";

pub(crate) fn module() -> Module {
    Module::new("test", TRIPLE)
}

/// An explicit-SIMD `spir_kernel` with an empty body.
pub(crate) fn simd_kernel(module: &mut Module, name: &str, params: Vec<Ty>) -> FuncId {
    let mut function = Function::definition(name, params, Ty::Void, CallingConv::SpirKernel);
    function.metadata = FunctionMetadata {
        explicit_simd: true,
        ..FunctionMetadata::default()
    };
    module.add_function(function)
}

/// An explicit-SIMD device function with an empty body.
pub(crate) fn simd_function(module: &mut Module, name: &str, params: Vec<Ty>) -> FuncId {
    let mut function = Function::definition(name, params, Ty::Void, CallingConv::Spir);
    function.metadata.explicit_simd = true;
    module.add_function(function)
}

/// Append `name = call ret @symbol(args)` to `func`, declaring the callee
/// with the argument types as its parameters.
pub(crate) fn push_call(
    module: &mut Module,
    func: FuncId,
    symbol: &str,
    args: &[Value],
    ret: Ty,
    name: &str,
) -> InstId {
    let params: Vec<Ty> = {
        let body = module.function(func).body.as_ref().map_or_else(Body::new, Clone::clone);
        args.iter().map(|&v| module.value_ty(func, &body, v)).collect()
    };
    let callee = module.get_or_insert_declaration(symbol, params, ret);
    push(module, func, Inst::call(callee, args.iter().copied(), ret, name))
}

/// Append `inst` to the body of `func`.
pub(crate) fn push(module: &mut Module, func: FuncId, inst: Inst) -> InstId {
    module
        .function_mut(func)
        .body
        .get_or_insert_with(Body::new)
        .push(inst)
}

/// Append a `store` of `value` to a null pointer, giving `value` a use.
pub(crate) fn keep_alive(module: &mut Module, func: FuncId, value: Value) -> InstId {
    let ptr = Value::Const(crate::ir::Const::Zero(Ty::ptr(1)));
    push(module, func, Inst::new(InstKind::Store { value, ptr }, Ty::Void, ""))
}

pub(crate) fn body(module: &Module, func: FuncId) -> &Body {
    match module.function(func).body.as_ref() {
        Some(body) => body,
        None => panic!("{} has no body", module.function(func).name),
    }
}

/// Live calls of `func` as (callee name, instruction).
pub(crate) fn calls<'m>(module: &'m Module, func: FuncId) -> Vec<(&'m str, &'m Inst)> {
    body(module, func)
        .iter()
        .filter_map(|(_, inst)| {
            inst.as_call()
                .map(|(callee, _)| (module.function(callee).name.as_str(), inst))
        })
        .collect()
}

/// The single live call to a function whose name starts with `prefix`.
pub(crate) fn call_to<'m>(module: &'m Module, func: FuncId, prefix: &str) -> &'m Inst {
    let found: Vec<_> = calls(module, func)
        .into_iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .collect();
    match found.as_slice() {
        [(_, inst)] => inst,
        _ => panic!("expected one call to {prefix}*, found {}", found.len()),
    }
}

/// Operand stored by the last `store` of `func`.
pub(crate) fn stored_value(module: &Module, func: FuncId) -> Value {
    let last = body(module, func)
        .iter()
        .filter_map(|(_, inst)| match inst.kind {
            InstKind::Store { value, .. } => Some(value),
            _ => None,
        })
        .last();
    match last {
        Some(value) => value,
        None => panic!("no store in {}", module.function(func).name),
    }
}
