//! Textual rendering of the vector IR, for logs and tests.

use std::fmt::{self, Write as _};

use super::{
    BinOp, Body, CallingConv, Const, FuncId, Function, GlobalTy, ICmpPred, InstKind, Module,
    ScalarTy, Ty, Value,
};

impl fmt::Display for ScalarTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarTy::Int(bits) => write!(f, "i{bits}"),
            ScalarTy::Half => f.write_str("half"),
            ScalarTy::Float => f.write_str("float"),
            ScalarTy::Double => f.write_str("double"),
            ScalarTy::Ptr(0) => f.write_str("ptr"),
            ScalarTy::Ptr(space) => write!(f, "ptr addrspace({space})"),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => f.write_str("void"),
            Ty::Scalar(elem) => write!(f, "{elem}"),
            Ty::Vector(elem, lanes) => write!(f, "<{lanes} x {elem}>"),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Int { ty, value } => write!(f, "{ty} {value}"),
            Const::Undef(ty) => write!(f, "{ty} undef"),
            Const::Zero(ty) => write!(f, "{ty} zeroinitializer"),
        }
    }
}

fn operand(module: &Module, body: &Body, value: Value) -> String {
    match value {
        Value::Arg(index) => format!("%arg{index}"),
        Value::Inst(id) => {
            let inst = body.inst(id);
            if inst.name.is_empty() {
                format!("%{}", id.raw())
            } else {
                format!("%{}", inst.name)
            }
        }
        Value::Const(c) => c.to_string(),
        Value::Global(id) => format!("@{}", module.global(id).name),
    }
}

fn write_body(out: &mut String, module: &Module, body: &Body) -> fmt::Result {
    for (id, inst) in body.iter() {
        out.push_str("  ");
        if !inst.ty.is_void() && !matches!(inst.kind, InstKind::Store { .. } | InstKind::Ret(_)) {
            write!(out, "{} = ", operand(module, body, Value::Inst(id)))?;
        }
        let op = |v: Value| operand(module, body, v);
        match &inst.kind {
            InstKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|&a| op(a)).collect();
                write!(
                    out,
                    "call {} @{}({})",
                    inst.ty,
                    module.function(*callee).name,
                    args.join(", ")
                )?;
            }
            InstKind::Cast { op: cast, value } => {
                write!(out, "{} {} to {}", cast.spelling(), op(*value), inst.ty)?;
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                let pred = match pred {
                    ICmpPred::Eq => "eq",
                    ICmpPred::Ne => "ne",
                };
                write!(out, "icmp {pred} {}, {}", op(*lhs), op(*rhs))?;
            }
            InstKind::Binary { op: bin, lhs, rhs } => {
                let name = match bin {
                    BinOp::Add => "add",
                    BinOp::Mul => "mul",
                };
                write!(out, "{name} {}, {}", op(*lhs), op(*rhs))?;
            }
            InstKind::ExtractElement { vector, index } => {
                write!(out, "extractelement {}, i32 {index}", op(*vector))?;
            }
            InstKind::Load { ptr } => write!(out, "load {}, {}", inst.ty, op(*ptr))?,
            InstKind::Store { value, ptr } => write!(out, "store {}, {}", op(*value), op(*ptr))?,
            InstKind::Ret(None) => out.push_str("ret void"),
            InstKind::Ret(Some(value)) => write!(out, "ret {}", op(*value))?,
        }
        out.push('\n');
    }
    Ok(())
}

/// Render one function, including its body when it has one.
fn function_to_string(module: &Module, function: &Function) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_function(&mut out, module, function);
    out
}

fn write_function(out: &mut String, module: &Module, function: &Function) -> fmt::Result {
    let params: Vec<String> = function.params.iter().map(ToString::to_string).collect();
    let Some(body) = &function.body else {
        return writeln!(
            out,
            "declare {} @{}({})",
            function.ret,
            function.name,
            params.join(", ")
        );
    };
    let cc = match function.cc {
        CallingConv::Spir => "spir_func",
        CallingConv::SpirKernel => "spir_kernel",
    };
    write!(out, "define {cc} {} @{}({})", function.ret, function.name, params.join(", "))?;
    for attr in &function.attrs {
        match &attr.value {
            Some(value) => write!(out, " \"{}\"=\"{value}\"", attr.key)?,
            None => write!(out, " \"{}\"", attr.key)?,
        }
    }
    if function.metadata.explicit_simd {
        out.push_str(" !sycl_explicit_simd");
    }
    out.push_str(" {\n");
    write_body(out, module, body)?;
    out.push_str("}\n");
    Ok(())
}

impl Module {
    /// Text of a single function.
    pub fn function_text(&self, id: FuncId) -> String {
        function_to_string(self, self.function(id))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        writeln!(f, "target triple = \"{}\"", self.triple)?;
        for global in self.globals() {
            let ty = match &global.ty {
                GlobalTy::Plain(ty) => ty.to_string(),
                GlobalTy::Struct { name, .. } => format!("%\"{name}\""),
            };
            write!(f, "@{} = addrspace({}) global {ty}", global.name, global.addr_space)?;
            if global.genx_volatile {
                f.write_str(" \"genx_volatile\"")?;
            }
            writeln!(f)?;
        }
        for (_, function) in self.functions() {
            f.write_str(&function_to_string(self, function))?;
        }
        if let Some(kernels) = &self.genx_kernels {
            for kernel in kernels {
                writeln!(f, "!genx.kernels = {kernel}")?;
            }
        }
        Ok(())
    }
}
