//! Vector IR: the instruction-level representation lowering rewrites.
//!
//! The model covers what a device module needs for intrinsic lowering and
//! nothing more: typed calls, casts, integer compares, two arithmetic ops,
//! lane extraction, loads, stores, and returns. A function body is a single
//! ordered instruction list; there is no control flow.
//!
//! # Architecture
//!
//! - **[`Module`]**: functions, globals, target triple, and kernel metadata
//! - **[`Function`]**: signature, calling convention, metadata, optional body
//! - **[`Body`]**: an instruction arena plus the live program order
//! - **[`Inst`]**: one typed instruction, optionally named
//!
//! Instructions are addressed by [`InstId`] into the body arena. Erasing an
//! instruction drops it from the program order but keeps its slot, so ids
//! held elsewhere stay valid.

mod print;

use smallvec::SmallVec;

use crate::metadata::KernelMetadata;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Function ID within a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FuncId(u32);

impl FuncId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Instruction ID within a [`Body`].
///
/// IDs are allocated sequentially and never reused, even after erasure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstId(u32);

impl InstId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Global variable ID within a [`Module`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GlobalId(u32);

impl GlobalId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

fn next_raw(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(raw) => raw,
        Err(_) => panic!("IR id space exhausted"),
    }
}

// ── Types ───────────────────────────────────────────────────────────

/// Element type of a scalar or vector value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarTy {
    /// Integer of the given bit width (`i1` is the boolean type).
    Int(u32),
    Half,
    Float,
    Double,
    /// Pointer into the given address space.
    Ptr(u32),
}

impl ScalarTy {
    /// Bit width; pointers are 64-bit.
    pub const fn bits(self) -> u32 {
        match self {
            ScalarTy::Int(bits) => bits,
            ScalarTy::Half => 16,
            ScalarTy::Float => 32,
            ScalarTy::Double | ScalarTy::Ptr(_) => 64,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ScalarTy::Half | ScalarTy::Float | ScalarTy::Double)
    }

    pub const fn is_int(self) -> bool {
        matches!(self, ScalarTy::Int(_))
    }

    pub const fn is_pointer(self) -> bool {
        matches!(self, ScalarTy::Ptr(_))
    }

    /// Overload mangling fragment, e.g. `i32`, `f16`, `p1`.
    pub fn mangle(self) -> String {
        match self {
            ScalarTy::Int(bits) => format!("i{bits}"),
            ScalarTy::Half => "f16".to_string(),
            ScalarTy::Float => "f32".to_string(),
            ScalarTy::Double => "f64".to_string(),
            ScalarTy::Ptr(space) => format!("p{space}"),
        }
    }
}

/// A first-class value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Void,
    Scalar(ScalarTy),
    /// Fixed-length vector.
    Vector(ScalarTy, u32),
}

impl Ty {
    pub const I1: Ty = Ty::Scalar(ScalarTy::Int(1));
    pub const I8: Ty = Ty::Scalar(ScalarTy::Int(8));
    pub const I16: Ty = Ty::Scalar(ScalarTy::Int(16));
    pub const I32: Ty = Ty::Scalar(ScalarTy::Int(32));
    pub const I64: Ty = Ty::Scalar(ScalarTy::Int(64));
    pub const F32: Ty = Ty::Scalar(ScalarTy::Float);

    pub const fn int(bits: u32) -> Ty {
        Ty::Scalar(ScalarTy::Int(bits))
    }

    pub const fn ptr(space: u32) -> Ty {
        Ty::Scalar(ScalarTy::Ptr(space))
    }

    pub const fn vector(elem: ScalarTy, lanes: u32) -> Ty {
        Ty::Vector(elem, lanes)
    }

    /// Scalar element type; `None` for `void`.
    pub const fn element(self) -> Option<ScalarTy> {
        match self {
            Ty::Void => None,
            Ty::Scalar(elem) | Ty::Vector(elem, _) => Some(elem),
        }
    }

    /// Lane count of a vector type.
    pub const fn lanes(self) -> Option<u32> {
        match self {
            Ty::Vector(_, lanes) => Some(lanes),
            _ => None,
        }
    }

    /// Same shape with a different element type.
    pub const fn with_element(self, elem: ScalarTy) -> Ty {
        match self {
            Ty::Void => Ty::Void,
            Ty::Scalar(_) => Ty::Scalar(elem),
            Ty::Vector(_, lanes) => Ty::Vector(elem, lanes),
        }
    }

    pub const fn is_void(self) -> bool {
        matches!(self, Ty::Void)
    }

    pub const fn is_vector(self) -> bool {
        matches!(self, Ty::Vector(..))
    }

    pub const fn is_pointer(self) -> bool {
        matches!(self, Ty::Scalar(ScalarTy::Ptr(_)))
    }

    pub const fn is_int_or_int_vector(self) -> bool {
        matches!(self, Ty::Scalar(ScalarTy::Int(_)) | Ty::Vector(ScalarTy::Int(_), _))
    }

    /// Total bit width across all lanes.
    pub const fn total_bits(self) -> u32 {
        match self {
            Ty::Void => 0,
            Ty::Scalar(elem) => elem.bits(),
            Ty::Vector(elem, lanes) => elem.bits() * lanes,
        }
    }

    /// Overload mangling fragment, e.g. `v16i32`.
    pub fn mangle(self) -> String {
        match self {
            Ty::Void => "isVoid".to_string(),
            Ty::Scalar(elem) => elem.mangle(),
            Ty::Vector(elem, lanes) => format!("v{lanes}{}", elem.mangle()),
        }
    }
}

// ── Values ──────────────────────────────────────────────────────────

/// A constant operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Const {
    /// Integer constant; a vector type splats the value across lanes.
    Int { ty: Ty, value: i64 },
    Undef(Ty),
    /// The all-zero value of any type (null for pointers).
    Zero(Ty),
}

impl Const {
    pub const fn int(ty: Ty, value: i64) -> Self {
        Const::Int { ty, value }
    }

    pub const fn ty(self) -> Ty {
        match self {
            Const::Int { ty, .. } | Const::Undef(ty) | Const::Zero(ty) => ty,
        }
    }
}

/// An instruction operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// Parameter of the enclosing function.
    Arg(u32),
    Inst(InstId),
    Const(Const),
    Global(GlobalId),
}

impl Value {
    pub const fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// Value of an integer constant operand.
    pub const fn as_const_int(self) -> Option<i64> {
        match self {
            Value::Const(Const::Int { value, .. }) => Some(value),
            _ => None,
        }
    }
}

// ── Instructions ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    FPTrunc,
    FPExt,
    PtrToInt,
    IntToPtr,
    BitCast,
}

impl CastOp {
    /// Unsigned cast opcode that converts `src` to `dst`.
    ///
    /// Both types must have the same shape, unless their total widths match,
    /// in which case the cast is a bitcast. Returns `None` when no single cast
    /// converts between them.
    pub fn between(src: Ty, dst: Ty) -> Option<CastOp> {
        if src == dst {
            return Some(CastOp::BitCast);
        }
        let (Some(s), Some(d)) = (src.element(), dst.element()) else {
            return None;
        };
        if src.lanes() != dst.lanes() {
            let plain = !s.is_pointer() && !d.is_pointer();
            return (plain && src.total_bits() == dst.total_bits()).then_some(CastOp::BitCast);
        }
        let op = match (s, d) {
            (ScalarTy::Int(a), ScalarTy::Int(b)) => match a.cmp(&b) {
                std::cmp::Ordering::Greater => CastOp::Trunc,
                std::cmp::Ordering::Less => CastOp::ZExt,
                std::cmp::Ordering::Equal => CastOp::BitCast,
            },
            (ScalarTy::Int(_), d) if d.is_float() => CastOp::UIToFP,
            (s, ScalarTy::Int(_)) if s.is_float() => CastOp::FPToUI,
            (s, d) if s.is_float() && d.is_float() => match s.bits().cmp(&d.bits()) {
                std::cmp::Ordering::Greater => CastOp::FPTrunc,
                std::cmp::Ordering::Less => CastOp::FPExt,
                std::cmp::Ordering::Equal => CastOp::BitCast,
            },
            (ScalarTy::Ptr(_), ScalarTy::Int(_)) => CastOp::PtrToInt,
            (ScalarTy::Int(_), ScalarTy::Ptr(_)) => CastOp::IntToPtr,
            (ScalarTy::Ptr(_), ScalarTy::Ptr(_)) => CastOp::BitCast,
            _ => return None,
        };
        Some(op)
    }

    pub const fn spelling(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::FPToUI => "fptoui",
            CastOp::FPToSI => "fptosi",
            CastOp::UIToFP => "uitofp",
            CastOp::SIToFP => "sitofp",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::BitCast => "bitcast",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Mul,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ICmpPred {
    Eq,
    Ne,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstKind {
    Call {
        callee: FuncId,
        args: SmallVec<[Value; 8]>,
    },
    Cast {
        op: CastOp,
        value: Value,
    },
    /// Lane-wise integer comparison; the result has `i1` elements.
    ICmp {
        pred: ICmpPred,
        lhs: Value,
        rhs: Value,
    },
    Binary {
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    ExtractElement {
        vector: Value,
        index: u32,
    },
    Load {
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    Ret(Option<Value>),
}

impl InstKind {
    /// Visit every operand in order.
    pub fn for_each_operand(&self, mut f: impl FnMut(Value)) {
        match self {
            InstKind::Call { args, .. } => args.iter().copied().for_each(f),
            InstKind::Cast { value, .. } => f(*value),
            InstKind::ICmp { lhs, rhs, .. } | InstKind::Binary { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            InstKind::ExtractElement { vector, .. } => f(*vector),
            InstKind::Load { ptr } => f(*ptr),
            InstKind::Store { value, ptr } => {
                f(*value);
                f(*ptr);
            }
            InstKind::Ret(value) => {
                if let Some(value) = value {
                    f(*value);
                }
            }
        }
    }

    /// Visit every operand mutably.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            InstKind::Call { args, .. } => args.iter_mut().for_each(f),
            InstKind::Cast { value, .. } => f(value),
            InstKind::ICmp { lhs, rhs, .. } | InstKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            InstKind::ExtractElement { vector, .. } => f(vector),
            InstKind::Load { ptr } => f(ptr),
            InstKind::Store { value, ptr } => {
                f(value);
                f(ptr);
            }
            InstKind::Ret(value) => {
                if let Some(value) = value {
                    f(value);
                }
            }
        }
    }
}

/// One typed instruction. An empty name prints as a numbered temporary.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Inst {
    pub kind: InstKind,
    pub ty: Ty,
    pub name: String,
}

impl Inst {
    pub fn new(kind: InstKind, ty: Ty, name: impl Into<String>) -> Self {
        Inst {
            kind,
            ty,
            name: name.into(),
        }
    }

    pub fn call(
        callee: FuncId,
        args: impl IntoIterator<Item = Value>,
        ty: Ty,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            InstKind::Call {
                callee,
                args: args.into_iter().collect(),
            },
            ty,
            name,
        )
    }

    pub fn cast(op: CastOp, value: Value, ty: Ty, name: impl Into<String>) -> Self {
        Self::new(InstKind::Cast { op, value }, ty, name)
    }

    /// Callee and arguments of a call instruction.
    pub fn as_call(&self) -> Option<(FuncId, &[Value])> {
        match &self.kind {
            InstKind::Call { callee, args } => Some((*callee, args.as_slice())),
            _ => None,
        }
    }
}

// ── Function bodies ─────────────────────────────────────────────────

/// Instruction arena plus the live program order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    insts: Vec<Inst>,
    order: Vec<InstId>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction at the end of the body.
    pub fn push(&mut self, inst: Inst) -> InstId {
        let id = self.alloc(inst);
        self.order.push(id);
        id
    }

    /// Insert an instruction immediately before `anchor`.
    ///
    /// Appends when `anchor` is no longer live.
    pub fn insert_before(&mut self, anchor: InstId, inst: Inst) -> InstId {
        let id = self.alloc(inst);
        let at = self
            .order
            .iter()
            .position(|&i| i == anchor)
            .unwrap_or(self.order.len());
        self.order.insert(at, id);
        id
    }

    fn alloc(&mut self, inst: Inst) -> InstId {
        let id = InstId::new(next_raw(self.insts.len()));
        self.insts.push(inst);
        id
    }

    #[inline]
    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    #[inline]
    pub fn inst_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id.index()]
    }

    /// Live instruction IDs in program order.
    pub fn order(&self) -> &[InstId] {
        &self.order
    }

    /// Live instructions in program order.
    pub fn iter(&self) -> impl Iterator<Item = (InstId, &Inst)> {
        self.order.iter().map(|&id| (id, self.inst(id)))
    }

    pub fn is_live(&self, id: InstId) -> bool {
        self.order.contains(&id)
    }

    /// Number of live instructions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove an instruction from the program order.
    pub fn erase(&mut self, id: InstId) {
        self.order.retain(|&i| i != id);
    }

    /// Rewrite every live use of `old` to `new`. Returns the number of
    /// operands rewritten.
    pub fn replace_all_uses(&mut self, old: InstId, new: Value) -> usize {
        let mut count = 0;
        for &id in &self.order {
            if id == old {
                continue;
            }
            self.insts[id.index()].kind.for_each_operand_mut(|operand| {
                if *operand == Value::Inst(old) {
                    *operand = new;
                    count += 1;
                }
            });
        }
        count
    }

    /// Number of live operands that refer to `id`.
    pub fn use_count(&self, id: InstId) -> usize {
        let mut count = 0;
        for (_, inst) in self.iter() {
            inst.kind.for_each_operand(|operand| {
                if operand == Value::Inst(id) {
                    count += 1;
                }
            });
        }
        count
    }
}

// ── Functions and globals ───────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CallingConv {
    #[default]
    Spir,
    SpirKernel,
}

/// Function-level metadata attached by the front-end.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FunctionMetadata {
    /// `sycl_explicit_simd`: the function body is lowered.
    pub explicit_simd: bool,
    /// `kernel_arg_type`: source spelling of each kernel argument type.
    pub arg_types: Vec<String>,
    /// `kernel_arg_accessor_ptr`: whether each argument is an accessor
    /// pointer.
    pub accessor_ptrs: Vec<bool>,
}

/// String function attribute, e.g. `"oclrt"="1"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FnAttr {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub cc: CallingConv,
    pub metadata: FunctionMetadata,
    pub attrs: Vec<FnAttr>,
    /// `None` for declarations.
    pub body: Option<Body>,
}

impl Function {
    pub fn declaration(name: impl Into<String>, params: Vec<Ty>, ret: Ty) -> Self {
        Function {
            name: name.into(),
            params,
            ret,
            cc: CallingConv::Spir,
            metadata: FunctionMetadata::default(),
            attrs: Vec::new(),
            body: None,
        }
    }

    pub fn definition(name: impl Into<String>, params: Vec<Ty>, ret: Ty, cc: CallingConv) -> Self {
        Function {
            cc,
            body: Some(Body::new()),
            ..Self::declaration(name, params, ret)
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_kernel(&self) -> bool {
        self.cc == CallingConv::SpirKernel
    }

    pub fn add_attr(&mut self, key: impl Into<String>, value: Option<&str>) {
        let key = key.into();
        if !self.has_attr(&key) {
            self.attrs.push(FnAttr {
                key,
                value: value.map(str::to_string),
            });
        }
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.iter().any(|a| a.key == key)
    }
}

/// Value type of a global variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GlobalTy {
    Plain(Ty),
    /// Named struct type.
    Struct { name: String, fields: Vec<Ty> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    pub name: String,
    pub ty: GlobalTy,
    pub addr_space: u32,
    /// Carries the `genx_volatile` attribute.
    pub genx_volatile: bool,
}

// ── Module ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Module {
    pub name: String,
    pub triple: String,
    functions: Vec<Function>,
    globals: Vec<Global>,
    /// The `genx.kernels` named metadata, once generated.
    pub genx_kernels: Option<Vec<KernelMetadata>>,
}

impl Module {
    pub fn new(name: impl Into<String>, triple: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            triple: triple.into(),
            ..Self::default()
        }
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId::new(next_raw(self.functions.len()));
        self.functions.push(function);
        id
    }

    #[inline]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    #[inline]
    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::new(next_raw(i)), f))
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions().find(|(_, f)| f.name == name).map(|(id, _)| id)
    }

    /// Find a function by name, declaring it when absent.
    pub fn get_or_insert_declaration(&mut self, name: &str, params: Vec<Ty>, ret: Ty) -> FuncId {
        match self.find_function(name) {
            Some(id) => id,
            None => self.add_function(Function::declaration(name, params, ret)),
        }
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        let id = GlobalId::new(next_raw(self.globals.len()));
        self.globals.push(global);
        id
    }

    #[inline]
    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn globals(&self) -> impl Iterator<Item = &Global> {
        self.globals.iter()
    }

    /// Type of `value` as seen inside `func`, whose body is `body`.
    pub fn value_ty(&self, func: FuncId, body: &Body, value: Value) -> Ty {
        match value {
            Value::Arg(index) => self
                .function(func)
                .params
                .get(index as usize)
                .copied()
                .unwrap_or(Ty::Void),
            Value::Inst(id) => body.inst(id).ty,
            Value::Const(c) => c.ty(),
            Value::Global(id) => Ty::ptr(self.global(id).addr_space),
        }
    }

    /// Functions whose bodies call `callee`, in module order.
    pub fn callers_of(&self, callee: FuncId) -> Vec<FuncId> {
        self.functions()
            .filter(|(_, f)| {
                f.body.as_ref().is_some_and(|body| {
                    body.iter()
                        .any(|(_, inst)| inst.as_call().is_some_and(|(c, _)| c == callee))
                })
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Replace the architecture component of the target triple.
    pub fn set_arch(&mut self, arch: &str) {
        self.triple = match self.triple.split_once('-') {
            Some((_, rest)) => format!("{arch}-{rest}"),
            None => arch.to_string(),
        };
    }
}
