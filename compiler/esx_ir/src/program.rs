//! The whole translation unit as seen by kernel synthesis.
//!
//! # Design
//!
//! `Program` owns the type table, all records, and all functions. Handlers
//! borrow it immutably while walking a kernel object; the only mutation that
//! happens between the checking walk and synthesis is `apply_marks`, which
//! records which records and array fields require decomposition. Every later
//! walk reads those marks instead of recomputing them.

use rustc_hash::FxHashSet;

use crate::function::{FuncId, FunctionDecl, FunctionKind};
use crate::record::{FieldDecl, FieldRef, RecordDecl, RecordId, SpecialKind};
use crate::ty::{Builtin, TypeId, TypeKind, TypeTable};

/// Category of a field type, in visitor dispatch order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TypeClass {
    Accessor(RecordId),
    Sampler(RecordId),
    Half,
    SpecConstant(RecordId),
    Stream(RecordId),
    Struct(RecordId),
    Union(RecordId),
    Reference,
    Pointer,
    Array,
    Scalar,
    Other,
}

/// Records and array fields that must be split into separate kernel
/// parameters because they transitively hold a pointer or special type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecompositionMarks {
    records: FxHashSet<RecordId>,
    array_fields: FxHashSet<FieldRef>,
}

impl DecompositionMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_record(&mut self, record: RecordId) {
        self.records.insert(record);
    }

    pub fn mark_array_field(&mut self, field: FieldRef) {
        self.array_fields.insert(field);
    }

    pub fn has_record(&self, record: RecordId) -> bool {
        self.records.contains(&record)
    }

    pub fn has_array_field(&self, field: FieldRef) -> bool {
        self.array_fields.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.array_fields.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Program {
    pub types: TypeTable,
    records: Vec<RecordDecl>,
    functions: Vec<FunctionDecl>,
    marks: DecompositionMarks,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Declarations ──

    pub fn add_record(&mut self, record: RecordDecl) -> RecordId {
        let id = RecordId::from_len(self.records.len());
        self.records.push(record);
        id
    }

    /// Adds a record and interns its type.
    pub fn add_record_type(&mut self, record: RecordDecl) -> (RecordId, TypeId) {
        let id = self.add_record(record);
        (id, self.types.record(id))
    }

    #[inline]
    pub fn record(&self, id: RecordId) -> &RecordDecl {
        &self.records[id.index()]
    }

    pub fn record_mut(&mut self, id: RecordId) -> &mut RecordDecl {
        &mut self.records[id.index()]
    }

    pub fn add_function(&mut self, function: FunctionDecl) -> FuncId {
        let id = FuncId::from_len(self.functions.len());
        self.functions.push(function);
        id
    }

    #[inline]
    pub fn function(&self, id: FuncId) -> &FunctionDecl {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut FunctionDecl {
        &mut self.functions[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &FunctionDecl)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::from_len(i), f))
    }

    pub fn field(&self, field: FieldRef) -> &FieldDecl {
        &self.record(field.record).fields[field.index as usize]
    }

    // ── Type queries ──

    pub fn special_kind(&self, ty: TypeId) -> Option<&SpecialKind> {
        let record = self.types.as_record(ty)?;
        self.record(record).special.as_ref()
    }

    /// Classify a field type for visitor dispatch.
    pub fn classify(&self, ty: TypeId) -> TypeClass {
        match self.types.kind(ty) {
            TypeKind::Record(id) => {
                let record = self.record(*id);
                match &record.special {
                    Some(SpecialKind::Accessor(_)) => TypeClass::Accessor(*id),
                    Some(SpecialKind::Sampler) => TypeClass::Sampler(*id),
                    Some(SpecialKind::SpecConstant { .. }) => TypeClass::SpecConstant(*id),
                    Some(SpecialKind::Stream) => TypeClass::Stream(*id),
                    None if record.is_union() => TypeClass::Union(*id),
                    None => TypeClass::Struct(*id),
                }
            }
            TypeKind::Builtin(Builtin::Half) => TypeClass::Half,
            TypeKind::Builtin(Builtin::Void) => TypeClass::Other,
            TypeKind::Builtin(_) | TypeKind::Vector { .. } => TypeClass::Scalar,
            TypeKind::Reference { .. } => TypeClass::Reference,
            TypeKind::Pointer { .. } => TypeClass::Pointer,
            TypeKind::Array { .. } | TypeKind::VariableArray { .. } => TypeClass::Array,
        }
    }

    /// Size in bytes of a value of `ty`.
    pub fn size_of(&self, ty: TypeId) -> u64 {
        match self.types.kind(ty) {
            TypeKind::Builtin(b) => b.size(),
            TypeKind::Vector { elem, len } => {
                // three-element vectors occupy four lanes
                let lanes = if *len == 3 { 4 } else { u64::from(*len) };
                self.size_of(*elem) * lanes
            }
            TypeKind::Pointer { .. } | TypeKind::Reference { .. } => 8,
            TypeKind::Array { elem, len } => self.size_of(*elem) * len,
            TypeKind::VariableArray { .. } => 0,
            TypeKind::Record(id) => self.record(*id).size,
        }
    }

    /// Human-readable spelling for diagnostics and headers.
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.types.kind(ty) {
            TypeKind::Builtin(b) => b.spelling().to_string(),
            TypeKind::Vector { elem, len } => format!(
                "{} __attribute__((ext_vector_type({len})))",
                self.type_name(*elem)
            ),
            TypeKind::Pointer { pointee, .. } => format!("{} *", self.type_name(*pointee)),
            TypeKind::Reference { pointee } => format!("{} &", self.type_name(*pointee)),
            TypeKind::Array { elem, len } => format!("{}[{len}]", self.type_name(*elem)),
            TypeKind::VariableArray { elem } => format!("{}[]", self.type_name(*elem)),
            TypeKind::Record(id) => self.record(*id).name.clone(),
        }
    }

    // ── Kernel shape ──

    /// The kernel object record passed to a kernel caller.
    pub fn kernel_object(&self, caller: FuncId) -> Option<RecordId> {
        let param = self.function(caller).params.first()?;
        match self.types.kind(param.ty) {
            TypeKind::Reference { pointee } => self.types.as_record(*pointee),
            _ => self.types.as_record(param.ty),
        }
    }

    /// True when the kernel object's `operator()` is explicit SIMD.
    pub fn is_simd_kernel_object(&self, record: RecordId) -> bool {
        self.record(record)
            .call_operator
            .is_some_and(|op| self.function(op).is_explicit_simd())
    }

    /// All kernel caller instantiations, in declaration order.
    pub fn kernel_callers(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions()
            .filter(|(_, f)| matches!(f.kind, FunctionKind::KernelCaller { .. }))
            .map(|(id, _)| id)
    }

    // ── Decomposition marks ──

    pub fn apply_marks(&mut self, marks: &DecompositionMarks) {
        self.marks.records.extend(marks.records.iter().copied());
        self.marks
            .array_fields
            .extend(marks.array_fields.iter().copied());
    }

    pub fn requires_decomposition(&self, record: RecordId) -> bool {
        self.marks.has_record(record)
    }

    pub fn array_requires_decomposition(&self, field: FieldRef) -> bool {
        self.marks.has_array_field(field)
    }
}
