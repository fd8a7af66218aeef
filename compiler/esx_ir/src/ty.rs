//! Interned front-end types.
//!
//! Every type is a `TypeKind` stored once in the `TypeTable`; structurally
//! equal kinds share one `TypeId`, so type equality is an integer compare.

use rustc_hash::FxHashMap;

use crate::record::RecordId;

define_index!(
    /// Index into the `TypeTable`.
    TypeId
);

/// Built-in scalar types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Builtin {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Int128,
    UInt128,
    Half,
    Float,
    Double,
    LongDouble,
    Float128,
}

impl Builtin {
    /// Size in bytes on the 64-bit device target.
    pub const fn size(self) -> u64 {
        match self {
            Builtin::Void => 0,
            Builtin::Bool | Builtin::Char | Builtin::SChar | Builtin::UChar => 1,
            Builtin::Short | Builtin::UShort | Builtin::Half => 2,
            Builtin::Int | Builtin::UInt | Builtin::Float => 4,
            Builtin::Long
            | Builtin::ULong
            | Builtin::LongLong
            | Builtin::ULongLong
            | Builtin::Double => 8,
            Builtin::Int128 | Builtin::UInt128 | Builtin::LongDouble | Builtin::Float128 => 16,
        }
    }

    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Builtin::Bool
                | Builtin::Char
                | Builtin::SChar
                | Builtin::UChar
                | Builtin::Short
                | Builtin::UShort
                | Builtin::Int
                | Builtin::UInt
                | Builtin::Long
                | Builtin::ULong
                | Builtin::LongLong
                | Builtin::ULongLong
                | Builtin::Int128
                | Builtin::UInt128
        )
    }

    /// Types the device cannot represent at all.
    pub const fn is_unsupported_on_device(self) -> bool {
        matches!(
            self,
            Builtin::Int128 | Builtin::UInt128 | Builtin::LongDouble | Builtin::Float128
        )
    }

    /// C++ spelling, as printed in diagnostics and the integration header.
    pub const fn spelling(self) -> &'static str {
        match self {
            Builtin::Void => "void",
            Builtin::Bool => "bool",
            Builtin::Char => "char",
            Builtin::SChar => "signed char",
            Builtin::UChar => "unsigned char",
            Builtin::Short => "short",
            Builtin::UShort => "unsigned short",
            Builtin::Int => "int",
            Builtin::UInt => "unsigned int",
            Builtin::Long => "long",
            Builtin::ULong => "unsigned long",
            Builtin::LongLong => "long long",
            Builtin::ULongLong => "unsigned long long",
            Builtin::Int128 => "__int128",
            Builtin::UInt128 => "unsigned __int128",
            Builtin::Half => "half",
            Builtin::Float => "float",
            Builtin::Double => "double",
            Builtin::LongDouble => "long double",
            Builtin::Float128 => "__float128",
        }
    }
}

/// Address space qualifier on a pointer's pointee.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressSpace {
    #[default]
    Generic,
    Global,
    GlobalDevice,
    GlobalHost,
    Local,
    Private,
    Constant,
}

impl AddressSpace {
    /// Global-family spaces are left alone when kernel pointers are retargeted.
    pub const fn is_global_family(self) -> bool {
        matches!(
            self,
            AddressSpace::Global | AddressSpace::GlobalDevice | AddressSpace::GlobalHost
        )
    }
}

/// Structural type description.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeKind {
    Builtin(Builtin),
    Vector { elem: TypeId, len: u32 },
    Pointer { pointee: TypeId, space: AddressSpace },
    Reference { pointee: TypeId },
    Array { elem: TypeId, len: u64 },
    VariableArray { elem: TypeId },
    Record(RecordId),
}

/// Interning table for `TypeKind`s.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    lookup: FxHashMap<TypeKind, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a kind, returning the existing id when already present.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let id = TypeId::from_len(self.kinds.len());
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, id);
        id
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    // ── Constructors ──

    pub fn builtin(&mut self, builtin: Builtin) -> TypeId {
        self.intern(TypeKind::Builtin(builtin))
    }

    pub fn pointer(&mut self, pointee: TypeId, space: AddressSpace) -> TypeId {
        self.intern(TypeKind::Pointer { pointee, space })
    }

    pub fn reference(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeKind::Reference { pointee })
    }

    pub fn array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(TypeKind::Array { elem, len })
    }

    pub fn variable_array(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::VariableArray { elem })
    }

    pub fn vector(&mut self, elem: TypeId, len: u32) -> TypeId {
        self.intern(TypeKind::Vector { elem, len })
    }

    pub fn record(&mut self, record: RecordId) -> TypeId {
        self.intern(TypeKind::Record(record))
    }

    // ── Queries ──

    pub fn as_builtin(&self, id: TypeId) -> Option<Builtin> {
        match self.kind(id) {
            TypeKind::Builtin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record(&self, id: TypeId) -> Option<RecordId> {
        match self.kind(id) {
            TypeKind::Record(r) => Some(*r),
            _ => None,
        }
    }

    /// Element type and length of a constant-size array.
    pub fn as_constant_array(&self, id: TypeId) -> Option<(TypeId, u64)> {
        match self.kind(id) {
            TypeKind::Array { elem, len } => Some((*elem, *len)),
            _ => None,
        }
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Array { .. } | TypeKind::VariableArray { .. }
        )
    }
}
