//! Record declarations: structs, classes, unions, and lambda closures.
//!
//! Records carry the layout the front-end computed (field and base offsets,
//! size) plus the facts kernel synthesis needs: triviality, special-type
//! descriptors, and the `__init`-style methods whose parameter lists define
//! how a special type is flattened into kernel arguments.

use crate::function::FuncId;
use crate::span::Span;
use crate::ty::TypeId;

define_index!(
    /// Index into the program's record list.
    RecordId
);

/// Field `index` of `record`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRef {
    pub record: RecordId,
    pub index: u32,
}

impl FieldRef {
    pub const fn new(record: RecordId, index: u32) -> Self {
        FieldRef { record, index }
    }
}

/// Base specifier `index` of `record`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct BaseRef {
    pub record: RecordId,
    pub index: u32,
}

impl BaseRef {
    pub const fn new(record: RecordId, index: u32) -> Self {
        BaseRef { record, index }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordKind {
    Struct,
    Class,
    Union,
    /// Closure type of a lambda expression.
    Lambda,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeId,
    /// Byte offset within the owning record.
    pub offset: u64,
    pub span: Span,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct BaseSpec {
    pub ty: TypeId,
    /// Byte offset of the base subobject within the derived record.
    pub offset: u64,
    pub span: Span,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodParam {
    pub name: String,
    pub ty: TypeId,
}

/// A member function signature. Only the name and parameters matter here.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<MethodParam>,
}

/// A template argument as written on a class template specialization.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum TemplateArg {
    Type(TypeId),
    Integral(i64),
    Pack(Vec<TemplateArg>),
    /// Any other argument form (template template, unresolved expression).
    Other,
}

/// Access target of an accessor, with the runtime's numeric codes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessTarget {
    GlobalBuffer,
    ConstantBuffer,
    Local,
    Image,
    HostBuffer,
    HostImage,
    ImageArray,
}

impl AccessTarget {
    pub const fn code(self) -> u32 {
        match self {
            AccessTarget::GlobalBuffer => 2014,
            AccessTarget::ConstantBuffer => 2015,
            AccessTarget::Local => 2016,
            AccessTarget::Image => 2017,
            AccessTarget::HostBuffer => 2018,
            AccessTarget::HostImage => 2019,
            AccessTarget::ImageArray => 2020,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessorInfo {
    pub data_ty: TypeId,
    pub dims: u32,
    pub target: AccessTarget,
    /// The `PropertyListT` template argument, when the accessor has one.
    pub property_list: Option<TemplateArg>,
}

/// Runtime resource types that are initialised rather than copied.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum SpecialKind {
    Accessor(AccessorInfo),
    Sampler,
    Stream,
    SpecConstant { id: String },
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordDecl {
    pub name: String,
    pub kind: RecordKind,
    pub span: Span,
    pub bases: Vec<BaseSpec>,
    pub fields: Vec<FieldDecl>,
    pub size: u64,
    pub align: u64,
    pub trivial_copy: bool,
    pub trivial_destructor: bool,
    pub standard_layout: bool,
    pub template_args: Vec<TemplateArg>,
    pub methods: Vec<MethodDecl>,
    pub special: Option<SpecialKind>,
    pub call_operator: Option<FuncId>,
    /// Location of an implicit `this` capture, for lambdas.
    pub implicit_this_capture: Option<Span>,
}

impl RecordDecl {
    /// A trivially copyable, standard-layout, empty record.
    pub fn new(name: impl Into<String>, kind: RecordKind) -> Self {
        RecordDecl {
            name: name.into(),
            kind,
            span: Span::DUMMY,
            bases: Vec::new(),
            fields: Vec::new(),
            size: 0,
            align: 1,
            trivial_copy: true,
            trivial_destructor: true,
            standard_layout: true,
            template_args: Vec::new(),
            methods: Vec::new(),
            special: None,
            call_operator: None,
            implicit_this_capture: None,
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: TypeId, offset: u64) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            offset,
            span: Span::DUMMY,
        });
        self
    }

    #[must_use]
    pub fn with_base(mut self, ty: TypeId, offset: u64) -> Self {
        self.bases.push(BaseSpec {
            ty,
            offset,
            span: Span::DUMMY,
        });
        self
    }

    #[must_use]
    pub fn with_layout(mut self, size: u64, align: u64) -> Self {
        self.size = size;
        self.align = align;
        self
    }

    #[must_use]
    pub fn with_method(mut self, name: impl Into<String>, params: Vec<MethodParam>) -> Self {
        self.methods.push(MethodDecl {
            name: name.into(),
            params,
        });
        self
    }

    #[must_use]
    pub fn with_special(mut self, special: SpecialKind) -> Self {
        self.special = Some(special);
        self
    }

    #[must_use]
    pub fn with_template_args(mut self, args: Vec<TemplateArg>) -> Self {
        self.template_args = args;
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn is_union(&self) -> bool {
        self.kind == RecordKind::Union
    }

    pub fn is_lambda(&self) -> bool {
        self.kind == RecordKind::Lambda
    }

    pub fn accessor(&self) -> Option<&AccessorInfo> {
        match &self.special {
            Some(SpecialKind::Accessor(info)) => Some(info),
            _ => None,
        }
    }
}

impl MethodParam {
    pub fn new(name: impl Into<String>, ty: TypeId) -> Self {
        MethodParam {
            name: name.into(),
            ty,
        }
    }
}
