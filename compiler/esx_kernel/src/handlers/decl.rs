//! Kernel entry parameters.
//!
//! [`DeclBuilder`] produces the flat argument list: one parameter per
//! simple member, one per initializer parameter of each resource. Pointers
//! nested in a struct and arrays passed whole travel inside a one-field
//! `__wrapper_class`, which is only created when the walk is finished and the
//! program can be mutated again.

use esx_diagnostic::{Diagnostic, ErrorCode};
use esx_ir::{
    AddressSpace, Program, RecordDecl, RecordId, RecordKind, Span, TemplateArg, TypeId, TypeKind,
};

use super::{init_params, is_record_named, kernel_pointer_space};
use crate::visitor::{Capabilities, Event, FieldHandler, Site};

/// Name of the generated carrier struct.
pub const WRAPPER_CLASS: &str = "__wrapper_class";

/// One parameter of a synthesized kernel entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelParam {
    /// `_arg_` followed by the source member name.
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
    /// Pointer argument of an accessor in an explicit SIMD kernel.
    pub esimd_accessor_ptr: bool,
    /// `buffer_location` property of the accessor this pointer belongs to.
    pub buffer_location: Option<i64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Shape {
    Direct(TypeId),
    Pointer {
        pointee: TypeId,
        space: AddressSpace,
        wrapped: bool,
    },
    WrappedArray(TypeId),
}

#[derive(Clone, Debug)]
struct Pending {
    name: String,
    shape: Shape,
    span: Span,
    esimd_accessor_ptr: bool,
    buffer_location: Option<i64>,
}

#[derive(Debug, Default)]
pub struct DeclBuilder {
    simd: bool,
    params: Vec<Pending>,
    depth: u32,
    diagnostics: Vec<Diagnostic>,
}

impl DeclBuilder {
    pub fn new(simd: bool) -> Self {
        DeclBuilder {
            simd,
            ..Self::default()
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    fn push(&mut self, program: &Program, site: &Site, shape: Shape) {
        self.params.push(Pending {
            name: format!("_arg_{}", site.name(program)),
            shape,
            span: site.span,
            esimd_accessor_ptr: false,
            buffer_location: None,
        });
    }

    fn resource(&mut self, program: &Program, site: &Site, record: RecordId) {
        let accessor = program.record(record).accessor();
        for param in init_params(program, record, self.simd) {
            self.push(program, site, Shape::Direct(param.ty));
            let is_pointer = matches!(program.types.kind(param.ty), TypeKind::Pointer { .. });
            if let (Some(info), true) = (accessor, is_pointer) {
                let location = self.buffer_location(program, info.property_list.as_ref(), site);
                if let Some(last) = self.params.last_mut() {
                    last.buffer_location = location;
                    last.esimd_accessor_ptr = self.simd;
                }
            }
        }
    }

    /// The `buffer_location` property of an accessor's property list.
    fn buffer_location(
        &mut self,
        program: &Program,
        list: Option<&TemplateArg>,
        site: &Site,
    ) -> Option<i64> {
        let Some(TemplateArg::Type(list_ty)) = list else {
            return None;
        };
        let list_record = program.types.as_record(*list_ty)?;
        let [TemplateArg::Pack(properties)] = program.record(list_record).template_args.as_slice()
        else {
            return None;
        };
        let mut found = None;
        for property in properties {
            let TemplateArg::Type(ty) = property else {
                continue;
            };
            if !is_record_named(program, *ty, "buffer_location") {
                continue;
            }
            let Some(record) = program.types.as_record(*ty) else {
                continue;
            };
            let [TemplateArg::Integral(location)] = program.record(record).template_args.as_slice()
            else {
                continue;
            };
            if found.is_some() {
                self.diagnostics.push(
                    Diagnostic::error(ErrorCode::E1009)
                        .with_message("can't apply buffer_location property twice to the same accessor")
                        .with_label(site.span, "in this accessor"),
                );
                break;
            }
            found = Some(*location);
        }
        found
    }

    fn pointer(&mut self, program: &Program, site: &Site) {
        if let TypeKind::Pointer { pointee, space } = program.types.kind(site.ty) {
            let shape = Shape::Pointer {
                pointee: *pointee,
                space: kernel_pointer_space(*space),
                wrapped: self.depth > 0,
            };
            self.push(program, site, shape);
        }
    }

    /// Materialize parameter types and return the flat argument list.
    pub fn finish(self, program: &mut Program) -> (Vec<KernelParam>, Vec<Diagnostic>) {
        let params = self
            .params
            .into_iter()
            .map(|pending| {
                let ty = match pending.shape {
                    Shape::Direct(ty) => ty,
                    Shape::Pointer {
                        pointee,
                        space,
                        wrapped,
                    } => {
                        let ptr = program.types.pointer(pointee, space);
                        if wrapped {
                            wrap(program, ptr)
                        } else {
                            ptr
                        }
                    }
                    Shape::WrappedArray(array) => wrap(program, array),
                };
                KernelParam {
                    name: pending.name,
                    ty,
                    span: pending.span,
                    esimd_accessor_ptr: pending.esimd_accessor_ptr,
                    buffer_location: pending.buffer_location,
                }
            })
            .collect();
        (params, self.diagnostics)
    }
}

/// A fresh `__wrapper_class` holding one `ty` at offset zero.
fn wrap(program: &mut Program, ty: TypeId) -> TypeId {
    let size = program.size_of(ty);
    let align = natural_align(program, ty);
    let record = RecordDecl::new(WRAPPER_CLASS, RecordKind::Struct)
        .with_field("value", ty, 0)
        .with_layout(size, align);
    program.add_record_type(record).1
}

fn natural_align(program: &Program, ty: TypeId) -> u64 {
    match program.types.kind(ty) {
        TypeKind::Array { elem, .. } | TypeKind::VariableArray { elem } => {
            natural_align(program, *elem)
        }
        TypeKind::Record(record) => program.record(*record).align,
        _ => program.size_of(ty).clamp(1, 16),
    }
}

impl FieldHandler for DeclBuilder {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_INSIDE_SIMPLE
    }

    fn handle(&mut self, program: &Program, event: &Event) {
        match event {
            Event::Accessor { site, record } | Event::Sampler { site, record } => {
                self.resource(program, site, *record);
            }
            Event::Stream { site, .. } if !site.is_base() => {
                self.push(program, site, Shape::Direct(site.ty));
            }
            Event::Half(site)
            | Event::Scalar(site)
            | Event::SimpleStruct { site, .. }
            | Event::Union { site, .. } => self.push(program, site, Shape::Direct(site.ty)),
            Event::Pointer(site) => self.pointer(program, site),
            Event::SimpleArray(site) => self.push(program, site, Shape::WrappedArray(site.ty)),
            Event::EnterStruct { .. } | Event::EnterStream { .. } => self.depth += 1,
            Event::LeaveStruct { .. } | Event::LeaveStream { .. } => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }
    }
}

/// Sums the size of every kernel argument and warns past the limit.
#[derive(Debug)]
pub struct ArgsSizeChecker {
    simd: bool,
    limit: u64,
    total: u64,
}

/// Argument size most devices accept.
pub const MAX_KERNEL_ARGS_SIZE: u64 = 2048;

impl ArgsSizeChecker {
    pub fn new(simd: bool, limit: u64) -> Self {
        ArgsSizeChecker {
            simd,
            limit,
            total: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// A warning when the total exceeds the limit.
    pub fn finish(self, span: Span) -> Option<Diagnostic> {
        (self.total > self.limit).then(|| {
            Diagnostic::warning(ErrorCode::W1001)
                .with_message(format!(
                    "size of kernel arguments ({} bytes) may exceed the supported maximum of {} bytes on some devices",
                    self.total, self.limit
                ))
                .with_label(span, "kernel launched here")
        })
    }
}

impl FieldHandler for ArgsSizeChecker {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_INSIDE_SIMPLE
    }

    fn handle(&mut self, program: &Program, event: &Event) {
        match event {
            Event::Accessor { record, .. } | Event::Sampler { record, .. } => {
                self.total += init_params(program, *record, self.simd)
                    .iter()
                    .map(|p| program.size_of(p.ty))
                    .sum::<u64>();
            }
            Event::Stream { site, .. } if !site.is_base() => self.total += program.size_of(site.ty),
            Event::Half(site)
            | Event::Scalar(site)
            | Event::SimpleStruct { site, .. }
            | Event::Union { site, .. }
            | Event::Pointer(site)
            | Event::SimpleArray(site) => self.total += program.size_of(site.ty),
            _ => {}
        }
    }
}
