//! Field and base graph visitor.
//!
//! Walks a kernel object's bases, then its fields, in declaration order.
//! Every member is classified once and turned into an [`Event`] that is fed
//! to each active [`FieldHandler`].
//!
//! # Design
//!
//! Handlers are a slice of trait objects fixed by the caller. Each one states
//! its [`Capabilities`] up front; the walker turns those into precomputed
//! bitmasks over handler indices, so "which handlers want this" is one AND.
//!
//! Per container the active set splits in two: handlers that take the simple
//! shortcut (`SimpleStruct`, `SimpleArray`) and handlers that descend. A
//! container marked for decomposition sends every active handler down the
//! descending path. No handler ever sees both paths for one container.
//!
//! Enter and leave events are paired by [`Scope`]: the guard emits the enter
//! event on creation and the matching leave event on drop.

use std::ops::{Deref, DerefMut};

use bitflags::bitflags;
use esx_ir::{BaseRef, FieldRef, Program, RecordId, Span, TypeClass, TypeId};
use smallvec::SmallVec;
use tracing::trace;

bitflags! {
    /// What a handler wants the visitor to walk into.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct Capabilities: u8 {
        /// Descend into structs and arrays that do not require decomposition.
        const VISIT_INSIDE_SIMPLE = 1 << 0;
        /// Visit every array element, not only the first.
        const VISIT_EVERY_ELEMENT = 1 << 1;
        /// Visit the fields of unions.
        const VISIT_UNION_BODY = 1 << 2;

        const DEFAULT = Self::VISIT_INSIDE_SIMPLE.bits() | Self::VISIT_EVERY_ELEMENT.bits();
    }
}

/// Where a visited member lives in its container.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Origin {
    Base(BaseRef),
    Field(FieldRef),
    /// Element `index` of an array reached through `field`.
    Element { field: FieldRef, index: u64 },
}

/// A visited member: its origin, type, and position.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Site {
    pub origin: Origin,
    pub ty: TypeId,
    /// Byte offset within the enclosing record; zero for array elements.
    pub offset: u64,
    pub span: Span,
}

impl Site {
    /// The field this member was reached through, if any.
    pub fn field(&self) -> Option<FieldRef> {
        match self.origin {
            Origin::Base(_) => None,
            Origin::Field(field) | Origin::Element { field, .. } => Some(field),
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self.origin, Origin::Base(_))
    }

    /// Source name used for generated kernel parameters.
    pub fn name<'p>(&self, program: &'p Program) -> &'p str {
        match self.field() {
            Some(field) => &program.field(field).name,
            None => "_base",
        }
    }
}

/// One step of the walk.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Event {
    Accessor { site: Site, record: RecordId },
    Sampler { site: Site, record: RecordId },
    SpecConstant { site: Site, record: RecordId },
    Stream { site: Site, record: RecordId },
    EnterStream { site: Site, record: RecordId },
    LeaveStream { site: Site, record: RecordId },
    Half(Site),
    /// A struct field, before either path is taken.
    Struct { site: Site, record: RecordId },
    /// A struct that is passed whole.
    SimpleStruct { site: Site, record: RecordId },
    EnterStruct { site: Site, record: RecordId },
    LeaveStruct { site: Site, record: RecordId },
    Union { site: Site, record: RecordId },
    EnterUnion { site: Site, record: RecordId },
    LeaveUnion { site: Site, record: RecordId },
    Reference(Site),
    Pointer(Site),
    /// An array field, before either path is taken.
    Array(Site),
    /// An array that is passed whole.
    SimpleArray(Site),
    EnterArray { site: Site, elem: TypeId, len: u64 },
    NextElement { elem: TypeId, index: u64 },
    LeaveArray { site: Site, elem: TypeId, len: u64 },
    Scalar(Site),
    Other(Site),
}

impl Event {
    /// The member this event is about; `None` for `NextElement`.
    pub fn site(&self) -> Option<&Site> {
        match self {
            Event::Accessor { site, .. }
            | Event::Sampler { site, .. }
            | Event::SpecConstant { site, .. }
            | Event::Stream { site, .. }
            | Event::EnterStream { site, .. }
            | Event::LeaveStream { site, .. }
            | Event::Struct { site, .. }
            | Event::SimpleStruct { site, .. }
            | Event::EnterStruct { site, .. }
            | Event::LeaveStruct { site, .. }
            | Event::Union { site, .. }
            | Event::EnterUnion { site, .. }
            | Event::LeaveUnion { site, .. }
            | Event::EnterArray { site, .. }
            | Event::LeaveArray { site, .. }
            | Event::Half(site)
            | Event::Reference(site)
            | Event::Pointer(site)
            | Event::Array(site)
            | Event::SimpleArray(site)
            | Event::Scalar(site)
            | Event::Other(site) => Some(site),
            Event::NextElement { .. } => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Event::Accessor { .. } => "accessor",
            Event::Sampler { .. } => "sampler",
            Event::SpecConstant { .. } => "spec_constant",
            Event::Stream { .. } => "stream",
            Event::EnterStream { .. } => "enter_stream",
            Event::LeaveStream { .. } => "leave_stream",
            Event::Half(_) => "half",
            Event::Struct { .. } => "struct",
            Event::SimpleStruct { .. } => "simple_struct",
            Event::EnterStruct { .. } => "enter_struct",
            Event::LeaveStruct { .. } => "leave_struct",
            Event::Union { .. } => "union",
            Event::EnterUnion { .. } => "enter_union",
            Event::LeaveUnion { .. } => "leave_union",
            Event::Reference(_) => "reference",
            Event::Pointer(_) => "pointer",
            Event::Array(_) => "array",
            Event::SimpleArray(_) => "simple_array",
            Event::EnterArray { .. } => "enter_array",
            Event::NextElement { .. } => "next_element",
            Event::LeaveArray { .. } => "leave_array",
            Event::Scalar(_) => "scalar",
            Event::Other(_) => "other",
        }
    }
}

/// A participant in the walk.
pub trait FieldHandler {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT
    }

    fn handle(&mut self, program: &Program, event: &Event);
}

/// A handler that ignores every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmptyHandler;

impl FieldHandler for EmptyHandler {
    fn handle(&mut self, _program: &Program, _event: &Event) {}
}

/// Most handlers one walk drives; larger sets are walked in batches.
pub const MAX_HANDLERS: usize = Mask::BITS as usize;

/// Walk the bases, then the fields, of `record`.
///
/// Every handler sees the same event sequence. Handlers beyond
/// [`MAX_HANDLERS`] are driven by further walks of the same record.
pub fn visit_kernel_object(
    program: &Program,
    record: RecordId,
    handlers: &mut [&mut dyn FieldHandler],
) {
    for batch in handlers.chunks_mut(MAX_HANDLERS) {
        let mut walker = Walker::new(program, batch);
        let all = walker.all;
        walker.visit_bases(record, all);
        walker.visit_fields(record, all);
    }
}

/// Bit `i` set means handler `i` receives the event.
type Mask = u32;

/// Mask bit for handler `index`; empty past the width of [`Mask`].
fn bit(index: usize) -> Mask {
    u32::try_from(index)
        .ok()
        .and_then(|shift| Mask::from(1u8).checked_shl(shift))
        .unwrap_or(0)
}

struct Walker<'p, 'w, 'h> {
    program: &'p Program,
    handlers: &'w mut [&'h mut dyn FieldHandler],
    all: Mask,
    inside_simple: Mask,
    every_element: Mask,
    union_body: Mask,
}

impl<'p, 'w, 'h> Walker<'p, 'w, 'h> {
    fn new(program: &'p Program, handlers: &'w mut [&'h mut dyn FieldHandler]) -> Self {
        let caps: SmallVec<[Capabilities; 8]> =
            handlers.iter().map(|h| h.capabilities()).collect();
        let having = |cap: Capabilities| -> Mask {
            caps.iter()
                .enumerate()
                .filter(|(_, c)| c.contains(cap))
                .fold(0, |mask: Mask, (i, _)| mask | bit(i))
        };
        Walker {
            program,
            all: having(Capabilities::empty()),
            inside_simple: having(Capabilities::VISIT_INSIDE_SIMPLE),
            every_element: having(Capabilities::VISIT_EVERY_ELEMENT),
            union_body: having(Capabilities::VISIT_UNION_BODY),
            handlers,
        }
    }

    fn emit(&mut self, active: Mask, event: &Event) {
        if active == 0 {
            return;
        }
        trace!(event = event.name(), handlers = active.count_ones(), "visit");
        for (i, handler) in self.handlers.iter_mut().enumerate() {
            if active & bit(i) != 0 {
                handler.handle(self.program, event);
            }
        }
    }

    /// Emit `enter` now and `leave` when the returned guard drops.
    fn scope(&mut self, active: Mask, enter: Event, leave: Event) -> Scope<'_, 'p, 'w, 'h> {
        self.emit(active, &enter);
        Scope {
            walker: self,
            active,
            leave,
        }
    }

    fn visit_bases(&mut self, record: RecordId, active: Mask) {
        let program = self.program;
        for (index, base) in (0u32..).zip(&program.record(record).bases) {
            let site = Site {
                origin: Origin::Base(BaseRef::new(record, index)),
                ty: base.ty,
                offset: base.offset,
                span: base.span,
            };
            match program.classify(base.ty) {
                TypeClass::Accessor(record) => self.emit(active, &Event::Accessor { site, record }),
                TypeClass::Sampler(record) => self.emit(active, &Event::Sampler { site, record }),
                TypeClass::SpecConstant(record) => {
                    self.emit(active, &Event::SpecConstant { site, record });
                }
                TypeClass::Stream(record) => self.emit(active, &Event::Stream { site, record }),
                TypeClass::Struct(record) | TypeClass::Union(record) => {
                    self.visit_record(site, record, active);
                }
                _ => self.emit(active, &Event::Other(site)),
            }
        }
    }

    fn visit_fields(&mut self, record: RecordId, active: Mask) {
        let program = self.program;
        for (index, field) in (0u32..).zip(&program.record(record).fields) {
            let site = Site {
                origin: Origin::Field(FieldRef::new(record, index)),
                ty: field.ty,
                offset: field.offset,
                span: field.span,
            };
            self.visit_field(site, active);
        }
    }

    fn visit_field(&mut self, site: Site, active: Mask) {
        match self.program.classify(site.ty) {
            TypeClass::Accessor(record) => self.emit(active, &Event::Accessor { site, record }),
            TypeClass::Sampler(record) => self.emit(active, &Event::Sampler { site, record }),
            TypeClass::Half => self.emit(active, &Event::Half(site)),
            TypeClass::SpecConstant(record) => {
                self.emit(active, &Event::SpecConstant { site, record });
            }
            TypeClass::Stream(record) => {
                self.emit(active, &Event::Stream { site, record });
                self.visit_stream(site, record, active);
            }
            TypeClass::Struct(record) => {
                self.emit(active, &Event::Struct { site, record });
                self.visit_record(site, record, active);
            }
            TypeClass::Union(record) => {
                self.emit(active, &Event::Union { site, record });
                let body = active & self.union_body;
                if body != 0 {
                    let mut scope = self.scope(
                        body,
                        Event::EnterUnion { site, record },
                        Event::LeaveUnion { site, record },
                    );
                    scope.visit_fields(record, body);
                }
            }
            TypeClass::Reference => self.emit(active, &Event::Reference(site)),
            TypeClass::Pointer => self.emit(active, &Event::Pointer(site)),
            TypeClass::Array => self.visit_array(site, active),
            TypeClass::Scalar => self.emit(active, &Event::Scalar(site)),
            TypeClass::Other => self.emit(active, &Event::Other(site)),
        }
    }

    /// Streams are always split: only their accessor fields are visited.
    fn visit_stream(&mut self, site: Site, record: RecordId, active: Mask) {
        let program = self.program;
        let mut scope = self.scope(
            active,
            Event::EnterStream { site, record },
            Event::LeaveStream { site, record },
        );
        for (index, field) in (0u32..).zip(&program.record(record).fields) {
            if let TypeClass::Accessor(accessor) = program.classify(field.ty) {
                let inner = Site {
                    origin: Origin::Field(FieldRef::new(record, index)),
                    ty: field.ty,
                    offset: field.offset,
                    span: field.span,
                };
                scope.emit(
                    active,
                    &Event::Accessor {
                        site: inner,
                        record: accessor,
                    },
                );
            }
        }
    }

    fn visit_record(&mut self, site: Site, record: RecordId, active: Mask) {
        let descend = if self.program.requires_decomposition(record) {
            active
        } else {
            let simple = active & !self.inside_simple;
            self.emit(simple, &Event::SimpleStruct { site, record });
            active & self.inside_simple
        };
        if descend == 0 {
            return;
        }
        let mut scope = self.scope(
            descend,
            Event::EnterStruct { site, record },
            Event::LeaveStruct { site, record },
        );
        scope.visit_bases(record, descend);
        scope.visit_fields(record, descend);
    }

    fn visit_array(&mut self, site: Site, active: Mask) {
        self.emit(active, &Event::Array(site));
        // Variable and zero-length arrays are rejected by the legality check.
        let (Some(field), Some((elem, len))) =
            (site.field(), self.program.types.as_constant_array(site.ty))
        else {
            return;
        };
        if len == 0 {
            return;
        }

        let descend = if self.program.array_requires_decomposition(field) {
            active
        } else {
            let simple = active & !self.inside_simple;
            self.emit(simple, &Event::SimpleArray(site));
            active & self.inside_simple
        };
        if descend == 0 {
            return;
        }

        let mut scope = self.scope(
            descend,
            Event::EnterArray { site, elem, len },
            Event::LeaveArray { site, elem, len },
        );
        for index in 0..len {
            let current = if index == 0 {
                descend
            } else {
                descend & scope.every_element
            };
            if current == 0 {
                break;
            }
            scope.emit(current, &Event::NextElement { elem, index });
            let element = Site {
                origin: Origin::Element { field, index },
                ty: elem,
                offset: 0,
                span: site.span,
            };
            scope.visit_field(element, current);
        }
    }
}

/// Pairs an enter event with its leave event.
struct Scope<'s, 'p, 'w, 'h> {
    walker: &'s mut Walker<'p, 'w, 'h>,
    active: Mask,
    leave: Event,
}

impl Drop for Scope<'_, '_, '_, '_> {
    fn drop(&mut self) {
        self.walker.emit(self.active, &self.leave);
    }
}

impl<'p, 'w, 'h> Deref for Scope<'_, 'p, 'w, 'h> {
    type Target = Walker<'p, 'w, 'h>;

    fn deref(&self) -> &Self::Target {
        self.walker
    }
}

impl DerefMut for Scope<'_, '_, '_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.walker
    }
}

#[cfg(test)]
mod tests;
