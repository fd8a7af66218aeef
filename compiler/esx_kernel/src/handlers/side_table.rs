//! Integration side-table entries for one kernel.
//!
//! One [`ParamDesc`] per flat kernel argument, in argument order. Offsets are
//! relative to the start of the kernel object: entering a container adds its
//! offset to a running accumulator, leaving restores it.

use esx_ir::{Program, RecordId};

use super::init_params;
use crate::header::{ParamDesc, ParamKind};
use crate::visitor::{Capabilities, Event, FieldHandler, Site};

/// A specialization constant referenced by a kernel.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecConstantId {
    /// Spelling of the constant's type.
    pub type_name: String,
    /// String ID the runtime looks the constant up by.
    pub id: String,
}

#[derive(Debug, Default)]
pub struct SideTableBuilder {
    simd: bool,
    cur_offset: u64,
    saved: Vec<u64>,
    array_bases: Vec<u64>,
    depth: u32,
    params: Vec<ParamDesc>,
    spec_constants: Vec<SpecConstantId>,
}

fn narrow(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl SideTableBuilder {
    pub fn new(simd: bool) -> Self {
        SideTableBuilder {
            simd,
            ..Self::default()
        }
    }

    pub fn finish(self) -> (Vec<ParamDesc>, Vec<SpecConstantId>) {
        (self.params, self.spec_constants)
    }

    fn offset_of(&self, site: &Site) -> u32 {
        narrow(self.cur_offset + site.offset)
    }

    fn add(&mut self, program: &Program, site: &Site, kind: ParamKind) {
        self.params.push(ParamDesc {
            kind,
            info: narrow(program.size_of(site.ty)),
            offset: self.offset_of(site),
        });
    }

    fn accessor(&mut self, program: &Program, site: &Site, record: RecordId) {
        let Some(info) = program.record(record).accessor() else {
            return;
        };
        let desc = ParamDesc {
            kind: ParamKind::Accessor,
            info: info.target.code() | (info.dims << 11),
            offset: self.offset_of(site),
        };
        let count = init_params(program, record, self.simd).len();
        self.params.extend(std::iter::repeat(desc).take(count));
    }

    fn sampler(&mut self, program: &Program, site: &Site, record: RecordId) {
        let offset = self.offset_of(site);
        for param in init_params(program, record, self.simd) {
            self.params.push(ParamDesc {
                kind: ParamKind::Sampler,
                info: narrow(program.size_of(param.ty)),
                offset,
            });
        }
    }

    fn enter(&mut self, site: &Site) {
        self.saved.push(self.cur_offset);
        self.cur_offset += site.offset;
    }

    fn leave(&mut self) {
        self.cur_offset = self.saved.pop().unwrap_or(0);
    }
}

impl FieldHandler for SideTableBuilder {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_INSIDE_SIMPLE
    }

    fn handle(&mut self, program: &Program, event: &Event) {
        match event {
            Event::Accessor { site, record } => self.accessor(program, site, *record),
            Event::Sampler { site, record } => self.sampler(program, site, *record),
            Event::SpecConstant { record, .. } => {
                let decl = program.record(*record);
                if let Some(esx_ir::SpecialKind::SpecConstant { id }) = &decl.special {
                    self.spec_constants.push(SpecConstantId {
                        type_name: decl.name.clone(),
                        id: id.clone(),
                    });
                }
            }
            Event::Stream { site, .. } if !site.is_base() => {
                self.add(program, site, ParamKind::StdLayout);
            }
            Event::Half(site)
            | Event::Scalar(site)
            | Event::SimpleStruct { site, .. }
            | Event::Union { site, .. }
            | Event::SimpleArray(site) => self.add(program, site, ParamKind::StdLayout),
            Event::Pointer(site) => {
                // Nested pointers travel inside a wrapper struct.
                let kind = if self.depth > 0 {
                    ParamKind::StdLayout
                } else {
                    ParamKind::Pointer
                };
                self.add(program, site, kind);
            }
            Event::EnterStruct { site, .. } | Event::EnterStream { site, .. } => {
                self.enter(site);
                self.depth += 1;
            }
            Event::LeaveStruct { .. } | Event::LeaveStream { .. } => {
                self.depth = self.depth.saturating_sub(1);
                self.leave();
            }
            Event::EnterArray { site, .. } => {
                self.enter(site);
                self.array_bases.push(self.cur_offset);
            }
            Event::NextElement { elem, index } => {
                let base = self.array_bases.last().copied().unwrap_or(0);
                self.cur_offset = base + index * program.size_of(*elem);
            }
            Event::LeaveArray { .. } => {
                self.array_bases.pop();
                self.leave();
            }
            _ => {}
        }
    }
}
