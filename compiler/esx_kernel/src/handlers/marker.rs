//! Marks containers that must be split into separate kernel arguments.
//!
//! A struct or array requires decomposition when it transitively holds a
//! pointer, a half, or any resource type. The marker keeps one flag per open
//! container; closing a flagged container records it and flags its parent.

use esx_ir::{DecompositionMarks, Program};
use smallvec::{smallvec, SmallVec};

use crate::visitor::{Capabilities, Event, FieldHandler};

#[derive(Debug)]
pub struct DecompositionMarker {
    /// The bottom entry stands for the kernel object itself.
    stack: SmallVec<[bool; 16]>,
    marks: DecompositionMarks,
}

impl Default for DecompositionMarker {
    fn default() -> Self {
        Self::new()
    }
}

impl DecompositionMarker {
    pub fn new() -> Self {
        DecompositionMarker {
            stack: smallvec![true],
            marks: DecompositionMarks::new(),
        }
    }

    pub fn into_marks(self) -> DecompositionMarks {
        self.marks
    }

    fn flag(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            *top = true;
        }
    }

    /// Close the innermost container, reporting whether it was flagged.
    fn close(&mut self) -> bool {
        let flagged = self.stack.pop().unwrap_or(false);
        if flagged {
            self.flag();
        }
        flagged
    }
}

impl FieldHandler for DecompositionMarker {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_EVERY_ELEMENT
    }

    fn handle(&mut self, _program: &Program, event: &Event) {
        match event {
            Event::Accessor { .. }
            | Event::Sampler { .. }
            | Event::SpecConstant { .. }
            | Event::Stream { .. }
            | Event::Half(_)
            | Event::Pointer(_) => self.flag(),
            Event::EnterStruct { .. } | Event::EnterArray { .. } | Event::EnterStream { .. } => {
                self.stack.push(false);
            }
            // The stream itself already flagged its parent.
            Event::LeaveStream { .. } => {
                self.stack.pop();
            }
            Event::LeaveStruct { record, .. } => {
                if self.close() {
                    self.marks.mark_record(*record);
                }
            }
            Event::LeaveArray { site, .. } => {
                if self.close() {
                    if let Some(field) = site.field() {
                        self.marks.mark_array_field(field);
                    }
                }
            }
            _ => {}
        }
    }
}
