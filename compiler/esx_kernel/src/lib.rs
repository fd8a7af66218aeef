//! Device kernel entry synthesis.
//!
//! A kernel launch hands the device a callable object. The device cannot take
//! that object as-is: resources (accessors, samplers, streams) must be rebuilt
//! from their raw parts, and containers that hold pointers or resources must
//! be split into separate arguments. This crate provides:
//!
//! - **Field visitor** ([`visitor`]): a single walk over a kernel object's
//!   bases and fields that drives any number of [`FieldHandler`]s.
//!
//! - **Handlers** ([`handlers`]): legality and union checks, decomposition
//!   marking, and the three synthesis builders (entry parameters, entry body,
//!   integration side table).
//!
//! - **Integration header** ([`header`]): the host-side kernel table, as C++
//!   text or a binary descriptor array.
//!
//! - **Attribute propagation** ([`propagate`]): moves kernel attributes from
//!   reachable functions onto kernels and reports conflicts.
//!
//! - **Round-trip evaluator** ([`eval`]): flattens an object value and runs a
//!   synthesized body over the result, to check the two agree.
//!
//! # Design
//!
//! Checking and synthesis are separate walks. The checking walk may mutate
//! nothing; its decomposition marks are applied to the [`Program`] between
//! walks so the synthesis walk, and every later one, reads a stable answer.
//!
//! [`FieldHandler`]: visitor::FieldHandler
//! [`Program`]: esx_ir::Program

pub mod eval;
pub mod handlers;
pub mod header;
pub mod propagate;
mod synth;
pub mod visitor;

#[cfg(test)]
mod test_helpers;

pub use header::{IntegrationHeader, KernelDesc, ParamDesc, ParamKind};
pub use propagate::{propagate_attributes, PropagationReport};
pub use synth::{
    check_kernel_call, construct_kernel, synthesize, Synthesis, SynthesisOptions,
    SynthesizedKernel,
};
