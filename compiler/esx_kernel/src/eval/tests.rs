#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;
use crate::header::IntegrationHeader;
use crate::test_helpers::{
    accessor, int, kernel, record, sampler, spec_constant, stream, Kernel,
};
use crate::{check_kernel_call, construct_kernel, SynthesisOptions};
use esx_diagnostic::queue::DiagnosticQueue;
use esx_ir::{BaseSpec, Span};

/// Check and synthesize `k`, returning the kernel body and parameter count.
fn synthesize(program: &mut Program, k: &Kernel) -> (FunctionBody, usize) {
    let options = SynthesisOptions::default();
    let mut diags = DiagnosticQueue::new();
    let object = check_kernel_call(program, k.caller, &options, &mut diags).unwrap();
    let mut header = IntegrationHeader::new(false);
    let synthesized = construct_kernel(program, k.caller, object, &options, &mut header, &mut diags);
    assert!(diags.has_errors().is_none());
    let body = program.function(synthesized.kernel).body.clone().unwrap();
    (body, synthesized.params.len())
}

/// Synthesize `k`, then check a sampled object survives the round trip.
fn assert_round_trip(program: &mut Program, k: &Kernel, simd: bool) {
    let (body, param_count) = synthesize(program, k);
    let object = Value::sample(program, k.object_ty, simd, &mut 0);

    let args = flatten(program, k.object, &object).unwrap();
    assert_eq!(args.len(), param_count);
    assert_eq!(round_trip(program, k.object, &body, &object), Ok(object));
}

#[test]
fn accessor_and_scalar() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);

    assert_round_trip(&mut program, &k, false);
}

#[test]
fn simd_accessor() {
    let mut program = Program::new();
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0)], true);

    assert_round_trip(&mut program, &k, true);
}

#[test]
fn pointers_outside_global_memory() {
    let mut program = Program::new();
    let int = int(&mut program);
    let generic = program.types.pointer(int, AddressSpace::Generic);
    let (_, holder) = record(&mut program, "Holder", &[("n", int, 0), ("p", generic, 8)]);
    let k = kernel(&mut program, &[("p", generic, 0), ("h", holder, 8)], false);

    assert_round_trip(&mut program, &k, false);
}

#[test]
fn decomposed_array_of_structs() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ptr = program.types.pointer(int, AddressSpace::Global);
    let (_, holder) = record(&mut program, "Holder", &[("n", int, 0), ("p", ptr, 8)]);
    let holders = program.types.array(holder, 3);
    let k = kernel(&mut program, &[("n", int, 0), ("hs", holders, 8)], false);

    assert_round_trip(&mut program, &k, false);
}

#[test]
fn whole_arrays_and_bases() {
    let mut program = Program::new();
    let int = int(&mut program);
    let ints = program.types.array(int, 4);
    let (_, base) = record(&mut program, "Base", &[("b", int, 0)]);
    let k = kernel(&mut program, &[("ints", ints, 8)], false);
    program.record_mut(k.object).bases.push(BaseSpec {
        ty: base,
        offset: 0,
        span: Span::DUMMY,
    });

    assert_round_trip(&mut program, &k, false);
}

#[test]
fn stream_with_accessors() {
    let mut program = Program::new();
    let stream = stream(&mut program);
    let k = kernel(&mut program, &[("out", stream, 0)], false);

    assert_round_trip(&mut program, &k, false);
}

#[test]
fn sampler_and_spec_constant() {
    let mut program = Program::new();
    let sampler = sampler(&mut program);
    let constant = spec_constant(&mut program, "width");
    let k = kernel(&mut program, &[("s", sampler, 0), ("c", constant, 8)], false);

    assert_round_trip(&mut program, &k, false);
}

#[test]
fn samples_count_up_and_zeroes_do_not() {
    let mut program = Program::new();
    let int = int(&mut program);
    let pair = program.types.array(int, 2);

    assert_eq!(
        Value::sample(&program, pair, false, &mut 4),
        Value::Array(vec![Value::Scalar(5), Value::Scalar(6)])
    );
    assert_eq!(
        Value::zeroed(&program, pair),
        Value::Array(vec![Value::Scalar(0), Value::Scalar(0)])
    );
}

#[test]
fn missing_arguments_are_reported() {
    let mut program = Program::new();
    let int = int(&mut program);
    let acc = accessor(&mut program);
    let k = kernel(&mut program, &[("acc", acc, 0), ("n", int, 32)], false);
    let (body, _) = synthesize(&mut program, &k);

    assert_eq!(
        execute(&program, &body, &[]),
        Err(EvalError::MissingArgument(3))
    );
}

#[test]
fn objects_must_match_their_record() {
    let mut program = Program::new();
    let int = int(&mut program);
    let k = kernel(&mut program, &[("n", int, 0)], false);

    assert_eq!(
        flatten(&program, k.object, &Value::Scalar(1)),
        Err(EvalError::Mismatch {
            expected: "record",
            found: "scalar"
        })
    );
    assert_eq!(
        execute(&program, &FunctionBody::new(), &[]),
        Err(EvalError::NoObject)
    );
}
