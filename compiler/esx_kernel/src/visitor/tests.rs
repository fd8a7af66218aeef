use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::{int, kernel, record, stream};
use esx_ir::{BaseSpec, DecompositionMarks, RecordDecl, RecordKind};

struct Recorder {
    caps: Capabilities,
    events: Vec<&'static str>,
}

impl Recorder {
    fn new(caps: Capabilities) -> Self {
        Recorder {
            caps,
            events: Vec::new(),
        }
    }
}

impl FieldHandler for Recorder {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn handle(&mut self, _program: &Program, event: &Event) {
        self.events.push(event.name());
    }
}

#[test]
fn bases_are_visited_before_fields() {
    let mut program = Program::new();
    let int = int(&mut program);
    let (_, base_ty) = record(&mut program, "Base", &[("x", int, 0)]);
    let k = kernel(&mut program, &[("y", int, 8)], false);
    program.record_mut(k.object).bases.push(BaseSpec {
        ty: base_ty,
        offset: 0,
        span: Span::DUMMY,
    });

    let mut rec = Recorder::new(Capabilities::DEFAULT);
    visit_kernel_object(&program, k.object, &mut [&mut rec]);

    assert_eq!(
        rec.events,
        vec!["enter_struct", "scalar", "leave_struct", "scalar"]
    );
}

#[test]
fn simple_and_descending_paths_are_exclusive() {
    let mut program = Program::new();
    let int = int(&mut program);
    let (inner, inner_ty) = record(&mut program, "S", &[("a", int, 0), ("b", int, 4)]);
    let k = kernel(&mut program, &[("s", inner_ty, 0)], false);

    let mut inside = Recorder::new(Capabilities::DEFAULT);
    let mut shortcut = Recorder::new(Capabilities::VISIT_EVERY_ELEMENT);
    visit_kernel_object(&program, k.object, &mut [&mut inside, &mut shortcut]);
    assert_eq!(
        inside.events,
        vec!["struct", "enter_struct", "scalar", "scalar", "leave_struct"]
    );
    assert_eq!(shortcut.events, vec!["struct", "simple_struct"]);

    let mut marks = DecompositionMarks::new();
    marks.mark_record(inner);
    program.apply_marks(&marks);

    let mut shortcut = Recorder::new(Capabilities::VISIT_EVERY_ELEMENT);
    visit_kernel_object(&program, k.object, &mut [&mut shortcut]);
    assert_eq!(
        shortcut.events,
        vec!["struct", "enter_struct", "scalar", "scalar", "leave_struct"]
    );
}

#[test]
fn only_every_element_handlers_see_later_elements() {
    let mut program = Program::new();
    let int = int(&mut program);
    let arr = program.types.array(int, 3);
    let k = kernel(&mut program, &[("arr", arr, 0)], false);
    let mut marks = DecompositionMarks::new();
    marks.mark_array_field(FieldRef::new(k.object, 0));
    program.apply_marks(&marks);

    let mut every = Recorder::new(Capabilities::VISIT_EVERY_ELEMENT);
    let mut first = Recorder::new(Capabilities::empty());
    visit_kernel_object(&program, k.object, &mut [&mut every, &mut first]);

    assert_eq!(
        every.events,
        vec![
            "array",
            "enter_array",
            "next_element",
            "scalar",
            "next_element",
            "scalar",
            "next_element",
            "scalar",
            "leave_array",
        ]
    );
    assert_eq!(
        first.events,
        vec!["array", "enter_array", "next_element", "scalar", "leave_array"]
    );
}

#[test]
fn unmarked_array_takes_the_simple_path() {
    let mut program = Program::new();
    let int = int(&mut program);
    let arr = program.types.array(int, 4);
    let k = kernel(&mut program, &[("arr", arr, 0)], false);

    let mut rec = Recorder::new(Capabilities::VISIT_EVERY_ELEMENT);
    visit_kernel_object(&program, k.object, &mut [&mut rec]);

    assert_eq!(rec.events, vec!["array", "simple_array"]);
}

#[test]
fn zero_length_and_variable_arrays_are_not_entered() {
    let mut program = Program::new();
    let int = int(&mut program);
    let empty = program.types.array(int, 0);
    let vla = program.types.variable_array(int);
    let k = kernel(&mut program, &[("empty", empty, 0), ("vla", vla, 0)], false);

    let mut rec = Recorder::new(Capabilities::DEFAULT);
    visit_kernel_object(&program, k.object, &mut [&mut rec]);

    assert_eq!(rec.events, vec!["array", "array"]);
}

#[test]
fn union_bodies_are_opt_in() {
    let mut program = Program::new();
    let int = int(&mut program);
    let (_, union_ty) = program.add_record_type(
        RecordDecl::new("U", RecordKind::Union)
            .with_field("a", int, 0)
            .with_layout(4, 4),
    );
    let k = kernel(&mut program, &[("u", union_ty, 0)], false);

    let mut plain = Recorder::new(Capabilities::DEFAULT);
    let mut body = Recorder::new(Capabilities::DEFAULT | Capabilities::VISIT_UNION_BODY);
    visit_kernel_object(&program, k.object, &mut [&mut plain, &mut body]);

    assert_eq!(plain.events, vec!["union"]);
    assert_eq!(
        body.events,
        vec!["union", "enter_union", "scalar", "leave_union"]
    );
}

#[test]
fn streams_expose_only_their_accessors() {
    let mut program = Program::new();
    let stream = stream(&mut program);
    let k = kernel(&mut program, &[("out", stream, 0)], false);

    let mut rec = Recorder::new(Capabilities::DEFAULT);
    let mut empty = EmptyHandler;
    visit_kernel_object(&program, k.object, &mut [&mut empty, &mut rec]);

    assert_eq!(
        rec.events,
        vec![
            "stream",
            "enter_stream",
            "accessor",
            "accessor",
            "leave_stream"
        ]
    );
}

#[test]
fn sites_name_their_members() {
    let mut program = Program::new();
    let int = int(&mut program);
    let k = kernel(&mut program, &[("count", int, 0)], false);

    let field = Site {
        origin: Origin::Field(FieldRef::new(k.object, 0)),
        ty: int,
        offset: 0,
        span: Span::DUMMY,
    };
    let base = Site {
        origin: Origin::Base(BaseRef::new(k.object, 0)),
        ..field
    };
    let element = Site {
        origin: Origin::Element {
            field: FieldRef::new(k.object, 0),
            index: 2,
        },
        ..field
    };

    assert_eq!(field.name(&program), "count");
    assert_eq!(base.name(&program), "_base");
    assert_eq!(element.name(&program), "count");
    assert!(base.is_base());
    assert_eq!(base.field(), None);
    assert_eq!(Event::Scalar(field).site(), Some(&field));
    assert_eq!(
        Event::NextElement {
            elem: int,
            index: 0
        }
        .site(),
        None
    );
}

#[test]
fn handlers_past_the_mask_width_see_every_event() {
    let mut program = Program::new();
    let int = int(&mut program);
    let k = kernel(&mut program, &[("a", int, 0), ("b", int, 4)], false);

    let mut recorders: Vec<Recorder> = (0..MAX_HANDLERS + 3)
        .map(|_| Recorder::new(Capabilities::DEFAULT))
        .collect();
    let mut handlers: Vec<&mut dyn FieldHandler> = recorders
        .iter_mut()
        .map(|r| r as &mut dyn FieldHandler)
        .collect();
    visit_kernel_object(&program, k.object, &mut handlers);
    drop(handlers);

    for rec in &recorders {
        assert_eq!(rec.events, vec!["scalar", "scalar"]);
    }
}
