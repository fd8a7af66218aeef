//! Kernel entry body.
//!
//! The body rebuilds a clone of the kernel object from the flat argument
//! list, runs the caller's statements against the clone, then finalizes any
//! streams:
//!
//! ```text
//! KernelObject clone = { _arg_a, { _arg_x, _arg_y }, accessor{} };
//! clone.acc.__init(_arg_acc, _arg_acc, _arg_acc);
//! clone();                       // caller statements, param 0 -> clone
//! clone.out.__finalize();
//! ```
//!
//! # Design
//!
//! Two stacks follow the walk. `init_lists` holds one partially filled
//! aggregate initializer per open container; `objects` holds the expression
//! naming the container currently being filled, so special members can be
//! addressed as `clone.a.b[2].acc`. Arrays push their own expression twice:
//! the lower copy names the array, the upper copy is replaced by a subscript
//! on every `NextElement`.

use std::ops::Range;

use esx_ir::{
    ExprId, ExprKind, FunctionBody, FunctionDecl, Program, RecordId, Span, Stmt, TypeId, TypeKind,
    VarId,
};

use super::{init_params, kernel_pointer_space, FINALIZE, INIT};
use crate::visitor::{Capabilities, Event, FieldHandler, Origin, Site};

#[derive(Debug)]
pub struct BodyBuilder {
    simd: bool,
    body: FunctionBody,
    clone: VarId,
    init_lists: Vec<Vec<ExprId>>,
    objects: Vec<ExprId>,
    init_stmts: Vec<Stmt>,
    finalize_stmts: Vec<Stmt>,
    next_param: u32,
    /// Arguments consumed by the most recent resource initializer.
    last_params: Range<u32>,
    depth: u32,
    span: Span,
}

impl BodyBuilder {
    /// Start a body for `caller`, whose kernel object has type `object_ty`.
    pub fn new(simd: bool, caller: &FunctionDecl, object_ty: TypeId) -> Self {
        let mut body = FunctionBody::new();
        // Caller statements refer to caller locals by index; keep them first.
        if let Some(caller_body) = &caller.body {
            body.locals.clone_from(&caller_body.locals);
        }
        let clone = body.add_local("__kernel_object", object_ty);
        let root = body.exprs.alloc(ExprKind::Var(clone), caller.span);
        BodyBuilder {
            simd,
            body,
            clone,
            init_lists: vec![Vec::new()],
            objects: vec![root],
            init_stmts: Vec::new(),
            finalize_stmts: Vec::new(),
            next_param: 0,
            last_params: 0..0,
            depth: 0,
            span: caller.span,
        }
    }

    /// Number of open aggregate initializers; one once the walk is done.
    pub fn init_depth(&self) -> usize {
        self.init_lists.len()
    }

    fn alloc(&mut self, kind: ExprKind) -> ExprId {
        self.body.exprs.alloc(kind, self.span)
    }

    fn current_object(&self) -> ExprId {
        self.objects.last().copied().unwrap_or(ExprId::new(0))
    }

    /// Expression naming the member `site` inside the current object.
    fn member(&mut self, site: &Site) -> ExprId {
        let base = self.current_object();
        match site.origin {
            Origin::Field(field) => self.alloc(ExprKind::Member {
                base,
                field: field.index,
            }),
            Origin::Base(base_ref) => self.alloc(ExprKind::Base {
                base,
                index: base_ref.index,
            }),
            Origin::Element { .. } => base,
        }
    }

    fn add_init(&mut self, expr: ExprId) {
        if let Some(list) = self.init_lists.last_mut() {
            list.push(expr);
        }
    }

    fn take_param(&mut self) -> ExprId {
        let n = self.next_param;
        self.next_param += 1;
        self.alloc(ExprKind::Param(n))
    }

    fn method_call(&mut self, receiver: ExprId, method: &str, args: Vec<ExprId>) -> ExprId {
        self.alloc(ExprKind::MethodCall {
            receiver,
            method: method.to_string(),
            args,
        })
    }

    /// Default-construct a resource, then call its initializer on the
    /// next block of arguments.
    fn resource(&mut self, program: &Program, site: &Site, record: RecordId) {
        let default = self.alloc(ExprKind::DefaultInit(site.ty));
        self.add_init(default);

        let decl = program.record(record);
        let method = super::init_method(decl, self.simd);
        let count = u32::try_from(init_params(program, record, self.simd).len()).unwrap_or(0);
        let start = self.next_param;
        let args = (0..count).map(|_| self.take_param()).collect();
        self.last_params = start..self.next_param;

        let receiver = self.member(site);
        let call = self.method_call(receiver, method, args);
        self.init_stmts.push(Stmt::Expr(call));
    }

    fn spec_constant(&mut self, program: &Program, site: &Site, record: RecordId) {
        let default = self.alloc(ExprKind::DefaultInit(site.ty));
        self.add_init(default);
        if program.record(record).method(INIT).is_some() {
            let receiver = self.member(site);
            let call = self.method_call(receiver, INIT, Vec::new());
            self.init_stmts.push(Stmt::Expr(call));
        }
    }

    fn pointer(&mut self, program: &Program, site: &Site) {
        let mut value = self.take_param();
        if self.depth > 0 {
            value = self.alloc(ExprKind::Member {
                base: value,
                field: 0,
            });
        }
        if let TypeKind::Pointer { space, .. } = program.types.kind(site.ty) {
            if kernel_pointer_space(*space) != *space {
                value = self.alloc(ExprKind::AddrSpaceCast {
                    operand: value,
                    space: *space,
                });
            }
        }
        self.add_init(value);
    }

    fn enter(&mut self, site: &Site) {
        let object = self.member(site);
        self.objects.push(object);
        self.init_lists.push(Vec::new());
    }

    fn leave(&mut self) {
        self.objects.pop();
        let items = self.init_lists.pop().unwrap_or_default();
        let list = self.alloc(ExprKind::InitList(items));
        self.add_init(list);
    }

    fn leave_stream(&mut self, program: &Program, record: RecordId) {
        // Accessor members were already initialized through the copy.
        self.init_lists.pop();
        let stream = self.current_object();
        let decl = program.record(record);
        if decl.method(INIT).is_some() {
            let args = self
                .last_params
                .clone()
                .map(|n| self.alloc(ExprKind::Param(n)))
                .collect();
            let call = self.method_call(stream, INIT, args);
            self.init_stmts.push(Stmt::Expr(call));
        }
        if decl.method(FINALIZE).is_some() {
            let call = self.method_call(stream, FINALIZE, Vec::new());
            self.finalize_stmts.push(Stmt::Expr(call));
        }
        self.objects.pop();
    }

    /// Assemble the body: clone declaration, initializers, the caller's
    /// statements, then finalizers.
    pub fn finish(mut self, caller: &FunctionDecl) -> FunctionBody {
        let items = self.init_lists.pop().unwrap_or_default();
        let init = self.alloc(ExprKind::InitList(items));
        let mut stmts = vec![Stmt::Decl {
            var: self.clone,
            init: Some(init),
        }];
        stmts.append(&mut self.init_stmts);

        if let Some(source) = &caller.body {
            let clone = self.clone;
            let span = self.span;
            let mut redirect = |arena: &mut esx_ir::ExprArena, n: u32| {
                (n == 0).then(|| arena.alloc(ExprKind::Var(clone), span))
            };
            for stmt in &source.stmts {
                let exprs = &mut self.body.exprs;
                let mut copy = |e: ExprId| exprs.import(&source.exprs, e, &mut redirect);
                stmts.push(match stmt {
                    Stmt::Decl { var, init } => Stmt::Decl {
                        var: *var,
                        init: init.map(&mut copy),
                    },
                    Stmt::Expr(e) => Stmt::Expr(copy(*e)),
                    Stmt::Return(e) => Stmt::Return(e.map(&mut copy)),
                });
            }
        }

        stmts.append(&mut self.finalize_stmts);
        self.body.stmts = stmts;
        self.body
    }
}

impl FieldHandler for BodyBuilder {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_INSIDE_SIMPLE
    }

    fn handle(&mut self, program: &Program, event: &Event) {
        match event {
            Event::Accessor { site, record } | Event::Sampler { site, record } => {
                self.resource(program, site, *record);
            }
            Event::SpecConstant { site, record } => self.spec_constant(program, site, *record),
            Event::Stream { site, .. } => {
                if site.is_base() {
                    let default = self.alloc(ExprKind::DefaultInit(site.ty));
                    self.add_init(default);
                } else {
                    let copy = self.take_param();
                    self.add_init(copy);
                }
            }
            Event::EnterStream { site, .. } => {
                let stream = self.member(site);
                self.objects.push(stream);
                self.init_lists.push(Vec::new());
                self.depth += 1;
            }
            Event::LeaveStream { record, .. } => {
                self.depth = self.depth.saturating_sub(1);
                self.leave_stream(program, *record);
            }
            Event::Half(_)
            | Event::Scalar(_)
            | Event::SimpleStruct { .. }
            | Event::Union { .. } => {
                let value = self.take_param();
                self.add_init(value);
            }
            Event::Pointer(site) => self.pointer(program, site),
            Event::SimpleArray(_) => {
                let wrapper = self.take_param();
                let array = self.alloc(ExprKind::Member {
                    base: wrapper,
                    field: 0,
                });
                self.add_init(array);
            }
            Event::EnterStruct { site, .. } => {
                self.enter(site);
                self.depth += 1;
            }
            Event::LeaveStruct { .. } => {
                self.depth = self.depth.saturating_sub(1);
                self.leave();
            }
            Event::EnterArray { site, .. } => {
                self.enter(site);
                let array = self.current_object();
                self.objects.push(array);
            }
            Event::NextElement { index, .. } => {
                self.objects.pop();
                let array = self.current_object();
                let element = self.alloc(ExprKind::Subscript {
                    base: array,
                    index: *index,
                });
                self.objects.push(element);
            }
            Event::LeaveArray { .. } => {
                self.objects.pop();
                self.leave();
            }
            _ => {}
        }
    }
}
