//! Legality checks over the kernel object.
//!
//! Both checkers keep walking after an error so one pass reports every
//! problem in the object.

use esx_diagnostic::{Diagnostic, ErrorCode};
use esx_ir::{Program, RecordId, Span, TemplateArg, TypeId, TypeKind};
use rustc_hash::FxHashSet;

use super::{init_method, is_record_named};
use crate::visitor::{Capabilities, Event, FieldHandler, Site};

/// Rejects members that cannot be passed to a device kernel.
#[derive(Debug, Default)]
pub struct LegalityChecker {
    simd: bool,
    std_layout_params: bool,
    diagnostics: Vec<Diagnostic>,
}

impl LegalityChecker {
    /// `std_layout_params` additionally rejects non-standard-layout classes.
    pub fn new(simd: bool, std_layout_params: bool) -> Self {
        LegalityChecker {
            simd,
            std_layout_params,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    fn bad_param_type(&mut self, program: &Program, site: &Site) {
        self.report(
            Diagnostic::error(ErrorCode::E1012)
                .with_message(format!(
                    "'{}' cannot be used as the type of a kernel parameter",
                    program.type_name(site.ty)
                ))
                .with_label(site.span, "captured here"),
        );
    }

    fn check_copyable(&mut self, program: &Program, ty: TypeId, span: Span) {
        match program.types.kind(ty) {
            TypeKind::Array { elem, .. } => return self.check_copyable(program, *elem, span),
            TypeKind::VariableArray { .. } => {
                return self.report(
                    Diagnostic::error(ErrorCode::E1003)
                        .with_message(format!(
                            "kernel parameter is not a constant size array '{}'",
                            program.type_name(ty)
                        ))
                        .with_label(span, "variable length array"),
                );
            }
            _ => {}
        }
        let Some(record) = program.types.as_record(ty) else {
            return;
        };
        let decl = program.record(record);
        if self.std_layout_params && !decl.standard_layout {
            self.report(
                Diagnostic::error(ErrorCode::E1011)
                    .with_message(format!(
                        "kernel parameter has non-standard layout class '{}'",
                        decl.name
                    ))
                    .with_label(span, "captured here"),
            );
        }
        for (trivial, what) in [
            (decl.trivial_copy, "copy constructible"),
            (decl.trivial_destructor, "destructible"),
        ] {
            if !trivial {
                self.report(
                    Diagnostic::error(ErrorCode::E1002)
                        .with_message(format!(
                            "kernel parameter has non-trivially {what} class/struct type '{}'",
                            decl.name
                        ))
                        .with_label(span, "captured here"),
                );
            }
        }
    }

    fn check_array(&mut self, program: &Program, site: &Site) {
        if let Some((_, 0)) = program.types.as_constant_array(site.ty) {
            return self.report(
                Diagnostic::error(ErrorCode::E1004)
                    .with_message("zero-length arrays are not permitted in kernel parameters")
                    .with_label(site.span, "zero-length array"),
            );
        }
        self.check_copyable(program, site.ty, site.span);
    }

    fn check_pointer(&mut self, program: &Program, site: &Site) {
        let mut ty = site.ty;
        while let TypeKind::Pointer { pointee, .. } = program.types.kind(ty) {
            ty = *pointee;
            if matches!(program.types.kind(ty), TypeKind::VariableArray { .. }) {
                return self.report(
                    Diagnostic::error(ErrorCode::E1003)
                        .with_message("variable length arrays are not supported for the current target")
                        .with_label(site.span, "pointer to a variable length array"),
                );
            }
        }
    }

    fn check_initializer(&mut self, program: &Program, site: &Site, record: RecordId) {
        let decl = program.record(record);
        let method = init_method(decl, self.simd);
        if decl.method(method).is_none() {
            self.report(
                Diagnostic::error(ErrorCode::E9001)
                    .with_message(format!("'{}' has no `{method}` method", decl.name))
                    .with_label(site.span, "captured here"),
            );
        }
    }

    fn check_accessor(&mut self, program: &Program, site: &Site, record: RecordId) {
        self.check_initializer(program, site, record);
        let Some(info) = program.record(record).accessor() else {
            return;
        };
        if let Some(list) = &info.property_list {
            self.check_property_list(program, list, site.span);
        }
        let mut visited = FxHashSet::default();
        self.check_device_type(program, info.data_ty, site.span, &mut visited);
    }

    fn invalid_property(&mut self, span: Span, message: &str) {
        self.report(
            Diagnostic::error(ErrorCode::E1006)
                .with_message(message)
                .with_label(span, "in this accessor"),
        );
    }

    fn wrong_arity(&mut self, span: Span, property: &str) {
        self.report(
            Diagnostic::error(ErrorCode::E1007)
                .with_message(format!(
                    "{property} must have exactly one template parameter"
                ))
                .with_label(span, "in this accessor"),
        );
    }

    fn check_property_list(&mut self, program: &Program, list: &TemplateArg, span: Span) {
        let TemplateArg::Type(list_ty) = list else {
            return self.invalid_property(span, "accessor property list must be a type");
        };
        if !is_record_named(program, *list_ty, "accessor_property_list") {
            return self.invalid_property(
                span,
                "accessor property list must be an accessor_property_list",
            );
        }
        let Some(record) = program.types.as_record(*list_ty) else {
            return;
        };
        let [pack] = program.record(record).template_args.as_slice() else {
            return self.wrong_arity(span, "accessor_property_list");
        };
        let TemplateArg::Pack(properties) = pack else {
            return self.invalid_property(
                span,
                "accessor_property_list template parameter must be a parameter pack",
            );
        };
        for property in properties {
            let TemplateArg::Type(property_ty) = property else {
                return self
                    .invalid_property(span, "accessor_property_list pack argument must be a type");
            };
            if is_record_named(program, *property_ty, "buffer_location") {
                self.check_buffer_location(program, *property_ty, span);
            }
        }
    }

    fn check_buffer_location(&mut self, program: &Program, ty: TypeId, span: Span) {
        let Some(record) = program.types.as_record(ty) else {
            return;
        };
        let [location] = program.record(record).template_args.as_slice() else {
            return self.wrong_arity(span, "buffer_location");
        };
        if !matches!(location, TemplateArg::Integral(n) if *n >= 0) {
            self.report(
                Diagnostic::error(ErrorCode::E1008)
                    .with_message("buffer_location template parameter must be a non-negative integer")
                    .with_label(span, "in this accessor"),
            );
        }
    }

    /// Reject types the device cannot represent anywhere inside `ty`.
    fn check_device_type(
        &mut self,
        program: &Program,
        ty: TypeId,
        span: Span,
        visited: &mut FxHashSet<TypeId>,
    ) {
        match program.types.kind(ty) {
            TypeKind::Array { len: 0, .. } => self.report(
                Diagnostic::error(ErrorCode::E1004)
                    .with_message("zero-length arrays are not permitted in device code")
                    .with_label(span, "zero-length array"),
            ),
            TypeKind::VariableArray { .. } => self.report(
                Diagnostic::error(ErrorCode::E1003)
                    .with_message("variable length arrays are not supported for the current target")
                    .with_label(span, "variable length array"),
            ),
            _ => {}
        }

        let mut inner = ty;
        while let TypeKind::Pointer { pointee: next, .. }
        | TypeKind::Array { elem: next, .. }
        | TypeKind::VariableArray { elem: next } = program.types.kind(inner)
        {
            inner = *next;
        }

        if let Some(builtin) = program.types.as_builtin(inner) {
            if builtin.is_unsupported_on_device() {
                self.report(
                    Diagnostic::error(ErrorCode::E1005)
                        .with_message(format!(
                            "'{}' is not supported on this target",
                            builtin.spelling()
                        ))
                        .with_label(span, "used here"),
                );
            }
        }

        if !visited.insert(inner) {
            return;
        }
        if let Some(record) = program.types.as_record(inner) {
            for field in &program.record(record).fields {
                self.check_device_type(program, field.ty, field.span, visited);
            }
        }
    }
}

impl FieldHandler for LegalityChecker {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_EVERY_ELEMENT
    }

    fn handle(&mut self, program: &Program, event: &Event) {
        match event {
            Event::Reference(site) => {
                self.report(
                    Diagnostic::error(ErrorCode::E1001)
                        .with_message(format!(
                            "'{}' cannot be used as the type of a kernel parameter",
                            program.type_name(site.ty)
                        ))
                        .with_label(site.span, "reference captured here")
                        .with_suggestion("capture the value by copy"),
                );
            }
            Event::Struct { site, .. } => self.check_copyable(program, site.ty, site.span),
            Event::Array(site) => self.check_array(program, site),
            Event::Pointer(site) => self.check_pointer(program, site),
            Event::Accessor { site, record } => self.check_accessor(program, site, *record),
            Event::Sampler { site, record } => self.check_initializer(program, site, *record),
            Event::Other(site) => self.bad_param_type(program, site),
            _ => {}
        }
    }
}

/// Rejects resource types anywhere inside a union.
#[derive(Debug, Default)]
pub struct UnionChecker {
    depth: u32,
    diagnostics: Vec<Diagnostic>,
}

impl UnionChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn check(&mut self, program: &Program, site: &Site) {
        if self.depth > 0 {
            self.diagnostics.push(
                Diagnostic::error(ErrorCode::E2001)
                    .with_message(format!(
                        "'{}' cannot be used inside a union kernel parameter",
                        program.type_name(site.ty)
                    ))
                    .with_label(site.span, "declared inside a union"),
            );
        }
    }
}

impl FieldHandler for UnionChecker {
    fn capabilities(&self) -> Capabilities {
        (Capabilities::DEFAULT | Capabilities::VISIT_UNION_BODY)
            - Capabilities::VISIT_EVERY_ELEMENT
    }

    fn handle(&mut self, program: &Program, event: &Event) {
        match event {
            Event::Accessor { site, .. } | Event::Sampler { site, .. } | Event::Stream { site, .. } => {
                self.check(program, site);
            }
            Event::EnterUnion { .. } => self.depth += 1,
            Event::LeaveUnion { .. } => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
    }
}
