//! Round-trip evaluator for synthesized kernel bodies.
//!
//! [`flatten`] turns a host-side kernel object into the argument values the
//! runtime would pass, walking the object with the same visitor shape the
//! entry declaration used. [`execute`] runs a synthesized body over those
//! arguments and returns the rebuilt clone. For a legal kernel the two are
//! inverses: `execute(flatten(v)) == v`.
//!
//! Only what kernel synthesis emits is modelled. Calls other than resource
//! initializers have no effect.

use esx_ir::{
    AddressSpace, ExprArena, ExprId, ExprKind, FunctionBody, Program, RecordId, SpecialKind, Stmt,
    TypeId, TypeKind,
};

use crate::handlers::{init_params, kernel_pointer_space, INIT, INIT_ESIMD};
use crate::visitor::{visit_kernel_object, Capabilities, Event, FieldHandler, Origin, Site};

/// A runtime value in the evaluator's model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Any builtin, half, or vector, by raw content.
    Scalar(i64),
    Pointer { addr: u64, space: AddressSpace },
    Record { bases: Vec<Value>, fields: Vec<Value> },
    Array(Vec<Value>),
    /// A special type; `args` are the values its initializer received.
    Resource { record: RecordId, args: Vec<Value> },
    /// A `__wrapper_class` carrying one value.
    Wrapper(Box<Value>),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("kernel argument {0} was not supplied")]
    MissingArgument(u32),
    #[error("local {0} read before initialization")]
    Uninitialized(u32),
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("index {index} out of range for {what}")]
    OutOfRange { what: &'static str, index: u64 },
    #[error("expression cannot be assigned through")]
    NotAPlace,
    #[error("body declares no kernel object")]
    NoObject,
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Pointer { .. } => "pointer",
            Value::Record { .. } => "record",
            Value::Array(_) => "array",
            Value::Resource { .. } => "resource",
            Value::Wrapper(_) => "wrapper",
        }
    }

    /// A value of `ty` whose leaves count up from `*next`.
    ///
    /// Resources get one sampled argument per initializer parameter, so two
    /// samples of the same type differ everywhere.
    pub fn sample(program: &Program, ty: TypeId, simd: bool, next: &mut i64) -> Value {
        Self::build(program, ty, &mut Fill::Sample { simd, next })
    }

    /// The value a default-initialized `ty` holds.
    pub fn zeroed(program: &Program, ty: TypeId) -> Value {
        Self::build(program, ty, &mut Fill::Zero)
    }

    fn build(program: &Program, ty: TypeId, fill: &mut Fill<'_>) -> Value {
        match program.types.kind(ty) {
            TypeKind::Builtin(_) | TypeKind::Vector { .. } | TypeKind::Reference { .. } => {
                Value::Scalar(fill.leaf())
            }
            TypeKind::Pointer { space, .. } => Value::Pointer {
                addr: fill.leaf().unsigned_abs() * 16,
                space: *space,
            },
            TypeKind::Array { elem, len } => {
                Value::Array((0..*len).map(|_| Self::build(program, *elem, fill)).collect())
            }
            TypeKind::VariableArray { .. } => Value::Array(Vec::new()),
            TypeKind::Record(record) => {
                let decl = program.record(*record);
                match &decl.special {
                    Some(SpecialKind::Accessor(_) | SpecialKind::Sampler) => {
                        let args = match fill.simd() {
                            Some(simd) => init_params(program, *record, simd)
                                .iter()
                                .map(|p| Self::build(program, p.ty, fill))
                                .collect(),
                            None => Vec::new(),
                        };
                        Value::Resource {
                            record: *record,
                            args,
                        }
                    }
                    Some(SpecialKind::SpecConstant { .. }) => Value::Resource {
                        record: *record,
                        args: Vec::new(),
                    },
                    Some(SpecialKind::Stream) | None => Value::Record {
                        bases: decl
                            .bases
                            .iter()
                            .map(|b| Self::build(program, b.ty, fill))
                            .collect(),
                        fields: decl
                            .fields
                            .iter()
                            .map(|f| Self::build(program, f.ty, fill))
                            .collect(),
                    },
                }
            }
        }
    }

    fn member(&self, origin: Origin) -> Result<&Value, EvalError> {
        match (origin, self) {
            (Origin::Element { .. }, _) => Ok(self),
            (Origin::Field(field), Value::Record { fields, .. }) => fields
                .get(field.index as usize)
                .ok_or(EvalError::OutOfRange {
                    what: "record fields",
                    index: u64::from(field.index),
                }),
            (Origin::Base(base), Value::Record { bases, .. }) => {
                bases.get(base.index as usize).ok_or(EvalError::OutOfRange {
                    what: "record bases",
                    index: u64::from(base.index),
                })
            }
            (_, other) => Err(EvalError::Mismatch {
                expected: "record",
                found: other.kind_name(),
            }),
        }
    }

    fn project(&self, step: &ExprKind) -> Result<&Value, EvalError> {
        match (step, self) {
            (ExprKind::Member { field: 0, .. }, Value::Wrapper(inner)) => Ok(inner),
            (ExprKind::Member { field, .. }, Value::Record { fields, .. }) => fields
                .get(*field as usize)
                .ok_or(EvalError::OutOfRange {
                    what: "record fields",
                    index: u64::from(*field),
                }),
            (ExprKind::Base { index, .. }, Value::Record { bases, .. }) => {
                bases.get(*index as usize).ok_or(EvalError::OutOfRange {
                    what: "record bases",
                    index: u64::from(*index),
                })
            }
            (ExprKind::Subscript { index, .. }, Value::Array(items)) => usize::try_from(*index)
                .ok()
                .and_then(|i| items.get(i))
                .ok_or(EvalError::OutOfRange {
                    what: "array",
                    index: *index,
                }),
            (_, other) => Err(EvalError::Mismatch {
                expected: "aggregate",
                found: other.kind_name(),
            }),
        }
    }

    fn project_mut(&mut self, step: &ExprKind) -> Result<&mut Value, EvalError> {
        let found = self.kind_name();
        let (slot, what, index) = match (step, self) {
            (ExprKind::Member { field: 0, .. }, Value::Wrapper(inner)) => {
                return Ok(&mut **inner);
            }
            (ExprKind::Member { field, .. }, Value::Record { fields, .. }) => (
                fields.get_mut(*field as usize),
                "record fields",
                u64::from(*field),
            ),
            (ExprKind::Base { index, .. }, Value::Record { bases, .. }) => (
                bases.get_mut(*index as usize),
                "record bases",
                u64::from(*index),
            ),
            (ExprKind::Subscript { index, .. }, Value::Array(items)) => (
                usize::try_from(*index).ok().and_then(|i| items.get_mut(i)),
                "array",
                *index,
            ),
            _ => {
                return Err(EvalError::Mismatch {
                    expected: "aggregate",
                    found,
                })
            }
        };
        slot.ok_or(EvalError::OutOfRange { what, index })
    }
}

/// How [`Value::build`] fills leaves and resources.
enum Fill<'a> {
    Zero,
    Sample { simd: bool, next: &'a mut i64 },
}

impl Fill<'_> {
    fn leaf(&mut self) -> i64 {
        match self {
            Fill::Zero => 0,
            Fill::Sample { next, .. } => {
                **next += 1;
                **next
            }
        }
    }

    /// `None` leaves resources uninitialized.
    fn simd(&self) -> Option<bool> {
        match self {
            Fill::Zero => None,
            Fill::Sample { simd, .. } => Some(*simd),
        }
    }
}

// ── Flattening ──

/// Produces kernel arguments from an object value, in declaration order.
struct Flattener {
    objects: Vec<Value>,
    args: Vec<Value>,
    depth: u32,
    error: Option<EvalError>,
}

impl Flattener {
    fn member(&self, site: &Site) -> Result<Value, EvalError> {
        let top = self.objects.last().ok_or(EvalError::NoObject)?;
        top.member(site.origin).cloned()
    }

    fn step(&mut self, event: &Event) -> Result<(), EvalError> {
        match event {
            Event::Accessor { site, .. } | Event::Sampler { site, .. } => {
                match self.member(site)? {
                    Value::Resource { args, .. } => self.args.extend(args),
                    other => {
                        return Err(EvalError::Mismatch {
                            expected: "resource",
                            found: other.kind_name(),
                        })
                    }
                }
            }
            Event::Stream { site, .. } if !site.is_base() => {
                let value = self.member(site)?;
                self.args.push(value);
            }
            Event::Half(site)
            | Event::Scalar(site)
            | Event::SimpleStruct { site, .. }
            | Event::Union { site, .. } => {
                let value = self.member(site)?;
                self.args.push(value);
            }
            Event::Pointer(site) => {
                let value = match self.member(site)? {
                    Value::Pointer { addr, space } => Value::Pointer {
                        addr,
                        space: kernel_pointer_space(space),
                    },
                    other => other,
                };
                self.args.push(if self.depth > 0 {
                    Value::Wrapper(Box::new(value))
                } else {
                    value
                });
            }
            Event::SimpleArray(site) => {
                let value = self.member(site)?;
                self.args.push(Value::Wrapper(Box::new(value)));
            }
            Event::EnterStruct { site, .. } | Event::EnterStream { site, .. } => {
                let value = self.member(site)?;
                self.objects.push(value);
                self.depth += 1;
            }
            Event::LeaveStruct { .. } | Event::LeaveStream { .. } => {
                self.objects.pop();
                self.depth = self.depth.saturating_sub(1);
            }
            Event::EnterArray { site, .. } => {
                let value = self.member(site)?;
                self.objects.push(value.clone());
                self.objects.push(value);
            }
            Event::NextElement { index, .. } => {
                self.objects.pop();
                let array = self.objects.last().ok_or(EvalError::NoObject)?;
                let element = array.project(&ExprKind::Subscript {
                    base: ExprId::new(0),
                    index: *index,
                })?;
                let element = element.clone();
                self.objects.push(element);
            }
            Event::LeaveArray { .. } => {
                self.objects.pop();
                self.objects.pop();
            }
            _ => {}
        }
        Ok(())
    }
}

impl FieldHandler for Flattener {
    fn capabilities(&self) -> Capabilities {
        Capabilities::DEFAULT - Capabilities::VISIT_INSIDE_SIMPLE
    }

    fn handle(&mut self, _program: &Program, event: &Event) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.step(event) {
            self.error = Some(err);
        }
    }
}

/// The kernel arguments for `object`, an instance of `record`.
pub fn flatten(
    program: &Program,
    record: RecordId,
    object: &Value,
) -> Result<Vec<Value>, EvalError> {
    let mut flattener = Flattener {
        objects: vec![object.clone()],
        args: Vec::new(),
        depth: 0,
        error: None,
    };
    visit_kernel_object(program, record, &mut [&mut flattener]);
    match flattener.error {
        Some(err) => Err(err),
        None => Ok(flattener.args),
    }
}

// ── Execution ──

struct Machine<'a> {
    program: &'a Program,
    exprs: &'a ExprArena,
    args: &'a [Value],
    locals: Vec<Option<Value>>,
    local_types: Vec<TypeId>,
}

impl Machine<'_> {
    fn eval(&self, id: ExprId, expected: Option<TypeId>) -> Result<Value, EvalError> {
        let kind = self.exprs.kind(id);
        match kind {
            ExprKind::Param(n) => self
                .args
                .get(*n as usize)
                .cloned()
                .ok_or(EvalError::MissingArgument(*n)),
            ExprKind::Var(var) => self
                .locals
                .get(var.index())
                .and_then(Option::clone)
                .ok_or(EvalError::Uninitialized(var.raw())),
            ExprKind::Member { base, .. }
            | ExprKind::Base { base, .. }
            | ExprKind::Subscript { base, .. } => {
                let value = self.eval(*base, None)?;
                value.project(kind).cloned()
            }
            ExprKind::InitList(items) => self.init_list(items, expected),
            ExprKind::DefaultInit(ty) => Ok(Value::zeroed(self.program, *ty)),
            ExprKind::IntLit(v) => Ok(Value::Scalar(*v)),
            ExprKind::AddrSpaceCast { operand, space } => match self.eval(*operand, None)? {
                Value::Pointer { addr, .. } => Ok(Value::Pointer {
                    addr,
                    space: *space,
                }),
                other => Err(EvalError::Mismatch {
                    expected: "pointer",
                    found: other.kind_name(),
                }),
            },
            ExprKind::MethodCall { .. } | ExprKind::Call { .. } => Ok(Value::Scalar(0)),
        }
    }

    fn init_list(&self, items: &[ExprId], expected: Option<TypeId>) -> Result<Value, EvalError> {
        let kind = expected.map(|ty| self.program.types.kind(ty));
        match kind {
            Some(TypeKind::Array { elem, .. }) => items
                .iter()
                .map(|&item| self.eval(item, Some(*elem)))
                .collect::<Result<_, _>>()
                .map(Value::Array),
            Some(TypeKind::Record(record)) => {
                let decl = self.program.record(*record);
                let types = decl
                    .bases
                    .iter()
                    .map(|b| b.ty)
                    .chain(decl.fields.iter().map(|f| f.ty));
                let mut values = items
                    .iter()
                    .zip(types)
                    .map(|(&item, ty)| self.eval(item, Some(ty)))
                    .collect::<Result<Vec<_>, _>>()?;
                let fields = values.split_off(decl.bases.len().min(values.len()));
                Ok(Value::Record {
                    bases: values,
                    fields,
                })
            }
            _ => Err(EvalError::Mismatch {
                expected: "aggregate type",
                found: "initializer list",
            }),
        }
    }

    fn place(&mut self, id: ExprId) -> Result<&mut Value, EvalError> {
        let kind = self.exprs.kind(id);
        match kind {
            ExprKind::Var(var) => self
                .locals
                .get_mut(var.index())
                .and_then(Option::as_mut)
                .ok_or(EvalError::Uninitialized(var.raw())),
            ExprKind::Member { base, .. }
            | ExprKind::Base { base, .. }
            | ExprKind::Subscript { base, .. } => self.place(*base)?.project_mut(kind),
            _ => Err(EvalError::NotAPlace),
        }
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<bool, EvalError> {
        match stmt {
            Stmt::Decl { var, init } => {
                let ty = self.local_types.get(var.index()).copied();
                let value = match init {
                    Some(init) => self.eval(*init, ty)?,
                    None => ty.map_or(Value::Scalar(0), |ty| Value::zeroed(self.program, ty)),
                };
                if let Some(slot) = self.locals.get_mut(var.index()) {
                    *slot = Some(value);
                }
            }
            Stmt::Expr(id) => {
                if let ExprKind::MethodCall {
                    receiver,
                    method,
                    args,
                } = self.exprs.kind(*id)
                {
                    if method == INIT || method == INIT_ESIMD {
                        let values = args
                            .iter()
                            .map(|&a| self.eval(a, None))
                            .collect::<Result<Vec<_>, _>>()?;
                        if let Value::Resource { args, .. } = self.place(*receiver)? {
                            *args = values;
                        }
                    }
                }
            }
            Stmt::Return(_) => return Ok(false),
        }
        Ok(true)
    }
}

/// Run `body` over `args`; returns the first declared local, the kernel
/// object clone.
pub fn execute(program: &Program, body: &FunctionBody, args: &[Value]) -> Result<Value, EvalError> {
    let mut machine = Machine {
        program,
        exprs: &body.exprs,
        args,
        locals: vec![None; body.locals.len()],
        local_types: body.locals.iter().map(|l| l.ty).collect(),
    };
    let object = body
        .stmts
        .iter()
        .find_map(|s| match s {
            Stmt::Decl { var, .. } => Some(*var),
            _ => None,
        })
        .ok_or(EvalError::NoObject)?;
    for stmt in &body.stmts {
        if !machine.exec(stmt)? {
            break;
        }
    }
    machine
        .locals
        .get_mut(object.index())
        .and_then(Option::take)
        .ok_or(EvalError::Uninitialized(object.raw()))
}

/// Flatten `object`, then rebuild it with the synthesized `body`.
pub fn round_trip(
    program: &Program,
    record: RecordId,
    body: &FunctionBody,
    object: &Value,
) -> Result<Value, EvalError> {
    let args = flatten(program, record, object)?;
    execute(program, body, &args)
}

#[cfg(test)]
mod tests;
