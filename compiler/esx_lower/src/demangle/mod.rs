//! Itanium name demangling for intrinsic call sites.
//!
//! Parses the subset of the Itanium C++ ABI mangling that device-side
//! intrinsic declarations use: plain, nested, and `std::` names, template
//! arguments (types, integer and enum literals, packs, and template-parameter
//! expressions), builtin, pointer, reference, qualified, vector, and array
//! types, template parameters, and substitutions.
//!
//! # Design
//!
//! Nodes live in a per-symbol arena ([`Ast`]) addressed by [`NodeId`].
//! Payloads borrow `&str` slices of the symbol and child lists are ranges
//! into one shared id vector, so a node is `Copy` and the whole tree is
//! freed in bulk when the `Ast` drops.

mod parser;

use std::fmt::Write as _;

use thiserror::Error;

pub use parser::parse;

/// Handle of a node in an [`Ast`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Contiguous range of child ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct NodeList {
    start: u32,
    len: u32,
}

impl NodeList {
    pub fn len(self) -> usize {
        self.len as usize
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// `const`/`volatile`/`restrict` qualifiers on a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node<'a> {
    /// Source name, e.g. `__esimd_flat_read`.
    Name(&'a str),
    /// Builtin type spelled in full, e.g. `unsigned int`.
    Builtin(&'a str),
    /// `prefix::name`.
    Nested { prefix: NodeId, name: NodeId },
    NameWithTemplateArgs { name: NodeId, args: NodeId },
    TemplateArgs(NodeList),
    /// Integral literal; `ty` is the builtin spelling of its type.
    IntegerLiteral {
        ty: &'a str,
        negative: bool,
        digits: &'a str,
    },
    /// Literal of a class or enum type.
    EnumLiteral {
        ty: NodeId,
        negative: bool,
        digits: &'a str,
    },
    /// `T_` is parameter 0, `T0_` parameter 1, and so on.
    TemplateParam(u32),
    Pointer(NodeId),
    Reference { pointee: NodeId, rvalue: bool },
    Qualified { inner: NodeId, quals: Qualifiers },
    Vector { elem: NodeId, len: &'a str },
    Array { elem: NodeId, len: &'a str },
    /// `std::name`.
    Std(NodeId),
    /// Abbreviation such as `Sa` for `std::allocator`.
    SpecialSubstitution(&'a str),
    CtorDtor { class: NodeId, dtor: bool },
    Pack(NodeList),
    FunctionEncoding {
        ret: Option<NodeId>,
        name: NodeId,
        params: NodeList,
    },
}

/// Parts of a function-encoding root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Encoding {
    pub ret: Option<NodeId>,
    pub name: NodeId,
    pub params: NodeList,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum DemangleError {
    #[error("not an Itanium-mangled name")]
    NotMangled,

    #[error("unexpected end of symbol at offset {0}")]
    UnexpectedEnd(usize),

    #[error("unexpected character '{ch}' at offset {pos}")]
    Unexpected { pos: usize, ch: char },

    #[error("unsupported {what} at offset {pos}")]
    Unsupported { pos: usize, what: &'static str },

    #[error("substitution S{0} refers past the substitution table")]
    BadSubstitution(usize),

    #[error("template parameter {0} has no matching template argument")]
    ForwardTemplateRef(u32),

    #[error("trailing characters at offset {0}")]
    Trailing(usize),

    #[error("symbol has too many components to demangle")]
    TooLarge,
}

/// Demangled tree of one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ast<'a> {
    symbol: &'a str,
    nodes: Vec<Node<'a>>,
    lists: Vec<NodeId>,
    root: NodeId,
    /// Template arguments of the encoding's name; `T_` refers into these.
    template_args: Option<NodeId>,
}

impl<'a> Ast<'a> {
    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Node<'a> {
        self.nodes[id.index()]
    }

    pub fn list(&self, list: NodeList) -> &[NodeId] {
        let start = list.start as usize;
        &self.lists[start..start + list.len()]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root, when it is a function encoding.
    pub fn encoding(&self) -> Option<Encoding> {
        match self.node(self.root) {
            Node::FunctionEncoding { ret, name, params } => Some(Encoding { ret, name, params }),
            _ => None,
        }
    }

    /// Unqualified name without template arguments.
    pub fn base_name(&self, id: NodeId) -> Option<&'a str> {
        match self.node(id) {
            Node::Name(name) => Some(name),
            Node::Nested { name, .. } => self.base_name(name),
            Node::NameWithTemplateArgs { name, .. } => self.base_name(name),
            Node::Std(inner) => self.base_name(inner),
            Node::FunctionEncoding { name, .. } => self.base_name(name),
            _ => None,
        }
    }

    /// Template arguments written directly on a name.
    pub fn template_args_of(&self, name: NodeId) -> Option<&[NodeId]> {
        let Node::NameWithTemplateArgs { args, .. } = self.node(name) else {
            return None;
        };
        match self.node(args) {
            Node::TemplateArgs(list) => Some(self.list(list)),
            _ => None,
        }
    }

    /// Follow template parameters to the arguments they stand for.
    pub fn resolve(&self, mut id: NodeId) -> NodeId {
        // A parameter can only name an argument parsed before it, so the
        // chain is bounded by the arena size.
        for _ in 0..self.nodes.len() {
            let Node::TemplateParam(index) = self.node(id) else {
                return id;
            };
            let Some(&arg) = self
                .template_args
                .and_then(|args| match self.node(args) {
                    Node::TemplateArgs(list) => self.list(list).get(index as usize),
                    _ => None,
                })
            else {
                return id;
            };
            id = arg;
        }
        id
    }

    /// Human-readable rendering, e.g. `int vector[16] f<int, 16>(...)`.
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(&mut out, id);
        out
    }

    fn render_list(&self, out: &mut String, list: NodeList) {
        for (i, &item) in self.list(list).iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.render_into(out, item);
        }
    }

    fn render_into(&self, out: &mut String, id: NodeId) {
        match self.node(id) {
            Node::Name(s) | Node::Builtin(s) | Node::SpecialSubstitution(s) => out.push_str(s),
            Node::Nested { prefix, name } => {
                self.render_into(out, prefix);
                out.push_str("::");
                self.render_into(out, name);
            }
            Node::NameWithTemplateArgs { name, args } => {
                self.render_into(out, name);
                self.render_into(out, args);
            }
            Node::TemplateArgs(list) => {
                out.push('<');
                self.render_list(out, list);
                out.push('>');
            }
            Node::IntegerLiteral {
                ty,
                negative,
                digits,
            } => render_integer(out, ty, negative, digits),
            Node::EnumLiteral {
                ty,
                negative,
                digits,
            } => {
                out.push('(');
                self.render_into(out, ty);
                out.push(')');
                if negative {
                    out.push('-');
                }
                out.push_str(digits);
            }
            Node::TemplateParam(index) => {
                let resolved = self.resolve(id);
                if resolved == id {
                    let _ = write!(out, "T{index}_");
                } else {
                    self.render_into(out, resolved);
                }
            }
            Node::Pointer(pointee) => {
                self.render_into(out, pointee);
                out.push('*');
            }
            Node::Reference { pointee, rvalue } => {
                self.render_into(out, pointee);
                out.push_str(if rvalue { "&&" } else { "&" });
            }
            Node::Qualified { inner, quals } => {
                self.render_into(out, inner);
                if quals.is_const {
                    out.push_str(" const");
                }
                if quals.is_volatile {
                    out.push_str(" volatile");
                }
                if quals.is_restrict {
                    out.push_str(" restrict");
                }
            }
            Node::Vector { elem, len } => {
                self.render_into(out, elem);
                let _ = write!(out, " vector[{len}]");
            }
            Node::Array { elem, len } => {
                self.render_into(out, elem);
                let _ = write!(out, " [{len}]");
            }
            Node::Std(inner) => {
                out.push_str("std::");
                self.render_into(out, inner);
            }
            Node::CtorDtor { class, dtor } => {
                if dtor {
                    out.push('~');
                }
                out.push_str(self.base_name(class).unwrap_or_default());
            }
            Node::Pack(list) => self.render_list(out, list),
            Node::FunctionEncoding { ret, name, params } => {
                if let Some(ret) = ret {
                    self.render_into(out, ret);
                    out.push(' ');
                }
                self.render_into(out, name);
                out.push('(');
                self.render_list(out, params);
                out.push(')');
            }
        }
    }
}

fn render_integer(out: &mut String, ty: &str, negative: bool, digits: &str) {
    if ty == "bool" {
        out.push_str(if digits == "0" { "false" } else { "true" });
        return;
    }
    let suffix = match ty {
        "int" => Some(""),
        "unsigned int" => Some("u"),
        "long" => Some("l"),
        "unsigned long" => Some("ul"),
        "long long" => Some("ll"),
        "unsigned long long" => Some("ull"),
        _ => None,
    };
    match suffix {
        Some(suffix) => {
            if negative {
                out.push('-');
            }
            out.push_str(digits);
            out.push_str(suffix);
        }
        None => {
            let _ = write!(out, "({ty})");
            if negative {
                out.push('-');
            }
            out.push_str(digits);
        }
    }
}
