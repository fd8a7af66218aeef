//! Recursive-descent parser for the supported mangling grammar.

use smallvec::SmallVec;

use super::{Ast, DemangleError, Node, NodeId, NodeList, Qualifiers};

/// Parse an Itanium-mangled symbol.
///
/// Data symbols (`_Z` + name with no parameter list) parse to a bare name
/// root; everything else parses to a [`Node::FunctionEncoding`].
pub fn parse(symbol: &str) -> Result<Ast<'_>, DemangleError> {
    let mut parser = Parser {
        input: symbol,
        pos: 0,
        nodes: Vec::new(),
        lists: Vec::new(),
        subs: Vec::new(),
        template_args: None,
        max_param: None,
    };
    let root = parser.parse_encoding()?;
    Ok(Ast {
        symbol,
        nodes: parser.nodes,
        lists: parser.lists,
        root,
        template_args: parser.template_args,
    })
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    nodes: Vec<Node<'a>>,
    lists: Vec<NodeId>,
    /// Substitution candidates, in the order the ABI numbers them.
    subs: Vec<NodeId>,
    template_args: Option<NodeId>,
    /// Highest template parameter index referenced anywhere.
    max_param: Option<u32>,
}

fn builtin(code: u8) -> Option<&'static str> {
    let name = match code {
        b'v' => "void",
        b'w' => "wchar_t",
        b'b' => "bool",
        b'c' => "char",
        b'a' => "signed char",
        b'h' => "unsigned char",
        b's' => "short",
        b't' => "unsigned short",
        b'i' => "int",
        b'j' => "unsigned int",
        b'l' => "long",
        b'm' => "unsigned long",
        b'x' => "long long",
        b'y' => "unsigned long long",
        b'n' => "__int128",
        b'o' => "unsigned __int128",
        b'f' => "float",
        b'd' => "double",
        b'e' => "long double",
        b'g' => "__float128",
        b'z' => "...",
        _ => return None,
    };
    Some(name)
}

fn is_float_builtin(name: &str) -> bool {
    matches!(
        name,
        "float" | "double" | "long double" | "__float128" | "half" | "_Float16"
    )
}

impl<'a> Parser<'a> {
    // ── Cursor ──

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn consume(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), DemangleError> {
        if self.consume(byte) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> DemangleError {
        match self.input[self.pos..].chars().next() {
            Some(ch) => DemangleError::Unexpected { pos: self.pos, ch },
            None => DemangleError::UnexpectedEnd(self.pos),
        }
    }

    fn unsupported(&self, what: &'static str) -> DemangleError {
        DemangleError::Unsupported {
            pos: self.pos,
            what,
        }
    }

    /// Decimal digits at the cursor, possibly empty.
    fn digits(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn number(&mut self) -> Result<usize, DemangleError> {
        let start = self.pos;
        let digits = self.digits();
        digits.parse().map_err(|_| {
            if self.pos == start {
                self.unexpected()
            } else {
                self.unsupported("number")
            }
        })
    }

    // ── Arena ──

    fn make(&mut self, node: Node<'a>) -> Result<NodeId, DemangleError> {
        let raw = u32::try_from(self.nodes.len()).map_err(|_| DemangleError::TooLarge)?;
        self.nodes.push(node);
        Ok(NodeId(raw))
    }

    fn make_list(&mut self, items: &[NodeId]) -> Result<NodeList, DemangleError> {
        let start = u32::try_from(self.lists.len()).map_err(|_| DemangleError::TooLarge)?;
        let len = u32::try_from(items.len()).map_err(|_| DemangleError::TooLarge)?;
        self.lists.extend_from_slice(items);
        Ok(NodeList { start, len })
    }

    fn node(&self, id: NodeId) -> Node<'a> {
        self.nodes[id.index()]
    }

    // ── Encoding ──

    fn parse_encoding(&mut self) -> Result<NodeId, DemangleError> {
        if !self.consume_str("_Z") {
            return Err(DemangleError::NotMangled);
        }
        let (name, ends_with_template_args) = self.parse_name(true)?;
        if self.at_end() {
            return Ok(name);
        }

        let is_ctor_dtor = self.is_ctor_dtor(name);
        let ret = if ends_with_template_args && !is_ctor_dtor {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut params: SmallVec<[NodeId; 8]> = SmallVec::new();
        let rest = &self.input[self.pos..];
        if rest == "v" || rest.starts_with("v.") {
            self.pos += 1;
        } else {
            while !self.at_end() && self.peek() != Some(b'.') {
                params.push(self.parse_type()?);
            }
        }
        // Clone suffixes such as `.cloned` carry no type information.
        if self.peek() == Some(b'.') {
            self.pos = self.input.len();
        }
        if !self.at_end() {
            return Err(DemangleError::Trailing(self.pos));
        }

        if let Some(max) = self.max_param {
            let available = self.template_arg_count();
            if max as usize >= available {
                return Err(DemangleError::ForwardTemplateRef(max));
            }
        }

        let params = self.make_list(&params)?;
        self.make(Node::FunctionEncoding { ret, name, params })
    }

    fn template_arg_count(&self) -> usize {
        match self.template_args.map(|args| self.node(args)) {
            Some(Node::TemplateArgs(list)) => list.len(),
            _ => 0,
        }
    }

    fn is_ctor_dtor(&self, name: NodeId) -> bool {
        match self.node(name) {
            Node::CtorDtor { .. } => true,
            Node::Nested { name, .. } | Node::NameWithTemplateArgs { name, .. } => {
                self.is_ctor_dtor(name)
            }
            _ => false,
        }
    }

    // ── Names ──

    /// Returns the name and whether it ends with template arguments.
    fn parse_name(&mut self, top: bool) -> Result<(NodeId, bool), DemangleError> {
        match self.peek() {
            Some(b'N') => self.parse_nested_name(top),
            Some(b'Z') => Err(self.unsupported("local name")),
            Some(b'S') if self.peek_at(1) != Some(b't') => {
                let sub = self.parse_substitution()?;
                if self.peek() != Some(b'I') {
                    return Err(self.unexpected());
                }
                let args = self.parse_template_args(top)?;
                Ok((self.make(Node::NameWithTemplateArgs { name: sub, args })?, true))
            }
            _ => {
                let is_std = self.consume_str("St");
                let mut name = self.parse_unqualified_name(None)?;
                if is_std {
                    name = self.make(Node::Std(name))?;
                }
                if self.peek() == Some(b'I') {
                    self.subs.push(name);
                    let args = self.parse_template_args(top)?;
                    let name = self.make(Node::NameWithTemplateArgs { name, args })?;
                    return Ok((name, true));
                }
                Ok((name, false))
            }
        }
    }

    fn parse_nested_name(&mut self, top: bool) -> Result<(NodeId, bool), DemangleError> {
        self.expect(b'N')?;
        while matches!(self.peek(), Some(b'r' | b'V' | b'K')) {
            self.pos += 1;
        }
        if !self.consume(b'R') {
            self.consume(b'O');
        }

        let mut so_far: Option<NodeId> = None;
        let mut ends_with_template_args = false;
        let mut pushed_last = false;
        while !self.consume(b'E') {
            ends_with_template_args = false;
            let component = match self.peek() {
                None => return Err(DemangleError::UnexpectedEnd(self.pos)),
                Some(b'S') if self.peek_at(1) == Some(b't') => {
                    self.pos += 2;
                    let name = self.parse_unqualified_name(None)?;
                    self.make(Node::Std(name))?
                }
                Some(b'S') => {
                    if so_far.is_some() {
                        return Err(self.unexpected());
                    }
                    so_far = Some(self.parse_substitution()?);
                    pushed_last = false;
                    continue;
                }
                Some(b'T') => self.parse_template_param()?,
                Some(b'I') => {
                    let Some(prefix) = so_far else {
                        return Err(self.unexpected());
                    };
                    let args = self.parse_template_args(top)?;
                    ends_with_template_args = true;
                    self.make(Node::NameWithTemplateArgs { name: prefix, args })?
                }
                Some(b'D') if matches!(self.peek_at(1), Some(b'T' | b't')) => {
                    return Err(self.unsupported("decltype"));
                }
                Some(_) => {
                    let class = so_far.map(|s| self.last_name(s));
                    let name = self.parse_unqualified_name(class)?;
                    match so_far {
                        Some(prefix) => self.make(Node::Nested { prefix, name })?,
                        None => name,
                    }
                }
            };
            so_far = Some(component);
            self.subs.push(component);
            pushed_last = true;
        }

        let Some(name) = so_far else {
            return Err(self.unexpected());
        };
        // The complete name is only a candidate when it is used as a type,
        // and the type parser adds it then.
        if pushed_last {
            self.subs.pop();
        }
        Ok((name, ends_with_template_args))
    }

    /// Rightmost source name of a prefix, for constructor spelling.
    fn last_name(&self, id: NodeId) -> NodeId {
        match self.node(id) {
            Node::Nested { name, .. } => self.last_name(name),
            Node::NameWithTemplateArgs { name, .. } | Node::Std(name) => self.last_name(name),
            _ => id,
        }
    }

    fn parse_unqualified_name(&mut self, class: Option<NodeId>) -> Result<NodeId, DemangleError> {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => self.parse_source_name(),
            Some(b'C') => {
                self.pos += 1;
                self.consume(b'I');
                match self.peek() {
                    Some(b'1'..=b'5') => self.pos += 1,
                    _ => return Err(self.unexpected()),
                }
                let class = class.ok_or_else(|| self.unsupported("constructor outside a class"))?;
                self.make(Node::CtorDtor { class, dtor: false })
            }
            Some(b'D') if matches!(self.peek_at(1), Some(b'0'..=b'5')) => {
                self.pos += 2;
                let class = class.ok_or_else(|| self.unsupported("destructor outside a class"))?;
                self.make(Node::CtorDtor { class, dtor: true })
            }
            Some(_) => Err(self.unsupported("operator name")),
            None => Err(DemangleError::UnexpectedEnd(self.pos)),
        }
    }

    fn parse_source_name(&mut self) -> Result<NodeId, DemangleError> {
        let len = self.number()?;
        if len == 0 {
            return Err(self.unsupported("empty source name"));
        }
        let input = self.input;
        let start = self.pos;
        let Some(name) = start.checked_add(len).and_then(|end| input.get(start..end)) else {
            return Err(DemangleError::UnexpectedEnd(input.len()));
        };
        self.pos += len;
        self.make(Node::Name(name))
    }

    // ── Substitutions and template parameters ──

    fn parse_substitution(&mut self) -> Result<NodeId, DemangleError> {
        self.expect(b'S')?;
        let special = match self.peek() {
            Some(b'a') => Some("std::allocator"),
            Some(b'b') => Some("std::basic_string"),
            Some(b's') => Some("std::string"),
            Some(b'i') => Some("std::istream"),
            Some(b'o') => Some("std::ostream"),
            Some(b'd') => Some("std::iostream"),
            _ => None,
        };
        if let Some(special) = special {
            self.pos += 1;
            return self.make(Node::SpecialSubstitution(special));
        }

        let index = if self.consume(b'_') {
            0
        } else {
            let mut seq = 0usize;
            loop {
                let digit = match self.peek() {
                    Some(b @ b'0'..=b'9') => usize::from(b - b'0'),
                    Some(b @ b'A'..=b'Z') => usize::from(b - b'A') + 10,
                    Some(b'_') => break,
                    _ => return Err(self.unexpected()),
                };
                seq = seq
                    .checked_mul(36)
                    .and_then(|s| s.checked_add(digit))
                    .ok_or_else(|| self.unsupported("substitution index"))?;
                self.pos += 1;
            }
            self.pos += 1;
            seq.checked_add(1)
                .ok_or_else(|| self.unsupported("substitution index"))?
        };
        self.subs
            .get(index)
            .copied()
            .ok_or(DemangleError::BadSubstitution(index))
    }

    fn parse_template_param(&mut self) -> Result<NodeId, DemangleError> {
        self.expect(b'T')?;
        let index = if self.consume(b'_') {
            0
        } else {
            let n = self.number()?;
            self.expect(b'_')?;
            n.checked_add(1)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| self.unsupported("template parameter index"))?
        };
        self.max_param = Some(self.max_param.map_or(index, |m| m.max(index)));
        self.make(Node::TemplateParam(index))
    }

    // ── Template arguments ──

    /// `top` marks the arguments of the encoding's own name, which
    /// template parameters refer to.
    fn parse_template_args(&mut self, top: bool) -> Result<NodeId, DemangleError> {
        self.expect(b'I')?;
        let mut args: SmallVec<[NodeId; 8]> = SmallVec::new();
        while !self.consume(b'E') {
            args.push(self.parse_template_arg()?);
        }
        let list = self.make_list(&args)?;
        let node = self.make(Node::TemplateArgs(list))?;
        if top {
            self.template_args = Some(node);
        }
        Ok(node)
    }

    fn parse_template_arg(&mut self) -> Result<NodeId, DemangleError> {
        match self.peek() {
            Some(b'L') => self.parse_expr_primary(),
            Some(b'X') => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                self.expect(b'E')?;
                Ok(expr)
            }
            Some(b'J') => {
                self.pos += 1;
                let mut items: SmallVec<[NodeId; 8]> = SmallVec::new();
                while !self.consume(b'E') {
                    items.push(self.parse_template_arg()?);
                }
                let list = self.make_list(&items)?;
                self.make(Node::Pack(list))
            }
            None => Err(DemangleError::UnexpectedEnd(self.pos)),
            Some(_) => self.parse_type(),
        }
    }

    fn parse_expression(&mut self) -> Result<NodeId, DemangleError> {
        match self.peek() {
            Some(b'T') => self.parse_template_param(),
            Some(b'L') => self.parse_expr_primary(),
            None => Err(DemangleError::UnexpectedEnd(self.pos)),
            Some(_) => Err(self.unsupported("expression")),
        }
    }

    fn parse_expr_primary(&mut self) -> Result<NodeId, DemangleError> {
        self.expect(b'L')?;
        if self.peek() == Some(b'Z') {
            return Err(self.unsupported("external name literal"));
        }
        let ty = self.parse_type()?;
        let negative = self.consume(b'n');
        let digits = self.digits();
        if digits.is_empty() {
            return Err(self.unexpected());
        }
        self.expect(b'E')?;
        match self.node(ty) {
            Node::Builtin(name) if is_float_builtin(name) => {
                Err(self.unsupported("floating-point literal"))
            }
            Node::Builtin(name) => self.make(Node::IntegerLiteral {
                ty: name,
                negative,
                digits,
            }),
            _ => self.make(Node::EnumLiteral {
                ty,
                negative,
                digits,
            }),
        }
    }

    // ── Types ──

    fn parse_type(&mut self) -> Result<NodeId, DemangleError> {
        let Some(code) = self.peek() else {
            return Err(DemangleError::UnexpectedEnd(self.pos));
        };
        if let Some(name) = builtin(code) {
            self.pos += 1;
            return self.make(Node::Builtin(name));
        }

        let ty = match code {
            b'D' => match self.peek_at(1) {
                Some(b'h') => {
                    self.pos += 2;
                    return self.make(Node::Builtin("half"));
                }
                Some(b'n') => {
                    self.pos += 2;
                    return self.make(Node::Builtin("decltype(nullptr)"));
                }
                Some(b'F') => {
                    self.pos += 2;
                    let bits = self.digits();
                    self.expect(b'_')?;
                    if bits != "16" {
                        return Err(self.unsupported("extended floating-point type"));
                    }
                    return self.make(Node::Builtin("_Float16"));
                }
                Some(b'v') => {
                    self.pos += 2;
                    let len = self.digits();
                    if len.is_empty() {
                        return Err(self.unsupported("dependent vector length"));
                    }
                    self.expect(b'_')?;
                    let elem = self.parse_type()?;
                    self.make(Node::Vector { elem, len })?
                }
                Some(b'p') => {
                    self.pos += 2;
                    let inner = self.parse_type()?;
                    let list = self.make_list(&[inner])?;
                    self.make(Node::Pack(list))?
                }
                _ => return Err(self.unsupported("type")),
            },
            b'P' => {
                self.pos += 1;
                let pointee = self.parse_type()?;
                self.make(Node::Pointer(pointee))?
            }
            b'R' | b'O' => {
                self.pos += 1;
                let pointee = self.parse_type()?;
                self.make(Node::Reference {
                    pointee,
                    rvalue: code == b'O',
                })?
            }
            b'r' | b'V' | b'K' => {
                let mut quals = Qualifiers::default();
                quals.is_restrict = self.consume(b'r');
                quals.is_volatile = self.consume(b'V');
                quals.is_const = self.consume(b'K');
                let inner = self.parse_type()?;
                self.make(Node::Qualified { inner, quals })?
            }
            b'A' => {
                self.pos += 1;
                let len = self.digits();
                self.expect(b'_')?;
                let elem = self.parse_type()?;
                self.make(Node::Array { elem, len })?
            }
            b'T' => {
                let param = self.parse_template_param()?;
                if self.peek() == Some(b'I') {
                    self.subs.push(param);
                    let args = self.parse_template_args(false)?;
                    self.make(Node::NameWithTemplateArgs { name: param, args })?
                } else {
                    param
                }
            }
            b'S' if self.peek_at(1) != Some(b't') => {
                let sub = self.parse_substitution()?;
                if self.peek() != Some(b'I') {
                    // Substitutions are not candidates again.
                    return Ok(sub);
                }
                let args = self.parse_template_args(false)?;
                self.make(Node::NameWithTemplateArgs { name: sub, args })?
            }
            b'N' | b'S' | b'Z' | b'0'..=b'9' => self.parse_name(false)?.0,
            _ => return Err(self.unexpected()),
        };
        self.subs.push(ty);
        Ok(ty)
    }
}
