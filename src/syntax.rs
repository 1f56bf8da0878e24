// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The syntax node model consumed by the inference engine.
//!
//! Nodes are arena-allocated inside a [`SyntaxTree`] and referenced by
//! [`NodeId`] indices, so parent references and the identity-keyed caches of
//! the evaluator never extend an owner's lifetime. A parser frontend drives
//! the constructor API (`new_module`, `new_statement`, ...); the engine only
//! reads nodes and appends structural clones to a per-session scratch arena.

use crate::entity::EntityId;
use crate::error::StructuralError;

use anyhow::Result;
use serde::Serialize;

/// A line/column source position. Ordering is row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }

    /// Position of synthesized nodes that must sort before any real one.
    pub const ZERO: Position = Position { line: 0, column: 0 };

    /// Position that sorts after any real one ("end of file").
    pub const MAX: Position = Position {
        line: u32::MAX,
        column: u32::MAX,
    };
}

/// Index of a node in a [`SyntaxTree`] or in a session scratch arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
    /// The immediate parent node. `None` only for modules.
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Module(ModuleNode),
    Class(ClassNode),
    Function(FunctionNode),
    Statement(StatementNode),
    Param(ParamNode),
    Name(NameNode),
    Call(CallNode),
    Array(ArrayNode),
    Flow(FlowNode),
    Comprehension(ComprehensionNode),
    Import(ImportNode),
}

impl NodeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Module(_) => "module",
            NodeKind::Class(_) => "class",
            NodeKind::Function(_) => "function",
            NodeKind::Statement(_) => "statement",
            NodeKind::Param(_) => "param",
            NodeKind::Name(_) => "name",
            NodeKind::Call(_) => "call",
            NodeKind::Array(_) => "array",
            NodeKind::Flow(_) => "flow",
            NodeKind::Comprehension(_) => "comprehension",
            NodeKind::Import(_) => "import",
        }
    }

    /// Scope nodes own statements and sub-scopes; everything else is nested
    /// inside one.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Module(_) | NodeKind::Class(_) | NodeKind::Function(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub name: String,
    pub statements: Vec<NodeId>,
    pub subscopes: Vec<NodeId>,
    pub imports: Vec<NodeId>,
    /// Set for the builtin stub module installed by the registry.
    pub builtin: bool,
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: String,
    /// Superclass expressions, one statement per base.
    pub supers: Vec<NodeId>,
    pub statements: Vec<NodeId>,
    pub subscopes: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: String,
    pub params: Vec<NodeId>,
    /// Decorator expressions, outermost first. Not part of the body.
    pub decorators: Vec<NodeId>,
    pub statements: Vec<NodeId>,
    pub subscopes: Vec<NodeId>,
    /// Return and yield statements, in source order.
    pub returns: Vec<NodeId>,
    pub is_generator: bool,
    /// Set on session clones: the execution this copy belongs to. Parameter
    /// bindings of that execution are materialized on the cloned params.
    pub execution: Option<EntityId>,
}

/// Assignment operator of one assignment part of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// Plain `=`.
    Assign,
    /// Compound operators (`+=`, `|=`, ...). These never shadow an outer
    /// plain assignment during name resolution.
    Augmented,
}

/// Left-hand side shape of an assignment.
#[derive(Debug, Clone)]
pub enum Target {
    /// A (possibly dotted) name node.
    Name(NodeId),
    /// `a, b = ...` including nested tuples.
    Tuple(Vec<Target>),
    /// A parenthesized target; transparent for destructuring.
    Group(Box<Target>),
}

impl Target {
    /// All name nodes bound by this target, in source order.
    pub fn collect_names(&self, out: &mut Vec<NodeId>) {
        match self {
            Target::Name(n) => out.push(*n),
            Target::Tuple(items) => {
                for t in items {
                    t.collect_names(out);
                }
            }
            Target::Group(t) => t.collect_names(out),
        }
    }

    pub fn names(&self) -> Vec<NodeId> {
        let mut out = vec![];
        self.collect_names(&mut out);
        out
    }
}

#[derive(Debug, Clone)]
pub struct StatementNode {
    /// Chained assignments (`a = b = expr` has two parts). Empty for a bare
    /// expression statement.
    pub assignments: Vec<(AssignOp, Target)>,
    /// The right-hand token rows. `None` marks a structurally broken node and
    /// is a propagated error when evaluation demands it.
    pub expr: Option<TokenRows>,
}

/// `*`/`**` parameter flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarKind {
    None,
    Args,
    KwArgs,
}

#[derive(Debug, Clone)]
pub struct ParamNode {
    /// Single-segment name node.
    pub name: NodeId,
    /// Zero-based declaration position.
    pub position: u32,
    pub star: StarKind,
    pub default: Option<TokenSeq>,
    /// Call-site binding, set only on execution clones.
    pub binding: Option<BoundArgs>,
}

/// The value bound to a parameter by one call.
#[derive(Debug, Clone)]
pub struct BoundArgs {
    pub kind: BoundKind,
    /// Value token rows, evaluated in the caller's context on demand.
    pub values: Vec<TokenSeq>,
    /// Key token rows, parallel to `values`; only for `BoundKind::Dict`.
    pub keys: Vec<TokenSeq>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// An ordinary parameter bound to a single value row.
    Single,
    /// A `*args` parameter holding the leftover positional rows.
    Tuple,
    /// A `**kwargs` parameter holding the unmatched keyword rows.
    Dict,
}

/// One segment of a dotted name.
#[derive(Debug, Clone)]
pub struct NamePart {
    pub text: String,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct NameNode {
    pub segments: Vec<NamePart>,
}

impl NameNode {
    pub fn final_segment(&self) -> &str {
        self.segments
            .last()
            .map(|p| p.text.as_str())
            .unwrap_or_default()
    }

    /// The dotted text after stripping `strip` leading segments.
    pub fn text_from(&self, strip: usize) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .skip(strip)
            .map(|p| p.text.as_str())
            .collect();
        parts.join(".")
    }
}

/// Head of an access chain: the part resolved before any trailing segment.
#[derive(Debug, Clone)]
pub enum CallHead {
    /// A plain name, looked up globally at the call's position.
    Name(String),
    /// A string literal; becomes an instance of the builtin string type.
    Str(String),
    /// A number literal; becomes an instance of the builtin int/float type.
    Num(String),
    /// A literal collection (or parenthesized group) at the head.
    Array(NodeId),
}

/// One trailing segment of an access chain.
#[derive(Debug, Clone)]
pub enum PathSeg {
    /// `.name` — resolved inside the current entity.
    Name(String),
    /// `(...)` — an argument array; builds an execution.
    CallArgs(NodeId),
    /// `[...]` — a subscript array; asks the entity for index types.
    Index(NodeId),
}

/// A dotted/indexed/call access chain, e.g. `foo.bar(x)[0].baz`.
#[derive(Debug, Clone)]
pub struct CallNode {
    pub head: CallHead,
    pub path: Vec<PathSeg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Tuple,
    List,
    Dict,
    Set,
    /// A parenthesized group; unwraps during evaluation.
    Group,
    /// A call-site argument list.
    Arg,
}

impl ArrayKind {
    /// The builtin type name whose members this collection exposes.
    pub fn type_name(self) -> &'static str {
        match self {
            ArrayKind::Tuple | ArrayKind::Arg | ArrayKind::Group => "tuple",
            ArrayKind::List => "list",
            ArrayKind::Dict => "dict",
            ArrayKind::Set => "set",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArrayNode {
    pub kind: ArrayKind,
    /// Element (or mapping value) rows.
    pub values: Vec<TokenSeq>,
    /// Mapping key rows, parallel to `values`; empty unless `kind` is `Dict`.
    pub keys: Vec<TokenSeq>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    For,
    If,
    While,
    Else,
}

#[derive(Debug, Clone)]
pub struct FlowNode {
    pub kind: FlowKind,
    /// Input statements: the iterated source for `for`, the condition
    /// otherwise.
    pub inputs: Vec<NodeId>,
    /// Loop variable target for `for`.
    pub target: Option<Target>,
    pub statements: Vec<NodeId>,
    pub subscopes: Vec<NodeId>,
    /// Set on the synthetic loop a comprehension lowers to; exposes the loop
    /// variable as its own scope level.
    pub is_comprehension: bool,
}

/// `expr for target in input`, possibly nested in `input`.
#[derive(Debug, Clone)]
pub struct ComprehensionNode {
    /// The element expression, as a statement.
    pub expr_stmt: NodeId,
    pub target: Target,
    /// The iterated input, as a statement. Its first token may be another
    /// comprehension (nested form).
    pub input: NodeId,
}

#[derive(Debug, Clone)]
pub struct ImportNode {
    pub module: String,
    /// Imported name nodes; empty for a plain module import.
    pub names: Vec<NodeId>,
    pub star: bool,
}

/// One operand or operator of an expression row.
#[derive(Debug, Clone)]
pub enum Token {
    /// A bare operator or keyword token (`+`, `:`, `if`, `else`, ...).
    Operator(String),
    Call(NodeId),
    Comprehension(NodeId),
    /// An already-resolved entity. Appears only in session-synthesized
    /// argument arrays (decorators, descriptors, receiver binding).
    Entity(EntityId),
}

impl Token {
    pub fn op(text: &str) -> Token {
        Token::Operator(text.to_string())
    }

    pub fn is_op(&self, text: &str) -> bool {
        matches!(self, Token::Operator(o) if o == text)
    }
}

pub type TokenSeq = Vec<Token>;
pub type TokenRows = Vec<TokenSeq>;

/// Read access to nodes. Implemented by [`SyntaxTree`] and by the session,
/// which overlays a scratch arena for structural clones.
pub trait NodeStore {
    fn node(&self, id: NodeId) -> Result<&Node>;

    fn kind(&self, id: NodeId) -> Result<&NodeKind> {
        Ok(&self.node(id)?.kind)
    }

    fn position(&self, id: NodeId) -> Result<Position> {
        Ok(self.node(id)?.pos)
    }

    fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// The nearest enclosing scope node (module/class/function), or `id`
    /// itself if it is one.
    fn enclosing_scope(&self, id: NodeId) -> Result<NodeId> {
        let mut cur = id;
        loop {
            if self.kind(cur)?.is_scope() {
                return Ok(cur);
            }
            match self.parent(cur)? {
                Some(p) => cur = p,
                None => return Ok(cur),
            }
        }
    }

    /// The nearest enclosing statement, or `None` outside of one.
    fn parent_statement(&self, id: NodeId) -> Result<Option<NodeId>> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if matches!(self.kind(c)?, NodeKind::Statement(_)) {
                return Ok(Some(c));
            }
            cur = self.parent(c)?;
        }
        Ok(None)
    }

    /// The module a node ultimately belongs to.
    fn module_of(&self, id: NodeId) -> Result<NodeId> {
        let mut cur = id;
        while let Some(p) = self.parent(cur)? {
            cur = p;
        }
        Ok(cur)
    }

    fn name_node(&self, id: NodeId) -> Result<&NameNode> {
        match self.kind(id)? {
            NodeKind::Name(n) => Ok(n),
            k => Err(StructuralError::UnexpectedKind {
                node: id,
                expected: "name",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    fn statement(&self, id: NodeId) -> Result<&StatementNode> {
        match self.kind(id)? {
            NodeKind::Statement(s) => Ok(s),
            k => Err(StructuralError::UnexpectedKind {
                node: id,
                expected: "statement",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    fn array(&self, id: NodeId) -> Result<&ArrayNode> {
        match self.kind(id)? {
            NodeKind::Array(a) => Ok(a),
            k => Err(StructuralError::UnexpectedKind {
                node: id,
                expected: "array",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    fn function(&self, id: NodeId) -> Result<&FunctionNode> {
        match self.kind(id)? {
            NodeKind::Function(f) => Ok(f),
            k => Err(StructuralError::UnexpectedKind {
                node: id,
                expected: "function",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    fn class(&self, id: NodeId) -> Result<&ClassNode> {
        match self.kind(id)? {
            NodeKind::Class(c) => Ok(c),
            k => Err(StructuralError::UnexpectedKind {
                node: id,
                expected: "class",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    fn param(&self, id: NodeId) -> Result<&ParamNode> {
        match self.kind(id)? {
            NodeKind::Param(p) => Ok(p),
            k => Err(StructuralError::UnexpectedKind {
                node: id,
                expected: "param",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    /// Display name of a scope-like node, for diagnostics and definitions.
    fn scope_name(&self, id: NodeId) -> Result<String> {
        Ok(match self.kind(id)? {
            NodeKind::Module(m) => m.name.clone(),
            NodeKind::Class(c) => c.name.clone(),
            NodeKind::Function(f) => f.name.clone(),
            k => k.kind_name().to_string(),
        })
    }
}

/// The node arena a frontend parses into.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl NodeStore for SyntaxTree {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| StructuralError::DanglingNode { node: id }.into())
    }
}

impl SyntaxTree {
    pub fn new() -> SyntaxTree {
        SyntaxTree { nodes: vec![] }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, kind: NodeKind, pos: Position, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, pos, parent });
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| StructuralError::DanglingNode { node: id }.into())
    }

    /// Register `child` in the statement or sub-scope list of `parent`.
    fn attach(&mut self, parent: NodeId, child: NodeId, subscope: bool) -> Result<()> {
        let kind = &mut self.node_mut(parent)?.kind;
        let (statements, subscopes) = match kind {
            NodeKind::Module(m) => (&mut m.statements, &mut m.subscopes),
            NodeKind::Class(c) => (&mut c.statements, &mut c.subscopes),
            NodeKind::Function(f) => (&mut f.statements, &mut f.subscopes),
            NodeKind::Flow(f) => (&mut f.statements, &mut f.subscopes),
            k => {
                return Err(StructuralError::UnexpectedKind {
                    node: parent,
                    expected: "scope",
                    found: k.kind_name(),
                }
                .into())
            }
        };
        if subscope {
            subscopes.push(child);
        } else {
            statements.push(child);
        }
        Ok(())
    }

    pub fn new_module(&mut self, name: &str) -> NodeId {
        self.push(
            NodeKind::Module(ModuleNode {
                name: name.to_string(),
                statements: vec![],
                subscopes: vec![],
                imports: vec![],
                builtin: false,
            }),
            Position::ZERO,
            None,
        )
    }

    pub fn mark_builtin(&mut self, module: NodeId) -> Result<()> {
        match &mut self.node_mut(module)?.kind {
            NodeKind::Module(m) => {
                m.builtin = true;
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: module,
                expected: "module",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn new_class(&mut self, parent: NodeId, name: &str, pos: Position) -> Result<NodeId> {
        let id = self.push(
            NodeKind::Class(ClassNode {
                name: name.to_string(),
                supers: vec![],
                statements: vec![],
                subscopes: vec![],
            }),
            pos,
            Some(parent),
        );
        self.attach(parent, id, true)?;
        Ok(id)
    }

    pub fn add_super(&mut self, class: NodeId, stmt: NodeId) -> Result<()> {
        match &mut self.node_mut(class)?.kind {
            NodeKind::Class(c) => {
                c.supers.push(stmt);
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: class,
                expected: "class",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn new_function(&mut self, parent: NodeId, name: &str, pos: Position) -> Result<NodeId> {
        let id = self.push(
            NodeKind::Function(FunctionNode {
                name: name.to_string(),
                params: vec![],
                decorators: vec![],
                statements: vec![],
                subscopes: vec![],
                returns: vec![],
                is_generator: false,
                execution: None,
            }),
            pos,
            Some(parent),
        );
        self.attach(parent, id, true)?;
        Ok(id)
    }

    pub fn new_param(
        &mut self,
        function: NodeId,
        name: &str,
        star: StarKind,
        pos: Position,
    ) -> Result<NodeId> {
        let name_id = self.new_name(&[name], pos, None);
        let position = self.function(function)?.params.len() as u32;
        let id = self.push(
            NodeKind::Param(ParamNode {
                name: name_id,
                position,
                star,
                default: None,
                binding: None,
            }),
            pos,
            Some(function),
        );
        self.node_mut(name_id)?.parent = Some(id);
        match &mut self.node_mut(function)?.kind {
            NodeKind::Function(f) => f.params.push(id),
            k => {
                return Err(StructuralError::UnexpectedKind {
                    node: function,
                    expected: "function",
                    found: k.kind_name(),
                }
                .into())
            }
        }
        Ok(id)
    }

    pub fn set_param_default(&mut self, param: NodeId, default: TokenSeq) -> Result<()> {
        match &mut self.node_mut(param)?.kind {
            NodeKind::Param(p) => {
                p.default = Some(default);
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: param,
                expected: "param",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    /// A statement attached to a scope's body. Targets and expression rows
    /// are filled in afterwards.
    pub fn new_statement(&mut self, parent: NodeId, pos: Position) -> Result<NodeId> {
        let id = self.push(
            NodeKind::Statement(StatementNode {
                assignments: vec![],
                expr: None,
            }),
            pos,
            Some(parent),
        );
        self.attach(parent, id, false)?;
        Ok(id)
    }

    /// A statement owned by another construct (decorator, superclass
    /// expression, loop input); not part of any body list.
    pub fn new_detached_statement(&mut self, parent: NodeId, pos: Position) -> Result<NodeId> {
        Ok(self.push(
            NodeKind::Statement(StatementNode {
                assignments: vec![],
                expr: None,
            }),
            pos,
            Some(parent),
        ))
    }

    pub fn add_assignment(&mut self, stmt: NodeId, op: AssignOp, target: Target) -> Result<()> {
        match &mut self.node_mut(stmt)?.kind {
            NodeKind::Statement(s) => {
                s.assignments.push((op, target));
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: stmt,
                expected: "statement",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn set_expr(&mut self, stmt: NodeId, rows: TokenRows) -> Result<()> {
        match &mut self.node_mut(stmt)?.kind {
            NodeKind::Statement(s) => {
                s.expr = Some(rows);
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: stmt,
                expected: "statement",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn add_decorator(&mut self, function: NodeId, stmt: NodeId) -> Result<()> {
        match &mut self.node_mut(function)?.kind {
            NodeKind::Function(f) => {
                f.decorators.push(stmt);
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: function,
                expected: "function",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    /// Record `stmt` as a return (or yield) of `function`. Yields also flag
    /// the function as a generator.
    pub fn add_return(&mut self, function: NodeId, stmt: NodeId, is_yield: bool) -> Result<()> {
        match &mut self.node_mut(function)?.kind {
            NodeKind::Function(f) => {
                f.returns.push(stmt);
                if is_yield {
                    f.is_generator = true;
                }
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: function,
                expected: "function",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn new_name(&mut self, segments: &[&str], pos: Position, parent: Option<NodeId>) -> NodeId {
        let parts = segments
            .iter()
            .enumerate()
            .map(|(i, s)| NamePart {
                text: s.to_string(),
                // Columns offset per segment keep sibling parts ordered.
                pos: Position::new(pos.line, pos.column + i as u32),
            })
            .collect();
        self.push(NodeKind::Name(NameNode { segments: parts }), pos, parent)
    }

    pub fn new_call(
        &mut self,
        parent: NodeId,
        head: CallHead,
        path: Vec<PathSeg>,
        pos: Position,
    ) -> NodeId {
        self.push(NodeKind::Call(CallNode { head, path }), pos, Some(parent))
    }

    pub fn new_array(
        &mut self,
        parent: NodeId,
        kind: ArrayKind,
        values: Vec<TokenSeq>,
        keys: Vec<TokenSeq>,
        pos: Position,
    ) -> NodeId {
        self.push(
            NodeKind::Array(ArrayNode { kind, values, keys }),
            pos,
            Some(parent),
        )
    }

    pub fn new_flow(
        &mut self,
        parent: NodeId,
        kind: FlowKind,
        pos: Position,
    ) -> Result<NodeId> {
        let id = self.push(
            NodeKind::Flow(FlowNode {
                kind,
                inputs: vec![],
                target: None,
                statements: vec![],
                subscopes: vec![],
                is_comprehension: false,
            }),
            pos,
            Some(parent),
        );
        self.attach(parent, id, false)?;
        Ok(id)
    }

    pub fn set_flow_input(&mut self, flow: NodeId, stmt: NodeId) -> Result<()> {
        match &mut self.node_mut(flow)?.kind {
            NodeKind::Flow(f) => {
                f.inputs.push(stmt);
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: flow,
                expected: "flow",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn set_flow_target(&mut self, flow: NodeId, target: Target) -> Result<()> {
        match &mut self.node_mut(flow)?.kind {
            NodeKind::Flow(f) => {
                f.target = Some(target);
                Ok(())
            }
            k => Err(StructuralError::UnexpectedKind {
                node: flow,
                expected: "flow",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    pub fn new_comprehension(
        &mut self,
        parent: NodeId,
        expr_stmt: NodeId,
        target: Target,
        input: NodeId,
        pos: Position,
    ) -> NodeId {
        self.push(
            NodeKind::Comprehension(ComprehensionNode {
                expr_stmt,
                target,
                input,
            }),
            pos,
            Some(parent),
        )
    }

    pub fn new_import(
        &mut self,
        module: NodeId,
        from_module: &str,
        names: &[&str],
        star: bool,
        pos: Position,
    ) -> Result<NodeId> {
        let id = self.push(
            NodeKind::Import(ImportNode {
                module: from_module.to_string(),
                names: vec![],
                star,
            }),
            pos,
            Some(module),
        );
        let mut name_ids = vec![];
        for n in names {
            name_ids.push(self.new_name(&[n], pos, Some(id)));
        }
        match &mut self.node_mut(id)?.kind {
            NodeKind::Import(i) => i.names = name_ids,
            _ => unreachable!("freshly created import node"),
        }
        match &mut self.node_mut(module)?.kind {
            NodeKind::Module(m) => {
                m.imports.push(id);
                Ok(id)
            }
            k => Err(StructuralError::UnexpectedKind {
                node: module,
                expected: "module",
                found: k.kind_name(),
            }
            .into()),
        }
    }
}
