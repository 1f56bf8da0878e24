// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared tree-building helpers standing in for a parser frontend.

use crate::*;

/// Incremental source builder: every construct lands on its own line so
/// position-sensitive lookups behave like real source order.
pub struct Src<'t> {
    pub t: &'t mut SyntaxTree,
    line: u32,
}

impl<'t> Src<'t> {
    pub fn new(t: &'t mut SyntaxTree) -> Src<'t> {
        Src { t, line: 1 }
    }

    /// A builder that continues from a later line, for tests that extend an
    /// already-built module.
    pub fn at(t: &'t mut SyntaxTree, line: u32) -> Src<'t> {
        Src { t, line }
    }

    pub fn module(&mut self, name: &str) -> NodeId {
        self.t.new_module(name)
    }

    fn next_pos(&mut self) -> Position {
        let pos = Position::new(self.line, 0);
        self.line += 1;
        pos
    }

    /// `name = <row>`
    pub fn assign(
        &mut self,
        scope: NodeId,
        name: &str,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        self.assign_path(scope, &[name], build)
    }

    /// Dotted-target assignment, e.g. `self.v = <row>`.
    pub fn assign_path(
        &mut self,
        scope: NodeId,
        segments: &[&str],
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        let pos = self.next_pos();
        let stmt = self.t.new_statement(scope, pos).unwrap();
        let target = self.t.new_name(segments, pos, Some(stmt));
        self.t
            .add_assignment(stmt, AssignOp::Assign, Target::Name(target))
            .unwrap();
        let row = build(self.t, stmt, pos);
        self.t.set_expr(stmt, vec![row]).unwrap();
        stmt
    }

    /// `name += <row>`
    pub fn augment(
        &mut self,
        scope: NodeId,
        name: &str,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        let pos = self.next_pos();
        let stmt = self.t.new_statement(scope, pos).unwrap();
        let target = self.t.new_name(&[name], pos, Some(stmt));
        self.t
            .add_assignment(stmt, AssignOp::Augmented, Target::Name(target))
            .unwrap();
        let row = build(self.t, stmt, pos);
        self.t.set_expr(stmt, vec![row]).unwrap();
        stmt
    }

    /// Destructuring assignment with an explicit target shape.
    pub fn assign_target(
        &mut self,
        scope: NodeId,
        target: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> Target,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        let pos = self.next_pos();
        let stmt = self.t.new_statement(scope, pos).unwrap();
        let target = target(self.t, stmt, pos);
        self.t
            .add_assignment(stmt, AssignOp::Assign, target)
            .unwrap();
        let row = build(self.t, stmt, pos);
        self.t.set_expr(stmt, vec![row]).unwrap();
        stmt
    }

    /// A bare expression statement.
    pub fn expr(
        &mut self,
        scope: NodeId,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        let pos = self.next_pos();
        let stmt = self.t.new_statement(scope, pos).unwrap();
        let row = build(self.t, stmt, pos);
        self.t.set_expr(stmt, vec![row]).unwrap();
        stmt
    }

    /// A statement with no expression rows at all; structurally broken.
    pub fn broken_stmt(&mut self, scope: NodeId) -> NodeId {
        let pos = self.next_pos();
        self.t.new_statement(scope, pos).unwrap()
    }

    /// A function; `*`/`**` prefixes on parameter names set their star kind.
    pub fn func(&mut self, scope: NodeId, name: &str, params: &[&str]) -> NodeId {
        let pos = self.next_pos();
        let f = self.t.new_function(scope, name, pos).unwrap();
        for p in params {
            let (pname, star) = if let Some(rest) = p.strip_prefix("**") {
                (rest, StarKind::KwArgs)
            } else if let Some(rest) = p.strip_prefix('*') {
                (rest, StarKind::Args)
            } else {
                (*p, StarKind::None)
            };
            self.t.new_param(f, pname, star, pos).unwrap();
        }
        f
    }

    pub fn param_default(
        &mut self,
        func: NodeId,
        index: usize,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) {
        let param = self.t.function(func).unwrap().params[index];
        let pos = self.next_pos();
        let row = build(self.t, param, pos);
        self.t.set_param_default(param, row).unwrap();
    }

    /// `return <row>` inside `func`.
    pub fn ret(
        &mut self,
        func: NodeId,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        self.ret_or_yield(func, false, build)
    }

    /// `yield <row>` inside `func`.
    pub fn yld(
        &mut self,
        func: NodeId,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        self.ret_or_yield(func, true, build)
    }

    fn ret_or_yield(
        &mut self,
        func: NodeId,
        is_yield: bool,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        let pos = self.next_pos();
        let stmt = self.t.new_statement(func, pos).unwrap();
        let row = build(self.t, stmt, pos);
        self.t.set_expr(stmt, vec![row]).unwrap();
        self.t.add_return(func, stmt, is_yield).unwrap();
        stmt
    }

    pub fn class(&mut self, scope: NodeId, name: &str) -> NodeId {
        let pos = self.next_pos();
        self.t.new_class(scope, name, pos).unwrap()
    }

    /// Register `base_name` as a superclass expression of `class`.
    pub fn base(&mut self, class: NodeId, base_name: &str) {
        let pos = self.next_pos();
        let stmt = self.t.new_detached_statement(class, pos).unwrap();
        let row = vec![nm(self.t, stmt, base_name, pos)];
        self.t.set_expr(stmt, vec![row]).unwrap();
        self.t.add_super(class, stmt).unwrap();
    }

    /// Attach `@deco_name` to `func`.
    pub fn deco(&mut self, func: NodeId, deco_name: &str) {
        let pos = self.next_pos();
        let stmt = self.t.new_detached_statement(func, pos).unwrap();
        let row = vec![nm(self.t, stmt, deco_name, pos)];
        self.t.set_expr(stmt, vec![row]).unwrap();
        self.t.add_decorator(func, stmt).unwrap();
    }

    /// Attach a decorator with an arbitrary expression row to `func`.
    pub fn deco_expr(
        &mut self,
        func: NodeId,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) {
        let pos = self.next_pos();
        let stmt = self.t.new_detached_statement(func, pos).unwrap();
        let row = build(self.t, stmt, pos);
        self.t.set_expr(stmt, vec![row]).unwrap();
        self.t.add_decorator(func, stmt).unwrap();
    }

    /// `for <target_name> in <row>:` attached to `scope`'s body.
    pub fn for_loop(
        &mut self,
        scope: NodeId,
        target_name: &str,
        build: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> NodeId {
        let pos = self.next_pos();
        let flow = self.t.new_flow(scope, FlowKind::For, pos).unwrap();
        let input = self.t.new_detached_statement(flow, pos).unwrap();
        let row = build(self.t, input, pos);
        self.t.set_expr(input, vec![row]).unwrap();
        self.t.set_flow_input(flow, input).unwrap();
        let target = self.t.new_name(&[target_name], pos, Some(flow));
        self.t.set_flow_target(flow, Target::Name(target)).unwrap();
        flow
    }

    /// `<expr> for <target_name> in <input>` as a comprehension token.
    pub fn comprehension(
        &mut self,
        parent: NodeId,
        target_name: &str,
        input: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
        element: impl FnOnce(&mut SyntaxTree, NodeId, Position) -> TokenSeq,
    ) -> Token {
        let pos = self.next_pos();
        let input_stmt = self.t.new_detached_statement(parent, pos).unwrap();
        let row = input(self.t, input_stmt, pos);
        self.t.set_expr(input_stmt, vec![row]).unwrap();
        let expr_stmt = self.t.new_detached_statement(parent, pos).unwrap();
        let row = element(self.t, expr_stmt, pos);
        self.t.set_expr(expr_stmt, vec![row]).unwrap();
        let target = self.t.new_name(&[target_name], pos, Some(parent));
        let comp = self
            .t
            .new_comprehension(parent, expr_stmt, Target::Name(target), input_stmt, pos);
        Token::Comprehension(comp)
    }
}

// ---- token constructors ---------------------------------------------------

/// A bare name reference.
pub fn nm(t: &mut SyntaxTree, parent: NodeId, name: &str, pos: Position) -> Token {
    Token::Call(t.new_call(parent, CallHead::Name(name.to_string()), vec![], pos))
}

/// A string literal.
pub fn s(t: &mut SyntaxTree, parent: NodeId, text: &str, pos: Position) -> Token {
    Token::Call(t.new_call(parent, CallHead::Str(text.to_string()), vec![], pos))
}

/// A number literal.
pub fn num(t: &mut SyntaxTree, parent: NodeId, text: &str, pos: Position) -> Token {
    Token::Call(t.new_call(parent, CallHead::Num(text.to_string()), vec![], pos))
}

pub fn args_node(
    t: &mut SyntaxTree,
    parent: NodeId,
    rows: Vec<TokenSeq>,
    pos: Position,
) -> NodeId {
    t.new_array(parent, ArrayKind::Arg, rows, vec![], pos)
}

/// `name(<rows>)`
pub fn call(
    t: &mut SyntaxTree,
    parent: NodeId,
    name: &str,
    rows: Vec<TokenSeq>,
    pos: Position,
) -> Token {
    let args = args_node(t, parent, rows, pos);
    Token::Call(t.new_call(
        parent,
        CallHead::Name(name.to_string()),
        vec![PathSeg::CallArgs(args)],
        pos,
    ))
}

/// `name.member`
pub fn attr(
    t: &mut SyntaxTree,
    parent: NodeId,
    name: &str,
    member: &str,
    pos: Position,
) -> Token {
    Token::Call(t.new_call(
        parent,
        CallHead::Name(name.to_string()),
        vec![PathSeg::Name(member.to_string())],
        pos,
    ))
}

/// `name(<rows>).member(<member_rows>)` style chains via explicit segments.
pub fn chain(
    t: &mut SyntaxTree,
    parent: NodeId,
    head: CallHead,
    path: Vec<PathSeg>,
    pos: Position,
) -> Token {
    Token::Call(t.new_call(parent, head, path, pos))
}

/// A literal collection token.
pub fn arr(
    t: &mut SyntaxTree,
    parent: NodeId,
    kind: ArrayKind,
    rows: Vec<TokenSeq>,
    pos: Position,
) -> Token {
    let node = t.new_array(parent, kind, rows, vec![], pos);
    Token::Call(t.new_call(parent, CallHead::Array(node), vec![], pos))
}

/// A literal mapping token.
pub fn dict(
    t: &mut SyntaxTree,
    parent: NodeId,
    keys: Vec<TokenSeq>,
    values: Vec<TokenSeq>,
    pos: Position,
) -> Token {
    let node = t.new_array(parent, ArrayKind::Dict, values, keys, pos);
    Token::Call(t.new_call(parent, CallHead::Array(node), vec![], pos))
}

/// `name[<idx_rows>]`
pub fn index_of(
    t: &mut SyntaxTree,
    parent: NodeId,
    name: &str,
    idx_rows: Vec<TokenSeq>,
    pos: Position,
) -> Token {
    let idx = args_node(t, parent, idx_rows, pos);
    Token::Call(t.new_call(
        parent,
        CallHead::Name(name.to_string()),
        vec![PathSeg::Index(idx)],
        pos,
    ))
}

// ---- assertions -----------------------------------------------------------

/// `(kind, name)` pairs of a description list, order as returned.
pub fn summarize(descs: &[Description]) -> Vec<(String, String)> {
    descs
        .iter()
        .map(|d| {
            (
                d.kind.to_string(),
                d.name.clone().unwrap_or_default(),
            )
        })
        .collect()
}

/// Assert that results are exactly instances of the given builtin types.
pub fn assert_instances(descs: &[Description], type_names: &[&str]) {
    let mut actual: Vec<(String, String)> = summarize(descs);
    actual.sort();
    let mut expected: Vec<(String, String)> = type_names
        .iter()
        .map(|n| ("instance".to_string(), n.to_string()))
        .collect();
    expected.sort();
    assert_eq!(actual, expected);
}
