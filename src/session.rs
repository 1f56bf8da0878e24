// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-request evaluation context.
//!
//! Every cache, recursion guard, structural clone and entity wrapper created
//! while answering one inference request lives here. Dropping the session is
//! the reset between requests; nothing leaks across, only the engine's
//! syntax tree and builtin registry persist.

use crate::builtins::Builtins;
use crate::entity::{Entity, EntityId, EntityKey, EntitySet};
use crate::error::StructuralError;
use crate::hooks::{ImportResolver, UsageMiner};
use crate::scope::NameDef;
use crate::syntax::{Node, NodeId, NodeKind, NodeStore, SyntaxTree, Target, Token, TokenSeq};

use std::collections::HashMap;

use anyhow::{anyhow, Result};

/// Guard limits for the mutually recursive evaluation loop.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum simultaneous executions of the same callable. Hitting the
    /// limit aborts that branch with an empty result.
    pub max_callee_depth: u32,
    /// Maximum executions per request, across all callables.
    pub max_executions: u32,
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_callee_depth: 10,
            max_executions: 300,
        }
    }
}

/// One inference request's evaluation state.
///
/// The session overlays a scratch arena on the engine's syntax tree: node ids
/// below the base length resolve into the shared tree, ids above it into
/// session-owned clones. Source nodes are never written; attempting to is a
/// structural error.
pub struct Session<'e> {
    pub(crate) tree: &'e SyntaxTree,
    pub(crate) builtins: &'e Builtins,
    pub(crate) imports: &'e dyn ImportResolver,
    pub(crate) usage: &'e dyn UsageMiner,
    pub(crate) limits: Limits,

    base_len: usize,
    scratch: Vec<Node>,

    entities: Vec<Entity>,
    interned: HashMap<EntityKey, EntityId>,

    // Memoization with recursion placeholders: an empty result is stored
    // before recursing, so cyclic demands observe "undetermined" instead of
    // diverging, and the real result overwrites it afterwards.
    pub(crate) stmt_cache: HashMap<(NodeId, Option<String>), EntitySet>,
    pub(crate) returns_cache: HashMap<(EntityId, bool), EntitySet>,
    pub(crate) supers_cache: HashMap<EntityId, Vec<EntityId>>,
    pub(crate) class_names_cache: HashMap<EntityId, Vec<NameDef>>,
    pub(crate) self_props_cache: HashMap<EntityId, Vec<NameDef>>,
    pub(crate) decorated_cache: HashMap<NodeId, Option<EntityId>>,
    /// Execution entity -> its cloned function scope.
    pub(crate) exec_clones: HashMap<EntityId, NodeId>,
    /// Instance -> the execution that simulated its initializer.
    pub(crate) init_execs: HashMap<EntityId, EntityId>,

    exec_depth: HashMap<NodeId, u32>,
    exec_count: u32,

    /// Most recently visited statements and parameters, nearest first used
    /// for definition lookup.
    pub(crate) trace: Vec<NodeId>,
}

impl<'e> NodeStore for Session<'e> {
    fn node(&self, id: NodeId) -> Result<&Node> {
        if id.index() < self.base_len {
            self.tree.node(id)
        } else {
            self.scratch
                .get(id.index() - self.base_len)
                .ok_or_else(|| StructuralError::DanglingNode { node: id }.into())
        }
    }
}

impl<'e> Session<'e> {
    pub fn new(
        tree: &'e SyntaxTree,
        builtins: &'e Builtins,
        imports: &'e dyn ImportResolver,
        usage: &'e dyn UsageMiner,
        limits: Limits,
    ) -> Session<'e> {
        Session {
            tree,
            builtins,
            imports,
            usage,
            limits,
            base_len: tree.len(),
            scratch: vec![],
            entities: vec![],
            interned: HashMap::new(),
            stmt_cache: HashMap::new(),
            returns_cache: HashMap::new(),
            supers_cache: HashMap::new(),
            class_names_cache: HashMap::new(),
            self_props_cache: HashMap::new(),
            decorated_cache: HashMap::new(),
            exec_clones: HashMap::new(),
            init_execs: HashMap::new(),
            exec_depth: HashMap::new(),
            exec_count: 0,
            trace: vec![],
        }
    }

    // ---- scratch arena ----------------------------------------------------

    pub(crate) fn is_scratch(&self, id: NodeId) -> bool {
        id.index() >= self.base_len
    }

    pub(crate) fn alloc_scratch(&mut self, node: Node) -> NodeId {
        let id = NodeId((self.base_len + self.scratch.len()) as u32);
        self.scratch.push(node);
        id
    }

    /// Mutable access to a session clone. Source nodes stay immutable.
    pub(crate) fn scratch_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        if id.index() < self.base_len {
            return Err(StructuralError::SourceMutation { node: id }.into());
        }
        self.scratch
            .get_mut(id.index() - self.base_len)
            .ok_or_else(|| StructuralError::DanglingNode { node: id }.into())
    }

    /// Structurally clone a subtree into the scratch arena, re-parenting the
    /// root to `new_parent`. Shared references inside the subtree (a return
    /// statement listed both in a body and in the returns list) clone once.
    pub(crate) fn clone_subtree(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<NodeId> {
        let mut map = HashMap::new();
        self.clone_node_rec(id, new_parent, &mut map)
    }

    fn clone_node_rec(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        if let Some(done) = map.get(&id) {
            return Ok(*done);
        }
        let original = self.node(id)?.clone();
        let new_id = self.alloc_scratch(Node {
            kind: original.kind.clone(),
            pos: original.pos,
            parent: new_parent,
        });
        map.insert(id, new_id);

        let kind = match original.kind {
            NodeKind::Module(mut m) => {
                m.statements = self.clone_ids(&m.statements, new_id, map)?;
                m.subscopes = self.clone_ids(&m.subscopes, new_id, map)?;
                m.imports = self.clone_ids(&m.imports, new_id, map)?;
                NodeKind::Module(m)
            }
            NodeKind::Class(mut c) => {
                c.supers = self.clone_ids(&c.supers, new_id, map)?;
                c.statements = self.clone_ids(&c.statements, new_id, map)?;
                c.subscopes = self.clone_ids(&c.subscopes, new_id, map)?;
                NodeKind::Class(c)
            }
            NodeKind::Function(mut f) => {
                f.params = self.clone_ids(&f.params, new_id, map)?;
                f.decorators = self.clone_ids(&f.decorators, new_id, map)?;
                f.statements = self.clone_ids(&f.statements, new_id, map)?;
                f.subscopes = self.clone_ids(&f.subscopes, new_id, map)?;
                f.returns = self.clone_ids(&f.returns, new_id, map)?;
                NodeKind::Function(f)
            }
            NodeKind::Statement(mut s) => {
                for (_, target) in s.assignments.iter_mut() {
                    *target = self.clone_target(target, new_id, map)?;
                }
                if let Some(rows) = s.expr.take() {
                    let mut cloned = vec![];
                    for row in &rows {
                        cloned.push(self.clone_tokens(row, new_id, map)?);
                    }
                    s.expr = Some(cloned);
                }
                NodeKind::Statement(s)
            }
            NodeKind::Param(mut p) => {
                p.name = self.clone_node_rec(p.name, Some(new_id), map)?;
                if let Some(default) = p.default.take() {
                    p.default = Some(self.clone_tokens(&default, new_id, map)?);
                }
                NodeKind::Param(p)
            }
            NodeKind::Name(n) => NodeKind::Name(n),
            NodeKind::Call(mut c) => {
                if let crate::syntax::CallHead::Array(a) = &mut c.head {
                    *a = self.clone_node_rec(*a, Some(new_id), map)?;
                }
                for seg in c.path.iter_mut() {
                    match seg {
                        crate::syntax::PathSeg::CallArgs(a)
                        | crate::syntax::PathSeg::Index(a) => {
                            *a = self.clone_node_rec(*a, Some(new_id), map)?;
                        }
                        crate::syntax::PathSeg::Name(_) => {}
                    }
                }
                NodeKind::Call(c)
            }
            NodeKind::Array(mut a) => {
                let mut values = vec![];
                for row in &a.values {
                    values.push(self.clone_tokens(row, new_id, map)?);
                }
                let mut keys = vec![];
                for row in &a.keys {
                    keys.push(self.clone_tokens(row, new_id, map)?);
                }
                a.values = values;
                a.keys = keys;
                NodeKind::Array(a)
            }
            NodeKind::Flow(mut f) => {
                f.inputs = self.clone_ids(&f.inputs, new_id, map)?;
                if let Some(target) = f.target.take() {
                    f.target = Some(self.clone_target(&target, new_id, map)?);
                }
                f.statements = self.clone_ids(&f.statements, new_id, map)?;
                f.subscopes = self.clone_ids(&f.subscopes, new_id, map)?;
                NodeKind::Flow(f)
            }
            NodeKind::Comprehension(mut c) => {
                c.expr_stmt = self.clone_node_rec(c.expr_stmt, Some(new_id), map)?;
                c.target = self.clone_target(&c.target, new_id, map)?;
                c.input = self.clone_node_rec(c.input, Some(new_id), map)?;
                NodeKind::Comprehension(c)
            }
            NodeKind::Import(mut i) => {
                i.names = self.clone_ids(&i.names, new_id, map)?;
                NodeKind::Import(i)
            }
        };
        self.scratch_node_mut(new_id)?.kind = kind;
        Ok(new_id)
    }

    fn clone_ids(
        &mut self,
        ids: &[NodeId],
        parent: NodeId,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Result<Vec<NodeId>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.clone_node_rec(*id, Some(parent), map)?);
        }
        Ok(out)
    }

    pub(crate) fn clone_tokens(
        &mut self,
        seq: &TokenSeq,
        parent: NodeId,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Result<TokenSeq> {
        let mut out = Vec::with_capacity(seq.len());
        for token in seq {
            out.push(match token {
                Token::Operator(o) => Token::Operator(o.clone()),
                Token::Call(c) => Token::Call(self.clone_node_rec(*c, Some(parent), map)?),
                Token::Comprehension(c) => {
                    Token::Comprehension(self.clone_node_rec(*c, Some(parent), map)?)
                }
                Token::Entity(e) => Token::Entity(*e),
            });
        }
        Ok(out)
    }

    fn clone_target(
        &mut self,
        target: &Target,
        parent: NodeId,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Result<Target> {
        Ok(match target {
            Target::Name(n) => Target::Name(self.clone_node_rec(*n, Some(parent), map)?),
            Target::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for t in items {
                    out.push(self.clone_target(t, parent, map)?);
                }
                Target::Tuple(out)
            }
            Target::Group(t) => Target::Group(Box::new(self.clone_target(t, parent, map)?)),
        })
    }

    /// A synthetic argument array holding pre-built token rows.
    pub(crate) fn synthesize_args(&mut self, parent: NodeId, rows: Vec<TokenSeq>) -> NodeId {
        let pos = self
            .node(parent)
            .map(|n| n.pos)
            .unwrap_or(crate::syntax::Position::ZERO);
        self.alloc_scratch(Node {
            kind: NodeKind::Array(crate::syntax::ArrayNode {
                kind: crate::syntax::ArrayKind::Arg,
                values: rows,
                keys: vec![],
            }),
            pos,
            parent: Some(parent),
        })
    }

    // ---- entities ---------------------------------------------------------

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(id.index())
            .ok_or_else(|| anyhow!("internal error: entity {:?} not in this session", id))
    }

    /// Intern an entity: identical constructor arguments return the cached
    /// id. The second value is true when the entity was created just now.
    pub(crate) fn intern(&mut self, entity: Entity) -> (EntityId, bool) {
        let key = entity.key();
        if let Some(id) = self.interned.get(&key) {
            return (*id, false);
        }
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        self.interned.insert(key, id);
        (id, true)
    }

    // ---- recursion guard --------------------------------------------------

    /// Enter one execution of `callee`. Returns false when a guard tripped;
    /// the caller degrades to an empty result without calling
    /// [`Session::leave_execution`].
    pub(crate) fn enter_execution(&mut self, callee: NodeId) -> bool {
        if self.exec_count >= self.limits.max_executions {
            log::warn!("execution budget exhausted, aborting branch");
            return false;
        }
        let depth = self.exec_depth.entry(callee).or_insert(0);
        if *depth >= self.limits.max_callee_depth {
            log::debug!("recursion limit for callee {:?}, aborting branch", callee);
            return false;
        }
        *depth += 1;
        self.exec_count += 1;
        true
    }

    pub(crate) fn leave_execution(&mut self, callee: NodeId) {
        if let Some(depth) = self.exec_depth.get_mut(&callee) {
            *depth = depth.saturating_sub(1);
        }
    }

    /// Record a visited definition for later `goto` lookups.
    pub(crate) fn trace_push(&mut self, node: NodeId) {
        self.trace.push(node);
    }

    /// The statements and parameters visited during this request, in visit
    /// order.
    pub fn visited(&self) -> &[NodeId] {
        &self.trace
    }
}
