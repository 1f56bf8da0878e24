// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The demand-driven expression pipeline.
//!
//! Statements evaluate to entity sets by resolving their access chains and
//! following each chain segment across every candidate. Nothing is computed
//! until a statement is demanded, and statement results are memoized with a
//! recursion placeholder so cyclic assignments terminate.

use crate::entity::{ArrayEntity, Entity, EntityId, EntitySet};
use crate::error::StructuralError;
use crate::scope::ScopeRef;
use crate::session::Session;
use crate::syntax::{
    ArrayKind, CallHead, Node, NodeId, NodeKind, NodeStore, PathSeg, Target, Token,
};

use anyhow::Result;

impl<'e> Session<'e> {
    /// Evaluate a statement's right side. `seek` names the variable being
    /// resolved, which drives tuple destructuring of multi-target
    /// assignments.
    pub(crate) fn eval_statement(
        &mut self,
        stmt: NodeId,
        seek: Option<&str>,
    ) -> Result<EntitySet> {
        let key = (stmt, seek.map(str::to_string));
        if let Some(cached) = self.stmt_cache.get(&key) {
            return Ok(cached.clone());
        }
        // Recursive demands of the same statement observe "undetermined".
        self.stmt_cache.insert(key.clone(), EntitySet::new());
        self.trace_push(stmt);

        let node = self.statement(stmt)?.clone();
        let rows = node
            .expr
            .ok_or(StructuralError::MissingCallList { node: stmt })?;
        let mut results = self.eval_token_rows(&rows)?;

        if let Some(seek) = seek {
            for (_, target) in &node.assignments {
                let names = target.names();
                if names.len() > 1 && self.target_binds(target, seek)? {
                    results = self.destructure(target, &results, seek)?;
                    break;
                }
            }
        }

        self.stmt_cache.insert(key, results.clone());
        Ok(results)
    }

    pub(crate) fn eval_token_rows(&mut self, rows: &[Vec<Token>]) -> Result<EntitySet> {
        let mut out = EntitySet::new();
        for row in rows {
            out.extend(self.eval_token_seq(row)?);
        }
        Ok(out)
    }

    /// Union of the operands of one expression row. Operators are
    /// transparent; a conditional expression contributes only its leading
    /// branch.
    pub(crate) fn eval_token_seq(&mut self, seq: &[Token]) -> Result<EntitySet> {
        let mut out = EntitySet::new();
        for token in seq {
            match token {
                Token::Operator(op) if op == "if" => break,
                Token::Operator(_) => {}
                Token::Call(call) => out.extend(self.follow_call(*call)?),
                Token::Comprehension(comp) => {
                    out.extend(self.lower_comprehension(*comp)?);
                }
                Token::Entity(e) => {
                    out.insert(*e);
                }
            }
        }
        Ok(out)
    }

    /// Resolve an access chain: the head against the surrounding scope, then
    /// every trailing segment across all candidates.
    pub(crate) fn follow_call(&mut self, call: NodeId) -> Result<EntitySet> {
        let (head, path) = match self.kind(call)? {
            NodeKind::Call(c) => (c.head.clone(), c.path.clone()),
            k => {
                return Err(StructuralError::UnexpectedKind {
                    node: call,
                    expected: "call",
                    found: k.kind_name(),
                }
                .into())
            }
        };
        let pos = match self.parent_statement(call)? {
            Some(stmt) => self.position(stmt)?,
            None => self.position(call)?,
        };

        let heads = match head {
            CallHead::Name(name) => {
                // The chain walk starts at the call itself so loop levels
                // between it and the enclosing scope contribute.
                let found = self.find_name(ScopeRef::Node(call), &name, Some(pos), true)?;
                let imports = self.imports;
                imports.strip_aliases(found)
            }
            CallHead::Str(text) => self.literal_instance("str", Some(&text))?,
            CallHead::Num(text) => {
                let type_name = if text.contains(['.', 'e', 'E']) {
                    "float"
                } else {
                    "int"
                };
                self.literal_instance(type_name, Some(&text))?
            }
            CallHead::Array(array) => {
                let arr = self.array(array)?.clone();
                if arr.kind == ArrayKind::Group {
                    self.eval_token_rows(&arr.values)?
                } else {
                    let (id, _) = self.intern(Entity::Array(ArrayEntity { node: array }));
                    EntitySet::from([id])
                }
            }
        };
        self.follow_path(&path, heads)
    }

    fn follow_path(&mut self, path: &[PathSeg], heads: EntitySet) -> Result<EntitySet> {
        let mut current = heads;
        for seg in path {
            let mut next = EntitySet::new();
            for ent in current.iter().copied().collect::<Vec<_>>() {
                match seg {
                    PathSeg::Name(name) => next.extend(self.resolve_member(ent, name)?),
                    PathSeg::CallArgs(args) => {
                        let (exec, _) = self.intern(Entity::Execution(
                            crate::entity::ExecutionEntity {
                                callee: ent,
                                args: Some(*args),
                            },
                        ));
                        next.extend(self.execution_returns(exec, false)?);
                    }
                    PathSeg::Index(index) => next.extend(self.index_types(ent, Some(*index))?),
                }
            }
            current = next;
        }
        Ok(current)
    }

    /// Attribute access on an entity. Executions and bound members
    /// dereference first; literal collections resolve against the builtin
    /// type of their kind.
    pub(crate) fn resolve_member(&mut self, ent: EntityId, name: &str) -> Result<EntitySet> {
        match self.entity(ent)?.clone() {
            Entity::Execution(_) => {
                let mut out = EntitySet::new();
                for ret in self.execution_returns(ent, false)? {
                    out.extend(self.resolve_member(ret, name)?);
                }
                Ok(out)
            }
            Entity::InstanceElement(el) => self.resolve_member(el.member, name),
            Entity::Array(a) => {
                let type_name = self.array(a.node)?.kind.type_name();
                match self.builtin_instance(type_name)? {
                    Some(inst) => self.find_name(ScopeRef::Entity(inst), name, None, false),
                    None => Ok(EntitySet::new()),
                }
            }
            _ => self.find_name(ScopeRef::Entity(ent), name, None, false),
        }
    }

    /// An instance of a builtin stub class, without arguments.
    pub(crate) fn builtin_instance(&mut self, type_name: &str) -> Result<Option<EntityId>> {
        let class_node = match self.builtins.lookup(type_name) {
            Some(n) => n,
            None => {
                log::warn!("no builtin stub for type {type_name}");
                return Ok(None);
            }
        };
        let (class, _) = self.intern(Entity::Class(crate::entity::ClassEntity {
            node: class_node,
        }));
        Ok(Some(self.instance(class, None, None)?))
    }

    fn literal_instance(&mut self, type_name: &str, literal: Option<&str>) -> Result<EntitySet> {
        let class_node = match self.builtins.lookup(type_name) {
            Some(n) => n,
            None => {
                log::warn!("no builtin stub for literal type {type_name}");
                return Ok(EntitySet::new());
            }
        };
        let (class, _) = self.intern(Entity::Class(crate::entity::ClassEntity {
            node: class_node,
        }));
        let inst = self.instance(class, None, literal.map(str::to_string))?;
        Ok(EntitySet::from([inst]))
    }

    /// Subscript on an entity.
    pub(crate) fn index_types(
        &mut self,
        ent: EntityId,
        index: Option<NodeId>,
    ) -> Result<EntitySet> {
        match self.entity(ent)?.clone() {
            Entity::Array(a) => self.array_index_types(a.node, index),
            Entity::InstanceElement(el) => self.index_types(el.member, index),
            Entity::Instance(_) => {
                if self.is_container_instance(ent)? {
                    let usage = self.usage;
                    return Ok(usage.infer_container_elements(self, ent));
                }
                let args = index;
                Ok(self
                    .instance_execute_member(ent, "__getitem__", args)?
                    .unwrap_or_default())
            }
            e => {
                log::warn!("{} is not subscriptable", e.kind_name());
                Ok(EntitySet::new())
            }
        }
    }

    /// Element types produced by iterating an entity.
    pub(crate) fn iterated_types(&mut self, ent: EntityId) -> Result<EntitySet> {
        match self.entity(ent)?.clone() {
            Entity::Array(a) => self.array_index_types(a.node, None),
            Entity::Generator(_) => self.generator_content(ent),
            Entity::InstanceElement(el) => self.iterated_types(el.member),
            Entity::Instance(_) => {
                if self.is_container_instance(ent)? {
                    let usage = self.usage;
                    return Ok(usage.infer_container_elements(self, ent));
                }
                match self.instance_execute_member(ent, "__iter__", None)? {
                    Some(iterators) => {
                        let mut out = EntitySet::new();
                        for it in iterators {
                            out.extend(self.iterator_next(it)?);
                        }
                        Ok(out)
                    }
                    None => {
                        log::warn!("instance {ent:?} is not iterable");
                        Ok(EntitySet::new())
                    }
                }
            }
            e => {
                log::warn!("{} is not iterable", e.kind_name());
                Ok(EntitySet::new())
            }
        }
    }

    /// One step of an iterator returned by `__iter__`.
    fn iterator_next(&mut self, iterator: EntityId) -> Result<EntitySet> {
        match self.entity(iterator)?.clone() {
            Entity::Generator(_) => self.generator_content(iterator),
            Entity::Array(a) => self.array_index_types(a.node, None),
            Entity::Instance(_) => {
                for method in ["__next__", "next"] {
                    if let Some(r) = self.instance_execute_member(iterator, method, None)? {
                        return Ok(r);
                    }
                }
                Ok(EntitySet::new())
            }
            _ => Ok(EntitySet::new()),
        }
    }

    /// Loop-input elements: a comprehension input already denotes its
    /// elements, anything else evaluates and iterates.
    pub(crate) fn loop_input_elements(&mut self, input: NodeId) -> Result<EntitySet> {
        if let Some(rows) = &self.statement(input)?.expr {
            if rows.len() == 1 && rows[0].len() == 1 {
                if let Token::Comprehension(comp) = rows[0][0] {
                    return self.lower_comprehension(comp);
                }
            }
        }
        let mut out = EntitySet::new();
        for source in self.eval_statement(input, None)? {
            out.extend(self.iterated_types(source)?);
        }
        Ok(out)
    }

    /// Whether `target` (or a nested part of it) binds `seek`.
    pub(crate) fn target_binds(&self, target: &Target, seek: &str) -> Result<bool> {
        for name in target.names() {
            if self.name_node(name)?.final_segment() == seek {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Restrict `values` to the ones a tuple assignment binds to `seek`.
    pub(crate) fn destructure(
        &mut self,
        target: &Target,
        values: &EntitySet,
        seek: &str,
    ) -> Result<EntitySet> {
        match target {
            Target::Name(name) => {
                if self.name_node(*name)?.final_segment() == seek {
                    Ok(values.clone())
                } else {
                    Ok(EntitySet::new())
                }
            }
            Target::Group(inner) => self.destructure(inner, values, seek),
            Target::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !self.target_binds(item, seek)? {
                        continue;
                    }
                    let mut elements = EntitySet::new();
                    for value in values.iter().copied().collect::<Vec<_>>() {
                        if let Entity::Array(a) = self.entity(value)? {
                            let node = a.node;
                            elements.extend(self.array_exact_index(node, i)?);
                        }
                    }
                    return self.destructure(item, &elements, seek);
                }
                Ok(EntitySet::new())
            }
        }
    }

    /// Evaluate one positional element of a literal collection. Positions
    /// past the end contribute nothing.
    pub(crate) fn array_exact_index(&mut self, array: NodeId, index: usize) -> Result<EntitySet> {
        let values = self.array(array)?.values.clone();
        match values.get(index) {
            Some(row) => {
                let row = row.clone();
                self.eval_token_seq(&row)
            }
            None => Ok(EntitySet::new()),
        }
    }

    /// Subscript into a literal collection: exact element for a literal
    /// index, exact mapping value for a matching literal key, otherwise the
    /// union of all elements plus mined mutations.
    pub(crate) fn array_index_types(
        &mut self,
        array: NodeId,
        index: Option<NodeId>,
    ) -> Result<EntitySet> {
        let arr = self.array(array)?.clone();

        if let Some(index) = index {
            let idx = self.array(index)?.clone();
            let is_slice = idx
                .values
                .iter()
                .any(|row| row.iter().any(|t| t.is_op(":")));
            if !is_slice && idx.values.len() == 1 {
                let row = idx.values[0].clone();
                let idx_results = self.eval_token_seq(&row)?;
                if idx_results.len() == 1 {
                    let only = idx_results
                        .iter()
                        .next()
                        .copied()
                        .ok_or_else(|| anyhow::anyhow!("internal error: empty singleton set"))?;
                    if let Some(exact) = self.exact_lookup(&arr, array, only)? {
                        return Ok(exact);
                    }
                }
            }
        }

        let mut out = self.eval_token_rows(&arr.values)?;
        let usage = self.usage;
        out.extend(usage.infer_mutations(self, array));
        Ok(out)
    }

    /// Exact element lookup for a single literal index entity, if it
    /// applies.
    fn exact_lookup(
        &mut self,
        arr: &crate::syntax::ArrayNode,
        array: NodeId,
        index_ent: EntityId,
    ) -> Result<Option<EntitySet>> {
        let (index_class, literal) = match self.entity(index_ent)? {
            Entity::Instance(i) => match &i.literal {
                Some(lit) => (i.class, lit.clone()),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        if arr.kind == ArrayKind::Dict {
            for (i, key_row) in arr.keys.iter().enumerate() {
                let keys = self.eval_token_seq(key_row)?;
                for key in keys {
                    if let Entity::Instance(k) = self.entity(key)? {
                        if k.class == index_class && k.literal.as_deref() == Some(&literal) {
                            return Ok(Some(self.array_exact_index(array, i)?));
                        }
                    }
                }
            }
            return Ok(None);
        }
        // Sequence positions are only exact for int subscripts; a literal
        // such as `"1"` on a list keeps the unioned fallback.
        let int_index = match self.entity(index_class)? {
            Entity::Class(c) => self.builtins.lookup("int") == Some(c.node),
            _ => false,
        };
        if !int_index {
            return Ok(None);
        }
        match literal.parse::<usize>() {
            Ok(i) if i < arr.values.len() => Ok(Some(self.array_exact_index(array, i)?)),
            _ => Ok(None),
        }
    }

    /// Evaluate a comprehension by lowering it to a synthetic loop: the
    /// element statement is cloned under a one-level `for` scope exposing
    /// the comprehension variable.
    fn lower_comprehension(&mut self, comp: NodeId) -> Result<EntitySet> {
        let (expr_stmt, target, input, pos, parent) = {
            let node = self.node(comp)?;
            let pos = node.pos;
            let parent = node.parent;
            match &node.kind {
                NodeKind::Comprehension(c) => {
                    (c.expr_stmt, c.target.clone(), c.input, pos, parent)
                }
                k => {
                    return Err(StructuralError::UnexpectedKind {
                        node: comp,
                        expected: "comprehension",
                        found: k.kind_name(),
                    }
                    .into())
                }
            }
        };
        let flow = self.alloc_scratch(Node {
            kind: NodeKind::Flow(crate::syntax::FlowNode {
                kind: crate::syntax::FlowKind::For,
                inputs: vec![input],
                target: Some(target),
                statements: vec![],
                subscopes: vec![],
                is_comprehension: true,
            }),
            pos,
            parent,
        });
        let element = self.clone_subtree(expr_stmt, Some(flow))?;
        if let NodeKind::Flow(f) = &mut self.scratch_node_mut(flow)?.kind {
            f.statements.push(element);
        }
        self.eval_statement(element, None)
    }

    pub(crate) fn is_container_instance(&mut self, ent: EntityId) -> Result<bool> {
        let class = match self.entity(ent)? {
            Entity::Instance(i) => i.class,
            _ => return Ok(false),
        };
        let node = match self.entity(class)? {
            Entity::Class(c) => c.node,
            _ => return Ok(false),
        };
        if !self.scope_is_builtin(node)? {
            return Ok(false);
        }
        let name = self.scope_name(node)?;
        Ok(crate::builtins::CONTAINER_TYPES.contains(&name.as_str()))
    }
}
