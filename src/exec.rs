// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Call execution.
//!
//! Calling an entity dispatches on its kind: classes construct instances,
//! functions clone their scope and bind call-site arguments, instances route
//! through `__call__`, generator functions defer to a lazy generator wrapper.
//! Nothing inside a function body runs eagerly; the bound clone is evaluated
//! statement by statement when its names are demanded.

use crate::entity::{
    Arguments, ClassEntity, Entity, EntityId, EntitySet, ExecutionEntity, FunctionEntity,
    GeneratorEntity, InstanceElementEntity, InstanceEntity,
};
use crate::scope::{DefSite, NameDef};
use crate::session::Session;
use crate::syntax::{
    BoundArgs, BoundKind, CallHead, NodeId, NodeKind, NodeStore, StarKind, Token, TokenSeq,
};

use std::collections::{HashSet, VecDeque};

use anyhow::Result;

impl<'e> Session<'e> {
    /// Construct (or revisit) an instance of `class`. A fresh instance built
    /// with arguments simulates its initializer once, so `self.x`
    /// assignments see the call-site parameter types. Builtin container
    /// instances skip the simulation; their elements come from usage mining.
    pub(crate) fn instance(
        &mut self,
        class: EntityId,
        args: Arguments,
        literal: Option<String>,
    ) -> Result<EntityId> {
        let (id, created) = self.intern(Entity::Instance(InstanceEntity {
            class,
            args,
            literal,
        }));
        if created && args.is_some() && !self.is_container_instance(id)? {
            if let Some(exec) = self.member_execution(id, "__init__", args)? {
                self.init_execs.insert(id, exec);
                let _ = self.execution_returns(exec, false)?;
            }
        }
        Ok(id)
    }

    /// The result types of one execution. `force` runs a generator
    /// function's body instead of wrapping it lazily.
    pub(crate) fn execution_returns(&mut self, exec: EntityId, force: bool) -> Result<EntitySet> {
        let key = (exec, force);
        if let Some(cached) = self.returns_cache.get(&key) {
            return Ok(cached.clone());
        }
        self.returns_cache.insert(key, EntitySet::new());

        let (callee, args) = match self.entity(exec)? {
            Entity::Execution(e) => (e.callee, e.args),
            e => {
                return Err(anyhow::anyhow!(
                    "internal error: execution requested of a {}",
                    e.kind_name()
                ))
            }
        };
        let results = self.dispatch_execution(exec, callee, args, force)?;
        let imports = self.imports;
        let results = imports.strip_aliases(results);

        self.returns_cache.insert(key, results.clone());
        Ok(results)
    }

    fn dispatch_execution(
        &mut self,
        exec: EntityId,
        callee: EntityId,
        args: Arguments,
        force: bool,
    ) -> Result<EntitySet> {
        match self.entity(callee)?.clone() {
            Entity::Function(f) => {
                if self.scope_is_builtin(f.node)? && self.function(f.node)?.name == "getattr" {
                    return self.getattr_builtin(args);
                }
                self.function_returns(exec, callee, f.node, None, args, force)
            }
            Entity::InstanceElement(el) => match self.entity(el.member)?.clone() {
                Entity::Function(f) => {
                    self.function_returns(exec, callee, f.node, Some(el.instance), args, force)
                }
                Entity::Class(_) => {
                    let inst = self.instance(el.member, args, None)?;
                    Ok(EntitySet::from([inst]))
                }
                e => {
                    log::warn!("bound {} is not callable", e.kind_name());
                    Ok(EntitySet::new())
                }
            },
            Entity::Class(_) => {
                let inst = self.instance(callee, args, None)?;
                Ok(EntitySet::from([inst]))
            }
            Entity::Instance(_) => {
                match self.instance_execute_member(callee, "__call__", args)? {
                    Some(r) => Ok(r),
                    None => {
                        log::warn!("instance {callee:?} is not callable");
                        Ok(EntitySet::new())
                    }
                }
            }
            Entity::Generator(_) => self.generator_content(callee),
            e => {
                log::warn!("a {} is not callable", e.kind_name());
                Ok(EntitySet::new())
            }
        }
    }

    fn function_returns(
        &mut self,
        exec: EntityId,
        callee: EntityId,
        fn_node: NodeId,
        receiver: Option<EntityId>,
        args: Arguments,
        force: bool,
    ) -> Result<EntitySet> {
        if self.function(fn_node)?.is_generator && !force {
            let (gen, _) = self.intern(Entity::Generator(GeneratorEntity {
                function: callee,
                args,
            }));
            return Ok(EntitySet::from([gen]));
        }
        if !self.enter_execution(fn_node) {
            return Ok(EntitySet::new());
        }
        let result = self.function_body_returns(exec, fn_node, receiver, args);
        self.leave_execution(fn_node);
        result
    }

    fn function_body_returns(
        &mut self,
        exec: EntityId,
        fn_node: NodeId,
        receiver: Option<EntityId>,
        args: Arguments,
    ) -> Result<EntitySet> {
        let (clone_fn, created) = self.ensure_execution_clone(exec, fn_node)?;
        if created {
            self.bind_execution_params(clone_fn, receiver, args)?;
        }
        let cloned = self.function(clone_fn)?.clone();
        let usage = self.usage;
        usage.on_call(self, fn_node, &cloned.params);

        let mut out = EntitySet::new();
        for ret in cloned.returns {
            out.extend(self.eval_statement(ret, None)?);
        }
        Ok(out)
    }

    /// The per-execution structural clone of a function scope.
    fn ensure_execution_clone(
        &mut self,
        exec: EntityId,
        fn_node: NodeId,
    ) -> Result<(NodeId, bool)> {
        if let Some(existing) = self.exec_clones.get(&exec) {
            return Ok((*existing, false));
        }
        let parent = self.parent(fn_node)?;
        let clone = self.clone_subtree(fn_node, parent)?;
        if let NodeKind::Function(f) = &mut self.scratch_node_mut(clone)?.kind {
            f.execution = Some(exec);
        }
        self.exec_clones.insert(exec, clone);
        Ok((clone, true))
    }

    /// Bind call-site argument rows onto the cloned parameters. Unmatched
    /// parameters keep no binding and fall back to defaults and mined types.
    fn bind_execution_params(
        &mut self,
        clone_fn: NodeId,
        receiver: Option<EntityId>,
        args: Arguments,
    ) -> Result<()> {
        let (mut positional, mut keywords) = self.split_arguments(args)?;
        let params = self.function(clone_fn)?.params.clone();

        let mut params = params.into_iter();
        if let Some(recv) = receiver {
            if let Some(p0) = params.next() {
                self.set_binding(
                    p0,
                    BoundArgs {
                        kind: BoundKind::Single,
                        values: vec![vec![Token::Entity(recv)]],
                        keys: vec![],
                    },
                )?;
            }
        }

        let mut keys_only = false;
        for param in params {
            let p = self.param(param)?.clone();
            let pname = self.name_node(p.name)?.final_segment().to_string();
            let binding = match p.star {
                StarKind::Args => Some(BoundArgs {
                    kind: BoundKind::Tuple,
                    values: positional.drain(..).collect(),
                    keys: vec![],
                }),
                StarKind::KwArgs => {
                    let mut values = vec![];
                    let mut keys = vec![];
                    for (key, value) in keywords.drain(..) {
                        if let Some(lit) = self.string_literal(&key)? {
                            keys.push(vec![Token::Entity(lit)]);
                            values.push(value);
                        }
                    }
                    Some(BoundArgs {
                        kind: BoundKind::Dict,
                        values,
                        keys,
                    })
                }
                StarKind::None => {
                    if let Some(found) = keywords.iter().position(|(k, _)| k == &pname) {
                        keys_only = true;
                        let (_, value) = keywords.remove(found);
                        Some(BoundArgs {
                            kind: BoundKind::Single,
                            values: vec![value],
                            keys: vec![],
                        })
                    } else if !keys_only {
                        positional.pop_front().map(|value| BoundArgs {
                            kind: BoundKind::Single,
                            values: vec![value],
                            keys: vec![],
                        })
                    } else {
                        None
                    }
                }
            };
            if let Some(binding) = binding {
                self.set_binding(param, binding)?;
            }
        }
        Ok(())
    }

    /// Split an argument array into positional rows and keyword rows,
    /// expanding `*`/`**` spreads of literal collections.
    fn split_arguments(
        &mut self,
        args: Arguments,
    ) -> Result<(VecDeque<TokenSeq>, Vec<(String, TokenSeq)>)> {
        let mut positional = VecDeque::new();
        let mut keywords = vec![];
        let rows = match args {
            Some(arr) => self.array(arr)?.values.clone(),
            None => return Ok((positional, keywords)),
        };
        for row in rows {
            if let Some(key) = self.keyword_of(&row)? {
                keywords.push((key, row[2..].to_vec()));
                continue;
            }
            match row.first() {
                Some(t) if t.is_op("*") => {
                    let spread = row[1..].to_vec();
                    for ent in self.eval_token_seq(&spread)? {
                        match self.entity(ent)? {
                            Entity::Array(a) => {
                                for value in self.array(a.node)?.values.clone() {
                                    positional.push_back(value);
                                }
                            }
                            e => log::warn!("cannot spread a {} positionally", e.kind_name()),
                        }
                    }
                }
                Some(t) if t.is_op("**") => {
                    let spread = row[1..].to_vec();
                    for ent in self.eval_token_seq(&spread)? {
                        let node = match self.entity(ent)? {
                            Entity::Array(a) => a.node,
                            e => {
                                log::warn!("cannot spread a {} as keywords", e.kind_name());
                                continue;
                            }
                        };
                        let arr = self.array(node)?.clone();
                        for (key_row, value_row) in arr.keys.iter().zip(arr.values.iter()) {
                            match self.literal_key_text(key_row)? {
                                Some(key) => keywords.push((key, value_row.clone())),
                                None => log::warn!("non-literal keyword spread key ignored"),
                            }
                        }
                    }
                }
                _ => positional.push_back(row),
            }
        }
        Ok((positional, keywords))
    }

    /// `name=value` rows start with a pathless name followed by `=`.
    fn keyword_of(&self, row: &[Token]) -> Result<Option<String>> {
        let (first, second) = match (row.first(), row.get(1)) {
            (Some(f), Some(s)) => (f, s),
            _ => return Ok(None),
        };
        if !second.is_op("=") || row.len() < 3 {
            return Ok(None);
        }
        if let Token::Call(call) = first {
            if let NodeKind::Call(c) = self.kind(*call)? {
                if let (CallHead::Name(name), true) = (&c.head, c.path.is_empty()) {
                    return Ok(Some(name.clone()));
                }
            }
        }
        Ok(None)
    }

    fn literal_key_text(&self, row: &[Token]) -> Result<Option<String>> {
        if let [Token::Call(call)] = row {
            if let NodeKind::Call(c) = self.kind(*call)? {
                if let (CallHead::Str(text), true) = (&c.head, c.path.is_empty()) {
                    return Ok(Some(text.clone()));
                }
            }
        }
        Ok(None)
    }

    fn string_literal(&mut self, text: &str) -> Result<Option<EntityId>> {
        let class_node = match self.builtins.lookup("str") {
            Some(n) => n,
            None => return Ok(None),
        };
        let (class, _) = self.intern(Entity::Class(ClassEntity { node: class_node }));
        Ok(Some(self.instance(
            class,
            None,
            Some(text.to_string()),
        )?))
    }

    fn set_binding(&mut self, param: NodeId, binding: BoundArgs) -> Result<()> {
        match &mut self.scratch_node_mut(param)?.kind {
            NodeKind::Param(p) => {
                p.binding = Some(binding);
                Ok(())
            }
            k => Err(crate::error::StructuralError::UnexpectedKind {
                node: param,
                expected: "param",
                found: k.kind_name(),
            }
            .into()),
        }
    }

    /// The types a parameter takes: its call-site binding if the enclosing
    /// scope is an execution clone, otherwise the receiver rule, the default
    /// value and mined call sites.
    pub(crate) fn param_types(&mut self, param: NodeId) -> Result<EntitySet> {
        self.trace_push(param);
        let p = self.param(param)?.clone();

        if let Some(binding) = p.binding {
            return match binding.kind {
                BoundKind::Single => self.eval_token_rows(&binding.values),
                BoundKind::Tuple => {
                    let arr = self.synthesize_collection(
                        param,
                        crate::syntax::ArrayKind::Tuple,
                        binding.values,
                        vec![],
                    );
                    let (id, _) = self.intern(Entity::Array(crate::entity::ArrayEntity {
                        node: arr,
                    }));
                    Ok(EntitySet::from([id]))
                }
                BoundKind::Dict => {
                    let arr = self.synthesize_collection(
                        param,
                        crate::syntax::ArrayKind::Dict,
                        binding.values,
                        binding.keys,
                    );
                    let (id, _) = self.intern(Entity::Array(crate::entity::ArrayEntity {
                        node: arr,
                    }));
                    Ok(EntitySet::from([id]))
                }
            };
        }

        if p.position == 0 && p.star == StarKind::None {
            if let Some(receiver) = self.method_receiver(param)? {
                return Ok(EntitySet::from([receiver]));
            }
        }

        let mut out = EntitySet::new();
        if let Some(default) = p.default {
            out.extend(self.eval_token_seq(&default)?);
        }
        let usage = self.usage;
        out.extend(usage.infer_param_types(self, param));
        Ok(out)
    }

    /// The implicit first argument of a method resolved without a call: the
    /// instance its execution clone was bound to, or a fresh instance of the
    /// enclosing class.
    fn method_receiver(&mut self, param: NodeId) -> Result<Option<EntityId>> {
        let function = match self.parent(param)? {
            Some(f) if matches!(self.kind(f)?, NodeKind::Function(_)) => f,
            _ => return Ok(None),
        };
        let class_node = match self.parent(function)? {
            Some(c) if matches!(self.kind(c)?, NodeKind::Class(_)) => c,
            _ => return Ok(None),
        };
        if let Some(exec) = self.function(function)?.execution {
            if let Entity::Execution(e) = self.entity(exec)? {
                if let Entity::InstanceElement(el) = self.entity(e.callee)? {
                    return Ok(Some(el.instance));
                }
            }
        }
        let (class, _) = self.intern(Entity::Class(ClassEntity { node: class_node }));
        Ok(Some(self.instance(class, None, None)?))
    }

    fn synthesize_collection(
        &mut self,
        parent: NodeId,
        kind: crate::syntax::ArrayKind,
        values: Vec<TokenSeq>,
        keys: Vec<TokenSeq>,
    ) -> NodeId {
        let pos = self
            .position(parent)
            .unwrap_or(crate::syntax::Position::ZERO);
        self.alloc_scratch(crate::syntax::Node {
            kind: NodeKind::Array(crate::syntax::ArrayNode { kind, values, keys }),
            pos,
            parent: Some(parent),
        })
    }

    /// The callable a function definition resolves to once its decorators
    /// are applied, outermost last. An unresolvable decorator makes the
    /// whole definition undetermined.
    pub(crate) fn decorated_callable(&mut self, fn_node: NodeId) -> Result<Option<EntityId>> {
        if let Some(cached) = self.decorated_cache.get(&fn_node) {
            return Ok(*cached);
        }
        let f = self.function(fn_node)?.clone();
        if f.decorators.is_empty() {
            let (plain, _) = self.intern(Entity::Function(FunctionEntity {
                node: fn_node,
                decorated: false,
            }));
            self.decorated_cache.insert(fn_node, Some(plain));
            return Ok(Some(plain));
        }
        self.decorated_cache.insert(fn_node, None);

        let (mut current, _) = self.intern(Entity::Function(FunctionEntity {
            node: fn_node,
            decorated: true,
        }));
        for dec in f.decorators.iter().rev() {
            let candidates = self.eval_statement(*dec, None)?;
            if candidates.len() > 1 {
                log::warn!(
                    "decorator on {} is ambiguous ({} candidates); taking the first",
                    f.name,
                    candidates.len()
                );
            }
            let decorator = match candidates.iter().next().copied() {
                Some(d) => d,
                None => {
                    log::warn!("decorator on {} not found", f.name);
                    return Ok(None);
                }
            };
            let args = self.synthesize_args(*dec, vec![vec![Token::Entity(current)]]);
            let (exec, _) = self.intern(Entity::Execution(ExecutionEntity {
                callee: decorator,
                args: Some(args),
            }));
            let wrappers = self.execution_returns(exec, false)?;
            if wrappers.len() > 1 {
                log::warn!(
                    "decorator on {} wraps with {} results; taking the first",
                    f.name,
                    wrappers.len()
                );
            }
            current = match wrappers.iter().next().copied() {
                Some(w) => w,
                None => {
                    log::warn!("decorator on {} returned nothing", f.name);
                    return Ok(None);
                }
            };
        }
        self.decorated_cache.insert(fn_node, Some(current));
        Ok(Some(current))
    }

    /// Execute a member of the instance's class by name, binding the
    /// receiver. `None` when the class hierarchy defines no such member.
    pub(crate) fn instance_execute_member(
        &mut self,
        instance: EntityId,
        name: &str,
        args: Arguments,
    ) -> Result<Option<EntitySet>> {
        match self.member_execution(instance, name, args)? {
            Some(exec) => Ok(Some(self.execution_returns(exec, false)?)),
            None => Ok(None),
        }
    }

    fn member_execution(
        &mut self,
        instance: EntityId,
        name: &str,
        args: Arguments,
    ) -> Result<Option<EntityId>> {
        let class = match self.entity(instance)? {
            Entity::Instance(i) => i.class,
            e => {
                return Err(anyhow::anyhow!(
                    "internal error: member execution on a {}",
                    e.kind_name()
                ))
            }
        };
        let fn_node = match self.find_member_function(class, name)? {
            Some(n) => n,
            None => return Ok(None),
        };
        let member = match self.decorated_callable(fn_node)? {
            Some(m) => m,
            None => return Ok(None),
        };
        let (element, _) = self.intern(Entity::InstanceElement(InstanceElementEntity {
            instance,
            member,
            class_var: true,
        }));
        let (exec, _) = self.intern(Entity::Execution(ExecutionEntity {
            callee: element,
            args,
        }));
        Ok(Some(exec))
    }

    /// Search a class and its bases for a method definition.
    fn find_member_function(&mut self, class: EntityId, name: &str) -> Result<Option<NodeId>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([class]);
        while let Some(cur) = queue.pop_front() {
            if !visited.insert(cur) {
                continue;
            }
            let node = match self.entity(cur)? {
                Entity::Class(c) => c.node,
                _ => continue,
            };
            if let Some(sub) = self.class_subscope_by_name(node, name)? {
                if matches!(self.kind(sub)?, NodeKind::Function(_)) {
                    return Ok(Some(sub));
                }
            }
            queue.extend(self.superclasses(cur)?);
        }
        Ok(None)
    }

    /// `__getattr__`/`__getattribute__` fallback for a missed attribute.
    pub(crate) fn attr_fallback(
        &mut self,
        instance: EntityId,
        proto: &str,
        name: &str,
    ) -> Result<Option<EntitySet>> {
        let lit = match self.string_literal(name)? {
            Some(l) => l,
            None => return Ok(None),
        };
        let parent = match self.entity(instance)? {
            Entity::Instance(i) => match self.entity(i.class)? {
                Entity::Class(c) => c.node,
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        let args = self.synthesize_args(parent, vec![vec![Token::Entity(lit)]]);
        self.instance_execute_member(instance, proto, Some(args))
    }

    /// Replace data descriptors in a member lookup result with what their
    /// `__get__` yields.
    pub(crate) fn apply_descriptors(
        &mut self,
        origin: EntityId,
        results: EntitySet,
    ) -> Result<EntitySet> {
        let mut out = EntitySet::new();
        for result in results {
            let descriptor = match self.entity(result)? {
                Entity::Instance(i) => self.find_member_function(i.class, "__get__")?.is_some(),
                _ => false,
            };
            if descriptor {
                out.extend(self.descriptor_return(result, origin)?);
            } else {
                out.insert(result);
            }
        }
        Ok(out)
    }

    /// `descriptor.__get__(obj, objtype)`; the object row is empty for a
    /// class-level access.
    fn descriptor_return(&mut self, descriptor: EntityId, origin: EntityId) -> Result<EntitySet> {
        let rows = match self.entity(origin)? {
            Entity::Instance(i) => {
                let class = i.class;
                vec![
                    vec![Token::Entity(origin)],
                    vec![Token::Entity(class)],
                ]
            }
            Entity::Class(_) => vec![vec![], vec![Token::Entity(origin)]],
            _ => return Ok(EntitySet::new()),
        };
        let parent = match self.entity(descriptor)? {
            Entity::Instance(i) => match self.entity(i.class)? {
                Entity::Class(c) => c.node,
                _ => return Ok(EntitySet::new()),
            },
            _ => return Ok(EntitySet::new()),
        };
        let args = self.synthesize_args(parent, rows);
        Ok(self
            .instance_execute_member(descriptor, "__get__", Some(args))?
            .unwrap_or_default())
    }

    /// Everything a generator yields, by running the wrapped function body.
    pub(crate) fn generator_content(&mut self, generator: EntityId) -> Result<EntitySet> {
        let (function, args) = match self.entity(generator)? {
            Entity::Generator(g) => (g.function, g.args),
            e => {
                return Err(anyhow::anyhow!(
                    "internal error: generator content of a {}",
                    e.kind_name()
                ))
            }
        };
        let (exec, _) = self.intern(Entity::Execution(ExecutionEntity {
            callee: function,
            args,
        }));
        self.execution_returns(exec, true)
    }

    /// The `getattr(obj, "name")` builtin: a member lookup when the name is
    /// a string literal.
    fn getattr_builtin(&mut self, args: Arguments) -> Result<EntitySet> {
        let rows = match args {
            Some(arr) => self.array(arr)?.values.clone(),
            None => vec![],
        };
        if rows.len() < 2 {
            log::warn!("getattr needs an object and a name");
            return Ok(EntitySet::new());
        }
        let objects = self.eval_token_seq(&rows[0])?;
        let names = self.eval_token_seq(&rows[1])?;
        let mut out = EntitySet::new();
        for name_ent in names {
            let literal = match self.entity(name_ent)? {
                Entity::Instance(i) => i.literal.clone(),
                _ => None,
            };
            let name = match literal {
                Some(n) => n,
                None => {
                    log::warn!("getattr with a non-literal name is undetermined");
                    continue;
                }
            };
            for obj in objects.iter().copied().collect::<Vec<_>>() {
                if matches!(
                    self.entity(obj)?,
                    Entity::Instance(_) | Entity::Class(_) | Entity::Module(_)
                ) {
                    out.extend(self.resolve_member(obj, &name)?);
                }
            }
        }
        Ok(out)
    }

    /// Instance attributes harvested from `self.x = ...` assignments in the
    /// class's methods, initializer clones preferred so call-site parameter
    /// types flow through.
    pub(crate) fn self_properties(&mut self, instance: EntityId) -> Result<Vec<NameDef>> {
        if let Some(cached) = self.self_props_cache.get(&instance) {
            return Ok(cached.clone());
        }
        self.self_props_cache.insert(instance, vec![]);

        let class = match self.entity(instance)? {
            Entity::Instance(i) => i.class,
            e => {
                return Err(anyhow::anyhow!(
                    "internal error: self properties of a {}",
                    e.kind_name()
                ))
            }
        };
        let mut defs = vec![];
        self.collect_self_props(instance, class, &mut defs)?;
        for sup in self.superclasses(class)? {
            if sup == class {
                continue;
            }
            let sup_instance = self.instance(sup, None, None)?;
            defs.extend(self.self_properties(sup_instance)?);
        }
        self.self_props_cache.insert(instance, defs.clone());
        Ok(defs)
    }

    fn collect_self_props(
        &mut self,
        instance: EntityId,
        class: EntityId,
        out: &mut Vec<NameDef>,
    ) -> Result<()> {
        let class_node = match self.entity(class)? {
            Entity::Class(c) => c.node,
            _ => return Ok(()),
        };
        let subscopes = self.class(class_node)?.subscopes.clone();
        for sub in subscopes {
            let f = match self.kind(sub)? {
                NodeKind::Function(f) => f.clone(),
                _ => continue,
            };
            let p0 = match f.params.first() {
                Some(p) => *p,
                None => continue,
            };
            let p0 = self.param(p0)?.clone();
            if p0.star != StarKind::None {
                continue;
            }
            let self_name = self.name_node(p0.name)?.final_segment().to_string();
            // The initializer clone of this instance carries the call-site
            // bindings; other methods are scanned as written.
            let scan_root = if f.name == "__init__" {
                self.init_execs
                    .get(&instance)
                    .and_then(|exec| self.exec_clones.get(exec))
                    .copied()
                    .unwrap_or(sub)
            } else {
                sub
            };
            let body = self.function(scan_root)?.statements.clone();
            self.harvest_self_assignments(&body, &self_name, instance, out)?;
        }
        Ok(())
    }

    fn harvest_self_assignments(
        &mut self,
        body: &[NodeId],
        self_name: &str,
        instance: EntityId,
        out: &mut Vec<NameDef>,
    ) -> Result<()> {
        for id in body {
            match self.kind(*id)?.clone() {
                NodeKind::Statement(s) => {
                    for (op, target) in &s.assignments {
                        for name in target.names() {
                            let node = self.name_node(name)?;
                            if node.segments.len() == 2
                                && node.segments[0].text == self_name
                            {
                                out.push(NameDef {
                                    text: node.text_from(1),
                                    name_node: Some(name),
                                    def: DefSite::Statement { stmt: *id, op: *op },
                                    instance: Some(instance),
                                    class_var: false,
                                    pos: self.position(*id)?,
                                });
                            }
                        }
                    }
                }
                NodeKind::Flow(flow) => {
                    self.harvest_self_assignments(&flow.statements, self_name, instance, out)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Direct base classes, resolved from the superclass expressions.
    pub(crate) fn superclasses(&mut self, class: EntityId) -> Result<Vec<EntityId>> {
        if let Some(cached) = self.supers_cache.get(&class) {
            return Ok(cached.clone());
        }
        self.supers_cache.insert(class, vec![]);

        let node = match self.entity(class)? {
            Entity::Class(c) => c.node,
            _ => return Ok(vec![]),
        };
        let supers = self.class(node)?.supers.clone();
        let mut out = vec![];
        for stmt in supers {
            for ent in self.eval_statement(stmt, None)? {
                match self.entity(ent)? {
                    Entity::Class(_) => out.push(ent),
                    e => log::warn!("superclass expression yielded a {}", e.kind_name()),
                }
            }
        }
        self.supers_cache.insert(class, out.clone());
        Ok(out)
    }
}
