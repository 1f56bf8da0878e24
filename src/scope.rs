// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Name resolution.
//!
//! A name is looked up against a chain of levels: the lexical scopes around
//! the access, then star-imported modules, then the builtin module. Attribute
//! access uses entity levels instead, where instance attributes take
//! precedence over class members. The search stops at the first level that
//! defines the name, then the matching definitions are normalized into
//! entities on demand.

use crate::builtins::in_builtin_module;
use crate::entity::{Entity, EntityId, EntitySet, InstanceElementEntity};
use crate::session::Session;
use crate::syntax::{AssignOp, NodeId, NodeKind, NodeStore, Position};

use anyhow::{anyhow, Result};

/// One visible definition of a name, before normalization.
#[derive(Debug, Clone)]
pub struct NameDef {
    /// The dotted text this definition binds, after stripping the receiver
    /// segment of harvested `self.x` assignments.
    pub text: String,
    /// The defining name node, where one exists (not for sub-scopes).
    pub name_node: Option<NodeId>,
    pub def: DefSite,
    /// The instance this definition was reached through, for member binding.
    pub instance: Option<EntityId>,
    /// True for definitions found in a class scope rather than harvested
    /// from `self.x` assignments.
    pub class_var: bool,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum DefSite {
    /// An assignment statement; normalizes by evaluating its right side.
    Statement { stmt: NodeId, op: AssignOp },
    /// A function parameter; normalizes through its call-site binding.
    Param(NodeId),
    /// A loop variable; normalizes by iterating the loop input.
    ForLoop(NodeId),
    /// A nested class or function definition.
    Subscope(NodeId),
    /// An import binding, delegated to the import resolver.
    Import(NodeId),
    /// A generator protocol method; `executes` distinguishes the content
    /// methods from `close`/`throw`.
    GeneratorOp { generator: EntityId, executes: bool },
}

/// Where a lookup starts: a syntax scope for lexical resolution, an entity
/// for attribute access.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ScopeRef {
    Node(NodeId),
    Entity(EntityId),
}

impl<'e> Session<'e> {
    /// Resolve `name` starting from `origin`. A `global` search walks the
    /// whole scope chain (plus star imports and builtins); otherwise only the
    /// origin's own levels are searched and the instance attribute fallbacks
    /// apply.
    pub(crate) fn find_name(
        &mut self,
        origin: ScopeRef,
        name: &str,
        pos: Option<Position>,
        global: bool,
    ) -> Result<EntitySet> {
        let levels = self.lookup_levels(origin, pos, global)?;

        let mut results = EntitySet::new();
        'levels: for (_, level) in levels {
            let mut matches: Vec<NameDef> =
                level.into_iter().filter(|d| d.text == name).collect();
            if matches.is_empty() {
                continue;
            }
            // Nearest declaration first: a plain definition shadows every
            // earlier one. Compound assignments only contribute; the plain
            // definition they modify may live earlier or further out.
            matches.sort_by(|a, b| b.pos.cmp(&a.pos));
            for def in &matches {
                let augmented = matches!(
                    def.def,
                    DefSite::Statement {
                        op: AssignOp::Augmented,
                        ..
                    }
                );
                results.extend(self.resolve_defs(std::slice::from_ref(def))?);
                if !augmented {
                    break 'levels;
                }
            }
        }

        if !global {
            if let ScopeRef::Entity(origin_ent) = origin {
                if results.is_empty() {
                    if matches!(self.entity(origin_ent)?, Entity::Instance(_)) {
                        for proto in ["__getattr__", "__getattribute__"] {
                            if let Some(r) = self.attr_fallback(origin_ent, proto, name)? {
                                results = r;
                                break;
                            }
                        }
                    }
                } else if matches!(
                    self.entity(origin_ent)?,
                    Entity::Instance(_) | Entity::Class(_)
                ) {
                    results = self.apply_descriptors(origin_ent, results)?;
                }
            }
        }
        Ok(results)
    }

    /// All definitions visible from `origin`, flattened nearest-first, each
    /// paired with the scope node that contributed it.
    pub(crate) fn visible_names(
        &mut self,
        origin: ScopeRef,
        pos: Option<Position>,
        global: bool,
    ) -> Result<Vec<(NodeId, NameDef)>> {
        let mut out = vec![];
        for (scope, level) in self.lookup_levels(origin, pos, global)? {
            out.extend(level.into_iter().map(|d| (scope, d)));
        }
        Ok(out)
    }

    fn lookup_levels(
        &mut self,
        origin: ScopeRef,
        pos: Option<Position>,
        global: bool,
    ) -> Result<Vec<(NodeId, Vec<NameDef>)>> {
        match (global, origin) {
            (true, ScopeRef::Node(start)) => self.global_levels(start, pos),
            (false, ScopeRef::Node(scope)) => {
                Ok(vec![(scope, self.level_defs(scope, None, false)?)])
            }
            (false, ScopeRef::Entity(ent)) => self.entity_levels(ent),
            (true, ScopeRef::Entity(ent)) => Err(anyhow!(
                "internal error: global search cannot start from entity {ent:?}"
            )),
        }
    }

    /// The lexical chain of `start`, one level per scope, followed by star
    /// imports and the builtin module.
    fn global_levels(
        &mut self,
        start: NodeId,
        pos: Option<Position>,
    ) -> Result<Vec<(NodeId, Vec<NameDef>)>> {
        let mut levels = vec![];
        let mut pos = pos;
        let first_scope = self.enclosing_scope(start)?;
        let start_module = self.module_of(start)?;

        let mut cur = Some(start);
        while let Some(c) = cur {
            let next = self.parent(c)?;
            match self.kind(c)? {
                NodeKind::Flow(f) if f.is_comprehension => {
                    levels.push((c, self.level_defs(c, None, false)?));
                }
                NodeKind::Function(_) => {
                    let mut level = self.level_defs(c, None, false)?;
                    if let Some(p) = pos {
                        level.retain(|d| matches!(d.def, DefSite::Param(_)) || d.pos < p);
                    }
                    levels.push((c, level));
                    // Closures see the whole enclosing scope regardless of
                    // where the inner function is defined.
                    pos = None;
                }
                NodeKind::Class(_) => {
                    // A class body is no lexical parent for its methods.
                    if c == first_scope {
                        let mut level = self.level_defs(c, None, false)?;
                        if let Some(p) = pos {
                            level.retain(|d| d.pos < p);
                        }
                        levels.push((c, level));
                    }
                }
                NodeKind::Module(_) => {
                    let mut level = self.level_defs(c, None, false)?;
                    if let Some(p) = pos {
                        level.retain(|d| d.pos < p);
                    }
                    levels.push((c, level));
                }
                _ => {}
            }
            cur = next;
        }

        let imports = self.imports;
        for star_module in imports.star_imports(start_module) {
            levels.push((star_module, self.level_defs(star_module, None, false)?));
        }

        let builtin_root = self.builtins.root_scope();
        if start_module != builtin_root {
            levels.push((builtin_root, self.level_defs(builtin_root, None, false)?));
        }
        Ok(levels)
    }

    /// Attribute levels of an entity.
    fn entity_levels(&mut self, ent: EntityId) -> Result<Vec<(NodeId, Vec<NameDef>)>> {
        Ok(match self.entity(ent)?.clone() {
            Entity::Module(m) => vec![(m.node, self.level_defs(m.node, None, false)?)],
            Entity::Class(c) => vec![(c.node, self.class_defined_names(ent)?)],
            Entity::Instance(i) => {
                let class_node = match self.entity(i.class)? {
                    Entity::Class(c) => c.node,
                    e => {
                        return Err(anyhow!(
                            "internal error: instance of a {}",
                            e.kind_name()
                        ))
                    }
                };
                let own = self.self_properties(ent)?;
                let class = self
                    .class_defined_names(i.class)?
                    .into_iter()
                    .map(|mut d| {
                        d.instance = Some(ent);
                        d
                    })
                    .collect();
                vec![(class_node, own), (class_node, class)]
            }
            Entity::Generator(_) => vec![generator_ops(self, ent)?],
            Entity::Function(f) => {
                log::warn!("attribute lookup on function node {:?} is undetermined", f.node);
                vec![]
            }
            Entity::Array(_) | Entity::Execution(_) | Entity::InstanceElement(_) => {
                return Err(anyhow!(
                    "internal error: {} must be dereferenced before name lookup",
                    self.entity(ent)?.kind_name()
                ))
            }
        })
    }

    /// The definitions one scope level contributes, including those nested in
    /// its flow statements.
    pub(crate) fn level_defs(
        &self,
        scope: NodeId,
        instance: Option<EntityId>,
        class_var: bool,
    ) -> Result<Vec<NameDef>> {
        let mut out = vec![];
        match self.kind(scope)? {
            NodeKind::Module(m) => {
                let (statements, subscopes, imports) =
                    (m.statements.clone(), m.subscopes.clone(), m.imports.clone());
                self.gather_body(&statements, instance, class_var, &mut out)?;
                for s in subscopes {
                    out.push(self.subscope_def(s, instance, class_var)?);
                }
                for imp in imports {
                    self.gather_import(imp, &mut out)?;
                }
            }
            NodeKind::Class(c) => {
                let (statements, subscopes) = (c.statements.clone(), c.subscopes.clone());
                self.gather_body(&statements, instance, class_var, &mut out)?;
                for s in subscopes {
                    out.push(self.subscope_def(s, instance, class_var)?);
                }
            }
            NodeKind::Function(f) => {
                let (params, statements, subscopes) =
                    (f.params.clone(), f.statements.clone(), f.subscopes.clone());
                for p in params {
                    let name = self.param(p)?.name;
                    out.push(NameDef {
                        text: self.name_node(name)?.text_from(0),
                        name_node: Some(name),
                        def: DefSite::Param(p),
                        instance: None,
                        class_var: false,
                        pos: self.position(p)?,
                    });
                }
                self.gather_body(&statements, instance, class_var, &mut out)?;
                for s in subscopes {
                    out.push(self.subscope_def(s, instance, class_var)?);
                }
            }
            NodeKind::Flow(_) => {
                self.gather_body(&[scope], instance, class_var, &mut out)?;
            }
            k => {
                return Err(crate::error::StructuralError::UnexpectedKind {
                    node: scope,
                    expected: "scope",
                    found: k.kind_name(),
                }
                .into())
            }
        }
        Ok(out)
    }

    /// Walk a body list, descending into flows, collecting assignment targets
    /// and loop variables.
    fn gather_body(
        &self,
        body: &[NodeId],
        instance: Option<EntityId>,
        class_var: bool,
        out: &mut Vec<NameDef>,
    ) -> Result<()> {
        for id in body {
            match self.kind(*id)? {
                NodeKind::Statement(s) => {
                    for (op, target) in &s.assignments {
                        for name in target.names() {
                            out.push(NameDef {
                                text: self.name_node(name)?.text_from(0),
                                name_node: Some(name),
                                def: DefSite::Statement { stmt: *id, op: *op },
                                instance,
                                class_var,
                                pos: self.position(*id)?,
                            });
                        }
                    }
                }
                NodeKind::Flow(f) => {
                    let (target, statements, subscopes) =
                        (f.target.clone(), f.statements.clone(), f.subscopes.clone());
                    if let Some(target) = target {
                        for name in target.names() {
                            out.push(NameDef {
                                text: self.name_node(name)?.text_from(0),
                                name_node: Some(name),
                                def: DefSite::ForLoop(*id),
                                instance,
                                class_var,
                                pos: self.position(*id)?,
                            });
                        }
                    }
                    self.gather_body(&statements, instance, class_var, out)?;
                    for s in subscopes {
                        out.push(self.subscope_def(s, instance, class_var)?);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn subscope_def(
        &self,
        node: NodeId,
        instance: Option<EntityId>,
        class_var: bool,
    ) -> Result<NameDef> {
        Ok(NameDef {
            text: self.scope_name(node)?,
            name_node: None,
            def: DefSite::Subscope(node),
            instance,
            class_var,
            pos: self.position(node)?,
        })
    }

    fn gather_import(&self, import: NodeId, out: &mut Vec<NameDef>) -> Result<()> {
        let (names, module, star) = match self.kind(import)? {
            NodeKind::Import(i) => (i.names.clone(), i.module.clone(), i.star),
            k => {
                return Err(crate::error::StructuralError::UnexpectedKind {
                    node: import,
                    expected: "import",
                    found: k.kind_name(),
                }
                .into())
            }
        };
        // Star imports contribute through the dedicated chain level instead.
        if star {
            return Ok(());
        }
        if names.is_empty() {
            out.push(NameDef {
                text: module,
                name_node: None,
                def: DefSite::Import(import),
                instance: None,
                class_var: false,
                pos: self.position(import)?,
            });
        } else {
            for name in names {
                out.push(NameDef {
                    text: self.name_node(name)?.text_from(0),
                    name_node: Some(name),
                    def: DefSite::Import(import),
                    instance: None,
                    class_var: false,
                    pos: self.position(import)?,
                });
            }
        }
        Ok(())
    }

    /// Member definitions of a class, own members first, then inherited ones
    /// that are not shadowed.
    pub(crate) fn class_defined_names(&mut self, class: EntityId) -> Result<Vec<NameDef>> {
        if let Some(cached) = self.class_names_cache.get(&class) {
            return Ok(cached.clone());
        }
        // Placeholder breaks inheritance cycles.
        self.class_names_cache.insert(class, vec![]);

        let node = match self.entity(class)? {
            Entity::Class(c) => c.node,
            e => {
                return Err(anyhow!(
                    "internal error: class members requested of a {}",
                    e.kind_name()
                ))
            }
        };
        let mut defs = self.level_defs(node, None, true)?;
        for sup in self.superclasses(class)? {
            for inherited in self.class_defined_names(sup)? {
                if !defs.iter().any(|d| d.text == inherited.text) {
                    defs.push(inherited);
                }
            }
        }
        self.class_names_cache.insert(class, defs.clone());
        Ok(defs)
    }

    /// Turn matched definitions into entities.
    fn resolve_defs(&mut self, defs: &[NameDef]) -> Result<EntitySet> {
        let mut results = EntitySet::new();
        for def in defs {
            let seek = def
                .text
                .rsplit('.')
                .next()
                .unwrap_or(def.text.as_str())
                .to_string();
            let mut resolved = match &def.def {
                DefSite::Statement { stmt, .. } => self.eval_statement(*stmt, Some(&seek))?,
                DefSite::Param(p) => self.param_types(*p)?,
                DefSite::ForLoop(flow) => self.loop_variable_types(*flow, &seek)?,
                DefSite::Subscope(node) => match self.kind(*node)? {
                    NodeKind::Class(_) => {
                        let (class, _) = self.intern(Entity::Class(crate::entity::ClassEntity {
                            node: *node,
                        }));
                        EntitySet::from([class])
                    }
                    NodeKind::Function(_) => match self.decorated_callable(*node)? {
                        Some(f) => EntitySet::from([f]),
                        None => EntitySet::new(),
                    },
                    k => {
                        return Err(crate::error::StructuralError::UnexpectedKind {
                            node: *node,
                            expected: "class or function",
                            found: k.kind_name(),
                        }
                        .into())
                    }
                },
                DefSite::Import(import) => {
                    let imports = self.imports;
                    let mut set = EntitySet::new();
                    for node in imports.resolve_import(*import) {
                        match self.kind(node)? {
                            NodeKind::Module(_) => {
                                let (m, _) = self.intern(Entity::Module(
                                    crate::entity::ModuleEntity { node },
                                ));
                                set.insert(m);
                            }
                            NodeKind::Class(_) => {
                                let (c, _) = self
                                    .intern(Entity::Class(crate::entity::ClassEntity { node }));
                                set.insert(c);
                            }
                            NodeKind::Function(_) => {
                                if let Some(f) = self.decorated_callable(node)? {
                                    set.insert(f);
                                }
                            }
                            k => log::warn!(
                                "import resolved to a {}, ignoring",
                                k.kind_name()
                            ),
                        }
                    }
                    set
                }
                DefSite::GeneratorOp {
                    generator,
                    executes,
                } => {
                    if *executes {
                        EntitySet::from([*generator])
                    } else {
                        EntitySet::new()
                    }
                }
            };
            if let Some(inst) = def.instance {
                resolved = self.bind_members(inst, resolved, def.class_var)?;
            }
            results.extend(resolved);
        }
        Ok(results)
    }

    /// Bind callables reached through an instance to that instance.
    fn bind_members(
        &mut self,
        instance: EntityId,
        resolved: EntitySet,
        class_var: bool,
    ) -> Result<EntitySet> {
        let mut out = EntitySet::new();
        for id in resolved {
            if matches!(self.entity(id)?, Entity::Function(_)) {
                let (el, _) = self.intern(Entity::InstanceElement(InstanceElementEntity {
                    instance,
                    member: id,
                    class_var,
                }));
                out.insert(el);
            } else {
                out.insert(id);
            }
        }
        Ok(out)
    }

    /// Loop variable types: iterate every loop input and destructure by the
    /// target shape.
    fn loop_variable_types(&mut self, flow: NodeId, seek: &str) -> Result<EntitySet> {
        let (inputs, target) = match self.kind(flow)? {
            NodeKind::Flow(f) => (f.inputs.clone(), f.target.clone()),
            k => {
                return Err(crate::error::StructuralError::UnexpectedKind {
                    node: flow,
                    expected: "flow",
                    found: k.kind_name(),
                }
                .into())
            }
        };
        let target = match target {
            Some(t) => t,
            None => return Ok(EntitySet::new()),
        };
        let mut elements = EntitySet::new();
        for input in inputs {
            elements.extend(self.loop_input_elements(input)?);
        }
        self.destructure(&target, &elements, seek)
    }

    /// The first sub-scope of `class_node` with the given name, preferring
    /// later definitions.
    pub(crate) fn class_subscope_by_name(
        &self,
        class_node: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>> {
        let subscopes = self.class(class_node)?.subscopes.clone();
        for sub in subscopes.into_iter().rev() {
            if self.scope_name(sub)? == name {
                return Ok(Some(sub));
            }
        }
        Ok(None)
    }

    /// True if `scope` sits in the builtin stub module.
    pub(crate) fn scope_is_builtin(&self, scope: NodeId) -> Result<bool> {
        in_builtin_module(self, scope)
    }
}

fn generator_ops(session: &Session, generator: EntityId) -> Result<(NodeId, Vec<NameDef>)> {
    let node = match session.entity(generator)? {
        Entity::Generator(g) => match session.entity(g.function)? {
            Entity::Function(f) => f.node,
            e => {
                return Err(anyhow!(
                    "internal error: generator wraps a {}",
                    e.kind_name()
                ))
            }
        },
        e => {
            return Err(anyhow!(
                "internal error: generator ops requested of a {}",
                e.kind_name()
            ))
        }
    };
    let pos = session.position(node)?;
    let op = |name: &str, executes: bool| NameDef {
        text: name.to_string(),
        name_node: None,
        def: DefSite::GeneratorOp {
            generator,
            executes,
        },
        instance: None,
        class_var: false,
        pos,
    };
    Ok((
        node,
        vec![
            op("next", true),
            op("send", true),
            op("__next__", true),
            op("__iter__", true),
            op("close", false),
            op("throw", false),
        ],
    ))
}
