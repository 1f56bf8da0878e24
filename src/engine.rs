// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The public inference facade.
//!
//! An [`Engine`] owns a syntax tree with the builtin stubs installed and the
//! pluggable collaborators. Every request opens a fresh [`Session`], so no
//! inference state survives between calls; only the tree and configuration
//! do.

use crate::builtins::Builtins;
use crate::entity::{Description, Entity, EntityId};
use crate::hooks::{ImportResolver, NoImports, NoMining, UsageMiner};
use crate::scope::ScopeRef;
use crate::session::{Limits, Session};
use crate::syntax::{NodeId, NodeStore, Position, SyntaxTree};

use anyhow::Result;
use serde::Serialize;

/// Where a name was defined, for editor navigation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DefinitionSite {
    pub node: NodeId,
    pub name: Option<String>,
    pub position: Position,
}

pub struct Engine {
    tree: SyntaxTree,
    builtins: Builtins,
    imports: Box<dyn ImportResolver>,
    usage: Box<dyn UsageMiner>,
    limits: Limits,
}

impl Engine {
    pub fn new() -> Result<Engine> {
        let mut tree = SyntaxTree::new();
        let builtins = Builtins::install(&mut tree)?;
        Ok(Engine {
            tree,
            builtins,
            imports: Box::new(NoImports),
            usage: Box::new(NoMining),
            limits: Limits::default(),
        })
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Mutable access for the frontend that parses modules into the tree.
    pub fn tree_mut(&mut self) -> &mut SyntaxTree {
        &mut self.tree
    }

    pub fn set_import_resolver(&mut self, imports: Box<dyn ImportResolver>) {
        self.imports = imports;
    }

    pub fn set_usage_miner(&mut self, usage: Box<dyn UsageMiner>) {
        self.usage = usage;
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    /// Open a fresh evaluation session against the current tree.
    pub fn session(&self) -> Session<'_> {
        Session::new(
            &self.tree,
            &self.builtins,
            self.imports.as_ref(),
            self.usage.as_ref(),
            self.limits,
        )
    }

    /// Evaluate a statement. `seek` selects one variable of a destructuring
    /// assignment.
    pub fn evaluate(&self, stmt: NodeId, seek: Option<&str>) -> Result<Vec<Description>> {
        let mut session = self.session();
        let results = session.eval_statement(stmt, seek)?;
        describe_all(&session, results)
    }

    /// Resolve a name as seen from `from`, walking the scope chain, star
    /// imports and builtins.
    pub fn resolve_name(&self, from: NodeId, name: &str) -> Result<Vec<Description>> {
        let mut session = self.session();
        let pos = session.position(from)?;
        let results = session.find_name(ScopeRef::Node(from), name, Some(pos), true)?;
        describe_all(&session, results)
    }

    /// All names visible from `from`, nearest scope first.
    pub fn completions(&self, from: NodeId) -> Result<Vec<String>> {
        let mut session = self.session();
        let pos = session.position(from)?;
        let defs = session.visible_names(ScopeRef::Node(from), Some(pos), true)?;
        let mut out: Vec<String> = vec![];
        for (_, def) in defs {
            if !out.contains(&def.text) {
                out.push(def.text);
            }
        }
        Ok(out)
    }

    /// Every name visible from `from` paired with the scope node that
    /// defines it, nearest scope first. Shadowed names still appear, on
    /// their own defining scope.
    pub fn visible_names(&self, from: NodeId) -> Result<Vec<(NodeId, String)>> {
        let mut session = self.session();
        let pos = session.position(from)?;
        let defs = session.visible_names(ScopeRef::Node(from), Some(pos), true)?;
        Ok(defs
            .into_iter()
            .map(|(scope, def)| (scope, def.text))
            .collect())
    }

    /// The definition sites a statement leads to. With a `name`, the sites
    /// defining that member on the statement's results; without one, the
    /// definition the evaluation visited right after the statement itself.
    pub fn goto_definition(
        &self,
        stmt: NodeId,
        name: Option<&str>,
    ) -> Result<Vec<DefinitionSite>> {
        let mut session = self.session();
        let results = session.eval_statement(stmt, None)?;

        let mut sites = vec![];
        match name {
            Some(name) => {
                for ent in results {
                    if !matches!(
                        session.entity(ent)?,
                        Entity::Module(_) | Entity::Class(_) | Entity::Instance(_)
                    ) {
                        continue;
                    }
                    for (_, def) in session.visible_names(ScopeRef::Entity(ent), None, false)? {
                        if def.text == name {
                            let node = def.name_node.unwrap_or(stmt);
                            sites.push(DefinitionSite {
                                node,
                                name: Some(def.text),
                                position: def.pos,
                            });
                        }
                    }
                }
            }
            None => {
                // The trace records the demanded statement first, then every
                // definition evaluation passed through.
                if let Some(site) = session.visited().get(1).copied() {
                    sites.push(DefinitionSite {
                        node: site,
                        name: None,
                        position: session.position(site)?,
                    });
                }
            }
        }
        sites.sort();
        sites.dedup();
        Ok(sites)
    }
}

fn describe_all(
    session: &Session<'_>,
    results: impl IntoIterator<Item = EntityId>,
) -> Result<Vec<Description>> {
    let mut out = vec![];
    for ent in results {
        out.push(describe(session, ent)?);
    }
    out.sort();
    out.dedup();
    Ok(out)
}

/// A serializable summary of an entity.
fn describe(session: &Session<'_>, ent: EntityId) -> Result<Description> {
    let entity = session.entity(ent)?;
    Ok(match entity {
        Entity::Class(c) => node_description("class", session, c.node)?,
        Entity::Function(f) => node_description("function", session, f.node)?,
        Entity::Module(m) => node_description("module", session, m.node)?,
        Entity::Instance(i) => {
            let mut d = describe(session, i.class)?;
            d.kind = "instance";
            d
        }
        Entity::InstanceElement(el) => {
            let mut d = describe(session, el.member)?;
            d.kind = "instance-element";
            d
        }
        Entity::Generator(g) => {
            let mut d = describe(session, g.function)?;
            d.kind = "generator";
            d
        }
        Entity::Execution(e) => {
            let mut d = describe(session, e.callee)?;
            d.kind = "execution";
            d
        }
        Entity::Array(a) => Description {
            kind: "array",
            name: Some(session.array(a.node)?.kind.type_name().to_string()),
            node: Some(a.node),
            position: Some(session.position(a.node)?),
        },
    })
}

fn node_description(
    kind: &'static str,
    session: &Session<'_>,
    node: NodeId,
) -> Result<Description> {
    Ok(Description {
        kind,
        name: Some(session.scope_name(node)?),
        node: Some(node),
        position: Some(session.position(node)?),
    })
}
