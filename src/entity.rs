// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Entities: the evaluated values of the engine.
//!
//! An entity lifts a syntax node into something the pipeline can query —
//! a class, a function with its decorators applied, an instance, one call of
//! a callable, a generator, a literal collection. Entities live in a
//! per-session arena and are interned: constructing one from identical
//! arguments twice within a request yields the same [`EntityId`], which makes
//! cycle and shadow checks simple identity comparisons.

use crate::syntax::NodeId;

use std::collections::BTreeSet;

use serde::Serialize;

/// Index of an entity in the session arena. Also the identity used for
/// deduplication and cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A deduplicated evaluation result. Empty means "undetermined", never an
/// error.
pub type EntitySet = BTreeSet<EntityId>;

/// Call-site arguments: an argument array node, or nothing for synthesized
/// calls (`self` instances, bare member executions).
pub type Arguments = Option<NodeId>;

#[derive(Debug, Clone)]
pub enum Entity {
    Class(ClassEntity),
    Function(FunctionEntity),
    Instance(InstanceEntity),
    InstanceElement(InstanceElementEntity),
    Execution(ExecutionEntity),
    Generator(GeneratorEntity),
    Array(ArrayEntity),
    /// A module scope reached through an import.
    Module(ModuleEntity),
}

#[derive(Debug, Clone)]
pub struct ClassEntity {
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct FunctionEntity {
    pub node: NodeId,
    /// Set once decorators have been applied (or on the pre-decoration
    /// wrapper fed to a decorator execution), so decoration never reenters.
    pub decorated: bool,
}

#[derive(Debug, Clone)]
pub struct InstanceEntity {
    pub class: EntityId,
    pub args: Arguments,
    /// The literal text this instance was synthesized from, for string and
    /// number literals. Used for exact mapping-key and `getattr` lookups.
    pub literal: Option<String>,
}

/// Binds a class member to the instance it was reached through, so `self`
/// inside the member resolves to that instance.
#[derive(Debug, Clone)]
pub struct InstanceElementEntity {
    pub instance: EntityId,
    pub member: EntityId,
    /// True for members found in the class scope (methods, class vars), false
    /// for harvested `self.*` definitions.
    pub class_var: bool,
}

/// One invocation of a callable with concrete call-site arguments.
#[derive(Debug, Clone)]
pub struct ExecutionEntity {
    pub callee: EntityId,
    pub args: Arguments,
}

#[derive(Debug, Clone)]
pub struct GeneratorEntity {
    pub function: EntityId,
    pub args: Arguments,
}

#[derive(Debug, Clone)]
pub struct ArrayEntity {
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct ModuleEntity {
    pub node: NodeId,
}

impl Entity {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Entity::Class(_) => "class",
            Entity::Function(_) => "function",
            Entity::Instance(_) => "instance",
            Entity::InstanceElement(_) => "instance-element",
            Entity::Execution(_) => "execution",
            Entity::Generator(_) => "generator",
            Entity::Array(_) => "array",
            Entity::Module(_) => "module",
        }
    }

    /// The intern key identifying this entity.
    pub fn key(&self) -> EntityKey {
        match self {
            Entity::Class(c) => EntityKey::Class(c.node),
            Entity::Function(f) => EntityKey::Function(f.node, f.decorated),
            Entity::Instance(i) => EntityKey::Instance(i.class, i.args, i.literal.clone()),
            Entity::InstanceElement(e) => {
                EntityKey::InstanceElement(e.instance, e.member, e.class_var)
            }
            Entity::Execution(e) => EntityKey::Execution(e.callee, e.args),
            Entity::Generator(g) => EntityKey::Generator(g.function, g.args),
            Entity::Array(a) => EntityKey::Array(a.node),
            Entity::Module(m) => EntityKey::Module(m.node),
        }
    }
}

/// Constructor-argument key for the session intern table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Class(NodeId),
    Function(NodeId, bool),
    Instance(EntityId, Arguments, Option<String>),
    InstanceElement(EntityId, EntityId, bool),
    Execution(EntityId, Arguments),
    Generator(EntityId, Arguments),
    Array(NodeId),
    Module(NodeId),
}

/// A serializable summary of an entity, stable across sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Description {
    pub kind: &'static str,
    pub name: Option<String>,
    pub node: Option<NodeId>,
    pub position: Option<crate::syntax::Position>,
}
