// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! External collaborators the engine consumes through traits.
//!
//! Import resolution and usage mining are separate subsystems in a full
//! deployment; the engine only needs these narrow surfaces. The defaults do
//! nothing, which degrades the affected lookups to the empty set.

use crate::entity::EntitySet;
use crate::session::Session;
use crate::syntax::NodeId;

/// Resolves import bindings to scope nodes and expands star imports.
pub trait ImportResolver {
    /// Scope nodes (modules, classes, functions) an import definition refers
    /// to. Unresolvable imports return an empty list.
    fn resolve_import(&self, import: NodeId) -> Vec<NodeId> {
        let _ = import;
        vec![]
    }

    /// Modules whose public names are star-imported into `module`.
    fn star_imports(&self, module: NodeId) -> Vec<NodeId> {
        let _ = module;
        vec![]
    }

    /// Replaces re-exported import aliases in an evaluation result with the
    /// entities they ultimately refer to.
    fn strip_aliases(&self, entities: EntitySet) -> EntitySet {
        entities
    }
}

/// An import resolver without any module graph.
#[derive(Debug, Default)]
pub struct NoImports;

impl ImportResolver for NoImports {}

/// Project-wide usage mining: infers types the lazy evaluator cannot see
/// locally by scanning call sites and container mutations elsewhere.
pub trait UsageMiner {
    /// Possible types of a parameter that received no value in the current
    /// call, mined from other call sites of the same callable.
    fn infer_param_types(&self, session: &mut Session, param: NodeId) -> EntitySet {
        let _ = (session, param);
        EntitySet::new()
    }

    /// Element types of a builtin container instance (`list()`, `set()`),
    /// mined from mutations of the constructed value.
    fn infer_container_elements(
        &self,
        session: &mut Session,
        construction: crate::entity::EntityId,
    ) -> EntitySet {
        let _ = (session, construction);
        EntitySet::new()
    }

    /// Types appended to a literal array after construction.
    fn infer_mutations(&self, session: &mut Session, array: NodeId) -> EntitySet {
        let _ = (session, array);
        EntitySet::new()
    }

    /// Notified with the bound parameter nodes of every execution, before its
    /// returns are computed. `params` are session param clones carrying their
    /// call-site bindings.
    fn on_call(&self, session: &Session, callee: NodeId, params: &[NodeId]) {
        let _ = (session, callee, params);
    }
}

/// A usage miner that has mined nothing.
#[derive(Debug, Default)]
pub struct NoMining;

impl UsageMiner for NoMining {}
