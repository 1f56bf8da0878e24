// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::syntax::NodeId;

use thiserror::Error;

/// A broken invariant of the syntax tree handed to the engine.
///
/// These are distinct from "nothing could be inferred": an undetermined
/// result is the empty entity set, while a structural error aborts the
/// current request so the upstream frontend bug is diagnosable.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("node {node:?} does not exist in this tree or session")]
    DanglingNode { node: NodeId },

    #[error("node {node:?} is a {found}, expected a {expected}")]
    UnexpectedKind {
        node: NodeId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("statement {node:?} has no call list")]
    MissingCallList { node: NodeId },

    #[error("attempt to mutate source node {node:?}; only session clones are writable")]
    SourceMutation { node: NodeId },
}
