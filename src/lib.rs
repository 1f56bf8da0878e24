// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A lazy static inference engine for dynamically typed programs.
//!
//! The engine evaluates nothing eagerly: a frontend parses modules into a
//! [`SyntaxTree`], and types are computed only when a statement or name is
//! demanded through the [`Engine`] API. Evaluation follows access chains
//! across entities (classes, instances, executions, generators, literal
//! collections), memoizes per request and degrades to "undetermined" instead
//! of failing when something cannot be known statically.

mod builtins;
mod engine;
mod entity;
mod error;
mod eval;
mod exec;
mod hooks;
mod scope;
mod session;
mod syntax;

pub use engine::{DefinitionSite, Engine};
pub use entity::{
    Arguments, ArrayEntity, ClassEntity, Description, Entity, EntityId, EntitySet,
    ExecutionEntity, FunctionEntity, GeneratorEntity, InstanceElementEntity, InstanceEntity,
    ModuleEntity,
};
pub use error::StructuralError;
pub use hooks::{ImportResolver, NoImports, NoMining, UsageMiner};
pub use scope::{DefSite, NameDef};
pub use session::{Limits, Session};
pub use syntax::{
    ArrayKind, AssignOp, BoundArgs, BoundKind, CallHead, FlowKind, NodeId, NodeKind, NodeStore,
    PathSeg, Position, StarKind, SyntaxTree, Target, Token, TokenRows, TokenSeq,
};

#[cfg(test)]
mod tests;
