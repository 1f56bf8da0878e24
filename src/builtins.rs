// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The builtin type registry.
//!
//! Literal values and container methods resolve against stub scopes for the
//! builtin types. A full deployment loads real stub sources through the
//! frontend; this default registry constructs a small builtin module
//! programmatically from a static table, which is enough for literal typing,
//! the fixed protocol set and the root-scope functions.

use crate::syntax::{
    ArrayKind, CallHead, NodeId, NodeStore, PathSeg, Position, StarKind, SyntaxTree, Token,
};

use std::collections::HashMap;

use anyhow::Result;
use lazy_static::lazy_static;

/// What a stub method statically returns.
#[derive(Debug, Clone, Copy)]
enum Ret {
    /// No statically known return.
    Unknown,
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

struct MethodStub {
    name: &'static str,
    ret: Ret,
}

struct TypeStub {
    name: &'static str,
    methods: &'static [MethodStub],
}

macro_rules! methods {
    ($(($name:literal, $ret:ident)),* $(,)?) => {
        &[$(MethodStub { name: $name, ret: Ret::$ret }),*]
    };
}

lazy_static! {
    static ref TYPE_STUBS: Vec<TypeStub> = vec![
        TypeStub { name: "object", methods: methods![] },
        TypeStub {
            name: "str",
            methods: methods![
                ("upper", Str),
                ("lower", Str),
                ("strip", Str),
                ("replace", Str),
                ("format", Str),
                ("join", Str),
                ("split", List),
                ("startswith", Bool),
                ("endswith", Bool),
                ("find", Int),
                ("index", Int),
            ],
        },
        TypeStub { name: "int", methods: methods![("bit_length", Int)] },
        TypeStub { name: "float", methods: methods![("is_integer", Bool)] },
        TypeStub { name: "bool", methods: methods![] },
        TypeStub {
            name: "list",
            methods: methods![
                ("append", Unknown),
                ("extend", Unknown),
                ("insert", Unknown),
                ("pop", Unknown),
                ("remove", Unknown),
                ("sort", Unknown),
                ("reverse", Unknown),
                ("count", Int),
                ("index", Int),
            ],
        },
        TypeStub {
            name: "dict",
            methods: methods![
                ("get", Unknown),
                ("keys", List),
                ("values", List),
                ("items", List),
                ("update", Unknown),
                ("pop", Unknown),
                ("copy", Dict),
            ],
        },
        TypeStub {
            name: "set",
            methods: methods![("add", Unknown), ("discard", Unknown), ("union", Unknown)],
        },
        TypeStub { name: "tuple", methods: methods![("count", Int), ("index", Int)] },
    ];

    static ref ROOT_FUNCTIONS: Vec<MethodStub> = vec![
        // `getattr` is special-cased by the execution dispatch; the stub only
        // needs to exist so the name resolves.
        MethodStub { name: "getattr", ret: Ret::Unknown },
        MethodStub { name: "len", ret: Ret::Int },
        MethodStub { name: "repr", ret: Ret::Str },
        MethodStub { name: "isinstance", ret: Ret::Bool },
        MethodStub { name: "hasattr", ret: Ret::Bool },
    ];
}

/// Builtin classes whose element types come from usage mining instead of
/// `__init__` simulation.
pub const CONTAINER_TYPES: &[&str] = &["list", "set"];

/// The installed builtin registry: `lookup(type_name) -> scope` plus one root
/// fallback scope for global builtin functions.
#[derive(Debug, Clone)]
pub struct Builtins {
    module: NodeId,
    types: HashMap<String, NodeId>,
}

impl Builtins {
    /// Construct the stub module inside `tree` and index its classes.
    pub fn install(tree: &mut SyntaxTree) -> Result<Builtins> {
        let module = tree.new_module("builtins");
        tree.mark_builtin(module)?;
        let mut types = HashMap::new();
        let mut line = 1u32;

        for stub in TYPE_STUBS.iter() {
            let class = tree.new_class(module, stub.name, Position::new(line, 0))?;
            line += 1;
            for m in stub.methods {
                let func = tree.new_function(class, m.name, Position::new(line, 4))?;
                tree.new_param(func, "self", StarKind::None, Position::new(line, 8))?;
                line += 1;
                line = add_return_stub(tree, func, m.ret, line)?;
            }
            types.insert(stub.name.to_string(), class);
        }

        for f in ROOT_FUNCTIONS.iter() {
            let func = tree.new_function(module, f.name, Position::new(line, 0))?;
            line += 1;
            line = add_return_stub(tree, func, f.ret, line)?;
        }

        Ok(Builtins { module, types })
    }

    /// The class scope registered for a builtin type name.
    pub fn lookup(&self, type_name: &str) -> Option<NodeId> {
        self.types.get(type_name).copied()
    }

    /// The fallback scope searched after the lexical chain and star imports.
    pub fn root_scope(&self) -> NodeId {
        self.module
    }
}

/// True if `scope` belongs to the builtin stub module.
pub fn in_builtin_module<S: NodeStore>(store: &S, scope: NodeId) -> Result<bool> {
    let module = store.module_of(scope)?;
    Ok(match store.kind(module)? {
        crate::syntax::NodeKind::Module(m) => m.builtin,
        _ => false,
    })
}

fn add_return_stub(tree: &mut SyntaxTree, func: NodeId, ret: Ret, line: u32) -> Result<u32> {
    let pos = Position::new(line, 8);
    let token = match ret {
        Ret::Unknown => None,
        Ret::Str => {
            let call = tree.new_call(func, CallHead::Str(String::new()), vec![], pos);
            Some(Token::Call(call))
        }
        Ret::Int => {
            let call = tree.new_call(func, CallHead::Num("0".to_string()), vec![], pos);
            Some(Token::Call(call))
        }
        Ret::Float => {
            let call = tree.new_call(func, CallHead::Num("0.0".to_string()), vec![], pos);
            Some(Token::Call(call))
        }
        Ret::Bool => {
            // `bool` has no literal form here; call the class.
            let stmt_args = tree.new_array(func, ArrayKind::Arg, vec![], vec![], pos);
            let call = tree.new_call(
                func,
                CallHead::Name("bool".to_string()),
                vec![PathSeg::CallArgs(stmt_args)],
                pos,
            );
            Some(Token::Call(call))
        }
        Ret::List => {
            let arr = tree.new_array(func, ArrayKind::List, vec![], vec![], pos);
            let call = tree.new_call(func, CallHead::Array(arr), vec![], pos);
            Some(Token::Call(call))
        }
        Ret::Dict => {
            let arr = tree.new_array(func, ArrayKind::Dict, vec![], vec![], pos);
            let call = tree.new_call(func, CallHead::Array(arr), vec![], pos);
            Some(Token::Call(call))
        }
    };
    if let Some(token) = token {
        let stmt = tree.new_statement(func, pos)?;
        tree.set_expr(stmt, vec![vec![token]])?;
        tree.add_return(func, stmt, false)?;
        Ok(line + 1)
    } else {
        Ok(line)
    }
}
