// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::*;
use crate::*;
use anyhow::Result;

#[test]
fn positional_arguments_bind_in_order() -> Result<()> {
    // def f(a, b): return b
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &["a", "b"]);
        src.ret(f, |t, st, p| vec![nm(t, st, "b", p)]);
        src.assign(m, "y", |t, st, p| {
            let first = vec![num(t, st, "1", p)];
            let second = vec![s(t, st, "s", p)];
            vec![call(t, st, "f", vec![first, second], p)]
        })
    };
    assert_instances(&engine.evaluate(stmt, None)?, &["str"]);
    Ok(())
}

#[test]
fn keyword_arguments_bind_by_name() -> Result<()> {
    // f(b="s", a=1)
    let mut engine = Engine::new()?;
    let (got_a, got_b) = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &["a", "b"]);
        src.ret(f, |t, st, p| vec![nm(t, st, "b", p)]);
        let g = src.func(m, "g", &["a", "b"]);
        src.ret(g, |t, st, p| vec![nm(t, st, "a", p)]);
        let rows = |t: &mut SyntaxTree, st: NodeId, p: Position| {
            let kw_b = {
                let name = nm(t, st, "b", p);
                let value = s(t, st, "s", p);
                vec![name, Token::op("="), value]
            };
            let kw_a = {
                let name = nm(t, st, "a", p);
                let value = num(t, st, "1", p);
                vec![name, Token::op("="), value]
            };
            vec![kw_b, kw_a]
        };
        let got_b = src.assign(m, "y", |t, st, p| {
            let r = rows(t, st, p);
            vec![call(t, st, "f", r, p)]
        });
        let got_a = src.assign(m, "z", |t, st, p| {
            let r = rows(t, st, p);
            vec![call(t, st, "g", r, p)]
        });
        (got_a, got_b)
    };
    assert_instances(&engine.evaluate(got_b, None)?, &["str"]);
    assert_instances(&engine.evaluate(got_a, None)?, &["int"]);
    Ok(())
}

#[test]
fn star_params_collect_a_tuple() -> Result<()> {
    // def f(*args): return args[0]
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &["*args"]);
        src.ret(f, |t, st, p| {
            let idx = vec![num(t, st, "0", p)];
            vec![index_of(t, st, "args", vec![idx], p)]
        });
        src.assign(m, "y", |t, st, p| {
            let first = vec![num(t, st, "1", p)];
            let second = vec![s(t, st, "s", p)];
            vec![call(t, st, "f", vec![first, second], p)]
        })
    };
    assert_instances(&engine.evaluate(stmt, None)?, &["int"]);
    Ok(())
}

#[test]
fn double_star_params_collect_a_dict() -> Result<()> {
    // def f(**kw): return kw["k"]
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &["**kw"]);
        src.ret(f, |t, st, p| {
            let idx = vec![s(t, st, "k", p)];
            vec![index_of(t, st, "kw", vec![idx], p)]
        });
        src.assign(m, "y", |t, st, p| {
            let kw = {
                let name = nm(t, st, "k", p);
                let value = num(t, st, "1", p);
                vec![name, Token::op("="), value]
            };
            vec![call(t, st, "f", vec![kw], p)]
        })
    };
    assert_instances(&engine.evaluate(stmt, None)?, &["int"]);
    Ok(())
}

#[test]
fn unbound_params_fall_back_to_defaults() -> Result<()> {
    // def f(a=1): return a
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &["a"]);
        src.param_default(f, 0, |t, param, p| vec![num(t, param, "1", p)]);
        src.ret(f, |t, st, p| vec![nm(t, st, "a", p)]);
        src.assign(m, "y", |t, st, p| vec![call(t, st, "f", vec![], p)])
    };
    assert_instances(&engine.evaluate(stmt, None)?, &["int"]);
    Ok(())
}

#[test]
fn spread_arguments_unpack_literal_tuples() -> Result<()> {
    // f(*(1, "s"))
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &["a", "b"]);
        src.ret(f, |t, st, p| vec![nm(t, st, "b", p)]);
        src.assign(m, "y", |t, st, p| {
            let row = {
                let rows = {
                    let r0 = vec![num(t, st, "1", p)];
                    let r1 = vec![s(t, st, "s", p)];
                    vec![r0, r1]
                };
                let tuple = arr(t, st, ArrayKind::Tuple, rows, p);
                vec![Token::op("*"), tuple]
            };
            vec![call(t, st, "f", vec![row], p)]
        })
    };
    assert_instances(&engine.evaluate(stmt, None)?, &["str"]);
    Ok(())
}

#[test]
fn builtin_method_stubs_return_their_type() -> Result<()> {
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        src.assign(m, "y", |t, st, p| {
            let args = args_node(t, st, vec![], p);
            vec![chain(
                t,
                st,
                CallHead::Str("abc".to_string()),
                vec![PathSeg::Name("upper".to_string()), PathSeg::CallArgs(args)],
                p,
            )]
        })
    };
    assert_instances(&engine.evaluate(stmt, None)?, &["str"]);
    Ok(())
}

#[test]
fn self_recursion_terminates() -> Result<()> {
    // def f(): return f()
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &[]);
        src.ret(f, |t, st, p| vec![call(t, st, "f", vec![], p)]);
        src.assign(m, "y", |t, st, p| vec![call(t, st, "f", vec![], p)])
    };
    assert!(engine.evaluate(stmt, None)?.is_empty());
    Ok(())
}

#[test]
fn mutual_recursion_terminates() -> Result<()> {
    // def f(): return g()
    // def g(): return f()
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &[]);
        src.ret(f, |t, st, p| vec![call(t, st, "g", vec![], p)]);
        let g = src.func(m, "g", &[]);
        src.ret(g, |t, st, p| vec![call(t, st, "f", vec![], p)]);
        src.assign(m, "y", |t, st, p| vec![call(t, st, "f", vec![], p)])
    };
    assert!(engine.evaluate(stmt, None)?.is_empty());
    Ok(())
}

#[test]
fn execution_budget_cuts_off_inference() -> Result<()> {
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let f = src.func(m, "f", &[]);
        src.ret(f, |t, st, p| vec![num(t, st, "1", p)]);
        src.assign(m, "y", |t, st, p| vec![call(t, st, "f", vec![], p)])
    };
    engine.set_limits(Limits {
        max_executions: 0,
        ..Limits::default()
    });
    assert!(engine.evaluate(stmt, None)?.is_empty());
    engine.set_limits(Limits::default());
    assert_instances(&engine.evaluate(stmt, None)?, &["int"]);
    Ok(())
}
