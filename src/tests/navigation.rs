// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::*;
use crate::*;
use anyhow::Result;

#[test]
fn completions_walk_the_scope_chain() -> Result<()> {
    let mut engine = Engine::new()?;
    let from = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        src.assign(m, "a", |t, st, p| vec![num(t, st, "1", p)]);
        let f = src.func(m, "f", &["arg"]);
        src.assign(f, "local", |t, st, p| vec![num(t, st, "2", p)]);
        src.expr(f, |t, st, p| vec![nm(t, st, "local", p)])
    };
    let names = engine.completions(from)?;
    for expected in ["local", "arg", "a", "f", "len", "getattr"] {
        assert!(names.contains(&expected.to_string()), "missing {expected}");
    }
    // Nearest scope comes first.
    let local_at = names.iter().position(|n| n == "local").unwrap();
    let module_at = names.iter().position(|n| n == "a").unwrap();
    let builtin_at = names.iter().position(|n| n == "len").unwrap();
    assert!(local_at < module_at && module_at < builtin_at);
    Ok(())
}

#[test]
fn visible_names_carry_their_defining_scope() -> Result<()> {
    let mut engine = Engine::new()?;
    let (m, f, from) = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        src.assign(m, "a", |t, st, p| vec![num(t, st, "1", p)]);
        let f = src.func(m, "f", &["arg"]);
        src.assign(f, "local", |t, st, p| vec![num(t, st, "2", p)]);
        let from = src.expr(f, |t, st, p| vec![nm(t, st, "local", p)]);
        (m, f, from)
    };
    let names = engine.visible_names(from)?;
    for (scope, name) in [(f, "local"), (f, "arg"), (m, "a"), (m, "f")] {
        assert!(
            names.iter().any(|(s, n)| *s == scope && n == name),
            "missing {name}"
        );
    }
    // Builtins are contributed by their own module, not the caller's.
    let (len_scope, _) = names.iter().find(|(_, n)| n == "len").unwrap();
    assert_ne!(*len_scope, m);
    Ok(())
}

#[test]
fn resolve_name_describes_results() -> Result<()> {
    let mut engine = Engine::new()?;
    let from = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        src.assign(m, "a", |t, st, p| vec![num(t, st, "1", p)]);
        src.expr(m, |t, st, p| vec![nm(t, st, "a", p)])
    };
    assert_instances(&engine.resolve_name(from, "a")?, &["int"]);
    assert!(engine.resolve_name(from, "nowhere")?.is_empty());
    Ok(())
}

#[test]
fn goto_definition_finds_the_assigning_statement() -> Result<()> {
    let mut engine = Engine::new()?;
    let (def, usage) = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let def = src.assign(m, "x", |t, st, p| vec![num(t, st, "1", p)]);
        let usage = src.assign(m, "y", |t, st, p| vec![nm(t, st, "x", p)]);
        (def, usage)
    };
    let sites = engine.goto_definition(usage, None)?;
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].node, def);
    Ok(())
}

#[test]
fn goto_definition_locates_members_by_name() -> Result<()> {
    let mut engine = Engine::new()?;
    let (tree_v_pos, usage) = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        let c = src.class(m, "C");
        let v_stmt = src.assign(c, "v", |t, st, p| vec![num(t, st, "1", p)]);
        src.assign(m, "c", |t, st, p| vec![call(t, st, "C", vec![], p)]);
        let usage = src.assign(m, "y", |t, st, p| vec![nm(t, st, "c", p)]);
        (src.t.position(v_stmt).unwrap(), usage)
    };
    let sites = engine.goto_definition(usage, Some("v"))?;
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].name.as_deref(), Some("v"));
    assert_eq!(sites[0].position, tree_v_pos);
    Ok(())
}

#[test]
fn descriptions_serialize_for_tooling() -> Result<()> {
    let mut engine = Engine::new()?;
    let stmt = {
        let mut src = Src::new(engine.tree_mut());
        let m = src.module("main");
        src.assign(m, "a", |t, st, p| vec![num(t, st, "1", p)])
    };
    let descs = engine.evaluate(stmt, None)?;
    let json = serde_json::to_string(&descs)?;
    assert!(json.contains("\"instance\""));
    assert!(json.contains("\"int\""));
    Ok(())
}
