//! Tests for loop scopes and the loop context pool

use super::*;
use serde_json::{json, Value};

fn root(state: Value, capacity: usize) -> RuntimeContext {
    let options = ContextOptions {
        loop_pool_capacity: capacity,
        ..ContextOptions::default()
    };
    RuntimeContext::new(state, options).unwrap()
}

fn binding() -> LoopBinding<'static> {
    LoopBinding::default()
}

#[test]
fn test_loop_context_binds_item_and_index() {
    let ctx = root(json!({"total": 0}), 10);
    let scope = create_loop_context(&ctx, binding(), json!({"price": 4}), json!(2));

    assert_eq!(scope.get("item"), Some(json!({"price": 4})));
    assert_eq!(scope.get("index"), Some(json!(2)));
    assert_eq!(scope.get("$item"), Some(json!({"price": 4})));
    assert_eq!(scope.get("$index"), Some(json!(2)));
    assert_eq!(scope.get("total"), Some(json!(0)));
    assert_eq!(ctx.get("item"), None);

    release_loop_context(scope);
}

#[test]
fn test_custom_binding_names() {
    let ctx = root(json!({}), 10);
    let scope = create_loop_context(
        &ctx,
        LoopBinding {
            var: "row",
            index_var: "i",
        },
        json!("a"),
        json!(0),
    );
    assert_eq!(scope.evaluate("row + i").unwrap(), json!("a0"));
    release_loop_context(scope);
}

#[test]
fn test_released_maps_are_reused_and_cleared() {
    let ctx = root(json!({}), 10);
    let scope = create_loop_context(&ctx, binding(), json!(1), json!(0));
    scope.set("scratch", json!(true)).unwrap();
    release_loop_context(scope);

    let scope = create_loop_context(&ctx, binding(), json!(2), json!(1));
    assert_eq!(scope.get("scratch"), None);
    assert_eq!(scope.get("item"), Some(json!(2)));
    release_loop_context(scope);

    let stats = ctx.session().loop_pool().stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.reused, 1);
    assert_eq!(stats.available, 1);
}

#[test]
fn test_pool_is_bounded() {
    let ctx = root(json!({}), 2);
    let scopes: Vec<_> = (0..4)
        .map(|i| create_loop_context(&ctx, binding(), json!(i), json!(i)))
        .collect();
    for scope in scopes {
        release_loop_context(scope);
    }

    let stats = ctx.session().loop_pool().stats();
    assert_eq!(stats.available, 2);
    assert_eq!(stats.discarded, 2);
    assert_eq!(stats.released, 4);
}

#[test]
fn test_retained_scope_is_not_recycled() {
    let ctx = root(json!({}), 10);
    let scope = create_loop_context(&ctx, binding(), json!(1), json!(0));
    let retained = scope.clone();
    release_loop_context(scope);

    let stats = ctx.session().loop_pool().stats();
    assert_eq!(stats.available, 0);
    assert_eq!(stats.discarded, 1);
    // The retained handle still sees its bindings
    assert_eq!(retained.get("item"), Some(json!(1)));
}

#[test]
fn test_loop_variables_do_not_serve_stale_results() {
    let ctx = root(json!({}), 10);
    for (i, expected) in [10, 20, 30].into_iter().enumerate() {
        let scope = create_loop_context(&ctx, binding(), json!(expected / 10), json!(i));
        assert_eq!(scope.evaluate("{{ item * 10 }}").unwrap(), json!(expected));
        release_loop_context(scope);
    }
    assert!(ctx.engine().results().is_empty());
}

#[test]
fn test_loop_variable_shadowing_state() {
    let ctx = root(json!({"item": "state"}), 10);
    assert_eq!(ctx.evaluate("item").unwrap(), json!("state"));

    let scope = create_loop_context(&ctx, binding(), json!("loop"), json!(0));
    assert_eq!(scope.evaluate("item").unwrap(), json!("loop"));
    assert_eq!(ctx.evaluate("item").unwrap(), json!("state"));
    release_loop_context(scope);

    assert_eq!(ctx.evaluate("item").unwrap(), json!("state"));
}

#[test]
fn test_nested_loops_see_outer_bindings() {
    let ctx = root(json!({}), 10);
    let outer = create_loop_context(
        &ctx,
        LoopBinding {
            var: "row",
            index_var: "r",
        },
        json!([1, 2]),
        json!(0),
    );
    let inner = create_loop_context(&outer, binding(), json!(5), json!(1));
    assert_eq!(inner.evaluate("row.length + item + r").unwrap(), json!(7));
    release_loop_context(inner);
    release_loop_context(outer);
    assert_eq!(ctx.session().loop_pool().stats().available, 2);
}
