//! Tests for `set` and the array actions

use super::helpers::*;
use crate::error::ErrorCode;
use serde_json::json;

#[tokio::test]
async fn test_set_literal_and_interpolated() {
    let ctx = context(json!({"count": 2, "user": {}}));
    run(
        &ctx,
        json!([
            {"type": "set", "path": "doubled", "value": "{{ count * 2 }}"},
            {"type": "set", "path": "user.name", "value": "Ada"},
            {"type": "set", "path": "label", "value": "Count: {{ count }}"},
            {"type": "set", "path": "raw", "value": {"keep": "{{ count }}"}},
        ]),
    )
    .await
    .unwrap();

    assert_eq!(
        ctx.state(),
        json!({
            "count": 2,
            "doubled": 4,
            "user": {"name": "Ada"},
            "label": "Count: 2",
            "raw": {"keep": "{{ count }}"},
        })
    );
}

#[tokio::test]
async fn test_set_notifies_state_change() {
    let (ctx, recorded) = recording_context(json!({}));
    run(&ctx, json!([{"type": "set", "path": "a.b", "value": 1}]))
        .await
        .unwrap();
    assert_eq!(*recorded.changes.lock(), vec!["a.b".to_string()]);
}

#[tokio::test]
async fn test_push_value_and_items() {
    let ctx = context(json!({"todos": [], "draft": "milk", "more": ["eggs", "tea"]}));
    run(
        &ctx,
        json!([
            {"type": "push", "path": "todos", "value": {"text": "{{ draft }}", "done": false}},
            {"type": "push", "path": "todos", "items": "{{ more }}"},
        ]),
    )
    .await
    .unwrap();
    assert_eq!(
        ctx.get_path("todos").unwrap(),
        json!([{"text": "milk", "done": false}, "eggs", "tea"])
    );
}

#[tokio::test]
async fn test_pop_shift_unshift() {
    let ctx = context(json!({"xs": [1, 2, 3, 4]}));
    run(
        &ctx,
        json!([
            {"type": "pop", "path": "xs"},
            {"type": "shift", "path": "xs"},
            {"type": "unshift", "path": "xs", "items": [7, 8]},
        ]),
    )
    .await
    .unwrap();
    assert_eq!(ctx.get_path("xs").unwrap(), json!([7, 8, 2, 3]));

    // Empty arrays are left alone
    let ctx = context(json!({"xs": []}));
    run(
        &ctx,
        json!([{"type": "pop", "path": "xs"}, {"type": "shift", "path": "xs"}]),
    )
    .await
    .unwrap();
    assert_eq!(ctx.get_path("xs").unwrap(), json!([]));
}

#[tokio::test]
async fn test_splice_evaluates_arguments() {
    let ctx = context(json!({"xs": ["a", "b", "c", "d"], "at": 1, "name": "z"}));
    run(
        &ctx,
        json!([{
            "type": "splice",
            "path": "xs",
            "start": "{{ at }}",
            "deleteCount": "{{ at + 1 }}",
            "items": ["{{ name }}", {"n": "{{ at }}"}],
        }]),
    )
    .await
    .unwrap();
    assert_eq!(ctx.get_path("xs").unwrap(), json!(["a", "z", {"n": 1}, "d"]));
}

#[tokio::test]
async fn test_splice_defaults_and_negative_start() {
    let ctx = context(json!({"xs": [1, 2, 3, 4, 5]}));
    run(&ctx, json!([{"type": "splice", "path": "xs", "start": -2}]))
        .await
        .unwrap();
    assert_eq!(ctx.get_path("xs").unwrap(), json!([1, 2, 3]));

    run(
        &ctx,
        json!([{"type": "splice", "path": "xs", "start": 1, "deleteCount": 0, "items": [9]}]),
    )
    .await
    .unwrap();
    assert_eq!(ctx.get_path("xs").unwrap(), json!([1, 9, 2, 3]));
}

#[tokio::test]
async fn test_array_action_on_non_array_fails() {
    let ctx = context(json!({"name": "Ada"}));
    for action in [
        json!({"type": "push", "path": "name", "value": 1}),
        json!({"type": "pop", "path": "missing"}),
        json!({"type": "push", "path": "name", "items": 3}),
    ] {
        let err = run_err(&ctx, json!([action])).await;
        assert_eq!(err.code(), ErrorCode::ActionInvalidParam);
        assert_eq!(err.context().action.as_ref(), Some(&action));
    }
}

#[tokio::test]
async fn test_array_mutation_recomputes_dependent_expressions() {
    let ctx = context(json!({"items": [{"done": true}, {"done": false}]}));
    assert_eq!(ctx.evaluate("{{ items.length }}").unwrap(), json!(2));
    assert_eq!(ctx.evaluate("{{ items[0].done }}").unwrap(), json!(true));

    for (action, length) in [
        (json!({"type": "push", "path": "items", "value": {"done": false}}), 3),
        (json!({"type": "shift", "path": "items"}), 2),
        (json!({"type": "unshift", "path": "items", "value": {"done": false}}), 3),
        (json!({"type": "pop", "path": "items"}), 2),
        (json!({"type": "splice", "path": "items", "start": 0, "deleteCount": 1}), 1),
    ] {
        run(&ctx, json!([action])).await.unwrap();
        assert_eq!(ctx.evaluate("{{ items.length }}").unwrap(), json!(length));
    }
    assert_eq!(
        ctx.evaluate("{{ items[0].done }}").unwrap(),
        ctx.get_path("items.0.done").unwrap()
    );
}

#[tokio::test]
async fn test_reserved_writes() {
    let ctx = context(json!({}));
    let err = run_err(&ctx, json!([{"type": "set", "path": "$methods", "value": {}}])).await;
    assert_eq!(err.code(), ErrorCode::ExpressionUnsafeAccess);

    for key in ["$event", "$item", "$index", "$self", "$parent", "$siblings", "$children"] {
        run(&ctx, json!([{"type": "set", "path": key, "value": 1}]))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_set_rejects_huge_array_index() {
    let ctx = context(json!({"xs": []}));
    for path in ["xs.18446744073709551615", "xs.100000000"] {
        let err = run_err(&ctx, json!([{"type": "set", "path": path, "value": 1}])).await;
        assert_eq!(err.code(), ErrorCode::ActionInvalidParam, "path {:?}", path);
    }
    assert_eq!(ctx.get_path("xs").unwrap(), json!([]));
}
