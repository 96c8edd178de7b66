use formula_exec::{Dispatcher, ExecMode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn run(value: &str, data: Value) -> Value {
    Dispatcher::default().dispatch_str(value, &data, ExecMode::Default)
}

#[test]
fn non_strings_pass_through() {
    let d = Dispatcher::default();
    for v in [json!(null), json!(0), json!(false), json!([1, "${x}"]), json!({"a": "${x}"})] {
        assert_eq!(d.dispatch(&v, &json!({"x": 1}), ExecMode::Default), v);
    }
}

#[test]
fn raw_prefix_returns_remainder() {
    assert_eq!(run("raw:${x}", json!({"x": 1})), json!("${x}"));
    assert_eq!(run("  raw:hello ", json!({})), json!("hello"));
}

#[test]
fn equals_prefix_evaluates_formula() {
    assert_eq!(run("=1+1", json!({})), json!(2));
    assert_eq!(run("=price * qty", json!({"price": 3, "qty": 4})), json!(12));
    assert_eq!(run("=name | uppercase", json!({"name": "ann"})), json!("ANN"));
}

#[test]
fn whole_and_embedded_formula() {
    let data = json!({"name": "Ann"});
    assert_eq!(run("${name}", data.clone()), json!("Ann"));
    assert_eq!(run("Hi ${name}", data.clone()), json!("Hi Ann"));
    assert_eq!(run("${name | lowercase}", data.clone()), json!("ann"));
    assert_eq!(run("${a} and ${b}", json!({"a": 1, "b": 2})), json!("1 and 2"));
}

#[test]
fn whole_formula_keeps_result_type() {
    assert_eq!(run("${items}", json!({"items": [1, 2]})), json!([1, 2]));
    assert_eq!(run("${n + 1}", json!({"n": 1})), json!(2));
    assert_eq!(run("${missing}", json!({})), json!(null));
}

#[test]
fn emails_stay_literal() {
    assert_eq!(run("user@example.com", json!({})), json!("user@example.com"));
    assert_eq!(run("${user@example.com}", json!({})), json!("user@example.com"));
}

#[test]
fn bare_identifiers_look_up_the_context() {
    assert_eq!(run("name", json!({"name": "Ann"})), json!("Ann"));
    assert_eq!(run("name", json!({})), json!("name"));
    assert_eq!(run("2024", json!({})), json!("2024"));
}

#[test]
fn fallback_formula_for_unmarked_expressions() {
    assert_eq!(run("a > 1 ? 'big' : 'small'", json!({"a": 2})), json!("big"));
    assert_eq!(run("hello world", json!({})), json!("hello world"));
    assert_eq!(run("missing.path", json!({})), json!("missing.path"));
}

#[test]
fn evaluator_prefix() {
    let data = json!({"num1": 40});
    assert_eq!(run("js:data.num1 + 2", data.clone()), json!(42));
    assert_eq!(run("var:num1", data.clone()), json!(40));
    assert_eq!(run("tpl:n=${num1}", data.clone()), json!("n=40"));
    assert_eq!(run("evalFormula:num1 / 8", data), json!(5));
}

#[test]
fn eval_mode_off_only_sniffs_braces() {
    let d = Dispatcher::default();
    let data = json!({"name": "Ann"});
    assert_eq!(d.dispatch_str("=1+1", &data, false), json!("=1+1"));
    assert_eq!(d.dispatch_str("name", &data, false), json!("name"));
    assert_eq!(d.dispatch_str("raw:x", &data, false), json!("raw:x"));
    assert_eq!(d.dispatch_str(" ${name} ", &data, false), json!("Ann"));
    assert_eq!(d.dispatch_str("Hi ${name}", &data, false), json!("Hi Ann"));
}

#[test]
fn eval_mode_default_can_be_toggled_and_overridden() {
    let d = Dispatcher::default();
    d.set_eval_mode_default(false);
    assert!(!d.eval_mode_default());
    assert_eq!(d.dispatch_str("=1+1", &json!({}), ExecMode::Default), json!("=1+1"));
    assert_eq!(d.dispatch_str("=1+1", &json!({}), true), json!(2));
    d.set_eval_mode_default(true);
    assert_eq!(d.dispatch_str("=1+1", &json!({}), ExecMode::Default), json!(2));
}

#[test]
fn evaluator_hint_runs_named_evaluator_on_untrimmed_input() {
    let d = Dispatcher::default();
    assert_eq!(d.dispatch_str("1 + 2", &json!({}), "js"), json!(3));
    // Classification would trim and strip `raw:`; the hint skips both.
    assert_eq!(d.dispatch_str(" x ", &json!({}), "tpl"), json!(" x "));
    assert_eq!(d.dispatch_str("raw:${a}", &json!({"a": 1}), "tpl"), json!("raw:1"));
}

#[test]
fn unknown_evaluator_hint_falls_back_to_classification() {
    let d = Dispatcher::default();
    assert_eq!(d.dispatch_str("=1+1", &json!({}), "nope"), json!(2));
}

#[test]
fn data_context_is_not_mutated() {
    let d = Dispatcher::default();
    let data = json!({"a": {"b": 1}});
    let before = data.clone();
    d.dispatch_str("js:data.a.b + 1", &data, ExecMode::Default);
    d.dispatch_str("${a.b}", &data, ExecMode::Default);
    assert_eq!(data, before);
}

#[test]
fn deeply_nested_input_comes_back_unevaluated() {
    let chain = format!("1{}", "+1".repeat(10_000));
    let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));

    assert_eq!(run(&format!("={chain}"), json!({})), json!(chain));
    assert_eq!(run(&chain, json!({})), json!(chain));
    assert_eq!(run(&format!("={parens}"), json!({})), json!(parens));
    assert_eq!(run(&format!("${{{parens}}}"), json!({})), json!(format!("${{{parens}}}")));

    let embedded = format!("n = ${{{chain}}}");
    assert_eq!(run(&embedded, json!({})), json!(embedded));
}

#[test]
fn filters_apply_to_whole_formulas() {
    let data = json!({"a": 1, "tags": ["x", "y"]});
    assert_eq!(run("${a + 1 | json}", data.clone()), json!("2"));
    assert_eq!(run("${tags[0] + 'z' | uppercase}", data.clone()), json!("XZ"));
    assert_eq!(run("${a > 0 || missing}", data), json!(true));
}
