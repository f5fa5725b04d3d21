//! Drives the full `lex → parse → bind → compile → run` pipeline end to end
//! through [`wisp::run_source`], one test per concrete scenario.

use pretty_assertions::assert_eq;
use wisp::{run_source, InMemorySource};

fn run(text: &str) -> wisp::RunOutput {
    let source = InMemorySource::new("t", text);
    run_source(&source).unwrap_or_else(|diags| panic!("expected a value, got diagnostics: {diags:?}"))
}

#[test]
fn integer_addition() {
    let output = run("1 + 2");
    assert_eq!(output.inspect(), "3");
}

#[test]
fn if_expression_takes_the_true_branch() {
    let output = run("(if true { 2*3 } else { 3 })");
    assert_eq!(output.inspect(), "6");
}

#[test]
fn short_circuit_and_fails_the_type_assertion_on_a_non_bool_rhs() {
    let source = InMemorySource::new("t", "true && 3");
    let diagnostics = run_source(&source).expect_err("3 is not a bool, the AssertType after && must fail");
    assert!(diagnostics.iter().any(|d| d.summary.contains("unexpected type")));
}

#[test]
fn array_literal_preserves_declaration_order() {
    let output = run("[1, 2, 3]");
    assert_eq!(output.inspect(), "[1, 2, 3]");
}

#[test]
fn dict_literal_renders_key_value_pairs() {
    let output = run(r#"["hello": "world", 1: 2]"#);
    assert_eq!(output.inspect(), "{\"hello\": \"world\", 1: 2}");
}

#[test]
fn a_parse_error_short_circuits_before_binding_or_compiling() {
    let source = InMemorySource::new("t", "let = ");
    let diagnostics = run_source(&source).expect_err("malformed let should fail parsing");
    assert!(!diagnostics.is_empty());
}

#[test]
fn forward_referenced_top_level_function_and_let_both_compile_and_run() {
    let output = run("func first() { return second } let second = 41 first() + 1");
    assert_eq!(output.inspect(), "42");
}

#[test]
fn division_by_zero_is_a_runtime_error_not_a_panic() {
    let source = InMemorySource::new("t", "1 / 0");
    let diagnostics = run_source(&source).expect_err("division by zero must fail at runtime");
    assert!(diagnostics.iter().any(|d| d.summary.contains("division by zero")));
}

#[test]
fn wrong_arity_call_is_a_runtime_error() {
    let source = InMemorySource::new("t", "func f(x) { return x } f()");
    let diagnostics = run_source(&source).expect_err("calling a one-arg function with zero args must fail");
    assert!(diagnostics.iter().any(|d| d.summary.contains("wrong arity")));
}
