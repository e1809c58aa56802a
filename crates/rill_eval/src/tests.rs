//! End-to-end evaluation tests over parsed scripts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rill_ir::Features;

use crate::error::{EvalError, EvalErrorKind};
use crate::{Arithmetic, Context, Evaluator, MapContext, StandardModel, Value};

fn run(src: &str, ctx: &mut MapContext, strict: bool) -> Result<Value, EvalError> {
    let script = rill_parse::parse(src, &[], Features::default()).unwrap();
    let model = StandardModel::new();
    Evaluator::new(Arithmetic::new(strict), ctx, &model).run(&script, Vec::new())
}

fn eval(src: &str) -> Value {
    let mut ctx = MapContext::new();
    match run(src, &mut ctx, false) {
        Ok(v) => v,
        Err(err) => panic!("evaluation failed for {src:?}: {err}"),
    }
}

fn eval_strict(src: &str) -> Result<Value, EvalError> {
    let mut ctx = MapContext::new();
    run(src, &mut ctx, true)
}

#[test]
fn script_yields_last_statement_value() {
    assert_eq!(eval("1; 2; 3"), Value::Int(3));
    assert_eq!(eval("var x = 5; x * 2"), Value::Int(10));
}

#[test]
fn parameters_bind_to_arguments() {
    let script = rill_parse::parse("x - y", &["x", "y"], Features::default()).unwrap();
    let model = StandardModel::new();
    let mut ctx = MapContext::new();
    let mut evaluator = Evaluator::new(Arithmetic::new(false), &mut ctx, &model);
    let out = evaluator
        .run(&script, vec![Value::Int(7), Value::Int(3)])
        .unwrap();
    assert_eq!(out, Value::Int(4));
}

#[test]
fn context_reads_and_writes() {
    let mut ctx = MapContext::new().with("price", Value::Int(40));
    let out = run("total = price * 2; total + 1", &mut ctx, false).unwrap();
    assert_eq!(out, Value::Int(81));
    assert_eq!(ctx.get("total"), Some(Value::Int(80)));
}

#[test]
fn undefined_global_is_null_lenient_error_strict() {
    assert_eq!(eval("missing"), Value::Null);
    let err = eval_strict("missing").unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UndefinedVariable { .. }));
}

#[test]
fn short_circuit_skips_side_effects() {
    let mut ctx = MapContext::new();
    run("false && (hit = 1); true || (hit = 2)", &mut ctx, false).unwrap();
    assert_eq!(ctx.get("hit"), None);
}

#[test]
fn ternary_evaluates_only_taken_branch() {
    let mut ctx = MapContext::new();
    let out = run("true ? (a = 1) : (b = 2)", &mut ctx, false).unwrap();
    assert_eq!(out, Value::Int(1));
    assert!(ctx.has("a"));
    assert!(!ctx.has("b"));
}

#[test]
fn null_coalesce_takes_first_non_null() {
    assert_eq!(eval("null ?? 7"), Value::Int(7));
    assert_eq!(eval("0 ?? 7"), Value::Int(0));
    assert_eq!(eval("false ?? 7"), Value::Bool(false));
}

#[test]
fn closures_capture_by_reference() {
    let out = eval(
        "var n = 0;
         var bump = () -> { n += 1; n };
         bump(); bump();
         n",
    );
    assert_eq!(out, Value::Int(2));
}

#[test]
fn capture_survives_defining_frame() {
    let out = eval(
        "var make = () -> { var c = 10; () -> { c += 1; c } };
         var counter = make();
         counter(); counter()",
    );
    assert_eq!(out, Value::Int(12));
}

#[test]
fn sibling_closures_share_one_cell() {
    let out = eval(
        "var n = 0;
         var inc = () -> n += 1;
         var read = () -> n;
         inc(); inc();
         read()",
    );
    assert_eq!(out, Value::Int(2));
}

#[test]
fn capture_threads_through_intermediate_lambda() {
    let out = eval(
        "var x = 1;
         var outer = () -> () -> x + 1;
         outer()()",
    );
    assert_eq!(out, Value::Int(2));
}

#[test]
fn lambda_arity_is_checked() {
    let err = eval_strict("var f = (a, b) -> a + b; f(1)").unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::ArityMismatch { .. }));
}

#[test]
fn block_scoped_let_restores_shadowed_name() {
    let out = eval(
        "var x = 'outer';
         { let x = 'inner'; }
         x",
    );
    assert_eq!(out, Value::string("outer"));
}

#[test]
fn loops_yield_last_iteration_value() {
    assert_eq!(eval("var i = 0; while (i < 4) { i += 1; i * 10 }"), Value::Int(40));
    assert_eq!(eval("for (var i = 0; i < 3; i += 1) i"), Value::Int(2));
}

#[test]
fn break_stops_continue_advances() {
    let out = eval(
        "var sum = 0;
         for (var i = 0; i < 10; i += 1) {
             if (i == 3) continue;
             if (i == 6) break;
             sum += i;
         }
         sum",
    );
    // 0+1+2+4+5
    assert_eq!(out, Value::Int(12));
}

#[test]
fn do_while_runs_body_at_least_once() {
    assert_eq!(eval("var n = 0; do { n += 1 } while (false); n"), Value::Int(1));
}

#[test]
fn foreach_iterates_list_map_and_string() {
    assert_eq!(eval("var sum = 0; for (var v : [1, 2, 3]) sum += v; sum"), Value::Int(6));
    assert_eq!(
        eval("var sum = 0; for (var v : {'a': 1, 'b': 2}) sum += v; sum"),
        Value::Int(3)
    );
    assert_eq!(
        eval("var out = ''; for (var c : 'abc') out += c; out"),
        Value::string("abc")
    );
    assert_eq!(eval("var n = 0; for (var v : null) n += 1; n"), Value::Int(0));
}

#[test]
fn foreach_snapshot_ignores_body_mutations() {
    let out = eval(
        "var xs = [1, 2, 3];
         var n = 0;
         for (var v : xs) { xs.add(99); n += 1; }
         n",
    );
    assert_eq!(out, Value::Int(3));
}

#[test]
fn return_unwinds_through_loops() {
    let out = eval(
        "var f = () -> {
             for (var i = 0; i < 10; i += 1) {
                 if (i == 2) return 'early';
             }
             'late'
         };
         f()",
    );
    assert_eq!(out, Value::string("early"));
}

#[test]
fn thrown_value_reaches_catch() {
    let out = eval("try { throw 'boom'; 'unreached' } catch (e) { e }");
    assert_eq!(out, Value::string("boom"));
}

#[test]
fn runtime_error_is_catchable_in_strict_mode() {
    let out = eval_strict(
        "try { 1 / 0 } catch (e) { 'caught' }",
    )
    .unwrap();
    assert_eq!(out, Value::string("caught"));
}

#[test]
fn finally_runs_on_normal_and_thrown_paths() {
    let mut ctx = MapContext::new();
    run("try { 1 } finally { ran = true }", &mut ctx, false).unwrap();
    assert_eq!(ctx.get("ran"), Some(Value::Bool(true)));

    let mut ctx = MapContext::new();
    let err = run(
        "try { throw 'x' } finally { ran = true }",
        &mut ctx,
        false,
    )
    .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UserThrown(_)));
    assert_eq!(ctx.get("ran"), Some(Value::Bool(true)));
}

#[test]
fn return_passes_through_finally() {
    let out = eval(
        "var f = () -> {
             try { return 'body' } finally { side = 1 }
         };
         f()",
    );
    assert_eq!(out, Value::string("body"));
}

#[test]
fn finally_signal_overrides_propagating_one() {
    // A break in finally replaces the return that was unwinding.
    let out = eval(
        "var f = () -> {
             while (true) {
                 try { return 'from-try' } finally { break }
             }
             'after-loop'
         };
         f()",
    );
    assert_eq!(out, Value::string("after-loop"));
}

#[test]
fn switch_falls_through_until_break() {
    let src = "var log = '';
         switch (x) {
             case 1: log += 'a';
             case 2: log += 'b'; break;
             default: log += 'z';
         }
         log";
    let mut ctx = MapContext::new().with("x", Value::Int(1));
    assert_eq!(run(src, &mut ctx, false).unwrap(), Value::string("ab"));
    let mut ctx = MapContext::new().with("x", Value::Int(2));
    assert_eq!(run(src, &mut ctx, false).unwrap(), Value::string("b"));
    let mut ctx = MapContext::new().with("x", Value::Int(9));
    assert_eq!(run(src, &mut ctx, false).unwrap(), Value::string("z"));
}

#[test]
fn safe_navigation_shorts_entire_chain() {
    assert_eq!(eval("var m = null; m?.a.b.c"), Value::Null);
    assert_eq!(eval("var m = null; m?[0]"), Value::Null);
    // Once shorted, later argument expressions never run.
    let mut ctx = MapContext::new();
    run("var m = null; m?.f(hit = 1)", &mut ctx, false).unwrap();
    assert!(!ctx.has("hit"));
}

#[test]
fn safe_navigation_still_fails_on_non_null_missing_member_strict() {
    let err = eval_strict("var m = {'a': 1}; m?.missing.x").unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NoSuchMember { .. }));
}

#[test]
fn property_and_index_access() {
    assert_eq!(eval("var m = {'a': 5}; m.a"), Value::Int(5));
    assert_eq!(eval("var m = {'a': 5}; m['a']"), Value::Int(5));
    assert_eq!(eval("var xs = [10, 20]; xs[1]"), Value::Int(20));
    assert_eq!(eval("'hello'[0]"), Value::string("h"));
}

#[test]
fn property_writes_are_reference_visible() {
    let out = eval(
        "var m = {'n': 1};
         var alias = m;
         alias.n = 2;
         m.n",
    );
    assert_eq!(out, Value::Int(2));
}

#[test]
fn compound_member_assignment_reads_once() {
    assert_eq!(eval("var m = {'n': 3}; m.n += 4; m.n"), Value::Int(7));
    assert_eq!(eval("var xs = [1, 2]; xs[0] *= 10; xs[0]"), Value::Int(10));
}

#[test]
fn standard_methods_work() {
    assert_eq!(eval("[3, 1, 2].size()"), Value::Int(3));
    assert_eq!(eval("'Hello'.toUpperCase()"), Value::string("HELLO"));
    assert_eq!(eval("{'a': 1}.containsKey('a')"), Value::Bool(true));
    assert_eq!(eval("[1, 2, 3].contains(2)"), Value::Bool(true));
}

#[test]
fn closure_valued_member_is_invocable() {
    let out = eval("var m = {'f': (x) -> x + 1}; m.f(41)");
    assert_eq!(out, Value::Int(42));
}

#[test]
fn constructors_build_standard_shapes() {
    assert_eq!(eval("new 'list'(1, 2).size()"), Value::Int(2));
    assert_eq!(eval("new 'map'().size()"), Value::Int(0));
    assert_eq!(eval("new 'str'(42)"), Value::string("42"));
}

#[test]
fn arithmetic_ladder_end_to_end() {
    assert_eq!(eval("'3' + '4'"), Value::Int(7));
    assert_eq!(eval("'3.0' + '4'"), Value::Float(7.0));
    assert_eq!(eval("'a' + 'b'"), Value::string("ab"));
    assert_eq!(eval("null + null"), Value::Int(0));
    assert_eq!(eval("5 % 0"), Value::Int(0));
    assert_eq!(eval("5 / 0"), Value::Int(0));
}

#[test]
fn strict_mode_rejects_lenient_fallbacks() {
    assert!(matches!(
        eval_strict("5 / 0").unwrap_err().kind,
        EvalErrorKind::DivisionByZero
    ));
    assert!(matches!(
        eval_strict("null + 1").unwrap_err().kind,
        EvalErrorKind::NullOperand { .. }
    ));
    // null + null stays 0 even in strict mode.
    assert_eq!(eval_strict("null + null").unwrap(), Value::Int(0));
}

#[test]
fn equality_coerces_mixed_numerics() {
    assert_eq!(eval("1 == 1.0"), Value::Bool(true));
    assert_eq!(eval("'2' == 2"), Value::Bool(true));
    assert_eq!(eval("'3.0' == 3"), Value::Bool(true));
    assert_eq!(eval("true == 1"), Value::Bool(true));
}

#[test]
fn errors_carry_spans() {
    let err = eval_strict("1 + 2; nope").unwrap_err();
    let span = err.span.unwrap();
    assert_eq!(span.start, 7);
    assert_eq!(span.end, 11);
}

#[test]
fn cancellation_stops_a_running_loop() {
    // The flag is set before evaluation starts, so the first loop
    // iteration observes it.
    let script = rill_parse::parse("while (true) { 1 }", &[], Features::default()).unwrap();
    let model = StandardModel::new();
    let mut ctx = MapContext::new();
    let flag = AtomicBool::new(true);
    let err = Evaluator::new(Arithmetic::new(false), &mut ctx, &model)
        .with_cancel(&flag)
        .run(&script, Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Cancelled));
}

#[test]
fn cancellation_is_not_catchable() {
    let script = rill_parse::parse(
        "try { while (true) { 1 } } catch (e) { 'caught' }",
        &[],
        Features::default(),
    )
    .unwrap();
    let model = StandardModel::new();
    let mut ctx = MapContext::new();
    let flag = AtomicBool::new(true);
    let err = Evaluator::new(Arithmetic::new(false), &mut ctx, &model)
        .with_cancel(&flag)
        .run(&script, Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Cancelled));
}

#[test]
fn shared_script_evaluates_concurrently() {
    let script = Arc::new(
        rill_parse::parse("var sum = 0; for (var v : xs) sum += v; sum", &[], Features::default())
            .unwrap(),
    );
    let mut handles = Vec::new();
    for i in 0..4i64 {
        let script = Arc::clone(&script);
        handles.push(std::thread::spawn(move || {
            let model = StandardModel::new();
            let mut ctx = MapContext::new().with(
                "xs",
                Value::list(vec![Value::Int(i), Value::Int(i * 10)]),
            );
            Evaluator::new(Arithmetic::new(false), &mut ctx, &model)
                .run(&script, Vec::new())
                .unwrap()
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let i = i as i64;
        assert_eq!(handle.join().unwrap(), Value::Int(i + i * 10));
    }
}

#[test]
fn strict_shading_rejects_unbound_lexical_read() {
    // The declaration never executes, so the slot stays unbound when
    // the read runs. Strict shading turns that into an error instead of
    // letting the shaded context binding show through.
    let features = Features::default() | Features::LEXICAL_SHADE;
    let script = rill_parse::parse("if (false) let x = 1; x", &[], features).unwrap();
    let model = StandardModel::new();
    let mut ctx = MapContext::new().with("x", Value::Int(9));
    let err = Evaluator::new(Arithmetic::new(false), &mut ctx, &model)
        .run(&script, Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UnboundLocal { .. }));
}

#[test]
fn unbound_local_falls_through_to_context() {
    let mut ctx = MapContext::new().with("x", Value::Int(9));
    let out = run("if (false) var x = 1; x", &mut ctx, false);
    // Default shading policy: the unbound slot reads through to the
    // context binding of the same name.
    assert_eq!(out.unwrap(), Value::Int(9));
}

#[test]
fn captured_unbound_local_still_falls_through_to_context() {
    // Capturing the local in a lambda must not make the skipped
    // declaration look bound; both the outer read and the closure read
    // fall through to the context binding.
    let mut ctx = MapContext::new().with("x", Value::Int(9));
    let out = run("if (false) var x = 1; var f = () -> x; f() + x", &mut ctx, false);
    assert_eq!(out.unwrap(), Value::Int(18));
}

#[test]
fn strict_shading_rejects_unbound_captured_lexical_read() {
    let features = Features::default() | Features::LEXICAL_SHADE;
    let script =
        rill_parse::parse("if (false) let x = 1; var f = () -> x; x", &[], features).unwrap();
    let model = StandardModel::new();
    let mut ctx = MapContext::new().with("x", Value::Int(9));
    let err = Evaluator::new(Arithmetic::new(false), &mut ctx, &model)
        .run(&script, Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UnboundLocal { .. }));
}

#[test]
fn cancelled_flag_checked_at_call_boundaries() {
    let script = rill_parse::parse(
        "var f = () -> 1; f()",
        &[],
        Features::default(),
    )
    .unwrap();
    let model = StandardModel::new();
    let mut ctx = MapContext::new();
    let flag = AtomicBool::new(false);
    flag.store(true, Ordering::Relaxed);
    let err = Evaluator::new(Arithmetic::new(false), &mut ctx, &model)
        .with_cancel(&flag)
        .run(&script, Vec::new())
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Cancelled));
}
