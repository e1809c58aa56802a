//! Engine-level behavior tests: compilation, caching, evaluation
//! policy, and concurrency over the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rill::{
    Context, Engine, EvalErrorKind, Features, MapContext, ParseErrorKind, Value,
};

fn eval(src: &str) -> Value {
    let engine = Engine::new();
    let mut ctx = MapContext::new();
    match engine.eval(src, &mut ctx) {
        Ok(v) => v,
        Err(err) => panic!("evaluation failed for {src:?}: {err}"),
    }
}

#[test]
fn independent_frames_share_only_the_context() {
    let engine = Engine::new();
    let script = engine
        .compile("var local = n; shared = shared + n; local", &["n"])
        .unwrap();
    let mut ctx = MapContext::new().with("shared", Value::Int(0));

    let a = engine
        .execute(&script, &mut ctx, vec![Value::Int(5)])
        .unwrap();
    let b = engine
        .execute(&script, &mut ctx, vec![Value::Int(7)])
        .unwrap();

    // Locals never leak between evaluations; context mutations do.
    assert_eq!(a, Value::Int(5));
    assert_eq!(b, Value::Int(7));
    assert_eq!(ctx.get("shared"), Some(Value::Int(12)));
    assert_eq!(ctx.get("local"), None);
}

#[test]
fn sibling_blocks_resolve_their_own_symbols() {
    let out = eval(
        "var first = null;
         var second = null;
         { let x = 'a'; first = x; }
         { let x = 'b'; second = x; }
         first + second",
    );
    assert_eq!(out, Value::string("ab"));
}

#[test]
fn capture_is_by_reference() {
    let out = eval("var x = 1; var f = () -> x; x = 2; f()");
    assert_eq!(out, Value::Int(2));
}

#[test]
fn arithmetic_ladder() {
    assert_eq!(eval("'3' + '4'"), Value::Int(7));
    assert_eq!(eval("'3.0' + '4'"), Value::Float(7.0));
    assert_eq!(eval("'a' + 'b'"), Value::string("ab"));
    assert_eq!(eval("null + null"), Value::Int(0));
    assert_eq!(eval("5 % 0"), Value::Int(0));
}

#[test]
fn short_circuit_skips_the_function_call() {
    let out = eval(
        "var called = false;
         var sideEffect = () -> { called = true; 1 };
         false && sideEffect();
         true || sideEffect();
         called",
    );
    assert_eq!(out, Value::Bool(false));
}

#[test]
fn cache_identity_includes_parameter_order() {
    let engine = Engine::new();
    let xy = engine.compile("x - y", &["x", "y"]).unwrap();
    let yx = engine.compile("x - y", &["y", "x"]).unwrap();
    assert!(!Arc::ptr_eq(&xy, &yx));
    assert_eq!(engine.cache().size(), 2);

    let mut ctx = MapContext::new();
    let args = vec![Value::Int(2), Value::Int(1)];
    assert_eq!(
        engine.execute(&xy, &mut ctx, args.clone()).unwrap(),
        Value::Int(1)
    );
    // Same positional values, swapped names: x=1, y=2.
    assert_eq!(
        engine.execute(&yx, &mut ctx, args).unwrap(),
        Value::Int(-1)
    );
}

#[test]
fn recompiling_identical_source_hits_the_cache() {
    let engine = Engine::new();
    let a = engine.compile("1 + 1", &[]).unwrap();
    let b = engine.compile("1 + 1", &[]).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(engine.cache().size(), 1);
    engine.cache().clear();
    assert_eq!(engine.cache().size(), 0);
}

#[test]
fn cache_evicts_by_recency_under_pressure() {
    let engine = Engine::builder().cache_capacity(2).build();
    let first = engine.compile("1", &[]).unwrap();
    engine.compile("2", &[]).unwrap();
    // Re-touch "1", then push "3" to evict "2".
    engine.compile("1", &[]).unwrap();
    engine.compile("3", &[]).unwrap();
    assert_eq!(engine.cache().size(), 2);
    let again = engine.compile("1", &[]).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

#[test]
fn return_runs_finally_first() {
    let out = eval(
        "var log = '';
         var f = () -> {
             try { log += 'try'; return 'done' } finally { log += '+finally' }
         };
         f();
         log",
    );
    assert_eq!(out, Value::string("try+finally"));
}

#[test]
fn finally_break_overrides_pending_return() {
    let out = eval(
        "var f = () -> {
             while (true) {
                 try { return 'returned' } finally { break }
             }
             'broke'
         };
         f()",
    );
    assert_eq!(out, Value::string("broke"));
}

#[test]
fn strict_engine_raises_where_lenient_resolves_null() {
    let lenient = Engine::new();
    let strict = Engine::builder().strict(true).build();
    let mut ctx = MapContext::new();

    assert_eq!(lenient.eval("missing + 1", &mut ctx).unwrap(), Value::Int(1));
    let err = strict.eval("missing + 1", &mut ctx).unwrap_err();
    assert!(matches!(
        err,
        rill::Error::Eval(e) if matches!(e.kind, EvalErrorKind::UndefinedVariable { .. })
    ));
}

#[test]
fn feature_errors_fail_at_compile_time() {
    let engine = Engine::builder()
        .features(Features::expression_only())
        .build();
    let err = engine.compile("while (true) 1", &[]).unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::FeatureDisabled { .. }));
    // Nothing executes and nothing is cached on a parse error.
    assert_eq!(engine.cache().size(), 0);
}

#[test]
fn parse_errors_carry_position() {
    let engine = Engine::new();
    let err = engine.compile("1 +", &[]).unwrap_err();
    let rendered = Engine::explain_parse("1 +", &err);
    assert!(rendered.contains("line 1"));
}

#[test]
fn uncaught_errors_render_with_source_line() {
    let engine = Engine::builder().strict(true).build();
    let source = "var a = 1;\na + nope";
    let script = engine.compile(source, &[]).unwrap();
    let mut ctx = MapContext::new();
    let err = engine.execute(&script, &mut ctx, Vec::new()).unwrap_err();
    let rendered = engine.explain(&script, &err);
    assert!(rendered.contains("undefined variable 'nope'"));
    assert!(rendered.contains("line 2"));
    assert!(rendered.contains("a + nope"));
}

#[test]
fn cancelled_engine_stops_loops() {
    let flag = Arc::new(AtomicBool::new(true));
    let engine = Engine::builder().cancel_flag(Arc::clone(&flag)).build();
    let mut ctx = MapContext::new();
    let err = engine.eval("while (true) { 1 }", &mut ctx).unwrap_err();
    assert!(matches!(
        err,
        rill::Error::Eval(e) if matches!(e.kind, EvalErrorKind::Cancelled)
    ));
}

#[test]
fn one_script_evaluates_from_multiple_threads() {
    let engine = Arc::new(Engine::new());
    let script = engine
        .compile("var sum = 0; for (var i = 0; i < n; i += 1) sum += i; sum", &["n"])
        .unwrap();

    let mut handles = Vec::new();
    for n in [10i64, 100, 1000] {
        let engine = Arc::clone(&engine);
        let script = Arc::clone(&script);
        handles.push(std::thread::spawn(move || {
            let mut ctx = MapContext::new();
            let out = engine
                .execute(&script, &mut ctx, vec![Value::Int(n)])
                .unwrap();
            (n, out)
        }));
    }
    for handle in handles {
        let (n, out) = handle.join().unwrap();
        assert_eq!(out, Value::Int(n * (n - 1) / 2));
    }
}

#[test]
fn engine_reports_reference_semantics_for_collections() {
    let out = eval(
        "var inner = [1];
         var m = {'xs': inner};
         m.xs.add(2);
         inner.size()",
    );
    assert_eq!(out, Value::Int(2));
}

#[test]
fn expression_only_engine_still_reads_and_calls() {
    let engine = Engine::builder()
        .features(Features::expression_only())
        .build();
    let mut ctx = MapContext::new().with(
        "xs",
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );
    assert_eq!(engine.eval("xs.size()", &mut ctx).unwrap(), Value::Int(3));
}
