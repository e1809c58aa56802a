//! Rill Parse - lexer and recursive-descent parser.
//!
//! [`parse`] turns source text into an immutable [`Script`]: an AST with
//! resolved variable slots, frozen per-function scopes, and folded
//! constant literals. The accepted language surface is controlled per
//! call by [`Features`].

mod cursor;
pub mod error;
mod grammar;
mod lexer;

use std::sync::Arc;

use rill_ir::{Features, Script};

pub use error::{ParseError, ParseErrorKind};
pub use lexer::{tokenize, Token, TokenKind};

use grammar::Parser;

/// Parse `source` into a script taking the named parameters.
///
/// Parameters occupy the leading frame slots in the given order, so two
/// sources differing only in parameter order compile to different
/// scripts.
pub fn parse(source: &str, params: &[&str], features: Features) -> Result<Script, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, features);
    parser.begin_function();
    for name in params {
        parser.declare_parameter(name);
    }
    let body = parser.parse_program();
    let scope = parser.end_function();
    let body = body?;
    Ok(Script::new(
        body,
        scope,
        features,
        Arc::from(source),
        params.iter().map(|p| Arc::from(*p)).collect(),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use rill_ir::{Constant, Expr, ExprKind, VarRef};

    fn parse_ok(src: &str) -> Script {
        match parse(src, &[], Features::default()) {
            Ok(script) => script,
            Err(err) => panic!("parse failed for {src:?}: {err}"),
        }
    }

    fn body_of(script: &Script) -> &[Expr] {
        match &script.body().kind {
            ExprKind::Block(stmts) => stmts,
            other => panic!("expected block body, got {other:?}"),
        }
    }

    #[test]
    fn literal_expression_folds_to_constant() {
        let script = parse_ok("42");
        let body = body_of(&script);
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].as_constant(), Some(&Constant::Int(42)));
    }

    #[test]
    fn constant_array_literal_folds() {
        let script = parse_ok("[1, 2.5, 'x', [true]]");
        let body = body_of(&script);
        assert!(matches!(
            body[0].as_constant(),
            Some(Constant::Array(items)) if items.len() == 4
        ));
    }

    #[test]
    fn array_with_variable_does_not_fold() {
        let script = parse_ok("[1, x]");
        let body = body_of(&script);
        assert!(matches!(body[0].kind, ExprKind::ArrayLit(_)));
    }

    #[test]
    fn empty_map_literal() {
        let script = parse_ok("{:}");
        let body = body_of(&script);
        assert!(matches!(
            body[0].as_constant(),
            Some(Constant::Map(entries)) if entries.is_empty()
        ));
    }

    #[test]
    fn precedence_mul_binds_over_add() {
        let script = parse_ok("a + b * c");
        let body = body_of(&script);
        let ExprKind::Binary { op, rhs, .. } = &body[0].kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, rill_ir::BinaryOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: rill_ir::BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn ternary_is_right_associative() {
        let script = parse_ok("a ? 1 : b ? 2 : 3");
        let body = body_of(&script);
        let ExprKind::Ternary { other, .. } = &body[0].kind else {
            panic!("expected ternary");
        };
        assert!(matches!(other.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn parameters_resolve_to_leading_slots() {
        let script = parse("x + y", &["x", "y"], Features::default()).unwrap();
        assert_eq!(script.scope().param_count(), 2);
        let body = body_of(&script);
        let ExprKind::Binary { lhs, rhs, .. } = &body[0].kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExprKind::Var(VarRef::Local(0))));
        assert!(matches!(rhs.kind, ExprKind::Var(VarRef::Local(1))));
    }

    #[test]
    fn free_name_resolves_to_global() {
        let script = parse_ok("price * 2");
        let body = body_of(&script);
        let ExprKind::Binary { lhs, .. } = &body[0].kind else {
            panic!("expected binary");
        };
        assert!(
            matches!(&lhs.kind, ExprKind::Var(VarRef::Global(name)) if name.as_ref() == "price")
        );
    }

    #[test]
    fn declared_local_resolves_to_slot() {
        let script = parse_ok("var x = 1; x + 1");
        let body = body_of(&script);
        assert!(matches!(body[0].kind, ExprKind::Decl { slot: 0, .. }));
        let ExprKind::Binary { lhs, .. } = &body[1].kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExprKind::Var(VarRef::Local(0))));
    }

    #[test]
    fn lambda_captures_enclosing_local() {
        let script = parse_ok("var n = 3; (x) -> x + n");
        let body = body_of(&script);
        let ExprKind::Lambda(lambda) = &body[1].kind else {
            panic!("expected lambda");
        };
        assert_eq!(lambda.scope.param_count(), 1);
        assert_eq!(lambda.scope.captures().len(), 1);
        assert_eq!(lambda.scope.captures()[0].outer_slot, 0);
        let outer = script.scope().symbol(0).unwrap();
        assert!(outer.is_captured());
    }

    #[test]
    fn bare_ident_lambda_parses() {
        let script = parse_ok("x -> x * x");
        let body = body_of(&script);
        assert!(matches!(body[0].kind, ExprKind::Lambda(_)));
    }

    #[test]
    fn parenthesized_expression_is_not_a_lambda() {
        let script = parse_ok("(a + b) * c");
        let body = body_of(&script);
        assert!(matches!(
            body[0].kind,
            ExprKind::Binary {
                op: rill_ir::BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn method_call_and_property_are_distinct() {
        let script = parse_ok("a.b; a.b()");
        let body = body_of(&script);
        assert!(matches!(body[0].kind, ExprKind::Property { .. }));
        assert!(matches!(body[1].kind, ExprKind::MethodCall { .. }));
    }

    #[test]
    fn safe_navigation_marks_links() {
        let script = parse_ok("a?.b?[0]");
        let body = body_of(&script);
        let ExprKind::Index { target, safe, .. } = &body[0].kind else {
            panic!("expected index");
        };
        assert!(*safe);
        assert!(matches!(target.kind, ExprKind::Property { safe: true, .. }));
    }

    #[test]
    fn foreach_and_classic_for_disambiguate() {
        let script = parse_ok("for (var x : items) x; for (var i = 0; i < 3; i += 1) i");
        let body = body_of(&script);
        assert!(matches!(body[0].kind, ExprKind::ForEach { .. }));
        assert!(matches!(body[1].kind, ExprKind::For { .. }));
    }

    #[test]
    fn switch_parses_cases_and_default() {
        let script = parse_ok("switch (x) { case 1: 'a'; break; default: 'z' }");
        let body = body_of(&script);
        let ExprKind::Switch { cases, .. } = &body[0].kind else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(cases[0].test.is_some());
        assert!(cases[1].test.is_none());
    }

    #[test]
    fn try_catch_binds_slot() {
        let script = parse_ok("try { risky() } catch (e) { e }");
        let body = body_of(&script);
        let ExprKind::Try { catch_var, .. } = &body[0].kind else {
            panic!("expected try");
        };
        assert!(catch_var.is_some());
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let err = parse("break", &[], Features::default()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BreakOutsideLoop);
    }

    #[test]
    fn continue_outside_loop_is_rejected() {
        let err = parse(
            "while (true) { var f = () -> { continue; }; }",
            &[],
            Features::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ContinueOutsideLoop);
    }

    #[test]
    fn break_inside_switch_is_allowed() {
        parse_ok("switch (x) { case 1: break; }");
    }

    #[test]
    fn const_assignment_is_a_parse_error() {
        let err = parse("const k = 1; k = 2", &[], Features::default()).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::ConstAssign { .. }));
    }

    #[test]
    fn const_requires_initializer() {
        assert!(parse("const k", &[], Features::default()).is_err());
    }

    #[test]
    fn lexical_redeclaration_is_rejected() {
        let err = parse("let x = 1; let x = 2", &[], Features::default()).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Redeclared { .. }));
    }

    #[test]
    fn var_redeclaration_reuses_slot() {
        parse_ok("var x = 1; var x = 2");
    }

    #[test]
    fn sibling_blocks_allow_same_lexical_name() {
        parse_ok("{ let x = 1; } { let x = 2; }");
    }

    #[test]
    fn invalid_assignment_target_is_rejected() {
        let err = parse("1 + 2 = 3", &[], Features::default()).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidAssignTarget);
    }

    #[test]
    fn expression_only_rejects_loops_and_writes() {
        let features = Features::expression_only();
        assert!(matches!(
            parse("while (true) 1", &[], features).unwrap_err().kind,
            ParseErrorKind::FeatureDisabled { .. }
        ));
        assert!(matches!(
            parse("x = 1", &[], features).unwrap_err().kind,
            ParseErrorKind::FeatureDisabled { .. }
        ));
        assert!(matches!(
            parse("() -> 1", &[], features).unwrap_err().kind,
            ParseErrorKind::FeatureDisabled { .. }
        ));
        // Reads, member access, and method calls stay available.
        parse("a.b.c(d) + 1", &[], features).unwrap();
    }

    #[test]
    fn local_assignment_needs_no_side_effects_feature() {
        let features = Features::expression_only() | Features::LEXICAL;
        parse("let x = 1; x + 1", &[], features).unwrap();
    }

    #[test]
    fn constructors_are_gated() {
        assert!(matches!(
            parse("new 'list'()", &[], Features::expression_only())
                .unwrap_err()
                .kind,
            ParseErrorKind::FeatureDisabled { .. }
        ));
        parse_ok("new 'list'(1, 2)");
    }

    #[test]
    fn unterminated_input_reports_eof() {
        let err = parse("1 +", &[], Features::default()).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof { .. }));
    }

    #[test]
    fn spans_point_into_source() {
        let src = "aaa + bbb";
        let script = parse(src, &[], Features::default()).unwrap();
        let body = body_of(&script);
        let span = body[0].span;
        assert_eq!(&src[span.start as usize..span.end as usize], "aaa + bbb");
    }
}
