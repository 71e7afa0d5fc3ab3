#[cfg(test)]
mod interpreter_tests {
    use lox::lox::{Lox, Report, Status};
    use lox::value::{format_number, Value};
    use pretty_assertions::assert_eq;

    /// Runs `source` in a fresh session, returning stdout and the report.
    fn run(source: &str) -> (String, Report) {
        let mut session = Lox::with_output(Vec::new());
        let report = session.run(source);
        let out = String::from_utf8(session.into_output()).expect("output is UTF-8");

        (out, report)
    }

    fn run_ok(source: &str) -> String {
        let (out, report) = run(source);
        assert_eq!(report.status(), Status::Ok, "report: {:?}", report);

        out
    }

    fn runtime_error(source: &str) -> String {
        let (_, report) = run(source);
        assert_eq!(report.status(), Status::RuntimeError, "report: {:?}", report);

        report
            .runtime_error
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    // ─────────────────────────── end to end ───────────────────────────

    #[test]
    fn test_fib_prints_eight() {
        let out = run_ok(
            "fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } print fib(6);",
        );

        assert_eq!(out, "8\n");
    }

    #[test]
    fn test_interactive_session_echoes_final_expression() {
        let mut session = Lox::with_output(Vec::new()).interactive(true);

        let first = session.run("fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); }");
        assert_eq!(first.status(), Status::Ok);

        let second = session.run("fib(6);");
        assert_eq!(second.status(), Status::Ok);

        let third = session.run("\"text\";");
        assert_eq!(third.status(), Status::Ok);

        let out = String::from_utf8(session.into_output()).expect("output is UTF-8");
        assert_eq!(out, "8\n\"text\"\n");
    }

    #[test]
    fn test_for_loop_accumulates_total() {
        let mut session = Lox::with_output(Vec::new());
        let report =
            session.run("var total = 0; for (var i = 0; i < 5; i = i + 1) { total = total + i; }");

        assert_eq!(report.status(), Status::Ok);
        assert_eq!(session.interpreter().global("total"), Some(Value::Number(10.0)));
    }

    #[test]
    fn test_self_referential_initializer_never_runs() {
        let (out, report) = run("print \"before\";\n{ var a = a; }");

        assert_eq!(report.status(), Status::StaticError);
        assert_eq!(report.exit_code(), 65);
        assert_eq!(out, "");
    }

    // ─────────────────────────── closures ─────────────────────────────

    #[test]
    fn test_closure_observes_later_global_mutation() {
        let out = run_ok("var x = 1; fun f() { return x; } x = 2; print f();");

        assert_eq!(out, "2\n");
    }

    #[test]
    fn test_closures_share_captured_local() {
        let out = run_ok(
            "fun counter() {\n  var n = 0;\n  fun inc() { n = n + 1; return n; }\n  return inc;\n}\nvar c = counter();\nc();\nc();\nprint c();\nvar d = counter();\nprint d();",
        );

        assert_eq!(out, "3\n1\n");
    }

    #[test]
    fn test_closure_captures_declaring_scope_not_later_shadow() {
        let out = run_ok(
            "var a = \"global\";\n{\n  fun show() { print a; }\n  show();\n  var a = \"block\";\n  show();\n  print a;\n}",
        );

        assert_eq!(out, "global\nglobal\nblock\n");
    }

    #[test]
    fn test_nested_block_shadowing() {
        let out = run_ok("{ var n = 1; { var n = 2; print n; } print n; }");

        assert_eq!(out, "2\n1\n");
    }

    #[test]
    fn test_lambda_values() {
        let out = run_ok(
            "var twice = fun (f, x) { return f(f(x)); };\nprint twice(fun (n) { return n * 3; }, 2);\nprint fun () {};",
        );

        assert_eq!(out, "18\n<fn anonymous>\n");
    }

    // ─────────────────────────── classes ──────────────────────────────

    #[test]
    fn test_inherited_and_overridden_methods() {
        let out = run_ok(
            "class A { m() { return \"A.m\"; } n() { return \"A.n\"; } }\nclass B < A { n() { return \"B.n\"; } }\nvar b = B();\nprint b.m();\nprint b.n();",
        );

        assert_eq!(out, "A.m\nB.n\n");
    }

    #[test]
    fn test_super_calls_superclass_method() {
        let out = run_ok(
            "class A { greet() { return \"A\"; } }\nclass B < A { greet() { return \"B\" + super.greet(); } }\nclass C < B { greet() { return \"C\" + super.greet(); } }\nprint C().greet();",
        );

        assert_eq!(out, "CBA\n");
    }

    #[test]
    fn test_init_early_return_yields_instance() {
        let out = run_ok("class C { init() { return; } }\nprint(C());\nvar c = C();\nprint c.init();");

        assert_eq!(out, "C instance\nC instance\n");
    }

    #[test]
    fn test_init_sets_fields_and_methods_bind_this() {
        let out = run_ok(
            "class Point {\n  init(x, y) { this.x = x; this.y = y; }\n  sum() { return this.x + this.y; }\n}\nvar p = Point(1, 2);\nvar s = p.sum;\np.x = 10;\nprint s();\nprint Point;",
        );

        assert_eq!(out, "12\nPoint\n");
    }

    #[test]
    fn test_getters_and_static_methods() {
        let out = run_ok(
            "class Circle {\n  class unit() { return Circle(1); }\n  init(r) { this.r = r; }\n  area { return 3 * this.r * this.r; }\n}\nprint Circle.unit().area;\nprint Circle(2).area;",
        );

        assert_eq!(out, "3\n12\n");
    }

    #[test]
    fn test_class_errors() {
        assert_eq!(
            runtime_error("var NotAClass = 1;\nclass A < NotAClass {}"),
            "[line 2] Superclass must be a class."
        );
        assert_eq!(
            runtime_error("class A {}\nprint A().missing;"),
            "[line 2] Undefined property 'missing'."
        );
        assert_eq!(
            runtime_error("var x = 1;\nprint x.field;"),
            "[line 2] Only instances have properties."
        );
        assert_eq!(
            runtime_error("var x = 1;\nx.field = 2;"),
            "[line 2] Only instances have fields."
        );
    }

    #[test]
    fn test_super_in_static_lambda_is_rejected_before_running() {
        let (out, report) = run(
            "class A { m() { return \"A.m on \" + this.tag; } }\nclass B < A { class s(x) { return fun() { return super.m(); }; } }\nvar a = A();\na.tag = \"arg\";\nprint B.s(a)();",
        );

        assert_eq!(out, "");
        assert_eq!(report.status(), Status::StaticError);
        assert_eq!(
            report.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["[line 2] Error at 'super': Can't use 'super' in a static method."]
        );
    }

    // ─────────────────────────── values ───────────────────────────────

    #[test]
    fn test_stringify() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(Value::Nil.to_string(), "nil");

        assert_eq!(run_ok("print 3.0; print 3.5; print nil; print -0.25;"), "3\n3.5\nnil\n-0.25\n");
    }

    #[test]
    fn test_truthiness_rule() {
        let out = run_ok(
            "print !nil; print !false; print !0; print !\"\";\nprint !true; print !1; print !\"a\"; print !clock;\nif (0) print \"zero truthy\"; else print \"zero falsy\";",
        );

        assert_eq!(
            out,
            "true\ntrue\ntrue\ntrue\nfalse\nfalse\nfalse\nfalse\nzero falsy\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let out = run_ok("print nil or \"yes\"; print 1 and 2; print false and boom;");

        assert_eq!(out, "yes\n2\nfalse\n");
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        let out = run_ok(
            "print 1 + 2 * 3 - 4 / 2;\nprint \"a\" + \"b\";\nprint \"n=\" + 3;\nprint 2.5 + \"!\";\nprint 1 == 1.0;\nprint \"a\" != \"a\";\nprint 1, 2;\nprint true ? 1 : 2;",
        );

        assert_eq!(out, "5\nab\nn=3\n2.5!\ntrue\nfalse\n2\n1\n");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(runtime_error("print 1 / 0;"), "[line 1] Division by zero.");

        let (_, report) = run("print 1 / 0;");
        assert_eq!(report.exit_code(), 70);
    }

    #[test]
    fn test_operand_errors() {
        assert_eq!(runtime_error("print -\"x\";"), "[line 1] Operand must be a number.");
        assert_eq!(runtime_error("print 1 < \"x\";"), "[line 1] Operands must be numbers.");
        assert_eq!(
            runtime_error("print true + nil;"),
            "[line 1] Operands must be two numbers or two strings."
        );
    }

    // ───────────────────────── control flow ───────────────────────────

    #[test]
    fn test_break_leaves_innermost_loop_only() {
        let out = run_ok(
            "for (var i = 0; i < 3; i = i + 1) {\n  for (var j = 0; j < 10; j = j + 1) {\n    if (j == 1) break;\n    print i * 10 + j;\n  }\n}",
        );

        assert_eq!(out, "0\n10\n20\n");
    }

    #[test]
    fn test_return_unwinds_out_of_loops() {
        let out = run_ok(
            "fun find() {\n  var i = 0;\n  while (true) {\n    if (i == 4) return i;\n    i = i + 1;\n  }\n}\nprint find();",
        );

        assert_eq!(out, "4\n");
    }

    #[test]
    fn test_else_if_chain_picks_first_true_arm() {
        let out = run_ok(
            "fun grade(n) {\n  if (n > 8) return \"a\";\n  else if (n > 5) return \"b\";\n  else if (n > 2) return \"c\";\n  else return \"d\";\n}\nprint grade(9) + grade(6) + grade(3) + grade(1);",
        );

        assert_eq!(out, "abcd\n");
    }

    // ─────────────────────────── calls ────────────────────────────────

    #[test]
    fn test_call_errors() {
        assert_eq!(
            runtime_error("fun f(a, b) {}\nf(1);"),
            "[line 2] Expected 2 arguments but got 1."
        );
        assert_eq!(
            runtime_error("\"not callable\"();"),
            "[line 1] Can only call functions and classes."
        );
        assert_eq!(
            runtime_error("class P { init(x) {} }\nP();"),
            "[line 2] Expected 1 arguments but got 0."
        );
        assert_eq!(
            runtime_error("print int(\"3\");"),
            "[line 1] int() expects a number but got string."
        );
    }

    #[test]
    fn test_natives() {
        let out = run_ok(
            "print int(3.9); print int(-3.9);\nvar r = rand(); print r >= 0 and r < 1;\nprint clock() > 0;\nprint clock;",
        );

        assert_eq!(out, "3\n-3\ntrue\ntrue\n<native fn clock>\n");
    }

    // ─────────────────────────── globals ──────────────────────────────

    #[test]
    fn test_undefined_variables() {
        assert_eq!(
            runtime_error("print missing;"),
            "[line 1] Undefined variable 'missing'."
        );
        assert_eq!(
            runtime_error("fun f() { later = 1; }\nf();"),
            "[line 1] Undefined variable 'later'."
        );
    }

    #[test]
    fn test_top_level_assignment_defines_global() {
        let out = run_ok("fresh = 5;\nfun f() { fresh = fresh + 1; }\nf();\nprint fresh;");

        assert_eq!(out, "6\n");
    }

    #[test]
    fn test_runtime_error_stops_program() {
        let (out, report) = run("print 1;\nprint nil - 1;\nprint 3;");

        assert_eq!(out, "1\n");
        assert_eq!(
            report.runtime_error.map(|e| e.to_string()),
            Some("[line 2] Operands must be numbers.".to_string())
        );
    }

    #[test]
    fn test_warnings_do_not_block_execution() {
        let (out, report) = run("{ var unused = 1; print \"ran\"; }");

        assert_eq!(out, "ran\n");
        assert_eq!(report.status(), Status::Ok);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_report_lists_every_diagnostic() {
        let (_, report) = run("var 1;\nprint $;");

        let mut rendered: Vec<u8> = Vec::new();
        report.write_to(&mut rendered).expect("write to Vec");

        assert_eq!(
            String::from_utf8(rendered).expect("UTF-8"),
            "[line 2] Error: Unexpected character: $\n[line 1] Error at '1': Expect variable name.\n[line 2] Error at ';': Expect expression.\n"
        );
    }
}
