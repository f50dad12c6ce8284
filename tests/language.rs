// End-to-end language behaviour through the public API.

use lumen::{Config, ErrorKind, Interpreter, LumenError, Output, RuntimeError, Value};
use pretty_assertions::assert_eq;

fn interpreter() -> (Interpreter, Output) {
    let out = Output::buffer();
    let interp = Interpreter::with_config(Config::default().with_output(out.clone()));
    (interp, out)
}

fn run(source: &str) -> String {
    let (mut interp, out) = interpreter();
    if let Err(e) = interp.run_source(source) {
        panic!("program failed: {}\n--- source ---\n{}", e, source);
    }
    out.contents()
}

fn run_err(source: &str) -> RuntimeError {
    let (mut interp, _) = interpreter();
    match interp.run_source(source) {
        Err(LumenError::Runtime(e)) => e,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn modulo_scenario() {
    assert_eq!(run("let x = 10; let y = 3; print(x % y);"), "1\n");
}

#[test]
fn default_parameter_scenario() {
    assert_eq!(run("func add(a, b=5) { return a + b; } print(add(2));"), "7\n");
}

#[test]
fn try_catch_finally_scenario() {
    let source = r#"try { let x = 1/0; } catch e { print("caught"); } finally { print("done"); }"#;
    assert_eq!(run(source), "caught\ndone\n");
}

#[test]
fn index_error_scenario() {
    let err = run_err("let arr = [1,2,3]; arr[10]");
    assert_eq!(err.kind, ErrorKind::Index);
    assert_eq!(err.span.map(|s| (s.line, s.column)), Some((1, 23)));
}

// ── Scoping & closures ────────────────────────────────────────────────────────

#[test]
fn closures_keep_independent_state() {
    let source = r#"
        func make_counter() {
            let count = 0;
            return func () { count += 1; return count; };
        }
        let f = make_counter();
        print(f());
        print(f());
        let g = make_counter();
        print(g());
    "#;
    assert_eq!(run(source), "1\n2\n1\n");
}

#[test]
fn let_shadows_and_assignment_mutates() {
    run("let x = 1; { let x = 2; assert x == 2; } assert x == 1;");
    run("let x = 1; { x = 2; } assert x == 2;");
}

#[test]
fn loop_bodies_get_fresh_scopes() {
    let source = r#"
        let fs = [];
        for i in [1, 2, 3] { push(fs, func () { return i; }); }
        print(fs[0](), fs[2]());
    "#;
    assert_eq!(run(source), "1 3\n");
}

#[test]
fn constants_cannot_be_reassigned() {
    let err = run_err("const LIMIT = 3; LIMIT = 4;");
    assert_eq!(err.kind, ErrorKind::ConstAssignment);
    let err = run_err("const LIMIT = 3; { LIMIT += 1; }");
    assert_eq!(err.kind, ErrorKind::ConstAssignment);
}

#[test]
fn constants_cannot_be_redeclared_in_their_own_scope() {
    let err = run_err("const LIMIT = 3;\nlet LIMIT = 4;\nprint(LIMIT);");
    assert_eq!(err.kind, ErrorKind::ConstAssignment);
    assert_eq!(err.span.map(|s| s.line), Some(2));
    assert_eq!(run_err("const f = 1; func f() { }").kind, ErrorKind::ConstAssignment);
    assert_eq!(run_err("const N = 1; const N = 2;").kind, ErrorKind::ConstAssignment);

    assert_eq!(run("const LIMIT = 3; { let LIMIT = 4; print(LIMIT); } print(LIMIT);"), "4\n3\n");
    assert_eq!(run("let n = 1; let n = 2; print(n);"), "2\n");
}

#[test]
fn lists_and_dicts_are_shared_by_reference() {
    assert_eq!(run("let a = [1]; let b = a; push(b, 2); print(len(a), a);"), "2 [1, 2]\n");
    assert_eq!(run("let d = {}; let e = d; e[\"k\"] = 1; print(d);"), "{\"k\": 1}\n");
}

#[test]
fn unknown_names_suggest_close_matches() {
    let err = run_err("let count = 1;\nprint(cuont);");
    assert_eq!(err.kind, ErrorKind::Name);
    assert_eq!(err.suggestions.first().map(String::as_str), Some("count"));
    assert_eq!(err.span.map(|s| s.line), Some(2));
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[test]
fn logical_operators_short_circuit() {
    let source = r#"
        let calls = [];
        func side_effect() { push(calls, 1); return true; }
        let a = false && side_effect();
        let b = true || side_effect();
        print(a, b, len(calls));
    "#;
    assert_eq!(run(source), "false true 0\n");
}

#[test]
fn chained_comparison_uses_each_operand_once() {
    let source = r#"
        let n = 0;
        func mid() { n += 1; return 2; }
        print(1 < 2 < 3, 3 < 2 < 1, 1 < mid() <= 2, n);
    "#;
    assert_eq!(run(source), "true false true 1\n");
}

#[test]
fn arithmetic_rules() {
    assert_eq!(run("print(7 / 2, -7 / 2, 7.0 / 2, 2 ** 10, -2 ** 2, 2 ** -1);"), "3 -4 3.5 1024 4 0.5\n");
    assert_eq!(run("print(\"n=\" + 1, [1] + [2], \"ab\" * 2);"), "n=1 [1, 2] abab\n");
    assert_eq!(run_err("let big = 9223372036854775807; big + 1;").kind, ErrorKind::Overflow);
    assert_eq!(run_err("1 + \"x\" * null;").kind, ErrorKind::Type);
    assert_eq!(run_err("5 % 0;").kind, ErrorKind::DivisionByZero);
}

#[test]
fn values_display() {
    let source = r#"
        print([1, "two", 3.0, null, true]);
        print({"a": [1], "b": {"c": 2}});
        print(str(1.5) + "!", type(1), type("s"), type([]), type(print));
    "#;
    assert_eq!(
        run(source),
        "[1, \"two\", 3.0, null, true]\n{\"a\": [1], \"b\": {\"c\": 2}}\n1.5! int string list function\n"
    );
}

// ── Control flow ──────────────────────────────────────────────────────────────

#[test]
fn break_only_leaves_the_innermost_loop() {
    let source = r#"
        let outer = 0;
        let inner = 0;
        while outer < 3 {
            outer += 1;
            for x in [1, 2, 3] {
                if x == 2 { break; }
                inner += 1;
            }
        }
        print(outer, inner);
    "#;
    assert_eq!(run(source), "3 3\n");
}

#[test]
fn continue_and_repeat() {
    let source = r#"
        let total = 0;
        for i in range(10) {
            if i % 2 == 0 { continue; }
            total += i;
        }
        let hits = 0;
        repeat 4 { hits += 1; }
        print(total, hits);
    "#;
    assert_eq!(run(source), "25 4\n");
}

#[test]
fn repeat_count_must_be_a_non_negative_int() {
    assert_eq!(run_err("repeat -1 { }").kind, ErrorKind::Type);
    assert_eq!(run_err("repeat 1.5 { }").kind, ErrorKind::Type);
    assert_eq!(run_err("repeat \"3\" { }").kind, ErrorKind::Type);
    assert_eq!(run("repeat 0 { print(\"never\"); } print(\"ok\");"), "ok\n");
}

#[test]
fn for_walks_string_characters_and_dict_keys_in_order() {
    let source = r#"
        let chars = [];
        for c in "héy" { push(chars, c); }
        let d = {"zeta": 1, "alpha": 2};
        d["mid"] = 3;
        let keys = [];
        for k in d { push(keys, k); }
        print(chars, keys);
    "#;
    assert_eq!(run(source), "[\"h\", \"é\", \"y\"] [\"zeta\", \"alpha\", \"mid\"]\n");
}

#[test]
fn else_if_chains() {
    let source = r#"
        func sign(n) {
            if n > 0 { return "pos"; } else if n == 0 { return "zero"; } else { return "neg"; }
        }
        print(sign(3), sign(0), sign(-3));
    "#;
    assert_eq!(run(source), "pos zero neg\n");
}

#[test]
fn match_patterns_and_guards() {
    let source = r#"
        func describe(v) {
            let out = "";
            match v {
                0 | -1 => { out = "small"; },
                "hi" => { out = "greeting"; },
                n if n > 100 => { out = "big " + str(n); },
                _ => { out = "other"; },
            }
            return out;
        }
        print(describe(-1), describe("hi"), describe(500), describe(7));
    "#;
    assert_eq!(run(source), "small greeting big 500 other\n");
}

#[test]
fn deep_recursion_within_the_limit() {
    let source = r#"
        func sum_to(n) { if n == 0 { return 0; } return n + sum_to(n - 1); }
        print(sum_to(900));
    "#;
    assert_eq!(run(source), "405450\n");
}

#[test]
fn runaway_recursion_is_a_recursion_error() {
    let err = run_err("func loop_forever(n) { return loop_forever(n); } loop_forever(1);");
    assert_eq!(err.kind, ErrorKind::Recursion);
}

// ── Functions ─────────────────────────────────────────────────────────────────

#[test]
fn keyword_arguments() {
    let source = r#"
        func f(a, b = 2, c = 3) { return a + b * c; }
        print(f(1), f(1, c = 10), f(a = 0, b = 1, c = 1));
    "#;
    assert_eq!(run(source), "7 21 1\n");
}

#[test]
fn argument_errors() {
    assert_eq!(run_err("func f(a) { } f(1, 2);").kind, ErrorKind::Type);
    assert_eq!(run_err("func f(a) { } f();").kind, ErrorKind::Type);
    assert_eq!(run_err("func f(a) { } f(1, a = 2);").kind, ErrorKind::Type);
    assert_eq!(run_err("func f(a) { } f(b = 2);").kind, ErrorKind::Type);
    let err = run_err("let x = 3; x();");
    assert_eq!(err.message, "'int' value is not callable");
}

#[test]
fn defaults_are_evaluated_per_call() {
    let source = r#"
        func append(x, acc = []) { push(acc, x); return acc; }
        print(append(1), append(2));
    "#;
    assert_eq!(run(source), "[1] [2]\n");
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[test]
fn typed_catch_wins_over_catch_all() {
    let source = r#"
        try { let d = {"a": 1}; d["b"]; }
        catch e { print("generic"); }
        catch KeyError as k { print("key:", k.message); }
    "#;
    assert_eq!(run(source), "key: key \"b\" not found\n");
}

#[test]
fn unmatched_typed_catch_propagates() {
    let source = r#"
        try { [1][3]; } catch KeyError as k { print("wrong"); } finally { print("cleanup"); }
    "#;
    let (mut interp, out) = interpreter();
    let err = interp.run_source(source).unwrap_err();
    assert_eq!(err.kind_name(), "IndexError");
    assert_eq!(out.contents(), "cleanup\n");
}

#[test]
fn caught_errors_expose_kind_message_and_position() {
    let source = r#"
try {
    throw error("boom", kind = "MyError");
} catch MyError as e {
    print(e.kind, e.message, e.line);
}
try { throw "plain"; } catch e { print(e.kind, e.message); }
"#;
    assert_eq!(run(source), "MyError boom 3\nError plain\n");
}

#[test]
fn finally_runs_on_return_and_can_replace_errors() {
    let source = r#"
        let log = [];
        func f() {
            try { return 1; } finally { push(log, "finally"); }
        }
        print(f(), log);
    "#;
    assert_eq!(run(source), "1 [\"finally\"]\n");

    let err = run_err("try { 1 / 0; } finally { throw error(\"replaced\", kind = \"ValueError\"); }");
    assert_eq!(err.kind, ErrorKind::Value);
    assert_eq!(err.message, "replaced");
}

#[test]
fn finally_runs_as_break_and_continue_pass_through() {
    let source = r#"
        let log = [];
        for i in [1, 2, 3] {
            try {
                if i == 2 { break; }
                push(log, i);
            } finally {
                push(log, "f" + str(i));
            }
        }
        let skipped = 0;
        for i in [1, 2] {
            try { continue; } finally { skipped += 1; }
            push(log, "unreachable");
        }
        print(log, skipped);
    "#;
    assert_eq!(run(source), "[1, \"f1\", \"f2\"] 2\n");
}

#[test]
fn assert_failure_message() {
    let err = run_err("let x = 2; assert x == 3, \"x should be 3\";");
    assert_eq!(err.kind, ErrorKind::Assertion);
    assert_eq!(err.message, "x should be 3");
}

#[test]
fn parse_errors_abort_before_execution() {
    let (mut interp, out) = interpreter();
    let err = interp.run_source("print(\"side effect\");\nlet = 3;").unwrap_err();
    assert!(matches!(err, LumenError::Parse(_)));
    assert_eq!(out.contents(), "");
}

// ── Classes ───────────────────────────────────────────────────────────────────

#[test]
fn classes_inheritance_and_super() {
    let source = r#"
        class Animal {
            func init(name) { self.name = name; }
            func speak() { return self.name + " makes a sound"; }
        }
        class Dog extends Animal {
            func speak() { return super.speak() + " (woof)"; }
        }
        let d = Dog("Rex");
        print(d.speak());
        print(d.name, type(d));
        d.name = "Max";
        print(d.speak());
    "#;
    assert_eq!(run(source), "Rex makes a sound (woof)\nRex Dog\nMax makes a sound (woof)\n");
}

#[test]
fn methods_are_bound_values() {
    let source = r#"
        class Counter {
            func init() { self.n = 0; }
            func bump() { self.n += 1; return self.n; }
        }
        let c = Counter();
        let bump = c.bump;
        bump();
        bump();
        print(c.n);
    "#;
    assert_eq!(run(source), "2\n");
}

#[test]
fn missing_attribute_suggests() {
    let err = run_err("class P { func init() { self.width = 1; } } let p = P(); p.widht;");
    assert_eq!(err.kind, ErrorKind::Attribute);
    assert_eq!(err.suggestions.first().map(String::as_str), Some("width"));
}

#[test]
fn class_bodies_only_hold_methods() {
    let (mut interp, _) = interpreter();
    let err = interp.run_source("class P { let x = 1; }").unwrap_err();
    assert!(matches!(err, LumenError::Parse(_)));
    assert!(err.message().contains("init"), "{}", err.message());
}

// ── Builtins ──────────────────────────────────────────────────────────────────

#[test]
fn builtin_methods_on_values() {
    let source = r#"
        let xs = [3];
        xs.push(4);
        let d = {"k": 1};
        print(xs.len(), xs.contains(4), "ab".upper(), " x ".trim(), "a,b".split(","));
        print(d.has("k"), d.get("z", 0), d.keys(), d.remove("k"), d.len());
    "#;
    assert_eq!(run(source), "2 true AB x [\"a\", \"b\"]\ntrue 0 [\"k\"] 1 0\n");
}

#[test]
fn prelude_conversions_and_lookup() {
    let source = r#"
        let d = {"a": 1};
        print(int("42") + 1, float(2), bool(""), get(d, "a"), get(d, "b", "none"));
        print(range(2, 5), keys(d), values(d), pop([1, 2]));
        print("a", "b", sep = "-", end = "!\n");
    "#;
    assert_eq!(run(source), "43 2.0 false 1 none\n[2, 3, 4] [\"a\"] [1] 2\na-b!\n");
}

#[test]
fn program_value_is_returned() {
    let (mut interp, _) = interpreter();
    assert_eq!(interp.run_source("let a = 20; a + 22;").unwrap(), Value::Int(42));
    // globals persist between runs, as in the REPL
    assert_eq!(interp.run_source("a * 2;").unwrap(), Value::Int(40));
}

// ── Resource limits ───────────────────────────────────────────────────────────

#[test]
fn oversized_repetition_is_an_overflow_error() {
    assert_eq!(run_err("[1, 2, 3] * 9223372036854775807;").kind, ErrorKind::Overflow);
    assert_eq!(run_err("\"ab\" * 9223372036854775807;").kind, ErrorKind::Overflow);
    assert_eq!(run("print([0] * 3, \"ab\" * 2, [] * 9223372036854775807);"), "[0, 0, 0] abab []\n");
}

#[test]
fn comparing_self_referencing_lists_terminates() {
    let err = run_err("let a = []; push(a, a); let b = []; push(b, b); print(a == b);");
    assert_eq!(err.kind, ErrorKind::Recursion);
    assert_eq!(run("let a = []; push(a, a); print(a == a, a != a, [1].contains(a));"), "true false false\n");
}

#[test]
fn deeply_nested_values_are_dropped_without_overflow() {
    let source = "let a = []; repeat 200000 { a = [a]; } a = null; let d = {}; repeat 200000 { d = {\"next\": d}; } print(\"done\");";
    assert_eq!(run(source), "done\n");
}

#[test]
fn deeply_nested_source_is_a_parse_error() {
    let (mut interp, _) = interpreter();
    let source = format!("print({}1{});", "(".repeat(20_000), ")".repeat(20_000));
    match interp.run_source(&source) {
        Err(LumenError::Parse(e)) => assert!(e.message.contains("nested too deeply"), "{}", e.message),
        other => panic!("expected a parse error, got {:?}", other),
    }

    let source = format!("print({}1{});", "(1 + ".repeat(300), ")".repeat(300));
    assert_eq!(run(&source), "301\n");
}
