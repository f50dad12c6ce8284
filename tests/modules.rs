// Module resolution, caching and namespaces against real files.

use std::fs;
use std::path::Path;

use lumen::{Config, ErrorKind, Interpreter, LumenError, Output};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, source: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn interpreter_in(dir: &TempDir) -> (Interpreter, Output) {
    let out = Output::buffer();
    let config = Config::default().with_output(out.clone()).with_base_dir(dir.path());
    (Interpreter::with_config(config), out)
}

fn run_in(dir: &TempDir, source: &str) -> String {
    let (mut interp, out) = interpreter_in(dir);
    if let Err(e) = interp.run_source(source) {
        panic!("program failed: {}", e);
    }
    out.contents()
}

fn import_error(dir: &TempDir, source: &str) -> lumen::RuntimeError {
    let (mut interp, _) = interpreter_in(dir);
    match interp.run_source(source) {
        Err(LumenError::Runtime(e)) => e,
        other => panic!("expected a runtime error, got {:?}", other),
    }
}

#[test]
fn modules_load_once() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "counter.lm", "print(\"loading\");\nlet loads = 0;\nloads += 1;\n");
    let source = r#"
        import counter;
        import counter as again;
        print(counter.loads, again.loads, counter == again);
    "#;
    assert_eq!(run_in(&dir, source), "loading\n1 1 true\n");
}

#[test]
fn from_import_with_aliases() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "shapes.lm", "func area(w, h) { return w * h; }\nconst UNIT = 1;\n");
    let source = "from shapes import area as a, UNIT;\nprint(a(2, 3) + UNIT);";
    assert_eq!(run_in(&dir, source), "7\n");
}

#[test]
fn exports_restrict_the_namespace() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "api.lm",
        "export func public_fn() { return helper(); }\nfunc helper() { return 5; }\n",
    );
    assert_eq!(run_in(&dir, "import api; print(api.public_fn());"), "5\n");

    let err = import_error(&dir, "from api import helper;");
    assert_eq!(err.kind, ErrorKind::Import);

    let err = import_error(&dir, "import api; api.publc_fn();");
    assert_eq!(err.kind, ErrorKind::Attribute);
    assert_eq!(err.suggestions.first().map(String::as_str), Some("public_fn"));
}

#[test]
fn underscore_names_are_private_without_exports() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "util.lm", "let _cache = 1;\nlet visible = 2;\n");
    let err = import_error(&dir, "from util import _cache;");
    assert_eq!(err.kind, ErrorKind::Import);
    assert_eq!(run_in(&dir, "from util import visible; print(visible);"), "2\n");
}

#[test]
fn dotted_paths_map_to_directories() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pkg/geometry.lm", "func double(x) { return x * 2; }\n");
    assert_eq!(run_in(&dir, "import pkg.geometry; print(geometry.double(21));"), "42\n");
}

#[test]
fn string_paths_resolve_from_the_importing_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "lib/a.lm", "import \"b.lm\" as b;\nlet value = b.value + 1;\n");
    write(dir.path(), "lib/b.lm", "let value = 41;\n");
    assert_eq!(run_in(&dir, "import \"lib/a.lm\" as a; print(a.value);"), "42\n");
}

#[test]
fn configured_search_paths() {
    let dir = TempDir::new().unwrap();
    let vendor = TempDir::new().unwrap();
    write(vendor.path(), "extra.lm", "let answer = 42;\n");

    let out = Output::buffer();
    let config = Config::default()
        .with_output(out.clone())
        .with_base_dir(dir.path())
        .with_search_path(vendor.path());
    let mut interp = Interpreter::with_config(config);
    interp.run_source("import extra; print(extra.answer);").unwrap();
    assert_eq!(out.contents(), "42\n");
}

#[test]
fn standard_modules() {
    let dir = TempDir::new().unwrap();
    let source = r#"
        import math;
        from string import upper, join;
        import collections as c;
        print(math.sqrt(16), math.floor(2.7), math.max([3, 9, 4]), math.pi > 3);
        print(upper("lumen"), join(["a", "b"], "+"), c.sort([3, 1, 2]), c.items({"k": 1}));
    "#;
    assert_eq!(run_in(&dir, source), "4.0 2 9 true\nLUMEN a+b [1, 2, 3] [[\"k\", 1]]\n");
}

#[test]
fn missing_modules_suggest_alternatives() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "helpers.lm", "let x = 1;\n");
    let err = import_error(&dir, "import helper;");
    assert_eq!(err.kind, ErrorKind::ModuleNotFound);
    assert_eq!(err.suggestions.first().map(String::as_str), Some("helpers"));

    let err = import_error(&dir, "import strng;");
    assert_eq!(err.suggestions.first().map(String::as_str), Some("string"));
}

#[test]
fn circular_imports_are_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ping.lm", "import pong;\nlet name = \"ping\";\n");
    write(dir.path(), "pong.lm", "import ping;\nlet name = \"pong\";\n");
    let err = import_error(&dir, "import ping;");
    assert_eq!(err.kind, ErrorKind::Import);
    assert!(err.message.contains("circular import"), "{}", err.message);
}

#[test]
fn broken_modules_report_their_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.lm", "let x = ;\n");
    let err = import_error(&dir, "import broken;");
    assert_eq!(err.kind, ErrorKind::Import);
    assert!(err.message.contains("broken.lm:1:"), "{}", err.message);

    write(dir.path(), "failing.lm", "let y = 1;\nlet z = y / 0;\n");
    let err = import_error(&dir, "\nimport failing;");
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    assert!(err.message.contains("in module 'failing'"), "{}", err.message);
    // the reported position is the import statement
    assert_eq!(err.span.map(|s| s.line), Some(2));
}

#[test]
fn modules_are_read_only() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "conf.lm", "let level = 1;\n");
    let err = import_error(&dir, "import conf; conf.level = 2;");
    assert_eq!(err.kind, ErrorKind::Type);
}
