//! Exports-mode evaluation, project-module imports, and the stdlib module
//! table.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use probescript::{CollectStringPrint, Context, ErrorKind, PrintHandle, RunError, RunMode, Runner, Value};

fn collect_writer() -> (Arc<Mutex<CollectStringPrint>>, PrintHandle) {
    let writer = Arc::new(Mutex::new(CollectStringPrint::new()));
    let handle: PrintHandle = writer.clone();
    (writer, handle)
}

fn run_exports(source: &str) -> Value {
    let (_, handle) = collect_writer();
    let mut ctx = Context::for_source(source, "module.prb").with_writer(handle);
    ctx.mode = RunMode::Exports;
    Runner::with_context(ctx).run().unwrap_or_else(|err| panic!("{err}"))
}

/// Creates a scratch project directory holding the given module files.
fn scratch_modules(tag: &str, files: &[(&str, &str)]) -> (PathBuf, Vec<(String, PathBuf)>) {
    let dir = std::env::temp_dir().join(format!("probescript-test-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut modules = Vec::new();
    for (name, source) in files {
        let path = dir.join(format!("{name}.prb"));
        std::fs::write(&path, source).unwrap();
        modules.push(((*name).to_string(), path));
    }
    (dir, modules)
}

#[test]
fn exports_mode_records_bindings() {
    let exports = run_exports(
        r"export fn add(a, b) { return a + b; }
          var y = 7;
          export y;
          export x = 5;
          export class Box { }",
    );
    let Value::Object(exports) = exports else {
        panic!("expected an exports object");
    };
    assert!(matches!(exports.get("add"), Some(Value::Function(_))));
    assert_eq!(exports.get("y").unwrap().to_display(), "7");
    assert_eq!(exports.get("x").unwrap().to_display(), "5");
    assert!(matches!(exports.get("Box"), Some(Value::Class(_))));
}

#[test]
fn repl_mode_returns_last_value() {
    let (_, handle) = collect_writer();
    let mut ctx = Context::for_source("var x = 20; x + 22", "repl.prb").with_writer(handle);
    ctx.mode = RunMode::Repl;
    let value = Runner::with_context(ctx).run().unwrap();
    assert_eq!(value.to_display(), "42");
}

#[test]
fn import_project_module() {
    let (_dir, modules) = scratch_modules(
        "import-basic",
        &[(
            "util",
            "module util\nexport fn double(x) { return x * 2; }\nexport base = 10;\n",
        )],
    );

    let (writer, handle) = collect_writer();
    let mut ctx = Context::for_source(
        r"import util;
          probe Main { Main() {
            console.println(util.double(21));
            console.println(util.base);
          } }",
        "main.prb",
    )
    .with_writer(handle);
    ctx.modules = modules.into_iter().collect();

    Runner::with_context(ctx).run().unwrap_or_else(|err| panic!("{err}"));
    assert_eq!(writer.lock().unwrap().output(), "42\n10\n");
}

#[test]
fn import_with_alias() {
    let (_dir, modules) = scratch_modules("import-alias", &[("util", "module util\nexport n = 9;\n")]);

    let (writer, handle) = collect_writer();
    let mut ctx = Context::for_source(
        r"import util as helpers;
          probe Main { Main() { console.println(helpers.n); } }",
        "main.prb",
    )
    .with_writer(handle);
    ctx.modules = modules.into_iter().collect();

    Runner::with_context(ctx).run().unwrap();
    assert_eq!(writer.lock().unwrap().output(), "9\n");
}

#[test]
fn member_import_binds_last_segment() {
    let (_dir, modules) = scratch_modules(
        "import-member",
        &[("util", "module util\nexport fn triple(x) { return x * 3; }\n")],
    );

    let (writer, handle) = collect_writer();
    let mut ctx = Context::for_source(
        r"import util.triple;
          probe Main { Main() { console.println(triple(14)); } }",
        "main.prb",
    )
    .with_writer(handle);
    ctx.modules = modules.into_iter().collect();

    Runner::with_context(ctx).run().unwrap();
    assert_eq!(writer.lock().unwrap().output(), "42\n");
}

#[test]
fn missing_module_is_import_error() {
    let (_, handle) = collect_writer();
    let err = Runner::new(
        r"import nowhere;
          probe Main { Main() { } }",
        "main.prb",
        handle,
    )
    .run()
    .unwrap_err();
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::ImportError);
}

#[test]
fn missing_module_member_is_rejected_by_checker() {
    let (_dir, modules) = scratch_modules("import-missing-member", &[("util", "module util\nexport n = 1;\n")]);

    let (_, handle) = collect_writer();
    let mut ctx = Context::for_source(
        r"import util;
          probe Main { Main() { console.println(util.nope); } }",
        "main.prb",
    )
    .with_writer(handle);
    ctx.modules = modules.into_iter().collect();

    let err = Runner::with_context(ctx).run().unwrap_err();
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("nope"));
}

#[test]
fn json_module_round_trip() {
    let (writer, handle) = collect_writer();
    Runner::new(
        r#"import json;
          probe Main { Main() {
            var parsed = json.parse("{\"a\": 1, \"b\": [true, null]}");
            console.println(parsed.a);
            console.println(json.stringify(parsed.b));
          } }"#,
        "main.prb",
        handle,
    )
    .run()
    .unwrap_or_else(|err| panic!("{err}"));
    assert_eq!(writer.lock().unwrap().output(), "1\n[true,null]\n");
}

#[test]
fn random_module_bounds() {
    let (writer, handle) = collect_writer();
    Runner::new(
        r"import random;
          probe Main { Main() {
            var n = random.randInt(3, 3);
            console.println(n);
            var r = random.rand();
            console.println(r >= 0 && r < 1);
          } }",
        "main.prb",
        handle,
    )
    .run()
    .unwrap();
    assert_eq!(writer.lock().unwrap().output(), "3\ntrue\n");
}

#[test]
fn date_module_stamp_units() {
    let (writer, handle) = collect_writer();
    Runner::new(
        r#"import date;
          probe Main { Main() {
            console.println(date.stamp() > 0);
            console.println(date.stamp("milli") > date.stamp("sec"));
            console.println(date.stamp("eon"));
          } }"#,
        "main.prb",
        handle,
    )
    .run()
    .unwrap();
    assert_eq!(
        writer.lock().unwrap().output(),
        "true\ntrue\nInvalid time unit: eon\n"
    );
}

#[test]
fn fs_module_read_write() {
    let dir = std::env::temp_dir().join(format!("probescript-test-fs-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("note.txt");

    let source = format!(
        r#"import fs;
          probe Main {{ Main() {{
            fs.writeFile("{path}", "hello fs");
            console.println(fs.exists("{path}"));
            console.println(fs.readFile("{path}"));
            console.println(fs.isDirectory("{dir}"));
          }} }}"#,
        path = file.display(),
        dir = dir.display(),
    );

    let (writer, handle) = collect_writer();
    Runner::new(source, "main.prb", handle).run().unwrap();
    assert_eq!(writer.lock().unwrap().output(), "true\nhello fs\ntrue\n");
}

#[test]
fn prbtest_registry_runs_and_reports() {
    let (_, handle) = collect_writer();
    let runner = Runner::new(
        r#"import prbtest;
          probe Main { Main() {
            prbtest.test("passes", fn() { prbtest.assert(1 == 1); });
            prbtest.test("fails", fn() { prbtest.assert(false, "expected failure"); });
          } }"#,
        "main.prb",
        handle,
    );
    runner.run().unwrap();

    let failures = probescript::run_tests(runner.context());
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "fails");
    assert!(failures[0].message.contains("expected failure"));
}

#[test]
fn prbtest_assert_throws_catchably() {
    let (writer, handle) = collect_writer();
    Runner::new(
        r#"import prbtest;
          probe Main { Main() {
            try { prbtest.assert(false, "boom"); } catch (e) { console.println("caught"); }
          } }"#,
        "main.prb",
        handle,
    )
    .run()
    .unwrap();
    assert_eq!(writer.lock().unwrap().output(), "caught\n");
}
