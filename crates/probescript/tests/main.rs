//! End-to-end scenarios driving the full pipeline: parse, type-check, and
//! interpret in Normal mode, capturing console output.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use probescript::{CollectStringPrint, PrintHandle, RunError, Runner};

fn run(source: &str) -> String {
    let writer = Arc::new(Mutex::new(CollectStringPrint::new()));
    let handle: PrintHandle = writer.clone();
    Runner::new(source, "test.prb", handle)
        .run()
        .unwrap_or_else(|err| panic!("program failed:\n{err}"));
    let output = writer.lock().unwrap().output().to_string();
    output
}

fn run_err(source: &str) -> RunError {
    let writer: PrintHandle = Arc::new(Mutex::new(CollectStringPrint::new()));
    Runner::new(source, "test.prb", writer)
        .run()
        .expect_err("expected the program to fail")
}

#[test]
fn hello_probe() {
    let output = run(r#"probe Main { Main() { console.println("hi"); } }"#);
    assert_eq!(output, "hi\n");
}

#[test]
fn fibonacci_via_recursion() {
    let output = run(
        r"fn fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); }
          probe Main { Main() { console.println(fib(10)); } }",
    );
    assert_eq!(output, "55\n");
}

#[test]
fn for_loop_and_break() {
    let output = run(
        r"probe Main { Main() {
            var s = 0;
            for (var i = 0; i < 10; i++) { if (i == 5) break; s += i; }
            console.println(s);
        } }",
    );
    assert_eq!(output, "10\n");
}

#[test]
fn class_inheritance() {
    let output = run(
        r"class A { new(x) { this.x = x; } hi() { return this.x; } }
          class B extends A { }
          probe Main { Main() { var b = new B(7); console.println(b.hi()); } }",
    );
    assert_eq!(output, "7\n");
}

#[test]
fn try_catch() {
    let output = run(r#"probe Main { Main() { try { throw "oops"; } catch (e) { console.println(e); } } }"#);
    assert_eq!(output, "oops\n");
}

#[test]
fn async_await() {
    let output = run(
        r"async fn f() { return 42; }
          probe Main { Main() { console.println(await f()); } }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn type_mismatch_is_rejected() {
    let err = run_err(r#"var x: num = "s";"#);
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, probescript::ErrorKind::TypeError);
    assert!(diag.message.contains("string"), "message should name the source type");
    assert!(diag.message.contains("number"), "message should name the target type");
}

#[test]
fn println_joins_arguments_with_spaces() {
    let output = run(r#"probe Main { Main() { console.println("a", 1, true); } }"#);
    assert_eq!(output, "a 1 true\n");
}

#[test]
fn cast_law_numeric_string() {
    let output = run(r#"probe Main { Main() { console.println(("42" as num) == 42); } }"#);
    assert_eq!(output, "true\n");
}

#[test]
fn map_literal_reads_back_constructed_values() {
    let output = run(
        r#"probe Main { Main() {
            var m = { a: 1, b: "two", c: true };
            console.println(m.a, m.b, m.c);
        } }"#,
    );
    assert_eq!(output, "1 two true\n");
}

#[test]
fn missing_entry_probe_is_main_error() {
    let err = run_err("var x = 1;");
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, probescript::ErrorKind::MainError);
    assert!(diag.message.contains("Main"));
}

#[test]
fn custom_probe_name_is_respected_through_context() {
    use probescript::{Context, RunMode};

    let writer = Arc::new(Mutex::new(CollectStringPrint::new()));
    let handle: PrintHandle = writer.clone();
    let mut ctx = Context::for_source(
        r#"probe Worker { Worker() { console.println("working"); } }"#,
        "worker.prb",
    )
    .with_writer(handle);
    ctx.mode = RunMode::Normal;
    ctx.probe_name = "Worker".to_string();

    Runner::with_context(ctx).run().unwrap();
    assert_eq!(writer.lock().unwrap().output(), "working\n");
}
