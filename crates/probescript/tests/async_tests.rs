//! The async model: futures from async calls, await, and task failures.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use probescript::{CollectStringPrint, PrintHandle, Runner};

fn run(source: &str) -> String {
    let writer = Arc::new(Mutex::new(CollectStringPrint::new()));
    let handle: PrintHandle = writer.clone();
    Runner::new(source, "test.prb", handle)
        .run()
        .unwrap_or_else(|err| panic!("program failed:\n{err}"));
    let output = writer.lock().unwrap().output().to_string();
    output
}

#[test]
fn await_yields_the_task_result() {
    let output = run(
        r"async fn f() { return 42; }
          probe Main { Main() { console.println(await f()); } }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn async_call_returns_a_future_immediately() {
    let output = run(
        r"async fn f() { return 1; }
          probe Main { Main() {
            var fut = f();
            console.println(await fut);
          } }",
    );
    assert_eq!(output, "1\n");
}

#[test]
fn several_tasks_run_independently() {
    let output = run(
        r"async fn make(n) { return n * 10; }
          probe Main { Main() {
            var a = make(1);
            var b = make(2);
            var c = make(3);
            console.println(await a + await b + await c);
          } }",
    );
    assert_eq!(output, "60\n");
}

#[test]
fn tasks_capture_arguments_by_value() {
    let output = run(
        r"async fn echo(v) { return v; }
          probe Main { Main() {
            var n = 5;
            var fut = echo(n);
            n = 9;
            console.println(await fut);
          } }",
    );
    assert_eq!(output, "5\n");
}

#[test]
fn async_bodies_share_the_declaration_scope_chain() {
    let output = run(
        r"var base = 40;
          async fn f() { return base + 2; }
          probe Main { Main() { console.println(await f()); } }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn failed_task_surfaces_as_async_error() {
    let output = run(
        r#"async fn boom() { throw "inner"; }
          probe Main { Main() {
            try { await boom(); } catch (e) { console.println(e); }
          } }"#,
    );
    assert!(output.contains("AsyncError"), "got: {output}");
}

#[test]
fn awaiting_a_non_future_value_fails_at_runtime() {
    let output = run(
        r"probe Main { Main() {
            var x: any = 5;
            try { await x; } catch (e) { console.println(e); }
          } }",
    );
    assert!(output.contains("ArgumentError"), "got: {output}");
    assert!(output.contains("future"), "got: {output}");
}

#[test]
fn async_functions_nest() {
    let output = run(
        r"async fn inner() { return 20; }
          async fn outer() { return await inner() + 1; }
          probe Main { Main() { console.println(await outer() * 2); } }",
    );
    assert_eq!(output, "42\n");
}
