//! Runtime error routing: what is catchable, what aborts, and how
//! diagnostics render.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use probescript::{CollectStringPrint, ErrorKind, PrintHandle, RunError, Runner};

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
fn user_throw_propagates_its_string_form() {
    let output = run(
        r"probe Main { Main() {
            try { throw 42; } catch (e) { console.println(e); }
          } }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn uncaught_throw_aborts_with_message() {
    let err = run_err(r#"probe Main { Main() { throw "unhandled"; } }"#);
    let RunError::Uncaught(message) = err else {
        panic!("expected an uncaught throw, got {err:?}");
    };
    assert_eq!(message, "unhandled");
}

#[test]
fn catch_handler_receives_interpreter_errors() {
    // Member assignment on a number is a catchable TypeError throw.
    let output = run(
        r#"probe Main { Main() {
            var n = 5;
            try { n.x = 1; } catch (e) { console.println("caught"); }
          } }"#,
    );
    assert_eq!(output, "caught\n");
}

#[test]
fn nested_try_rethrows_to_outer_handler() {
    let output = run(
        r#"probe Main { Main() {
            try {
                try { throw "inner"; } catch (e) { throw e + "!"; }
            } catch (e) { console.println(e); }
          } }"#,
    );
    assert_eq!(output, "inner!\n");
}

#[test]
fn try_without_throw_skips_catch() {
    let output = run(
        r#"probe Main { Main() {
            try { console.println("body"); } catch (e) { console.println("never"); }
          } }"#,
    );
    assert_eq!(output, "body\n");
}

#[test]
fn calling_a_plain_value_is_catchable() {
    let output = run(
        r#"probe Main { Main() {
            var v: any = 3;
            try { v(); } catch (e) { console.println("caught"); }
          } }"#,
    );
    assert_eq!(output, "caught\n");
}

#[test]
fn break_outside_loop_aborts() {
    let err = run_err("probe Main { Main() { break; } }");
    let RunError::Uncaught(message) = err else {
        panic!("expected a break escape, got {err:?}");
    };
    assert!(message.contains("BreakError"), "got: {message}");
}

#[test]
fn continue_outside_loop_aborts() {
    let err = run_err("probe Main { Main() { continue; } }");
    let RunError::Uncaught(message) = err else {
        panic!("expected a continue escape, got {err:?}");
    };
    assert!(message.contains("ContinueError"), "got: {message}");
}

#[test]
fn top_level_expression_statement_is_program_error() {
    let err = run_err("1 + 2;\nprobe Main { Main() { } }");
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::ProgramError);
}

#[test]
fn syntax_error_renders_source_window() {
    let err = run_err("var x = 1;\nvar = 2;\nvar z = 3;");
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::SyntaxError);
    let rendered = diag.to_string();
    assert!(rendered.contains("At test.prb:2:"), "got:\n{rendered}");
    assert!(rendered.contains("var = 2;"), "got:\n{rendered}");
    assert!(rendered.contains('^'), "got:\n{rendered}");
}

#[test]
fn diagnostic_window_includes_neighbor_lines() {
    let err = run_err("var ok = 1;\nvar bad: num = \"s\";\nvar after = 2;");
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    let rendered = diag.to_string();
    assert!(rendered.contains("var ok = 1;"), "got:\n{rendered}");
    assert!(rendered.contains("var after = 2;"), "got:\n{rendered}");
}

#[test]
fn class_body_statement_restriction() {
    let err = run_err(
        r"class C { if (true) { } }
          probe Main { Main() { var c = new C(); } }",
    );
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::ClassBodyError);
}

#[test]
fn probe_body_statement_restriction() {
    let err = run_err("probe Main { while (false) { } Main() { } }");
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::ProbeBodyError);
}
