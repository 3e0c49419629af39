//! REPL sessions: persistent scopes across lines and display values.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use probescript::{CollectStringPrint, ErrorKind, PrintHandle, ReplSession, RunError};

fn session() -> (Arc<Mutex<CollectStringPrint>>, ReplSession) {
    let writer = Arc::new(Mutex::new(CollectStringPrint::new()));
    let handle: PrintHandle = writer.clone();
    (writer, ReplSession::new(handle))
}

#[test]
fn expression_value_is_returned_for_display() {
    let (_, repl) = session();
    let value = repl.eval("1 + 2").unwrap();
    assert_eq!(value.to_display(), "3");
    assert_eq!(value.to_console(), "3");
}

#[test]
fn strings_echo_quoted() {
    let (_, repl) = session();
    let value = repl.eval(r#""hello""#).unwrap();
    assert_eq!(value.to_console(), "\"hello\"");
}

#[test]
fn bindings_persist_across_lines() {
    let (_, repl) = session();
    repl.eval("var x = 20").unwrap();
    repl.eval("fn double(n) { return n * 2; }").unwrap();
    let value = repl.eval("double(x) + 2").unwrap();
    assert_eq!(value.to_display(), "42");
}

#[test]
fn redeclaration_across_lines_is_rejected() {
    let (_, repl) = session();
    repl.eval("var x = 1").unwrap();
    let err = repl.eval("var x = 2").unwrap_err();
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::RedefinitionError);
}

#[test]
fn console_output_flows_through_the_session_writer() {
    let (writer, repl) = session();
    repl.eval(r#"console.println("from the repl")"#).unwrap();
    assert_eq!(writer.lock().unwrap().output(), "from the repl\n");
}

#[test]
fn last_statement_wins() {
    let (_, repl) = session();
    let value = repl.eval("var a = 1; var b = 2; a + b").unwrap();
    assert_eq!(value.to_display(), "3");
}

#[test]
fn undefined_display_for_declarations() {
    let (_, repl) = session();
    // A bare declaration's value is the declared value.
    let value = repl.eval("var q = 9").unwrap();
    assert_eq!(value.to_display(), "9");
}
