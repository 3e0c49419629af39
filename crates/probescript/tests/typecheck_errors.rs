//! The checker's rejection surface: annotation mismatches, arity, duplicate
//! declarations, template errors, and return-type checking.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use probescript::{CollectStringPrint, Diagnostic, ErrorKind, PrintHandle, RunError, Runner};

fn check_err(source: &str) -> Diagnostic {
    let writer: PrintHandle = Arc::new(Mutex::new(CollectStringPrint::new()));
    let err = Runner::new(source, "test.prb", writer)
        .run()
        .expect_err("expected the program to be rejected");
    match err {
        RunError::Diagnostic(diag) => diag,
        RunError::Uncaught(message) => panic!("expected a diagnostic, got uncaught throw: {message}"),
    }
}

fn check_ok(source: &str) {
    let writer: PrintHandle = Arc::new(Mutex::new(CollectStringPrint::new()));
    Runner::new(source, "test.prb", writer)
        .run()
        .unwrap_or_else(|err| panic!("expected the program to pass:\n{err}"));
}

#[test]
fn annotated_var_rejects_mismatched_initializer() {
    let diag = check_err(r#"var flag: bool = "yes";"#);
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("string") && diag.message.contains("bool"));
}

#[test]
fn annotated_var_accepts_matching_initializer() {
    check_ok(
        r#"var n: num = 4;
          var s: str = "ok";
          var b: bool = true;
          probe Main { Main() { } }"#,
    );
}

#[test]
fn assignment_to_typed_var_is_checked() {
    let diag = check_err(
        r#"probe Main { Main() {
            var n: num = 1;
            n = "two";
        } }"#,
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
}

#[test]
fn duplicate_declaration_in_same_scope() {
    let diag = check_err("var x = 1;\nvar x = 2;");
    assert_eq!(diag.kind, ErrorKind::RedefinitionError);
    assert!(diag.message.contains('x'));
}

#[test]
fn shadowing_in_inner_scope_is_allowed() {
    check_ok(
        r"var x = 1;
          fn f() { var x = 2; return x; }
          probe Main { Main() { console.println(f() + x); } }",
    );
}

#[test]
fn duplicate_parameter_is_rejected() {
    let diag = check_err("fn f(a, a) { }");
    assert_eq!(diag.kind, ErrorKind::RedefinitionError);
    assert!(diag.message.contains("Duplicate parameter"));
}

#[test]
fn missing_argument_without_default() {
    let diag = check_err(
        r"fn f(a: num, b: num) { return a + b; }
          probe Main { Main() { f(1); } }",
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("expects 2 arguments"));
}

#[test]
fn missing_argument_with_default_is_fine() {
    check_ok(
        r"fn f(a: num, b = 2) { return a + b; }
          probe Main { Main() { console.println(f(1)); } }",
    );
}

#[test]
fn argument_type_mismatch_names_position() {
    let diag = check_err(
        r#"fn f(a: num) { return a; }
          probe Main { Main() { f("x"); } }"#,
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("parameter 1"));
    assert!(diag.message.contains("number"));
    assert!(diag.message.contains("string"));
}

#[test]
fn return_type_annotation_is_enforced() {
    let diag = check_err(r#"fn f(): num { return "nope"; }"#);
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("return type"));
}

#[test]
fn return_outside_a_function_is_rejected() {
    let diag = check_err("return 1;");
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("return"));
}

#[test]
fn calling_a_non_callable_is_rejected() {
    let diag = check_err(
        r"var five = 5;
          probe Main { Main() { five(); } }",
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("can be called"));
}

#[test]
fn undefined_variable_is_reference_error() {
    let diag = check_err("probe Main { Main() { console.println(ghost); } }");
    assert_eq!(diag.kind, ErrorKind::ReferenceError);
    assert!(diag.message.contains("ghost"));
}

#[test]
fn ternary_branches_must_agree() {
    let diag = check_err(r#"var v = true ? 1 : "two";"#);
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("incompatible"));
}

#[test]
fn postfix_step_requires_numbers() {
    let diag = check_err(
        r#"probe Main { Main() {
            var s = "text";
            s++;
        } }"#,
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("numbers"));
}

#[test]
fn template_arity_mismatch() {
    let diag = check_err(
        r"fn id<T>(x: T): T { return x; }
          probe Main { Main() { id<num, str>(5); } }",
    );
    assert_eq!(diag.kind, ErrorKind::TemplateError);
    assert!(diag.message.contains("template arguments"));
}

#[test]
fn template_substitution_checks_arguments() {
    let diag = check_err(
        r#"fn id<T>(x: T): T { return x; }
          probe Main { Main() { id<num>("text"); } }"#,
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("number"));
}

#[test]
fn template_substitution_accepts_matching_arguments() {
    check_ok(
        r"fn id<T>(x: T): T { return x; }
          probe Main { Main() { console.println(id<num>(5)); } }",
    );
}

#[test]
fn function_signature_annotation_matches() {
    check_ok(
        r"fn apply(f: function<num, num>, v: num): num { return f(v); }
          fn double(x: num): num { return x * 2; }
          probe Main { Main() { console.println(apply(double, 21)); } }",
    );
}

#[test]
fn function_signature_annotation_rejects_wrong_arity() {
    let diag = check_err(
        r"fn apply(f: function<num, num>, v: num): num { return f(v); }
          fn add(a: num, b: num): num { return a + b; }
          probe Main { Main() { console.println(apply(add, 21)); } }",
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
}

#[test]
fn class_instance_annotation_accepts_subclass() {
    check_ok(
        r"class A { hi() { return 1; } }
          class B extends A { }
          probe Main { Main() {
            var a: A = new B();
            console.println(a.hi());
          } }",
    );
}

#[test]
fn class_field_annotation_is_checked() {
    let diag = check_err(r#"class C { x: num = "no" }"#);
    assert_eq!(diag.kind, ErrorKind::TypeError);
}

#[test]
fn constructor_arity_is_checked() {
    let diag = check_err(
        r"class P { new(x: num, y: num) { this.x = x; this.y = y; } }
          probe Main { Main() { var p = new P(1); } }",
    );
    assert_eq!(diag.kind, ErrorKind::ConstructorError);
}

#[test]
fn constructor_argument_types_are_checked() {
    let diag = check_err(
        r#"class P { new(x: num) { this.x = x; } }
          probe Main { Main() { var p = new P("one"); } }"#,
    );
    assert_eq!(diag.kind, ErrorKind::ConstructorError);
}

#[test]
fn await_requires_future_type() {
    let diag = check_err(
        r"probe Main { Main() {
            var n = 5;
            var v = await n;
        } }",
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("future"));
}

#[test]
fn bad_cast_between_structured_kinds() {
    let diag = check_err(
        r"probe Main { Main() {
            var xs = [1, 2];
            var m = xs as map;
        } }",
    );
    assert_eq!(diag.kind, ErrorKind::TypeError);
    assert!(diag.message.contains("Bad cast"));
}
