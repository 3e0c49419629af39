//! Class construction, inheritance chains, `super`, and the probe protocol.

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
fn constructor_binds_fields() {
    let output = run(
        r"class Point { new(x, y) { this.x = x; this.y = y; } }
          probe Main { Main() {
            var p = new Point(3, 4);
            console.println(p.x, p.y);
          } }",
    );
    assert_eq!(output, "3 4\n");
}

#[test]
fn methods_see_fields_through_this() {
    let output = run(
        r"class Counter {
            count = 0
            bump() { this.count += 1; return this.count; }
          }
          probe Main { Main() {
            var c = new Counter();
            c.bump();
            console.println(c.bump());
          } }",
    );
    assert_eq!(output, "2\n");
}

#[test]
fn derived_overrides_base_method() {
    let output = run(
        r#"class Animal { speak() { return "..."; } }
          class Dog extends Animal { speak() { return "woof"; } }
          probe Main { Main() {
            var d = new Dog();
            console.println(d.speak());
          } }"#,
    );
    assert_eq!(output, "woof\n");
}

#[test]
fn derived_constructor_calls_super() {
    let output = run(
        r"class Base { new(x) { this.x = x; } }
          class Derived extends Base {
            new(x, y) { super(x); this.y = y; }
          }
          probe Main { Main() {
            var d = new Derived(1, 2);
            console.println(d.x, d.y);
          } }",
    );
    assert_eq!(output, "1 2\n");
}

#[test]
fn three_level_inheritance_unions_properties() {
    let output = run(
        r"class A { a() { return 1; } }
          class B extends A { b() { return 2; } }
          class C extends B { c() { return 3; } }
          probe Main { Main() {
            var c = new C();
            console.println(c.a() + c.b() + c.c());
          } }",
    );
    assert_eq!(output, "6\n");
}

#[test]
fn extending_a_non_class_fails() {
    let err = run_err(
        r"var notAClass = 5;
          class Bad extends notAClass { }
          probe Main { Main() { var b = new Bad(); } }",
    );
    let RunError::Uncaught(message) = err else {
        panic!("expected an uncaught throw, got {err:?}");
    };
    assert!(message.contains("ClassInheritanceError"), "got: {message}");
}

#[test]
fn constructing_a_non_class_fails() {
    let err = run_err(
        r"var five = 5;
          probe Main { Main() { var x = new five(); } }",
    );
    let RunError::Uncaught(message) = err else {
        panic!("expected an uncaught throw, got {err:?}");
    };
    assert!(message.contains("ConstructorError"), "got: {message}");
}

#[test]
fn native_class_constructions() {
    let output = run(
        r#"probe Main { Main() {
            console.println(new num("42") + 1);
            console.println(new str(7));
            console.println(new bool(""));
            console.println(new array(1, 2, 3));
        } }"#,
    );
    assert_eq!(output, "43\n7\nfalse\n[1, 2, 3]\n");
}

#[test]
fn native_num_rejects_non_numeric() {
    let output = run(
        r#"probe Main { Main() {
            try { var n = new num("nope"); } catch (e) { console.println("caught"); }
        } }"#,
    );
    assert_eq!(output, "caught\n");
}

#[test]
fn probe_with_helper_methods_and_fields() {
    let output = run(
        r"probe Main {
            greeting = 40
            helper(n) { return n + 2; }
            Main() { console.println(helper(greeting)); }
          }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn probe_inheritance_shares_members() {
    let output = run(
        r"probe Base {
            shared() { return 21; }
            Base() { }
          }
          probe Main extends Base {
            Main() { console.println(shared() * 2); }
          }",
    );
    assert_eq!(output, "42\n");
}

#[test]
fn derived_probe_entry_overrides_inherited_run() {
    let output = run(
        r#"probe Base { Base() { console.println("base"); } }
          probe Main extends Base {
            Main() { console.println("derived"); }
          }"#,
    );
    assert_eq!(output, "derived\n");
}

#[test]
fn probe_extending_non_probe_fails() {
    let err = run_err(
        r"class NotAProbe { }
          probe Main extends NotAProbe { Main() { } }",
    );
    let RunError::Diagnostic(diag) = err else {
        panic!("expected a diagnostic, got {err:?}");
    };
    assert_eq!(diag.kind, ErrorKind::ProbeInheritanceError);
}

#[test]
fn class_properties_union_overrides_base_on_collision() {
    let output = run(
        r"class A { tag = 1 }
          class B extends A { tag = 2 }
          probe Main { Main() {
            var a = new A();
            var b = new B();
            console.println(a.tag, b.tag);
          } }",
    );
    assert_eq!(output, "1 2\n");
}
