use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::context::Context;
use crate::diagnostic::ErrorKind;
use crate::interp;
use crate::lexer::Token;
use crate::scope::Scope;
use crate::signal::Signal;
use crate::typecheck::{Parameter, Type, TypeKind, TypeRef, TypeVal};
use crate::value::{NativeFn, ObjectValue, Value};

struct TestCase {
    name: String,
    func: Value,
}

/// Process-wide registry filled by `prbtest.test` and drained by
/// [`run_tests`].
static TESTS: Mutex<Vec<TestCase>> = Mutex::new(Vec::new());

/// A failed test: its registered name and the failure message.
#[derive(Debug)]
pub struct TestFailure {
    pub name: String,
    pub message: String,
}

/// Runs every registered test, clearing the registry. Each test function is
/// invoked with no arguments under a fresh root scope; any escaping signal
/// is a failure.
#[must_use]
pub fn run_tests(ctx: &Arc<Context>) -> Vec<TestFailure> {
    let cases: Vec<TestCase> = std::mem::take(&mut *TESTS.lock().expect("test registry poisoned"));

    let mut failures = Vec::new();
    for case in cases {
        let scope = Scope::root(ctx);
        if let Err(signal) = interp::call_value(&case.func, Vec::new(), &scope, ctx, &Token::synthetic()) {
            failures.push(TestFailure {
                name: case.name,
                message: signal.top_level_message(),
            });
        }
    }
    failures
}

/// The `prbtest` module: a test registry plus `assert`.
pub(crate) fn module() -> (Value, TypeRef) {
    let module = ObjectValue::new();

    module.set(
        "assert",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let Some(condition) = args.first() else {
                return Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "Usage: assert(expression, message?: str)",
                ));
            };
            if !condition.to_bool() {
                let message = args.get(1).map_or_else(|| "Assertion failed".to_string(), Value::to_display);
                return Err(Signal::bare_throw(ErrorKind::AssertError, message));
            }
            Ok(Value::Undef)
        })),
    );

    module.set(
        "test",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            if args.len() < 2 {
                return Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "Usage: test(name: str, fn: function)",
                ));
            }
            TESTS.lock().expect("test registry poisoned").push(TestCase {
                name: args[0].to_display(),
                func: args[1].clone(),
            });
            Ok(Value::Undef)
        })),
    );

    let mut props: IndexMap<String, TypeRef> = IndexMap::new();
    props.insert(
        "assert".to_string(),
        Type::with_val(
            TypeKind::Function,
            "native function",
            TypeVal::with_params(vec![
                Parameter {
                    ident: "expression".to_string(),
                    ty: Type::any(),
                    has_default: false,
                },
                Parameter {
                    ident: "failmessage".to_string(),
                    ty: Type::string(),
                    has_default: true,
                },
            ]),
        ),
    );
    props.insert(
        "test".to_string(),
        Type::with_val(
            TypeKind::Function,
            "native function",
            TypeVal::with_params(vec![
                Parameter {
                    ident: "name".to_string(),
                    ty: Type::string(),
                    has_default: false,
                },
                Parameter {
                    ident: "fn".to_string(),
                    ty: Type::simple(TypeKind::Function, "function"),
                    has_default: false,
                },
            ]),
        ),
    );

    (
        Value::Object(module),
        Type::with_val(TypeKind::Module, "native module", TypeVal::with_props(props)),
    )
}
