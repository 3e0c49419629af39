use rand::Rng as _;

use crate::diagnostic::ErrorKind;
use crate::signal::Signal;
use crate::typecheck::TypeRef;
use crate::value::{NativeFn, ObjectValue, Value};

/// The `random` module: `rand` in [0, 1) and inclusive `randInt`.
pub(crate) fn module() -> (Value, TypeRef) {
    let module = ObjectValue::new();

    module.set(
        "rand",
        Value::NativeFn(NativeFn::new(|_args, _scope| {
            Ok(Value::Number(rand::thread_rng().gen::<f64>()))
        })),
    );

    module.set(
        "randInt",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            if args.len() < 2 {
                return Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "randInt expects two arguments",
                ));
            }
            let low = args[0].to_num() as i64;
            let high = args[1].to_num() as i64;
            if high < low {
                return Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "randInt expects low <= high",
                ));
            }
            Ok(Value::Number(rand::thread_rng().gen_range(low..=high) as f64))
        })),
    );

    (Value::Object(module), super::native_module_type(&["rand", "randInt"]))
}
