use chrono::Utc;

use crate::typecheck::TypeRef;
use crate::value::{NativeFn, ObjectValue, Value};

/// The `date` module: `stamp(unit?)` with units `milli`, `sec`, `min`, and
/// `hour` (default `sec`).
pub(crate) fn module() -> (Value, TypeRef) {
    let module = ObjectValue::new();

    module.set(
        "stamp",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let unit = match args.first() {
                Some(Value::Str(s)) => s.as_str().to_lowercase(),
                _ => "sec".to_string(),
            };

            let now = Utc::now();
            let stamp = match unit.as_str() {
                "milli" => now.timestamp_millis(),
                "sec" => now.timestamp(),
                "min" => now.timestamp() / 60,
                "hour" => now.timestamp() / 3600,
                other => return Ok(Value::string(format!("Invalid time unit: {other}"))),
            };
            Ok(Value::Number(stamp as f64))
        })),
    );

    (Value::Object(module), super::native_module_type(&["stamp"]))
}
