use indexmap::IndexMap;

use crate::diagnostic::ErrorKind;
use crate::signal::Signal;
use crate::typecheck::TypeRef;
use crate::value::{ArrayValue, NativeFn, ObjectValue, Value};

/// Converts a parsed JSON document into runtime values.
#[must_use]
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => Value::Array(ArrayValue::new(items.iter().map(json_to_value).collect())),
        serde_json::Value::Object(map) => {
            let mut props = IndexMap::new();
            for (key, value) in map {
                props.insert(key.clone(), json_to_value(value));
            }
            Value::Object(ObjectValue::from_map(props))
        }
    }
}

/// Converts a runtime value into a JSON document. Functions, classes,
/// probes, and futures serialize as null, matching their display form.
#[must_use]
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Str(s) => serde_json::Value::String(s.as_str().to_string()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Array(items) => serde_json::Value::Array(items.items().iter().map(value_to_json).collect()),
        Value::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (key, value) in obj.entries() {
                map.insert(key, value_to_json(&value));
            }
            serde_json::Value::Object(map)
        }
        _ => serde_json::Value::Null,
    }
}

/// The `json` module: `parse` and `stringify`.
pub(crate) fn module() -> (Value, TypeRef) {
    let module = ObjectValue::new();

    module.set(
        "parse",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let Some(Value::Str(text)) = args.first() else {
                return Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "Usage: json.parse(text: str)",
                ));
            };
            match serde_json::from_str::<serde_json::Value>(text.as_str()) {
                Ok(parsed) => Ok(json_to_value(&parsed)),
                Err(err) => Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    format!("Invalid JSON: {err}"),
                )),
            }
        })),
    );

    module.set(
        "stringify",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let Some(value) = args.first() else {
                return Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "Usage: json.stringify(value)",
                ));
            };
            Ok(Value::string(value_to_json(value).to_string()))
        })),
    );

    (Value::Object(module), super::native_module_type(&["parse", "stringify"]))
}
