use std::path::Path;

use crate::diagnostic::ErrorKind;
use crate::signal::Signal;
use crate::typecheck::TypeRef;
use crate::value::{ArrayValue, NativeFn, ObjectValue, Value};

fn string_arg<'a>(args: &'a [Value], index: usize, usage: &str) -> Result<&'a str, Signal> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.as_str()),
        _ => Err(Signal::bare_throw(ErrorKind::ArgumentError, usage)),
    }
}

/// The `fs` module: file I/O over the process working directory.
pub(crate) fn module() -> (Value, TypeRef) {
    let module = ObjectValue::new();

    module.set(
        "readFile",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let path = string_arg(&args, 0, "readFile: Expected one argument, file path.")?;
            match std::fs::read_to_string(path) {
                Ok(content) => Ok(Value::string(content)),
                Err(_) => Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    format!("Failed to open file: {path}"),
                )),
            }
        })),
    );

    module.set(
        "writeFile",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let usage = "writeFile: Expected two string arguments (path, content).";
            let path = string_arg(&args, 0, usage)?.to_string();
            let content = string_arg(&args, 1, usage)?;
            match std::fs::write(&path, content) {
                Ok(()) => Ok(Value::Undef),
                Err(_) => Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    format!("Failed to open file for writing: {path}"),
                )),
            }
        })),
    );

    module.set(
        "exists",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let path = string_arg(&args, 0, "exists: Expected one string argument (path).")?;
            Ok(Value::Bool(Path::new(path).exists()))
        })),
    );

    module.set(
        "isDirectory",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let path = string_arg(&args, 0, "isDirectory: Expected one string argument (path).")?;
            Ok(Value::Bool(Path::new(path).is_dir()))
        })),
    );

    module.set(
        "listDir",
        Value::NativeFn(NativeFn::new(|args, _scope| {
            let path = string_arg(&args, 0, "listDir: Expected one string argument (path).")?;
            let entries = std::fs::read_dir(path).map_err(|_| {
                Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    format!("Provided path is not a directory: {path}"),
                )
            })?;
            let items: Vec<Value> = entries
                .filter_map(Result::ok)
                .map(|entry| Value::string(entry.path().display().to_string()))
                .collect();
            Ok(Value::Array(ArrayValue::new(items)))
        })),
    );

    (
        Value::Object(module),
        super::native_module_type(&["readFile", "writeFile", "exists", "isDirectory", "listDir"]),
    )
}
