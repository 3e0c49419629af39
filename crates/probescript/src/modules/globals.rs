use std::io::BufRead;
use std::process;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::Context;
use crate::diagnostic::ErrorKind;
use crate::signal::Signal;
use crate::typecheck::{Parameter, Type, TypeKind, TypeRef, TypeVal};
use crate::value::{ArrayValue, NativeClass, NativeFn, ObjectValue, Value};

fn is_numeric(text: &str) -> bool {
    text.trim().parse::<f64>().is_ok()
}

/// Writes call arguments through the context writer, space-separated.
fn write_args(ctx_writer: &crate::io::PrintHandle, args: &[Value], newline: bool) {
    let mut writer = ctx_writer.lock().expect("print writer poisoned");
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            writer.stdout_push(' ');
        }
        let text = if matches!(arg, Value::Object(_)) {
            arg.to_console()
        } else {
            arg.to_display()
        };
        writer.stdout_write(&text);
    }
    if newline {
        writer.stdout_push('\n');
    }
}

/// The globals table: `console`, the native conversion classes, and `exit`.
/// Injected into every root scope on first use.
#[must_use]
pub fn globals(ctx: &Arc<Context>) -> Vec<(String, Value)> {
    let console = ObjectValue::new();

    let writer = Arc::clone(&ctx.writer);
    console.set(
        "println",
        Value::NativeFn(NativeFn::new(move |args, _scope| {
            write_args(&writer, &args, true);
            Ok(Value::Undef)
        })),
    );
    let writer = Arc::clone(&ctx.writer);
    console.set(
        "print",
        Value::NativeFn(NativeFn::new(move |args, _scope| {
            write_args(&writer, &args, false);
            Ok(Value::Undef)
        })),
    );
    let writer = Arc::clone(&ctx.writer);
    console.set(
        "prompt",
        Value::NativeFn(NativeFn::new(move |args, _scope| {
            {
                let mut writer = writer.lock().expect("print writer poisoned");
                for arg in &args {
                    writer.stdout_write(&arg.to_display());
                }
            }
            let mut input = String::new();
            let _ = std::io::stdin().lock().read_line(&mut input);
            while input.ends_with('\n') || input.ends_with('\r') {
                input.pop();
            }
            Ok(Value::string(input))
        })),
    );

    vec![
        ("console".to_string(), Value::Object(console)),
        (
            "num".to_string(),
            Value::NativeClass(NativeClass::new(|args, _scope| match args.first() {
                Some(arg) => {
                    if !is_numeric(&arg.to_display()) {
                        return Err(Signal::bare_throw(
                            ErrorKind::ArgumentError,
                            format!("Invalid argument: '{}' is not a number", arg.to_display()),
                        ));
                    }
                    Ok(Value::Number(arg.to_num()))
                }
                None => Ok(Value::Number(0.0)),
            })),
        ),
        (
            "str".to_string(),
            Value::NativeClass(NativeClass::new(|args, _scope| {
                Ok(Value::string(args.first().map(Value::to_display).unwrap_or_default()))
            })),
        ),
        (
            "bool".to_string(),
            Value::NativeClass(NativeClass::new(|args, _scope| {
                Ok(Value::Bool(args.first().is_some_and(Value::to_bool)))
            })),
        ),
        (
            "map".to_string(),
            Value::NativeClass(NativeClass::new(|args, _scope| match args.first() {
                Some(Value::Object(obj)) => Ok(Value::Object(ObjectValue::from_map(obj.entries()))),
                _ => Ok(Value::Object(ObjectValue::new())),
            })),
        ),
        (
            "array".to_string(),
            Value::NativeClass(NativeClass::new(|args, _scope| {
                Ok(Value::Array(ArrayValue::new(args)))
            })),
        ),
        (
            "function".to_string(),
            Value::NativeClass(NativeClass::new(|args, _scope| match args.first() {
                Some(func @ Value::Function(_)) => Ok(func.clone()),
                _ => Err(Signal::bare_throw(
                    ErrorKind::ArgumentError,
                    "Usage: new function(fn: function)",
                )),
            })),
        ),
        (
            "exit".to_string(),
            Value::NativeFn(NativeFn::new(|args, _scope| {
                process::exit(args.first().map_or(0, |code| code.to_num() as i32));
            })),
        ),
    ]
}

fn native_class(return_type: TypeRef) -> TypeRef {
    Type::with_val(TypeKind::Class, "native class", TypeVal::with_return(return_type))
}

/// Type descriptors for the globals table, seeded into root type scopes.
#[must_use]
pub fn type_globals() -> Vec<(String, TypeRef)> {
    let console_props: IndexMap<String, TypeRef> = ["println", "print", "prompt"]
        .into_iter()
        .map(|name| (name.to_string(), Type::simple(TypeKind::Function, "native function")))
        .collect();

    vec![
        (
            "console".to_string(),
            Type::with_val(TypeKind::Module, "module", TypeVal::with_props(console_props)),
        ),
        ("num".to_string(), native_class(Type::number())),
        ("str".to_string(), native_class(Type::string())),
        ("bool".to_string(), native_class(Type::boolean())),
        ("map".to_string(), native_class(Type::simple(TypeKind::Object, "map"))),
        ("array".to_string(), native_class(Type::array())),
        (
            "function".to_string(),
            native_class(Type::simple(TypeKind::Function, "function")),
        ),
        (
            "exit".to_string(),
            Type::with_val(
                TypeKind::Function,
                "native function",
                TypeVal::with_params(vec![Parameter {
                    ident: "code".to_string(),
                    ty: Type::number(),
                    has_default: true,
                }]),
            ),
        ),
    ]
}
