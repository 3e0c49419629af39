use std::sync::Arc;
use std::thread;

use smallvec::SmallVec;

use crate::ast::{AwaitExpr, CallExpr, FnDecl, TemplateCall};
use crate::context::Context;
use crate::diagnostic::ErrorKind;
use crate::interp::{eval_body, eval_expr, probes};
use crate::lexer::Token;
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::{FunctionInner, FutureValue, Value};

/// Evaluates a function declaration into a function value, binding it into
/// `scope` unless `declare` is false (class and probe bodies bind methods
/// onto the instance instead).
pub(crate) fn eval_fn_decl(decl: &FnDecl, scope: &Scope, declare: bool) -> EvalResult {
    let func = Value::Function(Arc::new(FunctionInner {
        name: decl.name.clone(),
        params: decl.params.clone(),
        template_params: decl.template_params.clone(),
        decl_scope: scope.clone(),
        body: decl.body.clone(),
        is_async: decl.is_async,
    }));

    if declare {
        return Ok(scope.declare(&decl.name, func, &decl.token)?);
    }
    Ok(func)
}

/// `Call(callee, args)`: the callee is evaluated first, then the arguments
/// left to right.
pub(crate) fn eval_call(call: &CallExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let callee = eval_expr(&call.callee, scope, ctx)?;

    let mut args: SmallVec<[Value; 8]> = SmallVec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(eval_expr(arg, scope, ctx)?);
    }

    call_value(&callee, args.into_vec(), scope, ctx, &call.token)
}

/// Invokes any callable value: native functions directly, user functions via
/// a fresh call frame (or a background task when async), and probes via the
/// probe protocol.
pub fn call_value(func: &Value, args: Vec<Value>, scope: &Scope, ctx: &Arc<Context>, token: &Token) -> EvalResult {
    match func {
        Value::NativeFn(native) => (native.0)(args, scope),
        Value::Function(inner) => {
            if inner.is_async {
                Ok(spawn_async_call(inner, args, scope, ctx))
            } else {
                call_function(inner, args, scope, ctx)
            }
        }
        Value::Probe(probe) => probes::call_probe(probe, args, ctx, token),
        _ => Err(Signal::throw(
            ErrorKind::FunctionCallError,
            "Cannot call value that is not a function",
            token,
        )),
    }
}

/// Runs a user function synchronously: a fresh scope parented to the
/// declaration scope, parameters bound to arguments or to their evaluated
/// defaults, then the body until a return surfaces.
pub(crate) fn call_function(
    func: &Arc<FunctionInner>,
    args: Vec<Value>,
    caller_scope: &Scope,
    ctx: &Arc<Context>,
) -> EvalResult {
    let scope = Scope::child(&func.decl_scope);

    for (i, param) in func.params.iter().enumerate() {
        let value = match args.get(i) {
            Some(arg) => arg.clone(),
            // Defaults are evaluated in the caller's scope.
            None => match &param.value {
                Some(default) => eval_expr(default, caller_scope, ctx)?,
                None => Value::Undef,
            },
        };
        scope.declare(&param.name, value, &param.token)?;
    }

    match eval_body(&func.body, &scope, ctx) {
        Ok(_) => Ok(Value::Undef),
        Err(Signal::Return { value, .. }) => Ok(value),
        Err(other) => Err(other),
    }
}

/// Wraps an async invocation in a background task yielding a future.
fn spawn_async_call(func: &Arc<FunctionInner>, args: Vec<Value>, caller_scope: &Scope, ctx: &Arc<Context>) -> Value {
    let future = FutureValue::new();

    let task_future = future.clone();
    let func = Arc::clone(func);
    let caller_scope = caller_scope.clone();
    let ctx = Arc::clone(ctx);
    thread::spawn(move || {
        let result = call_function(&func, args, &caller_scope, &ctx);
        task_future.complete(result.map_err(|signal| signal.top_level_message()));
    });

    Value::Future(future)
}

/// `await expr` requires a future operand; it blocks the current task until
/// the future resolves. A failed task surfaces as an `AsyncError`.
pub(crate) fn eval_await(expr: &AwaitExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let value = eval_expr(&expr.operand, scope, ctx)?;

    let Value::Future(future) = value else {
        return Err(Signal::bare_throw(ErrorKind::ArgumentError, "'await' requires a future"));
    };

    future
        .wait()
        .map_err(|_| Signal::bare_throw(ErrorKind::AsyncError, "Async function failed"))
}

/// A runtime template call specializes a function value: template arguments
/// are evaluated and bound in a fresh child of the declaration scope, and a
/// new function value closing over that scope is returned.
pub(crate) fn eval_template_call(call: &TemplateCall, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let caller = eval_expr(&call.callee, scope, ctx)?;

    let Value::Function(inner) = caller else {
        // Mirrors calling a template on a non-function: an empty callable.
        return Ok(Value::Function(Arc::new(FunctionInner {
            name: "template".to_string(),
            params: Vec::new(),
            template_params: Vec::new(),
            decl_scope: Scope::child(scope),
            body: Vec::new(),
            is_async: false,
        })));
    };

    let instance_scope = Scope::child(&inner.decl_scope);
    for (i, template_param) in inner.template_params.iter().enumerate() {
        let value = match call.template_args.get(i) {
            Some(arg) => eval_expr(arg, &instance_scope, ctx)?,
            None => Value::Undef,
        };
        instance_scope.declare(&template_param.name, value, &template_param.token)?;
    }

    Ok(Value::Function(Arc::new(FunctionInner {
        name: inner.name.clone(),
        params: inner.params.clone(),
        template_params: Vec::new(),
        decl_scope: instance_scope,
        body: inner.body.clone(),
        is_async: inner.is_async,
    })))
}
