use std::sync::Arc;

use crate::ast::{AssignOp, Expr, ProbeDecl, Stmt};
use crate::context::Context;
use crate::diagnostic::ErrorKind;
use crate::interp::{calls, eval_expr};
use crate::lexer::Token;
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::{ProbeInner, Value};

pub(crate) fn eval_probe_decl(decl: &ProbeDecl, scope: &Scope) -> EvalResult {
    let probe = Value::Probe(Arc::new(ProbeInner {
        name: decl.name.clone(),
        decl_scope: scope.clone(),
        body: decl.body.clone(),
        extends: decl.extends.clone(),
    }));
    Ok(scope.declare(&decl.name, probe, &decl.token)?)
}

/// The probe protocol: build a fresh scope parented to the declaration
/// scope, apply probe inheritance, walk the restricted body, then look up
/// `run` and invoke it with the caller's arguments.
pub(crate) fn call_probe(probe: &Arc<ProbeInner>, args: Vec<Value>, ctx: &Arc<Context>, token: &Token) -> EvalResult {
    let scope = Scope::child(&probe.decl_scope);

    inherit_probe(probe, &scope, ctx)?;

    for stmt in &probe.body {
        match stmt {
            // Members install over inherited ones, so overriding a base
            // probe's method or field is not a redeclaration.
            Stmt::FnDecl(func) => {
                let method = calls::eval_fn_decl(func, &scope, false)?;
                scope.force_declare(&func.name, method);
            }
            Stmt::VarDecl(field) => {
                let value = match &field.value {
                    Some(expr) => eval_expr(expr, &scope, ctx)?,
                    None => Value::Undef,
                };
                scope.force_declare(&field.name, value);
            }
            Stmt::Expr(Expr::Assign(assign)) => {
                if assign.op != AssignOp::Assign {
                    return Err(Signal::fatal(
                        ErrorKind::ProbeBodyError,
                        "Only = assignment is allowed in probe bodies",
                        &assign.token,
                    ));
                }
                let Expr::Ident(ident) = &assign.target else {
                    return Err(Signal::fatal(
                        ErrorKind::ProbeBodyError,
                        "Only identifiers can be assigned to in probe bodies",
                        &assign.token,
                    ));
                };
                let value = eval_expr(&assign.value, &scope, ctx)?;
                scope.force_declare(&ident.name, value);
            }
            other => {
                return Err(Signal::fatal(
                    ErrorKind::ProbeBodyError,
                    "Only variable, function, and assignment statements are allowed in probe bodies",
                    other.token(),
                ));
            }
        }
    }

    let Some(run) = scope.lookup_opt("run") else {
        return Err(Signal::fatal(
            ErrorKind::ProbeError,
            "Expected 'run' to be of type function",
            token,
        ));
    };
    if !matches!(run, Value::Function(_)) {
        return Err(Signal::fatal(
            ErrorKind::ProbeError,
            "Expected 'run' to be of type function",
            token,
        ));
    }

    calls::call_value(&run, args, &scope, ctx, token)?;
    Ok(Value::Undef)
}

/// Probe inheritance: probes may extend probes, or native classes (whose
/// constructed instance has its properties copied into the probe scope).
/// Superprobe members install root-first; the inherited `run` is bound as
/// `super` so a derived entry can chain to it.
fn inherit_probe(probe: &Arc<ProbeInner>, scope: &Scope, ctx: &Arc<Context>) -> EvalResult<()> {
    let Some(extends) = &probe.extends else {
        return Ok(());
    };

    let extends_val = eval_expr(extends, &probe.decl_scope, ctx)?;

    let super_probe = match extends_val {
        Value::Probe(super_probe) => super_probe,
        Value::NativeClass(native) => {
            let instance = (native.0)(Vec::new(), scope)?;
            if let Value::Object(obj) = instance {
                for (key, value) in obj.entries() {
                    scope.force_declare(&key, value);
                }
            }
            return Ok(());
        }
        _ => {
            return Err(Signal::fatal(
                ErrorKind::ProbeInheritanceError,
                "Probes can only inherit from probes",
                extends.token(),
            ));
        }
    };

    inherit_probe(&super_probe, scope, ctx)?;

    let parent_env = &super_probe.decl_scope;
    let mut inherited_run = None;
    for stmt in &super_probe.body {
        match stmt {
            Stmt::FnDecl(func) => {
                // Methods close over the superprobe's declaration scope.
                let method = calls::eval_fn_decl(func, parent_env, false)?;
                if func.name == "run" {
                    inherited_run = Some(method.clone());
                }
                scope.force_declare(&func.name, method);
            }
            Stmt::VarDecl(field) => {
                let value = match &field.value {
                    Some(expr) => eval_expr(expr, scope, ctx)?,
                    None => Value::Undef,
                };
                scope.force_declare(&field.name, value);
            }
            Stmt::Expr(Expr::Assign(assign)) => {
                if assign.op != AssignOp::Assign {
                    return Err(Signal::fatal(
                        ErrorKind::ProbeBodyError,
                        "Only = assignment is allowed in probe bodies",
                        &assign.token,
                    ));
                }
                let Expr::Ident(ident) = &assign.target else {
                    return Err(Signal::fatal(
                        ErrorKind::ProbeBodyError,
                        "Only identifiers can be assigned to in probe bodies",
                        &assign.token,
                    ));
                };
                let value = eval_expr(&assign.value, scope, ctx)?;
                scope.force_declare(&ident.name, value);
            }
            other => {
                return Err(Signal::fatal(
                    ErrorKind::ProbeBodyError,
                    "Only variable, function, and assignment statements are allowed in probe bodies",
                    other.token(),
                ));
            }
        }
    }

    if let Some(run) = inherited_run {
        scope.force_declare("super", run);
    }
    Ok(())
}
