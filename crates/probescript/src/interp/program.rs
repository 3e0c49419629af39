use std::sync::Arc;

use crate::ast::{Expr, Program, Stmt};
use crate::context::{Context, RunMode};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::interp::{eval, eval_expr, probes};
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::{ObjectValue, Value};

/// Runs a program in the mode selected by the context.
///
/// - Normal: declare top-level forms until the entry probe is found, then
///   invoke it with no arguments.
/// - REPL: evaluate every statement, keeping the last value for display.
/// - Exports: evaluate every statement, recording `export` bindings; the
///   result is the exports object.
pub(crate) fn eval_program(program: &Program, env: &Scope, ctx: &Arc<Context>) -> EvalResult {
    match ctx.mode {
        RunMode::Normal => eval_normal(program, env, ctx),
        RunMode::Repl => {
            let mut last = Value::Undef;
            for stmt in &program.body {
                last = eval(stmt, env, ctx)?;
            }
            Ok(last)
        }
        RunMode::Exports => Ok(Value::Object(eval_exports(program, ctx)?)),
    }
}

fn eval_normal(program: &Program, env: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let scope = Scope::child(env);

    let mut entry = None;
    for stmt in &program.body {
        if let Stmt::ProbeDecl(probe) = stmt {
            if probe.name == ctx.probe_name {
                entry = Some(probe);
                break;
            }
        }
        match stmt {
            Stmt::VarDecl(_)
            | Stmt::FnDecl(_)
            | Stmt::ClassDecl(_)
            | Stmt::ProbeDecl(_)
            | Stmt::Import(_)
            | Stmt::ModuleDecl(_) => {
                eval(stmt, &scope, ctx)?;
            }
            other => {
                return Err(Signal::fatal(
                    ErrorKind::ProgramError,
                    "Only variable, function, class, and probe declarations are allowed in program bodies",
                    other.token(),
                ));
            }
        }
    }

    let Some(probe_decl) = entry else {
        return Err(Signal::Fatal(Box::new(Diagnostic::new(
            ErrorKind::MainError,
            format!("Probe {} is not defined", ctx.probe_name),
        ))));
    };

    let probe_val = probes::eval_probe_decl(probe_decl, &scope)?;
    let Value::Probe(probe) = &probe_val else {
        unreachable!("probe declarations evaluate to probe values");
    };
    probes::call_probe(probe, Vec::new(), ctx, &probe_decl.token)
}

/// Evaluates a module body in Exports mode, returning the recorded bindings.
///
/// Export statements record by name: an identifier export reads its current
/// value, an assignment export records the left identifier with the right
/// value, and declaration exports record the declaration's name with the
/// constructed value.
pub fn eval_exports(program: &Program, ctx: &Arc<Context>) -> EvalResult<ObjectValue> {
    let env = Scope::root(ctx);
    let exports = ObjectValue::new();

    for stmt in &program.body {
        let Stmt::Export(export) = stmt else {
            eval(stmt, &env, ctx)?;
            continue;
        };

        let (name, value) = match &*export.value {
            Stmt::Expr(Expr::Ident(ident)) => {
                let value = env.lookup(&ident.name, &ident.token)?;
                (ident.name.clone(), value)
            }
            Stmt::Expr(Expr::Assign(assign)) => {
                let Expr::Ident(ident) = &assign.target else {
                    return Err(Signal::fatal(
                        ErrorKind::ExportError,
                        "Cannot export non identifier assignment",
                        &assign.token,
                    ));
                };
                let value = eval_expr(&assign.value, &env, ctx)?;
                (ident.name.clone(), value)
            }
            Stmt::FnDecl(decl) => (decl.name.clone(), eval(&export.value, &env, ctx)?),
            Stmt::ClassDecl(decl) => (decl.name.clone(), eval(&export.value, &env, ctx)?),
            Stmt::ProbeDecl(decl) => (decl.name.clone(), eval(&export.value, &env, ctx)?),
            other => {
                return Err(Signal::fatal(
                    ErrorKind::ExportError,
                    "Unknown export type",
                    other.token(),
                ));
            }
        };
        exports.set(&name, value);
    }

    Ok(exports)
}
