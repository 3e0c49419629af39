use std::fs;
use std::sync::Arc;

use crate::ast::{Expr, ImportStmt};
use crate::context::{Context, RunMode};
use crate::diagnostic::ErrorKind;
use crate::interp::{eval_expr, program};
use crate::modules;
use crate::parser;
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::Value;

/// Resolves an import: the standard-library table is consulted first, then
/// the context's module map. Project modules are read, parsed, and
/// evaluated in Exports mode; the binding lands under the alias, the member
/// path's last segment, or the module name.
pub(crate) fn eval_import(stmt: &ImportStmt, env: &Scope, ctx: &Arc<Context>) -> EvalResult {
    if let Some((value, _)) = modules::stdlib_module(&stmt.name) {
        bind_import(stmt, env, ctx, value)?;
        return Ok(Value::Undef);
    }

    let Some(path) = ctx.modules.get(&stmt.name) else {
        return Err(Signal::throw(
            ErrorKind::ImportError,
            format!("Cannot find module {}", stmt.name),
            &stmt.token,
        ));
    };

    let source = fs::read_to_string(path).map_err(|_| {
        Signal::throw(
            ErrorKind::ImportError,
            format!("Cannot find module {}", stmt.name),
            &stmt.token,
        )
    })?;

    let mut module_ctx = Context::new(RunMode::Exports, "Main").with_writer(Arc::clone(&ctx.writer));
    module_ctx.filename = path.display().to_string();
    module_ctx.source.clone_from(&source);
    module_ctx.modules = ctx.modules.clone();
    module_ctx.project = ctx.project.clone();
    let module_ctx = Arc::new(module_ctx);

    let parsed = parser::parse(&source, &module_ctx)?;
    let exports = program::eval_exports(&parsed, &module_ctx)?;

    bind_import(stmt, env, ctx, Value::Object(exports))?;
    Ok(Value::Undef)
}

/// Binds a resolved module value under the import's target name. Member
/// imports evaluate the member chain against a scratch scope where only the
/// module name is bound.
fn bind_import(stmt: &ImportStmt, env: &Scope, ctx: &Arc<Context>, module_value: Value) -> EvalResult<()> {
    if let Some(member) = &stmt.member {
        let scratch = Scope::root(ctx);
        scratch.declare(&stmt.name, module_value, member.token())?;
        let bound = eval_expr(member, &scratch, ctx)?;

        let last_prop = match member {
            Expr::MemberAccess(access) => access.last_prop.clone(),
            _ => None,
        };
        let name = stmt
            .alias
            .clone()
            .or(last_prop)
            .unwrap_or_else(|| stmt.name.clone());
        env.declare(&name, bound, member.token())?;
        return Ok(());
    }

    let name = stmt.alias.clone().unwrap_or_else(|| stmt.name.clone());
    env.declare(&name, module_value, &stmt.token)?;
    Ok(())
}
