use std::sync::Arc;

use crate::ast::{ForStmt, WhileStmt};
use crate::context::Context;
use crate::interp::{eval, eval_body, eval_expr};
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::Value;

/// `while (cond) body`: the body runs in a fresh scope per iteration; break
/// and continue are confined here.
pub(crate) fn eval_while(stmt: &WhileStmt, env: &Scope, ctx: &Arc<Context>) -> EvalResult {
    loop {
        if !eval_expr(&stmt.condition, env, ctx)?.to_bool() {
            break;
        }
        let scope = Scope::child(env);
        match eval_body(&stmt.body, &scope, ctx) {
            Ok(_) => {}
            Err(Signal::Break { .. }) => break,
            Err(Signal::Continue { .. }) => continue,
            Err(other) => return Err(other),
        }
    }
    Ok(Value::Undef)
}

/// `for (inits; conds; updates) body`, semantically the unrolling
/// `{ inits; while (conds) { body; updates } }`.
///
/// Initializers live in a scope that survives iterations; each iteration
/// gets a child scope. Updates run after the body completes normally and
/// after a continue, never after a break.
pub(crate) fn eval_for(stmt: &ForStmt, env: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let parent = Scope::child(env);
    for init in &stmt.inits {
        eval(init, &parent, ctx)?;
    }

    'outer: loop {
        let scope = Scope::child(&parent);

        for condition in &stmt.conditions {
            if !eval_expr(condition, &scope, ctx)?.to_bool() {
                break 'outer;
            }
        }

        match eval_body(&stmt.body, &scope, ctx) {
            Ok(_) => {}
            Err(Signal::Break { .. }) => break,
            Err(Signal::Continue { .. }) => {
                for update in &stmt.updates {
                    eval_expr(update, &scope, ctx)?;
                }
                continue;
            }
            Err(other) => return Err(other),
        }

        for update in &stmt.updates {
            eval_expr(update, &scope, ctx)?;
        }
    }

    Ok(Value::Undef)
}
