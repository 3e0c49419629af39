//! The tree-walking interpreter.
//!
//! A single [`eval`] dispatch drives everything, split across submodules the
//! same way the language splits: calls, classes, probes, loops, program
//! modes, and imports. Every boundary returns `Result<Value, Signal>`; see
//! [`crate::signal::Signal`] for how control transfers are routed.

mod calls;
mod classes;
mod imports;
mod loops;
mod probes;
mod program;

use std::sync::Arc;

pub use calls::call_value;
pub use program::eval_exports;

use crate::ast::{
    AssignExpr, AssignOp, BinExpr, BinaryOp, CastExpr, Expr, IfStmt, MapLit, MemberAccess, MemberAssign,
    MemberAssignOp, PrefixOp, Stmt, StepOp, Ternary, TryStmt, UnaryPostfix, UnaryPrefix, VarDecl,
};
use crate::context::Context;
use crate::diagnostic::ErrorKind;
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::{ArrayValue, FunctionInner, ObjectValue, Value};

/// Evaluates one statement under the given scope and context.
pub fn eval(node: &Stmt, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    match node {
        Stmt::Program(program) => program::eval_program(program, scope, ctx),
        Stmt::VarDecl(decl) => eval_var_decl(decl, scope, ctx),
        Stmt::FnDecl(decl) => calls::eval_fn_decl(decl, scope, true),
        Stmt::ProbeDecl(decl) => probes::eval_probe_decl(decl, scope),
        Stmt::ClassDecl(decl) => classes::eval_class_decl(decl, scope),
        Stmt::If(stmt) => eval_if_stmt(stmt, scope, ctx),
        Stmt::While(stmt) => loops::eval_while(stmt, scope, ctx),
        Stmt::For(stmt) => loops::eval_for(stmt, scope, ctx),
        Stmt::Return(stmt) => {
            let value = match &stmt.value {
                Some(expr) => eval_expr(expr, scope, ctx)?,
                None => Value::Undef,
            };
            Err(Signal::return_value(value, &stmt.token))
        }
        Stmt::Break { token } => Err(Signal::break_signal(token)),
        Stmt::Continue { token } => Err(Signal::continue_signal(token)),
        Stmt::Throw(stmt) => {
            let value = eval_expr(&stmt.value, scope, ctx)?;
            Err(Signal::Throw {
                message: value.to_display(),
            })
        }
        Stmt::Try(stmt) => eval_try_stmt(stmt, scope, ctx),
        Stmt::Import(stmt) => imports::eval_import(stmt, scope, ctx),
        // An export outside Exports mode evaluates its inner statement.
        Stmt::Export(stmt) => eval(&stmt.value, scope, ctx),
        Stmt::ModuleDecl(_) => Ok(Value::Undef),
        Stmt::Expr(expr) => eval_expr(expr, scope, ctx),
    }
}

/// Evaluates a statement list, discarding statement values.
pub(crate) fn eval_body(body: &[Stmt], scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    for stmt in body {
        eval(stmt, scope, ctx)?;
    }
    Ok(Value::Undef)
}

pub(crate) fn eval_expr(expr: &Expr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    match expr {
        Expr::Num(lit) => Ok(Value::Number(lit.value)),
        Expr::Str(lit) => Ok(Value::string(lit.value.clone())),
        Expr::Bool(lit) => Ok(Value::Bool(lit.value)),
        Expr::Null { .. } => Ok(Value::Null),
        Expr::Undef { .. } => Ok(Value::Undef),
        Expr::Ident(ident) => Ok(scope.lookup(&ident.name, &ident.token)?),
        Expr::BinOp(bin) => eval_bin_expr(bin, scope, ctx),
        Expr::UnaryPrefix(unary) => eval_unary_prefix(unary, scope, ctx),
        Expr::UnaryPostfix(unary) => eval_unary_postfix(unary, scope, ctx),
        Expr::Ternary(ternary) => eval_ternary(ternary, scope, ctx),
        Expr::Assign(assign) => eval_assignment(assign, scope, ctx),
        Expr::MemberAccess(member) => eval_member_access(member, scope, ctx),
        Expr::MemberAssign(member) => eval_member_assign(member, scope, ctx),
        Expr::Call(call) => calls::eval_call(call, scope, ctx),
        Expr::TemplateCall(call) => calls::eval_template_call(call, scope, ctx),
        Expr::New(new_expr) => classes::eval_new(new_expr, scope, ctx),
        Expr::ArrayLit(lit) => {
            let mut items = Vec::with_capacity(lit.items.len());
            for item in &lit.items {
                items.push(eval_expr(item, scope, ctx)?);
            }
            Ok(Value::Array(ArrayValue::new(items)))
        }
        Expr::MapLit(lit) => eval_object(lit, scope, ctx),
        Expr::Arrow(arrow) => Ok(Value::Function(Arc::new(FunctionInner {
            name: "arrow".to_string(),
            params: arrow.params.clone(),
            template_params: Vec::new(),
            decl_scope: scope.clone(),
            body: arrow.body.clone(),
            is_async: false,
        }))),
        Expr::Await(await_expr) => calls::eval_await(await_expr, scope, ctx),
        Expr::Cast(cast) => eval_cast(cast, scope, ctx),
    }
}

fn eval_var_decl(decl: &VarDecl, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let value = match &decl.value {
        Some(expr) => eval_expr(expr, scope, ctx)?,
        None => Value::Undef,
    };
    Ok(scope.declare(&decl.name, value, &decl.token)?)
}

fn eval_if_stmt(stmt: &IfStmt, base: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let condition = eval_expr(&stmt.condition, base, ctx)?;

    if condition.to_bool() {
        let scope = Scope::child(base);
        return eval_body(&stmt.body, &scope, ctx);
    }
    if let Some(else_body) = &stmt.else_body {
        let scope = Scope::child(base);
        return eval_body(else_body, &scope, ctx);
    }
    Ok(Value::Undef)
}

fn eval_ternary(ternary: &Ternary, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let condition = eval_expr(&ternary.condition, scope, ctx)?;
    if condition.to_bool() {
        eval_expr(&ternary.consequent, scope, ctx)
    } else {
        eval_expr(&ternary.alternate, scope, ctx)
    }
}

fn eval_bin_expr(bin: &BinExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    if bin.op.is_boolean() {
        return eval_boolean_bin_expr(bin, scope, ctx);
    }

    let left = eval_expr(&bin.left, scope, ctx)?;
    let right = eval_expr(&bin.right, scope, ctx)?;

    Ok(match bin.op {
        BinaryOp::Add => left.add(&right),
        BinaryOp::Sub => left.sub(&right),
        BinaryOp::Mul => left.mul(&right),
        BinaryOp::Div => left.div(&right),
        BinaryOp::Mod => left.modulo(&right),
        _ => unreachable!("boolean operators are dispatched above"),
    })
}

/// Boolean operators evaluate both sides; `&&` and `||` do not short-circuit.
fn eval_boolean_bin_expr(bin: &BinExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let left = eval_expr(&bin.left, scope, ctx)?;
    let right = eval_expr(&bin.right, scope, ctx)?;

    let result = match bin.op {
        BinaryOp::And => left.to_bool() && right.to_bool(),
        BinaryOp::Or => left.to_bool() || right.to_bool(),
        BinaryOp::Eq => left.compare(&right),
        BinaryOp::NotEq => !left.compare(&right),
        BinaryOp::Less => left.to_num() < right.to_num(),
        BinaryOp::Greater => left.to_num() > right.to_num(),
        BinaryOp::LessEq => left.to_num() <= right.to_num(),
        BinaryOp::GreaterEq => left.to_num() >= right.to_num(),
        _ => {
            return Err(Signal::throw(
                ErrorKind::OperatorError,
                format!("Invalid binary boolean operator: {}", bin.op),
                &bin.token,
            ));
        }
    };
    Ok(Value::Bool(result))
}

fn eval_assignment(assign: &AssignExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let Expr::Ident(ident) = &assign.target else {
        return Err(Signal::throw(
            ErrorKind::AssignmentError,
            "Expected Identifier in assignment",
            &assign.token,
        ));
    };

    let left = eval_expr(&assign.target, scope, ctx)?;
    let right = eval_expr(&assign.value, scope, ctx)?;

    let result = match assign.op {
        AssignOp::Assign => right,
        AssignOp::Add => left.add(&right),
        AssignOp::Sub => left.sub(&right),
        AssignOp::Mul => left.mul(&right),
        AssignOp::Div => left.div(&right),
    };

    Ok(scope.assign(&ident.name, result, &assign.token)?)
}

/// Postfix `++`/`--` reads, writes the stepped value, and returns the old
/// numeric value. Member targets rewrite to a member assignment with an
/// operand of 1.
fn eval_unary_postfix(expr: &UnaryPostfix, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    match &expr.operand {
        Expr::Ident(ident) => {
            let current = scope.lookup(&ident.name, &ident.token)?;
            let Value::Number(old) = current else {
                return Err(Signal::throw(
                    ErrorKind::OperatorError,
                    "Postfix operators only supported on numbers",
                    &expr.token,
                ));
            };
            let stepped = match expr.op {
                StepOp::Inc => old + 1.0,
                StepOp::Dec => old - 1.0,
            };
            scope.assign(&ident.name, Value::Number(stepped), &expr.token)?;
            Ok(Value::Number(old))
        }
        Expr::MemberAccess(member) => {
            let rewritten = MemberAssign {
                token: expr.token.clone(),
                object: member.object.clone(),
                property: member.property.clone(),
                computed: member.computed,
                value: Expr::Num(crate::ast::NumLit {
                    token: expr.token.clone(),
                    value: 1.0,
                }),
                op: match expr.op {
                    StepOp::Inc => MemberAssignOp::Inc,
                    StepOp::Dec => MemberAssignOp::Dec,
                },
            };
            eval_member_assign(&rewritten, scope, ctx)
        }
        _ => Ok(Value::Undef),
    }
}

/// Prefix `!` negates truthiness; prefix `++`/`--` only evaluate the operand.
fn eval_unary_prefix(expr: &UnaryPrefix, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let value = eval_expr(&expr.operand, scope, ctx)?;
    match expr.op {
        PrefixOp::Not => Ok(Value::Bool(!value.to_bool())),
        PrefixOp::Inc | PrefixOp::Dec => Ok(Value::Undef),
    }
}

fn eval_member_access(member: &MemberAccess, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let object = eval_expr(&member.object, scope, ctx)?;

    // Computed numeric access on arrays is indexing; everything else goes
    // through the property map.
    if let (Value::Array(items), true) = (&object, member.computed) {
        let index = eval_expr(&member.property, scope, ctx)?;
        let Value::Number(n) = index else {
            return Err(Signal::throw(
                ErrorKind::TypeError,
                "Array index must evaluate to a number",
                &member.token,
            ));
        };
        let idx = n as i64;
        if idx < 0 || idx as usize >= items.len() {
            return Ok(Value::Undef);
        }
        return Ok(items.get(idx as usize).unwrap_or(Value::Undef));
    }

    let key = if member.computed {
        let property = eval_expr(&member.property, scope, ctx)?;
        let Value::Str(s) = property else {
            return Err(Signal::throw(
                ErrorKind::TypeError,
                "Computed property must evaluate to a string",
                &member.token,
            ));
        };
        s.as_str().to_string()
    } else {
        let Expr::Ident(ident) = &member.property else {
            return Err(Signal::throw(
                ErrorKind::MemberError,
                "Member property must be an identifier",
                &member.token,
            ));
        };
        ident.name.clone()
    };

    // Missing properties are undefined, not an error.
    Ok(object.property(&key).unwrap_or(Value::Undef))
}

fn apply_member_op(op: MemberAssignOp, current: &Value, value: &Value) -> Value {
    match op {
        MemberAssignOp::Assign => value.clone(),
        MemberAssignOp::Add | MemberAssignOp::Inc => current.add(value),
        MemberAssignOp::Sub | MemberAssignOp::Dec => current.sub(value),
        MemberAssignOp::Mul => current.mul(value),
        MemberAssignOp::Div => current.div(value),
    }
}

fn eval_member_assign(member: &MemberAssign, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let object = eval_expr(&member.object, scope, ctx)?;
    let value = eval_expr(&member.value, scope, ctx)?;

    let key = if member.computed {
        let property = eval_expr(&member.property, scope, ctx)?;

        if let Value::Number(n) = property {
            let Value::Array(items) = &object else {
                return Err(Signal::throw(
                    ErrorKind::MemberError,
                    "Cannot use numeric index on non-array object",
                    &member.token,
                ));
            };
            let idx = n as i64;
            if idx < 0 {
                return Err(Signal::throw(
                    ErrorKind::MemberError,
                    "Array index must be non-negative",
                    &member.token,
                ));
            }
            let idx = idx as usize;
            let current = items.get(idx).unwrap_or(Value::Undef);
            items.set(idx, apply_member_op(member.op, &current, &value));
            return Ok(object.clone());
        }

        let Value::Str(s) = property else {
            return Err(Signal::throw(
                ErrorKind::MemberError,
                "Computed property must evaluate to a string or number",
                &member.token,
            ));
        };
        s.as_str().to_string()
    } else {
        let Expr::Ident(ident) = &member.property else {
            return Err(Signal::throw(
                ErrorKind::MemberError,
                "Member property must be an identifier",
                &member.token,
            ));
        };
        ident.name.clone()
    };

    let Value::Object(obj) = &object else {
        return Err(Signal::throw(
            ErrorKind::TypeError,
            "Cannot assign member to non-object/non-array value",
            &member.token,
        ));
    };
    let current = obj.get(&key).unwrap_or(Value::Undef);
    obj.set(&key, apply_member_op(member.op, &current, &value));
    Ok(object.clone())
}

fn eval_object(lit: &MapLit, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let object = ObjectValue::new();
    for property in &lit.properties {
        let value = match &property.value {
            Some(expr) => eval_expr(expr, scope, ctx)?,
            // Shorthand entry: read the key's name from the enclosing scope.
            None => scope.lookup(&property.key, &property.token)?,
        };
        object.set(&property.key, value);
    }
    Ok(Value::Object(object))
}

fn eval_try_stmt(stmt: &TryStmt, env: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let handler = Value::Function(Arc::new(FunctionInner {
        name: "catch".to_string(),
        params: stmt.catch.params.clone(),
        template_params: Vec::new(),
        decl_scope: env.clone(),
        body: stmt.catch.body.clone(),
        is_async: false,
    }));

    let scope = Scope::child(env);
    match eval_body(&stmt.body, &scope, ctx) {
        Ok(_) => {}
        Err(Signal::Throw { message }) => {
            calls::call_value(&handler, vec![Value::string(message)], &scope, ctx, &stmt.catch.token)?;
        }
        Err(other) => return Err(other),
    }
    Ok(Value::Undef)
}

/// Casts to the primitive kinds convert; every other cast evaluates to its
/// operand unchanged.
fn eval_cast(cast: &CastExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let value = eval_expr(&cast.operand, scope, ctx)?;
    if let Expr::Ident(ident) = &cast.target {
        return Ok(match ident.name.as_str() {
            "num" => Value::Number(value.to_num()),
            "str" => Value::string(value.to_display()),
            "bool" => Value::Bool(value.to_bool()),
            _ => value,
        });
    }
    Ok(value)
}
