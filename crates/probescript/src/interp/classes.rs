use std::sync::Arc;

use crate::ast::{AssignOp, ClassDecl, Expr, NewExpr, Stmt};
use crate::context::Context;
use crate::diagnostic::ErrorKind;
use crate::interp::{calls, eval_expr};
use crate::scope::Scope;
use crate::signal::{EvalResult, Signal};
use crate::value::{ClassInner, ObjectValue, Value};

pub(crate) fn eval_class_decl(decl: &ClassDecl, scope: &Scope) -> EvalResult {
    let class = Value::Class(Arc::new(ClassInner {
        name: decl.name.clone(),
        decl_scope: scope.clone(),
        body: decl.body.clone(),
        extends: decl.extends.clone(),
    }));
    Ok(scope.declare(&decl.name, class, &decl.token)?)
}

/// `new Cls(args)`: native classes invoke their constructor closure; user
/// classes build a fresh `this`, apply inheritance root-first, walk the
/// body, and invoke `this.new` when present.
pub(crate) fn eval_new(new_expr: &NewExpr, scope: &Scope, ctx: &Arc<Context>) -> EvalResult {
    let constructor = eval_expr(&new_expr.ctor, scope, ctx)?;

    if let Value::NativeClass(native) = &constructor {
        let mut args = Vec::with_capacity(new_expr.args.len());
        for arg in &new_expr.args {
            args.push(eval_expr(arg, scope, ctx)?);
        }
        return (native.0)(args, scope);
    }

    let Value::Class(class) = constructor else {
        return Err(Signal::throw(
            ErrorKind::ConstructorError,
            "Cannot construct non class value",
            new_expr.ctor.token(),
        ));
    };

    let mut args = Vec::with_capacity(new_expr.args.len());
    for arg in &new_expr.args {
        args.push(eval_expr(arg, scope, ctx)?);
    }

    let class_scope = Scope::child(&class.decl_scope);
    let this_obj = ObjectValue::new();
    class_scope.declare("this", Value::Object(this_obj.clone()), &new_expr.token)?;

    inherit_class(&class, &class_scope, &this_obj, ctx)?;

    install_class_body(&class.body, &class_scope, &this_obj, ctx)?;

    if let Some(ctor) = this_obj.get("new") {
        calls::call_value(&ctor, args, &class_scope, ctx, &new_expr.token)?;
    }

    Ok(Value::Object(this_obj))
}

/// Walks a class body, installing fields and methods onto `this`.
///
/// Bodies may contain only var-declarations, function-declarations, and
/// plain `=` assignments; anything else is a `ClassBodyError`.
fn install_class_body(body: &[Stmt], scope: &Scope, this_obj: &ObjectValue, ctx: &Arc<Context>) -> EvalResult<()> {
    for stmt in body {
        match stmt {
            Stmt::FnDecl(func) => {
                let method = calls::eval_fn_decl(func, scope, false)?;
                this_obj.set(&func.name, method);
            }
            Stmt::VarDecl(field) => {
                let value = match &field.value {
                    Some(expr) => eval_expr(expr, scope, ctx)?,
                    None => Value::Undef,
                };
                this_obj.set(&field.name, value);
            }
            Stmt::Expr(Expr::Assign(assign)) => {
                if assign.op != AssignOp::Assign {
                    return Err(Signal::fatal(
                        ErrorKind::ClassBodyError,
                        "Only = assignment is allowed in class bodies",
                        &assign.token,
                    ));
                }
                let Expr::Ident(ident) = &assign.target else {
                    return Err(Signal::fatal(
                        ErrorKind::ClassBodyError,
                        "Only identifiers can be assigned to in class bodies",
                        &assign.token,
                    ));
                };
                let value = eval_expr(&assign.value, scope, ctx)?;
                this_obj.set(&ident.name, value);
            }
            other => {
                return Err(Signal::fatal(
                    ErrorKind::ClassBodyError,
                    "Only variable, function, and assignment statements are allowed in class bodies",
                    other.token(),
                ));
            }
        }
    }
    Ok(())
}

/// Applies inheritance recursively, root-first: each superclass runs in a
/// child of its own declaration scope with `this` bound to the shared
/// object. A superclass constructor is installed on the instance (derived
/// bodies overwrite it) and bound as `super` in the subclass scope.
fn inherit_class(class: &Arc<ClassInner>, scope: &Scope, this_obj: &ObjectValue, ctx: &Arc<Context>) -> EvalResult<()> {
    let Some(extends) = &class.extends else {
        return Ok(());
    };

    let extends_val = eval_expr(extends, &class.decl_scope, ctx)?;
    let Value::Class(super_class) = extends_val else {
        return Err(Signal::bare_throw(
            ErrorKind::ClassInheritanceError,
            "Superclass must be a class",
        ));
    };

    let super_scope = Scope::child(&super_class.decl_scope);
    super_scope.declare("this", Value::Object(this_obj.clone()), extends.token())?;

    inherit_class(&super_class, &super_scope, this_obj, ctx)?;

    let mut constructor = None;
    for stmt in &super_class.body {
        match stmt {
            Stmt::FnDecl(func) => {
                let method = calls::eval_fn_decl(func, &super_scope, false)?;
                if func.name == "new" {
                    constructor = Some(method.clone());
                }
                this_obj.set(&func.name, method);
            }
            Stmt::VarDecl(field) => {
                let value = match &field.value {
                    Some(expr) => eval_expr(expr, &super_scope, ctx)?,
                    None => Value::Undef,
                };
                this_obj.set(&field.name, value);
            }
            Stmt::Expr(Expr::Assign(assign)) => {
                if assign.op != AssignOp::Assign {
                    return Err(Signal::fatal(
                        ErrorKind::ClassBodyError,
                        "Only = assignment is allowed in class bodies",
                        &assign.token,
                    ));
                }
                let Expr::Ident(ident) = &assign.target else {
                    return Err(Signal::fatal(
                        ErrorKind::ClassBodyError,
                        "Only identifiers can be assigned to in class bodies",
                        &assign.token,
                    ));
                };
                let value = eval_expr(&assign.value, &super_scope, ctx)?;
                this_obj.set(&ident.name, value);
            }
            other => {
                return Err(Signal::fatal(
                    ErrorKind::ClassBodyError,
                    "Only variable, function, and assignment statements are allowed in class bodies",
                    other.token(),
                ));
            }
        }
    }

    if let Some(ctor) = constructor {
        scope.declare("super", ctor, extends.token())?;
    }
    Ok(())
}
