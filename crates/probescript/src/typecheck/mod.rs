//! The gradual type checker.
//!
//! A parallel walk over the AST that declares types into [`TypeScope`]s and
//! reports the first violation as a [`Diagnostic`]. Compatibility is
//! structural (see [`types::compare`]); templates are late-bound, re-checking
//! the function's source declaration under a scope cloned at the call site.

mod env;
mod types;

use std::collections::HashSet;
use std::fs;
use std::rc::Rc;
use std::sync::Arc;

pub use env::TypeScope;
pub use types::{compare, Parameter, Type, TypeKind, TypeRef, TypeVal};

use indexmap::IndexMap;

use crate::ast::{
    ArrowFn, AssignExpr, AssignOp, BinExpr, CastExpr, ClassDecl, Expr, FnDecl, ForStmt, IfStmt, ImportStmt, MapLit,
    MemberAccess, MemberAssign, NewExpr, PrefixOp, ProbeDecl, Program, ReturnStmt, Stmt, TemplateCall, Ternary,
    UnaryPostfix, UnaryPrefix, VarDecl,
};
use crate::context::{Context, RunMode};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::modules;
use crate::parser;

type CheckResult<T = TypeRef> = Result<T, Diagnostic>;

/// Checks a whole program, aborting at the first violation.
pub fn check_program(program: &Program, env: &TypeScope, ctx: &Arc<Context>) -> Result<(), Diagnostic> {
    let mut checker = TypeChecker {
        current_ret: None,
        ctx: Arc::clone(ctx),
    };
    for stmt in &program.body {
        checker.check(stmt, env)?;
    }
    Ok(())
}

struct TypeChecker {
    /// Expected return type of the function body being checked.
    current_ret: Option<TypeRef>,
    ctx: Arc<Context>,
}

impl TypeChecker {
    fn check(&mut self, node: &Stmt, env: &TypeScope) -> CheckResult {
        match node {
            Stmt::VarDecl(decl) => self.check_var_decl(decl, env),
            Stmt::FnDecl(decl) => self.check_function(decl, env, false),
            Stmt::ProbeDecl(decl) => self.check_probe(decl, env),
            Stmt::ClassDecl(decl) => self.check_class(decl, env),
            Stmt::If(stmt) => self.check_if(stmt, env),
            Stmt::For(stmt) => self.check_for(stmt, env),
            Stmt::Return(stmt) => self.check_return(stmt, env),
            Stmt::Import(stmt) => self.check_import(stmt, env),
            Stmt::Export(stmt) => self.check_export(&stmt.value, env),
            Stmt::Expr(expr) => self.check_expr(expr, env),
            // Remaining statement kinds carry no type information.
            _ => Ok(Type::any()),
        }
    }

    fn check_expr(&mut self, expr: &Expr, env: &TypeScope) -> CheckResult {
        match expr {
            Expr::Num(_) => Ok(Type::number()),
            Expr::Str(_) => Ok(Type::string()),
            Expr::Bool(_) => Ok(Type::boolean()),
            Expr::Ident(ident) => env.lookup(&ident.name, &ident.token),
            Expr::Assign(assign) => self.check_assign(assign, env),
            Expr::Call(call) => self.check_call(call, env),
            Expr::MapLit(map) => self.check_object(map, env),
            Expr::MemberAccess(member) => self.check_member(member, env),
            Expr::MemberAssign(member) => self.check_member_assign(member, env),
            Expr::BinOp(bin) => self.check_bin(bin, env),
            Expr::New(new_expr) => self.check_new(new_expr, env),
            Expr::ArrayLit(array) => {
                for item in &array.items {
                    self.check_expr(item, env)?;
                }
                Ok(Type::array())
            }
            Expr::Arrow(arrow) => self.check_arrow(arrow, env),
            Expr::Ternary(ternary) => self.check_ternary(ternary, env),
            Expr::TemplateCall(call) => self.check_template_call(call, env),
            Expr::Cast(cast) => self.check_cast(cast, env),
            Expr::UnaryPrefix(unary) => self.check_unary_prefix(unary, env),
            Expr::UnaryPostfix(unary) => self.check_unary_postfix(unary, env),
            Expr::Await(await_expr) => self.check_await(await_expr, env),
            _ => Ok(Type::any()),
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl, env: &TypeScope) -> CheckResult {
        let value_type = match &decl.value {
            Some(value) => Some(self.check_expr(value, env)?),
            None => None,
        };

        let declared = match &decl.ty {
            Some(annotation) => {
                let var_type = self.get_type(Some(annotation), env)?;
                if let Some(assign_type) = &value_type {
                    if !compare(&var_type, assign_type) {
                        return Err(Diagnostic::with_token(
                            ErrorKind::TypeError,
                            format!("Cannot convert {} to {}", assign_type.name, var_type.name),
                            decl.value.as_ref().map_or(&decl.token, |v| v.token()),
                        ));
                    }
                }
                var_type
            }
            None => value_type.unwrap_or_else(Type::any),
        };

        env.declare(&decl.name, declared, &decl.token)?;
        Ok(Type::any())
    }

    fn check_assign(&mut self, assign: &AssignExpr, env: &TypeScope) -> CheckResult {
        let target = self.check_expr(&assign.target, env)?;
        if assign.op != AssignOp::Assign {
            return Ok(target);
        }
        let value = self.check_expr(&assign.value, env)?;
        if !compare(&target, &value) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                format!("Cannot convert {} to {}", value.name, target.name),
                assign.value.token(),
            ));
        }
        Ok(value)
    }

    fn check_bin(&mut self, bin: &BinExpr, env: &TypeScope) -> CheckResult {
        let left = self.check_expr(&bin.left, env)?;
        self.check_expr(&bin.right, env)?;
        if bin.op.is_boolean() {
            return Ok(Type::boolean());
        }
        Ok(left)
    }

    fn check_unary_prefix(&mut self, unary: &UnaryPrefix, env: &TypeScope) -> CheckResult {
        let right = self.check_expr(&unary.operand, env)?;
        if unary.op == PrefixOp::Not {
            return Ok(Type::boolean());
        }
        if !compare(&right, &Type::number()) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                format!("'{}' can only be used on numbers", unary.op),
                unary.operand.token(),
            ));
        }
        Ok(right)
    }

    fn check_unary_postfix(&mut self, unary: &UnaryPostfix, env: &TypeScope) -> CheckResult {
        let ty = self.check_expr(&unary.operand, env)?;
        if !compare(&ty, &Type::number()) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                format!("'{}' can only be used on numbers", unary.op),
                unary.operand.token(),
            ));
        }
        Ok(ty)
    }

    fn check_ternary(&mut self, ternary: &Ternary, env: &TypeScope) -> CheckResult {
        self.check_expr(&ternary.condition, env)?;
        let consequent = self.check_expr(&ternary.consequent, env)?;
        let alternate = self.check_expr(&ternary.alternate, env)?;
        if !compare(&alternate, &consequent) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                format!(
                    "Ternary expression operands are incompatible: {} and {}",
                    consequent.name, alternate.name
                ),
                &ternary.token,
            ));
        }
        Ok(consequent)
    }

    /// Casts between the primitive kinds convert and are always accepted;
    /// any other cast is a compatibility assertion.
    fn check_cast(&mut self, cast: &CastExpr, env: &TypeScope) -> CheckResult {
        let left = self.check_expr(&cast.operand, env)?;
        let target = self.get_type(Some(&cast.target), env)?;

        let primitive = |kind: TypeKind| matches!(kind, TypeKind::Number | TypeKind::String | TypeKind::Bool);
        if primitive(left.kind) && primitive(target.kind) {
            return Ok(target);
        }

        if !compare(&left, &target) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                format!("Bad cast: {} is not compatible with {}", target.name, left.name),
                &cast.token,
            ));
        }
        Ok(target)
    }

    fn check_return(&mut self, stmt: &ReturnStmt, env: &TypeScope) -> CheckResult {
        let Some(expected) = self.current_ret.clone() else {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                "Did not expect return statement",
                &stmt.token,
            ));
        };

        let actual = match &stmt.value {
            Some(value) => self.check_expr(value, env)?,
            None => Type::any(),
        };

        if !compare(&expected, &actual) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                format!("{} does not match expected return type, {}", actual.name, expected.name),
                stmt.value.as_ref().map_or(&stmt.token, |v| v.token()),
            ));
        }
        Ok(Type::any())
    }

    fn check_if(&mut self, stmt: &IfStmt, env: &TypeScope) -> CheckResult {
        self.check_expr(&stmt.condition, env)?;

        let scope = TypeScope::child(env);
        for inner in &stmt.body {
            self.check(inner, &scope)?;
        }

        if let Some(else_body) = &stmt.else_body {
            let else_scope = TypeScope::child(env);
            for inner in else_body {
                self.check(inner, &else_scope)?;
            }
        }
        Ok(Type::any())
    }

    fn check_for(&mut self, stmt: &ForStmt, env: &TypeScope) -> CheckResult {
        let scope = TypeScope::child(env);
        for init in &stmt.inits {
            self.check(init, &scope)?;
        }
        for condition in &stmt.conditions {
            self.check_expr(condition, &scope)?;
        }
        for update in &stmt.updates {
            self.check_expr(update, &scope)?;
        }
        for inner in &stmt.body {
            self.check(inner, &scope)?;
        }
        Ok(Type::any())
    }

    /// Checks a function declaration, producing its signature type.
    ///
    /// Template parameters are declared as fresh `any` types in a child
    /// scope unless the call site already substituted them
    /// (`template_processed`). The declaration scope is kept on the type so
    /// template calls can re-check the body under a clone.
    fn check_function(&mut self, decl: &FnDecl, env: &TypeScope, template_processed: bool) -> CheckResult {
        let decl_env = TypeScope::child(env);
        let scope = TypeScope::child(&decl_env);

        if !template_processed {
            for template_param in &decl.template_params {
                scope.declare(&template_param.name, Type::any(), &template_param.token)?;
            }
        }

        let mut used = HashSet::new();
        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            if !used.insert(param.name.clone()) {
                return Err(Diagnostic::with_token(
                    ErrorKind::RedefinitionError,
                    format!("Duplicate parameter {}", param.name),
                    &param.token,
                ));
            }
            let ty = self.get_type(param.ty.as_ref(), &scope)?;
            let in_scope = if param.ty.is_some() { Rc::clone(&ty) } else { Type::any() };
            scope.declare(&param.name, in_scope, &param.token)?;
            params.push(Parameter {
                ident: param.name.clone(),
                ty,
                has_default: param.value.is_some(),
            });
        }

        let return_type = match &decl.return_type {
            Some(annotation) => self.get_type(Some(annotation), &scope)?,
            None => Type::any(),
        };

        let mut name = format!("function<{}", return_type.name);
        for param in &params {
            name.push_str(", ");
            name.push_str(&param.ty.name);
        }
        name.push('>');

        let ty = Type::with_val(
            TypeKind::Function,
            name,
            TypeVal {
                params,
                template_params: decl.template_params.clone(),
                return_type: Some(Rc::clone(&return_type)),
                is_async: decl.is_async,
                source: Some(Rc::new(decl.clone())),
                decl_env: Some(decl_env),
                ..TypeVal::default()
            },
        );

        env.declare(&decl.name, Rc::clone(&ty), &decl.token)?;

        let saved = self.current_ret.replace(return_type);
        for stmt in &decl.body {
            self.check(stmt, &scope)?;
        }
        self.current_ret = saved;

        Ok(ty)
    }

    fn check_arrow(&mut self, arrow: &ArrowFn, env: &TypeScope) -> CheckResult {
        let scope = TypeScope::child(env);

        let mut params = Vec::with_capacity(arrow.params.len());
        for param in &arrow.params {
            let ty = match &param.ty {
                Some(annotation) => self.get_type(Some(annotation), env)?,
                None => Type::any(),
            };
            scope.declare(&param.name, Rc::clone(&ty), &param.token)?;
            params.push(Parameter {
                ident: param.name.clone(),
                ty,
                has_default: param.value.is_some(),
            });
        }

        let saved = self.current_ret.replace(Type::any());
        for stmt in &arrow.body {
            self.check(stmt, &scope)?;
        }
        self.current_ret = saved;

        Ok(Type::with_val(
            TypeKind::Function,
            "function",
            TypeVal {
                params,
                return_type: Some(Type::any()),
                ..TypeVal::default()
            },
        ))
    }

    /// Template calls: the `function<R, A…>` signature form builds a
    /// function type; a template function clones its declaration scope,
    /// binds the supplied types, and re-checks the source declaration.
    fn check_template_call(&mut self, call: &TemplateCall, env: &TypeScope) -> CheckResult {
        let caller = self.check_expr(&call.callee, env)?;

        let signature_form = caller.kind == TypeKind::Class
            && caller
                .val
                .return_type
                .as_ref()
                .is_some_and(|ret| ret.kind == TypeKind::Function);
        if signature_form {
            if call.template_args.is_empty() {
                return Err(Diagnostic::with_token(
                    ErrorKind::TemplateError,
                    "'function' template call requires one argument",
                    &call.token,
                ));
            }

            let return_type = self.get_type(Some(&call.template_args[0]), env)?;
            let mut params = Vec::new();
            let mut param_names = String::new();
            for arg in &call.template_args[1..] {
                let ty = self.get_type(Some(arg), env)?;
                param_names.push_str(", ");
                param_names.push_str(&ty.name);
                params.push(Parameter {
                    ident: "_arg".to_string(),
                    ty,
                    has_default: false,
                });
            }

            let name = format!("function<{}{param_names}>", return_type.name);
            return Ok(Type::with_val(
                TypeKind::Function,
                name,
                TypeVal {
                    params,
                    return_type: Some(return_type),
                    ..TypeVal::default()
                },
            ));
        }

        if let (Some(source), Some(decl_env)) = (&caller.val.source, &caller.val.decl_env) {
            let scope = TypeScope::child(decl_env);

            if call.template_args.len() != caller.val.template_params.len() {
                return Err(Diagnostic::with_token(
                    ErrorKind::TemplateError,
                    format!(
                        "Template expects {} template arguments, but {} were provided",
                        caller.val.template_params.len(),
                        call.template_args.len()
                    ),
                    &call.token,
                ));
            }

            for (template_param, arg) in caller.val.template_params.iter().zip(&call.template_args) {
                let ty = self.get_type(Some(arg), env)?;
                scope.declare(&template_param.name, ty, &template_param.token)?;
            }

            let source = Rc::clone(source);
            return self.check_function(&source, &scope, true);
        }

        Ok(caller)
    }

    fn check_call(&mut self, call: &crate::ast::CallExpr, env: &TypeScope) -> CheckResult {
        let scope = TypeScope::child(env);
        let callee = self.check_expr(&call.callee, &scope)?;

        if callee.kind == TypeKind::Any {
            return Ok(Type::any());
        }

        if callee.kind == TypeKind::Function {
            self.check_call_args(&callee.val.params, &call.args, &scope, &call.token, "Function")?;

            let return_type = callee.val.return_type.clone().unwrap_or_else(Type::any);
            if callee.val.is_async {
                return Ok(Type::future(return_type));
            }
            return Ok(return_type);
        }

        if callee.kind == TypeKind::Probe {
            let run = callee.val.props.borrow().get("run").cloned();
            let Some(run) = run else {
                return Err(Diagnostic::with_token(
                    ErrorKind::TypeError,
                    "Probe has no 'run' method or it is not of type function",
                    call.callee.token(),
                ));
            };
            if run.kind != TypeKind::Function {
                return Err(Diagnostic::with_token(
                    ErrorKind::TypeError,
                    "Probe has no 'run' method or it is not of type function",
                    call.callee.token(),
                ));
            }

            self.check_call_args(&run.val.params, &call.args, &scope, &call.token, "Probe")?;
            return Ok(Type::any());
        }

        Err(Diagnostic::with_token(
            ErrorKind::TypeError,
            format!("Only function and probes can be called, but got {}", callee.name),
            call.callee.token(),
        ))
    }

    /// Arity and argument compatibility for a call: missing-without-default
    /// is an error, and checks are skipped when either side is `any`.
    fn check_call_args(
        &mut self,
        params: &[Parameter],
        args: &[Expr],
        scope: &TypeScope,
        token: &crate::lexer::Token,
        what: &str,
    ) -> CheckResult<()> {
        for (i, param) in params.iter().enumerate() {
            if i >= args.len() && !param.has_default {
                return Err(Diagnostic::with_token(
                    ErrorKind::TypeError,
                    format!(
                        "{what} expects {} arguments, but {} were provided",
                        params.len(),
                        args.len()
                    ),
                    token,
                ));
            }
        }

        for (i, arg) in args.iter().enumerate() {
            let ty = self.check_expr(arg, scope)?;
            let Some(param) = params.get(i) else {
                continue;
            };
            if ty.kind == TypeKind::Any || param.ty.kind == TypeKind::Any {
                continue;
            }
            if !compare(&param.ty, &ty) {
                return Err(Diagnostic::with_token(
                    ErrorKind::TypeError,
                    format!("{what} parameter {} expects {}, but got {}", i + 1, param.ty.name, ty.name),
                    arg.token(),
                ));
            }
        }
        Ok(())
    }

    fn check_object(&mut self, map: &MapLit, env: &TypeScope) -> CheckResult {
        let mut props = IndexMap::new();
        for property in &map.properties {
            let ty = match &property.value {
                Some(value) => self.check_expr(value, env)?,
                None => Type::any(),
            };
            props.insert(property.key.clone(), ty);
        }
        Ok(Type::with_val(TypeKind::Object, "map", TypeVal::with_props(props)))
    }

    /// Member access on a known property yields its type; a missing
    /// property is an error on modules and `any` on everything else.
    fn check_member(&mut self, member: &MemberAccess, env: &TypeScope) -> CheckResult {
        let object = self.check_expr(&member.object, env)?;

        if let Expr::Ident(ident) = &member.property {
            if let Some(prop) = object.val.props.borrow().get(&ident.name) {
                return Ok(Rc::clone(prop));
            }
            if object.kind == TypeKind::Module {
                return Err(Diagnostic::with_token(
                    ErrorKind::TypeError,
                    format!("Object does not have property {}", ident.name),
                    &ident.token,
                ));
            }
        }

        if object.kind == TypeKind::Module {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                "Object does not have that property",
                member.property.token(),
            ));
        }

        Ok(Type::any())
    }

    fn check_member_assign(&mut self, member: &MemberAssign, env: &TypeScope) -> CheckResult {
        let object = self.check_expr(&member.object, env)?;
        let value = self.check_expr(&member.value, env)?;

        if !member.computed {
            if let Expr::Ident(ident) = &member.property {
                let expected = object.val.props.borrow().get(&ident.name).cloned();
                if let Some(expected) = expected {
                    if !compare(&value, &expected) {
                        return Err(Diagnostic::with_token(
                            ErrorKind::TypeError,
                            format!("{} is not compatible with type {}", value.name, expected.name),
                            &member.token,
                        ));
                    }
                } else if object.kind == TypeKind::Module {
                    return Err(Diagnostic::with_token(
                        ErrorKind::TypeError,
                        format!("{} does not have property {}", object.name, ident.name),
                        &member.token,
                    ));
                }
                return Ok(value);
            }
        }

        Ok(Type::any())
    }

    fn check_probe(&mut self, decl: &ProbeDecl, env: &TypeScope) -> CheckResult {
        let inherited = TypeScope::child(env);

        if let Some(extends) = &decl.extends {
            let parent = self.check_expr(extends, env)?;
            Self::declare_probe_inheritance(&parent, &inherited);
        }

        // Body members live one scope below the inherited ones, so a derived
        // probe's `run` (or any other member) shadows the base's.
        let scope = TypeScope::child(&inherited);
        let mut props = IndexMap::new();

        for stmt in &decl.body {
            match stmt {
                Stmt::VarDecl(field) => {
                    props.insert(field.name.clone(), self.check_var_decl(field, &scope)?);
                }
                Stmt::FnDecl(method) => {
                    props.insert(method.name.clone(), self.check_function(method, &scope, false)?);
                }
                other => {
                    self.check(other, &scope)?;
                }
            }
        }

        env.declare(
            &decl.name,
            Type::with_val(TypeKind::Probe, "probe", TypeVal::with_props(props)),
            &decl.token,
        )
    }

    fn declare_probe_inheritance(probe: &TypeRef, env: &TypeScope) {
        if let Some(parent) = &probe.parent {
            Self::declare_probe_inheritance(parent, env);
        }
        env.mass_declare(&probe.val.props.borrow());
    }

    fn check_class(&mut self, decl: &ClassDecl, env: &TypeScope) -> CheckResult {
        let scope = TypeScope::child(env);

        let this_obj = Type::with_val(TypeKind::Object, decl.name.clone(), TypeVal::default());
        scope.declare("this", Rc::clone(&this_obj), &decl.token)?;

        let parent = match &decl.extends {
            Some(extends) => {
                scope.declare("super", Type::any(), extends.token())?;
                Some(self.check_expr(extends, env)?)
            }
            None => None,
        };

        let class_ty = Rc::new(Type {
            kind: TypeKind::Class,
            name: "class".to_string(),
            type_name: decl.name.clone(),
            is_instance: false,
            template_sub: false,
            parent,
            val: Rc::new(TypeVal::default()),
        });

        Self::inherit_class_props(&class_ty, &this_obj);

        env.declare(&decl.name, Rc::clone(&class_ty), &decl.token)?;

        for stmt in &decl.body {
            match stmt {
                Stmt::VarDecl(field) => {
                    let field_ty = match &field.ty {
                        Some(annotation) => {
                            let ty = self.get_type(Some(annotation), &scope)?;
                            if let Some(value) = &field.value {
                                let value_ty = self.check_expr(value, &scope)?;
                                if !compare(&value_ty, &ty) {
                                    return Err(Diagnostic::with_token(
                                        ErrorKind::TypeError,
                                        format!("{} is not compatible with type {}", value_ty.name, ty.name),
                                        &field.token,
                                    ));
                                }
                            }
                            ty
                        }
                        None => Type::any(),
                    };
                    this_obj.val.props.borrow_mut().insert(field.name.clone(), field_ty);
                }
                Stmt::FnDecl(method) => {
                    let method_ty = self.check_function(method, &scope, false)?;
                    this_obj.val.props.borrow_mut().insert(method.name.clone(), method_ty);
                }
                other => {
                    self.check(other, &scope)?;
                }
            }
        }

        let final_props = this_obj.val.props.borrow().clone();
        *class_ty.val.props.borrow_mut() = final_props;

        Ok(class_ty)
    }

    /// Copies ancestor properties into the class body's `this`, root-first,
    /// so derived entries overwrite base ones on name collision.
    fn inherit_class_props(class: &TypeRef, this_obj: &TypeRef) {
        if let Some(parent) = &class.parent {
            Self::inherit_class_props(parent, this_obj);
            let parent_props = parent.val.props.borrow().clone();
            this_obj.val.props.borrow_mut().extend(parent_props);
        }
    }

    /// `new` on a class checks the constructor signature (when a `new`
    /// method exists anywhere in the chain) and produces an instance type.
    fn check_new(&mut self, expr: &NewExpr, env: &TypeScope) -> CheckResult {
        let class = self.check_expr(&expr.ctor, env)?;

        if class.kind == TypeKind::Any {
            return Ok(class);
        }
        if class.kind != TypeKind::Class {
            // Native-style constructions like `new num()` pass through.
            return Ok(class);
        }

        let constructor = class.val.props.borrow().get("new").cloned();
        if let Some(constructor) = constructor {
            if constructor.kind == TypeKind::Function {
                let params = &constructor.val.params;
                for (i, param) in params.iter().enumerate() {
                    if i >= expr.args.len() && !param.has_default {
                        return Err(Diagnostic::with_token(
                            ErrorKind::ConstructorError,
                            format!(
                                "Constructor expects {} arguments, but only {} were provided",
                                params.len(),
                                expr.args.len()
                            ),
                            expr.ctor.token(),
                        ));
                    }
                }
                for (i, param) in params.iter().enumerate() {
                    let Some(arg) = expr.args.get(i) else {
                        break;
                    };
                    let arg_ty = self.check_expr(arg, env)?;
                    if !compare(&arg_ty, &param.ty) {
                        return Err(Diagnostic::with_token(
                            ErrorKind::ConstructorError,
                            format!(
                                "Constructor expects '{}' to be of type {} but it is of type {}",
                                param.ident, param.ty.name, arg_ty.name
                            ),
                            arg.token(),
                        ));
                    }
                }
            }
        }

        if let Some(return_type) = &class.val.return_type {
            return Ok(Rc::clone(return_type));
        }
        Ok(Type::instance_of(&class))
    }

    fn check_await(&mut self, expr: &crate::ast::AwaitExpr, env: &TypeScope) -> CheckResult {
        let ty = self.check_expr(&expr.operand, env)?;
        if !compare(&ty, &Type::simple(TypeKind::Future, "future")) {
            return Err(Diagnostic::with_token(
                ErrorKind::TypeError,
                "Cannot await a value that is not a future",
                expr.operand.token(),
            ));
        }
        Ok(ty.val.future_val.clone().unwrap_or_else(Type::any))
    }

    fn check_export(&mut self, stmt: &Stmt, env: &TypeScope) -> CheckResult {
        if let Stmt::Expr(Expr::Assign(assign)) = stmt {
            let Expr::Ident(ident) = &assign.target else {
                return Err(Diagnostic::with_token(
                    ErrorKind::TypeError,
                    "Assignment exporting can only be used on identifiers",
                    &assign.token,
                ));
            };
            let value = self.check_expr(&assign.value, env)?;
            env.declare(&ident.name, value, &ident.token)?;
            return Ok(Type::any());
        }
        self.check(stmt, env)
    }

    fn check_import(&mut self, stmt: &ImportStmt, env: &TypeScope) -> CheckResult {
        if let Some((_, lib_ty)) = modules::stdlib_module(&stmt.name) {
            return self.bind_import(stmt, env, lib_ty);
        }

        let Some(path) = self.ctx.modules.get(&stmt.name).cloned() else {
            return Err(Diagnostic::with_token(
                ErrorKind::ImportError,
                format!("Module {} not found", stmt.name),
                &stmt.token,
            ));
        };

        let source = fs::read_to_string(&path).map_err(|_| {
            Diagnostic::with_token(
                ErrorKind::ImportError,
                format!("Module {} not found", stmt.name),
                &stmt.token,
            )
        })?;

        let mut module_ctx = Context::new(RunMode::Exports, "Main");
        module_ctx.filename = path.display().to_string();
        module_ctx.source.clone_from(&source);
        module_ctx.modules = self.ctx.modules.clone();
        let module_ctx = Arc::new(module_ctx);

        let program = parser::parse(&source, &module_ctx)?;

        let saved = std::mem::replace(&mut self.ctx, module_ctx);
        let exports = self.get_exports(&program);
        self.ctx = saved;
        let exports = exports?;

        let module_ty = Type::with_val(TypeKind::Module, "module", TypeVal::with_props(exports));
        self.bind_import(stmt, env, module_ty)
    }

    fn bind_import(&mut self, stmt: &ImportStmt, env: &TypeScope, module_ty: TypeRef) -> CheckResult {
        if let Some(member) = &stmt.member {
            let scratch = TypeScope::root();
            scratch.declare(&stmt.name, module_ty, member.token())?;
            let bound = self.check_expr(member, &scratch)?;

            let last_prop = match member {
                Expr::MemberAccess(access) => access.last_prop.clone(),
                _ => None,
            };
            let name = stmt
                .alias
                .clone()
                .or(last_prop)
                .unwrap_or_else(|| stmt.name.clone());
            return env.declare(&name, bound, member.token());
        }

        let name = stmt.alias.clone().unwrap_or_else(|| stmt.name.clone());
        env.declare(&name, module_ty, &stmt.token)
    }

    /// Computes a module's export types by revisiting each `export`
    /// statement under a fresh root scope.
    fn get_exports(&mut self, program: &Program) -> Result<IndexMap<String, TypeRef>, Diagnostic> {
        let env = TypeScope::root();
        let mut exports = IndexMap::new();

        for stmt in &program.body {
            let Stmt::Export(export) = stmt else {
                self.check(stmt, &env)?;
                continue;
            };

            match &*export.value {
                Stmt::Expr(Expr::Ident(ident)) => {
                    exports.insert(ident.name.clone(), env.lookup(&ident.name, &ident.token)?);
                }
                Stmt::Expr(Expr::Assign(assign)) => {
                    let Expr::Ident(ident) = &assign.target else {
                        return Err(Diagnostic::with_token(
                            ErrorKind::TypeError,
                            "Only identifiers can be exported in assignment exporting",
                            assign.target.token(),
                        ));
                    };
                    exports.insert(ident.name.clone(), self.check_expr(&assign.value, &env)?);
                }
                Stmt::FnDecl(decl) => {
                    exports.insert(decl.name.clone(), self.check(&export.value, &env)?);
                }
                Stmt::ProbeDecl(decl) => {
                    exports.insert(decl.name.clone(), self.check(&export.value, &env)?);
                }
                Stmt::ClassDecl(decl) => {
                    exports.insert(decl.name.clone(), self.check(&export.value, &env)?);
                }
                other => {
                    return Err(Diagnostic::with_token(
                        ErrorKind::TypeError,
                        "Unknown export type",
                        other.token(),
                    ));
                }
            }
        }

        Ok(exports)
    }

    /// Resolves a type annotation expression to a type descriptor.
    ///
    /// The primitive names map directly; map literals build structural
    /// object types; everything else is checked as an expression, with
    /// class types converted to instance types.
    fn get_type(&mut self, annotation: Option<&Expr>, env: &TypeScope) -> CheckResult {
        let Some(annotation) = annotation else {
            return Ok(Type::any());
        };

        if let Expr::Ident(ident) = annotation {
            match ident.name.as_str() {
                "str" => return Ok(Type::string()),
                "num" => return Ok(Type::number()),
                "bool" => return Ok(Type::boolean()),
                "map" => return Ok(Type::simple(TypeKind::Object, "map")),
                "function" => return Ok(Type::simple(TypeKind::Function, "function")),
                "array" => return Ok(Type::array()),
                "any" => return Ok(Type::any()),
                _ => {}
            }
        }

        if let Expr::MapLit(map) = annotation {
            let mut props = IndexMap::new();
            for property in &map.properties {
                props.insert(property.key.clone(), self.get_type(property.value.as_ref(), env)?);
            }
            return Ok(Rc::new(Type {
                kind: TypeKind::Module,
                name: "object".to_string(),
                type_name: String::new(),
                is_instance: true,
                template_sub: false,
                parent: None,
                val: Rc::new(TypeVal::with_props(props)),
            }));
        }

        let ty = self.check_expr(annotation, env)?;
        if ty.kind == TypeKind::Class {
            return Ok(Type::instance_of(&ty));
        }
        Ok(ty)
    }
}
