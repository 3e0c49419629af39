use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::lexer::Token;
use crate::typecheck::types::TypeRef;

/// A lexically nested name-to-type table with the same shadowing rules as
/// runtime scopes: duplicates within one scope fail, inner scopes shadow
/// outer ones. Root scopes are seeded with the global type table.
#[derive(Clone)]
pub struct TypeScope(Rc<TypeScopeData>);

struct TypeScopeData {
    parent: Option<TypeScope>,
    variables: RefCell<AHashMap<String, TypeRef>>,
}

impl TypeScope {
    #[must_use]
    pub fn root() -> Self {
        let scope = Self(Rc::new(TypeScopeData {
            parent: None,
            variables: RefCell::new(AHashMap::new()),
        }));
        for (name, ty) in crate::modules::type_globals() {
            scope.0.variables.borrow_mut().insert(name, ty);
        }
        scope
    }

    #[must_use]
    pub fn child(parent: &Self) -> Self {
        Self(Rc::new(TypeScopeData {
            parent: Some(parent.clone()),
            variables: RefCell::new(AHashMap::new()),
        }))
    }

    /// Declares `name`, failing when it is already present in this scope.
    pub fn declare(&self, name: &str, ty: TypeRef, token: &Token) -> Result<TypeRef, Diagnostic> {
        let mut vars = self.0.variables.borrow_mut();
        if vars.contains_key(name) {
            return Err(Diagnostic::with_token(
                ErrorKind::RedefinitionError,
                format!("Variable {name} is already defined"),
                token,
            ));
        }
        vars.insert(name.to_string(), Rc::clone(&ty));
        Ok(ty)
    }

    /// Looks `name` up, walking parent scopes.
    pub fn lookup(&self, name: &str, token: &Token) -> Result<TypeRef, Diagnostic> {
        let mut current = self.clone();
        loop {
            if let Some(ty) = current.0.variables.borrow().get(name) {
                return Ok(Rc::clone(ty));
            }
            match current.0.parent.clone() {
                Some(parent) => current = parent,
                None => {
                    return Err(Diagnostic::with_token(
                        ErrorKind::ReferenceError,
                        format!("Variable {name} is not defined"),
                        token,
                    ));
                }
            }
        }
    }

    /// Installs a batch of bindings without duplicate checks; used by probe
    /// inheritance to pull superprobe members into scope.
    pub fn mass_declare(&self, vars: &IndexMap<String, TypeRef>) {
        let mut table = self.0.variables.borrow_mut();
        for (name, ty) in vars {
            table.insert(name.clone(), Rc::clone(ty));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecheck::types::{Type, TypeKind};

    #[test]
    fn duplicate_declaration_fails() {
        let scope = TypeScope::root();
        scope.declare("x", Type::number(), &Token::synthetic()).unwrap();
        let err = scope.declare("x", Type::string(), &Token::synthetic()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RedefinitionError);
    }

    #[test]
    fn child_shadows_parent() {
        let root = TypeScope::root();
        root.declare("x", Type::number(), &Token::synthetic()).unwrap();
        let child = TypeScope::child(&root);
        child.declare("x", Type::string(), &Token::synthetic()).unwrap();
        assert_eq!(child.lookup("x", &Token::synthetic()).unwrap().kind, TypeKind::String);
        assert_eq!(root.lookup("x", &Token::synthetic()).unwrap().kind, TypeKind::Number);
    }

    #[test]
    fn root_scope_sees_type_globals() {
        let scope = TypeScope::root();
        assert!(scope.lookup("console", &Token::synthetic()).is_ok());
        assert!(scope.lookup("num", &Token::synthetic()).is_ok());
    }

    #[test]
    fn missing_lookup_is_reference_error() {
        let scope = TypeScope::root();
        let err = scope.lookup("nope", &Token::synthetic()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceError);
    }
}
