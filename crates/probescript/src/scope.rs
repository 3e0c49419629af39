use std::sync::{Arc, Mutex, Once};

use ahash::AHashMap;

use crate::context::Context;
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::lexer::Token;
use crate::value::Value;

/// A lexically nested name-to-value table.
///
/// Scopes form a shared chain: child scopes hold their parent alive, and
/// function values hold their declaration scope alive for as long as the
/// closure exists. Root scopes are seeded with the globals table lazily on
/// first access.
///
/// Shadowing is forbidden within a single scope (a duplicate `declare`
/// fails); inner scopes may shadow outer ones.
#[derive(Clone)]
pub struct Scope(Arc<ScopeData>);

struct RootState {
    ctx: Arc<Context>,
    init: Once,
}

struct ScopeData {
    parent: Option<Scope>,
    variables: Mutex<AHashMap<String, Value>>,
    /// Present on root scopes only; drives lazy globals injection.
    root: Option<RootState>,
}

impl Scope {
    /// Creates a root scope for the given context. The globals table is
    /// injected on first use.
    #[must_use]
    pub fn root(ctx: &Arc<Context>) -> Self {
        Self(Arc::new(ScopeData {
            parent: None,
            variables: Mutex::new(AHashMap::new()),
            root: Some(RootState {
                ctx: Arc::clone(ctx),
                init: Once::new(),
            }),
        }))
    }

    /// Creates a child scope.
    #[must_use]
    pub fn child(parent: &Self) -> Self {
        Self(Arc::new(ScopeData {
            parent: Some(parent.clone()),
            variables: Mutex::new(AHashMap::new()),
            root: None,
        }))
    }

    fn ensure_ready(&self) {
        if let Some(root) = &self.0.root {
            root.init.call_once(|| {
                let mut vars = self.0.variables.lock().expect("scope lock poisoned");
                for (name, value) in crate::modules::globals(&root.ctx) {
                    vars.insert(name, value);
                }
            });
        }
    }

    /// The context reachable from this scope's root.
    #[must_use]
    pub fn context(&self) -> Option<Arc<Context>> {
        let mut current = self.clone();
        loop {
            if let Some(root) = &current.0.root {
                return Some(Arc::clone(&root.ctx));
            }
            let parent = current.0.parent.clone()?;
            current = parent;
        }
    }

    /// Declares `name` in this scope, failing if it is already present here.
    pub fn declare(&self, name: &str, value: Value, token: &Token) -> Result<Value, Diagnostic> {
        self.ensure_ready();
        let mut vars = self.0.variables.lock().expect("scope lock poisoned");
        if vars.contains_key(name) {
            return Err(Diagnostic::with_token(
                ErrorKind::ReferenceError,
                format!("Variable {name} is already defined"),
                token,
            ));
        }
        vars.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Declares or overwrites `name` in this scope without the duplicate
    /// check. Used by probe bodies and inheritance, which install members
    /// over inherited ones.
    pub fn force_declare(&self, name: &str, value: Value) {
        self.ensure_ready();
        self.0
            .variables
            .lock()
            .expect("scope lock poisoned")
            .insert(name.to_string(), value);
    }

    /// Assigns to the nearest enclosing declaration of `name`.
    pub fn assign(&self, name: &str, value: Value, token: &Token) -> Result<Value, Diagnostic> {
        let mut current = self.clone();
        loop {
            current.ensure_ready();
            {
                let mut vars = current.0.variables.lock().expect("scope lock poisoned");
                if vars.contains_key(name) {
                    vars.insert(name.to_string(), value.clone());
                    return Ok(value);
                }
            }
            match current.0.parent.clone() {
                Some(parent) => current = parent,
                None => {
                    return Err(Diagnostic::with_token(
                        ErrorKind::ReferenceError,
                        format!("Cannot resolve variable {name} as it does not exist"),
                        token,
                    ));
                }
            }
        }
    }

    /// Looks up `name`, walking parent scopes.
    pub fn lookup(&self, name: &str, token: &Token) -> Result<Value, Diagnostic> {
        self.lookup_opt(name).ok_or_else(|| {
            Diagnostic::with_token(
                ErrorKind::ReferenceError,
                format!("Cannot resolve variable {name} as it does not exist"),
                token,
            )
        })
    }

    /// Looks up `name`, returning `None` when it is not declared anywhere in
    /// the chain.
    #[must_use]
    pub fn lookup_opt(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            current.ensure_ready();
            {
                let vars = current.0.variables.lock().expect("scope lock poisoned");
                if let Some(value) = vars.get(name) {
                    return Some(value.clone());
                }
            }
            match current.0.parent.clone() {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn root() -> Scope {
        Scope::root(&Arc::new(Context::default()))
    }

    #[test]
    fn declare_then_lookup() {
        let scope = root();
        scope
            .declare("x", Value::Number(1.0), &Token::synthetic())
            .unwrap();
        let value = scope.lookup("x", &Token::synthetic()).unwrap();
        assert!((value.to_num() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_declare_fails() {
        let scope = root();
        scope
            .declare("x", Value::Number(1.0), &Token::synthetic())
            .unwrap();
        let err = scope
            .declare("x", Value::Number(2.0), &Token::synthetic())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let outer = root();
        outer
            .declare("x", Value::Number(1.0), &Token::synthetic())
            .unwrap();
        let inner = Scope::child(&outer);
        inner
            .declare("x", Value::Number(2.0), &Token::synthetic())
            .unwrap();
        assert!((inner.lookup("x", &Token::synthetic()).unwrap().to_num() - 2.0).abs() < f64::EPSILON);
        assert!((outer.lookup("x", &Token::synthetic()).unwrap().to_num() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn assign_walks_parents() {
        let outer = root();
        outer
            .declare("x", Value::Number(1.0), &Token::synthetic())
            .unwrap();
        let inner = Scope::child(&outer);
        inner
            .assign("x", Value::Number(5.0), &Token::synthetic())
            .unwrap();
        assert!((outer.lookup("x", &Token::synthetic()).unwrap().to_num() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn assign_to_undeclared_fails_at_root() {
        let scope = root();
        let err = scope
            .assign("missing", Value::Undef, &Token::synthetic())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceError);
    }

    #[test]
    fn root_scope_has_globals() {
        let scope = root();
        assert!(scope.lookup_opt("console").is_some());
        assert!(scope.lookup_opt("num").is_some());
        assert!(scope.lookup_opt("exit").is_some());
    }

    #[test]
    fn globals_live_at_root_not_in_children() {
        let outer = root();
        let inner = Scope::child(&outer);
        // Visible through the chain, but a child may shadow them.
        assert!(inner.lookup_opt("console").is_some());
        inner
            .declare("console", Value::Number(3.0), &Token::synthetic())
            .unwrap();
        assert!(matches!(inner.lookup_opt("console"), Some(Value::Number(_))));
    }
}
