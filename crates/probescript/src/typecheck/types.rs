use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{FnDecl, VarDecl};
use crate::typecheck::env::TypeScope;

/// Shared handle to a type descriptor.
///
/// Instance compatibility compares property maps by handle identity, so
/// types built from the same declaration share their descriptors.
pub type TypeRef = Rc<Type>;

/// The kind tag of a type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Number,
    String,
    Bool,
    Any,
    Array,
    Object,
    Function,
    Class,
    Probe,
    /// Handled like an object, except that accessing a member it does not
    /// have is an error instead of `any`.
    Module,
    Future,
    Undef,
    Custom,
}

/// A function parameter as seen by the checker.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub ident: String,
    pub ty: TypeRef,
    pub has_default: bool,
}

/// Payload carried by a type: parameters and return type for functions,
/// properties for objects/classes/probes/modules, the source declaration and
/// scope for templates, and the awaited type for futures.
#[derive(Default)]
pub struct TypeVal {
    pub params: Vec<Parameter>,
    pub template_params: Vec<VarDecl>,
    /// Property map; mutable because class declarations fill it in after
    /// the class type has been bound (so methods can reference the class).
    pub props: RefCell<IndexMap<String, TypeRef>>,
    pub return_type: Option<TypeRef>,
    pub is_async: bool,
    /// Source declaration, kept for re-checking on template instantiation.
    pub source: Option<Rc<FnDecl>>,
    /// The type scope at declaration, cloned per template instantiation.
    pub decl_env: Option<TypeScope>,
    /// What a future resolves to.
    pub future_val: Option<TypeRef>,
}

impl TypeVal {
    #[must_use]
    pub fn with_props(props: IndexMap<String, TypeRef>) -> Self {
        Self {
            props: RefCell::new(props),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_return(return_type: TypeRef) -> Self {
        Self {
            return_type: Some(return_type),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_params(params: Vec<Parameter>) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }
}

/// A type descriptor: kind, display name, payload, instance/template flags,
/// and the parent link used by class inheritance.
pub struct Type {
    pub kind: TypeKind,
    pub name: String,
    /// The declared class name, carried onto instances.
    pub type_name: String,
    pub is_instance: bool,
    pub template_sub: bool,
    pub parent: Option<TypeRef>,
    pub val: Rc<TypeVal>,
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Type")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("is_instance", &self.is_instance)
            .field("template_sub", &self.template_sub)
            .finish_non_exhaustive()
    }
}

impl Type {
    #[must_use]
    pub fn simple(kind: TypeKind, name: impl Into<String>) -> TypeRef {
        Rc::new(Self {
            kind,
            name: name.into(),
            type_name: String::new(),
            is_instance: false,
            template_sub: false,
            parent: None,
            val: Rc::new(TypeVal::default()),
        })
    }

    #[must_use]
    pub fn with_val(kind: TypeKind, name: impl Into<String>, val: TypeVal) -> TypeRef {
        Rc::new(Self {
            kind,
            name: name.into(),
            type_name: String::new(),
            is_instance: false,
            template_sub: false,
            parent: None,
            val: Rc::new(val),
        })
    }

    #[must_use]
    pub fn any() -> TypeRef {
        Self::simple(TypeKind::Any, "any")
    }

    #[must_use]
    pub fn number() -> TypeRef {
        Self::simple(TypeKind::Number, "number")
    }

    #[must_use]
    pub fn string() -> TypeRef {
        Self::simple(TypeKind::String, "string")
    }

    #[must_use]
    pub fn boolean() -> TypeRef {
        Self::simple(TypeKind::Bool, "bool")
    }

    #[must_use]
    pub fn array() -> TypeRef {
        Self::simple(TypeKind::Array, "array")
    }

    /// An instance copy of a class type: same payload (shared handle), kind
    /// `Module`, named after the class, carrying the parent link.
    #[must_use]
    pub fn instance_of(class: &TypeRef) -> TypeRef {
        Rc::new(Self {
            kind: TypeKind::Module,
            name: class.type_name.clone(),
            type_name: class.type_name.clone(),
            is_instance: true,
            template_sub: class.template_sub,
            parent: class.parent.clone(),
            val: Rc::clone(&class.val),
        })
    }

    /// A `future<T>` type resolving to `resolved`.
    #[must_use]
    pub fn future(resolved: TypeRef) -> TypeRef {
        let name = format!("future<{}>", resolved.name);
        Rc::new(Self {
            kind: TypeKind::Future,
            name,
            type_name: String::new(),
            is_instance: false,
            template_sub: false,
            parent: None,
            val: Rc::new(TypeVal {
                future_val: Some(resolved),
                ..TypeVal::default()
            }),
        })
    }
}

/// Property maps compare by handle identity: same keys, same descriptors.
fn props_identical(left: &Type, right: &Type) -> bool {
    let left_props = left.val.props.borrow();
    let right_props = right.val.props.borrow();
    left_props.len() == right_props.len()
        && left_props
            .iter()
            .all(|(key, ty)| right_props.get(key).is_some_and(|other| Rc::ptr_eq(ty, other)))
}

/// Structural compatibility.
///
/// `Any` is compatible with everything. Instance types compare by property
/// map, walking the parent chain on mismatch. Function types are compatible
/// when their arities match, their return types are compatible, and each
/// parameter pair is compatible. Otherwise, the kinds must match.
#[must_use]
pub fn compare(left: &TypeRef, right: &TypeRef) -> bool {
    if left.kind == TypeKind::Any || right.kind == TypeKind::Any {
        return true;
    }

    if right.is_instance {
        if props_identical(right, left) {
            return true;
        }
        let mut current = right.parent.clone();
        while let Some(ancestor) = current {
            if props_identical(&ancestor, left) {
                return true;
            }
            current = ancestor.parent.clone();
        }
        return false;
    }

    if left.is_instance {
        if props_identical(left, right) {
            return true;
        }
        let mut current = left.parent.clone();
        while let Some(ancestor) = current {
            if props_identical(&ancestor, right) {
                return true;
            }
            current = ancestor.parent.clone();
        }
        return false;
    }

    if left.kind == TypeKind::Function
        && right.kind == TypeKind::Function
        && left.val.return_type.is_some()
        && right.val.return_type.is_some()
    {
        if left.val.params.len() != right.val.params.len() {
            return false;
        }
        if let (Some(left_ret), Some(right_ret)) = (&left.val.return_type, &right.val.return_type) {
            if !compare(left_ret, right_ret) {
                return false;
            }
        }
        return left
            .val
            .params
            .iter()
            .zip(right.val.params.iter())
            .all(|(l, r)| compare(&r.ty, &l.ty));
    }

    left.kind == right.kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_bidirectionally_compatible() {
        assert!(compare(&Type::any(), &Type::number()));
        assert!(compare(&Type::string(), &Type::any()));
    }

    #[test]
    fn kinds_must_match() {
        assert!(compare(&Type::number(), &Type::number()));
        assert!(!compare(&Type::number(), &Type::string()));
        assert!(!compare(&Type::boolean(), &Type::array()));
    }

    #[test]
    fn function_compatibility() {
        let make = |ret: TypeRef, params: Vec<TypeRef>| {
            Type::with_val(
                TypeKind::Function,
                "function",
                TypeVal {
                    params: params
                        .into_iter()
                        .map(|ty| Parameter {
                            ident: "_arg".to_string(),
                            ty,
                            has_default: false,
                        })
                        .collect(),
                    return_type: Some(ret),
                    ..TypeVal::default()
                },
            )
        };

        let a = make(Type::number(), vec![Type::string()]);
        let b = make(Type::number(), vec![Type::string()]);
        let c = make(Type::number(), vec![Type::number()]);
        let d = make(Type::number(), vec![Type::string(), Type::string()]);

        assert!(compare(&a, &b));
        assert!(!compare(&a, &c));
        assert!(!compare(&a, &d));
    }

    #[test]
    fn instance_compatibility_follows_parent_chain() {
        let base_props: IndexMap<String, TypeRef> = [("hi".to_string(), Type::any())].into_iter().collect();
        let base = Rc::new(Type {
            kind: TypeKind::Class,
            name: "class".to_string(),
            type_name: "A".to_string(),
            is_instance: false,
            template_sub: false,
            parent: None,
            val: Rc::new(TypeVal::with_props(base_props.clone())),
        });

        let derived = Rc::new(Type {
            kind: TypeKind::Class,
            name: "class".to_string(),
            type_name: "B".to_string(),
            is_instance: false,
            template_sub: false,
            parent: Some(Rc::clone(&base)),
            val: Rc::new(TypeVal::with_props(base_props)),
        });

        let base_instance = Type::instance_of(&base);
        let derived_instance = Type::instance_of(&derived);

        // Shared property handles make the derived instance compatible with
        // the base instance.
        assert!(compare(&base_instance, &derived_instance));
    }
}
