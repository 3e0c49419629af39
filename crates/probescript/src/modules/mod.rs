//! The standard-library surface: a mapping from module name to a pair of
//! (runtime value, type descriptor), plus the globals table injected into
//! root scopes.

mod date;
mod fs;
mod globals;
mod json;
mod prbtest;
mod random;

pub use globals::{globals, type_globals};
pub use json::{json_to_value, value_to_json};
pub use prbtest::{run_tests, TestFailure};

use indexmap::IndexMap;

use crate::typecheck::{Type, TypeKind, TypeRef, TypeVal};
use crate::value::Value;

/// Looks up a standard-library module by name, producing its runtime value
/// and its type descriptor.
#[must_use]
pub fn stdlib_module(name: &str) -> Option<(Value, TypeRef)> {
    Some(match name {
        "fs" => fs::module(),
        "json" => json::module(),
        "random" => random::module(),
        "date" => date::module(),
        "prbtest" => prbtest::module(),
        _ => return None,
    })
}

/// A module type whose members are all native functions; the shape every
/// stdlib module shares.
fn native_module_type(members: &[&str]) -> TypeRef {
    let props: IndexMap<String, TypeRef> = members
        .iter()
        .map(|name| {
            (
                (*name).to_string(),
                Type::simple(TypeKind::Function, "native function"),
            )
        })
        .collect();
    Type::with_val(TypeKind::Module, "module", TypeVal::with_props(props))
}
