//! Probescript: a dynamically-typed, statically-checkable scripting language
//! whose entry point is a *probe* — a class-like unit whose same-named
//! method is invoked as `run`.
//!
//! The crate implements the complete execution pipeline: a hand-written
//! lexer and recursive-descent parser, a gradual type checker with
//! structural compatibility and late-bound templates, and a tree-walking
//! interpreter with class/probe inheritance, a module system, and
//! future-based async calls. The [`Runner`] facade drives the whole
//! pipeline; [`ReplSession`] keeps scopes alive across lines.

mod ast;
mod context;
mod diagnostic;
mod interp;
mod io;
mod lexer;
mod modules;
mod parser;
mod run;
mod scope;
mod signal;
mod typecheck;
mod value;

pub use crate::{
    context::{Context, RunMode},
    diagnostic::{Diagnostic, ErrorKind},
    io::{CollectStringPrint, NoPrint, PrintHandle, PrintWriter, StdPrint},
    modules::{json_to_value, run_tests, value_to_json, TestFailure},
    run::{ReplSession, RunError, Runner},
    value::{ArrayValue, ObjectValue, Value},
};
