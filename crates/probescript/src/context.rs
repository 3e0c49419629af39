use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::io::{PrintHandle, StdPrint};
use crate::value::Value;

/// Which of the three program-execution modes drives evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Find and invoke the entry probe; restrict top-level statement kinds.
    #[default]
    Normal,
    /// Evaluate every statement, keeping the final value for display.
    Repl,
    /// Evaluate every statement, recording `export` bindings.
    Exports,
}

/// Per-evaluation record shared by the parser, type checker, and interpreter.
///
/// A context is created once per compilation unit (the entry file, each
/// imported module, each REPL line) and travels on every token so diagnostics
/// can render a source window without further plumbing.
pub struct Context {
    pub mode: RunMode,
    /// Name of the probe invoked in Normal mode.
    pub probe_name: String,
    pub filename: String,
    /// The full source text, kept for diagnostic rendering.
    pub source: String,
    /// Project module map: module name to filesystem path.
    pub modules: AHashMap<String, PathBuf>,
    /// Parsed `project.json` metadata, an object value ({} outside projects).
    pub project: Value,
    /// Destination for `console` output.
    pub writer: PrintHandle,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("mode", &self.mode)
            .field("probe_name", &self.probe_name)
            .field("filename", &self.filename)
            .field("source", &self.source)
            .field("modules", &self.modules)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates a context with the given mode and entry-probe name, writing
    /// console output to stdout.
    pub fn new(mode: RunMode, probe_name: impl Into<String>) -> Self {
        Self {
            mode,
            probe_name: probe_name.into(),
            filename: "REPL".to_string(),
            source: String::new(),
            modules: AHashMap::new(),
            project: Value::Undef,
            writer: Arc::new(Mutex::new(StdPrint)),
        }
    }

    /// Convenience constructor used by tests and module loading: a Normal-mode
    /// context for the given source text.
    pub fn for_source(source: impl Into<String>, filename: impl Into<String>) -> Self {
        let mut ctx = Self::new(RunMode::Normal, "Main");
        ctx.source = source.into();
        ctx.filename = filename.into();
        ctx
    }

    /// Replaces the console writer, returning the context for chaining.
    #[must_use]
    pub fn with_writer(mut self, writer: PrintHandle) -> Self {
        self.writer = writer;
        self
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(RunMode::Normal, "Main")
    }
}
