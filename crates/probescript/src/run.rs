use std::fmt::{self, Display};
use std::sync::Arc;

use crate::ast::Stmt;
use crate::context::{Context, RunMode};
use crate::diagnostic::Diagnostic;
use crate::interp;
use crate::io::PrintHandle;
use crate::parser;
use crate::scope::Scope;
use crate::signal::Signal;
use crate::typecheck::{self, TypeScope};
use crate::value::Value;

/// How a run failed: a phase diagnostic (lexer, parser, checker, or a fatal
/// runtime failure), or a throw that no `catch` handled.
#[derive(Debug)]
pub enum RunError {
    Diagnostic(Diagnostic),
    Uncaught(String),
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagnostic(diag) => write!(f, "{diag}"),
            Self::Uncaught(message) => write!(f, "{message}"),
        }
    }
}

impl From<Diagnostic> for RunError {
    fn from(diag: Diagnostic) -> Self {
        Self::Diagnostic(diag)
    }
}

fn signal_to_error(signal: Signal) -> RunError {
    match signal {
        Signal::Fatal(diag) => RunError::Diagnostic(*diag),
        other => RunError::Uncaught(other.top_level_message()),
    }
}

/// Drives the full pipeline for one compilation unit: parse, type-check,
/// then interpret under the context's mode.
pub struct Runner {
    context: Arc<Context>,
}

impl Runner {
    /// A Normal-mode runner for the given source, invoking probe `Main` and
    /// writing console output through `writer`.
    #[must_use]
    pub fn new(source: impl Into<String>, filename: impl Into<String>, writer: PrintHandle) -> Self {
        let mut ctx = Context::new(RunMode::Normal, "Main");
        ctx.source = source.into();
        ctx.filename = filename.into();
        Self {
            context: Arc::new(ctx.with_writer(writer)),
        }
    }

    /// A runner over a fully configured context (mode, module map, project
    /// metadata).
    #[must_use]
    pub fn with_context(context: Context) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Runs the pipeline. The result is the REPL-mode display value, the
    /// Exports-mode exports object, or undefined in Normal mode.
    pub fn run(&self) -> Result<Value, RunError> {
        let program = parser::parse(&self.context.source, &self.context)?;

        typecheck::check_program(&program, &TypeScope::root(), &self.context)?;

        let scope = Scope::root(&self.context);
        interp::eval(&Stmt::Program(program), &scope, &self.context).map_err(signal_to_error)
    }
}

/// A persistent REPL: runtime scope and type scope survive across lines.
pub struct ReplSession {
    writer: PrintHandle,
    scope: Scope,
    types: TypeScope,
}

impl ReplSession {
    #[must_use]
    pub fn new(writer: PrintHandle) -> Self {
        let ctx = Arc::new(Context::new(RunMode::Repl, "Main").with_writer(Arc::clone(&writer)));
        Self {
            writer,
            scope: Scope::root(&ctx),
            types: TypeScope::root(),
        }
    }

    /// Parses, checks, and evaluates one line, returning its display value.
    pub fn eval(&self, source: &str) -> Result<Value, RunError> {
        let mut ctx = Context::new(RunMode::Repl, "Main").with_writer(Arc::clone(&self.writer));
        ctx.source = source.to_string();
        let ctx = Arc::new(ctx);

        let program = parser::parse(source, &ctx)?;
        typecheck::check_program(&program, &self.types, &ctx)?;
        interp::eval(&Stmt::Program(program), &self.scope, &ctx).map_err(signal_to_error)
    }
}
