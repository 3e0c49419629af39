use std::fmt::{self, Display};

use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::lexer::Token;

/// The diagnostic taxonomy shared by every phase of the pipeline.
///
/// The variant name is the `[Kind]` printed in front of a diagnostic, so the
/// strum `Display` derive doubles as the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, IntoStaticStr)]
pub enum ErrorKind {
    SyntaxError,
    TypeError,
    ReferenceError,
    RedefinitionError,
    ArgumentError,
    FunctionCallError,
    ClassBodyError,
    ClassInheritanceError,
    ConstructorError,
    ProbeBodyError,
    ProbeInheritanceError,
    ProbeError,
    ImportError,
    ExportError,
    MainError,
    OperatorError,
    MemberError,
    AssignmentError,
    TemplateError,
    ReturnError,
    BreakError,
    ContinueError,
    AsyncError,
    ProgramError,
    AssertError,
}

/// A window into the offending source line, captured when the diagnostic is
/// created so rendering needs no access to the originating context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    pub filename: String,
    pub line: u32,
    pub col: u32,
    /// Width of the caret underline, in characters.
    pub lexeme_len: usize,
    pub prev_line: Option<String>,
    pub line_text: String,
    pub next_line: Option<String>,
}

/// A phase error: lexer, parser, type checker, or a fatal runtime failure.
///
/// Rendering follows the fixed layout:
///
/// ```text
/// [Kind]: message
///
/// At file:line:col
/// <previous source line>
/// <offending source line>
///                   ^^^^
/// <next source line>
/// ```
///
/// Diagnostics without a source frame render as the single `[Kind]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub frame: Option<SourceFrame>,
}

impl Diagnostic {
    /// Creates a diagnostic without a source location.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            frame: None,
        }
    }

    /// Creates a diagnostic pointing at `token`, capturing the surrounding
    /// source lines from the token's context.
    ///
    /// Tokens without a context (synthetic tokens) fall back to the bare
    /// one-line form, as do tokens whose line cannot be recovered.
    pub fn with_token(kind: ErrorKind, message: impl Into<String>, token: &Token) -> Self {
        let mut diag = Self::new(kind, message);
        let Some(ctx) = token.ctx.as_ref() else {
            return diag;
        };
        let lines: Vec<&str> = ctx.source.split('\n').collect();
        let Some(line_text) = lines.get(token.line as usize - 1) else {
            return diag;
        };
        if line_text.is_empty() {
            return diag;
        }
        diag.frame = Some(SourceFrame {
            filename: ctx.filename.clone(),
            line: token.line,
            col: token.col,
            lexeme_len: token.lexeme.chars().count().max(1),
            prev_line: (token.line > 1).then(|| lines[token.line as usize - 2].to_string()),
            line_text: (*line_text).to_string(),
            next_line: lines.get(token.line as usize).map(|l| (*l).to_string()),
        });
        diag
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]: {}", self.kind, self.message)?;
        let Some(frame) = &self.frame else {
            return Ok(());
        };

        writeln!(f)?;
        writeln!(f, "At {}:{}:{}", frame.filename, frame.line, frame.col)?;
        if let Some(prev) = &frame.prev_line {
            writeln!(f, "{prev}")?;
        }
        writeln!(f, "{}", frame.line_text)?;

        // The caret underline keeps tabs so it lines up under tabbed source.
        let mut pointer = String::new();
        for (i, ch) in frame.line_text.chars().enumerate() {
            if i + 1 >= frame.col as usize {
                break;
            }
            pointer.push(if ch == '\t' { '\t' } else { ' ' });
        }
        for _ in 0..frame.lexeme_len {
            pointer.push('^');
        }
        writeln!(f, "{pointer}")?;

        if let Some(next) = &frame.next_line {
            writeln!(f, "{next}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::Context;
    use crate::lexer::{Token, TokenKind};

    #[test]
    fn bare_diagnostic_is_one_line() {
        let diag = Diagnostic::new(ErrorKind::ArgumentError, "randInt expects two arguments");
        assert_eq!(diag.to_string(), "[ArgumentError]: randInt expects two arguments\n");
    }

    #[test]
    fn framed_diagnostic_points_at_lexeme() {
        let ctx = Arc::new(Context::for_source("var x = 1;\nvar x = 2;\nvar y = 3;", "main.prb"));
        let token = Token {
            lexeme: "x".to_string(),
            kind: TokenKind::Identifier,
            line: 2,
            col: 5,
            ctx: Some(ctx),
        };
        let diag = Diagnostic::with_token(ErrorKind::ReferenceError, "Variable x is already defined", &token);
        let rendered = diag.to_string();
        assert!(rendered.starts_with("[ReferenceError]: Variable x is already defined\n\nAt main.prb:2:5\n"));
        assert!(rendered.contains("var x = 2;\n    ^\n"));
        assert!(rendered.contains("var y = 3;"));
    }
}
