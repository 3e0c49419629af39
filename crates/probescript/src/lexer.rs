use std::sync::Arc;

use strum::Display as StrumDisplay;

use crate::context::Context;
use crate::diagnostic::{Diagnostic, ErrorKind};

/// Token tags produced by the lexer.
///
/// Operator families share a tag and are told apart by their lexeme: `<=` and
/// `>=` are `BinaryOperator` like `+`, while `<` and `>` get dedicated tags
/// because the parser's template-call lookahead needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum TokenKind {
    Probe,
    Number,
    Identifier,
    Equals,
    OpenParen,
    CloseParen,
    BinaryOperator,
    Var,
    Eof,
    Null,
    Semicolon,
    Const,
    Comma,
    Colon,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Dot,
    Function,
    Str,
    If,
    Else,
    AndOperator,
    OrOperator,
    DoubleEquals,
    NotEquals,
    Import,
    Export,
    Module,
    While,
    AssignmentOperator,
    Class,
    New,
    Return,
    Extends,
    As,
    For,
    Increment,
    Decrement,
    Bang,
    Arrow,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Undefined,
    Bool,
    Ternary,
    LessThan,
    GreaterThan,
    Async,
    Await,
}

/// A lexed token: the lexeme text, its tag, a 1-based source position, and a
/// back-reference to the source context used for diagnostic rendering.
#[derive(Debug, Clone)]
pub struct Token {
    pub lexeme: String,
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
    pub ctx: Option<Arc<Context>>,
}

impl Token {
    /// A token with no source position, used where the original program text
    /// is unavailable (injected globals, synthesized declarations).
    #[must_use]
    pub fn synthetic() -> Self {
        Self {
            lexeme: String::new(),
            kind: TokenKind::Eof,
            line: 0,
            col: 0,
            ctx: None,
        }
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "var" => TokenKind::Var,
        "null" => TokenKind::Null,
        "const" => TokenKind::Const,
        "fn" => TokenKind::Function,
        "if" => TokenKind::If,
        "probe" => TokenKind::Probe,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "module" => TokenKind::Module,
        "while" => TokenKind::While,
        "else" => TokenKind::Else,
        "class" => TokenKind::Class,
        "new" => TokenKind::New,
        "return" => TokenKind::Return,
        "extends" => TokenKind::Extends,
        "as" => TokenKind::As,
        "for" => TokenKind::For,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "throw" => TokenKind::Throw,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "undefined" => TokenKind::Undefined,
        "true" | "false" => TokenKind::Bool,
        "async" => TokenKind::Async,
        "await" => TokenKind::Await,
        _ => return None,
    })
}

const MULTI_CHAR_TOKENS: &[(&str, TokenKind)] = &[
    ("&&", TokenKind::AndOperator),
    ("||", TokenKind::OrOperator),
    ("==", TokenKind::DoubleEquals),
    ("!=", TokenKind::NotEquals),
    ("<=", TokenKind::BinaryOperator),
    (">=", TokenKind::BinaryOperator),
    ("+=", TokenKind::AssignmentOperator),
    ("-=", TokenKind::AssignmentOperator),
    ("*=", TokenKind::AssignmentOperator),
    ("/=", TokenKind::AssignmentOperator),
    ("++", TokenKind::Increment),
    ("--", TokenKind::Decrement),
    ("=>", TokenKind::Arrow),
];

fn single_char_token(c: char) -> Option<TokenKind> {
    Some(match c {
        '(' => TokenKind::OpenParen,
        ')' => TokenKind::CloseParen,
        '{' => TokenKind::OpenBrace,
        '}' => TokenKind::CloseBrace,
        '[' => TokenKind::OpenBracket,
        ']' => TokenKind::CloseBracket,
        ',' => TokenKind::Comma,
        ':' => TokenKind::Colon,
        '.' => TokenKind::Dot,
        '+' | '-' | '*' | '/' | '%' => TokenKind::BinaryOperator,
        '=' => TokenKind::Equals,
        '<' => TokenKind::LessThan,
        '>' => TokenKind::GreaterThan,
        '!' => TokenKind::Bang,
        '?' => TokenKind::Ternary,
        _ => return None,
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Identifiers continue with letters and underscores only; digits end the
/// identifier, so `foo1` lexes as `foo` followed by `1`.
fn is_ident_continue(c: char) -> bool {
    is_ident_start(c)
}

struct Lexer<'a> {
    src: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    ctx: &'a Arc<Context>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> char {
        let c = self.src[self.pos];
        self.pos += 1;
        self.col += 1;
        c
    }

    fn push(&mut self, lexeme: impl Into<String>, kind: TokenKind, line: u32, col: u32) {
        self.tokens.push(Token {
            lexeme: lexeme.into(),
            kind,
            line,
            col,
            ctx: Some(Arc::clone(self.ctx)),
        });
    }

    /// A `-` or `.` starts a numeric literal only when a digit follows and the
    /// previous token cannot end an operand, so `n-1` stays a subtraction.
    fn sign_starts_number(&self) -> bool {
        !matches!(
            self.tokens.last().map(|t| t.kind),
            Some(
                TokenKind::Number
                    | TokenKind::Identifier
                    | TokenKind::Str
                    | TokenKind::Bool
                    | TokenKind::Null
                    | TokenKind::Undefined
                    | TokenKind::CloseParen
                    | TokenKind::CloseBracket
            )
        )
    }

    fn run(mut self) -> Result<Vec<Token>, Diagnostic> {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                self.pos += 1;
                self.line += 1;
                self.col = 1;
                continue;
            }

            if c == ' ' || c == '\t' || c == '\r' {
                self.bump();
                continue;
            }

            if c == ';' {
                let (line, col) = (self.line, self.col);
                self.bump();
                self.push(";", TokenKind::Semicolon, line, col);
                continue;
            }

            if c == '/' && self.peek(1) == Some('/') {
                while let Some(c) = self.peek(0) {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }

            let digit_follows = self.peek(1).is_some_and(|c| c.is_ascii_digit());
            if c.is_ascii_digit() || ((c == '-' || c == '.') && digit_follows && self.sign_starts_number()) {
                let (line, col) = (self.line, self.col);
                let mut num = String::new();
                num.push(self.bump());
                let mut seen_dot = c == '.';
                while let Some(c) = self.peek(0) {
                    if c.is_ascii_digit() {
                        num.push(self.bump());
                    } else if c == '.' && !seen_dot && self.peek(1).is_some_and(|d| d.is_ascii_digit()) {
                        seen_dot = true;
                        num.push(self.bump());
                    } else {
                        break;
                    }
                }
                self.push(num, TokenKind::Number, line, col);
                continue;
            }

            // Multi-character operators are matched before single-character ones.
            let mut matched = false;
            for (symbol, kind) in MULTI_CHAR_TOKENS {
                let mut chars = symbol.chars();
                if self.peek(0) == chars.next() && self.peek(1) == chars.next() {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    self.push(*symbol, *kind, line, col);
                    matched = true;
                    break;
                }
            }
            if matched {
                continue;
            }

            if let Some(kind) = single_char_token(c) {
                let (line, col) = (self.line, self.col);
                self.bump();
                self.push(c.to_string(), kind, line, col);
                continue;
            }

            if c == '"' || c == '\'' {
                let (line, col) = (self.line, self.col);
                let quote = self.bump();
                let mut value = String::new();
                while let Some(c) = self.peek(0) {
                    if c == quote {
                        break;
                    }
                    let c = self.bump();
                    if c == '\\' {
                        let Some(esc) = self.peek(0) else {
                            break;
                        };
                        self.bump();
                        value.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            'b' => '\u{8}',
                            'f' => '\u{c}',
                            // Unknown escapes yield the literal character.
                            other => other,
                        });
                    } else {
                        value.push(c);
                    }
                }
                if self.peek(0).is_some() {
                    self.bump();
                }
                self.push(value, TokenKind::Str, line, col);
                continue;
            }

            if is_ident_start(c) {
                let (line, col) = (self.line, self.col);
                let mut ident = String::new();
                while let Some(c) = self.peek(0) {
                    if !is_ident_continue(c) {
                        break;
                    }
                    ident.push(self.bump());
                }
                let kind = keyword(&ident).unwrap_or(TokenKind::Identifier);
                self.push(ident, kind, line, col);
                continue;
            }

            return Err(Diagnostic::new(
                ErrorKind::SyntaxError,
                format!("Unrecognized character in source: '{c}'"),
            ));
        }

        self.push("EndOfFile", TokenKind::Eof, self.line, self.col);
        Ok(self.tokens)
    }
}

/// Tokenizes `source`, producing a vector terminated by an `Eof` token.
pub fn tokenize(source: &str, ctx: &Arc<Context>) -> Result<Vec<Token>, Diagnostic> {
    Lexer {
        src: source.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
        ctx,
        tokens: Vec::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let ctx = Arc::new(Context::for_source(source, "test.prb"));
        tokenize(source, &ctx).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn lexemes(source: &str) -> Vec<String> {
        let ctx = Arc::new(Context::for_source(source, "test.prb"));
        tokenize(source, &ctx).unwrap().into_iter().map(|t| t.lexeme).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("var x = fn"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Function,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn identifier_lexeme_reparses_to_same_kind() {
        let ctx = Arc::new(Context::for_source("counter", "test.prb"));
        let first = tokenize("counter", &ctx).unwrap();
        let again = tokenize(&first[0].lexeme, &ctx).unwrap();
        assert_eq!(first[0].kind, again[0].kind);
        assert_eq!(first[0].lexeme, again[0].lexeme);
    }

    #[test]
    fn identifiers_exclude_digits() {
        assert_eq!(
            kinds("foo1"),
            vec![TokenKind::Identifier, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn subtraction_is_not_a_negative_literal() {
        assert_eq!(lexemes("n-1"), vec!["n", "-", "1", "EndOfFile"]);
        assert_eq!(lexemes("fib(n-2)"), vec!["fib", "(", "n", "-", "2", ")", "EndOfFile"]);
    }

    #[test]
    fn negative_literal_after_operator() {
        assert_eq!(lexemes("x = -4"), vec!["x", "=", "-4", "EndOfFile"]);
        assert_eq!(lexemes("(-4)"), vec!["(", "-4", ")", "EndOfFile"]);
    }

    #[test]
    fn decimal_literals() {
        assert_eq!(lexemes("3.25"), vec!["3.25", "EndOfFile"]);
        assert_eq!(lexemes("= .5"), vec!["=", ".5", "EndOfFile"]);
        // At most one dot per literal; the second starts a Dot token.
        assert_eq!(lexemes("1.2.3"), vec!["1.2", ".", "3", "EndOfFile"]);
    }

    #[test]
    fn multi_char_operators_win_over_single() {
        assert_eq!(
            kinds("a <= b == c && d"),
            vec![
                TokenKind::Identifier,
                TokenKind::BinaryOperator,
                TokenKind::Identifier,
                TokenKind::DoubleEquals,
                TokenKind::Identifier,
                TokenKind::AndOperator,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("x++")[1], TokenKind::Increment);
        assert_eq!(kinds("=>")[0], TokenKind::Arrow);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(lexemes(r#""a\nb""#)[0], "a\nb");
        assert_eq!(lexemes(r#"'it\'s'"#)[0], "it's");
        // Unknown escapes yield the literal character.
        assert_eq!(lexemes(r#""\q""#)[0], "q");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("var x // trailing\nvar y"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let ctx = Arc::new(Context::for_source("var x\n  y", "test.prb"));
        let tokens = tokenize("var x\n  y", &ctx).unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (1, 5));
        assert_eq!((tokens[2].line, tokens[2].col), (2, 3));
    }

    #[test]
    fn unknown_character_fails() {
        let ctx = Arc::new(Context::for_source("var @", "test.prb"));
        let err = tokenize("var @", &ctx).unwrap_err();
        assert!(err.message.contains('@'));
    }
}
