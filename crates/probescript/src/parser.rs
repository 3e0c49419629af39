use std::sync::Arc;

use crate::ast::{
    ArrayLit, ArrowFn, AssignExpr, AssignOp, AwaitExpr, BinExpr, BinaryOp, BoolLit, CallExpr, CastExpr, CatchClause,
    ClassDecl, ExportStmt, Expr, FnDecl, ForStmt, Ident, IfStmt, ImportStmt, MapLit, MemberAccess, MemberAssign,
    ModuleDecl, NewExpr, NumLit, PrefixOp, ProbeDecl, Program, Property, ReturnStmt, StepOp, Stmt, StrLit,
    TemplateCall, Ternary, ThrowStmt, TryStmt, UnaryPostfix, UnaryPrefix, VarDecl, WhileStmt,
};
use crate::context::Context;
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::lexer::{self, Token, TokenKind};

type ParseResult<T> = Result<T, Diagnostic>;

/// Recursive-descent parser over the token stream.
///
/// Statement dispatch is keyed on the first token's kind; everything else is
/// an expression statement. Trailing semicolons are consumed, never required.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses `source` into a [`Program`], tokenizing first.
pub fn parse(source: &str, ctx: &Arc<Context>) -> ParseResult<Program> {
    let tokens = lexer::tokenize(source, ctx)?;
    Parser { tokens, pos: 0 }.parse_program()
}

impl Parser {
    fn at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn eat(&mut self) -> Token {
        let token = self.at(0).clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, err: &str) -> ParseResult<Token> {
        let token = self.eat();
        if token.kind != kind {
            return Err(Diagnostic::with_token(ErrorKind::SyntaxError, err, &token));
        }
        Ok(token)
    }

    fn not_eof(&self) -> bool {
        self.at(0).kind != TokenKind::Eof
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let token = self.at(0).clone();
        let mut body = Vec::new();
        while self.not_eof() {
            body.push(self.parse_stmt()?);
        }
        Ok(Program { token, body })
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let stmt = match self.at(0).kind {
            TokenKind::Probe => self.parse_probe_decl()?,
            TokenKind::Var => Stmt::VarDecl(self.parse_var_decl(false, false)?),
            TokenKind::Const => Stmt::VarDecl(self.parse_var_decl(true, false)?),
            TokenKind::Function | TokenKind::Async => Stmt::FnDecl(Box::new(self.parse_fn_decl(false)?)),
            TokenKind::Module => self.parse_module_decl()?,
            TokenKind::If => self.parse_if_stmt()?,
            TokenKind::Import => self.parse_import_stmt()?,
            TokenKind::Return => self.parse_return_stmt()?,
            TokenKind::Export => self.parse_export_stmt()?,
            TokenKind::While => self.parse_while_stmt()?,
            TokenKind::Class => self.parse_class_decl()?,
            TokenKind::For => self.parse_for_stmt()?,
            TokenKind::Throw => self.parse_throw_stmt()?,
            TokenKind::Break => Stmt::Break { token: self.eat() },
            TokenKind::Continue => Stmt::Continue { token: self.eat() },
            TokenKind::Try => self.parse_try_stmt()?,
            TokenKind::Semicolon => Stmt::Expr(Expr::Undef { token: self.eat() }),
            _ => Stmt::Expr(self.parse_expr()?),
        };

        if self.at(0).kind == TokenKind::Semicolon {
            self.eat();
        }
        Ok(stmt)
    }

    fn parse_probe_decl(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let name = self.expect(TokenKind::Identifier, "Expected identifier")?.lexeme;

        if self.at(0).kind == TokenKind::Extends {
            let extends_token = self.eat();
            let extends = self.parse_expr()?;
            let body = self.parse_methods_body(Some(&name))?;
            return Ok(Stmt::ProbeDecl(Box::new(ProbeDecl {
                token: extends_token,
                name,
                body,
                extends: Some(extends),
            })));
        }

        let body = self.parse_methods_body(Some(&name))?;
        Ok(Stmt::ProbeDecl(Box::new(ProbeDecl {
            token,
            name,
            body,
            extends: None,
        })))
    }

    fn parse_class_decl(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let name = self.expect(TokenKind::Identifier, "Expected identifier")?.lexeme;

        let extends = if self.at(0).kind == TokenKind::Extends {
            self.eat();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let body = self.parse_methods_body(None)?;
        Ok(Stmt::ClassDecl(Box::new(ClassDecl {
            token,
            name,
            body,
            extends,
        })))
    }

    fn parse_module_decl(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let name = self
            .expect(TokenKind::Identifier, "Expected Identifier after module declaration")?
            .lexeme;
        Ok(Stmt::ModuleDecl(ModuleDecl { token, name }))
    }

    fn parse_try_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let body = self.parse_body()?;

        let catch_token = self.expect(TokenKind::Catch, "Expected catch after try body")?;
        let params = self.parse_params()?;
        let catch_body = self.parse_body()?;

        Ok(Stmt::Try(Box::new(TryStmt {
            token,
            body,
            catch: CatchClause {
                token: catch_token,
                params,
                body: catch_body,
            },
        })))
    }

    fn parse_for_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        self.expect(TokenKind::OpenParen, "Expected '(' after 'for'")?;

        let mut inits = Vec::new();
        while self.at(0).kind != TokenKind::Semicolon && self.not_eof() {
            inits.push(Stmt::VarDecl(self.parse_var_decl(false, false)?));
            if self.at(0).kind == TokenKind::Comma {
                self.eat();
            } else {
                break;
            }
        }
        self.expect(TokenKind::Semicolon, "Expected semicolon after initializer in for loop")?;

        let mut conditions = Vec::new();
        while self.at(0).kind != TokenKind::Semicolon && self.not_eof() {
            conditions.push(self.parse_expr()?);
            if self.at(0).kind == TokenKind::Comma {
                self.eat();
            } else {
                break;
            }
        }
        self.expect(TokenKind::Semicolon, "Expected semicolon after condition in for loop")?;

        let mut updates = Vec::new();
        while self.at(0).kind != TokenKind::CloseParen && self.at(0).kind != TokenKind::Semicolon && self.not_eof() {
            updates.push(self.parse_expr()?);
            if self.at(0).kind == TokenKind::Comma {
                self.eat();
            } else {
                break;
            }
        }
        self.expect(
            TokenKind::CloseParen,
            "Expected closing parentheses after for loop updates",
        )?;

        let body = self.parse_body()?;
        Ok(Stmt::For(Box::new(ForStmt {
            token,
            inits,
            conditions,
            updates,
            body,
        })))
    }

    fn parse_throw_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let value = self.parse_expr()?;
        Ok(Stmt::Throw(Box::new(ThrowStmt { token, value })))
    }

    fn parse_return_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let value = if self.at(0).kind == TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(Stmt::Return(Box::new(ReturnStmt { token, value })))
    }

    fn parse_while_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        self.expect(TokenKind::OpenParen, "Expected open parentheses after while keyword")?;
        let condition = self.parse_expr()?;
        self.expect(
            TokenKind::CloseParen,
            "Expected closing parentheses after while condition",
        )?;
        let body = self.parse_body()?;
        Ok(Stmt::While(Box::new(WhileStmt { token, condition, body })))
    }

    fn parse_import_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let name = self.at(0).lexeme.clone();

        let member = if self.at(1).kind == TokenKind::Dot {
            Some(self.parse_expr()?)
        } else {
            self.eat();
            None
        };

        let alias = if self.at(0).kind == TokenKind::As {
            self.eat();
            Some(
                self.expect(TokenKind::Identifier, "Expected identifier after as keyword")?
                    .lexeme,
            )
        } else {
            None
        };

        Ok(Stmt::Import(Box::new(ImportStmt {
            token,
            name,
            member,
            alias,
        })))
    }

    fn parse_export_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        let value = Box::new(self.parse_stmt()?);
        Ok(Stmt::Export(Box::new(ExportStmt { token, value })))
    }

    /// Parses a function declaration. `tk_eaten` is set in methods-mode
    /// bodies, where the name token is already current.
    fn parse_fn_decl(&mut self, tk_eaten: bool) -> ParseResult<FnDecl> {
        let token = self.at(0).clone();
        if !tk_eaten {
            self.eat();
        }
        let is_async = token.kind == TokenKind::Async;
        if is_async && self.at(0).kind == TokenKind::Function {
            self.eat();
        }

        let name = if matches!(self.at(0).kind, TokenKind::Identifier | TokenKind::New) {
            self.eat().lexeme
        } else {
            "anonymous".to_string()
        };

        let mut template_params = Vec::new();
        if self.at(0).kind == TokenKind::LessThan {
            self.eat();
            while self.at(0).kind != TokenKind::GreaterThan && self.not_eof() {
                let ident = self.expect(TokenKind::Identifier, "Expected identifier")?;
                let value = if self.at(0).kind == TokenKind::Equals {
                    self.eat();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                template_params.push(VarDecl {
                    name: ident.lexeme.clone(),
                    token: ident,
                    ty: None,
                    value,
                    is_const: false,
                });
                if self.at(0).kind == TokenKind::Comma {
                    self.eat();
                }
            }
            self.eat();
        }

        let params = self.parse_params()?;

        let return_type = if self.at(0).kind == TokenKind::Colon {
            self.eat();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let body = self.parse_body()?;

        Ok(FnDecl {
            token,
            name,
            params,
            template_params,
            return_type,
            body,
            is_async,
        })
    }

    fn parse_if_stmt(&mut self) -> ParseResult<Stmt> {
        let token = self.eat();
        self.expect(TokenKind::OpenParen, "Expected opening parenthesis")?;
        let condition = self.parse_expr()?;

        let last = self.eat();
        if last.kind != TokenKind::CloseParen {
            return Err(Diagnostic::with_token(
                ErrorKind::SyntaxError,
                format!("Expected closing parentheses, received {}", last.lexeme),
                &last,
            ));
        }

        let body = self.parse_body()?;

        let else_body = if self.at(0).kind == TokenKind::Else {
            self.eat();
            Some(self.parse_body()?)
        } else {
            None
        };

        Ok(Stmt::If(Box::new(IfStmt {
            token,
            condition,
            body,
            else_body,
        })))
    }

    fn parse_var_decl(&mut self, is_const: bool, tk_eaten: bool) -> ParseResult<VarDecl> {
        let token = self.at(0).clone();
        if !tk_eaten {
            self.eat();
        }
        let name = self.expect(TokenKind::Identifier, "Expected identifier")?.lexeme;

        let ty = if self.at(0).kind == TokenKind::Colon {
            self.eat();
            Some(self.parse_logical_expr()?)
        } else {
            None
        };

        if self.at(0).kind != TokenKind::Equals {
            if is_const {
                return Err(Diagnostic::with_token(
                    ErrorKind::SyntaxError,
                    "Must assign value to constant variable",
                    self.at(0),
                ));
            }
            return Ok(VarDecl {
                token,
                name,
                ty,
                value: None,
                is_const,
            });
        }

        self.eat();
        Ok(VarDecl {
            token,
            name,
            ty,
            value: Some(self.parse_expr()?),
            is_const,
        })
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_assignment_expr()
    }

    fn parse_assignment_expr(&mut self) -> ParseResult<Expr> {
        let left = self.parse_ternary_expr()?;

        if matches!(self.at(0).kind, TokenKind::Increment | TokenKind::Decrement) {
            let op_token = self.eat();
            let op = if op_token.kind == TokenKind::Increment {
                StepOp::Inc
            } else {
                StepOp::Dec
            };
            return Ok(Expr::UnaryPostfix(Box::new(UnaryPostfix {
                token: op_token,
                op,
                operand: left,
            })));
        }

        if matches!(self.at(0).kind, TokenKind::Equals | TokenKind::AssignmentOperator) {
            let op_token = self.eat();
            let op = match op_token.lexeme.as_str() {
                "+=" => AssignOp::Add,
                "-=" => AssignOp::Sub,
                "*=" => AssignOp::Mul,
                "/=" => AssignOp::Div,
                _ => AssignOp::Assign,
            };
            let value = self.parse_expr()?;
            // Assignments to member expressions become MemberAssign nodes.
            if let Expr::MemberAccess(member) = left {
                return Ok(Expr::MemberAssign(Box::new(MemberAssign {
                    token: op_token,
                    object: member.object,
                    property: member.property,
                    computed: member.computed,
                    value,
                    op: op.into(),
                })));
            }
            return Ok(Expr::Assign(Box::new(AssignExpr {
                token: op_token,
                op,
                target: left,
                value,
            })));
        }

        Ok(left)
    }

    fn parse_ternary_expr(&mut self) -> ParseResult<Expr> {
        let condition = self.parse_as_expr()?;

        if self.at(0).kind != TokenKind::Ternary {
            return Ok(condition);
        }
        let token = self.eat();

        let consequent = self.parse_expr()?;
        self.expect(TokenKind::Colon, "Expected colon after ternary consequent")?;
        let alternate = self.parse_expr()?;

        Ok(Expr::Ternary(Box::new(Ternary {
            token,
            condition,
            consequent,
            alternate,
        })))
    }

    fn parse_as_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_logical_expr()?;

        while self.at(0).kind == TokenKind::As {
            let token = self.eat();
            let target = self.parse_expr()?;
            left = Expr::Cast(Box::new(CastExpr {
                token,
                operand: left,
                target,
            }));
        }

        Ok(left)
    }

    fn parse_logical_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality_expr()?;

        while matches!(self.at(0).kind, TokenKind::AndOperator | TokenKind::OrOperator) {
            let op_token = self.eat();
            let op = if op_token.kind == TokenKind::AndOperator {
                BinaryOp::And
            } else {
                BinaryOp::Or
            };
            let right = self.parse_equality_expr()?;
            left = Expr::BinOp(Box::new(BinExpr {
                token: op_token,
                op,
                left,
                right,
            }));
        }

        Ok(left)
    }

    fn parse_equality_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_relational_expr()?;

        while matches!(self.at(0).kind, TokenKind::DoubleEquals | TokenKind::NotEquals) {
            let op_token = self.eat();
            let op = if op_token.kind == TokenKind::DoubleEquals {
                BinaryOp::Eq
            } else {
                BinaryOp::NotEq
            };
            let right = self.parse_relational_expr()?;
            left = Expr::BinOp(Box::new(BinExpr {
                token: op_token,
                op,
                left,
                right,
            }));
        }

        Ok(left)
    }

    fn parse_relational_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_object_expr()?;

        loop {
            let op = match (self.at(0).kind, self.at(0).lexeme.as_str()) {
                (TokenKind::LessThan, _) => BinaryOp::Less,
                (TokenKind::GreaterThan, _) => BinaryOp::Greater,
                (TokenKind::BinaryOperator, "<=") => BinaryOp::LessEq,
                (TokenKind::BinaryOperator, ">=") => BinaryOp::GreaterEq,
                _ => break,
            };
            let op_token = self.eat();
            let right = self.parse_expr()?;
            left = Expr::BinOp(Box::new(BinExpr {
                token: op_token,
                op,
                left,
                right,
            }));
        }

        Ok(left)
    }

    /// Object literals sit between relational and additive precedence, so a
    /// `{…}` used as a comparison operand needs parentheses.
    fn parse_object_expr(&mut self) -> ParseResult<Expr> {
        if self.at(0).kind != TokenKind::OpenBrace {
            return self.parse_additive_expr();
        }
        let token = self.eat();

        let mut properties = Vec::new();
        while self.not_eof() && self.at(0).kind != TokenKind::CloseBrace {
            let key = self.eat();

            // Shorthand entry: `{ key }` or `{ key, … }`.
            if self.at(0).kind == TokenKind::Comma {
                self.eat();
                properties.push(Property {
                    key: key.lexeme.clone(),
                    token: key,
                    value: None,
                });
                continue;
            } else if self.at(0).kind == TokenKind::CloseBrace {
                properties.push(Property {
                    key: key.lexeme.clone(),
                    token: key,
                    value: None,
                });
                continue;
            }

            self.expect(TokenKind::Colon, "Expected colon")?;
            let value = self.parse_expr()?;
            properties.push(Property {
                key: key.lexeme.clone(),
                token: key,
                value: Some(value),
            });

            if self.at(0).kind != TokenKind::CloseBrace {
                self.expect(TokenKind::Comma, "Expected comma")?;
            }
        }

        self.expect(TokenKind::CloseBrace, "Object literal missing closing bracket")?;
        Ok(Expr::MapLit(MapLit { token, properties }))
    }

    fn parse_additive_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative_expr()?;

        while self.at(0).kind == TokenKind::BinaryOperator
            && matches!(self.at(0).lexeme.as_str(), "+" | "-")
        {
            let op_token = self.eat();
            let op = if op_token.lexeme == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            let right = self.parse_multiplicative_expr()?;
            left = Expr::BinOp(Box::new(BinExpr {
                token: op_token,
                op,
                left,
                right,
            }));
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary_expr()?;

        while self.at(0).kind == TokenKind::BinaryOperator
            && matches!(self.at(0).lexeme.as_str(), "*" | "/" | "%")
        {
            let op_token = self.eat();
            let op = match op_token.lexeme.as_str() {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let right = self.parse_unary_expr()?;
            left = Expr::BinOp(Box::new(BinExpr {
                token: op_token,
                op,
                left,
                right,
            }));
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> ParseResult<Expr> {
        if matches!(
            self.at(0).kind,
            TokenKind::Bang | TokenKind::Increment | TokenKind::Decrement
        ) {
            let op_token = self.eat();
            let op = match op_token.kind {
                TokenKind::Bang => PrefixOp::Not,
                TokenKind::Increment => PrefixOp::Inc,
                _ => PrefixOp::Dec,
            };
            let operand = self.parse_expr()?;
            return Ok(Expr::UnaryPrefix(Box::new(UnaryPrefix {
                token: op_token,
                op,
                operand,
            })));
        }

        self.parse_await_expr()
    }

    fn parse_await_expr(&mut self) -> ParseResult<Expr> {
        if self.at(0).kind != TokenKind::Await {
            return self.parse_call_member_expr();
        }
        let token = self.eat();
        let operand = self.parse_call_member_expr()?;
        Ok(Expr::Await(Box::new(AwaitExpr { token, operand })))
    }

    fn parse_call_member_expr(&mut self) -> ParseResult<Expr> {
        let member = self.parse_member_expr()?;
        if self.at(0).kind == TokenKind::OpenParen {
            self.parse_call_expr(member)
        } else {
            Ok(member)
        }
    }

    fn parse_call_expr(&mut self, mut caller: Expr) -> ParseResult<Expr> {
        if self.at(0).kind == TokenKind::LessThan {
            caller = self.try_template_call(caller)?;
        }

        let token = self.at(0).clone();
        let args = self.parse_args()?;
        let call = Expr::Call(Box::new(CallExpr {
            token,
            callee: caller,
            args,
        }));

        if self.at(0).kind == TokenKind::OpenParen {
            return self.parse_call_expr(call);
        }
        if matches!(self.at(0).kind, TokenKind::Dot | TokenKind::OpenBracket) {
            return self.parse_member_chain(call);
        }
        Ok(call)
    }

    fn parse_member_expr(&mut self) -> ParseResult<Expr> {
        let mut object = self.parse_arrow_function()?;

        while matches!(
            self.at(0).kind,
            TokenKind::Dot | TokenKind::OpenBracket | TokenKind::LessThan
        ) {
            if self.at(0).kind == TokenKind::LessThan {
                object = self.try_template_call(object)?;
                continue;
            }
            object = self.parse_member_segment(object)?;
        }

        Ok(object)
    }

    /// Parses one `.prop` or `[expr]` segment onto `object`.
    fn parse_member_segment(&mut self, object: Expr) -> ParseResult<Expr> {
        let op = self.eat();
        let computed;
        let property;
        let mut last_prop = None;

        if op.kind == TokenKind::Dot {
            computed = false;
            property = self.parse_primary_expr()?;
            let Expr::Ident(ident) = &property else {
                return Err(Diagnostic::with_token(
                    ErrorKind::SyntaxError,
                    "Cannot use dot operator without right hand side being an identifier",
                    &op,
                ));
            };
            last_prop = Some(ident.name.clone());
        } else {
            computed = true;
            property = self.parse_expr()?;
            self.expect(TokenKind::CloseBracket, "Expected closing bracket")?;
            if let Expr::Str(s) = &property {
                last_prop = Some(s.value.clone());
            }
        }

        Ok(Expr::MemberAccess(Box::new(MemberAccess {
            token: op,
            object,
            property,
            computed,
            last_prop,
        })))
    }

    fn parse_member_chain(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        while matches!(self.at(0).kind, TokenKind::Dot | TokenKind::OpenBracket) {
            expr = self.parse_member_segment(expr)?;
            if self.at(0).kind == TokenKind::OpenParen {
                expr = self.parse_call_expr(expr)?;
            }
        }
        Ok(expr)
    }

    fn parse_arrow_function(&mut self) -> ParseResult<Expr> {
        if self.at(0).kind != TokenKind::Function {
            return self.parse_new_expr();
        }

        let token = self.eat();
        let params = self.parse_params()?;

        if self.at(0).kind == TokenKind::Arrow {
            self.eat();
        }

        let body = if self.at(0).kind == TokenKind::OpenBrace {
            self.parse_body()?
        } else {
            // Single-expression body desugars to an implicit return.
            vec![Stmt::Return(Box::new(ReturnStmt {
                token: token.clone(),
                value: Some(self.parse_expr()?),
            }))]
        };

        Ok(Expr::Arrow(Box::new(ArrowFn { token, params, body })))
    }

    fn parse_new_expr(&mut self) -> ParseResult<Expr> {
        if self.at(0).kind != TokenKind::New {
            return self.parse_primary_expr();
        }

        let token = self.eat();
        let constructor = self.parse_member_expr()?;

        // A template instantiation already absorbed its argument list.
        let (ctor, args) = if let Expr::Call(call) = constructor {
            (call.callee, call.args)
        } else {
            (constructor, self.parse_args()?)
        };

        Ok(Expr::New(Box::new(NewExpr { token, ctor, args })))
    }

    /// Commits to a template call only if, after one template argument, the
    /// next token is `,`, `>`, or `=`; otherwise the consumed pieces fall
    /// back cleanly to a `<` comparison.
    fn try_template_call(&mut self, caller: Expr) -> ParseResult<Expr> {
        let open = self.expect(TokenKind::LessThan, "Expected '<'")?;
        let mut template_args = Vec::new();

        if self.at(0).kind != TokenKind::GreaterThan {
            template_args.push(self.parse_template_arg()?);

            if !matches!(
                self.at(0).kind,
                TokenKind::Comma | TokenKind::GreaterThan | TokenKind::Equals
            ) {
                let right = template_args.pop().expect("one template argument was parsed");
                return Ok(Expr::BinOp(Box::new(BinExpr {
                    token: caller.token().clone(),
                    op: BinaryOp::Less,
                    left: caller,
                    right,
                })));
            }

            while self.at(0).kind == TokenKind::Comma {
                self.eat();
                template_args.push(self.parse_template_arg()?);
            }
        }

        self.expect(TokenKind::GreaterThan, "Expected '>' after template arguments")?;

        let call = Expr::TemplateCall(Box::new(TemplateCall {
            token: open,
            callee: caller,
            template_args,
        }));

        if self.at(0).kind == TokenKind::OpenParen {
            return self.parse_call_expr(call);
        }
        Ok(call)
    }

    /// Template arguments parse at object-expression precedence.
    fn parse_template_arg(&mut self) -> ParseResult<Expr> {
        self.parse_object_expr()
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expr> {
        if self.at(0).kind == TokenKind::OpenBracket {
            return self.parse_array_expr();
        }

        let primary = match self.at(0).kind {
            TokenKind::Identifier => {
                let token = self.eat();
                Expr::Ident(Ident {
                    name: token.lexeme.clone(),
                    token,
                })
            }
            TokenKind::Number => {
                let token = self.eat();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    Diagnostic::with_token(
                        ErrorKind::SyntaxError,
                        format!("Invalid numeric literal: {}", token.lexeme),
                        &token,
                    )
                })?;
                Expr::Num(NumLit { token, value })
            }
            TokenKind::Str => {
                let token = self.eat();
                Expr::Str(StrLit {
                    value: token.lexeme.clone(),
                    token,
                })
            }
            TokenKind::OpenParen => {
                self.eat();
                let value = self.parse_expr()?;
                self.expect(TokenKind::CloseParen, "Expected closing parentheses")?;
                value
            }
            TokenKind::Bool => {
                let token = self.eat();
                Expr::Bool(BoolLit {
                    value: token.lexeme == "true",
                    token,
                })
            }
            TokenKind::Undefined => Expr::Undef { token: self.eat() },
            TokenKind::Null => Expr::Null { token: self.eat() },
            TokenKind::Eof => Expr::Undef { token: self.eat() },
            _ => {
                let token = self.at(0).clone();
                return Err(Diagnostic::with_token(
                    ErrorKind::SyntaxError,
                    format!("Unexpected token found while parsing: {}", token.lexeme),
                    &token,
                ));
            }
        };

        if matches!(primary, Expr::Ident(_)) && self.at(0).kind == TokenKind::LessThan {
            return self.try_template_call(primary);
        }

        Ok(primary)
    }

    fn parse_array_expr(&mut self) -> ParseResult<Expr> {
        let token = self.eat();

        let mut items = Vec::new();
        if self.at(0).kind == TokenKind::CloseBracket {
            self.eat();
            return Ok(Expr::ArrayLit(ArrayLit { token, items }));
        }

        items.push(self.parse_expr()?);
        while self.at(0).kind == TokenKind::Comma {
            self.eat();
            items.push(self.parse_expr()?);
        }

        self.expect(TokenKind::CloseBracket, "Expected closing bracket")?;
        Ok(Expr::ArrayLit(ArrayLit { token, items }))
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::OpenParen, "Expected open parentheses")?;

        let mut args = Vec::new();
        if self.at(0).kind != TokenKind::CloseParen {
            args.push(self.parse_assignment_expr()?);
            while self.not_eof() && self.at(0).kind == TokenKind::Comma {
                self.eat();
                args.push(self.parse_assignment_expr()?);
            }
        }

        self.expect(TokenKind::CloseParen, "Expected closing parentheses")?;
        Ok(args)
    }

    fn parse_param(&mut self) -> ParseResult<VarDecl> {
        let ident = self.expect(TokenKind::Identifier, "Expected identifier")?;

        let ty = if self.at(0).kind == TokenKind::Colon {
            self.eat();
            Some(self.parse_expr()?)
        } else {
            None
        };

        if self.at(0).kind == TokenKind::Equals {
            let eq = self.eat();
            let value = self.parse_expr()?;
            return Ok(VarDecl {
                token: eq,
                name: ident.lexeme,
                ty,
                value: Some(value),
                is_const: false,
            });
        }

        Ok(VarDecl {
            name: ident.lexeme.clone(),
            token: ident,
            ty,
            value: None,
            is_const: false,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<VarDecl>> {
        self.expect(TokenKind::OpenParen, "Expected parentheses before parameters")?;

        let mut params = Vec::new();
        if self.at(0).kind == TokenKind::CloseParen {
            self.eat();
            return Ok(params);
        }

        params.push(self.parse_param()?);
        while self.at(0).kind == TokenKind::Comma {
            self.eat();
            params.push(self.parse_param()?);
        }

        self.expect(TokenKind::CloseParen, "Expected closing parentheses after parameters")?;
        Ok(params)
    }

    /// Parses a `{ … }` statement list, or a single statement when no brace
    /// follows.
    fn parse_body(&mut self) -> ParseResult<Vec<Stmt>> {
        if self.at(0).kind != TokenKind::OpenBrace {
            return Ok(vec![self.parse_stmt()?]);
        }
        self.eat();

        let mut body = Vec::new();
        while self.at(0).kind != TokenKind::CloseBrace && self.not_eof() {
            body.push(self.parse_stmt()?);
        }

        self.expect(TokenKind::CloseBrace, "Expected closing brace")?;
        Ok(body)
    }

    /// Parses a class or probe body. An identifier followed by `(` or `<`
    /// becomes a method; a bare identifier becomes a field declaration. In a
    /// probe body, a method named like the probe is renamed to `run`.
    fn parse_methods_body(&mut self, probe_name: Option<&str>) -> ParseResult<Vec<Stmt>> {
        if self.at(0).kind != TokenKind::OpenBrace {
            return Ok(vec![self.parse_stmt()?]);
        }
        self.eat();

        let mut body = Vec::new();
        while self.at(0).kind != TokenKind::CloseBrace && self.not_eof() {
            if matches!(self.at(0).kind, TokenKind::Identifier | TokenKind::New) {
                if matches!(self.at(1).kind, TokenKind::OpenParen | TokenKind::LessThan) {
                    let mut func = self.parse_fn_decl(true)?;
                    if probe_name == Some(func.name.as_str()) {
                        func.name = "run".to_string();
                    }
                    body.push(Stmt::FnDecl(Box::new(func)));
                } else {
                    body.push(Stmt::VarDecl(self.parse_var_decl(false, true)?));
                }
                if self.at(0).kind == TokenKind::Semicolon {
                    self.eat();
                }
            } else {
                body.push(self.parse_stmt()?);
            }
        }

        self.expect(TokenKind::CloseBrace, "Expected closing brace")?;
        Ok(body)
    }
}
