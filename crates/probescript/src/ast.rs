use std::fmt::{self, Display};

use crate::lexer::Token;

/// Binary operators, arithmetic and boolean.
///
/// The boolean family (`And` through `GreaterEq`) always evaluates to a bool
/// and is dispatched separately by both the checker and the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // `+`
    Add,
    // `-`
    Sub,
    // `*`
    Mul,
    // `/`
    Div,
    // `%`
    Mod,
    // `&&`
    And,
    // `||`
    Or,
    // `==`
    Eq,
    // `!=`
    NotEq,
    // `<`
    Less,
    // `>`
    Greater,
    // `<=`
    LessEq,
    // `>=`
    GreaterEq,
}

impl BinaryOp {
    /// Whether this operator always produces a bool.
    #[must_use]
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Eq | Self::NotEq | Self::Less | Self::Greater | Self::LessEq | Self::GreaterEq
        )
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEq => "<=",
            Self::GreaterEq => ">=",
        })
    }
}

/// Assignment operators: plain `=` and the compound arithmetic forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
        })
    }
}

/// Member-assignment operators: the assignment forms plus the postfix steps,
/// which rewrite to member assignments with a synthesized operand of `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Inc,
    Dec,
}

impl From<AssignOp> for MemberAssignOp {
    fn from(op: AssignOp) -> Self {
        match op {
            AssignOp::Assign => Self::Assign,
            AssignOp::Add => Self::Add,
            AssignOp::Sub => Self::Sub,
            AssignOp::Mul => Self::Mul,
            AssignOp::Div => Self::Div,
        }
    }
}

/// Prefix operators. Only `!` computes anything; prefix `++`/`--` evaluate
/// their operand and yield undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Inc,
    Dec,
}

impl Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Not => "!",
            Self::Inc => "++",
            Self::Dec => "--",
        })
    }
}

/// Postfix step operators `++` and `--`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    Inc,
    Dec,
}

impl Display for StepOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inc => "++",
            Self::Dec => "--",
        })
    }
}

/// A statement node. Every variant carries its originating token.
#[derive(Debug, Clone)]
pub enum Stmt {
    Program(Program),
    VarDecl(VarDecl),
    FnDecl(Box<FnDecl>),
    ProbeDecl(Box<ProbeDecl>),
    ClassDecl(Box<ClassDecl>),
    If(Box<IfStmt>),
    While(Box<WhileStmt>),
    For(Box<ForStmt>),
    Return(Box<ReturnStmt>),
    Break { token: Token },
    Continue { token: Token },
    Throw(Box<ThrowStmt>),
    Try(Box<TryStmt>),
    Import(Box<ImportStmt>),
    Export(Box<ExportStmt>),
    ModuleDecl(ModuleDecl),
    Expr(Expr),
}

impl Stmt {
    #[must_use]
    pub fn token(&self) -> &Token {
        match self {
            Self::Program(s) => &s.token,
            Self::VarDecl(s) => &s.token,
            Self::FnDecl(s) => &s.token,
            Self::ProbeDecl(s) => &s.token,
            Self::ClassDecl(s) => &s.token,
            Self::If(s) => &s.token,
            Self::While(s) => &s.token,
            Self::For(s) => &s.token,
            Self::Return(s) => &s.token,
            Self::Break { token } | Self::Continue { token } => token,
            Self::Throw(s) => &s.token,
            Self::Try(s) => &s.token,
            Self::Import(s) => &s.token,
            Self::Export(s) => &s.token,
            Self::ModuleDecl(s) => &s.token,
            Self::Expr(e) => e.token(),
        }
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Num(NumLit),
    Str(StrLit),
    Bool(BoolLit),
    Null { token: Token },
    Undef { token: Token },
    Ident(Ident),
    BinOp(Box<BinExpr>),
    UnaryPrefix(Box<UnaryPrefix>),
    UnaryPostfix(Box<UnaryPostfix>),
    Ternary(Box<Ternary>),
    Assign(Box<AssignExpr>),
    MemberAccess(Box<MemberAccess>),
    MemberAssign(Box<MemberAssign>),
    Call(Box<CallExpr>),
    TemplateCall(Box<TemplateCall>),
    New(Box<NewExpr>),
    ArrayLit(ArrayLit),
    MapLit(MapLit),
    Arrow(Box<ArrowFn>),
    Await(Box<AwaitExpr>),
    Cast(Box<CastExpr>),
}

impl Expr {
    #[must_use]
    pub fn token(&self) -> &Token {
        match self {
            Self::Num(e) => &e.token,
            Self::Str(e) => &e.token,
            Self::Bool(e) => &e.token,
            Self::Null { token } | Self::Undef { token } => token,
            Self::Ident(e) => &e.token,
            Self::BinOp(e) => &e.token,
            Self::UnaryPrefix(e) => &e.token,
            Self::UnaryPostfix(e) => &e.token,
            Self::Ternary(e) => &e.token,
            Self::Assign(e) => &e.token,
            Self::MemberAccess(e) => &e.token,
            Self::MemberAssign(e) => &e.token,
            Self::Call(e) => &e.token,
            Self::TemplateCall(e) => &e.token,
            Self::New(e) => &e.token,
            Self::ArrayLit(e) => &e.token,
            Self::MapLit(e) => &e.token,
            Self::Arrow(e) => &e.token,
            Self::Await(e) => &e.token,
            Self::Cast(e) => &e.token,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub token: Token,
    pub body: Vec<Stmt>,
}

/// A variable declaration. Also used for function parameters, where `value`
/// holds the default expression and `ty` the optional static annotation.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub token: Token,
    pub name: String,
    pub ty: Option<Expr>,
    pub value: Option<Expr>,
    pub is_const: bool,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub token: Token,
    pub name: String,
    pub params: Vec<VarDecl>,
    pub template_params: Vec<VarDecl>,
    pub return_type: Option<Expr>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct ProbeDecl {
    pub token: Token,
    pub name: String,
    pub body: Vec<Stmt>,
    pub extends: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub token: Token,
    pub name: String,
    pub body: Vec<Stmt>,
    pub extends: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub token: Token,
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub token: Token,
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// `for (inits; conditions; updates) body`. Each clause is a comma-separated
/// list: var-declarations, then expressions, then expressions.
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub token: Token,
    pub inits: Vec<Stmt>,
    pub conditions: Vec<Expr>,
    pub updates: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub token: Token,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub token: Token,
    pub value: Expr,
}

/// The catch half of a try statement; invoked as a handler function with the
/// thrown message as its argument.
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub token: Token,
    pub params: Vec<VarDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub token: Token,
    pub body: Vec<Stmt>,
    pub catch: CatchClause,
}

/// `import name`, `import name as alias`, or the member form
/// `import name.path.to.thing [as alias]`.
#[derive(Debug, Clone)]
pub struct ImportStmt {
    pub token: Token,
    pub name: String,
    /// The full member chain for member-form imports.
    pub member: Option<Expr>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportStmt {
    pub token: Token,
    pub value: Box<Stmt>,
}

/// A `module <name>` header line designating the file as a project module.
#[derive(Debug, Clone)]
pub struct ModuleDecl {
    pub token: Token,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NumLit {
    pub token: Token,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct StrLit {
    pub token: Token,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct BoolLit {
    pub token: Token,
    pub value: bool,
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub token: Token,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct BinExpr {
    pub token: Token,
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone)]
pub struct UnaryPrefix {
    pub token: Token,
    pub op: PrefixOp,
    pub operand: Expr,
}

#[derive(Debug, Clone)]
pub struct UnaryPostfix {
    pub token: Token,
    pub op: StepOp,
    pub operand: Expr,
}

#[derive(Debug, Clone)]
pub struct Ternary {
    pub token: Token,
    pub condition: Expr,
    pub consequent: Expr,
    pub alternate: Expr,
}

#[derive(Debug, Clone)]
pub struct AssignExpr {
    pub token: Token,
    pub op: AssignOp,
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct MemberAccess {
    pub token: Token,
    pub object: Expr,
    pub property: Expr,
    pub computed: bool,
    /// The property name when statically known (dotted access or a string
    /// literal subscript); used for import binding and error messages.
    pub last_prop: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemberAssign {
    pub token: Token,
    pub object: Expr,
    pub property: Expr,
    pub computed: bool,
    pub value: Expr,
    pub op: MemberAssignOp,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub token: Token,
    pub callee: Expr,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct TemplateCall {
    pub token: Token,
    pub callee: Expr,
    pub template_args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct NewExpr {
    pub token: Token,
    pub ctor: Expr,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct ArrayLit {
    pub token: Token,
    pub items: Vec<Expr>,
}

/// One `key: value` entry of a map literal. A missing value is the shorthand
/// form `{ key }`, which reads `key` from the enclosing scope.
#[derive(Debug, Clone)]
pub struct Property {
    pub token: Token,
    pub key: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct MapLit {
    pub token: Token,
    pub properties: Vec<Property>,
}

/// `fn(params) => expr` or `fn(params) { stmts }`, a first-class function
/// value that is not bound to a name.
#[derive(Debug, Clone)]
pub struct ArrowFn {
    pub token: Token,
    pub params: Vec<VarDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct AwaitExpr {
    pub token: Token,
    pub operand: Expr,
}

#[derive(Debug, Clone)]
pub struct CastExpr {
    pub token: Token,
    pub operand: Expr,
    pub target: Expr,
}
