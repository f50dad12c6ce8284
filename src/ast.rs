// Lumen Abstract Syntax Tree

use std::fmt;
use std::rc::Rc;

use crate::lexer::Span;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

// ── Literals ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
        }
    }
}

/// Relational operators; a chain like `a < b <= c` is one `Compare` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// The arithmetic behind a compound assignment (`+=` is `Add`).
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
        }
    }
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Ident(String, Span),
    List(Vec<Expr>, Span),
    Dict(Vec<(Expr, Expr)>, Span),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
        span: Span,
    },
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Property {
        object: Box<Expr>,
        name: String,
        span: Span,
    },
    // Anonymous function
    Func(Rc<FuncDecl>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Ident(_, span)
            | Expr::List(_, span)
            | Expr::Dict(_, span) => *span,
            Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Compare { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Property { span, .. } => *span,
            Expr::Func(decl) => decl.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
}

// ── Functions & classes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// Evaluated at call time in the function's defining scope.
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl FuncDecl {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    pub methods: Vec<Rc<FuncDecl>>,
    pub span: Span,
}

// ── Statements ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// `None` for a catch-all clause.
    pub kind: Option<String>,
    pub binding: String,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard,
    Binding(String),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// `import a.b.c` names a module on the search path, `import "x.lm"` a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModulePath {
    Dotted(Vec<String>),
    File(String),
}

impl ModulePath {
    pub fn parse(path: &str) -> ModulePath {
        if path.ends_with(".lm") || path.contains('/') || path.contains('\\') {
            ModulePath::File(path.to_string())
        } else {
            ModulePath::Dotted(path.split('.').map(str::to_string).collect())
        }
    }

    /// Name bound by a plain `import` without `as`.
    pub fn binding_name(&self) -> String {
        match self {
            ModulePath::Dotted(parts) => parts.last().cloned().unwrap_or_default(),
            ModulePath::File(path) => {
                let file = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
                file.strip_suffix(".lm").unwrap_or(file).to_string()
            }
        }
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModulePath::Dotted(parts) => write!(f, "{}", parts.join(".")),
            ModulePath::File(path) => write!(f, "{}", path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        value: Option<Expr>,
        span: Span,
    },
    Const {
        name: String,
        value: Expr,
        span: Span,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    Block(Vec<Stmt>, Span),
    If {
        // `if` followed by any `else if` arms, in source order
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
        span: Span,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Repeat {
        count: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Return(Option<Expr>, Span),
    Throw(Expr, Span),
    Assert {
        condition: Expr,
        message: Option<Expr>,
        span: Span,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
        span: Span,
    },
    Match {
        subject: Expr,
        arms: Vec<MatchArm>,
        span: Span,
    },
    FuncDef(Rc<FuncDecl>),
    ClassDef(Rc<ClassDecl>),
    Import {
        path: ModulePath,
        alias: Option<String>,
        span: Span,
    },
    FromImport {
        path: ModulePath,
        names: Vec<ImportName>,
        span: Span,
    },
    Export(Box<Stmt>, Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(expr) => expr.span(),
            Stmt::FuncDef(decl) => decl.span,
            Stmt::ClassDef(decl) => decl.span,
            Stmt::Block(_, span)
            | Stmt::Break(span)
            | Stmt::Continue(span)
            | Stmt::Return(_, span)
            | Stmt::Throw(_, span)
            | Stmt::Export(_, span) => *span,
            Stmt::Let { span, .. }
            | Stmt::Const { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Repeat { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Match { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::FromImport { span, .. } => *span,
        }
    }

    /// Name introduced by a declaration, if this statement is one.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Stmt::Let { name, .. } | Stmt::Const { name, .. } => Some(name),
            Stmt::FuncDef(decl) => decl.name.as_deref(),
            Stmt::ClassDef(decl) => Some(&decl.name),
            _ => None,
        }
    }
}
