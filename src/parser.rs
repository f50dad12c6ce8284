// ═══════════════════════════════════════════════════════════
// Lumen Parser: turns tokens into AST
// ═══════════════════════════════════════════════════════════

use std::rc::Rc;

use log::trace;

use crate::ast::*;
use crate::error::{LumenError, ParseError};
use crate::lexer::{self, Span, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;

type PResult<T> = Result<T, ParseError>;

// Deepest syntax tree the parser builds; evaluation, printing and drop all
// recurse over it.
const MAX_NESTING: usize = 1000;

/// Parse a full token stream (ending in `Eof`) into a program.
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

/// Lex and parse in one step.
pub fn parse_source(source: &str) -> Result<Program, LumenError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse(tokens)?)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loop_depth: usize,
    func_depth: usize,
    block_depth: usize,
    nesting: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }
        Parser { tokens, pos: 0, loop_depth: 0, func_depth: 0, block_depth: 0, nesting: 0 }
    }

    // ── Token navigation ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek2_kind(&self) -> TokenKind {
        self.tokens.get(self.pos + 1).map_or(TokenKind::Eof, |t| t.kind)
    }

    fn span(&self) -> Span {
        self.peek().span()
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn found(&self) -> String {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Ident => format!("identifier '{}'", tok.text),
            TokenKind::Int | TokenKind::Float => format!("number {}", tok.text),
            TokenKind::Str => "string literal".to_string(),
            kind => kind.describe().to_string(),
        }
    }

    fn error_expected(&self, expected: &[TokenKind], context: &str) -> ParseError {
        let wanted = match expected {
            [one] => one.describe().to_string(),
            many => many.iter().map(|k| k.describe()).collect::<Vec<_>>().join(" or "),
        };
        let message = if context.is_empty() {
            format!("expected {}, found {}", wanted, self.found())
        } else {
            format!("expected {} {}, found {}", wanted, context, self.found())
        };
        ParseError::new(message, self.span()).expecting(expected.to_vec())
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(&[kind], context))
        }
    }

    fn expect_ident(&mut self, context: &str) -> PResult<String> {
        Ok(self.expect(TokenKind::Ident, context)?.text)
    }

    /// A simple statement ends at `;`, or just before a closing `}` or end of input.
    fn expect_terminator(&mut self) -> PResult<()> {
        if self.eat(TokenKind::Semicolon) || self.check(TokenKind::RBrace) || self.check(TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_expected(&[TokenKind::Semicolon], "after statement"))
        }
    }

    fn deepen(&mut self) -> PResult<()> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::new(
                format!("code is nested too deeply (more than {} levels)", MAX_NESTING),
                self.span(),
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    /// Parse one level further down the tree.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.deepen()?;
        let result = ensure_sufficient_stack(|| f(self));
        self.nesting -= 1;
        result
    }

    // ── Top-level parsing ─────────────────────────────────────────────────────

    pub fn parse_program(&mut self) -> PResult<Program> {
        let statements = self.parse_statements()?;
        if !self.check(TokenKind::Eof) {
            return Err(ParseError::new(format!("unexpected {}", self.found()), self.span()));
        }
        trace!("parsed {} top-level statements", statements.len());
        Ok(Program { statements })
    }

    fn parse_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(TokenKind::Semicolon) {}
            if self.check(TokenKind::RBrace) || self.check(TokenKind::Eof) {
                return Ok(stmts);
            }
            stmts.push(self.parse_stmt()?);
        }
    }

    fn parse_block(&mut self, context: &str) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, context)?;
        self.block_depth += 1;
        let body = self.nested(Self::parse_statements);
        self.block_depth -= 1;
        let body = body?;
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(body)
    }

    fn parse_loop_body(&mut self, context: &str) -> PResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_block(context);
        self.loop_depth -= 1;
        body
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            TokenKind::LBrace => {
                let span = self.span();
                Ok(Stmt::Block(self.parse_block("")?, span))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Class => Ok(Stmt::ClassDef(self.parse_class()?)),
            TokenKind::Func if self.peek2_kind() == TokenKind::Ident => {
                Ok(Stmt::FuncDef(self.parse_func_decl(true)?))
            }
            TokenKind::Export => self.parse_export(),
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect_terminator()?;
                Ok(stmt)
            }
        }
    }

    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let span = self.span();
        match self.peek_kind() {
            TokenKind::Let => {
                self.advance();
                let name = self.expect_ident("after 'let'")?;
                let value = if self.eat(TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
                Ok(Stmt::Let { name, value, span })
            }
            TokenKind::Const => {
                self.advance();
                let name = self.expect_ident("after 'const'")?;
                self.expect(TokenKind::Eq, "after constant name (constants need a value)")?;
                let value = self.parse_expr()?;
                Ok(Stmt::Const { name, value, span })
            }
            TokenKind::Return => {
                if self.func_depth == 0 {
                    return Err(ParseError::new("'return' outside of a function", span));
                }
                self.advance();
                let value = if self.at_terminator() { None } else { Some(self.parse_expr()?) };
                Ok(Stmt::Return(value, span))
            }
            TokenKind::Break | TokenKind::Continue => {
                let tok = self.advance();
                if self.loop_depth == 0 {
                    return Err(ParseError::new(format!("'{}' outside of a loop", tok.text), span));
                }
                Ok(if tok.kind == TokenKind::Break { Stmt::Break(span) } else { Stmt::Continue(span) })
            }
            TokenKind::Throw => {
                self.advance();
                Ok(Stmt::Throw(self.parse_expr()?, span))
            }
            TokenKind::Assert => {
                self.advance();
                let condition = self.parse_expr()?;
                let message = if self.eat(TokenKind::Comma) { Some(self.parse_expr()?) } else { None };
                Ok(Stmt::Assert { condition, message, span })
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_from_import(),
            _ => self.parse_expr_or_assign(),
        }
    }

    fn at_terminator(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof)
    }

    fn parse_expr_or_assign(&mut self) -> PResult<Stmt> {
        let span = self.span();
        let target = self.parse_expr()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => AssignOp::Set,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::PercentEq => AssignOp::Mod,
            _ => return Ok(Stmt::Expr(target)),
        };
        if !matches!(target, Expr::Ident(..) | Expr::Index { .. } | Expr::Property { .. }) {
            return Err(ParseError::new("invalid assignment target", target.span()));
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(Stmt::Assign { target, op, value, span })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.expect(TokenKind::If, "")?;
        let mut branches = Vec::new();
        let condition = self.parse_expr()?;
        branches.push((condition, self.parse_block("after 'if' condition")?));
        let mut else_body = None;
        while self.eat(TokenKind::Else) {
            if self.eat(TokenKind::If) {
                let condition = self.parse_expr()?;
                branches.push((condition, self.parse_block("after 'else if' condition")?));
            } else {
                else_body = Some(self.parse_block("after 'else'")?);
                break;
            }
        }
        Ok(Stmt::If { branches, else_body, span })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let condition = self.parse_expr()?;
        let body = self.parse_loop_body("after 'while' condition")?;
        Ok(Stmt::While { condition, body, span })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let var = self.expect_ident("after 'for'")?;
        self.expect(TokenKind::In, "after loop variable")?;
        let iterable = self.parse_expr()?;
        let body = self.parse_loop_body("after 'for' header")?;
        Ok(Stmt::For { var, iterable, body, span })
    }

    fn parse_repeat(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let count = self.parse_expr()?;
        let body = self.parse_loop_body("after 'repeat' count")?;
        Ok(Stmt::Repeat { count, body, span })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let body = self.parse_block("after 'try'")?;
        let mut catches: Vec<CatchClause> = Vec::new();
        while self.check(TokenKind::Catch) {
            let clause_span = self.span();
            self.advance();
            let first = self.expect_ident("after 'catch'")?;
            let (kind, binding) = if self.eat(TokenKind::As) {
                (Some(first), self.expect_ident("after 'as'")?)
            } else {
                (None, first)
            };
            if kind.is_none() && catches.iter().any(|c| c.kind.is_none()) {
                return Err(ParseError::new("only one catch-all clause is allowed per 'try'", clause_span));
            }
            let body = self.parse_block("after catch clause")?;
            catches.push(CatchClause { kind, binding, body, span: clause_span });
        }
        let finally = if self.eat(TokenKind::Finally) { Some(self.parse_block("after 'finally'")?) } else { None };
        if catches.is_empty() && finally.is_none() {
            return Err(self.error_expected(&[TokenKind::Catch, TokenKind::Finally], "after 'try' block"));
        }
        Ok(Stmt::Try { body, catches, finally, span })
    }

    fn parse_match(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let subject = self.parse_expr()?;
        self.expect(TokenKind::LBrace, "after 'match' subject")?;
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let arm_span = self.span();
            let mut patterns = vec![self.parse_pattern()?];
            while self.eat(TokenKind::Pipe) {
                patterns.push(self.parse_pattern()?);
            }
            let guard = if self.eat(TokenKind::If) { Some(self.parse_expr()?) } else { None };
            self.expect(TokenKind::FatArrow, "after match pattern")?;
            let body = self.parse_block("for match arm")?;
            self.eat(TokenKind::Comma);
            arms.push(MatchArm { patterns, guard, body, span: arm_span });
        }
        self.expect(TokenKind::RBrace, "to close 'match'")?;
        Ok(Stmt::Match { subject, arms, span })
    }

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        let tok = self.peek().clone();
        let pattern = match tok.kind {
            TokenKind::Ident if tok.text == "_" => Pattern::Wildcard,
            TokenKind::Ident => Pattern::Binding(tok.text),
            TokenKind::Int | TokenKind::Float | TokenKind::Str | TokenKind::True | TokenKind::False | TokenKind::Null => {
                Pattern::Literal(self.literal_of(&tok)?)
            }
            TokenKind::Minus => {
                self.advance();
                let num = self.peek().clone();
                return match self.literal_of(&num)? {
                    Literal::Int(n) => {
                        self.advance();
                        Ok(Pattern::Literal(Literal::Int(-n)))
                    }
                    Literal::Float(f) => {
                        self.advance();
                        Ok(Pattern::Literal(Literal::Float(-f)))
                    }
                    _ => Err(self.error_expected(&[TokenKind::Int, TokenKind::Float], "after '-' in pattern")),
                };
            }
            _ => {
                return Err(ParseError::new(format!("expected a pattern, found {}", self.found()), tok.span())
                    .expecting(vec![TokenKind::Ident, TokenKind::Int, TokenKind::Str]))
            }
        };
        self.advance();
        Ok(pattern)
    }

    fn literal_of(&self, tok: &Token) -> PResult<Literal> {
        Ok(match tok.kind {
            TokenKind::Int => Literal::Int(
                tok.text.parse().map_err(|_| ParseError::new("invalid integer literal", tok.span()))?,
            ),
            TokenKind::Float => Literal::Float(
                tok.text.parse().map_err(|_| ParseError::new("invalid float literal", tok.span()))?,
            ),
            TokenKind::Str => Literal::Str(tok.text.clone()),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::Null => Literal::Null,
            _ => return Err(ParseError::new(format!("expected a literal, found {}", self.found()), tok.span())),
        })
    }

    fn parse_func_decl(&mut self, named: bool) -> PResult<Rc<FuncDecl>> {
        let span = self.span();
        self.expect(TokenKind::Func, "")?;
        let name = if named { Some(self.expect_ident("after 'func'")?) } else { None };
        self.expect(TokenKind::LParen, "to open parameter list")?;
        let mut params: Vec<Param> = Vec::new();
        while !self.check(TokenKind::RParen) {
            let param_span = self.span();
            let pname = self.expect_ident("in parameter list")?;
            if params.iter().any(|p| p.name == pname) {
                return Err(ParseError::new(format!("duplicate parameter '{}'", pname), param_span));
            }
            let default = if self.eat(TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                return Err(ParseError::new(
                    format!("parameter '{}' without a default follows a parameter with one", pname),
                    param_span,
                ));
            }
            params.push(Param { name: pname, default });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.func_depth += 1;
        let body = self.parse_block("for function body");
        self.func_depth -= 1;
        self.loop_depth = saved_loops;

        Ok(Rc::new(FuncDecl { name, params, body: body?, span }))
    }

    fn parse_class(&mut self) -> PResult<Rc<ClassDecl>> {
        let span = self.span();
        self.advance();
        let name = self.expect_ident("after 'class'")?;
        let parent = if self.eat(TokenKind::Extends) { Some(self.expect_ident("after 'extends'")?) } else { None };
        self.expect(TokenKind::LBrace, "to open class body")?;
        let mut methods: Vec<Rc<FuncDecl>> = Vec::new();
        loop {
            while self.eat(TokenKind::Semicolon) {}
            match self.peek_kind() {
                TokenKind::RBrace => break,
                TokenKind::Func => {
                    let method = self.parse_func_decl(true)?;
                    if methods.iter().any(|m| m.name == method.name) {
                        return Err(ParseError::new(
                            format!("duplicate method '{}' in class '{}'", method.display_name(), name),
                            method.span,
                        ));
                    }
                    methods.push(method);
                }
                _ => {
                    return Err(ParseError::new(
                        format!(
                            "class bodies may only contain methods, found {}; initialise fields inside 'init' (e.g. self.x = x)",
                            self.found()
                        ),
                        self.span(),
                    )
                    .expecting(vec![TokenKind::Func, TokenKind::RBrace]))
                }
            }
        }
        self.expect(TokenKind::RBrace, "to close class body")?;
        Ok(Rc::new(ClassDecl { name, parent, methods, span }))
    }

    fn parse_export(&mut self) -> PResult<Stmt> {
        let span = self.span();
        if self.block_depth > 0 || self.func_depth > 0 {
            return Err(ParseError::new("'export' is only allowed at the top level of a module", span));
        }
        self.advance();
        let inner = match self.peek_kind() {
            TokenKind::Func => Stmt::FuncDef(self.parse_func_decl(true)?),
            TokenKind::Class => Stmt::ClassDef(self.parse_class()?),
            TokenKind::Let | TokenKind::Const => {
                let stmt = self.parse_simple_stmt()?;
                self.expect_terminator()?;
                stmt
            }
            _ => {
                return Err(self.error_expected(
                    &[TokenKind::Let, TokenKind::Const, TokenKind::Func, TokenKind::Class],
                    "after 'export'",
                ))
            }
        };
        Ok(Stmt::Export(Box::new(inner), span))
    }

    fn parse_module_path(&mut self) -> PResult<ModulePath> {
        if self.check(TokenKind::Str) {
            return Ok(ModulePath::File(self.advance().text));
        }
        let mut parts = vec![self.expect_ident("as module name")?];
        while self.eat(TokenKind::Dot) {
            parts.push(self.expect_ident("after '.' in module path")?);
        }
        Ok(ModulePath::Dotted(parts))
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let path = self.parse_module_path()?;
        let alias = if self.eat(TokenKind::As) { Some(self.expect_ident("after 'as'")?) } else { None };
        Ok(Stmt::Import { path, alias, span })
    }

    fn parse_from_import(&mut self) -> PResult<Stmt> {
        let span = self.span();
        self.advance();
        let path = self.parse_module_path()?;
        self.expect(TokenKind::Import, "after module path")?;
        let mut names = Vec::new();
        loop {
            let name = self.expect_ident("in import list")?;
            let alias = if self.eat(TokenKind::As) { Some(self.expect_ident("after 'as'")?) } else { None };
            names.push(ImportName { name, alias });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(Stmt::FromImport { path, names, span })
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_or)
    }

    // Each operator in a chain adds a level to the left spine.
    fn parse_or(&mut self) -> PResult<Expr> {
        let outer = self.nesting;
        let mut left = self.parse_and()?;
        while self.check(TokenKind::OrOr) {
            self.deepen()?;
            let span = self.advance().span();
            let right = self.parse_and()?;
            left = Expr::Logical { left: Box::new(left), op: LogicalOp::Or, right: Box::new(right), span };
        }
        self.nesting = outer;
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let outer = self.nesting;
        let mut left = self.parse_equality()?;
        while self.check(TokenKind::AndAnd) {
            self.deepen()?;
            let span = self.advance().span();
            let right = self.parse_equality()?;
            left = Expr::Logical { left: Box::new(left), op: LogicalOp::And, right: Box::new(right), span };
        }
        self.nesting = outer;
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let outer = self.nesting;
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => {
                    self.nesting = outer;
                    return Ok(left);
                }
            };
            self.deepen()?;
            let span = self.advance().span();
            let right = self.parse_relational()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), span };
        }
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();
        let mut span = None;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::LtEq => CompareOp::LtEq,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::GtEq => CompareOp::GtEq,
                _ => break,
            };
            let op_span = self.advance().span();
            span.get_or_insert(op_span);
            rest.push((op, self.parse_additive()?));
        }
        match span {
            None => Ok(first),
            Some(span) => Ok(Expr::Compare { first: Box::new(first), rest, span }),
        }
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let outer = self.nesting;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.nesting = outer;
                    return Ok(left);
                }
            };
            self.deepen()?;
            let span = self.advance().span();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), span };
        }
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let outer = self.nesting;
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.nesting = outer;
                    return Ok(left);
                }
            };
            self.deepen()?;
            let span = self.advance().span();
            let right = self.parse_power()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right), span };
        }
    }

    // `**` is right-associative and binds looser than unary: -2 ** 2 == 4
    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_unary()?;
        if self.check(TokenKind::StarStar) {
            let span = self.advance().span();
            let exponent = self.nested(Self::parse_power)?;
            return Ok(Expr::Binary { left: Box::new(base), op: BinaryOp::Pow, right: Box::new(exponent), span });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let span = self.advance().span();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary { op, operand: Box::new(operand), span })
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let outer = self.nesting;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek_kind(), TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot) {
                self.deepen()?;
            }
            match self.peek_kind() {
                TokenKind::LParen => {
                    let span = self.advance().span();
                    let args = self.parse_args()?;
                    expr = Expr::Call { callee: Box::new(expr), args, span };
                }
                TokenKind::LBracket => {
                    let span = self.advance().span();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "to close index")?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index), span };
                }
                TokenKind::Dot => {
                    let span = self.advance().span();
                    let name = self.expect_ident("after '.'")?;
                    expr = Expr::Property { object: Box::new(expr), name, span };
                }
                _ => {
                    self.nesting = outer;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        let mut seen_keyword = false;
        while !self.check(TokenKind::RParen) {
            if self.check(TokenKind::Ident) && self.peek2_kind() == TokenKind::Eq {
                let name = self.advance().text;
                self.advance();
                if args.iter().any(|a| matches!(a, Arg::Keyword(n, _) if *n == name)) {
                    return Err(ParseError::new(format!("keyword argument '{}' repeated", name), self.span()));
                }
                args.push(Arg::Keyword(name, self.parse_expr()?));
                seen_keyword = true;
            } else {
                let span = self.span();
                let value = self.parse_expr()?;
                if seen_keyword {
                    return Err(ParseError::new("positional argument follows keyword argument", span));
                }
                args.push(Arg::Positional(value));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "to close argument list")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        let span = tok.span();
        match tok.kind {
            TokenKind::Int | TokenKind::Float | TokenKind::Str | TokenKind::True | TokenKind::False | TokenKind::Null => {
                let lit = self.literal_of(&tok)?;
                self.advance();
                Ok(Expr::Literal(lit, span))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Ident(tok.text, span))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "to close parenthesised expression")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "to close list literal")?;
                Ok(Expr::List(items, span))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon, "after dictionary key")?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "to close dictionary literal")?;
                Ok(Expr::Dict(entries, span))
            }
            TokenKind::Func => Ok(Expr::Func(self.parse_func_decl(false)?)),
            _ => Err(ParseError::new(format!("expected an expression, found {}", self.found()), span)
                .expecting(vec![TokenKind::Ident, TokenKind::Int, TokenKind::Str, TokenKind::LParen])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_str(src: &str) -> Result<Program, ParseError> {
        parse(lexer::tokenize(src).expect("lex"))
    }

    fn parse_err(src: &str) -> ParseError {
        parse_str(src).expect_err("expected a parse error")
    }

    fn only_expr(src: &str) -> Expr {
        let program = parse_str(src).expect("parse");
        match program.statements.into_iter().next() {
            Some(Stmt::Expr(e)) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn semicolon_optional_before_closing_brace_and_eof() {
        let program = parse_str("if true { let a = 1 }\nlet b = 2").expect("parse");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn missing_semicolon_between_statements() {
        let err = parse_err("let a = 1 let b = 2");
        assert_eq!((err.line, err.column), (1, 11));
        assert_eq!(err.expected, vec![TokenKind::Semicolon]);
        assert!(err.message.contains("expected ';'"), "{}", err.message);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match only_expr("1 + 2 * 3;") {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn power_is_right_associative_and_looser_than_negation() {
        match only_expr("-2 ** 3 ** 2;") {
            Expr::Binary { op: BinaryOp::Pow, left, right, .. } => {
                assert!(matches!(*left, Expr::Unary { op: UnaryOp::Neg, .. }));
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn relational_chain_is_a_single_node() {
        match only_expr("a < b <= c;") {
            Expr::Compare { rest, .. } => {
                let ops: Vec<CompareOp> = rest.iter().map(|(op, _)| *op).collect();
                assert_eq!(ops, vec![CompareOp::Lt, CompareOp::LtEq]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn keyword_arguments() {
        match only_expr("add(2, b = 5);") {
            Expr::Call { args, .. } => {
                assert!(matches!(&args[0], Arg::Positional(_)));
                assert!(matches!(&args[1], Arg::Keyword(name, _) if name == "b"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let err = parse_err("f(a = 1, 2);");
        assert!(err.message.contains("positional argument follows keyword"));
    }

    #[test]
    fn compound_assignment_targets() {
        let program = parse_str("xs[0] += 1; obj.count -= 2; n *= 3;").expect("parse");
        let ops: Vec<AssignOp> = program
            .statements
            .iter()
            .map(|s| match s {
                Stmt::Assign { op, .. } => *op,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(ops, vec![AssignOp::Add, AssignOp::Sub, AssignOp::Mul]);
        let err = parse_err("f() = 3;");
        assert_eq!(err.message, "invalid assignment target");
    }

    #[test]
    fn control_flow_context_is_checked() {
        assert!(parse_err("break;").message.contains("outside of a loop"));
        assert!(parse_err("return 1;").message.contains("outside of a function"));
        // a function body resets loop context
        assert!(parse_err("while true { func f() { continue; } }").message.contains("outside of a loop"));
        assert!(parse_str("func f() { while true { break; } return 1; }").is_ok());
    }

    #[test]
    fn try_catch_clauses() {
        let program = parse_str("try { x(); } catch IndexError as e { } catch e { } finally { }").expect("parse");
        match &program.statements[0] {
            Stmt::Try { catches, finally, .. } => {
                assert_eq!(catches[0].kind.as_deref(), Some("IndexError"));
                assert_eq!(catches[1].kind, None);
                assert_eq!(catches[1].binding, "e");
                assert!(finally.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        let err = parse_err("try { }");
        assert_eq!(err.expected, vec![TokenKind::Catch, TokenKind::Finally]);
    }

    #[test]
    fn class_body_rejects_fields() {
        let err = parse_err("class P { let x = 1; }");
        assert!(err.message.contains("initialise fields inside 'init'"), "{}", err.message);
    }

    #[test]
    fn match_arms_with_alternatives_and_guards() {
        let src = "match n { 0 | 1 => { print(\"small\"); }, -1 => { }, x if x > 10 => { }, _ => { } }";
        match &parse_str(src).expect("parse").statements[0] {
            Stmt::Match { arms, .. } => {
                assert_eq!(arms.len(), 4);
                assert_eq!(arms[0].patterns.len(), 2);
                assert_eq!(arms[1].patterns, vec![Pattern::Literal(Literal::Int(-1))]);
                assert!(arms[2].guard.is_some());
                assert_eq!(arms[3].patterns, vec![Pattern::Wildcard]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn imports() {
        let program = parse_str("import a.b as c; from \"lib/util.lm\" import x, y as z;").expect("parse");
        assert_eq!(
            program.statements[0],
            Stmt::Import {
                path: ModulePath::Dotted(vec!["a".into(), "b".into()]),
                alias: Some("c".into()),
                span: Span::new(1, 1),
            }
        );
        match &program.statements[1] {
            Stmt::FromImport { path, names, .. } => {
                assert_eq!(path, &ModulePath::File("lib/util.lm".into()));
                assert_eq!(names[1].alias.as_deref(), Some("z"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn export_only_at_top_level() {
        assert!(parse_str("export func f() { } export const X = 1;").is_ok());
        assert!(parse_err("{ export let x = 1; }").message.contains("top level"));
    }

    #[test]
    fn default_parameters_must_trail() {
        assert!(parse_str("func f(a, b = 2) { }").is_ok());
        assert!(parse_err("func f(a = 1, b) { }").message.contains("without a default"));
    }

    #[test]
    fn anonymous_function_expression() {
        let program = parse_str("let f = func(x) { return x; };").expect("parse");
        match &program.statements[0] {
            Stmt::Let { value: Some(Expr::Func(decl)), .. } => assert!(decl.name.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(parse_err(&deep).message.contains("nested too deeply"));

        let chain = format!("1{}", " + 1".repeat(100_000));
        assert!(parse_err(&chain).message.contains("nested too deeply"));

        let blocks = format!("{}{}", "if true { ".repeat(5_000), "}".repeat(5_000));
        assert!(parse_err(&blocks).message.contains("nested too deeply"));

        let fine = format!("{}x{}", "(-".repeat(300), ")".repeat(300));
        assert!(parse_str(&fine).is_ok());
        assert!(parse_str(&format!("1{}", " * 2".repeat(500))).is_ok());
    }
}
