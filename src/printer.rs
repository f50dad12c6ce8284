// ── AST printer ───────────────────────────────────────────────────────────────
//
// Turns a `Program` back into source. Operator expressions are fully
// parenthesised so the output re-parses to the same tree regardless of
// precedence; only spans differ.

use crate::ast::{
    Arg, CatchClause, Expr, FuncDecl, ImportName, Literal, LogicalOp, MatchArm, ModulePath, Param, Pattern,
    Program, Stmt, UnaryOp,
};

const INDENT: &str = "    ";

pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::default();
    for stmt in &program.statements {
        printer.stmt(stmt);
    }
    printer.out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    // `{ ... }` with the closing brace on its own line; no trailing newline.
    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.push("{ }");
            return;
        }
        self.push("{\n");
        self.depth += 1;
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
        self.line_start();
        self.push("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        self.stmt_inline(stmt);
        self.push("\n");
    }

    fn stmt_inline(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, value, .. } => {
                self.push("let ");
                self.push(name);
                if let Some(value) = value {
                    self.push(" = ");
                    self.expr(value);
                }
                self.push(";");
            }
            Stmt::Const { name, value, .. } => {
                self.push("const ");
                self.push(name);
                self.push(" = ");
                self.expr(value);
                self.push(";");
            }
            Stmt::Assign { target, op, value, .. } => {
                self.expr(target);
                self.push(" ");
                self.push(op.symbol());
                self.push(" ");
                self.expr(value);
                self.push(";");
            }
            Stmt::Expr(expr) => {
                // a leading `{` would open a block
                let text = print_expr(expr);
                if text.starts_with('{') || matches!(expr, Expr::Func(_)) {
                    self.push("(");
                    self.push(&text);
                    self.push(")");
                } else {
                    self.push(&text);
                }
                self.push(";");
            }
            Stmt::Block(body, _) => self.block(body),
            Stmt::If { branches, else_body, .. } => {
                for (i, (condition, body)) in branches.iter().enumerate() {
                    self.push(if i == 0 { "if " } else { " else if " });
                    self.expr(condition);
                    self.push(" ");
                    self.block(body);
                }
                if let Some(body) = else_body {
                    self.push(" else ");
                    self.block(body);
                }
            }
            Stmt::While { condition, body, .. } => {
                self.push("while ");
                self.expr(condition);
                self.push(" ");
                self.block(body);
            }
            Stmt::For { var, iterable, body, .. } => {
                self.push("for ");
                self.push(var);
                self.push(" in ");
                self.expr(iterable);
                self.push(" ");
                self.block(body);
            }
            Stmt::Repeat { count, body, .. } => {
                self.push("repeat ");
                self.expr(count);
                self.push(" ");
                self.block(body);
            }
            Stmt::Break(_) => self.push("break;"),
            Stmt::Continue(_) => self.push("continue;"),
            Stmt::Return(value, _) => {
                self.push("return");
                if let Some(value) = value {
                    self.push(" ");
                    self.expr(value);
                }
                self.push(";");
            }
            Stmt::Throw(value, _) => {
                self.push("throw ");
                self.expr(value);
                self.push(";");
            }
            Stmt::Assert { condition, message, .. } => {
                self.push("assert ");
                self.expr(condition);
                if let Some(message) = message {
                    self.push(", ");
                    self.expr(message);
                }
                self.push(";");
            }
            Stmt::Try { body, catches, finally, .. } => {
                self.push("try ");
                self.block(body);
                for clause in catches {
                    self.catch_clause(clause);
                }
                if let Some(body) = finally {
                    self.push(" finally ");
                    self.block(body);
                }
            }
            Stmt::Match { subject, arms, .. } => {
                self.push("match ");
                self.expr(subject);
                self.push(" {\n");
                self.depth += 1;
                for arm in arms {
                    self.match_arm(arm);
                }
                self.depth -= 1;
                self.line_start();
                self.push("}");
            }
            Stmt::FuncDef(decl) => self.func(decl),
            Stmt::ClassDef(decl) => {
                self.push("class ");
                self.push(&decl.name);
                if let Some(parent) = &decl.parent {
                    self.push(" extends ");
                    self.push(parent);
                }
                if decl.methods.is_empty() {
                    self.push(" { }");
                    return;
                }
                self.push(" {\n");
                self.depth += 1;
                for method in &decl.methods {
                    self.line_start();
                    self.func(method);
                    self.push("\n");
                }
                self.depth -= 1;
                self.line_start();
                self.push("}");
            }
            Stmt::Import { path, alias, .. } => {
                self.push("import ");
                self.module_path(path);
                if let Some(alias) = alias {
                    self.push(" as ");
                    self.push(alias);
                }
                self.push(";");
            }
            Stmt::FromImport { path, names, .. } => {
                self.push("from ");
                self.module_path(path);
                self.push(" import ");
                self.import_names(names);
                self.push(";");
            }
            Stmt::Export(inner, _) => {
                self.push("export ");
                self.stmt_inline(inner);
            }
        }
    }

    fn catch_clause(&mut self, clause: &CatchClause) {
        self.push(" catch ");
        if let Some(kind) = &clause.kind {
            self.push(kind);
            self.push(" as ");
        }
        self.push(&clause.binding);
        self.push(" ");
        self.block(&clause.body);
    }

    fn match_arm(&mut self, arm: &MatchArm) {
        self.line_start();
        for (i, pattern) in arm.patterns.iter().enumerate() {
            if i > 0 {
                self.push(" | ");
            }
            match pattern {
                Pattern::Wildcard => self.push("_"),
                Pattern::Binding(name) => self.push(name),
                Pattern::Literal(lit) => self.literal(lit),
            }
        }
        if let Some(guard) = &arm.guard {
            self.push(" if ");
            self.expr(guard);
        }
        self.push(" => ");
        self.block(&arm.body);
        self.push(",\n");
    }

    fn module_path(&mut self, path: &ModulePath) {
        match path {
            ModulePath::Dotted(parts) => self.push(&parts.join(".")),
            ModulePath::File(file) => self.string(file),
        }
    }

    fn import_names(&mut self, names: &[ImportName]) {
        for (i, item) in names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&item.name);
            if let Some(alias) = &item.alias {
                self.push(" as ");
                self.push(alias);
            }
        }
    }

    fn func(&mut self, decl: &FuncDecl) {
        self.push("func");
        if let Some(name) = &decl.name {
            self.push(" ");
            self.push(name);
        } else {
            self.push(" ");
        }
        self.push("(");
        self.params(&decl.params);
        self.push(") ");
        self.block(&decl.body);
    }

    fn params(&mut self, params: &[Param]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push(&param.name);
            if let Some(default) = &param.default {
                self.push(" = ");
                self.expr(default);
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(lit, _) => self.literal(lit),
            Expr::Ident(name, _) => self.push(name),
            Expr::List(items, _) => {
                self.push("[");
                self.comma_separated(items);
                self.push("]");
            }
            Expr::Dict(entries, _) => {
                self.push("{");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(key);
                    self.push(": ");
                    self.expr(value);
                }
                self.push("}");
            }
            Expr::Unary { op, operand, .. } => {
                self.push("(");
                self.push(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::Not => "!",
                });
                self.expr(operand);
                self.push(")");
            }
            Expr::Binary { left, op, right, .. } => {
                self.push("(");
                self.expr(left);
                self.push(" ");
                self.push(op.symbol());
                self.push(" ");
                self.expr(right);
                self.push(")");
            }
            Expr::Logical { left, op, right, .. } => {
                self.push("(");
                self.expr(left);
                self.push(match op {
                    LogicalOp::And => " && ",
                    LogicalOp::Or => " || ",
                });
                self.expr(right);
                self.push(")");
            }
            Expr::Compare { first, rest, .. } => {
                self.push("(");
                self.expr(first);
                for (op, operand) in rest {
                    self.push(" ");
                    self.push(op.symbol());
                    self.push(" ");
                    self.expr(operand);
                }
                self.push(")");
            }
            Expr::Call { callee, args, .. } => {
                self.postfix_operand(callee);
                self.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match arg {
                        Arg::Positional(value) => self.expr(value),
                        Arg::Keyword(name, value) => {
                            self.push(name);
                            self.push(" = ");
                            self.expr(value);
                        }
                    }
                }
                self.push(")");
            }
            Expr::Index { object, index, .. } => {
                self.postfix_operand(object);
                self.push("[");
                self.expr(index);
                self.push("]");
            }
            Expr::Property { object, name, .. } => {
                self.postfix_operand(object);
                self.push(".");
                self.push(name);
            }
            Expr::Func(decl) => self.func(decl),
        }
    }

    // Number literals and anonymous functions need parentheses before
    // `.`, `(` or `[`.
    fn postfix_operand(&mut self, expr: &Expr) {
        if matches!(expr, Expr::Literal(..) | Expr::Func(_)) {
            self.push("(");
            self.expr(expr);
            self.push(")");
        } else {
            self.expr(expr);
        }
    }

    fn comma_separated(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(item);
        }
    }

    fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Int(n) => self.push(&n.to_string()),
            Literal::Float(f) => self.push(&format!("{:?}", f)),
            Literal::Str(s) => self.string(s),
            Literal::Bool(b) => self.push(if *b { "true" } else { "false" }),
            Literal::Null => self.push("null"),
        }
    }

    fn string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\0' => self.out.push_str("\\0"),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}
