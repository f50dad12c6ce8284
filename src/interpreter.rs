// ═══════════════════════════════════════════════════════════
// Lumen Interpreter: tree-walking evaluator
// ═══════════════════════════════════════════════════════════

use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, trace};

use crate::ast::*;
use crate::config::Config;
use crate::env::{AssignError, Env, Mutability};
use crate::error::{ControlFlow, ErrorKind, LumenError, RuntimeError};
use crate::lexer::Span;
use crate::modules::ModuleCache;
use crate::ops;
use crate::output::Output;
use crate::parser;
use crate::stack::ensure_sufficient_stack;
use crate::stdlib::{self, NativeArgs, NativeCtx};
use crate::suggest;
use crate::value::{BoundMethod, Class, DictMap, ErrorValue, Function, Instance, NativeFunction, Value};

type Flow<T = Value> = Result<T, ControlFlow>;

pub struct Interpreter {
    prelude: Env,
    globals: Env,
    pub(crate) config: Config,
    pub(crate) modules: ModuleCache,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let prelude = Env::new();
        stdlib::register_prelude(&prelude);
        let globals = Env::child(&prelude);
        let modules = ModuleCache::new(config.base_dir.clone());
        Interpreter { prelude, globals, config, modules, depth: 0 }
    }

    /// The entry program's global scope; persists across `execute` calls.
    pub fn globals(&self) -> &Env {
        &self.globals
    }

    pub(crate) fn prelude(&self) -> &Env {
        &self.prelude
    }

    pub fn output(&self) -> &Output {
        &self.config.output
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory that relative imports of the entry program resolve against.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.modules.set_base_dir(dir.into());
    }

    // ── Entry points ──────────────────────────────────────────────────────────

    pub fn run_source(&mut self, source: &str) -> Result<Value, LumenError> {
        let program = parser::parse_source(source)?;
        Ok(self.execute(&program)?)
    }

    pub fn execute(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let env = self.globals.clone();
        self.execute_in(program, &env)
    }

    /// Run top-level statements in `env`; yields the value of the last
    /// expression statement that ran.
    pub fn execute_in(&mut self, program: &Program, env: &Env) -> Result<Value, RuntimeError> {
        debug!("executing {} top-level statements", program.statements.len());
        let mut last = Value::Null;
        for stmt in &program.statements {
            let value = self.exec_stmt(stmt, env).map_err(escaped)?;
            if matches!(stmt, Stmt::Expr(_)) {
                last = value;
            }
        }
        Ok(last)
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Flow {
        for stmt in stmts {
            self.exec_stmt(stmt, env)?;
        }
        Ok(Value::Null)
    }

    // Loop bodies: Ok(true) to keep going, Ok(false) on break.
    fn exec_loop_body(&mut self, body: &[Stmt], scope: &Env) -> Flow<bool> {
        match self.exec_block(body, scope) {
            Ok(_) | Err(ControlFlow::Continue) => Ok(true),
            Err(ControlFlow::Break) => Ok(false),
            Err(other) => Err(other),
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Flow {
        ensure_sufficient_stack(|| self.exec_stmt_inner(stmt, env))
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt, env: &Env) -> Flow {
        match stmt {
            Stmt::Expr(expr) => self.eval_expr(expr, env),

            Stmt::Let { name, value, span } => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                declare(env, name, v, Mutability::Mutable).map_err(|e| e.at(*span))?;
                Ok(Value::Null)
            }

            Stmt::Const { name, value, span } => {
                let v = self.eval_expr(value, env)?;
                declare(env, name, v, Mutability::Immutable).map_err(|e| e.at(*span))?;
                Ok(Value::Null)
            }

            Stmt::Assign { target, op, value, span } => {
                self.exec_assign(target, *op, value, *span, env)?;
                Ok(Value::Null)
            }

            Stmt::Block(body, _) => {
                self.exec_block(body, &Env::child(env))?;
                Ok(Value::Null)
            }

            Stmt::If { branches, else_body, .. } => {
                for (condition, body) in branches {
                    if self.eval_expr(condition, env)?.is_truthy() {
                        self.exec_block(body, &Env::child(env))?;
                        return Ok(Value::Null);
                    }
                }
                if let Some(body) = else_body {
                    self.exec_block(body, &Env::child(env))?;
                }
                Ok(Value::Null)
            }

            Stmt::While { condition, body, .. } => {
                while self.eval_expr(condition, env)?.is_truthy() {
                    if !self.exec_loop_body(body, &Env::child(env))? {
                        break;
                    }
                }
                Ok(Value::Null)
            }

            Stmt::For { var, iterable, body, .. } => {
                let collection = self.eval_expr(iterable, env)?;
                let items = ops::iterate(&collection).map_err(|e| e.at(iterable.span()))?;
                for item in items {
                    let scope = Env::child(env);
                    scope.define(var, item, Mutability::Mutable);
                    if !self.exec_loop_body(body, &scope)? {
                        break;
                    }
                }
                Ok(Value::Null)
            }

            Stmt::Repeat { count, body, .. } => {
                let times = match self.eval_expr(count, env)? {
                    Value::Int(n) if n >= 0 => n,
                    Value::Int(n) => {
                        return Err(RuntimeError::type_error(format!("repeat count must be non-negative, got {}", n))
                            .at(count.span())
                            .into())
                    }
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "repeat count must be an integer, not '{}'",
                            other.type_name()
                        ))
                        .at(count.span())
                        .into())
                    }
                };
                for _ in 0..times {
                    if !self.exec_loop_body(body, &Env::child(env))? {
                        break;
                    }
                }
                Ok(Value::Null)
            }

            Stmt::Break(_) => Err(ControlFlow::Break),
            Stmt::Continue(_) => Err(ControlFlow::Continue),

            Stmt::Return(value, _) => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Null,
                };
                Err(ControlFlow::Return(v))
            }

            Stmt::Throw(expr, span) => {
                let err = match &self.eval_expr(expr, env)? {
                    Value::Error(e) => e.to_runtime_error().at(*span),
                    other => RuntimeError::new(ErrorKind::Error, other.to_string()).at(*span),
                };
                Err(err.into())
            }

            Stmt::Assert { condition, message, span } => {
                if self.eval_expr(condition, env)?.is_truthy() {
                    return Ok(Value::Null);
                }
                let msg = match message {
                    Some(expr) => self.eval_expr(expr, env)?.to_string(),
                    None => "assertion failed".to_string(),
                };
                Err(RuntimeError::new(ErrorKind::Assertion, msg).at(*span).into())
            }

            Stmt::Try { body, catches, finally, .. } => {
                self.exec_try(body, catches, finally.as_deref(), env)?;
                Ok(Value::Null)
            }

            Stmt::Match { subject, arms, .. } => self.exec_match(subject, arms, env),

            Stmt::FuncDef(decl) => {
                let func = Function { decl: decl.clone(), closure: env.clone(), owner: None };
                declare(env, decl.display_name(), Value::Function(Rc::new(func)), Mutability::Mutable)
                    .map_err(|e| e.at(decl.span))?;
                Ok(Value::Null)
            }

            Stmt::ClassDef(decl) => {
                self.define_class(decl, env)?;
                Ok(Value::Null)
            }

            Stmt::Import { path, alias, span } => {
                self.import_path(path, alias.as_deref(), env).map_err(|e| e.at(*span))?;
                Ok(Value::Null)
            }

            Stmt::FromImport { path, names, span } => {
                self.import_names(path, names, env).map_err(|e| e.at(*span))?;
                Ok(Value::Null)
            }

            Stmt::Export(inner, _) => self.exec_stmt(inner, env),
        }
    }

    fn exec_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, span: Span, env: &Env) -> Flow<()> {
        match target {
            Expr::Ident(name, name_span) => {
                let rhs = self.eval_expr(value, env)?;
                let new = match op.binary_op() {
                    None => rhs,
                    Some(bin) => {
                        let current = lookup(name, *name_span, env)?;
                        ops::binary(bin, &current, &rhs).map_err(|e| e.at(span))?
                    }
                };
                env.assign(name, new).map_err(|e| {
                    match e {
                        AssignError::Immutable => RuntimeError::new(
                            ErrorKind::ConstAssignment,
                            format!("cannot reassign constant '{}'", name),
                        ),
                        AssignError::Undefined => {
                            let mut err = undefined_name(name, env);
                            err.message.push_str(" (declare it with 'let' first)");
                            err
                        }
                    }
                    .at(*name_span)
                })?;
            }
            Expr::Index { object, index, span: index_span } => {
                let obj = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                let rhs = self.eval_expr(value, env)?;
                let new = match op.binary_op() {
                    None => rhs,
                    Some(bin) => {
                        let current = ops::index_get(&obj, &key).map_err(|e| e.at(*index_span))?;
                        ops::binary(bin, &current, &rhs).map_err(|e| e.at(span))?
                    }
                };
                ops::index_set(&obj, &key, new).map_err(|e| e.at(*index_span))?;
            }
            Expr::Property { object, name, span: prop_span } => {
                let obj = self.eval_expr(object, env)?;
                let rhs = self.eval_expr(value, env)?;
                let new = match op.binary_op() {
                    None => rhs,
                    Some(bin) => {
                        let current = self.get_property(&obj, name).map_err(|e| e.at(*prop_span))?;
                        ops::binary(bin, &current, &rhs).map_err(|e| e.at(span))?
                    }
                };
                set_property(&obj, name, new).map_err(|e| e.at(*prop_span))?;
            }
            other => {
                return Err(RuntimeError::type_error("invalid assignment target").at(other.span()).into());
            }
        }
        Ok(())
    }

    // finally always runs; a signal it raises replaces the pending outcome.
    fn exec_try(
        &mut self,
        body: &[Stmt],
        catches: &[CatchClause],
        finally: Option<&[Stmt]>,
        env: &Env,
    ) -> Flow {
        let outcome = match self.exec_block(body, &Env::child(env)) {
            Err(ControlFlow::Error(err)) => match select_catch(catches, &err.kind) {
                Some(clause) => {
                    trace!("caught {} in clause at {}", err.kind, clause.span);
                    let scope = Env::child(env);
                    scope.define(&clause.binding, Value::Error(Rc::new(ErrorValue::from(&err))), Mutability::Mutable);
                    self.exec_block(&clause.body, &scope)
                }
                None => Err(ControlFlow::Error(err)),
            },
            other => other,
        };
        if let Some(finally) = finally {
            self.exec_block(finally, &Env::child(env))?;
        }
        outcome
    }

    fn exec_match(&mut self, subject: &Expr, arms: &[MatchArm], env: &Env) -> Flow {
        let value = self.eval_expr(subject, env)?;
        for arm in arms {
            for pattern in &arm.patterns {
                let scope = Env::child(env);
                if !pattern_matches(pattern, &value, &scope) {
                    continue;
                }
                if let Some(guard) = &arm.guard {
                    if !self.eval_expr(guard, &scope)?.is_truthy() {
                        continue;
                    }
                }
                self.exec_block(&arm.body, &scope)?;
                return Ok(Value::Null);
            }
        }
        Ok(Value::Null)
    }

    fn define_class(&mut self, decl: &ClassDecl, env: &Env) -> Result<(), RuntimeError> {
        let parent = match &decl.parent {
            None => None,
            Some(name) => match &env.get(name) {
                Some(Value::Class(class)) => Some(class.clone()),
                Some(other) => {
                    return Err(RuntimeError::type_error(format!(
                        "class '{}' cannot extend '{}': it is a {}, not a class",
                        decl.name,
                        name,
                        other.type_name()
                    ))
                    .at(decl.span))
                }
                None => return Err(undefined_name(name, env).at(decl.span)),
            },
        };
        let methods = decl.methods.iter().map(|m| (m.display_name().to_string(), m.clone())).collect();
        let class = Class { name: decl.name.clone(), parent, methods, closure: env.clone() };
        debug!("defined class {}", decl.name);
        declare(env, &decl.name, Value::Class(Rc::new(class)), Mutability::Mutable).map_err(|e| e.at(decl.span))
    }

    // ── Expression evaluation ─────────────────────────────────────────────────

    pub fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Flow {
        ensure_sufficient_stack(|| self.eval_expr_inner(expr, env))
    }

    fn eval_expr_inner(&mut self, expr: &Expr, env: &Env) -> Flow {
        match expr {
            Expr::Literal(lit, _) => Ok(literal_value(lit)),

            Expr::Ident(name, span) => Ok(lookup(name, *span, env)?),

            Expr::List(items, _) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, env)?);
                }
                Ok(Value::list(out))
            }

            Expr::Dict(entries, _) => {
                let mut map = DictMap::new();
                for (k, v) in entries {
                    let key = self.eval_expr(k, env)?;
                    let value = self.eval_expr(v, env)?;
                    map.insert(key, value).map_err(|e| e.at(k.span()))?;
                }
                Ok(Value::dict(map))
            }

            Expr::Unary { op, operand, span } => {
                let v = self.eval_expr(operand, env)?;
                Ok(ops::unary(*op, &v).map_err(|e| e.at(*span))?)
            }

            Expr::Binary { left, op, right, span } => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                Ok(ops::binary(*op, &l, &r).map_err(|e| e.at(*span))?)
            }

            Expr::Logical { left, op, right, .. } => {
                let l = self.eval_expr(left, env)?.is_truthy();
                let result = match op {
                    LogicalOp::And => l && self.eval_expr(right, env)?.is_truthy(),
                    LogicalOp::Or => l || self.eval_expr(right, env)?.is_truthy(),
                };
                Ok(Value::Bool(result))
            }

            // a < b < c means (a < b) && (b < c), each operand evaluated once
            Expr::Compare { first, rest, span } => {
                let mut left = self.eval_expr(first, env)?;
                for (op, operand) in rest {
                    let right = self.eval_expr(operand, env)?;
                    if !ops::compare(*op, &left, &right).map_err(|e| e.at(*span))? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }

            Expr::Call { callee, args, span } => {
                let func = self.eval_expr(callee, env)?;
                let args = self.eval_args(args, env)?;
                Ok(self.call_value(&func, args, *span)?)
            }

            Expr::Index { object, index, span } => {
                let obj = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                Ok(ops::index_get(&obj, &key).map_err(|e| e.at(*span))?)
            }

            Expr::Property { object, name, span } => {
                if let Expr::Ident(id, _) = &**object {
                    if id == "super" {
                        if let Some(Value::Class(parent)) = &env.get("super") {
                            return Ok(super_method(parent, name, env).map_err(|e| e.at(*span))?);
                        }
                    }
                }
                let obj = self.eval_expr(object, env)?;
                Ok(self.get_property(&obj, name).map_err(|e| e.at(*span))?)
            }

            Expr::Func(decl) => {
                let func = Function { decl: decl.clone(), closure: env.clone(), owner: None };
                Ok(Value::Function(Rc::new(func)))
            }
        }
    }

    fn eval_args(&mut self, args: &[Arg], env: &Env) -> Flow<NativeArgs> {
        let mut out = NativeArgs::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => out.positional.push(self.eval_expr(expr, env)?),
                Arg::Keyword(name, expr) => {
                    let value = self.eval_expr(expr, env)?;
                    out.keyword.push((name.clone(), value));
                }
            }
        }
        Ok(out)
    }

    // ── Properties ────────────────────────────────────────────────────────────

    fn get_property(&self, object: &Value, name: &str) -> Result<Value, RuntimeError> {
        match object {
            Value::Module(module) => module.get(name).cloned().ok_or_else(|| {
                RuntimeError::attribute(format!("module '{}' has no attribute '{}'", module.name, name))
                    .with_suggestions(suggest::similar_names(name, module.names(), 3))
            }),
            Value::Instance(inst) => {
                if let Some(v) = inst.fields.borrow().get(name) {
                    return Ok(v.clone());
                }
                match inst.class.find_method(name) {
                    Some((owner, decl)) => Ok(bind_method(object.clone(), owner, decl)),
                    None => {
                        let mut candidates: Vec<String> = inst.fields.borrow().keys().cloned().collect();
                        candidates.extend(inst.class.method_names());
                        Err(RuntimeError::attribute(format!(
                            "'{}' instance has no attribute '{}'",
                            inst.class.name, name
                        ))
                        .with_suggestions(suggest::similar_names(name, candidates, 3)))
                    }
                }
            }
            Value::Class(class) => match class.find_method(name) {
                Some((owner, decl)) => {
                    Ok(Value::Function(Rc::new(Function { decl, closure: owner.closure.clone(), owner: Some(owner) })))
                }
                None => Err(RuntimeError::attribute(format!("class '{}' has no method '{}'", class.name, name))
                    .with_suggestions(suggest::similar_names(name, class.method_names(), 3))),
            },
            Value::Error(err) => match name {
                "kind" => Ok(Value::str(err.kind.name())),
                "message" => Ok(Value::str(err.message.as_str())),
                "line" => Ok(err.span.map_or(Value::Null, |s| Value::Int(i64::from(s.line)))),
                "column" => Ok(err.span.map_or(Value::Null, |s| Value::Int(i64::from(s.column)))),
                _ => Err(RuntimeError::attribute(format!("error values have no attribute '{}'", name))
                    .with_suggestions(suggest::similar_names(name, ["kind", "message", "line", "column"], 3))),
            },
            Value::List(_) | Value::Str(_) | Value::Dict(_) => match stdlib::builtin_method(object, name) {
                Some(method) => Ok(Value::BoundMethod(Rc::new(BoundMethod { receiver: object.clone(), method }))),
                None => Err(RuntimeError::attribute(format!(
                    "'{}' value has no method '{}'",
                    object.type_name(),
                    name
                ))
                .with_suggestions(suggest::similar_names(name, stdlib::builtin_method_names(object), 3))),
            },
            other => Err(RuntimeError::attribute(format!(
                "'{}' value has no attribute '{}'",
                other.type_name(),
                name
            ))),
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    pub fn call_value(&mut self, callee: &Value, args: NativeArgs, span: Span) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(func) => self.call_function(func, None, args, span),
            Value::Native(native) => self.call_native(native, args, span),
            Value::BoundMethod(bound) => match &bound.method {
                Value::Function(func) => self.call_function(func, Some(bound.receiver.clone()), args, span),
                Value::Native(native) => {
                    let mut args = args;
                    args.positional.insert(0, bound.receiver.clone());
                    self.call_native(native, args, span)
                }
                other => Err(not_callable(other).at(span)),
            },
            Value::Class(class) => self.instantiate(class, args, span),
            other => Err(not_callable(other).at(span)),
        }
    }

    fn call_function(
        &mut self,
        func: &Rc<Function>,
        receiver: Option<Value>,
        args: NativeArgs,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(
                ErrorKind::Recursion,
                format!("maximum call depth of {} exceeded in '{}'", self.config.max_call_depth, func.name()),
            )
            .at(span));
        }

        let scope = Env::child(&func.closure);
        if let Some(this) = receiver {
            scope.define("self", this, Mutability::Immutable);
            if let Some(parent) = func.owner.as_ref().and_then(|c| c.parent.clone()) {
                scope.define("super", Value::Class(parent), Mutability::Immutable);
            }
        }
        self.bind_arguments(func, args, &scope).map_err(|e| e.at(span))?;

        self.depth += 1;
        trace!("call {} (depth {})", func.name(), self.depth);
        let result = ensure_sufficient_stack(|| self.exec_block(&func.decl.body, &scope));
        self.depth -= 1;

        match result {
            Ok(_) => Ok(Value::Null),
            Err(ControlFlow::Return(v)) => Ok(v),
            Err(ControlFlow::Error(e)) => Err(e),
            Err(ControlFlow::Break | ControlFlow::Continue) => {
                Err(RuntimeError::new(ErrorKind::Error, "'break' or 'continue' escaped a function body").at(span))
            }
        }
    }

    fn bind_arguments(&mut self, func: &Function, args: NativeArgs, scope: &Env) -> Result<(), RuntimeError> {
        let decl = &func.decl;
        let name = decl.display_name();
        if args.positional.len() > decl.params.len() {
            return Err(RuntimeError::type_error(format!(
                "{}() takes {} argument{} but {} were given",
                name,
                decl.params.len(),
                if decl.params.len() == 1 { "" } else { "s" },
                args.positional.len()
            )));
        }

        let NativeArgs { positional, mut keyword } = args;
        let mut positional = positional.into_iter();
        for param in &decl.params {
            let value = if let Some(v) = positional.next() {
                if keyword.iter().any(|(k, _)| *k == param.name) {
                    return Err(RuntimeError::type_error(format!(
                        "{}() got multiple values for argument '{}'",
                        name, param.name
                    )));
                }
                v
            } else if let Some(pos) = keyword.iter().position(|(k, _)| *k == param.name) {
                keyword.swap_remove(pos).1
            } else if let Some(default) = &param.default {
                // defaults see the defining scope, not the caller's
                self.eval_expr(default, &func.closure).map_err(escaped)?
            } else {
                return Err(RuntimeError::type_error(format!(
                    "{}() missing required argument '{}'",
                    name, param.name
                )));
            };
            scope.define(&param.name, value, Mutability::Mutable);
        }

        match keyword.first() {
            Some((k, _)) => Err(RuntimeError::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                name, k
            ))),
            None => Ok(()),
        }
    }

    fn call_native(&mut self, native: &NativeFunction, args: NativeArgs, span: Span) -> Result<Value, RuntimeError> {
        let mut ctx = NativeCtx { out: &self.config.output };
        (native.func)(&mut ctx, &args).map_err(|e| e.at(span))
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: NativeArgs, span: Span) -> Result<Value, RuntimeError> {
        let instance = Value::Instance(Rc::new(Instance::new(class.clone())));
        match class.find_method("init") {
            Some((owner, decl)) => {
                let init = Rc::new(Function { decl, closure: owner.closure.clone(), owner: Some(owner) });
                self.call_function(&init, Some(instance.clone()), args, span)?;
            }
            None if !args.is_empty() => {
                return Err(RuntimeError::type_error(format!(
                    "{}() takes no arguments (the class has no 'init' method)",
                    class.name
                ))
                .at(span));
            }
            None => {}
        }
        Ok(instance)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::str(s.as_str()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn lookup(name: &str, span: Span, env: &Env) -> Result<Value, RuntimeError> {
    env.get(name).ok_or_else(|| undefined_name(name, env).at(span))
}

fn undefined_name(name: &str, env: &Env) -> RuntimeError {
    RuntimeError::name(format!("name '{}' is not defined", name))
        .with_suggestions(suggest::similar_names(name, env.visible_names(), 3))
}

fn not_callable(value: &Value) -> RuntimeError {
    RuntimeError::type_error(format!("'{}' value is not callable", value.type_name()))
}

// Signals that reach a call or program boundary without a handler.
fn escaped(flow: ControlFlow) -> RuntimeError {
    match flow {
        ControlFlow::Error(e) => e,
        ControlFlow::Return(_) => RuntimeError::new(ErrorKind::Error, "'return' outside of a function"),
        ControlFlow::Break | ControlFlow::Continue => {
            RuntimeError::new(ErrorKind::Error, "'break' or 'continue' outside of a loop")
        }
    }
}

/// Typed clauses win over the catch-all regardless of source order.
fn select_catch<'a>(catches: &'a [CatchClause], kind: &ErrorKind) -> Option<&'a CatchClause> {
    catches
        .iter()
        .find(|c| c.kind.as_deref() == Some(kind.name()))
        .or_else(|| catches.iter().find(|c| c.kind.is_none()))
}

fn pattern_matches(pattern: &Pattern, value: &Value, scope: &Env) -> bool {
    match pattern {
        Pattern::Wildcard => true,
        Pattern::Binding(name) => {
            scope.define(name, value.clone(), Mutability::Mutable);
            true
        }
        Pattern::Literal(lit) => literal_value(lit) == *value,
    }
}

fn bind_method(receiver: Value, owner: Rc<Class>, decl: Rc<FuncDecl>) -> Value {
    let func = Function { decl, closure: owner.closure.clone(), owner: Some(owner) };
    Value::BoundMethod(Rc::new(BoundMethod { receiver, method: Value::Function(Rc::new(func)) }))
}

/// Bind a new name in `env`; a same-scope `const` cannot be replaced.
pub(crate) fn declare(env: &Env, name: &str, value: Value, mutability: Mutability) -> Result<(), RuntimeError> {
    env.declare(name, value, mutability).map_err(|_| {
        RuntimeError::new(ErrorKind::ConstAssignment, format!("cannot redeclare constant '{}'", name))
    })
}

fn super_method(parent: &Rc<Class>, name: &str, env: &Env) -> Result<Value, RuntimeError> {
    let receiver = env.get("self").ok_or_else(|| RuntimeError::name("'super' used outside of a method"))?;
    match parent.find_method(name) {
        Some((owner, decl)) => Ok(bind_method(receiver, owner, decl)),
        None => Err(RuntimeError::attribute(format!("parent class '{}' has no method '{}'", parent.name, name))
            .with_suggestions(suggest::similar_names(name, parent.method_names(), 3))),
    }
}

fn set_property(object: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
    match object {
        Value::Instance(inst) => {
            inst.fields.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::Module(module) => Err(RuntimeError::type_error(format!(
            "cannot assign to '{}': module '{}' is read-only",
            name, module.name
        ))),
        other => Err(RuntimeError::type_error(format!(
            "cannot set attribute '{}' on '{}' value",
            name,
            other.type_name()
        ))),
    }
}
