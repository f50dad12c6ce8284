// ── Environment ───────────────────────────────────────────────────────────────
//
// Lexical scopes: a binding table plus a link to the enclosing scope.
// Closures keep their defining scope alive through the shared handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Immutable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    /// The nearest binding is a `const`.
    Immutable,
    /// No scope in the chain binds the name.
    Undefined,
}

struct Binding {
    value: Value,
    mutability: Mutability,
}

struct Scope {
    vars: FxHashMap<String, Binding>,
    parent: Option<Env>,
}

#[derive(Clone)]
pub struct Env(Rc<RefCell<Scope>>);

impl Env {
    pub fn new() -> Self {
        Env(Rc::new(RefCell::new(Scope { vars: FxHashMap::default(), parent: None })))
    }

    pub fn child(parent: &Env) -> Self {
        Env(Rc::new(RefCell::new(Scope { vars: FxHashMap::default(), parent: Some(parent.clone()) })))
    }

    /// Bind in this scope, shadowing any outer binding of the same name.
    pub fn define(&self, name: &str, value: Value, mutability: Mutability) {
        self.0.borrow_mut().vars.insert(name.to_string(), Binding { value, mutability });
    }

    /// Like `define`, but refuses to replace a `const` bound in this same scope.
    pub fn declare(&self, name: &str, value: Value, mutability: Mutability) -> Result<(), AssignError> {
        let mut scope = self.0.borrow_mut();
        if let Some(existing) = scope.vars.get(name) {
            if existing.mutability == Mutability::Immutable {
                return Err(AssignError::Immutable);
            }
        }
        scope.vars.insert(name.to_string(), Binding { value, mutability });
        Ok(())
    }

    /// Rebind the nearest existing binding of `name`.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut scope = self.0.borrow_mut();
        if let Some(binding) = scope.vars.get_mut(name) {
            if binding.mutability == Mutability::Immutable {
                return Err(AssignError::Immutable);
            }
            binding.value = value;
            return Ok(());
        }
        match &scope.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Undefined),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        if let Some(binding) = scope.vars.get(name) {
            return Some(binding.value.clone());
        }
        scope.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.0.borrow().vars.get(name).map(|b| b.value.clone())
    }

    /// Every name visible from this scope, innermost first.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let scope = env.0.borrow();
            names.extend(scope.vars.keys().cloned());
            current = scope.parent.clone();
        }
        names
    }

    /// Bindings made directly in this scope, sorted by name.
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> =
            self.0.borrow().vars.iter().map(|(k, b)| (k.clone(), b.value.clone())).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Env({} bindings)", self.0.borrow().vars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let outer = Env::new();
        outer.define("x", Value::Int(1), Mutability::Mutable);
        let inner = Env::child(&outer);
        assert_eq!(inner.get("x"), Some(Value::Int(1)));
        assert_eq!(inner.get("missing"), None);
    }

    #[test]
    fn shadowing_leaves_outer_binding_alone() {
        let outer = Env::new();
        outer.define("x", Value::Int(1), Mutability::Mutable);
        let inner = Env::child(&outer);
        inner.define("x", Value::Int(2), Mutability::Mutable);
        assert_eq!(inner.get("x"), Some(Value::Int(2)));
        assert_eq!(outer.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn assignment_mutates_enclosing_binding() {
        let outer = Env::new();
        outer.define("x", Value::Int(1), Mutability::Mutable);
        let inner = Env::child(&outer);
        inner.assign("x", Value::Int(2)).unwrap();
        assert_eq!(outer.get("x"), Some(Value::Int(2)));
        assert_eq!(inner.assign("nope", Value::Null), Err(AssignError::Undefined));
    }

    #[test]
    fn const_binding_rejects_assignment() {
        let env = Env::new();
        env.define("PI", Value::Float(2.5), Mutability::Immutable);
        let inner = Env::child(&env);
        assert_eq!(inner.assign("PI", Value::Int(3)), Err(AssignError::Immutable));
        // an inner `let` may still shadow it
        inner.declare("PI", Value::Int(3), Mutability::Mutable).unwrap();
        assert_eq!(inner.get("PI"), Some(Value::Int(3)));
    }

    #[test]
    fn const_cannot_be_redeclared_in_its_own_scope() {
        let env = Env::new();
        env.declare("LIMIT", Value::Int(3), Mutability::Immutable).unwrap();
        assert_eq!(env.declare("LIMIT", Value::Int(4), Mutability::Mutable), Err(AssignError::Immutable));
        assert_eq!(env.declare("LIMIT", Value::Int(4), Mutability::Immutable), Err(AssignError::Immutable));
        assert_eq!(env.get("LIMIT"), Some(Value::Int(3)));

        env.declare("n", Value::Int(1), Mutability::Mutable).unwrap();
        env.declare("n", Value::Int(2), Mutability::Immutable).unwrap();
        assert_eq!(env.get("n"), Some(Value::Int(2)));
    }
}
