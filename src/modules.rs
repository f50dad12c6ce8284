// ── Module loader ─────────────────────────────────────────────────────────────
//
// Resolves import paths to standard or user modules, runs each user module
// once in its own global scope and caches the resulting namespace.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{ImportName, ModulePath, Program, Stmt};
use crate::env::{Env, Mutability};
use crate::error::{ErrorKind, LumenError, RuntimeError};
use crate::interpreter::{self, Interpreter};
use crate::parser;
use crate::stdlib;
use crate::suggest;
use crate::value::{Module, Value};

pub const SOURCE_EXTENSION: &str = "lm";

/// Per-interpreter module state.
#[derive(Debug, Default)]
pub struct ModuleCache {
    loaded: FxHashMap<String, Rc<Module>>,
    // keys of modules whose top level is still executing
    in_progress: FxHashSet<String>,
    // directory of each file module currently executing, innermost last
    dir_stack: Vec<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl ModuleCache {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        ModuleCache { base_dir, ..Default::default() }
    }

    pub fn set_base_dir(&mut self, dir: PathBuf) {
        self.base_dir = Some(dir);
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.loaded.contains_key(key)
    }

    // Relative imports resolve against the importing file's directory.
    fn current_dir(&self) -> PathBuf {
        self.dir_stack
            .last()
            .cloned()
            .or_else(|| self.base_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

enum Resolved {
    Std(&'static str),
    File(PathBuf),
}

impl Resolved {
    fn cache_key(&self) -> String {
        match self {
            Resolved::Std(name) => format!("std:{}", name),
            Resolved::File(path) => path.display().to_string(),
        }
    }
}

impl Interpreter {
    /// `import path [as alias]`: bind the module namespace into `env`.
    pub fn import_module(&mut self, path: &str, alias: Option<&str>, env: &Env) -> Result<(), RuntimeError> {
        self.import_path(&ModulePath::parse(path), alias, env)
    }

    pub(crate) fn import_path(&mut self, path: &ModulePath, alias: Option<&str>, env: &Env) -> Result<(), RuntimeError> {
        let module = self.load_module(path)?;
        let name = alias.map(str::to_string).unwrap_or_else(|| path.binding_name());
        interpreter::declare(env, &name, Value::Module(module), Mutability::Mutable)
    }

    /// `from path import a, b as c`: bind selected names directly.
    pub(crate) fn import_names(&mut self, path: &ModulePath, names: &[ImportName], env: &Env) -> Result<(), RuntimeError> {
        let module = self.load_module(path)?;
        for item in names {
            let value = module.get(&item.name).cloned().ok_or_else(|| {
                RuntimeError::import(format!("cannot import name '{}' from module '{}'", item.name, module.name))
                    .with_suggestions(suggest::similar_names(&item.name, module.names(), 3))
            })?;
            interpreter::declare(env, item.alias.as_ref().unwrap_or(&item.name), value, Mutability::Mutable)?;
        }
        Ok(())
    }

    pub fn load_module(&mut self, path: &ModulePath) -> Result<Rc<Module>, RuntimeError> {
        let resolved = self.resolve_module(path)?;
        let key = resolved.cache_key();
        if let Some(module) = self.modules.loaded.get(&key) {
            trace!("module cache hit: {}", key);
            return Ok(module.clone());
        }
        let module = match resolved {
            Resolved::Std(name) => {
                debug!("loading standard module {}", name);
                let module = stdlib::load_module(name)
                    .ok_or_else(|| module_not_found(path, Vec::new()))?;
                Rc::new(module)
            }
            Resolved::File(file) => {
                if self.modules.in_progress.contains(&key) {
                    return Err(RuntimeError::import(format!(
                        "circular import of module '{}' ({})",
                        path,
                        file.display()
                    )));
                }
                self.load_file_module(path, &key, &file)?
            }
        };
        self.modules.loaded.insert(key, module.clone());
        Ok(module)
    }

    fn load_file_module(&mut self, path: &ModulePath, key: &str, file: &Path) -> Result<Rc<Module>, RuntimeError> {
        debug!("loading module {} from {}", path, file.display());
        let source = fs::read_to_string(file)
            .map_err(|e| RuntimeError::import(format!("cannot read module '{}' ({}): {}", path, file.display(), e)))?;
        let program = parser::parse_source(&source).map_err(|e| match e {
            LumenError::Lex(_) | LumenError::Parse(_) => {
                let at = e.span().map(|s| format!(":{}", s)).unwrap_or_default();
                RuntimeError::import(format!(
                    "error in module '{}' ({}{}): {} {}",
                    path,
                    file.display(),
                    at,
                    e.kind_name(),
                    e.message()
                ))
            }
            other => RuntimeError::import(other.to_string()),
        })?;

        let scope = Env::child(self.prelude());
        self.modules.in_progress.insert(key.to_string());
        self.modules
            .dir_stack
            .push(file.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")));
        let result = self.execute_in(&program, &scope);
        self.modules.dir_stack.pop();
        self.modules.in_progress.remove(key);
        // The span points into the module's file, not the importer's.
        result.map_err(|mut e| {
            let at = e.span.take().map(|s| format!(":{}", s)).unwrap_or_default();
            e.message = format!("{} (in module '{}' at {}{})", e.message, path, file.display(), at);
            e
        })?;

        Ok(Rc::new(Module {
            name: path.binding_name(),
            path: Some(file.to_path_buf()),
            exports: collect_exports(&program, &scope),
        }))
    }

    fn resolve_module(&self, path: &ModulePath) -> Result<Resolved, RuntimeError> {
        match path {
            ModulePath::Dotted(parts) => {
                if let [single] = parts.as_slice() {
                    if let Some(name) = stdlib::module_name(single) {
                        return Ok(Resolved::Std(name));
                    }
                }
                let mut relative = parts.iter().collect::<PathBuf>();
                relative.set_extension(SOURCE_EXTENSION);
                for dir in self.search_dirs() {
                    let candidate = dir.join(&relative);
                    if candidate.is_file() {
                        return Ok(Resolved::File(canonical(&candidate)));
                    }
                }
                Err(module_not_found(path, self.module_candidates()))
            }
            ModulePath::File(file) => {
                let candidate = self.modules.current_dir().join(file);
                if candidate.is_file() {
                    Ok(Resolved::File(canonical(&candidate)))
                } else {
                    Err(module_not_found(path, Vec::new()))
                }
            }
        }
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.modules.current_dir()];
        dirs.extend(self.config.search_paths.iter().cloned());
        dirs
    }

    // Known module names: the standard set, already-loaded modules, and
    // source files sitting directly in a search directory.
    fn module_candidates(&self) -> Vec<String> {
        let mut names: Vec<String> = stdlib::MODULE_NAMES.iter().map(|s| s.to_string()).collect();
        names.extend(self.modules.loaded.values().map(|m| m.name.clone()));
        for dir in self.search_dirs() {
            let Ok(entries) = fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn module_not_found(path: &ModulePath, candidates: Vec<String>) -> RuntimeError {
    let lookup = path.binding_name();
    RuntimeError::new(ErrorKind::ModuleNotFound, format!("no module named '{}'", path))
        .with_suggestions(suggest::similar_names(&lookup, candidates, 3))
}

/// With any `export` present only exported names are public; otherwise
/// every top-level binding not starting with `_`.
fn collect_exports(program: &Program, scope: &Env) -> BTreeMap<String, Value> {
    let exported: Vec<&str> = program
        .statements
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Export(inner, _) => inner.declared_name(),
            _ => None,
        })
        .collect();
    let has_exports = program.statements.iter().any(|s| matches!(s, Stmt::Export(..)));

    if has_exports {
        exported
            .into_iter()
            .filter_map(|name| scope.get_local(name).map(|v| (name.to_string(), v)))
            .collect()
    } else {
        scope.local_bindings().into_iter().filter(|(name, _)| !name.starts_with('_')).collect()
    }
}
