// ═══════════════════════════════════════════════════════════
// Lumen: a small dynamically typed scripting language
// ═══════════════════════════════════════════════════════════
//
// Pipeline: source → lexer → parser → AST → tree-walking interpreter.
//
//     let mut interp = lumen::Interpreter::new();
//     interp.run_source("print(1 + 2);")?;

pub mod ast;
pub mod config;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod modules;
pub mod ops;
pub mod output;
pub mod parser;
pub mod printer;
pub mod report;
mod stack;
pub mod stdlib;
pub mod suggest;
pub mod value;

pub use config::Config;
pub use error::{ErrorKind, LumenError, RuntimeError};
pub use interpreter::Interpreter;
pub use output::Output;
pub use parser::parse_source;
pub use value::Value;
