// Interpreter configuration: module search paths, call-depth limit, output sink.

use std::env;
use std::path::PathBuf;

use log::debug;

use crate::output::Output;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Platform path-list of extra module directories.
pub const PATH_ENV_VAR: &str = "LUMEN_PATH";

#[derive(Debug, Clone)]
pub struct Config {
    pub search_paths: Vec<PathBuf>,
    pub max_call_depth: usize,
    pub output: Output,
    /// Directory relative imports resolve against for the entry program.
    pub base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search_paths: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            output: Output::Stdout,
            base_dir: None,
        }
    }
}

impl Config {
    /// Defaults plus any directories listed in `LUMEN_PATH`.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(paths) = env::var_os(PATH_ENV_VAR) {
            config.search_paths.extend(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
            debug!("{} search paths: {:?}", PATH_ENV_VAR, config.search_paths);
        }
        config
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_setters() {
        let config = Config::default()
            .with_search_path("lib")
            .with_search_path("vendor")
            .with_max_call_depth(50);
        assert_eq!(config.search_paths, vec![PathBuf::from("lib"), PathBuf::from("vendor")]);
        assert_eq!(config.max_call_depth, 50);
        assert!(matches!(config.output, Output::Stdout));
    }
}
