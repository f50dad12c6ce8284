// ═══════════════════════════════════════════════════════════
// Lumen: command-line interface
// ═══════════════════════════════════════════════════════════

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use lumen::report;
use lumen::{parse_source, Config, Interpreter, LumenError, Value};

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "The Lumen scripting language", args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Script to run (shorthand for `lumen run <file>`)
    file: Option<PathBuf>,

    #[command(flatten)]
    opts: Options,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a source file
    Run { file: PathBuf },
    /// Lex and parse a file without running it
    Check { file: PathBuf },
    /// Start the interactive REPL
    Repl,
}

#[derive(Args, Debug)]
struct Options {
    /// Extra module search directory (repeatable, searched before LUMEN_PATH)
    #[arg(short = 'I', long = "lib", value_name = "DIR", global = true)]
    lib: Vec<PathBuf>,

    /// Maximum call depth before a RecursionError
    #[arg(long, value_name = "N", global = true)]
    max_depth: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.opts.verbose);
    let config = build_config(&cli.opts);

    let ok = match (cli.command, cli.file) {
        (Some(Command::Run { file }), _) | (None, Some(file)) => run_file(&file, config),
        (Some(Command::Check { file }), _) => check_file(&file),
        (Some(Command::Repl), _) | (None, None) => repl(config),
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// Defaults, then LUMEN_PATH, then flags.
fn build_config(opts: &Options) -> Config {
    let mut config = Config::from_env();
    config.search_paths.splice(0..0, opts.lib.iter().cloned());
    if let Some(depth) = opts.max_depth {
        config = config.with_max_call_depth(depth);
    }
    config
}

fn read_source(path: &Path) -> Result<String, LumenError> {
    fs::read_to_string(path).map_err(|source| LumenError::Io { path: path.to_path_buf(), source })
}

fn report_error(err: &LumenError, file: &Path, source: &str) {
    eprint!("{}", report::render(err, &file.display().to_string(), source));
}

// ═══════════════════════════════════════════════════════════
// run / check
// ═══════════════════════════════════════════════════════════

fn run_file(path: &Path, config: Config) -> bool {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(e) => {
            report_error(&e, path, "");
            return false;
        }
    };
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut interp = Interpreter::with_config(config.with_base_dir(base_dir));
    info!("running {}", path.display());
    match interp.run_source(&source) {
        Ok(_) => true,
        Err(e) => {
            debug!("{} failed: {}", path.display(), e);
            report_error(&e, path, &source);
            false
        }
    }
}

fn check_file(path: &Path) -> bool {
    let source = match read_source(path) {
        Ok(s) => s,
        Err(e) => {
            report_error(&e, path, "");
            return false;
        }
    };
    match parse_source(&source) {
        Ok(program) => {
            println!("{}: ok ({} top-level statements)", path.display(), program.statements.len());
            true
        }
        Err(e) => {
            report_error(&e, path, &source);
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════
// REPL
// ═══════════════════════════════════════════════════════════

const REPL_FILE: &str = "<repl>";

fn repl(config: Config) -> bool {
    println!("\x1b[36mLumen {}\x1b[0m", env!("CARGO_PKG_VERSION"));
    println!("\x1b[90mType :help for help, :quit to exit\x1b[0m");

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("cannot start line editor: {}", e);
            return false;
        }
    };
    let mut interp = Interpreter::with_config(config);
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "\x1b[36mlumen>\x1b[0m " } else { "  ... " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                return false;
            }
        };

        if buffer.is_empty() {
            match line.trim() {
                ":quit" | ":q" | ":exit" => break,
                ":help" | ":h" => {
                    print_help();
                    continue;
                }
                "" => continue,
                _ => {}
            }
        }

        buffer.push_str(&line);
        buffer.push('\n');
        if brace_depth(&buffer) > 0 {
            continue;
        }
        let _ = editor.add_history_entry(buffer.trim_end());
        let source = std::mem::take(&mut buffer);

        match interp.run_source(&source) {
            Ok(Value::Null) => {}
            Ok(value) => println!("\x1b[32m=> {}\x1b[0m", value.repr()),
            Err(e) => eprint!("{}", report::render(&e, REPL_FILE, &source)),
        }
    }
    debug!("repl finished");
    true
}

/// Unclosed brackets outside string literals and comments.
fn brace_depth(source: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => match c {
                '\\' => {
                    chars.next();
                }
                c if c == q => quote = None,
                _ => {}
            },
            None => match c {
                '"' | '\'' => quote = Some(c),
                '/' if chars.peek() == Some(&'/') => {
                    while chars.next_if(|&n| n != '\n').is_some() {}
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = ' ';
                    for n in chars.by_ref() {
                        if prev == '*' && n == '/' {
                            break;
                        }
                        prev = n;
                    }
                }
                '{' | '(' | '[' => depth += 1,
                '}' | ')' | ']' => depth -= 1,
                _ => {}
            },
        }
    }
    depth
}

fn print_help() {
    println!();
    println!("  \x1b[1mLumen quick reference\x1b[0m");
    println!();
    println!("  \x1b[33mCLI:\x1b[0m");
    println!("    lumen run <file.lm>      Run a source file");
    println!("    lumen <file.lm>          Shorthand for run");
    println!("    lumen check <file.lm>    Parse-check without running");
    println!("    lumen repl               Start this REPL");
    println!("    -I <dir>                 Add a module search directory");
    println!();
    println!("  \x1b[33mLanguage:\x1b[0m");
    println!("    let x = 1;  const N = 10;  x += 2;");
    println!("    func add(a, b = 5) {{ return a + b; }}");
    println!("    if x > 0 {{ ... }} else if x == 0 {{ ... }} else {{ ... }}");
    println!("    while c {{ ... }}   for v in [1, 2] {{ ... }}   repeat 3 {{ ... }}");
    println!("    try {{ ... }} catch KeyError as e {{ ... }} catch e {{ ... }} finally {{ ... }}");
    println!("    class Dog extends Animal {{ func init(name) {{ self.name = name; }} }}");
    println!("    match v {{ 0 | 1 => {{ ... }}, n if n > 9 => {{ ... }}, _ => {{ ... }} }}");
    println!("    import math;  from string import upper as up;");
    println!();
    println!("  \x1b[33mREPL commands:\x1b[0m  :help  :quit");
    println!();
}
