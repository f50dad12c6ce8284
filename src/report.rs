// ── Error reports ─────────────────────────────────────────────────────────────
//
//   main.lm:3:9: NameError name 'cuont' is not defined
//      |
//    2 | let count = 1;
//    3 | print(cuont);
//      |       ^
//    4 |
//   help: did you mean 'count'?

use std::fmt::Write;

use crate::error::LumenError;
use crate::lexer::Span;

/// Render `error` against the source it came from. Errors without a
/// location get the header only.
pub fn render(error: &LumenError, file: &str, source: &str) -> String {
    let mut out = String::new();
    match error.span() {
        Some(span) => {
            let _ = writeln!(out, "{}:{}: {} {}", file, span, error.kind_name(), error.message());
            write_context(&mut out, source, span);
        }
        None => {
            let _ = writeln!(out, "{}: {} {}", file, error.kind_name(), error.message());
        }
    }
    if let Some(best) = error.suggestions().first() {
        let _ = writeln!(out, "help: did you mean '{}'?", best);
    }
    out
}

fn write_context(out: &mut String, source: &str, span: Span) {
    let lines: Vec<&str> = source.lines().collect();
    let line = span.line as usize;
    if line == 0 || line > lines.len() {
        return;
    }
    let first = line.saturating_sub(1).max(1);
    let last = (line + 1).min(lines.len());
    let width = last.to_string().len();

    let _ = writeln!(out, " {:w$} |", "", w = width);
    for n in first..=last {
        let text = lines[n - 1];
        if text.is_empty() {
            let _ = writeln!(out, " {:>w$} |", n, w = width);
        } else {
            let _ = writeln!(out, " {:>w$} | {}", n, text, w = width);
        }
        if n == line {
            let _ = writeln!(out, " {:w$} | {}^", "", caret_padding(text, span.column), w = width);
        }
    }
}

// Tabs are kept so the caret lines up under tab-indented code.
fn caret_padding(text: &str, column: u32) -> String {
    text.chars()
        .take(column.saturating_sub(1) as usize)
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RuntimeError};
    use pretty_assertions::assert_eq;

    #[test]
    fn runtime_error_with_context_and_hint() {
        let source = "let count = 1;\nprint(cuont);\nprint(2);\n";
        let err = LumenError::from(
            RuntimeError::name("name 'cuont' is not defined")
                .at(Span::new(2, 7))
                .with_suggestions(vec!["count".into()]),
        );
        let expected = "\
main.lm:2:7: NameError name 'cuont' is not defined
   |
 1 | let count = 1;
 2 | print(cuont);
   |       ^
 3 | print(2);
help: did you mean 'count'?
";
        assert_eq!(render(&err, "main.lm", source), expected);
    }

    #[test]
    fn first_line_has_no_previous_context() {
        let err = LumenError::from(RuntimeError::new(ErrorKind::DivisionByZero, "division by zero").at(Span::new(1, 3)));
        let report = render(&err, "a.lm", "1 / 0;");
        assert_eq!(report, "a.lm:1:3: DivisionByZeroError division by zero\n   |\n 1 | 1 / 0;\n   |   ^\n");
    }

    #[test]
    fn missing_span_prints_header_only() {
        let err = LumenError::from(RuntimeError::io("disk on fire"));
        assert_eq!(render(&err, "x.lm", ""), "x.lm: IOError disk on fire\n");
    }
}
