//! Script text utilities
//!
//! Statement splitting and the line-numbered rendering used in diagnostics.
//! Splitting is quote-aware and strips `--` line comments; anything heavier
//! belongs to the engine's parser.

/// Splits a raw script into statement texts on `;` boundaries.
///
/// Semicolons inside single-quoted literals do not split. `--` comments run
/// to end of line and are dropped. Whitespace-only segments are discarded.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quote {
            current.push(c);
            if c == '\'' {
                // doubled quote is an escaped quote, stay inside the literal
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_quote = false;
                }
            }
            continue;
        }

        match c {
            '\'' => {
                in_quote = true;
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            ';' => {
                if !current.trim().is_empty() {
                    statements.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

/// Renders a statement with 1-based line numbers for error messages.
pub fn add_line_numbers(statement: &str) -> String {
    statement
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
