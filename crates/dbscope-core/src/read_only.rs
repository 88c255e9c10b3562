//! Read-only statement guard
//!
//! Statements handed to the query tool are screened before they reach a
//! database. The check is lexical: the text is split into statements at
//! every `;` outside quotes and comments, each statement is checked for a
//! leading write keyword, and the whole text is searched for known write
//! patterns. More than one statement is never accepted.

use thiserror::Error;

const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "REPLACE", "MERGE",
    "GRANT", "REVOKE", "EXEC", "EXECUTE", "CALL", "RENAME", "SET", "LOCK", "UNLOCK", "HANDLER",
    "DO", "LOAD", "COPY", "VACUUM", "REINDEX", "CLUSTER", "REFRESH", "COMMENT", "FLUSH", "KILL",
    "PURGE", "RESET",
];

const WRITE_PATTERNS: &[&str] = &[
    "INSERT INTO",
    "UPDATE ",
    "DELETE FROM",
    "DROP ",
    "CREATE ",
    "ALTER ",
    "TRUNCATE ",
    "INTO OUTFILE",
    "INTO DUMPFILE",
];

/// A statement rejected by [`validate_read_only`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("write operations are not allowed in read-only mode: detected {detected}")]
pub struct ReadOnlyViolation {
    /// What was detected, e.g. `DELETE statement` or `'INTO OUTFILE' pattern`
    pub detected: String,
}

impl ReadOnlyViolation {
    fn new(detected: String) -> Self {
        Self { detected }
    }
}

/// Reject statements that could modify data or schema
pub fn validate_read_only(sql: &str) -> Result<(), ReadOnlyViolation> {
    let statements = split_statements(sql);

    for statement in &statements {
        let upper = statement.trim().to_uppercase();
        if let Some(keyword) = WRITE_KEYWORDS
            .iter()
            .find(|keyword| starts_with_keyword(&upper, keyword))
        {
            return Err(ReadOnlyViolation::new(format!("{keyword} statement")));
        }
    }

    if statements.len() > 1 {
        return Err(ReadOnlyViolation::new("multiple statements".to_string()));
    }

    let upper = sql.trim().to_uppercase();
    if let Some(pattern) = WRITE_PATTERNS.iter().find(|p| upper.contains(*p)) {
        return Err(ReadOnlyViolation::new(format!("'{pattern}' pattern")));
    }

    if upper.contains(" INTO ") {
        return Err(ReadOnlyViolation::new("'INTO' clause".to_string()));
    }

    Ok(())
}

// A keyword prefix only counts when it ends at a word boundary, so
// `UPDATED_ROWS` is not mistaken for `UPDATE`.
fn starts_with_keyword(upper: &str, keyword: &str) -> bool {
    upper.strip_prefix(keyword).is_some_and(|rest| {
        rest.chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

/// Split `sql` at top-level semicolons, dropping comments.
///
/// Quoted text is kept verbatim, with doubled quotes and backslash escapes
/// staying inside the literal. `-- ` and `#` comments run to the end of the
/// line and `/* */` comments are removed, except MySQL's executable `/*!`
/// form, which is kept as code. Blank statements are dropped.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == '\\' && c != '`' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if inner == c {
                        if chars.peek() == Some(&c) {
                            current.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                if lookahead.peek().is_none_or(|next| next.is_whitespace()) {
                    skip_line(&mut chars);
                    current.push(' ');
                } else {
                    current.push(c);
                }
            }
            '#' => {
                skip_line(&mut chars);
                current.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                if lookahead.peek() == Some(&'!') {
                    current.push(c);
                } else {
                    chars.next();
                    let mut previous = '\0';
                    for inner in chars.by_ref() {
                        if previous == '*' && inner == '/' {
                            break;
                        }
                        previous = inner;
                    }
                    current.push(' ');
                }
            }
            ';' => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    statements.push(current);

    statements.retain(|statement| !statement.trim().is_empty());
    statements
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for inner in chars.by_ref() {
        if inner == '\n' {
            break;
        }
    }
}
