//! Client-side parameter binding for MySQL.
//!
//! Queries run over the text protocol, so positional arguments are rendered
//! as escaped SQL literals. Both `?` and `$n` placeholders are recognized;
//! placeholders inside quoted strings or identifiers are left alone.

use dbscope_core::{DbscopeError, Result, Value};

/// Escape a value for SQL literal inclusion
pub fn value_to_mysql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Decimal(v) if is_numeric_literal(v) => v.clone(),
        Value::Decimal(v) | Value::String(v) => quote(v),
        Value::Bytes(v) => {
            let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
            format!("X'{}'", hex)
        }
        Value::Uuid(v) => format!("'{}'", v),
        Value::Json(v) => quote(&v.to_string()),
        Value::DateTimeUtc(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Date(v) => format!("'{}'", v),
        Value::Time(v) => format!("'{}'", v),
        Value::DateTime(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Array(items) => {
            let json = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
            quote(&json)
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
}

fn is_numeric_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
}

/// Substitute `?` and `$n` placeholders with literal parameter values.
///
/// `?` placeholders consume parameters in order; `$n` refers to the n-th
/// parameter (1-based) and may repeat.
pub fn bind_literals(sql: &str, params: &[Value]) -> Result<String> {
    if params.is_empty() {
        return Ok(sql.to_string());
    }

    let missing = |index: usize| {
        DbscopeError::Query(format!(
            "query references parameter {} but only {} were supplied",
            index,
            params.len()
        ))
    };

    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut next_positional = 0usize;

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            out.push(c);
            if c == '\\' && open != '`' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '?' => {
                next_positional += 1;
                let value = params
                    .get(next_positional - 1)
                    .ok_or_else(|| missing(next_positional))?;
                out.push_str(&value_to_mysql_literal(value));
            }
            '$' if chars.peek().is_some_and(|d| d.is_ascii_digit()) => {
                let mut digits = String::new();
                while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                    digits.push(d);
                }
                let index: usize = digits.parse().map_err(|_| {
                    DbscopeError::Query(format!("invalid placeholder: ${}", digits))
                })?;
                let value = index
                    .checked_sub(1)
                    .and_then(|i| params.get(i))
                    .ok_or_else(|| missing(index))?;
                out.push_str(&value_to_mysql_literal(value));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
