//! Expression analysis
//!
//! A tokeniser plus an aggregate-function recogniser, not a SQL parser.
//! Good enough to extract referenced columns and aggregation markers for
//! validation warnings and GROUP BY checks; it makes no stronger claims
//! about the fragment's structure.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// Aggregate functions recognised for I6/group-by semantics.
pub const AGGREGATE_FUNCTIONS: &[&str] = &["SUM", "COUNT", "AVG", "MIN", "MAX", "STDDEV", "VARIANCE"];

/// Keywords that never count as column references.
static SQL_KEYWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "NULL", "IS", "IN", "LIKE", "BETWEEN",
        "CASE", "WHEN", "THEN", "ELSE", "END", "AS", "ON", "JOIN", "LEFT", "RIGHT", "INNER",
        "OUTER", "FULL", "GROUP", "BY", "HAVING", "ORDER", "ASC", "DESC", "DISTINCT", "TRUE",
        "FALSE", "EXISTS", "ALL", "ANY", "OVER", "PARTITION", "ROWS", "RANGE", "PRECEDING",
        "FOLLOWING", "CURRENT", "ROW", "UNBOUNDED", "INTERVAL", "DAY", "MONTH", "YEAR", "HOUR",
        "MINUTE", "SECOND", "UNION", "INTERSECT", "EXCEPT", "LIMIT", "OFFSET", "ESCAPE",
    ]
    .into_iter()
    .collect()
});

/// What the tokeniser saw in one SQL scalar fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionInfo {
    /// Bareword identifiers that are neither keywords nor function names
    pub referenced_columns: BTreeSet<String>,
    /// Function identifiers invoked (upper-cased)
    pub functions_used: BTreeSet<String>,
    /// `@name` placeholder macros invoked
    pub macros_used: BTreeSet<String>,
    /// Qualifiers of `alias.column` references
    pub qualifiers: BTreeSet<String>,
    /// Whether the fragment contains an aggregate-function call
    pub is_aggregate: bool,
}

/// Tokenise an SQL scalar fragment.
pub fn analyze_expression(fragment: &str) -> ExpressionInfo {
    let mut info = ExpressionInfo::default();
    let bytes = fragment.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;

        // String literal: skip to the closing quote ('' escapes)
        if c == '\'' {
            pos += 1;
            while pos < bytes.len() {
                if bytes[pos] == b'\'' {
                    if pos + 1 < bytes.len() && bytes[pos + 1] == b'\'' {
                        pos += 2;
                        continue;
                    }
                    pos += 1;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        // Line comment
        if c == '-' && pos + 1 < bytes.len() && bytes[pos + 1] == b'-' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && pos + 1 < bytes.len() && bytes[pos + 1] == b'*' {
            pos += 2;
            while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                pos += 1;
            }
            pos = (pos + 2).min(bytes.len());
            continue;
        }

        // Placeholder macro: @name, optionally followed by an argument list
        if c == '@' {
            pos += 1;
            let start = pos;
            while pos < bytes.len() && is_ident_char(bytes[pos]) {
                pos += 1;
            }
            if pos > start {
                info.macros_used.insert(fragment[start..pos].to_string());
            }
            continue;
        }

        // Quoted identifier counts as a column reference
        if c == '"' {
            pos += 1;
            let start = pos;
            while pos < bytes.len() && bytes[pos] != b'"' {
                pos += 1;
            }
            if pos > start {
                info.referenced_columns.insert(fragment[start..pos].to_string());
            }
            pos = (pos + 1).min(bytes.len());
            continue;
        }

        // Number: skip digits and decimal point
        if c.is_ascii_digit() {
            while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                pos += 1;
            }
            continue;
        }

        if is_ident_start(bytes[pos]) {
            let start = pos;
            while pos < bytes.len() && is_ident_char(bytes[pos]) {
                pos += 1;
            }
            let word = &fragment[start..pos];
            pos = consume_identifier(fragment, bytes, pos, word, &mut info);
            continue;
        }

        pos += 1;
    }

    info
}

/// Classify one identifier and consume any `.column` / `(` continuation.
/// Returns the new scan position.
fn consume_identifier(
    fragment: &str,
    bytes: &[u8],
    mut pos: usize,
    word: &str,
    info: &mut ExpressionInfo,
) -> usize {
    let upper = word.to_uppercase();

    // Qualified reference: alias.column
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let start = pos;
        while pos < bytes.len() && is_ident_char(bytes[pos]) {
            pos += 1;
        }
        if pos > start {
            info.qualifiers.insert(word.to_string());
            info.referenced_columns
                .insert(fragment[start..pos].to_string());
        }
        return pos;
    }

    // Function application: identifier immediately followed by `(`
    let mut lookahead = pos;
    while lookahead < bytes.len() && (bytes[lookahead] as char).is_whitespace() {
        lookahead += 1;
    }
    if lookahead < bytes.len() && bytes[lookahead] == b'(' {
        info.functions_used.insert(upper.clone());
        if AGGREGATE_FUNCTIONS.contains(&upper.as_str()) {
            info.is_aggregate = true;
        }
        return pos;
    }

    if !SQL_KEYWORDS.contains(upper.as_str()) {
        info.referenced_columns.insert(word.to_string());
    }
    pos
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whether a word is a recognised SQL keyword.
pub fn is_sql_keyword(word: &str) -> bool {
    SQL_KEYWORDS.contains(word.to_uppercase().as_str())
}

/// The fragment as a single bareword identifier, if that is all it is.
pub fn as_single_bareword(fragment: &str) -> Option<&str> {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return None;
    }
    let bytes = trimmed.as_bytes();
    if !is_ident_start(bytes[0]) {
        return None;
    }
    if bytes.iter().all(|b| is_ident_char(*b)) && !SQL_KEYWORDS.contains(trimmed.to_uppercase().as_str())
    {
        Some(trimmed)
    } else {
        None
    }
}
