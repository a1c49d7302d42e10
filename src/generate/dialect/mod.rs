//! Dialect adapters
//!
//! Everything dialect-specific lives behind the `Dialect` trait: identifier
//! quoting, DDL prelude templates, physical-layout clause shapes, the
//! recognised built-in functions, and placeholder macro expansion. Adding
//! a dialect means adding one implementation; the generator core stays
//! untouched.

mod postgres;
mod spark;

pub use postgres::PostgresDialect;
pub use spark::SparkDialect;

use crate::error::MedallionError;
use crate::model::Optimization;

/// Capability set a SQL dialect provides to the generator.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote a single identifier when it needs quoting.
    fn quote_ident(&self, ident: &str) -> String;

    /// DDL prelude for a TABLE model (up to and including `AS`).
    fn create_table_prelude(&self, name: &str, optimization: Option<&Optimization>) -> String;

    /// DDL prelude for a VIEW model (up to and including `AS`).
    fn create_view_prelude(&self, name: &str) -> String;

    /// Standalone statements for declared indexes, if the dialect has them.
    fn index_statements(&self, name: &str, optimization: &Optimization) -> Vec<String>;

    /// Whether the dialect implements a placeholder macro.
    fn supports_macro(&self, name: &str) -> bool;

    /// Expand a supported placeholder macro; None when unsupported.
    fn expand_macro(&self, name: &str, argument: &str) -> Option<String>;

    /// Built-in function names the expression analyzer should not treat as
    /// column references.
    fn builtin_functions(&self) -> &'static [&'static str];
}

/// Quote a possibly schema-qualified name part by part.
pub fn quote_qualified(dialect: &dyn Dialect, name: &str) -> String {
    name.split('.')
        .map(|part| dialect.quote_ident(part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Whether an identifier survives unquoted in both supported dialects.
pub(crate) fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Look up a dialect implementation by selector string.
pub fn dialect_for(name: &str) -> Result<Box<dyn Dialect>, MedallionError> {
    match name.to_lowercase().as_str() {
        "postgres" => Ok(Box::new(PostgresDialect)),
        "spark" => Ok(Box::new(SparkDialect)),
        other => Err(MedallionError::UnknownDialect {
            name: other.to_string(),
        }),
    }
}
