//! Postgres dialect

use super::{is_plain_identifier, quote_qualified, Dialect};
use crate::model::Optimization;

const BUILTIN_FUNCTIONS: &[&str] = &[
    "ABS", "AVG", "CAST", "CEIL", "COALESCE", "CONCAT", "COUNT", "DATE_TRUNC", "EXTRACT",
    "FLOOR", "GREATEST", "LEAST", "LENGTH", "LOWER", "LPAD", "MAX", "MIN", "NOW", "NULLIF",
    "ROUND", "RPAD", "SPLIT_PART", "STDDEV", "SUBSTRING", "SUM", "TO_CHAR", "TO_DATE", "TRIM",
    "UPPER", "VARIANCE",
];

/// Reserved words that force quoting even for plain identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "check", "column", "desc",
    "distinct", "else", "end", "from", "group", "having", "in", "is", "join", "like", "limit",
    "not", "null", "offset", "on", "or", "order", "select", "table", "then", "to", "union",
    "user", "when", "where",
];

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, ident: &str) -> String {
        if is_plain_identifier(ident) && !RESERVED.contains(&ident.to_lowercase().as_str()) {
            ident.to_string()
        } else {
            format!("\"{}\"", ident.replace('"', "\"\""))
        }
    }

    fn create_table_prelude(&self, name: &str, optimization: Option<&Optimization>) -> String {
        // Postgres has no CTAS partitioning clause; layout hints surface as
        // index statements instead.
        if let Some(opt) = optimization {
            if !opt.partitioned_by.is_empty() {
                log::debug!("postgres ignores partitioned_by on {}", name);
            }
            if !opt.clustered_by.is_empty() {
                log::debug!("postgres ignores clustered_by on {}", name);
            }
        }
        format!("CREATE TABLE {} AS", quote_qualified(self, name))
    }

    fn create_view_prelude(&self, name: &str) -> String {
        format!("CREATE OR REPLACE VIEW {} AS", quote_qualified(self, name))
    }

    fn index_statements(&self, name: &str, optimization: &Optimization) -> Vec<String> {
        optimization
            .indexes
            .iter()
            .filter(|index| !index.columns.is_empty())
            .map(|index| {
                let columns = index
                    .columns
                    .iter()
                    .map(|c| self.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                match &index.name {
                    Some(index_name) => format!(
                        "CREATE INDEX {} ON {} ({});",
                        self.quote_ident(index_name),
                        quote_qualified(self, name),
                        columns
                    ),
                    None => format!("CREATE INDEX ON {} ({});", quote_qualified(self, name), columns),
                }
            })
            .collect()
    }

    fn supports_macro(&self, name: &str) -> bool {
        name == "newpk"
    }

    fn expand_macro(&self, name: &str, _argument: &str) -> Option<String> {
        match name {
            "newpk" => Some("gen_random_uuid()".to_string()),
            _ => None,
        }
    }

    fn builtin_functions(&self) -> &'static [&'static str] {
        BUILTIN_FUNCTIONS
    }
}
