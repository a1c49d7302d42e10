//! Spark dialect

use super::{is_plain_identifier, quote_qualified, Dialect};
use crate::model::Optimization;

const BUILTIN_FUNCTIONS: &[&str] = &[
    "ABS", "AVG", "CAST", "CEIL", "COALESCE", "COLLECT_LIST", "COLLECT_SET", "CONCAT", "COUNT",
    "CURRENT_TIMESTAMP", "DATE_ADD", "DATE_FORMAT", "DATE_TRUNC", "FLOOR", "GREATEST", "LEAST",
    "LENGTH", "LOWER", "LPAD", "MAX", "MIN", "NULLIF", "REGEXP_REPLACE", "ROUND", "RPAD",
    "SPLIT", "STDDEV", "SUBSTRING", "SUM", "TO_DATE", "TO_TIMESTAMP", "TRIM", "UPPER",
    "VARIANCE",
];

const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "column", "desc", "distinct",
    "else", "end", "from", "group", "having", "in", "is", "join", "like", "limit", "not",
    "null", "on", "or", "order", "select", "table", "then", "to", "union", "user", "when",
    "where",
];

pub struct SparkDialect;

impl Dialect for SparkDialect {
    fn name(&self) -> &'static str {
        "spark"
    }

    fn quote_ident(&self, ident: &str) -> String {
        if is_plain_identifier(ident) && !RESERVED.contains(&ident.to_lowercase().as_str()) {
            ident.to_string()
        } else {
            format!("`{}`", ident.replace('`', "``"))
        }
    }

    fn create_table_prelude(&self, name: &str, optimization: Option<&Optimization>) -> String {
        let mut prelude = format!(
            "CREATE OR REPLACE TABLE {}\nUSING DELTA",
            quote_qualified(self, name)
        );
        if let Some(opt) = optimization {
            if !opt.partitioned_by.is_empty() {
                let columns = opt
                    .partitioned_by
                    .iter()
                    .map(|c| self.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                prelude.push_str(&format!("\nPARTITIONED BY ({})", columns));
            }
            if !opt.clustered_by.is_empty() {
                let columns = opt
                    .clustered_by
                    .iter()
                    .map(|c| self.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                prelude.push_str(&format!("\nCLUSTER BY ({})", columns));
            }
        }
        prelude.push_str("\nAS");
        prelude
    }

    fn create_view_prelude(&self, name: &str) -> String {
        format!("CREATE OR REPLACE VIEW {} AS", quote_qualified(self, name))
    }

    fn index_statements(&self, _name: &str, _optimization: &Optimization) -> Vec<String> {
        // Delta tables have no secondary indexes
        Vec::new()
    }

    fn supports_macro(&self, name: &str) -> bool {
        matches!(name, "newpk" | "Feature")
    }

    fn expand_macro(&self, name: &str, argument: &str) -> Option<String> {
        match name {
            "newpk" => Some("uuid()".to_string()),
            "Feature" => Some(format!("feature_store.lookup({})", argument)),
            _ => None,
        }
    }

    fn builtin_functions(&self) -> &'static [&'static str] {
        BUILTIN_FUNCTIONS
    }
}
