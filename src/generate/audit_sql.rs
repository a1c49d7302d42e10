//! Audit SQL emission
//!
//! One standalone validation statement per audit, keyed
//! `<model>.<audit_index>` so state diffs stay stable. Every statement
//! selects a failure count; the expected result is zero.

use crate::model::{Audit, Model};

use super::dialect::{quote_qualified, Dialect};

/// A single emitted audit statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStatement {
    /// Stable key: `<model>.<audit_index>`
    pub key: String,
    pub audit_type: &'static str,
    pub sql: String,
}

/// Emit every audit statement for a model.
pub fn emit_audits(model: &Model, dialect: &dyn Dialect) -> Vec<AuditStatement> {
    let target = quote_qualified(dialect, &model.name);
    model
        .audits
        .iter()
        .enumerate()
        .map(|(index, audit)| AuditStatement {
            key: format!("{}.{}", model.name, index),
            audit_type: audit.type_name(),
            sql: render_audit(audit, &target, dialect),
        })
        .collect()
}

fn render_audit(audit: &Audit, target: &str, dialect: &dyn Dialect) -> String {
    match audit {
        Audit::NotNull { columns } => {
            let predicate = columns
                .iter()
                .map(|c| format!("{} IS NULL", dialect.quote_ident(c)))
                .collect::<Vec<_>>()
                .join(" OR ");
            format!(
                "SELECT COUNT(*) AS failures FROM {} WHERE {};",
                target, predicate
            )
        }
        Audit::PositiveValues { columns } => {
            let predicate = columns
                .iter()
                .map(|c| {
                    let quoted = dialect.quote_ident(c);
                    format!("{} IS NULL OR {} <= 0", quoted, quoted)
                })
                .collect::<Vec<_>>()
                .join(" OR ");
            format!(
                "SELECT COUNT(*) AS failures FROM {} WHERE {};",
                target, predicate
            )
        }
        Audit::UniqueCombination { columns } => {
            let column_list = columns
                .iter()
                .map(|c| dialect.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "SELECT COUNT(*) AS failures FROM (SELECT {} FROM {} GROUP BY {} HAVING COUNT(*) > 1) AS duplicate_groups;",
                column_list, target, column_list
            )
        }
        Audit::AcceptedValues { values } => {
            let predicate = values
                .iter()
                .map(|(column, literals)| {
                    let rendered = literals
                        .iter()
                        .map(|l| render_literal(l))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{} NOT IN ({})", dialect.quote_ident(column), rendered)
                })
                .collect::<Vec<_>>()
                .join(" OR ");
            format!(
                "SELECT COUNT(*) AS failures FROM {} WHERE {};",
                target, predicate
            )
        }
    }
}

/// Numbers pass through bare; everything else becomes a quoted string.
fn render_literal(literal: &str) -> String {
    if literal.parse::<f64>().is_ok() {
        literal.to_string()
    } else {
        format!("'{}'", literal.replace('\'', "''"))
    }
}
