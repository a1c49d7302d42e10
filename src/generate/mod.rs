//! SQL generation
//!
//! Assembles one deterministic SQL artifact per materializable model:
//! dialect DDL prelude, WITH list expanded from `cte_refs` in resolver
//! order, SELECT list, FROM/JOIN clauses, WHERE conjunction, and optional
//! GROUP BY/HAVING. CTE models render as the bare SELECT body so parents
//! can splice them.

mod alias;
mod audit_sql;
mod dialect;

pub use alias::{alias_map, PRIMARY_ALIAS};
pub use audit_sql::{emit_audits, AuditStatement};
pub use dialect::{dialect_for, quote_qualified, Dialect, PostgresDialect, SparkDialect};

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use crate::analyze::{as_single_bareword, is_sql_keyword};
use crate::error::MedallionError;
use crate::graph::DependencyGraph;
use crate::model::{Model, ModelKind};

/// Below this model count, sequential generation avoids rayon overhead.
const PARALLEL_THRESHOLD: usize = 16;

static MACRO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)\s*\(([^)]*)\)").unwrap());

/// One emitted SQL document plus its audit statements.
#[derive(Debug, Clone)]
pub struct SqlArtifact {
    pub model: String,
    pub kind: ModelKind,
    pub sql: String,
    pub audits: Vec<AuditStatement>,
}

/// Per-corpus SQL generator bound to one dialect.
pub struct SqlGenerator<'a> {
    models: &'a BTreeMap<String, Model>,
    graph: &'a DependencyGraph,
    dialect: &'a dyn Dialect,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(
        models: &'a BTreeMap<String, Model>,
        graph: &'a DependencyGraph,
        dialect: &'a dyn Dialect,
    ) -> Self {
        SqlGenerator {
            models,
            graph,
            dialect,
        }
    }

    /// Generate artifacts for every materializable model, in topological
    /// order. Parallelised above a small threshold; the output order and
    /// bytes are identical either way.
    pub fn generate_all(&self) -> Result<Vec<SqlArtifact>, MedallionError> {
        let order = self.graph.topo_order()?;
        let targets: Vec<&Model> = order
            .iter()
            .filter_map(|name| self.models.get(name))
            .filter(|m| m.is_materializable())
            .collect();

        if targets.len() >= PARALLEL_THRESHOLD {
            targets
                .par_iter()
                .map(|model| self.generate_model(model))
                .collect()
        } else {
            targets
                .iter()
                .map(|model| self.generate_model(model))
                .collect()
        }
    }

    /// Generate the artifact for a single model.
    pub fn generate_model(&self, model: &Model) -> Result<SqlArtifact, MedallionError> {
        let prelude = match model.kind {
            ModelKind::Table => self
                .dialect
                .create_table_prelude(&model.name, model.optimization.as_ref()),
            ModelKind::View => self.dialect.create_view_prelude(&model.name),
            ModelKind::Cte => {
                return Err(MedallionError::GenerationError {
                    model: model.name.clone(),
                    message: "CTE models do not materialize".to_string(),
                })
            }
        };

        let mut sql = String::new();
        sql.push_str(&prelude);
        sql.push('\n');

        let with_list = self.render_with_list(model)?;
        if !with_list.is_empty() {
            sql.push_str(&with_list);
            sql.push('\n');
        }

        sql.push_str(&self.render_select(model)?);
        sql.push_str(";\n");

        if let Some(optimization) = &model.optimization {
            for statement in self.dialect.index_statements(&model.name, optimization) {
                sql.push('\n');
                sql.push_str(&statement);
                sql.push('\n');
            }
        }

        Ok(SqlArtifact {
            model: model.name.clone(),
            kind: model.kind,
            sql,
            audits: emit_audits(model, self.dialect),
        })
    }

    /// WITH list for the model's transitive CTE closure, innermost first.
    fn render_with_list(&self, model: &Model) -> Result<String, MedallionError> {
        let closure = self.graph.cte_closure(self.models, model)?;
        if closure.is_empty() {
            return Ok(String::new());
        }

        let mut entries = Vec::with_capacity(closure.len());
        for name in &closure {
            let cte = self.models.get(name).ok_or_else(|| MedallionError::GenerationError {
                model: model.name.clone(),
                message: format!("missing CTE model: {}", name),
            })?;
            let body = indent(&self.render_select(cte)?, 4);
            entries.push(format!(
                "{} AS (\n{}\n)",
                self.dialect.quote_ident(name),
                body
            ));
        }
        Ok(format!("WITH {}", entries.join(",\n")))
    }

    /// SELECT body of a model: select list, FROM, JOINs, WHERE, GROUP
    /// BY/HAVING. No DDL prelude, no trailing terminator.
    fn render_select(&self, model: &Model) -> Result<String, MedallionError> {
        let aliases = alias_map(model);
        let primary = model
            .primary_source()
            .ok_or_else(|| MedallionError::GenerationError {
                model: model.name.clone(),
                message: "model has no source to select from".to_string(),
            })?;

        if model.columns.is_empty() {
            return Err(MedallionError::GenerationError {
                model: model.name.clone(),
                message: "model declares no output columns".to_string(),
            });
        }

        let mut lines = Vec::new();
        lines.push("SELECT".to_string());

        let mut select_items = Vec::with_capacity(model.columns.len());
        for column in &model.columns {
            let alias = self.alias_for(
                model,
                &aliases,
                column.reference_table.as_deref().unwrap_or(primary),
            )?;
            let rendered = self.render_column_expression(model, column, alias)?;
            select_items.push(format!(
                "    {} AS {}",
                rendered,
                self.dialect.quote_ident(&column.name)
            ));
        }
        lines.push(select_items.join(",\n"));

        lines.push(format!(
            "FROM {} AS {}",
            quote_qualified(self.dialect, primary),
            PRIMARY_ALIAS
        ));

        for fk in &model.relationships {
            let alias = self.alias_for(model, &aliases, &fk.references_table)?;
            lines.push(format!(
                "{} {} AS {} ON {}.{} = {}.{}",
                fk.join_type.sql_keyword(),
                quote_qualified(self.dialect, &fk.references_table),
                alias,
                PRIMARY_ALIAS,
                self.dialect.quote_ident(&fk.local_column),
                alias,
                self.dialect.quote_ident(&fk.references_column)
            ));
        }

        if !model.filters.is_empty() {
            let mut predicates = Vec::with_capacity(model.filters.len());
            for filter in &model.filters {
                let alias = self.alias_for(model, &aliases, &filter.reference_table)?;
                let condition = self.expand_macros(model, &filter.condition)?;
                predicates.push(format!("({})", qualify_barewords(&condition, alias)));
            }
            lines.push(format!("WHERE {}", predicates.join("\n  AND ")));
        }

        if !model.group_by.is_empty() {
            let mut items = Vec::with_capacity(model.group_by.len());
            for name in &model.group_by {
                items.push(self.render_group_item(model, &aliases, name)?);
            }
            lines.push(format!("GROUP BY {}", items.join(", ")));
            if !model.having.is_empty() {
                let mut predicates = Vec::with_capacity(model.having.len());
                for predicate in &model.having {
                    predicates.push(self.expand_macros(model, predicate)?);
                }
                lines.push(format!("HAVING {}", predicates.join("\n   AND ")));
            }
        }

        Ok(lines.join("\n"))
    }

    /// Rendered source expression of one column, alias-qualified.
    ///
    /// Empty expression: identity mapping of the same-named source column.
    /// A single bareword: that source column. Anything else: verbatim
    /// after macro expansion; no alias injection into compound fragments.
    fn render_column_expression(
        &self,
        model: &Model,
        column: &crate::model::ColumnSpec,
        alias: &str,
    ) -> Result<String, MedallionError> {
        if column.is_identity() {
            return Ok(format!("{}.{}", alias, self.dialect.quote_ident(&column.name)));
        }
        if let Some(word) = as_single_bareword(&column.expression) {
            return Ok(format!("{}.{}", alias, self.dialect.quote_ident(word)));
        }
        self.expand_macros(model, column.expression.trim())
    }

    /// GROUP BY item: the grouped output column's source expression.
    fn render_group_item(
        &self,
        model: &Model,
        aliases: &BTreeMap<String, String>,
        name: &str,
    ) -> Result<String, MedallionError> {
        let column = model.column(name).ok_or_else(|| MedallionError::GenerationError {
            model: model.name.clone(),
            message: format!("group_by names unknown column: {}", name),
        })?;
        let primary = model.primary_source().unwrap_or_default();
        let alias = self.alias_for(
            model,
            aliases,
            column.reference_table.as_deref().unwrap_or(primary),
        )?;
        self.render_column_expression(model, column, alias)
    }

    fn alias_for<'m>(
        &self,
        model: &Model,
        aliases: &'m BTreeMap<String, String>,
        table: &str,
    ) -> Result<&'m str, MedallionError> {
        aliases
            .get(table)
            .map(String::as_str)
            .ok_or_else(|| MedallionError::GenerationError {
                model: model.name.clone(),
                message: format!("no alias mapping for source {}", table),
            })
    }

    /// Expand `@macro(arg)` placeholders through the dialect.
    fn expand_macros(&self, model: &Model, fragment: &str) -> Result<String, MedallionError> {
        let mut result = String::with_capacity(fragment.len());
        let mut last = 0;
        for captures in MACRO_RE.captures_iter(fragment) {
            let whole = captures.get(0).unwrap();
            let name = &captures[1];
            let argument = captures[2].trim();
            if !self.dialect.supports_macro(name) {
                return Err(MedallionError::GenerationError {
                    model: model.name.clone(),
                    message: format!(
                        "dialect {} does not support macro @{}",
                        self.dialect.name(),
                        name
                    ),
                });
            }
            let expansion = self.dialect.expand_macro(name, argument).ok_or_else(|| {
                MedallionError::GenerationError {
                    model: model.name.clone(),
                    message: format!("macro @{} failed to expand", name),
                }
            })?;
            result.push_str(&fragment[last..whole.start()]);
            result.push_str(&expansion);
            last = whole.end();
        }
        result.push_str(&fragment[last..]);
        Ok(result)
    }
}

/// Prefix bareword column identifiers in a predicate with `alias.`.
///
/// Skips string literals, numbers, keywords, function applications, and
/// identifiers that are already qualified.
fn qualify_barewords(fragment: &str, alias: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut result = String::with_capacity(fragment.len() + 16);
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;

        if c == '\'' {
            let start = pos;
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
            result.push_str(&fragment[start..pos]);
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = pos;
            while pos < bytes.len()
                && ((bytes[pos] as char).is_ascii_alphanumeric() || bytes[pos] == b'_')
            {
                pos += 1;
            }
            let word = &fragment[start..pos];

            let already_qualified = start > 0 && bytes[start - 1] == b'.';
            let qualifies_next = pos < bytes.len() && bytes[pos] == b'.';
            let mut lookahead = pos;
            while lookahead < bytes.len() && (bytes[lookahead] as char).is_whitespace() {
                lookahead += 1;
            }
            let is_function = lookahead < bytes.len() && bytes[lookahead] == b'(';

            if already_qualified || qualifies_next || is_function || is_sql_keyword(word) {
                result.push_str(word);
            } else {
                result.push_str(alias);
                result.push('.');
                result.push_str(word);
            }
            continue;
        }

        result.push(c);
        pos += 1;
    }

    result
}

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
