//! Cross-model validation
//!
//! Runs every corpus invariant over the frozen model mapping, accumulating
//! diagnostics instead of short-circuiting. Errors block generation;
//! warnings are reported and generation proceeds.

use std::collections::{BTreeMap, HashSet};

use crate::analyze::analyze_expression;
use crate::generate::{alias_map, Dialect};
use crate::model::{Audit, Diagnostic, Model, ModelKind};
use crate::util::contains_ci;

/// Validate the whole corpus. The returned list is unsorted; callers sort
/// into report order before printing.
pub fn validate(models: &BTreeMap<String, Model>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for model in models.values() {
        let mut checker = Checker {
            model,
            models,
            diagnostics: &mut diagnostics,
        };
        checker.run();
    }
    diagnostics
}

/// Dialect-aware pass: warn about functions invoked in expressions that
/// are not in the dialect's builtin allowlist. Runs only when a dialect
/// has been selected (i.e. during generation, not bare validation).
pub fn validate_functions(
    models: &BTreeMap<String, Model>,
    dialect: &dyn Dialect,
) -> Vec<Diagnostic> {
    let builtins = dialect.builtin_functions();
    let mut diagnostics = Vec::new();
    for model in models.values() {
        for (idx, column) in model.columns.iter().enumerate() {
            if column.is_identity() {
                continue;
            }
            let info = analyze_expression(&column.expression);
            for function in &info.functions_used {
                if !builtins.contains(&function.as_str()) {
                    diagnostics.push(Diagnostic::warning(
                        model.name.clone(),
                        format!("columns[{}].expression", idx),
                        format!(
                            "function {} is not a recognised builtin of dialect {}",
                            function,
                            dialect.name()
                        ),
                    ));
                }
            }
        }
    }
    diagnostics
}

struct Checker<'a> {
    model: &'a Model,
    models: &'a BTreeMap<String, Model>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(self.model.name.clone(), path, message));
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(self.model.name.clone(), path, message));
    }

    fn run(&mut self) {
        self.check_sources();
        self.check_reference_tables();
        self.check_cte_refs();
        self.check_output_column_subsets();
        self.check_aggregations();
        self.check_having();
        self.check_cte_optimization();
        self.check_audits();
        self.check_expressions();
    }

    /// Whether `table` is a legal source for this model (I2).
    fn is_known_source(&self, table: &str) -> bool {
        self.model.depends_on.iter().any(|d| d == table)
            || self.model.base_table.as_deref() == Some(table)
    }

    /// B1 + I9: every model needs a source, and never itself.
    fn check_sources(&mut self) {
        if self.model.base_table.is_none() && self.model.depends_on.is_empty() {
            self.error(
                "source",
                "model has no base_table and no depends_on; a SELECT without FROM cannot be generated",
            );
        }
        if self.model.depends_on.iter().any(|d| d == &self.model.name) {
            self.error("source.depends_on", "model depends on itself");
        }
    }

    /// I2: every reference_table resolves to depends_on or base_table.
    fn check_reference_tables(&mut self) {
        let mut externals_warned: HashSet<String> = HashSet::new();

        for (idx, column) in self.model.columns.iter().enumerate() {
            if let Some(table) = &column.reference_table {
                if !self.is_known_source(table) {
                    self.error(
                        format!("columns[{}].reference_table", idx),
                        format!("{} is not in depends_on and is not the base_table", table),
                    );
                } else {
                    self.warn_unchecked_external(table, &mut externals_warned);
                }
            }
        }
        for (idx, filter) in self.model.filters.iter().enumerate() {
            if !self.is_known_source(&filter.reference_table) {
                self.error(
                    format!("filters[{}].reference_table", idx),
                    format!(
                        "{} is not in depends_on and is not the base_table",
                        filter.reference_table
                    ),
                );
            }
        }
        for (idx, fk) in self.model.relationships.iter().enumerate() {
            if !self.is_known_source(&fk.references_table) {
                self.error(
                    format!("relationships[{}].references_table", idx),
                    format!(
                        "{} is not in depends_on and is not the base_table",
                        fk.references_table
                    ),
                );
            }
        }
    }

    /// Schema-qualified references to tables outside the corpus cannot be
    /// column-checked; say so once per external.
    fn warn_unchecked_external(&mut self, table: &str, warned: &mut HashSet<String>) {
        if table.contains('.') && !self.models.contains_key(table) && warned.insert(table.to_string())
        {
            self.warn(
                "source.depends_on",
                format!(
                    "external table {} is not a model in this corpus; its columns cannot be checked",
                    table
                ),
            );
        }
    }

    /// I3: cte_refs members exist, have kind CTE, and are in depends_on.
    fn check_cte_refs(&mut self) {
        for (idx, cte) in self.model.cte_refs.iter().enumerate() {
            match self.models.get(cte) {
                None => self.error(
                    format!("ctes[{}]", idx),
                    format!("referenced CTE model {} does not exist", cte),
                ),
                Some(target) if target.kind != ModelKind::Cte => self.error(
                    format!("ctes[{}]", idx),
                    format!("{} has kind {}, expected CTE", cte, target.kind.as_str()),
                ),
                Some(_) => {}
            }
            if !self.model.depends_on.iter().any(|d| d == cte) {
                self.error(
                    format!("ctes[{}]", idx),
                    format!("{} must also be listed in depends_on", cte),
                );
            }
        }
    }

    /// I5: grain, audit columns, and relationship local columns name output
    /// columns.
    fn check_output_column_subsets(&mut self) {
        let outputs: HashSet<&str> = self.model.output_columns().collect();

        for (idx, column) in self.model.grain.iter().enumerate() {
            if !outputs.contains(column.as_str()) {
                self.error(
                    format!("grain[{}]", idx),
                    format!("{} is not an output column", column),
                );
            }
        }
        for (idx, audit) in self.model.audits.iter().enumerate() {
            for column in audit.columns() {
                if !outputs.contains(column) {
                    self.error(
                        format!("audits[{}].columns", idx),
                        format!("{} is not an output column", column),
                    );
                }
            }
        }
        for (idx, fk) in self.model.relationships.iter().enumerate() {
            if !outputs.contains(fk.local_column.as_str()) {
                self.error(
                    format!("relationships[{}].local_column", idx),
                    format!("{} is not an output column", fk.local_column),
                );
            }
        }
    }

    /// I6: aggregate columns require a GROUP BY covering every
    /// non-aggregate output column. GROUP BY members must themselves be
    /// output columns.
    fn check_aggregations(&mut self) {
        let outputs: HashSet<&str> = self.model.output_columns().collect();
        for (idx, column) in self.model.group_by.iter().enumerate() {
            if !outputs.contains(column.as_str()) {
                self.error(
                    format!("aggregations.group_by[{}]", idx),
                    format!("{} is not an output column", column),
                );
            }
        }

        let aggregate_columns: Vec<&str> = self
            .model
            .columns
            .iter()
            .filter(|c| analyze_expression(&c.expression).is_aggregate)
            .map(|c| c.name.as_str())
            .collect();
        if aggregate_columns.is_empty() {
            return;
        }

        if self.model.group_by.is_empty() {
            self.error(
                "aggregations.group_by",
                format!(
                    "model has aggregate column(s) [{}] but no group_by",
                    aggregate_columns.join(", ")
                ),
            );
            return;
        }
        for column in &self.model.columns {
            let is_aggregate = aggregate_columns.contains(&column.name.as_str());
            if !is_aggregate && !self.model.group_by.iter().any(|g| g == &column.name) {
                self.error(
                    "aggregations.group_by",
                    format!("non-aggregate output column {} missing from group_by", column.name),
                );
            }
        }
    }

    /// I7: having predicates may reference output columns or the exact
    /// aggregate expressions declared by the model's columns.
    fn check_having(&mut self) {
        if self.model.having.is_empty() {
            return;
        }
        let outputs: HashSet<&str> = self.model.output_columns().collect();
        let aggregate_expressions: Vec<&str> = self
            .model
            .columns
            .iter()
            .filter(|c| analyze_expression(&c.expression).is_aggregate)
            .map(|c| c.expression.as_str())
            .collect();

        for (idx, predicate) in self.model.having.iter().enumerate() {
            // Blank out declared aggregate expressions, then everything the
            // remainder references must be an output column.
            let mut remainder = predicate.clone();
            for expr in &aggregate_expressions {
                remainder = remainder.replace(expr, " ");
            }
            let info = analyze_expression(&remainder);
            for column in &info.referenced_columns {
                if !outputs.contains(column.as_str()) {
                    self.error(
                        format!("aggregations.having[{}]", idx),
                        format!(
                            "{} is neither an output column nor a declared aggregate expression",
                            column
                        ),
                    );
                }
            }
        }
    }

    /// I8: CTE models carry no physical optimization.
    fn check_cte_optimization(&mut self) {
        if self.model.kind == ModelKind::Cte && self.model.optimization.is_some() {
            self.error("optimization", "CTE models cannot declare optimization");
        }
    }

    /// Audit value checks: B3 plus type-compatibility warnings.
    fn check_audits(&mut self) {
        for (idx, audit) in self.model.audits.iter().enumerate() {
            match audit {
                Audit::AcceptedValues { values } => {
                    if values.is_empty() {
                        self.error(
                            format!("audits[{}].values", idx),
                            "ACCEPTED_VALUES requires at least one column",
                        );
                    }
                    for (column, literals) in values {
                        if literals.is_empty() {
                            self.error(
                                format!("audits[{}].values.{}", idx, column),
                                "ACCEPTED_VALUES requires at least one allowed literal",
                            );
                        }
                    }
                }
                Audit::PositiveValues { columns } => {
                    for column in columns {
                        if let Some(spec) = self.model.column(column) {
                            if is_character_type(&spec.data_type) {
                                self.warn(
                                    format!("audits[{}].columns", idx),
                                    format!(
                                        "POSITIVE_VALUES on {} with character type {}",
                                        column, spec.data_type
                                    ),
                                );
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Expression-level warnings: unknown columns in the referenced source
    /// model, and qualifiers no alias introduces.
    fn check_expressions(&mut self) {
        let aliases = alias_map(self.model);
        let known_qualifiers: HashSet<&str> = aliases
            .values()
            .map(String::as_str)
            .chain(aliases.keys().map(String::as_str))
            .collect();

        for (idx, column) in self.model.columns.iter().enumerate() {
            let source = column
                .reference_table
                .as_deref()
                .or(self.model.base_table.as_deref());

            if column.is_identity() {
                self.check_source_column(
                    source,
                    &column.name,
                    &format!("columns[{}].name", idx),
                );
                continue;
            }

            let info = analyze_expression(&column.expression);
            for qualifier in &info.qualifiers {
                if !known_qualifiers.contains(qualifier.as_str()) {
                    self.warn(
                        format!("columns[{}].expression", idx),
                        format!(
                            "expression references alias {} not introduced by base_table or relationships",
                            qualifier
                        ),
                    );
                }
            }
            if info.qualifiers.is_empty() {
                for referenced in &info.referenced_columns {
                    self.check_source_column(
                        source,
                        referenced,
                        &format!("columns[{}].expression", idx),
                    );
                }
            }
        }
    }

    /// Warn when a referenced source model does not expose the column.
    fn check_source_column(&mut self, source: Option<&str>, column: &str, path: &str) {
        let Some(source) = source else {
            return;
        };
        let Some(source_model) = self.models.get(source) else {
            return; // external; covered by the unchecked-external warning
        };
        if source_model.column(column).is_none() {
            let available: Vec<&str> = source_model.output_columns().collect();
            self.warn(
                path,
                format!(
                    "column {} not present in {}; available: [{}]",
                    column,
                    source,
                    available.join(", ")
                ),
            );
        }
    }
}

/// Character-ish data types that make numeric audits suspicious.
fn is_character_type(data_type: &str) -> bool {
    ["CHAR", "TEXT", "STRING"]
        .iter()
        .any(|t| contains_ci(data_type, t))
}
