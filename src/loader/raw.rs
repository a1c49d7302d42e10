//! Raw definition documents
//!
//! Converts a merged YAML document into the typed model IR. The document is
//! held as a generic `serde_yaml::Value` so unknown top-level sections can
//! reject the file and unknown fields inside a section can warn without
//! aborting the load. Legacy audit shorthands are coerced here, and the
//! `ctes`/`relationships` sections are normalised from both of their
//! authored shapes.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::model::{
    Audit, ColumnSpec, Diagnostic, ForeignKey, IndexSpec, JoinType, Layer, Model, ModelKind,
    Optimization, RelationshipType, WhereClause,
};

/// The recognised top-level sections of a definition file.
pub const RECOGNISED_SECTIONS: &[&str] = &[
    "model",
    "source",
    "transformations",
    "filters",
    "ctes",
    "aggregations",
    "audits",
    "grain",
    "relationships",
    "optimization",
];

const MODEL_FIELDS: &[&str] = &[
    "name",
    "description",
    "layer",
    "kind",
    "owner",
    "tags",
    "domain",
    "refresh_frequency",
];
const SOURCE_FIELDS: &[&str] = &["base_table", "depends_on"];
const COLUMN_FIELDS: &[&str] = &[
    "name",
    "reference_table",
    "expression",
    "description",
    "data_type",
    "operator",
];
const FILTER_FIELDS: &[&str] = &["reference_table", "condition", "operator"];
const AGGREGATION_FIELDS: &[&str] = &["group_by", "having"];
const AUDIT_FIELDS: &[&str] = &[
    "type",
    "columns",
    "values",
    "not_null",
    "positive_values",
    "unique_combination",
    "accepted_values",
    "operator",
];
const FOREIGN_KEY_FIELDS: &[&str] = &[
    "local_column",
    "references_table",
    "references_column",
    "relationship_type",
    "join_type",
    "operator",
];
const OPTIMIZATION_FIELDS: &[&str] = &["partitioned_by", "clustered_by", "indexes"];
const INDEX_FIELDS: &[&str] = &["name", "columns"];

/// Parse one definition file into a generic document.
///
/// Returns None (with an error diagnostic) when the file is unreadable,
/// not valid YAML, not a mapping, or contains an unrecognised top-level
/// section. The failure is scoped to the file, not the corpus.
pub fn parse_document(path: &Path, diagnostics: &mut Vec<Diagnostic>) -> Option<Value> {
    let owner = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("<unknown>")
        .to_string();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            diagnostics.push(Diagnostic::error(
                owner,
                "",
                format!("failed to read {}: {}", path.display(), e),
            ));
            return None;
        }
    };

    let doc: Value = match serde_yaml::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            diagnostics.push(Diagnostic::error(
                owner,
                "",
                format!("invalid YAML in {}: {}", path.display(), e),
            ));
            return None;
        }
    };

    let map = match doc.as_mapping() {
        Some(map) => map,
        None => {
            diagnostics.push(Diagnostic::error(
                owner,
                "",
                format!("{} is not a key/value document", path.display()),
            ));
            return None;
        }
    };

    let mut ok = true;
    for key in map.keys() {
        let key_name = key.as_str().unwrap_or_default();
        if !RECOGNISED_SECTIONS.contains(&key_name) {
            diagnostics.push(Diagnostic::error(
                owner.clone(),
                key_name.to_string(),
                format!("unknown top-level section: {}", key_name),
            ));
            ok = false;
        }
    }
    if !ok {
        return None;
    }

    Some(doc)
}

/// Build the typed model from a merged document.
///
/// Returns None (after pushing error diagnostics) when a required field is
/// missing or an enum value is malformed; pushes warnings for unknown
/// fields inside recognised sections.
pub fn model_from_document(
    stem: &str,
    doc: Value,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Model> {
    let map = doc.as_mapping()?;

    let model_section = map.get("model").and_then(Value::as_mapping);
    let name = model_section
        .and_then(|m| get_string(m, "name"))
        .unwrap_or_else(|| stem.to_string());

    let mut converter = Converter {
        name: name.clone(),
        diagnostics,
        failed: false,
    };
    let model = converter.convert(map, name);
    if converter.failed {
        return None;
    }
    model
}

struct Converter<'a> {
    name: String,
    diagnostics: &'a mut Vec<Diagnostic>,
    failed: bool,
}

impl<'a> Converter<'a> {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(self.name.clone(), path, message));
        self.failed = true;
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(self.name.clone(), path, message));
    }

    fn check_fields(&mut self, section: &str, map: &Mapping, known: &[&str]) {
        for key in map.keys() {
            let key_name = key.as_str().unwrap_or_default();
            if !known.contains(&key_name) {
                self.warn(
                    format!("{}.{}", section, key_name),
                    format!("unknown field: {}", key_name),
                );
            }
        }
    }

    fn convert(&mut self, map: &Mapping, name: String) -> Option<Model> {
        let model_section = map.get("model").and_then(Value::as_mapping);
        if let Some(section) = model_section {
            self.check_fields("model", section, MODEL_FIELDS);
        }

        let layer = match model_section.and_then(|m| get_string(m, "layer")) {
            Some(raw) => match Layer::parse(&raw) {
                Ok(layer) => layer,
                Err(e) => {
                    self.error("model.layer", e);
                    return None;
                }
            },
            None => {
                self.error("model.layer", "missing required field: layer");
                return None;
            }
        };

        let kind = match model_section.and_then(|m| get_string(m, "kind")) {
            Some(raw) => match ModelKind::parse(&raw) {
                Ok(kind) => kind,
                Err(e) => {
                    self.error("model.kind", e);
                    return None;
                }
            },
            None => {
                self.error("model.kind", "missing required field: kind");
                return None;
            }
        };

        let description = model_section
            .and_then(|m| get_string(m, "description"))
            .unwrap_or_default();
        let owner = model_section
            .and_then(|m| get_string(m, "owner"))
            .unwrap_or_default();
        let domain = model_section
            .and_then(|m| get_string(m, "domain"))
            .unwrap_or_default();
        let refresh_frequency = model_section
            .and_then(|m| get_string(m, "refresh_frequency"))
            .unwrap_or_default();
        let tags = dedup_preserve(
            model_section
                .and_then(|m| m.get("tags"))
                .map(string_list)
                .unwrap_or_default(),
        );

        let source_section = map.get("source").and_then(Value::as_mapping);
        if let Some(section) = source_section {
            self.check_fields("source", section, SOURCE_FIELDS);
        }
        let base_table = source_section.and_then(|m| get_string(m, "base_table"));
        let depends_on = dedup_preserve(
            source_section
                .and_then(|m| m.get("depends_on"))
                .map(string_list)
                .unwrap_or_default(),
        );

        let columns = self.convert_columns(map.get("transformations"));
        let filters = self.convert_filters(map.get("filters"));
        let cte_refs = dedup_preserve(normalise_nested_list(map.get("ctes"), "ctes"));

        let aggregations = map.get("aggregations").and_then(Value::as_mapping);
        if let Some(section) = aggregations {
            self.check_fields("aggregations", section, AGGREGATION_FIELDS);
        }
        let group_by = aggregations
            .and_then(|m| m.get("group_by"))
            .map(string_list)
            .unwrap_or_default();
        let having = aggregations
            .and_then(|m| m.get("having"))
            .map(string_list)
            .unwrap_or_default();

        let audits = self.convert_audits(map.get("audits"));
        let grain = map.get("grain").map(string_list).unwrap_or_default();
        let relationships = self.convert_relationships(map.get("relationships"));
        let optimization = self.convert_optimization(map.get("optimization"));

        if self.failed {
            return None;
        }

        Some(Model {
            name,
            description,
            layer,
            kind,
            owner,
            tags,
            domain,
            refresh_frequency,
            base_table,
            depends_on,
            columns,
            filters,
            cte_refs,
            group_by,
            having,
            audits,
            grain,
            relationships,
            optimization,
        })
    }

    fn convert_columns(&mut self, value: Option<&Value>) -> Vec<ColumnSpec> {
        let Some(seq) = value.and_then(Value::as_sequence) else {
            return Vec::new();
        };
        let mut columns = Vec::with_capacity(seq.len());
        for (idx, entry) in seq.iter().enumerate() {
            let Some(map) = entry.as_mapping() else {
                self.error(
                    format!("transformations[{}]", idx),
                    "transformation entry is not a mapping",
                );
                continue;
            };
            self.check_fields(&format!("transformations[{}]", idx), map, COLUMN_FIELDS);
            let Some(name) = get_string(map, "name") else {
                self.error(
                    format!("transformations[{}].name", idx),
                    "missing required field: name",
                );
                continue;
            };
            columns.push(ColumnSpec {
                name,
                reference_table: get_string(map, "reference_table"),
                expression: get_string(map, "expression").unwrap_or_default(),
                description: get_string(map, "description").unwrap_or_default(),
                data_type: get_string(map, "data_type").unwrap_or_default(),
            });
        }
        columns
    }

    fn convert_filters(&mut self, value: Option<&Value>) -> Vec<WhereClause> {
        let Some(seq) = value.and_then(Value::as_sequence) else {
            return Vec::new();
        };
        let mut filters = Vec::with_capacity(seq.len());
        for (idx, entry) in seq.iter().enumerate() {
            let Some(map) = entry.as_mapping() else {
                self.error(format!("filters[{}]", idx), "filter entry is not a mapping");
                continue;
            };
            self.check_fields(&format!("filters[{}]", idx), map, FILTER_FIELDS);
            let (Some(reference_table), Some(condition)) = (
                get_string(map, "reference_table"),
                get_string(map, "condition"),
            ) else {
                self.error(
                    format!("filters[{}]", idx),
                    "filter requires reference_table and condition",
                );
                continue;
            };
            filters.push(WhereClause {
                reference_table,
                condition,
            });
        }
        filters
    }

    fn convert_audits(&mut self, value: Option<&Value>) -> Vec<Audit> {
        match value {
            None => Vec::new(),
            // Mapping form: every key is a legacy shorthand
            Some(Value::Mapping(map)) => {
                let mut audits = Vec::new();
                let entries: Vec<(String, Value)> = map
                    .iter()
                    .map(|(k, v)| (k.as_str().unwrap_or_default().to_string(), v.clone()))
                    .collect();
                for (idx, (key, entry)) in entries.iter().enumerate() {
                    if let Some(audit) = self.coerce_shorthand(idx, key, entry) {
                        audits.push(audit);
                    }
                }
                audits
            }
            Some(Value::Sequence(seq)) => {
                let mut audits = Vec::new();
                for (idx, entry) in seq.iter().enumerate() {
                    let Some(map) = entry.as_mapping() else {
                        self.error(format!("audits[{}]", idx), "audit entry is not a mapping");
                        continue;
                    };
                    self.check_fields(&format!("audits[{}]", idx), map, AUDIT_FIELDS);
                    if let Some(audit) = self.convert_audit_entry(idx, map) {
                        audits.push(audit);
                    }
                }
                audits
            }
            Some(_) => {
                self.error("audits", "audits must be a list or shorthand mapping");
                Vec::new()
            }
        }
    }

    fn convert_audit_entry(&mut self, idx: usize, map: &Mapping) -> Option<Audit> {
        if let Some(type_name) = get_string(map, "type") {
            let columns = map.get("columns").map(string_list).unwrap_or_default();
            return match type_name.to_uppercase().as_str() {
                "NOT_NULL" => Some(Audit::NotNull { columns }),
                "POSITIVE_VALUES" => Some(Audit::PositiveValues { columns }),
                "UNIQUE_COMBINATION" => Some(Audit::UniqueCombination { columns }),
                "ACCEPTED_VALUES" => {
                    let values = self.accepted_values(idx, map.get("values"), &columns);
                    Some(Audit::AcceptedValues { values })
                }
                other => {
                    self.error(
                        format!("audits[{}].type", idx),
                        format!("unknown audit type: {}", other),
                    );
                    None
                }
            };
        }

        // Legacy single-key shorthand inside the list form
        for key in ["not_null", "positive_values", "unique_combination", "accepted_values"] {
            if let Some(entry) = map.get(key) {
                return self.coerce_shorthand(idx, key, entry);
            }
        }

        self.error(format!("audits[{}]", idx), "audit entry has no type");
        None
    }

    fn coerce_shorthand(&mut self, idx: usize, key: &str, entry: &Value) -> Option<Audit> {
        match key {
            "not_null" => Some(Audit::NotNull {
                columns: string_list(entry),
            }),
            "positive_values" => Some(Audit::PositiveValues {
                columns: string_list(entry),
            }),
            "unique_combination" => Some(Audit::UniqueCombination {
                columns: string_list(entry),
            }),
            "accepted_values" => {
                let values = self.accepted_values(idx, Some(entry), &[]);
                Some(Audit::AcceptedValues { values })
            }
            other => {
                self.error(
                    format!("audits[{}]", idx),
                    format!("unknown audit shorthand: {}", other),
                );
                None
            }
        }
    }

    /// ACCEPTED_VALUES carries either a column -> literals mapping, or a
    /// flat literal list attached to the audit's single declared column.
    fn accepted_values(
        &mut self,
        idx: usize,
        value: Option<&Value>,
        columns: &[String],
    ) -> BTreeMap<String, Vec<String>> {
        let mut values = BTreeMap::new();
        match value {
            Some(Value::Mapping(map)) => {
                for (key, literals) in map {
                    let column = key.as_str().unwrap_or_default().to_string();
                    values.insert(column, string_list(literals));
                }
            }
            Some(Value::Sequence(_)) => {
                if columns.len() == 1 {
                    values.insert(columns[0].clone(), string_list(value.unwrap()));
                } else {
                    self.error(
                        format!("audits[{}].values", idx),
                        "flat accepted_values list requires exactly one declared column",
                    );
                }
            }
            _ => {
                self.error(
                    format!("audits[{}].values", idx),
                    "accepted_values requires a column-to-literals mapping",
                );
            }
        }
        values
    }

    fn convert_relationships(&mut self, value: Option<&Value>) -> Vec<ForeignKey> {
        let entries = normalise_nested_entries(value, "foreign_keys");
        let mut relationships = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let Some(map) = entry.as_mapping() else {
                self.error(
                    format!("relationships[{}]", idx),
                    "relationship entry is not a mapping",
                );
                continue;
            };
            self.check_fields(&format!("relationships[{}]", idx), map, FOREIGN_KEY_FIELDS);
            let (Some(local_column), Some(references_table), Some(references_column)) = (
                get_string(map, "local_column"),
                get_string(map, "references_table"),
                get_string(map, "references_column"),
            ) else {
                self.error(
                    format!("relationships[{}]", idx),
                    "relationship requires local_column, references_table, references_column",
                );
                continue;
            };
            let relationship_type = match get_string(map, "relationship_type") {
                Some(raw) => match RelationshipType::parse(&raw) {
                    Ok(rt) => rt,
                    Err(e) => {
                        self.error(format!("relationships[{}].relationship_type", idx), e);
                        continue;
                    }
                },
                None => {
                    self.error(
                        format!("relationships[{}].relationship_type", idx),
                        "missing required field: relationship_type",
                    );
                    continue;
                }
            };
            let join_type = match get_string(map, "join_type") {
                Some(raw) => match JoinType::parse(&raw) {
                    Ok(jt) => jt,
                    Err(e) => {
                        self.error(format!("relationships[{}].join_type", idx), e);
                        continue;
                    }
                },
                None => JoinType::Left,
            };
            relationships.push(ForeignKey {
                local_column,
                references_table,
                references_column,
                relationship_type,
                join_type,
            });
        }
        relationships
    }

    fn convert_optimization(&mut self, value: Option<&Value>) -> Option<Optimization> {
        let map = value.and_then(Value::as_mapping)?;
        self.check_fields("optimization", map, OPTIMIZATION_FIELDS);
        let mut indexes = Vec::new();
        if let Some(seq) = map.get("indexes").and_then(Value::as_sequence) {
            for (idx, entry) in seq.iter().enumerate() {
                match entry {
                    Value::Mapping(index_map) => {
                        self.check_fields(
                            &format!("optimization.indexes[{}]", idx),
                            index_map,
                            INDEX_FIELDS,
                        );
                        indexes.push(IndexSpec {
                            name: get_string(index_map, "name"),
                            columns: index_map
                                .get("columns")
                                .map(string_list)
                                .unwrap_or_default(),
                        });
                    }
                    Value::Sequence(_) => indexes.push(IndexSpec {
                        name: None,
                        columns: string_list(entry),
                    }),
                    _ => self.error(
                        format!("optimization.indexes[{}]", idx),
                        "index entry is not a mapping or column list",
                    ),
                }
            }
        }
        Some(Optimization {
            partitioned_by: map
                .get("partitioned_by")
                .map(string_list)
                .unwrap_or_default(),
            clustered_by: map.get("clustered_by").map(string_list).unwrap_or_default(),
            indexes,
        })
    }
}

fn get_string(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a YAML value into a list of scalar strings.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

/// A section authored as either a bare list or a mapping wrapping the same
/// list under `key` (the `ctes`/`ctes.ctes` ambiguity) normalises to the
/// flat list.
fn normalise_nested_list(value: Option<&Value>, key: &str) -> Vec<String> {
    match value {
        Some(Value::Sequence(_)) => string_list(value.unwrap()),
        Some(Value::Mapping(map)) => map.get(key).map(string_list).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn normalise_nested_entries<'v>(value: Option<&'v Value>, key: &str) -> Vec<&'v Value> {
    match value {
        Some(Value::Sequence(seq)) => seq.iter().collect(),
        Some(Value::Mapping(map)) => map
            .get(key)
            .and_then(Value::as_sequence)
            .map(|seq| seq.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Ordered-set semantics: first occurrence wins.
fn dedup_preserve(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
