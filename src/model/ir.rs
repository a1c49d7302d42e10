//! Typed model IR
//!
//! The value tree produced by the loader and consumed read-only by every
//! later stage. Construction guarantees structural validity (well-formed
//! enum variants, required fields present); cross-model semantics are the
//! validator's job. Equality is structural and two IRs with identical
//! content hash identically.

use std::collections::BTreeMap;

/// Medallion layer tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
    Cte,
}

impl Layer {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            "gold" => Ok(Layer::Gold),
            "cte" => Ok(Layer::Cte),
            _ => Err(format!("unknown layer: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
            Layer::Cte => "cte",
        }
    }
}

/// Materialization kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Table,
    View,
    Cte,
}

impl ModelKind {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "TABLE" => Ok(ModelKind::Table),
            "VIEW" => Ok(ModelKind::View),
            "CTE" => Ok(ModelKind::Cte),
            _ => Err(format!("unknown kind: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Table => "TABLE",
            ModelKind::View => "VIEW",
            ModelKind::Cte => "CTE",
        }
    }
}

/// Cardinality of a foreign-key relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipType {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "one-to-one" => Ok(RelationshipType::OneToOne),
            "one-to-many" => Ok(RelationshipType::OneToMany),
            "many-to-one" => Ok(RelationshipType::ManyToOne),
            "many-to-many" => Ok(RelationshipType::ManyToMany),
            _ => Err(format!("unknown relationship type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::OneToOne => "one-to-one",
            RelationshipType::OneToMany => "one-to-many",
            RelationshipType::ManyToOne => "many-to-one",
            RelationshipType::ManyToMany => "many-to-many",
        }
    }
}

/// Join flavor emitted for a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    FullOuter,
}

impl JoinType {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "INNER" => Ok(JoinType::Inner),
            "LEFT" => Ok(JoinType::Left),
            "RIGHT" => Ok(JoinType::Right),
            "FULL_OUTER" | "FULL OUTER" => Ok(JoinType::FullOuter),
            _ => Err(format!("unknown join type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::FullOuter => "FULL_OUTER",
        }
    }

    /// SQL join keyword sequence (`LEFT JOIN`, `FULL OUTER JOIN`, ...)
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// One output column of a model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    /// Output identifier
    pub name: String,
    /// Source table; None means the model's base_table
    pub reference_table: Option<String>,
    /// Raw SQL fragment; empty means identity mapping of the same-named
    /// source column
    pub expression: String,
    pub description: String,
    pub data_type: String,
}

impl ColumnSpec {
    /// Whether the column is a plain identity mapping of a source column.
    pub fn is_identity(&self) -> bool {
        self.expression.trim().is_empty()
    }
}

/// A single filter predicate scoped to a source table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhereClause {
    pub reference_table: String,
    pub condition: String,
}

/// Data-quality audit attached to a model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audit {
    NotNull { columns: Vec<String> },
    PositiveValues { columns: Vec<String> },
    UniqueCombination { columns: Vec<String> },
    AcceptedValues { values: BTreeMap<String, Vec<String>> },
}

impl Audit {
    pub fn type_name(&self) -> &'static str {
        match self {
            Audit::NotNull { .. } => "NOT_NULL",
            Audit::PositiveValues { .. } => "POSITIVE_VALUES",
            Audit::UniqueCombination { .. } => "UNIQUE_COMBINATION",
            Audit::AcceptedValues { .. } => "ACCEPTED_VALUES",
        }
    }

    /// All columns the audit touches, in declaration order (map keys sorted
    /// for ACCEPTED_VALUES).
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Audit::NotNull { columns }
            | Audit::PositiveValues { columns }
            | Audit::UniqueCombination { columns } => {
                columns.iter().map(String::as_str).collect()
            }
            Audit::AcceptedValues { values } => values.keys().map(String::as_str).collect(),
        }
    }
}

/// Declared join relationship to another model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub local_column: String,
    pub references_table: String,
    pub references_column: String,
    pub relationship_type: RelationshipType,
    pub join_type: JoinType,
}

/// Physical-layout index hint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Physical layout hints for materialized models
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Optimization {
    pub partitioned_by: Vec<String>,
    pub clustered_by: Vec<String>,
    pub indexes: Vec<IndexSpec>,
}

/// A single transformation model
///
/// Child collections keep authored order; `depends_on` and `cte_refs` are
/// ordered sets (first occurrence wins, enforced by the loader).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Model {
    pub name: String,
    pub description: String,
    pub layer: Layer,
    pub kind: ModelKind,
    pub owner: String,
    pub tags: Vec<String>,
    pub domain: String,
    pub refresh_frequency: String,
    /// Primary source relation, aliased `T` in generated SQL
    pub base_table: Option<String>,
    pub depends_on: Vec<String>,
    pub columns: Vec<ColumnSpec>,
    pub filters: Vec<WhereClause>,
    pub cte_refs: Vec<String>,
    pub group_by: Vec<String>,
    pub having: Vec<String>,
    pub audits: Vec<Audit>,
    pub grain: Vec<String>,
    pub relationships: Vec<ForeignKey>,
    pub optimization: Option<Optimization>,
}

impl Model {
    /// Output column names in declaration order.
    pub fn output_columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether the model produces a standalone DDL artifact.
    pub fn is_materializable(&self) -> bool {
        matches!(self.kind, ModelKind::Table | ModelKind::View)
    }

    /// The source the model's `T` alias binds to: `base_table` when set,
    /// otherwise the first dependency.
    pub fn primary_source(&self) -> Option<&str> {
        self.base_table
            .as_deref()
            .or_else(|| self.depends_on.first().map(String::as_str))
    }

    /// Whether a column is implied non-nullable by a NOT_NULL audit.
    pub fn is_column_not_null(&self, column: &str) -> bool {
        self.audits.iter().any(|a| {
            matches!(a, Audit::NotNull { .. }) && a.columns().iter().any(|c| *c == column)
        })
    }
}
