//! Model fingerprinting
//!
//! Three 64-bit hashes per model, each over a canonical byte serialization
//! of a projection of the IR:
//!
//!   logic    - what data the model yields
//!   schema   - the output shape (names and types)
//!   metadata - descriptive attributes
//!
//! The hash is FNV-1a 64, fixed so fingerprints are stable across runs and
//! implementations. Canonical serialization length-prefixes every string,
//! keeps authored order for ordered sequences, sorts map keys (the IR's
//! BTreeMap already does), and encodes enum variants by their textual tag.

use crate::model::Model;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// The three per-model hashes, hex-encoded for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprints {
    pub logic: u64,
    pub schema: u64,
    pub metadata: u64,
}

impl Fingerprints {
    pub fn logic_hex(&self) -> String {
        format!("{:016x}", self.logic)
    }

    pub fn schema_hex(&self) -> String {
        format!("{:016x}", self.schema)
    }

    pub fn metadata_hex(&self) -> String {
        format!("{:016x}", self.metadata)
    }
}

/// Compute all three fingerprints for a model.
pub fn fingerprint(model: &Model) -> Fingerprints {
    Fingerprints {
        logic: logic_hash(model),
        schema: schema_hash(model),
        metadata: metadata_hash(model),
    }
}

fn logic_hash(model: &Model) -> u64 {
    let mut canon = Canon::new();
    canon.field("base_table");
    canon.opt_str(model.base_table.as_deref());

    canon.field("columns");
    canon.len(model.columns.len());
    for column in &model.columns {
        canon.str(&column.name);
        canon.opt_str(column.reference_table.as_deref());
        canon.str(&column.expression);
    }

    canon.field("filters");
    canon.len(model.filters.len());
    for filter in &model.filters {
        canon.str(&filter.reference_table);
        canon.str(&filter.condition);
    }

    canon.field("ctes");
    canon.str_list(&model.cte_refs);

    canon.field("aggregations");
    canon.str_list(&model.group_by);
    canon.str_list(&model.having);

    canon.field("relationships");
    canon.len(model.relationships.len());
    for fk in &model.relationships {
        canon.str(&fk.local_column);
        canon.str(&fk.references_table);
        canon.str(&fk.references_column);
        canon.str(fk.relationship_type.as_str());
        canon.str(fk.join_type.as_str());
    }

    canon.finish()
}

fn schema_hash(model: &Model) -> u64 {
    let mut canon = Canon::new();
    canon.field("columns");
    canon.len(model.columns.len());
    for column in &model.columns {
        canon.str(&column.name);
        canon.str(&column.data_type);
        canon.bool(!model.is_column_not_null(&column.name));
    }
    canon.finish()
}

fn metadata_hash(model: &Model) -> u64 {
    let mut canon = Canon::new();
    canon.field("description");
    canon.str(&model.description);
    canon.field("owner");
    canon.str(&model.owner);
    canon.field("tags");
    canon.str_list(&model.tags);
    canon.field("domain");
    canon.str(&model.domain);
    canon.field("refresh_frequency");
    canon.str(&model.refresh_frequency);
    canon.field("layer");
    canon.str(model.layer.as_str());
    canon.field("kind");
    canon.str(model.kind.as_str());
    canon.finish()
}

/// Incremental FNV-1a 64 over a canonical byte stream.
struct Canon {
    hash: u64,
}

impl Canon {
    fn new() -> Self {
        Canon { hash: FNV_OFFSET }
    }

    fn bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.hash ^= b as u64;
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
        }
    }

    /// Section marker; keeps adjacent projections from sliding into each
    /// other when a field is empty.
    fn field(&mut self, name: &str) {
        self.bytes(&[0xFE]);
        self.bytes(name.as_bytes());
    }

    fn len(&mut self, len: usize) {
        self.bytes(&(len as u64).to_le_bytes());
    }

    fn str(&mut self, s: &str) {
        self.len(s.len());
        self.bytes(s.as_bytes());
    }

    fn opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.bytes(&[1]);
                self.str(s);
            }
            None => self.bytes(&[0]),
        }
    }

    fn str_list(&mut self, items: &[String]) {
        self.len(items.len());
        for item in items {
            self.str(item);
        }
    }

    fn bool(&mut self, value: bool) {
        self.bytes(&[value as u8]);
    }

    fn finish(self) -> u64 {
        self.hash
    }
}
