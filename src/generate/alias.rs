//! Source aliasing
//!
//! The first dependency of a model (its base_table when set) is aliased
//! `T`; every additional dependency gets a short alias derived from its
//! name. The mapping is computed once per model and is the single source
//! of truth for column qualification everywhere SQL is rendered.

use std::collections::{BTreeMap, HashSet};

use crate::model::Model;

/// Primary-source alias.
pub const PRIMARY_ALIAS: &str = "T";

/// Compute the reference_table -> alias mapping for a model.
pub fn alias_map(model: &Model) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    taken.insert(PRIMARY_ALIAS.to_string());

    if let Some(primary) = model.primary_source() {
        map.insert(primary.to_string(), PRIMARY_ALIAS.to_string());
    }

    for dep in &model.depends_on {
        if map.contains_key(dep) {
            continue;
        }
        let alias = derive_alias(dep, &taken);
        taken.insert(alias.clone());
        map.insert(dep.clone(), alias);
    }
    map
}

/// Derive a short alias for a source name.
///
/// Starts from the upper-cased leading letter of the unqualified name,
/// extends with consonant initials of the remaining words on collision,
/// and falls back to a numeric suffix.
fn derive_alias(name: &str, taken: &HashSet<String>) -> String {
    let unqualified = name.rsplit('.').next().unwrap_or(name);
    let words: Vec<&str> = unqualified
        .split(|c: char| c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .collect();

    let lead = words
        .first()
        .and_then(|w| w.chars().next())
        .unwrap_or('X')
        .to_ascii_uppercase();

    let mut candidate = lead.to_string();
    if !taken.contains(&candidate) {
        return candidate;
    }

    // Extend with consonant initials of the remaining words
    for word in words.iter().skip(1) {
        if let Some(initial) = word.chars().find(|c| c.is_ascii_alphabetic()) {
            let initial = initial.to_ascii_uppercase();
            if !"AEIOU".contains(initial) || candidate.len() == 1 {
                candidate.push(initial);
                if !taken.contains(&candidate) {
                    return candidate;
                }
            }
        }
    }

    for suffix in 2.. {
        let numbered = format!("{}{}", candidate, suffix);
        if !taken.contains(&numbered) {
            return numbered;
        }
    }
    unreachable!()
}
