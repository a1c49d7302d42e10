//! Plan computation
//!
//! Diffs the current validated IR against a persisted snapshot and
//! produces the ordered change list. Replaces cascade downstream (a
//! rebuilt model forces its dependents to rebuild); metadata-only changes
//! never cascade. Ordering: Adds and Replaces follow the resolver's
//! topological order, AlterMeta follows topo order, DropRemoves come last
//! in reverse dependency order so dependents drop before their sources.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::MedallionError;
use crate::graph::DependencyGraph;
use crate::model::Model;

use super::snapshot::{Snapshot, SnapshotModel};

/// What must happen to one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    DropRemove,
    Replace,
    AlterMeta,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::DropRemove => "drop",
            ChangeKind::Replace => "replace",
            ChangeKind::AlterMeta => "alter-meta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub model: String,
}

/// Ordered change list for one environment.
#[derive(Debug, Clone)]
pub struct Plan {
    pub environment: String,
    pub changes: Vec<Change>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Diff the current IR against a snapshot.
pub fn plan_changes(
    models: &BTreeMap<String, Model>,
    graph: &DependencyGraph,
    snapshot: &Snapshot,
) -> Result<Plan, MedallionError> {
    let positions = graph.topo_positions()?;

    let mut adds: BTreeSet<String> = BTreeSet::new();
    let mut replaces: BTreeSet<String> = BTreeSet::new();
    let mut alter_metas: BTreeSet<String> = BTreeSet::new();
    let mut drops: Vec<String> = Vec::new();

    for (name, model) in models {
        match snapshot.models.get(name) {
            None => {
                adds.insert(name.clone());
            }
            Some(previous) => {
                let current = SnapshotModel::capture(model);
                if current.logic_hash != previous.logic_hash
                    || current.schema_hash != previous.schema_hash
                {
                    replaces.insert(name.clone());
                } else if current.metadata_hash != previous.metadata_hash {
                    alter_metas.insert(name.clone());
                }
            }
        }
    }
    for name in snapshot.models.keys() {
        if !models.contains_key(name) {
            drops.push(name.clone());
        }
    }

    // Downstream cascade: a replaced model invalidates everything built on
    // top of it. Metadata-only changes stay where they are.
    let mut queue: Vec<String> = replaces.iter().cloned().collect();
    while let Some(name) = queue.pop() {
        for dependent in graph.dependents_of(&name) {
            if !models.contains_key(&dependent)
                || adds.contains(&dependent)
                || replaces.contains(&dependent)
            {
                continue;
            }
            alter_metas.remove(&dependent);
            replaces.insert(dependent.clone());
            queue.push(dependent);
        }
    }

    let topo_position =
        |name: &String| positions.get(name).copied().unwrap_or(usize::MAX);

    let mut creations: Vec<Change> = adds
        .iter()
        .map(|name| Change {
            kind: ChangeKind::Add,
            model: name.clone(),
        })
        .chain(replaces.iter().map(|name| Change {
            kind: ChangeKind::Replace,
            model: name.clone(),
        }))
        .collect();
    creations.sort_by_key(|change| (topo_position(&change.model), change.model.clone()));

    let mut metas: Vec<Change> = alter_metas
        .iter()
        .map(|name| Change {
            kind: ChangeKind::AlterMeta,
            model: name.clone(),
        })
        .collect();
    metas.sort_by_key(|change| (topo_position(&change.model), change.model.clone()));

    let removal_order = snapshot_reverse_topo(snapshot);
    let mut removals: Vec<Change> = drops
        .into_iter()
        .map(|name| Change {
            kind: ChangeKind::DropRemove,
            model: name,
        })
        .collect();
    removals.sort_by_key(|change| {
        removal_order
            .get(&change.model)
            .copied()
            .unwrap_or(usize::MAX)
    });

    let mut changes = creations;
    changes.extend(metas);
    changes.extend(removals);

    Ok(Plan {
        environment: snapshot.environment.clone(),
        changes,
    })
}

/// Reverse topological positions over the snapshot's own dependency lists
/// (dropped models are no longer in the live graph). Dependents sort
/// before the models they depend on.
fn snapshot_reverse_topo(snapshot: &Snapshot) -> HashMap<String, usize> {
    let mut remaining: BTreeMap<&str, Vec<&str>> = snapshot
        .models
        .iter()
        .map(|(name, entry)| {
            let deps: Vec<&str> = entry
                .dependencies
                .iter()
                .filter(|d| snapshot.models.contains_key(*d))
                .map(String::as_str)
                .collect();
            (name.as_str(), deps)
        })
        .collect();

    let mut forward: Vec<String> = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| !remaining.contains_key(d)))
            .map(|(name, _)| *name)
            .collect();
        if ready.is_empty() {
            // Cyclic snapshot (should not happen); fall back to name order
            forward.extend(remaining.keys().map(|k| k.to_string()));
            break;
        }
        // BTreeMap iteration keeps `ready` lexicographic
        for name in &ready {
            forward.push(name.to_string());
        }
        for name in ready {
            remaining.remove(name);
        }
    }

    forward
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect()
}
