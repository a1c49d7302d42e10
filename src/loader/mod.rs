//! Model definition loading
//!
//! Discovers definition files under a root, merges partial files, coerces
//! legacy shorthands, and produces the frozen `name -> Model` mapping plus
//! accumulated load diagnostics. A malformed file fails that file only;
//! the rest of the corpus continues to load.

mod discover;
mod merge;
mod raw;

pub use discover::{discover_definitions, DefinitionGroup};
pub use merge::merge_documents;
pub use raw::{model_from_document, parse_document, RECOGNISED_SECTIONS};

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::MedallionError;
use crate::model::{Diagnostic, Model};

/// Loader output: the model corpus plus everything worth reporting.
#[derive(Debug)]
pub struct LoadResult {
    pub models: BTreeMap<String, Model>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Load every model definition under `root`.
pub fn load_models(root: &Path) -> Result<LoadResult, MedallionError> {
    let groups = discover_definitions(root)?;
    let mut models: BTreeMap<String, Model> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for group in &groups {
        let mut documents = Vec::with_capacity(group.files.len());
        let mut failed = false;

        for path in &group.files {
            match parse_document(path, &mut diagnostics) {
                Some(doc) => documents.push(doc),
                None => {
                    failed = true;
                    break;
                }
            }
        }
        if failed || documents.is_empty() {
            continue;
        }

        let merged = merge_documents(documents);
        if let Some(model) = model_from_document(&group.stem, merged, &mut diagnostics) {
            if models.contains_key(&model.name) {
                diagnostics.push(Diagnostic::error(
                    model.name.clone(),
                    "model.name",
                    format!("duplicate model name: {}", model.name),
                ));
            } else {
                log::debug!("loaded model {} from {} file(s)", model.name, group.files.len());
                models.insert(model.name.clone(), model);
            }
        }
    }

    Ok(LoadResult { models, diagnostics })
}
